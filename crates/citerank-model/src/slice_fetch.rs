//! HTTP client for the neighbour-slice index service.
//!
//! Given `(doc_id, segment_id)` anchors, the service returns the slices that
//! follow each anchor inside its document. Responses are aligned with the
//! request: `result[i]` holds the neighbours of `doc_info[i]`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SliceFetchConfig;
use crate::error::{ModelError, ModelResult};

const SERVICE: &str = "slice-fetch";

#[derive(Debug, Serialize)]
pub(crate) struct DocInfo<'a> {
    pub docid: &'a str,
    pub segmentid: i64,
    pub before_step: u32,
    pub after_step: u32,
    pub key: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SliceFetchRequest<'a> {
    pub index: &'a str,
    pub doc_info: Vec<DocInfo<'a>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SliceFetchResponse {
    pub result: Vec<SliceGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SliceGroup {
    #[serde(default)]
    pub items: Vec<NeighborSlice>,
}

/// One slice returned by the index service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NeighborSlice {
    /// Owning document object id.
    #[serde(default, alias = "belong_doc_id", alias = "docid")]
    pub doc_id: String,

    /// Position of the slice inside its document.
    pub segment_id: i64,

    /// Slice text.
    #[serde(default)]
    pub raw_text: String,

    #[serde(default)]
    pub doc_name: String,

    #[serde(default)]
    pub doc_md5: String,

    #[serde(default)]
    pub pages: Vec<i64>,

    /// The anchor segment this slice was fetched for. Filled by the client.
    #[serde(default)]
    pub anchor_segment_id: i64,
}

/// Async client for the neighbour-slice endpoint.
#[derive(Debug, Clone)]
pub struct HttpSliceFetchClient {
    client: reqwest::Client,
    config: SliceFetchConfig,
}

impl HttpSliceFetchClient {
    /// Build a client from config.
    pub fn new(config: SliceFetchConfig) -> ModelResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Fetch the slices following each `(doc_id, segment_id)` anchor.
    ///
    /// Indexes are tried in configured order until one returns at least one
    /// successor. An empty result means no anchor has a successor.
    pub async fn fetch_next_slices(
        &self,
        doc_ids: &[String],
        segment_ids: &[i64],
    ) -> ModelResult<Vec<NeighborSlice>> {
        if doc_ids.len() != segment_ids.len() {
            return Err(ModelError::invalid_config(format!(
                "{} doc ids for {} segment ids",
                doc_ids.len(),
                segment_ids.len()
            )));
        }
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }

        first_non_empty(&self.config.indexes, segment_ids, |index| async move {
            debug!(
                "slice fetch request: {} anchors, index {}",
                doc_ids.len(),
                index
            );
            let body = self.build_request(index, doc_ids, segment_ids);
            self.send(&body).await
        })
        .await
    }

    pub(crate) fn build_request<'a>(
        &self,
        index: &'a str,
        doc_ids: &'a [String],
        segment_ids: &[i64],
    ) -> SliceFetchRequest<'a> {
        let doc_info = doc_ids
            .iter()
            .zip(segment_ids)
            .map(|(doc_id, &segment_id)| DocInfo {
                docid: doc_id,
                segmentid: segment_id,
                before_step: self.config.before_step,
                after_step: self.config.after_step,
                key: "docid",
            })
            .collect();
        SliceFetchRequest { index, doc_info }
    }

    /// Build the POST request for one index.
    pub(crate) fn build_http_request(
        &self,
        body: &SliceFetchRequest<'_>,
    ) -> reqwest::Result<reqwest::Request> {
        self.client.post(&self.config.url).json(body).build()
    }

    async fn send(&self, body: &SliceFetchRequest<'_>) -> ModelResult<SliceFetchResponse> {
        let request = self
            .build_http_request(body)
            .map_err(|e| ModelError::request_failed(SERVICE, &self.config.url, e.to_string()))?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ModelError::request_failed(SERVICE, &self.config.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::request_failed(SERVICE, &self.config.url, e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Query `indexes` in order and return the successors from the first index
/// that has any. An index-level error stops the walk.
pub(crate) async fn first_non_empty<'a, F, Fut>(
    indexes: &'a [String],
    segment_ids: &[i64],
    mut fetch: F,
) -> ModelResult<Vec<NeighborSlice>>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = ModelResult<SliceFetchResponse>>,
{
    for index in indexes {
        let response = fetch(index.as_str()).await?;
        let slices = successors(response, segment_ids)?;
        if !slices.is_empty() {
            info!("slice fetch: {} successors from index {}", slices.len(), index);
            return Ok(slices);
        }
        debug!("slice fetch: no successors in index {}", index);
    }
    Ok(Vec::new())
}

/// Keep the items strictly after each anchor and tag them with it.
pub(crate) fn successors(
    response: SliceFetchResponse,
    segment_ids: &[i64],
) -> ModelResult<Vec<NeighborSlice>> {
    if response.result.len() > segment_ids.len() {
        return Err(ModelError::invalid_response(
            SERVICE,
            format!(
                "{} result groups for {} anchors",
                response.result.len(),
                segment_ids.len()
            ),
        ));
    }

    let mut out = Vec::new();
    for (group, &anchor) in response.result.into_iter().zip(segment_ids) {
        for mut item in group.items {
            if item.segment_id <= anchor {
                continue;
            }
            item.anchor_segment_id = anchor;
            out.push(item);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let client = HttpSliceFetchClient::new(SliceFetchConfig::default()).unwrap();
        let doc_ids = vec!["gns://doc-a".to_string()];
        let body = client.build_request("anyshare_bot", &doc_ids, &[4]);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["index"], "anyshare_bot");
        let info = &value["doc_info"][0];
        assert_eq!(info["docid"], "gns://doc-a");
        assert_eq!(info["segmentid"], 4);
        assert_eq!(info["before_step"], 0);
        assert_eq!(info["after_step"], 1);
        assert_eq!(info["key"], "docid");
    }

    #[test]
    fn test_successors_drop_anchor_and_earlier() {
        let response: SliceFetchResponse = serde_json::from_str(
            r#"{"result": [
                {"items": [
                    {"belong_doc_id": "a", "segment_id": 3, "raw_text": "anchor"},
                    {"belong_doc_id": "a", "segment_id": 4, "raw_text": "next"}
                ]},
                {"items": [
                    {"belong_doc_id": "b", "segment_id": 1, "raw_text": "before"}
                ]}
            ]}"#,
        )
        .unwrap();

        let slices = successors(response, &[3, 2]).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].doc_id, "a");
        assert_eq!(slices[0].segment_id, 4);
        assert_eq!(slices[0].anchor_segment_id, 3);
    }

    #[test]
    fn test_too_many_groups_rejected() {
        let response: SliceFetchResponse =
            serde_json::from_str(r#"{"result": [{"items": []}, {"items": []}]}"#).unwrap();
        assert!(successors(response, &[1]).is_err());
    }

    fn response(json: &str) -> SliceFetchResponse {
        serde_json::from_str(json).unwrap()
    }

    fn indexes() -> Vec<String> {
        SliceFetchConfig::default().indexes
    }

    #[test]
    fn test_http_request_targets_configured_url() {
        let client = HttpSliceFetchClient::new(SliceFetchConfig {
            url: "http://index.local:8080/api/v1/slices/neighbors".to_string(),
            ..Default::default()
        })
        .unwrap();
        let doc_ids = vec!["gns://doc-a".to_string()];
        let body = client.build_request("anyshare_slice_vector", &doc_ids, &[7]);
        let request = client.build_http_request(&body).unwrap();

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "http://index.local:8080/api/v1/slices/neighbors"
        );
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(bytes).unwrap();
        assert_eq!(value["index"], "anyshare_slice_vector");
        assert_eq!(value["doc_info"][0]["segmentid"], 7);
    }

    #[tokio::test]
    async fn test_empty_first_index_falls_through_to_next() {
        let indexes = indexes();
        let mut asked = Vec::new();
        let slices = first_non_empty(&indexes, &[3], |index| {
            asked.push(index.to_string());
            let json = if index == "anyshare_bot" {
                r#"{"result": [{"items": []}]}"#
            } else {
                r#"{"result": [{"items": [{"docid": "a", "segment_id": 4, "raw_text": "next"}]}]}"#
            };
            async move { Ok(response(json)) }
        })
        .await
        .unwrap();

        assert_eq!(asked, vec!["anyshare_bot", "anyshare_slice_vector"]);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].segment_id, 4);
        assert_eq!(slices[0].anchor_segment_id, 3);
    }

    #[tokio::test]
    async fn test_first_index_with_successors_stops_the_walk() {
        let indexes = indexes();
        let mut calls = 0;
        let slices = first_non_empty(&indexes, &[3], |_| {
            calls += 1;
            async {
                Ok(response(
                    r#"{"result": [{"items": [{"docid": "a", "segment_id": 4}]}]}"#,
                ))
            }
        })
        .await
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(slices.len(), 1);
    }

    #[tokio::test]
    async fn test_index_error_propagates() {
        let indexes = indexes();
        let mut calls = 0;
        let err = first_non_empty(&indexes, &[3], |index| {
            calls += 1;
            let url = format!("http://index.local/{index}");
            async move { Err(ModelError::request_failed("slice-fetch", url, "refused")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, ModelError::RequestFailed { .. }));
    }

    #[tokio::test]
    async fn test_all_indexes_empty_is_empty_result() {
        let indexes = indexes();
        let slices = first_non_empty(&indexes, &[3], |_| async {
            Ok(response(r#"{"result": [{"items": []}]}"#))
        })
        .await
        .unwrap();
        assert!(slices.is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_anchor_lists_rejected() {
        let client = HttpSliceFetchClient::new(SliceFetchConfig::default()).unwrap();
        let err = client
            .fetch_next_slices(&["a".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }
}
