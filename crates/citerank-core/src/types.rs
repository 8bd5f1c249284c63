//! Common types used throughout citerank-core.
//!
//! Candidate slices come in from the retrieval channels, become
//! [`RankedSlice`] rows during fusion and expansion, and leave as
//! [`Citation`]s. FAQ candidates travel a separate path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::text;

// ============================================================================
// Query
// ============================================================================

/// The query variants supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    /// The user's query as typed.
    pub origin_query: String,

    /// Query rewritten by an upstream step (spelling, coreference).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_query: Option<String>,

    /// Query augmented with conversation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augment_query: Option<String>,
}

impl QueryInput {
    /// Create an input holding only the original query.
    pub fn new(origin_query: impl Into<String>) -> Self {
        Self {
            origin_query: origin_query.into(),
            ..Default::default()
        }
    }

    /// The query used for ranking: augmented, else rewritten, else original.
    ///
    /// Blank variants are skipped.
    pub fn effective(&self) -> &str {
        [&self.augment_query, &self.rewrite_query]
            .into_iter()
            .flatten()
            .find(|q| !q.trim().is_empty())
            .map(String::as_str)
            .unwrap_or(self.origin_query.as_str())
    }
}

// ============================================================================
// Documents and slices
// ============================================================================

/// Identity of the document owning a slice.
///
/// Every slice of one document must carry the same identity; fusion enforces
/// this by copying the first identity seen for each `md5`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentIdentity {
    /// Document address (e.g. `gns://lib/dir/object`).
    pub doc_id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    /// Content hash of the whole document; the grouping key for identity.
    pub md5: String,
    pub page: i64,
    pub mimetype: String,
    pub ext_type: String,
    pub parent_path: String,
}

impl DocumentIdentity {
    /// Object id: the last path segment of `doc_id`.
    pub fn object_id(&self) -> &str {
        self.doc_id
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(self.doc_id.as_str())
    }
}

/// One retrieved slice, as produced by a dense or sparse channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlice {
    /// Unique per retrieval event; the same slice hit by both channels shares it.
    pub uuid: String,

    #[serde(default)]
    pub document: DocumentIdentity,

    pub raw_text: String,

    /// Ordinal position of the slice inside its document.
    pub segment_id: i64,

    #[serde(default)]
    pub pages: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Raw channel score: cosine similarity (dense) or BM25 (sparse).
    pub score: f64,
}

/// Which retrieval channels hit a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HitType {
    AllHit,
    OnlyDense,
    OnlySparse,
}

/// Row of the fused table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedSlice {
    #[serde(flatten)]
    pub slice: CandidateSlice,

    /// Hash of the normalized slice text.
    pub text_hash: String,

    pub cos_sim_score: Option<f64>,
    pub bm25_score: Option<f64>,
    pub reranker_score: Option<f64>,

    /// `None` for successor rows appended during expansion.
    pub hit_type: Option<HitType>,

    /// `None` until fusion scores the row, and for appended successor rows.
    pub merge_score: Option<f64>,

    /// Segment this row was fetched to extend (successor rows only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_segment_id: Option<i64>,
}

impl RankedSlice {
    /// Wrap a candidate with its text hash and no scores yet.
    pub fn from_candidate(slice: CandidateSlice) -> Self {
        let text_hash = text::text_hash(&slice.raw_text);
        Self {
            slice,
            text_hash,
            cos_sim_score: None,
            bm25_score: None,
            reranker_score: None,
            hit_type: None,
            merge_score: None,
            anchor_segment_id: None,
        }
    }

    /// Dedup key: `(document md5, text hash)`.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.slice.document.md5, &self.text_hash)
    }

    /// Adjacency key: `(document md5, segment id)`.
    pub fn position_key(&self) -> (&str, i64) {
        (&self.slice.document.md5, self.slice.segment_id)
    }
}

/// A slice returned by the neighbour-slice service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SliceRecord {
    pub doc_id: String,
    pub segment_id: i64,
    pub raw_text: String,
    #[serde(default)]
    pub doc_name: String,
    #[serde(default)]
    pub doc_md5: String,
    #[serde(default)]
    pub pages: Vec<i64>,
    /// The requested segment this record follows.
    pub anchor_segment_id: i64,
}

// ============================================================================
// Citations
// ============================================================================

/// Where a citation's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrieveSourceType {
    DocLib,
    Faq,
}

/// One slice inside a citation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitationSlice {
    /// Slice uuid.
    pub id: String,
    /// Segment id.
    pub no: i64,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub pages: Vec<i64>,
}

/// User-facing grouping of retained slices belonging to one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub object_id: String,
    pub document: DocumentIdentity,
    /// Slice texts joined with `\n`.
    pub content: String,
    pub retrieve_source_type: RetrieveSourceType,
    pub slices: Vec<CitationSlice>,
}

/// Prompt-ready view of a citation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitationDocument {
    pub document_id: String,
    pub filename: String,
    pub raw_text: String,
}

impl Citation {
    /// Render as a numbered prompt document (`idx` is 1-based).
    pub fn to_document(&self, idx: usize) -> CitationDocument {
        CitationDocument {
            document_id: idx.to_string(),
            filename: self.document.name.clone(),
            raw_text: self.content.clone(),
        }
    }
}

// ============================================================================
// FAQ
// ============================================================================

/// Kind of an FAQ answer fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaqContentKind {
    Text,
    Image,
    #[serde(other)]
    Other,
}

/// One answer fragment of an FAQ entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaqContent {
    #[serde(rename = "type")]
    pub kind: FaqContentKind,
    #[serde(default)]
    pub content: String,
    /// Image descriptions keyed by kind (`image`, `ocr`, ...).
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// One FAQ entry: alias questions plus answer fragments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FaqCandidate {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub content: Vec<FaqContent>,
}

/// A chosen FAQ entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaqAnswer {
    /// Position of the entry in the input list.
    pub index: usize,
    pub meta: FaqCandidate,
    pub score: f64,
}

/// Result of FAQ ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaqRanking {
    pub answers: Vec<FaqAnswer>,
    /// True only when exactly one entry was chosen with confidence.
    pub faq_find_answer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_query_priority() {
        let mut input = QueryInput::new("origin");
        assert_eq!(input.effective(), "origin");

        input.rewrite_query = Some("rewrite".to_string());
        assert_eq!(input.effective(), "rewrite");

        input.augment_query = Some("augment".to_string());
        assert_eq!(input.effective(), "augment");

        input.augment_query = Some("   ".to_string());
        assert_eq!(input.effective(), "rewrite");
    }

    #[test]
    fn test_object_id_is_last_segment() {
        let doc = DocumentIdentity {
            doc_id: "gns://lib/dir/OBJ1".to_string(),
            ..Default::default()
        };
        assert_eq!(doc.object_id(), "OBJ1");

        let bare = DocumentIdentity {
            doc_id: "OBJ2".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.object_id(), "OBJ2");
    }

    #[test]
    fn test_hit_type_serialization() {
        let json = serde_json::to_string(&HitType::OnlyDense).unwrap();
        assert_eq!(json, "\"ONLY_DENSE\"");
    }

    #[test]
    fn test_faq_content_parses_unknown_kind() {
        let content: FaqContent =
            serde_json::from_str(r#"{"type": "video", "content": "x"}"#).unwrap();
        assert_eq!(content.kind, FaqContentKind::Other);
    }

    #[test]
    fn test_citation_to_document() {
        let citation = Citation {
            object_id: "o".to_string(),
            document: DocumentIdentity {
                name: "Guide.pdf".to_string(),
                ..Default::default()
            },
            content: "a\nb".to_string(),
            retrieve_source_type: RetrieveSourceType::DocLib,
            slices: vec![],
        };
        let doc = citation.to_document(2);
        assert_eq!(doc.document_id, "2");
        assert_eq!(doc.filename, "Guide.pdf");
        assert_eq!(doc.raw_text, "a\nb");
    }
}
