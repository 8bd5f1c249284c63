//! Top-K truncation and context expansion.
//!
//! After fusion only the best `rerank_topk` rows are kept. Depending on
//! [`ChooseMethod`] the kept rows are then padded with the slice that follows
//! them in their document, so citations read as continuous text:
//!
//! - `method1`: truncate only.
//! - `method2`: keep a lower-ranked row when it directly follows a kept row.
//! - `method7`: ask the slice index for each kept row's successors.
//!
//! Expansion never reorders or drops the top-K rows. A failed successor
//! lookup leaves them as they are and reports [`ExpansionOutcome::Skipped`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ChooseMethod, ExpansionConfig};
use crate::slice_fetch::NextSliceFetcher;
use crate::types::{CandidateSlice, DocumentIdentity, RankedSlice, SliceRecord};

/// What expansion did beyond truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ExpansionOutcome {
    /// Truncation only (`method1`).
    NotRequested,
    /// Rows were appended after the top-K.
    Expanded { added: usize },
    /// Expansion ran but found nothing new to add.
    NoSuccessors,
    /// The successor lookup failed; the top-K rows are returned unchanged.
    Skipped { reason: String },
}

/// Rows after expansion plus what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Top-K rows in rank order, followed by appended rows.
    pub rows: Vec<RankedSlice>,
    pub outcome: ExpansionOutcome,
}

/// Truncate `rows` to the top-K and expand per `config.choose_method`.
pub async fn expand(
    rows: Vec<RankedSlice>,
    config: &ExpansionConfig,
    fetcher: &dyn NextSliceFetcher,
) -> Expansion {
    let topk = config.rerank_topk;
    let expansion = match config.choose_method {
        ChooseMethod::Method1 => truncate(rows, topk),
        ChooseMethod::Method2 => ranked_neighbours(rows, topk),
        ChooseMethod::Method7 => fetch_successors(rows, topk, fetcher).await,
    };
    debug!(
        "expansion {}: {} rows, {:?}",
        config.choose_method,
        expansion.rows.len(),
        expansion.outcome
    );
    expansion
}

fn truncate(mut rows: Vec<RankedSlice>, topk: usize) -> Expansion {
    rows.truncate(topk);
    Expansion {
        rows,
        outcome: ExpansionOutcome::NotRequested,
    }
}

/// `method2`: rows past the top-K survive only when `(md5, segment_id - 1)`
/// belongs to a top-K row.
///
/// The kept set is scoped per document: segment ids only match within the same `md5`.
fn ranked_neighbours(rows: Vec<RankedSlice>, topk: usize) -> Expansion {
    let kept: HashSet<(&str, i64)> = rows
        .iter()
        .take(topk)
        .map(RankedSlice::position_key)
        .collect();

    let keep: Vec<bool> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if i < topk {
                return true;
            }
            let (md5, segment_id) = row.position_key();
            segment_id
                .checked_sub(1)
                .is_some_and(|prev| kept.contains(&(md5, prev)))
        })
        .collect();
    let added = keep.iter().skip(topk).filter(|&&k| k).count();

    let rows: Vec<RankedSlice> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, k)| k.then_some(row))
        .collect();

    Expansion {
        rows,
        outcome: outcome_for(added),
    }
}

/// `method7`: truncate, then append the successors returned by the fetcher.
async fn fetch_successors(
    rows: Vec<RankedSlice>,
    topk: usize,
    fetcher: &dyn NextSliceFetcher,
) -> Expansion {
    let mut rows = rows;
    rows.truncate(topk);
    if rows.is_empty() {
        return Expansion {
            rows,
            outcome: ExpansionOutcome::NoSuccessors,
        };
    }

    let doc_ids: Vec<String> = rows.iter().map(|r| r.slice.document.doc_id.clone()).collect();
    let segment_ids: Vec<i64> = rows.iter().map(|r| r.slice.segment_id).collect();

    let records = match fetcher.fetch_next_slice(&doc_ids, &segment_ids).await {
        Ok(records) => records,
        Err(e) => {
            warn!("Successor lookup failed, keeping top-{} rows: {}", topk, e);
            return Expansion {
                rows,
                outcome: ExpansionOutcome::Skipped {
                    reason: e.to_string(),
                },
            };
        }
    };

    let added = append_successors(&mut rows, records);
    Expansion {
        rows,
        outcome: outcome_for(added),
    }
}

/// Append successor records not already present; returns how many were added.
pub(crate) fn append_successors(rows: &mut Vec<RankedSlice>, records: Vec<SliceRecord>) -> usize {
    let identities: HashMap<String, DocumentIdentity> = rows
        .iter()
        .map(|r| (r.slice.document.doc_id.clone(), r.slice.document.clone()))
        .collect();
    let mut seen_text: HashSet<(String, String)> = rows
        .iter()
        .map(|r| (r.slice.document.md5.clone(), r.text_hash.clone()))
        .collect();
    let mut seen_position: HashSet<(String, i64)> = rows
        .iter()
        .map(|r| (r.slice.document.md5.clone(), r.slice.segment_id))
        .collect();

    let mut added = 0;
    for record in records {
        let row = successor_row(record, &identities);
        let text_key = (row.slice.document.md5.clone(), row.text_hash.clone());
        let position_key = (row.slice.document.md5.clone(), row.slice.segment_id);
        if seen_text.contains(&text_key) || seen_position.contains(&position_key) {
            continue;
        }
        seen_text.insert(text_key);
        seen_position.insert(position_key);
        rows.push(row);
        added += 1;
    }
    added
}

fn successor_row(record: SliceRecord, identities: &HashMap<String, DocumentIdentity>) -> RankedSlice {
    let document = identities
        .get(&record.doc_id)
        .cloned()
        .unwrap_or_else(|| DocumentIdentity {
            doc_id: record.doc_id.clone(),
            name: record.doc_name.clone(),
            md5: record.doc_md5.clone(),
            ..Default::default()
        });

    let mut row = RankedSlice::from_candidate(CandidateSlice {
        uuid: Uuid::new_v4().to_string(),
        document,
        raw_text: record.raw_text,
        segment_id: record.segment_id,
        pages: record.pages,
        embedding: None,
        score: 0.0,
    });
    row.anchor_segment_id = Some(record.anchor_segment_id);
    row
}

fn outcome_for(added: usize) -> ExpansionOutcome {
    if added == 0 {
        ExpansionOutcome::NoSuccessors
    } else {
        ExpansionOutcome::Expanded { added }
    }
}
