//! Citation assembly.
//!
//! Expanded rows are grouped by owning document in first-seen order. Each
//! group becomes one [`Citation`] holding at most `max_slice_per_cite` slices,
//! arranged so runs of adjacent segments read as continuous windows.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::constants::MISSING_SLICE_SCORE;
use crate::types::{Citation, CitationSlice, DocumentIdentity, RankedSlice, RetrieveSourceType};

/// Builds citations from ranked rows.
#[derive(Debug, Clone)]
pub struct SnippetAssembler {
    max_slice_per_cite: usize,
    scoped_doc_id: Option<String>,
}

struct DocumentGroup {
    document: DocumentIdentity,
    slices: Vec<CitationSlice>,
    segments: HashSet<i64>,
}

impl SnippetAssembler {
    pub fn new(max_slice_per_cite: usize) -> Self {
        Self {
            max_slice_per_cite,
            scoped_doc_id: None,
        }
    }

    /// Restrict "this document only" handling to `doc_id`: its slices are
    /// taken in rank order without trimming or reordering.
    pub fn with_scoped_doc_id(mut self, doc_id: Option<String>) -> Self {
        self.scoped_doc_id = doc_id;
        self
    }

    /// Assemble citations from rows in rank order.
    pub fn assemble(&self, rows: &[RankedSlice]) -> Vec<Citation> {
        let groups = group_by_document(rows);
        let citations: Vec<Citation> = groups
            .into_iter()
            .filter_map(|group| self.to_citation(group))
            .collect();
        debug!(
            "snippets: {} rows -> {} citations",
            rows.len(),
            citations.len()
        );
        citations
    }

    fn to_citation(&self, group: DocumentGroup) -> Option<Citation> {
        let DocumentGroup {
            document, slices, ..
        } = group;

        let slices = if self.scoped_doc_id.as_deref() == Some(document.doc_id.as_str()) {
            slices.into_iter().take(self.max_slice_per_cite).collect()
        } else {
            let trimmed = trim_isolated_tail(slices, self.max_slice_per_cite);
            connect_consecutive_numbers(trimmed, self.max_slice_per_cite)
        };

        if slices.is_empty() {
            return None;
        }

        let content = slices
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Some(Citation {
            object_id: document.object_id().to_string(),
            document,
            content,
            retrieve_source_type: RetrieveSourceType::DocLib,
            slices,
        })
    }
}

/// Group rows by `doc_id`, keeping the first slice per segment and the first
/// occurrence of each `(md5, text_hash)` across all groups.
fn group_by_document(rows: &[RankedSlice]) -> Vec<DocumentGroup> {
    let mut groups: Vec<DocumentGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut emitted: HashSet<(&str, &str)> = HashSet::new();

    for row in rows {
        let doc_id = row.slice.document.doc_id.as_str();
        if let Some(&i) = index.get(doc_id) {
            if groups[i].segments.contains(&row.slice.segment_id) {
                continue;
            }
        }
        if !emitted.insert(row.dedup_key()) {
            continue;
        }

        let i = *index.entry(doc_id).or_insert_with(|| {
            groups.push(DocumentGroup {
                document: row.slice.document.clone(),
                slices: Vec::new(),
                segments: HashSet::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[i];
        group.segments.insert(row.slice.segment_id);
        group.slices.push(citation_slice(row));
    }

    groups
}

fn citation_slice(row: &RankedSlice) -> CitationSlice {
    let score = match row.merge_score {
        Some(s) if !s.is_nan() => s,
        _ => MISSING_SLICE_SCORE,
    };
    CitationSlice {
        id: row.slice.uuid.clone(),
        no: row.slice.segment_id,
        content: row.slice.raw_text.clone(),
        score,
        embedding: row.slice.embedding.clone().unwrap_or_default(),
        pages: row.slice.pages.clone(),
    }
}

/// Walk from the tail toward the head removing slices with no adjacent
/// segment left, until the budget is met or the head is reached.
pub(crate) fn trim_isolated_tail(mut slices: Vec<CitationSlice>, max: usize) -> Vec<CitationSlice> {
    let mut i = slices.len();
    while slices.len() > max && i > 0 {
        i -= 1;
        let no = slices[i].no;
        let has_neighbour = slices
            .iter()
            .any(|s| Some(s.no) == no.checked_sub(1) || Some(s.no) == no.checked_add(1));
        if !has_neighbour {
            slices.remove(i);
        }
    }
    slices
}

/// Order slices as runs of consecutive segment numbers.
///
/// Slices are sorted by `no` and cut into runs of consecutive numbers; a run
/// is also cut when the next slice ranks ahead of the run's first slice. Runs
/// are ordered by the rank of their first slice and flattened, stopping at
/// `max` slices.
pub(crate) fn connect_consecutive_numbers(
    slices: Vec<CitationSlice>,
    max: usize,
) -> Vec<CitationSlice> {
    let mut by_no: Vec<usize> = (0..slices.len()).collect();
    by_no.sort_by_key(|&i| slices[i].no);

    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for i in by_no {
        let extends = match (current.first(), current.last()) {
            (Some(&head), Some(&last)) => {
                slices[last].no.checked_add(1) == Some(slices[i].no) && i >= head
            }
            _ => false,
        };
        if !extends && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
        current.push(i);
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs.sort_by_key(|run| run[0]);

    let mut slots: Vec<Option<CitationSlice>> = slices.into_iter().map(Some).collect();
    runs.into_iter()
        .flatten()
        .take(max)
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateSlice;

    fn row(doc: &str, segment_id: i64, text: &str, score: Option<f64>) -> RankedSlice {
        let mut row = RankedSlice::from_candidate(CandidateSlice {
            uuid: format!("{doc}-{segment_id}-{text}"),
            document: DocumentIdentity {
                doc_id: format!("gns://lib/{doc}"),
                name: format!("{doc}.pdf"),
                md5: format!("md5-{doc}"),
                ..Default::default()
            },
            raw_text: text.to_string(),
            segment_id,
            ..Default::default()
        });
        row.merge_score = score;
        row
    }

    fn slice(no: i64) -> CitationSlice {
        CitationSlice {
            id: no.to_string(),
            no,
            content: format!("s{no}"),
            score: 0.0,
            embedding: vec![],
            pages: vec![],
        }
    }

    fn nos(slices: &[CitationSlice]) -> Vec<i64> {
        slices.iter().map(|s| s.no).collect()
    }

    #[test]
    fn test_connect_orders_runs_by_rank_of_head() {
        // Rank order: 7, 3, 8, 4, 10
        let slices = [7, 3, 8, 4, 10].into_iter().map(slice).collect();
        let out = connect_consecutive_numbers(slices, 16);
        assert_eq!(nos(&out), vec![7, 8, 3, 4, 10]);
    }

    #[test]
    fn test_connect_splits_run_when_successor_ranks_ahead() {
        // 5 ranks ahead of 4, so 4 and 5 are separate runs.
        let slices = [5, 4].into_iter().map(slice).collect();
        let out = connect_consecutive_numbers(slices, 16);
        assert_eq!(nos(&out), vec![5, 4]);
    }

    #[test]
    fn test_connect_respects_budget() {
        let slices = [1, 2, 3, 10, 11].into_iter().map(slice).collect();
        let out = connect_consecutive_numbers(slices, 4);
        assert_eq!(nos(&out), vec![1, 2, 3, 10]);
    }

    #[test]
    fn test_trim_removes_isolated_tail_slices_only() {
        // 9 is isolated; 4/5 form a run; 20 is isolated.
        let slices = [4, 9, 5, 20].into_iter().map(slice).collect();
        let out = trim_isolated_tail(slices, 2);
        assert_eq!(nos(&out), vec![4, 5]);
    }

    #[test]
    fn test_trim_stops_at_budget() {
        let slices = [1, 9, 20, 30].into_iter().map(slice).collect();
        let out = trim_isolated_tail(slices, 3);
        assert_eq!(nos(&out), vec![1, 9, 20]);
    }

    #[test]
    fn test_trim_never_breaks_runs() {
        let slices = [1, 2, 3, 4].into_iter().map(slice).collect();
        let out = trim_isolated_tail(slices, 2);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_extreme_segment_ids_have_no_wrapped_neighbours() {
        let slices = [i64::MAX, i64::MIN, 5].into_iter().map(slice).collect();
        let out = trim_isolated_tail(slices, 1);
        assert_eq!(nos(&out), vec![i64::MAX]);

        let slices = [i64::MAX, i64::MIN].into_iter().map(slice).collect();
        let out = connect_consecutive_numbers(slices, 16);
        assert_eq!(nos(&out), vec![i64::MAX, i64::MIN]);
    }

    #[test]
    fn test_assemble_groups_by_document_in_first_seen_order() {
        let rows = vec![
            row("A", 3, "a3", Some(0.9)),
            row("B", 1, "b1", Some(0.8)),
            row("A", 4, "a4", Some(0.7)),
            row("A", 3, "a3 other text", Some(0.6)),
        ];
        let citations = SnippetAssembler::new(16).assemble(&rows);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].document.doc_id, "gns://lib/A");
        assert_eq!(citations[0].object_id, "A");
        assert_eq!(nos(&citations[0].slices), vec![3, 4]);
        assert_eq!(citations[0].content, "a3\na4");
        assert_eq!(citations[0].retrieve_source_type, RetrieveSourceType::DocLib);
        assert_eq!(citations[1].content, "b1");
    }

    #[test]
    fn test_missing_and_nan_scores_become_sentinel() {
        let rows = vec![
            row("A", 1, "a1", None),
            row("A", 2, "a2", Some(f64::NAN)),
            row("A", 3, "a3", Some(0.4)),
        ];
        let citations = SnippetAssembler::new(16).assemble(&rows);
        let scores: Vec<f64> = citations[0].slices.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![MISSING_SLICE_SCORE, MISSING_SLICE_SCORE, 0.4]);
    }

    #[test]
    fn test_budget_holds_per_citation() {
        let rows: Vec<RankedSlice> = (0..40)
            .map(|i| row("A", i * 3, &format!("t{i}"), Some(1.0 - i as f64 / 100.0)))
            .collect();
        for max in [1, 5, 16] {
            let citations = SnippetAssembler::new(max).assemble(&rows);
            assert!(citations.iter().all(|c| c.slices.len() <= max));
        }
    }

    #[test]
    fn test_scoped_document_keeps_rank_order() {
        let rows = vec![
            row("A", 9, "a9", Some(0.9)),
            row("A", 2, "a2", Some(0.8)),
            row("A", 3, "a3", Some(0.7)),
            row("A", 20, "a20", Some(0.6)),
        ];
        let citations = SnippetAssembler::new(3)
            .with_scoped_doc_id(Some("gns://lib/A".to_string()))
            .assemble(&rows);
        assert_eq!(nos(&citations[0].slices), vec![9, 2, 3]);
    }

    #[test]
    fn test_same_text_never_cited_twice() {
        // Same file reachable under two addresses.
        let mut dup = row("B", 7, "shared", Some(0.5));
        dup.slice.document.md5 = "md5-A".to_string();
        let rows = vec![row("A", 1, "shared", Some(0.9)), dup, row("B", 8, "b8", Some(0.4))];

        let citations = SnippetAssembler::new(16).assemble(&rows);
        assert_eq!(citations.len(), 2);
        assert_eq!(nos(&citations[1].slices), vec![8]);
    }

    #[test]
    fn test_empty_rows_give_no_citations() {
        assert!(SnippetAssembler::new(16).assemble(&[]).is_empty());
    }
}
