//! FAQ ranking.
//!
//! Picks either one confident FAQ entry or a short fallback list:
//!
//! 1. Each alias title is scored as the mean of its reranker score and a
//!    character-overlap score against the query.
//! 2. Title scores are summed per entry and an IQR outlier test looks for
//!    entries that clearly stand out.
//! 3. An exact title match wins outright.
//! 4. Without a confident entry, titles and answer texts are reranked together
//!    and the best distinct entries are returned.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::config::FaqConfig;
use crate::constants::{
    FAQ_EXACT_MATCH_SCORE, FAQ_MIN_CANDIDATES_FOR_IQR, FAQ_MIN_IMAGE_DETAIL_CHARS,
    FAQ_NO_MATCH_SCORE, FAQ_OVERLAP_SCALE, FAQ_OVERLAP_THRESHOLD, FAQ_SMALL_POOL_MIN_SCORE,
};
use crate::errors::RankError;
use crate::reranker::{score_checked, RerankerBackend};
use crate::types::{FaqAnswer, FaqCandidate, FaqContentKind, FaqRanking, QueryInput};

/// Texts tagged with the index of the entry they came from.
#[derive(Debug, Default)]
struct TaggedTexts {
    texts: Vec<String>,
    owners: Vec<usize>,
}

impl TaggedTexts {
    fn push(&mut self, owner: usize, text: impl Into<String>) {
        self.texts.push(text.into());
        self.owners.push(owner);
    }
}

/// Ranks FAQ entries against a query.
pub struct FaqRanker<'a> {
    reranker: &'a dyn RerankerBackend,
    config: FaqConfig,
}

impl<'a> FaqRanker<'a> {
    pub fn new(reranker: &'a dyn RerankerBackend, config: FaqConfig) -> Self {
        Self { reranker, config }
    }

    /// Rank `candidates` against the effective query of `input`.
    ///
    /// # Errors
    ///
    /// Returns the reranker's error if either rerank call fails.
    pub async fn rank(
        &self,
        input: &QueryInput,
        candidates: &[FaqCandidate],
    ) -> Result<FaqRanking, RankError> {
        let query = input.effective();
        let (questions, questions_answers) = flatten(candidates);

        let rerank = score_checked(self.reranker, query, &questions.texts).await?;
        let lexical = lexical_scores(&questions.texts, query);
        let combined: Vec<f64> = rerank
            .iter()
            .zip(&lexical)
            .map(|(&r, &l)| (f64::from(r) + l) / 2.0)
            .collect();

        let mut per_entry: BTreeMap<usize, f64> = BTreeMap::new();
        for (&owner, &score) in questions.owners.iter().zip(&combined) {
            *per_entry.entry(owner).or_insert(0.0) += score;
        }
        let aggregates: Vec<(usize, f64)> = per_entry.into_iter().collect();
        let aggregate_scores: Vec<f64> = aggregates.iter().map(|(_, s)| *s).collect();

        // Positions into `questions` of the chosen titles.
        let chosen: Vec<usize> =
            match lexical.iter().position(|&s| s == FAQ_EXACT_MATCH_SCORE) {
                Some(title) => {
                    debug!("faq: exact title match at {}", title);
                    vec![title]
                }
                None => confident_indices(&aggregate_scores, self.config.outlier_multiplier)
                    .into_iter()
                    .filter_map(|p| {
                        let entry = aggregates[p].0;
                        questions.owners.iter().position(|&o| o == entry)
                    })
                    .collect(),
            };

        if !chosen.is_empty() {
            let mut added = HashSet::new();
            let mut answers = Vec::new();
            for &title in &chosen {
                let entry = questions.owners[title];
                if added.insert(entry) {
                    answers.push(FaqAnswer {
                        index: entry,
                        meta: candidates[entry].clone(),
                        score: combined[title],
                    });
                }
            }
            info!("faq: {} confident answer(s)", answers.len());
            return Ok(FaqRanking {
                answers,
                faq_find_answer: chosen.len() == 1,
            });
        }

        let answers = self.fallback(query, candidates, &questions_answers).await?;
        info!("faq: no confident answer, {} fallback candidates", answers.len());
        Ok(FaqRanking {
            answers,
            faq_find_answer: false,
        })
    }

    /// Rerank titles and answers together; keep the best distinct entries.
    async fn fallback(
        &self,
        query: &str,
        candidates: &[FaqCandidate],
        questions_answers: &TaggedTexts,
    ) -> Result<Vec<FaqAnswer>, RankError> {
        if self.config.fallback_limit == 0 {
            return Ok(Vec::new());
        }

        let scores = score_checked(self.reranker, query, &questions_answers.texts).await?;
        let mut pairs: Vec<(usize, f64)> = questions_answers
            .owners
            .iter()
            .copied()
            .zip(scores.into_iter().map(f64::from))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut added = HashSet::new();
        let mut answers = Vec::new();
        for (entry, score) in pairs {
            if answers.len() >= self.config.fallback_limit {
                break;
            }
            if added.insert(entry) {
                answers.push(FaqAnswer {
                    index: entry,
                    meta: candidates[entry].clone(),
                    score,
                });
            }
        }
        Ok(answers)
    }
}

/// Build the title list and the title-plus-answer list.
fn flatten(candidates: &[FaqCandidate]) -> (TaggedTexts, TaggedTexts) {
    let mut questions = TaggedTexts::default();
    let mut questions_answers = TaggedTexts::default();

    for (index, candidate) in candidates.iter().enumerate() {
        for title in &candidate.title {
            questions.push(index, title.as_str());
            questions_answers.push(index, title.as_str());
        }

        for fragment in &candidate.content {
            match fragment.kind {
                FaqContentKind::Text => questions_answers.push(index, fragment.content.as_str()),
                FaqContentKind::Image => {
                    for (kind, detail) in &fragment.details {
                        if !skip_image_detail(kind, detail, &candidate.title) {
                            questions_answers.push(index, detail.as_str());
                        }
                    }
                }
                FaqContentKind::Other => {}
            }
        }
    }

    (questions, questions_answers)
}

/// Image details that are too short, or an `image` caption repeating a title.
fn skip_image_detail(kind: &str, detail: &str, titles: &[String]) -> bool {
    let detail = detail.trim();
    if detail.chars().count() <= FAQ_MIN_IMAGE_DETAIL_CHARS {
        return true;
    }
    kind == "image" && titles.iter().any(|t| t.trim() == detail)
}

fn normalize_for_match(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "")
}

/// Character-overlap score of each title against the query.
///
/// An exact match (ignoring case and spaces) scores 100. Otherwise the share
/// of the query's distinct characters found in the title is rescaled to
/// `(ratio - 0.8) * 5` from 0.8 up, and scores -1 below.
pub fn lexical_scores(titles: &[String], query: &str) -> Vec<f64> {
    let query_chars: HashSet<char> = query.chars().collect();
    let query_norm = normalize_for_match(query);

    titles
        .iter()
        .map(|title| {
            if normalize_for_match(title) == query_norm {
                return FAQ_EXACT_MATCH_SCORE;
            }
            let title_chars: HashSet<char> = title.chars().collect();
            let ratio = if query_chars.is_empty() {
                0.0
            } else {
                title_chars.intersection(&query_chars).count() as f64 / query_chars.len() as f64
            };
            if ratio >= FAQ_OVERLAP_THRESHOLD {
                (ratio - FAQ_OVERLAP_THRESHOLD) * FAQ_OVERLAP_SCALE
            } else {
                FAQ_NO_MATCH_SCORE
            }
        })
        .collect()
}

/// Positions of scores that stand out, by an IQR outlier test.
///
/// With fewer than five scores, the first maximum is returned when it reaches
/// 3, and nothing otherwise. With five or more, scores at or above
/// `Q3 + multiplier * IQR` are returned; when the IQR is zero only scores
/// strictly above the bound count.
pub fn confident_indices(scores: &[f64], multiplier: f64) -> Vec<usize> {
    if scores.is_empty() {
        return Vec::new();
    }

    if scores.len() < FAQ_MIN_CANDIDATES_FOR_IQR {
        let mut best = 0;
        for (i, &s) in scores.iter().enumerate() {
            if s > scores[best] {
                best = i;
            }
        }
        return if scores[best] >= FAQ_SMALL_POOL_MIN_SCORE {
            vec![best]
        } else {
            Vec::new()
        };
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    let upper = q3 + multiplier * iqr;

    scores
        .iter()
        .enumerate()
        .filter(|&(_, &s)| if iqr > 0.0 { s >= upper } else { s > upper })
        .map(|(i, _)| i)
        .collect()
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::tests::{FailingRerankerBackend, MockRerankerBackend};
    use crate::types::FaqContent;

    fn candidate(titles: &[&str], answers: &[&str]) -> FaqCandidate {
        FaqCandidate {
            title: titles.iter().map(|t| t.to_string()).collect(),
            content: answers
                .iter()
                .map(|a| FaqContent {
                    kind: FaqContentKind::Text,
                    content: a.to_string(),
                    details: BTreeMap::new(),
                })
                .collect(),
        }
    }

    fn ranker(reranker: &dyn RerankerBackend) -> FaqRanker<'_> {
        FaqRanker::new(reranker, FaqConfig::default())
    }

    #[test]
    fn test_outlier_flags_single_spike() {
        assert_eq!(confident_indices(&[1.0, 1.0, 1.0, 1.0, 1.0, 10.0], 0.5), vec![5]);
    }

    #[test]
    fn test_outlier_with_spread_uses_inclusive_bound() {
        // Q1 = 2.75, Q3 = 6.25, upper = 8.0.
        let scores = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(confident_indices(&scores, 0.5), vec![7]);
    }

    #[test]
    fn test_flat_scores_have_no_outlier() {
        assert!(confident_indices(&[2.0; 6], 0.5).is_empty());
    }

    #[test]
    fn test_small_pool_threshold() {
        assert!(confident_indices(&[1.0, 2.9], 0.5).is_empty());
        assert_eq!(confident_indices(&[3.0, 1.0, 3.0], 0.5), vec![0]);
        assert!(confident_indices(&[], 0.5).is_empty());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0];
        assert_eq!(percentile(&sorted, 0.25), 2.5);
        assert_eq!(percentile(&sorted, 0.75), 7.5);
    }

    #[test]
    fn test_lexical_scores() {
        let titles = vec![
            "  Reset Password ".to_string(),
            "reset passwords please".to_string(),
            "unrelated".to_string(),
        ];
        let scores = lexical_scores(&titles, "reset password");
        assert_eq!(scores[0], FAQ_EXACT_MATCH_SCORE);
        // Every query character appears: (1.0 - 0.8) * 5.
        assert!((scores[1] - 1.0).abs() < 1e-9);
        assert_eq!(scores[2], FAQ_NO_MATCH_SCORE);
    }

    #[test]
    fn test_image_details_filtered() {
        let mut details = BTreeMap::new();
        details.insert("image".to_string(), "Reset password".to_string());
        details.insert("ocr".to_string(), "ok".to_string());
        details.insert("caption".to_string(), "Settings screen".to_string());
        let faq = FaqCandidate {
            title: vec!["Reset password".to_string()],
            content: vec![FaqContent {
                kind: FaqContentKind::Image,
                content: String::new(),
                details,
            }],
        };

        let (questions, questions_answers) = flatten(&[faq]);
        assert_eq!(questions.texts, vec!["Reset password"]);
        assert_eq!(questions_answers.texts, vec!["Reset password", "Settings screen"]);
        assert_eq!(questions_answers.owners, vec![0, 0]);
    }

    #[tokio::test]
    async fn test_exact_match_wins() {
        let candidates = vec![
            candidate(&["Install guide"], &["Run the installer"]),
            candidate(&["alias", "How to reset password"], &["Open settings"]),
        ];
        let ranking = ranker(&MockRerankerBackend)
            .rank(&QueryInput::new("how to reset password"), &candidates)
            .await
            .unwrap();

        assert!(ranking.faq_find_answer);
        assert_eq!(ranking.answers.len(), 1);
        assert_eq!(ranking.answers[0].index, 1);
        // Reranker overlap 4, lexical 100.
        assert_eq!(ranking.answers[0].score, 52.0);
    }

    #[tokio::test]
    async fn test_outlier_entry_is_confident() {
        let candidates = vec![
            candidate(&["reset password now"], &[]),
            candidate(&["qqq"], &[]),
            candidate(&["zzz"], &[]),
            candidate(&["kkk"], &[]),
            candidate(&["yyy"], &[]),
        ];
        let ranking = ranker(&MockRerankerBackend)
            .rank(&QueryInput::new("reset password"), &candidates)
            .await
            .unwrap();

        assert!(ranking.faq_find_answer);
        assert_eq!(ranking.answers.len(), 1);
        assert_eq!(ranking.answers[0].index, 0);
        // (2 + 1.0) / 2
        assert!((ranking.answers[0].score - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_returns_distinct_entries_by_answer_score() {
        let candidates = vec![
            candidate(&["VPN access"], &["Use the client"]),
            candidate(&["Holiday calendar"], &["printer drivers are on the share"]),
            candidate(&["Mail quota"], &["Restart the printer spooler", "printer again"]),
        ];
        let input = QueryInput {
            origin_query: "ignored".to_string(),
            rewrite_query: Some("printer".to_string()),
            augment_query: None,
        };
        let ranking = ranker(&MockRerankerBackend).rank(&input, &candidates).await.unwrap();

        assert!(!ranking.faq_find_answer);
        let indices: Vec<usize> = ranking.answers.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![1, 2, 0]);
        let scores: Vec<f64> = ranking.answers.iter().map(|a| a.score).collect();
        assert_eq!(scores, vec![1.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_fallback_limit_caps_answers() {
        let candidates: Vec<FaqCandidate> = (0..8)
            .map(|i| candidate(&[format!("zz{i}").as_str()], &["printer"]))
            .collect();
        let ranking = ranker(&MockRerankerBackend)
            .rank(&QueryInput::new("printer"), &candidates)
            .await
            .unwrap();
        assert_eq!(ranking.answers.len(), 5);
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let ranking = ranker(&FailingRerankerBackend)
            .rank(&QueryInput::new("anything"), &[])
            .await
            .unwrap();
        assert!(ranking.answers.is_empty());
        assert!(!ranking.faq_find_answer);
    }

    #[tokio::test]
    async fn test_reranker_failure_propagates() {
        let candidates = vec![candidate(&["a"], &[])];
        assert!(ranker(&FailingRerankerBackend)
            .rank(&QueryInput::new("a"), &candidates)
            .await
            .is_err());
    }
}
