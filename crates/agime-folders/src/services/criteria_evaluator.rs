//! Smart folder criteria evaluation
//!
//! Per-facet rules:
//! - `documentTypes`, `status`, `authors`: the document's value is in the set
//! - `tags`: the document's tags intersect the set
//! - `dateRange`, `sizeRange`: inclusive bounds
//! - `contentKeywords`: case-insensitive substring match of any keyword;
//!   documents without extracted content fail the facet
//!
//! Present facets are ANDed; an expression with no present facet matches
//! nothing.

use crate::config::FolderConfig;
use crate::models::{CriteriaExpression, DateField, DocumentDescriptor, Facet};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Preview of an evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub matched_count: usize,
    /// First matches in collection order, bounded by the sample size
    pub sample_document_ids: Vec<String>,
    /// How many documents each present facet alone would admit
    pub per_facet_contribution: BTreeMap<Facet, usize>,
    pub evaluated_count: usize,
}

/// Full evaluation output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matched_ids: Vec<String>,
    pub summary: MatchSummary,
}

/// Expression with its keywords lowercased once per evaluation
struct PreparedCriteria<'a> {
    expr: &'a CriteriaExpression,
    facets: Vec<Facet>,
    keywords: Vec<String>,
}

impl<'a> PreparedCriteria<'a> {
    fn new(expr: &'a CriteriaExpression) -> Self {
        Self {
            expr,
            facets: expr.present_facets(),
            keywords: expr
                .content_keywords()
                .map(|ks| ks.iter().map(|k| k.to_lowercase()).collect())
                .unwrap_or_default(),
        }
    }

    fn facet_matches(&self, facet: Facet, doc: &DocumentDescriptor) -> bool {
        let expr = self.expr;
        match facet {
            Facet::DocumentTypes => expr
                .document_types()
                .is_some_and(|types| types.contains(&doc.normalized_type())),
            Facet::Tags => expr
                .tags()
                .is_some_and(|tags| doc.tags.iter().any(|t| tags.contains(t))),
            Facet::Authors => match (expr.authors(), doc.author.as_ref()) {
                (Some(authors), Some(author)) => authors.contains(author),
                _ => false,
            },
            Facet::Status => match (expr.status(), doc.status.as_ref()) {
                (Some(status), Some(value)) => status.contains(value),
                _ => false,
            },
            Facet::DateRange => expr.date_range().is_some_and(|range| {
                let at = match range.field() {
                    DateField::ModifiedAt => doc.modified_at,
                    DateField::CreatedAt => doc.created_at,
                };
                range.contains(at)
            }),
            Facet::SizeRange => expr
                .size_range()
                .is_some_and(|range| range.contains(doc.size_bytes)),
            Facet::ContentKeywords => match &doc.content {
                Some(content) if !self.keywords.is_empty() => {
                    let content = content.to_lowercase();
                    self.keywords.iter().any(|k| content.contains(k.as_str()))
                }
                _ => false,
            },
        }
    }
}

/// Running totals while walking a document collection
struct Accumulator<'a> {
    prepared: PreparedCriteria<'a>,
    sample_size: usize,
    result: MatchResult,
}

impl<'a> Accumulator<'a> {
    fn new(expr: &'a CriteriaExpression, sample_size: usize) -> Self {
        let prepared = PreparedCriteria::new(expr);
        let per_facet_contribution = prepared.facets.iter().map(|f| (*f, 0)).collect();
        Self {
            prepared,
            sample_size,
            result: MatchResult {
                matched_ids: Vec::new(),
                summary: MatchSummary {
                    per_facet_contribution,
                    ..Default::default()
                },
            },
        }
    }

    fn push(&mut self, doc: &DocumentDescriptor) {
        self.result.summary.evaluated_count += 1;
        if self.prepared.facets.is_empty() {
            return;
        }
        let mut all = true;
        for facet in &self.prepared.facets {
            if self.prepared.facet_matches(*facet, doc) {
                if let Some(count) = self.result.summary.per_facet_contribution.get_mut(facet) {
                    *count += 1;
                }
            } else {
                all = false;
            }
        }
        if all {
            self.result.matched_ids.push(doc.id.clone());
            if self.result.summary.sample_document_ids.len() < self.sample_size {
                self.result.summary.sample_document_ids.push(doc.id.clone());
            }
        }
    }

    fn finish(mut self) -> MatchResult {
        self.result.summary.matched_count = self.result.matched_ids.len();
        self.result
    }
}

/// Evaluates criteria expressions against document collections
#[derive(Debug, Clone, Copy)]
pub struct CriteriaEvaluator {
    sample_size: usize,
    chunk_size: usize,
}

impl Default for CriteriaEvaluator {
    fn default() -> Self {
        Self::from_config(&FolderConfig::default())
    }
}

impl CriteriaEvaluator {
    pub fn new(sample_size: usize, chunk_size: usize) -> Self {
        Self {
            sample_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(config: &FolderConfig) -> Self {
        Self::new(config.sample_size, config.evaluation_chunk_size)
    }

    /// Whether one document satisfies every present facet
    pub fn matches(expr: &CriteriaExpression, doc: &DocumentDescriptor) -> bool {
        let prepared = PreparedCriteria::new(expr);
        !prepared.facets.is_empty()
            && prepared
                .facets
                .iter()
                .all(|f| prepared.facet_matches(*f, doc))
    }

    pub fn evaluate(&self, expr: &CriteriaExpression, docs: &[DocumentDescriptor]) -> MatchResult {
        let mut acc = Accumulator::new(expr, self.sample_size);
        for doc in docs {
            acc.push(doc);
        }
        acc.finish()
    }

    /// Evaluate in chunks, yielding to the runtime between them.
    ///
    /// Returns `None` as soon as `cancel` fires; a cancelled evaluation never
    /// produces a partial result.
    pub async fn evaluate_cancellable(
        &self,
        expr: &CriteriaExpression,
        docs: &[DocumentDescriptor],
        cancel: &CancellationToken,
    ) -> Option<MatchResult> {
        let mut acc = Accumulator::new(expr, self.sample_size);
        for chunk in docs.chunks(self.chunk_size) {
            if cancel.is_cancelled() {
                return None;
            }
            for doc in chunk {
                acc.push(doc);
            }
            tokio::task::yield_now().await;
        }
        if cancel.is_cancelled() {
            return None;
        }
        Some(acc.finish())
    }
}
