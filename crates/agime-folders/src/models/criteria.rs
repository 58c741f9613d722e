//! Smart folder criteria expressions
//!
//! A [`CriteriaExpression`] is an immutable value object. The only ways to
//! obtain one are [`CriteriaBuilder::build`] and JSON deserialization, and
//! both run the same validation, so every expression in circulation is
//! well-formed: ranges are ordered and no facet holds blank values.
//!
//! Persisted JSON mirrors the expression field by field (`documentTypes`,
//! `tags`, `authors`, `status`, `dateRange`, `sizeRange`,
//! `contentKeywords`); absent facets are omitted rather than null.

use crate::error::{FolderError, FolderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One named constraint group of a criteria expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    DocumentTypes,
    Tags,
    Authors,
    Status,
    DateRange,
    SizeRange,
    ContentKeywords,
}

impl Facet {
    pub const ALL: [Facet; 7] = [
        Facet::DocumentTypes,
        Facet::Tags,
        Facet::Authors,
        Facet::Status,
        Facet::DateRange,
        Facet::SizeRange,
        Facet::ContentKeywords,
    ];
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Facet::DocumentTypes => "documentTypes",
            Facet::Tags => "tags",
            Facet::Authors => "authors",
            Facet::Status => "status",
            Facet::DateRange => "dateRange",
            Facet::SizeRange => "sizeRange",
            Facet::ContentKeywords => "contentKeywords",
        };
        write!(f, "{}", s)
    }
}

/// Which document timestamp a date range tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateField {
    #[default]
    ModifiedAt,
    CreatedAt,
}

impl DateField {
    fn is_default(&self) -> bool {
        *self == DateField::ModifiedAt
    }
}

/// Inclusive timestamp range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(skip_serializing_if = "DateField::is_default")]
    field: DateField,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, field: DateField) -> FolderResult<Self> {
        if start > end {
            return Err(FolderError::invalid_criteria(format!(
                "dateRange start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end, field })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn field(&self) -> DateField {
        self.field
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Inclusive size range in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeRange {
    min: u64,
    max: u64,
}

impl SizeRange {
    pub fn new(min: u64, max: u64) -> FolderResult<Self> {
        if min > max {
            return Err(FolderError::invalid_criteria(format!(
                "sizeRange min {} is greater than max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn contains(&self, size: u64) -> bool {
        self.min <= size && size <= self.max
    }
}

/// Declarative membership rule of a smart folder.
///
/// Present facets are ANDed. An expression without any present facet matches
/// no document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCriteria")]
pub struct CriteriaExpression {
    #[serde(skip_serializing_if = "Option::is_none")]
    document_types: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authors: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_range: Option<SizeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_keywords: Option<Vec<String>>,
}

impl CriteriaExpression {
    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::new()
    }

    /// Lowercased type labels
    pub fn document_types(&self) -> Option<&BTreeSet<String>> {
        self.document_types.as_ref()
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        self.tags.as_ref()
    }

    pub fn authors(&self) -> Option<&BTreeSet<String>> {
        self.authors.as_ref()
    }

    pub fn status(&self) -> Option<&BTreeSet<String>> {
        self.status.as_ref()
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn size_range(&self) -> Option<&SizeRange> {
        self.size_range.as_ref()
    }

    pub fn content_keywords(&self) -> Option<&[String]> {
        self.content_keywords.as_deref()
    }

    pub fn has_facet(&self, facet: Facet) -> bool {
        match facet {
            Facet::DocumentTypes => self.document_types.is_some(),
            Facet::Tags => self.tags.is_some(),
            Facet::Authors => self.authors.is_some(),
            Facet::Status => self.status.is_some(),
            Facet::DateRange => self.date_range.is_some(),
            Facet::SizeRange => self.size_range.is_some(),
            Facet::ContentKeywords => self.content_keywords.is_some(),
        }
    }

    /// Facets that constrain membership, in declaration order
    pub fn present_facets(&self) -> Vec<Facet> {
        Facet::ALL
            .into_iter()
            .filter(|f| self.has_facet(*f))
            .collect()
    }

    /// True when no facet is present; such an expression matches nothing
    pub fn is_empty(&self) -> bool {
        self.present_facets().is_empty()
    }

    /// Start an edit from the current values
    pub fn to_builder(&self) -> CriteriaBuilder {
        CriteriaBuilder {
            document_types: self.document_types.clone().unwrap_or_default(),
            tags: self.tags.clone().unwrap_or_default(),
            authors: self.authors.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            date_range: self.date_range.map(|r| (r.start, r.end)),
            date_field: self.date_range.map(|r| r.field).unwrap_or_default(),
            size_range: self.size_range.map(|r| (r.min, r.max)),
            content_keywords: self.content_keywords.clone().unwrap_or_default(),
        }
    }
}

/// Incremental builder for [`CriteriaExpression`].
///
/// Values can be added and removed freely; nothing is checked until
/// [`build`](CriteriaBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct CriteriaBuilder {
    document_types: BTreeSet<String>,
    tags: BTreeSet<String>,
    authors: BTreeSet<String>,
    status: BTreeSet<String>,
    date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    date_field: DateField,
    size_range: Option<(u64, u64)>,
    content_keywords: Vec<String>,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_type(mut self, type_label: impl Into<String>) -> Self {
        self.document_types.insert(type_label.into());
        self
    }

    pub fn remove_document_type(mut self, type_label: &str) -> Self {
        self.document_types.remove(type_label);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn remove_tag(mut self, tag: &str) -> Self {
        self.tags.remove(tag);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.insert(author.into());
        self
    }

    pub fn remove_author(mut self, author: &str) -> Self {
        self.authors.remove(author);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status.insert(status.into());
        self
    }

    pub fn remove_status(mut self, status: &str) -> Self {
        self.status.remove(status);
        self
    }

    pub fn date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn date_field(mut self, field: DateField) -> Self {
        self.date_field = field;
        self
    }

    pub fn clear_date_range(mut self) -> Self {
        self.date_range = None;
        self
    }

    /// Bounds are bytes
    pub fn size_range(mut self, min: u64, max: u64) -> Self {
        self.size_range = Some((min, max));
        self
    }

    pub fn clear_size_range(mut self) -> Self {
        self.size_range = None;
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.content_keywords.push(keyword.into());
        self
    }

    pub fn remove_keyword(mut self, keyword: &str) -> Self {
        self.content_keywords.retain(|k| k != keyword);
        self
    }

    /// Validate and freeze.
    ///
    /// Set values are trimmed and type labels lowercased; blank values and
    /// inverted ranges fail with [`FolderError::InvalidCriteria`]. Empty
    /// sets become absent facets.
    pub fn build(self) -> FolderResult<CriteriaExpression> {
        let document_types = normalize_set(Facet::DocumentTypes, self.document_types, true)?;
        let tags = normalize_set(Facet::Tags, self.tags, false)?;
        let authors = normalize_set(Facet::Authors, self.authors, false)?;
        let status = normalize_set(Facet::Status, self.status, false)?;

        let date_range = self
            .date_range
            .map(|(start, end)| DateRange::new(start, end, self.date_field))
            .transpose()?;
        let size_range = self
            .size_range
            .map(|(min, max)| SizeRange::new(min, max))
            .transpose()?;

        let mut keywords: Vec<String> = Vec::with_capacity(self.content_keywords.len());
        for raw in self.content_keywords {
            let keyword = raw.trim();
            if keyword.is_empty() {
                return Err(FolderError::invalid_criteria(
                    "contentKeywords contains a blank keyword",
                ));
            }
            let lowered = keyword.to_lowercase();
            if !keywords.iter().any(|k| k.to_lowercase() == lowered) {
                keywords.push(keyword.to_string());
            }
        }
        let content_keywords = if keywords.is_empty() {
            None
        } else {
            Some(keywords)
        };

        Ok(CriteriaExpression {
            document_types,
            tags,
            authors,
            status,
            date_range,
            size_range,
            content_keywords,
        })
    }
}

fn normalize_set(
    facet: Facet,
    values: BTreeSet<String>,
    lowercase: bool,
) -> FolderResult<Option<BTreeSet<String>>> {
    let mut out = BTreeSet::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FolderError::invalid_criteria(format!(
                "{} contains a blank value",
                facet
            )));
        }
        if lowercase {
            out.insert(trimmed.to_lowercase());
        } else {
            out.insert(trimmed.to_string());
        }
    }
    Ok(if out.is_empty() { None } else { Some(out) })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawDateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    field: DateField,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSizeRange {
    min: u64,
    max: u64,
}

/// Wire form; converted through the builder so JSON input gets the same checks
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawCriteria {
    #[serde(default)]
    document_types: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    authors: Option<Vec<String>>,
    #[serde(default)]
    status: Option<Vec<String>>,
    #[serde(default)]
    date_range: Option<RawDateRange>,
    #[serde(default, alias = "sizeRangeBytes")]
    size_range: Option<RawSizeRange>,
    #[serde(default)]
    content_keywords: Option<Vec<String>>,
}

impl TryFrom<RawCriteria> for CriteriaExpression {
    type Error = FolderError;

    fn try_from(raw: RawCriteria) -> Result<Self, Self::Error> {
        let mut builder = CriteriaBuilder::new();
        builder.document_types.extend(raw.document_types.unwrap_or_default());
        builder.tags.extend(raw.tags.unwrap_or_default());
        builder.authors.extend(raw.authors.unwrap_or_default());
        builder.status.extend(raw.status.unwrap_or_default());
        builder.content_keywords = raw.content_keywords.unwrap_or_default();
        if let Some(range) = raw.date_range {
            builder = builder.date_range(range.start, range.end).date_field(range.field);
        }
        if let Some(range) = raw.size_range {
            builder = builder.size_range(range.min, range.max);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_builder_normalizes() {
        let expr = CriteriaBuilder::new()
            .document_type(" PDF ")
            .document_type("pdf")
            .tag("finance")
            .keyword("Invoice")
            .keyword("invoice")
            .build()
            .unwrap();
        assert_eq!(expr.document_types().unwrap().len(), 1);
        assert!(expr.document_types().unwrap().contains("pdf"));
        assert_eq!(expr.content_keywords().unwrap(), ["Invoice".to_string()]);
        assert_eq!(
            expr.present_facets(),
            vec![Facet::DocumentTypes, Facet::Tags, Facet::ContentKeywords]
        );
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let err = CriteriaBuilder::new().size_range(10, 1).build().unwrap_err();
        assert_eq!(err.code(), "INVALID_CRITERIA");

        let now = Utc::now();
        let err = CriteriaBuilder::new()
            .date_range(now, now - Duration::days(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, FolderError::InvalidCriteria { .. }));
    }

    #[test]
    fn test_blank_values_rejected() {
        assert!(CriteriaBuilder::new().tag("  ").build().is_err());
        assert!(CriteriaBuilder::new().keyword("").build().is_err());
    }

    #[test]
    fn test_incremental_remove() {
        let expr = CriteriaBuilder::new()
            .tag("a")
            .tag("b")
            .remove_tag("a")
            .remove_tag("b")
            .build()
            .unwrap();
        assert!(expr.is_empty());
        assert!(expr.tags().is_none());
    }

    #[test]
    fn test_json_omits_absent_facets() {
        let expr = CriteriaBuilder::new()
            .document_type("pdf")
            .size_range(1024, 10_485_760)
            .build()
            .unwrap();
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "documentTypes": ["pdf"],
                "sizeRange": {"min": 1024, "max": 10485760}
            })
        );
    }

    #[test]
    fn test_json_input_is_validated() {
        let bad: Result<CriteriaExpression, _> =
            serde_json::from_str(r#"{"sizeRange": {"min": 5, "max": 1}}"#);
        assert!(bad.is_err());

        let unknown: Result<CriteriaExpression, _> =
            serde_json::from_str(r#"{"colour": ["red"]}"#);
        assert!(unknown.is_err());

        let ok: CriteriaExpression = serde_json::from_str(
            r#"{"documentTypes": ["DOCX"], "sizeRangeBytes": {"min": 1, "max": 2},
                "dateRange": {"start": "2024-01-01T00:00:00Z", "end": "2024-12-31T00:00:00Z", "field": "createdAt"}}"#,
        )
        .unwrap();
        assert!(ok.document_types().unwrap().contains("docx"));
        assert_eq!(ok.size_range().unwrap().max(), 2);
        assert_eq!(ok.date_range().unwrap().field(), DateField::CreatedAt);
    }

    #[test]
    fn test_to_builder_preserves_values() {
        let expr = CriteriaBuilder::new()
            .author("alice")
            .status("final")
            .size_range(0, 100)
            .build()
            .unwrap();
        let rebuilt = expr.to_builder().build().unwrap();
        assert_eq!(rebuilt, expr);
    }

    #[test]
    fn test_ranges_inclusive() {
        let range = SizeRange::new(10, 20).unwrap();
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));

        let now = Utc::now();
        let dates = DateRange::new(now, now, DateField::ModifiedAt).unwrap();
        assert!(dates.contains(now));
        assert!(!dates.contains(now + Duration::seconds(1)));
    }
}
