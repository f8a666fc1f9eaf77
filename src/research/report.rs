//! Research report model
//!
//! A [`ResearchReport`] is produced once per job by the synthesis agent. Its
//! citations, sources table and coverage notes are derived deterministically
//! from retrieval output, so they never depend on what the LLM chose to mention.

use crate::jobs::ComponentError;
use crate::retrieval::{CaseExcerpt, RetrievalComponent, WebDocument};
use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

const SOURCE_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(AppError::InvalidRequest(format!(
                "Unsupported report format '{}' (expected markdown or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Markdown => f.write_str("markdown"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportLength {
    Brief,
    Standard,
    #[default]
    Comprehensive,
}

impl ReportLength {
    /// Target page range handed to the synthesis prompt
    pub fn page_guidance(&self) -> &'static str {
        match self {
            ReportLength::Brief => "5-7",
            ReportLength::Standard => "10-15",
            ReportLength::Comprehensive => "20-30",
        }
    }

    pub fn detail_level(&self) -> &'static str {
        match self {
            ReportLength::Brief => "concise overview of key points",
            ReportLength::Standard => "balanced analysis with moderate detail",
            ReportLength::Comprehensive => {
                "in-depth analysis with thorough examination of legal principles"
            }
        }
    }
}

impl FromStr for ReportLength {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(ReportLength::Brief),
            "standard" => Ok(ReportLength::Standard),
            "comprehensive" => Ok(ReportLength::Comprehensive),
            other => Err(AppError::InvalidRequest(format!(
                "Unsupported report length '{}' (expected brief, standard or comprehensive)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLength::Brief => f.write_str("brief"),
            ReportLength::Standard => f.write_str("standard"),
            ReportLength::Comprehensive => f.write_str("comprehensive"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportOptions {
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default)]
    pub length: ReportLength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Citation {
    pub component: RetrievalComponent,
    /// `Case, Citation (Year)` for case law, the page title for web documents
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One row of the report's sources table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEntry {
    CaseLaw {
        case_name: String,
        citation: Option<String>,
        year: Option<i32>,
        source: Option<String>,
        excerpt: String,
        score: f32,
    },
    Web {
        title: String,
        url: String,
        snippet: String,
        score: f32,
        published_date: Option<String>,
    },
}

/// Statement that a requested component contributed nothing to the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CoverageNote {
    pub component: RetrievalComponent,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResearchReport {
    pub title: String,
    pub query: String,
    pub options: ReportOptions,
    pub sections: Vec<ReportSection>,
    pub citations: Vec<Citation>,
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub coverage_notes: Vec<CoverageNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ResearchReport {
    /// Render the report as a single markdown document.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);

        if !self.coverage_notes.is_empty() {
            out.push_str("> **Coverage notes**\n");
            for note in &self.coverage_notes {
                out.push_str(&format!("> - {}\n", note.message));
            }
            out.push('\n');
        }

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n{}\n\n", section.heading, section.body.trim()));
        }

        if !self.citations.is_empty() {
            out.push_str("## Citations\n\n");
            for (i, citation) in self.citations.iter().enumerate() {
                match &citation.url {
                    Some(url) => out.push_str(&format!("{}. {} <{}>\n", i + 1, citation.text, url)),
                    None => out.push_str(&format!("{}. {}\n", i + 1, citation.text)),
                }
            }
        }

        out.trim_end().to_string() + "\n"
    }

    pub fn case_citation_count(&self) -> usize {
        self.citations
            .iter()
            .filter(|c| c.component == RetrievalComponent::CaseLaw)
            .count()
    }

    pub fn web_citation_count(&self) -> usize {
        self.citations
            .iter()
            .filter(|c| c.component == RetrievalComponent::Web)
            .count()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    crate::retrieval::web::truncate_snippet(text, max_chars)
}

/// Citations in retrieval order: cases first, then web documents, without duplicates.
pub fn build_citations(case_law: &[CaseExcerpt], web: &[WebDocument]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for excerpt in case_law {
        let text = excerpt.citation.formatted();
        if seen.insert(text.clone()) {
            citations.push(Citation {
                component: RetrievalComponent::CaseLaw,
                text,
                url: None,
            });
        }
    }

    for doc in web {
        if seen.insert(doc.url.clone()) {
            let text = if doc.title.trim().is_empty() {
                doc.url.clone()
            } else {
                doc.title.clone()
            };
            citations.push(Citation {
                component: RetrievalComponent::Web,
                text,
                url: Some(doc.url.clone()),
            });
        }
    }

    citations
}

pub fn build_sources(case_law: &[CaseExcerpt], web: &[WebDocument]) -> Vec<SourceEntry> {
    let cases = case_law.iter().map(|e| SourceEntry::CaseLaw {
        case_name: e
            .citation
            .case_name
            .clone()
            .unwrap_or_else(|| "Unknown case".to_string()),
        citation: e.citation.citation.clone(),
        year: e.citation.year,
        source: e.citation.source.clone(),
        excerpt: truncate_chars(&e.excerpt, SOURCE_EXCERPT_CHARS),
        score: e.score,
    });

    let docs = web.iter().map(|d| SourceEntry::Web {
        title: d.title.clone(),
        url: d.url.clone(),
        snippet: d.snippet.clone(),
        score: d.score,
        published_date: d.published_date.clone(),
    });

    cases.chain(docs).collect()
}

/// Notes for every requested component that contributed nothing.
///
/// A component is uncovered when it has no result (failed or timed out) or
/// when it succeeded with zero hits.
pub fn coverage_notes(
    requested: &[RetrievalComponent],
    case_law: Option<&[CaseExcerpt]>,
    web: Option<&[WebDocument]>,
    errors: &[ComponentError],
) -> Vec<CoverageNote> {
    requested
        .iter()
        .filter_map(|&component| {
            let hits = match component {
                RetrievalComponent::CaseLaw => case_law.map(|r| r.len()),
                RetrievalComponent::Web => web.map(|r| r.len()),
            };
            let message = match hits {
                Some(0) => format!("{} returned no results for this query.", component.label()),
                Some(_) => return None,
                None => match errors.iter().find(|e| e.component == component) {
                    Some(error) => format!(
                        "{} results are missing from this report: {}.",
                        component.label(),
                        error.describe()
                    ),
                    None => format!(
                        "{} results are missing from this report.",
                        component.label()
                    ),
                },
            };
            Some(CoverageNote { component, message })
        })
        .collect()
}
