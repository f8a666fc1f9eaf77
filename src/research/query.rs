//! Query validation and advisories.

use crate::types::{AppError, Result};

pub const MAX_QUERY_CHARS: usize = 4000;
const SHORT_QUERY_CHARS: usize = 10;

const LEGAL_TERMS: &[&str] = &[
    "law",
    "case",
    "statute",
    "regulation",
    "court",
    "decision",
    "plaintiff",
    "defendant",
    "appeal",
    "tort",
    "contract",
    "property",
    "liability",
    "rights",
    "judge",
    "jury",
    "verdict",
];

/// Trim and check a query, returning the text to store on the job.
pub fn validate_query(query: &str) -> Result<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(
            "Query must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::InvalidRequest(format!(
            "Query exceeds {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Produces non-blocking suggestions for improving a query.
#[derive(Debug, Clone)]
pub struct QueryAdvisor {
    legal_terms: Vec<String>,
    jurisdiction_keywords: Vec<String>,
    jurisdiction_name: String,
}

impl Default for QueryAdvisor {
    fn default() -> Self {
        Self::new(
            "Massachusetts",
            vec!["massachusetts".to_string(), "mass".to_string()],
        )
    }
}

impl QueryAdvisor {
    pub fn new(jurisdiction_name: impl Into<String>, jurisdiction_keywords: Vec<String>) -> Self {
        Self {
            legal_terms: LEGAL_TERMS.iter().map(|t| t.to_string()).collect(),
            jurisdiction_keywords: jurisdiction_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            jurisdiction_name: jurisdiction_name.into(),
        }
    }

    pub fn advise(&self, query: &str) -> Vec<String> {
        let lowered = query.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |term: &str| {
            words
                .iter()
                .any(|w| *w == term || w.strip_suffix('s') == Some(term))
        };

        let mut advisories = Vec::new();

        if query.trim().chars().count() < SHORT_QUERY_CHARS {
            advisories.push("Query is very short; add facts or legal issues to focus the search".to_string());
        }

        if !self.legal_terms.iter().any(|t| mentions(t)) {
            advisories.push(
                "Consider adding specific legal terminology to focus your search".to_string(),
            );
        }

        if !self.jurisdiction_keywords.is_empty()
            && !self.jurisdiction_keywords.iter().any(|k| mentions(k))
        {
            advisories.push(format!(
                "Consider explicitly mentioning {} to focus on the relevant jurisdiction",
                self.jurisdiction_name
            ));
        }

        advisories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query_trims() {
        assert_eq!(validate_query("  rent escrow  ").unwrap(), "rent escrow");
    }

    #[test]
    fn test_validate_query_rejects_blank_and_oversized() {
        assert!(matches!(
            validate_query(" \n\t "),
            Err(AppError::InvalidRequest(_))
        ));
        let huge = "a".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(
            validate_query(&huge),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_no_advisories_for_focused_query() {
        let advisor = QueryAdvisor::default();
        let advisories =
            advisor.advise("Massachusetts court decisions on tenant rights in rental disputes");
        assert!(advisories.is_empty(), "{:?}", advisories);
    }

    #[test]
    fn test_advisories_for_vague_query() {
        let advisor = QueryAdvisor::default();
        let advisories = advisor.advise("noisy neighbours at night");
        assert_eq!(advisories.len(), 2);
        assert!(advisories[0].contains("legal terminology"));
        assert!(advisories[1].contains("Massachusetts"));
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let advisor = QueryAdvisor::default();
        // "massive" is not a jurisdiction, "cases" counts as "case"
        let advisories = advisor.advise("massive damages cases for breach");
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].contains("Massachusetts"));
    }

    #[test]
    fn test_short_query_advisory() {
        let advisor = QueryAdvisor::default();
        let advisories = advisor.advise("Mass law");
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].contains("very short"));
    }
}
