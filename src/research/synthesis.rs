//! Report synthesis
//!
//! [`LlmSynthesizer`] turns the retrieved evidence into a formal research
//! memorandum with one LLM completion. The model writes the prose; citations
//! and the sources table are attached from the retrieval output.

use super::report::{
    build_citations, build_sources, CoverageNote, ReportFormat, ReportOptions, ReportSection,
    ResearchReport,
};
use crate::llm::LLMClient;
use crate::retrieval::{CaseExcerpt, WebDocument};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Everything the synthesis step may use.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub query: &'a str,
    /// `None` when case law was not requested or produced no result
    pub case_law: Option<&'a [CaseExcerpt]>,
    pub web: Option<&'a [WebDocument]>,
    pub options: ReportOptions,
    pub coverage_notes: &'a [CoverageNote],
}

#[async_trait]
pub trait SynthesisAgent: Send + Sync {
    /// Produce a report. Backend failures and unusable output are
    /// reported as [`AppError::Synthesis`].
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<ResearchReport>;

    fn name(&self) -> &str;
}

pub struct LlmSynthesizer {
    llm: Arc<dyn LLMClient>,
    jurisdiction: String,
    excerpt_chars: usize,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            llm,
            jurisdiction: "Massachusetts".to_string(),
            excerpt_chars: 1500,
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = jurisdiction.into();
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    pub fn system_prompt(&self, options: &ReportOptions) -> String {
        let pages = options.length.page_guidance();
        let output_format = match options.format {
            ReportFormat::Markdown => {
                "Markdown. Start with a single '# ' title line and use '## ' headings for sections."
                    .to_string()
            }
            ReportFormat::Json => r#"JSON only, no surrounding prose, matching:
{"title": "<report title>", "sections": [{"heading": "<section heading>", "body": "<section text>"}]}"#
                .to_string(),
        };

        format!(
            "You are a specialized legal research assistant creating formal legal research reports.\n\n\
             Your task is to synthesize historical {jurisdiction} case law with recent legal commentary \
             and web information to produce a {pages} page legal research report.\n\n\
             Follow these guidelines:\n\
             1. Write in formal legal style with proper citations\n\
             2. Create a {detail}\n\
             3. Organize by legal principles and precedents\n\
             4. Include both historical context and current interpretations\n\
             5. Format as a professional legal research memorandum\n\
             6. Include executive summary, table of contents, methodology, analysis, and conclusion sections\n\
             7. Use proper legal citation format\n\
             8. If a source category is unavailable, say so in the methodology section\n\n\
             Output format: {output_format}\n\
             Output length: {pages} pages",
            jurisdiction = self.jurisdiction,
            pages = pages,
            detail = options.length.detail_level(),
            output_format = output_format,
        )
    }

    pub fn user_prompt(&self, request: &SynthesisRequest<'_>) -> String {
        let mut prompt = format!("LEGAL QUERY:\n{}\n\n", request.query);

        prompt.push_str("HISTORICAL CASE LAW INFORMATION:\n");
        match request.case_law {
            Some(excerpts) if !excerpts.is_empty() => {
                for (i, excerpt) in excerpts.iter().enumerate() {
                    let _ = writeln!(
                        prompt,
                        "[{}] {}\n{}\n",
                        i + 1,
                        excerpt.citation.formatted(),
                        crate::retrieval::web::truncate_snippet(
                            &excerpt.excerpt,
                            self.excerpt_chars
                        )
                    );
                }
            }
            _ => prompt.push_str("(none available)\n\n"),
        }

        prompt.push_str("RECENT LEGAL COMMENTARY AND WEB INFORMATION:\n");
        match request.web {
            Some(documents) if !documents.is_empty() => {
                for (i, doc) in documents.iter().enumerate() {
                    let _ = writeln!(prompt, "[W{}] {} ({})\n{}\n", i + 1, doc.title, doc.url, doc.snippet);
                }
            }
            _ => prompt.push_str("(none available)\n\n"),
        }

        if !request.coverage_notes.is_empty() {
            prompt.push_str("COVERAGE NOTES:\n");
            for note in request.coverage_notes {
                let _ = writeln!(prompt, "- {}", note.message);
            }
        }

        prompt
    }
}

#[async_trait]
impl SynthesisAgent for LlmSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<ResearchReport> {
        let system = self.system_prompt(&request.options);
        let prompt = self.user_prompt(&request);

        let completion = self
            .llm
            .generate_with_system(&system, &prompt)
            .await
            .map_err(|e| AppError::Synthesis(format!("LLM call failed: {}", e)))?;

        let parsed = match request.options.format {
            ReportFormat::Markdown => parse_markdown(&completion)?,
            ReportFormat::Json => parse_json(&completion)?,
        };

        let case_law = request.case_law.unwrap_or_default();
        let web = request.web.unwrap_or_default();

        Ok(ResearchReport {
            title: parsed
                .title
                .unwrap_or_else(|| format!("Legal Research Report: {}", request.query)),
            query: request.query.to_string(),
            options: request.options,
            sections: parsed.sections,
            citations: build_citations(case_law, web),
            sources: build_sources(case_law, web),
            coverage_notes: request.coverage_notes.to_vec(),
            model: Some(self.llm.model_name().to_string()),
            generated_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Title and sections recovered from a completion.
#[derive(Debug, Default, Deserialize)]
pub struct ParsedReport {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
}

/// Remove a surrounding ``` fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
        return body.trim_end().trim_end_matches("```").trim();
    }
    trimmed
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        None
    } else {
        Some((level, text))
    }
}

fn finish_sections(sections: Vec<ReportSection>) -> Result<Vec<ReportSection>> {
    let sections: Vec<ReportSection> = sections
        .into_iter()
        .map(|s| ReportSection {
            heading: s.heading.trim().to_string(),
            body: s.body.trim().to_string(),
        })
        .filter(|s| !s.body.is_empty())
        .collect();

    if sections.is_empty() {
        return Err(AppError::Synthesis(
            "Synthesis output contained no usable section".to_string(),
        ));
    }
    Ok(sections)
}

pub fn parse_markdown(completion: &str) -> Result<ParsedReport> {
    let text = strip_code_fence(completion);
    if text.is_empty() {
        return Err(AppError::Synthesis("Synthesis returned an empty completion".to_string()));
    }

    let mut title = None;
    let mut sections: Vec<ReportSection> = Vec::new();
    let mut current = ReportSection {
        heading: "Summary".to_string(),
        body: String::new(),
    };
    let mut seen_heading = false;

    for line in text.lines() {
        match heading(line) {
            Some((1, text)) if title.is_none() && !seen_heading => {
                title = Some(text.to_string());
                seen_heading = true;
            }
            Some((_, text)) => {
                seen_heading = true;
                let finished = std::mem::replace(
                    &mut current,
                    ReportSection {
                        heading: text.to_string(),
                        body: String::new(),
                    },
                );
                sections.push(finished);
            }
            None => {
                current.body.push_str(line);
                current.body.push('\n');
            }
        }
    }
    sections.push(current);

    if !seen_heading && sections.len() == 1 {
        sections[0].heading = "Report".to_string();
    }

    Ok(ParsedReport {
        title,
        sections: finish_sections(sections)?,
    })
}

pub fn parse_json(completion: &str) -> Result<ParsedReport> {
    let text = strip_code_fence(completion);
    if text.is_empty() {
        return Err(AppError::Synthesis("Synthesis returned an empty completion".to_string()));
    }

    let parsed: ParsedReport = serde_json::from_str(text)
        .map_err(|e| AppError::Synthesis(format!("Synthesis output is not valid JSON: {}", e)))?;

    Ok(ParsedReport {
        title: parsed.title.filter(|t| !t.trim().is_empty()),
        sections: finish_sections(parsed.sections)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::report::ReportLength;
    use crate::retrieval::{CaseCitation, RetrievalComponent};
    use parking_lot::Mutex;

    struct ScriptedLLM {
        reply: Result<String>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedLLM {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLLM {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.generate_with_system("", prompt).await
        }

        async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .push((system.to_string(), prompt.to_string()));
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(AppError::LLM(e.to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn excerpts() -> Vec<CaseExcerpt> {
        vec![CaseExcerpt {
            excerpt: "A landlord may not retaliate against a tenant.".to_string(),
            citation: CaseCitation {
                case_name: Some("Hemingway".to_string()),
                citation: Some("363 Mass. 184".to_string()),
                year: Some(1973),
                source: None,
            },
            score: 0.9,
        }]
    }

    const MARKDOWN: &str = "```markdown\n# Retaliation in Tenancies\n\nIntro text.\n\n## Executive Summary\nTenants are protected.\n\n## Analysis\n### Retaliation\nSee Hemingway.\n\n## Conclusion\nDone.\n```";

    #[test]
    fn test_parse_markdown_sections() {
        let parsed = parse_markdown(MARKDOWN).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Retaliation in Tenancies"));

        let headings: Vec<&str> = parsed.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec!["Summary", "Executive Summary", "Retaliation", "Conclusion"]
        );
        assert_eq!(parsed.sections[2].body, "See Hemingway.");
    }

    #[test]
    fn test_parse_markdown_without_headings() {
        let parsed = parse_markdown("Plain prose answer.").unwrap();
        assert!(parsed.title.is_none());
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].heading, "Report");
    }

    #[test]
    fn test_parse_markdown_rejects_empty_output() {
        assert!(matches!(parse_markdown("   "), Err(AppError::Synthesis(_))));
        assert!(matches!(
            parse_markdown("# Title\n## Empty\n"),
            Err(AppError::Synthesis(_))
        ));
    }

    #[test]
    fn test_parse_json() {
        let parsed = parse_json(
            r#"```json
{"title": "Report", "sections": [{"heading": "Analysis", "body": "Text"}, {"heading": "Blank", "body": " "}]}
```"#,
        )
        .unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Report"));
        assert_eq!(parsed.sections.len(), 1);

        assert!(matches!(
            parse_json("not json"),
            Err(AppError::Synthesis(_))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_attaches_citations_and_notes() {
        let llm = ScriptedLLM::replying(MARKDOWN);
        let synthesizer = LlmSynthesizer::new(llm.clone());
        let cases = excerpts();
        let notes = vec![CoverageNote {
            component: RetrievalComponent::Web,
            message: "Web search results are missing from this report: timed out (30s).".to_string(),
        }];

        let report = synthesizer
            .synthesize(SynthesisRequest {
                query: "retaliation",
                case_law: Some(&cases),
                web: None,
                options: ReportOptions {
                    format: ReportFormat::Markdown,
                    length: ReportLength::Brief,
                },
                coverage_notes: &notes,
            })
            .await
            .unwrap();

        assert_eq!(report.citations[0].text, "Hemingway, 363 Mass. 184 (1973)");
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.coverage_notes, notes);
        assert_eq!(report.model.as_deref(), Some("scripted"));

        let prompts = llm.prompts.lock();
        let (system, user) = &prompts[0];
        assert!(system.contains("5-7 page"));
        assert!(system.contains("concise overview of key points"));
        assert!(user.contains("Hemingway, 363 Mass. 184 (1973)"));
        assert!(user.contains("COVERAGE NOTES"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_synthesis_error() {
        let llm = Arc::new(ScriptedLLM {
            reply: Err(AppError::LLM("rate limited".to_string())),
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = LlmSynthesizer::new(llm);
        let cases = excerpts();

        let err = synthesizer
            .synthesize(SynthesisRequest {
                query: "q",
                case_law: Some(&cases),
                web: None,
                options: ReportOptions::default(),
                coverage_notes: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Synthesis(_)));
    }
}
