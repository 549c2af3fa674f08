//! Prompt construction for report generation
//!
//! A report-type identifier selects a template; the template turns the query,
//! the research context and the source list into one prompt string.

use crate::research::Source;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from prompt template lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PromptError {
    #[error("Unknown report type: {0}")]
    UnknownReportType(String),

    #[error("Unknown tone: {0}")]
    UnknownTone(String),
}

/// Kinds of report the templates can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    ResearchReport,
    ResourceReport,
    OutlineReport,
    CustomReport,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::ResearchReport,
        ReportType::ResourceReport,
        ReportType::OutlineReport,
        ReportType::CustomReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::ResearchReport => "research_report",
            ReportType::ResourceReport => "resource_report",
            ReportType::OutlineReport => "outline_report",
            ReportType::CustomReport => "custom_report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PromptError::UnknownReportType(s.to_string()))
    }
}

/// Writing tone requested for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Tone {
    Objective,
    Formal,
    Analytical,
    Persuasive,
    Informative,
    Explanatory,
    Descriptive,
    Critical,
    Comparative,
    Speculative,
    Reflective,
    Narrative,
    Humorous,
    Optimistic,
    Pessimistic,
}

impl Tone {
    const ALL: [Tone; 15] = [
        Tone::Objective,
        Tone::Formal,
        Tone::Analytical,
        Tone::Persuasive,
        Tone::Informative,
        Tone::Explanatory,
        Tone::Descriptive,
        Tone::Critical,
        Tone::Comparative,
        Tone::Speculative,
        Tone::Reflective,
        Tone::Narrative,
        Tone::Humorous,
        Tone::Optimistic,
        Tone::Pessimistic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tone::Objective => "Objective",
            Tone::Formal => "Formal",
            Tone::Analytical => "Analytical",
            Tone::Persuasive => "Persuasive",
            Tone::Informative => "Informative",
            Tone::Explanatory => "Explanatory",
            Tone::Descriptive => "Descriptive",
            Tone::Critical => "Critical",
            Tone::Comparative => "Comparative",
            Tone::Speculative => "Speculative",
            Tone::Reflective => "Reflective",
            Tone::Narrative => "Narrative",
            Tone::Humorous => "Humorous",
            Tone::Optimistic => "Optimistic",
            Tone::Pessimistic => "Pessimistic",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tone::Objective => "impartial and unbiased presentation of facts and findings",
            Tone::Formal => "adheres to academic standards with sophisticated language and structure",
            Tone::Analytical => "critical evaluation and detailed examination of data and theories",
            Tone::Persuasive => "convincing the audience of a particular viewpoint or argument",
            Tone::Informative => "providing clear and comprehensive information on a topic",
            Tone::Explanatory => "clarifying complex concepts and processes",
            Tone::Descriptive => "detailed depiction of phenomena, experiments, or case studies",
            Tone::Critical => "judging the validity and relevance of the research and its conclusions",
            Tone::Comparative => "juxtaposing different theories, data, or methods to highlight differences and similarities",
            Tone::Speculative => "exploring hypotheses and potential implications or future research directions",
            Tone::Reflective => "considering the research process and personal insights or experiences",
            Tone::Narrative => "telling a story to illustrate research findings or methodologies",
            Tone::Humorous => "light-hearted and engaging, usually to make the content more relatable",
            Tone::Optimistic => "highlighting positive findings and potential benefits",
            Tone::Pessimistic => "focusing on limitations, challenges, or negative outcomes",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

impl FromStr for Tone {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PromptError::UnknownTone(s.to_string()))
    }
}

impl TryFrom<String> for Tone {
    type Error = PromptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fixed formatting options applied to every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOptions {
    /// Citation style, e.g. "APA" or "MLA"
    #[serde(default = "default_report_format")]
    pub report_format: String,

    #[serde(default)]
    pub tone: Option<Tone>,

    /// Minimum length of the report in words
    #[serde(default = "default_total_words")]
    pub total_words: u32,

    /// Output language
    #[serde(default = "default_language")]
    pub language: String,

    /// Date the model should assume; omitted from the prompt when unset
    #[serde(default)]
    pub current_date: Option<String>,
}

fn default_report_format() -> String { "APA".to_string() }
fn default_total_words() -> u32 { 1000 }
fn default_language() -> String { "Japanese".to_string() }

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            report_format: default_report_format(),
            tone: None,
            total_words: default_total_words(),
            language: default_language(),
            current_date: None,
        }
    }
}

impl PromptOptions {
    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = Some(date.into());
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }
}

/// A formatting function selected by report type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    report_type: ReportType,
}

/// Look up the template for a report-type identifier
pub fn prompt_for_report_type(report_type: &str) -> Result<PromptTemplate, PromptError> {
    Ok(PromptTemplate {
        report_type: report_type.parse()?,
    })
}

/// Look up the template and build the prompt in one step
pub fn build_prompt(
    report_type: &str,
    query: &str,
    context: &str,
    sources: &[Source],
    options: &PromptOptions,
) -> Result<String, PromptError> {
    Ok(prompt_for_report_type(report_type)?.build(query, context, sources, options))
}

impl PromptTemplate {
    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    /// Render the prompt. Pure; never fails.
    pub fn build(
        &self,
        query: &str,
        context: &str,
        sources: &[Source],
        options: &PromptOptions,
    ) -> String {
        let body = match self.report_type {
            ReportType::ResearchReport => research_report(query, context, options),
            ReportType::ResourceReport => resource_report(query, context, options),
            ReportType::OutlineReport => outline_report(query, context, options),
            ReportType::CustomReport => custom_report(query, context, options),
        };

        let mut prompt = body;
        prompt.push_str(&references_section(sources, options));
        prompt.push_str(&closing_section(options));
        prompt
    }
}

fn research_report(query: &str, context: &str, options: &PromptOptions) -> String {
    format!(
        r#"Information: """{context}"""
---
Using the above information, answer the following query or task: "{query}" in a detailed report.
The report should focus on the answer to the query, be well structured, informative,
in-depth and comprehensive, with facts and numbers if available, and at least {words} words.
You should strive to write the report as long as you can using all relevant and necessary information provided.

Please follow all of the following guidelines in your report:
- You MUST determine your own concrete and valid opinion based on the given information. Do NOT defer to general and meaningless conclusions.
- You MUST write the report with markdown syntax and {format} format.
- Use markdown tables when presenting structured data or comparisons.
- You MUST prioritize the relevance, reliability, and significance of the sources you use. Prefer trusted sources over less reliable ones.
- You must also prioritize new articles over older articles if the source can be trusted.
- Use in-text citation references in {format} format and make it with markdown hyperlink placed at the end of the sentence or paragraph that references them like this: ([in-text citation](url)).
"#,
        context = context,
        query = query,
        words = options.total_words,
        format = options.report_format,
    )
}

fn resource_report(query: &str, context: &str, options: &PromptOptions) -> String {
    format!(
        r#""""{context}"""

Based on the above information, generate a bibliography recommendation report for the following question or topic: "{query}".
The report should provide a detailed analysis of each recommended resource, explaining how each source can contribute to finding answers to the research question.
Focus on the relevance, reliability, and significance of each source.
Ensure that the report is well-structured, informative, in-depth, and follows markdown syntax.
Use markdown tables and other formatting features when appropriate to organize and present information clearly.
Include relevant facts, figures, and numbers whenever available.
The report should have a minimum length of {words} words.
You MUST use {format} format for every reference.
"#,
        context = context,
        query = query,
        words = options.total_words,
        format = options.report_format,
    )
}

fn outline_report(query: &str, context: &str, options: &PromptOptions) -> String {
    format!(
        r#""""{context}"""

Using the above information, generate an outline for a research report in markdown syntax for the following question or topic: "{query}".
The outline should provide a well-structured framework for the research report, including the main sections, subsections, and key points to be covered.
The research report should be detailed, informative, in-depth, and a minimum of {words} words.
Use appropriate markdown syntax to format the outline and ensure readability.
Consider using markdown tables and other formatting features where they would enhance the presentation of information.
Any citations in the outline MUST use {format} format.
"#,
        context = context,
        query = query,
        words = options.total_words,
        format = options.report_format,
    )
}

fn custom_report(query: &str, context: &str, options: &PromptOptions) -> String {
    format!(
        r#""{context}"

{query}

The response should be at least {words} words and cite sources in {format} format.
"#,
        context = context,
        query = query,
        words = options.total_words,
        format = options.report_format,
    )
}

fn references_section(sources: &[Source], options: &PromptOptions) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut section = format!(
        "\nYou MUST write all used source urls at the end of the report as references in {} format, \
         and make sure to not add duplicated sources, but only one reference for each.\n\
         Every url should be hyperlinked: [url website](url)\n\nSources:\n",
        options.report_format
    );
    for source in sources {
        match &source.title {
            Some(title) => section.push_str(&format!("- {} ({})\n", title, source.url)),
            None => section.push_str(&format!("- {}\n", source.url)),
        }
    }
    section
}

fn closing_section(options: &PromptOptions) -> String {
    let mut section = String::new();
    if let Some(tone) = &options.tone {
        section.push_str(&format!("\nYou must write the report in the following tone: {}\n", tone));
    }
    if let Some(date) = &options.current_date {
        section.push_str(&format!("\nAssume that the current date is {}.\n", date));
    }
    section.push_str(&format!(
        "\nYou MUST write the report in the following language: {}.\n\
         Please do your best, this is very important to my career.",
        options.language
    ));
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "impact of tariffs on steel prices";

    fn sources() -> Vec<Source> {
        vec![
            Source::new("https://example.com/steel").with_title("Steel outlook"),
            Source::new("https://example.com/tariffs"),
        ]
    }

    #[test]
    fn test_report_type_lookup() {
        assert_eq!("research_report".parse::<ReportType>(), Ok(ReportType::ResearchReport));
        assert_eq!("outline_report".parse::<ReportType>(), Ok(ReportType::OutlineReport));
        assert_eq!(
            prompt_for_report_type("deep_magic"),
            Err(PromptError::UnknownReportType("deep_magic".to_string()))
        );
        for t in ReportType::ALL {
            assert_eq!(t.as_str().parse::<ReportType>(), Ok(t));
        }
    }

    #[test]
    fn test_every_template_contains_query() {
        let options = PromptOptions {
            report_format: "Chicago".to_string(),
            total_words: 1234,
            ..Default::default()
        };
        for t in ReportType::ALL {
            for sources in [sources(), Vec::new()] {
                let prompt =
                    build_prompt(t.as_str(), QUERY, "some context", &sources, &options).unwrap();
                assert!(prompt.contains(QUERY), "{} prompt lost the query", t);
                assert!(prompt.contains("some context"), "{} prompt lost the context", t);
                assert!(prompt.contains("1234"), "{} prompt lost the word count", t);
                assert!(prompt.contains("Chicago format"), "{} prompt lost the citation format", t);
                assert!(prompt.contains("following language: Japanese"), "{} prompt lost the language", t);
            }
        }
    }

    #[test]
    fn test_research_report_formatting_options() {
        let options = PromptOptions {
            report_format: "MLA".to_string(),
            total_words: 1500,
            language: "English".to_string(),
            ..Default::default()
        }
        .with_current_date("2026-10-17")
        .with_tone(Tone::Analytical);

        let prompt = build_prompt("research_report", QUERY, "ctx", &sources(), &options).unwrap();
        assert!(prompt.contains("at least 1500 words"));
        assert!(prompt.contains("MLA format"));
        assert!(prompt.contains("following language: English"));
        assert!(prompt.contains("Assume that the current date is 2026-10-17."));
        assert!(prompt.contains("Analytical (critical evaluation"));
        assert!(prompt.contains("- Steel outlook (https://example.com/steel)"));
        assert!(prompt.contains("- https://example.com/tariffs"));
    }

    #[test]
    fn test_no_sources_no_reference_list() {
        let prompt = build_prompt("research_report", QUERY, "", &[], &PromptOptions::default()).unwrap();
        assert!(prompt.contains(QUERY));
        assert!(!prompt.contains("Sources:"));
        assert!(!prompt.contains("Assume that the current date"));
    }

    #[test]
    fn test_tone_parsing() {
        assert_eq!("objective".parse::<Tone>(), Ok(Tone::Objective));
        assert_eq!(" Formal ".parse::<Tone>(), Ok(Tone::Formal));
        assert!("sarcastic".parse::<Tone>().is_err());
    }

    #[test]
    fn test_tone_from_toml_any_case() {
        for raw in ["Objective", "objective", "OBJECTIVE"] {
            let options: PromptOptions = toml::from_str(&format!("tone = \"{}\"", raw)).unwrap();
            assert_eq!(options.tone, Some(Tone::Objective));
        }
        assert!(toml::from_str::<PromptOptions>("tone = \"sarcastic\"").is_err());
    }

    #[test]
    fn test_options_defaults_from_toml() {
        let options: PromptOptions = toml::from_str("tone = \"critical\"").unwrap();
        assert_eq!(options.report_format, "APA");
        assert_eq!(options.total_words, 1000);
        assert_eq!(options.language, "Japanese");
        assert_eq!(options.tone, Some(Tone::Critical));
    }
}
