//! Rule files for bulk import.
//!
//! CSV files carry a `word,category,severity,match_type,pattern` header row.
//! JSON files hold an array of rule objects. Only `word` is required; missing
//! fields fall back to category `other`, severity 2 and match type `contains`.
//! A row that cannot be read is reported and skipped.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::models::{MatchStrategy, RuleCategory, RuleInput, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleFileFormat {
    #[default]
    Csv,
    Json,
}

/// Rules read from a file plus one message per rejected row
#[derive(Debug, Default)]
pub struct ParsedRules {
    pub rules: Vec<RuleInput>,
    pub errors: Vec<String>,
}

pub fn parse_rule_file(format: RuleFileFormat, raw: &str) -> Result<ParsedRules> {
    match format {
        RuleFileFormat::Csv => parse_csv(raw),
        RuleFileFormat::Json => parse_json(raw),
    }
}

/// One CSV row, kept as text so each field can fail on its own
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    match_type: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

impl CsvRow {
    fn into_input(self) -> Result<RuleInput> {
        let word = present(self.word).context("missing word")?;
        let category = match present(self.category) {
            Some(category) => category.parse::<RuleCategory>()?,
            None => RuleCategory::default(),
        };
        let severity = match present(self.severity) {
            Some(raw) => {
                let value: i16 = raw
                    .parse()
                    .with_context(|| format!("invalid severity '{}'", raw))?;
                Severity::try_from(value)?
            }
            None => Severity::default(),
        };
        let match_type = match present(self.match_type) {
            Some(match_type) => match_type.parse::<MatchStrategy>()?,
            None => MatchStrategy::default(),
        };

        Ok(RuleInput {
            word,
            pattern: self.pattern.filter(|p| !p.trim().is_empty()),
            category,
            severity,
            match_type,
            is_active: true,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_csv(raw: &str) -> Result<ParsedRules> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?;
    if !headers.iter().any(|h| h == "word") {
        bail!("CSV header must include a 'word' column");
    }

    let mut parsed = ParsedRules::default();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1
        let line = index + 2;
        match row.map_err(anyhow::Error::from).and_then(CsvRow::into_input) {
            Ok(input) => parsed.rules.push(input),
            Err(e) => parsed.errors.push(format!("line {}: {}", line, e)),
        }
    }
    Ok(parsed)
}

fn parse_json(raw: &str) -> Result<ParsedRules> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(raw).context("Expected a JSON array of rules")?;

    let mut parsed = ParsedRules::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RuleInput>(item) {
            Ok(input) => parsed.rules.push(input),
            Err(e) => parsed.errors.push(format!("item {}: {}", index, e)),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_with_defaults() {
        let raw = "word,category,severity,match_type,pattern\n\
                   代写,other,3,contains,\n\
                   加群,,,,\n\
                   微信号,advertisement,2,regex,\"微信.*\\d{5,}\"\n";

        let parsed = parse_rule_file(RuleFileFormat::Csv, raw).unwrap();

        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.rules.len(), 3);

        assert_eq!(parsed.rules[0].word, "代写");
        assert_eq!(parsed.rules[0].severity, Severity::SEVERE);
        assert!(parsed.rules[0].pattern.is_none());

        assert_eq!(parsed.rules[1].category, RuleCategory::Other);
        assert_eq!(parsed.rules[1].severity, Severity::REJECT);
        assert_eq!(parsed.rules[1].match_type, MatchStrategy::Contains);

        assert_eq!(parsed.rules[2].match_type, MatchStrategy::Regex);
        assert_eq!(parsed.rules[2].pattern.as_deref(), Some(r"微信.*\d{5,}"));
    }

    #[test]
    fn test_csv_word_only_header() {
        let parsed = parse_rule_file(RuleFileFormat::Csv, "word\n刷单\n代考\n").unwrap();
        assert_eq!(parsed.rules.len(), 2);
        assert_eq!(parsed.rules[1].word, "代考");
    }

    #[test]
    fn test_csv_bad_rows_are_reported_and_skipped() {
        let raw = "word,category,severity\n\
                   ok,abuse,1\n\
                   bad_severity,other,high\n\
                   out_of_range,other,7\n\
                   bad_category,gossip,2\n\
                   ,other,2\n";

        let parsed = parse_rule_file(RuleFileFormat::Csv, raw).unwrap();

        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].category, RuleCategory::Abuse);
        assert_eq!(parsed.errors.len(), 4);
        assert!(parsed.errors[0].starts_with("line 3:"));
        assert!(parsed.errors[3].contains("missing word"));
    }

    #[test]
    fn test_csv_without_word_column_fails() {
        assert!(parse_rule_file(RuleFileFormat::Csv, "term,severity\n代写,2\n").is_err());
    }

    #[test]
    fn test_json_items_parse_independently() {
        let raw = r#"[
            {"word": "代写", "category": "advertisement", "severity": 2},
            {"word": "刷单", "severity": 9},
            {"category": "other"}
        ]"#;

        let parsed = parse_rule_file(RuleFileFormat::Json, raw).unwrap();

        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].category, RuleCategory::Advertisement);
        assert_eq!(parsed.errors.len(), 2);
        assert!(parsed.errors[0].starts_with("item 1:"));
    }

    #[test]
    fn test_json_must_be_an_array() {
        assert!(parse_rule_file(RuleFileFormat::Json, r#"{"word": "x"}"#).is_err());
    }
}
