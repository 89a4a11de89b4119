// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics.
//!
//! Figment failures are turned into miette reports that point at the
//! offending line of `wotp.toml` and suggest the closest known key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(wotp::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma separated keys accepted by the enclosing table.
        valid_keys: String,
        #[label("not a known key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(wotp::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(wotp::config::missing_key),
        help("add `{key} = <value>` to wotp.toml")
    )]
    MissingKey { key: String },

    /// A value parsed fine but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(wotp::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(wotp::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Splits a figment error chain into one diagnostic per failure.
///
/// `toml_sources` holds `(path, content)` pairs of every TOML file that fed
/// the figment, used to attach source spans to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate(&error, field, toml_sources).unzip();
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn locate(
    error: &figment::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let figment::Source::File(path) = error.metadata.as_ref()?.source.as_ref()? else {
        return None;
    };
    let path = path.display().to_string();
    let (name, content) = toml_sources.iter().find(|(p, _)| *p == path)?;
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` as a key inside the table named by `path`.
///
/// Numeric path segments (array indices) are ignored, so keys inside
/// `[[gateway.api_keys]]` resolve to the first array entry.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let section = path
        .iter()
        .filter(|segment| segment.parse::<usize>().is_err())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(".");

    let start = if section.is_empty() {
        0
    } else {
        let array_header = format!("[[{section}]]");
        let header = format!("[{section}]");
        match content.find(&array_header) {
            Some(pos) => pos + array_header.len(),
            None => content.find(&header)? + header.len(),
        }
    };

    let mut line_start = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if rest
            .strip_prefix(field)
            .is_some_and(|after| after.starts_with([' ', '\t', '=']))
        {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest known key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr as a graphical miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_suggestions() {
        let pool = &["concurrency", "max_attempts", "backoff_ms", "warmup_secs"];
        assert_eq!(suggest_key("concurency", pool).as_deref(), Some("concurrency"));

        let whatsapp = &["bridge_url", "browser_name", "pairing_wait_secs"];
        assert_eq!(suggest_key("bridge_ulr", whatsapp).as_deref(), Some("bridge_url"));

        assert_eq!(suggest_key("zzzzzz", &["log_level"]), None);
    }

    #[test]
    fn key_offset_respects_section() {
        let content = "[queue.message]\nconcurency = 2\n\n[queue.otp]\nconcurency = 4\n";
        let path = vec!["queue".to_string(), "otp".to_string()];
        let offset = find_key_offset(content, &path, "concurency").unwrap();
        assert_eq!(&content[offset..offset + 10], "concurency");
        assert!(offset > content.find("[queue.otp]").unwrap());
    }

    #[test]
    fn key_offset_in_array_table() {
        let content = "[[gateway.api_keys]]\n  account_id = \"a\"\nkey = \"k\"\n";
        let path = vec!["gateway".to_string(), "api_keys".to_string(), "0".to_string()];
        let offset = find_key_offset(content, &path, "account_id").unwrap();
        assert_eq!(&content[offset..offset + 10], "account_id");
    }

    #[test]
    fn key_must_be_followed_by_assignment() {
        let content = "[daemon]\nlog_levels = 1\nlog_level = \"info\"\n";
        let path = vec!["daemon".to_string()];
        let offset = find_key_offset(content, &path, "log_level").unwrap();
        assert_eq!(&content[offset..offset + 11], "log_level =");
    }
}
