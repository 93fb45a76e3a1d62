//! Key-mapping resolver: translates a source object key into a destination
//! key according to a configured mapping spec.
//!
//! The spec grammar, evaluated first match wins:
//!
//! 1. **Date-anchored rule** — `<prefix>=${date}` optionally suffixed with
//!    `:prefix` or `:suffix`. The default and `:prefix` forms prepend
//!    `<prefix>=<today>/` to the whole source key; `:suffix` inserts the date
//!    segment immediately before the key's final `/`-delimited segment.
//! 2. **Regex rule list** — a JSON array of `{"oldPath", "newPath"}` pairs.
//!    Each `oldPath` is a regular expression tried against the source key in
//!    array order; the first match wins. `$N` in `newPath` expands to capture
//!    group N (`$0` is the whole match). No rule matching leaves the source
//!    key unmodified. An empty array falls through to rule 3 applied to the
//!    original spec string.
//! 3. **Plain prefix** — any other string `P` yields `P/<source_key>`.
//!
//! Whichever rule produced the destination key, a final pass replaces any
//! remaining literal `${date}` token with today's UTC date (`YYYY-MM-DD`).
//! The source key is always a literal subject on the matching side, never a
//! pattern.

use chrono::{NaiveDate, Utc};
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Literal token replaced with the current date.
const DATE_TOKEN: &str = "${date}";

/// One entry of a regex rule list.
#[derive(Debug, Deserialize)]
struct PathRule {
    #[serde(rename = "oldPath")]
    old_path: String,
    #[serde(rename = "newPath")]
    new_path: String,
}

/// Where the date segment of a date-anchored rule lands in the key.
#[derive(Debug, Clone, Copy)]
enum DatePlacement {
    Prefix,
    Suffix,
}

/// Resolves destination keys from a mapping spec.
///
/// Pure and deterministic apart from the current date, which is evaluated
/// once per invocation; [`KeyMapper::resolve_on`] injects a fixed date for
/// deterministic callers and tests.
#[derive(Debug, Clone)]
pub struct KeyMapper {
    spec: String,
}

impl KeyMapper {
    /// Creates a mapper for the given spec string.
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self { spec: spec.into() }
    }

    /// Returns the configured mapping spec.
    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Resolves a destination key using today's UTC date.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if a rule-list pattern is not a valid regex.
    pub fn resolve(&self, source_key: &str) -> Result<String> {
        self.resolve_on(source_key, Utc::now().date_naive())
    }

    /// Resolves a destination key using the given date.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if a rule-list pattern is not a valid regex.
    pub fn resolve_on(&self, source_key: &str, date: NaiveDate) -> Result<String> {
        if let Some(mapped) = self.apply_date_anchored(source_key) {
            return Ok(substitute_date(&mapped, date));
        }
        if let Some(mapped) = self.apply_rule_list(source_key)? {
            return Ok(substitute_date(&mapped, date));
        }
        Ok(substitute_date(
            &format!("{}/{source_key}", self.spec),
            date,
        ))
    }

    /// Applies the date-anchored rule, if the spec has that shape.
    fn apply_date_anchored(&self, source_key: &str) -> Option<String> {
        let (segment, placement) = match self.spec.strip_suffix(":suffix") {
            Some(head) => (head, DatePlacement::Suffix),
            None => match self.spec.strip_suffix(":prefix") {
                Some(head) => (head, DatePlacement::Prefix),
                None => (self.spec.as_str(), DatePlacement::Prefix),
            },
        };
        if !segment.ends_with(&format!("={DATE_TOKEN}")) {
            return None;
        }

        Some(match placement {
            DatePlacement::Prefix => format!("{segment}/{source_key}"),
            DatePlacement::Suffix => match source_key.rsplit_once('/') {
                Some((head, tail)) => format!("{head}/{segment}/{tail}"),
                None => format!("{segment}/{source_key}"),
            },
        })
    }

    /// Applies the regex rule list, if the spec parses as one.
    ///
    /// `Ok(None)` means the spec is not a usable rule list and evaluation
    /// falls through to the plain-prefix rule on the original spec string.
    fn apply_rule_list(&self, source_key: &str) -> Result<Option<String>> {
        if !self.spec.trim_start().starts_with('[') {
            return Ok(None);
        }
        let Ok(rules) = serde_json::from_str::<Vec<PathRule>>(&self.spec) else {
            return Ok(None);
        };
        if rules.is_empty() {
            return Ok(None);
        }

        for rule in &rules {
            let pattern = Regex::new(&rule.old_path).map_err(|e| {
                Error::mapping(format!("invalid rule pattern {:?}: {e}", rule.old_path))
            })?;
            if let Some(caps) = pattern.captures(source_key) {
                return Ok(Some(expand_template(&rule.new_path, &caps)));
            }
        }

        // No rule matched: pass the source key through unmodified.
        Ok(Some(source_key.to_string()))
    }
}

/// Expands `$N` tokens in a rule template from the match's capture groups.
///
/// Highest indices are expanded first so `$1` never clips `$12`.
fn expand_template(template: &str, caps: &Captures<'_>) -> String {
    let mut expanded = template.to_string();
    for index in (0..caps.len()).rev() {
        if let Some(group) = caps.get(index) {
            expanded = expanded.replace(&format!("${index}"), group.as_str());
        }
    }
    expanded
}

/// Replaces any remaining `${date}` token. Idempotent, no-op when absent.
fn substitute_date(path: &str, date: NaiveDate) -> String {
    if path.contains(DATE_TOKEN) {
        path.replace(DATE_TOKEN, &date.format("%Y-%m-%d").to_string())
    } else {
        path.to_string()
    }
}
