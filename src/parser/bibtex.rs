//! BibTeX reading for DOI content-negotiation responses and saved record files.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::record::{RawCandidate, Source};
use crate::text::{clean_title, names::split_bibtex_authors, strip_markup};

#[allow(clippy::expect_used)]
static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:18|19|20)\d{2}\b").expect("bibtex year regex is valid"));

const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// Fields mapped onto dedicated candidate fields rather than extras.
const CORE_FIELDS: [&str; 7] = [
    "title",
    "author",
    "year",
    "doi",
    "journal",
    "booktitle",
    "howpublished",
];

/// One parsed BibTeX entry with every field it declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibtexEntry {
    /// Lowercased entry type (`article`, `inproceedings`, ...).
    pub entry_type: String,
    pub key: String,
    /// Lowercased field name to unwrapped value; first occurrence wins.
    pub fields: BTreeMap<String, String>,
}

impl BibtexEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.field("year")
            .and_then(|value| YEAR_PATTERN.find(value))
            .and_then(|m| m.as_str().parse().ok())
    }

    #[must_use]
    pub fn authors(&self) -> Vec<String> {
        self.field("author")
            .map(split_bibtex_authors)
            .unwrap_or_default()
    }

    /// Container of the work, whichever of the container fields is present.
    #[must_use]
    pub fn venue(&self) -> Option<&str> {
        self.field("journal")
            .or_else(|| self.field("booktitle"))
            .or_else(|| self.field("howpublished"))
    }

    /// Converts the entry into a candidate attributed to `source`.
    #[must_use]
    pub fn to_candidate(&self, source: Source) -> RawCandidate {
        let mut candidate = RawCandidate::new(source)
            .with_authors(self.authors().iter().map(|name| strip_markup(name)))
            .with_entry_type_hint(&self.entry_type);
        if let Some(title) = self.field("title") {
            candidate = candidate.with_title(clean_title(&strip_markup(title)));
        }
        if let Some(year) = self.year() {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = self.venue() {
            candidate = candidate.with_venue(strip_markup(venue));
        }
        if let Some(doi) = self.field("doi") {
            candidate = candidate.with_doi(doi);
        }
        for (name, value) in &self.fields {
            if !CORE_FIELDS.contains(&name.as_str()) {
                candidate = candidate.with_extra(name.clone(), value);
            }
        }
        candidate
    }
}

/// Batch parse result for BibTeX input.
#[derive(Debug, Clone, Default)]
pub struct BibtexParseResult {
    pub entries: Vec<BibtexEntry>,
    /// Actionable messages for entries that could not be parsed.
    pub skipped: Vec<String>,
}

/// Parses every BibTeX entry in `input`.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn parse_bibtex(input: &str) -> BibtexParseResult {
    let mut result = BibtexParseResult::default();
    for raw_entry in segment_entries(input) {
        match parse_entry(&raw_entry) {
            EntryOutcome::Parsed(entry) => result.entries.push(entry),
            EntryOutcome::Ignore => {}
            EntryOutcome::Skip(message) => result.skipped.push(message),
        }
    }
    result
}

#[derive(Debug)]
enum EntryOutcome {
    Parsed(BibtexEntry),
    Ignore,
    Skip(String),
}

/// Splits input into `@type{...}` segments by brace depth.
fn segment_entries(input: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || chars[j].1 != '{' {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut depth = 0usize;
        let mut escape = false;
        let mut found_end = None;

        for (k, (_, ch)) in chars.iter().enumerate().skip(j) {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        found_end = Some(k);
                        break;
                    }
                }
                _ => {}
            }
        }

        if let Some(end_index) = found_end {
            let end_exclusive = chars
                .get(end_index + 1)
                .map_or(input.len(), |(offset, _)| *offset);
            entries.push(input[start..end_exclusive].trim().to_string());
            i = end_index + 1;
        } else {
            // Unbalanced entry: keep it up to the next `@` at line start so it
            // cannot swallow the following valid entry.
            let mut recovery = i + 1;
            while recovery < chars.len()
                && !(chars[recovery].1 == '@' && matches!(chars[recovery - 1].1, '\n' | '\r'))
            {
                recovery += 1;
            }
            let end_exclusive = chars
                .get(recovery)
                .map_or(input.len(), |(offset, _)| *offset);
            entries.push(input[start..end_exclusive].trim().to_string());
            i = recovery;
        }
    }

    entries
}

fn parse_entry(raw_entry: &str) -> EntryOutcome {
    let trimmed = raw_entry.trim();
    let Some(after_at) = trimmed.strip_prefix('@') else {
        return EntryOutcome::Skip("malformed BibTeX entry: missing '@type{' prefix".to_string());
    };
    let Some(brace_pos) = after_at.find('{') else {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: missing opening brace",
            preview(trimmed)
        ));
    };

    let entry_type = after_at[..brace_pos].trim().to_ascii_lowercase();
    if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
        return EntryOutcome::Ignore;
    }
    if !trimmed.ends_with('}') {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: unbalanced braces",
            preview(trimmed)
        ));
    }

    let body = &after_at[brace_pos + 1..after_at.len() - 1];
    let Some((key_raw, fields_raw)) = body.split_once(',') else {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: missing citation key or field list",
            preview(trimmed)
        ));
    };

    match parse_fields(fields_raw) {
        Ok(fields) => EntryOutcome::Parsed(BibtexEntry {
            entry_type,
            key: key_raw.trim().to_string(),
            fields,
        }),
        Err(reason) => EntryOutcome::Skip(format!(
            "malformed BibTeX field in `{}`: {reason}",
            preview(trimmed)
        )),
    }
}

fn parse_fields(input: &str) -> Result<BTreeMap<String, String>, String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth == 0 => in_quotes = !in_quotes,
            '{' if !in_quotes => depth += 1,
            '}' if !in_quotes => {
                if depth == 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
                depth -= 1;
            }
            ',' if depth == 0 && !in_quotes => {
                let segment = current.trim();
                if !segment.is_empty() {
                    pairs.push(segment.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }
    let tail = current.trim();
    if !tail.is_empty() {
        pairs.push(tail.to_string());
    }

    let mut fields = BTreeMap::new();
    for pair in pairs {
        let Some((name, value_raw)) = pair.split_once('=') else {
            return Err(format!("missing '=' in field segment `{}`", preview(&pair)));
        };
        let field_name = name.trim().to_ascii_lowercase();
        if field_name.is_empty() {
            return Err("empty field name".to_string());
        }
        let value = strip_bibtex_value(value_raw)
            .ok_or_else(|| format!("invalid value in field `{field_name}`"))?;
        fields.entry(field_name).or_insert(value);
    }
    Ok(fields)
}

fn strip_bibtex_value(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches(',').trim();
    if trimmed.is_empty() {
        return None;
    }
    let inner = if trimmed.len() >= 2
        && ((trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('"') && trimmed.ends_with('"')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    Some(inner.replace("\\\"", "\"").split_whitespace().collect::<Vec<_>>().join(" "))
}

fn preview(input: &str) -> String {
    const MAX: usize = 60;
    if input.chars().count() <= MAX {
        return input.to_string();
    }
    let shortened: String = input.chars().take(MAX).collect();
    format!("{shortened}...")
}
