//! BibTeX rendering of merged records.

use std::fmt::Write;

use crate::merge::is_internal;
use crate::record::CanonicalRecord;

/// Venue field name for a BibTeX entry type.
fn container_field(bibtex_type: &str) -> &'static str {
    match bibtex_type {
        "article" => "journal",
        "inproceedings" | "incollection" => "booktitle",
        _ => "howpublished",
    }
}

/// Drops braces from values whose braces do not balance.
fn brace_safe(value: &str) -> String {
    let mut depth = 0i32;
    for c in value.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        value.to_string()
    } else {
        value.replace(['{', '}'], "")
    }
}

/// Renders `record` as one BibTeX entry. Fields come in a fixed order:
/// title, author, year, the venue container, doi, then extras by key.
/// Bookkeeping extras are never written.
#[must_use]
pub fn render_bibtex(record: &CanonicalRecord, citekey: &str) -> String {
    let bibtex_type = record.entry_type().bibtex_type();
    let mut fields: Vec<(&str, String)> = Vec::new();
    if let Some(title) = record.title() {
        fields.push(("title", title.to_string()));
    }
    if !record.authors().is_empty() {
        fields.push(("author", record.authors().join(" and ")));
    }
    if let Some(year) = record.year() {
        fields.push(("year", year.to_string()));
    }
    if let Some(venue) = record.venue() {
        fields.push((container_field(bibtex_type), venue.to_string()));
    }
    if let Some(doi) = record.doi() {
        fields.push(("doi", doi.to_string()));
    }
    for (key, value) in record.extras() {
        if !is_internal(key) {
            fields.push((key, value.to_string()));
        }
    }

    let mut out = format!("@{bibtex_type}{{{citekey}");
    for (key, value) in fields {
        let _ = write!(out, ",\n  {key} = {{{}}}", brace_safe(&value));
    }
    out.push_str("\n}\n");
    out
}
