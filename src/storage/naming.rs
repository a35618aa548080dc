//! Directory names, citation keys and file names for saved records.

use crate::author::AuthorRecord;
use crate::text::names;

/// Characters that cannot appear in a directory name on common filesystems.
const RESERVED_PATH_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// `"{Last} ({id})"`, with reserved path characters in the id replaced by `-`.
#[must_use]
pub fn author_dirname(author: &AuthorRecord) -> String {
    let id = sanitize_id(author.id());
    match names::surname(&author.name) {
        Some(last) if id.is_empty() => last,
        Some(last) => format!("{last} ({id})"),
        None if id.is_empty() => "unknown".to_string(),
        None => id,
    }
}

fn sanitize_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut prev_dash = false;
    for c in id.trim().chars() {
        if RESERVED_PATH_CHARS.contains(&c) || c.is_control() {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    out
}

/// Key stem shared by citation keys and file names: `{Last}{Year}`.
#[must_use]
pub fn key_stem(authors: &[String], year: Option<i32>) -> String {
    let last = authors
        .iter()
        .find_map(|name| names::surname(name))
        .unwrap_or_else(|| "Anon".to_string());
    let year = year.map_or_else(|| "0000".to_string(), |year| format!("{year:04}"));
    format!("{last}{year}")
}

/// `{Last}{Year}:{Short}`.
#[must_use]
pub fn citekey(stem: &str, short_title: &str) -> String {
    format!("{stem}:{short_title}")
}

/// `{Last}{Year}-{Short}.bib`, restricted to `[A-Za-z0-9_-]` and at most
/// `max_len` characters before the extension.
#[must_use]
pub fn bib_filename(stem: &str, short_title: &str, max_len: usize) -> String {
    let base: String = format!("{stem}-{short_title}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .take(max_len.max(1))
        .collect();
    format!("{base}.bib")
}

/// `name-N.bib` for collision number `n`.
#[must_use]
pub fn numbered(filename: &str, n: usize) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{filename}-{n}"),
    }
}
