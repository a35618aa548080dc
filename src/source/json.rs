//! Serde helpers for the loosely-typed JSON the bibliographic APIs return.

use serde::Deserialize;

/// A JSON value that is sometimes a single item and sometimes a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// A number that some APIs serialize as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseInt {
    Int(i64),
    Text(String),
}

impl LooseInt {
    pub(crate) fn as_year(&self) -> Option<i32> {
        match self {
            Self::Int(value) => i32::try_from(*value).ok(),
            Self::Text(text) => year_from_text(text),
        }
    }
}

/// CSL / Crossref `{"date-parts": [[2021, 3, 1]]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DateParts {
    #[serde(default, rename = "date-parts")]
    pub date_parts: Vec<Vec<Option<LooseInt>>>,
}

impl DateParts {
    pub(crate) fn year(&self) -> Option<i32> {
        self.date_parts
            .first()
            .and_then(|parts| parts.first())
            .and_then(Option::as_ref)
            .and_then(LooseInt::as_year)
    }
}

/// First plausible four-digit year (1800-2099) in free text such as `"2021 Mar"`.
pub(crate) fn year_from_text(text: &str) -> Option<i32> {
    text.as_bytes()
        .windows(4)
        .enumerate()
        .filter(|(start, window)| {
            window.iter().all(u8::is_ascii_digit)
                && !text.as_bytes()[..*start]
                    .last()
                    .is_some_and(u8::is_ascii_digit)
                && !text.as_bytes()
                    .get(start + 4)
                    .is_some_and(u8::is_ascii_digit)
        })
        .filter_map(|(start, _)| text.get(start..start + 4)?.parse::<i32>().ok())
        .find(|year| (1800..=2099).contains(year))
}

/// First non-empty string of a title-like value.
pub(crate) fn first_text(values: Option<OneOrMany<String>>) -> Option<String> {
    values?
        .into_vec()
        .into_iter()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
