//! Identifier and BibTeX parsing.
//!
//! # Example
//!
//! ```
//! use citeforge_core::parser::{find_doi_in_text, parse_bibtex};
//!
//! assert_eq!(find_doi_in_text("see doi:10.1000/XYZ.").as_deref(), Some("10.1000/xyz"));
//!
//! let parsed = parse_bibtex("@article{k, title = {T}, year = {2020}}");
//! assert_eq!(parsed.entries[0].year(), Some(2020));
//! ```

pub mod bibtex;
pub mod doi;

pub use bibtex::{BibtexEntry, BibtexParseResult, parse_bibtex};
pub use doi::{
    arxiv_id_from_doi, extract_dois, find_arxiv_id, find_doi_in_html, find_doi_in_text,
    is_arxiv_doi, is_preprint_doi, normalize_arxiv_id, normalize_doi,
};
