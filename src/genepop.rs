//! Genepop line classification and the crate-wide error type.
//!
//! A Genepop file is a title line, one locus name per line, then one or
//! more population blocks. Each block starts with a `pop` line and holds
//! individual records of the form `name, allele allele ...`. A record may
//! continue onto following lines that carry no comma.

use std::io;
use std::path::PathBuf;

use memchr::{memchr, memchr_iter};
use thiserror::Error;

use crate::config::{is_lenient_delimiters, FIELD_SEPARATOR, POP_TOKEN};
use crate::registry::SubsampleKind;

/// Errors that can occur while indexing, sampling or writing Genepop files.
#[derive(Error, Debug)]
pub enum GenepopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed Genepop file {}: {message}", path.display())]
    MalformedFormat { path: PathBuf, message: String },

    #[error("No {kind} subsample with tag '{tag}'")]
    UnknownTag { kind: SubsampleKind, tag: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid range term '{term}': {message}")]
    RangeParse { term: String, message: String },

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, GenepopError>;

/// What the text before the first comma of an individual's line holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameField {
    /// Exactly one comma; the trimmed text before it.
    Named(String),
    /// No comma at all.
    Missing,
    /// More than one comma, with the count found.
    Ambiguous(usize),
}

/// Strip a trailing `\n` or `\r\n`.
#[inline]
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Check if a raw line (terminator included) is a population delimiter.
///
/// Strict mode wants `pop` in any case followed directly by `\n` or `\r\n`.
/// A bare `pop` on the unterminated last line is accepted too, so a file
/// ending in an empty population keeps that population and still copies
/// byte for byte. Lenient mode also tolerates spaces and tabs around the
/// token.
#[inline]
pub fn is_pop_line(line: &[u8]) -> bool {
    let body = strip_line_ending(line);
    let body = if is_lenient_delimiters() {
        body.trim_ascii()
    } else {
        body
    };
    body.eq_ignore_ascii_case(POP_TOKEN)
}

/// Check if a line carries the name/genotype separator.
#[inline]
pub fn has_field_separator(line: &[u8]) -> bool {
    memchr(FIELD_SEPARATOR, line).is_some()
}

/// Extract the individual name from the first physical line of a record.
pub fn individual_name(line: &[u8]) -> NameField {
    let body = strip_line_ending(line);
    match memchr_iter(FIELD_SEPARATOR, body).count() {
        0 => NameField::Missing,
        1 => {
            let comma = memchr(FIELD_SEPARATOR, body).unwrap_or(body.len());
            NameField::Named(String::from_utf8_lossy(body[..comma].trim_ascii()).into_owned())
        }
        n => NameField::Ambiguous(n),
    }
}

/// Locus name carried by a header line.
#[inline]
pub fn locus_name(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_line_ending(line).trim_ascii()).into_owned()
}
