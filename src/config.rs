//! Format tokens and global configuration for Genepop parsing.
//!
//! The constants here are the only place the Genepop and range-string
//! syntax is spelled out. The lenient-delimiter flag is process-wide and
//! read once per scanned line.

use std::sync::atomic::{AtomicBool, Ordering};

/// Population delimiter token, matched case-insensitively.
pub const POP_TOKEN: &[u8] = b"pop";

/// Separates an individual's name from its genotype fields.
pub const FIELD_SEPARATOR: u8 = b',';

/// Native min/max separator in range strings. Unambiguous with negative numbers.
pub const MINMAX_DELIMITER: char = '~';

/// Convenience min/max separator, rewritten to [`MINMAX_DELIMITER`] before parsing.
pub const HYPHEN_DELIMITER: char = '-';

/// Separates a range's max from its step (`4-10:2`).
pub const STEP_DELIMITER: char = ':';

/// Separates terms in a range string.
pub const RANGE_TERM_DELIMITER: char = ',';

/// Global flag for whitespace-tolerant population delimiters.
///
/// Strict mode (the default) only accepts `pop` immediately followed by a
/// line ending. Lenient mode also accepts spaces and tabs around the token.
static LENIENT_DELIMITERS: AtomicBool = AtomicBool::new(false);

/// Enable or disable whitespace-tolerant `pop` delimiters.
///
/// Set this before building an index; offsets recorded under one setting
/// are not re-classified when it changes.
///
/// # Example
///
/// ```
/// use genepop_index::config;
///
/// config::set_lenient_delimiters(true);
/// // "  Pop \r\n" now starts a population
/// config::set_lenient_delimiters(false);
/// ```
#[inline]
pub fn set_lenient_delimiters(enabled: bool) {
    LENIENT_DELIMITERS.store(enabled, Ordering::Release);
}

/// Check if whitespace-tolerant delimiters are enabled.
#[inline]
pub fn is_lenient_delimiters() -> bool {
    LENIENT_DELIMITERS.load(Ordering::Acquire)
}
