//! Per-line parser/normalizer for author dump records.
//!
//! A record is six single-space separated fields:
//! `user_id username start_epoch end_epoch karma_post karma_comment`,
//! where the last four may be the literal `None`. Lines that do not match the layout
//! exactly are rejected whole; nothing is partially extracted.

use crate::config::UsernamePolicy;
use crate::record::{replace_none, AuthorRow};
use regex::Regex;
use thiserror::Error;

const LINE_PATTERN: &str =
    r"^(\d+) (.*?) (\d+|None) (\d+|None) (-?\d+|None) (-?\d+|None)$";
// Letters and numerics of any script, `_` and `-`. Combining marks are excluded and
// No/Nl numerics (e.g. `½`) included, matching Python's `str.isalnum` word class.
const USERNAME_PATTERN: &str = r"^[\p{L}\p{N}_-]+$";

/// Why a line was diverted to the rejects channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("line does not match the six-field author layout")]
    Malformed,
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Compiled patterns plus the username policy. Stateless between calls; build once and
/// share by reference (it is `Send + Sync`).
#[derive(Clone, Debug)]
pub struct RecordNormalizer {
    line_re: Regex,
    username_re: Regex,
    policy: UsernamePolicy,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(UsernamePolicy::default())
    }
}

impl RecordNormalizer {
    pub fn new(policy: UsernamePolicy) -> Self {
        // Both patterns are constants; a failure here is a programming error.
        let line_re = Regex::new(LINE_PATTERN).expect("valid author line pattern");
        let username_re = Regex::new(USERNAME_PATTERN).expect("valid username pattern");
        Self { line_re, username_re, policy }
    }

    pub fn policy(&self) -> UsernamePolicy {
        self.policy
    }

    /// Letters, numerics, `_` or `-`, at least one, and a character count inside the
    /// policy bounds.
    pub fn is_valid_username(&self, username: &str) -> bool {
        if !self.username_re.is_match(username) {
            return false;
        }
        let n = username.chars().count();
        self.policy.min_len <= n && n <= self.policy.max_len
    }

    /// Parse one line. Only a trailing `\n` is ignored; a `\r` before it is part of
    /// the record and fails the match.
    pub fn normalize<'a>(&self, line: &'a str) -> Result<AuthorRow<'a>, ParseFailure> {
        let body = strip_terminator(line);
        let caps = self.line_re.captures(body).ok_or(ParseFailure::Malformed)?;

        // Every group is mandatory in the pattern, so a match always fills all six.
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        let username = group(2);

        Ok(AuthorRow {
            user_id: group(1),
            username,
            start_date: replace_none(group(3)),
            end_date: replace_none(group(4)),
            karma_post: replace_none(group(5)),
            karma_comment: replace_none(group(6)),
            valid_username: self.is_valid_username(username),
        })
    }

    /// Byte-level entry point used by the stream driver.
    pub fn normalize_bytes<'a>(&self, raw: &'a [u8]) -> Result<AuthorRow<'a>, ParseFailure> {
        let line = std::str::from_utf8(raw).map_err(|_| ParseFailure::InvalidUtf8)?;
        self.normalize(line)
    }
}

#[inline]
fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}
