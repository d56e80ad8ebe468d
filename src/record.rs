//! Output row for one author line and its pipe-delimited rendering.

use std::fmt;
use std::io::{self, Write};

/// Literal used by the dump for a missing optional value.
pub const NULL_TOKEN: &str = "None";

/// Field separator of the normalized output.
pub const FIELD_SEP: char = '|';

/// Map the dump's null marker to an empty field; anything else passes through untouched.
#[inline]
pub fn replace_none(val: &str) -> &str {
    if val == NULL_TOKEN { "" } else { val }
}

/// One normalized author row. Borrows from the input line it was parsed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorRow<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub start_date: &'a str,   // account creation epoch, "" when missing
    pub end_date: &'a str,     // last-seen epoch, "" when missing
    pub karma_post: &'a str,
    pub karma_comment: &'a str,
    pub valid_username: bool,
}

impl<'a> AuthorRow<'a> {
    /// `"1"` or `"0"`, as loaded into the warehouse column.
    #[inline]
    pub fn validity_flag(&self) -> &'static str {
        if self.valid_username { "1" } else { "0" }
    }

    pub fn fields(&self) -> [&str; 7] {
        [
            self.user_id,
            self.username,
            self.start_date,
            self.end_date,
            self.karma_post,
            self.karma_comment,
            self.validity_flag(),
        ]
    }

    /// Write the row followed by a single `\n`.
    pub fn write_line<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for (i, f) in self.fields().iter().enumerate() {
            if i > 0 {
                w.write_all(b"|")?;
            }
            w.write_all(f.as_bytes())?;
        }
        w.write_all(b"\n")
    }

    /// Rendered row without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AuthorRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields().iter().enumerate() {
            if i > 0 {
                write!(f, "{}", FIELD_SEP)?;
            }
            f.write_str(field)?;
        }
        Ok(())
    }
}
