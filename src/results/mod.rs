//! The in-memory result set: decrypted lines, their visibility and the
//! fingerprint of the bytes they were decoded from.
//!
//! Filtering never removes entries. It only flips their `visible` flag, so a
//! broader keyword set restores lines hidden by a narrower one without
//! decrypting again. Lines beginning with `#` are comments and are never
//! visible.

pub mod fingerprint;
pub mod keywords;

pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use keywords::KeywordSet;

use crate::constants::REDACTED_PLACEHOLDER;
use crate::errors::{AppError, AppResult};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::io::{BufRead, Write};
use zeroize::Zeroize;

const COMMENT_PREFIX: char = '#';
const TRAILING_WHITESPACE: &[u8] = b" \t\r\n";

/// How keywords are matched against lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Case-insensitive substring match.
    #[default]
    Plain,
    /// Each keyword is a case-insensitive regular expression.
    Regex,
}

/// One decrypted line.
///
/// The text is wiped from memory when the entry is dropped and never shows
/// up in `Debug` output.
pub struct Entry {
    text: String,
    visible: bool,
}

impl Entry {
    fn new(text: String) -> Self {
        let visible = !text.starts_with(COMMENT_PREFIX);
        Self { text, visible }
    }

    /// The line without trailing whitespace.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the last filter pass selected this line.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the line is a comment.
    pub fn is_comment(&self) -> bool {
        self.text.starts_with(COMMENT_PREFIX)
    }

    /// Length of the text in bytes.
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("text", &REDACTED_PLACEHOLDER)
            .field("visible", &self.visible)
            .finish()
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.text.zeroize();
    }
}

/// Decrypted lines in store order.
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: Vec<Entry>,
    fingerprint: Option<Fingerprint>,
}

enum Matcher {
    Plain(Vec<String>),
    Regex(Vec<Regex>),
}

impl Matcher {
    fn compile(keywords: &KeywordSet, mode: FilterMode) -> AppResult<Self> {
        match mode {
            FilterMode::Plain => Ok(Matcher::Plain(
                keywords.terms().iter().map(|t| t.to_lowercase()).collect(),
            )),
            FilterMode::Regex => keywords
                .terms()
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| AppError::InvalidPattern {
                            pattern: pattern.clone(),
                            source,
                        })
                })
                .collect::<AppResult<Vec<_>>>()
                .map(Matcher::Regex),
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Plain(terms) => {
                if terms.is_empty() {
                    return true;
                }
                let mut lowered = text.to_lowercase();
                let matched = terms.iter().all(|term| lowered.contains(term.as_str()));
                lowered.zeroize();
                matched
            }
            Matcher::Regex(patterns) => patterns.iter().all(|re| re.is_match(text)),
        }
    }
}

impl ResultSet {
    /// Reads lines until end of stream.
    ///
    /// Each line has trailing whitespace removed and must be valid UTF-8; a
    /// line that is not aborts the load without surfacing partial results.
    /// The raw bytes, line terminators included, are folded into the set's
    /// fingerprint.
    pub fn load<R: BufRead>(mut reader: R) -> AppResult<Self> {
        let mut entries = Vec::new();
        let mut builder = FingerprintBuilder::default();
        let mut line = Vec::new();

        loop {
            line.zeroize();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            builder.update(&line);

            let end = line
                .iter()
                .rposition(|b| !TRAILING_WHITESPACE.contains(b))
                .map_or(0, |i| i + 1);
            let text = match String::from_utf8(line[..end].to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    e.into_bytes().zeroize();
                    line.zeroize();
                    return Err(AppError::Decode {
                        line: entries.len() + 1,
                    });
                }
            };
            entries.push(Entry::new(text));
        }
        line.zeroize();

        Ok(Self {
            entries,
            fingerprint: Some(builder.finish()),
        })
    }

    /// Recomputes visibility for every entry.
    ///
    /// An empty keyword set selects every non-comment line. Returns the
    /// number of visible entries.
    pub fn filter(&mut self, keywords: &KeywordSet, mode: FilterMode) -> AppResult<usize> {
        let matcher = Matcher::compile(keywords, mode)?;
        for entry in &mut self.entries {
            entry.visible = !entry.is_comment() && matcher.matches(&entry.text);
        }
        Ok(self.visible_count())
    }

    /// All entries in store order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Visible entries in store order.
    pub fn visible(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.visible)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store was absent or had no lines.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of visible entries.
    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    /// Character length of the longest visible entry.
    pub fn widest_visible(&self) -> usize {
        self.visible().map(Entry::char_len).max().unwrap_or(0)
    }

    /// Fingerprint of the bytes the set was loaded from, or `None` for a set
    /// that was never loaded (absent store).
    ///
    /// Edits detect changes against the written plaintext file instead, so
    /// this one only tells whether writing the set out normalised it.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    /// Writes every entry, comments included, one per line.
    pub fn write_plaintext<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for entry in &self.entries {
            out.write_all(entry.text.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn load(text: &str) -> ResultSet {
        ResultSet::load(Cursor::new(text.as_bytes().to_vec())).unwrap()
    }

    fn visible_texts(set: &ResultSet) -> Vec<&str> {
        set.visible().map(Entry::text).collect()
    }

    #[test]
    fn test_load_strips_trailing_whitespace_and_keeps_order() {
        let set = load("b line \t\r\na line\n\nc line");
        let texts: Vec<&str> = set.entries().iter().map(Entry::text).collect();
        assert_eq!(texts, vec!["b line", "a line", "", "c line"]);
    }

    #[test]
    fn test_load_fingerprints_raw_bytes() {
        let raw = "site1 alice pw1  \nsite2 bob pw2\n";
        let set = load(raw);
        assert_eq!(set.fingerprint(), Some(Fingerprint::of_bytes(raw.as_bytes())));
    }

    #[test]
    fn test_load_rejects_invalid_utf8_with_line_number() {
        let bytes = b"ok\n\xff\xfe broken\n".to_vec();
        match ResultSet::load(Cursor::new(bytes)) {
            Err(AppError::Decode { line }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_keyword_selects_matching_line() {
        let mut set = load("site1 alice pw1\nsite2 bob pw2\n");
        let count = set
            .filter(&KeywordSet::from_args(vec!["site1"]), FilterMode::Plain)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(visible_texts(&set), vec!["site1 alice pw1"]);
    }

    #[test]
    fn test_comments_are_hidden_without_keywords() {
        let mut set = load("# disabled entry\nlive entry\n");
        set.filter(&KeywordSet::default(), FilterMode::Plain).unwrap();
        assert_eq!(visible_texts(&set), vec!["live entry"]);
    }

    #[test]
    fn test_comments_are_hidden_even_when_matching() {
        let mut set = load("# disabled entry\nlive entry\n");
        for mode in [FilterMode::Plain, FilterMode::Regex] {
            set.filter(&KeywordSet::from_args(vec!["disabled"]), mode).unwrap();
            assert_eq!(set.visible_count(), 0);
            set.filter(&KeywordSet::from_args(vec!["#"]), mode).unwrap();
            assert_eq!(set.visible_count(), 0);
        }
    }

    #[test]
    fn test_plain_match_is_case_insensitive_and_conjunctive() {
        let mut set = load("GitHub alice s3cret\ngithub bob hunter2\nGitLab alice x\n");
        set.filter(&KeywordSet::from_args(vec!["github", "ALICE"]), FilterMode::Plain)
            .unwrap();
        assert_eq!(visible_texts(&set), vec!["GitHub alice s3cret"]);
    }

    #[test]
    fn test_regex_mode_compiles_each_keyword() {
        let mut set = load("site1 alice\nsite2 bob\nsite10 carol\n");
        set.filter(&KeywordSet::from_args(vec![r"^SITE\d$"]), FilterMode::Regex)
            .unwrap();
        assert_eq!(set.visible_count(), 0);

        set.filter(&KeywordSet::from_args(vec![r"^site\d "]), FilterMode::Regex)
            .unwrap();
        assert_eq!(visible_texts(&set), vec!["site1 alice", "site2 bob"]);
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let mut set = load("a\n");
        let result = set.filter(&KeywordSet::from_args(vec!["("]), FilterMode::Regex);
        assert!(matches!(result, Err(AppError::InvalidPattern { .. })));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut set = load("alpha one\nbeta two\nalpha three\n# alpha\n");
        let keywords = KeywordSet::from_args(vec!["alpha"]);
        set.filter(&keywords, FilterMode::Plain).unwrap();
        let first: Vec<bool> = set.entries().iter().map(Entry::is_visible).collect();
        set.filter(&keywords, FilterMode::Plain).unwrap();
        let second: Vec<bool> = set.entries().iter().map(Entry::is_visible).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_broadening_never_reduces_visible_count() {
        let mut set = load("alpha one\nbeta two\nalpha three\ngamma one\n");
        let narrow = set
            .filter(&KeywordSet::from_args(vec!["alpha", "one"]), FilterMode::Plain)
            .unwrap();
        let broad = set
            .filter(&KeywordSet::from_args(vec!["one"]), FilterMode::Plain)
            .unwrap();
        let broadest = set.filter(&KeywordSet::default(), FilterMode::Plain).unwrap();
        assert!(narrow <= broad && broad <= broadest);
        assert_eq!((narrow, broad, broadest), (1, 2, 4));
    }

    #[test]
    fn test_widest_visible_counts_characters() {
        let mut set = load("short\nmüñchen long\n");
        set.filter(&KeywordSet::default(), FilterMode::Plain).unwrap();
        assert_eq!(set.widest_visible(), 12);
        assert_eq!(set.entries()[1].byte_len(), 14);

        set.filter(&KeywordSet::from_args(vec!["short"]), FilterMode::Plain)
            .unwrap();
        assert_eq!(set.widest_visible(), 5);
    }

    #[test]
    fn test_write_plaintext_round_trips_normalized_lines() {
        let set = load("one  \n# two\nthree");
        let mut out = Vec::new();
        set.write_plaintext(&mut out).unwrap();
        assert_eq!(out, b"one\n# two\nthree\n");
    }

    #[test]
    fn test_empty_stream_yields_empty_set() {
        let set = load("");
        assert!(set.is_empty());
        assert_eq!(set.widest_visible(), 0);
    }
}
