//! User-supplied search terms.

/// An ordered set of search terms. Filtering ANDs them together, so
/// duplicates are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl KeywordSet {
    /// Builds a set from command-line arguments, ignoring empty ones.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: args
                .into_iter()
                .map(Into::into)
                .filter(|term| !term.is_empty())
                .collect(),
        }
    }

    /// Splits a line typed at the keyword prompt on whitespace.
    pub fn parse(line: &str) -> Self {
        Self::from_args(line.split_whitespace())
    }

    /// The terms in the order given.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True when there is nothing to match, in which case every
    /// non-comment line is visible.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_whitespace() {
        let set = KeywordSet::parse("  site1   alice ");
        assert_eq!(set.terms(), &["site1".to_string(), "alice".to_string()]);
    }

    #[test]
    fn test_blank_line_is_empty_set() {
        assert!(KeywordSet::parse("   ").is_empty());
        assert!(KeywordSet::from_args(vec![""]).is_empty());
    }

    #[test]
    fn test_from_args_keeps_order() {
        let set = KeywordSet::from_args(vec!["b", "a"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.terms()[0], "b");
    }
}
