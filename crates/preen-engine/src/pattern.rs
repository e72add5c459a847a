//! Ordered include/exclude glob rules with last-match-wins semantics

use glob::{MatchOptions, Pattern, PatternError};

use crate::relpath::RelPath;

/// An ordered set of include/exclude glob patterns.
///
/// A name matches when the LAST pattern matching it has include polarity;
/// the initial state is "no match". Registration order is therefore
/// significant, which is why patterns are stored as an ordered list and
/// every lookup scans them all - lookups are bounded by tree size and
/// happen once per entry, not per byte.
#[derive(Debug, Default)]
pub struct PatternSet {
    patterns: Vec<(Pattern, bool)>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern with the given polarity. Rejects malformed globs.
    pub fn add(&mut self, pattern: &str, include: bool) -> Result<(), PatternError> {
        self.patterns.push((Pattern::new(pattern)?, include));
        Ok(())
    }

    /// Whether `name` matches the set.
    pub fn matches(&self, name: &RelPath) -> bool {
        // `*` stays within one path component; `**` crosses components
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        let mut matched = false;
        for (pattern, include) in &self.patterns {
            if pattern.matches_with(name.as_str(), options) {
                matched = *include;
            }
        }
        matched
    }

    /// The include-polarity globs, in registration order. The remove pass
    /// expands these against the target root before filtering through
    /// [`matches`](Self::matches).
    pub fn include_globs(&self) -> impl Iterator<Item = &str> {
        self.patterns
            .iter()
            .filter(|(_, include)| *include)
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
