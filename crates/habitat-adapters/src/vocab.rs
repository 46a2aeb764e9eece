//! Synthetic vocabulary substitution.
//!
//! Experiments comparing policies can leak intent through loaded domain
//! terms ("steal", "deceive"). A configured mapping rewrites those terms
//! to neutral synonyms in the outgoing prompt and reverses the
//! substitution on the response before parsing, removing the lexical cue
//! without changing the decision surface.
//!
//! Replacement is longest-term-first in both directions so overlapping
//! terms ("share_info" vs "share") cannot partially rewrite each other.

use std::collections::BTreeMap;

/// A bidirectional term mapping.
#[derive(Debug, Clone, Default)]
pub struct VocabularyMap {
    /// `(domain term, neutral synonym)` pairs, longest domain term first.
    forward: Vec<(String, String)>,
    /// `(neutral synonym, domain term)` pairs, longest synonym first.
    reverse: Vec<(String, String)>,
}

impl VocabularyMap {
    /// Build a map from configuration. Empty input disables substitution.
    pub fn new(mapping: &BTreeMap<String, String>) -> Self {
        let mut forward: Vec<(String, String)> = mapping
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        forward.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut reverse: Vec<(String, String)> = mapping
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect();
        reverse.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self { forward, reverse }
    }

    /// Whether any substitution is configured.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Rewrite domain terms to neutral synonyms (outgoing prompt).
    pub fn apply(&self, text: &str) -> String {
        let mut rewritten = text.to_owned();
        for (term, synonym) in &self.forward {
            rewritten = rewritten.replace(term, synonym);
        }
        rewritten
    }

    /// Rewrite neutral synonyms back to domain terms (incoming response).
    pub fn reverse(&self, text: &str) -> String {
        let mut rewritten = text.to_owned();
        for (synonym, term) in &self.reverse {
            rewritten = rewritten.replace(synonym, term);
        }
        rewritten
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_map(pairs: &[(&str, &str)]) -> VocabularyMap {
        let mapping: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        VocabularyMap::new(&mapping)
    }

    #[test]
    fn round_trips_simple_terms() {
        let vocab = make_map(&[("steal", "borrow"), ("harm", "nudge")]);
        let prompt = vocab.apply("You may steal or harm.");
        assert_eq!(prompt, "You may borrow or nudge.");
        let response = vocab.reverse("{\"action\": \"borrow\"}");
        assert_eq!(response, "{\"action\": \"steal\"}");
    }

    #[test]
    fn longest_term_wins() {
        let vocab = make_map(&[("share_info", "relay"), ("share", "split")]);
        assert_eq!(vocab.apply("share_info and share"), "relay and split");
        assert_eq!(vocab.reverse("relay and split"), "share_info and share");
    }

    #[test]
    fn empty_map_is_identity() {
        let vocab = make_map(&[]);
        assert!(vocab.is_empty());
        assert_eq!(vocab.apply("untouched"), "untouched");
        assert_eq!(vocab.reverse("untouched"), "untouched");
    }
}
