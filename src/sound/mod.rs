//! # Sound Matching Module
//!
//! Deterministic keyword-to-effect mapping and the static effect library.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::EffectsConfig;

/// Maps free text to an optional effect identifier.
///
/// The rule list is ordered and the order is part of the contract: the
/// first rule whose keyword appears in the text wins, so "eating" beats
/// "water" when both occur. Matching is case-insensitive containment.
/// Pure and total; no input ever produces an error.
#[derive(Debug, Clone)]
pub struct SoundMatcher {
    rules: Vec<(String, String)>,
}

impl SoundMatcher {
    /// Build a matcher from an ordered `(keyword, effect_id)` rule list
    pub fn new(rules: Vec<(String, String)>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(kw, effect)| (kw.to_lowercase(), effect))
            .collect();
        Self { rules }
    }

    /// First matching rule wins; `None` when nothing matches
    pub fn match_effect(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| haystack.contains(keyword.as_str()))
            .map(|(_, effect)| effect.as_str())
    }
}

impl Default for SoundMatcher {
    fn default() -> Self {
        // Order matters: earlier rules take precedence
        Self::new(
            [
                ("eat", "eating"),
                ("fish", "water"),
                ("water", "water"),
                ("river", "water"),
                ("sea", "water"),
                ("rain", "water"),
                ("walk", "footsteps"),
                ("run", "footsteps"),
                ("wind", "wind"),
                ("storm", "wind"),
                ("bird", "birds"),
                ("forest", "birds"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        )
    }
}

/// Fixed mapping from effect identifier to audio asset path.
/// Supplied by configuration; read-only at runtime.
#[derive(Debug, Clone)]
pub struct EffectLibrary {
    assets: HashMap<String, PathBuf>,
}

impl EffectLibrary {
    pub fn from_config(config: &EffectsConfig) -> Self {
        let assets = config
            .library
            .iter()
            .map(|(id, path)| (id.clone(), PathBuf::from(path)))
            .collect();
        Self { assets }
    }

    pub fn resolve(&self, effect_id: &str) -> Option<&PathBuf> {
        self.assets.get(effect_id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_is_deterministic() {
        let matcher = SoundMatcher::default();
        let text = "a storm over the forest";
        assert_eq!(matcher.match_effect(text), matcher.match_effect(text));
    }

    #[test]
    fn test_first_rule_wins() {
        let matcher = SoundMatcher::default();
        // Both "eat" and "water" keywords appear; "eat" is listed first
        assert_eq!(
            matcher.match_effect("the cat is eating fish near water"),
            Some("eating")
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let matcher = SoundMatcher::default();
        assert_eq!(matcher.match_effect("RAIN on the roof"), Some("water"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let matcher = SoundMatcher::default();
        assert_eq!(matcher.match_effect("a quiet empty room"), None);
        assert_eq!(matcher.match_effect(""), None);
    }

    #[test]
    fn test_library_resolves_configured_paths() {
        let library = EffectLibrary::from_config(&EffectsConfig::default());
        assert!(library.resolve("eating").is_some());
        assert!(library.resolve("laser").is_none());
        assert!(!library.is_empty());
    }
}
