//! Content patching module
//!
//! Rewrites selected upstream text resources before they are served: each rule
//! applies ordered text patches (exact needle first, then a looser regex, first
//! occurrence only) and prepends a fixed snippet. Rules are idempotent, so patching
//! already-patched content returns it unchanged.

use super::shims;
use hyper::body::Bytes;
use regex::{NoExpand, Regex};
use std::sync::OnceLock;

/// One textual replacement
#[derive(Debug, Clone)]
pub struct TextPatch {
    pub needle: String,
    pub fallback: Regex,
    pub replacement: String,
}

/// Patch rule for resources whose path ends with `match_suffix`
#[derive(Debug, Clone)]
pub struct PatchRule {
    pub name: String,
    pub match_suffix: String,
    pub text_patches: Vec<TextPatch>,
    pub prepend_snippet: String,
}

/// Result of applying a rule to a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApplication {
    pub text: String,
    /// Every text patch is in effect (applied now or already present)
    pub matched: bool,
    /// At least one text patch needed the regex fallback
    pub used_fallback: bool,
}

/// Outcome of the first patch attempt for a rule, kept for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub matched: bool,
    pub used_fallback: bool,
}

/// Write-once record of a rule's first patch outcome
#[derive(Debug, Default)]
pub struct PatchRecord {
    first: OnceLock<PatchOutcome>,
}

impl PatchRecord {
    /// Store the outcome if none is recorded yet; true for the caller that stored it
    pub fn record(&self, outcome: PatchOutcome) -> bool {
        self.first.set(outcome).is_ok()
    }

    pub fn first(&self) -> Option<PatchOutcome> {
        self.first.get().copied()
    }
}

/// Apply one text patch; returns `(text, matched, used_fallback)`
pub fn apply_text_patch(text: &str, patch: &TextPatch) -> (String, bool, bool) {
    if text.contains(&patch.replacement) {
        return (text.to_string(), true, false);
    }
    if text.contains(&patch.needle) {
        return (text.replace(&patch.needle, &patch.replacement), true, false);
    }
    if patch.fallback.is_match(text) {
        let patched = patch
            .fallback
            .replacen(text, 1, NoExpand(&patch.replacement))
            .into_owned();
        return (patched, true, true);
    }
    (text.to_string(), false, false)
}

/// Apply a rule to a text. Pure, so it can be exercised without any I/O.
pub fn apply_rule(rule: &PatchRule, text: &str) -> RuleApplication {
    let mut current = text.to_string();
    let mut matched = true;
    let mut used_fallback = false;

    for patch in &rule.text_patches {
        let (next, patch_matched, patch_fallback) = apply_text_patch(&current, patch);
        current = next;
        matched &= patch_matched;
        used_fallback |= patch_fallback;
    }

    if !rule.prepend_snippet.is_empty() && !current.starts_with(&rule.prepend_snippet) {
        current.insert_str(0, &rule.prepend_snippet);
    }

    RuleApplication {
        text: current,
        matched,
        used_fallback,
    }
}

/// Process-wide set of patch rules with their diagnostic records
#[derive(Debug)]
pub struct ContentPatcher {
    rules: Vec<(PatchRule, PatchRecord)>,
}

impl ContentPatcher {
    pub fn new(rules: Vec<PatchRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule, PatchRecord::default()))
                .collect(),
        }
    }

    /// Rules for the cj3 runtime: import shim plus timer snippet for `cj3.js`,
    /// timer snippet alone for `loader.js`
    pub fn builtin() -> Result<Self, regex::Error> {
        let import_shim = TextPatch {
            needle: shims::CJ3_MISSING_IMPORT.to_string(),
            fallback: Regex::new(shims::CJ3_MISSING_IMPORT_PATTERN)?,
            replacement: shims::CJ3_IMPORT_SHIM.to_string(),
        };
        Ok(Self::new(vec![
            PatchRule {
                name: "cj3.js".to_string(),
                match_suffix: "/cj3.js".to_string(),
                text_patches: vec![import_shim],
                prepend_snippet: shims::MONOTONIC_TIMER_SNIPPET.to_string(),
            },
            PatchRule {
                name: "loader.js".to_string(),
                match_suffix: "/loader.js".to_string(),
                text_patches: Vec::new(),
                prepend_snippet: shims::MONOTONIC_TIMER_SNIPPET.to_string(),
            },
        ]))
    }

    /// Index of the first rule matching a request path
    pub fn rule_for(&self, path: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|(rule, _)| path.ends_with(&rule.match_suffix))
    }

    pub fn rule(&self, index: usize) -> Option<&PatchRule> {
        self.rules.get(index).map(|(rule, _)| rule)
    }

    pub fn record(&self, index: usize) -> Option<&PatchRecord> {
        self.rules.get(index).map(|(_, record)| record)
    }

    /// Patch a fetched body with rule `index`
    ///
    /// The body is decoded lossily; undecodable bytes become U+FFFD rather than
    /// failing the request. The first outcome per rule is logged once.
    pub fn patch(&self, index: usize, body: &[u8]) -> Option<Bytes> {
        let (rule, record) = self.rules.get(index)?;
        let text = String::from_utf8_lossy(body);
        let applied = apply_rule(rule, &text);

        if !rule.text_patches.is_empty() {
            let outcome = PatchOutcome {
                matched: applied.matched,
                used_fallback: applied.used_fallback,
            };
            if record.record(outcome) {
                crate::logger::log_patch_outcome(&rule.name, outcome.matched, outcome.used_fallback);
            }
        }

        Some(Bytes::from(applied.text.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cj3_body(core: &str) -> String {
        format!("var a=1;{core}var b=2;{core}")
    }

    #[test]
    fn test_exact_match_replaces_all() {
        let patcher = ContentPatcher::builtin().unwrap();
        let rule = patcher.rule(0).unwrap();
        let out = apply_rule(rule, &cj3_body(shims::CJ3_MISSING_IMPORT));
        assert!(out.matched);
        assert!(!out.used_fallback);
        assert!(out.text.starts_with(shims::MONOTONIC_TIMER_SNIPPET));
        assert_eq!(out.text.matches(shims::CJ3_IMPORT_SHIM).count(), 2);
        assert!(!out.text.contains(shims::CJ3_MISSING_IMPORT));
    }

    #[test]
    fn test_regex_fallback_replaces_first_only() {
        let patcher = ContentPatcher::builtin().unwrap();
        let rule = patcher.rule(0).unwrap();
        let drifted = r#"if(h===undefined){console.log("Missing import:",c);V();}"#;
        let out = apply_rule(rule, &cj3_body(drifted));
        assert!(out.matched);
        assert!(out.used_fallback);
        assert_eq!(out.text.matches(shims::CJ3_IMPORT_SHIM).count(), 1);
        assert_eq!(out.text.matches(drifted).count(), 1);
    }

    #[test]
    fn test_replacement_dollar_signs_kept_literal() {
        let patcher = ContentPatcher::builtin().unwrap();
        let rule = patcher.rule(0).unwrap();
        let drifted = r#"if(h===undefined){console.log("Missing import:",c);V();}"#;
        let out = apply_rule(rule, drifted);
        assert!(out.text.contains("h=$.a24[c]"));
    }

    #[test]
    fn test_no_match_still_prepends() {
        let patcher = ContentPatcher::builtin().unwrap();
        let rule = patcher.rule(0).unwrap();
        let out = apply_rule(rule, "console.log(1);");
        assert!(!out.matched);
        assert_eq!(
            out.text,
            format!("{}console.log(1);", shims::MONOTONIC_TIMER_SNIPPET)
        );
    }

    #[test]
    fn test_idempotent() {
        let patcher = ContentPatcher::builtin().unwrap();
        for index in 0..2 {
            let once = patcher
                .patch(index, cj3_body(shims::CJ3_MISSING_IMPORT).as_bytes())
                .unwrap();
            let twice = patcher.patch(index, &once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_rule_matching() {
        let patcher = ContentPatcher::builtin().unwrap();
        assert_eq!(patcher.rule_for("/cheerpj/4.2/cj3.js"), Some(0));
        assert_eq!(patcher.rule_for("/cheerpj/4.2/loader.js"), Some(1));
        assert_eq!(patcher.rule_for("/cheerpj/4.2/cj3.wasm"), None);
        assert_eq!(patcher.rule_for("/cheerpj/4.2/xcj3.js"), None);
    }

    #[test]
    fn test_lossy_decode() {
        let patcher = ContentPatcher::builtin().unwrap();
        let out = patcher.patch(1, b"ok\xff").unwrap();
        assert!(out.ends_with("ok\u{fffd}".as_bytes()));
    }

    #[test]
    fn test_first_outcome_recorded_once() {
        let patcher = ContentPatcher::builtin().unwrap();
        patcher.patch(0, b"nothing to patch");
        patcher.patch(0, shims::CJ3_MISSING_IMPORT.as_bytes());
        assert_eq!(
            patcher.record(0).unwrap().first(),
            Some(PatchOutcome {
                matched: false,
                used_fallback: false
            })
        );
        // snippet-only rules record nothing
        patcher.patch(1, b"x");
        assert_eq!(patcher.record(1).unwrap().first(), None);
    }
}
