//! Cosmetic rule hit channel
//!
//! Content scripts cannot report which element-hiding rule fired, so every
//! injected rule carries a background image pointing at a fixed pseudo-URL:
//!
//! ```text
//! chrome-extension://<id>/elemhidehit.png#<filterId>;<ruleText>
//! ```
//!
//! The fragment is percent-encoded. Intercepting that request tells us which
//! rule hid something on which page.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::url::{fragment, percent_decode, percent_encode_component};

/// A decoded hit report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRuleHit {
    pub filter_id: String,
    pub rule_text: String,
}

/// Decode the `filterId;ruleText` payload of a hit URL.
///
/// Returns `None` when the URL has no fragment, the fragment has no `;`, or
/// the fragment is not valid percent-encoded UTF-8.
pub fn parse_css_rule_from_url(url: &str) -> Option<CssRuleHit> {
    let payload = percent_decode(fragment(url)?)?;
    let (filter_id, rule_text) = payload.split_once(';')?;
    Some(CssRuleHit {
        filter_id: filter_id.to_string(),
        rule_text: rule_text.to_string(),
    })
}

/// Build the hit URL for a rule, relative to the channel's base URL.
pub fn encode_css_rule_hit_url(base_url: &str, filter_id: &str, rule_text: &str) -> String {
    format!(
        "{}#{};{}",
        base_url,
        percent_encode_component(filter_id),
        percent_encode_component(rule_text)
    )
}

// =============================================================================
// Hit Counter
// =============================================================================

/// Sink for cosmetic rule hits.
pub trait HitCounter: Send + Sync {
    /// Attribute one hit of `rule_text` from filter `filter_id` on `domain`.
    fn add_rule_hit(&self, domain: Option<&str>, rule_text: &str, filter_id: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitKey {
    pub domain: Option<String>,
    pub rule_text: String,
    pub filter_id: String,
}

/// In-memory [`HitCounter`].
#[derive(Debug, Default)]
pub struct RuleHitCounter {
    hits: Mutex<HashMap<HitKey, u64>>,
}

impl RuleHitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, domain: Option<&str>, rule_text: &str, filter_id: &str) -> u64 {
        let key = HitKey {
            domain: domain.map(str::to_string),
            rule_text: rule_text.to_string(),
            filter_id: filter_id.to_string(),
        };
        self.hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// All counters, sorted by key.
    pub fn snapshot(&self) -> Vec<(HitKey, u64)> {
        let mut entries: Vec<_> = self
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        entries.sort();
        entries
    }
}

impl HitCounter for RuleHitCounter {
    fn add_rule_hit(&self, domain: Option<&str>, rule_text: &str, filter_id: &str) {
        let key = HitKey {
            domain: domain.map(str::to_string),
            rule_text: rule_text.to_string(),
            filter_id: filter_id.to_string(),
        };
        *self
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "chrome-extension://abcdef/elemhidehit.png";

    #[test]
    fn test_round_trip() {
        let url = encode_css_rule_hit_url(BASE, "12", "##div.ad");
        assert_eq!(url, "chrome-extension://abcdef/elemhidehit.png#12;%23%23div.ad");
        assert_eq!(
            parse_css_rule_from_url(&url),
            Some(CssRuleHit {
                filter_id: "12".to_string(),
                rule_text: "##div.ad".to_string(),
            })
        );
    }

    #[test]
    fn test_rule_text_keeps_later_separators() {
        let hit = parse_css_rule_from_url(&format!("{}#3;example.org##a[href%3D%22x%3By%22]", BASE)).expect("hit");
        assert_eq!(hit.filter_id, "3");
        assert_eq!(hit.rule_text, "example.org##a[href=\"x;y\"]");
    }

    #[test]
    fn test_malformed_payloads() {
        assert_eq!(parse_css_rule_from_url(BASE), None);
        assert_eq!(parse_css_rule_from_url(&format!("{}#12", BASE)), None);
        assert_eq!(parse_css_rule_from_url(&format!("{}#12;bad%G0", BASE)), None);
        assert_eq!(parse_css_rule_from_url(""), None);
    }

    #[test]
    fn test_counter_accumulates_per_key() {
        let counter = RuleHitCounter::new();
        counter.add_rule_hit(Some("example.com"), "##.ad", "1");
        counter.add_rule_hit(Some("example.com"), "##.ad", "1");
        counter.add_rule_hit(Some("other.com"), "##.ad", "1");

        assert_eq!(counter.count(Some("example.com"), "##.ad", "1"), 2);
        assert_eq!(counter.count(Some("other.com"), "##.ad", "1"), 1);
        assert_eq!(counter.count(None, "##.ad", "1"), 0);
        assert_eq!(counter.snapshot().len(), 2);
    }
}
