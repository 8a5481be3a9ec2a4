//! Rule engine collaborators
//!
//! The interceptor never matches URLs itself. It asks a [`RuleEngine`] for the
//! rule that applies to a request and a [`SafebrowsingService`] whether a
//! document should be replaced by a warning page.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use wildmatch::WildMatch;

use crate::headers::HttpHeader;
use crate::types::RequestType;
use crate::url::extract_host;

// =============================================================================
// Traits
// =============================================================================

/// A filter rule that matched a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRule {
    /// Rule text as written in the filter list
    pub rule_text: String,
    /// Filter list the rule came from
    pub filter_id: u32,
    /// Exception rule (`@@...`) - allows the request
    pub whitelist: bool,
}

/// Lookup and bookkeeping side of the filtering engine.
pub trait RuleEngine: Send + Sync {
    /// Find the rule deciding this request, if any.
    fn get_rule_for_request(
        &self,
        tab_id: i32,
        url: &str,
        referrer: Option<&str>,
        request_type: RequestType,
    ) -> Option<RequestRule>;

    /// Statistics and UI updates after a decision has been made.
    fn post_process_request(
        &self,
        tab_id: i32,
        url: &str,
        referrer: Option<&str>,
        request_type: RequestType,
        rule: Option<&RequestRule>,
    );

    /// Whether the rule cancels the request.
    fn is_request_blocked_by_rule(&self, rule: Option<&RequestRule>) -> bool {
        rule.is_some_and(|rule| !rule.whitelist)
    }

    /// Inspect response headers (tracking, injection decisions).
    fn process_request_response(
        &self,
        tab_id: i32,
        url: &str,
        referrer: Option<&str>,
        request_type: RequestType,
        headers: &[HttpHeader],
    );
}

/// Remote or local safebrowsing lookup.
#[async_trait]
pub trait SafebrowsingService: Send + Sync {
    /// Returns the warning page to show instead of `url`, if the URL is
    /// known to be dangerous. `back_url` is where the warning page sends the
    /// user back to.
    async fn check_safebrowsing_filter(&self, url: &str, back_url: &str) -> Option<String>;
}

// =============================================================================
// Static Rule Engine
// =============================================================================

#[derive(Debug, Clone)]
enum RulePattern {
    /// `||host^`: the host or any of its subdomains
    Host(String),
    /// Anything else, matched as a substring glob over the full URL
    Glob(WildMatch),
}

impl RulePattern {
    fn matches(&self, url: &str) -> bool {
        match self {
            Self::Host(domain) => extract_host(url).is_some_and(|host| {
                let host = host.to_ascii_lowercase();
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }),
            Self::Glob(glob) => glob.matches(url),
        }
    }
}

#[derive(Debug, Clone)]
struct StaticRule {
    pattern: RulePattern,
    rule: RequestRule,
}

/// Minimal in-memory [`RuleEngine`].
///
/// Understands `||host^` anchors, plain substring patterns with `*`
/// wildcards and `@@` exceptions. Options after `$` and cosmetic rules are
/// ignored. Exceptions win over blocking rules.
#[derive(Debug, Default)]
pub struct StaticRuleEngine {
    rules: Vec<StaticRule>,
    blocked: Mutex<HashMap<i32, u64>>,
}

impl StaticRuleEngine {
    /// Parse a filter list.
    pub fn parse(text: &str, filter_id: u32) -> Self {
        let mut rules = Vec::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('!') || line.starts_with('[') || line.contains("##") {
                continue;
            }

            let (whitelist, body) = match line.strip_prefix("@@") {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let pattern_text = body.split_once('$').map_or(body, |(pattern, _)| pattern);
            if pattern_text.is_empty() {
                continue;
            }

            let pattern = match pattern_text
                .strip_prefix("||")
                .and_then(|rest| rest.strip_suffix('^'))
                .filter(|domain| !domain.contains(['/', '*']))
            {
                Some(domain) => RulePattern::Host(domain.to_ascii_lowercase()),
                None => RulePattern::Glob(WildMatch::new(&format!(
                    "*{}*",
                    pattern_text.trim_start_matches('|').trim_end_matches(['|', '^'])
                ))),
            };

            rules.push(StaticRule {
                pattern,
                rule: RequestRule {
                    rule_text: line.to_string(),
                    filter_id,
                    whitelist,
                },
            });
        }

        log::debug!("parsed {} request rules for filter {}", rules.len(), filter_id);
        Self {
            rules,
            blocked: Mutex::new(HashMap::new()),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Requests blocked in a tab so far.
    pub fn blocked_count(&self, tab_id: i32) -> u64 {
        self.blocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tab_id)
            .copied()
            .unwrap_or(0)
    }
}

impl RuleEngine for StaticRuleEngine {
    fn get_rule_for_request(
        &self,
        _tab_id: i32,
        url: &str,
        _referrer: Option<&str>,
        _request_type: RequestType,
    ) -> Option<RequestRule> {
        let mut blocking = None;
        for candidate in self.rules.iter().filter(|r| r.pattern.matches(url)) {
            if candidate.rule.whitelist {
                return Some(candidate.rule.clone());
            }
            blocking.get_or_insert(&candidate.rule);
        }
        blocking.cloned()
    }

    fn post_process_request(
        &self,
        tab_id: i32,
        url: &str,
        _referrer: Option<&str>,
        _request_type: RequestType,
        rule: Option<&RequestRule>,
    ) {
        if self.is_request_blocked_by_rule(rule) {
            log::debug!("tab {}: blocked {}", tab_id, url);
            *self
                .blocked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(tab_id)
                .or_insert(0) += 1;
        }
    }

    fn process_request_response(
        &self,
        tab_id: i32,
        url: &str,
        _referrer: Option<&str>,
        request_type: RequestType,
        headers: &[HttpHeader],
    ) {
        log::trace!("tab {}: response {:?} {} ({} headers)", tab_id, request_type, url, headers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "! comment\n||ads.example.com^\n/banner/*.gif\n@@||ads.example.com/allowed/\nexample.org##.ad\n";

    #[test]
    fn test_parse_skips_comments_and_cosmetics() {
        let engine = StaticRuleEngine::parse(LIST, 3);
        assert_eq!(engine.rule_count(), 3);
    }

    #[test]
    fn test_host_anchor_matches_subdomains() {
        let engine = StaticRuleEngine::parse("||example.com^", 1);
        let hit = engine.get_rule_for_request(1, "https://cdn.example.com/x.js", None, RequestType::SCRIPT);
        assert_eq!(hit.map(|r| r.rule_text), Some("||example.com^".to_string()));
        assert!(engine
            .get_rule_for_request(1, "https://notexample.com/x.js", None, RequestType::SCRIPT)
            .is_none());
    }

    #[test]
    fn test_exception_wins() {
        let engine = StaticRuleEngine::parse(LIST, 3);
        let rule = engine
            .get_rule_for_request(1, "https://ads.example.com/allowed/a.js", None, RequestType::SCRIPT)
            .expect("rule");
        assert!(rule.whitelist);
        assert!(!engine.is_request_blocked_by_rule(Some(&rule)));
    }

    #[test]
    fn test_glob_pattern() {
        let engine = StaticRuleEngine::parse(LIST, 3);
        let rule = engine.get_rule_for_request(1, "https://site.example/banner/top.gif", None, RequestType::IMAGE);
        assert!(engine.is_request_blocked_by_rule(rule.as_ref()));
    }

    #[test]
    fn test_post_process_counts_blocked_requests() {
        let engine = StaticRuleEngine::parse("||ads.example.com^", 1);
        let url = "https://ads.example.com/a.js";
        let rule = engine.get_rule_for_request(5, url, None, RequestType::SCRIPT);
        engine.post_process_request(5, url, None, RequestType::SCRIPT, rule.as_ref());
        engine.post_process_request(5, "https://ok.example/", None, RequestType::SCRIPT, None);
        assert_eq!(engine.blocked_count(5), 1);
        assert_eq!(engine.blocked_count(6), 0);
    }
}
