//! Request log replay
//!
//! Feeds a JSON log of browser request events through a [`RequestInterceptor`]
//! wired to in-memory collaborators and records what it decided.
//!
//! ```json
//! {
//!   "rules": ["||ads.example.net^"],
//!   "safebrowsing": ["malware.example"],
//!   "events": [
//!     { "phase": "before_request", "tab_id": 1, "url": "https://news.example.com/", "type": "main_frame" },
//!     { "phase": "before_request", "tab_id": 1, "request_frame_id": 0, "url": "https://ads.example.net/a.js", "type": "script" },
//!     { "phase": "filter", "event": "ADD_RULE" }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use sift_core::engine::{SafebrowsingService, StaticRuleEngine};
use sift_core::frames::{FramesMap, TabFlags};
use sift_core::hits::{HitKey, RuleHitCounter};
use sift_core::tabs::{TabController, TabError};
use sift_core::url::{extract_host, percent_encode_component};
use sift_core::{
    Collaborators, FilterEvent, HandlerBehaviorListener, HeadersVerdict, HttpHeader, InterceptorConfig,
    RequestContext, RequestInterceptor, RequestType,
};

#[derive(Debug, Deserialize)]
pub struct ReplayLog {
    /// Request rules, one per entry
    #[serde(default)]
    pub rules: Vec<String>,
    /// Hosts the safebrowsing stub flags
    #[serde(default)]
    pub safebrowsing: Vec<String>,
    pub events: Vec<ReplayEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReplayEvent {
    BeforeRequest(ReplayRequest),
    BeforeSendHeaders(ReplayRequest),
    HeadersReceived(ReplayRequest),
    TabFlags {
        tab_id: i32,
        #[serde(default)]
        whitelisted: bool,
        #[serde(default)]
        companion_whitelisted: bool,
        #[serde(default)]
        companion_detected: bool,
        #[serde(default)]
        protection_disabled: bool,
    },
    CloseTab {
        tab_id: i32,
    },
    Filter {
        event: FilterEvent,
    },
    Wait {
        ms: u64,
    },
}

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub tab_id: i32,
    #[serde(default)]
    pub frame_id: i32,
    #[serde(default = "no_frame")]
    pub request_frame_id: i32,
    pub url: String,
    #[serde(rename = "type", default = "other_type")]
    pub request_type: String,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
}

fn no_frame() -> i32 {
    sift_core::types::NO_FRAME_ID
}

fn other_type() -> String {
    "other".to_string()
}

impl ReplayRequest {
    fn context(&self) -> RequestContext<'_> {
        RequestContext::new(
            self.tab_id,
            self.frame_id,
            self.request_frame_id,
            &self.url,
            RequestType::from_str(&self.request_type),
        )
    }

    fn describe(&self, phase: &str) -> String {
        format!(
            "{} tab={} frame={} {} {}",
            phase, self.tab_id, self.frame_id, self.request_type, self.url
        )
    }
}

// =============================================================================
// In-memory Collaborators
// =============================================================================

type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, line: String) {
    journal.lock().unwrap_or_else(PoisonError::into_inner).push(line);
}

/// Flags every URL on one of `hosts` (or their subdomains).
struct HostListSafebrowsing {
    hosts: Vec<String>,
}

#[async_trait]
impl SafebrowsingService for HostListSafebrowsing {
    async fn check_safebrowsing_filter(&self, url: &str, back_url: &str) -> Option<String> {
        let host = extract_host(url)?;
        let flagged = self
            .hosts
            .iter()
            .any(|listed| host == listed || host.ends_with(&format!(".{}", listed)));

        flagged.then(|| {
            format!(
                "sift://safebrowsing?url={}&back={}",
                percent_encode_component(url),
                percent_encode_component(back_url)
            )
        })
    }
}

struct JournalTabs {
    journal: Journal,
}

#[async_trait]
impl TabController for JournalTabs {
    fn update_tab_button_state(&self, tab_id: i32, reset: bool) {
        log::trace!("tab {}: button state (reset={})", tab_id, reset);
    }

    async fn open_tab(&self, url: &str) -> Result<(), TabError> {
        note(&self.journal, format!("  open tab {}", url));
        Ok(())
    }

    async fn close_tab(&self, tab_id: i32) -> Result<(), TabError> {
        note(&self.journal, format!("  close tab {}", tab_id));
        Ok(())
    }
}

struct JournalListener {
    journal: Journal,
    calls: AtomicUsize,
}

impl HandlerBehaviorListener for JournalListener {
    fn handler_behavior_changed(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        note(&self.journal, "  handler behavior changed".to_string());
    }
}

// =============================================================================
// Replay
// =============================================================================

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub lines: Vec<String>,
    /// Blocked request count per tab
    pub blocked: Vec<(i32, u64)>,
    pub hits: Vec<(HitKey, u64)>,
    pub behavior_changes: usize,
}

/// Replay `log` through a fresh interceptor. Must run inside a tokio runtime.
pub async fn run_replay(log: &ReplayLog, config: &InterceptorConfig) -> Result<ReplayReport, String> {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let frames = Arc::new(FramesMap::new());
    let engine = Arc::new(StaticRuleEngine::parse(&log.rules.join("\n"), 1));
    let hits = Arc::new(RuleHitCounter::new());
    let listener = Arc::new(JournalListener {
        journal: Arc::clone(&journal),
        calls: AtomicUsize::new(0),
    });

    let interceptor = RequestInterceptor::new(
        config,
        Collaborators {
            frames: frames.clone(),
            engine: engine.clone(),
            safebrowsing: Arc::new(HostListSafebrowsing {
                hosts: log.safebrowsing.clone(),
            }),
            tabs: Arc::new(JournalTabs {
                journal: Arc::clone(&journal),
            }),
            hits: hits.clone(),
            behavior: listener.clone(),
        },
    )
    .map_err(|e| format!("Failed to create interceptor: {}", e))?;

    let mut tabs = BTreeSet::new();
    for event in &log.events {
        match event {
            ReplayEvent::BeforeRequest(request) => {
                tabs.insert(request.tab_id);
                let verdict = interceptor.dispatch_before_request(&request.context());
                let outcome = if verdict.is_blocked() { "block" } else { "allow" };
                note(&journal, format!("{} -> {}", request.describe("before_request"), outcome));
            }
            ReplayEvent::BeforeSendHeaders(request) => {
                let verdict = interceptor.dispatch_before_send_headers(&request.context(), &request.headers);
                let outcome = match verdict {
                    HeadersVerdict::Unchanged => "unchanged".to_string(),
                    HeadersVerdict::Modified(headers) => headers
                        .iter()
                        .map(|h| format!("{}: {}", h.name, h.value))
                        .collect::<Vec<_>>()
                        .join(", "),
                };
                note(&journal, format!("{} -> {}", request.describe("before_send_headers"), outcome));
            }
            ReplayEvent::HeadersReceived(request) => {
                note(&journal, request.describe("headers_received"));
                interceptor.dispatch_headers_received(&request.context(), &request.headers);
                // Let a spawned safebrowsing lookup finish before the next event
                tokio::task::yield_now().await;
            }
            ReplayEvent::TabFlags {
                tab_id,
                whitelisted,
                companion_whitelisted,
                companion_detected,
                protection_disabled,
            } => {
                frames.set_flags(
                    *tab_id,
                    TabFlags {
                        whitelisted: *whitelisted,
                        companion_whitelisted: *companion_whitelisted,
                        companion_detected: *companion_detected,
                        protection_disabled: *protection_disabled,
                    },
                );
                note(&journal, format!("tab_flags tab={}", tab_id));
            }
            ReplayEvent::CloseTab { tab_id } => {
                frames.remove_tab(*tab_id);
                note(&journal, format!("close_tab tab={}", tab_id));
            }
            ReplayEvent::Filter { event } => {
                let scheduled = interceptor.on_filter_event(*event);
                note(&journal, format!("filter {:?} -> {}", event, if scheduled { "scheduled" } else { "ignored" }));
            }
            ReplayEvent::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
    }

    if interceptor.debouncer().is_pending() {
        tokio::time::sleep(interceptor.debouncer().quiet_period() + Duration::from_millis(10)).await;
    }

    let lines = journal.lock().unwrap_or_else(PoisonError::into_inner).clone();
    Ok(ReplayReport {
        lines,
        blocked: tabs.into_iter().map(|tab| (tab, engine.blocked_count(tab))).collect(),
        hits: hits.snapshot(),
        behavior_changes: listener.calls.load(Ordering::SeqCst),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"{
        "rules": ["||ads.example.net^", "@@||ads.example.net/ok/"],
        "safebrowsing": ["malware.example"],
        "events": [
            { "phase": "before_request", "tab_id": 1, "url": "https://news.example.com/", "type": "main_frame" },
            { "phase": "before_request", "tab_id": 1, "request_frame_id": 0, "url": "https://ads.example.net/a.js", "type": "script" },
            { "phase": "before_request", "tab_id": 1, "request_frame_id": 0, "url": "https://ads.example.net/ok/b.js", "type": "script" },
            { "phase": "before_request", "tab_id": 1, "url": "chrome-extension://x/elemhidehit.png#7;%23%23.ad", "type": "image" },
            { "phase": "tab_flags", "tab_id": 1, "companion_whitelisted": true },
            { "phase": "before_send_headers", "tab_id": 1, "url": "https://cdn.example.org/lib.js", "type": "script",
              "headers": [{ "name": "Referer", "value": "https://elsewhere.example/" }] },
            { "phase": "before_request", "tab_id": 2, "url": "https://home.example/", "type": "main_frame" },
            { "phase": "before_request", "tab_id": 2, "url": "https://malware.example/", "type": "main_frame" },
            { "phase": "headers_received", "tab_id": 2, "url": "https://malware.example/", "type": "main_frame" },
            { "phase": "filter", "event": "ADD_RULE" },
            { "phase": "wait", "ms": 1000 },
            { "phase": "filter", "event": "REMOVE_RULE" },
            { "phase": "filter", "event": "UPDATE_TAB_BUTTON_STATE" }
        ]
    }"#;

    #[tokio::test(start_paused = true)]
    async fn test_replay_log() {
        let log: ReplayLog = serde_json::from_str(LOG).unwrap();
        let report = run_replay(&log, &InterceptorConfig::default()).await.unwrap();

        assert!(report.lines[1].ends_with("-> block"));
        assert!(report.lines[2].ends_with("-> allow"));
        assert!(report.lines[5].ends_with("-> Referer: https://news.example.com/"));
        assert!(report
            .lines
            .contains(&"  open tab sift://safebrowsing?url=https%3A%2F%2Fmalware.example%2F&back=https%3A%2F%2Fhome.example%2F".to_string()));
        assert!(report.lines.contains(&"  close tab 2".to_string()));
        assert_eq!(report.lines.last().map(String::as_str), Some("  handler behavior changed"));

        assert_eq!(report.blocked, vec![(1, 1), (2, 0)]);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].0.domain.as_deref(), Some("news.example.com"));
        assert_eq!(report.hits[0].0.rule_text, "##.ad");
        assert_eq!(report.behavior_changes, 1);
    }

    #[test]
    fn test_request_defaults() {
        let event: ReplayEvent =
            serde_json::from_str(r#"{ "phase": "before_request", "tab_id": 4, "url": "https://a.example/" }"#).unwrap();
        match event {
            ReplayEvent::BeforeRequest(request) => {
                assert_eq!(request.frame_id, 0);
                assert_eq!(request.request_frame_id, -1);
                assert_eq!(request.request_type, "other");
                assert!(request.headers.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
