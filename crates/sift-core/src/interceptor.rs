//! Request Interceptor
//!
//! Every request the browser makes goes through here, in up to three phases:
//!
//! 1. before-request: record frame navigations, block or allow
//! 2. before-send-headers: fix up the `Referer` header
//! 3. headers-received: response processing and safebrowsing
//!
//! Hooks must return promptly. The only asynchronous work (safebrowsing
//! lookups, the recompile timer) runs on spawned tasks.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, InterceptorConfig, UrlFilter, ALL_URLS};
use crate::debounce::{BehaviorDebouncer, FilterEvent, HandlerBehaviorListener};
use crate::engine::{RuleEngine, SafebrowsingService};
use crate::frames::{safebrowsing_back_url, FrameRegistry};
use crate::headers::{find_header, set_header_value, HttpHeader, REFERER};
use crate::hits::{parse_css_rule_from_url, HitCounter};
use crate::tabs::TabController;
use crate::types::{HeadersVerdict, RequestContext, RequestVerdict, MAIN_FRAME_ID};
use crate::url::is_http_url;

/// Error type for interceptor construction.
#[derive(Debug, thiserror::Error)]
pub enum InterceptorError {
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything the interceptor talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub frames: Arc<dyn FrameRegistry>,
    pub engine: Arc<dyn RuleEngine>,
    pub safebrowsing: Arc<dyn SafebrowsingService>,
    pub tabs: Arc<dyn TabController>,
    pub hits: Arc<dyn HitCounter>,
    pub behavior: Arc<dyn HandlerBehaviorListener>,
}

// =============================================================================
// Registrations
// =============================================================================

/// Request lifecycle phase exposed by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeRequest,
    BeforeSendHeaders,
    HeadersReceived,
}

/// Handler attached to a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookHandler {
    Request,
    RequestHeaders,
    ResponseHeaders,
    CssRuleHit,
    /// Index into the configured forced referrers
    ForcedReferrer(usize),
}

/// One listener registration with the host.
#[derive(Debug, Clone)]
pub struct Registration {
    pub phase: HookPhase,
    pub handler: HookHandler,
    pub pattern: String,
    filter: UrlFilter,
}

impl Registration {
    fn new(phase: HookPhase, handler: HookHandler, pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            phase,
            handler,
            pattern: pattern.to_string(),
            filter: UrlFilter::parse(pattern)?,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.filter.matches(url)
    }
}

// =============================================================================
// Interceptor
// =============================================================================

/// The multi-phase request pipeline.
pub struct RequestInterceptor {
    frames: Arc<dyn FrameRegistry>,
    engine: Arc<dyn RuleEngine>,
    safebrowsing: Arc<dyn SafebrowsingService>,
    tabs: Arc<dyn TabController>,
    hits: Arc<dyn HitCounter>,
    debouncer: Arc<BehaviorDebouncer>,
    runtime: Handle,
    registrations: Vec<Registration>,
    forced_referrers: Vec<String>,
}

impl RequestInterceptor {
    /// Create an interceptor bound to the current tokio runtime.
    pub fn new(config: &InterceptorConfig, collaborators: Collaborators) -> Result<Self, InterceptorError> {
        let runtime = Handle::try_current()?;
        Self::with_runtime(config, collaborators, runtime)
    }

    /// Create an interceptor that spawns its background work on `runtime`.
    pub fn with_runtime(
        config: &InterceptorConfig,
        collaborators: Collaborators,
        runtime: Handle,
    ) -> Result<Self, InterceptorError> {
        let mut registrations = vec![
            Registration::new(HookPhase::BeforeRequest, HookHandler::Request, ALL_URLS)?,
            Registration::new(HookPhase::BeforeSendHeaders, HookHandler::RequestHeaders, ALL_URLS)?,
            Registration::new(HookPhase::HeadersReceived, HookHandler::ResponseHeaders, ALL_URLS)?,
            Registration::new(HookPhase::BeforeRequest, HookHandler::CssRuleHit, &config.hit_channel_pattern)?,
        ];

        let mut forced_referrers = Vec::with_capacity(config.forced_referrers.len());
        for (idx, forced) in config.forced_referrers.iter().enumerate() {
            registrations.push(Registration::new(
                HookPhase::BeforeSendHeaders,
                HookHandler::ForcedReferrer(idx),
                &forced.url_pattern,
            )?);
            forced_referrers.push(forced.referer.clone());
        }

        let debouncer = Arc::new(BehaviorDebouncer::new(
            config.recompile_quiet_period,
            collaborators.behavior,
            runtime.clone(),
        ));

        Ok(Self {
            frames: collaborators.frames,
            engine: collaborators.engine,
            safebrowsing: collaborators.safebrowsing,
            tabs: collaborators.tabs,
            hits: collaborators.hits,
            debouncer,
            runtime,
            registrations,
            forced_referrers,
        })
    }

    /// Listener registrations the host should install.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn debouncer(&self) -> &Arc<BehaviorDebouncer> {
        &self.debouncer
    }

    // -------------------------------------------------------------------------
    // Host entry points
    // -------------------------------------------------------------------------

    /// Run every before-request registration matching the URL.
    pub fn dispatch_before_request(&self, ctx: &RequestContext<'_>) -> RequestVerdict {
        let mut verdict = RequestVerdict::Allow;
        for registration in self.matching(HookPhase::BeforeRequest, ctx.url) {
            match registration.handler {
                HookHandler::Request => {
                    if self.on_before_request(ctx).is_blocked() {
                        verdict = RequestVerdict::Block;
                    }
                }
                HookHandler::CssRuleHit => self.on_css_rule_hit(ctx),
                _ => {}
            }
        }
        verdict
    }

    /// Run every before-send-headers registration matching the URL, each one
    /// seeing the headers produced by the previous.
    pub fn dispatch_before_send_headers(&self, ctx: &RequestContext<'_>, headers: &[HttpHeader]) -> HeadersVerdict {
        let mut current: Option<Vec<HttpHeader>> = None;
        for registration in self.matching(HookPhase::BeforeSendHeaders, ctx.url) {
            match registration.handler {
                HookHandler::RequestHeaders => {
                    let input = current.as_deref().unwrap_or(headers);
                    if let HeadersVerdict::Modified(modified) = self.on_before_send_headers(ctx, input) {
                        current = Some(modified);
                    }
                }
                HookHandler::ForcedReferrer(idx) => {
                    if let Some(referer) = self.forced_referrers.get(idx) {
                        let modified = current.get_or_insert_with(|| headers.to_vec());
                        set_header_value(modified, REFERER, referer);
                    }
                }
                _ => {}
            }
        }
        current.map_or(HeadersVerdict::Unchanged, HeadersVerdict::Modified)
    }

    /// Run every headers-received registration matching the URL.
    pub fn dispatch_headers_received(&self, ctx: &RequestContext<'_>, headers: &[HttpHeader]) {
        for registration in self.matching(HookPhase::HeadersReceived, ctx.url) {
            if registration.handler == HookHandler::ResponseHeaders {
                self.on_headers_received(ctx, headers);
            }
        }
    }

    /// Feed an extension notification to the recompile debouncer.
    pub fn on_filter_event(&self, event: FilterEvent) -> bool {
        self.debouncer.on_event(event)
    }

    /// Follow a notification stream until it closes.
    pub fn listen(&self, events: broadcast::Receiver<FilterEvent>) -> JoinHandle<()> {
        Arc::clone(&self.debouncer).listen(events)
    }

    fn matching<'r>(&'r self, phase: HookPhase, url: &'r str) -> impl Iterator<Item = &'r Registration> + 'r {
        self.registrations
            .iter()
            .filter(move |r| r.phase == phase && r.matches(url))
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    /// Decide whether a request may proceed.
    pub fn on_before_request(&self, ctx: &RequestContext<'_>) -> RequestVerdict {
        let request_type = ctx.request_type;

        if request_type.is_frame_navigation() {
            self.frames.record_frame(ctx.tab_id, ctx.frame_id, ctx.url, request_type);
        }

        if request_type.is_document() {
            self.tabs.update_tab_button_state(ctx.tab_id, true);
            return RequestVerdict::Allow;
        }

        if !is_http_url(ctx.url) {
            return RequestVerdict::Allow;
        }

        let referrer = self.frames.get_frame_url(ctx.tab_id, ctx.request_frame_id);
        let rule = self
            .engine
            .get_rule_for_request(ctx.tab_id, ctx.url, referrer.as_deref(), request_type);

        self.engine
            .post_process_request(ctx.tab_id, ctx.url, referrer.as_deref(), request_type, rule.as_ref());

        if self.engine.is_request_blocked_by_rule(rule.as_ref()) {
            log::debug!("tab {}: blocking {} by {:?}", ctx.tab_id, ctx.url, rule.as_ref().map(|r| &r.rule_text));
            RequestVerdict::Block
        } else {
            RequestVerdict::Allow
        }
    }

    /// Rewrite or record the `Referer` header.
    ///
    /// When the companion app whitelisted the page it authorizes requests by
    /// their referrer, so every request of the tab gets the main-frame URL.
    pub fn on_before_send_headers(&self, ctx: &RequestContext<'_>, headers: &[HttpHeader]) -> HeadersVerdict {
        if self.frames.is_tab_companion_whitelisted(ctx.tab_id) {
            return match self.frames.get_frame_url(ctx.tab_id, MAIN_FRAME_ID) {
                Some(main_frame_url) => {
                    let mut modified = headers.to_vec();
                    set_header_value(&mut modified, REFERER, &main_frame_url);
                    HeadersVerdict::Modified(modified)
                }
                None => {
                    log::debug!("tab {}: whitelisted but main frame unknown", ctx.tab_id);
                    HeadersVerdict::Unchanged
                }
            };
        }

        if ctx.request_type.is_document() {
            if let Some(referer) = find_header(headers, REFERER) {
                self.frames.record_frame_referrer_header(ctx.tab_id, &referer.value);
            }
        }

        HeadersVerdict::Unchanged
    }

    /// Process response headers; documents also get a safebrowsing check.
    pub fn on_headers_received(&self, ctx: &RequestContext<'_>, headers: &[HttpHeader]) {
        let referrer = self.frames.get_frame_url(ctx.tab_id, ctx.request_frame_id);
        self.engine
            .process_request_response(ctx.tab_id, ctx.url, referrer.as_deref(), ctx.request_type, headers);

        if ctx.request_type.is_document() {
            // Fire and forget
            let _ = self.check_safebrowsing(ctx.tab_id, ctx.url);
        }
    }

    /// Start a safebrowsing lookup for a tab's main document.
    ///
    /// Returns `None` when the tab is exempt. If the lookup yields a warning
    /// page, it is opened and the offending tab is closed once the page loaded.
    pub fn check_safebrowsing(&self, tab_id: i32, url: &str) -> Option<JoinHandle<()>> {
        if self.frames.is_tab_companion_detected(tab_id)
            || self.frames.is_tab_protection_disabled(tab_id)
            || self.frames.is_tab_whitelisted(tab_id)
        {
            return None;
        }

        let back_url = safebrowsing_back_url(self.frames.get_main_frame(tab_id).as_ref());
        let url = url.to_string();
        let safebrowsing = Arc::clone(&self.safebrowsing);
        let tabs = Arc::clone(&self.tabs);

        Some(self.runtime.spawn(async move {
            let Some(warning_url) = safebrowsing.check_safebrowsing_filter(&url, &back_url).await else {
                return;
            };

            log::info!("tab {}: {} flagged by safebrowsing", tab_id, url);
            if let Err(e) = tabs.open_tab(&warning_url).await {
                log::warn!("{}", e);
                return;
            }
            if let Err(e) = tabs.close_tab(tab_id).await {
                log::warn!("{}", e);
            }
        }))
    }

    /// Attribute a cosmetic rule hit reported through the pseudo-URL channel.
    pub fn on_css_rule_hit(&self, ctx: &RequestContext<'_>) {
        let Some(hit) = parse_css_rule_from_url(ctx.url) else {
            log::trace!("ignoring malformed hit report {}", ctx.url);
            return;
        };
        let domain = self.frames.get_frame_domain(ctx.tab_id);
        self.hits.add_rule_hit(domain.as_deref(), &hit.rule_text, &hit.filter_id);
    }
}
