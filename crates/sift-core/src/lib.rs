//! Sift Core Library
//!
//! This crate is the request-interception decision layer of the Sift content
//! blocker. The host browser hands every request lifecycle event to a
//! [`RequestInterceptor`], which consults the frame registry and the rule
//! engine and answers with an allow/block verdict or a header rewrite.
//!
//! # Architecture
//!
//! Rule matching, frame bookkeeping, safebrowsing lookups and tab control are
//! collaborators behind traits. Small in-memory implementations ship with the
//! crate so the pipeline can be exercised without a browser.
//!
//! # Modules
//!
//! - `types`: Request context, request types and verdicts
//! - `url`: Allocation-free URL helpers and percent coding
//! - `headers`: Header lookup and rewriting
//! - `frames`: Per-tab/per-frame registry
//! - `engine`: Rule engine and safebrowsing collaborators
//! - `hits`: Cosmetic rule hit channel
//! - `tabs`: Tab control collaborator
//! - `debounce`: Debounced handler-behavior notifications
//! - `config`: Interceptor configuration
//! - `interceptor`: The request pipeline

pub mod config;
pub mod debounce;
pub mod engine;
pub mod frames;
pub mod headers;
pub mod hits;
pub mod interceptor;
pub mod tabs;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use config::{ConfigError, ForcedReferrer, InterceptorConfig, UrlFilter};
pub use debounce::{BehaviorDebouncer, FilterEvent, HandlerBehaviorListener};
pub use engine::{RequestRule, RuleEngine, SafebrowsingService, StaticRuleEngine};
pub use frames::{FrameRecord, FrameRegistry, FramesMap};
pub use headers::HttpHeader;
pub use hits::{CssRuleHit, HitCounter, RuleHitCounter, parse_css_rule_from_url};
pub use interceptor::{Collaborators, InterceptorError, RequestInterceptor};
pub use tabs::{TabController, TabError};
pub use types::{HeadersVerdict, RequestContext, RequestType, RequestVerdict};
