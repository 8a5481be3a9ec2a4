//! Per-tab / per-frame registry
//!
//! The interceptor records every document and subdocument navigation here and
//! reads it back to resolve referrers and tab-level protection flags.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{RequestType, MAIN_FRAME_ID};
use crate::url::{extract_host, is_http_url};

/// Back URL used when a tab has no usable history.
pub const NEW_TAB_URL: &str = "about:newtab";

// =============================================================================
// Frame Registry
// =============================================================================

/// State recorded for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// URL the frame navigated to
    pub url: String,
    /// Navigation type that created the frame
    pub request_type: RequestType,
    /// `Referer` header sent with the main-frame navigation
    pub referrer: Option<String>,
    /// Main-frame URL before the current navigation
    pub previous_url: Option<String>,
}

/// Registry of frames and tab flags, consumed by the interceptor.
pub trait FrameRegistry: Send + Sync {
    /// Record a document or subdocument navigation.
    fn record_frame(&self, tab_id: i32, frame_id: i32, url: &str, request_type: RequestType);

    /// Record the `Referer` header of the tab's main-frame navigation.
    fn record_frame_referrer_header(&self, tab_id: i32, referrer: &str);

    fn get_frame_url(&self, tab_id: i32, frame_id: i32) -> Option<String>;

    /// Host of the tab's main frame.
    fn get_frame_domain(&self, tab_id: i32) -> Option<String>;

    fn get_main_frame(&self, tab_id: i32) -> Option<FrameRecord>;

    /// The companion filtering app has whitelisted the page in this tab.
    fn is_tab_companion_whitelisted(&self, tab_id: i32) -> bool;

    fn is_tab_whitelisted(&self, tab_id: i32) -> bool;

    /// The companion filtering app is already filtering this tab.
    fn is_tab_companion_detected(&self, tab_id: i32) -> bool;

    fn is_tab_protection_disabled(&self, tab_id: i32) -> bool;
}

/// URL to return to from a safebrowsing warning page.
///
/// Prefers the main frame's previous URL, then its recorded referrer, and
/// falls back to a new tab. Only http(s) URLs qualify.
pub fn safebrowsing_back_url(main_frame: Option<&FrameRecord>) -> String {
    main_frame
        .and_then(|frame| {
            frame
                .previous_url
                .as_deref()
                .filter(|url| is_http_url(url))
                .or_else(|| frame.referrer.as_deref().filter(|url| is_http_url(url)))
        })
        .unwrap_or(NEW_TAB_URL)
        .to_string()
}

// =============================================================================
// In-memory Registry
// =============================================================================

/// Tab-level flags maintained by the rest of the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabFlags {
    pub whitelisted: bool,
    pub companion_whitelisted: bool,
    pub companion_detected: bool,
    pub protection_disabled: bool,
}

#[derive(Debug, Default)]
struct TabState {
    frames: HashMap<i32, FrameRecord>,
    flags: TabFlags,
}

/// Thread-safe in-memory [`FrameRegistry`].
#[derive(Debug, Default)]
pub struct FramesMap {
    tabs: RwLock<HashMap<i32, TabState>>,
}

impl FramesMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<i32, TabState>> {
        self.tabs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i32, TabState>> {
        self.tabs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn flags(&self, tab_id: i32) -> TabFlags {
        self.read().get(&tab_id).map(|tab| tab.flags).unwrap_or_default()
    }

    /// Replace all flags of a tab.
    pub fn set_flags(&self, tab_id: i32, flags: TabFlags) {
        self.write().entry(tab_id).or_default().flags = flags;
    }

    /// Update the flags of a tab in place.
    pub fn update_flags(&self, tab_id: i32, update: impl FnOnce(&mut TabFlags)) {
        update(&mut self.write().entry(tab_id).or_default().flags);
    }

    /// Forget a closed tab.
    pub fn remove_tab(&self, tab_id: i32) {
        self.write().remove(&tab_id);
    }

    pub fn frame_count(&self, tab_id: i32) -> usize {
        self.read().get(&tab_id).map_or(0, |tab| tab.frames.len())
    }
}

impl FrameRegistry for FramesMap {
    fn record_frame(&self, tab_id: i32, frame_id: i32, url: &str, request_type: RequestType) {
        let mut tabs = self.write();
        let tab = tabs.entry(tab_id).or_default();

        let previous_url = if request_type.is_document() {
            // A new top-level document replaces every frame of the tab
            let previous = tab.frames.remove(&MAIN_FRAME_ID).map(|frame| frame.url);
            tab.frames.clear();
            previous
        } else {
            None
        };

        log::trace!("tab {} frame {}: recorded {:?} {}", tab_id, frame_id, request_type, url);
        tab.frames.insert(
            frame_id,
            FrameRecord {
                url: url.to_string(),
                request_type,
                referrer: None,
                previous_url,
            },
        );
    }

    fn record_frame_referrer_header(&self, tab_id: i32, referrer: &str) {
        if let Some(frame) = self
            .write()
            .get_mut(&tab_id)
            .and_then(|tab| tab.frames.get_mut(&MAIN_FRAME_ID))
        {
            frame.referrer = Some(referrer.to_string());
        }
    }

    fn get_frame_url(&self, tab_id: i32, frame_id: i32) -> Option<String> {
        self.read()
            .get(&tab_id)
            .and_then(|tab| tab.frames.get(&frame_id))
            .map(|frame| frame.url.clone())
    }

    fn get_frame_domain(&self, tab_id: i32) -> Option<String> {
        let url = self.get_frame_url(tab_id, MAIN_FRAME_ID)?;
        extract_host(&url).map(str::to_string)
    }

    fn get_main_frame(&self, tab_id: i32) -> Option<FrameRecord> {
        self.read()
            .get(&tab_id)
            .and_then(|tab| tab.frames.get(&MAIN_FRAME_ID))
            .cloned()
    }

    fn is_tab_companion_whitelisted(&self, tab_id: i32) -> bool {
        self.flags(tab_id).companion_whitelisted
    }

    fn is_tab_whitelisted(&self, tab_id: i32) -> bool {
        self.flags(tab_id).whitelisted
    }

    fn is_tab_companion_detected(&self, tab_id: i32) -> bool {
        self.flags(tab_id).companion_detected
    }

    fn is_tab_protection_disabled(&self, tab_id: i32) -> bool {
        self.flags(tab_id).protection_disabled
    }
}
