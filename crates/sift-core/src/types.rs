//! Core type definitions for Sift
//!
//! These types describe a single intercepted request and the verdicts the
//! interceptor hands back to the host browser.

use crate::headers::HttpHeader;

/// Frame id the browser assigns to a tab's top-level document.
pub const MAIN_FRAME_ID: i32 = 0;

/// Frame id used when a request has no requesting frame.
pub const NO_FRAME_ID: i32 = -1;

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const DOCUMENT = 1 << 6;     // top-level document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const FETCH = 1 << 14;

        /// All request types
        const ALL = 0x7FFF;
        /// Navigations that create a frame (document + subdocument)
        const FRAME_NAVIGATION = Self::DOCUMENT.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RequestType {
    /// Parse from browser request type string.
    ///
    /// Accepts both the `webRequest` names (`main_frame`, `sub_frame`) and the
    /// filter-list names (`document`, `subdocument`). Unknown names map to
    /// [`RequestType::OTHER`].
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "main_frame" | "document" => Self::DOCUMENT,
            "sub_frame" | "subdocument" => Self::SUBDOCUMENT,
            "stylesheet" | "css" => Self::STYLESHEET,
            "script" | "js" => Self::SCRIPT,
            "image" | "img" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "ping" => Self::PING,
            "beacon" => Self::BEACON,
            "fetch" => Self::FETCH,
            "csp_report" => Self::CSP_REPORT,
            "media" => Self::MEDIA,
            "websocket" | "ws" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }

    /// Top-level document load.
    #[inline]
    pub fn is_document(self) -> bool {
        self.contains(Self::DOCUMENT)
    }

    /// Document or subdocument load; these are the requests that create frames.
    #[inline]
    pub fn is_frame_navigation(self) -> bool {
        self.intersects(Self::FRAME_NAVIGATION)
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// One intercepted request, as described by the host browser.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Tab owning the request
    pub tab_id: i32,
    /// Frame the request loads into (for documents) or originates from
    pub frame_id: i32,
    /// Frame that issued the request; used to resolve the referrer
    pub request_frame_id: i32,
    /// Full request URL
    pub url: &'a str,
    /// Request type
    pub request_type: RequestType,
}

impl<'a> RequestContext<'a> {
    pub fn new(tab_id: i32, frame_id: i32, request_frame_id: i32, url: &'a str, request_type: RequestType) -> Self {
        Self {
            tab_id,
            frame_id,
            request_frame_id,
            url,
            request_type,
        }
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// Outcome of the before-request phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerdict {
    /// Let the request through
    Allow,
    /// Cancel the request
    Block,
}

impl RequestVerdict {
    #[inline]
    pub fn is_blocked(self) -> bool {
        self == Self::Block
    }
}

/// Outcome of the before-send-headers phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadersVerdict {
    /// Send the original headers
    Unchanged,
    /// Replace the outgoing headers with this list
    Modified(Vec<HttpHeader>),
}

impl HeadersVerdict {
    /// The modified headers, if any.
    pub fn headers(&self) -> Option<&[HttpHeader]> {
        match self {
            Self::Unchanged => None,
            Self::Modified(headers) => Some(headers),
        }
    }
}
