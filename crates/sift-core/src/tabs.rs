//! Tab control collaborator

use async_trait::async_trait;

/// Error type for tab operations performed by the host.
#[derive(Debug, thiserror::Error)]
pub enum TabError {
    #[error("Failed to open tab for {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("Failed to close tab {tab_id}: {reason}")]
    Close { tab_id: i32, reason: String },
}

/// Browser UI operations the interceptor triggers.
#[async_trait]
pub trait TabController: Send + Sync {
    /// Update the toolbar button of a tab; `reset` clears per-page counters.
    fn update_tab_button_state(&self, tab_id: i32, reset: bool);

    /// Open a new tab and resolve once its page finished loading.
    async fn open_tab(&self, url: &str) -> Result<(), TabError>;

    async fn close_tab(&self, tab_id: i32) -> Result<(), TabError>;
}
