//! Debounced handler-behavior notifications
//!
//! Browsers cache how extension request handlers treat a URL. Whenever the
//! filter set changes the cache has to be dropped with
//! `handlerBehaviorChanged()`, which is expensive and rate limited. A filter
//! list update fires a burst of change events; [`BehaviorDebouncer`] folds the
//! burst into one notification sent after the events go quiet.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Extension-wide notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterEvent {
    AddRule,
    AddRules,
    RemoveRule,
    UpdateFilterRules,
    EnableFilter,
    DisableFilter,
    UpdateTabButtonState,
    #[serde(other)]
    Other,
}

impl FilterEvent {
    /// Events that change which requests get blocked.
    pub fn is_filter_mutation(self) -> bool {
        matches!(
            self,
            Self::AddRule
                | Self::AddRules
                | Self::RemoveRule
                | Self::UpdateFilterRules
                | Self::EnableFilter
                | Self::DisableFilter
        )
    }
}

/// Host side of `handlerBehaviorChanged()`.
pub trait HandlerBehaviorListener: Send + Sync {
    fn handler_behavior_changed(&self);
}

// =============================================================================
// Debouncer
// =============================================================================

struct PendingRecompile {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    generation: u64,
    pending: Option<PendingRecompile>,
}

/// Owner of the single pending recompile timer.
pub struct BehaviorDebouncer {
    quiet_period: Duration,
    listener: Arc<dyn HandlerBehaviorListener>,
    runtime: Handle,
    state: Arc<Mutex<DebounceState>>,
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BehaviorDebouncer {
    pub fn new(quiet_period: Duration, listener: Arc<dyn HandlerBehaviorListener>, runtime: Handle) -> Self {
        Self {
            quiet_period,
            listener,
            runtime,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Feed one notification. Returns whether it (re)started the timer.
    pub fn on_event(&self, event: FilterEvent) -> bool {
        if !event.is_filter_mutation() {
            return false;
        }
        log::trace!("filter change {:?}, rescheduling recompile", event);
        self.schedule();
        true
    }

    /// Cancel the pending timer, if any, and start a new one.
    pub fn schedule(&self) {
        let mut state = lock(&self.state);
        if let Some(previous) = state.pending.take() {
            previous.task.abort();
        }

        state.generation += 1;
        let generation = state.generation;
        let quiet_period = self.quiet_period;
        let listener = Arc::clone(&self.listener);
        let shared = Arc::clone(&self.state);

        // The lock is held until `pending` is set, so the task cannot observe
        // a state without its own entry.
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            {
                let mut state = lock(&shared);
                match &state.pending {
                    Some(pending) if pending.generation == generation => state.pending = None,
                    _ => return,
                }
            }
            log::info!("filter set changed, notifying handler behavior change");
            listener.handler_behavior_changed();
        });

        state.pending = Some(PendingRecompile { generation, task });
    }

    /// Drop the pending timer. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.state).pending.take() {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Consume a notification stream until it closes.
    pub fn listen(self: Arc<Self>, mut events: broadcast::Receiver<FilterEvent>) -> JoinHandle<()> {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.on_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Any of the skipped events may have been a mutation
                        log::warn!("notification stream lagged by {} events", skipped);
                        self.schedule();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for BehaviorDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
