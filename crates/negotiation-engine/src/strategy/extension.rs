//! Desktop capture through the companion extension's source picker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use capshare_common::error::CapshareResult;
use capshare_platform_core::{CaptureMode, RequestOptions, SourceDescriptor};
use parking_lot::Mutex;
use serde_json::Value;

use super::AcquisitionStrategy;
use crate::bridge::{BridgeMessage, ExtensionBridge};

/// Handle the extension reports for an open picker; sent back to close it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToken(Value);

impl PendingToken {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[derive(Debug)]
struct PendingPicker {
    /// Which `acquire` call the token belongs to.
    ticket: u64,
    token: PendingToken,
}

/// Asks the extension to show `chooseDesktopMedia` and turns the chosen id
/// into desktop capture constraints.
///
/// Holds at most one [`PendingToken`]. A second `acquire` while the first
/// picker is still open takes over the slot; the first picker can then no
/// longer be cancelled through this strategy.
pub struct ExtensionStrategy {
    bridge: Arc<dyn ExtensionBridge>,
    pending: Mutex<Option<PendingPicker>>,
    next_ticket: AtomicU64,
}

impl ExtensionStrategy {
    pub fn new(bridge: Arc<dyn ExtensionBridge>) -> Self {
        Self {
            bridge,
            pending: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Token of the picker currently open, if any.
    pub fn pending_token(&self) -> Option<PendingToken> {
        self.pending.lock().as_ref().map(|p| p.token.clone())
    }

    fn record_pending(&self, ticket: u64, token: Value) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.as_ref() {
            if previous.ticket != ticket {
                tracing::warn!(
                    orphaned = %previous.token.0,
                    "Source picker still open from an earlier request; its token is dropped"
                );
            }
        }
        *pending = Some(PendingPicker {
            ticket,
            token: PendingToken(token),
        });
    }

    fn clear_pending(&self, ticket: u64) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.ticket == ticket) {
            *pending = None;
        }
    }
}

/// Clears this request's token when the request settles or is dropped.
struct PendingGuard<'a> {
    strategy: &'a ExtensionStrategy,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.strategy.clear_pending(self.ticket);
    }
}

#[async_trait]
impl AcquisitionStrategy for ExtensionStrategy {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Extension
    }

    async fn acquire(&self, options: RequestOptions) -> CapshareResult<Option<SourceDescriptor>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let _guard = PendingGuard {
            strategy: self,
            ticket,
        };

        tracing::debug!(ticket, "Requesting desktop source picker");
        let reply = self
            .bridge
            .call(BridgeMessage::choose_desktop_media())
            .settle(|token| self.record_pending(ticket, token))
            .await;

        match reply {
            Ok(reply) => match chosen_source_id(&reply) {
                Some(id) => {
                    tracing::debug!(ticket, source_id = %id, "Desktop source chosen");
                    Ok(Some(SourceDescriptor::desktop(id, options)))
                }
                None => {
                    tracing::debug!(ticket, "Source picker declined");
                    Ok(None)
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "Failed to prepare screen sharing");
                Err(err.into())
            }
        }
    }

    fn cancel(&self) {
        let Some(pending) = self.pending.lock().take() else {
            return;
        };
        tracing::debug!(token = %pending.token.0, "Cancelling desktop source picker");
        // Fire and forget: the reply to the cancel request is not awaited.
        let _ = self.bridge.call(BridgeMessage::cancel_choose_desktop_media(
            pending.token.into_value(),
        ));
    }

    fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// A picker reply names a source when it is a non-empty string or a
/// non-zero number. Empty, zero, null and boolean replies are declines.
fn chosen_source_id(reply: &Value) -> Option<String> {
    match reply {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
