//! Install-then-retry fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use capshare_common::error::{CapshareError, CapshareResult};
use capshare_platform_core::{CaptureMode, RequestOptions, SourceDescriptor};
use parking_lot::Mutex;

use super::AcquisitionStrategy;
use crate::bridge::{ExtensionBridge, InstallFlow};
use crate::detector::Selection;

/// Re-runs capability detection after the extension was installed.
///
/// Implemented by the session so that the retry also replaces the session's
/// own selection.
pub trait Renegotiate: Send + Sync {
    fn renegotiate(&self) -> Selection;
}

type InstallSlots = Mutex<Vec<(u64, Arc<dyn InstallFlow>)>>;

/// Triggers the extension install flow, then negotiates again and delegates
/// to whatever strategy the new detection selects.
///
/// Every `acquire` tracks its own install, so overlapping requests stay
/// cancellable until each of them has settled.
pub struct AutoInstallStrategy {
    bridge: Arc<dyn ExtensionBridge>,
    renegotiate: Weak<dyn Renegotiate>,
    installing: InstallSlots,
    next_ticket: AtomicU64,
}

impl AutoInstallStrategy {
    pub fn new(bridge: Arc<dyn ExtensionBridge>, renegotiate: Weak<dyn Renegotiate>) -> Self {
        Self {
            bridge,
            renegotiate,
            installing: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
        }
    }
}

/// Marks one install as in progress for as long as it is being awaited.
struct InstallingGuard<'a> {
    slots: &'a InstallSlots,
    ticket: u64,
}

impl<'a> InstallingGuard<'a> {
    fn enter(slots: &'a InstallSlots, ticket: u64, flow: Arc<dyn InstallFlow>) -> Self {
        slots.lock().push((ticket, flow));
        Self { slots, ticket }
    }
}

impl Drop for InstallingGuard<'_> {
    fn drop(&mut self) {
        self.slots.lock().retain(|(ticket, _)| *ticket != self.ticket);
    }
}

#[async_trait]
impl AcquisitionStrategy for AutoInstallStrategy {
    fn mode(&self) -> CaptureMode {
        CaptureMode::AutoInstall
    }

    async fn acquire(&self, options: RequestOptions) -> CapshareResult<Option<SourceDescriptor>> {
        let flow = self
            .bridge
            .install_flow()
            .ok_or_else(|| CapshareError::install_failed("No install flow available"))?;

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        tracing::info!(ticket, "Installing screen sharing extension");
        {
            let _installing = InstallingGuard::enter(&self.installing, ticket, flow.clone());
            flow.install().await?;
        }

        let renegotiate = self.renegotiate.upgrade().ok_or_else(|| {
            CapshareError::install_failed("Negotiation session closed during install")
        })?;
        let selection = renegotiate.renegotiate();

        if selection.capability().is_autoinstall() {
            // Still on auto install after a successful install: it did not take.
            tracing::warn!("Extension install completed but capture is still unavailable");
            return Err(CapshareError::install_failed("Auto install failed"));
        }

        tracing::info!(mode = %selection.capability().mode(), "Extension installed, retrying");
        selection.strategy().acquire(options).await
    }

    fn cancel(&self) {
        let installing: Vec<_> = self.installing.lock().clone();
        for (ticket, flow) in installing {
            tracing::debug!(ticket, "Cancelling extension install");
            flow.cancel();
        }
    }

    fn is_pending(&self) -> bool {
        !self.installing.lock().is_empty()
    }
}
