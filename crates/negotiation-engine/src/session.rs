//! Negotiation session: the public screen sharing facade.

use std::fmt;
use std::sync::{Arc, Weak};

use capshare_common::config::DetectionConfig;
use capshare_common::error::CapshareResult;
use capshare_platform_core::{
    BrowserProbe, Capability, ExtensionAvailability, RequestOptions, SourceDescriptor,
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::bridge::{AvailabilityListener, ExtensionBridge};
use crate::detector::{CapabilityDetector, Selection, StrategyDeps};
use crate::strategy::{AcquisitionStrategy, NoneStrategy, Renegotiate};

/// State of a negotiation session.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No detection pass has completed yet.
    Uninitialized,
    /// The capability and strategy chosen by the latest detection pass.
    Ready(Selection),
}

/// Brokers screen capture for one page.
///
/// Detection runs on construction and again every time the bridge reports an
/// availability change. Each pass replaces the capability and strategy
/// wholesale; an acquisition already running on the previous strategy is left
/// to finish (or be cancelled) on its own.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct NegotiationSession {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    detector: CapabilityDetector,
    browser: Arc<dyn BrowserProbe>,
    bridge: Arc<dyn ExtensionBridge>,
    state: Mutex<SessionState>,
    capability_tx: watch::Sender<Capability>,
    weak_self: Weak<SessionShared>,
}

impl NegotiationSession {
    /// Create a session, subscribe to availability changes, and run the first
    /// detection pass.
    pub fn new(
        detection: DetectionConfig,
        browser: Arc<dyn BrowserProbe>,
        bridge: Arc<dyn ExtensionBridge>,
    ) -> Self {
        let (capability_tx, _) = watch::channel(Capability::unsupported());
        let shared = Arc::new_cyclic(|weak_self| SessionShared {
            detector: CapabilityDetector::new(detection),
            browser,
            bridge,
            state: Mutex::new(SessionState::Uninitialized),
            capability_tx,
            weak_self: weak_self.clone(),
        });

        let weak: Weak<SessionShared> = Arc::downgrade(&shared);
        let listener: Weak<dyn AvailabilityListener> = weak;
        shared.bridge.subscribe(listener);

        shared.initialize(shared.bridge.availability());
        Self { shared }
    }

    /// Acquire a capture source with the current strategy.
    ///
    /// Resolves `Ok(None)` when the user declined the source picker.
    pub async fn get_screen(
        &self,
        options: RequestOptions,
    ) -> CapshareResult<Option<SourceDescriptor>> {
        let strategy = self.current_strategy();
        strategy.acquire(options).await
    }

    /// Forward a cancel to the current strategy. Fire and forget.
    pub fn cancel_get_screen(&self) {
        self.current_strategy().cancel();
    }

    /// Strategy selected by the latest detection pass.
    pub fn current_strategy(&self) -> Arc<dyn AcquisitionStrategy> {
        match &*self.shared.state.lock() {
            SessionState::Ready(selection) => selection.strategy().clone(),
            SessionState::Uninitialized => Arc::new(NoneStrategy),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    pub fn capability(&self) -> Capability {
        match &*self.shared.state.lock() {
            SessionState::Ready(selection) => selection.capability(),
            SessionState::Uninitialized => Capability::unsupported(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.capability().supported()
    }

    pub fn is_autoinstall(&self) -> bool {
        self.capability().is_autoinstall()
    }

    /// Observe the capability chosen by every detection pass.
    pub fn watch_capability(&self) -> watch::Receiver<Capability> {
        self.shared.capability_tx.subscribe()
    }

    /// Run detection again with the bridge's current availability.
    pub fn refresh(&self) -> Capability {
        self.shared.renegotiate().capability()
    }
}

impl fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

impl SessionShared {
    fn initialize(&self, availability: ExtensionAvailability) -> Selection {
        let deps = StrategyDeps {
            bridge: self.bridge.clone(),
            renegotiate: self.weak_self.clone(),
        };

        // Held across the whole pass, publishing included, so detections
        // never interleave and watchers see them in state order.
        let mut state = self.state.lock();
        let context = self.browser.browser_context();
        let selection = self.detector.detect(&context, &availability, &deps);
        *state = SessionState::Ready(selection.clone());

        let capability = selection.capability();
        tracing::info!(
            supported = capability.supported(),
            mode = %capability.mode(),
            browser = %context.family,
            version = ?context.version,
            extension = availability.present,
            autoinstall = availability.autoinstall_available,
            "Screen sharing support"
        );
        self.capability_tx.send_replace(capability);
        selection
    }
}

impl AvailabilityListener for SessionShared {
    fn availability_changed(&self, availability: ExtensionAvailability) {
        self.initialize(availability);
    }
}

impl Renegotiate for SessionShared {
    fn renegotiate(&self) -> Selection {
        self.initialize(self.bridge.availability())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBridge;
    use capshare_platform_core::{BrowserContext, CaptureMode};

    fn session(browser: BrowserContext, bridge: &Arc<ScriptedBridge>) -> NegotiationSession {
        NegotiationSession::new(DetectionConfig::default(), Arc::new(browser), bridge.clone())
    }

    #[test]
    fn construction_runs_detection_and_subscribes() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        let session = session(BrowserContext::chrome(33), &bridge);

        assert!(matches!(session.state(), SessionState::Ready(_)));
        assert_eq!(session.capability().mode(), CaptureMode::Flag);
        assert_eq!(session.current_strategy().mode(), CaptureMode::Flag);
        assert_eq!(bridge.listener_count(), 1);
    }

    #[test]
    fn availability_change_reselects() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        let session = session(BrowserContext::chrome(40), &bridge);
        let mut changes = session.watch_capability();
        assert!(!session.is_supported());

        bridge.set_availability(ExtensionAvailability::installed());

        assert_eq!(session.capability().mode(), CaptureMode::Extension);
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().mode(), CaptureMode::Extension);
    }

    #[test]
    fn autoinstall_flag_is_exposed() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::installable());
        let session = session(BrowserContext::chrome(50), &bridge);
        assert!(session.is_supported());
        assert!(session.is_autoinstall());
    }

    #[test]
    fn dropped_session_ignores_notifications() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        drop(session(BrowserContext::chrome(40), &bridge));
        bridge.set_availability(ExtensionAvailability::installed());
    }

    #[test]
    fn dropped_sessions_are_unsubscribed() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        for _ in 0..4 {
            drop(session(BrowserContext::chrome(40), &bridge));
        }
        let live = session(BrowserContext::chrome(40), &bridge);

        assert_eq!(bridge.listener_count(), 1);
        bridge.set_availability(ExtensionAvailability::installed());
        assert_eq!(live.capability().mode(), CaptureMode::Extension);
    }

    #[test]
    fn watch_agrees_with_state_under_concurrent_detection() {
        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        let session = session(BrowserContext::chrome(60), &bridge);
        let watch = session.watch_capability();

        let toggler = {
            let bridge = bridge.clone();
            std::thread::spawn(move || {
                for n in 0..500 {
                    let availability = if n % 2 == 0 {
                        ExtensionAvailability::installed()
                    } else {
                        ExtensionAvailability::absent()
                    };
                    bridge.set_availability(availability);
                }
            })
        };
        let refreshers: Vec<_> = (0..3)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        session.refresh();
                    }
                })
            })
            .collect();

        toggler.join().unwrap();
        for refresher in refreshers {
            refresher.join().unwrap();
        }
        assert_eq!(session.capability(), *watch.borrow());
    }

    #[test]
    fn browser_is_read_on_every_pass() {
        struct Upgrading(Mutex<u32>);
        impl BrowserProbe for Upgrading {
            fn browser_context(&self) -> BrowserContext {
                let mut version = self.0.lock();
                *version += 4;
                BrowserContext::chrome(*version)
            }
        }

        let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
        let session = NegotiationSession::new(
            DetectionConfig::default(),
            Arc::new(Upgrading(Mutex::new(30))),
            bridge,
        );
        assert_eq!(session.capability().mode(), CaptureMode::Flag);
        assert_eq!(session.refresh().mode(), CaptureMode::None);
    }
}
