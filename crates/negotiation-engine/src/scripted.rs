//! Scripted in-process extension bridge.
//!
//! Stands in for the real extension when there is none: the CLI uses it to
//! simulate negotiations and the tests use it to drive every branch of the
//! strategies. Picker outcomes and install behaviour are queued up front;
//! every message sent to the bridge is recorded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use capshare_common::error::{BridgeError, BridgeResult};
use capshare_platform_core::ExtensionAvailability;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::bridge::{
    AvailabilityListener, BridgeAction, BridgeCall, BridgeMessage, BridgeResponder,
    ExtensionBridge, InstallFlow,
};

/// How the source picker answers one `chooseDesktopMedia` request.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerScript {
    /// Progress values emitted before the outcome; the last one is the
    /// token a cancel request must carry.
    pub tokens: Vec<Value>,
    pub outcome: PickerOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerOutcome {
    /// The user picked this source id.
    Pick(String),
    /// The user closed the picker.
    Decline,
    /// The extension reported an error.
    Fail(String),
    /// The picker stays open until cancelled or completed by hand.
    Hold,
}

impl PickerScript {
    pub fn pick(source_id: impl Into<String>) -> Self {
        Self::with_outcome(PickerOutcome::Pick(source_id.into()))
    }

    pub fn decline() -> Self {
        Self::with_outcome(PickerOutcome::Decline)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::with_outcome(PickerOutcome::Fail(reason.into()))
    }

    pub fn hold() -> Self {
        Self::with_outcome(PickerOutcome::Hold)
    }

    pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = Value>) -> Self {
        self.tokens = tokens.into_iter().collect();
        self
    }

    fn with_outcome(outcome: PickerOutcome) -> Self {
        Self {
            tokens: Vec::new(),
            outcome,
        }
    }
}

/// How the scripted install flow behaves.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallScript {
    /// Install succeeds. When `makes_present` is set the bridge then reports
    /// the extension as present (firing availability listeners).
    Succeed { makes_present: bool },
    /// Install fails with this reason.
    Fail(String),
    /// Install never finishes on its own; a cancel fails it.
    HoldUntilCancelled,
}

struct HeldPicker {
    token: Value,
    responder: BridgeResponder,
}

#[derive(Default)]
struct BridgeState {
    availability: ExtensionAvailability,
    pickers: VecDeque<PickerScript>,
    held: Vec<HeldPicker>,
    sent: Vec<BridgeMessage>,
    install: Option<Arc<ScriptedInstall>>,
}

/// In-process [`ExtensionBridge`] driven by queued scripts.
pub struct ScriptedBridge {
    state: Mutex<BridgeState>,
    listeners: Mutex<Vec<Weak<dyn AvailabilityListener>>>,
    weak_self: Weak<ScriptedBridge>,
}

impl ScriptedBridge {
    pub fn new(availability: ExtensionAvailability) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(BridgeState {
                availability,
                ..BridgeState::default()
            }),
            listeners: Mutex::new(Vec::new()),
            weak_self: weak_self.clone(),
        })
    }

    /// A bridge with no extension that can install one using `script`.
    pub fn installable(script: InstallScript) -> Arc<Self> {
        let bridge = Self::new(ExtensionAvailability::installable());
        bridge.set_install_script(script);
        bridge
    }

    pub fn push_picker(&self, script: PickerScript) {
        self.state.lock().pickers.push_back(script);
    }

    pub fn set_install_script(&self, script: InstallScript) {
        let install = Arc::new(ScriptedInstall {
            script,
            bridge: self.weak_self.clone(),
            cancelled: Notify::new(),
            installs: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        });
        self.state.lock().install = Some(install);
    }

    /// The scripted install flow, for inspecting its counters.
    pub fn scripted_install(&self) -> Option<Arc<ScriptedInstall>> {
        self.state.lock().install.clone()
    }

    /// Replace the reported availability and notify listeners when it changed.
    pub fn set_availability(&self, availability: ExtensionAvailability) {
        {
            let mut state = self.state.lock();
            if state.availability == availability {
                return;
            }
            state.availability = availability;
        }
        tracing::debug!(?availability, "Scripted extension availability changed");

        let listeners: Vec<_> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.availability_changed(availability);
        }
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> Vec<BridgeMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of pickers currently held open.
    pub fn held_count(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Complete the oldest held picker with `source_id`. Returns `false` when
    /// no picker is held.
    pub fn complete_held(&self, source_id: impl Into<String>) -> bool {
        let held = {
            let mut state = self.state.lock();
            if state.held.is_empty() {
                return false;
            }
            state.held.remove(0)
        };
        held.responder.resolve(source_id.into());
        true
    }

    /// Number of registered listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    fn open_picker(&self) -> BridgeCall {
        let (responder, call) = BridgeCall::channel();
        let script = self.state.lock().pickers.pop_front();
        let Some(script) = script else {
            responder.reject(BridgeError::new("No scripted picker outcome"));
            return call;
        };

        for token in &script.tokens {
            responder.notify(token.clone());
        }
        match script.outcome {
            PickerOutcome::Pick(id) => responder.resolve(id),
            PickerOutcome::Decline => responder.resolve(Value::Null),
            PickerOutcome::Fail(reason) => responder.reject(BridgeError::new(reason)),
            PickerOutcome::Hold => {
                let token = script.tokens.last().cloned().unwrap_or(Value::Null);
                self.state.lock().held.push(HeldPicker { token, responder });
            }
        }
        call
    }

    fn close_picker(&self, token: Option<&Value>) -> BridgeCall {
        let wanted = token.cloned().unwrap_or(Value::Null);
        let held = {
            let mut state = self.state.lock();
            let index = state.held.iter().position(|h| h.token == wanted);
            index.map(|index| state.held.remove(index))
        };
        match held {
            Some(held) => {
                // A cancelled chooseDesktopMedia answers with an empty id.
                held.responder.resolve(String::new());
                BridgeCall::ready(Ok(Value::Bool(true)))
            }
            None => BridgeCall::ready(Ok(Value::Bool(false))),
        }
    }
}

impl ExtensionBridge for ScriptedBridge {
    fn call(&self, message: BridgeMessage) -> BridgeCall {
        self.state.lock().sent.push(message.clone());
        match &message.action {
            BridgeAction::ChooseDesktopMedia => self.open_picker(),
            BridgeAction::CancelChooseDesktopMedia => self.close_picker(message.args.as_ref()),
            BridgeAction::Other(action) => BridgeCall::ready(Err(BridgeError::new(format!(
                "Unsupported action: {action}"
            )))),
        }
    }

    fn availability(&self) -> ExtensionAvailability {
        self.state.lock().availability
    }

    fn install_flow(&self) -> Option<Arc<dyn InstallFlow>> {
        let install = self.state.lock().install.clone()?;
        Some(install)
    }

    fn subscribe(&self, listener: Weak<dyn AvailabilityListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|existing| existing.strong_count() > 0);
        listeners.push(listener);
    }
}

/// Install flow handed out by [`ScriptedBridge::install_flow`].
pub struct ScriptedInstall {
    script: InstallScript,
    bridge: Weak<ScriptedBridge>,
    cancelled: Notify,
    installs: AtomicUsize,
    cancels: AtomicUsize,
}

impl ScriptedInstall {
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstallFlow for ScriptedInstall {
    async fn install(&self) -> BridgeResult<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            InstallScript::Succeed { makes_present } => {
                if *makes_present {
                    if let Some(bridge) = self.bridge.upgrade() {
                        let mut availability = bridge.availability();
                        availability.present = true;
                        bridge.set_availability(availability);
                    }
                }
                Ok(())
            }
            InstallScript::Fail(reason) => Err(BridgeError::new(reason.clone())),
            InstallScript::HoldUntilCancelled => {
                self.cancelled.notified().await;
                Err(BridgeError::new("Extension install cancelled"))
            }
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancelled.notify_one();
    }
}
