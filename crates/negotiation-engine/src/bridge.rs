//! Contract consumed from the companion browser extension.
//!
//! The bridge itself (message transport, install triggering) lives outside
//! this crate. The negotiation engine only needs:
//!
//! - a request/response channel whose replies may be preceded by progress
//!   notifications ([`ExtensionBridge::call`] / [`BridgeCall`]),
//! - the current [`ExtensionAvailability`] and a change notification,
//! - an optional [`InstallFlow`].

use std::fmt;
use std::sync::{Arc, Weak};

use capshare_common::error::{BridgeError, BridgeResult};
use capshare_platform_core::ExtensionAvailability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Receives the extension's availability whenever it changes.
pub trait AvailabilityListener: Send + Sync {
    fn availability_changed(&self, availability: ExtensionAvailability);
}

/// Channel to the companion extension.
pub trait ExtensionBridge: Send + Sync {
    /// Send a message. The returned call settles once with the extension's
    /// reply; dropping it abandons the reply (fire and forget).
    fn call(&self, message: BridgeMessage) -> BridgeCall;

    /// What the extension reports right now.
    fn availability(&self) -> ExtensionAvailability;

    /// Install flow for the extension, when the host can trigger one.
    fn install_flow(&self) -> Option<Arc<dyn InstallFlow>>;

    /// Register a listener for availability changes. The bridge holds it
    /// weakly: once the listener is dropped it is skipped and pruned.
    fn subscribe(&self, listener: Weak<dyn AvailabilityListener>);
}

/// On-demand installation of the companion extension.
#[async_trait::async_trait]
pub trait InstallFlow: Send + Sync {
    async fn install(&self) -> BridgeResult<()>;

    /// Abort an install in progress. Optional; the default does nothing.
    fn cancel(&self) {}
}

/// Actions understood by the extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BridgeAction {
    /// Open the desktop source picker.
    ChooseDesktopMedia,
    /// Close a picker opened by `ChooseDesktopMedia`; `Args` is its token.
    CancelChooseDesktopMedia,
    /// Any other action, carried verbatim.
    Other(String),
}

impl BridgeAction {
    pub fn as_str(&self) -> &str {
        match self {
            BridgeAction::ChooseDesktopMedia => "chooseDesktopMedia",
            BridgeAction::CancelChooseDesktopMedia => "cancelChooseDesktopMedia",
            BridgeAction::Other(name) => name,
        }
    }
}

impl From<String> for BridgeAction {
    fn from(name: String) -> Self {
        match name.as_str() {
            "chooseDesktopMedia" => BridgeAction::ChooseDesktopMedia,
            "cancelChooseDesktopMedia" => BridgeAction::CancelChooseDesktopMedia,
            _ => BridgeAction::Other(name),
        }
    }
}

impl From<BridgeAction> for String {
    fn from(action: BridgeAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for BridgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message envelope sent to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: BridgeAction,
    #[serde(rename = "Args", default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl BridgeMessage {
    pub fn action(action: BridgeAction) -> Self {
        Self {
            kind: "Action".to_string(),
            action,
            args: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn choose_desktop_media() -> Self {
        Self::action(BridgeAction::ChooseDesktopMedia)
    }

    pub fn cancel_choose_desktop_media(token: Value) -> Self {
        Self::action(BridgeAction::CancelChooseDesktopMedia).with_args(token)
    }
}

/// An in-flight bridge request: zero or more progress values, then one reply.
#[derive(Debug)]
pub struct BridgeCall {
    progress: mpsc::UnboundedReceiver<Value>,
    reply: oneshot::Receiver<BridgeResult<Value>>,
}

/// Producer side of a [`BridgeCall`], held by the bridge implementation.
#[derive(Debug)]
pub struct BridgeResponder {
    progress: mpsc::UnboundedSender<Value>,
    reply: oneshot::Sender<BridgeResult<Value>>,
}

impl BridgeCall {
    pub fn channel() -> (BridgeResponder, BridgeCall) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            BridgeResponder {
                progress: progress_tx,
                reply: reply_tx,
            },
            BridgeCall {
                progress: progress_rx,
                reply: reply_rx,
            },
        )
    }

    /// A call that is already answered.
    pub fn ready(outcome: BridgeResult<Value>) -> Self {
        let (responder, call) = Self::channel();
        responder.settle(outcome);
        call
    }

    /// Wait for the reply, handing every progress value to `on_progress`
    /// as it arrives. Progress queued before the reply is always delivered
    /// first.
    pub async fn settle<F>(self, mut on_progress: F) -> BridgeResult<Value>
    where
        F: FnMut(Value) + Send,
    {
        let BridgeCall {
            mut progress,
            mut reply,
        } = self;
        let mut progress_open = true;

        loop {
            tokio::select! {
                biased;
                update = progress.recv(), if progress_open => match update {
                    Some(value) => on_progress(value),
                    None => progress_open = false,
                },
                outcome = &mut reply => {
                    return outcome.unwrap_or_else(|_| {
                        Err(BridgeError::new("extension bridge dropped the request"))
                    });
                }
            }
        }
    }
}

impl BridgeResponder {
    /// Emit an informational progress value. Returns `false` once the
    /// caller has stopped listening.
    pub fn notify(&self, value: impl Into<Value>) -> bool {
        self.progress.send(value.into()).is_ok()
    }

    pub fn resolve(self, value: impl Into<Value>) {
        self.settle(Ok(value.into()));
    }

    pub fn reject(self, error: BridgeError) {
        self.settle(Err(error));
    }

    pub fn settle(self, outcome: BridgeResult<Value>) {
        // The caller may have abandoned the call; nothing to report then.
        let _ = self.reply.send(outcome);
    }

    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}
