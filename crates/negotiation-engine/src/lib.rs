//! capshare Negotiation Engine
//!
//! Decides how a page can obtain a screen capture source and mediates the
//! acquisition. Browsers expose capture through incompatible, version-gated
//! mechanisms (a developer flag on some releases, a companion extension's
//! source picker on others); the [`NegotiationSession`] hides them behind one
//! request/cancel contract.
//!
//! # Architecture
//!
//! ```text
//!  BrowserProbe ─────────┐
//!                        ├──▶ CapabilityDetector ──▶ Selection
//!  ExtensionBridge ──────┘            ▲              (capability, strategy)
//!   │ availability                    │                    │
//!   └── change notification ──────────┘                    ▼
//!                                 ┌──────┬───────────┬─────────────┬──────┐
//!                                 │ Flag │ Extension │ AutoInstall │ None │
//!                                 └──────┴───────────┴─────────────┴──────┘
//!                                                    ▲
//!                 NegotiationSession::get_screen / cancel_get_screen
//! ```

pub mod bridge;
pub mod detector;
pub mod scripted;
pub mod session;
pub mod strategy;

pub use bridge::{
    BridgeAction, BridgeCall, BridgeMessage, BridgeResponder, ExtensionBridge, InstallFlow,
};
pub use detector::{CapabilityDetector, Selection, StrategyDeps};
pub use scripted::{InstallScript, PickerOutcome, PickerScript, ScriptedBridge, ScriptedInstall};
pub use session::{NegotiationSession, SessionState};
pub use strategy::AcquisitionStrategy;
