//! capshare platform core contracts.
//!
//! This crate contains the data model shared by the negotiation engine and
//! its callers: what browser we are running in, what the companion extension
//! reports, which capture mode was decided, and what a finished acquisition
//! hands back. Nothing here talks to a browser or an extension.

pub mod browser;
pub mod capability;
pub mod options;

pub use browser::{BrowserContext, BrowserFamily, BrowserProbe};
pub use capability::{Capability, CaptureMode, ExtensionAvailability, VersionWindow};
pub use options::{RequestOptions, SourceDescriptor};
