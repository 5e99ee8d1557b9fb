//! Acquisition strategies: one per capture mechanism.

use async_trait::async_trait;
use capshare_common::error::CapshareResult;
use capshare_platform_core::{CaptureMode, RequestOptions, SourceDescriptor};

pub mod autoinstall;
pub mod extension;
pub mod flag;
pub mod none;

pub use autoinstall::{AutoInstallStrategy, Renegotiate};
pub use extension::{ExtensionStrategy, PendingToken};
pub use flag::VersionFlagStrategy;
pub use none::NoneStrategy;

/// Turns a capture request into a source descriptor.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Mechanism this strategy implements.
    fn mode(&self) -> CaptureMode;

    /// Acquire a capture source.
    ///
    /// `Ok(None)` means the user declined the source picker; that is not
    /// an error.
    async fn acquire(&self, options: RequestOptions) -> CapshareResult<Option<SourceDescriptor>>;

    /// Best-effort abort of the acquisition in flight. Never fails; a
    /// no-op when nothing is pending.
    fn cancel(&self) {}

    /// Whether an acquisition is waiting on the user or the extension.
    fn is_pending(&self) -> bool {
        false
    }
}
