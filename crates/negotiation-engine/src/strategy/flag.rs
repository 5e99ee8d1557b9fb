//! Flag-gated desktop capture (Chrome 32 to 36).

use async_trait::async_trait;
use capshare_common::error::CapshareResult;
use capshare_platform_core::{CaptureMode, RequestOptions, SourceDescriptor};

use super::AcquisitionStrategy;

/// Builds `chromeMediaSource: "screen"` constraints for browsers that expose
/// screen capture behind `chrome://flags/#enable-usermedia-screen-capture`.
///
/// There is no picker and nothing to cancel.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionFlagStrategy;

#[async_trait]
impl AcquisitionStrategy for VersionFlagStrategy {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Flag
    }

    async fn acquire(&self, options: RequestOptions) -> CapshareResult<Option<SourceDescriptor>> {
        Ok(Some(SourceDescriptor::screen_flag(options)))
    }
}
