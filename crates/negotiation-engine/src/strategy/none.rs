//! Strategy selected when no capture mechanism applies.

use async_trait::async_trait;
use capshare_common::error::{CapshareError, CapshareResult};
use capshare_platform_core::{CaptureMode, RequestOptions, SourceDescriptor};

use super::AcquisitionStrategy;

#[derive(Debug, Default, Clone, Copy)]
pub struct NoneStrategy;

#[async_trait]
impl AcquisitionStrategy for NoneStrategy {
    fn mode(&self) -> CaptureMode {
        CaptureMode::None
    }

    async fn acquire(&self, _options: RequestOptions) -> CapshareResult<Option<SourceDescriptor>> {
        Err(CapshareError::unsupported("No implementation to get screen."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_unsupported() {
        let err = NoneStrategy.acquire(RequestOptions::new()).await.unwrap_err();
        assert!(err.is_unsupported());
        NoneStrategy.cancel();
    }
}
