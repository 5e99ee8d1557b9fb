//! Capability detection: which capture mechanism applies right now.
//!
//! The decision is an ordered rule table, first match wins:
//!
//! | # | condition                                                | mode          |
//! |---|----------------------------------------------------------|---------------|
//! | 1 | extension present                                        | `Extension`   |
//! | 2 | capture family and version inside the flag window        | `Flag`        |
//! | 3 | extension can be auto-installed                          | `AutoInstall` |
//! | 4 | otherwise                                                | `None`        |
//!
//! The extension outranks the flag window because extension-mediated capture
//! is the more reliable of the two when both would apply.

use std::fmt;
use std::sync::{Arc, Weak};

use capshare_common::config::DetectionConfig;
use capshare_platform_core::{BrowserContext, Capability, CaptureMode, ExtensionAvailability};

use crate::bridge::ExtensionBridge;
use crate::strategy::{
    AcquisitionStrategy, AutoInstallStrategy, ExtensionStrategy, NoneStrategy, Renegotiate,
    VersionFlagStrategy,
};

type Rule = fn(&DetectionConfig, &BrowserContext, &ExtensionAvailability) -> bool;

const RULES: &[(CaptureMode, Rule)] = &[
    (CaptureMode::Extension, extension_present),
    (CaptureMode::Flag, inside_flag_window),
    (CaptureMode::AutoInstall, autoinstall_available),
];

fn extension_present(_: &DetectionConfig, _: &BrowserContext, avail: &ExtensionAvailability) -> bool {
    avail.present
}

fn inside_flag_window(
    config: &DetectionConfig,
    context: &BrowserContext,
    _: &ExtensionAvailability,
) -> bool {
    context.family == config.capture_family && config.flag_window.contains(context.version)
}

fn autoinstall_available(
    _: &DetectionConfig,
    _: &BrowserContext,
    avail: &ExtensionAvailability,
) -> bool {
    avail.autoinstall_available
}

/// What strategies need from their surroundings.
#[derive(Clone)]
pub struct StrategyDeps {
    pub bridge: Arc<dyn ExtensionBridge>,
    /// Used by the auto-install strategy to negotiate again after installing.
    pub renegotiate: Weak<dyn Renegotiate>,
}

/// A capability together with the strategy that implements it.
///
/// Built whole on every detection pass and never patched afterwards.
#[derive(Clone)]
pub struct Selection {
    capability: Capability,
    strategy: Arc<dyn AcquisitionStrategy>,
}

impl Selection {
    pub fn new(capability: Capability, strategy: Arc<dyn AcquisitionStrategy>) -> Self {
        Self {
            capability,
            strategy,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn strategy(&self) -> &Arc<dyn AcquisitionStrategy> {
        &self.strategy
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("capability", &self.capability)
            .field("strategy", &self.strategy.mode())
            .finish()
    }
}

/// Pure mapping from browser and extension state to a [`Selection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityDetector {
    config: DetectionConfig,
}

impl CapabilityDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Evaluate the rule table.
    pub fn decide(
        &self,
        context: &BrowserContext,
        availability: &ExtensionAvailability,
    ) -> Capability {
        let mode = RULES
            .iter()
            .find(|(_, applies)| applies(&self.config, context, availability))
            .map(|(mode, _)| *mode)
            .unwrap_or(CaptureMode::None);
        Capability::from_mode(mode)
    }

    /// Decide the capability and build a fresh strategy for it.
    pub fn detect(
        &self,
        context: &BrowserContext,
        availability: &ExtensionAvailability,
        deps: &StrategyDeps,
    ) -> Selection {
        let capability = self.decide(context, availability);
        let strategy: Arc<dyn AcquisitionStrategy> = match capability.mode() {
            CaptureMode::Extension => Arc::new(ExtensionStrategy::new(deps.bridge.clone())),
            CaptureMode::Flag => Arc::new(VersionFlagStrategy),
            CaptureMode::AutoInstall => Arc::new(AutoInstallStrategy::new(
                deps.bridge.clone(),
                deps.renegotiate.clone(),
            )),
            CaptureMode::None => Arc::new(NoneStrategy),
        };
        Selection::new(capability, strategy)
    }
}
