//! Capture capability decisions and the inputs they are derived from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mechanism used to obtain a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// No mechanism applies.
    #[default]
    None,
    /// Version-gated browser flag (`chromeMediaSource: "screen"`).
    Flag,
    /// Companion extension source picker.
    Extension,
    /// Install the extension on demand, then negotiate again.
    AutoInstall,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::None => write!(f, "none"),
            CaptureMode::Flag => write!(f, "flag"),
            CaptureMode::Extension => write!(f, "extension"),
            CaptureMode::AutoInstall => write!(f, "autoinstall"),
        }
    }
}

/// Outcome of one detection pass.
///
/// Always built whole from a [`CaptureMode`]; `supported` cannot disagree
/// with the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Capability {
    supported: bool,
    mode: CaptureMode,
}

impl Capability {
    pub fn from_mode(mode: CaptureMode) -> Self {
        Self {
            supported: mode != CaptureMode::None,
            mode,
        }
    }

    pub fn unsupported() -> Self {
        Self::from_mode(CaptureMode::None)
    }

    pub fn supported(&self) -> bool {
        self.supported
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Whether acquisition will go through the install-then-retry fallback.
    pub fn is_autoinstall(&self) -> bool {
        self.mode == CaptureMode::AutoInstall
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.supported {
            write!(f, "supported ({})", self.mode)
        } else {
            write!(f, "unsupported")
        }
    }
}

/// What the companion extension bridge currently reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ExtensionAvailability {
    /// The extension is installed and answering.
    pub present: bool,
    /// An install flow can be triggered from the page.
    pub autoinstall_available: bool,
}

impl ExtensionAvailability {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn installed() -> Self {
        Self {
            present: true,
            autoinstall_available: false,
        }
    }

    pub fn installable() -> Self {
        Self {
            present: false,
            autoinstall_available: true,
        }
    }
}

/// Half-open browser version range `[min_version, max_version)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionWindow {
    pub min_version: u32,
    pub max_version: u32,
}

impl VersionWindow {
    /// Flag-based capture landed in Chrome 32 and was removed in Chrome 37
    /// in favour of `chooseDesktopMedia`.
    pub const CHROME_SCREEN_FLAG: VersionWindow = VersionWindow {
        min_version: 32,
        max_version: 37,
    };

    pub fn new(min_version: u32, max_version: u32) -> Self {
        Self {
            min_version,
            max_version,
        }
    }

    /// An unknown version is never inside the window.
    pub fn contains(&self, version: Option<u32>) -> bool {
        version.is_some_and(|v| v >= self.min_version && v < self.max_version)
    }

    pub fn is_empty(&self) -> bool {
        self.min_version >= self.max_version
    }
}

impl Default for VersionWindow {
    fn default() -> Self {
        Self::CHROME_SCREEN_FLAG
    }
}

impl fmt::Display for VersionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.min_version, self.max_version)
    }
}
