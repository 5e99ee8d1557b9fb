//! Browser identity as seen by the capture negotiation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Browser family hosting the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    /// Chromium-based browsers. The only family with flag or
    /// extension mediated screen capture.
    Chrome,
    Firefox,
    #[default]
    Other,
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserFamily::Chrome => write!(f, "chrome"),
            BrowserFamily::Firefox => write!(f, "firefox"),
            BrowserFamily::Other => write!(f, "other"),
        }
    }
}

impl FromStr for BrowserFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserFamily::Chrome),
            "firefox" => Ok(BrowserFamily::Firefox),
            "other" | "unknown" => Ok(BrowserFamily::Other),
            other => Err(format!("unknown browser family '{other}'")),
        }
    }
}

/// Browser family and major version for one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct BrowserContext {
    pub family: BrowserFamily,
    /// Major version; `None` when it could not be determined.
    pub version: Option<u32>,
}

impl BrowserContext {
    pub fn new(family: BrowserFamily, version: Option<u32>) -> Self {
        Self { family, version }
    }

    pub fn chrome(version: u32) -> Self {
        Self::new(BrowserFamily::Chrome, Some(version))
    }

    pub fn firefox(version: u32) -> Self {
        Self::new(BrowserFamily::Firefox, Some(version))
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    /// Derive the browser family and major version from a user-agent string.
    ///
    /// Chromium derivatives (Edge, Opera, headless) report a `Chrome/NN`
    /// product token and are classified as Chrome with that version.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if let Some(version) = product_version(user_agent, &["Firefox/", "FxiOS/"]) {
            return Self::new(BrowserFamily::Firefox, version);
        }
        if let Some(version) = product_version(user_agent, &["CriOS/", "Chrome/", "Chromium/"]) {
            return Self::new(BrowserFamily::Chrome, version);
        }
        Self::unknown()
    }
}

impl fmt::Display for BrowserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{} {}", self.family, version),
            None => write!(f, "{} (unknown version)", self.family),
        }
    }
}

/// Source of the current browser identity.
///
/// Re-read on every (re)detection so a probe backed by live state is
/// always consulted fresh.
pub trait BrowserProbe: Send + Sync {
    fn browser_context(&self) -> BrowserContext;
}

impl BrowserProbe for BrowserContext {
    fn browser_context(&self) -> BrowserContext {
        *self
    }
}

/// Returns `Some(major)` for the first product token present in `user_agent`.
/// The inner option is `None` when the token carries no parsable major version.
fn product_version(user_agent: &str, products: &[&str]) -> Option<Option<u32>> {
    products.iter().find_map(|product| {
        let start = user_agent.find(product)? + product.len();
        let major: String = user_agent[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        Some(major.parse().ok())
    })
}
