//! Subcommands and the flags they share.

use clap::Args;

use capshare_negotiation::PickerScript;
use capshare_platform_core::{BrowserContext, BrowserFamily, ExtensionAvailability};

pub mod check;
pub mod config;
pub mod simulate;

/// Source id picked when no picker outcome is given.
const DEFAULT_SOURCE_ID: &str = "screen:0:0";

/// Browser and extension state to negotiate against.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Derive browser family and version from a user agent string
    #[arg(long, conflicts_with_all = ["browser", "browser_version"])]
    pub user_agent: Option<String>,

    /// Browser family: chrome, firefox or other [default: chrome]
    #[arg(long)]
    pub browser: Option<BrowserFamily>,

    /// Browser major version
    #[arg(long)]
    pub browser_version: Option<u32>,

    /// The companion extension is installed
    #[arg(long)]
    pub extension: bool,

    /// The extension can be installed from the page
    #[arg(long)]
    pub autoinstall: bool,
}

impl TargetArgs {
    pub fn browser_context(&self) -> BrowserContext {
        match &self.user_agent {
            Some(user_agent) => BrowserContext::from_user_agent(user_agent),
            None => BrowserContext::new(
                self.browser.unwrap_or(BrowserFamily::Chrome),
                self.browser_version,
            ),
        }
    }

    pub fn availability(&self) -> ExtensionAvailability {
        ExtensionAvailability {
            present: self.extension,
            autoinstall_available: self.autoinstall,
        }
    }
}

/// How the scripted source picker answers.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct PickerArgs {
    /// The user picks this source id [default: screen:0:0]
    #[arg(long, value_name = "ID")]
    pub pick: Option<String>,

    /// The user closes the picker without choosing
    #[arg(long)]
    pub decline: bool,

    /// The extension reports this error
    #[arg(long, value_name = "MESSAGE")]
    pub fail: Option<String>,
}

impl PickerArgs {
    pub fn script(&self) -> PickerScript {
        if self.decline {
            return PickerScript::decline();
        }
        if let Some(reason) = &self.fail {
            return PickerScript::fail(reason.clone());
        }
        PickerScript::pick(self.pick.as_deref().unwrap_or(DEFAULT_SOURCE_ID))
    }
}
