//! Run a full negotiation against the scripted extension bridge.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

use capshare_common::config::AppConfig;
use capshare_negotiation::bridge::BridgeMessage;
use capshare_negotiation::{InstallScript, NegotiationSession, ScriptedBridge};
use capshare_platform_core::{Capability, RequestOptions, SourceDescriptor};

use super::{PickerArgs, TargetArgs};

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Outcome {
    Source { descriptor: SourceDescriptor },
    Declined,
    Error { message: String },
}

#[derive(Debug, Serialize)]
struct Report {
    initial: Capability,
    #[serde(rename = "final")]
    settled: Capability,
    #[serde(flatten)]
    outcome: Outcome,
    messages: Vec<BridgeMessage>,
}

pub async fn run(
    config: &AppConfig,
    target: &TargetArgs,
    picker: &PickerArgs,
    install_succeeds: bool,
    raw_options: &[String],
) -> anyhow::Result<()> {
    config.validate()?;
    let options = parse_options(raw_options)?;

    let bridge = ScriptedBridge::new(target.availability());
    bridge.push_picker(picker.script());
    if target.autoinstall {
        bridge.set_install_script(InstallScript::Succeed {
            makes_present: install_succeeds,
        });
    }

    let session = NegotiationSession::new(
        config.detection,
        Arc::new(target.browser_context()),
        bridge.clone(),
    );
    let initial = session.capability();

    let outcome = match session.get_screen(options).await {
        Ok(Some(descriptor)) => Outcome::Source { descriptor },
        Ok(None) => Outcome::Declined,
        Err(e) => Outcome::Error {
            message: e.to_string(),
        },
    };
    tracing::debug!(?outcome, "Simulated request settled");

    let report = Report {
        initial,
        settled: session.capability(),
        outcome,
        messages: bridge.sent(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse `key=value` pairs. Values that read as JSON keep their type;
/// anything else is taken as a string.
fn parse_options(raw: &[String]) -> anyhow::Result<RequestOptions> {
    raw.iter()
        .map(|pair| -> anyhow::Result<(String, Value)> {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Option '{pair}' is not in key=value form"))?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("Option '{pair}' has an empty key");
            }
            let value =
                serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::from(value));
            Ok((key.to_string(), value))
        })
        .collect()
}
