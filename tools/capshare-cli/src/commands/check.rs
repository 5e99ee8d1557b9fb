//! Report the capture capability for a browser and extension state.

use capshare_common::config::AppConfig;
use capshare_negotiation::CapabilityDetector;
use capshare_platform_core::CaptureMode;

use super::TargetArgs;

pub fn run(config: &AppConfig, target: &TargetArgs) -> anyhow::Result<()> {
    config.validate()?;

    let context = target.browser_context();
    let availability = target.availability();
    let detector = CapabilityDetector::new(config.detection);
    let capability = detector.decide(&context, &availability);

    println!("capshare Capability Check");
    println!("{}", "=".repeat(50));
    println!("Browser:            {context}");
    println!(
        "Flag window:        {} {}",
        config.detection.capture_family, config.detection.flag_window
    );
    println!("Extension:          {}", present(availability.present));
    println!(
        "Auto install:       {}",
        present(availability.autoinstall_available)
    );
    println!();

    match capability.mode() {
        CaptureMode::Extension => {
            println!("[OK] Screen sharing through the companion extension");
        }
        CaptureMode::Flag => {
            println!("[OK] Screen sharing through the browser's screen capture flag");
            println!("     The flag must be enabled in the browser settings.");
        }
        CaptureMode::AutoInstall => {
            println!("[OK] Screen sharing after installing the extension");
            println!("     The first request will trigger the install flow.");
        }
        CaptureMode::None => {
            println!("[FAIL] Screen sharing is not supported");
            println!("     Install the extension or use a browser inside the flag window.");
        }
    }

    Ok(())
}

fn present(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
