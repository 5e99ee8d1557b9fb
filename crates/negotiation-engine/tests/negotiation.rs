use std::sync::Arc;

use capshare_common::config::DetectionConfig;
use capshare_negotiation::bridge::BridgeAction;
use capshare_negotiation::strategy::{AcquisitionStrategy, ExtensionStrategy};
use capshare_negotiation::{InstallScript, NegotiationSession, PickerScript, ScriptedBridge};
use capshare_platform_core::options::{MEDIA_SOURCE_ID_KEY, MEDIA_SOURCE_KEY};
use capshare_platform_core::{
    BrowserContext, CaptureMode, ExtensionAvailability, RequestOptions,
};
use serde_json::{json, Value};

const CHROME_35_UA: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/35.0.1916.153 Safari/537.36";

fn session(browser: BrowserContext, bridge: &Arc<ScriptedBridge>) -> NegotiationSession {
    NegotiationSession::new(DetectionConfig::default(), Arc::new(browser), bridge.clone())
}

fn options() -> RequestOptions {
    RequestOptions::new()
        .with("maxWidth", 1920)
        .with("maxHeight", 1080)
}

/// Cancel requests the bridge received, by their `Args` token.
fn cancelled_tokens(bridge: &ScriptedBridge) -> Vec<Value> {
    bridge
        .sent()
        .into_iter()
        .filter(|m| m.action == BridgeAction::CancelChooseDesktopMedia)
        .map(|m| m.args.unwrap_or(Value::Null))
        .collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition was never reached");
}

#[tokio::test]
async fn flag_window_resolves_screen_constraints() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
    let session = session(BrowserContext::from_user_agent(CHROME_35_UA), &bridge);

    assert_eq!(session.capability().mode(), CaptureMode::Flag);
    let descriptor = session.get_screen(options()).await.unwrap().unwrap();

    assert_eq!(descriptor.mode(), CaptureMode::Flag);
    assert_eq!(
        descriptor.constraints().get(MEDIA_SOURCE_KEY),
        Some(&json!("screen"))
    );
    assert_eq!(descriptor.constraints().get("maxWidth"), Some(&json!(1920)));
    assert!(bridge.sent().is_empty());
}

#[tokio::test]
async fn modern_browser_without_extension_is_unsupported() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::absent());
    let session = session(BrowserContext::chrome(37), &bridge);

    assert!(!session.is_supported());
    let err = session.get_screen(options()).await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn extension_pick_merges_caller_options() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::pick("screen:0:0").with_tokens([json!(1)]));
    let session = session(BrowserContext::chrome(34), &bridge);

    let caller = options().with(MEDIA_SOURCE_KEY, "caller-choice");
    let descriptor = session.get_screen(caller).await.unwrap().unwrap();

    assert_eq!(descriptor.mode(), CaptureMode::Extension);
    assert_eq!(descriptor.source_id(), Some("screen:0:0"));
    assert_eq!(
        descriptor.constraints().get(MEDIA_SOURCE_KEY),
        Some(&json!("caller-choice"))
    );
    assert_eq!(
        descriptor.constraints().get(MEDIA_SOURCE_ID_KEY),
        Some(&json!("screen:0:0"))
    );
}

#[tokio::test]
async fn extension_empty_id_resolves_none() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::pick(""));
    let session = session(BrowserContext::chrome(60), &bridge);

    assert_eq!(session.get_screen(options()).await.unwrap(), None);
}

#[tokio::test]
async fn extension_failure_is_passed_through() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::fail("Tab capture already active"));
    let session = session(BrowserContext::chrome(60), &bridge);

    let err = session.get_screen(options()).await.unwrap_err();
    assert_eq!(
        err.as_bridge().map(|e| e.reason()),
        Some("Tab capture already active")
    );
}

#[tokio::test]
async fn cancel_without_acquire_is_a_no_op() {
    for availability in [
        ExtensionAvailability::absent(),
        ExtensionAvailability::installed(),
    ] {
        let bridge = ScriptedBridge::installable(InstallScript::HoldUntilCancelled);
        bridge.set_availability(availability);
        let session = session(BrowserContext::chrome(60), &bridge);

        session.cancel_get_screen();

        assert!(bridge.sent().is_empty());
        assert_eq!(bridge.scripted_install().unwrap().cancel_count(), 0);
    }
}

#[tokio::test]
async fn cancel_sends_pending_token_to_extension() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::hold().with_tokens([json!(17)]));
    let session = session(BrowserContext::chrome(60), &bridge);

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.get_screen(options()).await }
    });
    let strategy = session.current_strategy();
    wait_until(|| bridge.held_count() == 1 && strategy.is_pending()).await;

    session.cancel_get_screen();

    assert_eq!(task.await.unwrap().unwrap(), None);
    assert_eq!(cancelled_tokens(&bridge), vec![json!(17)]);
    assert!(!strategy.is_pending());

    // The token was consumed; a second cancel sends nothing.
    session.cancel_get_screen();
    assert_eq!(cancelled_tokens(&bridge).len(), 1);
}

#[tokio::test]
async fn autoinstall_still_autoinstall_fails() {
    let bridge = ScriptedBridge::installable(InstallScript::Succeed {
        makes_present: false,
    });
    let session = session(BrowserContext::chrome(60), &bridge);
    assert!(session.is_autoinstall());

    let err = session.get_screen(options()).await.unwrap_err();

    assert!(err.is_install_failed());
    assert_eq!(bridge.scripted_install().unwrap().install_count(), 1);
    assert!(session.is_autoinstall());
}

#[tokio::test]
async fn autoinstall_then_extension_matches_direct_call() {
    let script = PickerScript::pick("window:7:0").with_tokens([json!(3)]);

    let bridge = ScriptedBridge::installable(InstallScript::Succeed {
        makes_present: true,
    });
    bridge.push_picker(script.clone());
    let session = session(BrowserContext::chrome(60), &bridge);
    let via_install = session.get_screen(options()).await.unwrap();

    let direct_bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    direct_bridge.push_picker(script);
    let direct = ExtensionStrategy::new(direct_bridge.clone())
        .acquire(options())
        .await
        .unwrap();

    assert_eq!(via_install, direct);
    assert_eq!(session.capability().mode(), CaptureMode::Extension);
    assert_eq!(bridge.sent(), direct_bridge.sent());
}

#[tokio::test]
async fn autoinstall_then_extension_passes_decline_through() {
    let bridge = ScriptedBridge::installable(InstallScript::Succeed {
        makes_present: true,
    });
    bridge.push_picker(PickerScript::decline());
    let session = session(BrowserContext::chrome(60), &bridge);

    assert_eq!(session.get_screen(options()).await.unwrap(), None);
}

#[tokio::test]
async fn autoinstall_failure_reason_is_passed_through() {
    let bridge = ScriptedBridge::installable(InstallScript::Fail(
        "Inline installation is not supported".to_string(),
    ));
    let session = session(BrowserContext::chrome(60), &bridge);

    let err = session.get_screen(options()).await.unwrap_err();

    assert_eq!(
        err.as_bridge().map(|e| e.reason()),
        Some("Inline installation is not supported")
    );
}

#[tokio::test]
async fn autoinstall_cancel_reaches_install_flow_only_while_installing() {
    let bridge = ScriptedBridge::installable(InstallScript::HoldUntilCancelled);
    let session = session(BrowserContext::chrome(60), &bridge);
    let install = bridge.scripted_install().unwrap();

    session.cancel_get_screen();
    assert_eq!(install.cancel_count(), 0);

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.get_screen(options()).await }
    });
    let strategy = session.current_strategy();
    wait_until(|| install.install_count() == 1 && strategy.is_pending()).await;

    session.cancel_get_screen();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.as_bridge().is_some());
    assert_eq!(install.cancel_count(), 1);
    assert!(!strategy.is_pending());
}

#[tokio::test]
async fn availability_change_does_not_disturb_inflight_acquire() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::hold().with_tokens([json!(4)]));
    let session = session(BrowserContext::chrome(60), &bridge);

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.get_screen(options()).await }
    });
    let previous = session.current_strategy();
    wait_until(|| bridge.held_count() == 1 && previous.is_pending()).await;

    bridge.set_availability(ExtensionAvailability::absent());
    assert_eq!(session.capability().mode(), CaptureMode::None);
    assert!(previous.is_pending());

    // Goes to the new (none) strategy; the open picker is untouched.
    session.cancel_get_screen();
    assert!(cancelled_tokens(&bridge).is_empty());

    assert!(bridge.complete_held("screen:2:0"));
    let descriptor = task.await.unwrap().unwrap().unwrap();
    assert_eq!(descriptor.source_id(), Some("screen:2:0"));
}

#[tokio::test]
async fn replaced_strategy_can_still_be_cancelled_by_its_holder() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::hold().with_tokens([json!("picker-1")]));
    let session = session(BrowserContext::chrome(60), &bridge);

    let previous = session.current_strategy();
    let task = tokio::spawn({
        let strategy = previous.clone();
        async move { strategy.acquire(options()).await }
    });
    wait_until(|| previous.is_pending()).await;

    bridge.set_availability(ExtensionAvailability::installable());
    assert!(session.is_autoinstall());

    previous.cancel();

    assert_eq!(task.await.unwrap().unwrap(), None);
    assert_eq!(cancelled_tokens(&bridge), vec![json!("picker-1")]);
}

#[tokio::test]
async fn second_acquire_takes_over_the_pending_slot() {
    let bridge = ScriptedBridge::new(ExtensionAvailability::installed());
    bridge.push_picker(PickerScript::hold().with_tokens([json!(1)]));
    bridge.push_picker(PickerScript::hold().with_tokens([json!(2)]));
    let session = session(BrowserContext::chrome(60), &bridge);

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.get_screen(options()).await }
    });
    wait_until(|| bridge.held_count() == 1).await;
    let second = tokio::spawn({
        let session = session.clone();
        async move { session.get_screen(options()).await }
    });
    wait_until(|| bridge.held_count() == 2).await;

    session.cancel_get_screen();
    assert_eq!(cancelled_tokens(&bridge), vec![json!(2)]);
    assert_eq!(second.await.unwrap().unwrap(), None);

    // The first picker is orphaned: only completing it settles the request.
    assert_eq!(bridge.held_count(), 1);
    assert!(bridge.complete_held("screen:9:0"));
    let descriptor = first.await.unwrap().unwrap().unwrap();
    assert_eq!(descriptor.source_id(), Some("screen:9:0"));
}
