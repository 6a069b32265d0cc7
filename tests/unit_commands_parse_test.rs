use browsergate::core::commands::{Command, CommandFlags, ExtractKind, WaitCondition};
use browsergate::core::errors::GatewayError;
use browsergate::core::sessions::TimeoutPolicy;
use browsergate::driver::{LifecycleEvent, MouseButton};
use serde_json::{Map, Value, json};
use std::time::Duration;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("test params must be an object"),
    }
}

#[test]
fn test_unknown_method_fails_fast() {
    let err = Command::parse("teleport", &params(json!({}))).unwrap_err();
    assert!(matches!(err, GatewayError::UnknownMethod(_)));
    assert_eq!(err.error_code(), "INVALID_COMMAND");
}

#[test]
fn test_navigate_parse() {
    let cmd = Command::parse(
        "navigate",
        &params(json!({"url": "https://example.com/", "wait_until": "network-idle"})),
    )
    .unwrap();
    let Command::Navigate(nav) = cmd else {
        panic!("expected navigate");
    };
    assert_eq!(nav.url, "https://example.com/");
    assert_eq!(nav.wait_until, LifecycleEvent::NetworkIdle);
    assert!(nav.referer.is_none());
}

#[test]
fn test_navigate_requires_url() {
    let err = Command::parse("navigate", &params(json!({}))).unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("url")));
}

#[test]
fn test_click_defaults_and_validation() {
    let cmd = Command::parse("click", &params(json!({"selector": "a.link"}))).unwrap();
    let Command::Click(click) = cmd else {
        panic!("expected click");
    };
    assert_eq!(click.button, MouseButton::Left);
    assert_eq!(click.click_count, 1);
    assert!(!click.force);
    assert!(click.position.is_none());

    let err = Command::parse(
        "click",
        &params(json!({"selector": "a", "click_count": 0})),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCommand(_)));

    let err = Command::parse(
        "click",
        &params(json!({"selector": "a", "position": {"x": 1.5, "y": 0.5}})),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCommand(_)));

    let cmd = Command::parse(
        "click",
        &params(json!({
            "selector": "a",
            "button": "right",
            "click_count": 2,
            "position": {"x": 0.25, "y": 0.75}
        })),
    )
    .unwrap();
    let Command::Click(click) = cmd else {
        panic!("expected click");
    };
    assert_eq!(click.button, MouseButton::Right);
    assert_eq!(click.click_count, 2);
}

#[test]
fn test_fill_defaults() {
    let cmd = Command::parse(
        "fill",
        &params(json!({"selector": "input#q", "text": "rust websockets"})),
    )
    .unwrap();
    let Command::Fill(fill) = cmd else {
        panic!("expected fill");
    };
    assert!(fill.clear_first);
    assert!(!fill.press_enter);
    assert!(!fill.validate_after);
    assert!(fill.typing_delay_ms.is_none());
}

#[test]
fn test_extract_kind_parameter_requirements() {
    let err = Command::parse(
        "extract",
        &params(json!({"selector": "a", "kind": "attribute"})),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("attribute_name")));

    let err = Command::parse(
        "extract",
        &params(json!({"selector": "a", "kind": "property"})),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("property_name")));

    let cmd = Command::parse(
        "extract",
        &params(json!({
            "selector": "a",
            "kind": "attribute",
            "attribute_name": "href",
            "multiple": true
        })),
    )
    .unwrap();
    let Command::Extract(extract) = cmd else {
        panic!("expected extract");
    };
    assert_eq!(extract.kind, ExtractKind::Attribute);
    assert!(extract.multiple);
    assert!(extract.trim);
}

#[test]
fn test_wait_condition_requirements() {
    let err = Command::parse("wait", &params(json!({"condition": "visible"}))).unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("selector")));

    let err = Command::parse(
        "wait",
        &params(json!({"condition": "text-equals", "selector": "h1"})),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("expected_text")));

    let err = Command::parse("wait", &params(json!({"condition": "custom-script"}))).unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("script")));

    let cmd = Command::parse(
        "wait",
        &params(json!({"condition": "dom-content-loaded"})),
    )
    .unwrap();
    let Command::Wait(wait) = cmd else {
        panic!("expected wait");
    };
    assert_eq!(wait.condition, WaitCondition::DomContentLoaded);
    assert_eq!(wait.poll_interval_ms, 100);
}

#[test]
fn test_config_set_requires_parameter_and_value() {
    let err = Command::parse("config.set", &params(json!({"value": "debug"}))).unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("parameter")));

    let err = Command::parse("config.set", &params(json!({"parameter": "log_level"})))
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingField("value")));

    let cmd = Command::parse(
        "config.set",
        &params(json!({"parameter": "log_level", "value": "debug"})),
    )
    .unwrap();
    let Command::ConfigSet(set) = cmd else {
        panic!("expected config.set");
    };
    assert_eq!(set.parameter, "log_level");
    assert_eq!(set.value, "debug");
}

#[test]
fn test_command_flags() {
    let navigate = Command::parse("navigate", &params(json!({"url": "https://a.example/"}))).unwrap();
    assert!(navigate.flags().contains(CommandFlags::MUTATING));

    let extract = Command::parse(
        "extract",
        &params(json!({"selector": "p", "kind": "text"})),
    )
    .unwrap();
    assert!(extract.flags().contains(CommandFlags::CACHEABLE));
    assert!(extract.flags().contains(CommandFlags::READ_ONLY));
    assert!(!extract.flags().contains(CommandFlags::MUTATING));

    let wait = Command::parse("wait", &params(json!({"condition": "load"}))).unwrap();
    assert!(wait.flags().contains(CommandFlags::READ_ONLY));
    assert!(!wait.flags().contains(CommandFlags::CACHEABLE));

    let ping = Command::parse("ping", &params(json!({}))).unwrap();
    assert!(ping.flags().contains(CommandFlags::SESSIONLESS));

    let set = Command::parse(
        "config.set",
        &params(json!({"parameter": "log_level", "value": "debug"})),
    )
    .unwrap();
    assert!(set.flags().contains(CommandFlags::CONTROL));
    assert!(set.flags().contains(CommandFlags::SESSIONLESS));
}

#[test]
fn test_timeout_policy_clamps() {
    let policy = TimeoutPolicy {
        default_ms: 10_000,
        max_ms: 120_000,
    };
    assert_eq!(policy.effective(None), Duration::from_millis(10_000));
    assert_eq!(policy.effective(Some(500)), Duration::from_millis(500));
    assert_eq!(policy.effective(Some(500_000)), Duration::from_millis(120_000));
    assert_eq!(policy.effective(Some(0)), Duration::from_millis(1));
}
