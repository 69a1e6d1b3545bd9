#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use modwss_client::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  rest_endpoint: "https://g-1.modapi.io/v1"
timing:
  keep_alive_msec: 1000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
server:
  rest_endpoint: "https://g-1.modapi.io/v1"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.timing.wait_timeout_ms, 900_000);
    assert_eq!(cfg.timing.keep_alive_ms, 30_000);
    assert_eq!(cfg.wss_url().unwrap(), "wss://g-1.ws.modapi.io/");
}

#[test]
fn override_wins_over_derivation() {
    let ok = r#"
version: 1
server:
  rest_endpoint: "http://localhost:8080"
  wss_endpoint: "ws://127.0.0.1:9000/"
  game_id: "42"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.wss_url().unwrap(), "ws://127.0.0.1:9000/");
    assert_eq!(cfg.server.game_id.as_deref(), Some("42"));
}

#[test]
fn underivable_rest_endpoint_without_override_fails() {
    let bad = r#"
version: 1
server:
  rest_endpoint: "http://localhost:8080"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn timing_out_of_range_fails() {
    let bad = r#"
version: 1
server:
  rest_endpoint: "https://g-1.modapi.io"
timing:
  wait_timeout_ms: 0
"#;
    assert!(config::load_from_str(bad).is_err());
}
