//! Contract tests for stored-token handling
//!
//! A legacy plaintext token is re-wrapped in place and the tick proceeds
//! with it; anything else that fails to unwrap degrades to no-config.

mod common;

use common::*;
use duckdns_core::audit::TAIL_WINDOW;
use duckdns_core::{AgentConfig, TickOutcome};

#[tokio::test]
async fn legacy_plaintext_token_is_rewrapped_in_place() {
    let legacy = AgentConfig::new(
        vec!["home".to_string()],
        TEST_TOKEN.to_string(),
        None,
        15,
    );
    let h = harness(
        SharedConfigStore::with_config(legacy),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::ok("OK")),
    );
    h.resolver
        .script_ips(
            "home.duckdns.org",
            ["198.51.100.4", "198.51.100.4", "198.51.100.4"],
        )
        .await;

    let report = h.engine.run_tick().await;

    // The tick itself proceeds with the plaintext token.
    assert_eq!(report.outcome, TickOutcome::UpdateOk);
    assert_eq!(h.client.calls().await[0].token, TEST_TOKEN);

    // The stored copy is now a ciphertext that unwraps to the original.
    assert_eq!(h.config_store.save_call_count(), 1);
    let stored = h.config_store.current().await.unwrap();
    assert_ne!(stored.token, TEST_TOKEN);
    assert_eq!(test_vault().unwrap(&stored.token).unwrap(), TEST_TOKEN);

    // Later ticks unwrap without another migration.
    h.engine.run_tick().await;
    assert_eq!(h.config_store.save_call_count(), 1);
}

#[tokio::test]
async fn unusable_stored_token_degrades_to_no_config() {
    let corrupt = AgentConfig::new(
        vec!["home".to_string()],
        "definitely-not-a-ciphertext".to_string(),
        None,
        5,
    );
    let h = harness(
        SharedConfigStore::with_config(corrupt),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::ok("OK")),
    );

    let report = h.engine.run_tick().await;

    assert_eq!(report.outcome, TickOutcome::NoConfig);
    // Interval still comes from the configuration that was read.
    assert_eq!(report.interval_minutes, 5);
    assert_eq!(h.client.call_count().await, 0);
    assert_eq!(h.config_store.save_call_count(), 0);

    let lines = h.audit.tail(TAIL_WINDOW).await.unwrap();
    assert!(lines.last().unwrap().ends_with("AutoUpdate FAILED - No configuration found"));
}

#[tokio::test]
async fn tampered_ciphertext_degrades_to_no_config() {
    let mut wrapped = wrapped_test_token();
    // Corrupt the tail of the base64 payload.
    wrapped.replace_range(wrapped.len() - 4.., "AAAA");
    let config = AgentConfig::new(vec!["home".to_string()], wrapped, None, 15);

    let h = harness(
        SharedConfigStore::with_config(config),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::ok("OK")),
    );

    let report = h.engine.run_tick().await;

    assert_eq!(report.outcome, TickOutcome::NoConfig);
    assert_eq!(h.client.call_count().await, 0);
}
