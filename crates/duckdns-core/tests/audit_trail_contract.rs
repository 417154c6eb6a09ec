//! Contract tests for the audit trail shape
//!
//! Every tick writes a leading trigger marker and exactly one terminal
//! line, and no audit line ever carries the plaintext token.

mod common;

use common::*;
use duckdns_core::TickOutcome;
use duckdns_core::audit::TAIL_WINDOW;

#[tokio::test]
async fn fresh_install_short_circuits_without_touching_the_network() {
    let h = harness(
        SharedConfigStore::empty(),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::ok("OK")),
    );

    let report = h.engine.run_tick().await;

    assert_eq!(report.outcome, TickOutcome::NoConfig);
    assert_eq!(report.interval_minutes, 15);
    assert_eq!(h.probe.call_count(), 0);
    assert!(h.resolver.queried().await.is_empty());
    assert_eq!(h.client.call_count().await, 0);

    let lines = h.audit.tail(TAIL_WINDOW).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("AutoUpdate triggered by scheduler"));
    assert!(lines[1].ends_with("AutoUpdate FAILED - No configuration found"));
}

#[tokio::test]
async fn each_tick_writes_a_trigger_then_one_terminal_line() {
    let h = harness(
        SharedConfigStore::with_config(home_config(None, 15)),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::ok("OK")),
    );
    h.resolver
        .script_ips(
            "home.duckdns.org",
            ["203.0.113.7", "203.0.113.7", "203.0.113.7"],
        )
        .await;

    h.engine.run_tick().await;
    h.engine.run_tick().await;

    let lines = h.audit.tail(TAIL_WINDOW).await.unwrap();
    assert_eq!(lines.len(), 4);
    for pair in lines.chunks(2) {
        assert!(pair[0].ends_with("AutoUpdate triggered by scheduler"));
        assert!(pair[1].contains("SKIPPED"));
    }
}

#[tokio::test]
async fn transport_diagnostics_never_leak_the_token() {
    let h = harness(
        SharedConfigStore::with_config(home_config(None, 15)),
        ScriptedProbe::answering("203.0.113.7".parse().unwrap()),
        ScriptedResolver::new(),
        ScriptedUpdateClient::answering(duckdns_core::UpdateOutcome::failed(format!(
            "ERROR: GET https://www.duckdns.org/update?domains=home&token={} timed out",
            TEST_TOKEN
        ))),
    );
    h.resolver
        .script_ips(
            "home.duckdns.org",
            ["198.51.100.4", "198.51.100.4", "198.51.100.4"],
        )
        .await;

    let report = h.engine.run_tick().await;

    assert!(matches!(report.outcome, TickOutcome::Error(_)));
    let lines = h.audit.tail(TAIL_WINDOW).await.unwrap();
    for line in &lines {
        assert!(!line.contains(TEST_TOKEN), "token leaked in: {}", line);
    }
    assert!(lines.last().unwrap().contains("token=***"));
}
