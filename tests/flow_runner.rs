//! Real-time tests for the flow thread
//!
//! These tests sleep on wall-clock timers, so they run serially.

mod common;

use common::test_timeout;
use flow_nodes::config::FlowConfig;
use flow_nodes::flow::{message, shared_store, Flow, FlowBridge, FlowEvent, PAYLOAD, PRIMARY, SECONDARY};
use serde_json::json;
use serial_test::serial;
use std::time::Instant;

const PIPELINE: &str = r#"
name = "runner"

[[nodes]]
id = "tag-0"
type = "position-tagger"
position = "0"
wires = [["collect"]]

[[nodes]]
id = "tag-1"
type = "position-tagger"
position = "1"
wires = [["collect"]]

[[nodes]]
id = "collect"
type = "ordered-collector"
expected_count = 2
timeout_ms = 200
"#;

fn spawn() -> (FlowBridge, std::thread::JoinHandle<()>) {
    let config = FlowConfig::from_toml_str(PIPELINE).unwrap();
    let flow = Flow::from_config(&config, shared_store()).unwrap();
    flow_nodes::flow::FlowRunner::spawn(flow).unwrap()
}

/// Wait for the next message leaving the flow.
fn next_output(bridge: &FlowBridge) -> Option<(u16, serde_json::Value)> {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        match bridge.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Some(FlowEvent::Output { port, msg, .. }) => {
                return Some((port, msg.get(PAYLOAD).cloned().unwrap_or_default()))
            }
            Some(_) => continue,
            None => break,
        }
    }
    None
}

fn shutdown(bridge: FlowBridge, handle: std::thread::JoinHandle<()>) {
    bridge.shutdown();
    let deadline = Instant::now() + test_timeout();
    let mut saw_shutdown = false;
    while Instant::now() < deadline {
        match bridge.recv_timeout(test_timeout()) {
            Some(FlowEvent::Shutdown) => {
                saw_shutdown = true;
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }
    assert!(saw_shutdown, "flow thread did not report shutdown");
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_runner_completes_collection() {
    let (bridge, handle) = spawn();

    bridge.inject("tag-1", message(json!("b"))).unwrap();
    bridge.inject("tag-0", message(json!("a"))).unwrap();

    assert_eq!(next_output(&bridge), Some((PRIMARY, json!(["a", "b"]))));
    shutdown(bridge, handle);
}

#[test]
#[serial]
fn test_runner_fires_timeout_in_real_time() {
    let (bridge, handle) = spawn();
    let started = Instant::now();

    bridge.inject("tag-1", message(json!("b"))).unwrap();

    let (port, payload) = next_output(&bridge).expect("timeout emission");
    assert_eq!(port, SECONDARY);
    assert_eq!(payload["sequence"], json!([null, "b"]));
    assert!(started.elapsed() >= std::time::Duration::from_millis(200));
    shutdown(bridge, handle);
}

#[test]
#[serial]
fn test_runner_survives_unknown_target() {
    let (bridge, handle) = spawn();

    bridge.inject("nope", message(json!(1))).unwrap();
    bridge.inject("tag-0", message(json!("a"))).unwrap();
    bridge.inject("tag-1", message(json!("b"))).unwrap();

    assert_eq!(next_output(&bridge), Some((PRIMARY, json!(["a", "b"]))));
    shutdown(bridge, handle);
}

#[test]
#[serial]
fn test_shutdown_discards_pending_collection() {
    let (bridge, handle) = spawn();

    bridge.inject("tag-0", message(json!("a"))).unwrap();
    bridge.shutdown();

    let mut outputs = 0;
    loop {
        match bridge.recv_timeout(test_timeout()) {
            Some(FlowEvent::Output { .. }) => outputs += 1,
            Some(FlowEvent::Shutdown) | None => break,
            Some(_) => {}
        }
    }
    assert_eq!(outputs, 0);
    handle.join().unwrap();

    // The bridge reports the dead thread.
    assert!(bridge.inject("tag-0", message(json!("x"))).is_err());
}
