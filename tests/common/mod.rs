//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use flow_nodes::flow::{FlowEvent, Level, Message};
use std::time::Duration;

/// Shorthand for a millisecond duration
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Create a test timeout duration for real-time tests
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// A message that left the flow.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub label: String,
    pub port: u16,
    pub msg: Message,
    pub at: Duration,
}

/// Every `FlowEvent::Output` in `events`, in order.
pub fn outputs(events: &[FlowEvent]) -> Vec<Emitted> {
    events
        .iter()
        .filter_map(|event| match event {
            FlowEvent::Output {
                label, port, msg, at, ..
            } => Some(Emitted {
                label: label.clone(),
                port: *port,
                msg: msg.clone(),
                at: *at,
            }),
            _ => None,
        })
        .collect()
}

/// Text of every warning or error diagnostic in `events`.
pub fn warnings(events: &[FlowEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            FlowEvent::Diagnostic { level, text, .. } if *level != Level::Info => {
                Some(text.clone())
            }
            _ => None,
        })
        .collect()
}

/// Assert that no message left the flow.
pub fn assert_silent(events: &[FlowEvent]) {
    let emitted = outputs(events);
    assert!(emitted.is_empty(), "expected no output, got {:?}", emitted);
}
