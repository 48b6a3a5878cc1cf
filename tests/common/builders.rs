//! Test data builders for creating flows and messages

use flow_nodes::config::{CollectorSettings, QueueMode, QueueSettings, TaggerSettings};
use flow_nodes::flow::nodes::{OrderedCollectorNode, PositionTaggerNode, RateQueueNode, TaggedItem};
use flow_nodes::flow::{message, AnyNode, BuiltinNode, Flow, Message, NodeId, Scope, ValueSource};
use serde_json::{json, Value};

/// A message carrying `value` with a position tag already attached.
pub fn tagged(position: u64, value: Value) -> Message {
    let mut msg = message(value.clone());
    TaggedItem::new(position, value).attach(&mut msg);
    msg
}

/// A plain message with a numeric `seq` field, for FIFO checks.
pub fn numbered(seq: u64) -> Message {
    let mut msg = message(json!(format!("m{seq}")));
    msg.insert("seq".to_string(), json!(seq));
    msg
}

/// Builder for a flow holding a single Ordered Collector
pub struct CollectorBuilder {
    settings: CollectorSettings,
}

impl CollectorBuilder {
    pub fn new(expected_count: i64) -> Self {
        Self {
            settings: CollectorSettings {
                expected_count,
                ..Default::default()
            },
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.timeout_ms = timeout_ms;
        self
    }

    pub fn strict(mut self) -> Self {
        self.settings.strict = true;
        self
    }

    pub fn output(mut self, scope: Scope, path: &str) -> Self {
        self.settings.output_scope = scope;
        self.settings.output_path = path.to_string();
        self
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Build the flow; the collector is labelled `collect`.
    pub fn build(self) -> (Flow, NodeId) {
        let mut flow = Flow::new("collector-test");
        let id = flow
            .add_node(
                "collect",
                BuiltinNode::OrderedCollector(OrderedCollectorNode::new(&self.settings)),
            )
            .unwrap();
        (flow, id)
    }

    /// Build the flow with one literal-position tagger per slot, labelled
    /// `tag-0`, `tag-1`, ... and wired into the collector.
    pub fn build_with_taggers(self) -> (Flow, NodeId) {
        let count = self.settings.expected_count.max(1) as u64;
        let (mut flow, collector) = self.build();
        for position in 0..count {
            let tagger = PositionTaggerNode::new(&TaggerSettings {
                position: position.to_string(),
                position_source: ValueSource::Literal,
                ..Default::default()
            });
            let id = flow
                .add_node(format!("tag-{position}"), BuiltinNode::PositionTagger(tagger))
                .unwrap();
            flow.connect(id, 0, collector).unwrap();
        }
        (flow, collector)
    }
}

/// Builder for a flow holding a single Rate-Limited Queue
#[derive(Default)]
pub struct QueueBuilder {
    settings: QueueSettings,
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: QueueMode) -> Self {
        self.settings.mode = Some(mode);
        self
    }

    pub fn capacity(mut self, max_entries: u64) -> Self {
        self.settings.max_entries = max_entries;
        self
    }

    pub fn max_age_ms(mut self, max_age_ms: u64) -> Self {
        self.settings.max_age_ms = max_age_ms;
        self
    }

    pub fn interval_ms(mut self, min_interval_ms: u64) -> Self {
        self.settings.min_interval_ms = min_interval_ms;
        self
    }

    /// Build the flow; the queue is labelled `queue`.
    pub fn build(self) -> (Flow, NodeId) {
        let mut flow = Flow::new("queue-test");
        let id = flow
            .add_node("queue", BuiltinNode::RateQueue(RateQueueNode::new(&self.settings)))
            .unwrap();
        (flow, id)
    }
}

/// The collector at `id`.
pub fn collector(flow: &Flow, id: NodeId) -> &OrderedCollectorNode {
    match flow.node(id) {
        Some(AnyNode::Builtin(BuiltinNode::OrderedCollector(node))) => node,
        _ => panic!("node {id} is not an ordered collector"),
    }
}

/// The queue at `id`.
pub fn queue(flow: &Flow, id: NodeId) -> &RateQueueNode {
    match flow.node(id) {
        Some(AnyNode::Builtin(BuiltinNode::RateQueue(node))) => node,
        _ => panic!("node {id} is not a rate queue"),
    }
}
