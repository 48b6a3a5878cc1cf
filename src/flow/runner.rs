//! Real-time driver for a `Flow` on a dedicated thread.
//!
//! The runner sleeps on the command channel until either a command arrives
//! or the next timer is due, then brings flow time up to the wall clock and
//! forwards everything the flow produced to the host.

use crate::error::Result;
use crate::flow::bridge::{FlowBridge, FlowCommand, FlowEvent};
use crate::flow::executor::Flow;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Longest sleep when no timer is pending.
const IDLE_POLL: Duration = Duration::from_millis(100);

pub struct FlowRunner {
    flow: Flow,
    cmd_rx: Receiver<FlowCommand>,
    event_tx: Sender<FlowEvent>,
    started: Instant,
    running: bool,
}

impl FlowRunner {
    pub fn new(flow: Flow, cmd_rx: Receiver<FlowCommand>, event_tx: Sender<FlowEvent>) -> Self {
        Self {
            flow,
            cmd_rx,
            event_tx,
            started: Instant::now(),
            running: true,
        }
    }

    /// Start `flow` on its own thread and return the host-side bridge.
    pub fn spawn(flow: Flow) -> Result<(FlowBridge, JoinHandle<()>)> {
        let (bridge, cmd_rx, event_tx) = FlowBridge::new();
        let name = format!("flow-{}", flow.name());
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || FlowRunner::new(flow, cmd_rx, event_tx).run())?;
        Ok((bridge, handle))
    }

    /// Run until Shutdown is received or the host drops its bridge.
    pub fn run(&mut self) {
        tracing::info!(flow = %self.flow.name(), "flow thread started");

        while self.running {
            let wait = self.time_until_next_timer();
            match self.cmd_rx.recv_timeout(wait) {
                Ok(cmd) => self.handle_command(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!(flow = %self.flow.name(), "host disconnected");
                    self.running = false;
                }
            }
            self.catch_up();
        }

        self.flow.close();
        self.forward_events();
        let _ = self.event_tx.send(FlowEvent::Shutdown);
        tracing::info!(flow = %self.flow.name(), "flow thread exiting");
    }

    fn handle_command(&mut self, cmd: FlowCommand) {
        match cmd {
            FlowCommand::Inject { node, msg } => {
                self.catch_up();
                if let Err(e) = self.flow.inject_to(&node, msg) {
                    tracing::warn!(flow = %self.flow.name(), "inject failed: {}", e);
                }
            }
            FlowCommand::Shutdown => {
                self.running = false;
            }
        }
    }

    fn time_until_next_timer(&mut self) -> Duration {
        match self.flow.next_deadline() {
            Some(deadline) => deadline.saturating_sub(self.started.elapsed()).min(IDLE_POLL),
            None => IDLE_POLL,
        }
    }

    /// Bring flow time up to the wall clock and publish the results.
    fn catch_up(&mut self) {
        self.flow.advance_to(self.started.elapsed());
        self.forward_events();
    }

    fn forward_events(&mut self) {
        for event in self.flow.take_events() {
            if self.event_tx.send(event).is_err() {
                break;
            }
        }
    }
}
