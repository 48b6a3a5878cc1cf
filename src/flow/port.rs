//! Port descriptors for the node system.
//!
//! Each node declares its ports via a static `PortDescriptor` array. The flow
//! uses these to validate wiring: only output ports can be wired, and only by
//! their index among the node's outputs.

/// Output index of the success path.
pub const PRIMARY: u16 = 0;
/// Output index of the diagnostic / dropped path.
pub const SECONDARY: u16 = 1;

/// What travels through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Regular messages on the success path.
    Message,
    /// Diagnostic messages: timeouts, drops, failures.
    Diagnostic,
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a node's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
    pub kind: PortKind,
}

impl PortDescriptor {
    pub const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            kind: PortKind::Message,
        }
    }

    pub const fn output(name: &'static str, kind: PortKind) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            kind,
        }
    }
}

/// Number of output ports in a descriptor list.
pub fn output_count(ports: &[PortDescriptor]) -> usize {
    ports
        .iter()
        .filter(|p| p.direction == PortDirection::Output)
        .count()
}

/// The `index`-th output port, if any.
pub fn output_port(ports: &[PortDescriptor], index: u16) -> Option<&PortDescriptor> {
    ports
        .iter()
        .filter(|p| p.direction == PortDirection::Output)
        .nth(index as usize)
}
