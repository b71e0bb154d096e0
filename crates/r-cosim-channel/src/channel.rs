//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Channel trait and frame types shared by all channel backends."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use crate::Result;

/// One decoded frame from the hardware side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    /// Handshake sequence counter.
    pub counter: i64,
    /// Active power at the coupling point, per-unit.
    pub p: f64,
    /// Reactive power at the coupling point, per-unit.
    pub q: f64,
}

/// Levels pushed to the hardware side each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteFrame {
    /// Coupling bus voltage magnitude, per-unit.
    pub voltage: f64,
    /// System frequency, per-unit.
    pub frequency: f64,
}

/// Outcome of one poll of the read channel.
///
/// `ok` is false when the reading was substituted from configured defaults
/// because the frame was missing, torn, or malformed. A defaulted reading
/// never carries a counter inside the handshake range, so it can never
/// satisfy a sequence expectation by accident.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRead {
    /// The decoded or substituted frame.
    pub reading: ChannelReading,
    /// Whether the frame decoded cleanly.
    pub ok: bool,
}

/// Byte-level medium the handshake runs over.
///
/// Implementations absorb read-side failures: `read` always produces a
/// reading, flagging substitution through [`ChannelRead::ok`]. Only the
/// write path surfaces errors, and the loop treats even those as
/// non-fatal. The bridge owns its channel exclusively, hence `&mut self`.
pub trait Channel: Send {
    /// Poll the read file once.
    fn read(&mut self) -> ChannelRead;
    /// Replace the write frame visible to the hardware.
    fn write(&mut self, frame: &WriteFrame) -> Result<()>;
    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}
