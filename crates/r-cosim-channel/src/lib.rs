//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Wire codec and channel abstractions for the HTB/LTB link."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Channel layer of the co-simulation bridge.
//!
//! The hardware side exchanges data with the bridge through two plain files
//! in a shared directory: the hardware appends a three-token frame
//! (`counter p_raw q_raw`) on its own cadence, and the bridge replaces a
//! one-row CSV frame with scaled frequency and voltage levels. This crate
//! owns the affine wire transform, the [`Channel`] trait the rest of the
//! bridge talks to, the file-backed implementation, a scriptable in-memory
//! implementation for tests, and the emulator that stands in for the
//! hardware on a developer bench.

pub mod channel;
pub mod codec;
pub mod emulator;
pub mod file;
pub mod memory;

/// Shared result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Error type for the channel subsystem.
///
/// Read-side decode failures never escape [`Channel::read`]; they are
/// absorbed into a defaulted reading there. The variants below surface in
/// logs and from the write path.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Wrapper for IO errors on either channel file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The read file did not contain exactly the expected token count.
    #[error("expected {expected} tokens on the read channel, found {found}")]
    TokenCount {
        /// Tokens a well-formed frame carries.
        expected: usize,
        /// Tokens actually present.
        found: usize,
    },
    /// A token failed integer parsing under the configured radix.
    #[error("token '{token}' is not a base-{base} integer")]
    BadToken {
        /// Offending token text.
        token: String,
        /// Radix the parse ran under.
        base: u32,
    },
    /// A decoded counter fell outside the handshake range.
    #[error("counter {counter} outside handshake range ({low}, {high}]")]
    CounterOutOfRange {
        /// Decoded counter value.
        counter: i64,
        /// Exclusive lower bound (the wrap base).
        low: i64,
        /// Inclusive upper bound (the wrap high).
        high: i64,
    },
    /// Wrapper for CSV serialization failures on the write path.
    #[error("csv encode error: {0}")]
    Csv(#[from] csv::Error),
    /// A scripted channel was told to fail writes.
    #[error("write rejected by scripted channel")]
    ScriptedWriteFailure,
}

pub use channel::{Channel, ChannelRead, ChannelReading, WriteFrame};
pub use codec::ChannelCodec;
pub use emulator::HtbEmulator;
pub use file::FileChannel;
pub use memory::InMemoryChannel;
