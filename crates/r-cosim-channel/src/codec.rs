//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Affine wire transform between raw integer tokens and per-unit values."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use r_cosim_common::config::{ChannelConfig, CounterRadix};

use crate::channel::ChannelReading;
use crate::{ChannelError, Result};

/// Tokens a well-formed read frame carries: counter, p, q.
pub const READ_FRAME_TOKENS: usize = 3;

/// Affine transform between raw wire integers and per-unit quantities.
///
/// The hardware transmits integers. Decoding a power token applies
/// `raw / scale + bias`; encoding a level for the write channel applies
/// `value * scale` and rounds to the nearest integer. The bias is a
/// read-side offset only, mirroring the hardware's transmit convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCodec {
    scale: f64,
    bias: f64,
    radix: CounterRadix,
}

impl ChannelCodec {
    /// Build a codec from the channel configuration.
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            scale: config.scale,
            bias: config.bias,
            radix: config.counter_radix,
        }
    }

    /// Decode a raw integer power token into per-unit power.
    pub fn decode_power(&self, raw: i64) -> f64 {
        raw as f64 / self.scale + self.bias
    }

    /// Encode a per-unit level into the raw integer the hardware expects.
    pub fn encode_level(&self, value: f64) -> i64 {
        (value * self.scale).round() as i64
    }

    /// Parse one integer token under the configured radix.
    pub fn parse_token(&self, token: &str) -> Result<i64> {
        i64::from_str_radix(token, self.radix.base()).map_err(|_| ChannelError::BadToken {
            token: token.to_owned(),
            base: self.radix.base(),
        })
    }

    /// Decode a whole read frame: `counter p_raw q_raw`, whitespace separated.
    ///
    /// Token count and per-token parses are checked here; the handshake
    /// range of the counter is the caller's concern.
    pub fn decode_reading(&self, content: &str) -> Result<ChannelReading> {
        let tokens: Vec<&str> = content.split_whitespace().collect();
        if tokens.len() != READ_FRAME_TOKENS {
            return Err(ChannelError::TokenCount {
                expected: READ_FRAME_TOKENS,
                found: tokens.len(),
            });
        }
        let counter = self.parse_token(tokens[0])?;
        let p_raw = self.parse_token(tokens[1])?;
        let q_raw = self.parse_token(tokens[2])?;
        Ok(ChannelReading {
            counter,
            p: self.decode_power(p_raw),
            q: self.decode_power(q_raw),
        })
    }

    /// Render a raw token in the configured radix, as the emulator writes it.
    pub fn format_token(&self, raw: i64) -> String {
        match self.radix {
            CounterRadix::Dec => format!("{}", raw),
            CounterRadix::Hex => format!("{:x}", raw),
        }
    }
}
