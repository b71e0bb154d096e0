//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Hardware testbed emulator writing read-channel frames on a period."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use r_cosim_common::config::ChannelConfig;
use r_cosim_common::shutdown::ShutdownFlag;
use tracing::{debug, info};

use crate::codec::ChannelCodec;
use crate::Result;

/// Stand-in for the hardware testbed on a developer bench.
///
/// Writes a fresh read-channel frame every period, cycling the counter from
/// the bootstrap value up to the wrap high and back around, with fixed raw
/// power tokens. All tokens honour the configured radix, so a bridge and an
/// emulator sharing one config always agree on the wire format. Frames are
/// replaced atomically; the bridge must still tolerate torn frames from
/// real hardware, but the bench stays deterministic.
pub struct HtbEmulator {
    path: PathBuf,
    tmp_path: PathBuf,
    period: Duration,
    codec: ChannelCodec,
    first_counter: i64,
    wrap_high: i64,
    wrap_base: i64,
    p_raw: i64,
    q_raw: i64,
    cycles: Option<u64>,
    shutdown: ShutdownFlag,
}

impl HtbEmulator {
    /// Default raw active-power token, 0.05 pu under the default transform.
    pub const DEFAULT_P_RAW: i64 = 20500;
    /// Default raw reactive-power token, 0.03 pu under the default transform.
    pub const DEFAULT_Q_RAW: i64 = 20300;

    /// Build an emulator writing into the configured read file.
    pub fn new(config: &ChannelConfig, period: Duration, shutdown: ShutdownFlag) -> Self {
        let path = config.read_path();
        let mut tmp_path = path.clone();
        tmp_path.set_extension("tmp");
        Self {
            path,
            tmp_path,
            period,
            codec: ChannelCodec::new(config),
            first_counter: config.bootstrap_counter,
            wrap_high: config.wrap_high,
            wrap_base: config.wrap_base,
            p_raw: Self::DEFAULT_P_RAW,
            q_raw: Self::DEFAULT_Q_RAW,
            cycles: None,
            shutdown,
        }
    }

    /// Override the raw power tokens carried by every frame.
    pub fn with_frame(mut self, p_raw: i64, q_raw: i64) -> Self {
        self.p_raw = p_raw;
        self.q_raw = q_raw;
        self
    }

    /// Stop after writing this many frames instead of running until shutdown.
    pub fn with_cycles(mut self, cycles: u64) -> Self {
        self.cycles = Some(cycles);
        self
    }

    /// Run the emulator on the current thread until shutdown or cycle limit.
    ///
    /// Returns the number of frames written.
    pub fn run(&self) -> Result<u64> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        info!(
            path = %self.path.display(),
            period_ms = self.period.as_millis() as u64,
            first_counter = self.first_counter,
            "htb emulator started"
        );

        let mut counter = self.first_counter;
        let mut written = 0u64;
        loop {
            if self.shutdown.is_requested() {
                break;
            }
            if let Some(limit) = self.cycles {
                if written >= limit {
                    break;
                }
            }

            let frame = format!(
                "{}\n{}\n{}\n",
                self.codec.format_token(counter),
                self.codec.format_token(self.p_raw),
                self.codec.format_token(self.q_raw)
            );
            fs::write(&self.tmp_path, frame)?;
            fs::rename(&self.tmp_path, &self.path)?;
            debug!(counter, written, "emulator frame");

            written += 1;
            counter = if counter == self.wrap_high {
                self.wrap_base + 1
            } else {
                counter + 1
            };

            if self.shutdown.is_requested() {
                break;
            }
            thread::sleep(self.period);
        }

        info!(frames = written, "htb emulator stopped");
        Ok(written)
    }

    /// Run the emulator on a background thread.
    pub fn spawn(self) -> JoinHandle<Result<u64>> {
        thread::spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_cosim_common::config::{ChannelConfig, CounterRadix};
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> ChannelConfig {
        ChannelConfig {
            data_dir: dir.to_path_buf(),
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn writes_requested_cycles_and_advances_counter() {
        let dir = tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let emulator = HtbEmulator::new(&config, Duration::from_millis(1), ShutdownFlag::new())
            .with_cycles(3);
        let written = emulator.run().expect("run");
        assert_eq!(written, 3);
        let content = fs::read_to_string(config.read_path()).expect("frame");
        let tokens: Vec<&str> = content.split_whitespace().collect();
        assert_eq!(tokens, vec!["13", "20500", "20300"]);
    }

    #[test]
    fn counter_wraps_past_the_high_value() {
        let dir = tempdir().expect("tempdir");
        let config = ChannelConfig {
            bootstrap_counter: 198,
            ..config_in(dir.path())
        };
        let emulator = HtbEmulator::new(&config, Duration::from_millis(1), ShutdownFlag::new())
            .with_cycles(3);
        emulator.run().expect("run");
        let content = fs::read_to_string(config.read_path()).expect("frame");
        let first = content.split_whitespace().next().expect("counter token");
        // 198, 199, then back to wrap_base + 1.
        assert_eq!(first, "11");
    }

    #[test]
    fn hex_frames_match_a_hex_channel() {
        let dir = tempdir().expect("tempdir");
        let config = ChannelConfig {
            counter_radix: CounterRadix::Hex,
            ..config_in(dir.path())
        };
        let emulator = HtbEmulator::new(&config, Duration::from_millis(1), ShutdownFlag::new())
            .with_cycles(1);
        emulator.run().expect("run");
        let content = fs::read_to_string(config.read_path()).expect("frame");
        assert!(content.starts_with('b'), "11 renders as 0xb, got {content}");

        let mut channel = crate::FileChannel::new(&config).expect("channel");
        let read = crate::Channel::read(&mut channel);
        assert!(read.ok);
        assert_eq!(read.reading.counter, 11);
    }

    #[test]
    fn requested_shutdown_stops_before_any_frame() {
        let dir = tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        let emulator = HtbEmulator::new(&config, Duration::from_millis(1), shutdown);
        assert_eq!(emulator.run().expect("run"), 0);
        assert!(!config.read_path().exists());
    }
}
