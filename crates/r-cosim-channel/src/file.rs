//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "File-backed channel over the shared HTB/LTB directory."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use r_cosim_common::config::ChannelConfig;
use tracing::{error, trace};

use crate::channel::{Channel, ChannelRead, ChannelReading, WriteFrame};
use crate::codec::ChannelCodec;
use crate::{ChannelError, Result};

/// Channel backed by two plain files in a directory shared with the hardware.
///
/// The read file is rewritten by the hardware on its own cadence with no
/// coordination, so any single poll may observe a missing, torn, or stale
/// frame. Those all decode into the configured defaults. The write file is
/// replaced atomically (serialize to a sibling temp file, then rename) so
/// the hardware can never observe a half-written frame from this side.
pub struct FileChannel {
    read_path: PathBuf,
    write_path: PathBuf,
    write_tmp: PathBuf,
    codec: ChannelCodec,
    defaults: ChannelReading,
    counter_low: i64,
    counter_high: i64,
}

impl FileChannel {
    /// Open a channel over the configured directory, creating it if needed.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let write_path = config.write_path();
        let mut write_tmp = write_path.clone();
        write_tmp.set_extension("tmp");
        Ok(Self {
            read_path: config.read_path(),
            write_path,
            write_tmp,
            codec: ChannelCodec::new(config),
            defaults: ChannelReading {
                counter: config.counter_default,
                p: config.p_default,
                q: config.q_default,
            },
            counter_low: config.wrap_base,
            counter_high: config.wrap_high,
        })
    }

    fn decode_file(&self) -> Result<ChannelReading> {
        let content = fs::read_to_string(&self.read_path)?;
        let reading = self.codec.decode_reading(&content)?;
        if reading.counter <= self.counter_low || reading.counter > self.counter_high {
            return Err(ChannelError::CounterOutOfRange {
                counter: reading.counter,
                low: self.counter_low,
                high: self.counter_high,
            });
        }
        Ok(reading)
    }

    fn encode_frame(&self, frame: &WriteFrame) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record([
            self.codec.encode_level(frame.frequency).to_string(),
            self.codec.encode_level(frame.voltage).to_string(),
        ])?;
        writer
            .into_inner()
            .map_err(|err| ChannelError::Io(err.into_error()))
    }
}

impl Channel for FileChannel {
    fn read(&mut self) -> ChannelRead {
        match self.decode_file() {
            Ok(reading) => {
                trace!(counter = reading.counter, p = reading.p, q = reading.q, "read frame");
                ChannelRead { reading, ok: true }
            }
            Err(err) => {
                error!(
                    path = %self.read_path.display(),
                    error = %err,
                    "read channel defaulted"
                );
                ChannelRead {
                    reading: self.defaults,
                    ok: false,
                }
            }
        }
    }

    fn write(&mut self, frame: &WriteFrame) -> Result<()> {
        let bytes = self.encode_frame(frame)?;
        fs::write(&self.write_tmp, bytes)?;
        fs::rename(&self.write_tmp, &self.write_path)?;
        trace!(
            freq = frame.frequency,
            voltage = frame.voltage,
            path = %self.write_path.display(),
            "wrote frame"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "file channel [read {}, write {}]",
            self.read_path.display(),
            self.write_path.display()
        )
    }
}
