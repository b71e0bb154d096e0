//! ---
//! cosim_section: "02-channel-ipc"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Scriptable in-memory channel for handshake and loop tests."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{Channel, ChannelRead, ChannelReading, WriteFrame};
use crate::{ChannelError, Result};

const DEFAULTED: ChannelRead = ChannelRead {
    reading: ChannelReading {
        counter: -4,
        p: 0.0,
        q: 0.0,
    },
    ok: false,
};

#[derive(Debug)]
struct Inner {
    script: VecDeque<ChannelRead>,
    exhausted: ChannelRead,
    writes: Vec<WriteFrame>,
    fail_writes: bool,
}

/// In-memory channel backed by a scripted read queue and a captured write log.
///
/// Each `read` pops the next scripted poll outcome; once the script runs dry
/// every further poll yields the exhausted reading (a defaulted frame unless
/// overridden). Clones share state, so a test can keep a handle for
/// assertions while the loop owns another.
#[derive(Debug, Clone)]
pub struct InMemoryChannel {
    inner: Arc<Mutex<Inner>>,
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                script: VecDeque::new(),
                exhausted: DEFAULTED,
                writes: Vec::new(),
                fail_writes: false,
            })),
        }
    }
}

impl InMemoryChannel {
    /// Create an empty scripted channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a well-formed reading for the next poll.
    pub fn push_reading(&self, counter: i64, p: f64, q: f64) {
        self.inner.lock().script.push_back(ChannelRead {
            reading: ChannelReading { counter, p, q },
            ok: true,
        });
    }

    /// Queue a defaulted poll outcome, as a torn or missing frame produces.
    pub fn push_defaulted(&self) {
        self.inner.lock().script.push_back(DEFAULTED);
    }

    /// Replace the outcome served once the script is exhausted.
    pub fn set_exhausted(&self, read: ChannelRead) {
        self.inner.lock().exhausted = read;
    }

    /// Make every subsequent write fail, to exercise write-error tolerance.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Frames written so far, in order.
    pub fn writes(&self) -> Vec<WriteFrame> {
        self.inner.lock().writes.clone()
    }

    /// Scripted polls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.lock().script.len()
    }
}

impl Channel for InMemoryChannel {
    fn read(&mut self) -> ChannelRead {
        let mut inner = self.inner.lock();
        inner.script.pop_front().unwrap_or(inner.exhausted)
    }

    fn write(&mut self, frame: &WriteFrame) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(ChannelError::ScriptedWriteFailure);
        }
        inner.writes.push(*frame);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory channel".to_owned()
    }
}
