//! Fire-and-forget progress and diagnostic messages from stage workers.
//!
//! Every message is mirrored to the `log` facade. When a monitor channel is
//! attached, messages are also queued for it without ever blocking a worker:
//! a full channel drops its oldest message to make room.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::fmt;

/// Severity of a stage message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_log(self) -> log::Level {
        match self {
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warning => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A structured message from one worker of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMessage {
    pub stage: &'static str,
    pub worker_id: usize,
    pub level: Level,
    pub text: String,
}

impl fmt::Display for StageMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}#{}] [{}] {}",
            self.stage, self.worker_id, self.level, self.text
        )
    }
}

/// Handle used by pools to publish [`StageMessage`]s.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    sender: Option<Sender<StageMessage>>,
    // Held so a full channel can evict its oldest message, and so sends never
    // fail for lack of a receiver.
    evict: Option<Receiver<StageMessage>>,
}

impl Telemetry {
    /// Telemetry that only logs.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Telemetry with a monitor channel holding at most `capacity` messages.
    ///
    /// Returns the handle and the receiver for the monitor.
    pub fn channel(capacity: usize) -> (Self, Receiver<StageMessage>) {
        let (tx, rx) = bounded(capacity.max(1));
        let telemetry = Self {
            sender: Some(tx),
            evict: Some(rx.clone()),
        };
        (telemetry, rx)
    }

    /// Publishes a message. Never blocks.
    pub fn emit(&self, stage: &'static str, worker_id: usize, level: Level, text: impl Into<String>) {
        let message = StageMessage {
            stage,
            worker_id,
            level,
            text: text.into(),
        };
        log::log!(
            target: "hardsub::telemetry",
            level.as_log(),
            "[{}#{}] {}",
            message.stage,
            message.worker_id,
            message.text
        );

        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(TrySendError::Full(message)) = sender.try_send(message) {
            if let Some(evict) = &self.evict {
                let _dropped = evict.try_recv();
            }
            // Another producer may have refilled the slot; losing this one
            // message is acceptable for a best-effort channel.
            let _ignored = sender.try_send(message);
        }
    }
}
