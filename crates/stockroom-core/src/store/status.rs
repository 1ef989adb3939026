//! Busy flag, persistent error, and the self-expiring transient message.

use std::time::Duration;

/// How long a transient message stays visible.
pub const TRANSIENT_MESSAGE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientMessage {
    pub text: String,
    pub kind: MessageKind,
}

/// Point-in-time copy of the status channel for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub busy: bool,
    pub error_message: Option<String>,
    pub transient: Option<TransientMessage>,
}

#[derive(Debug, Default)]
pub struct StatusChannel {
    outstanding: usize,
    error_message: Option<String>,
    transient: Option<TransientMessage>,
    generation: u64,
}

impl StatusChannel {
    pub fn begin_request(&mut self) {
        self.outstanding += 1;
    }

    pub fn end_request(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    pub const fn is_busy(&self) -> bool {
        self.outstanding > 0
    }

    /// A remote failure: persistent error plus a transient copy.
    pub fn fail(&mut self, text: impl Into<String>) -> u64 {
        let text = text.into();
        self.error_message = Some(text.clone());
        self.notify(text, MessageKind::Error)
    }

    /// A successful mutation clears the persistent error.
    pub fn succeed(&mut self, text: impl Into<String>) -> u64 {
        self.error_message = None;
        self.notify(text, MessageKind::Success)
    }

    /// A local or non-fatal problem: transient only.
    pub fn warn(&mut self, text: impl Into<String>) -> u64 {
        self.notify(text, MessageKind::Error)
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Show a message and return the generation its expiry timer must quote.
    pub fn notify(&mut self, text: impl Into<String>, kind: MessageKind) -> u64 {
        self.generation += 1;
        self.transient = Some(TransientMessage {
            text: text.into(),
            kind,
        });
        self.generation
    }

    /// Clear the transient message if it is still the one from `generation`.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.transient.is_none() {
            return false;
        }
        self.transient = None;
        true
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            busy: self.is_busy(),
            error_message: self.error_message.clone(),
            transient: self.transient.clone(),
        }
    }
}
