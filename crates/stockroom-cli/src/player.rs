//! External audio player launched per preview.

use std::env;
use std::io;

use stockroom_core::audio::{AudioError, AudioPlayer};
use tokio::process::Command;

pub const ENV_AUDIO_PLAYER: &str = "STOCKROOM_AUDIO_PLAYER";

/// Runs `{player} {url}` and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandAudioPlayer {
    command: String,
}

impl CommandAudioPlayer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(preferred_player())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

pub fn preferred_player() -> String {
    env::var(ENV_AUDIO_PLAYER)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default_player().to_string())
}

pub const fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "mpv --no-video --really-quiet"
    }
}

impl AudioPlayer for CommandAudioPlayer {
    async fn play(&self, url: &str) -> Result<(), AudioError> {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(AudioError::Playback("empty audio player command".to_string()));
        };

        tracing::debug!(player = program, "Starting audio player");
        let status = Command::new(program)
            .args(parts)
            .arg(url)
            .status()
            .await
            .map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => AudioError::Playback(format!(
                    "`{program}` not found; set {ENV_AUDIO_PLAYER} or use --print-url"
                )),
                _ => AudioError::Playback(error.to_string()),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AudioError::Playback(format!(
                "`{}` exited with status {status}",
                self.command
            )))
        }
    }
}
