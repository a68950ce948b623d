//! Fire-and-forget audio playback.
//!
//! Audio runs on its own detached thread with no shared state and no way to
//! report back; failures are only logged. There is no synchronization with
//! the video clock beyond starting both at the same time.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Audio playback errors. Never propagated past the audio thread.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio player `{0}` not found")]
    PlayerNotFound(String),
    #[error("Failed to start audio player: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Audio player exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Plays an audio file to completion.
pub trait AudioBackend: Send + 'static {
    fn play_once(&self, path: &Path) -> Result<(), AudioError>;
}

/// Plays audio through an external command-line player.
///
/// Defaults to `ffplay -nodisp -autoexit -loglevel error <path>`.
#[derive(Debug, Clone)]
pub struct CommandAudioBackend {
    program: String,
    args: Vec<String>,
}

impl Default for CommandAudioBackend {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: ["-nodisp", "-autoexit", "-loglevel", "error"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl CommandAudioBackend {
    /// Use `program` with `args`; the audio path is appended last.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl AudioBackend for CommandAudioBackend {
    fn play_once(&self, path: &Path) -> Result<(), AudioError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => AudioError::PlayerNotFound(self.program.clone()),
                _ => AudioError::Spawn(e),
            })?;

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        let status = child.wait().map_err(AudioError::Spawn)?;
        if !status.success() {
            return Err(AudioError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// One-shot trigger that plays an audio file on a background thread.
pub struct AudioTrigger {
    backend: Box<dyn AudioBackend>,
    path: PathBuf,
}

impl AudioTrigger {
    pub fn new<B: AudioBackend>(backend: B, path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Box::new(backend),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start playback and return immediately. The thread is never joined.
    pub fn fire(self) {
        let Self { backend, path } = self;
        let spawned = thread::Builder::new()
            .name("thba-audio".to_owned())
            .spawn(move || {
                log::debug!("audio: playing {}", path.display());
                match backend.play_once(&path) {
                    Ok(()) => log::debug!("audio: finished {}", path.display()),
                    Err(e) => log::warn!("audio: {} ({})", e, path.display()),
                }
            });

        if let Err(e) = spawned {
            log::warn!("audio: failed to spawn playback thread: {}", e);
        }
    }
}
