//! Crate-level error type and process exit codes.

use std::path::PathBuf;

use crate::container::ContainerError;
use crate::playback::PlaybackError;
use crate::schema::ConfigError;
use crate::subtitle::SubtitleError;
use crate::video::VideoError;

/// Exit code for a missing input resource.
pub const EXIT_MISSING: u8 = 2;
/// Exit code for an invalid or corrupt container.
pub const EXIT_INVALID: u8 = 6;
/// Exit code for any other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Any error surfaced to the command line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File \"{}\" does not exist", .0.display())]
    ResourceMissing(PathBuf),
    #[error("Refusing to overwrite {} (use --force)", .0.display())]
    OutputExists(PathBuf),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Subtitle(#[from] SubtitleError),
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ResourceMissing(_) => EXIT_MISSING,
            Error::Container(e) | Error::Playback(PlaybackError::Container(e)) => match e {
                ContainerError::InvalidFormat(_) | ContainerError::CorruptChunk { .. } => {
                    EXIT_INVALID
                }
                _ => EXIT_FAILURE,
            },
            _ => EXIT_FAILURE,
        }
    }
}

/// Fail with [`Error::ResourceMissing`] unless `path` exists.
pub fn require_exists(path: &std::path::Path) -> Result<(), Error> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::ResourceMissing(path.to_path_buf()))
    }
}
