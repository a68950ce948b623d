//! Video decoding through `ffmpeg` / `ffprobe` subprocesses.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use serde::Deserialize;

use crate::raster::Frame;

/// Video decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("`{0}` not found; install ffmpeg to encode videos")]
    ToolNotFound(String),
    #[error("Failed to run `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ffprobe failed for {path} ({status})")]
    Probe { path: PathBuf, status: String },
    #[error("Unreadable ffprobe output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No video stream in {0}")]
    NoVideoStream(PathBuf),
    #[error("Video decoding failed: {0}")]
    Decode(String),
}

/// Source video metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Reported or estimated from the duration.
    pub frame_count: Option<u64>,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Locations of the ffmpeg tools.
#[derive(Debug, Clone)]
pub struct VideoTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for VideoTools {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl VideoTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Read stream metadata with `ffprobe`.
    pub fn probe(&self, path: &Path) -> Result<VideoInfo, VideoError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_streams", "-show_format"])
            .args(["-print_format", "json"])
            .arg(path)
            .output()
            .map_err(|e| spawn_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(VideoError::Probe {
                path: path.to_path_buf(),
                status: output.status.to_string(),
            });
        }

        parse_probe(&output.stdout, path)
    }

    /// Start decoding `path` to grayscale frames of `size`, resampled to
    /// `fps`.
    pub fn open(&self, path: &Path, fps: u8, size: (u32, u32)) -> Result<FfmpegVideo, VideoError> {
        FfmpegVideo::spawn(&self.ffmpeg, path, fps, size)
    }
}

fn spawn_error(tool: &Path, e: std::io::Error) -> VideoError {
    let name = tool.display().to_string();
    match e.kind() {
        ErrorKind::NotFound => VideoError::ToolNotFound(name),
        _ => VideoError::Spawn {
            tool: name,
            source: e,
        },
    }
}

fn parse_probe(json: &[u8], path: &Path) -> Result<VideoInfo, VideoError> {
    let parsed: ProbeOutput = serde_json::from_slice(json)?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VideoError::NoVideoStream(path.to_path_buf()))?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(VideoError::NoVideoStream(path.to_path_buf()));
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| VideoError::Decode(format!("no frame rate for {}", path.display())))?;

    let duration_secs = stream
        .duration
        .as_deref()
        .and_then(parse_positive)
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_positive)
        });

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| duration_secs.map(|d| (d * fps).round().max(1.0) as u64));

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
        duration_secs,
    })
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
fn parse_rate(raw: &str) -> Option<f64> {
    let value = raw.trim();
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den).filter(|r| r.is_finite() && *r > 0.0)
        }
        None => parse_positive(value),
    }
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Grayscale frames streamed from an ffmpeg child process.
///
/// A reader thread pulls fixed-size raw frames off ffmpeg's stdout into a
/// small bounded queue, so decoding runs ahead of the consumer by a few
/// frames at most.
pub struct FfmpegVideo {
    receiver: Option<mpsc::Receiver<Frame>>,
    worker: Option<JoinHandle<Result<(), VideoError>>>,
    child: Child,
    width: u32,
    height: u32,
}

impl FfmpegVideo {
    fn spawn(ffmpeg: &Path, path: &Path, fps: u8, size: (u32, u32)) -> Result<Self, VideoError> {
        let (width, height) = size;
        let filter = format!("fps={},scale={}:{}:flags=area", fps, width, height);

        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-vf", &filter])
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_error(ffmpeg, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::Decode("failed to capture ffmpeg stdout".to_string()))?;
        let frame_size = width as usize * height as usize;
        let (sender, receiver) = mpsc::sync_channel::<Frame>(4);

        let worker = thread::Builder::new()
            .name("thba-ffmpeg-decoder".to_owned())
            .spawn(move || {
                loop {
                    let mut buffer = vec![0u8; frame_size];
                    match stdout.read_exact(&mut buffer) {
                        Ok(()) => {
                            let Some(frame) = Frame::from_raw(width, height, buffer) else {
                                break;
                            };
                            if sender.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                        Err(e) => {
                            return Err(VideoError::Decode(format!(
                                "failed to read from ffmpeg: {}",
                                e
                            )));
                        }
                    }
                }
                Ok(())
            })
            .map_err(|e| VideoError::Spawn {
                tool: "decoder thread".to_string(),
                source: e,
            })?;

        log::debug!("ffmpeg: decoding {} at {} fps, {}x{}", path.display(), fps, width, height);
        Ok(Self {
            receiver: Some(receiver),
            worker: Some(worker),
            child,
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Wait for ffmpeg to exit and surface any decoding failure.
    pub fn finish(mut self) -> Result<(), VideoError> {
        drop(self.receiver.take());

        let worker_result = match self.worker.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(VideoError::Decode("decoder thread panicked".to_string()))),
            None => Ok(()),
        };
        let status = self
            .child
            .wait()
            .map_err(|e| VideoError::Decode(format!("failed waiting for ffmpeg: {}", e)))?;
        worker_result?;

        if !status.success() {
            return Err(VideoError::Decode(format!("ffmpeg exited with {}", status)));
        }
        Ok(())
    }
}

impl Iterator for FfmpegVideo {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "duration": "12.0"},
            {
                "codec_type": "video",
                "width": 480,
                "height": 360,
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "duration": "219.619000"
            }
        ],
        "format": {"duration": "219.700000"}
    }"#;

    #[test]
    fn test_parse_probe() {
        let info = parse_probe(PROBE.as_bytes(), Path::new("clip.mp4")).unwrap();
        assert_eq!((info.width, info.height), (480, 360));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!((info.duration_secs.unwrap() - 219.619).abs() < 1e-6);
        assert_eq!(info.frame_count, Some(6582));
    }

    #[test]
    fn test_parse_probe_prefers_frame_count() {
        let json = r#"{"streams":[{"codec_type":"video","width":4,"height":2,
            "r_frame_rate":"0/0","avg_frame_rate":"25/1","nb_frames":"100"}]}"#;
        let info = parse_probe(json.as_bytes(), Path::new("a")).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, Some(100));
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn test_parse_probe_without_video() {
        let json = r#"{"streams":[{"codec_type":"audio"}]}"#;
        let err = parse_probe(json.as_bytes(), Path::new("a.wav")).unwrap_err();
        assert!(matches!(err, VideoError::NoVideoStream(_)));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate(" 10/2 "), Some(5.0));
        assert_eq!(parse_rate("1/0"), None);
        assert_eq!(parse_rate("0/1"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_missing_tools() {
        let tools = VideoTools::new("thba-no-such-ffmpeg", "thba-no-such-ffprobe");
        let err = tools.probe(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, VideoError::ToolNotFound(_)));

        let err = tools.open(Path::new("clip.mp4"), 10, (4, 4)).err().unwrap();
        assert!(matches!(err, VideoError::ToolNotFound(_)));
    }
}
