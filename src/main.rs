//! thba CLI - encode videos into frame containers and play them as text.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use thba::{
    audio::{AudioTrigger, CommandAudioBackend},
    container::{CompressionType, ContainerReader, ContainerWriter},
    error::{Error, require_exists},
    playback::{BoxBanner, EndReason, Session, SystemClock, format_clock},
    schema::{ConfigError, DEFAULT_FPS, EncodeConfig, PlaybackConfig, parse_size},
    subtitle::{SubtitleWindow, load_cues},
    terminal::{self, TerminalSurface},
    video::VideoTools,
};

#[derive(Debug, Parser)]
#[command(name = "thba", version)]
#[command(about = "Grayscale video container and terminal player")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encode a video file into a container (requires ffmpeg)
    Encode {
        input: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Container frame rate [default: 10]
        #[arg(long)]
        fps: Option<u8>,
        /// Frame size as WxH or W,H [default: source size]
        #[arg(long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
        /// Store raw frames without LZ4
        #[arg(long)]
        no_compression: bool,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
        /// Encoding settings as JSON; flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write every frame of a container as a PNG image
    Decode {
        input: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Print a container's header
    Info { input: PathBuf },
    /// Play a container in the terminal
    Play {
        input: PathBuf,
        /// Show frame counter, fps and frame timing
        #[arg(long)]
        debug: bool,
        /// Map bright pixels to dark glyphs
        #[arg(long)]
        invert: bool,
        /// Subtitle file (.srt or .sub)
        #[arg(long)]
        subs: Option<PathBuf>,
        /// Audio file played alongside (requires ffplay)
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Glyph ramp, darkest to lightest
        #[arg(long = "ascii")]
        ramp: Option<String>,
        /// Shading gamma
        #[arg(long)]
        gamma: Option<f32>,
        /// Show a title screen and wait for a key before playing
        #[arg(long)]
        title_screen: bool,
        /// Title text for the title screen [default: file name]
        #[arg(long)]
        title: Option<String>,
        /// Wait for a key before playing
        #[arg(long)]
        wait_for_input: bool,
        /// Step one frame per key press
        #[arg(long)]
        frame_advance: bool,
        /// Playback settings as JSON; flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration files
    PrintConfig,
}

/// Flags for `play`, applied on top of a loaded configuration.
struct PlayArgs {
    input: PathBuf,
    debug: bool,
    invert: bool,
    subs: Option<PathBuf>,
    audio: Option<PathBuf>,
    ramp: Option<String>,
    gamma: Option<f32>,
    title_screen: bool,
    title: Option<String>,
    wait_for_input: bool,
    frame_advance: bool,
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();
    terminal::install_panic_hook();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            fps,
            size,
            no_compression,
            force,
            config,
        } => load_config::<EncodeConfig>(config.as_deref()).and_then(|mut encode| {
            if let Some(fps) = fps {
                encode.fps = fps;
            }
            if size.is_some() {
                encode.size = size;
            }
            if no_compression {
                encode.compression = CompressionType::None;
            }
            run_encode(&input, &output, &encode, force)
        }),
        Commands::Decode { input, output } => run_decode(&input, &output),
        Commands::Info { input } => run_info(&input),
        Commands::Play {
            input,
            debug,
            invert,
            subs,
            audio,
            ramp,
            gamma,
            title_screen,
            title,
            wait_for_input,
            frame_advance,
            config,
        } => run_play(PlayArgs {
            input,
            debug,
            invert,
            subs,
            audio,
            ramp,
            gamma,
            title_screen,
            title,
            wait_for_input,
            frame_advance,
            config,
        }),
        Commands::PrintConfig => print_example_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn load_config<T>(path: Option<&Path>) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    require_exists(path)?;
    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&text).map_err(ConfigError::from)?;
    log::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

fn run_encode(input: &Path, output: &Path, config: &EncodeConfig, force: bool) -> Result<(), Error> {
    config.validate()?;
    require_exists(input)?;
    if output.exists() && !force {
        return Err(Error::OutputExists(output.to_path_buf()));
    }

    let tools = VideoTools::default();
    let info = tools.probe(input)?;
    let (width, height) = config.size.unwrap_or((info.width, info.height));
    let expected = info
        .duration_secs
        .map(|d| (d * config.fps as f64).round() as u64);

    println!("Encoding {}", input.display());
    println!(
        "Source: {}x{} at {:.2} fps",
        info.width, info.height, info.fps
    );
    println!(
        "Output: {}x{} at {} fps, {:?} compression",
        width, height, config.fps, config.compression
    );

    let mut video = tools.open(input, config.fps, (width, height))?;
    let mut writer = ContainerWriter::create(output, config.fps, width, height, config.compression)?;

    for frame in video.by_ref() {
        writer.write_frame(&frame)?;

        let written = writer.frames_written() as u64;
        if let Some(total) = expected.filter(|&t| t >= 10) {
            if written % (total / 10) == 0 {
                println!("  Frame {}/~{}", written, total);
            }
        }
    }

    video.finish()?;
    let stats = writer.finalize()?;
    println!("Wrote {}: {}", output.display(), stats);
    Ok(())
}

fn run_decode(input: &Path, output_dir: &Path) -> Result<(), Error> {
    require_exists(input)?;
    let mut reader = ContainerReader::open(input)?;
    fs::create_dir_all(output_dir)?;

    let mut written = 0;
    let mut skipped = 0;
    for (i, frame) in reader.frames().enumerate() {
        match frame {
            Ok(frame) => {
                frame.save_png(output_dir.join(format!("frame_{:04}.png", i)))?;
                written += 1;
            }
            Err(e) if e.is_recoverable() => {
                log::warn!("skipping frame {}: {}", i, e);
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("Wrote {} frames to {}", written, output_dir.display());
    if skipped > 0 {
        println!("Skipped {} corrupt frames", skipped);
    }
    Ok(())
}

fn run_info(input: &Path) -> Result<(), Error> {
    require_exists(input)?;
    let reader = ContainerReader::open(input)?;
    let header = reader.header();

    println!("{}", input.display());
    println!("  Frame rate: {} fps", header.fps);
    println!("  Compression: {:?}", header.compression);
    println!("  Frames: {}", header.frame_count);
    println!("  Size: {}x{}", header.width, header.height);
    println!("  Duration: {}", format_clock(header.duration_secs()));
    Ok(())
}

fn run_play(args: PlayArgs) -> Result<(), Error> {
    let mut config: PlaybackConfig = load_config(args.config.as_deref())?;
    config.debug |= args.debug;
    config.frame_advance |= args.frame_advance;
    config.wait_for_input |= args.wait_for_input || args.title_screen;
    config.raster.invert |= args.invert;
    if let Some(ramp) = args.ramp {
        config.raster.ramp = ramp;
    }
    if let Some(gamma) = args.gamma {
        config.raster.gamma = gamma;
    }
    if args.title.is_some() {
        config.title = args.title;
    }
    if args.title_screen && config.title.is_none() {
        config.title = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
    }
    config.validate()?;

    // Everything that can fail on bad input is checked before the terminal
    // switches modes.
    require_exists(&args.input)?;
    for path in args.subs.iter().chain(args.audio.iter()) {
        require_exists(path)?;
    }
    let reader = ContainerReader::open(&args.input)?;

    let subtitles = args
        .subs
        .as_deref()
        .and_then(|path| match load_cues(path, reader.fps() as f64) {
            Ok(track) => {
                log::info!("loaded {} subtitle cues", track.len());
                Some(SubtitleWindow::new(track))
            }
            Err(e) => {
                log::warn!("ignoring subtitles {}: {}", path.display(), e);
                None
            }
        });

    let mut terminal = TerminalSurface::enter()?;
    let result = {
        let mut session = Session::new(&mut terminal, reader, SystemClock::new(), &config)?;
        if let Some(window) = subtitles {
            session = session.with_subtitles(window);
        }
        if let Some(path) = &args.audio {
            session = session.with_audio(AudioTrigger::new(CommandAudioBackend::default(), path));
        }
        if args.title_screen {
            session = session.with_banner(Box::new(BoxBanner));
        }
        session.run()
    };
    terminal.restore()?;

    let summary = result?;
    if summary.reason == EndReason::UserAbort {
        log::info!("playback aborted by user");
    }
    Ok(())
}

fn print_example_config() -> Result<(), Error> {
    let playback = PlaybackConfig::default();
    let encode = EncodeConfig::default();

    println!("Example playback configuration (play --config):");
    println!(
        "{}",
        serde_json::to_string_pretty(&playback).map_err(ConfigError::from)?
    );
    println!();
    println!("Example encoding configuration (encode --config, default fps {}):", DEFAULT_FPS);
    println!(
        "{}",
        serde_json::to_string_pretty(&encode).map_err(ConfigError::from)?
    );
    Ok(())
}
