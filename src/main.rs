//! quadsid - a four-voice chiptune tracker engine.
//!
//! Usage:
//!   quadsid play [song.qsd] [--block N] [--loop]
//!   quadsid export [song.qsd] -o out.wav
//!   quadsid info [song.qsd]
//!   quadsid new song.qsd --title "..."
//!
//! Without a song path the built-in demo song is used.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qs_master::{Controller, Song, DEFAULT_SAMPLE_RATE};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser)]
#[command(name = "quadsid", version, about = "Four-voice chiptune tracker engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a song on the default audio device
    Play {
        /// Song file (defaults to the demo song)
        song: Option<PathBuf>,
        /// Block to start from
        #[arg(long, default_value_t = 0)]
        block: usize,
        /// Repeat the starting block
        #[arg(long = "loop")]
        block_loop: bool,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// Mute a channel (0-3); may be repeated
        #[arg(long)]
        mute: Vec<usize>,
    },
    /// Render one pass of a song to a WAV file
    Export {
        song: Option<PathBuf>,
        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
        /// Upper bound on the rendered length
        #[arg(long, default_value_t = 600)]
        max_seconds: u32,
    },
    /// Print song metadata and usage statistics
    Info { song: Option<PathBuf> },
    /// Write the demo song to a new file
    New {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Play { song, block, block_loop, seconds, mute } => {
            let mut ctrl = open(song.as_deref())?;
            play(&mut ctrl, block, block_loop, seconds, &mute);
        }
        Command::Export { song, output, sample_rate, max_seconds } => {
            let ctrl = open(song.as_deref())?;
            println!("Rendering to {} at {} Hz...", output.display(), sample_rate);
            let samples = ctrl
                .export_wav(&output, sample_rate, max_seconds)
                .with_context(|| format!("failed to export {}", output.display()))?;
            println!(
                "Rendered {} samples ({:.1}s)",
                samples,
                samples as f64 / sample_rate as f64
            );
        }
        Command::Info { song } => {
            let ctrl = open(song.as_deref())?;
            ctrl.with_song(print_info);
        }
        Command::New { path, title, author } => {
            let mut song = Song::demo();
            if let Some(title) = title {
                song.set_title(&title);
            }
            if let Some(author) = author {
                song.set_author(&author);
            }
            let ctrl = Controller::new(song, DEFAULT_SAMPLE_RATE);
            ctrl.save_song_file(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn open(path: Option<&Path>) -> Result<Controller> {
    let ctrl = Controller::default();
    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "opening song");
        ctrl.load_song_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    Ok(ctrl)
}

fn print_info(song: &Song) {
    println!("Title:    {}", song.title);
    println!("Author:   {}", song.author);
    println!("Tempo:    {}, Swing: {}", song.tempo, song.swing);
    println!("Rows:     {}", song.track_length());
    println!();
    print!("{}", qs_master::analyze(song));
}

fn play(ctrl: &mut Controller, block: usize, block_loop: bool, seconds: Option<u64>, mute: &[usize]) {
    ctrl.reset();
    ctrl.set_block(block);
    ctrl.set_block_loop(block_loop);
    for &channel in mute {
        ctrl.set_channel_active(channel, false);
    }

    // One pass of the arrangement unless looping or told otherwise.
    let limit = seconds.map(Duration::from_secs).or_else(|| {
        let samples = ctrl.with_song(|song| qs_master::duration_samples(song, DEFAULT_SAMPLE_RATE));
        (!block_loop).then(|| Duration::from_secs_f64(samples as f64 / DEFAULT_SAMPLE_RATE as f64))
    });

    ctrl.play();
    println!("Playing...");
    println!();

    let start = Instant::now();
    while ctrl.is_audio_running() && limit.map_or(true, |limit| start.elapsed() < limit) {
        let pos = ctrl.position();
        print!("\rBlock: {:02X} | Row: {:02X}", pos.block, pos.row);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.close_audio();
    println!("\rDone.              ");
}
