//! Convert a text file into one WAV file per block.
//!
//! Usage:
//!   API_KEY=... cargo run --example audiobook -- --input book.txt
//!   cargo run --example audiobook -- --input book.txt --voice Charon --out audio/
//!   cargo run --example audiobook --features playback -- --input book.txt --preview
//!
//! Failed blocks are listed at the end and never retried on their own.  Pass
//! `--retry ID` (repeatable) to give a named block one more attempt after the
//! main pass.
//!
//! Set RUST_LOG=info (or debug) to follow the queue.

use std::path::PathBuf;

use anyhow::Context;
use textvox::{
    find_voice, BlockStatus, CancellationToken, DirectoryExport, GeminiSpeechClient, PlainTextExtractor,
    QueueDriver, QueueObserver, SegmenterConfig, Session, SpeechConfig, TextBlock, VOICES,
};

/// Prints one line per block as the queue advances.
struct Progress;

impl QueueObserver for Progress {
    fn progress(&mut self, current: usize, total: usize) {
        println!("[{}/{}]", current, total);
    }

    fn block_status_changed(&mut self, block: &TextBlock) {
        if block.status != BlockStatus::Processing {
            println!("  {:>6}  {:<7}  {}…", block.id, block.status, block.excerpt(60).replace('\n', " "));
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut input: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("audiobook");
    let mut voice: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut preview = false;
    let mut retry: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input"   => { input       = args.next().map(PathBuf::from); }
            "--out"     => { if let Some(v) = args.next() { out_dir = PathBuf::from(v); } }
            "--voice"   => { voice       = args.next(); }
            "--config"  => { config_path = args.next().map(PathBuf::from); }
            "--preview" => { preview     = true; }
            "--retry"   => { if let Some(v) = args.next() { retry.push(v); } }
            "--help"    => {
                println!(
                    "Usage: audiobook --input FILE [--out DIR] [--voice NAME] \
                     [--config config.json] [--retry ID]... [--preview]"
                );
                println!("Voices:");
                for v in VOICES {
                    println!("  {:<8} {}", v.id, v.name);
                }
                return Ok(());
            }
            other => anyhow::bail!("unknown argument {:?} (try --help)", other),
        }
    }
    let input = input.context("--input is required")?;

    // ── Configuration ────────────────────────────────────────────────────────
    let config = match &config_path {
        Some(path) => SpeechConfig::from_file(path)?,
        None => SpeechConfig::default(),
    };
    let voice = voice.unwrap_or_else(|| config.voice.clone());
    if find_voice(&voice).is_none() {
        log::warn!("{} is not one of the listed voices; sending it as-is", voice);
    }

    println!("Input  : {}", input.display());
    println!("Voice  : {}", voice);
    println!("Model  : {}", config.model);
    println!("Output : {}", out_dir.display());
    println!();

    // ── Segment ──────────────────────────────────────────────────────────────
    let client = GeminiSpeechClient::from_env(&config)?;
    let mut session = Session::from_document(&PlainTextExtractor, &input, &SegmenterConfig::default())?;
    if session.is_empty() {
        println!("Nothing to read.");
        return Ok(());
    }
    println!("{} block(s)\n", session.blocks().len());

    // ── Synthesize ───────────────────────────────────────────────────────────
    let driver = QueueDriver::new(client, config).with_voice(voice);
    let cancel = CancellationToken::new();
    let mut observer = (Progress, DirectoryExport::new(&out_dir)?);
    let report = driver.run(session.blocks_mut(), &cancel, &mut observer);

    // ── Retry only the blocks named with --retry ─────────────────────────────
    for id in retry_targets(&retry, session.blocks()) {
        driver.retry(session.blocks_mut(), &id, &mut observer)?;
    }
    let export = observer.1;

    let summary = session.summary();
    println!(
        "\nDone: {} ok, {} failed ({} written to {})",
        summary.success,
        summary.error,
        export.written().len(),
        out_dir.display()
    );
    log::debug!("first pass: {:?}", report);

    let failed = session.failed_ids();
    if !failed.is_empty() {
        println!("Failed blocks: {}", failed.join(", "));
        println!("Pass --retry ID to give a block one more attempt after the main pass.");
    }

    if preview {
        play_first(&export)?;
    }
    Ok(())
}

/// The requested ids that name a block in `error`; anything else is skipped
/// with a warning.  Nothing is retried unless it was asked for.
fn retry_targets(requested: &[String], blocks: &[TextBlock]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for id in requested {
        match blocks.iter().find(|b| b.id == *id) {
            Some(block) if block.status == BlockStatus::Error => {
                if !targets.contains(id) {
                    targets.push(id.clone());
                }
            }
            Some(block) => log::warn!("--retry {}: block is {}, not error", id, block.status),
            None => log::warn!("--retry {}: no such block", id),
        }
    }
    targets
}

#[cfg(feature = "playback")]
fn play_first(export: &DirectoryExport) -> anyhow::Result<()> {
    use textvox::{PlaybackController, PlaybackState, RodioOutput};

    let Some(path) = export.written().first() else {
        return Ok(());
    };
    let wave = textvox::wav::decode(&std::fs::read(path)?)?;
    println!("Playing {} ({:.1} s)…", path.display(), wave.duration().as_secs_f32());

    let mut player = PlaybackController::new(RodioOutput::open_default()?, wave);
    player.play()?;
    while player.state() == PlaybackState::Playing {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    Ok(())
}

#[cfg(not(feature = "playback"))]
fn play_first(_export: &DirectoryExport) -> anyhow::Result<()> {
    println!("Rebuild with --features playback to preview audio.");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
