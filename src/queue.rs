//! Sequential block queue.
//!
//! Feeds blocks through a [`SpeechClient`] one at a time, in document order,
//! and hands each decoded result to a [`QueueObserver`].  At most one remote
//! request is outstanding.
//!
//! Per block: `pending → processing → success | error`.  A failed block never
//! stops the loop.  Cancellation is checked once before each block; the call
//! in flight is never interrupted and finished blocks keep their status.
//! Failed blocks can be re-attempted one at a time with
//! [`QueueDriver::retry`], outside the main loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::Waveform;
use crate::config::SpeechConfig;
use crate::error::{Error, Result};
use crate::segment::{BlockStatus, TextBlock};
use crate::speech::{synthesize, SpeechClient};
use crate::wav;

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Cooperative stop flag shared between the queue and whoever drives it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────────────────────────────────────

/// Decoded audio of one block, plus its WAV container.
#[derive(Debug, Clone)]
pub struct BlockAudio {
    pub waveform: Waveform,
    pub wav: Vec<u8>,
}

/// Receives queue events.  Every method defaults to a no-op.
pub trait QueueObserver {
    /// A block's status changed; `block.status` holds the new value.
    fn block_status_changed(&mut self, _block: &TextBlock) {}

    /// Emitted once per dequeued block, before the remote call.
    fn progress(&mut self, _current: usize, _total: usize) {}

    /// A block was synthesized; emitted just before it turns `success`.
    fn block_audio(&mut self, _block: &TextBlock, _audio: &BlockAudio) {}
}

impl QueueObserver for () {}

impl<A: QueueObserver, B: QueueObserver> QueueObserver for (A, B) {
    fn block_status_changed(&mut self, block: &TextBlock) {
        self.0.block_status_changed(block);
        self.1.block_status_changed(block);
    }

    fn progress(&mut self, current: usize, total: usize) {
        self.0.progress(current, total);
        self.1.progress(current, total);
    }

    fn block_audio(&mut self, block: &TextBlock, audio: &BlockAudio) {
        self.0.block_audio(block, audio);
        self.1.block_audio(block, audio);
    }
}

/// Writes every synthesized block to `<dir>/<block.file_name()>`.
///
/// A failed write is logged and counted; it does not change the block status.
#[derive(Debug)]
pub struct DirectoryExport {
    dir: PathBuf,
    written: Vec<PathBuf>,
    failures: usize,
}

impl DirectoryExport {
    /// Create `dir` (and parents) if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: Vec::new(), failures: 0 })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl QueueObserver for DirectoryExport {
    fn block_audio(&mut self, block: &TextBlock, audio: &BlockAudio) {
        let path = self.dir.join(block.file_name());
        match std::fs::write(&path, &audio.wav) {
            Ok(()) => {
                log::info!("Wrote block {} to {}", block.id, path.display());
                self.written.push(path);
            }
            Err(e) => {
                log::warn!("Cannot write {}: {}", path.display(), e);
                self.failures += 1;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome counts of one [`QueueDriver::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    /// Blocks sent to the client.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Blocks skipped because they had already succeeded.
    pub skipped: usize,
    /// The loop stopped early on cancellation.
    pub cancelled: bool,
}

/// Drives blocks through a speech client, one at a time.
pub struct QueueDriver<C> {
    client: C,
    config: SpeechConfig,
    voice: String,
}

impl<C: SpeechClient> QueueDriver<C> {
    /// Driver using `config.voice`.
    pub fn new(client: C, config: SpeechConfig) -> Self {
        let voice = config.voice.clone();
        Self { client, config, voice }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Process `blocks` in order until done or cancelled.
    ///
    /// Blocks that already succeeded are skipped, so a cancelled run can be
    /// resumed by calling `run` again with the same blocks.
    pub fn run(
        &self,
        blocks: &mut [TextBlock],
        cancel: &CancellationToken,
        observer: &mut dyn QueueObserver,
    ) -> QueueReport {
        let total = blocks.len();
        let mut report = QueueReport::default();
        log::info!("Queue: {} block(s), voice {}", total, self.voice);

        for (i, block) in blocks.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Queue cancelled before block {} of {}", i + 1, total);
                report.cancelled = true;
                break;
            }

            observer.progress(i + 1, total);

            if block.status == BlockStatus::Success {
                report.skipped += 1;
                continue;
            }

            report.processed += 1;
            if self.process(block, observer) {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        log::info!(
            "Queue finished: {} ok, {} failed, {} skipped{}",
            report.succeeded,
            report.failed,
            report.skipped,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Re-attempt a single block that is in `error`.
    ///
    /// Runs outside the main loop: no progress event, no cancellation check.
    /// Returns the block's new status.
    pub fn retry(
        &self,
        blocks: &mut [TextBlock],
        id: &str,
        observer: &mut dyn QueueObserver,
    ) -> Result<BlockStatus> {
        let block = blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::UnknownBlock(id.to_string()))?;

        if block.status != BlockStatus::Error {
            return Err(Error::NotRetryable { id: id.to_string(), status: block.status });
        }

        log::info!("Retrying block {}", id);
        self.process(block, observer);
        Ok(block.status)
    }

    /// Synthesize one block; returns `true` on success.
    fn process(&self, block: &mut TextBlock, observer: &mut dyn QueueObserver) -> bool {
        set_status(block, BlockStatus::Processing, observer);

        let outcome = synthesize(&self.client, &block.text, &self.voice, &self.config)
            .and_then(|waveform| {
                let wav = wav::encode(&waveform)?;
                Ok(BlockAudio { waveform, wav })
            });

        match outcome {
            Ok(audio) => {
                observer.block_audio(block, &audio);
                set_status(block, BlockStatus::Success, observer);
                true
            }
            Err(e) => {
                log::warn!("Block {} failed: {} (\"{}…\")", block.id, e, block.excerpt(150));
                set_status(block, BlockStatus::Error, observer);
                false
            }
        }
    }
}

fn set_status(block: &mut TextBlock, status: BlockStatus, observer: &mut dyn QueueObserver) {
    log::debug!("block {}: {} → {}", block.id, block.status, status);
    block.status = status;
    observer.block_status_changed(block);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segmenter, SegmenterConfig};
    use std::cell::RefCell;

    /// Returns one PCM sample per call; fails for texts containing "FAIL".
    #[derive(Default)]
    struct Scripted {
        calls: RefCell<Vec<String>>,
    }

    impl SpeechClient for Scripted {
        fn generate_speech(&self, text: &str, _voice: &str) -> Result<String> {
            self.calls.borrow_mut().push(text.to_string());
            if text.contains("FAIL") {
                Err(Error::Remote("quota exceeded".into()))
            } else {
                Ok("AAA=".into()) // one silent PCM16 sample
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(String, BlockStatus)>,
        progress: Vec<(usize, usize)>,
        audio: Vec<String>,
        cancel_after: Option<(String, CancellationToken)>,
    }

    impl QueueObserver for Recorder {
        fn block_status_changed(&mut self, block: &TextBlock) {
            self.events.push((block.id.clone(), block.status));
            if let Some((id, token)) = &self.cancel_after {
                if *id == block.id && block.status == BlockStatus::Success {
                    token.cancel();
                }
            }
        }

        fn progress(&mut self, current: usize, total: usize) {
            self.progress.push((current, total));
        }

        fn block_audio(&mut self, block: &TextBlock, _audio: &BlockAudio) {
            self.audio.push(block.id.clone());
        }
    }

    fn three_blocks(middle: &str) -> Vec<TextBlock> {
        let text = format!("First one. {} Third one.", middle);
        let config = SegmenterConfig { max_chars: 12, chapter_keywords: vec![] };
        let blocks = Segmenter::new(&config).segment(&text);
        assert_eq!(blocks.len(), 3, "got: {:?}", blocks);
        blocks
    }

    fn statuses(blocks: &[TextBlock]) -> Vec<BlockStatus> {
        blocks.iter().map(|b| b.status).collect()
    }

    #[test]
    fn test_failure_does_not_stop_loop() {
        let mut blocks = three_blocks("FAIL now.");
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());
        let mut rec = Recorder::default();

        let report = driver.run(&mut blocks, &CancellationToken::new(), &mut rec);

        use BlockStatus::*;
        assert_eq!(statuses(&blocks), vec![Success, Error, Success]);
        assert_eq!(driver.client().calls.borrow().len(), 3);
        assert_eq!(report, QueueReport { processed: 3, succeeded: 2, failed: 1, skipped: 0, cancelled: false });
        assert_eq!(rec.progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(rec.audio, vec!["1.1", "1.3"]);
        assert_eq!(
            rec.events[..2],
            [("1.1".to_string(), Processing), ("1.1".to_string(), Success)]
        );
    }

    #[test]
    fn test_cancel_after_first_block() {
        let mut blocks = three_blocks("Second one.");
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());
        let token = CancellationToken::new();
        let mut rec = Recorder { cancel_after: Some(("1.1".into(), token.clone())), ..Default::default() };

        let report = driver.run(&mut blocks, &token, &mut rec);

        use BlockStatus::*;
        assert_eq!(statuses(&blocks), vec![Success, Pending, Pending]);
        assert_eq!(driver.client().calls.borrow().len(), 1);
        assert!(report.cancelled);
        assert_eq!(rec.progress, vec![(1, 3)]);
    }

    #[test]
    fn test_rerun_skips_succeeded_blocks() {
        let mut blocks = three_blocks("Second one.");
        blocks[0].status = BlockStatus::Success;
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());

        let report = driver.run(&mut blocks, &CancellationToken::new(), &mut ());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 2);
        assert_eq!(*driver.client().calls.borrow(), vec!["Second one.", "Third one."]);
    }

    #[test]
    fn test_retry_single_block() {
        let mut blocks = three_blocks("FAIL now.");
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());
        driver.run(&mut blocks, &CancellationToken::new(), &mut ());
        assert_eq!(blocks[1].status, BlockStatus::Error);

        // Still failing: stays in error, other blocks untouched.
        let mut rec = Recorder::default();
        let status = driver.retry(&mut blocks, "1.2", &mut rec).unwrap();
        assert_eq!(status, BlockStatus::Error);
        assert!(rec.progress.is_empty());
        assert_eq!(rec.events.len(), 2);
        assert_eq!(blocks[0].status, BlockStatus::Success);

        blocks[1].text = "Fixed now.".into();
        let status = driver.retry(&mut blocks, "1.2", &mut ()).unwrap();
        assert_eq!(status, BlockStatus::Success);
        assert_eq!(driver.client().calls.borrow().len(), 5);
    }

    #[test]
    fn test_retry_rejects_other_states() {
        let mut blocks = three_blocks("Second one.");
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());

        let err = driver.retry(&mut blocks, "1.1", &mut ()).unwrap_err();
        assert!(matches!(err, Error::NotRetryable { status: BlockStatus::Pending, .. }));

        let err = driver.retry(&mut blocks, "9.9", &mut ()).unwrap_err();
        assert!(matches!(err, Error::UnknownBlock(_)));
        assert!(driver.client().calls.borrow().is_empty());
    }

    #[test]
    fn test_decode_failure_marks_error() {
        struct Garbage;
        impl SpeechClient for Garbage {
            fn generate_speech(&self, _: &str, _: &str) -> Result<String> {
                Ok("@@@@".into())
            }
        }
        let mut blocks = three_blocks("Second one.");
        let driver = QueueDriver::new(Garbage, SpeechConfig::default()).with_voice("Fenrir");
        assert_eq!(driver.voice(), "Fenrir");
        let report = driver.run(&mut blocks, &CancellationToken::new(), &mut ());
        assert_eq!(report.failed, 3);
        assert!(blocks.iter().all(|b| b.status == BlockStatus::Error));
    }

    #[test]
    fn test_directory_export() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("audio");
        let mut blocks = three_blocks("FAIL now.");
        let driver = QueueDriver::new(Scripted::default(), SpeechConfig::default());
        let mut observers = (DirectoryExport::new(&out).unwrap(), Recorder::default());

        driver.run(&mut blocks, &CancellationToken::new(), &mut observers);

        let (export, rec) = observers;
        assert_eq!(export.written().len(), 2);
        assert_eq!(export.failures(), 0);
        assert!(out.join("chapter_1_block_1.wav").exists());
        assert!(!out.join("chapter_1_block_2.wav").exists());
        assert_eq!(rec.audio.len(), 2);
        let bytes = std::fs::read(out.join("chapter_1_block_3.wav")).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
    }
}
