//! Text → blocks → speech → WAV files, with a scripted speech client.

use std::cell::RefCell;

use textvox::{
    wav, BlockStatus, CancellationToken, DirectoryExport, Error, QueueDriver, Result, SegmenterConfig,
    Session, SpeechClient, SpeechConfig,
};

/// Answers every block with two PCM16 samples; fails blocks containing "FAIL".
struct Scripted {
    voices: RefCell<Vec<String>>,
}

impl SpeechClient for Scripted {
    fn generate_speech(&self, text: &str, voice: &str) -> Result<String> {
        self.voices.borrow_mut().push(voice.to_string());
        if text.contains("FAIL") {
            return Err(Error::Remote("503 Service Unavailable".into()));
        }
        // [1000, -1000]
        Ok("6AMY/A==".into())
    }
}

const BOOK: &str = "\
Title page.

Chapter 1
It was a dark night. The wind howled.

Chapter 2
FAIL here. Then it was morning.
";

#[test]
fn test_book_to_wav_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::from_text(BOOK, &SegmenterConfig::default());
    let ids: Vec<_> = session.blocks().iter().map(|b| b.id.clone()).collect();
    assert_eq!(ids, vec!["1.1", "2.1"]);
    assert!(session.blocks()[0].text.starts_with("Title page."));

    let driver = QueueDriver::new(Scripted { voices: RefCell::new(Vec::new()) }, SpeechConfig::default())
        .with_voice("Fenrir");
    let mut export = DirectoryExport::new(dir.path().join("out")).unwrap();
    let report = driver.run(session.blocks_mut(), &CancellationToken::new(), &mut export);

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(session.summary().error, 1);
    assert_eq!(session.blocks()[1].status, BlockStatus::Error);
    assert!(driver.client().voices.borrow().iter().all(|v| v == "Fenrir"));

    assert_eq!(export.written().len(), 1);
    let path = dir.path().join("out").join("chapter_1_block_1.wav");
    assert_eq!(export.written()[0], path);
    assert!(!dir.path().join("out").join("chapter_2_block_1.wav").exists());

    let wave = wav::decode(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(wave.sample_rate(), 24_000);
    assert_eq!(wave.channel(0).unwrap(), &[1000.0f32 / 32768.0, -1000.0 / 32768.0]);
}

#[test]
fn test_retry_after_fix() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::from_text(BOOK, &SegmenterConfig::default());
    let driver = QueueDriver::new(Scripted { voices: RefCell::new(Vec::new()) }, SpeechConfig::default());
    let mut export = DirectoryExport::new(dir.path()).unwrap();

    driver.run(session.blocks_mut(), &CancellationToken::new(), &mut export);
    session.blocks_mut()[1].text = "Then it was morning.".into();
    let status = driver.retry(session.blocks_mut(), "2.1", &mut export).unwrap();

    assert_eq!(status, BlockStatus::Success);
    assert_eq!(session.summary().success, 2);
    assert!(dir.path().join("chapter_2_block_1.wav").exists());
}

#[test]
fn test_long_chapter_is_split_within_limit() {
    let sentence = "This sentence is exactly forty-two chars. ";
    let text = format!("Capítulo 3\n{}", sentence.repeat(100));
    let session = Session::from_text(&text, &SegmenterConfig::default());

    assert!(session.blocks().len() > 1);
    for (i, block) in session.blocks().iter().enumerate() {
        assert_eq!(block.chapter, 3);
        assert_eq!(block.block_in_chapter as usize, i + 1);
        assert!(block.text.chars().count() <= textvox::MAX_CHARS);
        assert!(block.text.ends_with('.'), "block {} cut mid-sentence", block.id);
    }
}
