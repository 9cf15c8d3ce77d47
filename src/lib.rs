//! # textvox
//!
//! Document-to-audiobook conversion through a hosted text-to-speech model.
//!
//! ## Quick start
//!
//! ```no_run
//! use textvox::{CancellationToken, DirectoryExport, GeminiSpeechClient, QueueDriver, Session};
//! use textvox::{PlainTextExtractor, SegmenterConfig, SpeechConfig};
//!
//! let config = SpeechConfig::default();
//! // Reads API_KEY (or GEMINI_API_KEY) from the environment
//! let client = GeminiSpeechClient::from_env(&config).unwrap();
//!
//! let mut session = Session::from_document(
//!     &PlainTextExtractor,
//!     std::path::Path::new("book.txt"),
//!     &SegmenterConfig::default(),
//! ).unwrap();
//!
//! // One WAV per block: chapter_1_block_1.wav, chapter_1_block_2.wav, …
//! let mut export = DirectoryExport::new("out").unwrap();
//! let driver = QueueDriver::new(client, config).with_voice("Charon");
//! let report = driver.run(session.blocks_mut(), &CancellationToken::new(), &mut export);
//! println!("{} ok, {} failed", report.succeeded, report.failed);
//! ```
//!
//! A single piece of text can be synthesized without the queue:
//!
//! ```no_run
//! use textvox::{synthesize, wav, GeminiSpeechClient, SpeechConfig};
//!
//! let config = SpeechConfig::default();
//! let client = GeminiSpeechClient::from_env(&config).unwrap();
//! let audio = synthesize(&client, "Olá, mundo!", "Puck", &config).unwrap();
//! wav::write_file(&audio, std::path::Path::new("hello.wav")).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Extraction**: a [`DocumentExtractor`] turns the input file into plain text.
//! 2. **Segmentation**: chapter markers split the text into chapters; each
//!    chapter is cut into ≤ 1 550-char blocks at sentence boundaries.
//! 3. **Synthesis**: blocks go to the speech API one at a time, in order.
//! 4. **Decode**: base64 PCM16 → normalised `f32` samples, 24 kHz mono.
//! 5. **Export**: 16-bit PCM WAV per block.
//! 6. **Preview**: [`PlaybackController`] plays a block with pause/resume.
//!
//! ## Features
//! | Feature    | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `playback` | Enables `RodioOutput`, a speaker backend using rodio   |

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod queue;
pub mod segment;
pub mod session;
pub mod speech;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::{Waveform, CHANNELS, SAMPLE_RATE};
pub use config::{find_voice, Credentials, SpeechConfig, VoiceOption, VOICES};
pub use error::{Error, Result};
pub use playback::{ActiveSound, AudioOutput, LazyOutput, PlaybackController, PlaybackObserver, PlaybackState};
pub use queue::{BlockAudio, CancellationToken, DirectoryExport, QueueDriver, QueueObserver, QueueReport};
pub use segment::{segment, BlockStatus, Segmenter, SegmenterConfig, TextBlock, MAX_CHARS};
pub use session::{DocumentExtractor, PlainTextExtractor, Session, StatusSummary};
pub use speech::{synthesize, GeminiSpeechClient, SpeechClient};

#[cfg(feature = "playback")]
pub use playback::RodioOutput;
