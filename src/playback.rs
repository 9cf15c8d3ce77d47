//! Play/stop controller for one decoded waveform.
//!
//! States: `Idle → Playing → Idle`.  Playing ends either naturally (the
//! device drains the buffer; `on_ended` fires, position resets to 0) or by
//! [`PlaybackController::stop`] (position is remembered, `on_ended` does not
//! fire).  The next [`play`](PlaybackController::play) resumes from the
//! remembered position, wrapped modulo the buffer duration.
//!
//! While playing, a sampler thread reports `elapsed / duration` every
//! `tick`.  Both stop paths end the sampler; the controller joins it before
//! returning from `stop`, starting again or being dropped.
//!
//! The audio device is injected through [`AudioOutput`].  With the
//! `playback` feature, [`RodioOutput`] drives the default output device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::audio::Waveform;
use crate::error::Result;

/// Default progress sampling interval (about one display frame).
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

// ─────────────────────────────────────────────────────────────────────────────
// Device seams
// ─────────────────────────────────────────────────────────────────────────────

/// An audio output device.
pub trait AudioOutput {
    /// Start playing `waveform` from `offset`.
    fn start(&mut self, waveform: &Arc<Waveform>, offset: Duration) -> Result<Box<dyn ActiveSound>>;
}

/// A sound currently owned by the device.
pub trait ActiveSound: Send + Sync {
    /// Time played since this sound started (excluding the start offset).
    fn elapsed(&self) -> Duration;
    /// The device drained the buffer.
    fn is_finished(&self) -> bool;
    /// Silence the sound immediately.
    fn stop(&self);
}

/// Builds the real device on first use.
pub struct LazyOutput<O, F> {
    inner: Option<O>,
    make: F,
}

impl<O, F> LazyOutput<O, F>
where
    O: AudioOutput,
    F: FnMut() -> Result<O>,
{
    pub fn new(make: F) -> Self {
        Self { inner: None, make }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}

impl<O, F> AudioOutput for LazyOutput<O, F>
where
    O: AudioOutput,
    F: FnMut() -> Result<O>,
{
    fn start(&mut self, waveform: &Arc<Waveform>, offset: Duration) -> Result<Box<dyn ActiveSound>> {
        let output = match &mut self.inner {
            Some(output) => output,
            slot => slot.insert((self.make)()?),
        };
        output.start(waveform, offset)
    }
}

/// Receives playback events, called from the sampler thread.
pub trait PlaybackObserver: Send + Sync {
    /// Fraction of the buffer played, in `[0, 1]`.
    fn on_progress(&self, _fraction: f64) {}
    /// Playback reached the end of the buffer (never fired by `stop`).
    fn on_ended(&self) {}
}

impl PlaybackObserver for () {}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

struct Shared {
    state: PlaybackState,
    /// Position remembered by the last manual stop.
    paused_at: Duration,
    /// Offset the current sound started from.
    started_at: Duration,
    progress: f64,
    sound: Option<Arc<dyn ActiveSound>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Sampler {
    halt: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Sampler {
    fn finish(self) {
        self.halt.store(true, Ordering::SeqCst);
        if self.handle.join().is_err() {
            log::warn!("playback sampler panicked");
        }
    }
}

/// Drives playback of one waveform through an [`AudioOutput`].
pub struct PlaybackController<O: AudioOutput> {
    output: O,
    waveform: Arc<Waveform>,
    observer: Arc<dyn PlaybackObserver>,
    tick: Duration,
    shared: Arc<Mutex<Shared>>,
    sampler: Option<Sampler>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O, waveform: Waveform) -> Self {
        Self {
            output,
            waveform: Arc::new(waveform),
            observer: Arc::new(()),
            tick: DEFAULT_TICK,
            shared: Arc::new(Mutex::new(Shared {
                state: PlaybackState::Idle,
                paused_at: Duration::ZERO,
                started_at: Duration::ZERO,
                progress: 0.0,
                sound: None,
            })),
            sampler: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PlaybackObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Progress sampling interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.shared).state
    }

    pub fn duration(&self) -> Duration {
        self.waveform.duration()
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Current position: live while playing, the resume point while idle.
    pub fn position(&self) -> Duration {
        let shared = lock(&self.shared);
        match &shared.sound {
            Some(sound) if shared.state == PlaybackState::Playing => {
                shared.started_at + sound.elapsed()
            }
            _ => shared.paused_at,
        }
    }

    /// Last sampled progress fraction.
    pub fn progress(&self) -> f64 {
        lock(&self.shared).progress
    }

    /// Start playing from the remembered position.  No-op while playing.
    pub fn play(&mut self) -> Result<()> {
        if self.state() == PlaybackState::Playing {
            return Ok(());
        }
        // A sampler that saw the natural end has already exited.
        if let Some(sampler) = self.sampler.take() {
            sampler.finish();
        }

        let offset = {
            let shared = lock(&self.shared);
            wrap(shared.paused_at, self.duration())
        };
        let sound: Arc<dyn ActiveSound> = Arc::from(self.output.start(&self.waveform, offset)?);
        log::debug!("playback: idle → playing at {:.3} s", offset.as_secs_f64());

        {
            let mut shared = lock(&self.shared);
            shared.state = PlaybackState::Playing;
            shared.started_at = offset;
            shared.sound = Some(sound);
        }
        self.sampler = Some(self.spawn_sampler());
        Ok(())
    }

    /// Stop playing and remember the position.  No-op while idle.
    pub fn stop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.finish();
        }

        let mut shared = lock(&self.shared);
        if shared.state != PlaybackState::Playing {
            return;
        }
        if let Some(sound) = shared.sound.take() {
            shared.paused_at = shared.started_at + sound.elapsed();
            sound.stop();
        }
        shared.state = PlaybackState::Idle;
        log::debug!("playback: playing → idle at {:.3} s", shared.paused_at.as_secs_f64());
    }

    /// Play when idle, stop when playing.
    pub fn toggle(&mut self) -> Result<PlaybackState> {
        match self.state() {
            PlaybackState::Playing => self.stop(),
            PlaybackState::Idle => self.play()?,
        }
        Ok(self.state())
    }

    /// Swap in a new buffer; stops playback and rewinds.
    pub fn replace(&mut self, waveform: Waveform) {
        self.stop();
        self.waveform = Arc::new(waveform);
        let mut shared = lock(&self.shared);
        shared.paused_at = Duration::ZERO;
        shared.progress = 0.0;
    }

    fn spawn_sampler(&self) -> Sampler {
        let halt = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let observer = Arc::clone(&self.observer);
        let tick = self.tick;
        let duration = self.duration();
        let flag = Arc::clone(&halt);

        let handle = std::thread::spawn(move || loop {
            std::thread::sleep(tick);
            if flag.load(Ordering::SeqCst) {
                return;
            }

            let mut state = lock(&shared);
            // Re-check under the lock: `stop` may have raced the sleep.
            if flag.load(Ordering::SeqCst) || state.state != PlaybackState::Playing {
                return;
            }
            let Some(sound) = state.sound.clone() else {
                return;
            };

            if sound.is_finished() {
                state.state = PlaybackState::Idle;
                state.sound = None;
                state.paused_at = Duration::ZERO;
                state.progress = 0.0;
                drop(state);
                log::debug!("playback: playing → idle (ended)");
                observer.on_progress(0.0);
                observer.on_ended();
                return;
            }

            let done = fraction(state.started_at + sound.elapsed(), duration);
            state.progress = done;
            drop(state);
            observer.on_progress(done);
        });

        Sampler { halt, handle }
    }
}

impl<O: AudioOutput> Drop for PlaybackController<O> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wrap(position: Duration, duration: Duration) -> Duration {
    if duration.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(position.as_secs_f64() % duration.as_secs_f64())
}

fn fraction(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

// ─────────────────────────────────────────────────────────────────────────────
// rodio device
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "playback")]
pub use self::device::RodioOutput;

#[cfg(feature = "playback")]
mod device {
    use std::sync::Arc;
    use std::time::Duration;

    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::{ActiveSound, AudioOutput};
    use crate::audio::Waveform;
    use crate::error::{Error, Result};

    /// The default system output device.
    pub struct RodioOutput {
        _stream: OutputStream,
        handle: OutputStreamHandle,
    }

    impl RodioOutput {
        pub fn open_default() -> Result<Self> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| Error::Playback(format!("no audio output: {}", e)))?;
            Ok(Self { _stream: stream, handle })
        }
    }

    struct RodioSound {
        sink: Sink,
    }

    impl ActiveSound for RodioSound {
        fn elapsed(&self) -> Duration {
            self.sink.get_pos()
        }

        fn is_finished(&self) -> bool {
            self.sink.empty()
        }

        fn stop(&self) {
            self.sink.stop();
        }
    }

    impl AudioOutput for RodioOutput {
        fn start(&mut self, waveform: &Arc<Waveform>, offset: Duration) -> Result<Box<dyn ActiveSound>> {
            let sink = Sink::try_new(&self.handle)
                .map_err(|e| Error::Playback(format!("cannot create sink: {}", e)))?;

            let channels = waveform.channel_count();
            let skip = (offset.as_secs_f64() * waveform.sample_rate() as f64) as usize;
            let samples: Vec<f32> = waveform
                .interleaved()
                .into_iter()
                .skip(skip * channels as usize)
                .collect();
            sink.append(SamplesBuffer::new(channels, waveform.sample_rate(), samples));

            Ok(Box::new(RodioSound { sink }))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
