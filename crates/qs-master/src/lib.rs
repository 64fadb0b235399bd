//! Headless controller for the quadsid chiptune tracker.
//!
//! Owns the engine behind a lock shared with the audio thread, and
//! provides song loading, saving, transport and offline export for the
//! command line front end.

use parking_lot::Mutex;
use qs_audio::{AudioError, AudioOutput, CpalOutput};
use qs_engine::Engine;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

// Re-export common types so callers don't need qs-ir/qs-engine directly.
pub use qs_audio::NullOutput;
pub use qs_engine::{Position, DEFAULT_SAMPLE_RATE};
pub use qs_formats::FormatError;
pub use qs_ir::{analyze, duration_samples, Song, SongFeatures};

/// Samples rendered per lock of the engine.
pub const RENDER_CHUNK: usize = 1024;

/// Errors from the controller.
#[derive(Error, Debug)]
pub enum MasterError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MasterError>;

/// Headless tracker controller. Owns the engine and manages the audio thread.
pub struct Controller {
    engine: Arc<Mutex<Engine>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(song: Song, sample_rate: u32) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(song, sample_rate))),
            playback: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.lock().sample_rate()
    }

    // --- Song management ---

    /// Read the song under the engine lock.
    pub fn with_song<R>(&self, f: impl FnOnce(&Song) -> R) -> R {
        f(self.engine.lock().song())
    }

    /// Edit the song under the engine lock. The audio thread sees either
    /// none or all of the edit.
    pub fn edit_song<R>(&self, f: impl FnOnce(&mut Song) -> R) -> R {
        f(self.engine.lock().song_mut())
    }

    /// Replace the song, returning the old one. Playback is reset.
    pub fn set_song(&self, song: Song) -> Song {
        self.engine.lock().set_song(song)
    }

    pub fn load_song(&self, data: &[u8]) -> Result<()> {
        let song = qs_formats::load_song(data)?;
        tracing::info!(title = %song.title, blocks = song.table.len(), "loaded song");
        self.set_song(song);
        Ok(())
    }

    pub fn load_song_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let song = qs_formats::load_song_file(path)?;
        tracing::info!(path = %path.display(), title = %song.title, "loaded song file");
        self.set_song(song);
        Ok(())
    }

    pub fn save_song(&self) -> Result<Vec<u8>> {
        let data = self.with_song(qs_formats::save_song)?;
        Ok(data)
    }

    pub fn save_song_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.with_song(|song| qs_formats::save_song_file(song, path))?;
        tracing::info!(path = %path.display(), "saved song file");
        Ok(())
    }

    // --- Transport ---

    /// Start playback on the default audio device.
    ///
    /// The device is opened on the audio thread the first time this is
    /// called and kept until [`close_audio`](Self::close_audio).
    pub fn play(&mut self) {
        self.play_with(CpalOutput::open);
    }

    /// Start playback on an output built by `open` on the audio thread.
    pub fn play_with<O, F>(&mut self, open: F)
    where
        O: AudioOutput + 'static,
        F: FnOnce() -> std::result::Result<O, AudioError> + Send + 'static,
    {
        if !self.is_audio_running() {
            self.close_audio();
            self.start_audio(open);
        }
        self.engine.lock().play();
    }

    pub fn pause(&self) {
        self.engine.lock().pause();
    }

    pub fn stop(&self) {
        self.engine.lock().stop();
    }

    pub fn reset(&self) {
        self.engine.lock().reset();
    }

    pub fn is_playing(&self) -> bool {
        self.engine.lock().is_playing()
    }

    pub fn position(&self) -> Position {
        self.engine.lock().position()
    }

    pub fn set_block(&self, block: usize) {
        self.engine.lock().set_block(block);
    }

    pub fn block_loop(&self) -> bool {
        self.engine.lock().block_loop()
    }

    pub fn set_block_loop(&self, block_loop: bool) {
        self.engine.lock().set_block_loop(block_loop);
    }

    pub fn is_channel_active(&self, channel: usize) -> bool {
        self.engine.lock().is_channel_active(channel)
    }

    pub fn set_channel_active(&self, channel: usize, active: bool) {
        self.engine.lock().set_channel_active(channel, active);
    }

    // --- Audio thread ---

    /// Is the audio thread alive and feeding a device?
    pub fn is_audio_running(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    /// Stop playback and shut down the audio thread.
    pub fn close_audio(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            self.engine.lock().pause();
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    tracing::error!("audio thread panicked");
                }
            }
        }
    }

    fn start_audio<O, F>(&mut self, open: F)
    where
        O: AudioOutput + 'static,
        F: FnOnce() -> std::result::Result<O, AudioError> + Send + 'static,
    {
        let engine = self.engine.clone();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let stop = stop_signal.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            if let Err(e) = audio_thread(open, &engine, &stop) {
                tracing::error!("audio output failed: {}", e);
            }
            done.store(true, Ordering::Relaxed);
        });

        self.playback = Some(PlaybackHandle {
            stop_signal,
            finished,
            thread: Some(thread),
        });
    }

    // --- Offline rendering ---

    /// Render the whole arrangement once from block 0.
    ///
    /// Works on a copy of the song, so live playback is untouched.
    /// Output is capped at `max_samples`.
    pub fn render_samples(&self, sample_rate: u32, max_samples: usize) -> Vec<i16> {
        let song = self.with_song(Song::clone);
        render_song(song, sample_rate, max_samples)
    }

    pub fn render_to_wav(&self, sample_rate: u32, max_seconds: u32) -> Vec<u8> {
        let max_samples = sample_rate as usize * max_seconds as usize;
        let samples = self.render_samples(sample_rate, max_samples);
        qs_formats::samples_to_wav(&samples, sample_rate)
    }

    /// Render and write a WAV file. Returns the number of samples written.
    pub fn export_wav(
        &self,
        path: impl AsRef<Path>,
        sample_rate: u32,
        max_seconds: u32,
    ) -> Result<usize> {
        let path = path.as_ref();
        let max_samples = sample_rate as usize * max_seconds as usize;
        let samples = self.render_samples(sample_rate, max_samples);
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        qs_formats::write_wav(&mut file, &samples, sample_rate)?;
        std::io::Write::flush(&mut file)?;
        tracing::info!(path = %path.display(), samples = samples.len(), "exported wav");
        Ok(samples.len())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Song::demo(), DEFAULT_SAMPLE_RATE)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.close_audio();
    }
}

/// Render one pass of `song` in [`RENDER_CHUNK`] pieces.
pub fn render_song(song: Song, sample_rate: u32, max_samples: usize) -> Vec<i16> {
    let total = (duration_samples(&song, sample_rate) as usize).min(max_samples);
    let mut engine = Engine::new(song, sample_rate);
    engine.reset();
    engine.set_block(0);
    engine.set_block_loop(false);
    engine.play();

    tracing::debug!(total, sample_rate, "rendering");
    let mut samples = vec![0i16; total];
    for chunk in samples.chunks_mut(RENDER_CHUNK) {
        engine.fill_buffer(chunk);
    }
    samples
}

fn audio_thread<O, F>(
    open: F,
    engine: &Mutex<Engine>,
    stop_signal: &AtomicBool,
) -> std::result::Result<(), AudioError>
where
    O: AudioOutput,
    F: FnOnce() -> std::result::Result<O, AudioError>,
{
    let mut output = open()?;

    let sample_rate = output.sample_rate();
    {
        let mut engine = engine.lock();
        if engine.sample_rate() != sample_rate {
            tracing::warn!(
                engine = engine.sample_rate(),
                device = sample_rate,
                "device rate differs, retuning engine"
            );
            engine.set_sample_rate(sample_rate);
        }
    }

    output.start()?;
    tracing::debug!(sample_rate, "audio thread started");

    let mut buffer = [0i16; RENDER_CHUNK];
    while !stop_signal.load(Ordering::Relaxed) {
        engine.lock().fill_buffer(&mut buffer);
        output.write(&buffer)?;
    }

    // Flush the ring with silence so the device doesn't replay stale audio.
    buffer.fill(0);
    output.write(&buffer)?;
    output.stop()?;
    let underruns = output.underruns();
    if underruns > 0 {
        tracing::warn!(underruns, "audio device ran dry");
    }
    tracing::debug!("audio thread stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const RATE: u32 = 8000;

    fn controller() -> Controller {
        Controller::new(Song::demo(), DEFAULT_SAMPLE_RATE)
    }

    #[test]
    fn transport_without_audio() {
        let ctrl = controller();
        assert!(!ctrl.is_playing());
        ctrl.set_block_loop(true);
        assert!(ctrl.block_loop());
        ctrl.set_channel_active(3, false);
        assert!(!ctrl.is_channel_active(3));
        ctrl.stop();
        assert_eq!(ctrl.position(), Position::default());
    }

    #[test]
    fn render_covers_one_pass() {
        let ctrl = controller();
        let expected = ctrl.with_song(|s| duration_samples(s, RATE)) as usize;
        let samples = ctrl.render_samples(RATE, usize::MAX);
        assert_eq!(samples.len(), expected);
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn render_is_capped_and_reproducible() {
        let ctrl = controller();
        let a = ctrl.render_samples(RATE, 3000);
        let b = ctrl.render_samples(RATE, 3000);
        assert_eq!(a.len(), 3000);
        assert_eq!(a, b);
    }

    #[test]
    fn render_ignores_live_transport() {
        let ctrl = controller();
        let before = ctrl.render_samples(RATE, 2000);
        ctrl.set_block(5);
        ctrl.set_block_loop(true);
        assert_eq!(ctrl.render_samples(RATE, 2000), before);
    }

    #[test]
    fn wav_export_matches_render() {
        let ctrl = controller();
        let wav = ctrl.render_to_wav(RATE, 1);
        let decoded = qs_formats::load_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, RATE);
        assert_eq!(decoded.samples, ctrl.render_samples(RATE, RATE as usize));
    }

    #[test]
    fn edits_are_visible_to_the_engine() {
        let ctrl = controller();
        ctrl.edit_song(|song| song.set_tempo(9));
        assert_eq!(ctrl.with_song(|song| song.tempo), 9);
    }

    #[test]
    fn save_then_load_restores_song() {
        let ctrl = controller();
        ctrl.edit_song(|song| song.set_title("round trip"));
        let data = ctrl.save_song().unwrap();
        ctrl.set_song(Song::default());
        ctrl.load_song(&data).unwrap();
        assert_eq!(ctrl.with_song(|song| song.title.to_string()), "round trip");
    }

    #[test]
    fn load_rejects_garbage() {
        let ctrl = controller();
        assert!(matches!(ctrl.load_song(&[1, 2, 3]), Err(MasterError::Format(_))));
        assert_eq!(ctrl.with_song(|song| song.title.to_string()), Song::demo().title.as_str());
    }

    #[test]
    fn null_output_drives_the_sequencer() {
        let mut ctrl = controller();
        ctrl.play_with(|| Ok(NullOutput::new(RATE)));
        assert!(ctrl.is_playing());

        let mut moved = false;
        for _ in 0..200 {
            if ctrl.position() != Position::default() {
                moved = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(moved);
        assert_eq!(ctrl.sample_rate(), RATE);

        ctrl.close_audio();
        assert!(!ctrl.is_playing());
        assert!(!ctrl.is_audio_running());
    }

    /// An output whose device never takes anything from its ring.
    struct StalledOutput {
        producer: ringbuf::HeapProd<i16>,
        _consumer: ringbuf::HeapCons<i16>,
    }

    impl StalledOutput {
        fn new() -> Self {
            use ringbuf::traits::Split;
            let (producer, consumer) = ringbuf::HeapRb::new(64).split();
            Self { producer, _consumer: consumer }
        }
    }

    impl AudioOutput for StalledOutput {
        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn write(&mut self, samples: &[i16]) -> std::result::Result<(), AudioError> {
            qs_audio::push_with_timeout(&mut self.producer, samples, Duration::from_millis(20))
        }

        fn start(&mut self) -> std::result::Result<(), AudioError> {
            Ok(())
        }

        fn stop(&mut self) -> std::result::Result<(), AudioError> {
            Ok(())
        }
    }

    #[test]
    fn stalled_device_does_not_block_close() {
        let mut ctrl = controller();
        ctrl.play_with(|| Ok(StalledOutput::new()));
        std::thread::sleep(Duration::from_millis(5));
        ctrl.close_audio();
        assert!(!ctrl.is_audio_running());
        assert!(!ctrl.is_playing());

        // A second start after the stall gets a fresh thread.
        ctrl.play_with(|| Ok(StalledOutput::new()));
        for _ in 0..200 {
            if !ctrl.is_audio_running() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!ctrl.is_audio_running());
    }

    #[test]
    fn failed_device_finishes_thread() {
        let mut ctrl = controller();
        ctrl.play_with(|| Err::<NullOutput, _>(AudioError::NoDevice));
        for _ in 0..200 {
            if !ctrl.is_audio_running() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!ctrl.is_audio_running());
        ctrl.close_audio();
    }
}
