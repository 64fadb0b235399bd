//! Main playback engine.

use alloc::vec;
use alloc::vec::Vec;

use qs_ir::{tick_length, Song, CHANNEL_COUNT};

use crate::channel::ChannelState;
use crate::filter::FilterState;
use crate::mixer::mix;
use crate::sequencer::{Position, Sequencer};

/// Default output sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// The playback engine: sequencer, voices and shared filter.
pub struct Engine {
    /// The song being played
    song: Song,
    /// Audio sample rate (e.g., 44100)
    sample_rate: u32,
    /// Samples per tick
    tick_length: u32,
    /// Sample counter within the current tick
    sample_counter: u32,
    sequencer: Sequencer,
    channels: [ChannelState; CHANNEL_COUNT],
    filter: FilterState,
}

impl Engine {
    /// Create a new engine for the given song.
    pub fn new(song: Song, sample_rate: u32) -> Self {
        Self {
            song,
            sample_rate,
            tick_length: tick_length(sample_rate).max(1),
            sample_counter: 0,
            sequencer: Sequencer::new(),
            channels: Default::default(),
            filter: FilterState::new(sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Move to a new output rate, keeping the song position.
    ///
    /// Sounding voices are re-pitched and the current tick restarts.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        self.tick_length = tick_length(sample_rate).max(1);
        self.sample_counter = 0;
        self.filter.set_sample_rate(sample_rate);
        for chan in &mut self.channels {
            if chan.note != 0 {
                chan.set_note(chan.note, sample_rate);
            }
        }
    }

    /// Samples per sequencer tick.
    pub fn tick_length(&self) -> u32 {
        self.tick_length
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Mutable access for editing. Changes are picked up on the next tick.
    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    /// Replace the song and reset playback state.
    pub fn set_song(&mut self, song: Song) -> Song {
        let old = core::mem::replace(&mut self.song, song);
        self.reset();
        old
    }

    /// Fill `out` with PCM samples.
    ///
    /// The sequencer ticks exactly once every `tick_length` samples no
    /// matter how the requests are sliced.
    pub fn fill_buffer(&mut self, out: &mut [i16]) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.fill(out));
        #[cfg(not(feature = "alloc_check"))]
        self.fill(out);
    }

    fn fill(&mut self, mut out: &mut [i16]) {
        while !out.is_empty() {
            if self.sample_counter == 0 {
                self.sequencer.tick(&self.song, &mut self.channels, &mut self.filter, self.sample_rate);
            }
            let len = ((self.tick_length - self.sample_counter) as usize).min(out.len());
            let (chunk, rest) = out.split_at_mut(len);
            mix(&mut self.channels, &mut self.filter, chunk);
            self.sample_counter += len as u32;
            if self.sample_counter >= self.tick_length {
                self.sample_counter = 0;
            }
            out = rest;
        }
    }

    /// Render `samples` samples into a new buffer.
    pub fn render(&mut self, samples: usize) -> Vec<i16> {
        let mut out = vec![0; samples];
        self.fill_buffer(&mut out);
        out
    }

    /// Start playback.
    pub fn play(&mut self) {
        self.sequencer.playing = true;
    }

    /// Stop advancing and silence every voice, keeping the position.
    pub fn pause(&mut self) {
        self.sequencer.playing = false;
        for chan in &mut self.channels {
            chan.silence();
        }
        self.filter.reset_dsp();
    }

    /// Pause and return to the first row. The block is kept when block
    /// loop is on.
    pub fn stop(&mut self) {
        self.pause();
        self.sequencer.rewind();
        self.filter.unbind();
    }

    /// Stop and start over from block 0 with fresh voice state.
    pub fn reset(&mut self) {
        self.stop();
        self.sequencer.position = Position::default();
        for chan in &mut self.channels {
            let active = chan.active;
            *chan = ChannelState::new();
            chan.active = active;
        }
        self.filter = FilterState::new(self.sample_rate);
        self.sample_counter = 0;
    }

    /// Is playback active?
    pub fn is_playing(&self) -> bool {
        self.sequencer.playing
    }

    /// Get the current playback position.
    pub fn position(&self) -> Position {
        self.sequencer.position
    }

    pub fn row(&self) -> usize {
        self.sequencer.position.row
    }

    pub fn block(&self) -> usize {
        self.sequencer.position.block
    }

    /// Jump to a block. Out-of-range blocks restart the table on the next row.
    pub fn set_block(&mut self, block: usize) {
        self.sequencer.position.block = block;
    }

    pub fn block_loop(&self) -> bool {
        self.sequencer.block_loop
    }

    pub fn set_block_loop(&mut self, block_loop: bool) {
        self.sequencer.block_loop = block_loop;
    }

    pub fn is_channel_active(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|c| c.active)
    }

    /// Mute or unmute a channel. Muted channels keep running silently.
    pub fn set_channel_active(&mut self, channel: usize, active: bool) {
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.active = active;
        }
    }

    pub fn channel(&self, channel: usize) -> Option<&ChannelState> {
        self.channels.get(channel)
    }

    pub fn channels(&self) -> &[ChannelState; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeStage;

    fn playing_demo() -> Engine {
        let mut engine = Engine::new(Song::demo(), DEFAULT_SAMPLE_RATE);
        engine.play();
        engine
    }

    #[test]
    fn new_engine_is_stopped_at_start() {
        let engine = Engine::new(Song::demo(), DEFAULT_SAMPLE_RATE);
        assert!(!engine.is_playing());
        assert_eq!(engine.position(), Position::default());
        assert_eq!(engine.tick_length(), 882);
        assert!((0..CHANNEL_COUNT).all(|c| engine.is_channel_active(c)));
        assert!(!engine.is_channel_active(CHANNEL_COUNT));
    }

    #[test]
    fn demo_song_makes_sound() {
        let mut engine = playing_demo();
        let out = engine.render(DEFAULT_SAMPLE_RATE as usize / 2);
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn sequencer_ticks_once_per_tick_length() {
        let mut engine = playing_demo();
        let tick = engine.tick_length() as usize;
        let tempo = engine.song().tempo as usize;
        engine.render(tick * (tempo - 1));
        assert_eq!(engine.row(), 0);
        engine.render(1);
        assert_eq!(engine.row(), 1);
    }

    #[test]
    fn chunked_fill_matches_single_fill() {
        let total = 882 * 7 + 123;
        let mut whole = playing_demo();
        let expected = whole.render(total);

        let mut chunked = playing_demo();
        let mut got = Vec::new();
        for size in [1usize, 881, 2, 1000, 64].iter().cycle() {
            let remaining = total - got.len();
            if remaining == 0 {
                break;
            }
            got.extend(chunked.render((*size).min(remaining)));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn pause_silences_voices_and_keeps_position() {
        let mut engine = playing_demo();
        engine.render(882 * 13);
        let position = engine.position();
        engine.pause();
        assert!(!engine.is_playing());
        assert_eq!(engine.position(), position);
        for chan in engine.channels() {
            assert!(!chan.gate);
            assert_eq!(chan.envelope.level(), 0);
            assert_eq!(chan.envelope.stage(), EnvelopeStage::Release);
        }
    }

    #[test]
    fn stop_rewinds_and_releases_filter() {
        let mut engine = playing_demo();
        engine.render(882 * 13);
        assert!(engine.filter().is_bound());
        engine.stop();
        assert_eq!(engine.position(), Position::default());
        assert!(!engine.filter().is_bound());
        assert!(engine.channels().iter().all(|c| !c.gate));
    }

    #[test]
    fn stop_keeps_block_when_looping() {
        let mut song = Song::demo();
        song.push_block([1, 0, 0, 0]).unwrap();
        let mut engine = Engine::new(song, DEFAULT_SAMPLE_RATE);
        engine.set_block(1);
        engine.set_block_loop(true);
        engine.play();
        engine.render(882 * 40);
        engine.stop();
        assert_eq!(engine.block(), 1);
        assert_eq!(engine.row(), 0);
    }

    #[test]
    fn reset_restores_reproducible_output() {
        let mut engine = playing_demo();
        let first = engine.render(882 * 20);
        engine.reset();
        engine.play();
        let second = engine.render(882 * 20);
        assert_eq!(first, second);
    }

    #[test]
    fn reset_keeps_mute_switches() {
        let mut engine = playing_demo();
        engine.set_channel_active(2, false);
        engine.reset();
        assert!(!engine.is_channel_active(2));
        assert!(engine.is_channel_active(0));
    }

    #[test]
    fn muted_demo_is_silent() {
        let mut engine = playing_demo();
        engine.set_channel_active(0, false);
        let out = engine.render(882 * 30);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn sample_rate_change_keeps_position() {
        let mut engine = playing_demo();
        engine.render(882 * 13);
        let position = engine.position();
        engine.set_sample_rate(48000);
        assert_eq!(engine.sample_rate(), 48000);
        assert_eq!(engine.tick_length(), 960);
        assert_eq!(engine.block(), position.block);
        assert_eq!(engine.row(), position.row);
        for chan in engine.channels().iter().filter(|c| c.note != 0 && c.effect == 0) {
            assert_eq!(chan.oscillator.freq, crate::note_to_increment(chan.note, 48000));
        }
    }

    #[test]
    fn last_filtered_instrument_owns_the_single_filter_slot() {
        let mut engine = playing_demo();
        // Row 0 of the demo track triggers the kick.
        engine.render(1);
        assert_eq!(engine.filter().instrument, 2);
        // Row 2 triggers the bass, which takes over the shared filter.
        engine.render(882 * 10);
        assert_eq!(engine.filter().instrument, 1);
    }
}
