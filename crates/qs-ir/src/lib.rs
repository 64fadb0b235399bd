//! Song data model for the quadsid chiptune engine.
//!
//! Songs are built from tracks of note rows arranged into blocks, plus banks
//! of instruments and pitch effects whose per-tick programs the engine steps.
//! The loader produces these types and the playback engine reads them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod analysis;
mod effect;
mod instrument;
mod program;
pub mod song;
mod track;

pub use analysis::{
    analyze, duration_samples, tick_length, ticks_for_row, ticks_per_pass, total_ticks,
    SongFeatures, TICK_RATE,
};
pub use effect::{Effect, PitchOp, PitchRow, MAX_PITCH_LENGTH, PITCH_CENTER};
pub use instrument::{
    Adsr, Filter, FilterMode, FilterOp, FilterRow, Instrument, PulseOp, VoiceFlags, WaveRow,
    MAX_FILTER_LENGTH, MAX_NAME_LENGTH, MAX_WAVE_LENGTH,
};
pub use program::Program;
pub use song::{
    Block, Song, CHANNEL_COUNT, EFFECT_COUNT, INSTRUMENT_COUNT, MAX_SONG_LENGTH, MAX_SWING,
    MAX_TEMPO, MIN_TEMPO, TRACK_COUNT, TRACK_LENGTHS,
};
pub use track::{Note, Row, Track, MAX_NOTE, MAX_TRACK_LENGTH, NOTE_OFF};
