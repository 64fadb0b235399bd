//! Playback and synthesis engine for the quadsid chiptune tracker.
//!
//! Steps the song at a fixed 50 Hz tick and synthesizes four voices in the
//! style of a classic sound chip: combined waveforms, hard sync, ring
//! modulation, ADSR envelopes and a shared multimode filter.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod engine;
pub mod envelope;
mod filter;
pub mod frequency;
mod mixer;
pub mod oscillator;
mod sequencer;

pub use channel::ChannelState;
pub use engine::{Engine, DEFAULT_SAMPLE_RATE};
pub use envelope::{Envelope, EnvelopeStage};
pub use filter::FilterState;
pub use frequency::{note_to_increment, pitch_to_increment};
pub use oscillator::Oscillator;
pub use sequencer::Position;
