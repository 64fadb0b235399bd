//! Song structure and arrangement table.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec, CapacityError};

use crate::effect::{Effect, PitchRow};
use crate::instrument::{
    truncated_name, Adsr, Filter, FilterMode, FilterOp, FilterRow, Instrument, PulseOp,
    VoiceFlags, WaveRow, MAX_NAME_LENGTH,
};
use crate::program::Program;
use crate::track::{Note, Row, Track, MAX_TRACK_LENGTH};

/// Number of voices.
pub const CHANNEL_COUNT: usize = 4;

/// Number of tracks in the track bank.
pub const TRACK_COUNT: usize = 21 * 12;

/// Number of instruments in the instrument bank.
pub const INSTRUMENT_COUNT: usize = 48;

/// Number of effects in the effect bank.
pub const EFFECT_COUNT: usize = INSTRUMENT_COUNT;

/// Maximum number of blocks in the arrangement table.
pub const MAX_SONG_LENGTH: usize = 256;

/// Tempo range (ticks per row).
pub const MIN_TEMPO: u8 = 4;
pub const MAX_TEMPO: u8 = 15;

/// Maximum swing (extra ticks on even rows).
pub const MAX_SWING: u8 = 4;

/// Track lengths the sequencer supports.
pub const TRACK_LENGTHS: [u8; 2] = [24, 32];

/// One row of the arrangement table: a track number per channel (0 = silent).
pub type Block = [u8; CHANNEL_COUNT];

/// A complete song.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Song {
    /// Song title
    pub title: ArrayString<MAX_NAME_LENGTH>,
    /// Song author
    pub author: ArrayString<MAX_NAME_LENGTH>,
    /// Ticks per row (4-15)
    pub tempo: u8,
    /// Extra ticks on even rows (0-4)
    pub swing: u8,
    /// Rows played per track (24 or 32)
    pub track_length: u8,
    /// Track bank (`TRACK_COUNT` entries)
    pub tracks: Vec<Track>,
    /// Instrument bank (`INSTRUMENT_COUNT` entries)
    pub instruments: Vec<Instrument>,
    /// Effect bank (`EFFECT_COUNT` entries)
    pub effects: Vec<Effect>,
    /// Arrangement table
    pub table: ArrayVec<Block, MAX_SONG_LENGTH>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            author: ArrayString::new(),
            tempo: 6,
            swing: 0,
            track_length: MAX_TRACK_LENGTH as u8,
            tracks: alloc::vec![Track::new(); TRACK_COUNT],
            instruments: alloc::vec![Instrument::default(); INSTRUMENT_COUNT],
            effects: alloc::vec![Effect::default(); EFFECT_COUNT],
            table: ArrayVec::new(),
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        song.set_title(title);
        song
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = truncated_name(title);
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = truncated_name(author);
    }

    /// Set the tempo, clamped to 4-15.
    pub fn set_tempo(&mut self, tempo: u8) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    /// Set the swing, clamped to 0-4.
    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing.min(MAX_SWING);
    }

    /// Set the track length: anything up to 24 selects 24, otherwise 32.
    pub fn set_track_length(&mut self, length: u8) {
        self.track_length = if length <= TRACK_LENGTHS[0] { TRACK_LENGTHS[0] } else { TRACK_LENGTHS[1] };
    }

    /// Rows played per track, never more than a track holds.
    pub fn track_length(&self) -> usize {
        (self.track_length as usize).clamp(1, MAX_TRACK_LENGTH)
    }

    /// Look up a track by its 1-based number.
    pub fn track(&self, number: u8) -> Option<&Track> {
        lookup(&self.tracks, number)
    }

    pub fn track_mut(&mut self, number: u8) -> Option<&mut Track> {
        lookup_mut(&mut self.tracks, number)
    }

    /// Look up an instrument by its 1-based number.
    pub fn instrument(&self, number: u8) -> Option<&Instrument> {
        lookup(&self.instruments, number)
    }

    pub fn instrument_mut(&mut self, number: u8) -> Option<&mut Instrument> {
        lookup_mut(&mut self.instruments, number)
    }

    /// Look up an effect by its 1-based number.
    pub fn effect(&self, number: u8) -> Option<&Effect> {
        lookup(&self.effects, number)
    }

    pub fn effect_mut(&mut self, number: u8) -> Option<&mut Effect> {
        lookup_mut(&mut self.effects, number)
    }

    /// Get a block of the arrangement table.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.table.get(index)
    }

    /// Append a block to the arrangement table.
    pub fn push_block(&mut self, block: Block) -> Result<(), CapacityError<Block>> {
        self.table.try_push(block)
    }

    /// The built-in demo song: bass, kick and snare with matching effects.
    pub fn demo() -> Self {
        let mut song = Self::new("demo");
        song.tempo = 5;

        let drum_wave = |value: u8| {
            Program::from_rows(
                [
                    WaveRow::new(VoiceFlags::NOISE | VoiceFlags::GATE, PulseOp::Set, value),
                    WaveRow::new(VoiceFlags::PULSE | VoiceFlags::GATE, PulseOp::Increment, 3),
                ],
                1,
            )
        };

        let bass = &mut song.instruments[0];
        bass.set_name("bass");
        bass.hard_restart = true;
        bass.adsr = Adsr::new(1, 8, 8, 8);
        bass.wave = drum_wave(26);
        bass.filter = Filter {
            routing: 0b0001,
            program: Program::from_rows(
                [
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Set, 12),
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Decrement, 8),
                ],
                1,
            ),
        };

        let kick = &mut song.instruments[1];
        kick.set_name("kick");
        kick.hard_restart = true;
        kick.adsr = Adsr::new(1, 8, 8, 8);
        kick.wave = drum_wave(26);
        kick.filter = Filter {
            routing: 0b0001,
            program: Program::from_rows(
                [
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Set, 13),
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Set, 20),
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Set, 5),
                ],
                2,
            ),
        };

        let snare = &mut song.instruments[2];
        snare.set_name("snare");
        snare.hard_restart = true;
        snare.adsr = Adsr::new(1, 1, 7, 9);
        snare.wave = Program::from_rows(
            [
                WaveRow::new(VoiceFlags::NOISE | VoiceFlags::GATE, PulseOp::Set, 16),
                WaveRow::new(VoiceFlags::NOISE | VoiceFlags::GATE, PulseOp::Increment, 0),
                WaveRow::new(VoiceFlags::PULSE | VoiceFlags::GATE, PulseOp::Increment, 0),
                WaveRow::new(VoiceFlags::PULSE | VoiceFlags::GATE, PulseOp::Increment, 0),
                WaveRow::new(VoiceFlags::NOISE, PulseOp::Increment, 0),
            ],
            4,
        );
        snare.filter = Filter {
            routing: 0b0001,
            program: Program::from_rows(
                [
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Set, 13),
                    FilterRow::new(FilterMode::LOW, 13, FilterOp::Decrement, 3),
                ],
                1,
            ),
        };

        let effects: [(&str, &[i8], u8); 3] = [
            ("bass", &[-48], 0),
            ("kick", &[48, 16, -16, -48], 3),
            ("snare", &[52, 52, -24, -44, 36, 52], 4),
        ];
        for (i, (name, quarters, loop_point)) in effects.iter().enumerate() {
            let effect = &mut song.effects[i];
            effect.set_name(name);
            effect.program =
                Program::from_rows(quarters.iter().map(|&q| PitchRow::relative(q)), *loop_point);
        }

        let vibrato = &mut song.effects[EFFECT_COUNT - 1];
        vibrato.set_name("vibrato");
        vibrato.program = Program::from_rows(
            [0, 1, 2, 2, 1, 0, -1, -2, -2, -1].map(PitchRow::relative),
            0,
        );

        let track = &mut song.tracks[0];
        let events: [(usize, u8, u8, Note); 12] = [
            (0, 2, 2, Note::On(37)),
            (2, 1, 1, Note::On(37)),
            (4, 0, 0, Note::Off),
            (6, 1, 1, Note::On(37)),
            (8, 3, 3, Note::On(49)),
            (10, 1, 1, Note::On(25)),
            (12, 1, 1, Note::On(37)),
            (14, 0, 0, Note::Off),
            (16, 2, 2, Note::On(37)),
            (18, 0, 0, Note::Off),
            (24, 3, 3, Note::On(49)),
            (28, 1, 1, Note::On(35)),
        ];
        for (row, instrument, effect, note) in events {
            track.rows[row] = Row::new(instrument, effect, note);
        }

        song.table.push([1, 0, 0, 0]);
        song
    }
}

fn lookup<T>(bank: &[T], number: u8) -> Option<&T> {
    (number as usize).checked_sub(1).and_then(|i| bank.get(i))
}

fn lookup_mut<T>(bank: &mut [T], number: u8) -> Option<&mut T> {
    (number as usize).checked_sub(1).and_then(move |i| bank.get_mut(i))
}
