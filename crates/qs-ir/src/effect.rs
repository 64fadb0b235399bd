//! Pitch effect tables.

use arrayvec::ArrayString;

use crate::instrument::{truncated_name, MAX_NAME_LENGTH};
use crate::program::Program;

/// Maximum number of rows in an effect table.
pub const MAX_PITCH_LENGTH: usize = 16;

/// Neutral value for relative and detune rows.
pub const PITCH_CENTER: u8 = 0x30;

/// How a pitch row derives the sounding pitch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PitchOp {
    /// Quarter-semitone offset from the note
    #[default]
    Relative,
    /// Absolute pitch in semitones, ignoring the note
    Absolute,
    /// Sixteenth-semitone offset from the note
    Detune,
}

impl PitchOp {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PitchOp::Relative),
            1 => Some(PitchOp::Absolute),
            2 => Some(PitchOp::Detune),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u8 {
        self as u8
    }
}

/// One tick of an effect table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PitchRow {
    pub op: PitchOp,
    pub value: u8,
}

impl Default for PitchRow {
    fn default() -> Self {
        Self::relative(0)
    }
}

impl PitchRow {
    pub const fn new(op: PitchOp, value: u8) -> Self {
        Self { op, value }
    }

    /// Offset from the note in quarter semitones.
    pub const fn relative(quarters: i8) -> Self {
        Self::new(PitchOp::Relative, (PITCH_CENTER as i16 + quarters as i16) as u8)
    }

    /// Fixed pitch in semitones.
    pub const fn absolute(note: u8) -> Self {
        Self::new(PitchOp::Absolute, note)
    }

    /// Offset from the note in sixteenth semitones.
    pub const fn detune(sixteenths: i8) -> Self {
        Self::new(PitchOp::Detune, (PITCH_CENTER as i16 + sixteenths as i16) as u8)
    }

    /// Sounding pitch in semitones for a channel playing `note`.
    pub fn pitch(&self, note: u8) -> f32 {
        let offset = self.value as f32 - PITCH_CENTER as f32;
        match self.op {
            PitchOp::Relative => note as f32 + offset / 4.0,
            PitchOp::Absolute => self.value as f32,
            PitchOp::Detune => note as f32 + offset / 16.0,
        }
    }
}

/// A pitch effect: vibrato, slide, arpeggio and the like.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Effect {
    pub name: ArrayString<MAX_NAME_LENGTH>,
    pub program: Program<PitchRow, MAX_PITCH_LENGTH>,
}

impl Effect {
    pub fn new(name: &str) -> Self {
        Self { name: truncated_name(name), program: Program::new() }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncated_name(name);
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }
}
