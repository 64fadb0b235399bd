//! Instrument, wave table and filter table types.

use arrayvec::ArrayString;
use bitflags::bitflags;

use crate::program::Program;

/// Maximum number of rows in an instrument wave table.
pub const MAX_WAVE_LENGTH: usize = 16;

/// Maximum number of rows in a filter table.
pub const MAX_FILTER_LENGTH: usize = 16;

/// Maximum length of instrument and effect names.
pub const MAX_NAME_LENGTH: usize = 16;

bitflags! {
    /// Voice control bits selected by a wave table row.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VoiceFlags: u8 {
        /// Envelope gate
        const GATE = 0x01;
        /// Hard sync to the previous voice
        const SYNC = 0x02;
        /// Ring modulation by the previous voice
        const RING = 0x04;
        const TRIANGLE = 0x10;
        const SAWTOOTH = 0x20;
        const PULSE = 0x40;
        const NOISE = 0x80;
    }
}

bitflags! {
    /// Filter output taps.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FilterMode: u8 {
        const LOW = 0x01;
        const BAND = 0x02;
        const HIGH = 0x04;
    }
}

/// Operation a wave table row applies to the pulse-width accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PulseOp {
    #[default]
    Increment,
    Set,
}

impl PulseOp {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PulseOp::Increment),
            1 => Some(PulseOp::Set),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u8 {
        self as u8
    }
}

/// Operation a filter table row applies to the cutoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterOp {
    Increment,
    #[default]
    Set,
    Decrement,
}

impl FilterOp {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(FilterOp::Increment),
            1 => Some(FilterOp::Set),
            2 => Some(FilterOp::Decrement),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u8 {
        self as u8
    }
}

/// One tick of an instrument's wave table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaveRow {
    pub flags: VoiceFlags,
    pub op: PulseOp,
    /// Pulse-width magnitude (0-31)
    pub value: u8,
}

impl WaveRow {
    pub const fn new(flags: VoiceFlags, op: PulseOp, value: u8) -> Self {
        Self { flags, op, value }
    }
}

/// One tick of a filter table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterRow {
    pub mode: FilterMode,
    /// Resonance (0-15)
    pub resonance: u8,
    pub op: FilterOp,
    /// Cutoff operand (0-31)
    pub value: u8,
}

impl FilterRow {
    pub const fn new(mode: FilterMode, resonance: u8, op: FilterOp, value: u8) -> Self {
        Self { mode, resonance, op, value }
    }
}

/// An instrument's optional filter program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    /// Channels routed through the filter (bit n = channel n)
    pub routing: u8,
    pub program: Program<FilterRow, MAX_FILTER_LENGTH>,
}

/// Envelope rates as 4-bit indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Adsr {
    pub attack: u8,
    pub decay: u8,
    /// Sustain level (0-15, not a rate)
    pub sustain: u8,
    pub release: u8,
}

impl Adsr {
    pub const fn new(attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        Self { attack, decay, sustain, release }
    }

    /// Nibbles in storage order.
    pub const fn to_array(self) -> [u8; 4] {
        [self.attack, self.decay, self.sustain, self.release]
    }

    /// Build from storage order, masking each value to a nibble.
    pub const fn from_array(raw: [u8; 4]) -> Self {
        Self::new(raw[0] & 0x0F, raw[1] & 0x0F, raw[2] & 0x0F, raw[3] & 0x0F)
    }
}

/// An instrument: envelope, wave table and optional filter table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instrument {
    pub name: ArrayString<MAX_NAME_LENGTH>,
    pub adsr: Adsr,
    /// Reset the envelope on every new note
    pub hard_restart: bool,
    pub wave: Program<WaveRow, MAX_WAVE_LENGTH>,
    pub filter: Filter,
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        inst.set_name(name);
        inst
    }

    /// Set the name, truncated to `MAX_NAME_LENGTH` bytes on a char boundary.
    pub fn set_name(&mut self, name: &str) {
        self.name = truncated_name(name);
    }

    /// Returns true if the instrument has nothing to play.
    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }
}

pub(crate) fn truncated_name(name: &str) -> ArrayString<MAX_NAME_LENGTH> {
    let mut out = ArrayString::new();
    for c in name.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}
