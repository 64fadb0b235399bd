//! ADSR envelope generator.
//!
//! A four-state machine over a 24-bit level, stepped once per output sample.
//! Rates come from 4-bit indices looked up in fixed tables.

use qs_ir::Adsr;

/// Maximum envelope level.
pub const LEVEL_MAX: i32 = 0xFF_FFFF;

/// Per-sample attack increments, indexed by the attack nibble.
pub const ATTACK_SPEEDS: [i32; 16] = [
    168867, 47495, 24124, 15998, 10200, 6908, 5692, 4855, 3877, 1555, 777, 486, 389, 129, 77, 48,
];

/// Per-sample decay and release decrements, indexed by nibble.
pub const RELEASE_SPEEDS: [i32; 16] = [
    42660, 15468, 7857, 5210, 3322, 2250, 1853, 1581, 1262, 506, 253, 158, 126, 42, 25, 15,
];

/// Expand a 4-bit sustain value to a 24-bit level.
pub const fn sustain_level(nibble: u8) -> i32 {
    (nibble & 0x0F) as i32 * 0x11_1111
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    #[default]
    Release,
    Attack,
    Decay,
    Sustain,
}

/// Runtime state of one channel's envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    level: i32,
    stage: EnvelopeStage,
    attack: i32,
    decay: i32,
    sustain: i32,
    release: i32,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Load rates and sustain level from an instrument's nibbles.
    pub fn set_adsr(&mut self, adsr: Adsr) {
        self.attack = ATTACK_SPEEDS[(adsr.attack & 0x0F) as usize];
        self.decay = RELEASE_SPEEDS[(adsr.decay & 0x0F) as usize];
        self.sustain = sustain_level(adsr.sustain);
        self.release = RELEASE_SPEEDS[(adsr.release & 0x0F) as usize];
    }

    /// Force the release stage so the next gated step re-enters attack.
    pub fn retrigger(&mut self) {
        self.stage = EnvelopeStage::Release;
    }

    /// Drop straight to silence.
    pub fn silence(&mut self) {
        self.level = 0;
        self.stage = EnvelopeStage::Release;
    }

    /// Advance by one sample with the effective gate.
    pub fn step(&mut self, gate: bool) {
        if !gate {
            self.stage = EnvelopeStage::Release;
        } else if self.stage == EnvelopeStage::Release {
            self.stage = EnvelopeStage::Attack;
        }

        match self.stage {
            EnvelopeStage::Attack => {
                self.level += self.attack;
                if self.level >= LEVEL_MAX {
                    self.level = LEVEL_MAX;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level -= self.decay;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                if self.level != self.sustain {
                    self.stage = EnvelopeStage::Attack;
                }
            }
            EnvelopeStage::Release => {
                self.level = (self.level - self.release).max(0);
            }
        }
    }
}
