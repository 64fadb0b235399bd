//! Phase-accumulator oscillator and waveform generators.
//!
//! Every waveform is an unsigned byte derived from the 28-bit phase. When
//! several waveforms are selected at once they are ANDed together, which
//! gives the distorted combined tones of classic sound chips.

use qs_ir::VoiceFlags;

use crate::frequency::PHASE_MASK;

/// Phase value at the midpoint of a cycle.
pub const HALF_PHASE: u32 = 1 << 27;

/// Initial noise shift register contents.
pub const NOISE_SEED: u32 = 0x7F_FFF8;

const NOISE_MASK: u32 = 0x7F_FFFF;

/// Register bits read out as noise output bits 7..0.
const NOISE_TAPS: [u32; 8] = [22, 20, 16, 13, 11, 7, 4, 2];

/// Triangle: rises over the first half-cycle, falls over the second.
pub fn triangle(phase: u32) -> u8 {
    let folded = if phase < HALF_PHASE { phase } else { !phase };
    ((folded >> 19) & 0xFF) as u8
}

pub fn sawtooth(phase: u32) -> u8 {
    ((phase >> 20) & 0xFF) as u8
}

/// Pulse: high once the phase passes the pulse width.
pub fn pulse(phase: u32, pulse_width: u32) -> u8 {
    if phase > pulse_width {
        0xFF
    } else {
        0x00
    }
}

/// Assemble the noise output byte from the shift register.
pub fn noise_output(shift: u32) -> u8 {
    NOISE_TAPS
        .iter()
        .fold(0u8, |out, &bit| (out << 1) | ((shift >> bit) & 1) as u8)
}

/// 23-bit LFSR noise source, clocked by the top bits of the phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Noise {
    shift: u32,
    clock: u32,
    output: u8,
}

impl Default for Noise {
    fn default() -> Self {
        Self::new()
    }
}

impl Noise {
    pub fn new() -> Self {
        Self { shift: NOISE_SEED, clock: 0, output: noise_output(NOISE_SEED) }
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn output(&self) -> u8 {
        self.output
    }

    /// Shift the register once, feeding back bit 22 XOR bit 17.
    pub fn clock(&mut self) {
        let s = self.shift;
        let feedback = ((s >> 22) ^ (s >> 17)) & 1;
        self.shift = ((s << 1) | feedback) & NOISE_MASK;
        self.output = noise_output(self.shift);
    }

    /// Clock the register if the top five phase bits changed.
    pub fn update(&mut self, phase: u32) {
        let clock = phase >> 23;
        if clock != self.clock {
            self.clock = clock;
            self.clock();
        }
    }
}

/// Oscillator state of one voice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Oscillator {
    /// Phase accumulator, always below 2^28
    pub phase: u32,
    /// Phase increment per sample
    pub freq: u32,
    /// Pulse threshold, always below 2^28
    pub pulse_width: u32,
    pub noise: Noise,
}

impl Oscillator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the phase by one sample.
    pub fn advance(&mut self) {
        self.phase = self.phase.wrapping_add(self.freq) & PHASE_MASK;
        self.noise.update(self.phase);
    }

    /// Hard sync: if the source oscillator wrapped this sample, restart
    /// in step with it.
    pub fn sync_to(&mut self, source_phase: u32, source_freq: u32) {
        if source_phase < source_freq {
            let scaled = source_phase as u64 * self.freq as u64 / source_freq as u64;
            self.phase = scaled as u32 & PHASE_MASK;
        }
    }

    /// Waveform byte for the selected flags. `ring_phase` is the phase of
    /// the modulating voice, used when `RING` is set.
    pub fn output(&self, flags: VoiceFlags, ring_phase: u32) -> u8 {
        let mut out = 0xFF;
        if flags.contains(VoiceFlags::TRIANGLE) {
            let mut tri = triangle(self.phase);
            if flags.contains(VoiceFlags::RING) && ring_phase >= HALF_PHASE {
                tri = !tri;
            }
            out &= tri;
        }
        if flags.contains(VoiceFlags::SAWTOOTH) {
            out &= sawtooth(self.phase);
        }
        if flags.contains(VoiceFlags::PULSE) {
            out &= pulse(self.phase, self.pulse_width);
        }
        if flags.contains(VoiceFlags::NOISE) {
            out &= self.noise.output();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_folds_at_midpoint() {
        assert_eq!(triangle(0), 0x00);
        assert_eq!(triangle(0x600_0000), 0xC0);
        assert_eq!(triangle(HALF_PHASE - 1), 0xFF);
        assert_eq!(triangle(HALF_PHASE), 0xFF);
        assert_eq!(triangle(0xA00_0000), 0xBF);
        assert_eq!(triangle(PHASE_MASK), 0x00);
    }

    #[test]
    fn sawtooth_is_top_byte() {
        assert_eq!(sawtooth(0), 0);
        assert_eq!(sawtooth(HALF_PHASE), 0x80);
        assert_eq!(sawtooth(PHASE_MASK), 0xFF);
    }

    #[test]
    fn pulse_is_high_past_threshold() {
        assert_eq!(pulse(0x800_0000, 0x800_0000), 0x00);
        assert_eq!(pulse(0x800_0001, 0x800_0000), 0xFF);
        assert_eq!(pulse(0, 0), 0x00);
    }

    #[test]
    fn phase_wraps_within_28_bits() {
        let mut osc = Oscillator { freq: 0x0FF0_0000, ..Default::default() };
        for _ in 0..1000 {
            let before = osc.phase as u64;
            osc.advance();
            assert!(osc.phase <= PHASE_MASK);
            assert_eq!(osc.phase as u64, (before + 0x0FF0_0000) % (1 << 28));
        }
    }

    #[test]
    fn noise_golden_sequence() {
        // One clock per sample: the top phase bits change every step.
        let mut osc = Oscillator { freq: 1 << 23, ..Default::default() };
        assert_eq!(osc.noise.output(), 0xFE);
        let mut bytes = [0u8; 24];
        for byte in bytes.iter_mut() {
            osc.advance();
            *byte = osc.output(VoiceFlags::NOISE, 0);
        }
        assert_eq!(
            bytes,
            [
                0xFE, 0xFC, 0xFC, 0xFC, 0xF8, 0xF8, 0xF8, 0xF8, 0xF0, 0xF0, 0xE0, 0xE0, 0xE0, 0xC0,
                0xC0, 0xC0, 0xC0, 0x81, 0x81, 0x03, 0x03, 0x03, 0x06, 0x06,
            ]
        );
    }

    #[test]
    fn noise_after_many_clocks() {
        let mut noise = Noise::new();
        for _ in 0..1000 {
            noise.clock();
        }
        let mut bytes = [0u8; 8];
        for byte in bytes.iter_mut() {
            noise.clock();
            *byte = noise.output();
        }
        assert_eq!(bytes, [0x5E, 0xBD, 0x9C, 0x3E, 0x39, 0x78, 0x3E, 0xF9]);
        assert!(noise.shift() <= NOISE_MASK);
    }

    #[test]
    fn slow_noise_clocks_every_32nd_of_a_cycle() {
        let mut osc = Oscillator { freq: 1 << 20, ..Default::default() };
        let start = osc.noise.shift();
        for _ in 0..7 {
            osc.advance();
        }
        assert_eq!(osc.noise.shift(), start);
        osc.advance();
        assert_ne!(osc.noise.shift(), start);
    }

    #[test]
    fn combined_pulse_and_triangle() {
        let flags = VoiceFlags::PULSE | VoiceFlags::TRIANGLE;
        let mut osc = Oscillator { pulse_width: 0x400_0000, ..Default::default() };
        for &(phase, expected) in &[
            (0, 0x00),
            (HALF_PHASE, 0xFF),
            (0x600_0000, 0xC0),
            (0xA00_0000, 0xBF),
            (0x200_0000, 0x00),
        ] {
            osc.phase = phase;
            assert_eq!(osc.output(flags, 0), pulse(phase, osc.pulse_width) & triangle(phase));
            assert_eq!(osc.output(flags, 0), expected, "phase {:#x}", phase);
        }
    }

    #[test]
    fn no_waveform_outputs_full_byte() {
        let osc = Oscillator::new();
        assert_eq!(osc.output(VoiceFlags::GATE, 0), 0xFF);
    }

    #[test]
    fn ring_inverts_triangle_in_second_half() {
        let flags = VoiceFlags::TRIANGLE | VoiceFlags::RING;
        let osc = Oscillator { phase: 0x600_0000, ..Default::default() };
        assert_eq!(osc.output(flags, 0), 0xC0);
        assert_eq!(osc.output(flags, HALF_PHASE), 0x3F);
        assert_eq!(osc.output(VoiceFlags::TRIANGLE, HALF_PHASE), 0xC0);
    }

    #[test]
    fn sync_restarts_with_source() {
        let mut osc = Oscillator { phase: 0x123_4567, freq: 2000, ..Default::default() };
        osc.sync_to(500, 1000);
        assert_eq!(osc.phase, 1000);
        osc.phase = 77;
        osc.sync_to(5000, 1000);
        assert_eq!(osc.phase, 77);
    }
}
