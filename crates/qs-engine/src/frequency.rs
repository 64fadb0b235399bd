//! Pitch-to-increment conversion for the phase accumulators.
//!
//! Oscillators run a 28-bit fixed-point phase; the increment added per
//! output sample sets the pitch. Tuning is equal-tempered with note 58
//! at 440 Hz.

/// Width of the oscillator phase accumulator in bits.
pub const PHASE_BITS: u32 = 28;

/// Mask keeping a phase value within `[0, 2^28)`.
pub const PHASE_MASK: u32 = (1 << PHASE_BITS) - 1;

/// The note number tuned to `REFERENCE_HZ`.
pub const REFERENCE_NOTE: f64 = 58.0;

/// Reference pitch in Hz.
pub const REFERENCE_HZ: f64 = 440.0;

/// Convert a pitch in (possibly fractional) semitones to a phase increment.
///
/// `freq = 2^((pitch - 58) / 12) * 2^28 * 440 / sample_rate`, truncated.
/// Results above the phase range saturate to `PHASE_MASK`.
pub fn pitch_to_increment(pitch: f32, sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        return 0;
    }
    let ratio = libm::exp2((pitch as f64 - REFERENCE_NOTE) / 12.0);
    let increment = ratio * (1u64 << PHASE_BITS) as f64 * REFERENCE_HZ / sample_rate as f64;
    if increment >= PHASE_MASK as f64 {
        PHASE_MASK
    } else if increment > 0.0 {
        increment as u32
    } else {
        0
    }
}

/// Phase increment for a whole note number.
pub fn note_to_increment(note: u8, sample_rate: u32) -> u32 {
    pitch_to_increment(note as f32, sample_rate)
}

/// Frequency in Hz that a phase increment produces.
pub fn increment_to_hz(increment: u32, sample_rate: u32) -> f64 {
    increment as f64 * sample_rate as f64 / (1u64 << PHASE_BITS) as f64
}
