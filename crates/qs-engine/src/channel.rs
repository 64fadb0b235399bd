//! Per-voice runtime state and the instrument and effect program steppers.

use qs_ir::{Instrument, PulseOp, Song, VoiceFlags};

use crate::envelope::Envelope;
use crate::frequency::{note_to_increment, pitch_to_increment, PHASE_MASK};
use crate::oscillator::Oscillator;

/// Pulse-width step applied per unit of an `Increment` row.
pub const PULSE_WIDTH_STEP: u32 = 0x8_0000;

/// Left shift applied to the value of a `Set` row.
pub const PULSE_WIDTH_SHIFT: u32 = 23;

/// Runtime state for a single voice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelState {
    /// Included in the mix (mute switch)
    pub active: bool,
    /// Current note (1-96)
    pub note: u8,
    /// Note gate, ANDed with the GATE flag of the current wave row
    pub gate: bool,
    /// Voice flags from the current wave row
    pub flags: VoiceFlags,
    /// Bound instrument number (0 = none)
    pub instrument: u8,
    /// Next wave row to execute
    pub instrument_row: usize,
    /// Bound effect number (0 = none)
    pub effect: u8,
    /// Next pitch row to execute
    pub effect_row: usize,
    pub envelope: Envelope,
    pub oscillator: Oscillator,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    /// Create a new channel state.
    pub fn new() -> Self {
        Self {
            active: true,
            note: 0,
            gate: false,
            flags: VoiceFlags::empty(),
            instrument: 0,
            instrument_row: 0,
            effect: 0,
            effect_row: 0,
            envelope: Envelope::new(),
            oscillator: Oscillator::new(),
        }
    }

    /// Effective gate seen by the envelope.
    pub fn gate_on(&self) -> bool {
        self.gate && self.flags.contains(VoiceFlags::GATE)
    }

    /// Bind an instrument and retrigger: load envelope rates, restart the
    /// wave program, open the gate and force the envelope into release so
    /// the next sample re-enters attack.
    pub fn bind_instrument(&mut self, number: u8, instrument: &Instrument) {
        self.instrument = number;
        self.envelope.set_adsr(instrument.adsr);
        self.instrument_row = 0;
        self.gate = true;
        self.envelope.retrigger();
    }

    /// Bind an effect and restart its program.
    pub fn bind_effect(&mut self, number: u8) {
        self.effect = number;
        self.effect_row = 0;
    }

    /// Set the note and its base frequency.
    pub fn set_note(&mut self, note: u8, sample_rate: u32) {
        self.note = note;
        self.oscillator.freq = note_to_increment(note, sample_rate);
    }

    /// Restart the envelope from silence with the gate open.
    pub fn hard_restart(&mut self) {
        self.envelope.silence();
        self.gate = true;
    }

    pub fn note_off(&mut self) {
        self.gate = false;
    }

    /// Close the gate and drop the envelope to zero.
    pub fn silence(&mut self) {
        self.gate = false;
        self.envelope.silence();
    }

    /// Execute one row of the bound instrument's wave program.
    pub fn step_instrument(&mut self, song: &Song) {
        let Some(instrument) = song.instrument(self.instrument) else { return };
        let Some(index) = instrument.wave.resolve(self.instrument_row) else { return };
        let row = &instrument.wave.rows()[index];
        self.instrument_row = index + 1;

        self.flags = row.flags;
        let osc = &mut self.oscillator;
        osc.pulse_width = match row.op {
            PulseOp::Set => (row.value as u32) << PULSE_WIDTH_SHIFT,
            PulseOp::Increment => osc.pulse_width.wrapping_add(row.value as u32 * PULSE_WIDTH_STEP),
        } & PHASE_MASK;
    }

    /// Execute one row of the bound effect's pitch program.
    pub fn step_effect(&mut self, song: &Song, sample_rate: u32) {
        let Some(effect) = song.effect(self.effect) else { return };
        let Some(index) = effect.program.resolve(self.effect_row) else { return };
        let row = &effect.program.rows()[index];
        self.effect_row = index + 1;

        self.oscillator.freq = pitch_to_increment(row.pitch(self.note), sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qs_ir::{Adsr, Effect, PitchRow, Program, WaveRow};

    const SAMPLE_RATE: u32 = 44100;

    fn song_with(instrument: Instrument, effect: Effect) -> Song {
        let mut song = Song::new("channel");
        song.instruments[0] = instrument;
        song.effects[0] = effect;
        song
    }

    fn pulse_instrument() -> Instrument {
        let mut inst = Instrument::new("pulse");
        inst.adsr = Adsr::new(0, 0, 15, 0);
        inst.wave = Program::from_rows(
            [
                WaveRow::new(VoiceFlags::PULSE | VoiceFlags::GATE, PulseOp::Set, 16),
                WaveRow::new(VoiceFlags::PULSE | VoiceFlags::GATE, PulseOp::Increment, 4),
                WaveRow::new(VoiceFlags::TRIANGLE, PulseOp::Increment, 31),
            ],
            1,
        );
        inst
    }

    #[test]
    fn wave_program_sets_flags_and_pulse_width() {
        let song = song_with(pulse_instrument(), Effect::default());
        let mut chan = ChannelState::new();
        chan.bind_instrument(1, song.instrument(1).unwrap());
        assert!(chan.gate);

        chan.step_instrument(&song);
        assert_eq!(chan.flags, VoiceFlags::PULSE | VoiceFlags::GATE);
        assert_eq!(chan.oscillator.pulse_width, 0x800_0000);
        assert!(chan.gate_on());

        chan.step_instrument(&song);
        assert_eq!(chan.oscillator.pulse_width, 0x800_0000 + 4 * PULSE_WIDTH_STEP);

        chan.step_instrument(&song);
        assert_eq!(chan.flags, VoiceFlags::TRIANGLE);
        assert!(!chan.gate_on());

        // Past the end: resumes at the loop row.
        chan.step_instrument(&song);
        assert_eq!(chan.flags, VoiceFlags::PULSE | VoiceFlags::GATE);
        assert_eq!(chan.instrument_row, 2);
    }

    #[test]
    fn pulse_width_increment_wraps_at_28_bits() {
        let mut inst = Instrument::new("sweep");
        inst.wave = Program::from_rows(
            [
                WaveRow::new(VoiceFlags::PULSE, PulseOp::Set, 31),
                WaveRow::new(VoiceFlags::PULSE, PulseOp::Increment, 31),
            ],
            1,
        );
        let song = song_with(inst, Effect::default());
        let mut chan = ChannelState::new();
        chan.bind_instrument(1, song.instrument(1).unwrap());
        for _ in 0..100 {
            chan.step_instrument(&song);
            assert!(chan.oscillator.pulse_width <= PHASE_MASK);
        }
    }

    #[test]
    fn unbound_or_empty_programs_do_nothing() {
        let song = song_with(Instrument::new("empty"), Effect::default());
        let mut chan = ChannelState::new();
        chan.step_instrument(&song);
        chan.bind_instrument(1, song.instrument(1).unwrap());
        chan.step_instrument(&song);
        assert_eq!(chan.flags, VoiceFlags::empty());
        assert_eq!(chan.instrument_row, 0);

        chan.set_note(58, SAMPLE_RATE);
        chan.bind_effect(1);
        chan.step_effect(&song, SAMPLE_RATE);
        assert_eq!(chan.oscillator.freq, note_to_increment(58, SAMPLE_RATE));
    }

    #[test]
    fn effect_program_bends_pitch_without_touching_note() {
        let mut effect = Effect::new("arp");
        effect.program = Program::from_rows(
            [PitchRow::relative(0), PitchRow::relative(48), PitchRow::absolute(46)],
            0,
        );
        let song = song_with(Instrument::default(), effect);
        let mut chan = ChannelState::new();
        chan.set_note(58, SAMPLE_RATE);
        chan.bind_effect(1);

        chan.step_effect(&song, SAMPLE_RATE);
        assert_eq!(chan.oscillator.freq, note_to_increment(58, SAMPLE_RATE));
        chan.step_effect(&song, SAMPLE_RATE);
        assert_eq!(chan.oscillator.freq, note_to_increment(70, SAMPLE_RATE));
        chan.step_effect(&song, SAMPLE_RATE);
        assert_eq!(chan.oscillator.freq, note_to_increment(46, SAMPLE_RATE));
        chan.step_effect(&song, SAMPLE_RATE);
        assert_eq!(chan.oscillator.freq, note_to_increment(58, SAMPLE_RATE));
        assert_eq!(chan.note, 58);
    }

    #[test]
    fn silence_closes_gate_and_zeroes_level() {
        let song = song_with(pulse_instrument(), Effect::default());
        let mut chan = ChannelState::new();
        chan.bind_instrument(1, song.instrument(1).unwrap());
        chan.step_instrument(&song);
        for _ in 0..500 {
            chan.envelope.step(chan.gate_on());
        }
        assert!(chan.envelope.level() > 0);
        chan.silence();
        assert!(!chan.gate);
        assert_eq!(chan.envelope.level(), 0);
    }
}
