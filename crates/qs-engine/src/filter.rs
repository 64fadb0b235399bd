//! Filter program stepper and the multimode filter it drives.
//!
//! There is a single filter shared by all voices. Binding an instrument
//! with a filter program takes it over; the program's routing mask selects
//! which voices pass through it.
//!
//! The audio stage is a Chamberlin state-variable filter: its low, band
//! and high outputs are summed according to the mode bits of the current
//! program row.

use core::f32::consts::PI;

use qs_ir::{FilterMode, FilterOp, Song, CHANNEL_COUNT};

/// Lowest cutoff frequency in Hz.
const MIN_CUTOFF_HZ: f32 = 30.0;

/// Hz added per cutoff step.
const CUTOFF_HZ_STEP: f32 = 47.0;

/// Damping at zero resonance.
const MAX_DAMPING: f32 = 1.0;

/// Damping at full resonance.
const MIN_DAMPING: f32 = 0.15;

/// Left shift applied to the value of a `Set` row.
pub const CUTOFF_SHIFT: u32 = 3;

/// Chamberlin state-variable filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Svf {
    low: f32,
    band: f32,
    /// Frequency coefficient `2 sin(pi fc / sr)`
    f: f32,
    damping: f32,
}

impl Svf {
    /// Recompute coefficients for a cutoff in Hz and resonance 0-15.
    pub fn set_params(&mut self, cutoff_hz: f32, resonance: u8, sample_rate: u32) {
        let nyquist_limit = sample_rate as f32 / 6.0;
        let fc = cutoff_hz.clamp(MIN_CUTOFF_HZ.min(nyquist_limit), nyquist_limit);
        self.f = 2.0 * libm::sinf(PI * fc / sample_rate as f32);
        let r = resonance.min(15) as f32 / 15.0;
        self.damping = MAX_DAMPING - r * (MAX_DAMPING - MIN_DAMPING);
    }

    /// Filter one sample, returning the taps selected by `mode`.
    pub fn process(&mut self, input: f32, mode: FilterMode) -> f32 {
        self.low += self.f * self.band;
        let high = input - self.low - self.damping * self.band;
        self.band += self.f * high;

        let mut out = 0.0;
        if mode.contains(FilterMode::LOW) {
            out += self.low;
        }
        if mode.contains(FilterMode::BAND) {
            out += self.band;
        }
        if mode.contains(FilterMode::HIGH) {
            out += high;
        }
        out
    }

    /// Clear the integrators.
    pub fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
    }
}

/// Control-rate state of the shared filter.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterState {
    /// Instrument whose filter program is bound (0 = none)
    pub instrument: u8,
    /// Next filter row to execute
    pub row: usize,
    /// Voices routed through the filter (bit n = channel n)
    pub routing: u8,
    pub mode: FilterMode,
    /// Resonance (0-15)
    pub resonance: u8,
    /// Cutoff (0-255)
    pub cutoff: u8,
    sample_rate: u32,
    svf: Svf,
}

impl FilterState {
    pub fn new(sample_rate: u32) -> Self {
        let mut state = Self {
            instrument: 0,
            row: 0,
            routing: 0,
            mode: FilterMode::empty(),
            resonance: 0,
            cutoff: 0,
            sample_rate,
            svf: Svf::default(),
        };
        state.update_coefficients();
        state
    }

    pub fn is_bound(&self) -> bool {
        self.instrument != 0
    }

    /// Is `channel` routed through the bound filter?
    pub fn routes(&self, channel: usize) -> bool {
        self.is_bound() && channel < CHANNEL_COUNT && self.routing & (1 << channel) != 0
    }

    /// Take over the filter with an instrument's program and restart it.
    pub fn bind(&mut self, number: u8, routing: u8) {
        self.instrument = number;
        self.routing = routing;
        self.row = 0;
    }

    /// Release the filter; every voice bypasses it again.
    pub fn unbind(&mut self) {
        self.instrument = 0;
        self.row = 0;
        self.svf.reset();
    }

    /// Clear the audio-stage state without touching the program.
    pub fn reset_dsp(&mut self) {
        self.svf.reset();
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.svf.reset();
        self.update_coefficients();
    }

    /// Execute one row of the bound filter program.
    pub fn step(&mut self, song: &Song) {
        let Some(instrument) = song.instrument(self.instrument) else { return };
        let filter = &instrument.filter;
        let Some(index) = filter.program.resolve(self.row) else { return };
        let row = &filter.program.rows()[index];
        self.row = index + 1;

        self.routing = filter.routing;
        self.mode = row.mode;
        self.resonance = row.resonance.min(15);
        self.cutoff = match row.op {
            FilterOp::Set => row.value.min(31) << CUTOFF_SHIFT,
            FilterOp::Increment => self.cutoff.saturating_add(row.value),
            FilterOp::Decrement => self.cutoff.saturating_sub(row.value),
        };
        self.update_coefficients();
    }

    /// Cutoff frequency in Hz before clamping.
    pub fn cutoff_hz(&self) -> f32 {
        MIN_CUTOFF_HZ + self.cutoff as f32 * CUTOFF_HZ_STEP
    }

    /// Filter one sample of the routed voice sum. An empty mode passes
    /// the input through unchanged.
    pub fn process(&mut self, input: i32) -> i32 {
        if self.mode.is_empty() {
            return input;
        }
        self.svf.process(input as f32, self.mode) as i32
    }

    fn update_coefficients(&mut self) {
        let cutoff = self.cutoff_hz();
        self.svf.set_params(cutoff, self.resonance, self.sample_rate);
    }
}
