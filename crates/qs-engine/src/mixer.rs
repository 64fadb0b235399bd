//! Per-sample voice mixing.

use qs_ir::{VoiceFlags, CHANNEL_COUNT};

use crate::channel::ChannelState;
use crate::filter::FilterState;

/// Right shift scaling `(byte - 0x80) * level` to a voice sample.
pub const VOICE_SHIFT: u32 = 18;

/// Index of the voice that syncs and ring-modulates `channel`.
pub const fn modulator_of(channel: usize) -> usize {
    (channel + CHANNEL_COUNT - 1) % CHANNEL_COUNT
}

/// Scale a waveform byte by an envelope level.
pub fn voice_sample(byte: u8, level: i32) -> i32 {
    ((byte as i32 - 0x80) * level) >> VOICE_SHIFT
}

/// Render `out.len()` samples from the channel states.
///
/// Muted channels keep running so they come back in phase, but add
/// nothing to the output.
pub fn mix(channels: &mut [ChannelState; CHANNEL_COUNT], filter: &mut FilterState, out: &mut [i16]) {
    for sample in out.iter_mut() {
        *sample = mix_sample(channels, filter);
    }
}

fn mix_sample(channels: &mut [ChannelState; CHANNEL_COUNT], filter: &mut FilterState) -> i16 {
    let mut sources = [(0u32, 0u32); CHANNEL_COUNT];
    for (chan, source) in channels.iter_mut().zip(sources.iter_mut()) {
        chan.oscillator.advance();
        *source = (chan.oscillator.phase, chan.oscillator.freq);
    }

    let mut direct = 0i32;
    let mut routed = 0i32;
    for (c, chan) in channels.iter_mut().enumerate() {
        let (mod_phase, mod_freq) = sources[modulator_of(c)];
        if chan.flags.contains(VoiceFlags::SYNC) {
            chan.oscillator.sync_to(mod_phase, mod_freq);
        }

        chan.envelope.step(chan.gate_on());
        let byte = chan.oscillator.output(chan.flags, mod_phase);

        if !chan.active {
            continue;
        }
        let voice = voice_sample(byte, chan.envelope.level());
        if filter.routes(c) {
            routed += voice;
        } else {
            direct += voice;
        }
    }

    let filtered = if filter.is_bound() { filter.process(routed) } else { routed };
    direct.saturating_add(filtered).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
