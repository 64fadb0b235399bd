//! Song analysis: row timing and a summary of what a song uses.

use alloc::collections::BTreeSet;
use core::fmt;

use crate::song::Song;
use crate::track::Note;

/// Sequencer tick rate in Hz.
pub const TICK_RATE: u32 = 50;

/// Number of samples in one tick at the given sample rate.
pub const fn tick_length(sample_rate: u32) -> u32 {
    sample_rate / TICK_RATE
}

/// Ticks spent on `row`: the tempo, plus the swing on even rows.
pub fn ticks_for_row(song: &Song, row: usize) -> u32 {
    let swing = if row % 2 == 0 { song.swing } else { 0 };
    song.tempo as u32 + swing as u32
}

/// Ticks for one full pass through a track.
pub fn ticks_per_pass(song: &Song) -> u32 {
    (0..song.track_length()).map(|row| ticks_for_row(song, row)).sum()
}

/// Ticks for one pass through the whole arrangement table.
pub fn total_ticks(song: &Song) -> u64 {
    ticks_per_pass(song) as u64 * song.table.len() as u64
}

/// Samples rendered for one pass through the arrangement table.
pub fn duration_samples(song: &Song, sample_rate: u32) -> u64 {
    total_ticks(song) * tick_length(sample_rate) as u64
}

/// Summary of the tracks, instruments and effects a song actually uses.
pub struct SongFeatures {
    pub blocks: usize,
    pub tracks_used: BTreeSet<u8>,
    pub instruments_used: BTreeSet<u8>,
    pub effects_used: BTreeSet<u8>,
    pub filtered_instruments: usize,
    pub note_range: Option<(u8, u8)>,
    pub total_notes: usize,
    pub note_offs: usize,
    pub duration_ticks: u64,
}

/// Scan the tracks reachable from the arrangement table.
pub fn analyze(song: &Song) -> SongFeatures {
    let mut features = SongFeatures {
        blocks: song.table.len(),
        tracks_used: song.table.iter().flatten().copied().filter(|&t| t != 0).collect(),
        instruments_used: BTreeSet::new(),
        effects_used: BTreeSet::new(),
        filtered_instruments: 0,
        note_range: None,
        total_notes: 0,
        note_offs: 0,
        duration_ticks: total_ticks(song),
    };

    let length = song.track_length();
    for &number in &features.tracks_used {
        let Some(track) = song.track(number) else { continue };
        for row in &track.rows[..length] {
            match row.note {
                Note::On(n) => {
                    features.total_notes += 1;
                    features.note_range = Some(match features.note_range {
                        Some((lo, hi)) => (lo.min(n), hi.max(n)),
                        None => (n, n),
                    });
                }
                Note::Off => features.note_offs += 1,
                Note::None => {}
            }
            if row.instrument > 0 {
                features.instruments_used.insert(row.instrument);
            }
            if row.effect > 0 {
                features.effects_used.insert(row.effect);
            }
        }
    }

    features.filtered_instruments = features
        .instruments_used
        .iter()
        .filter_map(|&i| song.instrument(i))
        .filter(|inst| !inst.filter.program.is_empty())
        .count();

    features
}

impl fmt::Display for SongFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Blocks:      {}", self.blocks)?;
        writeln!(f, "Tracks:      {} used", self.tracks_used.len())?;
        writeln!(
            f,
            "Instruments: {} used ({} filtered)",
            self.instruments_used.len(),
            self.filtered_instruments
        )?;
        writeln!(f, "Effects:     {} used", self.effects_used.len())?;
        writeln!(f, "Notes:       {} total, {} note-offs", self.total_notes, self.note_offs)?;
        if let Some((lo, hi)) = self.note_range {
            writeln!(f, "Range:       {} - {}", lo, hi)?;
        }
        write!(f, "Length:      {} ticks", self.duration_ticks)
    }
}
