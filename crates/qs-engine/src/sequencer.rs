//! Tick-driven sequencer.
//!
//! Walks the arrangement table block by block and each track row by row,
//! holding every row for `tempo` ticks plus `swing` on even rows. At the
//! start of each row it triggers instruments, effects and notes; on every
//! tick it steps the bound programs.

use qs_ir::{ticks_for_row, Note, Row, Song, CHANNEL_COUNT};

use crate::channel::ChannelState;
use crate::filter::FilterState;

/// Playback position within the song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Index into the arrangement table
    pub block: usize,
    /// Row within the current tracks
    pub row: usize,
    /// Tick within the current row
    pub frame: u32,
}

/// Transport and position state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequencer {
    pub playing: bool,
    /// Repeat the current block instead of advancing through the table
    pub block_loop: bool,
    pub position: Position,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the first row. The block is kept when looping a block.
    pub fn rewind(&mut self) {
        self.position.row = 0;
        self.position.frame = 0;
        if !self.block_loop {
            self.position.block = 0;
        }
    }

    /// Process one tick. Does nothing while paused.
    pub fn tick(
        &mut self,
        song: &Song,
        channels: &mut [ChannelState; CHANNEL_COUNT],
        filter: &mut FilterState,
        sample_rate: u32,
    ) {
        if !self.playing {
            return;
        }

        if self.position.frame == 0 {
            self.start_row(song, channels, filter, sample_rate);
        }

        for chan in channels.iter_mut() {
            chan.step_instrument(song);
            chan.step_effect(song, sample_rate);
        }
        filter.step(song);

        self.advance(song);
    }

    fn start_row(
        &mut self,
        song: &Song,
        channels: &mut [ChannelState; CHANNEL_COUNT],
        filter: &mut FilterState,
        sample_rate: u32,
    ) {
        if self.position.block >= song.table.len() {
            self.position.block = 0;
        }
        let Some(block) = song.block(self.position.block) else { return };

        for (chan, &track_number) in channels.iter_mut().zip(block.iter()) {
            let Some(row) = song.track(track_number).and_then(|t| t.row(self.position.row)) else {
                continue;
            };
            trigger_row(song, row, chan, filter, sample_rate);
        }
    }

    fn advance(&mut self, song: &Song) {
        let pos = &mut self.position;
        pos.frame += 1;
        if pos.frame < ticks_for_row(song, pos.row) {
            return;
        }
        pos.frame = 0;
        pos.row += 1;
        if pos.row < song.track_length() {
            return;
        }
        pos.row = 0;
        if !self.block_loop {
            pos.block += 1;
        }
        if pos.block >= song.table.len() {
            pos.block = 0;
        }
    }
}

/// Apply one track row to a channel: instrument, then effect, then note.
fn trigger_row(
    song: &Song,
    row: &Row,
    chan: &mut ChannelState,
    filter: &mut FilterState,
    sample_rate: u32,
) {
    if let Some(instrument) = song.instrument(row.instrument) {
        chan.bind_instrument(row.instrument, instrument);
        if !instrument.filter.program.is_empty() {
            filter.bind(row.instrument, instrument.filter.routing);
        }
    }

    if song.effect(row.effect).is_some() {
        chan.bind_effect(row.effect);
    }

    match row.note {
        Note::Off => chan.note_off(),
        Note::On(note) => {
            let hard_restart = row.instrument == 0
                && song.instrument(chan.instrument).is_some_and(|inst| inst.hard_restart);
            if hard_restart {
                chan.hard_restart();
            }
            chan.set_note(note, sample_rate);
        }
        Note::None => {}
    }
}
