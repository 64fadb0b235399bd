//! Binary song layout.
//!
//! Little-endian, packed in declaration order with no padding:
//! tempo, swing, the track bank, the instrument bank, the effect bank, a
//! 16-bit table length and that many blocks. An optional trailer after the
//! table carries the track length, title and author; files without it load
//! with defaults.

use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};
use qs_ir::{
    Adsr, Block, Effect, Filter, FilterMode, FilterOp, FilterRow, Instrument, Note, PitchOp,
    PitchRow, Program, PulseOp, Row, Song, Track, VoiceFlags, WaveRow, EFFECT_COUNT,
    INSTRUMENT_COUNT, MAX_FILTER_LENGTH, MAX_NAME_LENGTH, MAX_NOTE, MAX_PITCH_LENGTH,
    MAX_SONG_LENGTH, MAX_SWING, MAX_TEMPO, MAX_TRACK_LENGTH, MAX_WAVE_LENGTH, MIN_TEMPO,
    NOTE_OFF, TRACK_COUNT,
};

use crate::{FormatError, Result};

/// Size of a song file with an empty table and no trailer.
pub const SONG_BASE_SIZE: usize = 33220;

/// Size of the metadata trailer.
pub const SONG_META_SIZE: usize = 1 + 2 * MAX_NAME_LENGTH;

#[binrw]
#[derive(Clone, Copy, Debug, Default)]
struct RawRow {
    instrument: u8,
    effect: u8,
    note: u8,
}

#[binrw]
#[derive(Clone, Debug)]
struct RawTrack {
    rows: [RawRow; MAX_TRACK_LENGTH],
}

#[binrw]
#[derive(Clone, Copy, Debug, Default)]
struct RawWaveRow {
    flags: u8,
    op: u8,
    value: u8,
}

#[binrw]
#[derive(Clone, Copy, Debug, Default)]
struct RawFilterRow {
    mode: u8,
    resonance: u8,
    op: u8,
    value: u8,
}

#[binrw]
#[derive(Clone, Debug)]
struct RawFilter {
    routing: u8,
    length: u8,
    loop_point: u8,
    rows: [RawFilterRow; MAX_FILTER_LENGTH],
}

#[binrw]
#[derive(Clone, Debug)]
struct RawInstrument {
    name: [u8; MAX_NAME_LENGTH],
    adsr: [u8; 4],
    hard_restart: u8,
    length: u8,
    loop_point: u8,
    rows: [RawWaveRow; MAX_WAVE_LENGTH],
    filter: RawFilter,
}

#[binrw]
#[derive(Clone, Copy, Debug, Default)]
struct RawPitchRow {
    op: u8,
    value: u8,
}

#[binrw]
#[derive(Clone, Debug)]
struct RawEffect {
    name: [u8; MAX_NAME_LENGTH],
    length: u8,
    loop_point: u8,
    rows: [RawPitchRow; MAX_PITCH_LENGTH],
}

#[binrw]
#[derive(Clone, Debug)]
struct RawMeta {
    track_length: u8,
    title: [u8; MAX_NAME_LENGTH],
    author: [u8; MAX_NAME_LENGTH],
}

#[binrw]
#[brw(little)]
#[derive(Clone, Debug)]
struct RawSong {
    tempo: u8,
    swing: u8,
    #[br(count = TRACK_COUNT)]
    tracks: Vec<RawTrack>,
    #[br(count = INSTRUMENT_COUNT)]
    instruments: Vec<RawInstrument>,
    #[br(count = EFFECT_COUNT)]
    effects: Vec<RawEffect>,
    #[br(temp)]
    #[bw(calc = table.len() as u16)]
    table_length: u16,
    #[br(count = table_length as usize)]
    table: Vec<Block>,
    #[br(try)]
    meta: Option<RawMeta>,
}

/// Parse a song from a reader.
pub fn read_song<R: Read + Seek>(reader: &mut R) -> Result<Song> {
    let raw = RawSong::read(reader)?;
    song_from_raw(raw)
}

/// Parse a song from bytes.
pub fn load_song(data: &[u8]) -> Result<Song> {
    read_song(&mut Cursor::new(data))
}

/// Read and parse a song file.
pub fn load_song_file(path: impl AsRef<Path>) -> Result<Song> {
    let data = fs::read(path)?;
    load_song(&data)
}

/// Serialize a song to a writer, including the metadata trailer.
pub fn write_song<W: Write + Seek>(song: &Song, writer: &mut W) -> Result<()> {
    let raw = song_to_raw(song)?;
    raw.write(writer)?;
    Ok(())
}

/// Serialize a song to bytes.
pub fn save_song(song: &Song) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_song(song, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Serialize a song and write it to a file.
pub fn save_song_file(song: &Song, path: impl AsRef<Path>) -> Result<()> {
    let data = save_song(song)?;
    fs::write(path, data)?;
    Ok(())
}

// --- Reading ---

fn song_from_raw(raw: RawSong) -> Result<Song> {
    let mut song = Song::default();

    if !(MIN_TEMPO..=MAX_TEMPO).contains(&raw.tempo) {
        return Err(FormatError::InvalidValue { field: "tempo", value: raw.tempo as u32 });
    }
    if raw.swing > MAX_SWING {
        return Err(FormatError::InvalidValue { field: "swing", value: raw.swing as u32 });
    }
    song.tempo = raw.tempo;
    song.swing = raw.swing;

    for (track, raw_track) in song.tracks.iter_mut().zip(&raw.tracks) {
        *track = track_from_raw(raw_track)?;
    }
    for (i, (inst, raw_inst)) in song.instruments.iter_mut().zip(&raw.instruments).enumerate() {
        *inst = instrument_from_raw(raw_inst, i + 1)?;
    }
    for (i, (effect, raw_effect)) in song.effects.iter_mut().zip(&raw.effects).enumerate() {
        *effect = effect_from_raw(raw_effect, i + 1)?;
    }

    if raw.table.len() > MAX_SONG_LENGTH {
        return Err(FormatError::InvalidValue { field: "table length", value: raw.table.len() as u32 });
    }
    for block in &raw.table {
        for &track in block {
            check_reference("track", track, TRACK_COUNT)?;
        }
        song.table.push(*block);
    }

    if let Some(meta) = &raw.meta {
        song.set_track_length(meta.track_length);
        song.set_title(&name_from_raw(&meta.title));
        song.set_author(&name_from_raw(&meta.author));
    }

    Ok(song)
}

fn check_reference(kind: &'static str, value: u8, max: usize) -> Result<()> {
    if value as usize > max {
        return Err(FormatError::InvalidReference { kind, value, max });
    }
    Ok(())
}

fn check_length(field: &'static str, length: u8, max: usize) -> Result<usize> {
    if length as usize > max {
        return Err(FormatError::InvalidValue { field, value: length as u32 });
    }
    Ok(length as usize)
}

fn track_from_raw(raw: &RawTrack) -> Result<Track> {
    let mut track = Track::new();
    for (row, raw_row) in track.rows.iter_mut().zip(&raw.rows) {
        check_reference("instrument", raw_row.instrument, INSTRUMENT_COUNT)?;
        check_reference("effect", raw_row.effect, EFFECT_COUNT)?;
        if raw_row.note > MAX_NOTE && raw_row.note != NOTE_OFF {
            return Err(FormatError::InvalidValue { field: "note", value: raw_row.note as u32 });
        }
        *row = Row::new(raw_row.instrument, raw_row.effect, Note::from_raw(raw_row.note));
    }
    Ok(track)
}

fn instrument_from_raw(raw: &RawInstrument, index: usize) -> Result<Instrument> {
    let invalid_op = |program, value| FormatError::InvalidOperation {
        program,
        owner: "instrument",
        index,
        value,
    };

    let mut inst = Instrument::new(&name_from_raw(&raw.name));
    inst.adsr = Adsr::from_array(raw.adsr);
    inst.hard_restart = raw.hard_restart != 0;

    let length = check_length("wave length", raw.length, MAX_WAVE_LENGTH)?;
    let mut wave = Vec::with_capacity(length);
    for row in &raw.rows[..length] {
        let op = PulseOp::from_raw(row.op).ok_or_else(|| invalid_op("wave", row.op))?;
        wave.push(WaveRow::new(VoiceFlags::from_bits_retain(row.flags), op, row.value));
    }
    inst.wave = Program::from_rows(wave, raw.loop_point);

    let filter = &raw.filter;
    let length = check_length("filter length", filter.length, MAX_FILTER_LENGTH)?;
    let mut rows = Vec::with_capacity(length);
    for row in &filter.rows[..length] {
        let op = FilterOp::from_raw(row.op).ok_or_else(|| invalid_op("filter", row.op))?;
        let mode = FilterMode::from_bits_retain(row.mode);
        rows.push(FilterRow::new(mode, row.resonance, op, row.value));
    }
    inst.filter = Filter {
        routing: filter.routing,
        program: Program::from_rows(rows, filter.loop_point),
    };

    Ok(inst)
}

fn effect_from_raw(raw: &RawEffect, index: usize) -> Result<Effect> {
    let mut effect = Effect::new(&name_from_raw(&raw.name));
    let length = check_length("effect length", raw.length, MAX_PITCH_LENGTH)?;
    let mut rows = Vec::with_capacity(length);
    for row in &raw.rows[..length] {
        let op = PitchOp::from_raw(row.op).ok_or_else(|| FormatError::InvalidOperation {
            program: "pitch",
            owner: "effect",
            index,
            value: row.op,
        })?;
        rows.push(PitchRow::new(op, row.value));
    }
    effect.program = Program::from_rows(rows, raw.loop_point);
    Ok(effect)
}

/// Decode a NUL-padded name field.
fn name_from_raw(raw: &[u8; MAX_NAME_LENGTH]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

// --- Writing ---

fn song_to_raw(song: &Song) -> Result<RawSong> {
    if song.tracks.len() != TRACK_COUNT {
        return Err(FormatError::InvalidValue { field: "track count", value: song.tracks.len() as u32 });
    }
    if song.instruments.len() != INSTRUMENT_COUNT {
        return Err(FormatError::InvalidValue {
            field: "instrument count",
            value: song.instruments.len() as u32,
        });
    }
    if song.effects.len() != EFFECT_COUNT {
        return Err(FormatError::InvalidValue { field: "effect count", value: song.effects.len() as u32 });
    }

    Ok(RawSong {
        tempo: song.tempo,
        swing: song.swing,
        tracks: song.tracks.iter().map(track_to_raw).collect(),
        instruments: song.instruments.iter().map(instrument_to_raw).collect(),
        effects: song.effects.iter().map(effect_to_raw).collect(),
        table: song.table.to_vec(),
        meta: Some(RawMeta {
            track_length: song.track_length,
            title: name_to_raw(&song.title),
            author: name_to_raw(&song.author),
        }),
    })
}

fn track_to_raw(track: &Track) -> RawTrack {
    RawTrack {
        rows: track.rows.map(|row| RawRow {
            instrument: row.instrument,
            effect: row.effect,
            note: row.note.to_raw(),
        }),
    }
}

fn instrument_to_raw(inst: &Instrument) -> RawInstrument {
    let mut rows = [RawWaveRow::default(); MAX_WAVE_LENGTH];
    for (raw, row) in rows.iter_mut().zip(inst.wave.rows()) {
        *raw = RawWaveRow { flags: row.flags.bits(), op: row.op.to_raw(), value: row.value };
    }

    let mut filter_rows = [RawFilterRow::default(); MAX_FILTER_LENGTH];
    for (raw, row) in filter_rows.iter_mut().zip(inst.filter.program.rows()) {
        *raw = RawFilterRow {
            mode: row.mode.bits(),
            resonance: row.resonance,
            op: row.op.to_raw(),
            value: row.value,
        };
    }

    RawInstrument {
        name: name_to_raw(&inst.name),
        adsr: inst.adsr.to_array(),
        hard_restart: inst.hard_restart as u8,
        length: inst.wave.len() as u8,
        loop_point: inst.wave.loop_point(),
        rows,
        filter: RawFilter {
            routing: inst.filter.routing,
            length: inst.filter.program.len() as u8,
            loop_point: inst.filter.program.loop_point(),
            rows: filter_rows,
        },
    }
}

fn effect_to_raw(effect: &Effect) -> RawEffect {
    let mut rows = [RawPitchRow::default(); MAX_PITCH_LENGTH];
    for (raw, row) in rows.iter_mut().zip(effect.program.rows()) {
        *raw = RawPitchRow { op: row.op.to_raw(), value: row.value };
    }
    RawEffect {
        name: name_to_raw(&effect.name),
        length: effect.program.len() as u8,
        loop_point: effect.program.loop_point(),
        rows,
    }
}

fn name_to_raw(name: &str) -> [u8; MAX_NAME_LENGTH] {
    let mut raw = [0u8; MAX_NAME_LENGTH];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LENGTH);
    raw[..len].copy_from_slice(&bytes[..len]);
    raw
}
