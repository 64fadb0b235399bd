//! File formats for the quadsid chiptune tracker.
//!
//! Reads and writes the flat binary song layout, and encodes rendered PCM
//! as WAV.

mod song_format;
mod wav_format;

use thiserror::Error;

pub use song_format::{
    load_song, load_song_file, read_song, save_song, save_song_file, write_song, SONG_BASE_SIZE,
    SONG_META_SIZE,
};
pub use wav_format::{load_wav, samples_to_wav, write_wav, WavData};

/// Result type for format operations.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Errors from reading or writing song and audio files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Truncated or structurally malformed song data.
    #[error("malformed song data: {0}")]
    Parse(#[from] binrw::Error),

    /// A program row carries an unknown operation code.
    #[error("unknown {program} operation {value} in {owner} {index}")]
    InvalidOperation {
        /// Program kind ("wave", "filter", "pitch").
        program: &'static str,
        /// Owning bank ("instrument", "effect").
        owner: &'static str,
        /// 1-based bank number.
        index: usize,
        /// Raw operation value.
        value: u8,
    },

    /// A row or block points past the end of a bank.
    #[error("{kind} reference {value} out of range (1..={max})")]
    InvalidReference {
        /// Referenced bank ("track", "instrument", "effect").
        kind: &'static str,
        value: u8,
        max: usize,
    },

    /// A field holds a value outside its range.
    #[error("invalid value for '{field}': {value}")]
    InvalidValue {
        field: &'static str,
        value: u32,
    },

    /// Missing RIFF/WAVE magic or required chunks.
    #[error("invalid WAV header")]
    InvalidHeader,

    /// WAV data is not 16-bit PCM.
    #[error("unsupported WAV encoding: {0}")]
    UnsupportedWav(&'static str),
}
