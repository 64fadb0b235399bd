//! WAV encoding and decoding for 16-bit PCM audio.

use std::io::Write;

use crate::{FormatError, Result};

const BITS_PER_SAMPLE: u16 = 16;

/// Decoded 16-bit PCM audio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavData {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<i16>,
}

// --- Writing ---

/// Write mono 16-bit PCM as a WAV stream.
pub fn write_wav(w: &mut impl Write, samples: &[i16], sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 1;
    let block_align = num_channels * (BITS_PER_SAMPLE / 8);
    let data_size = samples.len() as u32 * block_align as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align)?;
    write_data_chunk(w, samples, data_size)
}

/// Encode mono 16-bit PCM as WAV bytes.
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + samples.len() * 2);
    write_wav(&mut buf, samples, sample_rate).expect("Vec<u8> write cannot fail");
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())
}

fn write_data_chunk(w: &mut impl Write, samples: &[i16], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for sample in samples {
        w.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

// --- Reading ---

/// Decode a 16-bit PCM WAV file.
pub fn load_wav(data: &[u8]) -> Result<WavData> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut pcm: Option<&[u8]> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;
        let body = pos + 8;

        if chunk_id == b"fmt " && chunk_size >= 16 && body + 16 <= data.len() {
            if read_u16_le(data, body) != 1 {
                return Err(FormatError::UnsupportedWav("not PCM"));
            }
            let channels = read_u16_le(data, body + 2);
            let rate = read_u32_le(data, body + 4);
            let bits = read_u16_le(data, body + 14);
            fmt = Some((channels, rate, bits));
        } else if chunk_id == b"data" {
            let end = (body + chunk_size).min(data.len());
            pcm = Some(&data[body..end]);
        }

        pos = body + chunk_size;
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (channels, sample_rate, bits) = fmt.ok_or(FormatError::InvalidHeader)?;
    let pcm = pcm.ok_or(FormatError::InvalidHeader)?;
    if bits != BITS_PER_SAMPLE {
        return Err(FormatError::UnsupportedWav("not 16-bit"));
    }
    if channels == 0 {
        return Err(FormatError::UnsupportedWav("no channels"));
    }

    let samples = pcm.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();
    Ok(WavData { sample_rate, channels, samples })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
