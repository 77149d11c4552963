//! Raw PCM to WAV container wrapping.
//!
//! The generative speech endpoint returns bare 16-bit little-endian mono
//! samples. The playback backend only accepts container formats, so the
//! samples get a minimal 44-byte RIFF/WAVE header.

use base64::Engine as _;
use byteorder::{LittleEndian, WriteBytesExt};

/// Length of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Sample rate assumed when the MIME type carries no `rate=` parameter.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Highest rate accepted from a MIME type or written into a header.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Decode little-endian 16-bit PCM bytes. An odd trailing byte is dropped.
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Wrap mono 16-bit samples in a RIFF/WAVE container. The rate is
/// clamped to `1..=MAX_SAMPLE_RATE`.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let sample_rate = sample_rate.clamp(1, MAX_SAMPLE_RATE);
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = u32::try_from(samples.len() * 2).unwrap_or(u32::MAX - 36);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    // Writes into a Vec cannot fail.
    let _ = write_header(&mut out, sample_rate, byte_rate, block_align, data_len);
    for sample in samples {
        let _ = out.write_i16::<LittleEndian>(*sample);
    }
    out
}

fn write_header(
    out: &mut Vec<u8>,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    data_len: u32,
) -> std::io::Result<()> {
    out.extend_from_slice(b"RIFF");
    out.write_u32::<LittleEndian>(36 + data_len)?;
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.write_u32::<LittleEndian>(16)?;
    out.write_u16::<LittleEndian>(1)?; // PCM
    out.write_u16::<LittleEndian>(CHANNELS)?;
    out.write_u32::<LittleEndian>(sample_rate)?;
    out.write_u32::<LittleEndian>(byte_rate)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

    out.extend_from_slice(b"data");
    out.write_u32::<LittleEndian>(data_len)?;
    Ok(())
}

/// Decode a standard-alphabet base64 payload.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(payload.trim())
}

/// Extract the `rate=<n>` parameter of a MIME type such as
/// `audio/L16;codec=pcm;rate=24000`. Zero or anything above
/// `MAX_SAMPLE_RATE` counts as absent.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|rate| (1..=MAX_SAMPLE_RATE).contains(rate))
}

/// Whether a MIME type describes bare PCM samples rather than a container.
pub fn is_raw_pcm_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "audio/l16" || essence == "audio/pcm" || mime.to_ascii_lowercase().contains("codec=pcm")
}
