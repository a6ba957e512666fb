//! Minimal WAV containerization: a fixed 44-byte RIFF/PCM header in front
//! of raw little-endian samples. No compression, no extensible chunks.

/// Size of the RIFF + fmt + data header preceding the PCM payload.
pub const WAV_HEADER_LEN: usize = 44;

/// Parsed view of a clip header, used for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub payload_len: u32,
}

/// Wrap a raw PCM payload in a WAV container.
///
/// Pure and infallible: invalid parameters (zero channels, zero rate) are
/// a programming error and panic in debug builds via the assertions below.
pub fn encode_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    debug_assert!(channels > 0, "WAV requires at least one channel");
    debug_assert!(sample_rate > 0, "WAV requires a positive sample rate");
    debug_assert!(bits_per_sample % 8 == 0, "bits per sample must be whole bytes");

    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
    let block_align = channels * bits_per_sample / 8;
    let payload_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF chunk
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + payload_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt sub-chunk (PCM, 16 bytes)
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data sub-chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(pcm);

    out
}

/// Convert mono i16 samples to the little-endian byte layout the container
/// expects.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Decode the header of a clip produced by [`encode_wav`]. Returns `None`
/// when the bytes are not a plain PCM WAV of the exact layout we write.
pub fn decode_header(bytes: &[u8]) -> Option<WavHeader> {
    if bytes.len() < WAV_HEADER_LEN {
        return None;
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" || &bytes[12..16] != b"fmt " {
        return None;
    }
    if &bytes[36..40] != b"data" {
        return None;
    }

    let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);
    let u32_at = |off: usize| {
        u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
    };

    if u32_at(16) != 16 || u16_at(20) != 1 {
        return None; // not plain PCM
    }

    Some(WavHeader {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bits_per_sample: u16_at(34),
        payload_len: u32_at(40),
    })
}
