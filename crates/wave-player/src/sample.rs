//! Native sample codings and conversion to interleaved `f32`.
//!
//! The coding is derived deterministically from `(format, bits per
//! sample)`; combinations outside the table are rejected during device
//! negotiation. Conversion expands raw little-endian sample bytes into
//! the `f32` frames carried by the output ring.

use crate::error::PlayerError;
use crate::wave::{StreamInfo, WaveFormat};

/// How one sample is stored in the data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCoding {
    U8,
    S16,
    S24,
    S32,
    F32,
    F64,
    ALaw,
    MuLaw,
}

impl SampleCoding {
    /// Resolve the coding for a decoded stream.
    pub fn for_stream(info: &StreamInfo) -> Result<Self, PlayerError> {
        let coding = match (info.format, info.bits_per_sample) {
            (WaveFormat::Pcm, 8) => SampleCoding::U8,
            (WaveFormat::Pcm, 16) => SampleCoding::S16,
            (WaveFormat::Pcm, 24) => SampleCoding::S24,
            (WaveFormat::Pcm, 32) => SampleCoding::S32,
            (WaveFormat::IeeeFloat, 32) => SampleCoding::F32,
            (WaveFormat::IeeeFloat, 64) => SampleCoding::F64,
            (WaveFormat::ALaw, 8) => SampleCoding::ALaw,
            (WaveFormat::MuLaw, 8) => SampleCoding::MuLaw,
            (format, bits) => {
                return Err(PlayerError::UnsupportedBitsPerSample { format, bits });
            }
        };
        Ok(coding)
    }

    /// Storage size of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleCoding::U8 | SampleCoding::ALaw | SampleCoding::MuLaw => 1,
            SampleCoding::S16 => 2,
            SampleCoding::S24 => 3,
            SampleCoding::S32 | SampleCoding::F32 => 4,
            SampleCoding::F64 => 8,
        }
    }

    /// Expand `bytes` (a whole number of samples) into `out` as `f32`.
    pub fn decode_into(self, bytes: &[u8], out: &mut Vec<f32>) {
        let width = self.bytes_per_sample();
        out.reserve(bytes.len() / width);
        for sample in bytes.chunks_exact(width) {
            out.push(self.decode_one(sample));
        }
    }

    fn decode_one(self, b: &[u8]) -> f32 {
        match self {
            SampleCoding::U8 => (b[0] as f32 - 128.0) / 128.0,
            SampleCoding::S16 => i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0,
            SampleCoding::S24 => {
                let wide = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                wide as f32 / 8_388_608.0
            }
            SampleCoding::S32 => {
                i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0
            }
            SampleCoding::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            SampleCoding::F64 => {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
            }
            SampleCoding::ALaw => alaw_to_linear(b[0]) as f32 / 32_768.0,
            SampleCoding::MuLaw => mulaw_to_linear(b[0]) as f32 / 32_768.0,
        }
    }
}

/// G.711 A-law expansion.
fn alaw_to_linear(value: u8) -> i16 {
    let value = value ^ 0x55;
    let mut t = ((value & 0x0F) as i32) << 4;
    let segment = (value & 0x70) >> 4;
    match segment {
        0 => t += 8,
        1 => t += 0x108,
        _ => t = (t + 0x108) << (segment - 1),
    }
    if value & 0x80 != 0 { t as i16 } else { -t as i16 }
}

/// G.711 mu-law expansion.
fn mulaw_to_linear(value: u8) -> i16 {
    let value = !value;
    let mut t = (((value & 0x0F) as i32) << 3) + 0x84;
    t <<= (value & 0x70) >> 4;
    if value & 0x80 != 0 {
        (0x84 - t) as i16
    } else {
        (t - 0x84) as i16
    }
}
