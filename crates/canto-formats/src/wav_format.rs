//! WAV encoding and decoding via `hound`.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use canto_ir::Waveform;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::FormatError;

// --- Writing ---

/// Write a waveform as 16-bit PCM mono.
pub fn write_wav<W: Write + Seek>(w: W, waveform: &Waveform) -> Result<(), FormatError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(w, spec)?;
    for &s in waveform.samples() {
        writer.write_sample(to_i16(s))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write a waveform to a file, replacing it if present.
pub fn write_wav_file(path: &Path, waveform: &Waveform) -> Result<(), FormatError> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_wav(file, waveform)
}

/// Encode a waveform into an in-memory WAV file.
pub fn waveform_to_wav(waveform: &Waveform) -> Result<Vec<u8>, FormatError> {
    let mut buf = Cursor::new(Vec::new());
    write_wav(&mut buf, waveform)?;
    Ok(buf.into_inner())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

// --- Reading ---

/// Decode a WAV stream into a mono waveform.
///
/// Integer formats of 8 to 32 bits and 32-bit float are accepted.
/// Multi-channel audio is downmixed by averaging.
pub fn load_wav<R: Read>(r: R) -> Result<Waveform, FormatError> {
    let reader = WavReader::new(r)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Waveform::new(
        downmix(interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Decode a WAV file from disk.
pub fn load_wav_file(path: &Path) -> Result<Waveform, FormatError> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    load_wav(file)
}

fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
