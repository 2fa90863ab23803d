//! WAV file I/O for the file source and offline renders.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::frame::Frame;

/// Read a WAV file as stereo frames. Mono files are duplicated to both
/// channels; channels past the second are ignored.
pub fn read_frames(path: &Path) -> Result<Vec<Frame>, hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    Ok(samples
        .chunks(channels)
        .map(|chunk| match *chunk {
            [mono] => Frame::mono(mono),
            [left, right, ..] => Frame::new(left, right),
            [] => Frame::SILENCE,
        })
        .collect())
}

/// Write interleaved stereo samples as a 32-bit float WAV file.
pub fn write_interleaved(
    path: &Path,
    sample_rate: u32,
    samples: &[f32],
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}
