use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Largest block handed to the resampler when converting a whole buffer.
const BUFFER_CHUNK_SIZE: usize = 1024;

/// Converts one complete mono buffer between rates with `rubato`.
///
/// The result is trimmed of the resampler delay and holds exactly
/// `round(len * to_rate / from_rate)` samples.
pub fn resample_buffer(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    anyhow::ensure!(from_rate > 0 && to_rate > 0, "sample rates must be non-zero");

    let expected = resampled_len(samples.len(), from_rate, to_rate);
    let chunk_size = samples.len().min(BUFFER_CHUNK_SIZE);
    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, chunk_size)?;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected);

    let mut blocks = samples.chunks_exact(chunk_size);
    for block in &mut blocks {
        output.extend(first_channel(resampler.process(&[block], None)?));
    }
    let rest = blocks.remainder();
    if !rest.is_empty() {
        output.extend(first_channel(resampler.process_partial(Some(&[rest][..]), None)?));
    }
    while output.len() < delay + expected {
        let flushed = first_channel(resampler.process_partial(None::<&[&[f32]]>, None)?);
        if flushed.is_empty() {
            break;
        }
        output.extend(flushed);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

/// Number of samples `len` input samples occupy at `to_rate`.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return len;
    }
    (len as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

fn first_channel(frames: Vec<Vec<f32>>) -> Vec<f32> {
    frames.into_iter().next().unwrap_or_default()
}

/// Feeds arbitrarily sized blocks through a fixed-chunk resampler.
///
/// Samples that do not fill a whole resampler chunk are kept until the next
/// call. With equal rates the input is passed through untouched.
pub struct StreamResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32, chunk_size: usize) -> anyhow::Result<Self> {
        let resampler = if in_rate == out_rate {
            None
        } else {
            Some(create_resampler(in_rate as f64, out_rate as f64, chunk_size)?)
        };
        Ok(Self {
            resampler,
            pending: Vec::new(),
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);
        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            match resampler.process(&[&self.pending[..needed]], None) {
                Ok(frames) => {
                    if let Some(channel) = frames.into_iter().next() {
                        output.extend(channel);
                    }
                }
                Err(e) => tracing::warn!("Failed to resample audio block: {}", e),
            }
            self.pending.drain(..needed);
        }
        output
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
