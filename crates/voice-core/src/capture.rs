use crate::error::AudioError;
use crate::platform::{AudioInput, AudioPlatform};
use crate::{CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: INPUT_SAMPLE_RATE,
            block_size: CAPTURE_BLOCK_SIZE,
        }
    }
}

/// Cuts a continuous sample stream into blocks of exactly `block_size`.
#[derive(Debug)]
pub struct Framer {
    block_size: usize,
    pending: Vec<f32>,
}

impl Framer {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Buffers `samples` and hands every completed block to `emit`.
    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        while !samples.is_empty() {
            let take = (self.block_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.block_size {
                let block = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                emit(block);
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Microphone stream framed into fixed-size chunks.
pub struct CapturePipeline<I: AudioInput> {
    input: Option<I>,
    config: CaptureConfig,
    running: bool,
}

impl<I: AudioInput> CapturePipeline<I> {
    /// Requests microphone access without starting the stream.
    pub fn acquire<P>(platform: &P, config: CaptureConfig) -> Result<Self, AudioError>
    where
        P: AudioPlatform<Input = I>,
    {
        let input = platform.acquire_input(config.sample_rate)?;
        tracing::debug!(rate = config.sample_rate, block = config.block_size, "microphone acquired");
        Ok(Self {
            input: Some(input),
            config,
            running: false,
        })
    }

    /// Starts the stream. Each full block is passed to `on_chunk` as raw floats.
    pub fn start<F>(&mut self, mut on_chunk: F) -> Result<(), AudioError>
    where
        F: FnMut(Vec<f32>) + Send + 'static,
    {
        let input = self.input.as_mut().ok_or(AudioError::Closed)?;
        let mut framer = Framer::new(self.config.block_size);
        input.start(Box::new(move |samples: &[f32]| {
            framer.push(samples, &mut on_chunk);
        }))?;
        self.running = true;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops the stream and releases the input. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.stop();
            tracing::debug!("capture stopped");
        }
        self.running = false;
    }
}

impl<I: AudioInput> Drop for CapturePipeline<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AudioBuffer;
    use crate::platform::{OutputContext, SampleCallback, UnitEndedCallback};
    use crate::playback::UnitId;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct FakeInput {
        callback: Arc<Mutex<Option<SampleCallback>>>,
        stops: Arc<Mutex<usize>>,
    }

    impl FakeInput {
        fn feed(&self, samples: &[f32]) {
            if let Some(cb) = self.callback.lock().unwrap().as_mut() {
                cb(samples);
            }
        }
    }

    impl AudioInput for FakeInput {
        fn start(&mut self, on_samples: SampleCallback) -> Result<(), AudioError> {
            *self.callback.lock().unwrap() = Some(on_samples);
            Ok(())
        }

        fn stop(&mut self) {
            *self.stops.lock().unwrap() += 1;
            self.callback.lock().unwrap().take();
        }
    }

    struct NoOutput;

    impl OutputContext for NoOutput {
        fn current_time(&self) -> f64 {
            0.0
        }
        fn start_unit(&mut self, _: UnitId, _: AudioBuffer, _: f64) -> Result<(), AudioError> {
            Ok(())
        }
        fn stop_unit(&mut self, _: UnitId) {}
        fn close(&mut self) {}
    }

    struct FakePlatform {
        input: Option<FakeInput>,
    }

    impl AudioPlatform for FakePlatform {
        type Input = FakeInput;
        type Output = NoOutput;

        fn acquire_input(&self, _sample_rate: u32) -> Result<FakeInput, AudioError> {
            self.input.clone().ok_or(AudioError::NoInputDevice)
        }

        fn open_output(&self, _: u32, _: UnitEndedCallback) -> Result<NoOutput, AudioError> {
            Ok(NoOutput)
        }
    }

    #[test]
    fn framer_emits_only_full_blocks() {
        let mut framer = Framer::new(4);
        let mut blocks = Vec::new();

        framer.push(&[1.0, 2.0, 3.0], |b| blocks.push(b));
        assert!(blocks.is_empty());

        framer.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0], |b| blocks.push(b));

        assert_eq!(blocks, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn pipeline_forwards_framed_chunks() {
        let input = FakeInput::default();
        let platform = FakePlatform {
            input: Some(input.clone()),
        };
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = chunks.clone();

        let mut pipeline = CapturePipeline::acquire(
            &platform,
            CaptureConfig {
                sample_rate: 16000,
                block_size: 2,
            },
        )
        .unwrap();
        pipeline.start(move |chunk| sink.lock().unwrap().push(chunk)).unwrap();
        input.feed(&[0.1, 0.2, 0.3]);
        input.feed(&[0.4]);

        assert!(pipeline.is_running());
        assert_eq!(*chunks.lock().unwrap(), vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn missing_microphone_fails_acquire() {
        let platform = FakePlatform { input: None };

        let result = CapturePipeline::acquire(&platform, CaptureConfig::default());

        assert!(matches!(result, Err(AudioError::NoInputDevice)));
    }

    #[test]
    fn stop_is_idempotent_and_runs_on_drop() {
        let input = FakeInput::default();
        let platform = FakePlatform {
            input: Some(input.clone()),
        };

        let mut pipeline = CapturePipeline::acquire(&platform, CaptureConfig::default()).unwrap();
        pipeline.start(|_| {}).unwrap();
        pipeline.stop();
        pipeline.stop();
        drop(pipeline);

        assert_eq!(*input.stops.lock().unwrap(), 1);
        assert!(input.callback.lock().unwrap().is_none());
    }

    #[test]
    fn start_after_stop_is_rejected() {
        let platform = FakePlatform {
            input: Some(FakeInput::default()),
        };
        let mut pipeline = CapturePipeline::acquire(&platform, CaptureConfig::default()).unwrap();
        pipeline.stop();

        assert_eq!(pipeline.start(|_| {}), Err(AudioError::Closed));
    }
}
