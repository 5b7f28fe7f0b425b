//! `cpal` implementation of the audio platform.
//!
//! `cpal::Stream` cannot leave the thread that built it, so every stream lives
//! on its own thread. The handles returned here only hold the shared state and
//! a control channel; dropping the sender ends the thread and the stream.

use crate::audio::{downmix_to_mono, StreamResampler};
use crate::device;
use crate::mixer::{DeviceUnit, Mixer};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use voice_core::codec::AudioBuffer;
use voice_core::platform::{
    AudioInput, AudioPlatform, OutputContext, SampleCallback, UnitEndedCallback,
};
use voice_core::playback::UnitId;
use voice_core::AudioError;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

type SharedCallback = Arc<Mutex<Option<SampleCallback>>>;

/// Audio devices picked by name, or the host defaults.
#[derive(Debug, Clone, Default)]
pub struct CpalPlatform {
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalPlatform {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }
}

impl AudioPlatform for CpalPlatform {
    type Input = CpalInput;
    type Output = CpalOutput;

    fn acquire_input(&self, sample_rate: u32) -> Result<CpalInput, AudioError> {
        CpalInput::open(self.input_device.clone(), sample_rate)
    }

    fn open_output(
        &self,
        _sample_rate: u32,
        on_ended: UnitEndedCallback,
    ) -> Result<CpalOutput, AudioError> {
        // Units carry their own rate; the mixer converts to the device rate.
        CpalOutput::open(self.output_device.clone(), on_ended)
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::PermissionDenied("audio device not available".to_string())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            AudioError::UnsupportedConfig(err.to_string())
        }
        other => AudioError::Stream(other.to_string()),
    }
}

/// Runs `setup` on a dedicated thread and keeps whatever it returns alive
/// until the returned sender is dropped.
fn spawn_stream_thread<T, F>(
    name: &str,
    setup: F,
) -> Result<(T, mpsc::Sender<()>, JoinHandle<()>), AudioError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<(cpal::Stream, T), AudioError> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);
    let (control_tx, control_rx) = mpsc::channel::<()>();

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let (stream, value) = match setup() {
                Ok(parts) => parts,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                return;
            }
            if ready_tx.send(Ok(value)).is_err() {
                return;
            }
            // Blocks until the owning handle drops its sender.
            let _ = control_rx.recv();
            drop(stream);
        })
        .map_err(|e| AudioError::Stream(format!("failed to spawn audio thread: {}", e)))?;

    match ready_rx.recv() {
        Ok(Ok(value)) => Ok((value, control_tx, handle)),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(AudioError::Stream("audio thread exited during setup".to_string())),
    }
}

/// Microphone stream delivering mono samples at the requested rate.
///
/// The device stream runs from acquisition on; samples are discarded until
/// [`AudioInput::start`] installs a callback.
pub struct CpalInput {
    callback: SharedCallback,
    control: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalInput {
    pub fn open(device_name: Option<String>, target_rate: u32) -> Result<Self, AudioError> {
        let callback: SharedCallback = Arc::new(Mutex::new(None));
        let shared = callback.clone();

        let ((), control, thread) = spawn_stream_thread("voice-input", move || {
            let input = device::get_or_default_input(device_name.as_deref())?;
            tracing::info!("Using input device: {:?}", input.name().unwrap_or_default());

            let supported = input
                .default_input_config()
                .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;
            let sample_format = supported.sample_format();
            let config: StreamConfig = supported.into();
            tracing::info!("Input stream config: {:?} ({:?})", &config, sample_format);

            let stream = match sample_format {
                SampleFormat::F32 => build_input::<f32>(&input, &config, target_rate, shared)?,
                SampleFormat::I16 => build_input::<i16>(&input, &config, target_rate, shared)?,
                SampleFormat::U16 => build_input::<u16>(&input, &config, target_rate, shared)?,
                other => {
                    return Err(AudioError::UnsupportedConfig(format!(
                        "input sample format {:?}",
                        other
                    )))
                }
            };
            Ok((stream, ()))
        })?;

        Ok(Self {
            callback,
            control: Some(control),
            thread: Some(thread),
        })
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    target_rate: u32,
    callback: SharedCallback,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let mut resampler = StreamResampler::new(config.sample_rate.0, target_rate, RESAMPLER_CHUNK_SIZE)
        .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;

    let data_fn = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample_(s)).collect();
        let mono = downmix_to_mono(&samples, channels);
        let resampled = resampler.process(&mono);
        if resampled.is_empty() {
            return;
        }
        if let Ok(mut slot) = callback.lock() {
            if let Some(on_samples) = slot.as_mut() {
                on_samples(&resampled);
            }
        }
    };

    device
        .build_input_stream(
            config,
            data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )
        .map_err(map_build_error)
}

impl AudioInput for CpalInput {
    fn start(&mut self, on_samples: SampleCallback) -> Result<(), AudioError> {
        if self.control.is_none() {
            return Err(AudioError::Closed);
        }
        let mut slot = self
            .callback
            .lock()
            .map_err(|_| AudioError::Stream("input callback lock poisoned".to_string()))?;
        *slot = Some(on_samples);
        Ok(())
    }

    fn stop(&mut self) {
        if let Ok(mut slot) = self.callback.lock() {
            slot.take();
        }
        self.control.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("input stream thread panicked");
            }
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Output device driven by a [`Mixer`]; its clock is the mixer clock.
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    device_rate: u32,
    control: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open(device_name: Option<String>, on_ended: UnitEndedCallback) -> Result<Self, AudioError> {
        let ((mixer, device_rate), control, thread) = spawn_stream_thread("voice-output", move || {
            let output = device::get_or_default_output(device_name.as_deref())?;
            tracing::info!("Using output device: {:?}", output.name().unwrap_or_default());

            let supported = output
                .default_output_config()
                .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;
            let sample_format = supported.sample_format();
            let config: StreamConfig = supported.into();
            tracing::info!("Output stream config: {:?} ({:?})", &config, sample_format);

            let device_rate = config.sample_rate.0;
            let mixer = Arc::new(Mutex::new(Mixer::new(device_rate)));
            let shared = mixer.clone();
            let stream = match sample_format {
                SampleFormat::F32 => build_output::<f32>(&output, &config, shared, on_ended)?,
                SampleFormat::I16 => build_output::<i16>(&output, &config, shared, on_ended)?,
                SampleFormat::U16 => build_output::<u16>(&output, &config, shared, on_ended)?,
                other => {
                    return Err(AudioError::UnsupportedConfig(format!(
                        "output sample format {:?}",
                        other
                    )))
                }
            };
            Ok((stream, (mixer, device_rate)))
        })?;

        Ok(Self {
            mixer,
            device_rate,
            control: Some(control),
            thread: Some(thread),
        })
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    on_ended: UnitEndedCallback,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let data_fn = move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        scratch.resize(data.len(), 0.0);
        let finished = match mixer.lock() {
            Ok(mut mixer) => mixer.render(&mut scratch, channels),
            Err(_) => {
                scratch.fill(0.0);
                Vec::new()
            }
        };
        for (out, &value) in data.iter_mut().zip(scratch.iter()) {
            *out = T::from_sample_(value);
        }
        for unit in finished {
            on_ended(unit);
        }
    };

    device
        .build_output_stream(
            config,
            data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )
        .map_err(map_build_error)
}

impl OutputContext for CpalOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().map(|mixer| mixer.now()).unwrap_or(0.0)
    }

    fn start_unit(&mut self, id: UnitId, buffer: AudioBuffer, start_at: f64) -> Result<(), AudioError> {
        if self.control.is_none() {
            return Err(AudioError::Closed);
        }
        // Convert before taking the lock the device callback also needs.
        let unit = DeviceUnit::convert(&buffer, self.device_rate)
            .map_err(|e| AudioError::Stream(format!("failed to resample playback unit: {}", e)))?;
        let mut mixer = self
            .mixer
            .lock()
            .map_err(|_| AudioError::Stream("mixer lock poisoned".to_string()))?;
        mixer.schedule(id, unit, start_at);
        Ok(())
    }

    fn stop_unit(&mut self, id: UnitId) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.cancel(id);
        }
    }

    fn close(&mut self) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.clear();
        }
        self.control.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("output stream thread panicked");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}
