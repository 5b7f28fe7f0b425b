//! Device-side contract the capture pipeline and the playback scheduler run on.

use crate::codec::AudioBuffer;
use crate::error::AudioError;
use crate::playback::UnitId;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// Receives mono float samples at the acquired rate, in arbitrary block sizes.
pub type SampleCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Invoked from the output side once a unit has played to the end.
pub type UnitEndedCallback = Arc<dyn Fn(UnitId) + Send + Sync + 'static>;

pub trait AudioPlatform: Send + Sync {
    type Input: AudioInput;
    type Output: OutputContext;

    /// Requests the microphone. Fails with a permission-class error when it is
    /// denied or absent.
    fn acquire_input(&self, sample_rate: u32) -> Result<Self::Input, AudioError>;

    fn open_output(
        &self,
        sample_rate: u32,
        on_ended: UnitEndedCallback,
    ) -> Result<Self::Output, AudioError>;
}

pub trait AudioInput: Send {
    fn start(&mut self, on_samples: SampleCallback) -> Result<(), AudioError>;

    /// Stops the hardware stream. Idempotent.
    fn stop(&mut self);
}

/// An output clock plus the units scheduled on it.
#[cfg_attr(test, automock)]
pub trait OutputContext: Send {
    /// Seconds elapsed on the output clock.
    fn current_time(&self) -> f64;

    fn start_unit(&mut self, id: UnitId, buffer: AudioBuffer, start_at: f64)
        -> Result<(), AudioError>;

    fn stop_unit(&mut self, id: UnitId);

    /// Releases the device. Idempotent.
    fn close(&mut self);
}
