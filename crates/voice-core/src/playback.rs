use crate::codec::AudioBuffer;
use crate::error::AudioError;
use crate::platform::OutputContext;
use std::collections::BTreeSet;
use std::fmt;

/// Identifies one scheduled playback unit within an output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Queues decoded buffers back-to-back on the output clock, in arrival order.
pub struct PlaybackScheduler<O: OutputContext> {
    output: Option<O>,
    next_start: f64,
    active: BTreeSet<UnitId>,
    next_id: u64,
}

impl<O: OutputContext> PlaybackScheduler<O> {
    pub fn new(output: O) -> Self {
        Self {
            output: Some(output),
            next_start: 0.0,
            active: BTreeSet::new(),
            next_id: 0,
        }
    }

    /// Starts `buffer` at `max(next_start, now)` and advances the watermark by its duration.
    pub fn schedule(&mut self, buffer: AudioBuffer) -> Result<UnitId, AudioError> {
        let output = self.output.as_mut().ok_or(AudioError::Closed)?;

        let start_at = self.next_start.max(output.current_time());
        let duration = buffer.duration();
        let id = UnitId(self.next_id);
        output.start_unit(id, buffer, start_at)?;

        self.next_id += 1;
        self.next_start = start_at + duration;
        self.active.insert(id);
        tracing::debug!(%id, start_at, duration, "scheduled playback unit");
        Ok(id)
    }

    /// Forgets a unit the output reported as finished. Returns false for unknown ids.
    pub fn unit_ended(&mut self, id: UnitId) -> bool {
        self.active.remove(&id)
    }

    /// Stops every active unit and rewinds the watermark.
    pub fn stop_all(&mut self) {
        if let Some(output) = self.output.as_mut() {
            for id in &self.active {
                output.stop_unit(*id);
            }
        }
        if !self.active.is_empty() {
            tracing::debug!(count = self.active.len(), "stopped playback units");
        }
        self.active.clear();
        self.next_start = 0.0;
    }

    /// Stops playback and closes the output context. Idempotent.
    pub fn close(&mut self) {
        self.stop_all();
        if let Some(mut output) = self.output.take() {
            output.close();
        }
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl<O: OutputContext> Drop for PlaybackScheduler<O> {
    fn drop(&mut self) {
        self.close();
    }
}
