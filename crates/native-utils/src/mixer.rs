use crate::audio::resample_buffer;
use voice_core::codec::AudioBuffer;
use voice_core::playback::UnitId;

/// A playback unit downmixed and converted to the device rate, ready to queue.
#[derive(Debug, Clone)]
pub struct DeviceUnit {
    samples: Vec<f32>,
    duration: f64,
}

impl DeviceUnit {
    pub fn convert(buffer: &AudioBuffer, device_rate: u32) -> anyhow::Result<Self> {
        let mono = match buffer.channel_count() {
            0 => Vec::new(),
            1 => buffer.channels[0].clone(),
            n => (0..buffer.frames())
                .map(|i| buffer.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
                .collect(),
        };
        Ok(Self {
            samples: resample_buffer(&mono, buffer.sample_rate, device_rate)?,
            duration: buffer.duration(),
        })
    }
}

struct ScheduledUnit {
    id: UnitId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl ScheduledUnit {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Where the most recently queued unit ends, in scheduler seconds and device frames.
#[derive(Debug, Clone, Copy)]
struct Tail {
    end_time: f64,
    end_frame: u64,
}

/// Sums scheduled units into the device buffer. The output clock is the
/// number of frames rendered so far divided by the device rate.
pub struct Mixer {
    device_rate: u32,
    frames_rendered: u64,
    units: Vec<ScheduledUnit>,
    tail: Option<Tail>,
}

impl Mixer {
    pub fn new(device_rate: u32) -> Self {
        Self {
            device_rate: device_rate.max(1),
            frames_rendered: 0,
            units: Vec::new(),
            tail: None,
        }
    }

    pub fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.device_rate as f64
    }

    /// Queues `unit` at `start_at` seconds. A unit starting where the previous
    /// one ends begins on that unit's end frame, so rounding never opens a gap
    /// or an overlap. A start time already rendered past begins at the next
    /// frame instead.
    pub fn schedule(&mut self, id: UnitId, unit: DeviceUnit, start_at: f64) {
        let rate = self.device_rate as f64;
        let requested = (start_at.max(0.0) * rate).round() as u64;
        let start_frame = self
            .tail
            .filter(|tail| (start_at - tail.end_time).abs() * rate < 0.5)
            .map_or(requested, |tail| tail.end_frame)
            .max(self.frames_rendered);

        let scheduled = ScheduledUnit {
            id,
            start_frame,
            samples: unit.samples,
        };
        self.tail = Some(Tail {
            end_time: start_at + unit.duration,
            end_frame: scheduled.end_frame(),
        });
        self.units.push(scheduled);
    }

    pub fn cancel(&mut self, id: UnitId) -> bool {
        let before = self.units.len();
        self.units.retain(|unit| unit.id != id);
        if self.units.is_empty() {
            self.tail = None;
        }
        self.units.len() != before
    }

    pub fn clear(&mut self) {
        self.units.clear();
        self.tail = None;
    }

    pub fn pending(&self) -> usize {
        self.units.len()
    }

    /// Fills interleaved `out` and advances the clock. Returns the units that
    /// finished within this block.
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> Vec<UnitId> {
        let channels = channels.max(1);
        let frames = (out.len() / channels) as u64;
        let block_start = self.frames_rendered;
        let block_end = block_start + frames;

        out.fill(0.0);
        for unit in &self.units {
            let from = unit.start_frame.max(block_start);
            let to = unit.end_frame().min(block_end);
            for frame in from..to {
                let sample = unit.samples[(frame - unit.start_frame) as usize];
                let offset = (frame - block_start) as usize * channels;
                for value in &mut out[offset..offset + channels] {
                    *value += sample;
                }
            }
        }
        for value in out.iter_mut() {
            *value = value.clamp(-1.0, 1.0);
        }

        self.frames_rendered = block_end;
        let mut finished = Vec::new();
        self.units.retain(|unit| {
            if unit.end_frame() <= block_end {
                finished.push(unit.id);
                false
            } else {
                true
            }
        });
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(rate: u32, frames: usize, value: f32) -> AudioBuffer {
        AudioBuffer::mono(rate, vec![value; frames])
    }

    fn unit(device_rate: u32, frames: usize, value: f32) -> DeviceUnit {
        DeviceUnit::convert(&tone(device_rate, frames, value), device_rate).unwrap()
    }

    #[test]
    fn clock_advances_with_rendered_frames() {
        let mut mixer = Mixer::new(100);
        let mut out = vec![0.0; 100];

        mixer.render(&mut out, 2);

        assert_eq!(mixer.now(), 0.5);
    }

    #[test]
    fn units_play_back_to_back_and_report_completion() {
        let mut mixer = Mixer::new(10);
        mixer.schedule(UnitId(0), unit(10, 3, 0.25), 0.0);
        mixer.schedule(UnitId(1), unit(10, 2, 0.5), 0.3);
        let mut out = vec![0.0; 6];

        let finished = mixer.render(&mut out, 1);

        assert_eq!(out, vec![0.25, 0.25, 0.25, 0.5, 0.5, 0.0]);
        assert_eq!(finished, vec![UnitId(0), UnitId(1)]);
        assert_eq!(mixer.pending(), 0);
    }

    #[test]
    fn unit_spanning_blocks_finishes_in_the_later_block() {
        let mut mixer = Mixer::new(10);
        mixer.schedule(UnitId(7), unit(10, 4, 0.1), 0.1);
        let mut out = vec![0.0; 3];

        assert!(mixer.render(&mut out, 1).is_empty());
        assert_eq!(out, vec![0.0, 0.1, 0.1]);
        assert_eq!(mixer.render(&mut out, 1), vec![UnitId(7)]);
        assert_eq!(out, vec![0.1, 0.1, 0.0]);
    }

    #[test]
    fn samples_are_duplicated_to_every_channel() {
        let mut mixer = Mixer::new(10);
        mixer.schedule(UnitId(0), unit(10, 1, 0.5), 0.0);
        let mut out = vec![0.0; 4];

        mixer.render(&mut out, 2);

        assert_eq!(out, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn cancelled_unit_is_silent_and_not_reported() {
        let mut mixer = Mixer::new(10);
        mixer.schedule(UnitId(0), unit(10, 2, 0.5), 0.0);

        assert!(mixer.cancel(UnitId(0)));
        assert!(!mixer.cancel(UnitId(0)));
        let mut out = vec![1.0; 2];
        assert!(mixer.render(&mut out, 1).is_empty());
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn late_start_begins_at_next_frame() {
        let mut mixer = Mixer::new(10);
        let mut out = vec![0.0; 5];
        mixer.render(&mut out, 1);

        mixer.schedule(UnitId(0), unit(10, 1, 0.5), 0.2);
        mixer.render(&mut out, 1);

        assert_eq!(out[0], 0.5);
    }

    #[test]
    fn unit_rate_is_converted_to_device_rate() {
        let mut mixer = Mixer::new(48000);
        let converted = DeviceUnit::convert(&tone(24000, 240, 0.5), 48000).unwrap();
        assert_eq!(converted.samples.len(), 480);
        mixer.schedule(UnitId(0), converted, 0.0);
        let mut out = vec![0.0; 600];

        let finished = mixer.render(&mut out, 1);

        assert_eq!(finished, vec![UnitId(0)]);
        assert!((out[240] - 0.5).abs() < 0.02, "got {}", out[240]);
        assert!(out[480..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn consecutive_units_share_boundary_frames_at_fractional_ratios() {
        let mut mixer = Mixer::new(44100);
        let first = DeviceUnit::convert(&tone(24000, 1001, 0.5), 44100).unwrap();
        let duration = first.duration;
        assert_eq!(first.samples.len(), 1839);

        mixer.schedule(UnitId(0), first.clone(), 0.0);
        mixer.schedule(UnitId(1), first.clone(), duration);
        mixer.schedule(UnitId(2), first, 2.0 * duration);

        assert_eq!(mixer.units[1].start_frame, mixer.units[0].end_frame());
        assert_eq!(mixer.units[2].start_frame, mixer.units[1].end_frame());
        assert_eq!(mixer.units[2].start_frame, 3678);
    }

    #[test]
    fn unrelated_start_time_is_not_chained() {
        let mut mixer = Mixer::new(10);
        mixer.schedule(UnitId(0), unit(10, 2, 0.5), 0.0);
        mixer.schedule(UnitId(1), unit(10, 2, 0.5), 1.0);

        assert_eq!(mixer.units[1].start_frame, 10);

        mixer.clear();
        mixer.schedule(UnitId(2), unit(10, 2, 0.5), 0.2);
        assert_eq!(mixer.units[0].start_frame, 2);
    }
}
