use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Linear fade at each end so beeps don't click.
const FADE_SAMPLES: usize = 441;

/// Finite sine beep.
pub struct Tone {
    frequency: f32,
    amplitude: f32,
    total_samples: usize,
    index: usize,
}

impl Tone {
    pub fn new(frequency: f32, duration: Duration, amplitude: f32) -> Self {
        let total_samples = (duration.as_secs_f64() * SAMPLE_RATE as f64).round() as usize;
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            total_samples,
            index: 0,
        }
    }

    fn envelope(&self) -> f32 {
        let from_start = self.index;
        let to_end = self.total_samples.saturating_sub(self.index + 1);
        let edge = from_start.min(to_end);
        if edge >= FADE_SAMPLES {
            1.0
        } else {
            edge as f32 / FADE_SAMPLES as f32
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total_samples {
            return None;
        }
        let t = self.index as f32 / SAMPLE_RATE as f32;
        let sample = (TAU * self.frequency * t).sin() * self.amplitude * self.envelope();
        self.index += 1;
        Some(sample)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.index)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_samples as f64 / SAMPLE_RATE as f64,
        ))
    }
}
