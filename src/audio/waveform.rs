//! Simulated waveform for the recording indicator
//!
//! The bars shown while recording are not derived from captured audio. The
//! simulator only produces a lazy sequence of plausible-looking frames; it has
//! no say in elapsed time, auto-stop or submission.

use crate::integration::config::WaveformConfig;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

/// One rendered waveform frame
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformFrame {
    /// Completed regeneration cycles
    pub cycle: u64,
    /// Step within the current cycle
    pub step: usize,
    pub amplitudes: Vec<f32>,
}

/// Cosmetic amplitude generator
///
/// Each step eases the bars from the previous amplitude set towards the
/// current target set and rolls them one position. After `steps_per_cycle`
/// steps the target set is regenerated.
pub struct WaveformSimulator {
    bar_count: usize,
    steps_per_cycle: usize,
    amplitude_floor: f32,
    step: usize,
    cycle: u64,
    previous: Vec<f32>,
    target: Vec<f32>,
    frame: Vec<f32>,
    rng: StdRng,
}

impl WaveformSimulator {
    pub fn new(config: &WaveformConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let bar_count = config.bar_count.max(1);
        let floor = vec![config.amplitude_floor.clamp(0.0, 1.0); bar_count];

        let mut simulator = Self {
            bar_count,
            steps_per_cycle: config.steps_per_cycle.max(1),
            amplitude_floor: config.amplitude_floor,
            step: 0,
            cycle: 0,
            previous: floor.clone(),
            target: floor.clone(),
            frame: floor,
            rng,
        };
        simulator.regenerate();
        simulator
    }

    /// Last rendered frame; stays put while the recording is paused
    pub fn frame(&self) -> &[f32] {
        &self.frame
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advance one step and render a new frame
    pub fn step(&mut self) -> WaveformFrame {
        self.step += 1;
        if self.step >= self.steps_per_cycle {
            self.step = 0;
            self.cycle += 1;
            self.regenerate();
        }

        let t = self.step as f32 / self.steps_per_cycle as f32;
        let shift = self.step % self.bar_count;
        for (i, bar) in self.frame.iter_mut().enumerate() {
            let idx = (i + shift) % self.bar_count;
            *bar = self.previous[idx] + (self.target[idx] - self.previous[idx]) * t;
        }

        WaveformFrame {
            cycle: self.cycle,
            step: self.step,
            amplitudes: self.frame.clone(),
        }
    }

    /// Flatten to the floor, as shown before recording starts
    pub fn reset(&mut self) {
        self.step = 0;
        self.cycle = 0;
        let floor = self.amplitude_floor.clamp(0.0, 1.0);
        self.frame.iter_mut().for_each(|bar| *bar = floor);
        self.previous.copy_from_slice(&self.frame);
        self.regenerate();
    }

    fn regenerate(&mut self) {
        // A bad floor must not break recording; keep the previous set.
        let dist = match Uniform::new_inclusive(self.amplitude_floor, 1.0) {
            Ok(dist) => dist,
            Err(e) => {
                warn!("Waveform regeneration skipped: {}", e);
                return;
            }
        };
        self.previous = std::mem::take(&mut self.target);
        self.target = (0..self.bar_count)
            .map(|_| dist.sample(&mut self.rng))
            .collect();
    }
}

impl Iterator for WaveformSimulator {
    type Item = WaveformFrame;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> WaveformSimulator {
        WaveformSimulator::new(&WaveformConfig {
            seed: Some(seed),
            bar_count: 8,
            steps_per_cycle: 4,
            ..WaveformConfig::default()
        })
    }

    #[test]
    fn test_frames_stay_in_range() {
        let frames: Vec<_> = seeded(1).take(40).collect();
        assert_eq!(frames.len(), 40);
        for frame in &frames {
            assert_eq!(frame.amplitudes.len(), 8);
            assert!(frame
                .amplitudes
                .iter()
                .all(|&a| (0.15..=1.0).contains(&a)));
        }
    }

    #[test]
    fn test_cycle_regenerates_after_fixed_steps() {
        let mut sim = seeded(2);
        for _ in 0..3 {
            sim.step();
        }
        assert_eq!(WaveformSimulator::cycle(&sim), 0);
        let frame = sim.step();
        assert_eq!(frame.cycle, 1);
        assert_eq!(frame.step, 0);
    }

    #[test]
    fn test_same_seed_same_frames() {
        let a: Vec<_> = seeded(9).take(10).collect();
        let b: Vec<_> = seeded(9).take(10).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_frame_frozen_without_steps() {
        let mut sim = seeded(3);
        let last = sim.step().amplitudes;
        assert_eq!(sim.frame(), last.as_slice());
        assert_eq!(sim.frame(), last.as_slice());
    }

    #[test]
    fn test_invalid_floor_does_not_panic() {
        let mut sim = WaveformSimulator::new(&WaveformConfig {
            seed: Some(4),
            amplitude_floor: 2.0,
            ..WaveformConfig::default()
        });
        let frames: Vec<_> = sim.by_ref().take(50).collect();
        assert_eq!(frames.len(), 50);
    }

    #[test]
    fn test_reset_flattens() {
        let mut sim = seeded(5);
        sim.step();
        sim.step();
        sim.reset();
        assert!(sim.frame().iter().all(|&a| (a - 0.15).abs() < f32::EPSILON));
        assert_eq!(WaveformSimulator::cycle(&sim), 0);
    }
}
