//! Frame sequencer: quarter/half-frame landmarks on the CPU clock.

use serde::{Deserialize, Serialize};

use crate::clock::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameCounterMode {
    #[default]
    FourStep,
    FiveStep,
}

/// Landmark table for one mode/region combination.
struct Landmarks {
    quarters: &'static [u32],
    halves: &'static [u32],
    /// Frame IRQ is re-asserted on each of these cycles (three-cycle hold).
    irqs: &'static [u32],
    wrap: u32,
}

const NTSC_FOUR_STEP: Landmarks = Landmarks {
    quarters: &[7457, 14913, 22371, 29829],
    halves: &[14913, 29829],
    irqs: &[29829, 29830, 29831],
    wrap: 29832,
};

const NTSC_FIVE_STEP: Landmarks = Landmarks {
    quarters: &[7457, 14913, 22371, 29829, 37281],
    halves: &[14913, 37281],
    irqs: &[],
    wrap: 37282,
};

const PAL_FOUR_STEP: Landmarks = Landmarks {
    quarters: &[8313, 16627, 24939, 33252],
    halves: &[16627, 33252],
    irqs: &[33252, 33253, 33254],
    wrap: 33255,
};

const PAL_FIVE_STEP: Landmarks = Landmarks {
    quarters: &[8313, 16627, 24939, 33252, 41565],
    halves: &[16627, 41565],
    irqs: &[],
    wrap: 41566,
};

/// Frame-unit clocks produced by one CPU-cycle step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    pub quarter: bool,
    pub half: bool,
    pub set_irq: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounter {
    pub mode: FrameCounterMode,
    pub irq_inhibit: bool,
    /// Position within the sequence, in CPU cycles.
    pub cycle: u32,
}

impl FrameCounter {
    fn landmarks(&self, region: Region) -> &'static Landmarks {
        match (region, self.mode) {
            (Region::Ntsc, FrameCounterMode::FourStep) => &NTSC_FOUR_STEP,
            (Region::Ntsc, FrameCounterMode::FiveStep) => &NTSC_FIVE_STEP,
            (Region::Pal, FrameCounterMode::FourStep) => &PAL_FOUR_STEP,
            (Region::Pal, FrameCounterMode::FiveStep) => &PAL_FIVE_STEP,
        }
    }

    /// Applies a `$4017` write: the counter restarts immediately and a
    /// 5-step write clocks a quarter- and half-frame on the spot.
    pub fn configure(&mut self, value: u8) -> FrameTick {
        self.mode = if value & 0x80 == 0 {
            FrameCounterMode::FourStep
        } else {
            FrameCounterMode::FiveStep
        };
        self.irq_inhibit = value & 0x40 != 0;
        self.cycle = 0;
        let immediate = self.mode == FrameCounterMode::FiveStep;
        FrameTick {
            quarter: immediate,
            half: immediate,
            set_irq: false,
        }
    }

    /// Advances one CPU cycle and reports the frame events landing on it.
    pub fn step(&mut self, region: Region) -> FrameTick {
        self.cycle = self.cycle.wrapping_add(1);
        let landmarks = self.landmarks(region);

        let tick = FrameTick {
            quarter: landmarks.quarters.contains(&self.cycle),
            half: landmarks.halves.contains(&self.cycle),
            set_irq: !self.irq_inhibit && landmarks.irqs.contains(&self.cycle),
        };

        // A 5->4 mode switch can leave the counter past the shorter wrap
        // point; `>=` lets it recover on the next cycle.
        if self.cycle >= landmarks.wrap {
            self.cycle = 0;
        }
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until(fc: &mut FrameCounter, target: u32) -> Vec<FrameTick> {
        let mut ticks = Vec::new();
        while fc.cycle != target {
            ticks.push(fc.step(Region::Ntsc));
        }
        ticks
    }

    #[test]
    fn four_step_quarters_and_halves() {
        let mut fc = FrameCounter::default();
        let ticks = run_until(&mut fc, 29831);
        let quarters: Vec<usize> = ticks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.quarter)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(quarters, vec![7457, 14913, 22371, 29829]);
        let halves: Vec<usize> = ticks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.half)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(halves, vec![14913, 29829]);
    }

    #[test]
    fn irq_asserted_three_cycles_then_wrap() {
        let mut fc = FrameCounter {
            cycle: 29828,
            ..FrameCounter::default()
        };
        assert!(fc.step(Region::Ntsc).set_irq); // 29829
        assert!(fc.step(Region::Ntsc).set_irq); // 29830
        assert!(fc.step(Region::Ntsc).set_irq); // 29831
        let tick = fc.step(Region::Ntsc); // 29832 -> 0
        assert!(!tick.set_irq);
        assert_eq!(fc.cycle, 0);
    }

    #[test]
    fn five_step_never_raises_irq() {
        let mut fc = FrameCounter::default();
        fc.configure(0x80);
        for _ in 0..40_000 {
            assert!(!fc.step(Region::Ntsc).set_irq);
        }
    }

    #[test]
    fn five_step_write_clocks_immediately() {
        let mut fc = FrameCounter::default();
        let tick = fc.configure(0x80);
        assert!(tick.quarter && tick.half);
        assert_eq!(fc.cycle, 0);
        let tick = fc.configure(0x00);
        assert!(!tick.quarter && !tick.half);
    }
}
