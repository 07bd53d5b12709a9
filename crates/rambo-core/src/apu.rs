//! Audio processing unit.
//!
//! The APU runs on the CPU clock: [`Apu::clock`] is called once per CPU
//! cycle and drives the frame sequencer, the channel timers, and the DMC
//! output unit. Sample delivery to the DMC goes through the DMA engine via
//! the `dmc_*` handshake methods.

pub mod dmc;
pub mod envelope;
pub mod frame_counter;
pub mod length_counter;
pub mod noise;
pub mod pulse;
pub mod tables;
pub mod triangle;

use serde::{Deserialize, Serialize};

use crate::clock::Region;
use crate::memory::apu as apu_mem;

use dmc::Dmc;
use frame_counter::FrameCounter;
use noise::Noise;
use pulse::{Pulse, PulseChannel};
use triangle::Triangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apu {
    pub pulse1: Pulse,
    pub pulse2: Pulse,
    pub triangle: Triangle,
    pub noise: Noise,
    pub dmc: Dmc,
    pub frame_counter: FrameCounter,
    frame_irq: bool,
    region: Region,
}

impl Apu {
    pub fn new(region: Region) -> Self {
        Self {
            pulse1: Pulse::new(PulseChannel::Pulse1),
            pulse2: Pulse::new(PulseChannel::Pulse2),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_counter: FrameCounter::default(),
            frame_irq: false,
            region,
        }
    }

    pub fn reset(&mut self) {
        let region = self.region;
        *self = Self::new(region);
    }

    /// CPU write to `$4000-$4013`, `$4015`, or `$4017`.
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            apu_mem::PULSE1_CTRL => self.pulse1.write_control(value),
            apu_mem::PULSE1_SWEEP => self.pulse1.write_sweep(value),
            apu_mem::PULSE1_TIMER_LO => self.pulse1.write_timer_low(value),
            apu_mem::PULSE1_TIMER_HI => self.pulse1.write_timer_high(value),
            apu_mem::PULSE2_CTRL => self.pulse2.write_control(value),
            apu_mem::PULSE2_SWEEP => self.pulse2.write_sweep(value),
            apu_mem::PULSE2_TIMER_LO => self.pulse2.write_timer_low(value),
            apu_mem::PULSE2_TIMER_HI => self.pulse2.write_timer_high(value),
            apu_mem::TRIANGLE_LINEAR => self.triangle.write_control(value),
            apu_mem::TRIANGLE_TIMER_LO => self.triangle.write_timer_low(value),
            apu_mem::TRIANGLE_TIMER_HI => self.triangle.write_timer_high(value),
            apu_mem::NOISE_CTRL => self.noise.write_control(value),
            apu_mem::NOISE_MODE => self.noise.write_mode(value, self.region),
            apu_mem::NOISE_LENGTH => self.noise.write_length(value),
            apu_mem::DMC_CTRL => self.dmc.write_control(value, self.region),
            apu_mem::DMC_DAC => self.dmc.write_direct_load(value),
            apu_mem::DMC_ADDR => self.dmc.write_sample_address(value),
            apu_mem::DMC_LEN => self.dmc.write_sample_length(value),
            apu_mem::STATUS => self.write_status(value),
            apu_mem::FRAME_COUNTER => self.write_frame_counter(value),
            _ => {}
        }
    }

    /// `$4015` write: channel enables; bit 4 starts/stops DMC playback and
    /// always clears the DMC IRQ.
    fn write_status(&mut self, value: u8) {
        self.pulse1.set_enabled(value & 0x01 != 0);
        self.pulse2.set_enabled(value & 0x02 != 0);
        self.triangle.set_enabled(value & 0x04 != 0);
        self.noise.set_enabled(value & 0x08 != 0);
        self.dmc.set_enabled(value & 0x10 != 0);
    }

    /// `$4017` write: frame-counter mode + IRQ inhibit. The counter restarts
    /// immediately; a 5-step write also clocks quarter+half units.
    fn write_frame_counter(&mut self, value: u8) {
        let tick = self.frame_counter.configure(value);
        if self.frame_counter.irq_inhibit {
            self.frame_irq = false;
        }
        if tick.quarter {
            self.clock_quarter_units();
        }
        if tick.half {
            self.clock_half_units();
        }
    }

    /// `$4015` read: channel length status + IRQ flags. Clears the frame
    /// IRQ as a side effect (the DMC IRQ is only cleared by `$4010/$4015`
    /// writes).
    pub fn read_status(&mut self) -> u8 {
        let mut value = 0u8;
        value |= self.pulse1.length_active() as u8;
        value |= (self.pulse2.length_active() as u8) << 1;
        value |= (self.triangle.length_active() as u8) << 2;
        value |= (self.noise.length_active() as u8) << 3;
        value |= (self.dmc.active() as u8) << 4;
        value |= (self.frame_irq as u8) << 6;
        value |= (self.dmc.irq_flag as u8) << 7;
        self.frame_irq = false;
        value
    }

    /// One CPU cycle of APU time.
    pub fn clock(&mut self) {
        let tick = self.frame_counter.step(self.region);
        if tick.quarter {
            self.clock_quarter_units();
        }
        if tick.half {
            self.clock_half_units();
        }
        if tick.set_irq {
            self.frame_irq = true;
        }

        self.pulse1.clock_timer();
        self.pulse2.clock_timer();
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.clock_timer();
    }

    fn clock_quarter_units(&mut self) {
        self.pulse1.clock_quarter();
        self.pulse2.clock_quarter();
        self.triangle.clock_linear_counter();
        self.noise.clock_quarter();
    }

    fn clock_half_units(&mut self) {
        self.pulse1.clock_half();
        self.pulse2.clock_half();
        self.triangle.clock_half();
        self.noise.clock_half();
    }

    /// Level of the APU's IRQ output (frame IRQ OR DMC IRQ).
    pub fn irq_pending(&self) -> bool {
        self.frame_irq || self.dmc.irq_flag
    }

    pub fn frame_irq(&self) -> bool {
        self.frame_irq
    }

    // DMC DMA handshake -------------------------------------------------

    pub fn dmc_needs_fetch(&self) -> bool {
        self.dmc.needs_fetch()
    }

    pub fn dmc_fetch_address(&self) -> u16 {
        self.dmc.fetch_address()
    }

    pub fn dmc_complete_fetch(&mut self, byte: u8) {
        self.dmc.complete_fetch(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apu::tables::LENGTH_TABLE;

    fn apu() -> Apu {
        Apu::new(Region::Ntsc)
    }

    #[test]
    fn length_table_load_through_registers() {
        for index in 0..32u8 {
            let mut apu = apu();
            apu.cpu_write(0x4015, 0x01);
            apu.cpu_write(0x4003, index << 3);
            let expected = LENGTH_TABLE[index as usize];
            // Status reports the channel active exactly when the table
            // entry is non-zero (it never is for valid indices).
            assert_eq!(apu.read_status() & 1, (expected > 0) as u8);
            assert!(apu.pulse1.length_active());
        }
    }

    #[test]
    fn length_load_ignored_while_disabled() {
        let mut apu = apu();
        apu.cpu_write(0x4003, 0x08);
        assert!(!apu.pulse1.length_active());
    }

    #[test]
    fn frame_irq_reasserts_across_4015_reads() {
        let mut apu = apu();
        apu.frame_counter.cycle = 29828;

        apu.clock(); // 29829
        assert!(apu.frame_irq());
        assert_eq!(apu.read_status() & 0x40, 0x40);
        assert!(!apu.frame_irq());

        apu.clock(); // 29830 re-asserts
        assert!(apu.frame_irq());
        assert_eq!(apu.read_status() & 0x40, 0x40);

        apu.clock(); // 29831
        assert!(apu.frame_irq());

        apu.clock(); // wrap to 0
        assert_eq!(apu.frame_counter.cycle, 0);
        assert!(apu.frame_irq(), "flag persists across the wrap");
    }

    #[test]
    fn irq_inhibit_blocks_the_frame_irq() {
        let mut apu = apu();
        apu.cpu_write(0x4017, 0x40);
        apu.frame_counter.cycle = 29828;
        for _ in 0..4 {
            apu.clock();
        }
        assert!(!apu.frame_irq());
    }

    #[test]
    fn disabling_a_channel_clears_its_length() {
        let mut apu = apu();
        apu.cpu_write(0x4015, 0x0F);
        apu.cpu_write(0x4003, 0x10);
        apu.cpu_write(0x400B, 0x10);
        apu.cpu_write(0x4015, 0x00);
        assert_eq!(apu.read_status() & 0x0F, 0);
    }

    #[test]
    fn dmc_enable_triggers_fetch_request() {
        let mut apu = apu();
        apu.cpu_write(0x4012, 0x00);
        apu.cpu_write(0x4013, 0x01);
        apu.cpu_write(0x4015, 0x10);
        assert!(apu.dmc_needs_fetch());
        assert_eq!(apu.dmc_fetch_address(), 0xC000);
        apu.dmc_complete_fetch(0x55);
        assert!(!apu.dmc_needs_fetch());
    }
}
