//! Delta modulation channel.
//!
//! The output unit shifts one bit per timer expiry and slews the 7-bit DAC
//! level by ±2. Sample bytes arrive through the DMC DMA engine: when the
//! sample buffer is empty and bytes remain, [`Dmc::needs_fetch`] goes high
//! and the DMA unit stalls the CPU to deliver a byte via
//! [`Dmc::complete_fetch`].

use serde::{Deserialize, Serialize};

use crate::clock::Region;

use super::tables::{
    DMC_RATE_NTSC, DMC_RATE_PAL, DMC_SAMPLE_ADDR_STRIDE, DMC_SAMPLE_BASE, DMC_SAMPLE_LEN_STRIDE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dmc {
    irq_enable: bool,
    loop_flag: bool,
    rate_index: u8,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
    timer: u16,
    timer_period: u16,
    pub irq_flag: bool,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            irq_enable: false,
            loop_flag: false,
            rate_index: 0,
            output_level: 0,
            sample_address: DMC_SAMPLE_BASE,
            sample_length: 1,
            current_address: DMC_SAMPLE_BASE,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            // Hardware powers up mid-way through an 8-bit output cycle.
            bits_remaining: 8,
            silence: true,
            timer: DMC_RATE_NTSC[0] - 1,
            timer_period: DMC_RATE_NTSC[0] - 1,
            irq_flag: false,
        }
    }
}

impl Dmc {
    fn rate_table(region: Region) -> &'static [u16; 16] {
        match region {
            Region::Ntsc => &DMC_RATE_NTSC,
            Region::Pal => &DMC_RATE_PAL,
        }
    }

    /// `$4010`: IRQ enable, loop, rate select.
    pub fn write_control(&mut self, value: u8, region: Region) {
        self.irq_enable = value & 0b1000_0000 != 0;
        if !self.irq_enable {
            self.irq_flag = false;
        }
        self.loop_flag = value & 0b0100_0000 != 0;
        self.rate_index = value & 0x0F;
        self.timer_period = Self::rate_table(region)[self.rate_index as usize] - 1;
    }

    /// `$4011`: direct 7-bit DAC load.
    pub fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0x7F;
    }

    /// `$4012`.
    pub fn write_sample_address(&mut self, value: u8) {
        self.sample_address = DMC_SAMPLE_BASE.wrapping_add(value as u16 * DMC_SAMPLE_ADDR_STRIDE);
    }

    /// `$4013`.
    pub fn write_sample_length(&mut self, value: u8) {
        self.sample_length = value as u16 * DMC_SAMPLE_LEN_STRIDE + 1;
    }

    /// `$4015` bit 4 side effects.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart_sample();
        }
        self.irq_flag = false;
    }

    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn output(&self) -> u8 {
        self.output_level
    }

    /// True while a sample byte is wanted; the DMA engine answers it.
    pub fn needs_fetch(&self) -> bool {
        self.sample_buffer.is_none() && self.bytes_remaining > 0
    }

    pub fn fetch_address(&self) -> u16 {
        self.current_address
    }

    /// Lands a DMA-fetched byte and advances the sample pointer, wrapping
    /// `$FFFF` back to `$8000`. At the end of a sample, either loop or stop
    /// (raising the IRQ flag when enabled).
    pub fn complete_fetch(&mut self, byte: u8) {
        self.sample_buffer = Some(byte);
        self.current_address = if self.current_address == 0xFFFF {
            0x8000
        } else {
            self.current_address + 1
        };
        self.bytes_remaining = self.bytes_remaining.saturating_sub(1);
        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.restart_sample();
            } else if self.irq_enable {
                self.irq_flag = true;
            }
        }
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    /// CPU-rate tick of the output unit.
    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;

        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(sample) => {
                    self.shift_register = sample;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }

        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift_register >>= 1;
        self.bits_remaining -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabling_with_empty_sample_restarts() {
        let mut dmc = Dmc::default();
        dmc.write_sample_address(0x04);
        dmc.write_sample_length(0x02);
        dmc.set_enabled(true);
        assert!(dmc.active());
        assert_eq!(dmc.fetch_address(), 0xC000 + 4 * 64);
        assert!(dmc.needs_fetch());
    }

    #[test]
    fn address_wraps_to_8000() {
        let mut dmc = Dmc::default();
        dmc.current_address = 0xFFFF;
        dmc.bytes_remaining = 2;
        dmc.complete_fetch(0xAA);
        assert_eq!(dmc.fetch_address(), 0x8000);
    }

    #[test]
    fn sample_end_raises_irq_when_enabled() {
        let mut dmc = Dmc::default();
        dmc.write_control(0x80, Region::Ntsc);
        dmc.bytes_remaining = 1;
        dmc.complete_fetch(0x00);
        assert!(dmc.irq_flag);
        assert!(!dmc.active());
    }

    #[test]
    fn output_slews_by_two_per_bit() {
        let mut dmc = Dmc::default();
        dmc.write_direct_load(60);
        dmc.bytes_remaining = 1;
        dmc.complete_fetch(0b0000_0011);
        dmc.bits_remaining = 0;
        // Two 1-bits then six 0-bits.
        for _ in 0..2 {
            dmc.timer = 0;
            dmc.clock_timer();
        }
        assert_eq!(dmc.output(), 64);
        for _ in 0..6 {
            dmc.timer = 0;
            dmc.clock_timer();
        }
        assert_eq!(dmc.output(), 52);
    }
}
