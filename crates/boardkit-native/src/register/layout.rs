// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Broadcom GPIO register layouts.
//!
//! All offsets are 32-bit word indices from the start of the GPIO block:
//!
//! | Register            | Byte offset | Word |
//! |---------------------|-------------|------|
//! | GPFSEL0..5          | 0x00        | 0..5 |
//! | GPSET0/1            | 0x1c        | 7/8  |
//! | GPCLR0/1            | 0x28        | 10/11|
//! | GPLEV0/1            | 0x34        | 13/14|
//! | GPPUD (2835)        | 0x94        | 37   |
//! | GPPUDCLK0/1 (2835)  | 0x98        | 38/39|
//! | PUP_PDN_CNTRL0..3   | 0xe4        | 57..60 (2711) |

use crate::PullUpDown;

/// Widest GPIO block of any supported SoC
pub const MAX_GPIOS: usize = 58;

/// One register per 32 GPIOs, starting at `bank0`
const fn banked(bank0: u8) -> [u8; MAX_GPIOS] {
    let mut table = [0u8; MAX_GPIOS];
    let mut gpio = 0;
    while gpio < MAX_GPIOS {
        table[gpio] = bank0 + (gpio / 32) as u8;
        gpio += 1;
    }
    table
}

const GPSET: [u8; MAX_GPIOS] = banked(7);
const GPCLR: [u8; MAX_GPIOS] = banked(10);
const GPLEV: [u8; MAX_GPIOS] = banked(13);
const GPPUDCLK: [u8; MAX_GPIOS] = banked(38);

const GPFSEL0: usize = 0;
const GPPUD: usize = 37;
const GPIO_PUP_PDN_CNTRL_REG0: usize = 57;

/// Hardware encoding of each pull setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullCodes {
    pub none: u32,
    pub up: u32,
    pub down: u32,
}

impl PullCodes {
    pub fn encode(&self, pud: PullUpDown) -> u32 {
        match pud {
            PullUpDown::None => self.none,
            PullUpDown::PullUp => self.up,
            PullUpDown::PullDown => self.down,
        }
    }

    pub fn decode(&self, code: u32) -> Option<PullUpDown> {
        if code == self.none {
            Some(PullUpDown::None)
        } else if code == self.up {
            Some(PullUpDown::PullUp)
        } else if code == self.down {
            Some(PullUpDown::PullDown)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullScheme {
    /// Write GPPUD, clock it into the pin through GPPUDCLKn, then clear both
    Clocked {
        gppud: usize,
        gppudclk: &'static [u8; MAX_GPIOS],
        codes: PullCodes,
    },
    /// One 2-bit field per GPIO, 16 GPIOs per register
    Direct { base: usize, codes: PullCodes },
}

impl PullScheme {
    pub fn codes(&self) -> PullCodes {
        match self {
            PullScheme::Clocked { codes, .. } | PullScheme::Direct { codes, .. } => *codes,
        }
    }
}

/// Register layout of one SoC family
#[derive(Debug)]
pub struct BcmLayout {
    pub name: &'static str,
    pub gpio_count: u32,
    pub gpfsel: usize,
    pub gpset: &'static [u8; MAX_GPIOS],
    pub gpclr: &'static [u8; MAX_GPIOS],
    pub gplev: &'static [u8; MAX_GPIOS],
    pub pull: PullScheme,
}

/// BCM2835/6/7 (Pi 1, 2, 3, Zero)
pub static BCM2835: BcmLayout = BcmLayout {
    name: "bcm2835",
    gpio_count: 54,
    gpfsel: GPFSEL0,
    gpset: &GPSET,
    gpclr: &GPCLR,
    gplev: &GPLEV,
    pull: PullScheme::Clocked {
        gppud: GPPUD,
        gppudclk: &GPPUDCLK,
        codes: PullCodes {
            none: 0,
            down: 1,
            up: 2,
        },
    },
};

/// BCM2711 (Pi 4, Pi 400, CM4)
pub static BCM2711: BcmLayout = BcmLayout {
    name: "bcm2711",
    gpio_count: 58,
    gpfsel: GPFSEL0,
    gpset: &GPSET,
    gpclr: &GPCLR,
    gplev: &GPLEV,
    pull: PullScheme::Direct {
        base: GPIO_PUP_PDN_CNTRL_REG0,
        codes: PullCodes {
            none: 0,
            up: 1,
            down: 2,
        },
    },
};

impl BcmLayout {
    /// Look up a layout by SoC name (`bcm2835`, `bcm2836`, `bcm2837`, `bcm2711`)
    pub fn for_name(name: &str) -> Option<&'static BcmLayout> {
        match name.to_lowercase().as_str() {
            "bcm2835" | "bcm2836" | "bcm2837" => Some(&BCM2835),
            "bcm2711" => Some(&BCM2711),
            _ => None,
        }
    }

    /// Function-select register and field shift: 10 GPIOs per register, 3 bits each
    pub fn fsel_location(&self, gpio: u32) -> (usize, u32) {
        (self.gpfsel + (gpio / 10) as usize, (gpio % 10) * 3)
    }

    /// Bit for `gpio` within its 32-GPIO bank
    pub fn bank_bit(gpio: u32) -> u32 {
        1 << (gpio & 31)
    }

    /// Pull control register and field shift for the direct scheme
    pub fn pull_field(base: usize, gpio: u32) -> (usize, u32) {
        (base + (gpio >> 4) as usize, (gpio & 0xf) << 1)
    }

    pub fn bank_count(&self) -> usize {
        (self.gpio_count as usize + 31) / 32
    }

    /// Highest word index any operation on this layout can touch
    pub fn max_word_index(&self) -> usize {
        let last = self.gpio_count.saturating_sub(1);
        let banked = [
            self.gpset[last as usize],
            self.gpclr[last as usize],
            self.gplev[last as usize],
        ]
        .into_iter()
        .map(usize::from)
        .max()
        .unwrap_or(0);
        let fsel = self.fsel_location(last).0;
        let pull = match self.pull {
            PullScheme::Clocked { gppud, gppudclk, .. } => gppud.max(gppudclk[last as usize] as usize),
            PullScheme::Direct { base, .. } => Self::pull_field(base, last).0,
        };
        banked.max(fsel).max(pull)
    }
}
