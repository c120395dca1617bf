// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated Broadcom GPIO block.
//!
//! Models the side effects a plain memory file cannot: GPSET/GPCLR are
//! write-one-to-act, GPLEV reflects the output latch or the input's pull, and
//! the clocked pull scheme only latches on a GPPUDCLK write.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::register::layout::{BcmLayout, PullScheme};
use crate::register::{RegisterSource, RegisterWords};
use crate::{NativeError, PullUpDown, Result};

const WINDOW_WORDS: usize = 1024;

/// One register store observed by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterStore {
    pub index: usize,
    pub value: u32,
    pub at: Instant,
}

struct SocModel {
    layout: &'static BcmLayout,
    words: Vec<u32>,
    outputs: u64,
    floating: u64,
    pulls: Vec<PullUpDown>,
    stores: Vec<RegisterStore>,
    maps: u32,
    fail_next_map: Option<std::io::ErrorKind>,
}

impl SocModel {
    fn new(layout: &'static BcmLayout) -> Self {
        Self {
            layout,
            words: vec![0; WINDOW_WORDS],
            outputs: 0,
            floating: 0,
            pulls: vec![PullUpDown::None; layout.gpio_count as usize],
            stores: Vec::new(),
            maps: 0,
            fail_next_map: None,
        }
    }

    fn bank_of(&self, table: &[u8], index: usize) -> Option<usize> {
        let base = table[0] as usize;
        (index >= base && index < base + self.layout.bank_count()).then(|| index - base)
    }

    fn is_output(&self, gpio: u32) -> bool {
        let (reg, shift) = self.layout.fsel_location(gpio);
        (self.words[reg] >> shift) & 0b111 == 0b001
    }

    fn level(&self, gpio: u32) -> bool {
        if self.is_output(gpio) {
            return self.outputs & (1u64 << gpio) != 0;
        }
        match self.pulls[gpio as usize] {
            PullUpDown::PullUp => true,
            PullUpDown::PullDown => false,
            PullUpDown::None => self.floating & (1u64 << gpio) != 0,
        }
    }

    fn gpios_in_bank(&self, bank: usize) -> impl Iterator<Item = u32> {
        let first = (bank * 32) as u32;
        first..(first + 32).min(self.layout.gpio_count)
    }

    fn load(&self, index: usize) -> u32 {
        if let Some(bank) = self.bank_of(self.layout.gplev, index) {
            return self.gpios_in_bank(bank).fold(0, |word, gpio| {
                if self.level(gpio) {
                    word | BcmLayout::bank_bit(gpio)
                } else {
                    word
                }
            });
        }
        self.words[index]
    }

    fn store(&mut self, index: usize, value: u32) {
        self.stores.push(RegisterStore {
            index,
            value,
            at: Instant::now(),
        });

        if let Some(bank) = self.bank_of(self.layout.gpset, index) {
            self.outputs |= u64::from(value) << (bank * 32);
            return;
        }
        if let Some(bank) = self.bank_of(self.layout.gpclr, index) {
            self.outputs &= !(u64::from(value) << (bank * 32));
            return;
        }

        self.words[index] = value;
        match self.layout.pull {
            PullScheme::Clocked {
                gppud,
                gppudclk,
                codes,
            } => {
                if let Some(bank) = self.bank_of(gppudclk, index) {
                    if let Some(pud) = codes.decode(self.words[gppud] & 0b11) {
                        let latched: Vec<u32> = self
                            .gpios_in_bank(bank)
                            .filter(|gpio| value & BcmLayout::bank_bit(*gpio) != 0)
                            .collect();
                        for gpio in latched {
                            self.pulls[gpio as usize] = pud;
                        }
                    }
                }
            }
            PullScheme::Direct { base, codes } => {
                let regs = (self.layout.gpio_count as usize + 15) / 16;
                if index >= base && index < base + regs {
                    let first = ((index - base) * 16) as u32;
                    for gpio in first..(first + 16).min(self.layout.gpio_count) {
                        let (_, shift) = BcmLayout::pull_field(base, gpio);
                        if let Some(pud) = codes.decode((value >> shift) & 0b11) {
                            self.pulls[gpio as usize] = pud;
                        }
                    }
                }
            }
        }
    }
}

/// Shared handle to a simulated SoC
///
/// Clones share state: keep one clone for assertions and hand another to
/// [`BroadcomGpio`](crate::BroadcomGpio).
#[derive(Clone)]
pub struct SimulatedSoc {
    model: Arc<Mutex<SocModel>>,
}

impl SimulatedSoc {
    pub fn new(layout: &'static BcmLayout) -> Self {
        Self {
            model: Arc::new(Mutex::new(SocModel::new(layout))),
        }
    }

    pub fn layout(&self) -> &'static BcmLayout {
        self.model.lock().layout
    }

    /// Pull currently latched into `gpio`
    pub fn pull(&self, gpio: u32) -> PullUpDown {
        self.model.lock().pulls[gpio as usize]
    }

    /// Level an input with no pull reads as
    pub fn set_floating_level(&self, gpio: u32, level: bool) {
        let mut model = self.model.lock();
        if level {
            model.floating |= 1u64 << gpio;
        } else {
            model.floating &= !(1u64 << gpio);
        }
    }

    pub fn output_latch(&self, gpio: u32) -> bool {
        self.model.lock().outputs & (1u64 << gpio) != 0
    }

    pub fn word(&self, index: usize) -> u32 {
        self.model.lock().load(index)
    }

    /// Every store since creation (or the last [`clear_stores`](Self::clear_stores))
    pub fn stores(&self) -> Vec<RegisterStore> {
        self.model.lock().stores.clone()
    }

    pub fn clear_stores(&self) {
        self.model.lock().stores.clear();
    }

    pub fn map_count(&self) -> u32 {
        self.model.lock().maps
    }

    /// Make the next `map` fail, as if the device node were missing or locked down
    pub fn fail_next_map(&self, kind: std::io::ErrorKind) {
        self.model.lock().fail_next_map = Some(kind);
    }
}

impl std::fmt::Debug for SimulatedSoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSoc")
            .field("layout", &self.layout().name)
            .finish()
    }
}

/// Register window view over a [`SimulatedSoc`]
pub struct SimulatedRegisters {
    model: Arc<Mutex<SocModel>>,
}

impl RegisterWords for SimulatedRegisters {
    fn word_count(&self) -> usize {
        WINDOW_WORDS
    }

    fn load(&self, index: usize) -> u32 {
        self.model.lock().load(index)
    }

    fn store(&mut self, index: usize, value: u32) {
        self.model.lock().store(index, value);
    }
}

impl RegisterSource for SimulatedSoc {
    type Words = SimulatedRegisters;

    fn map(&self) -> Result<SimulatedRegisters> {
        let mut model = self.model.lock();
        if let Some(kind) = model.fail_next_map.take() {
            return Err(NativeError::Mapping {
                path: self.describe_locked(&model),
                source: std::io::Error::from(kind),
            });
        }
        model.maps += 1;
        Ok(SimulatedRegisters {
            model: Arc::clone(&self.model),
        })
    }

    fn describe(&self) -> String {
        let model = self.model.lock();
        self.describe_locked(&model)
    }
}

impl SimulatedSoc {
    fn describe_locked(&self, model: &SocModel) -> String {
        format!("simulated-{}", model.layout.name)
    }
}
