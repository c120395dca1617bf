// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Broadcom GPIO backend over a mapped register window

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::layout::{BcmLayout, PullScheme};
use super::{RegisterIo, RegisterSource, RegisterWords};
use crate::{DeviceMode, NativeError, PullUpDown, Result};

/// Delay after each step of the clocked pull sequence
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_micros(1);

const FSEL_MASK: u32 = 0b111;
const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

/// GPIO register backend for BCM2835-family and BCM2711 SoCs
///
/// The register window is mapped lazily by [`RegisterIo::initialise`]. A
/// single lock guards the window, so every operation (including the whole
/// four-step pull sequence) is atomic per backend instance.
pub struct BroadcomGpio<S: RegisterSource> {
    name: String,
    source: S,
    layout: &'static BcmLayout,
    settle_delay: Duration,
    words: Mutex<Option<S::Words>>,
}

impl<S: RegisterSource> BroadcomGpio<S> {
    pub fn new(source: S, layout: &'static BcmLayout) -> Self {
        Self {
            name: format!("{}-mmap", layout.name),
            source,
            layout,
            settle_delay: DEFAULT_SETTLE_DELAY,
            words: Mutex::new(None),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn layout(&self) -> &'static BcmLayout {
        self.layout
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    fn check_gpio(&self, gpio: u32) -> Result<usize> {
        if gpio >= self.layout.gpio_count {
            return Err(NativeError::PinOutOfRange {
                gpio,
                count: self.layout.gpio_count,
            });
        }
        Ok(gpio as usize)
    }

    /// Run `op` against the mapped window with the backend lock held
    fn with_words<T>(&self, op: impl FnOnce(&mut S::Words) -> T) -> Result<T> {
        let mut guard = self.words.lock();
        let words = guard
            .as_mut()
            .ok_or_else(|| NativeError::NotInitialised(self.name.clone()))?;
        Ok(op(words))
    }

    fn settle(&self) {
        settle(self.settle_delay);
    }
}

/// Busy-wait; `thread::sleep` overshoots microsecond delays by orders of magnitude
fn settle(delay: Duration) {
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
}

impl<S: RegisterSource> RegisterIo for BroadcomGpio<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&self) -> Result<()> {
        let mut guard = self.words.lock();
        if guard.is_some() {
            return Ok(());
        }

        let words = self.source.map()?;
        let needed = self.layout.max_word_index() + 1;
        if words.word_count() < needed {
            return Err(NativeError::Mapping {
                path: self.source.describe(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "window has {} words, {} layout needs {}",
                        words.word_count(),
                        self.layout.name,
                        needed
                    ),
                ),
            });
        }

        *guard = Some(words);
        info!(
            "[GPIO] {} initialised from {} ({} GPIOs)",
            self.name,
            self.source.describe(),
            self.layout.gpio_count
        );
        Ok(())
    }

    fn terminate(&self) {
        if self.words.lock().take().is_some() {
            info!("[GPIO] {} terminated", self.name);
        }
    }

    fn is_initialised(&self) -> bool {
        self.words.lock().is_some()
    }

    fn gpio_count(&self) -> u32 {
        self.layout.gpio_count
    }

    fn get_mode(&self, gpio: u32) -> Result<DeviceMode> {
        self.check_gpio(gpio)?;
        let (reg, shift) = self.layout.fsel_location(gpio);
        let field = self.with_words(|words| (words.load(reg) >> shift) & FSEL_MASK)?;
        Ok(match field {
            FSEL_INPUT => DeviceMode::DigitalInput,
            FSEL_OUTPUT => DeviceMode::DigitalOutput,
            _ => DeviceMode::Unsupported,
        })
    }

    fn set_mode(&self, gpio: u32, mode: DeviceMode) -> Result<()> {
        self.check_gpio(gpio)?;
        let function = match mode {
            DeviceMode::DigitalInput => FSEL_INPUT,
            DeviceMode::DigitalOutput => FSEL_OUTPUT,
            other => {
                return Err(NativeError::UnsupportedMode {
                    gpio,
                    mode: other,
                    backend: self.name.clone(),
                })
            }
        };

        let (reg, shift) = self.layout.fsel_location(gpio);
        self.with_words(|words| {
            let value = (words.load(reg) & !(FSEL_MASK << shift)) | (function << shift);
            words.store(reg, value);
        })?;
        debug!("[GPIO] GPIO {} mode set to {}", gpio, mode);
        Ok(())
    }

    fn read(&self, gpio: u32) -> Result<bool> {
        let index = self.check_gpio(gpio)?;
        let reg = self.layout.gplev[index] as usize;
        let bit = BcmLayout::bank_bit(gpio);
        self.with_words(|words| words.load(reg) & bit != 0)
    }

    fn write(&self, gpio: u32, value: bool) -> Result<()> {
        let index = self.check_gpio(gpio)?;
        let reg = usize::from(if value {
            self.layout.gpset[index]
        } else {
            self.layout.gpclr[index]
        });
        let bit = BcmLayout::bank_bit(gpio);
        self.with_words(|words| words.store(reg, bit))?;
        trace!("[GPIO] GPIO {} <- {}", gpio, value);
        Ok(())
    }

    fn set_pull_up_down(&self, gpio: u32, pud: PullUpDown) -> Result<()> {
        let index = self.check_gpio(gpio)?;
        match self.layout.pull {
            PullScheme::Clocked {
                gppud,
                gppudclk,
                codes,
            } => {
                let clk = gppudclk[index] as usize;
                let bit = BcmLayout::bank_bit(gpio);
                self.with_words(|words| {
                    words.store(gppud, codes.encode(pud));
                    self.settle();
                    words.store(clk, bit);
                    self.settle();
                    words.store(gppud, 0);
                    self.settle();
                    words.store(clk, 0);
                    self.settle();
                })?;
            }
            PullScheme::Direct { base, codes } => {
                let (reg, shift) = BcmLayout::pull_field(base, gpio);
                self.with_words(|words| {
                    let value = (words.load(reg) & !(0b11 << shift)) | (codes.encode(pud) << shift);
                    words.store(reg, value);
                })?;
            }
        }
        debug!("[GPIO] GPIO {} pull set to {}", gpio, pud);
        Ok(())
    }
}
