// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Board identity and pin lookup.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::pin::{PinCapability, PinKind};
use crate::DeviceMode;

/// Reference voltage assumed for on-board ADCs when a table does not specify one
pub const DEFAULT_ADC_VREF: f32 = 1.8;

/// Make/model string for boards that could not be identified
pub const UNKNOWN: &str = "unknown";

/// Board identity plus its pin capability tables
///
/// Pins are kept in three numbering spaces (GPIO, ADC, DAC) and can also be
/// found by name or by physical header position.
#[derive(Debug, Clone)]
pub struct BoardInfo {
    make: String,
    model: String,
    memory_kb: u32,
    adc_vref: f32,
    gpios: BTreeMap<u32, PinCapability>,
    adcs: BTreeMap<u32, PinCapability>,
    dacs: BTreeMap<u32, PinCapability>,
    by_name: AHashMap<String, (PinKind, u32)>,
    headers: BTreeMap<String, BTreeMap<u32, (PinKind, u32)>>,
}

impl BoardInfo {
    pub fn new(make: impl Into<String>, model: impl Into<String>, memory_kb: u32) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            memory_kb,
            adc_vref: DEFAULT_ADC_VREF,
            gpios: BTreeMap::new(),
            adcs: BTreeMap::new(),
            dacs: BTreeMap::new(),
            by_name: AHashMap::new(),
            headers: BTreeMap::new(),
        }
    }

    /// A board with no pin tables; every lookup is synthesised
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN, 0)
    }

    pub fn with_adc_vref(mut self, adc_vref: f32) -> Self {
        self.adc_vref = adc_vref;
        self
    }

    pub fn make(&self) -> &str {
        &self.make
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.make, self.model)
    }

    pub fn memory_kb(&self) -> u32 {
        self.memory_kb
    }

    pub fn adc_vref(&self) -> f32 {
        self.adc_vref
    }

    /// Add a pin record to the table matching its kind
    ///
    /// A later record with the same number replaces the earlier one.
    pub fn add_pin(&mut self, pin: PinCapability) -> &mut Self {
        let slot = (pin.kind, pin.number);
        self.by_name.insert(pin.name.clone(), slot);
        if let Some(physical) = pin.physical_pin {
            self.headers
                .entry(pin.header.clone())
                .or_default()
                .insert(physical, slot);
        }
        match pin.kind {
            PinKind::Gpio => self.gpios.insert(pin.number, pin),
            PinKind::Adc => self.adcs.insert(pin.number, pin),
            PinKind::Dac => self.dacs.insert(pin.number, pin),
        };
        self
    }

    pub fn add_gpio(&mut self, gpio: u32, physical_pin: u32, modes: &[DeviceMode]) -> &mut Self {
        self.add_pin(
            PinCapability::new(PinKind::Gpio, gpio, modes)
                .with_physical(crate::pin::DEFAULT_HEADER, physical_pin),
        )
    }

    pub fn add_adc(&mut self, adc: u32, physical_pin: u32) -> &mut Self {
        self.add_pin(
            PinCapability::new(PinKind::Adc, adc, &[DeviceMode::AnalogInput])
                .with_physical(crate::pin::DEFAULT_HEADER, physical_pin),
        )
    }

    pub fn add_dac(&mut self, dac: u32, physical_pin: u32) -> &mut Self {
        self.add_pin(
            PinCapability::new(PinKind::Dac, dac, &[DeviceMode::AnalogOutput])
                .with_physical(crate::pin::DEFAULT_HEADER, physical_pin),
        )
    }

    pub fn by_gpio(&self, gpio: u32) -> Option<&PinCapability> {
        self.gpios.get(&gpio)
    }

    /// Lenient GPIO lookup: never fails, synthesises a digital in/out record
    pub fn by_gpio_or_default(&self, gpio: u32) -> PinCapability {
        match self.gpios.get(&gpio) {
            Some(pin) => pin.clone(),
            None => {
                tracing::debug!("[BOARD] GPIO {} not in table for {}, using defaults", gpio, self.name());
                PinCapability::unknown_gpio(gpio)
            }
        }
    }

    pub fn by_adc(&self, adc: u32) -> Option<&PinCapability> {
        self.adcs.get(&adc)
    }

    pub fn by_adc_or_default(&self, adc: u32) -> PinCapability {
        self.adcs
            .get(&adc)
            .cloned()
            .unwrap_or_else(|| PinCapability::new(PinKind::Adc, adc, &[DeviceMode::AnalogInput]))
    }

    pub fn by_dac(&self, dac: u32) -> Option<&PinCapability> {
        self.dacs.get(&dac)
    }

    pub fn by_dac_or_default(&self, dac: u32) -> PinCapability {
        self.dacs
            .get(&dac)
            .cloned()
            .unwrap_or_else(|| PinCapability::new(PinKind::Dac, dac, &[DeviceMode::AnalogOutput]))
    }

    pub fn by_name(&self, name: &str) -> Option<&PinCapability> {
        self.by_name.get(name).and_then(|slot| self.resolve(*slot))
    }

    /// Pin at a physical position on a header
    pub fn by_physical(&self, header: &str, physical_pin: u32) -> Option<&PinCapability> {
        self.headers
            .get(header)
            .and_then(|pins| pins.get(&physical_pin))
            .and_then(|slot| self.resolve(*slot))
    }

    pub fn gpios(&self) -> impl Iterator<Item = &PinCapability> {
        self.gpios.values()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }

    fn resolve(&self, (kind, number): (PinKind, u32)) -> Option<&PinCapability> {
        match kind {
            PinKind::Gpio => self.gpios.get(&number),
            PinKind::Adc => self.adcs.get(&number),
            PinKind::Dac => self.dacs.get(&number),
        }
    }
}

impl std::fmt::Display for BoardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoardInfo [make={}, model={}, memory={}KiB, gpios={}, adcs={}, dacs={}]",
            self.make,
            self.model,
            self.memory_kb,
            self.gpios.len(),
            self.adcs.len(),
            self.dacs.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_board() -> BoardInfo {
        let mut board = BoardInfo::new("Acme", "Tiny", 512 * 1024);
        board
            .add_gpio(4, 7, DeviceMode::DIGITAL_IN_OUT_PWM)
            .add_gpio(17, 11, DeviceMode::DIGITAL_IN_OUT)
            .add_adc(0, 13)
            .add_dac(1, 15);
        board
    }

    #[test]
    fn test_strict_and_lenient_gpio_lookup() {
        let board = small_board();
        assert!(board.by_gpio(4).unwrap().supports(DeviceMode::SoftwarePwmOutput));
        assert!(board.by_gpio(5).is_none());

        let synthesised = board.by_gpio_or_default(5);
        assert_eq!(synthesised.number, 5);
        assert!(synthesised.supports(DeviceMode::DigitalOutput));
    }

    #[test]
    fn test_adc_dac_lookup() {
        let board = small_board();
        assert_eq!(board.by_adc(0).unwrap().adc_channel, Some(0));
        assert!(board.by_adc(3).is_none());
        assert!(board.by_adc_or_default(3).supports(DeviceMode::AnalogInput));
        assert!(board.by_dac(1).unwrap().supports(DeviceMode::AnalogOutput));
        assert_eq!(board.by_dac_or_default(7).dac_channel, Some(7));
    }

    #[test]
    fn test_name_and_physical_lookup() {
        let board = small_board();
        assert_eq!(board.by_name("GPIO17").unwrap().number, 17);
        assert_eq!(board.by_physical(crate::pin::DEFAULT_HEADER, 7).unwrap().number, 4);
        assert_eq!(board.by_physical(crate::pin::DEFAULT_HEADER, 13).unwrap().kind, PinKind::Adc);
        assert!(board.by_physical("P9", 7).is_none());
    }

    #[test]
    fn test_unknown_board_synthesises_everything() {
        let board = BoardInfo::unknown();
        assert_eq!(board.name(), "unknown unknown");
        assert_eq!(board.gpios().count(), 0);
        assert!(board.by_gpio_or_default(12).supports(DeviceMode::DigitalInput));
    }
}
