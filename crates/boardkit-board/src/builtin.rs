// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in board tables.

use crate::pin::{PinCapability, PinKind};
use crate::{BoardError, BoardInfo, DeviceMode, Result};

pub const RASPBERRY_PI_40PIN: &str = "raspberrypi-40pin";
pub const GENERIC: &str = "generic";

/// Names accepted by [`by_name`]
pub const BUILTIN_BOARDS: &[&str] = &[RASPBERRY_PI_40PIN, GENERIC];

const J8: &str = "J8";

/// (BCM GPIO, physical pin on J8)
const PI_J8_GPIOS: &[(u32, u32)] = &[
    (2, 3),
    (3, 5),
    (4, 7),
    (14, 8),
    (15, 10),
    (17, 11),
    (18, 12),
    (27, 13),
    (22, 15),
    (23, 16),
    (24, 18),
    (10, 19),
    (9, 21),
    (25, 22),
    (11, 23),
    (8, 24),
    (7, 26),
    (0, 27),
    (1, 28),
    (5, 29),
    (6, 31),
    (12, 32),
    (13, 33),
    (19, 35),
    (16, 36),
    (26, 37),
    (20, 38),
    (21, 40),
];

/// GPIOs routed to the PWM block
const PI_PWM_GPIOS: &[u32] = &[12, 13, 18, 19];

/// Raspberry Pi with the 40-pin J8 header (BCM numbering, GPIO 0-27)
pub fn raspberry_pi_40pin() -> BoardInfo {
    let mut board = BoardInfo::new("Raspberry Pi", "40-pin", 0);
    for &(gpio, physical) in PI_J8_GPIOS {
        let modes = if PI_PWM_GPIOS.contains(&gpio) {
            DeviceMode::DIGITAL_IN_OUT_PWM
        } else {
            DeviceMode::DIGITAL_IN_OUT
        };
        board.add_pin(PinCapability::new(PinKind::Gpio, gpio, modes).with_physical(J8, physical));
    }
    board
}

/// Board with no pin table; all GPIOs are synthesised as digital in/out
pub fn generic() -> BoardInfo {
    BoardInfo::new("Generic", "Linux", 0)
}

pub fn by_name(name: &str) -> Result<BoardInfo> {
    match name {
        RASPBERRY_PI_40PIN => Ok(raspberry_pi_40pin()),
        GENERIC => Ok(generic()),
        other => Err(BoardError::UnknownBoard(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pi_table_covers_bcm_0_to_27() {
        let board = raspberry_pi_40pin();
        for gpio in 0..28 {
            assert!(board.by_gpio(gpio).is_some(), "GPIO{} missing", gpio);
        }
        assert!(board.by_gpio(28).is_none());
        assert_eq!(board.by_physical(J8, 12).unwrap().number, 18);
    }

    #[test]
    fn test_pi_pwm_pins() {
        let board = raspberry_pi_40pin();
        assert!(board.by_gpio(18).unwrap().supports(DeviceMode::SoftwarePwmOutput));
        assert!(!board.by_gpio(17).unwrap().supports(DeviceMode::SoftwarePwmOutput));
    }

    #[test]
    fn test_by_name() {
        assert!(by_name(GENERIC).is_ok());
        assert!(matches!(by_name("beaglebone"), Err(BoardError::UnknownBoard(_))));
    }
}
