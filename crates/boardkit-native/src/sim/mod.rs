// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated hardware for tests and dry runs on machines without the SoC.

pub mod bus;
pub mod soc;

pub use bus::{SimulatedBus, TransferAttempt};
pub use soc::{RegisterStore, SimulatedRegisters, SimulatedSoc};
