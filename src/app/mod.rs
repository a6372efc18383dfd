//! Application core: pure control logic, zero I/O.
//!
//! This module contains the business rules for the verifier station:
//! lifecycle FSM orchestration, scan handling, reject pulse timing and
//! connectivity tracking.  All interaction with the broker, the pins and
//! the clock happens through **port traits** defined in [`ports`],
//! keeping this layer testable without a broker or real hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
