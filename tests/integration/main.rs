//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against mock
//! adapters or a temporary directory.  No broker or GPIO hardware needed.

mod control_core_tests;
mod settings_tests;
