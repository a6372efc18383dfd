//! Barcode verification controller library.
//!
//! Exposes the control core and its adapters for the binary and for
//! integration testing.  The core (`app`, `fsm`, `reject`, `validator`)
//! performs no I/O; everything it touches goes through the port traits in
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod reject;
pub mod topics;
pub mod validator;
