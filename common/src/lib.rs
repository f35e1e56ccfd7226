//! Wire-level definitions shared by the UI master and the display slave.
//!
//! This crate carries everything both ends of the serial link must agree on:
//! frame sync bytes, command ids, result codes, status flags, logical button
//! indices and the COBS byte-stuffing codec. It is `no_std` and allocation
//! free so the same code runs on the host tooling and on the slave MCU.

#![cfg_attr(not(test), no_std)]

pub mod cobs;
mod error;
mod wire;

pub use error::{Error, Result, result_rc};
pub use wire::{Button, StatusFlags, cmd, frame, json_flags, rc};
