//! Display-slave core for a host-provisioned OLED user interface.
//!
//! A host MCU provisions a UI as a stream of small descriptor objects over a
//! short-frame serial link, then issues runtime updates and input events. This
//! crate parses descriptors into an in-RAM model held in a single static
//! arena, renders the active screen one 128-byte page at a time through a
//! non-blocking display bus, and answers host commands.
//!
//! The crate is hardware free: the display and the host link are reached
//! through the [`transfer::DisplayBus`] and [`link::HostPort`] traits, and all
//! state lives in one [`runtime::Slave`] value owned by the integrator's main
//! loop. No allocation, no panics on host-driven input.
//!
//! # Testing
//!
//! The library is `no_std` for firmware builds and `std` under `cargo test`,
//! so the full stack runs on the host:
//!
//! ```bash
//! cargo test -p oledui-slave
//! ```

#![cfg_attr(not(test), no_std)]

pub mod arena;
pub mod config;
pub mod descriptor;
pub mod diag;
pub mod element;
pub mod focus;
pub mod font;
pub mod input;
pub mod link;
pub mod nodes;
pub mod protocol;
pub mod render;
pub mod runtime;
pub mod state;
pub mod transfer;
pub mod tree;
