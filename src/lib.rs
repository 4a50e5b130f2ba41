//! # twimodule
//!
//! Register-mapped two-wire (I2C/TWI) slave protocol engine and the module
//! framework built on it. A microcontroller peripheral exposes a flat
//! register buffer to a bus master; the master reads and writes that buffer,
//! and the firmware reacts to settings while publishing status.
//!
//! ## Features
//!
//! - **Slave buffer manager**: framing of master reads and writes, staging
//!   buffers that never tear mid-transaction, connection liveness
//! - **Module framework**: common identity header, constants re-asserted on
//!   reconnection, horn, motor controller, motor mover and speed monitor
//! - **Front panel**: mode switch, test button and status LED handling
//! - **Host simulation**: in-memory bus, JSON bridge, TCP simulator and CLI
//! - **Embedded-friendly**: fixed-capacity buffers, no allocation in the
//!   protocol path
//!
//! ## Quick Start
//!
//! ```rust
//! use twimodule::modules::{Horn, Module};
//! use twimodule::sim::SimTwi;
//!
//! let twi = SimTwi::new();
//! let mut horn = Horn::new(twi.clone());
//! horn.update();
//!
//! // Master sets the horn bit in the settings register (0x0D).
//! twi.master_write(&mut horn, &[0x0D, 0b100]);
//! horn.update();
//! assert!(horn.horn_on());
//! assert!(horn.connected());
//! ```
//!
//! ## Architecture
//!
//! - [`buffer`] - bounds-checked register storage
//! - [`timer`] - tick-driven countdown timers and stopwatches
//! - [`twi`] - contract with the interrupt-driven bus hardware
//! - [`manager`] - staging buffers, framing and liveness
//! - [`layout`] - register offsets and bit positions
//! - [`modules`] - the shared slave base and concrete modules
//! - [`client`] / [`userio`] - front-panel behaviour
//! - [`sim`] - host-side bus simulation

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::new_without_default)]

pub mod buffer;
pub mod client;
pub mod fatal;
pub mod layout;
pub mod manager;
pub mod modules;
pub mod sim;
pub mod timer;
pub mod twi;
pub mod userio;

// Re-export main public types for convenience
pub use buffer::{BufferError, RegisterBuffer};
pub use client::{Client, ClientMode};
pub use manager::SlaveBufferManager;
pub use modules::{Module, Slave};
pub use twi::{TransactionHandler, TwiResult, TwiSlave};
