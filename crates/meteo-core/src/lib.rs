//! Hardware-independent core library for meteo-rs
//!
//! This crate contains all platform-agnostic logic for the meteo
//! environmental logging station: the addressed bus transport and register
//! protocol, the BME280 and ADS1115 drivers, fixed-point compensation,
//! per-period averaging and the acquisition supervisor.
//!
//! It is `no_std` with `extern crate alloc` so the same code runs behind the
//! Linux host binary, the simulated bus and the unit tests.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bus;
pub mod config;
pub mod display;
pub mod error;
pub mod sampling;
pub mod sensors;
pub mod sim;
pub mod supervisor;
