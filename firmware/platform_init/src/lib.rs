//! The platform initialization phase of early boot firmware.
//!
//! The phase takes the flattened device tree that the previous boot stage handed over, moves it into permanent
//! firmware memory and announces it to later phases.
//! Afterwards it scans the tree for devices whose MMIO windows are not registered by their own drivers and describes
//! those windows as resource HOBs.
//!
//! ```text
//! device tree ──▶ relocate ──▶ FDT HOB
//!                    │
//!                    ├──────▶ firmware volume HOB
//!                    ├──────▶ scan PCIe hosts ──▶ resource HOBs
//!                    ├──────▶ inbound PCIe window ──▶ resource HOB
//!                    └──────▶ scan SD controllers ──▶ resource HOBs
//! ```
#![no_std]

mod config;
mod error;
mod phase;
mod relocate;
mod resource;
mod scan;

pub use config::PlatformConfig;
pub use error::PhaseError;
pub use phase::{PhaseReport, PhaseState, PlatformPhase};
pub use relocate::{relocate, RelocatedTree};
pub use resource::{MmioWindow, ResourceError};
pub use scan::{reg_windows, scan, MalformedReg, RegWindows, ScanReport};
