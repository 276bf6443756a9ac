//! Library for handling [Device Tree](https://devicetree-specification.readthedocs.io/en/latest/index.html) data and their flattened encoding format ([fdt/dtb](https://devicetree-specification.readthedocs.io/en/latest/chapter5-flattened-format.html))
//!
//! Parsing works directly on the blob without allocating.
//! Building blobs (see `fdt::builder`) needs an allocator and is only available with the `builder` feature.
#![no_std]

#[cfg(any(test, feature = "builder"))]
extern crate alloc;

pub mod fdt;
