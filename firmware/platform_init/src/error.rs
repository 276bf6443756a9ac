use crate::resource::ResourceError;
use allocators::AllocError;
use device_tree::fdt::{FdtError, OpenIntoError};
use hob::HobError;
use thiserror_no_std::Error;

/// The reasons for which the platform initialization phase can fail.
///
/// All of them are fatal, the phase does not retry anything and records that have already been added stay in place.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PhaseError {
    #[error("No device tree was handed over by the previous boot stage")]
    MissingInput,
    #[error("The device tree is corrupted: {0}")]
    CorruptInput(#[from] FdtError),
    #[error("Could not allocate memory for the device tree: {0}")]
    AllocationFailure(#[from] AllocError),
    #[error("Could not add a HOB: {0}")]
    AnnouncementFailure(#[from] HobError),
    #[error("Could not copy the device tree into its new location: {0}")]
    Relocation(#[from] OpenIntoError),
    #[error("The configured fixed MMIO window is invalid: {0}")]
    InvalidFixedWindow(#[from] ResourceError),
    #[error("The phase has already been run")]
    AlreadyRun,
}
