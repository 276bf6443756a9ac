//! Hand-off blocks (HOBs) are the records one boot phase leaves behind for the next one.
//!
//! A HOB list is a linear sequence of little-endian records in a single buffer.
//! Every record starts with a generic header that contains the record type and its length so that consumers can skip
//! records they do not understand.
//! The list is always terminated by an end-of-list record.
//!
//! ```text
//! ┌────────────────────────────┐
//! │ resource descriptor        │
//! ├────────────────────────────┤
//! │ GUID extension             │
//! ├────────────────────────────┤
//! │ …                          │
//! ├────────────────────────────┤
//! │ end of list                │
//! ├────────────────────────────┤
//! │ (free space)               │
//! └────────────────────────────┘
//! ```
#![no_std]

mod guid;
mod list;
mod resource;

pub use guid::{Guid, FDT_HOB_GUID};
pub use list::{Hob, HobError, HobIter, HobList, HobType};
pub use resource::{ResourceAttribute, ResourceDescriptor, ResourceType};
