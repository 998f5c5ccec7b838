#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core library of DICM containing the primitive concepts
//! needed to delimit DICOM content without interpreting it.
//!
//! The current structure of this crate is as follows:
//!
//! - [`header`] comprises the data types for a DICOM element header:
//!   the attribute tag, the value representation and the value length,
//!   as well as sequence item headers.
//! - [`tags`] holds the few well-known tags that steer decoding.
//!
//! [`header`]: ./header/index.html
//! [`tags`]: ./tags/index.html

pub mod header;
pub mod tags;

pub use header::{DataElementHeader, Length, SequenceItemHeader, Tag, VR};
