//! DICOM data element header decoding primitives.
//!
//! This crate reads the headers of data elements,
//! items and delimiters in little endian,
//! with or without an explicit value representation,
//! and accounts for the number of bytes each construct takes on the wire.
//!
//! Value bytes are never interpreted here.
//! For the time being, all APIs are based on synchronous I/O.

pub mod decode;
pub mod length;

pub use decode::explicit_le::ExplicitVRLittleEndianDecoder;
pub use decode::implicit_le::ImplicitVRLittleEndianDecoder;
pub use decode::{BasicDecode, Decode};
