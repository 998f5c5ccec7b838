//! Stateful reading of DICOM data from a byte source.

pub mod decode;

pub use self::decode::StatefulDecoder;
