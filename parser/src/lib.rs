//! This crate provides a middle-level reader of DICOM content:
//! a stateful decoder bound to a byte source,
//! and the scanners which delimit a data set,
//! its sequences and items of undefined length,
//! and encapsulated pixel data.
//!
//! Value bytes are skipped without being interpreted,
//! except for the fragments of encapsulated pixel data,
//! which can be forwarded to a [`FragmentSink`](dataset::FragmentSink).
//! For the time being, all APIs are based on synchronous I/O.

pub mod dataset;
pub mod stateful;

pub use dataset::{DatasetEnd, DecodeOptions, FragmentInfo, FragmentSink};
pub use stateful::decode::StatefulDecoder;
