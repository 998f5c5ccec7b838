#![allow(clippy::derive_partial_eq_without_eq)]
//! This crate contains the high-level entry points for delimiting
//! the pixel data of DICOM files.
//!
//! A file is read from the preamble up to the end of its pixel data:
//! the file meta group is skipped as a whole,
//! the elements of the main data set are skipped one by one
//! (descending into sequences of undefined length as needed),
//! and encapsulated pixel data is split into its fragments.
//! Values are never interpreted.
//!
//! Delimiting a DICOM file can be done with ease via the function [`open_file`].
//! For additional file reading options, use [`OpenFileOptions`].
//!
//! # Examples
//!
//! Find where the compressed payload starts:
//!
//! ```no_run
//! use dicm_object::open_file;
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let file = open_file("0001.dcm")?;
//!
//! if let Some(fragment) = file.pixel_data.as_ref().and_then(|p| p.first_fragment()) {
//!     println!("stream starts at {}, {} bytes", fragment.position, fragment.len);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Fragments can be written out as they are delimited,
//! by passing a [`FragmentSink`] such as [`WriteFragments`]:
//!
//! ```no_run
//! use dicm_object::{OpenFileOptions, WriteFragments};
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut out = WriteFragments::new(std::fs::File::create("payload.mp4")?);
//! let file = OpenFileOptions::new().open_file_with_sink("0002.dcm", &mut out)?;
//! # Ok(())
//! # }
//! ```
use snafu::Snafu;

pub mod file;
pub mod meta;
pub mod pixeldata;

pub use crate::file::{from_reader, open_file, DicmFile, OpenFileOptions, ReadPreamble};
pub use crate::meta::{probe, probe_score};
pub use crate::pixeldata::{CollectFragments, PixelDataLayout, WriteFragments};
pub use dicm_core::{DataElementHeader, Length, Tag, VR};
pub use dicm_parser::{DecodeOptions, FragmentInfo, FragmentSink};

/// An error which may occur when delimiting a DICOM file
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: std::path::PathBuf,
        backtrace: snafu::Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not parse meta group data set"))]
    ParseMetaDataSet {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },
    #[snafu(display("Could not delimit data set"))]
    DecodeDataSet {
        #[snafu(backtrace)]
        source: dicm_parser::dataset::Error,
    },
    #[snafu(display("Could not delimit pixel data"))]
    ReadPixelData {
        #[snafu(backtrace)]
        source: dicm_parser::dataset::Error,
    },
}

pub type Result<T, E = ReadError> = std::result::Result<T, E>;

impl ReadError {
    /// Check whether the error was caused by the source
    /// ending before the end of the pixel data,
    /// anywhere from the preamble onwards.
    pub fn is_truncated(&self) -> bool {
        match self {
            ReadError::ParseMetaDataSet { source } => source.is_truncated(),
            ReadError::DecodeDataSet { source } | ReadError::ReadPixelData { source } => {
                source.is_truncated()
            }
            _ => false,
        }
    }
}
