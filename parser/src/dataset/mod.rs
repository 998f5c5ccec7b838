//! Delimiting of DICOM data sets.
//!
//! The data set is scanned element by element,
//! descending into sequences, items and encapsulated pixel data
//! of undefined length only as far as necessary
//! to find where each of them ends.
//! Values are skipped, with the exception of encapsulated pixel data fragments,
//! which can be handed to a [`FragmentSink`].
use crate::stateful::decode::Error as DecoderError;
use dicm_core::header::SequenceItemHeaderError;
use dicm_core::{Tag, VR};
use snafu::{Backtrace, Snafu};
use std::io::{self, Read};

pub mod read;
pub mod sequence;

pub use self::read::{decode_dataset, DatasetEnd};
pub use self::sequence::{
    decode_encapsulated_fragments, decode_encapsulated_pixel_data, decode_sequence_element,
    decode_undefined_item, decode_undefined_sequence,
};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read element header"))]
    ReadHeader {
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Could not read item header"))]
    ReadItemHeader {
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Invalid item header at position {}", position))]
    BadItemHeader {
        position: u64,
        #[snafu(backtrace)]
        source: SequenceItemHeaderError,
    },
    #[snafu(display("Could not skip the value of element tagged {}", tag))]
    SkipValue {
        tag: Tag,
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Could not forward the basic offset table"))]
    ForwardOffsetTable {
        #[snafu(backtrace)]
        source: DecoderError,
    },
    /// The index counts fragments from 0 after the basic offset table,
    /// as in [`FragmentInfo::index`].
    #[snafu(display("Could not forward pixel data fragment #{}", index))]
    ForwardFragment {
        index: u32,
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Unexpected tag {} at position {}", tag, position))]
    UnexpectedTag {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Unsupported undefined length in element {} with VR {:?} at position {}",
        tag,
        vr,
        position
    ))]
    UnsupportedConstruct {
        tag: Tag,
        vr: Option<VR>,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Nesting deeper than {} levels at position {}",
        max_depth,
        position
    ))]
    DepthLimitExceeded {
        max_depth: u32,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Accounted length of {} does not fit in 32 bits", tag))]
    LengthOverflow { tag: Tag, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check whether the error was caused by the source
    /// ending in the middle of the data set.
    pub fn is_truncated(&self) -> bool {
        match self {
            Error::ReadHeader { source }
            | Error::ReadItemHeader { source }
            | Error::SkipValue { source, .. }
            | Error::ForwardOffsetTable { source }
            | Error::ForwardFragment { source, .. } => source.is_truncated(),
            _ => false,
        }
    }
}

/// The default maximum nesting depth of undefined length constructs.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Options for delimiting a data set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DecodeOptions {
    /// The maximum number of undefined length constructs
    /// (sequences, items and encapsulated pixel data)
    /// which may be open at the same time.
    pub max_depth: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth of undefined length constructs.
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// The extent of an item in encapsulated pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FragmentInfo {
    /// The index of the fragment, counting from 0 after the basic offset table.
    /// Always 0 for the basic offset table itself.
    pub index: u32,
    /// The position of the first value byte in the source.
    pub position: u64,
    /// The number of value bytes.
    pub len: u32,
}

/// A receiver of the delimited items of encapsulated pixel data.
///
/// The basic offset table arrives first, then each fragment in order.
/// Bytes left unread in `data` are skipped once the method returns.
pub trait FragmentSink {
    /// Receive the basic offset table. It is not interpreted by default.
    fn offset_table(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        let _ = (info, data);
        Ok(())
    }

    /// Receive a pixel data fragment.
    fn fragment(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()>;
}

impl<T: ?Sized> FragmentSink for &mut T
where
    T: FragmentSink,
{
    fn offset_table(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        (**self).offset_table(info, data)
    }

    fn fragment(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        (**self).fragment(info, data)
    }
}
