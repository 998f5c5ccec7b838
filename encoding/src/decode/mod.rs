//! This module contains all DICOM data element header decoding logic.
//!
//! Three header layouts are supported, all in little endian:
//!
//! - explicit VR, through [`ExplicitVRLittleEndianDecoder::decode_header`];
//! - explicit VR inside an undefined length item,
//!   where the item delimiter may show up in place of an element,
//!   through [`ExplicitVRLittleEndianDecoder::decode_header_in_item`];
//! - implicit VR, through [`ImplicitVRLittleEndianDecoder`].
//!
//! Only the header is consumed from the source.
//! Skipping or reading the value is the caller's responsibility.
//!
//! [`ExplicitVRLittleEndianDecoder::decode_header`]: explicit_le::ExplicitVRLittleEndianDecoder
//! [`ExplicitVRLittleEndianDecoder::decode_header_in_item`]: explicit_le::ExplicitVRLittleEndianDecoder::decode_header_in_item
//! [`ImplicitVRLittleEndianDecoder`]: implicit_le::ImplicitVRLittleEndianDecoder

use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use dicm_core::header::{DataElementHeader, Length};
use dicm_core::Tag;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{self, Read};

pub mod basic;
pub mod explicit_le;
pub mod implicit_le;

/// Module-level error type:
/// for errors which may occur while decoding DICOM data element headers.
///
/// The `Read*` variants report a source which ended
/// (or failed) in the middle of a header field.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to read the header's tag field"))]
    ReadTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's value representation"))]
    ReadVr {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's reserved bytes"))]
    ReadReserved {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's element length field"))]
    ReadLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Invalid value representation {:02X?} in element {}", bytes, tag))]
    InvalidVr {
        tag: Tag,
        bytes: [u8; 2],
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Reserved bytes before the value length of element {} should be zero, found {:#06X}",
        tag,
        padding
    ))]
    MalformedPadding {
        tag: Tag,
        padding: u16,
        backtrace: Backtrace,
    },
    #[snafu(display("Element tag {} does not come after previous tag {}", tag, previous))]
    OutOfOrderTag {
        tag: Tag,
        previous: Tag,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected item tag {} in place of a data element", tag))]
    UnexpectedItemTag { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Delimiter {} should have a zero length, found {}", tag, len))]
    DelimiterLength {
        tag: Tag,
        len: Length,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check whether the error was caused by the source
    /// ending in the middle of a header.
    pub fn is_truncated(&self) -> bool {
        match self {
            Error::ReadTag { source, .. }
            | Error::ReadVr { source, .. }
            | Error::ReadReserved { source, .. }
            | Error::ReadLength { source, .. } => source.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/** Type trait for reading and decoding basic data values from a data source.
 *
 * This trait aims to provide methods for reading binary numbers based on the
 * source's endianness.
 */
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, mut source: S) -> std::io::Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}

/** Type trait for reading and decoding DICOM data element headers.
 *
 * The methods receive the tag of the previous element in the same scope,
 * if there is one,
 * and fail if the new tag does not come strictly after it.
 */
pub trait Decode {
    /// Fetch and decode the next data element header from the given source,
    /// or return `None` if the source ends right before it.
    ///
    /// A source ending anywhere else inside the header is an error.
    /// On success,
    /// the header is returned together with the number of bytes read.
    fn decode_header_or_end<S>(
        &self,
        source: &mut S,
        previous: Option<Tag>,
    ) -> Result<Option<(DataElementHeader, usize)>>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next data element header from the given source.
    /// This method returns the header and the exact number of bytes read.
    fn decode_header<S>(
        &self,
        source: &mut S,
        previous: Option<Tag>,
    ) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        match self.decode_header_or_end(source, previous)? {
            Some(out) => Ok(out),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof)).context(ReadTagSnafu),
        }
    }
}

/// Read a little endian tag,
/// distinguishing a source that ends right away (`None`)
/// from one that ends in the middle of the tag (error).
pub(crate) fn read_tag_or_end<S>(source: &mut S) -> io::Result<Option<Tag>>
where
    S: ?Sized + Read,
{
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Some(Tag(
        LittleEndian::read_u16(&buf[0..2]),
        LittleEndian::read_u16(&buf[2..4]),
    )))
}

/// Ensure that the tag comes strictly after the previous one in scope.
pub(crate) fn check_order(tag: Tag, previous: Option<Tag>) -> Result<()> {
    if let Some(previous) = previous {
        ensure!(tag > previous, OutOfOrderTagSnafu { tag, previous });
    }
    Ok(())
}
