//! This module provides a stateful abstraction for reading DICOM data:
//! a forward-only byte source bound to the header decoders,
//! which keeps track of the number of bytes consumed so far.

use dicm_core::header::DataElementHeader;
use dicm_core::Tag;
use dicm_encoding::decode::Error as EncodingError;
use dicm_encoding::{Decode, ExplicitVRLittleEndianDecoder, ImplicitVRLittleEndianDecoder};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{self, Read};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not decode element header at position {}", position))]
    DecodeHeader {
        position: u64,
        #[snafu(backtrace)]
        source: EncodingError,
    },
    #[snafu(display("Could not skip {} value bytes at position {}", len, position))]
    SkipValue {
        len: u32,
        position: u64,
        source: io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not forward {} value bytes at position {}", len, position))]
    ForwardValue {
        len: u32,
        position: u64,
        source: io::Error,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check whether the error was caused by the source
    /// ending before the requested bytes were read.
    pub fn is_truncated(&self) -> bool {
        match self {
            Error::DecodeHeader { source, .. } => source.is_truncated(),
            Error::SkipValue { source, .. } | Error::ForwardValue { source, .. } => {
                source.kind() == io::ErrorKind::UnexpectedEof
            }
        }
    }
}

/// A stateful decoder of DICOM data element headers.
///
/// The decoder owns the byte source
/// and only ever moves forward in it.
/// Values are either skipped or forwarded to a consumer,
/// never interpreted.
#[derive(Debug)]
pub struct StatefulDecoder<S> {
    from: S,
    explicit: ExplicitVRLittleEndianDecoder,
    implicit: ImplicitVRLittleEndianDecoder,
    position: u64,
}

impl<S> StatefulDecoder<S>
where
    S: Read,
{
    /// Create a new stateful decoder at the beginning of the given source.
    pub fn new(from: S) -> Self {
        Self::new_with_position(from, 0)
    }

    /// Create a new stateful decoder over a source
    /// which already had `position` bytes read from it.
    ///
    /// The position only affects the reported offsets.
    pub fn new_with_position(from: S, position: u64) -> Self {
        StatefulDecoder {
            from,
            explicit: ExplicitVRLittleEndianDecoder::default(),
            implicit: ImplicitVRLittleEndianDecoder::default(),
            position,
        }
    }

    /// Decode the next data element header in explicit VR.
    ///
    /// `previous` is the tag of the previous element in the same scope.
    pub fn decode_explicit(&mut self, previous: Option<Tag>) -> Result<DataElementHeader> {
        let position = self.position;
        let (header, bytes_read) = self
            .explicit
            .decode_header(&mut self.from, previous)
            .context(DecodeHeaderSnafu { position })?;
        self.position += bytes_read as u64;
        Ok(header)
    }

    /// Decode the next data element header in explicit VR,
    /// or return `None` if the source ends right before it.
    pub fn decode_explicit_or_end(
        &mut self,
        previous: Option<Tag>,
    ) -> Result<Option<DataElementHeader>> {
        let position = self.position;
        match self
            .explicit
            .decode_header_or_end(&mut self.from, previous)
            .context(DecodeHeaderSnafu { position })?
        {
            Some((header, bytes_read)) => {
                self.position += bytes_read as u64;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Decode the next header inside an item of undefined length:
    /// either a data element header in explicit VR
    /// or the item delimiter.
    pub fn decode_explicit_in_item(&mut self, previous: Option<Tag>) -> Result<DataElementHeader> {
        let position = self.position;
        let (header, bytes_read) = self
            .explicit
            .decode_header_in_item(&mut self.from, previous)
            .context(DecodeHeaderSnafu { position })?;
        self.position += bytes_read as u64;
        Ok(header)
    }

    /// Decode the next header in implicit VR.
    /// This is the layout of items and delimiters.
    pub fn decode_implicit(&mut self, previous: Option<Tag>) -> Result<DataElementHeader> {
        let position = self.position;
        let (header, bytes_read) = self
            .implicit
            .decode_header(&mut self.from, previous)
            .context(DecodeHeaderSnafu { position })?;
        self.position += bytes_read as u64;
        Ok(header)
    }

    /// Skip exactly `len` bytes of value data.
    ///
    /// A source which ends before that is an error.
    pub fn skip(&mut self, len: u32) -> Result<()> {
        let position = self.position;
        let skipped = io::copy(
            &mut self.from.by_ref().take(u64::from(len)),
            &mut io::sink(),
        )
        .context(SkipValueSnafu { len, position })?;
        self.position += skipped;
        if skipped < u64::from(len) {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                .context(SkipValueSnafu { len, position });
        }
        Ok(())
    }

    /// Hand exactly `len` bytes of value data to the given consumer.
    ///
    /// The consumer sees a reader limited to the value.
    /// Whatever it leaves unread is skipped afterwards,
    /// so that the decoder always lands on the next header.
    pub fn forward_value<F>(&mut self, len: u32, consumer: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Read) -> io::Result<()>,
    {
        let position = self.position;
        let mut value = self.from.by_ref().take(u64::from(len));
        let outcome = consumer(&mut value)
            .and_then(|_| io::copy(&mut value, &mut io::sink()).map(|_| ()));
        let consumed = u64::from(len) - value.limit();
        self.position += consumed;
        outcome.context(ForwardValueSnafu { len, position })?;
        if consumed < u64::from(len) {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                .context(ForwardValueSnafu { len, position });
        }
        Ok(())
    }

    /// Retrieve the exact number of bytes read so far by the stateful decoder.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Recover the underlying source.
    pub fn into_inner(self) -> S {
        self.from
    }
}
