//! This module contains the top level scan of a data set:
//! the elements of the main data set are read in order
//! until the pixel data element is found.
use crate::dataset::sequence::decode_sequence_element;
use crate::dataset::{
    DecodeOptions, ReadHeaderSnafu, Result, SkipValueSnafu, UnexpectedTagSnafu,
    UnsupportedConstructSnafu,
};
use crate::stateful::decode::StatefulDecoder;
use dicm_core::header::{DataElementHeader, HasLength};
use dicm_core::Tag;
use snafu::{ensure, ResultExt};
use std::io::Read;

/// How the scan of a data set came to an end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatasetEnd {
    /// An element with a tag at or after Pixel Data (7FE0,0010) was found.
    /// Its header has been read, its value has not.
    PixelData(DataElementHeader),
    /// The source ended right after the last element.
    EndOfStream,
}

/// Scan the elements of a data set in explicit VR little endian,
/// starting at the decoder's current position,
/// until the pixel data element.
///
/// Values of defined length are skipped,
/// sequences of undefined length are delimited and skipped.
/// Any other element of undefined length is not supported.
pub fn decode_dataset<S>(
    decoder: &mut StatefulDecoder<S>,
    options: &DecodeOptions,
) -> Result<DatasetEnd>
where
    S: Read,
{
    let mut previous: Option<Tag> = None;
    loop {
        let position = decoder.position();
        let header = match decoder
            .decode_explicit_or_end(previous)
            .context(ReadHeaderSnafu)?
        {
            Some(header) => header,
            None => {
                tracing::debug!("Data set ended at position {} without pixel data", position);
                return Ok(DatasetEnd::EndOfStream);
            }
        };
        tracing::debug!("{} : {}", position, header.tag);

        ensure!(
            !header.tag.is_delimiter_group(),
            UnexpectedTagSnafu {
                tag: header.tag,
                position,
            }
        );
        if header.tag >= Tag::PIXEL_DATA {
            return Ok(DatasetEnd::PixelData(header));
        }
        previous = Some(header.tag);

        match header.length().get() {
            None if header.is_sequence() => {
                let len = decode_sequence_element(decoder, &header, options)?;
                tracing::trace!("Sequence {} took {} bytes", header.tag, len);
            }
            None => {
                return UnsupportedConstructSnafu {
                    tag: header.tag,
                    vr: header.vr,
                    position,
                }
                .fail()
            }
            Some(len) => {
                decoder
                    .skip(len)
                    .context(SkipValueSnafu { tag: header.tag })?;
            }
        }
    }
}
