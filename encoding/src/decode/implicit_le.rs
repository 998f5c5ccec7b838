//! Implicit VR Little Endian header decoding.
//!
//! Item headers and delimiters always follow this layout,
//! regardless of the data set's encoding.

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    check_order, read_tag_or_end, BasicDecode, Decode, ReadLengthSnafu, ReadTagSnafu, Result,
};
use dicm_core::header::{DataElementHeader, Length};
use dicm_core::Tag;
use snafu::ResultExt;
use std::io::Read;

/// A data element header decoder for the Implicit VR Little Endian encoding:
/// a tag followed by a 32-bit value length.
#[derive(Debug, Default, Clone)]
pub struct ImplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl Decode for ImplicitVRLittleEndianDecoder {
    fn decode_header_or_end<S>(
        &self,
        source: &mut S,
        previous: Option<Tag>,
    ) -> Result<Option<(DataElementHeader, usize)>>
    where
        S: ?Sized + Read,
    {
        let tag = match read_tag_or_end(source).context(ReadTagSnafu)? {
            Some(tag) => tag,
            None => return Ok(None),
        };
        check_order(tag, previous)?;
        let len = self.basic.decode_ul(source).context(ReadLengthSnafu)?;
        Ok(Some((DataElementHeader::implicit(tag, Length(len)), 8)))
    }
}
