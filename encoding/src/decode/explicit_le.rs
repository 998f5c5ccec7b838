//! Explicit VR Little Endian header decoding

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    check_order, read_tag_or_end, BasicDecode, Decode, DelimiterLengthSnafu, InvalidVrSnafu,
    MalformedPaddingSnafu, ReadLengthSnafu, ReadReservedSnafu, ReadTagSnafu, ReadVrSnafu, Result,
    UnexpectedItemTagSnafu,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicm_core::header::{DataElementHeader, Length};
use dicm_core::{Tag, VR};
use snafu::{ensure, ResultExt};
use std::io::Read;

/// A data element header decoder for the Explicit VR Little Endian encoding.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl ExplicitVRLittleEndianDecoder {
    /// Decode the next header inside an item of undefined length.
    ///
    /// This is the same as [`Decode::decode_header`],
    /// except that the item delimiter may be found instead of a data element.
    /// The item delimiter has no VR on the wire:
    /// it is followed by a 32-bit length which must be zero,
    /// and it is returned with no VR.
    /// Any other tag of the item group (FFFE) is rejected.
    pub fn decode_header_in_item<S>(
        &self,
        source: &mut S,
        previous: Option<Tag>,
    ) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        let tag = self.basic.decode_tag(&mut *source).context(ReadTagSnafu)?;
        check_order(tag, previous)?;

        if tag == Tag::ITEM_DELIMITER {
            let len = self.basic.decode_ul(&mut *source).context(ReadLengthSnafu)?;
            ensure!(
                len == 0,
                DelimiterLengthSnafu {
                    tag,
                    len: Length(len)
                }
            );
            return Ok((DataElementHeader::implicit(tag, Length(0)), 8));
        }
        ensure!(!tag.is_delimiter_group(), UnexpectedItemTagSnafu { tag });

        self.decode_after_tag(source, tag)
    }

    /// Decode the VR and the value length of a header whose tag was read.
    fn decode_after_tag<S>(&self, source: &mut S, tag: Tag) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve explicit VR
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let bytes = [buf[0], buf[1]];
        let vr = match VR::from_binary(bytes) {
            Some(vr) => vr,
            None => return InvalidVrSnafu { tag, bytes }.fail(),
        };

        if vr.is_long_form() {
            // PS3.5 7.1.2:
            // for all other VRs the 16 bits following the two byte VR Field
            // are reserved for use by later versions of the DICOM Standard.
            // These reserved bytes shall be set to 0000H.
            // The Value Length Field is a 32-bit unsigned integer.
            source
                .read_exact(&mut buf[0..2])
                .context(ReadReservedSnafu)?;
            let padding = LittleEndian::read_u16(&buf[0..2]);
            ensure!(padding == 0, MalformedPaddingSnafu { tag, padding });

            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            Ok((DataElementHeader::new(tag, vr, Length(len)), 12))
        } else {
            // 16-bit value length right after the VR
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            let len = u32::from(LittleEndian::read_u16(&buf[0..2]));
            Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
        }
    }
}

impl Decode for ExplicitVRLittleEndianDecoder {
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
        self.decode_after_tag(source, tag).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::ExplicitVRLittleEndianDecoder;
    use crate::decode::{Decode, Error};
    use dicm_core::header::{HasLength, Header, Length};
    use dicm_core::{Tag, VR};
    use std::io::{Cursor, Seek, SeekFrom};

    // manually crafting some DICOM data elements
    #[rustfmt::skip]
    const RAW: &[u8] = &[
        0x08, 0x00, 0x00, 0x00,     // (0008,0000) (LE) group length
            b'U', b'L',             // VR: UL
            0x04, 0x00,             // Length: 4 bytes (LE)
                0x10, 0x00, 0x00, 0x00,
        0x08, 0x00, 0x54, 0x00,     // (0008,0054) (LE) Retrieve AE Title
            b'A', b'E',             // VR: AE (Application Entity)
            0x06, 0x00,             // Length: 6 bytes (LE)
                b'T', b'I', b'T', b'L', b'E', b' ',
        0x08, 0x00, 0x1B, 0x04,     // (0008,041B) (LE) RecordKey
            b'O', b'B',             // VR: OB (Other Byte)
            0x00, 0x00,             // Reserved, always 0
            0x02, 0x00, 0x00, 0x00, // Length: 2 bytes (LE)
                0x12, 0x34,
        0x10, 0x00, 0x10, 0x00,     // (0010,0010) (LE) Patient Name
            b'P', b'N',             // VR: PN (Person Name)
            0x00, 0x00,             // Length: 0 bytes (LE)
        0x10, 0x00, 0x20, 0x00,     // (0010,0020) (LE) Patient ID
            b'X', b'Y',             // VR: XY (not in the catalog)
            0x00, 0x00,             // Reserved, always 0
            0x04, 0x00, 0x00, 0x00, // Length: 4 bytes (LE)
                b'P', b'1', b'2', b'3',
        0x18, 0x00, 0x17, 0x99,     // (0018,9917) (LE) Instruction Description
            b'U', b'T',             // VR: UT (Unlimited Text)
            0x00, 0x00,             // Reserved, always 0
            0x08, 0x00, 0x00, 0x00, // Length: 8 bytes (LE)
                b'N', b'o', b' ', b't', b'e', b'x', b't', b' ',
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);

        // short form: 8 header bytes
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor, None)
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0008, 0x0000));
        assert_eq!(elem.vr(), Some(VR::UL));
        assert_eq!(elem.length(), Length(4));
        assert_eq!(bytes_read, 8);
        // there is no automatic skipping
        assert_eq!(cursor.stream_position().unwrap(), 8);
        // skipping the value lands on the next element
        assert_eq!(cursor.seek(SeekFrom::Current(4)).unwrap(), 12);

        let (elem, bytes_read) = dec
            .decode_header(&mut cursor, Some(Tag(0x0008, 0x0000)))
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0008, 0x0054));
        assert_eq!(elem.vr(), Some(VR::AE));
        assert_eq!(elem.length(), Length(6));
        assert_eq!(bytes_read, 8);
        cursor.seek(SeekFrom::Current(6)).unwrap();

        // long form: 12 header bytes
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor, Some(Tag(0x0008, 0x0054)))
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0008, 0x041B));
        assert_eq!(elem.vr(), Some(VR::OB));
        assert_eq!(elem.length(), Length(2));
        assert_eq!(bytes_read, 12);
        cursor.seek(SeekFrom::Current(2)).unwrap();

        // zero length value
        let (elem, _) = dec
            .decode_header(&mut cursor, Some(Tag(0x0008, 0x041B)))
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0010, 0x0010));
        assert_eq!(elem.length(), Length(0));
        let pos = cursor.stream_position().unwrap();

        // unrecognized codes use the long form
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor, Some(Tag(0x0010, 0x0010)))
            .expect("should find an element");
        assert_eq!(cursor.stream_position().unwrap(), pos + 12);
        assert_eq!(elem.vr(), Some(VR::Unrecognized(*b"XY")));
        assert_eq!(elem.length(), Length(4));
        assert_eq!(bytes_read, 12);
        cursor.seek(SeekFrom::Current(4)).unwrap();

        let (elem, _) = dec
            .decode_header(&mut cursor, Some(Tag(0x0010, 0x0020)))
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0018, 0x9917));
        assert_eq!(elem.vr(), Some(VR::UT));
        assert_eq!(elem.length(), Length(8));
        cursor.seek(SeekFrom::Current(8)).unwrap();

        // clean end of source
        assert!(dec
            .decode_header_or_end(&mut cursor, Some(Tag(0x0018, 0x9917)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn reject_invalid_vr() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x10, 0x00, 0x10, 0x00,
                b'Q', b'_',
                0x00, 0x00,
        ];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec.decode_header(&mut Cursor::new(raw), None).unwrap_err();
        assert!(
            matches!(err, Error::InvalidVr { tag, bytes: [b'Q', b'_'], .. } if tag == Tag(0x0010, 0x0010)),
            "got {:?}",
            err
        );
    }

    #[test]
    fn reject_non_zero_padding() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x08, 0x00, 0x1B, 0x04,
                b'O', b'B',
                0x01, 0x00,
                0x02, 0x00, 0x00, 0x00,
        ];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec.decode_header(&mut Cursor::new(raw), None).unwrap_err();
        assert!(
            matches!(err, Error::MalformedPadding { padding: 1, .. }),
            "got {:?}",
            err
        );
    }

    #[test]
    fn reject_out_of_order_tag() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x00, 0x00,
            0x10, 0x00, 0x05, 0x00, b'S', b'H', 0x00, 0x00,
        ];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(raw);
        let (first, _) = dec.decode_header(&mut cursor, None).unwrap();
        assert_eq!(first.tag(), Tag(0x0010, 0x0010));
        let err = dec
            .decode_header(&mut cursor, Some(first.tag()))
            .unwrap_err();
        assert!(
            matches!(err, Error::OutOfOrderTag { tag, previous, .. }
                if tag == Tag(0x0010, 0x0005) && previous == Tag(0x0010, 0x0010)),
            "got {:?}",
            err
        );
    }

    #[test]
    fn truncated_header() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        // tag and VR only
        let raw: &[u8] = &[0x08, 0x00, 0x1B, 0x04, b'O', b'B'];
        let err = dec.decode_header(&mut Cursor::new(raw), None).unwrap_err();
        assert!(matches!(err, Error::ReadReserved { .. }), "got {:?}", err);
        assert!(err.is_truncated());

        // half a tag
        let raw: &[u8] = &[0x08, 0x00];
        let err = dec.decode_header(&mut Cursor::new(raw), None).unwrap_err();
        assert!(matches!(err, Error::ReadTag { .. }), "got {:?}", err);
        assert!(err.is_truncated());

        // nothing at all
        let err = dec.decode_header(&mut Cursor::new(&[][..]), None).unwrap_err();
        assert!(err.is_truncated());
    }

    // manually crafting the members of an undefined length item
    //  Tag: (0008,1150) Referenced SOP Class UID, VR UI, length 4
    // --
    //  Tag: (0008,3FFF) SQ with undefined length
    // --
    //  Tag: (FFFE,E00D) Item Delimitation Item
    //  Length: 0
    #[rustfmt::skip]
    const RAW_ITEM_MEMBERS: &[u8] = &[
        0x08, 0x00, 0x50, 0x11, b'U', b'I', 0x04, 0x00, b'1', b'.', b'2', 0x00,
        0x08, 0x00, 0xFF, 0x3F, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn decode_item_members() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW_ITEM_MEMBERS);

        let (elem, bytes_read) = dec.decode_header_in_item(&mut cursor, None).unwrap();
        assert_eq!(elem.tag(), Tag(0x0008, 0x1150));
        assert_eq!(elem.vr(), Some(VR::UI));
        assert_eq!(bytes_read, 8);
        cursor.seek(SeekFrom::Current(4)).unwrap();

        let (elem, bytes_read) = dec
            .decode_header_in_item(&mut cursor, Some(Tag(0x0008, 0x1150)))
            .unwrap();
        assert_eq!(elem.tag(), Tag(0x0008, 0x3FFF));
        assert!(elem.is_sequence());
        assert!(elem.length().is_undefined());
        assert_eq!(bytes_read, 12);

        let (elem, bytes_read) = dec
            .decode_header_in_item(&mut cursor, Some(Tag(0x0008, 0x3FFF)))
            .unwrap();
        assert!(elem.is_item_delimiter());
        assert_eq!(elem.vr(), None);
        assert_eq!(elem.length(), Length(0));
        assert_eq!(bytes_read, 8);
        assert_eq!(cursor.stream_position().unwrap(), RAW_ITEM_MEMBERS.len() as u64);
    }

    #[test]
    fn reject_item_delimiter_with_length() {
        let raw: &[u8] = &[0xFE, 0xFF, 0x0D, 0xE0, 0x02, 0x00, 0x00, 0x00];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec
            .decode_header_in_item(&mut Cursor::new(raw), None)
            .unwrap_err();
        assert!(matches!(err, Error::DelimiterLength { .. }), "got {:?}", err);
    }

    #[test]
    fn reject_stray_item_tag_in_item() {
        // a sequence delimiter where an element or item delimiter was expected
        let raw: &[u8] = &[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec
            .decode_header_in_item(&mut Cursor::new(raw), None)
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedItemTag { .. }), "got {:?}", err);
    }
}
