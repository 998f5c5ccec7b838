//! Accounting of the serialized size of data elements.
//!
//! These functions never touch a source.
//! They let the scanners of nested constructs report
//! how many bytes a construct occupied on the wire
//! without reading it back.

use dicm_core::header::{DataElementHeader, HasLength};

/// The size in bytes of the header that introduced the given element.
///
/// Headers without a VR (implicit VR, items and delimiters)
/// and explicit headers of short-form VRs take 8 bytes.
/// Explicit headers of long-form VRs take 12 bytes.
pub fn header_length(header: &DataElementHeader) -> u32 {
    match header.vr() {
        Some(vr) if vr.is_long_form() => 12,
        _ => 8,
    }
}

/// The total size of an element with a defined length:
/// its header plus its value.
///
/// Returns `None` if the length is undefined,
/// or if the total does not fit a defined 32-bit length.
pub fn length_of_defined(header: &DataElementHeader) -> Option<u32> {
    let len = header.length().get()?;
    header_length(header)
        .checked_add(len)
        .filter(|total| *total != u32::MAX)
}

/// The total size of an element with an undefined length,
/// given the accounted size of its nested content
/// (including the closing delimiter).
///
/// Returns `None` if the element's length is defined,
/// or if the total does not fit a defined 32-bit length.
pub fn length_of_undefined(header: &DataElementHeader, inner: u32) -> Option<u32> {
    if !header.length().is_undefined() {
        return None;
    }
    header_length(header)
        .checked_add(inner)
        .filter(|total| *total != u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicm_core::{Length, Tag, VR};

    #[test]
    fn header_sizes() {
        let short = DataElementHeader::new(Tag(0x0008, 0x0000), VR::UL, Length(4));
        assert_eq!(header_length(&short), 8);
        let long = DataElementHeader::new(Tag(0x0008, 0x041B), VR::OB, Length(2));
        assert_eq!(header_length(&long), 12);
        let unknown = DataElementHeader::new(Tag(0x0009, 0x0010), VR::Unrecognized(*b"XY"), Length(2));
        assert_eq!(header_length(&unknown), 12);
        let implicit = DataElementHeader::implicit(Tag::ITEM, Length(10));
        assert_eq!(header_length(&implicit), 8);
    }

    #[test]
    fn defined_lengths() {
        let elem = DataElementHeader::new(Tag(0x0008, 0x0000), VR::UL, Length(4));
        assert_eq!(length_of_defined(&elem), Some(12));
        let elem = DataElementHeader::new(Tag(0x0008, 0x041B), VR::OB, Length(0));
        assert_eq!(length_of_defined(&elem), Some(12));
        let item = DataElementHeader::implicit(Tag::ITEM, Length(10));
        assert_eq!(length_of_defined(&item), Some(18));

        // precondition violated
        let seq = DataElementHeader::new(Tag(0x0008, 0x1115), VR::SQ, Length::UNDEFINED);
        assert_eq!(length_of_defined(&seq), None);
        // largest total that still fits
        let big = DataElementHeader::new(Tag(0x0008, 0x041B), VR::OB, Length(0xFFFF_FFF0));
        assert_eq!(length_of_defined(&big), Some(0xFFFF_FFFC));
        // overflow
        let huge = DataElementHeader::new(Tag(0x0008, 0x041B), VR::OB, Length(0xFFFF_FFF8));
        assert_eq!(length_of_defined(&huge), None);
        // a total equal to the undefined length marker
        let marker = DataElementHeader::new(Tag(0x0008, 0x041B), VR::OB, Length(0xFFFF_FFF3));
        assert_eq!(length_of_defined(&marker), None);
    }

    #[test]
    fn undefined_lengths() {
        let seq = DataElementHeader::new(Tag(0x0008, 0x1115), VR::SQ, Length::UNDEFINED);
        assert_eq!(length_of_undefined(&seq, 26), Some(38));
        let item = DataElementHeader::implicit(Tag::ITEM, Length::UNDEFINED);
        assert_eq!(length_of_undefined(&item, 8), Some(16));

        // precondition violated
        let elem = DataElementHeader::new(Tag(0x0008, 0x0000), VR::UL, Length(4));
        assert_eq!(length_of_undefined(&elem, 4), None);
        // overflow, including the undefined length marker itself
        assert_eq!(length_of_undefined(&item, u32::MAX - 8), None);
        assert_eq!(length_of_undefined(&item, u32::MAX), None);
    }
}
