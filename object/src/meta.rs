//! Module containing the readers of the DICOM file framing:
//! the preamble, the magic code, and the file meta group.
//!
//! The file meta group is not interpreted.
//! Only its group length is read, so that it can be skipped as a whole.
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicm_core::header::{HasLength, Header};
use dicm_core::{tags, Length, Tag, VR};
use dicm_parser::stateful::decode::Error as DecoderError;
use dicm_parser::StatefulDecoder;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::Read;

/// The magic code which follows the preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

/// The length of the file preamble, in bytes.
pub const PREAMBLE_LENGTH: u32 = 128;

/// The score of a positive probe.
pub const PROBE_SCORE_MAX: u32 = 100;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The source ended before the end of the preamble.
    #[snafu(display("Could not read the file preamble"))]
    ReadPreamble {
        #[snafu(backtrace)]
        source: DecoderError,
    },

    /// The file meta group parser could not read
    /// the magic code `DICM` from its source.
    #[snafu(display("Could not start reading DICOM data"))]
    ReadMagicCode {
        #[snafu(backtrace)]
        source: DecoderError,
    },

    /// Invalid DICOM data, detected from checking the `DICM` code.
    #[snafu(display("Invalid DICOM data: found magic code {:02X?}", magic))]
    NotDicom { magic: [u8; 4], backtrace: Backtrace },

    /// An issue occurred while decoding the file meta group length element.
    #[snafu(display("Could not decode the file meta group length"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: DecoderError,
    },

    /// The first element of the file meta group
    /// was not the file meta group length.
    #[snafu(display("Unexpected data element tagged {}", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },

    /// The file meta group length was not encoded as an unsigned long.
    #[snafu(display("Unexpected value representation {:?} for data element tagged {}", vr, tag))]
    UnexpectedValueRepresentation {
        tag: Tag,
        vr: Option<VR>,
        backtrace: Backtrace,
    },

    /// The value length of the file meta group length was not 4.
    #[snafu(display("Unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// The file meta group parser could not fetch
    /// the value of the group length from its source.
    #[snafu(display("Could not read data value"))]
    ReadValueData {
        #[snafu(backtrace)]
        source: DecoderError,
    },

    /// The rest of the file meta group could not be skipped.
    #[snafu(display("Could not skip {} bytes of the file meta group", group_length))]
    SkipGroup {
        group_length: u32,
        #[snafu(backtrace)]
        source: DecoderError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check whether the error was caused by the source
    /// ending before the end of the file meta group.
    pub fn is_truncated(&self) -> bool {
        match self {
            Error::ReadPreamble { source }
            | Error::ReadMagicCode { source }
            | Error::DecodeElement { source }
            | Error::ReadValueData { source }
            | Error::SkipGroup { source, .. } => source.is_truncated(),
            _ => false,
        }
    }
}

/// Check whether the given leading bytes of a file
/// hold the magic code right after the preamble.
pub fn probe(buf: &[u8]) -> bool {
    let start = PREAMBLE_LENGTH as usize;
    buf.get(start..start + DICM_MAGIC_CODE.len()) == Some(&DICM_MAGIC_CODE[..])
}

/// Score the given leading bytes of a file:
/// [`PROBE_SCORE_MAX`] if they look like a DICOM file, 0 otherwise.
pub fn probe_score(buf: &[u8]) -> u32 {
    if probe(buf) {
        PROBE_SCORE_MAX
    } else {
        0
    }
}

/// Skip the 128-byte preamble. Its content is not checked.
pub fn read_preamble<S>(decoder: &mut StatefulDecoder<S>) -> Result<()>
where
    S: Read,
{
    decoder.skip(PREAMBLE_LENGTH).context(ReadPreambleSnafu)
}

/// Read the magic code `DICM`.
pub fn read_magic_code<S>(decoder: &mut StatefulDecoder<S>) -> Result<()>
where
    S: Read,
{
    let mut magic = [0u8; 4];
    decoder
        .forward_value(4, |data| data.read_exact(&mut magic))
        .context(ReadMagicCodeSnafu)?;
    ensure!(magic == DICM_MAGIC_CODE, NotDicomSnafu { magic });
    Ok(())
}

/// Read the file meta group length element and skip the rest of the group.
///
/// The first element must be the File Meta Information Group Length
/// (0002,0000), with VR UL and length 4.
/// Returns the group length,
/// which is the number of bytes skipped after that element.
pub fn read_meta_group<S>(decoder: &mut StatefulDecoder<S>) -> Result<u32>
where
    S: Read,
{
    let header = decoder.decode_explicit(None).context(DecodeElementSnafu)?;
    ensure!(
        header.tag() == tags::FILE_META_INFORMATION_GROUP_LENGTH,
        UnexpectedTagSnafu { tag: header.tag() }
    );
    ensure!(
        header.vr() == Some(VR::UL),
        UnexpectedValueRepresentationSnafu {
            tag: header.tag(),
            vr: header.vr(),
        }
    );
    ensure!(
        header.length() == Length(4),
        UnexpectedDataValueLengthSnafu {
            tag: header.tag(),
            length: header.length(),
        }
    );

    let mut buf = [0u8; 4];
    decoder
        .forward_value(4, |data| data.read_exact(&mut buf))
        .context(ReadValueDataSnafu)?;
    let group_length = LittleEndian::read_u32(&buf);

    decoder
        .skip(group_length)
        .context(SkipGroupSnafu { group_length })?;
    tracing::debug!(
        "Skipped {} bytes of file meta group, data set starts at position {}",
        group_length,
        decoder.position()
    );
    Ok(group_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[rustfmt::skip]
    const RAW: &[u8] = &[
        b'D', b'I', b'C', b'M',
        // (0002,0000) File Meta Information Group Length
        0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00,
            0x0E, 0x00, 0x00, 0x00,
        // (0002,0001) File Meta Information Version, OB, 2 bytes
        0x02, 0x00, 0x01, 0x00, b'O', b'B', 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x00, 0x01,
    ];

    #[test]
    fn probe_leading_bytes() {
        let mut buf = vec![0u8; 128];
        buf.extend_from_slice(b"DICM");
        assert!(probe(&buf));
        assert_eq!(probe_score(&buf), PROBE_SCORE_MAX);
        buf[130] = b'X';
        assert!(!probe(&buf));
        assert_eq!(probe_score(&buf), 0);
        // too short
        assert!(!probe(&buf[..130]));
    }

    #[test]
    fn read_magic_and_meta_group() {
        let mut decoder = StatefulDecoder::new(Cursor::new(RAW));
        read_magic_code(&mut decoder).unwrap();
        let group_length = read_meta_group(&mut decoder).unwrap();
        assert_eq!(group_length, 14);
        assert_eq!(decoder.position(), RAW.len() as u64);
    }

    #[test]
    fn read_preamble_then_magic() {
        let mut data = vec![0xAAu8; 128];
        data.extend_from_slice(RAW);
        let mut decoder = StatefulDecoder::new(Cursor::new(data));
        read_preamble(&mut decoder).unwrap();
        read_magic_code(&mut decoder).unwrap();
        assert_eq!(decoder.position(), 132);
    }

    #[test]
    fn bad_magic_code() {
        let mut decoder = StatefulDecoder::new(Cursor::new(&b"DICOM"[..]));
        let err = read_magic_code(&mut decoder).unwrap_err();
        assert!(
            matches!(err, Error::NotDicom { magic, .. } if &magic == b"DICO"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn short_preamble() {
        let mut decoder = StatefulDecoder::new(Cursor::new(vec![0u8; 100]));
        let err = read_preamble(&mut decoder).unwrap_err();
        assert!(matches!(err, Error::ReadPreamble { .. }), "got {:?}", err);
        assert!(err.is_truncated());
    }

    #[test]
    fn unexpected_first_meta_element() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x02, 0x00, 0x01, 0x00, b'O', b'B', 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        let err = read_meta_group(&mut StatefulDecoder::new(Cursor::new(raw))).unwrap_err();
        assert!(matches!(err, Error::UnexpectedTag { .. }), "got {:?}", err);

        // group length with the wrong VR
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x02, 0x00, 0x00, 0x00, b'U', b'S', 0x02, 0x00, 0x0A, 0x00,
        ];
        let err = read_meta_group(&mut StatefulDecoder::new(Cursor::new(raw))).unwrap_err();
        assert!(
            matches!(err, Error::UnexpectedValueRepresentation { vr: Some(VR::US), .. }),
            "got {:?}",
            err
        );

        // group length with the wrong length
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x08, 0x00,
            0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let err = read_meta_group(&mut StatefulDecoder::new(Cursor::new(raw))).unwrap_err();
        assert!(matches!(err, Error::UnexpectedDataValueLength { .. }), "got {:?}", err);
    }

    #[test]
    fn group_longer_than_source() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0x20, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x01, 0x00,
        ];
        let err = read_meta_group(&mut StatefulDecoder::new(Cursor::new(raw))).unwrap_err();
        assert!(matches!(err, Error::SkipGroup { group_length: 32, .. }), "got {:?}", err);
        assert!(err.is_truncated());
    }

    #[test]
    fn short_group_length_value() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0x20, 0x00,
        ];
        let err = read_meta_group(&mut StatefulDecoder::new(Cursor::new(raw))).unwrap_err();
        assert!(matches!(err, Error::ReadValueData { .. }), "got {:?}", err);
        assert!(err.is_truncated());

        // a wrong magic code is not a short source
        let err = read_magic_code(&mut StatefulDecoder::new(Cursor::new(&b"DICX"[..]))).unwrap_err();
        assert!(!err.is_truncated());
    }
}
