use crate::meta;
use crate::pixeldata::{CollectFragments, PixelDataLayout};
use crate::{
    DecodeDataSetSnafu, OpenFileSnafu, ParseMetaDataSetSnafu, ReadPixelDataSnafu, Result,
};
use dicm_core::header::DataElementHeader;
use dicm_core::Tag;
use dicm_parser::dataset::{decode_dataset, decode_encapsulated_pixel_data, DatasetEnd};
use dicm_parser::{DecodeOptions, FragmentInfo, FragmentSink, StatefulDecoder};
use snafu::ResultExt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Delimit the pixel data in a DICOM file read from a byte source.
///
/// This function assumes the standard file encoding structure without the
/// preamble: magic code, file meta group, followed by the rest of the data set.
pub fn from_reader<F>(file: F) -> Result<DicmFile>
where
    F: Read,
{
    OpenFileOptions::new().from_reader(file)
}

/// Delimit the pixel data in the DICOM file at the given path.
///
/// This function assumes the standard file encoding structure: 128-byte
/// preamble, magic code, file meta group, and the rest of the data set.
pub fn open_file<P>(path: P) -> Result<DicmFile>
where
    P: AsRef<Path>,
{
    OpenFileOptions::new().open_file(path)
}

/// The outcome of delimiting a DICOM file.
#[derive(Debug, Clone, PartialEq)]
pub struct DicmFile {
    /// The length of the file meta group after its group length element.
    pub meta_group_length: u32,
    /// The header of the pixel data element,
    /// if the data set has one.
    pub pixel_data_header: Option<DataElementHeader>,
    /// Where the pixel data lies,
    /// if the data set has one.
    pub pixel_data: Option<PixelDataLayout>,
}

impl DicmFile {
    /// Whether the pixel data is encapsulated.
    pub fn is_encapsulated(&self) -> bool {
        matches!(self.pixel_data, Some(PixelDataLayout::Encapsulated { .. }))
    }
}

/// A builder type for opening a DICOM file with additional options.
///
/// This builder exposes additional properties
/// to configure the reading of a DICOM file.
///
/// # Example
///
/// Create a `OpenFileOptions`,
/// call adaptor methods in a chain,
/// and finish the operation with [`.open_file()`](OpenFileOptions::open_file).
///
/// ```no_run
/// # use dicm_object::{OpenFileOptions, ReadPreamble};
/// let file = OpenFileOptions::new()
///     .read_preamble(ReadPreamble::Always)
///     .max_depth(16)
///     .open_file("path/to/file.dcm")?;
/// # Result::<(), dicm_object::ReadError>::Ok(())
/// ```
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct OpenFileOptions {
    read_preamble: ReadPreamble,
    decode: DecodeOptions,
}

impl OpenFileOptions {
    pub fn new() -> Self {
        OpenFileOptions::default()
    }

    /// Set whether to read the 128-byte DICOM file preamble.
    pub fn read_preamble(mut self, option: ReadPreamble) -> Self {
        self.read_preamble = option;
        self
    }

    /// Set the maximum nesting depth of undefined length constructs.
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.decode = self.decode.max_depth(max_depth);
        self
    }

    /// Replace all data set decoding options.
    pub fn decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode = options;
        self
    }

    /// Open the file at the given path.
    pub fn open_file<P>(self, path: P) -> Result<DicmFile>
    where
        P: AsRef<Path>,
    {
        self.open_file_with_sink(path, NoSink)
    }

    /// Open the file at the given path,
    /// handing each encapsulated pixel data fragment to the given sink.
    pub fn open_file_with_sink<P, K>(self, path: P, sink: K) -> Result<DicmFile>
    where
        P: AsRef<Path>,
        K: FragmentSink,
    {
        let path = path.as_ref();
        let file =
            BufReader::new(File::open(path).with_context(|_| OpenFileSnafu { filename: path })?);
        let read_preamble = self.read_preamble != ReadPreamble::Never;
        read_file(file, read_preamble, &self.decode, sink)
    }

    /// Delimit the pixel data of a DICOM file read from a byte source.
    ///
    /// This method assumes
    /// the standard file encoding structure without the preamble:
    /// magic code, file meta group, followed by the rest of the data set.
    pub fn from_reader<R>(self, from: R) -> Result<DicmFile>
    where
        R: Read,
    {
        self.from_reader_with_sink(from, NoSink)
    }

    /// Delimit the pixel data of a DICOM file read from a byte source,
    /// handing each encapsulated pixel data fragment to the given sink.
    pub fn from_reader_with_sink<R, K>(self, from: R, sink: K) -> Result<DicmFile>
    where
        R: Read,
        K: FragmentSink,
    {
        let read_preamble = self.read_preamble == ReadPreamble::Always;
        read_file(from, read_preamble, &self.decode, sink)
    }
}

/// An enumerate of supported options for
/// whether to read the 128-byte DICOM file preamble.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ReadPreamble {
    /// Read the preamble only when opening a file by path,
    /// and do not read the preamble when reading from a byte source.
    #[default]
    Auto,
    /// Never read the preamble,
    /// thus assuming that the original source does not have it.
    Never,
    /// Always read the preamble first,
    /// thus assuming that the original source always has it.
    Always,
}

/// A sink which ignores every fragment.
#[derive(Debug, Copy, Clone)]
struct NoSink;

impl FragmentSink for NoSink {
    fn fragment(&mut self, _info: FragmentInfo, _data: &mut dyn Read) -> io::Result<()> {
        Ok(())
    }
}

/// Records the extents of each item before handing it over.
#[derive(Debug)]
struct Tracked<K> {
    extents: CollectFragments,
    inner: K,
}

impl<K> FragmentSink for Tracked<K>
where
    K: FragmentSink,
{
    fn offset_table(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        self.extents.offset_table(info, &mut io::empty())?;
        self.inner.offset_table(info, data)
    }

    fn fragment(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        self.extents.fragment(info, &mut io::empty())?;
        self.inner.fragment(info, data)
    }
}

/// Preamble, magic code, file meta group, data set, and pixel data.
fn read_file<S, K>(
    source: S,
    read_preamble: bool,
    options: &DecodeOptions,
    sink: K,
) -> Result<DicmFile>
where
    S: Read,
    K: FragmentSink,
{
    let mut decoder = StatefulDecoder::new(source);
    if read_preamble {
        meta::read_preamble(&mut decoder).context(ParseMetaDataSetSnafu)?;
    }
    meta::read_magic_code(&mut decoder).context(ParseMetaDataSetSnafu)?;
    let meta_group_length = meta::read_meta_group(&mut decoder).context(ParseMetaDataSetSnafu)?;

    let header = match decode_dataset(&mut decoder, options).context(DecodeDataSetSnafu)? {
        DatasetEnd::PixelData(header) if header.tag == Tag::PIXEL_DATA => header,
        DatasetEnd::PixelData(header) => {
            tracing::debug!("Data set has no pixel data, stopped at {}", header.tag);
            return Ok(DicmFile {
                meta_group_length,
                pixel_data_header: None,
                pixel_data: None,
            });
        }
        DatasetEnd::EndOfStream => {
            return Ok(DicmFile {
                meta_group_length,
                pixel_data_header: None,
                pixel_data: None,
            });
        }
    };

    let position = decoder.position();
    let layout = match header.len.get() {
        Some(length) => {
            tracing::debug!(
                "Native pixel data at position {}, length is {}",
                position,
                length
            );
            PixelDataLayout::Native {
                offset: position,
                length,
            }
        }
        None => {
            let mut tracked = Tracked {
                extents: CollectFragments::new(),
                inner: sink,
            };
            let total_length =
                decode_encapsulated_pixel_data(&mut decoder, &header, options, &mut tracked)
                    .context(ReadPixelDataSnafu)?;
            let (offset_table, fragments) = tracked.extents.into_parts();
            PixelDataLayout::Encapsulated {
                offset_table,
                fragments,
                total_length,
            }
        }
    };

    Ok(DicmFile {
        meta_group_length,
        pixel_data_header: Some(header),
        pixel_data: Some(layout),
    })
}
