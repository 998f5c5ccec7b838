//! Layout of the pixel data in a DICOM file,
//! and the receivers of encapsulated pixel data fragments.
use dicm_parser::{FragmentInfo, FragmentSink};
use std::io::{self, Read, Write};

/// Where the pixel data value lies in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelDataLayout {
    /// Encapsulated pixel data: a basic offset table and a list of fragments,
    /// typically holding a compressed bit stream.
    Encapsulated {
        /// The basic offset table, absent only if the value
        /// had no items at all.
        offset_table: Option<FragmentInfo>,
        /// The fragments after the basic offset table, in order.
        fragments: Vec<FragmentInfo>,
        /// The number of bytes of the whole pixel data element,
        /// header and sequence delimiter included.
        total_length: u32,
    },
    /// Native pixel data: a single value of defined length.
    Native {
        /// The position of the first value byte.
        offset: u64,
        /// The value length.
        length: u32,
    },
}

impl PixelDataLayout {
    /// Retrieve the first fragment of encapsulated pixel data,
    /// which is where the payload stream starts.
    pub fn first_fragment(&self) -> Option<&FragmentInfo> {
        match self {
            PixelDataLayout::Encapsulated { fragments, .. } => fragments.first(),
            PixelDataLayout::Native { .. } => None,
        }
    }

    /// The number of payload bytes across all fragments,
    /// or the length of the native value.
    pub fn payload_length(&self) -> u64 {
        match self {
            PixelDataLayout::Encapsulated { fragments, .. } => {
                fragments.iter().map(|f| u64::from(f.len)).sum()
            }
            PixelDataLayout::Native { length, .. } => u64::from(*length),
        }
    }
}

/// A fragment sink which only records the extents of each item.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectFragments {
    offset_table: Option<FragmentInfo>,
    fragments: Vec<FragmentInfo>,
}

impl CollectFragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// The basic offset table, if one was received.
    pub fn basic_offset_table(&self) -> Option<&FragmentInfo> {
        self.offset_table.as_ref()
    }

    /// The fragments received so far.
    pub fn fragments(&self) -> &[FragmentInfo] {
        &self.fragments
    }

    /// Take the recorded offset table and fragments.
    pub fn into_parts(self) -> (Option<FragmentInfo>, Vec<FragmentInfo>) {
        (self.offset_table, self.fragments)
    }
}

impl FragmentSink for CollectFragments {
    fn offset_table(&mut self, info: FragmentInfo, _data: &mut dyn Read) -> io::Result<()> {
        self.offset_table = Some(info);
        Ok(())
    }

    fn fragment(&mut self, info: FragmentInfo, _data: &mut dyn Read) -> io::Result<()> {
        if info.index == 0 {
            tracing::debug!(
                "Payload stream starts at position {}, first fragment length is {}",
                info.position,
                info.len
            );
        }
        self.fragments.push(info);
        Ok(())
    }
}

/// A fragment sink which writes the fragment bytes to a writer,
/// one after the other.
/// The basic offset table is not written.
#[derive(Debug)]
pub struct WriteFragments<W> {
    to: W,
    first_only: bool,
    bytes_written: u64,
    write_failed: bool,
}

impl<W> WriteFragments<W>
where
    W: Write,
{
    /// Write all fragments to the given writer.
    pub fn new(to: W) -> Self {
        WriteFragments {
            to,
            first_only: false,
            bytes_written: 0,
            write_failed: false,
        }
    }

    /// Set whether only the first fragment should be written.
    pub fn first_only(mut self, first_only: bool) -> Self {
        self.first_only = first_only;
        self
    }

    /// The number of fragment bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether writing to the destination has failed,
    /// as opposed to reading from the source.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Flush and recover the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.to.flush()?;
        Ok(self.to)
    }
}

impl<W> FragmentSink for WriteFragments<W>
where
    W: Write,
{
    fn fragment(&mut self, info: FragmentInfo, data: &mut dyn Read) -> io::Result<()> {
        if self.first_only && info.index > 0 {
            return Ok(());
        }
        // read and write separately, so that failures can be told apart
        let mut buf = [0u8; 8192];
        loop {
            let n = match data.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if let Err(e) = self.to.write_all(&buf[..n]) {
                self.write_failed = true;
                return Err(e);
            }
            self.bytes_written += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: u32, position: u64, len: u32) -> FragmentInfo {
        FragmentInfo {
            index,
            position,
            len,
        }
    }

    #[test]
    fn collect_extents() {
        let mut sink = CollectFragments::new();
        sink.offset_table(info(0, 20, 0), &mut io::empty()).unwrap();
        sink.fragment(info(0, 28, 4), &mut &[1u8, 2, 3, 4][..]).unwrap();
        sink.fragment(info(1, 40, 2), &mut &[5u8, 6][..]).unwrap();
        assert_eq!(sink.basic_offset_table(), Some(&info(0, 20, 0)));
        assert_eq!(sink.fragments().len(), 2);

        let (offset_table, fragments) = sink.into_parts();
        let layout = PixelDataLayout::Encapsulated {
            offset_table,
            fragments,
            total_length: 64,
        };
        assert_eq!(layout.first_fragment(), Some(&info(0, 28, 4)));
        assert_eq!(layout.payload_length(), 6);
    }

    #[test]
    fn write_all_fragments() {
        let mut sink = WriteFragments::new(Vec::new());
        sink.offset_table(info(0, 20, 4), &mut &[9u8, 9, 9, 9][..])
            .unwrap();
        sink.fragment(info(0, 28, 4), &mut &[1u8, 2, 3, 4][..]).unwrap();
        sink.fragment(info(1, 40, 2), &mut &[5u8, 6][..]).unwrap();
        assert_eq!(sink.bytes_written(), 6);
        assert_eq!(sink.into_inner().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn write_first_fragment_only() {
        let mut sink = WriteFragments::new(Vec::new()).first_only(true);
        sink.fragment(info(0, 28, 4), &mut &[1u8, 2, 3, 4][..]).unwrap();
        sink.fragment(info(1, 40, 2), &mut &[5u8, 6][..]).unwrap();
        assert_eq!(sink.into_inner().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn failed_write_is_flagged() {
        let mut out = [0u8; 2];
        let mut sink = WriteFragments::new(&mut out[..]);
        assert!(sink
            .fragment(info(0, 28, 4), &mut &[1u8, 2, 3, 4][..])
            .is_err());
        assert!(sink.write_failed());
    }

    #[test]
    fn native_layout() {
        let layout = PixelDataLayout::Native {
            offset: 300,
            length: 512,
        };
        assert_eq!(layout.first_fragment(), None);
        assert_eq!(layout.payload_length(), 512);
    }
}
