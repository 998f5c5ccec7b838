//! Delimiting of sequences, items and encapsulated pixel data
//! of undefined length.
//!
//! The three kinds of constructs nest into one another
//! (a sequence holds items, an item may hold sequences
//! or encapsulated pixel data).
//! Rather than recursing, the scanner keeps a stack of open constructs,
//! whose height is bounded by [`DecodeOptions::max_depth`].
//!
//! Every function returns the number of bytes consumed by the content
//! of the construct, from the first byte after its header
//! up to and including its closing delimiter.

use crate::dataset::{
    BadItemHeaderSnafu, DecodeOptions, DepthLimitExceededSnafu, ForwardFragmentSnafu,
    ForwardOffsetTableSnafu, FragmentInfo, FragmentSink, LengthOverflowSnafu, ReadHeaderSnafu,
    ReadItemHeaderSnafu, Result, SkipValueSnafu, UnexpectedTagSnafu, UnsupportedConstructSnafu,
};
use crate::stateful::decode::StatefulDecoder;
use dicm_core::header::{DataElementHeader, HasLength, Header, SequenceItemHeader};
use dicm_core::Tag;
use dicm_encoding::length::{length_of_defined, length_of_undefined};
use smallvec::SmallVec;
use snafu::{ensure, OptionExt, ResultExt};
use std::io::Read;

/// The kind of an open construct of undefined length.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
enum FrameKind {
    /// A sequence: a list of items closed by a sequence delimiter.
    Sequence,
    /// An item: explicit VR data elements closed by an item delimiter.
    Item,
    /// Encapsulated pixel data:
    /// raw fragment items closed by a sequence delimiter.
    Fragments,
}

/// An open construct of undefined length.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// The header which opened the construct.
    /// `None` for the construct the scan started in,
    /// unless the caller handed over the header it read.
    opener: Option<DataElementHeader>,
    /// Bytes consumed so far after the opener's header.
    total: u32,
    /// The tag of the last data element in this scope (items only).
    last_tag: Option<Tag>,
    /// The number of fragment items seen so far (encapsulated pixel data only).
    items: u32,
}

impl Frame {
    fn new(kind: FrameKind, opener: Option<DataElementHeader>) -> Self {
        Frame {
            kind,
            opener,
            total: 0,
            last_tag: None,
            items: 0,
        }
    }

    fn tag(&self) -> Tag {
        match (self.opener, self.kind) {
            (Some(header), _) => header.tag,
            (None, FrameKind::Item) | (None, FrameKind::Sequence) => Tag::ITEM,
            (None, FrameKind::Fragments) => Tag::PIXEL_DATA,
        }
    }

    /// Account for more bytes consumed in this construct.
    fn add(&mut self, len: u32) -> Result<()> {
        self.total = self
            .total
            .checked_add(len)
            .filter(|total| *total != u32::MAX)
            .context(LengthOverflowSnafu { tag: self.tag() })?;
        Ok(())
    }
}

/// What to do after a step of the scanner.
enum Step {
    /// Keep reading in the current construct.
    Continue,
    /// A nested construct of undefined length was opened.
    Open(Frame),
    /// The current construct was closed by its delimiter.
    Close,
}

/// Delimit the content of an item of undefined length,
/// right after the item header.
///
/// The item holds data elements in explicit VR and ends
/// with an item delimiter.
pub fn decode_undefined_item<S>(
    decoder: &mut StatefulDecoder<S>,
    options: &DecodeOptions,
) -> Result<u32>
where
    S: Read,
{
    scan(decoder, FrameKind::Item, None, options, None)
}

/// Delimit the content of a sequence of undefined length,
/// right after the sequence's element header.
///
/// The sequence holds items of defined or undefined length
/// and ends with a sequence delimiter.
/// Items of defined length are skipped without being looked into.
pub fn decode_undefined_sequence<S>(
    decoder: &mut StatefulDecoder<S>,
    options: &DecodeOptions,
) -> Result<u32>
where
    S: Read,
{
    scan(decoder, FrameKind::Sequence, None, options, None)
}

/// Delimit the sequence of undefined length introduced by the given header.
///
/// Returns the total number of bytes of the element,
/// header included.
/// Headers other than a sequence of undefined length are rejected.
pub fn decode_sequence_element<S>(
    decoder: &mut StatefulDecoder<S>,
    header: &DataElementHeader,
    options: &DecodeOptions,
) -> Result<u32>
where
    S: Read,
{
    ensure!(
        header.is_sequence() && header.is_undefined_length(),
        UnsupportedConstructSnafu {
            tag: header.tag,
            vr: header.vr,
            position: decoder.position(),
        }
    );
    let inner = scan(decoder, FrameKind::Sequence, Some(*header), options, None)?;
    length_of_undefined(header, inner).context(LengthOverflowSnafu { tag: header.tag })
}

/// Delimit the fragments of encapsulated pixel data,
/// right after the pixel data element header.
///
/// The first item is the basic offset table.
/// All items are skipped.
pub fn decode_encapsulated_fragments<S>(
    decoder: &mut StatefulDecoder<S>,
    options: &DecodeOptions,
) -> Result<u32>
where
    S: Read,
{
    scan(decoder, FrameKind::Fragments, None, options, None)
}

/// Delimit the encapsulated pixel data introduced by the given header,
/// handing the offset table and each fragment to the sink.
///
/// Returns the total number of bytes of the element,
/// header included.
/// Headers which do not introduce encapsulated pixel data
/// (undefined length with VR OB or OW) are rejected.
pub fn decode_encapsulated_pixel_data<S, K>(
    decoder: &mut StatefulDecoder<S>,
    header: &DataElementHeader,
    options: &DecodeOptions,
    mut sink: K,
) -> Result<u32>
where
    S: Read,
    K: FragmentSink,
{
    ensure!(
        header.is_encapsulated_pixeldata(),
        UnsupportedConstructSnafu {
            tag: header.tag,
            vr: header.vr,
            position: decoder.position(),
        }
    );
    let sink: &mut dyn FragmentSink = &mut sink;
    let inner = scan(decoder, FrameKind::Fragments, Some(*header), options, Some(sink))?;
    length_of_undefined(header, inner).context(LengthOverflowSnafu { tag: header.tag })
}

fn scan<S>(
    decoder: &mut StatefulDecoder<S>,
    kind: FrameKind,
    opener: Option<DataElementHeader>,
    options: &DecodeOptions,
    mut sink: Option<&mut (dyn FragmentSink + '_)>,
) -> Result<u32>
where
    S: Read,
{
    ensure!(
        options.max_depth > 0,
        DepthLimitExceededSnafu {
            max_depth: options.max_depth,
            position: decoder.position(),
        }
    );

    let mut parents: SmallVec<[Frame; 8]> = SmallVec::new();
    let mut current = Frame::new(kind, opener);
    loop {
        let step = match current.kind {
            FrameKind::Sequence => sequence_step(decoder, &mut current)?,
            FrameKind::Item => item_step(decoder, &mut current)?,
            FrameKind::Fragments => {
                // only the outermost pixel data goes to the sink
                let sink = if parents.is_empty() {
                    sink.as_deref_mut()
                } else {
                    None
                };
                fragments_step(decoder, &mut current, sink)?
            }
        };

        match step {
            Step::Continue => {}
            Step::Open(child) => {
                ensure!(
                    parents.len() + 2 <= options.max_depth as usize,
                    DepthLimitExceededSnafu {
                        max_depth: options.max_depth,
                        position: decoder.position(),
                    }
                );
                tracing::trace!(
                    "Entering {:?} at position {}, depth {}",
                    child.kind,
                    decoder.position(),
                    parents.len() + 2
                );
                parents.push(std::mem::replace(&mut current, child));
            }
            Step::Close => {
                let done = current;
                match parents.pop() {
                    None => return Ok(done.total),
                    Some(parent) => {
                        current = parent;
                        let len = done
                            .opener
                            .and_then(|opener| length_of_undefined(&opener, done.total))
                            .context(LengthOverflowSnafu { tag: done.tag() })?;
                        current.add(len)?;
                    }
                }
            }
        }
    }
}

/// Read the next item or the sequence delimiter in a sequence.
fn sequence_step<S>(decoder: &mut StatefulDecoder<S>, frame: &mut Frame) -> Result<Step>
where
    S: Read,
{
    let position = decoder.position();
    // each item starts a new scope
    let header = decoder.decode_implicit(None).context(ReadItemHeaderSnafu)?;
    match item_header(&header, position)? {
        SequenceItemHeader::SequenceDelimiter => {
            frame.add(8)?;
            Ok(Step::Close)
        }
        SequenceItemHeader::Item { len } if len.is_undefined() => {
            tracing::trace!("Item of undefined length at position {}", position);
            Ok(Step::Open(Frame::new(FrameKind::Item, Some(header))))
        }
        SequenceItemHeader::Item { len } => {
            tracing::trace!("Item of length {} at position {}", len, position);
            let total = length_of_defined(&header).context(LengthOverflowSnafu { tag: header.tag })?;
            frame.add(total)?;
            decoder.skip(len.0).context(SkipValueSnafu { tag: header.tag })?;
            Ok(Step::Continue)
        }
        SequenceItemHeader::ItemDelimiter => UnexpectedTagSnafu {
            tag: header.tag,
            position,
        }
        .fail(),
    }
}

/// Read the next data element or the item delimiter in an item.
fn item_step<S>(decoder: &mut StatefulDecoder<S>, frame: &mut Frame) -> Result<Step>
where
    S: Read,
{
    let position = decoder.position();
    let header = decoder
        .decode_explicit_in_item(frame.last_tag)
        .context(ReadHeaderSnafu)?;
    if header.is_item_delimiter() {
        frame.add(8)?;
        return Ok(Step::Close);
    }
    frame.last_tag = Some(header.tag);

    if header.is_undefined_length() {
        if header.is_encapsulated_pixeldata() {
            Ok(Step::Open(Frame::new(FrameKind::Fragments, Some(header))))
        } else if header.is_sequence() {
            Ok(Step::Open(Frame::new(FrameKind::Sequence, Some(header))))
        } else {
            UnsupportedConstructSnafu {
                tag: header.tag,
                vr: header.vr,
                position,
            }
            .fail()
        }
    } else {
        let total = length_of_defined(&header).context(LengthOverflowSnafu { tag: header.tag })?;
        frame.add(total)?;
        decoder
            .skip(header.length().0)
            .context(SkipValueSnafu { tag: header.tag })?;
        Ok(Step::Continue)
    }
}

/// Read the next fragment or the sequence delimiter in encapsulated pixel data.
fn fragments_step<S>(
    decoder: &mut StatefulDecoder<S>,
    frame: &mut Frame,
    sink: Option<&mut (dyn FragmentSink + '_)>,
) -> Result<Step>
where
    S: Read,
{
    let position = decoder.position();
    let header = decoder.decode_implicit(None).context(ReadItemHeaderSnafu)?;
    let len = match item_header(&header, position)? {
        SequenceItemHeader::SequenceDelimiter => {
            frame.add(8)?;
            return Ok(Step::Close);
        }
        SequenceItemHeader::ItemDelimiter => {
            return UnexpectedTagSnafu {
                tag: header.tag,
                position,
            }
            .fail()
        }
        SequenceItemHeader::Item { len } => match len.get() {
            Some(len) => len,
            None => {
                return UnsupportedConstructSnafu {
                    tag: header.tag,
                    vr: header.vr,
                    position,
                }
                .fail()
            }
        },
    };
    frame.add(8)?;
    frame.add(len)?;

    let item = frame.items;
    frame.items += 1;
    if len % 2 != 0 {
        tracing::warn!(
            "Pixel data item #{} at position {} has odd length {}",
            item,
            position,
            len
        );
    }

    match sink {
        Some(sink) => {
            let info = FragmentInfo {
                index: item.saturating_sub(1),
                position: position + 8,
                len,
            };
            tracing::trace!("Forwarding pixel data item #{} ({} bytes)", item, len);
            if item == 0 {
                decoder
                    .forward_value(len, |data| sink.offset_table(info, data))
                    .context(ForwardOffsetTableSnafu)?;
            } else {
                decoder
                    .forward_value(len, |data| sink.fragment(info, data))
                    .context(ForwardFragmentSnafu { index: info.index })?;
            }
        }
        None => {
            decoder
                .skip(len)
                .context(SkipValueSnafu { tag: header.tag })?;
        }
    }
    Ok(Step::Continue)
}

/// Interpret a header read in a sequence or in encapsulated pixel data,
/// which may only be an item or a delimiter.
fn item_header(header: &DataElementHeader, position: u64) -> Result<SequenceItemHeader> {
    ensure!(
        header.tag.is_delimiter_group(),
        UnexpectedTagSnafu {
            tag: header.tag,
            position,
        }
    );
    SequenceItemHeader::new(header.tag, header.len).context(BadItemHeaderSnafu { position })
}
