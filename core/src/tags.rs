//! Constants for the attribute tags that steer the delimiting process.
//!
//! Only the handful of tags needed to frame a file and to find
//! the encapsulated pixel data are listed here.
use crate::header::Tag;

/// File Meta Information Group Length (0002,0000)
pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// Pixel Data (7FE0,0010)
pub const PIXEL_DATA: Tag = Tag::PIXEL_DATA;
/// Item (FFFE,E000)
pub const ITEM: Tag = Tag::ITEM;
/// Item Delimitation Item (FFFE,E00D)
pub const ITEM_DELIMITATION_ITEM: Tag = Tag::ITEM_DELIMITER;
/// Sequence Delimitation Item (FFFE,E0DD)
pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag::SEQUENCE_DELIMITER;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_tags() {
        assert_eq!(FILE_META_INFORMATION_GROUP_LENGTH, Tag(0x0002, 0x0000));
        assert_eq!(PIXEL_DATA, Tag(0x7FE0, 0x0010));
        assert_eq!(ITEM, Tag(0xFFFE, 0xE000));
        assert_eq!(ITEM_DELIMITATION_ITEM, Tag(0xFFFE, 0xE00D));
        assert_eq!(SEQUENCE_DELIMITATION_ITEM, Tag(0xFFFE, 0xE0DD));
        assert!(ITEM.is_delimiter_group());
        assert!(!PIXEL_DATA.is_delimiter_group());
    }
}
