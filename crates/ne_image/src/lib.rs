pub mod builder;
pub mod error;

use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;

use byyte::ByteReader;
use log::debug;

pub use builder::NEImageBuilder;
pub use error::ImageError;

pub const MZ_SIGNATURE: [u8; 2] = *b"MZ";
pub const NE_SIGNATURE: [u8; 2] = *b"NE";

/// Size of the MZ header up to and including `e_lfanew`.
pub const MZ_HEADER_SIZE: usize = 0x40;
pub const NE_POINTER_OFFSET: u64 = 0x3C;

pub const NE_SEGMENT_COUNT_OFFSET: u64 = 0x1C;
pub const NE_SEGMENT_TABLE_OFFSET: u64 = 0x22;
pub const NE_ALIGNMENT_SHIFT_OFFSET: u64 = 0x32;
/// Bytes of NE header we need to be present to read the fields above.
pub const NE_HEADER_MIN_SIZE: usize = 0x40;

pub const SEGMENT_ENTRY_SIZE: usize = 8;
/// A stored segment length of zero means a full 64KiB segment.
pub const FULL_SEGMENT_LENGTH: usize = 0x10000;
pub const MAX_ALIGNMENT_SHIFT: u8 = 15;

#[derive(Debug, Clone)]
pub struct MZHeader {
    pub ne_offset: u32,
}

impl MZHeader {
    pub fn new<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<Self, ImageError> {
        let signature = reader.read_tag::<2>()?;
        if signature != MZ_SIGNATURE {
            return Err(ImageError::Format("not a recognized executable (missing MZ signature)".to_owned()));
        }

        reader.seek(SeekFrom::Start(NE_POINTER_OFFSET))?;
        let ne_offset = reader.read_u32()?;

        Ok(MZHeader { ne_offset })
    }
}

#[derive(Debug, Clone)]
pub struct NEHeader {
    /// Absolute file offset of the header; table offsets are relative to it.
    pub base: u64,
    pub segment_count: u16,
    pub segment_table_offset: u16,
    pub alignment_shift: u8,
}

impl NEHeader {
    pub fn new<R: std::io::Read + std::io::Seek>(reader: &mut R, base: u64) -> Result<Self, ImageError> {
        reader.seek(SeekFrom::Start(base))?;
        let signature = reader.read_tag::<2>()?;
        if signature != NE_SIGNATURE {
            return Err(ImageError::Format(format!(
                "not the expected sub-format (NE signature missing, found {signature:02X?})"
            )));
        }

        reader.seek(SeekFrom::Start(base + NE_SEGMENT_COUNT_OFFSET))?;
        let segment_count = reader.read_u16()?;
        reader.seek(SeekFrom::Start(base + NE_SEGMENT_TABLE_OFFSET))?;
        let segment_table_offset = reader.read_u16()?;
        reader.seek(SeekFrom::Start(base + NE_ALIGNMENT_SHIFT_OFFSET))?;
        let alignment_shift = reader.read_u8()?;

        if alignment_shift > MAX_ALIGNMENT_SHIFT {
            return Err(ImageError::Format(format!("alignment shift {alignment_shift} is too large")));
        }

        Ok(NEHeader {
            base,
            segment_count,
            segment_table_offset,
            alignment_shift,
        })
    }

    pub fn segment_table_start(&self) -> u64 {
        self.base + self.segment_table_offset as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    pub offset_units: u16,
    pub length: u16,
    pub flags: u16,
    pub min_alloc: u16,
}

impl SegmentEntry {
    pub fn new<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let offset_units = reader.read_u16()?;
        let length = reader.read_u16()?;
        let flags = reader.read_u16()?;
        let min_alloc = reader.read_u16()?;

        Ok(SegmentEntry {
            offset_units,
            length,
            flags,
            min_alloc,
        })
    }

    pub fn byte_length(&self) -> usize {
        if self.length == 0 {
            FULL_SEGMENT_LENGTH
        } else {
            self.length as usize
        }
    }
}

/// Where a segment's bytes live in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub index: u16,
    pub file_offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct NEImage {
    data: Vec<u8>,
    pub mz_header: MZHeader,
    pub ne_header: NEHeader,
    pub segments: Vec<SegmentEntry>,
}

impl NEImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        if data.len() < MZ_HEADER_SIZE {
            return Err(ImageError::Format(format!(
                "file too small to be a valid MZ/NE executable ({} bytes)",
                data.len()
            )));
        }

        let mut reader = Cursor::new(data.as_slice());
        let mz_header = MZHeader::new(&mut reader)?;

        let ne_base = mz_header.ne_offset as usize;
        if ne_base.saturating_add(NE_HEADER_MIN_SIZE) > data.len() {
            return Err(ImageError::Format(format!(
                "NE header at 0x{ne_base:X} lies past end of file"
            )));
        }
        let ne_header = NEHeader::new(&mut reader, ne_base as u64)?;

        let table_start = ne_header.segment_table_start() as usize;
        let table_end = table_start + ne_header.segment_count as usize * SEGMENT_ENTRY_SIZE;
        if table_end > data.len() {
            return Err(ImageError::Format(format!(
                "segment table 0x{table_start:X}..0x{table_end:X} extends past end of file"
            )));
        }

        reader.seek(SeekFrom::Start(table_start as u64))?;
        let mut segments = Vec::with_capacity(ne_header.segment_count as usize);
        for _ in 0..ne_header.segment_count {
            segments.push(SegmentEntry::new(&mut reader)?);
        }

        debug!(
            "NE header at 0x{:X}: {} segments, alignment shift {}",
            ne_base, ne_header.segment_count, ne_header.alignment_shift
        );

        Ok(NEImage {
            data,
            mz_header,
            ne_header,
            segments,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn segment_count(&self) -> u16 {
        self.ne_header.segment_count
    }

    /// Locates a segment by its 1-based index.
    pub fn segment(&self, index: u16) -> Result<SegmentDescriptor, ImageError> {
        if index < 1 || index > self.segment_count() {
            return Err(ImageError::Range(format!(
                "segment index {index} out of bounds 1..={}",
                self.segment_count()
            )));
        }

        let entry = &self.segments[(index - 1) as usize];
        let file_offset = (entry.offset_units as usize) << self.ne_header.alignment_shift;
        let length = entry.byte_length();

        if file_offset + length > self.data.len() {
            return Err(ImageError::Range(format!(
                "segment {index} (0x{file_offset:X}+0x{length:X}) extends past end of file (0x{:X})",
                self.data.len()
            )));
        }

        Ok(SegmentDescriptor {
            index,
            file_offset,
            length,
        })
    }

    pub fn read_segment(&self, index: u16) -> Result<&[u8], ImageError> {
        let descriptor = self.segment(index)?;
        debug!(
            "segment {} at 0x{:X}, 0x{:X} bytes",
            index, descriptor.file_offset, descriptor.length
        );
        Ok(&self.data[descriptor.file_offset..descriptor.file_offset + descriptor.length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_image() -> Vec<u8> {
        NEImageBuilder::new()
            .ne_offset(0x100)
            .alignment_shift(0)
            .segment_at(0x50, b"first")
            .segment_at(100, b"0123456789")
            .build()
            .expect("Failed to build image")
    }

    #[test]
    fn test_reads_segment_by_index() {
        let data = two_segment_image();
        let image = NEImage::from_bytes(data.clone()).expect("Failed to parse image");

        assert_eq!(image.segment_count(), 2);
        assert_eq!(image.read_segment(2).unwrap(), &data[100..110]);
        assert_eq!(image.read_segment(1).unwrap(), b"first");
    }

    #[test]
    fn test_segment_index_out_of_bounds() {
        let image = NEImage::from_bytes(two_segment_image()).unwrap();

        assert!(matches!(image.read_segment(3), Err(ImageError::Range(_))));
        assert!(matches!(image.read_segment(0), Err(ImageError::Range(_))));
    }

    #[test]
    fn test_rejects_missing_mz_signature() {
        let mut data = two_segment_image();
        data[0] = b'Z';
        assert!(matches!(NEImage::from_bytes(data), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_rejects_missing_ne_signature() {
        let mut data = two_segment_image();
        let ne = u32::from_le_bytes(data[0x3C..0x40].try_into().unwrap()) as usize;
        data[ne + 1] = b'X';
        assert!(matches!(NEImage::from_bytes(data), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_rejects_truncated_file() {
        assert!(matches!(NEImage::from_bytes(b"MZ\0\0".to_vec()), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_alignment_shift_scales_offset() {
        let data = NEImageBuilder::new()
            .alignment_shift(4)
            .segment_at(0x100, b"aligned")
            .build()
            .unwrap();
        let image = NEImage::from_bytes(data).unwrap();

        assert_eq!(image.segments[0].offset_units, 0x10);
        assert_eq!(image.segment(1).unwrap().file_offset, 0x100);
        assert_eq!(image.read_segment(1).unwrap(), b"aligned");
    }

    #[test]
    fn test_zero_length_means_full_segment() {
        let full = vec![0xAB; FULL_SEGMENT_LENGTH];
        let data = NEImageBuilder::new().alignment_shift(4).segment(&full).build().unwrap();
        let image = NEImage::from_bytes(data).unwrap();

        assert_eq!(image.segments[0].length, 0);
        assert_eq!(image.read_segment(1).unwrap().len(), FULL_SEGMENT_LENGTH);
    }

    fn patch(data: &mut [u8], offset: usize, bytes: &[u8]) {
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn ne_base(data: &[u8]) -> usize {
        u32::from_le_bytes(data[0x3C..0x40].try_into().unwrap()) as usize
    }

    #[test]
    fn test_rejects_oversized_alignment_shift() {
        let mut data = two_segment_image();
        let ne = ne_base(&data);
        patch(&mut data, ne + NE_ALIGNMENT_SHIFT_OFFSET as usize, &[MAX_ALIGNMENT_SHIFT + 1]);

        assert!(matches!(NEImage::from_bytes(data), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_rejects_segment_table_past_end_of_file() {
        let mut data = two_segment_image();
        let ne = ne_base(&data);
        patch(&mut data, ne + NE_SEGMENT_COUNT_OFFSET as usize, &0xFFu16.to_le_bytes());

        assert!(matches!(NEImage::from_bytes(data), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_rejects_ne_pointer_past_end_of_file() {
        let mut data = two_segment_image();
        patch(&mut data, NE_POINTER_OFFSET as usize, &0xFFFF_FFF0u32.to_le_bytes());

        assert!(matches!(NEImage::from_bytes(data), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_rejects_short_file_without_signature() {
        assert!(matches!(NEImage::from_bytes(b"PE".to_vec()), Err(ImageError::Format(_))));
    }

    #[test]
    fn test_segment_past_end_of_file() {
        let data = NEImageBuilder::new()
            .alignment_shift(0)
            .raw_segment(0x200, 0x40)
            .build()
            .unwrap();
        let image = NEImage::from_bytes(data).unwrap();

        assert!(matches!(image.read_segment(1), Err(ImageError::Range(_))));
    }
}
