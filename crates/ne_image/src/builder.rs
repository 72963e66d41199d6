use std::io::{Cursor, Seek, SeekFrom, Write};

use byyte::ByteWriter;

use crate::{
    FULL_SEGMENT_LENGTH, ImageError, MAX_ALIGNMENT_SHIFT, MZ_HEADER_SIZE, MZ_SIGNATURE, NE_ALIGNMENT_SHIFT_OFFSET,
    NE_HEADER_MIN_SIZE, NE_POINTER_OFFSET, NE_SEGMENT_COUNT_OFFSET, NE_SEGMENT_TABLE_OFFSET, NE_SIGNATURE,
    NEImage, SEGMENT_ENTRY_SIZE,
};

enum Placement {
    Next(Vec<u8>),
    At(usize, Vec<u8>),
    Raw { offset_units: u16, length: u16 },
}

/// Assembles minimal MZ/NE images: an MZ stub, an NE header carrying just the
/// fields the reader looks at, a segment table and the segment bytes.
pub struct NEImageBuilder {
    ne_offset: u32,
    alignment_shift: u8,
    segments: Vec<Placement>,
}

impl NEImageBuilder {
    pub fn new() -> Self {
        NEImageBuilder {
            ne_offset: MZ_HEADER_SIZE as u32,
            alignment_shift: 9,
            segments: Vec::new(),
        }
    }

    pub fn ne_offset(mut self, ne_offset: u32) -> Self {
        assert!(ne_offset as usize >= MZ_HEADER_SIZE, "NE header must follow the MZ header");
        self.ne_offset = ne_offset;
        self
    }

    pub fn alignment_shift(mut self, alignment_shift: u8) -> Self {
        assert!(alignment_shift <= MAX_ALIGNMENT_SHIFT, "Alignment shift too large");
        self.alignment_shift = alignment_shift;
        self
    }

    /// Places the segment at the next aligned offset after everything before it.
    pub fn segment(mut self, data: &[u8]) -> Self {
        Self::check_length(data);
        self.segments.push(Placement::Next(data.to_vec()));
        self
    }

    pub fn segment_at(mut self, file_offset: usize, data: &[u8]) -> Self {
        Self::check_length(data);
        self.segments.push(Placement::At(file_offset, data.to_vec()));
        self
    }

    /// Writes a table entry verbatim without placing any bytes for it.
    pub fn raw_segment(mut self, offset_units: u16, length: u16) -> Self {
        self.segments.push(Placement::Raw { offset_units, length });
        self
    }

    fn check_length(data: &[u8]) {
        assert!(
            !data.is_empty() && data.len() <= FULL_SEGMENT_LENGTH,
            "Segment must hold 1..=65536 bytes"
        );
    }

    fn unit(&self) -> usize {
        1 << self.alignment_shift
    }

    pub fn build(self) -> std::io::Result<Vec<u8>> {
        let unit = self.unit();
        let table_start = self.ne_offset as usize + NE_HEADER_MIN_SIZE;
        let data_start = table_start + self.segments.len() * SEGMENT_ENTRY_SIZE;

        let mut entries = Vec::with_capacity(self.segments.len());
        let mut cursor = data_start;
        let mut file_len = data_start;
        for placement in &self.segments {
            let (offset_units, length, data) = match placement {
                Placement::Next(data) => {
                    let file_offset = cursor.div_ceil(unit) * unit;
                    cursor = file_offset + data.len();
                    (file_offset / unit, data.len(), Some((file_offset, data)))
                }
                Placement::At(file_offset, data) => {
                    assert_eq!(file_offset % unit, 0, "Segment offset must be aligned");
                    cursor = cursor.max(file_offset + data.len());
                    (file_offset / unit, data.len(), Some((*file_offset, data)))
                }
                Placement::Raw { offset_units, length } => (*offset_units as usize, *length as usize, None),
            };
            assert!(offset_units <= u16::MAX as usize, "Segment offset does not fit the table");
            if let Some((file_offset, data)) = data {
                file_len = file_len.max(file_offset + data.len());
            }
            entries.push((offset_units as u16, (length % FULL_SEGMENT_LENGTH) as u16, data));
        }

        let mut bytes = vec![0u8; file_len];
        let mut writer = Cursor::new(bytes.as_mut_slice());

        writer.write_all(&MZ_SIGNATURE)?;
        writer.seek(SeekFrom::Start(NE_POINTER_OFFSET))?;
        writer.write_u32(self.ne_offset)?;

        let base = self.ne_offset as u64;
        writer.seek(SeekFrom::Start(base))?;
        writer.write_all(&NE_SIGNATURE)?;
        writer.seek(SeekFrom::Start(base + NE_SEGMENT_COUNT_OFFSET))?;
        writer.write_u16(entries.len() as u16)?;
        writer.seek(SeekFrom::Start(base + NE_SEGMENT_TABLE_OFFSET))?;
        writer.write_u16(NE_HEADER_MIN_SIZE as u16)?;
        writer.seek(SeekFrom::Start(base + NE_ALIGNMENT_SHIFT_OFFSET))?;
        writer.write_u8(self.alignment_shift)?;

        writer.seek(SeekFrom::Start(table_start as u64))?;
        for (offset_units, length, _) in &entries {
            writer.write_u16(*offset_units)?;
            writer.write_u16(*length)?;
            writer.write_u16(0)?; // flags
            writer.write_u16(*length)?;
        }

        for (_, _, data) in &entries {
            if let Some((file_offset, data)) = data {
                writer.seek(SeekFrom::Start(*file_offset as u64))?;
                writer.write_all(data)?;
            }
        }

        Ok(bytes)
    }

    pub fn build_image(self) -> Result<NEImage, ImageError> {
        NEImage::from_bytes(self.build()?)
    }
}

impl Default for NEImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
