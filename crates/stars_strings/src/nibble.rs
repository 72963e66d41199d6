use log::warn;

pub const CHUNK_BITS: u32 = 6;
pub const CHUNK_SIZE: usize = 1 << CHUNK_BITS;
pub const CONTINUATION_NIBBLE: u8 = 0x0F;
pub const PLACEHOLDER: char = '?';

/// Reads nibbles high-first out of a byte slice.
#[derive(Debug, Clone)]
pub struct NibbleReader<'a> {
    data: &'a [u8],
    pos: usize,
    high: bool,
}

impl<'a> NibbleReader<'a> {
    /// Starts `nibble_index` nibbles past `byte_offset`.
    pub fn new(data: &'a [u8], byte_offset: usize, nibble_index: usize) -> Self {
        NibbleReader {
            data,
            pos: byte_offset + nibble_index / 2,
            high: nibble_index % 2 == 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for NibbleReader<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        let nibble = if self.high {
            byte >> 4
        } else {
            self.pos += 1;
            byte & 0x0F
        };
        self.high = !self.high;
        Some(nibble)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedCatalog {
    pub strings: Vec<String>,
    /// Symbols that fell outside the lookup table and were replaced by [`PLACEHOLDER`].
    pub placeholder_count: usize,
}

pub fn decode_strings(lookup_table: &[u8], chunk_offsets: &[u16], nibble_lengths: &[u8], compressed: &[u8]) -> Vec<String> {
    decode_strings_with_report(lookup_table, chunk_offsets, nibble_lengths, compressed).strings
}

pub fn decode_strings_with_report(
    lookup_table: &[u8],
    chunk_offsets: &[u16],
    nibble_lengths: &[u8],
    compressed: &[u8],
) -> DecodedCatalog {
    let mut catalog = DecodedCatalog {
        strings: Vec::with_capacity(nibble_lengths.len()),
        placeholder_count: 0,
    };

    for (chunk, lengths) in nibble_lengths.chunks(CHUNK_SIZE).enumerate() {
        let Some(&base) = chunk_offsets.get(chunk) else {
            // IDs past the last chunk offset are left undefined by the format.
            catalog.strings.extend(std::iter::repeat_n(String::new(), lengths.len()));
            continue;
        };

        let mut nibble_index = 0usize;
        for &length in lengths {
            let byte_offset = base as usize + nibble_index / 2;
            let string = if byte_offset >= compressed.len() {
                String::new()
            } else {
                let nibbles = NibbleReader::new(compressed, base as usize, nibble_index).take(length as usize);
                decode_symbols(lookup_table, nibbles, &mut catalog.placeholder_count)
            };
            catalog.strings.push(string);
            nibble_index += length as usize;
        }
    }

    if catalog.placeholder_count > 0 {
        warn!(
            "{} symbol(s) fell outside the {}-entry lookup table",
            catalog.placeholder_count,
            lookup_table.len()
        );
    }

    catalog
}

/// Folds a nibble run into characters. An unterminated trailing run of
/// continuation nibbles emits nothing.
fn decode_symbols<I: Iterator<Item = u8>>(lookup_table: &[u8], nibbles: I, placeholders: &mut usize) -> String {
    let mut out = String::new();
    let mut build = 0usize;

    for nibble in nibbles {
        build += nibble as usize;
        if nibble == CONTINUATION_NIBBLE {
            continue;
        }
        match lookup_table.get(build) {
            Some(&code) => out.push(code as char),
            None => {
                out.push(PLACEHOLDER);
                *placeholders += 1;
            }
        }
        build = 0;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(nibbles: &[u8]) -> Vec<u8> {
        nibbles
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect()
    }

    fn alphabet() -> Vec<u8> {
        (0u8..64).map(|i| b'0' + i).collect()
    }

    #[test]
    fn test_continuation_nibbles() {
        let table = alphabet();
        assert_eq!(decode_strings(&table, &[0], &[2], &pack(&[15, 3])), vec!["B"]);
        assert_eq!(decode_strings(&table, &[0], &[1], &pack(&[14])), vec![">"]);
        assert_eq!(decode_strings(&table, &[0], &[3], &pack(&[15, 15, 1])), vec!["O"]);
    }

    #[test]
    fn test_multiple_strings_share_chunk() {
        let table = b"_HEYLO".to_vec();
        // "HEY" = 1 2 3, "LO" = 4 5, "" , "O" = 5
        let blob = pack(&[1, 2, 3, 4, 5, 5]);
        let strings = decode_strings(&table, &[0], &[3, 2, 0, 1], &blob);
        assert_eq!(strings, vec!["HEY", "LO", "", "O"]);
    }

    #[test]
    fn test_odd_nibble_start_reads_low_nibble_first() {
        let table = alphabet();
        // ID 0 uses one nibble, so ID 1 starts in the low half of byte 0.
        let blob = pack(&[3, 15, 1]);
        assert_eq!(blob, vec![0x3F, 0x10]);
        assert_eq!(decode_strings(&table, &[0], &[1, 2], &blob), vec!["3", "@"]);
    }

    #[test]
    fn test_reader_advances_half_a_byte_per_nibble() {
        let blob = vec![0u8; 64];
        for consumed in 0..20usize {
            let mut reader = NibbleReader::new(&blob, 10, 0);
            for _ in 0..consumed {
                reader.next();
            }
            assert_eq!(reader.position(), 10 + consumed / 2);
            // A pending low nibble still lives in the same byte.
            let bytes_touched = reader.position() - 10 + usize::from(consumed % 2 == 1);
            assert_eq!(bytes_touched, consumed.div_ceil(2));
        }
    }

    #[test]
    fn test_empty_catalog() {
        assert!(decode_strings(&alphabet(), &[0], &[], &[]).is_empty());
        assert!(decode_strings(&[], &[], &[], &[]).is_empty());
    }

    #[test]
    fn test_zero_length_string() {
        let strings = decode_strings(&alphabet(), &[0], &[0, 0], &[0x12]);
        assert_eq!(strings, vec!["", ""]);
    }

    #[test]
    fn test_unterminated_continuation_truncates() {
        let table = alphabet();
        assert_eq!(decode_strings(&table, &[0], &[2], &pack(&[1, 15])), vec!["1"]);
        assert_eq!(decode_strings(&table, &[0], &[2], &pack(&[15, 15])), vec![""]);
    }

    #[test]
    fn test_out_of_table_symbol_uses_placeholder() {
        let table = b"ABCD".to_vec();
        let report = decode_strings_with_report(&table, &[0], &[3], &pack(&[0, 9, 3]));
        assert_eq!(report.strings, vec!["A?D"]);
        assert_eq!(report.placeholder_count, 1);
    }

    #[test]
    fn test_missing_chunk_offset_yields_empty_strings() {
        let table = alphabet();
        let mut lengths = vec![2u8; CHUNK_SIZE];
        lengths.push(2);
        let blob = pack(&[1; 2 * CHUNK_SIZE + 2]);

        let strings = decode_strings(&table, &[0], &lengths, &blob);
        assert_eq!(strings.len(), CHUNK_SIZE + 1);
        assert!(strings[..CHUNK_SIZE].iter().all(|s| s == "11"));
        assert_eq!(strings[CHUNK_SIZE], "");
    }

    #[test]
    fn test_chunk_resets_nibble_accounting() {
        let table = alphabet();
        // Chunk 0 holds 64 one-nibble strings; chunk 1 starts at its own base.
        let mut lengths = vec![1u8; CHUNK_SIZE];
        lengths.push(1);
        let mut blob = pack(&[2; CHUNK_SIZE]);
        blob.push(0x70);

        let strings = decode_strings(&table, &[0, 32], &lengths, &blob);
        assert_eq!(strings[CHUNK_SIZE - 1], "2");
        assert_eq!(strings[CHUNK_SIZE], "7");
    }

    #[test]
    fn test_offset_past_blob_yields_empty_string() {
        let strings = decode_strings(&alphabet(), &[10], &[2, 2], &[0x11, 0x11]);
        assert_eq!(strings, vec!["", ""]);
    }

    #[test]
    fn test_blob_exhausted_mid_string_truncates() {
        let strings = decode_strings(&alphabet(), &[0], &[4], &[0x12]);
        assert_eq!(strings, vec!["12"]);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let table = alphabet();
        let lengths = [3u8, 1, 4, 0, 2];
        let blob = pack(&[1, 15, 2, 4, 15, 15, 3, 9, 0, 14]);
        let first = decode_strings(&table, &[0], &lengths, &blob);
        let second = decode_strings(&table, &[0], &lengths, &blob);
        assert_eq!(first, second);
        assert_eq!(first.len(), lengths.len());
    }

    #[test]
    fn test_lookup_codes_map_to_latin1() {
        let table = vec![0xE9, b'a'];
        assert_eq!(decode_strings(&table, &[0], &[2], &[0x01]), vec!["\u{e9}a"]);
    }
}
