use std::io::Cursor;

use byyte::ByteReader;
use log::debug;
use ne_image::NEImage;

use crate::error::CatalogError;
use crate::nibble::{DecodedCatalog, decode_strings_with_report};
use crate::symbols::{SymbolLocation, SymbolResolver};

/// Names of the four globals that make up one compressed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSpec {
    pub key: &'static str,
    pub lookup: &'static str,
    pub chunk_offsets: &'static str,
    pub nibble_lengths: &'static str,
    pub compressed: &'static str,
}

pub const CATALOGS: [CatalogSpec; 4] = [
    CatalogSpec {
        key: "STR",
        lookup: "rgSTRLookupTable",
        chunk_offsets: "aiSTRChunkOffset",
        nibble_lengths: "acSTR",
        compressed: "aSTRCmpr",
    },
    CatalogSpec {
        key: "MSG",
        lookup: "rgMSGLookupTable",
        chunk_offsets: "aiMSGChunkOffset",
        nibble_lengths: "acMSG",
        compressed: "aMSGCmpr",
    },
    CatalogSpec {
        key: "TUT",
        lookup: "rgTUTLookupTable",
        chunk_offsets: "aiTUTChunkOffset",
        nibble_lengths: "acTUT",
        compressed: "aTUTCmpr",
    },
    CatalogSpec {
        key: "PN",
        lookup: "rgPNLookupTable",
        chunk_offsets: "aiPNChunkOffset",
        nibble_lengths: "acPN",
        compressed: "aPNCmpr",
    },
];

impl CatalogSpec {
    pub fn by_key(key: &str) -> Option<&'static CatalogSpec> {
        CATALOGS.iter().find(|spec| spec.key.eq_ignore_ascii_case(key))
    }

    pub fn symbol_names(&self) -> [&'static str; 4] {
        [self.lookup, self.chunk_offsets, self.nibble_lengths, self.compressed]
    }

    pub fn default_array_name(&self) -> String {
        format!("a{}Uncompressed", self.key)
    }
}

/// The raw tables of one catalog, cut out of their shared segment.
#[derive(Debug, Clone)]
pub struct CatalogRaw<'a> {
    pub segment: u16,
    pub lookup_table: &'a [u8],
    pub chunk_offsets: Vec<u16>,
    pub nibble_lengths: &'a [u8],
    pub compressed: &'a [u8],
}

impl CatalogRaw<'_> {
    pub fn string_count(&self) -> usize {
        self.nibble_lengths.len()
    }

    pub fn decode(&self) -> DecodedCatalog {
        decode_strings_with_report(self.lookup_table, &self.chunk_offsets, self.nibble_lengths, self.compressed)
    }
}

pub fn assemble<'a, R: SymbolResolver + ?Sized>(
    image: &'a NEImage,
    resolver: &R,
    spec: &CatalogSpec,
) -> Result<CatalogRaw<'a>, CatalogError> {
    let names = spec.symbol_names();
    let resolved = names.map(|name| resolver.resolve(name));

    let missing: Vec<String> = names
        .iter()
        .zip(&resolved)
        .filter(|(_, location)| location.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    let [Some(lookup), Some(chunk_offsets), Some(nibble_lengths), Some(compressed)] = resolved else {
        return Err(CatalogError::MissingSymbols {
            key: spec.key.to_owned(),
            names: missing,
        });
    };

    let segment = compressed.segment;
    let locations = [&lookup, &chunk_offsets, &nibble_lengths, &compressed];
    if locations.iter().any(|location| location.segment != segment) {
        return Err(CatalogError::InconsistentSegment {
            key: spec.key.to_owned(),
            segments: locations
                .iter()
                .map(|location| (location.name.clone(), location.segment))
                .collect(),
        });
    }

    let segment_bytes = image.read_segment(segment)?;

    let lookup_table = lookup.slice(segment_bytes)?;
    let nibble_lengths = nibble_lengths.slice(segment_bytes)?;
    let chunk_bytes = chunk_offsets.slice(segment_bytes)?;
    if chunk_bytes.len() % 2 != 0 {
        return Err(CatalogError::Format(format!(
            "chunk offset table {} is not word-aligned (size={})",
            chunk_offsets.name,
            chunk_bytes.len()
        )));
    }
    let chunk_offsets = Cursor::new(chunk_bytes).read_u16_array()?;
    let compressed = compressed.slice(segment_bytes)?;

    debug!(
        "catalog {}: segment {}, {} strings, {} chunks, {} lookup entries, {} compressed bytes",
        spec.key,
        segment,
        nibble_lengths.len(),
        chunk_offsets.len(),
        lookup_table.len(),
        compressed.len()
    );

    Ok(CatalogRaw {
        segment,
        lookup_table,
        chunk_offsets,
        nibble_lengths,
        compressed,
    })
}
