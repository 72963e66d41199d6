use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CatalogError;
use crate::symbols::{SymbolLocation, SymbolMap};

#[derive(Debug, Deserialize)]
struct GlobalsFile {
    #[serde(default)]
    globals: Vec<GlobalRecord>,
}

#[derive(Debug, Deserialize)]
struct GlobalRecord {
    name: Option<String>,
    cv: Option<CvLocation>,
    types: Option<GlobalTypes>,
}

#[derive(Debug, Deserialize)]
struct CvLocation {
    seg: Option<Value>,
    off: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GlobalTypes {
    c_type: Option<String>,
}

pub fn load_globals<P: AsRef<Path>>(path: P) -> Result<SymbolMap, CatalogError> {
    let file = std::fs::File::open(path)?;
    read_globals(std::io::BufReader::new(file))
}

pub fn read_globals<R: Read>(reader: R) -> Result<SymbolMap, CatalogError> {
    let file: GlobalsFile = serde_json::from_reader(reader)?;
    Ok(index_globals(file))
}

pub fn parse_globals(json: &str) -> Result<SymbolMap, CatalogError> {
    let file: GlobalsFile = serde_json::from_str(json)?;
    Ok(index_globals(file))
}

fn index_globals(file: GlobalsFile) -> SymbolMap {
    let total = file.globals.len();
    let (map, skipped) = sized_globals(file.globals);
    if skipped > 0 {
        warn!("skipped {skipped} of {total} globals without a location or sized primitive array type");
    }
    debug!("indexed {} of {} globals", map.len(), total);
    map
}

fn sized_globals(records: Vec<GlobalRecord>) -> (SymbolMap, usize) {
    let mut map = SymbolMap::new();
    let mut skipped = 0;
    for record in records {
        match locate(record) {
            Some(location) => {
                map.insert(location);
            }
            None => skipped += 1,
        }
    }
    (map, skipped)
}

fn locate(record: GlobalRecord) -> Option<SymbolLocation> {
    let name = record.name.filter(|name| !name.is_empty())?;
    let cv = record.cv?;
    let segment = cv.seg.as_ref().and_then(as_integer)?;
    let offset = cv.off.as_ref().and_then(as_integer)?;
    let c_type = record.types.and_then(|types| types.c_type).unwrap_or_default();

    let size = array_length(&c_type)?.checked_mul(element_size(&c_type)?)?;
    Some(SymbolLocation::new(
        name,
        u16::try_from(segment).ok()?,
        usize::try_from(offset).ok()?,
        size,
    ))
}

/// Accepts numbers as well as numeric strings, which some dumpers emit.
fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Element count from the first `[N]` in a C type.
pub fn array_length(c_type: &str) -> Option<usize> {
    let mut rest = c_type;
    while let Some(open) = rest.find('[') {
        rest = &rest[open + 1..];
        if let Some(close) = rest.find(']') {
            let digits = &rest[..close];
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return digits.parse().ok();
            }
        }
    }
    None
}

pub fn element_size(c_type: &str) -> Option<usize> {
    let element = c_type.split('[').next().unwrap_or_default().trim();
    match element {
        "char" | "uint8_t" | "int8_t" => Some(1),
        "uint16_t" | "int16_t" | "short" | "unsigned short" => Some(2),
        "uint32_t" | "int32_t" | "long" | "unsigned long" => Some(4),
        _ => None,
    }
}
