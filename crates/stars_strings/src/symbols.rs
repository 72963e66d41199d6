use std::collections::HashMap;

use crate::error::CatalogError;

/// Where a named global lives inside the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLocation {
    pub name: String,
    pub segment: u16,
    pub offset: usize,
    pub size: usize,
}

impl SymbolLocation {
    pub fn new(name: impl Into<String>, segment: u16, offset: usize, size: usize) -> Self {
        SymbolLocation {
            name: name.into(),
            segment,
            offset,
            size,
        }
    }

    /// Cuts this symbol's bytes out of its owning segment.
    pub fn slice<'a>(&self, segment: &'a [u8]) -> Result<&'a [u8], CatalogError> {
        let end = self.offset.checked_add(self.size).filter(|end| *end <= segment.len());
        match end {
            Some(end) => Ok(&segment[self.offset..end]),
            None => Err(CatalogError::Range(format!(
                "symbol {} overruns segment {}: off=0x{:x} size=0x{:x} seglen=0x{:x}",
                self.name,
                self.segment,
                self.offset,
                self.size,
                segment.len()
            ))),
        }
    }
}

pub trait SymbolResolver {
    fn resolve(&self, name: &str) -> Option<SymbolLocation>;
}

#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    symbols: HashMap<String, SymbolLocation>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: SymbolLocation) -> Option<SymbolLocation> {
        self.symbols.insert(location.name.clone(), location)
    }

    pub fn with(mut self, name: &str, segment: u16, offset: usize, size: usize) -> Self {
        self.insert(SymbolLocation::new(name, segment, offset, size));
        self
    }

    pub fn get(&self, name: &str) -> Option<&SymbolLocation> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolResolver for SymbolMap {
    fn resolve(&self, name: &str) -> Option<SymbolLocation> {
        self.get(name).cloned()
    }
}
