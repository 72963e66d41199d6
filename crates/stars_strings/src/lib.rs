pub mod catalog;
pub mod emit;
pub mod error;
pub mod globals;
pub mod nibble;
pub mod symbols;

use log::debug;
use ne_image::NEImage;

pub use catalog::{CATALOGS, CatalogRaw, CatalogSpec, assemble};
pub use error::CatalogError;
pub use nibble::{DecodedCatalog, decode_strings, decode_strings_with_report};
pub use symbols::{SymbolLocation, SymbolMap, SymbolResolver};

pub fn decode_catalog<R: SymbolResolver + ?Sized>(
    image: &NEImage,
    resolver: &R,
    spec: &CatalogSpec,
) -> Result<DecodedCatalog, CatalogError> {
    let raw = assemble(image, resolver, spec)?;
    let decoded = raw.decode();
    debug!("catalog {}: decoded {} strings", spec.key, decoded.strings.len());
    Ok(decoded)
}

/// Decodes several catalogs on scoped threads. Results keep the order of `specs`.
pub fn decode_catalogs<R: SymbolResolver + Sync + ?Sized>(
    image: &NEImage,
    resolver: &R,
    specs: &[CatalogSpec],
) -> Vec<Result<DecodedCatalog, CatalogError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = specs
            .iter()
            .map(|spec| scope.spawn(move || decode_catalog(image, resolver, spec)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}
