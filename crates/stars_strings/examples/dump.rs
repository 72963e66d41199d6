use anyhow::{Context, anyhow, bail};
use ne_image::NEImage;
use stars_strings::emit::{emit_c_array, emit_text};
use stars_strings::globals::load_globals;
use stars_strings::{CATALOGS, CatalogSpec, decode_catalogs};
use std::io::Write;

// Usage: dump <stars.exe> <globals.json> [STR|MSG|TUT|PN|all] [--c]
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let emit_c = args.iter().any(|arg| arg == "--c");
    let positional: Vec<&String> = args.iter().filter(|arg| !arg.starts_with("--")).collect();

    let (exe, globals) = match positional.as_slice() {
        [exe, globals, ..] => (exe.as_str(), globals.as_str()),
        _ => bail!("usage: dump <stars.exe> <globals.json> [STR|MSG|TUT|PN|all] [--c]"),
    };

    let specs: Vec<CatalogSpec> = match positional.get(2).map(|key| key.as_str()) {
        None | Some("all") => CATALOGS.to_vec(),
        Some(key) => vec![*CatalogSpec::by_key(key).ok_or(anyhow!("Unknown catalog {key}"))?],
    };

    let image = NEImage::open(exe).with_context(|| format!("Failed to load {exe}"))?;
    let symbols = load_globals(globals).with_context(|| format!("Failed to load {globals}"))?;
    eprintln!("{} segments, {} sized globals", image.segment_count(), symbols.len());

    let mut out = std::io::stdout().lock();
    for (spec, decoded) in specs.iter().zip(decode_catalogs(&image, &symbols, &specs)) {
        let decoded = decoded.with_context(|| format!("Failed to decode catalog {}", spec.key))?;
        if decoded.placeholder_count > 0 {
            eprintln!("{}: {} placeholder characters", spec.key, decoded.placeholder_count);
        }

        if emit_c {
            out.write_all(emit_c_array(&decoded.strings, &spec.default_array_name()).as_bytes())?;
        } else {
            out.write_all(emit_text(spec.key, &decoded.strings).as_bytes())?;
        }
    }

    Ok(())
}
