use std::fmt::Write;

/// Escapes a string for use inside a C string literal.
pub fn c_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut after_hex_escape = false;

    for ch in s.chars() {
        // "\xe9a" would run on into one escape; split the literal instead.
        if after_hex_escape && ch.is_ascii_hexdigit() {
            out.push_str("\"\"");
        }
        after_hex_escape = false;

        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(ch),
            _ => {
                let _ = write!(out, "\\x{:02x}", ch as u32);
                after_hex_escape = true;
            }
        }
    }

    out
}

pub fn emit_c_array(strings: &[String], array_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "const char *const {array_name}[] = {{");
    for (i, s) in strings.iter().enumerate() {
        let _ = writeln!(out, "    /* {i:4} (0x{i:04x}) */ \"{}\",", c_escape(s));
    }
    out.push_str("};\n");
    out
}

pub fn emit_text(key: &str, strings: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {key} ({} strings)", strings.len());
    for (i, s) in strings.iter().enumerate() {
        let _ = writeln!(out, "{i:04} {s}");
    }
    out.push('\n');
    out
}
