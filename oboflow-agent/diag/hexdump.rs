//! Hexdump rendering for diagnostic read output.

/// Render `data` as a classic 16-bytes-per-line hexdump.
///
/// Each line carries the module offset of its first byte (6 hex digits),
/// the byte values with an extra gap after the eighth column, and an
/// ASCII sidebar where non-printable bytes show as dots. Partial final
/// lines are padded so the sidebar stays aligned.
pub fn hexdump(data: &[u8], base: usize) -> String {
    let mut out = String::new();
    for (line_no, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:06x}:  ", base + line_no * 16));
        for slot in 0..16 {
            match chunk.get(slot) {
                Some(b) => out.push_str(&format!("{:02x} ", b)),
                None => out.push_str("   "),
            }
            if slot == 7 {
                out.push(' ');
            }
        }
        out.push_str(" | ");
        for &b in chunk {
            out.push(if (0x20..0x7F).contains(&b) { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}
