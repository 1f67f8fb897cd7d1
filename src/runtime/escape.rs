//! JSON string escaping straight into the output buffer.

const HEX: &[u8; 16] = b"0123456789abcdef";

// 0 = copy as-is, b'u' = \u00XX, anything else = two-char escape
const ESCAPE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 0x20 {
        table[i] = b'u';
        i += 1;
    }
    table[b'\n' as usize] = b'n';
    table[b'\r' as usize] = b'r';
    table[b'\t' as usize] = b't';
    table[0x08] = b'b';
    table[0x0c] = b'f';
    table[b'"' as usize] = b'"';
    table[b'\\' as usize] = b'\\';
    table
};

/// Writes `s` as a quoted JSON string.
pub fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.reserve(s.len() + 2);
    buf.push(b'"');
    escape_valid(buf, s);
    buf.push(b'"');
}

/// Writes `bytes` as a quoted JSON string, replacing every invalid UTF-8
/// sequence with `\ufffd`. Never fails.
pub fn write_utf8_lossy(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.reserve(bytes.len() + 2);
    buf.push(b'"');
    for chunk in bytes.utf8_chunks() {
        escape_valid(buf, chunk.valid());
        if !chunk.invalid().is_empty() {
            buf.extend_from_slice(b"\\ufffd");
        }
    }
    buf.push(b'"');
}

fn escape_valid(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let esc = ESCAPE[b as usize];
        if esc != 0 {
            buf.extend_from_slice(&bytes[start..i]);
            buf.push(b'\\');
            if esc == b'u' {
                buf.extend_from_slice(&[b'u', b'0', b'0', HEX[(b >> 4) as usize], HEX[(b & 0xf) as usize]]);
            } else {
                buf.push(esc);
            }
            i += 1;
            start = i;
            continue;
        }
        // U+2028 and U+2029 are valid JSON but break JavaScript string literals
        if b == 0xe2 && i + 2 < bytes.len() && bytes[i + 1] == 0x80 && (bytes[i + 2] & 0xfe) == 0xa8 {
            buf.extend_from_slice(&bytes[start..i]);
            buf.extend_from_slice(if bytes[i + 2] == 0xa8 { b"\\u2028" } else { b"\\u2029" });
            i += 3;
            start = i;
            continue;
        }
        i += 1;
    }
    buf.extend_from_slice(&bytes[start..]);
}
