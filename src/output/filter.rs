//! Console-line sanitization.

/// Strip characters that are not legal in the captured text encoding.
///
/// The accepted set is printable characters plus tab; other C0 controls
/// (ESC, backspace, form feed, ...) and DEL are removed. Line terminators
/// never reach this function; the pumper splits on them first. A line that
/// is already clean is returned unchanged.
pub fn sanitize_line(line: &str) -> String {
    if line.chars().all(is_legal_text_char) {
        return line.to_string();
    }
    line.chars().filter(|&c| is_legal_text_char(c)).collect()
}

/// True for characters allowed through to text sinks.
pub fn is_legal_text_char(c: char) -> bool {
    c == '\t' || (!c.is_control())
}

/// True for bytes that mark a stream as binary rather than text.
///
/// Tab, CR and LF are ordinary text framing; every other C0 control byte is
/// taken as evidence of binary content.
pub fn is_binary_byte(b: u8) -> bool {
    b < 0x20 && b != b'\t' && b != b'\r' && b != b'\n'
}
