//! Streaming UTF-8 decoding for chunked process output.

/// Decodes a byte stream chunk by chunk without splitting multi-byte
/// characters across chunk boundaries. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode everything complete so far. A trailing partial character is
    /// held back until the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.carry.extend_from_slice(chunk);
        let split = self.carry.len() - incomplete_tail(&self.carry);
        let text = String::from_utf8_lossy(&self.carry[..split]).into_owned();
        self.carry.drain(..split);
        text
    }

    /// Flush whatever is held back, lossily.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        let have = bytes.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"ls -la\r\n"), "ls -la\r\n");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn split_character_is_held_back() {
        let mut d = Utf8Decoder::new();
        // "é" is C3 A9, "€" is E2 82 AC.
        assert_eq!(d.decode(b"caf\xc3"), "caf");
        assert_eq!(d.decode(b"\xa9 \xe2\x82"), "\u{e9} ");
        assert_eq!(d.decode(b"\xac"), "\u{20ac}");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn finish_flushes_truncated_tail() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"x\xf0\x9f"), "x");
        assert_eq!(d.finish(), "\u{fffd}");
        assert_eq!(d.finish(), "");
    }
}
