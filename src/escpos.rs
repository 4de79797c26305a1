//! ESC/POS command vocabulary and byte builder.
//!
//! The command bytes are a hardware protocol: they are reproduced exactly
//! as the target printers expect them and must not be "tidied up".

/// ESC @: initialize printer.
pub const RESET: &[u8] = &[0x1B, 0x40];
/// ESC E 1: emphasized on.
pub const BOLD_ON: &[u8] = &[0x1B, 0x45, 0x01];
/// ESC E 0: emphasized off.
pub const BOLD_OFF: &[u8] = &[0x1B, 0x45, 0x00];
/// GS ! 0x30: enlarged character size.
pub const SIZE_DOUBLE: &[u8] = &[0x1D, 0x21, 0x30];
/// GS ! 0: normal character size.
pub const SIZE_NORMAL: &[u8] = &[0x1D, 0x21, 0x00];
/// ESC a 0: left justification.
pub const ALIGN_LEFT: &[u8] = &[0x1B, 0x61, 0x00];
/// ESC a 1: centered justification.
pub const ALIGN_CENTER: &[u8] = &[0x1B, 0x61, 0x01];
/// GS V 1: partial cut.
pub const CUT_PARTIAL: &[u8] = &[0x1D, 0x56, 0x01];
/// ESC p 0 25 250: pulse on drawer pin 2.
pub const CASH_DRAWER_KICK: &[u8] = &[0x1B, 0x70, 0x00, 0x19, 0xFA];

/// Characters per line on 58mm paper.
pub const LINE_WIDTH: usize = 32;

/// Appends ESC/POS commands and single-byte text to a buffer.
///
/// Text is encoded as ISO-8859-1; characters outside that range are
/// replaced with `?`. Control characters embedded in text are written
/// through unchanged.
#[derive(Debug, Default)]
pub struct EscPosBuilder {
    buf: Vec<u8>,
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    /// Appends a raw command.
    pub fn command(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.command(RESET)
    }

    pub fn bold(&mut self) -> &mut Self {
        self.command(BOLD_ON)
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.command(BOLD_OFF)
    }

    pub fn double_size(&mut self) -> &mut Self {
        self.command(SIZE_DOUBLE)
    }

    pub fn normal_size(&mut self) -> &mut Self {
        self.command(SIZE_NORMAL)
    }

    pub fn left(&mut self) -> &mut Self {
        self.command(ALIGN_LEFT)
    }

    pub fn center(&mut self) -> &mut Self {
        self.command(ALIGN_CENTER)
    }

    pub fn cut_partial(&mut self) -> &mut Self {
        self.command(CUT_PARTIAL)
    }

    /// Writes text without a line feed.
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend(s.chars().map(latin1));
        self
    }

    /// Writes text followed by a line feed.
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Writes `n` empty lines.
    pub fn feed(&mut self, n: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat_n(b'\n', n));
        self
    }

    /// Full-width line of `=`.
    pub fn rule_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(LINE_WIDTH))
    }

    /// Full-width line of `-`.
    pub fn rule_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(LINE_WIDTH))
    }

    /// Consumes the builder and returns the bytes.
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

fn latin1(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_constants_are_exact() {
        assert_eq!(RESET, b"\x1b@");
        assert_eq!(BOLD_ON, b"\x1bE\x01");
        assert_eq!(BOLD_OFF, b"\x1bE\x00");
        assert_eq!(SIZE_DOUBLE, b"\x1d!0");
        assert_eq!(SIZE_NORMAL, b"\x1d!\x00");
        assert_eq!(ALIGN_LEFT, b"\x1ba\x00");
        assert_eq!(ALIGN_CENTER, b"\x1ba\x01");
        assert_eq!(CUT_PARTIAL, b"\x1dV\x01");
        assert_eq!(CASH_DRAWER_KICK, b"\x1bp\x00\x19\xfa");
    }

    #[test]
    fn text_is_single_byte_latin1() {
        let mut builder = EscPosBuilder::new();
        builder.text("Café").text("日");
        assert_eq!(builder.build(), vec![b'C', b'a', b'f', 0xE9, b'?']);
    }

    #[test]
    fn control_characters_pass_through() {
        let mut builder = EscPosBuilder::new();
        builder.line("a\x1bb");
        assert_eq!(builder.build(), b"a\x1bb\n".to_vec());
    }

    #[test]
    fn rules_span_the_paper_width() {
        let mut builder = EscPosBuilder::new();
        builder.rule_double().rule_single();
        let bytes = builder.build();

        assert_eq!(bytes.len(), 2 * (LINE_WIDTH + 1));
        assert!(bytes[..LINE_WIDTH].iter().all(|b| *b == b'='));
        assert!(bytes[LINE_WIDTH + 1..2 * LINE_WIDTH + 1].iter().all(|b| *b == b'-'));
    }
}
