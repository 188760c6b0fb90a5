//! Minimal ESC/POS binary command builder for thermal receipt printers.
//!
//! Generates the raw byte stream streamed to the Bluetooth printer. Text is
//! sent as plain ASCII: the rupee sign becomes `Rs.` and any other non-ASCII
//! character becomes `?`.

use crate::models::PaperSize;

// ESC/POS command bytes
const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

const RUPEE: char = '\u{20B9}';

/// Paper width in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperWidth {
    Mm58,
    Mm80,
}

impl PaperWidth {
    pub fn chars(self) -> usize {
        match self {
            PaperWidth::Mm58 => 32,
            PaperWidth::Mm80 => 48,
        }
    }
}

impl From<PaperSize> for PaperWidth {
    fn from(size: PaperSize) -> Self {
        match size {
            PaperSize::Mm58 => PaperWidth::Mm58,
            PaperSize::Mm80 => PaperWidth::Mm80,
        }
    }
}

/// Builder for generating ESC/POS binary command buffers.
///
/// ```rust,ignore
/// let mut b = EscPosBuilder::new();
/// b.init()
///     .center()
///     .bold(true).text_line("BAJRANG JUICE CENTER").bold(false)
///     .left()
///     .line_pair("TOTAL", "84.00")
///     .feed_lines(3)
///     .cut();
/// let data = b.build();
/// ```
pub struct EscPosBuilder {
    buffer: Vec<u8>,
    paper: PaperWidth,
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(512),
            paper: PaperWidth::Mm80,
        }
    }

    pub fn with_paper(mut self, paper: PaperWidth) -> Self {
        self.paper = paper;
        self
    }

    pub fn width(&self) -> usize {
        self.paper.chars()
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// ESC @: Initialize printer, reset to defaults.
    pub fn init(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    // -----------------------------------------------------------------------
    // Text formatting
    // -----------------------------------------------------------------------

    /// ESC E n: Bold on/off.
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x45, u8::from(on)]);
        self
    }

    // -----------------------------------------------------------------------
    // Alignment
    // -----------------------------------------------------------------------

    /// ESC a 0: Left-align.
    pub fn left(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 0]);
        self
    }

    /// ESC a 1: Centre-align.
    pub fn center(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 1]);
        self
    }

    /// ESC a 2: Right-align.
    pub fn right(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 2]);
        self
    }

    // -----------------------------------------------------------------------
    // Text output
    // -----------------------------------------------------------------------

    /// Append text as ASCII.
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buffer.extend(encode_ascii(s));
        self
    }

    /// Append text followed by a line-feed.
    pub fn text_line(&mut self, s: &str) -> &mut Self {
        self.text(s).lf()
    }

    /// Append a line-feed.
    pub fn lf(&mut self) -> &mut Self {
        self.buffer.push(LF);
        self
    }

    /// Print a horizontal separator using dashes, matching paper width.
    pub fn separator(&mut self) -> &mut Self {
        let width = self.paper.chars();
        self.buffer.extend(std::iter::repeat(b'-').take(width));
        self.buffer.push(LF);
        self
    }

    /// Print a line with left-aligned label and right-aligned value.
    pub fn line_pair(&mut self, label: &str, value: &str) -> &mut Self {
        let width = self.paper.chars();
        let label = encode_ascii(label);
        let value = encode_ascii(value);
        let gap = width.saturating_sub(label.len() + value.len());
        self.buffer.extend(label);
        self.buffer.extend(std::iter::repeat(b' ').take(gap));
        self.buffer.extend(value);
        self.lf()
    }

    // -----------------------------------------------------------------------
    // Feed / cut
    // -----------------------------------------------------------------------

    /// Feed `lines` blank lines as bare LF bytes.
    pub fn feed_lines(&mut self, lines: usize) -> &mut Self {
        self.buffer.extend(std::iter::repeat(LF).take(lines));
        self
    }

    /// GS V 66 0: Feed to the cutter and partial cut.
    pub fn cut(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[GS, 0x56, 0x42, 0x00]);
        self
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Consume the builder and return the binary ESC/POS payload.
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

// ---------------------------------------------------------------------------
// Encoding and padding
// ---------------------------------------------------------------------------

/// ASCII bytes for `text`. `₹` becomes `Rs.`, anything else non-ASCII `?`.
fn encode_ascii(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            bytes.push(ch as u8);
        } else if ch == RUPEE {
            bytes.extend_from_slice(b"Rs.");
        } else {
            bytes.push(b'?');
        }
    }
    bytes
}

/// First `max` characters of `s`.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Right-pad `s` with spaces to at least `width` characters.
pub fn pad_end(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}

/// Left-pad `s` with spaces to at least `width` characters.
pub fn pad_start(s: &str, width: usize) -> String {
    format!("{s:>width$}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
