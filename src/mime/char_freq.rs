//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimetree.
//
// Mimetree is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version  3 of the License, or (at  your option)
// any later version.
//
// Mimetree is distributed  in the hope that  it will be useful,  but WITHOUT
// ANY WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or
// FITNESS FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License
// for more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimetree. If not, see <http://www.gnu.org/licenses/>.

//! Byte-class statistics used to choose a content transfer encoding.

/// The broad class of a buffer, from most to least restrictive transport
/// requirements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharFreqType {
    /// Contains NUL bytes.
    Binary,
    /// Has 8-bit bytes and is not fit for an `8bit` transport.
    EightBitData,
    /// Has 8-bit bytes but is otherwise well-formed text.
    EightBitText,
    /// Pure ASCII, but not fit for a `7bit` transport.
    SevenBitData,
    /// Pure ASCII text that can be sent unencoded.
    SevenBitText,
}

/// RFC 2822 2.1.1 line length limit, excluding the line ending.
const MAX_LINE_LENGTH: usize = 998;

/// Counts of the byte classes in a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharFreq {
    pub nul: usize,
    /// Control characters other than CR, LF, and TAB (and including DEL).
    pub ctl: usize,
    pub cr: usize,
    pub lf: usize,
    /// LF bytes immediately preceded by CR.
    pub crlf: usize,
    /// Printable ASCII, plus TAB.
    pub printable: usize,
    pub eight_bit: usize,
    pub total: usize,
    /// Length of the shortest line, excluding its line ending.
    pub line_min: usize,
    /// Length of the longest line, excluding its line ending.
    pub line_max: usize,
    trailing_whitespace: bool,
    leading_from: bool,
}

fn is_whitespace(b: u8) -> bool {
    b' ' == b || b'\t' == b
}

impl CharFreq {
    pub fn new(buf: &[u8]) -> Self {
        let mut this = CharFreq {
            line_min: usize::MAX,
            ..CharFreq::default()
        };

        if buf.is_empty() {
            return this;
        }

        // Starting "after" an LF makes a "From " on the first line count.
        let mut prev = b'\n';
        let mut prev_prev = 0u8;
        let mut line_length = 0usize;

        for (ix, &b) in buf.iter().enumerate() {
            match b {
                0 => {
                    this.nul += 1;
                    line_length += 1;
                }
                b'\r' => {
                    this.cr += 1;
                    line_length += 1;
                }
                b'\n' => {
                    this.lf += 1;
                    if b'\r' == prev {
                        this.crlf += 1;
                        line_length -= 1;
                    }

                    this.line_max = this.line_max.max(line_length);
                    this.line_min = this.line_min.min(line_length);
                    if is_whitespace(prev)
                        || (b'\r' == prev && is_whitespace(prev_prev))
                    {
                        this.trailing_whitespace = true;
                    }
                    line_length = 0;
                }
                _ => {
                    line_length += 1;
                    if b'\t' == b || (b' '..=b'~').contains(&b) {
                        this.printable += 1;
                        if b'F' == b
                            && b'\n' == prev
                            && buf[ix..].starts_with(b"From ")
                        {
                            this.leading_from = true;
                        }
                    } else if b < b' ' || 127 == b {
                        this.ctl += 1;
                    } else {
                        this.eight_bit += 1;
                    }
                }
            }

            prev_prev = prev;
            prev = b;
        }

        // The last line, which has no line ending of its own.
        if b'\n' != prev {
            this.line_max = this.line_max.max(line_length);
            this.line_min = this.line_min.min(line_length);
        }

        if is_whitespace(prev) {
            this.trailing_whitespace = true;
        }

        this.total = buf.len();
        this
    }

    pub fn kind(&self) -> CharFreqType {
        if self.nul > 0 {
            return CharFreqType::Binary;
        }

        let data_like = self.line_max > MAX_LINE_LENGTH
            || (self.lf != self.crlf && self.crlf > 0)
            || self.cr != self.crlf
            || self.control_codes_ratio() > 0.2;

        match (self.eight_bit > 0, data_like) {
            (true, true) => CharFreqType::EightBitData,
            (true, false) => CharFreqType::EightBitText,
            (false, true) => CharFreqType::SevenBitData,
            (false, false) => CharFreqType::SevenBitText,
        }
    }

    pub fn is_eight_bit_data(&self) -> bool {
        CharFreqType::EightBitData == self.kind()
    }

    pub fn is_eight_bit_text(&self) -> bool {
        CharFreqType::EightBitText == self.kind()
    }

    pub fn is_seven_bit_data(&self) -> bool {
        CharFreqType::SevenBitData == self.kind()
    }

    pub fn is_seven_bit_text(&self) -> bool {
        CharFreqType::SevenBitText == self.kind()
    }

    /// Whether any line ends in a space or tab.
    pub fn has_trailing_whitespace(&self) -> bool {
        self.trailing_whitespace
    }

    /// Whether any line begins with `From `, which mbox storage would mangle.
    pub fn has_leading_from(&self) -> bool {
        self.leading_from
    }

    pub fn printable_ratio(&self) -> f32 {
        if 0 == self.total {
            0.0
        } else {
            self.printable as f32 / self.total as f32
        }
    }

    pub fn control_codes_ratio(&self) -> f32 {
        if 0 == self.total {
            0.0
        } else {
            self.ctl as f32 / self.total as f32
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_buffer() {
        let cf = CharFreq::new(b"");
        assert_eq!(0, cf.total);
        assert_eq!(0.0, cf.printable_ratio());
        assert_eq!(0.0, cf.control_codes_ratio());
        assert_eq!(CharFreqType::SevenBitText, cf.kind());
    }

    #[test]
    fn classification() {
        assert_eq!(
            CharFreqType::SevenBitText,
            CharFreq::new(b"hello\nworld\n").kind()
        );
        assert_eq!(
            CharFreqType::SevenBitText,
            CharFreq::new(b"hello\r\nworld\r\n").kind()
        );
        assert_eq!(
            CharFreqType::SevenBitData,
            CharFreq::new(b"hello\r\nworld\n").kind()
        );
        assert_eq!(
            CharFreqType::SevenBitData,
            CharFreq::new(b"bare\rcarriage return").kind()
        );
        assert_eq!(
            CharFreqType::EightBitText,
            CharFreq::new("grüße\n".as_bytes()).kind()
        );
        assert_eq!(
            CharFreqType::EightBitData,
            CharFreq::new(b"\x01\x02\x03\xff\n").kind()
        );
        assert_eq!(CharFreqType::Binary, CharFreq::new(b"a\0b").kind());

        let long_line = vec![b'x'; 999];
        assert_eq!(
            CharFreqType::SevenBitData,
            CharFreq::new(&long_line).kind()
        );
        assert_eq!(
            CharFreqType::SevenBitText,
            CharFreq::new(&long_line[1..]).kind()
        );
    }

    #[test]
    fn counters() {
        let cf = CharFreq::new(b"From me\r\nab \n\tx\x7f");
        assert_eq!(1, cf.crlf);
        assert_eq!(2, cf.lf);
        assert_eq!(1, cf.cr);
        assert_eq!(1, cf.ctl);
        assert_eq!(3, cf.line_min);
        assert_eq!(7, cf.line_max);
        assert!(cf.has_leading_from());
        assert!(cf.has_trailing_whitespace());

        let cf = CharFreq::new(b"not From here\n");
        assert!(!cf.has_leading_from());
        assert!(!cf.has_trailing_whitespace());
    }

    proptest! {
        #[test]
        fn short_ascii_lines_are_text(
            lines in prop::collection::vec("[ -~]{0,998}", 0..5)
        ) {
            let text = lines.join("\n");
            prop_assert_eq!(CharFreqType::SevenBitText,
                            CharFreq::new(text.as_bytes()).kind());
        }
    }
}
