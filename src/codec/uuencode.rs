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

//! The traditional UNIX uuencode format.
//!
//! Only the encoded lines themselves are produced by the encoder; the
//! `begin` and `end` framing is the business of whoever embeds the data.
//! The decoder tolerates (and skips) that framing.

use super::*;

/// Number of raw bytes on a full line.
const LINE_BYTES: usize = 45;

fn encode_sextet(v: u8) -> u8 {
    if 0 == v {
        b'`'
    } else {
        v + b' '
    }
}

fn decode_sextet(ch: u8) -> u8 {
    ch.wrapping_sub(b' ') & 0x3F
}

/// The `x-uuencode` content transfer encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuCodec;

impl Codec for UuCodec {
    fn name(&self) -> &'static str {
        "x-uuencode"
    }

    fn max_encoded_size_for(&self, insize: usize, with_crlf: bool) -> usize {
        let newline = if with_crlf { 2 } else { 1 };
        let lines = insize / LINE_BYTES + 1;
        lines * (1 + LINE_BYTES / 3 * 4 + newline) + 1 + newline
    }

    fn max_decoded_size_for(&self, insize: usize, _: bool) -> usize {
        insize * 3 / 4 + 3
    }

    fn make_encoder(&self, with_crlf: bool) -> Box<dyn Encoder> {
        Box::new(UuEncoder {
            with_crlf,
            raw: Vec::with_capacity(LINE_BYTES),
            line: Vec::new(),
            line_pos: 0,
            terminated: false,
        })
    }

    fn make_decoder(&self, _: bool) -> Box<dyn Decoder> {
        Box::new(UuDecoder {
            carry: CarryBuffer::default(),
            state: UuState::LineStart,
            saw_data: false,
        })
    }
}

#[derive(Debug)]
struct UuEncoder {
    with_crlf: bool,
    /// Raw bytes of the line being accumulated.
    raw: Vec<u8>,
    /// Encoded form of the line being written out.
    line: Vec<u8>,
    line_pos: usize,
    terminated: bool,
}

impl UuEncoder {
    fn prepare_line(&mut self) {
        self.line.clear();
        self.line_pos = 0;
        self.line.push(encode_sextet(self.raw.len() as u8));
        for triple in self.raw.chunks(3) {
            let a = triple[0];
            let b = triple.get(1).copied().unwrap_or(0);
            let c = triple.get(2).copied().unwrap_or(0);
            self.line.push(encode_sextet(a >> 2));
            self.line.push(encode_sextet((a & 0x03) << 4 | b >> 4));
            self.line.push(encode_sextet((b & 0x0F) << 2 | c >> 6));
            self.line.push(encode_sextet(c & 0x3F));
        }
        self.push_newline();
        self.raw.clear();
    }

    fn push_newline(&mut self) {
        if self.with_crlf {
            self.line.push(b'\r');
        }
        self.line.push(b'\n');
    }

    /// Returns whether the pending line has been written out completely.
    fn drain(&mut self, out: &mut OutputBuffer<'_>) -> bool {
        while self.line_pos < self.line.len() {
            if !out.put(self.line[self.line_pos]) {
                return false;
            }
            self.line_pos += 1;
        }
        true
    }
}

impl Encoder for UuEncoder {
    fn encode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        loop {
            if !self.drain(out) {
                return Step::OutputFull;
            }

            if LINE_BYTES == self.raw.len() {
                self.prepare_line();
                continue;
            }

            match input.first() {
                Some(&b) => {
                    self.raw.push(b);
                    *input = &input[1..];
                }
                None => return Step::InputConsumed,
            }
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        loop {
            if !self.drain(out) {
                return Step::OutputFull;
            }

            if !self.raw.is_empty() {
                self.prepare_line();
            } else if !self.terminated {
                self.terminated = true;
                self.line.clear();
                self.line_pos = 0;
                self.line.push(b'`');
                self.push_newline();
            } else {
                return Step::Done;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UuState {
    LineStart,
    /// Skipping framing or the unused tail of a line.
    SkipLine,
    Data {
        /// Decoded bytes still expected on this line.
        remaining: u8,
        group: [u8; 4],
        n: u8,
    },
    Done,
}

#[derive(Debug)]
struct UuDecoder {
    carry: CarryBuffer,
    state: UuState,
    saw_data: bool,
}

impl UuDecoder {
    fn emit_group(
        &mut self,
        group: [u8; 4],
        n: u8,
        remaining: u8,
        out: &mut OutputBuffer<'_>,
    ) -> u8 {
        let bytes = [
            group[0] << 2 | group[1] >> 4,
            group[1] << 4 | group[2] >> 2,
            group[2] << 6 | group[3],
        ];
        // n characters carry enough bits for n-1 bytes.
        let count = n.saturating_sub(1).min(3).min(remaining);
        self.carry.write_all(&bytes[..count as usize], out);
        remaining - count
    }

    fn step(&mut self, ch: u8, out: &mut OutputBuffer<'_>) {
        self.state = match self.state {
            UuState::Done => UuState::Done,

            UuState::LineStart => match ch {
                b'\r' | b'\n' => UuState::LineStart,
                b'e' if self.saw_data => UuState::Done,
                b' '..=b'`' => {
                    let length = decode_sextet(ch);
                    if 0 == length {
                        if self.saw_data {
                            UuState::Done
                        } else {
                            UuState::SkipLine
                        }
                    } else {
                        self.saw_data = true;
                        UuState::Data {
                            remaining: length,
                            group: [0; 4],
                            n: 0,
                        }
                    }
                }
                _ => UuState::SkipLine,
            },

            UuState::SkipLine => {
                if b'\n' == ch {
                    UuState::LineStart
                } else {
                    UuState::SkipLine
                }
            }

            UuState::Data {
                remaining,
                mut group,
                mut n,
            } => match ch {
                b'\r' => UuState::Data {
                    remaining,
                    group,
                    n,
                },
                b'\n' => {
                    if n > 0 {
                        self.emit_group(group, n, remaining, out);
                    }
                    UuState::LineStart
                }
                _ => {
                    group[n as usize] = decode_sextet(ch);
                    n += 1;
                    if 4 == n {
                        let remaining =
                            self.emit_group(group, n, remaining, out);
                        if 0 == remaining {
                            UuState::SkipLine
                        } else {
                            UuState::Data {
                                remaining,
                                group: [0; 4],
                                n: 0,
                            }
                        }
                    } else {
                        UuState::Data {
                            remaining,
                            group,
                            n,
                        }
                    }
                }
            },
        };
    }
}

impl Decoder for UuDecoder {
    fn decode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        loop {
            if !self.carry.flush(out) {
                return Step::OutputFull;
            }

            if UuState::Done == self.state {
                *input = &[];
                return Step::Done;
            }

            let ch = match input.first() {
                Some(&ch) => ch,
                None => return Step::InputConsumed,
            };

            if out.is_full() {
                return Step::OutputFull;
            }

            *input = &input[1..];
            self.step(ch, out);
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if !self.carry.flush(out) {
            return Step::OutputFull;
        }

        if let UuState::Data {
            remaining,
            group,
            n,
        } = self.state
        {
            if n > 0 {
                self.emit_group(group, n, remaining, out);
            }
            self.state = UuState::Done;
        }

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::super::test::{decode_starved, encode_starved};
    use super::*;

    #[test]
    fn encode_known_value() {
        assert_eq!(
            b"#0V%T\n`\n" as &[u8],
            &UuCodec.encode(b"Cat", false)[..]
        );
    }

    #[test]
    fn decode_skips_framing() {
        let text = b"begin 644 cat.txt\n#0V%T\n`\nend\n";
        assert_eq!(b"Cat" as &[u8], &UuCodec.decode(text, false)[..]);

        let text = b"begin 644 cat.txt\r\n#0V%T\r\n`\r\nend\r\n";
        assert_eq!(b"Cat" as &[u8], &UuCodec.decode(text, true)[..]);
    }

    #[test]
    fn decode_accepts_space_for_zero() {
        // Old encoders used space where newer ones use a backtick.
        assert_eq!(b"\0\0\0" as &[u8], &UuCodec.decode(b"#    \n", false)[..]);
    }

    proptest! {
        #[test]
        fn round_trip(data in prop::collection::vec(any::<u8>(), 0..200),
                      with_crlf in any::<bool>()) {
            let encoded = UuCodec.encode(&data, with_crlf);
            prop_assert!(encoded.len() <=
                         UuCodec.max_encoded_size_for(data.len(), with_crlf));
            prop_assert_eq!(&data, &UuCodec.decode(&encoded, with_crlf));
        }

        #[test]
        fn streaming_matches_one_shot(
            data in prop::collection::vec(any::<u8>(), 0..200)
        ) {
            let encoded = UuCodec.encode(&data, false);
            prop_assert_eq!(&encoded, &encode_starved(&UuCodec, &data, false));
            prop_assert_eq!(&data, &decode_starved(&UuCodec, &encoded, false));
        }
    }
}
