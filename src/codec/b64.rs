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

//! Base64 (RFC 2045 6.8) and its RFC 2047 "B" variant.

use super::*;

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const MAX_LINE_LENGTH: usize = 76;

fn sextet_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

fn max_encoded_size(insize: usize, wrap: bool, with_crlf: bool) -> usize {
    let chars = (insize + 2) / 3 * 4;
    if wrap {
        let newline = if with_crlf { 2 } else { 1 };
        chars + (chars / MAX_LINE_LENGTH + 1) * newline
    } else {
        chars
    }
}

fn max_decoded_size(insize: usize) -> usize {
    (insize + 3) / 4 * 3
}

/// The `base64` content transfer encoding, wrapped at 76 columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Codec;

impl Codec for Base64Codec {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn max_encoded_size_for(&self, insize: usize, with_crlf: bool) -> usize {
        max_encoded_size(insize, true, with_crlf)
    }

    fn max_decoded_size_for(&self, insize: usize, _: bool) -> usize {
        max_decoded_size(insize)
    }

    fn make_encoder(&self, with_crlf: bool) -> Box<dyn Encoder> {
        Box::new(Base64Encoder::new(true, with_crlf))
    }

    fn make_decoder(&self, _: bool) -> Box<dyn Decoder> {
        Box::new(Base64Decoder::default())
    }
}

/// The RFC 2047 "B" encoding: base64 without any line breaks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rfc2047BCodec;

impl Codec for Rfc2047BCodec {
    fn name(&self) -> &'static str {
        "b"
    }

    fn max_encoded_size_for(&self, insize: usize, _: bool) -> usize {
        max_encoded_size(insize, false, false)
    }

    fn max_decoded_size_for(&self, insize: usize, _: bool) -> usize {
        max_decoded_size(insize)
    }

    fn make_encoder(&self, _: bool) -> Box<dyn Encoder> {
        Box::new(Base64Encoder::new(false, false))
    }

    fn make_decoder(&self, _: bool) -> Box<dyn Decoder> {
        Box::new(Base64Decoder::default())
    }
}

#[derive(Debug)]
struct Base64Encoder {
    wrap: bool,
    with_crlf: bool,
    carry: CarryBuffer,
    /// Position within the current input triple.
    step: u8,
    /// Low-order bits of the previous input byte, already shifted into
    /// place for the next output character.
    next_bits: u8,
    line_length: usize,
    wrote_any: bool,
    finishing: bool,
}

impl Base64Encoder {
    fn new(wrap: bool, with_crlf: bool) -> Self {
        Base64Encoder {
            wrap,
            with_crlf,
            carry: CarryBuffer::default(),
            step: 0,
            next_bits: 0,
            line_length: 0,
            wrote_any: false,
            finishing: false,
        }
    }

    fn newline(&mut self, out: &mut OutputBuffer<'_>) {
        if self.with_crlf {
            self.carry.write(b'\r', out);
        }
        self.carry.write(b'\n', out);
        self.line_length = 0;
    }

    fn put(&mut self, ch: u8, out: &mut OutputBuffer<'_>) {
        if self.wrap && MAX_LINE_LENGTH == self.line_length {
            self.newline(out);
        }

        self.carry.write(ch, out);
        self.line_length += 1;
    }
}

impl Encoder for Base64Encoder {
    fn encode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        loop {
            if !self.carry.flush(out) {
                return Step::OutputFull;
            }

            let b = match input.first() {
                Some(&b) => b,
                None => return Step::InputConsumed,
            };

            if out.is_full() {
                return Step::OutputFull;
            }

            *input = &input[1..];
            self.wrote_any = true;

            match self.step {
                0 => {
                    self.put(ALPHABET[(b >> 2) as usize], out);
                    self.next_bits = (b & 0x03) << 4;
                }
                1 => {
                    self.put(ALPHABET[(self.next_bits | b >> 4) as usize], out);
                    self.next_bits = (b & 0x0F) << 2;
                }
                _ => {
                    self.put(ALPHABET[(self.next_bits | b >> 6) as usize], out);
                    self.put(ALPHABET[(b & 0x3F) as usize], out);
                    self.next_bits = 0;
                }
            }

            self.step = (self.step + 1) % 3;
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if !self.finishing {
            if !self.carry.flush(out) {
                return Step::OutputFull;
            }

            self.finishing = true;

            if 0 != self.step {
                self.put(ALPHABET[self.next_bits as usize], out);
                self.next_bits = 0;
                // One input byte leaves two pad characters, two leave one.
                for _ in self.step..3 {
                    self.put(b'=', out);
                }
            }

            if self.wrap && self.wrote_any {
                self.newline(out);
            }
        }

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

/// Decodes base64 text, ignoring anything outside the alphabet and stopping
/// at the first pad character.
#[derive(Debug, Default)]
struct Base64Decoder {
    bits: u32,
    nbits: u8,
    saw_padding: bool,
}

impl Decoder for Base64Decoder {
    fn decode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        if self.saw_padding {
            *input = &[];
            return Step::Done;
        }

        while let Some(&ch) = input.first() {
            if b'=' == ch {
                self.saw_padding = true;
                *input = &[];
                return Step::Done;
            }

            let value = match sextet_value(ch) {
                Some(v) => v,
                None => {
                    *input = &input[1..];
                    continue;
                }
            };

            if self.nbits >= 2 && out.is_full() {
                return Step::OutputFull;
            }

            *input = &input[1..];
            self.bits = (self.bits << 6) | u32::from(value);
            self.nbits += 6;
            if self.nbits >= 8 {
                self.nbits -= 8;
                out.put((self.bits >> self.nbits) as u8);
                self.bits &= (1 << self.nbits) - 1;
            }
        }

        Step::InputConsumed
    }

    fn finish(&mut self, _: &mut OutputBuffer<'_>) -> Step {
        // Leftover bits are padding by definition.
        self.bits = 0;
        self.nbits = 0;
        Step::Done
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::super::test::{decode_starved, encode_starved};
    use super::*;

    #[test]
    fn encode_short_inputs() {
        assert_eq!(b"" as &[u8], &Base64Codec.encode(b"", false)[..]);
        assert_eq!(b"Zg==\n" as &[u8], &Base64Codec.encode(b"f", false)[..]);
        assert_eq!(b"Zm8=\n" as &[u8], &Base64Codec.encode(b"fo", false)[..]);
        assert_eq!(
            b"Zm9v\r\n" as &[u8],
            &Base64Codec.encode(b"foo", true)[..]
        );
        assert_eq!(
            b"Zm9vYmFy" as &[u8],
            &Rfc2047BCodec.encode(b"foobar", true)[..]
        );
    }

    #[test]
    fn encode_wraps_at_76_columns() {
        let data = vec![0xFFu8; 120];
        let encoded = Base64Codec.encode(&data, false);
        let lines: Vec<&[u8]> = encoded.split(|&b| b'\n' == b).collect();
        let lengths: Vec<usize> = lines.iter().map(|l| l.len()).collect();
        assert_eq!(vec![76, 76, 8, 0], lengths);
    }

    #[test]
    fn decode_ignores_garbage_and_stops_at_padding() {
        assert_eq!(
            b"hello" as &[u8],
            &Base64Codec.decode(b"aGVs\r\nbG8=\r\nthis is junk", false)[..]
        );
        assert_eq!(
            b"hello" as &[u8],
            &Rfc2047BCodec.decode(b"a G V s b G 8", false)[..]
        );
    }

    proptest! {
        #[test]
        fn agrees_with_base64_crate(data in prop::collection::vec(
            any::<u8>(), 0..300
        )) {
            let encoded = Base64Codec.encode(&data, false);
            let unwrapped: Vec<u8> = encoded.iter().copied()
                .filter(|&b| b'\n' != b).collect();
            prop_assert_eq!(base64::encode(&data).into_bytes(), unwrapped);
            prop_assert!(encoded.len() <=
                         Base64Codec.max_encoded_size_for(data.len(), false));
        }

        #[test]
        fn round_trip(data in prop::collection::vec(any::<u8>(), 0..300),
                      with_crlf in any::<bool>()) {
            let encoded = Base64Codec.encode(&data, with_crlf);
            prop_assert_eq!(&data, &Base64Codec.decode(&encoded, with_crlf));
        }

        #[test]
        fn streaming_matches_one_shot(
            data in prop::collection::vec(any::<u8>(), 0..200)
        ) {
            let encoded = Base64Codec.encode(&data, true);
            prop_assert_eq!(&encoded,
                            &encode_starved(&Base64Codec, &data, true));
            prop_assert_eq!(&data,
                            &decode_starved(&Base64Codec, &encoded, true));
        }
    }
}
