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

//! The identity encodings: `7bit`, `8bit`, and `binary`.

use super::*;

/// An encoding that leaves the data as-is, apart from (for the textual
/// variants) normalising line endings.
#[derive(Clone, Copy, Debug)]
pub struct IdentityCodec {
    name: &'static str,
    convert_newlines: bool,
}

pub static SEVEN_BIT: IdentityCodec = IdentityCodec {
    name: "7bit",
    convert_newlines: true,
};

pub static EIGHT_BIT: IdentityCodec = IdentityCodec {
    name: "8bit",
    convert_newlines: true,
};

pub static BINARY: IdentityCodec = IdentityCodec {
    name: "binary",
    convert_newlines: false,
};

impl IdentityCodec {
    fn converter(&self, to_crlf: Option<bool>) -> Box<NewlineConverter> {
        Box::new(NewlineConverter {
            to_crlf: if self.convert_newlines { to_crlf } else { None },
            carry: CarryBuffer::default(),
            last: 0,
            pending_cr: false,
        })
    }
}

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn max_encoded_size_for(&self, insize: usize, with_crlf: bool) -> usize {
        if with_crlf && self.convert_newlines {
            insize * 2
        } else {
            insize
        }
    }

    fn max_decoded_size_for(&self, insize: usize, with_crlf: bool) -> usize {
        self.max_encoded_size_for(insize, with_crlf)
    }

    fn make_encoder(&self, with_crlf: bool) -> Box<dyn Encoder> {
        self.converter(if with_crlf { Some(true) } else { None })
    }

    fn make_decoder(&self, with_crlf: bool) -> Box<dyn Decoder> {
        self.converter(Some(with_crlf))
    }
}

#[derive(Debug)]
struct NewlineConverter {
    /// `Some(true)` turns bare LF into CRLF, `Some(false)` turns CRLF into
    /// LF, `None` copies verbatim.
    to_crlf: Option<bool>,
    carry: CarryBuffer,
    last: u8,
    pending_cr: bool,
}

impl NewlineConverter {
    fn convert(
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

            match self.to_crlf {
                None => self.carry.write(b, out),
                Some(true) => {
                    if b'\n' == b && b'\r' != self.last {
                        self.carry.write(b'\r', out);
                    }
                    self.carry.write(b, out);
                }
                Some(false) => {
                    if self.pending_cr {
                        self.pending_cr = false;
                        if b'\n' != b {
                            self.carry.write(b'\r', out);
                        }
                    }

                    if b'\r' == b {
                        self.pending_cr = true;
                    } else {
                        self.carry.write(b, out);
                    }
                }
            }

            self.last = b;
        }
    }

    fn flush(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if self.pending_cr {
            self.pending_cr = false;
            self.carry.write(b'\r', out);
        }

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

impl Encoder for NewlineConverter {
    fn encode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        self.convert(input, out)
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        self.flush(out)
    }
}

impl Decoder for NewlineConverter {
    fn decode(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        self.convert(input, out)
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        self.flush(out)
    }
}

#[cfg(test)]
mod test {
    use super::super::test::{decode_starved, encode_starved};
    use super::*;

    #[test]
    fn text_encodings_normalise_newlines() {
        assert_eq!(
            b"a\r\nb\r\nc" as &[u8],
            &SEVEN_BIT.encode(b"a\nb\r\nc", true)[..]
        );
        assert_eq!(
            b"a\nb\r\nc" as &[u8],
            &EIGHT_BIT.encode(b"a\nb\r\nc", false)[..]
        );
        assert_eq!(
            b"a\nb\nc\r" as &[u8],
            &EIGHT_BIT.decode(b"a\r\nb\nc\r", false)[..]
        );
        assert_eq!(
            b"a\nb\nc\r" as &[u8],
            &decode_starved(&EIGHT_BIT, b"a\r\nb\nc\r", false)[..]
        );
    }

    #[test]
    fn binary_is_verbatim() {
        let data = b"\r\n\0\xff\n\r";
        assert_eq!(data as &[u8], &BINARY.encode(data, true)[..]);
        assert_eq!(data as &[u8], &BINARY.decode(data, false)[..]);
        assert_eq!(data as &[u8], &encode_starved(&BINARY, data, true)[..]);
    }
}
