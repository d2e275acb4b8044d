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

//! Streaming content-transfer-encoding codecs.
//!
//! Each codec is a stateless factory for `Encoder` and `Decoder` state
//! machines. The state machines write into a caller-supplied output window
//! and may be resumed any number of times after reporting
//! `Step::OutputFull`, so arbitrarily large bodies can be processed through
//! a small fixed buffer.

use log::debug;

mod b64;
mod identity;
mod quoted_printable;
mod uuencode;

pub use self::b64::{Base64Codec, Rfc2047BCodec};
pub use self::identity::{IdentityCodec, BINARY, EIGHT_BIT, SEVEN_BIT};
pub use self::quoted_printable::{
    QuotedPrintableCodec, Rfc2047QCodec, Rfc2231Codec,
};
pub use self::uuencode::UuCodec;

/// The outcome of a single `encode`, `decode`, or `finish` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The whole input chunk was consumed. More input may follow.
    InputConsumed,
    /// Nothing further will be produced: `finish` has flushed all pending
    /// output, or a decoder reached the logical end of its data (any input
    /// after that point is consumed and ignored).
    Done,
    /// The output window is full. The call must be repeated with more
    /// output space; no state has been lost.
    OutputFull,
}

/// A caller-owned output window plus the position written so far.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> OutputBuffer<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        OutputBuffer { data, pos: 0 }
    }

    /// The number of bytes written into the window.
    pub fn written(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_full(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Append `b` to the window, returning false if there is no room.
    pub fn put(&mut self, b: u8) -> bool {
        if self.is_full() {
            false
        } else {
            self.data[self.pos] = b;
            self.pos += 1;
            true
        }
    }
}

/// Holds output that did not fit into the output window.
///
/// Every codec produces at most 8 bytes per input step, so the carry never
/// needs more space than this.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CarryBuffer {
    data: [u8; 8],
    len: usize,
}

impl CarryBuffer {
    /// Write `b` to `out`, or keep it for later if `out` is full (or
    /// earlier output is already waiting).
    pub(crate) fn write(&mut self, b: u8, out: &mut OutputBuffer<'_>) {
        if 0 == self.len && out.put(b) {
            return;
        }

        debug_assert!(self.len < self.data.len());
        if self.len < self.data.len() {
            self.data[self.len] = b;
            self.len += 1;
        }
    }

    pub(crate) fn write_all(
        &mut self,
        bytes: &[u8],
        out: &mut OutputBuffer<'_>,
    ) {
        for &b in bytes {
            self.write(b, out);
        }
    }

    /// Move as much carried output as possible into `out`.
    ///
    /// Returns whether the carry is now empty.
    pub(crate) fn flush(&mut self, out: &mut OutputBuffer<'_>) -> bool {
        let mut n = 0;
        while n < self.len && out.put(self.data[n]) {
            n += 1;
        }

        self.data.copy_within(n..self.len, 0);
        self.len -= n;
        0 == self.len
    }
}

pub trait Encoder {
    /// Encode as much of `input` as fits into `out`, advancing `input` past
    /// what was consumed.
    fn encode(&mut self, input: &mut &[u8], out: &mut OutputBuffer<'_>)
        -> Step;

    /// Write any pending output and trailing padding.
    ///
    /// Must be repeated with fresh output space until it returns
    /// `Step::Done`.
    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step;
}

pub trait Decoder {
    /// Decode as much of `input` as fits into `out`, advancing `input` past
    /// what was consumed.
    fn decode(&mut self, input: &mut &[u8], out: &mut OutputBuffer<'_>)
        -> Step;

    /// Write any pending output.
    ///
    /// Must be repeated with fresh output space until it returns
    /// `Step::Done`.
    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step;
}

pub trait Codec: Sync {
    /// The lower-case name this codec is registered under.
    fn name(&self) -> &'static str;

    /// An upper bound on the encoded size of `insize` input bytes.
    fn max_encoded_size_for(&self, insize: usize, with_crlf: bool) -> usize;

    /// An upper bound on the decoded size of `insize` input bytes.
    fn max_decoded_size_for(&self, insize: usize, with_crlf: bool) -> usize;

    fn make_encoder(&self, with_crlf: bool) -> Box<dyn Encoder>;

    fn make_decoder(&self, with_crlf: bool) -> Box<dyn Decoder>;

    /// Encode `src` in one go.
    fn encode(&self, src: &[u8], with_crlf: bool) -> Vec<u8> {
        let mut encoder = self.make_encoder(with_crlf);
        run(
            &mut encoder,
            src,
            self.max_encoded_size_for(src.len(), with_crlf),
        )
    }

    /// Decode `src` in one go.
    fn decode(&self, src: &[u8], with_crlf: bool) -> Vec<u8> {
        let mut decoder = self.make_decoder(with_crlf);
        run(
            &mut decoder,
            src,
            self.max_decoded_size_for(src.len(), with_crlf),
        )
    }
}

/// Common view of encoders and decoders for `run`.
trait Pump {
    fn pump(&mut self, input: &mut &[u8], out: &mut OutputBuffer<'_>)
        -> Step;
    fn drain(&mut self, out: &mut OutputBuffer<'_>) -> Step;
}

impl Pump for Box<dyn Encoder> {
    fn pump(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        self.encode(input, out)
    }

    fn drain(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        self.finish(out)
    }
}

impl Pump for Box<dyn Decoder> {
    fn pump(
        &mut self,
        input: &mut &[u8],
        out: &mut OutputBuffer<'_>,
    ) -> Step {
        self.decode(input, out)
    }

    fn drain(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        self.finish(out)
    }
}

fn run(pump: &mut impl Pump, mut input: &[u8], size_hint: usize) -> Vec<u8> {
    let mut result = vec![0u8; size_hint.max(16)];
    let mut len = 0;

    loop {
        if len == result.len() {
            result.resize(result.len() * 2, 0);
        }

        let mut out = OutputBuffer::new(&mut result[len..]);
        let step = pump.pump(&mut input, &mut out);
        len += out.written();
        if Step::OutputFull != step {
            break;
        }
    }

    loop {
        if len == result.len() {
            result.resize(result.len() * 2, 0);
        }

        let mut out = OutputBuffer::new(&mut result[len..]);
        let step = pump.drain(&mut out);
        len += out.written();
        if Step::OutputFull != step {
            break;
        }
    }

    result.truncate(len);
    result
}

/// Look up a codec by its (case-insensitive) name.
pub fn codec_for_name(name: &str) -> Option<&'static dyn Codec> {
    let codec: &'static dyn Codec = match name.to_ascii_lowercase().as_str()
    {
        "base64" => &Base64Codec,
        "quoted-printable" => &QuotedPrintableCodec,
        "b" => &Rfc2047BCodec,
        "q" => &Rfc2047QCodec,
        "x-kmime-rfc2231" => &Rfc2231Codec,
        "x-uuencode" => &UuCodec,
        "7bit" => &SEVEN_BIT,
        "8bit" => &EIGHT_BIT,
        "binary" => &BINARY,
        _ => {
            debug!("No codec registered for {:?}", name);
            return None;
        }
    };

    Some(codec)
}

pub(crate) const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Drive `codec`'s encoder with single-byte input chunks and a tiny
    /// output window, to exercise every resumption point.
    pub(super) fn encode_starved(
        codec: &dyn Codec,
        src: &[u8],
        with_crlf: bool,
    ) -> Vec<u8> {
        let mut encoder = codec.make_encoder(with_crlf);
        let mut result = Vec::new();
        let mut window = [0u8; 3];

        for chunk in src.chunks(1) {
            let mut input = chunk;
            loop {
                let mut out = OutputBuffer::new(&mut window);
                let step = encoder.encode(&mut input, &mut out);
                let n = out.written();
                result.extend_from_slice(&window[..n]);
                if Step::OutputFull != step {
                    break;
                }
            }
            assert!(input.is_empty());
        }

        loop {
            let mut out = OutputBuffer::new(&mut window);
            let step = encoder.finish(&mut out);
            let n = out.written();
            result.extend_from_slice(&window[..n]);
            if Step::Done == step {
                break;
            }
        }

        result
    }

    /// Like `encode_starved`, but for the decoder.
    pub(super) fn decode_starved(
        codec: &dyn Codec,
        src: &[u8],
        with_crlf: bool,
    ) -> Vec<u8> {
        let mut decoder = codec.make_decoder(with_crlf);
        let mut result = Vec::new();
        let mut window = [0u8; 2];

        for chunk in src.chunks(1) {
            let mut input = chunk;
            loop {
                let mut out = OutputBuffer::new(&mut window);
                let step = decoder.decode(&mut input, &mut out);
                let n = out.written();
                result.extend_from_slice(&window[..n]);
                if Step::OutputFull != step {
                    break;
                }
            }
        }

        loop {
            let mut out = OutputBuffer::new(&mut window);
            let step = decoder.finish(&mut out);
            let n = out.written();
            result.extend_from_slice(&window[..n]);
            if Step::Done == step {
                break;
            }
        }

        result
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!("base64", codec_for_name("BASE64").unwrap().name());
        assert_eq!(
            "quoted-printable",
            codec_for_name("Quoted-Printable").unwrap().name()
        );
        assert_eq!("q", codec_for_name("Q").unwrap().name());
        assert_eq!("8bit", codec_for_name("8Bit").unwrap().name());
        assert!(codec_for_name("x-gzip64").is_none());
    }

    #[test]
    fn carry_buffer_preserves_order() {
        let mut carry = CarryBuffer::default();
        let mut window = [0u8; 2];
        let mut out = OutputBuffer::new(&mut window);
        carry.write_all(b"abcd", &mut out);
        assert!(out.is_full());
        assert_eq!(b"ab", &window);

        let mut window = [0u8; 4];
        let mut out = OutputBuffer::new(&mut window);
        assert!(carry.flush(&mut out));
        carry.write(b'e', &mut out);
        assert_eq!(3, out.written());
        assert_eq!(b"cde", &window[..3]);
    }
}
