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

//! Quoted-printable (RFC 2045 6.7) and the two escape-based encodings built
//! on the same idea: RFC 2047 "Q" and RFC 2231 percent-encoding.

use super::*;

/// Soft line breaks are inserted so that no line exceeds 76 characters,
/// including the trailing `=`.
const MAX_LINE_LENGTH: usize = 76;

/// The `quoted-printable` content transfer encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuotedPrintableCodec;

impl Codec for QuotedPrintableCodec {
    fn name(&self) -> &'static str {
        "quoted-printable"
    }

    fn max_encoded_size_for(&self, insize: usize, _: bool) -> usize {
        // Every byte may become a three-byte escape, and every line may end
        // with a three-byte soft break.
        insize * 3 + (insize * 3 / (MAX_LINE_LENGTH - 1) + 2) * 3
    }

    fn max_decoded_size_for(&self, insize: usize, with_crlf: bool) -> usize {
        if with_crlf {
            insize * 2
        } else {
            insize
        }
    }

    fn make_encoder(&self, with_crlf: bool) -> Box<dyn Encoder> {
        Box::new(QpEncoder {
            with_crlf,
            carry: CarryBuffer::default(),
            line_length: 0,
            pending_whitespace: None,
        })
    }

    fn make_decoder(&self, with_crlf: bool) -> Box<dyn Decoder> {
        Box::new(QpDecoder {
            with_crlf,
            carry: CarryBuffer::default(),
            state: QpState::Text,
        })
    }
}

#[derive(Debug)]
struct QpEncoder {
    with_crlf: bool,
    carry: CarryBuffer,
    line_length: usize,
    /// A space or tab whose encoding depends on whether a line break
    /// follows it.
    pending_whitespace: Option<u8>,
}

impl QpEncoder {
    fn newline(&mut self, out: &mut OutputBuffer<'_>) {
        if self.with_crlf {
            self.carry.write(b'\r', out);
        }
        self.carry.write(b'\n', out);
        self.line_length = 0;
    }

    fn make_room(&mut self, width: usize, out: &mut OutputBuffer<'_>) {
        if self.line_length + width > MAX_LINE_LENGTH - 1 {
            self.carry.write(b'=', out);
            self.newline(out);
        }
    }

    fn literal(&mut self, b: u8, out: &mut OutputBuffer<'_>) {
        self.make_room(1, out);
        self.carry.write(b, out);
        self.line_length += 1;
    }

    fn escaped(&mut self, b: u8, out: &mut OutputBuffer<'_>) {
        self.make_room(3, out);
        self.carry.write(b'=', out);
        self.carry.write(HEX_UPPER[(b >> 4) as usize], out);
        self.carry.write(HEX_UPPER[(b & 0xF) as usize], out);
        self.line_length += 3;
    }
}

impl Encoder for QpEncoder {
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

            if let Some(ws) = self.pending_whitespace.take() {
                if b'\n' == b {
                    self.escaped(ws, out);
                } else {
                    self.literal(ws, out);
                }
            }

            match b {
                b'\n' => self.newline(out),
                b' ' | b'\t' => self.pending_whitespace = Some(b),
                b'=' => self.escaped(b, out),
                33..=126 => self.literal(b, out),
                _ => self.escaped(b, out),
            }
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if !self.carry.flush(out) {
            return Step::OutputFull;
        }

        if let Some(ws) = self.pending_whitespace.take() {
            self.escaped(ws, out);
        }

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QpState {
    Text,
    /// A CR that may be the first half of a hard line break.
    Cr,
    Equals,
    /// `=` followed by one hex digit.
    EqualsHex(u8),
    /// `=` followed by whitespace, which may turn out to be a soft break
    /// with trailing transport padding.
    EqualsSpace,
    EqualsCr,
}

/// Decodes quoted-printable text.
///
/// This never fails. Invalid escapes are passed through untransformed, and
/// line endings may be either LF or CRLF.
#[derive(Debug)]
struct QpDecoder {
    with_crlf: bool,
    carry: CarryBuffer,
    state: QpState,
}

impl QpDecoder {
    fn newline(&mut self, out: &mut OutputBuffer<'_>) {
        if self.with_crlf {
            self.carry.write(b'\r', out);
        }
        self.carry.write(b'\n', out);
    }

    /// Feed `b` through the state machine. Returns false if `b` has not been
    /// consumed and must be fed again.
    fn step(&mut self, b: u8, out: &mut OutputBuffer<'_>) -> bool {
        match self.state {
            QpState::Text => {
                match b {
                    b'=' => self.state = QpState::Equals,
                    b'\r' => self.state = QpState::Cr,
                    b'\n' => self.newline(out),
                    _ => self.carry.write(b, out),
                }
                true
            }

            QpState::Cr => {
                self.state = QpState::Text;
                if b'\n' == b {
                    self.newline(out);
                    true
                } else {
                    self.carry.write(b'\r', out);
                    false
                }
            }

            QpState::Equals => {
                if hex_value(b).is_some() {
                    self.state = QpState::EqualsHex(b);
                    true
                } else {
                    match b {
                        b'\n' => {
                            self.state = QpState::Text;
                            true
                        }
                        b'\r' => {
                            self.state = QpState::EqualsCr;
                            true
                        }
                        b' ' | b'\t' => {
                            self.state = QpState::EqualsSpace;
                            true
                        }
                        _ => {
                            self.carry.write(b'=', out);
                            self.state = QpState::Text;
                            false
                        }
                    }
                }
            }

            QpState::EqualsHex(high) => {
                self.state = QpState::Text;
                match (hex_value(high), hex_value(b)) {
                    (Some(h), Some(l)) => {
                        self.carry.write(h << 4 | l, out);
                        true
                    }
                    _ => {
                        self.carry.write(b'=', out);
                        self.carry.write(high, out);
                        false
                    }
                }
            }

            QpState::EqualsSpace => match b {
                b' ' | b'\t' => true,
                b'\r' => {
                    self.state = QpState::EqualsCr;
                    true
                }
                b'\n' => {
                    self.state = QpState::Text;
                    true
                }
                _ => {
                    // Not a soft break after all; the padding is lost.
                    self.carry.write(b'=', out);
                    self.state = QpState::Text;
                    false
                }
            },

            QpState::EqualsCr => {
                self.state = QpState::Text;
                b'\n' == b
            }
        }
    }
}

impl Decoder for QpDecoder {
    fn decode(
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

            if self.step(b, out) {
                *input = &input[1..];
            }
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if !self.carry.flush(out) {
            return Step::OutputFull;
        }

        match self.state {
            QpState::Cr => self.carry.write(b'\r', out),
            QpState::Equals | QpState::EqualsSpace => {
                self.carry.write(b'=', out)
            }
            QpState::EqualsHex(high) => {
                self.carry.write(b'=', out);
                self.carry.write(high, out);
            }
            QpState::Text | QpState::EqualsCr => (),
        }
        self.state = QpState::Text;

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

/// Encodes every byte not accepted by `keep` as `escape` followed by two
/// upper-case hex digits.
#[derive(Debug)]
struct EscapeEncoder {
    escape: u8,
    space_as_underscore: bool,
    keep: fn(u8) -> bool,
    carry: CarryBuffer,
}

impl Encoder for EscapeEncoder {
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

            if self.space_as_underscore && b' ' == b {
                self.carry.write(b'_', out);
            } else if (self.keep)(b) {
                self.carry.write(b, out);
            } else {
                self.carry.write(self.escape, out);
                self.carry.write(HEX_UPPER[(b >> 4) as usize], out);
                self.carry.write(HEX_UPPER[(b & 0xF) as usize], out);
            }
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

/// Inverse of `EscapeEncoder`. Malformed escapes are passed through.
#[derive(Debug)]
struct EscapeDecoder {
    escape: u8,
    underscore_as_space: bool,
    carry: CarryBuffer,
    /// The escape character and up to one hex digit seen so far.
    pending: Option<Option<u8>>,
}

impl Decoder for EscapeDecoder {
    fn decode(
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

            match self.pending {
                None => {
                    *input = &input[1..];
                    if self.escape == b {
                        self.pending = Some(None);
                    } else if self.underscore_as_space && b'_' == b {
                        self.carry.write(b' ', out);
                    } else {
                        self.carry.write(b, out);
                    }
                }

                Some(None) => {
                    if hex_value(b).is_some() {
                        *input = &input[1..];
                        self.pending = Some(Some(b));
                    } else {
                        self.carry.write(self.escape, out);
                        self.pending = None;
                    }
                }

                Some(Some(high)) => {
                    self.pending = None;
                    match (hex_value(high), hex_value(b)) {
                        (Some(h), Some(l)) => {
                            *input = &input[1..];
                            self.carry.write(h << 4 | l, out);
                        }
                        _ => {
                            self.carry.write(self.escape, out);
                            self.carry.write(high, out);
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self, out: &mut OutputBuffer<'_>) -> Step {
        if !self.carry.flush(out) {
            return Step::OutputFull;
        }

        match self.pending.take() {
            Some(None) => self.carry.write(self.escape, out),
            Some(Some(high)) => {
                self.carry.write(self.escape, out);
                self.carry.write(high, out);
            }
            None => (),
        }

        if self.carry.flush(out) {
            Step::Done
        } else {
            Step::OutputFull
        }
    }
}

// RFC 2047 5(3): characters that may appear unencoded in a "Q" encoded word
// in any position.
fn is_q_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!*+-/".contains(&b)
}

// RFC 2231 7 "attribute-char"
fn is_attribute_char(b: u8) -> bool {
    b > b' ' && b < 0x7F && !b"*'%()<>@,;:\\\"/[]?=".contains(&b)
}

/// The RFC 2047 "Q" encoding used inside encoded words.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rfc2047QCodec;

impl Codec for Rfc2047QCodec {
    fn name(&self) -> &'static str {
        "q"
    }

    fn max_encoded_size_for(&self, insize: usize, _: bool) -> usize {
        insize * 3
    }

    fn max_decoded_size_for(&self, insize: usize, _: bool) -> usize {
        insize
    }

    fn make_encoder(&self, _: bool) -> Box<dyn Encoder> {
        Box::new(EscapeEncoder {
            escape: b'=',
            space_as_underscore: true,
            keep: is_q_safe,
            carry: CarryBuffer::default(),
        })
    }

    fn make_decoder(&self, _: bool) -> Box<dyn Decoder> {
        Box::new(EscapeDecoder {
            escape: b'=',
            underscore_as_space: true,
            carry: CarryBuffer::default(),
            pending: None,
        })
    }
}

/// The RFC 2231 percent-encoding of extended parameter values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rfc2231Codec;

impl Codec for Rfc2231Codec {
    fn name(&self) -> &'static str {
        "x-kmime-rfc2231"
    }

    fn max_encoded_size_for(&self, insize: usize, _: bool) -> usize {
        insize * 3
    }

    fn max_decoded_size_for(&self, insize: usize, _: bool) -> usize {
        insize
    }

    fn make_encoder(&self, _: bool) -> Box<dyn Encoder> {
        Box::new(EscapeEncoder {
            escape: b'%',
            space_as_underscore: false,
            keep: is_attribute_char,
            carry: CarryBuffer::default(),
        })
    }

    fn make_decoder(&self, _: bool) -> Box<dyn Decoder> {
        Box::new(EscapeDecoder {
            escape: b'%',
            underscore_as_space: false,
            carry: CarryBuffer::default(),
            pending: None,
        })
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::super::test::{decode_starved, encode_starved};
    use super::*;

    fn assert_qp(expected: &[u8], input: &[u8]) {
        assert_eq!(
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(&QuotedPrintableCodec.decode(input, false))
        );
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"hello world");
        assert_qp(b"\xabfoo", b"=ABfoo");
        assert_qp(b"fo\xabo", b"fo=ABo");
        assert_qp(b"foo\xab", b"foo=AB");
        assert_qp(b"foo\xab", b"foo=ab");

        assert_qp(b"foo\xab\xcd", b"foo=AB=CD");
        assert_qp(b"foo\xabbar\xcd", b"foo=ABbar=CD");

        assert_qp(b"foo", b"foo=\n");
        assert_qp(b"foobar", b"foo=\nbar");
        assert_qp(b"foo", b"foo=\r\n");
        assert_qp(b"foobar", b"foo=\r\nbar");
        assert_qp(b"foobar", b"foo= \t\r\nbar");
        assert_qp(b"foo\nbar", b"foo\r\nbar");

        assert_qp(b"foo=()bar", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"foo==ABbar");
        assert_qp(b"foo=A\xabbar", b"foo=A=ABbar");
        assert_qp("foo=ゑbar".as_bytes(), "foo=ゑbar".as_bytes());
        assert_qp(b"foo=\x80\x80bar", b"foo=\x80\x80bar");

        assert_qp(b"foo=", b"foo=");
        assert_qp(b"foo=A", b"foo=A");
    }

    #[test]
    fn test_qp_encode() {
        assert_eq!(
            b"caf=E9 =3D ok" as &[u8],
            &QuotedPrintableCodec.encode(b"caf\xe9 = ok", false)[..]
        );
        assert_eq!(
            b"trailing=20\r\nspace=09\r\nend=20" as &[u8],
            &QuotedPrintableCodec.encode(b"trailing \nspace\t\nend ", true)[..]
        );
    }

    #[test]
    fn test_qp_soft_breaks() {
        let data = vec![b'x'; 200];
        let encoded = QuotedPrintableCodec.encode(&data, false);
        for line in encoded.split(|&b| b'\n' == b) {
            assert!(line.len() <= 76);
        }
        assert_eq!(data, QuotedPrintableCodec.decode(&encoded, false));
    }

    #[test]
    fn test_q_codec() {
        assert_eq!(
            b"Keld_J=F8rn_Simonsen" as &[u8],
            &Rfc2047QCodec.encode(b"Keld J\xf8rn Simonsen", false)[..]
        );
        assert_eq!(
            b"a=3Fb=5F" as &[u8],
            &Rfc2047QCodec.encode(b"a?b_", false)[..]
        );
        assert_eq!(
            b"Keld J\xf8rn Simonsen" as &[u8],
            &Rfc2047QCodec.decode(b"Keld_J=F8rn_Simonsen", false)[..]
        );
    }

    #[test]
    fn test_rfc2231_codec() {
        assert_eq!(
            b"This%20is%20%2A%2A%2Afun%2A%2A%2A" as &[u8],
            &Rfc2231Codec.encode(b"This is ***fun***", false)[..]
        );
        assert_eq!(
            b"This is ***fun***" as &[u8],
            &Rfc2231Codec.decode(b"This%20is%20%2A%2A%2Afun%2A%2A%2A", false)
                [..]
        );
        assert_eq!(b"100%" as &[u8], &Rfc2231Codec.decode(b"100%", false)[..]);
    }

    proptest! {
        #[test]
        fn qp_round_trip(data in prop::collection::vec(any::<u8>(), 0..300)) {
            let encoded = QuotedPrintableCodec.encode(&data, false);
            prop_assert_eq!(
                &data,
                &QuotedPrintableCodec.decode(&encoded, false)
            );
            prop_assert!(encoded.len() <=
                         QuotedPrintableCodec.max_encoded_size_for(
                             data.len(), false));
        }

        #[test]
        fn qp_streaming_matches_one_shot(
            data in prop::collection::vec(any::<u8>(), 0..200)
        ) {
            let encoded = QuotedPrintableCodec.encode(&data, true);
            prop_assert_eq!(&encoded, &encode_starved(
                &QuotedPrintableCodec, &data, true));
            prop_assert_eq!(
                QuotedPrintableCodec.decode(&encoded, false),
                decode_starved(&QuotedPrintableCodec, &encoded, false));
        }

        #[test]
        fn qp_decode_never_fails(
            s in prop::collection::vec(prop::num::u8::ANY, 0..20)
        ) {
            QuotedPrintableCodec.decode(&s, true);
        }

        #[test]
        fn q_round_trip(data in prop::collection::vec(any::<u8>(), 0..100)) {
            let encoded = Rfc2047QCodec.encode(&data, false);
            prop_assert!(!encoded.contains(&b' '));
            prop_assert_eq!(&data, &Rfc2047QCodec.decode(&encoded, false));
            prop_assert_eq!(&data, &decode_starved(
                &Rfc2047QCodec, &encoded, false));
        }

        #[test]
        fn rfc2231_round_trip(
            data in prop::collection::vec(any::<u8>(), 0..100)
        ) {
            let encoded = Rfc2231Codec.encode(&data, false);
            prop_assert_eq!(&data, &Rfc2231Codec.decode(&encoded, false));
        }
    }
}
