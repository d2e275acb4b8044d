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


//! Headers whose values are a single token, phrase list, dot-atom, number,
//! or one of the Usenet oddities.

use log::warn;

use super::super::charset::CharsetPolicy;
use super::super::header_parsing::{
    eat_cfws, parse_digits, parse_dot_atom, parse_phrase, parse_token,
};
use super::super::model::TransferEncoding;

fn warn_trailing_garbage(rest: &[u8], what: &str) {
    if !eat_cfws(rest).is_empty() {
        warn!(
            "Trailing garbage after {} in header allowing only one: {:?}",
            what,
            String::from_utf8_lossy(rest)
        );
    }
}

/// Parse a header consisting of exactly one RFC 2045 token.
pub(super) fn parse_single_token(raw: &[u8]) -> Option<String> {
    let (rest, token) = parse_token(eat_cfws(raw), false).ok()?;
    warn_trailing_garbage(rest, "token");
    Some(String::from_utf8_lossy(token).into_owned())
}

/// Parse a comma-separated list of phrases, such as `Keywords`. Empty
/// entries are skipped.
pub(super) fn parse_phrase_list(
    raw: &[u8],
    policy: &CharsetPolicy,
) -> Option<Vec<String>> {
    let mut phrases = Vec::new();
    let mut i = raw;

    loop {
        i = eat_cfws(i);
        match i.first() {
            None => return Some(phrases),
            Some(b',') => i = &i[1..],
            Some(_) => {
                let (rest, phrase) = parse_phrase(i, policy).ok()?;
                phrases.push(phrase.text);
                i = eat_cfws(rest);
                if Some(&b',') == i.first() {
                    i = &i[1..];
                } else if !i.is_empty() {
                    warn!(
                        "Garbage in phrase list: {:?}",
                        String::from_utf8_lossy(i)
                    );
                    return None;
                }
            }
        }
    }
}

/// Parse a header consisting of a single dot-atom, such as `MIME-Version`.
pub(super) fn parse_single_dot_atom(raw: &[u8]) -> Option<String> {
    let (rest, dot_atom) = parse_dot_atom(raw).ok()?;
    warn_trailing_garbage(rest, "dot-atom");
    Some(dot_atom)
}

/// Parse `Lines`.
pub(super) fn parse_lines(raw: &[u8]) -> Option<u32> {
    let (rest, (lines, _)) = parse_digits(eat_cfws(raw)).ok()?;
    warn_trailing_garbage(rest, "number");
    Some(lines)
}

/// Parse `Newsgroups` or `Followup-To`: newsgroup names separated by
/// commas and/or whitespace.
pub(super) fn parse_newsgroups(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b',' == b || b.is_ascii_whitespace())
        .filter(|group| !group.is_empty())
        .map(|group| String::from_utf8_lossy(group).into_owned())
        .collect()
}

/// The value of a `Content-Transfer-Encoding` header, together with
/// whether the body it describes is currently held decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentTransferEncoding {
    encoding: TransferEncoding,
    decoded: bool,
    token: String,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding {
            encoding: TransferEncoding::SevenBit,
            decoded: true,
            token: String::new(),
        }
    }
}

impl ContentTransferEncoding {
    pub fn new(encoding: TransferEncoding) -> Self {
        let mut this = ContentTransferEncoding::default();
        this.set_encoding(encoding);
        this
    }

    pub(super) fn parse(raw: &[u8]) -> Option<Self> {
        let token = parse_single_token(raw)?;
        let encoding =
            TransferEncoding::from_name(&token).unwrap_or_else(|| {
                warn!("Unknown Content-Transfer-Encoding {:?}", token);
                TransferEncoding::SevenBit
            });

        Some(ContentTransferEncoding {
            encoding,
            decoded: match encoding {
                TransferEncoding::SevenBit | TransferEncoding::EightBit => {
                    true
                }
                _ => false,
            },
            token,
        })
    }

    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TransferEncoding) {
        self.encoding = encoding;
        self.token = encoding.name().to_owned();
    }

    /// Whether the body this header describes is currently held in decoded
    /// form.
    pub fn is_decoded(&self) -> bool {
        self.decoded
    }

    pub fn set_decoded(&mut self, decoded: bool) {
        self.decoded = decoded;
    }

    /// Whether the body is decoded but declared as quoted-printable or
    /// base64, and so must be encoded before transmission.
    pub fn need_to_encode(&self) -> bool {
        self.decoded
            && match self.encoding {
                TransferEncoding::QuotedPrintable
                | TransferEncoding::Base64 => true,
                _ => false,
            }
    }

    /// The token as it appeared in the header.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

/// The value of a Usenet `Control` header: a command and its argument.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub parameter: String,
}

impl Control {
    pub(super) fn parse(raw: &[u8]) -> Option<Self> {
        let i = eat_cfws(raw);
        if i.is_empty() {
            return None;
        }

        let end = i
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(i.len());
        let parameter = eat_cfws(&i[end..]);
        Some(Control {
            name: String::from_utf8_lossy(&i[..end]).into_owned(),
            parameter: String::from_utf8_lossy(parameter).trim_end().to_owned(),
        })
    }

    pub(super) fn as_7bit_string(&self) -> String {
        if self.parameter.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.parameter)
        }
    }

    pub fn is_cancel(&self) -> bool {
        self.name.eq_ignore_ascii_case("cancel")
    }

    /// Turn this into a cancel request for the given message-id.
    pub fn set_cancel(&mut self, message_id: &str) {
        self.name = "cancel".to_owned();
        self.parameter = message_id.to_owned();
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokens() {
        assert_eq!(Some("base64".to_owned()), parse_single_token(b" base64 "));
        assert_eq!(
            Some("base64".to_owned()),
            parse_single_token(b"base64 (comment) junk")
        );
        assert_eq!(None, parse_single_token(b""));
    }

    #[test]
    fn phrase_lists() {
        let policy = CharsetPolicy::default();
        assert_eq!(
            Some(vec![
                "foo".to_owned(),
                "bar baz".to_owned(),
                "Grüße".to_owned()
            ]),
            parse_phrase_list(
                b"foo, ,\"bar baz\" , =?utf-8?q?Gr=C3=BC=C3=9Fe?=",
                &policy
            )
        );
        assert_eq!(Some(vec![]), parse_phrase_list(b" ", &policy));
        assert_eq!(None, parse_phrase_list(b"foo <bar>", &policy));
    }

    #[test]
    fn dot_atoms_and_numbers() {
        assert_eq!(
            Some("1.0".to_owned()),
            parse_single_dot_atom(b"1.0 (produced by MetaSend Vx.x)")
        );
        assert_eq!(Some(42), parse_lines(b" 42"));
        assert_eq!(None, parse_lines(b"many"));
    }

    #[test]
    fn newsgroups() {
        assert_eq!(
            vec!["comp.lang.rust", "alt.test", "misc.misc"],
            parse_newsgroups(b"comp.lang.rust,alt.test ,\n misc.misc")
        );
        assert!(parse_newsgroups(b"  ").is_empty());
    }

    #[test]
    fn transfer_encoding() {
        let cte = ContentTransferEncoding::parse(b"Quoted-Printable").unwrap();
        assert_eq!(TransferEncoding::QuotedPrintable, cte.encoding());
        assert!(!cte.is_decoded());
        assert!(!cte.need_to_encode());
        assert_eq!("Quoted-Printable", cte.token());

        let cte = ContentTransferEncoding::parse(b"8bit").unwrap();
        assert_eq!(TransferEncoding::EightBit, cte.encoding());
        assert!(cte.is_decoded());

        let cte = ContentTransferEncoding::parse(b"x-gzip64").unwrap();
        assert_eq!(TransferEncoding::SevenBit, cte.encoding());
        assert_eq!("x-gzip64", cte.token());

        let mut cte = ContentTransferEncoding::new(TransferEncoding::Base64);
        assert!(cte.need_to_encode());
        cte.set_decoded(false);
        assert!(!cte.need_to_encode());
        assert_eq!("base64", cte.token());
    }

    #[test]
    fn control() {
        let control =
            Control::parse(b" cancel   <1234@example.com> ").unwrap();
        assert!(control.is_cancel());
        assert_eq!("<1234@example.com>", control.parameter);
        assert_eq!("cancel <1234@example.com>", control.as_7bit_string());

        let control = Control::parse(b"newgroup").unwrap();
        assert!(!control.is_cancel());
        assert_eq!("newgroup", control.as_7bit_string());

        assert!(Control::parse(b"  ").is_none());
    }
}
