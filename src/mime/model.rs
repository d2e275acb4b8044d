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


//! Plain value types shared by the header model and the content tree.

use std::fmt;

use chrono::prelude::*;

use super::charset::CharsetPolicy;
use super::encoded_word::{encode_rfc2047_sentence, encode_rfc2047_string};
use super::header_parsing;
use super::util::{add_quotes, is_atext, remove_bidi_control_chars};
use crate::codec::{self, Codec};

/// An RFC 2822 `addr-spec`, i.e., `local-part@domain`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AddrSpec {
    pub local_part: String,
    pub domain: String,
}

impl AddrSpec {
    pub fn new(
        local_part: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        AddrSpec {
            local_part: local_part.into(),
            domain: domain.into(),
        }
    }

    /// Render the addr-spec, quoting the local part if it contains anything
    /// that isn't valid in a dot-atom.
    pub fn as_string(&self) -> String {
        let needs_quotes = self
            .local_part
            .bytes()
            .any(|b| b != b'.' && !is_atext(b));

        let mut s = String::with_capacity(
            self.local_part.len() + self.domain.len() + 3,
        );
        if needs_quotes {
            s.push('"');
            for ch in self.local_part.chars() {
                if '\\' == ch || '"' == ch {
                    s.push('\\');
                }
                s.push(ch);
            }
            s.push('"');
        } else {
            s.push_str(&self.local_part);
        }

        if !self.domain.is_empty() {
            s.push('@');
            s.push_str(&self.domain);
        }
        s
    }

    pub fn is_empty(&self) -> bool {
        self.local_part.is_empty() && self.domain.is_empty()
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// How `Mailbox::pretty_address` treats the display name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quoting {
    /// Never quote; the result is meant for humans.
    Never,
    /// Quote the display name only if it contains specials.
    WhenNecessary,
    /// Always quote the display name.
    Always,
}

/// A single RFC 2822 mailbox: an optional display name plus an address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mailbox {
    name: String,
    addr_spec: AddrSpec,
}

impl Mailbox {
    pub fn new(name: &str, addr_spec: AddrSpec) -> Self {
        Mailbox {
            name: remove_bidi_control_chars(name),
            addr_spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the display name, stripping directional overrides that could be
    /// used to make the name render misleadingly.
    pub fn set_name(&mut self, name: &str) {
        self.name = remove_bidi_control_chars(name);
    }

    pub fn addr_spec(&self) -> &AddrSpec {
        &self.addr_spec
    }

    pub fn set_addr_spec(&mut self, addr_spec: AddrSpec) {
        self.addr_spec = addr_spec;
    }

    /// Set the address from a raw `local@domain` string.
    ///
    /// Returns whether the string could be parsed. On failure, the mailbox
    /// is unchanged.
    pub fn set_address(&mut self, address: &str) -> bool {
        match header_parsing::parse_addr_spec(address.as_bytes()) {
            Ok((_, addr_spec)) => {
                self.addr_spec = addr_spec;
                true
            }
            Err(_) => false,
        }
    }

    pub fn address(&self) -> String {
        self.addr_spec.as_string()
    }

    pub fn has_address(&self) -> bool {
        !self.addr_spec.is_empty()
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Format the mailbox for display, without any RFC 2047 encoding.
    pub fn pretty_address(&self, quoting: Quoting) -> String {
        if !self.has_name() {
            return self.address();
        }

        let mut s = match quoting {
            Quoting::Never => self.name.clone(),
            Quoting::WhenNecessary => add_quotes(&self.name, false),
            Quoting::Always => add_quotes(&self.name, true),
        };
        if self.has_address() {
            s.push_str(" <");
            s.push_str(&self.address());
            s.push('>');
        }
        s
    }

    /// Parse the mailbox from possibly non-ASCII text.
    pub fn from_unicode_string(&mut self, s: &str) -> bool {
        self.from_7bit_string(encode_rfc2047_sentence(s, "utf-8").as_bytes())
    }

    /// Parse the mailbox from its wire form.
    ///
    /// Returns false and leaves the mailbox unchanged if `raw` isn't a
    /// mailbox.
    pub fn from_7bit_string(&mut self, raw: &[u8]) -> bool {
        match header_parsing::parse_mailbox(raw, &CharsetPolicy::default()) {
            Ok((_, mailbox)) => {
                *self = mailbox;
                true
            }
            Err(_) => false,
        }
    }

    /// Render the mailbox in its wire form, encoding a non-ASCII display
    /// name with `charset`.
    pub fn as_7bit_string(&self, charset: &str) -> String {
        if !self.has_name() {
            return self.address();
        }

        let mut s = if self.name.is_ascii() {
            add_quotes(&self.name, false)
        } else {
            encode_rfc2047_string(&self.name, charset, true)
        };
        if self.has_address() {
            s.push_str(" <");
            s.push_str(&self.address());
            s.push('>');
        }
        s
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_address(Quoting::WhenNecessary))
    }
}

/// Either a bare mailbox (with an empty display name) or an RFC 2822 group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    pub display_name: String,
    pub mailboxes: Vec<Mailbox>,
}

impl Address {
    pub fn is_group(&self) -> bool {
        !self.display_name.is_empty()
    }
}

impl From<Mailbox> for Address {
    fn from(mailbox: Mailbox) -> Self {
        Address {
            display_name: String::new(),
            mailboxes: vec![mailbox],
        }
    }
}

/// The values of `Content-Transfer-Encoding` we understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
    UuEncode,
    Binary,
}

impl Default for TransferEncoding {
    fn default() -> Self {
        TransferEncoding::SevenBit
    }
}

impl TransferEncoding {
    /// The canonical header spelling.
    pub fn name(self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7Bit",
            TransferEncoding::EightBit => "8Bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::UuEncode => "x-uuencode",
            TransferEncoding::Binary => "binary",
        }
    }

    /// Look up an encoding by its header token, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [
            TransferEncoding::SevenBit,
            TransferEncoding::EightBit,
            TransferEncoding::QuotedPrintable,
            TransferEncoding::Base64,
            TransferEncoding::UuEncode,
            TransferEncoding::Binary,
        ]
        .iter()
        .copied()
        .find(|e| e.name().eq_ignore_ascii_case(name))
    }

    /// Whether bodies in this encoding must go through a codec on the way
    /// in and out.
    pub fn is_codec_encoding(self) -> bool {
        match self {
            TransferEncoding::QuotedPrintable
            | TransferEncoding::Base64
            | TransferEncoding::UuEncode => true,
            _ => false,
        }
    }

    pub fn codec(self) -> &'static dyn Codec {
        match self {
            TransferEncoding::SevenBit => &codec::SEVEN_BIT,
            TransferEncoding::EightBit => &codec::EIGHT_BIT,
            TransferEncoding::QuotedPrintable => {
                &codec::QuotedPrintableCodec
            }
            TransferEncoding::Base64 => &codec::Base64Codec,
            TransferEncoding::UuEncode => &codec::UuCodec,
            TransferEncoding::Binary => &codec::BINARY,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The role a part plays within its parent, derived from `Content-Type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    Single,
    Container,
    MixedPart,
    AlternativePart,
}

impl Default for ContentCategory {
    fn default() -> Self {
        ContentCategory::Single
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispositionType {
    Invalid,
    Inline,
    Attachment,
}

impl Default for DispositionType {
    fn default() -> Self {
        DispositionType::Invalid
    }
}

impl DispositionType {
    pub fn name(self) -> Option<&'static str> {
        match self {
            DispositionType::Invalid => None,
            DispositionType::Inline => Some("inline"),
            DispositionType::Attachment => Some("attachment"),
        }
    }
}

/// A parsed date-time.
///
/// `-0000` denotes a local time whose offset from UTC is unknown; that is
/// recorded as a zero offset with `zone_known` false, which distinguishes
/// it from `+0000`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub date_time: DateTime<FixedOffset>,
    pub zone_known: bool,
}

impl Timestamp {
    pub fn new(date_time: DateTime<FixedOffset>) -> Self {
        Timestamp {
            date_time,
            zone_known: true,
        }
    }

    pub fn now() -> Self {
        let now = Local::now();
        Timestamp::new(now.with_timezone(now.offset()))
    }

    /// Format as an RFC 2822 date-time.
    pub fn to_rfc2822(&self) -> String {
        if self.zone_known {
            self.date_time
                .format("%a, %d %b %Y %H:%M:%S %z")
                .to_string()
        } else {
            format!("{} -0000", self.date_time.format("%a, %d %b %Y %H:%M:%S"))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn addr_spec_quoting() {
        assert_eq!("foo@bar.com", AddrSpec::new("foo", "bar.com").as_string());
        assert_eq!(
            "first.last@bar.com",
            AddrSpec::new("first.last", "bar.com").as_string()
        );
        assert_eq!(
            r#""john doe"@bar.com"#,
            AddrSpec::new("john doe", "bar.com").as_string()
        );
        assert_eq!(
            r#""a\"b"@bar.com"#,
            AddrSpec::new("a\"b", "bar.com").as_string()
        );
        assert!(AddrSpec::default().is_empty());
    }

    #[test]
    fn mailbox_rendering() {
        let mut mb = Mailbox::new("John Doe", AddrSpec::new("john", "ex.com"));
        assert_eq!("John Doe <john@ex.com>", mb.as_7bit_string("utf-8"));
        assert_eq!(
            "John Doe <john@ex.com>",
            mb.pretty_address(Quoting::Never)
        );

        mb.set_name("Doe, John");
        assert_eq!("\"Doe, John\" <john@ex.com>", mb.as_7bit_string("utf-8"));
        assert_eq!(
            "Doe, John <john@ex.com>",
            mb.pretty_address(Quoting::Never)
        );

        mb.set_name("Jürgen");
        assert_eq!(
            "=?ISO-8859-1?Q?J=FCrgen?= <john@ex.com>",
            mb.as_7bit_string("ISO-8859-1")
        );

        mb.set_name("");
        assert_eq!("john@ex.com", mb.as_7bit_string("utf-8"));
    }

    #[test]
    fn mailbox_strips_bidi_overrides() {
        let mb = Mailbox::new(
            "evil\u{202E}gpj.exe",
            AddrSpec::new("a", "b.com"),
        );
        assert_eq!("evilgpj.exe", mb.name());
    }

    #[test]
    fn mailbox_from_strings() {
        let mut mb = Mailbox::default();
        assert!(mb.from_7bit_string(b"John Doe <john@example.com>"));
        assert_eq!("John Doe", mb.name());
        assert_eq!("john", mb.addr_spec().local_part);
        assert_eq!("example.com", mb.addr_spec().domain);

        assert!(mb.from_unicode_string("Jürgen Müller <jm@example.de>"));
        assert_eq!("Jürgen Müller", mb.name());
        assert_eq!("jm@example.de", mb.address());

        assert!(!mb.from_7bit_string(b"<<<"));
        assert_eq!("jm@example.de", mb.address());

        assert!(mb.set_address("other@example.org"));
        assert_eq!("other@example.org", mb.address());
    }

    #[test]
    fn transfer_encoding_names() {
        assert_eq!(
            Some(TransferEncoding::QuotedPrintable),
            TransferEncoding::from_name("Quoted-Printable")
        );
        assert_eq!(
            Some(TransferEncoding::SevenBit),
            TransferEncoding::from_name("7bit")
        );
        assert_eq!(None, TransferEncoding::from_name("x-gzip"));
        assert_eq!("base64", TransferEncoding::Base64.codec().name());
    }

    #[test]
    fn timestamp_formatting() {
        let dt = FixedOffset::west(6 * 3600)
            .ymd(1997, 11, 21)
            .and_hms(9, 55, 6);
        assert_eq!(
            "Fri, 21 Nov 1997 09:55:06 -0600",
            Timestamp::new(dt).to_rfc2822()
        );

        let unknown = Timestamp {
            date_time: FixedOffset::east(0).ymd(2002, 7, 1).and_hms(9, 0, 0),
            zone_known: false,
        };
        assert_eq!("Mon, 01 Jul 2002 09:00:00 -0000", unknown.to_rfc2822());
    }
}
