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


//! The header model.
//!
//! Every header is a `Header`: a `HeaderKind` naming the field, and a
//! `HeaderValue` holding its parsed form. The kind determines which grammar
//! the value is parsed with; fields we don't know are `Generic` and are
//! treated as unstructured text.
//!
//! Parsing never fails hard. A value which doesn't match its grammar leaves
//! the header empty, and `from_7bit_string` reports false.

use std::sync::Arc;

use log::debug;

use super::charset::{cached_charset, CharsetPolicy};
use super::encoded_word::{
    decode_rfc2047_string, encode_rfc2047_sentence, encode_rfc2047_string,
};
use super::header_parsing::{
    parse_addr_spec, parse_address_list, parse_angle_addr, parse_date_time,
};
use super::model::{AddrSpec, Address, Mailbox, Quoting, Timestamp};
use super::util::{add_quotes, unique_string};

mod address;
mod params;
mod simple;

pub use self::address::MailCopiesTo;
pub use self::params::{ContentDisposition, ContentType, Parameters};
pub use self::simple::{ContentTransferEncoding, Control};

// The grammar a header's value follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Unstructured,
    MailboxList,
    SingleMailbox,
    AddressList,
    MailCopiesTo,
    ReturnPath,
    Ident,
    SingleIdent,
    ContentId,
    PhraseList,
    DotAtom,
    ContentType,
    ContentTransferEncoding,
    ContentDisposition,
    Date,
    Control,
    Newsgroups,
    Lines,
}

macro_rules! header_kinds {
    ($($kind:ident => $name:expr, $shape:ident;)*) => {
        /// The field a header represents.
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum HeaderKind {
            $($kind,)*
            /// Any field without a dedicated kind. The name is kept as
            /// given.
            Generic(String),
        }

        impl HeaderKind {
            /// Map a field name to its kind, ignoring case.
            pub fn from_name(name: &str) -> Self {
                $(if name.eq_ignore_ascii_case($name) {
                    return HeaderKind::$kind;
                })*
                HeaderKind::Generic(name.to_owned())
            }

            /// The canonical field name.
            pub fn name(&self) -> &str {
                match *self {
                    $(HeaderKind::$kind => $name,)*
                    HeaderKind::Generic(ref name) => name,
                }
            }

            fn shape(&self) -> Shape {
                match *self {
                    $(HeaderKind::$kind => Shape::$shape,)*
                    HeaderKind::Generic(_) => Shape::Unstructured,
                }
            }
        }
    };
}

header_kinds! {
    From => "From", MailboxList;
    Sender => "Sender", SingleMailbox;
    ReplyTo => "Reply-To", AddressList;
    To => "To", AddressList;
    Cc => "Cc", AddressList;
    Bcc => "Bcc", AddressList;
    MailCopiesTo => "Mail-Copies-To", MailCopiesTo;
    ReturnPath => "Return-Path", ReturnPath;
    Subject => "Subject", Unstructured;
    Organization => "Organization", Unstructured;
    ContentDescription => "Content-Description", Unstructured;
    ContentLocation => "Content-Location", Unstructured;
    UserAgent => "User-Agent", Unstructured;
    MessageId => "Message-ID", SingleIdent;
    ContentId => "Content-ID", ContentId;
    Supersedes => "Supersedes", SingleIdent;
    InReplyTo => "In-Reply-To", Ident;
    References => "References", Ident;
    Keywords => "Keywords", PhraseList;
    MimeVersion => "MIME-Version", DotAtom;
    ContentType => "Content-Type", ContentType;
    ContentTransferEncoding => "Content-Transfer-Encoding",
        ContentTransferEncoding;
    ContentDisposition => "Content-Disposition", ContentDisposition;
    Date => "Date", Date;
    Control => "Control", Control;
    Newsgroups => "Newsgroups", Newsgroups;
    FollowUpTo => "Followup-To", Newsgroups;
    Lines => "Lines", Lines;
}

impl HeaderKind {
    /// Whether two kinds name the same field. Generic names compare
    /// case-insensitively.
    pub fn matches(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }
}

/// The parsed value of a header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderValue {
    Unstructured(String),
    Mailboxes(Vec<Mailbox>),
    Addresses(Vec<Address>),
    MailCopiesTo(MailCopiesTo),
    /// `Some` with an empty mailbox is the null path, `<>`.
    ReturnPath(Option<Mailbox>),
    Idents(Vec<AddrSpec>),
    Phrases(Vec<String>),
    DotAtom(String),
    ContentType(ContentType),
    ContentTransferEncoding(ContentTransferEncoding),
    ContentDisposition(ContentDisposition),
    Date(Option<Timestamp>),
    Control(Control),
    Newsgroups(Vec<String>),
    Lines(Option<u32>),
}

impl HeaderValue {
    fn empty(shape: Shape) -> Self {
        match shape {
            Shape::Unstructured => HeaderValue::Unstructured(String::new()),
            Shape::MailboxList | Shape::SingleMailbox => {
                HeaderValue::Mailboxes(Vec::new())
            }
            Shape::AddressList => HeaderValue::Addresses(Vec::new()),
            Shape::MailCopiesTo => {
                HeaderValue::MailCopiesTo(MailCopiesTo::default())
            }
            Shape::ReturnPath => HeaderValue::ReturnPath(None),
            Shape::Ident | Shape::SingleIdent | Shape::ContentId => {
                HeaderValue::Idents(Vec::new())
            }
            Shape::PhraseList => HeaderValue::Phrases(Vec::new()),
            Shape::DotAtom => HeaderValue::DotAtom(String::new()),
            Shape::ContentType => {
                HeaderValue::ContentType(ContentType::default())
            }
            Shape::ContentTransferEncoding => {
                HeaderValue::ContentTransferEncoding(
                    ContentTransferEncoding::default(),
                )
            }
            Shape::ContentDisposition => {
                HeaderValue::ContentDisposition(ContentDisposition::default())
            }
            Shape::Date => HeaderValue::Date(None),
            Shape::Control => HeaderValue::Control(Control::default()),
            Shape::Newsgroups => HeaderValue::Newsgroups(Vec::new()),
            Shape::Lines => HeaderValue::Lines(None),
        }
    }

    fn parse(
        shape: Shape,
        raw: &[u8],
        policy: &CharsetPolicy,
    ) -> Option<(Self, Option<Arc<str>>)> {
        let value = match shape {
            Shape::Unstructured => {
                let (text, charset) = decode_rfc2047_string(raw, policy);
                return Some((HeaderValue::Unstructured(text), charset));
            }
            Shape::MailboxList => HeaderValue::Mailboxes(
                address::parse_mailbox_list(raw, policy, false)?,
            ),
            Shape::SingleMailbox => HeaderValue::Mailboxes(
                address::parse_mailbox_list(raw, policy, true)?,
            ),
            Shape::AddressList => HeaderValue::Addresses(
                parse_address_list(raw, policy)
                    .ok()?
                    .1,
            ),
            Shape::MailCopiesTo => {
                HeaderValue::MailCopiesTo(MailCopiesTo::parse(raw, policy)?)
            }
            Shape::ReturnPath => HeaderValue::ReturnPath(Some(
                address::parse_return_path(raw, policy)?,
            )),
            Shape::Ident => {
                HeaderValue::Idents(address::parse_ident_list(raw, false)?)
            }
            Shape::SingleIdent | Shape::ContentId => {
                let ids = address::parse_ident_list(
                    raw,
                    Shape::ContentId == shape,
                )?;
                if ids.len() > 1 {
                    debug!("More than one msg-id in header allowing one");
                }
                HeaderValue::Idents(ids)
            }
            Shape::PhraseList => {
                HeaderValue::Phrases(simple::parse_phrase_list(raw, policy)?)
            }
            Shape::DotAtom => {
                HeaderValue::DotAtom(simple::parse_single_dot_atom(raw)?)
            }
            Shape::ContentType => {
                let (ct, charset) = ContentType::parse(raw, policy)?;
                return Some((HeaderValue::ContentType(ct), charset));
            }
            Shape::ContentTransferEncoding => {
                HeaderValue::ContentTransferEncoding(
                    ContentTransferEncoding::parse(raw)?,
                )
            }
            Shape::ContentDisposition => {
                let (cd, charset) = ContentDisposition::parse(raw, policy)?;
                return Some((HeaderValue::ContentDisposition(cd), charset));
            }
            Shape::Date => {
                HeaderValue::Date(Some(parse_date_time(raw).ok()?.1))
            }
            Shape::Control => HeaderValue::Control(Control::parse(raw)?),
            Shape::Newsgroups => {
                HeaderValue::Newsgroups(simple::parse_newsgroups(raw))
            }
            Shape::Lines => HeaderValue::Lines(Some(simple::parse_lines(raw)?)),
        };

        Some((value, None))
    }

    pub fn is_empty(&self) -> bool {
        match *self {
            HeaderValue::Unstructured(ref s) | HeaderValue::DotAtom(ref s) => {
                s.is_empty()
            }
            HeaderValue::Mailboxes(ref v) => v.is_empty(),
            HeaderValue::Addresses(ref v) => v.is_empty(),
            HeaderValue::MailCopiesTo(ref v) => v.is_empty(),
            HeaderValue::ReturnPath(ref v) => v.is_none(),
            HeaderValue::Idents(ref v) => v.is_empty(),
            HeaderValue::Phrases(ref v) | HeaderValue::Newsgroups(ref v) => {
                v.is_empty()
            }
            HeaderValue::ContentType(ref v) => v.is_empty(),
            HeaderValue::ContentTransferEncoding(ref v) => v.is_empty(),
            HeaderValue::ContentDisposition(ref v) => v.is_empty(),
            HeaderValue::Date(ref v) => v.is_none(),
            HeaderValue::Control(ref v) => v.is_empty(),
            HeaderValue::Lines(ref v) => v.is_none(),
        }
    }
}

/// A single header field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    kind: HeaderKind,
    value: HeaderValue,
    /// The charset found while decoding, or requested for encoding.
    charset: Option<Arc<str>>,
    policy: CharsetPolicy,
}

impl Header {
    /// Create an empty header of the given kind.
    pub fn new(kind: HeaderKind) -> Self {
        Header::with_policy(kind, CharsetPolicy::default())
    }

    /// Create an empty header of the given kind. A `Generic` kind naming a
    /// field we know is replaced by that field's dedicated kind.
    pub fn with_policy(kind: HeaderKind, policy: CharsetPolicy) -> Self {
        let kind = match kind {
            HeaderKind::Generic(name) => HeaderKind::from_name(&name),
            kind => kind,
        };
        Header {
            value: HeaderValue::empty(kind.shape()),
            kind,
            charset: None,
            policy,
        }
    }

    /// Create an empty header for the field called `name`.
    pub fn for_name(name: &str) -> Self {
        Header::new(HeaderKind::from_name(name))
    }

    /// Create a header of the given kind from its raw (unfolded) value.
    ///
    /// An unparsable value results in an empty header.
    pub fn parse(kind: HeaderKind, raw: &[u8], policy: &CharsetPolicy) -> Self {
        let mut header = Header::with_policy(kind, policy.clone());
        header.from_7bit_string(raw);
        header
    }

    /// Create a `Message-ID` header with a new unique identifier in the
    /// given domain.
    pub fn generate_message_id(fqdn: &str) -> Self {
        let mut header = Header::new(HeaderKind::MessageId);
        header.set_identifier(&format!("<{}@{}>", unique_string(), fqdn));
        header
    }

    pub fn kind(&self) -> &HeaderKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn value(&self) -> &HeaderValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut HeaderValue {
        &mut self.value
    }

    pub fn policy(&self) -> &CharsetPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: CharsetPolicy) {
        self.policy = policy;
    }

    /// Whether this is one of the `Content-*` headers.
    pub fn is_mime_header(&self) -> bool {
        let name = self.name().as_bytes();
        name.len() >= 8 && name[..8].eq_ignore_ascii_case(b"Content-")
    }

    /// Whether this is an extension (`X-`) header.
    pub fn is_x_header(&self) -> bool {
        self.name().starts_with("X-")
    }

    /// The charset used for RFC 2047 encoding: the one set on or found in
    /// the header, unless the policy forces the default.
    pub fn rfc2047_charset(&self) -> Arc<str> {
        self.policy.resolve(self.charset.as_deref())
    }

    pub fn set_rfc2047_charset(&mut self, charset: &str) {
        self.charset = Some(cached_charset(charset));
    }

    pub fn clear(&mut self) {
        self.value = HeaderValue::empty(self.kind.shape());
    }

    pub fn is_empty(&self) -> bool {
        self.name().is_empty() || self.value.is_empty()
    }

    /// Parse the header from its raw wire form, which must already be
    /// unfolded.
    ///
    /// On failure, the header is left empty and false is returned.
    pub fn from_7bit_string(&mut self, raw: &[u8]) -> bool {
        self.clear();
        match HeaderValue::parse(self.kind.shape(), raw, &self.policy) {
            Some((value, charset)) => {
                self.value = value;
                if charset.is_some() {
                    self.charset = charset;
                }
                true
            }
            None => {
                debug!(
                    "Failed to parse {}: {:?}",
                    self.name(),
                    String::from_utf8_lossy(raw)
                );
                false
            }
        }
    }

    /// Render the header in its wire form, optionally preceded by
    /// `Name: `. An empty header renders as nothing at all.
    pub fn as_7bit_string(&self, with_type: bool) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }

        let charset = self.rfc2047_charset();
        let body = match self.value {
            HeaderValue::Unstructured(ref s) => {
                encode_rfc2047_string(s, &charset, false)
            }
            HeaderValue::Mailboxes(ref v) => {
                address::mailboxes_as_7bit_string(v, &charset)
            }
            HeaderValue::Addresses(ref v) => {
                address::addresses_as_7bit_string(v, &charset)
            }
            HeaderValue::MailCopiesTo(ref v) => v.as_7bit_string(&charset),
            HeaderValue::ReturnPath(ref v) => format!(
                "<{}>",
                v.as_ref()
                    .map(|mb| mb.addr_spec().as_string())
                    .unwrap_or_default()
            ),
            HeaderValue::Idents(ref v) => address::idents_as_7bit_string(v),
            HeaderValue::Phrases(ref v) => v
                .iter()
                .map(|phrase| {
                    if phrase.is_ascii() {
                        add_quotes(phrase, false)
                    } else {
                        encode_rfc2047_string(phrase, &charset, false)
                    }
                })
                .collect::<Vec<_>>()
                .join(", "),
            HeaderValue::DotAtom(ref s) => s.clone(),
            HeaderValue::ContentType(ref v) => v.as_7bit_string(&charset),
            HeaderValue::ContentTransferEncoding(ref v) => v.token().to_owned(),
            HeaderValue::ContentDisposition(ref v) => {
                v.as_7bit_string(&charset)
            }
            HeaderValue::Date(ref v) => {
                v.as_ref().map(Timestamp::to_rfc2822).unwrap_or_default()
            }
            HeaderValue::Control(ref v) => v.as_7bit_string(),
            HeaderValue::Newsgroups(ref v) => v.join(","),
            HeaderValue::Lines(ref v) => {
                v.map(|n| n.to_string()).unwrap_or_default()
            }
        };

        let mut out = Vec::with_capacity(body.len() + self.name().len() + 2);
        if with_type {
            out.extend_from_slice(self.name().as_bytes());
            out.extend_from_slice(b": ");
        }
        out.extend_from_slice(body.as_bytes());
        out
    }

    /// Set the header from (possibly non-ASCII) text, to be encoded with
    /// `charset` when serialised.
    pub fn from_unicode_string(&mut self, s: &str, charset: &str) -> bool {
        self.charset = Some(cached_charset(charset));
        match self.kind.shape() {
            Shape::Unstructured => {
                self.value = HeaderValue::Unstructured(s.to_owned());
                true
            }
            Shape::MailboxList
            | Shape::SingleMailbox
            | Shape::AddressList
            | Shape::MailCopiesTo
            | Shape::ReturnPath => self.from_7bit_string(
                encode_rfc2047_sentence(s, charset).as_bytes(),
            ),
            Shape::Newsgroups => {
                self.charset = Some(cached_charset("UTF-8"));
                self.from_7bit_string(s.as_bytes())
            }
            _ => self.from_7bit_string(s.as_bytes()),
        }
    }

    /// Render the header value as human-readable text.
    pub fn as_unicode_string(&self) -> String {
        match self.value {
            HeaderValue::Unstructured(ref s) | HeaderValue::DotAtom(ref s) => {
                s.clone()
            }
            HeaderValue::Mailboxes(_) | HeaderValue::Addresses(_) => {
                self.pretty_addresses().join(", ")
            }
            HeaderValue::MailCopiesTo(ref v) if !v.addresses.is_empty() => {
                self.pretty_addresses().join(", ")
            }
            HeaderValue::Phrases(ref v) => v.join(", "),
            HeaderValue::Newsgroups(ref v) => v.join(","),
            _ => String::from_utf8_lossy(&self.as_7bit_string(false))
                .into_owned(),
        }
    }

    /// All mailboxes in an address-bearing header, with groups flattened.
    pub fn mailboxes(&self) -> Vec<Mailbox> {
        match self.value {
            HeaderValue::Mailboxes(ref v) => v.clone(),
            HeaderValue::Addresses(ref v) => {
                v.iter().flat_map(|a| a.mailboxes.iter().cloned()).collect()
            }
            HeaderValue::MailCopiesTo(ref v) => v
                .addresses
                .iter()
                .flat_map(|a| a.mailboxes.iter().cloned())
                .collect(),
            HeaderValue::ReturnPath(Some(ref mb)) => vec![mb.clone()],
            _ => Vec::new(),
        }
    }

    /// The addresses (`local@domain`) of all mailboxes.
    pub fn addresses(&self) -> Vec<String> {
        self.mailboxes().iter().map(Mailbox::address).collect()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.mailboxes()
            .iter()
            .map(|mb| mb.name().to_owned())
            .collect()
    }

    pub fn pretty_addresses(&self) -> Vec<String> {
        self.mailboxes()
            .iter()
            .map(|mb| mb.pretty_address(Quoting::Never))
            .collect()
    }

    /// Append a mailbox to an address-bearing header.
    ///
    /// Returns false if the header doesn't hold addresses.
    pub fn add_mailbox(&mut self, mailbox: Mailbox) -> bool {
        match self.value {
            HeaderValue::Mailboxes(ref mut v) => v.push(mailbox),
            HeaderValue::Addresses(ref mut v) => v.push(mailbox.into()),
            HeaderValue::MailCopiesTo(ref mut v) => {
                v.addresses.push(mailbox.into())
            }
            HeaderValue::ReturnPath(ref mut v) => *v = Some(mailbox),
            _ => return false,
        }
        true
    }

    /// Append a mailbox given as an address (bare or in angle brackets)
    /// and a display name.
    pub fn add_address(&mut self, address: &str, display_name: &str) -> bool {
        let raw = address.as_bytes();
        let addr_spec = match parse_angle_addr(raw)
            .or_else(|_| parse_addr_spec(raw))
        {
            Ok((_, addr_spec)) => addr_spec,
            Err(_) => {
                debug!("Invalid address {:?}", address);
                return false;
            }
        };
        self.add_mailbox(Mailbox::new(display_name, addr_spec))
    }

    /// The message identifiers in an ident header, without angle brackets.
    pub fn identifiers(&self) -> Vec<String> {
        match self.value {
            HeaderValue::Idents(ref v) => v
                .iter()
                .filter(|id| !id.is_empty())
                .map(AddrSpec::as_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The first message identifier, for headers which carry only one.
    pub fn identifier(&self) -> Option<String> {
        self.identifiers().into_iter().next()
    }

    /// Append a message identifier, with or without its angle brackets.
    pub fn append_identifier(&mut self, id: &str) -> bool {
        let mut bracketed = String::with_capacity(id.len() + 2);
        if !id.starts_with('<') {
            bracketed.push('<');
        }
        bracketed.push_str(id);
        if !id.ends_with('>') {
            bracketed.push('>');
        }

        let lenient = Shape::ContentId == self.kind.shape();
        let parsed = address::parse_ident_list(bracketed.as_bytes(), lenient)
            .filter(|ids| 1 == ids.len());
        match (&mut self.value, parsed) {
            (HeaderValue::Idents(ref mut v), Some(mut ids)) => {
                v.append(&mut ids);
                true
            }
            (_, None) => {
                debug!("Unable to parse message identifier {:?}", id);
                false
            }
            _ => false,
        }
    }

    /// Replace all message identifiers with `id`.
    pub fn set_identifier(&mut self, id: &str) -> bool {
        self.clear();
        self.append_identifier(id)
    }

    pub fn phrases(&self) -> &[String] {
        match self.value {
            HeaderValue::Phrases(ref v) => v,
            _ => &[],
        }
    }

    pub fn date_time(&self) -> Option<Timestamp> {
        match self.value {
            HeaderValue::Date(v) => v,
            _ => None,
        }
    }

    pub fn set_date_time(&mut self, timestamp: Timestamp) -> bool {
        match self.value {
            HeaderValue::Date(ref mut v) => {
                *v = Some(timestamp);
                true
            }
            _ => false,
        }
    }

    pub fn newsgroups(&self) -> &[String] {
        match self.value {
            HeaderValue::Newsgroups(ref v) => v,
            _ => &[],
        }
    }

    pub fn set_newsgroups(&mut self, groups: Vec<String>) -> bool {
        match self.value {
            HeaderValue::Newsgroups(ref mut v) => {
                *v = groups;
                true
            }
            _ => false,
        }
    }

    pub fn is_crossposted(&self) -> bool {
        self.newsgroups().len() >= 2
    }

    pub fn number_of_lines(&self) -> Option<u32> {
        match self.value {
            HeaderValue::Lines(v) => v,
            _ => None,
        }
    }

    pub fn set_number_of_lines(&mut self, lines: u32) -> bool {
        match self.value {
            HeaderValue::Lines(ref mut v) => {
                *v = Some(lines);
                true
            }
            _ => false,
        }
    }

    /// Whether this is a subject starting with `Re:`.
    pub fn is_reply(&self) -> bool {
        match self.value {
            HeaderValue::Unstructured(ref s) => s
                .get(..3)
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case("re:")),
            _ => false,
        }
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        match self.value {
            HeaderValue::ContentType(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn content_type_mut(&mut self) -> Option<&mut ContentType> {
        match self.value {
            HeaderValue::ContentType(ref mut v) => Some(v),
            _ => None,
        }
    }

    pub fn content_transfer_encoding(
        &self,
    ) -> Option<&ContentTransferEncoding> {
        match self.value {
            HeaderValue::ContentTransferEncoding(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn content_transfer_encoding_mut(
        &mut self,
    ) -> Option<&mut ContentTransferEncoding> {
        match self.value {
            HeaderValue::ContentTransferEncoding(ref mut v) => Some(v),
            _ => None,
        }
    }

    pub fn content_disposition(&self) -> Option<&ContentDisposition> {
        match self.value {
            HeaderValue::ContentDisposition(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn content_disposition_mut(
        &mut self,
    ) -> Option<&mut ContentDisposition> {
        match self.value {
            HeaderValue::ContentDisposition(ref mut v) => Some(v),
            _ => None,
        }
    }

    pub fn control(&self) -> Option<&Control> {
        match self.value {
            HeaderValue::Control(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn control_mut(&mut self) -> Option<&mut Control> {
        match self.value {
            HeaderValue::Control(ref mut v) => Some(v),
            _ => None,
        }
    }

    pub fn mail_copies_to(&self) -> Option<&MailCopiesTo> {
        match self.value {
            HeaderValue::MailCopiesTo(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn mail_copies_to_mut(&mut self) -> Option<&mut MailCopiesTo> {
        match self.value {
            HeaderValue::MailCopiesTo(ref mut v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::prelude::*;

    use super::*;
    use crate::mime::model::{DispositionType, TransferEncoding};

    fn parse(name: &str, raw: &str) -> Header {
        Header::parse(
            HeaderKind::from_name(name),
            raw.as_bytes(),
            &CharsetPolicy::new("utf-8", false),
        )
    }

    fn wire(header: &Header) -> String {
        String::from_utf8(header.as_7bit_string(true)).unwrap()
    }

    #[test]
    fn kinds_from_names() {
        assert_eq!(HeaderKind::From, HeaderKind::from_name("from"));
        assert_eq!(HeaderKind::MessageId, HeaderKind::from_name("MESSAGE-ID"));
        assert_eq!(
            HeaderKind::FollowUpTo,
            HeaderKind::from_name("Followup-To")
        );
        assert_eq!(
            HeaderKind::Generic("X-Mailer".to_owned()),
            HeaderKind::from_name("X-Mailer")
        );
        assert_eq!(
            "Content-Transfer-Encoding",
            HeaderKind::ContentTransferEncoding.name()
        );
        assert!(HeaderKind::ContentType.matches("content-type"));
    }

    #[test]
    fn classification() {
        assert!(Header::for_name("content-type").is_mime_header());
        assert!(Header::for_name("Content-X-Foo").is_mime_header());
        assert!(!Header::for_name("Subject").is_mime_header());
        assert!(Header::for_name("X-Mailer").is_x_header());
        assert!(!Header::for_name("Subject").is_x_header());
    }

    #[test]
    fn single_mailbox() {
        let h = parse("Sender", "John Doe <john@example.com>");
        let mailboxes = h.mailboxes();
        assert_eq!(1, mailboxes.len());
        assert_eq!("John Doe", mailboxes[0].name());
        assert_eq!("john", mailboxes[0].addr_spec().local_part);
        assert_eq!("example.com", mailboxes[0].addr_spec().domain);
        assert_eq!("Sender: John Doe <john@example.com>", wire(&h));
    }

    #[test]
    fn address_headers() {
        let h = parse(
            "To",
            "=?ISO-8859-1?Q?Andr=E9?= Pirard <PIRARD@vm1.ulg.ac.be>, b@x.test",
        );
        assert_eq!(
            vec!["PIRARD@vm1.ulg.ac.be", "b@x.test"],
            h.addresses()
        );
        assert_eq!(vec!["André Pirard", ""], h.display_names());
        assert_eq!(
            "André Pirard <PIRARD@vm1.ulg.ac.be>, b@x.test",
            h.as_unicode_string()
        );
        assert_eq!(
            "To: =?UTF-8?B?QW5kcsOp?= Pirard <PIRARD@vm1.ulg.ac.be>, b@x.test",
            wire(&h)
        );

        let mut h = Header::new(HeaderKind::Cc);
        assert!(h.add_address("<c@x.test>", "Carol"));
        assert!(h.add_address("d@x.test", ""));
        assert!(!h.add_address("nonsense", ""));
        assert_eq!("Cc: Carol <c@x.test>, d@x.test", wire(&h));

        let h = parse("From", "<<<");
        assert!(h.is_empty());
        assert_eq!(b"".to_vec(), h.as_7bit_string(true));
    }

    #[test]
    fn unicode_addresses() {
        let mut h = Header::new(HeaderKind::From);
        assert!(h.from_unicode_string("Jürgen Müller <jm@x.test>", "utf-8"));
        assert_eq!("Jürgen Müller", h.display_names()[0]);
        assert_eq!("Jürgen Müller <jm@x.test>", h.as_unicode_string());
        assert_eq!(
            "From: =?UTF-8?B?SsO8cmdlbiBNw7xsbGVy?= <jm@x.test>",
            wire(&h)
        );
    }

    #[test]
    fn unstructured() {
        let h = parse("Subject", "=?iso-8859-1?q?caf=E9?= report");
        assert_eq!("café report", h.as_unicode_string());
        assert_eq!("ISO-8859-1", &*h.rfc2047_charset());
        assert_eq!("Subject: =?ISO-8859-1?Q?caf=E9?= report", wire(&h));
        assert!(!h.is_reply());

        let h = parse("Subject", "RE: lunch");
        assert!(h.is_reply());

        let h = parse("X-Custom", "anything: goes <here>");
        assert_eq!(&HeaderKind::Generic("X-Custom".to_owned()), h.kind());
        assert_eq!("X-Custom: anything: goes <here>", wire(&h));

        let h = Header::new(HeaderKind::Generic("content-type".to_owned()));
        assert_eq!(&HeaderKind::ContentType, h.kind());
        assert_matches!(HeaderValue::ContentType(_), h.value());

        let mut h = Header::new(HeaderKind::Organization);
        h.from_unicode_string("Ümlaut AG", "iso-8859-1");
        assert_eq!("Organization: =?ISO-8859-1?Q?=DCmlaut?= AG", wire(&h));
    }

    #[test]
    fn forced_charset() {
        let policy = CharsetPolicy::new("iso-8859-2", true);
        let h = Header::parse(
            HeaderKind::Subject,
            b"=?utf-8?q?=C5=81?=",
            &policy,
        );
        assert_eq!("ISO-8859-2", &*h.rfc2047_charset());
        assert_eq!("Ĺ\u{81}", h.as_unicode_string());
    }

    #[test]
    fn idents() {
        let h = parse("References", "<a@x.test> <b@x.test>\n <c@x.test>");
        assert_eq!(vec!["a@x.test", "b@x.test", "c@x.test"], h.identifiers());
        assert_eq!("References: <a@x.test> <b@x.test> <c@x.test>", wire(&h));

        let mut h = Header::new(HeaderKind::InReplyTo);
        assert!(h.append_identifier("x@y.test"));
        assert!(h.append_identifier("<z@y.test>"));
        assert!(!h.append_identifier("not an id"));
        assert_eq!("In-Reply-To: <x@y.test> <z@y.test>", wire(&h));

        let h = parse("Content-ID", "<image001.png@01D1>");
        assert_eq!(Some("image001.png@01D1".to_owned()), h.identifier());
        let h = parse("Content-ID", "<part1.abc>");
        assert_eq!(Some("part1.abc".to_owned()), h.identifier());
        let h = parse("Message-ID", "<part1.abc>");
        assert!(h.is_empty());

        let h = Header::generate_message_id("example.org");
        let id = h.identifier().unwrap();
        assert!(id.ends_with("@example.org"));
        assert_eq!(format!("Message-ID: <{}>", id), wire(&h));
    }

    #[test]
    fn return_path() {
        let h = parse("Return-Path", "<>");
        assert!(!h.is_empty());
        assert_eq!("Return-Path: <>", wire(&h));

        let h = parse("Return-Path", "<bounce@x.test>");
        assert_eq!("Return-Path: <bounce@x.test>", wire(&h));
        assert_eq!(vec!["bounce@x.test"], h.addresses());
    }

    #[test]
    fn content_headers() {
        let h = parse(
            "Content-Type",
            "text/plain; name*=utf-8''%E2%82%AC.txt; charset=utf-8",
        );
        let ct = h.content_type().unwrap();
        assert_eq!(Some("€.txt"), ct.name());
        assert_eq!("UTF-8", &*h.rfc2047_charset());
        assert_eq!(
            "Content-Type: text/plain; charset=\"utf-8\"; \
             name*=UTF-8''%E2%82%AC%2Etxt",
            wire(&h)
        );

        let h = parse("Content-Transfer-Encoding", "BASE64");
        let cte = h.content_transfer_encoding().unwrap();
        assert_eq!(TransferEncoding::Base64, cte.encoding());
        assert_eq!("Content-Transfer-Encoding: BASE64", wire(&h));

        let mut h = parse("Content-Disposition", "inline");
        h.content_disposition_mut()
            .unwrap()
            .set_filename("report.pdf");
        assert_eq!(
            DispositionType::Inline,
            h.content_disposition().unwrap().disposition
        );
        assert_eq!(
            "Content-Disposition: inline; filename=\"report.pdf\"",
            wire(&h)
        );

        let h = parse("Content-Type", "garbage");
        assert!(h.is_empty());
        assert!(h.content_type().unwrap().is_plain_text());
    }

    #[test]
    fn misc_structured() {
        let h = parse("MIME-Version", "1.0");
        assert_eq!("MIME-Version: 1.0", wire(&h));

        let h = parse("Keywords", "rust, \"mail, parsing\"");
        assert_eq!(
            &["rust".to_owned(), "mail, parsing".to_owned()],
            h.phrases()
        );
        assert_eq!("Keywords: rust, \"mail, parsing\"", wire(&h));

        let h = parse("Newsgroups", "comp.lang.rust, alt.test");
        assert!(h.is_crossposted());
        assert_eq!("Newsgroups: comp.lang.rust,alt.test", wire(&h));
        assert!(!parse("Followup-To", "poster").is_crossposted());

        let h = parse("Lines", "17");
        assert_eq!(Some(17), h.number_of_lines());
        assert_eq!("Lines: 17", wire(&h));
        assert!(parse("Lines", "some").is_empty());

        let mut h = Header::new(HeaderKind::Control);
        h.control_mut().unwrap().set_cancel("<spam@x.test>");
        assert!(h.control().unwrap().is_cancel());
        assert_eq!("Control: cancel <spam@x.test>", wire(&h));

        let h = parse("Mail-Copies-To", "nobody");
        assert!(h.mail_copies_to().unwrap().never_copy());
        assert_eq!("Mail-Copies-To: nobody", wire(&h));
    }

    #[test]
    fn dates() {
        let h = parse("Date", "Fri, 21 Nov 1997 09:55:06 -0600");
        let ts = h.date_time().unwrap();
        assert_eq!(
            Utc.ymd(1997, 11, 21).and_hms(15, 55, 6),
            ts.date_time.with_timezone(&Utc)
        );
        assert_eq!("Date: Fri, 21 Nov 1997 09:55:06 -0600", wire(&h));

        let h = parse("Date", "yesterday");
        assert!(h.is_empty());
        assert_eq!(None, h.date_time());
    }

    #[test]
    fn clearing() {
        let mut h = parse("To", "a@x.test");
        assert!(!h.is_empty());
        h.clear();
        assert!(h.is_empty());
        assert!(h.addresses().is_empty());

        let mut h = parse("Subject", "hello");
        assert!(h.from_7bit_string(b""));
        assert!(h.is_empty());
        assert!(h.from_7bit_string(b"bye"));
        assert_eq!("bye", h.as_unicode_string());
    }
}
