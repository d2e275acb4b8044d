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


//! The MIME content tree.
//!
//! A `Content` is one node: a raw head and body, the headers parsed from
//! the head, and, once parsed, either nothing more (a leaf), a list of
//! child parts (multipart), or an encapsulated `Message`.
//!
//! The raw head and the parsed headers are only synchronised on request:
//! `parse` rebuilds the headers from the head, and `assemble` rebuilds the
//! head from the headers. `encoded_content` emits the raw head, so changes
//! to headers are not visible on the wire until `assemble` is called.

use std::mem;
use std::ptr;

use lazy_static::lazy_static;
use log::{debug, warn};

use super::charset::{self, CharsetPolicy};
use super::content_index::ContentIndex;
use super::header_parsing::{extract_first_header, extract_header_and_body};
use super::headers::{
    ContentDisposition, ContentTransferEncoding, ContentType, Header,
    HeaderKind, HeaderValue,
};
use super::message::Message;
use super::model::{ContentCategory, DispositionType, TransferEncoding};
use super::parsers::{self, EncodedArticle};
use super::util::{self, lf_to_crlf, multi_part_boundary};
use crate::codec::{Base64Codec, Codec};
use crate::support::error::Error;

lazy_static! {
    static ref NO_CONTENT_TYPE: ContentType = ContentType::default();
    static ref NO_CONTENT_TRANSFER_ENCODING: ContentTransferEncoding =
        ContentTransferEncoding::default();
    static ref NO_CONTENT_DISPOSITION: ContentDisposition =
        ContentDisposition::default();
}

/// What a content holds beyond its own body.
#[derive(Clone, Debug)]
enum Parts {
    Leaf,
    Multipart(Vec<Content>),
    Message(Box<Message>),
}

impl Default for Parts {
    fn default() -> Self {
        Parts::Leaf
    }
}

/// Parse every header in a raw header block.
pub fn parse_headers(head: &[u8], policy: &CharsetPolicy) -> Vec<Header> {
    let mut headers = Vec::new();
    let mut rest = head;
    while let Some((raw, next)) = extract_first_header(rest) {
        rest = next;
        if raw.name.is_empty() {
            debug!("Skipping header without a name");
            continue;
        }
        headers.push(Header::parse(
            HeaderKind::from_name(&raw.name),
            &raw.value,
            policy,
        ));
    }
    headers
}

macro_rules! typed_header {
    ($get:ident, $get_mut:ident, $kind:ident, $ty:ident, $default:ident) => {
        /// The header's value, or an empty value if the header is absent.
        pub fn $get(&self) -> &$ty {
            self.header_by_kind(&HeaderKind::$kind)
                .and_then(Header::$get)
                .unwrap_or(&*$default)
        }

        /// The header's value, creating the header if it is absent.
        ///
        /// A header whose value was replaced by one of a different shape
        /// is reset to an empty value.
        pub fn $get_mut(&mut self) -> &mut $ty {
            let header = self.header_or_insert(HeaderKind::$kind);
            let typed = match *header.value() {
                HeaderValue::$kind(_) => true,
                _ => false,
            };
            if !typed {
                warn!(
                    "{} header holds a mismatched value; resetting",
                    header.name()
                );
                *header.value_mut() = HeaderValue::$kind(Default::default());
            }

            match *header.value_mut() {
                HeaderValue::$kind(ref mut value) => value,
                _ => unreachable!(),
            }
        }
    };
}

/// A node in the MIME content tree.
#[derive(Clone, Debug, Default)]
pub struct Content {
    head: Vec<u8>,
    body: Vec<u8>,
    /// The body as it was when a frozen content was parsed.
    frozen_body: Option<Vec<u8>>,
    preamble: Vec<u8>,
    epilogue: Vec<u8>,
    headers: Vec<Header>,
    parts: Parts,
    policy: CharsetPolicy,
    frozen: bool,
}

impl Content {
    pub fn new() -> Self {
        Content::default()
    }

    pub fn with_policy(policy: CharsetPolicy) -> Self {
        Content {
            policy,
            ..Content::default()
        }
    }

    /// Create a content from raw bytes and parse it.
    pub fn parse_bytes(raw: &[u8]) -> Self {
        let mut content = Content::new();
        content.set_content(raw);
        content.parse();
        content
    }

    /// Whether there is anything at all in this content.
    pub fn has_content(&self) -> bool {
        !self.head.is_empty()
            || !self.body.is_empty()
            || !self.contents().is_empty()
    }

    /// Replace the raw content, splitting it into head and body.
    ///
    /// This does not parse anything; call `parse` afterwards.
    pub fn set_content(&mut self, raw: &[u8]) {
        let (head, body) = extract_header_and_body(raw);
        self.head = head.to_vec();
        self.body = body.to_vec();
        self.frozen_body = None;
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// Replace the raw head. A final line ending is added if missing.
    pub fn set_head(&mut self, head: &[u8]) {
        self.head = head.to_vec();
        if !self.head.ends_with(b"\n") {
            self.head.push(b'\n');
        }
    }

    pub(crate) fn replace_head(&mut self, head: Vec<u8>) {
        self.head = head;
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }

    pub fn set_preamble(&mut self, preamble: impl Into<Vec<u8>>) {
        self.preamble = preamble.into();
    }

    pub fn epilogue(&self) -> &[u8] {
        &self.epilogue
    }

    pub fn set_epilogue(&mut self, epilogue: impl Into<Vec<u8>>) {
        self.epilogue = epilogue.into();
    }

    pub fn policy(&self) -> &CharsetPolicy {
        &self.policy
    }

    pub fn default_charset(&self) -> &str {
        &self.policy.default_charset
    }

    /// Change the default charset of this content and everything below it.
    ///
    /// Headers already parsed are re-read under the new charset.
    pub fn set_default_charset(&mut self, charset: &str) {
        let policy = CharsetPolicy::new(charset, self.policy.force_default);
        self.apply_policy(&policy);
    }

    pub fn force_default_charset(&self) -> bool {
        self.policy.force_default
    }

    /// Set whether the default charset overrides whatever charset the data
    /// declares, for this content and everything below it.
    pub fn set_force_default_charset(&mut self, force: bool) {
        let policy =
            CharsetPolicy::new(&self.policy.default_charset, force);
        self.apply_policy(&policy);
    }

    fn apply_policy(&mut self, policy: &CharsetPolicy) {
        self.policy = policy.clone();
        for header in &mut self.headers {
            let raw = header.as_7bit_string(false);
            header.set_policy(policy.clone());
            if !raw.is_empty() {
                header.from_7bit_string(&raw);
            }
        }
        for child in self.contents_mut() {
            child.apply_policy(policy);
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze or unfreeze the content. A frozen content is never
    /// re-assembled and always emits the exact bytes it was parsed from.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Parse the headers and, depending on the content type, the body
    /// structure.
    ///
    /// Multipart bodies are split into child parts, `message/rfc822`
    /// bodies become an encapsulated message, and text bodies are searched
    /// for uuencoded or yEnc binaries. In each of those cases the body is
    /// consumed. Anything malformed degrades to a plain text leaf.
    pub fn parse(&mut self) {
        self.headers = parse_headers(&self.head, &self.policy);

        if self.frozen && self.frozen_body.is_none() {
            self.frozen_body = Some(self.body.clone());
        }

        self.parts = Parts::Leaf;
        if self.content_type().is_text() {
            if !self.parse_uuencoded() {
                self.parse_yenc();
            }
        } else if self.content_type().is_multipart() {
            if !self.parse_multipart() {
                let content_type = self.content_type_mut();
                content_type.set_mime_type("text/plain");
                content_type.set_charset("US-ASCII");
            }
        } else if self.body_is_message() {
            let mut message = Message::with_policy(self.policy.clone());
            message.set_content(&self.body);
            message.set_frozen(self.frozen);
            message.parse();
            self.parts = Parts::Message(Box::new(message));
            self.body.clear();
        }
    }

    fn parse_multipart(&mut self) -> bool {
        let boundary = match self.content_type().boundary() {
            Some(boundary) if !boundary.is_empty() => boundary.to_owned(),
            _ => {
                warn!("Multipart content without boundary");
                return false;
            }
        };
        let category = if self.content_type().is_sub_type("alternative") {
            ContentCategory::AlternativePart
        } else {
            ContentCategory::MixedPart
        };

        let split =
            match parsers::split_multipart(&self.body, boundary.as_bytes()) {
                Some(split) => split,
                None => {
                    warn!("Unable to split multipart at {:?}", boundary);
                    return false;
                }
            };

        self.preamble = split.preamble.to_vec();
        self.epilogue = split.epilogue.to_vec();
        let children = split
            .parts
            .iter()
            .map(|part| {
                let mut child = Content::with_policy(self.policy.clone());
                child.set_content(part);
                child.set_frozen(self.frozen);
                child.parse();
                child.content_type_mut().set_category(category);
                child
            })
            .collect();

        self.body.clear();
        self.parts = Parts::Multipart(children);
        true
    }

    fn parse_uuencoded(&mut self) -> bool {
        let subject =
            util::extract_header(&self.head, "Subject").unwrap_or_default();
        let article = match parsers::parse_uuencoded(&self.body, &subject) {
            Some(article) => article,
            None => return false,
        };

        match article.partial.filter(|p| 1 != p.total) {
            Some(partial) => {
                let content_type = self.content_type_mut();
                *content_type = ContentType::new("message/partial");
                content_type.set_partial_params(partial.total, partial.number);
                self.content_transfer_encoding_mut()
                    .set_encoding(TransferEncoding::SevenBit);
            }
            None => self.adopt_binaries(article),
        }
        true
    }

    fn parse_yenc(&mut self) -> bool {
        let mut article = match parsers::parse_yenc(&self.body) {
            Some(article) => article,
            None => return false,
        };

        match article.partial.filter(|p| 1 != p.total) {
            Some(partial) => {
                let content_type = self.content_type_mut();
                *content_type = ContentType::new("message/partial");
                content_type.set_partial_params(partial.total, partial.number);
                let data = article
                    .binaries
                    .pop()
                    .map(|binary| binary.data)
                    .unwrap_or_default();
                self.body = Base64Codec.encode(&data, false);
                let encoding = self.content_transfer_encoding_mut();
                encoding.set_encoding(TransferEncoding::Base64);
                encoding.set_decoded(false);
            }
            None => self.adopt_binaries(article),
        }
        true
    }

    // Turn a text body with embedded binaries into `multipart/mixed`, with
    // the text as the first part and one base64 attachment per binary.
    fn adopt_binaries(&mut self, article: EncodedArticle) {
        self.body.clear();
        *self.content_type_mut() = ContentType::new("multipart/mixed");
        self.content_type_mut()
            .set_boundary(&multi_part_boundary());
        *self.content_transfer_encoding_mut() =
            ContentTransferEncoding::default();

        let mut children = Vec::with_capacity(article.binaries.len() + 1);

        let mut text = Content::with_policy(self.policy.clone());
        text.content_type_mut().set_mime_type("text/plain");
        text.content_transfer_encoding_mut()
            .set_encoding(TransferEncoding::SevenBit);
        text.body = article.text;
        children.push(text);

        for binary in article.binaries {
            let mut child = Content::with_policy(self.policy.clone());
            let content_type = child.content_type_mut();
            content_type.set_mime_type(binary.mime_type);
            content_type.set_name(&binary.filename);
            let disposition = child.content_disposition_mut();
            disposition.disposition = DispositionType::Attachment;
            disposition.set_filename(&binary.filename);
            let encoding = child.content_transfer_encoding_mut();
            encoding.set_encoding(TransferEncoding::Base64);
            encoding.set_decoded(false);
            child.body = Base64Codec.encode(&binary.data, false);
            children.push(child);
        }

        self.parts = Parts::Multipart(children);
    }

    /// Regenerate the raw head from the headers, recursively.
    ///
    /// Does nothing to a frozen content.
    pub fn assemble(&mut self) {
        if self.frozen {
            return;
        }

        self.head = self.assemble_headers(&[]);
        self.assemble_contents();
    }

    pub(crate) fn assemble_contents(&mut self) {
        match self.parts {
            Parts::Leaf => (),
            Parts::Multipart(ref mut children) => {
                for child in children {
                    child.assemble();
                }
            }
            Parts::Message(ref mut message) => message.assemble(),
        }
    }

    /// Serialise the non-empty headers, one per line.
    ///
    /// Headers of the kinds in `order` come first, in that order, followed
    /// by the `X-` headers if `order` is non-empty, then all others in
    /// their current order.
    pub(crate) fn assemble_headers(&self, order: &[HeaderKind]) -> Vec<u8> {
        let mut head = Vec::new();
        let mut emitted = vec![false; self.headers.len()];
        let mut emit = |ix: usize, head: &mut Vec<u8>| {
            if !emitted[ix] && !self.headers[ix].is_empty() {
                head.extend_from_slice(&self.headers[ix].as_7bit_string(true));
                head.push(b'\n');
            }
            emitted[ix] = true;
        };

        for kind in order {
            if let Some(ix) = self
                .headers
                .iter()
                .position(|h| h.kind().matches(kind.name()))
            {
                emit(ix, &mut head);
            }
        }
        if !order.is_empty() {
            for ix in 0..self.headers.len() {
                if self.headers[ix].is_x_header() {
                    emit(ix, &mut head);
                }
            }
        }
        for ix in 0..self.headers.len() {
            emit(ix, &mut head);
        }

        head
    }

    /// Discard all headers, content and child parts.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.clear_contents();
        self.head.clear();
        self.body.clear();
        self.frozen_body = None;
    }

    /// Discard the child parts or encapsulated message.
    pub fn clear_contents(&mut self) {
        self.parts = Parts::Leaf;
    }

    /// The content as it should be transmitted: the raw head, a blank line,
    /// and the encoded body. With `use_crlf`, line endings are converted to
    /// CRLF.
    pub fn encoded_content(&self, use_crlf: bool) -> Vec<u8> {
        let mut encoded = self.head.clone();
        encoded.push(b'\n');
        encoded.extend_from_slice(&self.encoded_body());

        if use_crlf {
            lf_to_crlf(&encoded)
        } else {
            encoded
        }
    }

    /// The body as it should be transmitted.
    ///
    /// A frozen content replays the body it was parsed from. Otherwise a
    /// decoded body is encoded per its `Content-Transfer-Encoding`, and
    /// child parts are joined with the boundary delimiters.
    pub fn encoded_body(&self) -> Vec<u8> {
        let mut encoded = Vec::new();

        if self.frozen {
            match self.frozen_body {
                Some(ref body) if !body.is_empty() => {
                    encoded.extend_from_slice(body)
                }
                _ => encoded.extend_from_slice(&self.body),
            }
            return encoded;
        }

        if let Parts::Message(ref message) = self.parts {
            return message.encoded_content(false);
        }

        if !self.body.is_empty() {
            let encoding = self.content_transfer_encoding();
            if encoding.need_to_encode() {
                encoded.extend_from_slice(
                    &encoding.encoding().codec().encode(&self.body, false),
                );
            } else {
                encoded.extend_from_slice(&self.body);
            }
        }

        if let Parts::Multipart(ref children) = self.parts {
            if !children.is_empty() {
                let delimiter = format!(
                    "\n--{}",
                    self.content_type().boundary().unwrap_or_default()
                );
                encoded.extend_from_slice(&self.preamble);
                for child in children {
                    encoded.extend_from_slice(delimiter.as_bytes());
                    encoded.push(b'\n');
                    encoded.extend_from_slice(&child.encoded_content(false));
                }
                encoded.extend_from_slice(delimiter.as_bytes());
                encoded.extend_from_slice(b"--\n");
                encoded.extend_from_slice(&self.epilogue);
            }
        }

        encoded
    }

    /// The body with any transfer encoding removed.
    pub fn decoded_content(&self) -> Vec<u8> {
        if self.body.is_empty() {
            return Vec::new();
        }

        let encoding = self.content_transfer_encoding();
        let (mut decoded, strip_newline) = if encoding.is_decoded() {
            (self.body.clone(), false)
        } else {
            let codec = encoding.encoding().codec();
            match encoding.encoding() {
                TransferEncoding::Base64 | TransferEncoding::UuEncode => {
                    (codec.decode(&self.body, false), false)
                }
                TransferEncoding::QuotedPrintable => {
                    (codec.decode(&self.body, false), true)
                }
                TransferEncoding::Binary => (self.body.clone(), false),
                _ => (self.body.clone(), true),
            }
        };

        if strip_newline && decoded.ends_with(b"\n") {
            decoded.pop();
        }
        decoded
    }

    /// Decode a textual body in place, so that it is held decoded from now
    /// on.
    ///
    /// A base64, uuencoded or binary body is given a final line feed if it
    /// lacks one, so repeated decode/encode cycles leave the text stable.
    ///
    /// Returns false if this is not a text part.
    pub fn decode_text(&mut self) -> bool {
        if !self.content_type().is_text() {
            return false;
        }

        let encoding = self.content_transfer_encoding();
        if encoding.is_decoded() {
            return true;
        }

        let encoding = encoding.encoding();
        match encoding {
            TransferEncoding::Base64 | TransferEncoding::UuEncode => {
                self.body = encoding.codec().decode(&self.body, false);
                if !self.body.ends_with(b"\n") {
                    self.body.push(b'\n');
                }
            }
            TransferEncoding::QuotedPrintable => {
                self.body = encoding.codec().decode(&self.body, false);
            }
            TransferEncoding::Binary => {
                if !self.body.ends_with(b"\n") {
                    self.body.push(b'\n');
                }
            }
            _ => (),
        }

        self.content_transfer_encoding_mut().set_decoded(true);
        true
    }

    /// The text of a text part, decoded with its charset.
    ///
    /// With `trim`, trailing whitespace is removed; otherwise with
    /// `remove_trailing_newlines`, trailing line feeds are removed;
    /// otherwise a single trailing line feed is removed. Non-text parts
    /// yield an empty string.
    pub fn decoded_text(
        &mut self,
        trim: bool,
        remove_trailing_newlines: bool,
    ) -> String {
        if !self.decode_text() {
            return String::new();
        }

        let charset = self.content_type().effective_charset(&self.policy);
        let mut text = match charset::decode(&charset, &self.body) {
            Some(text) => text.into_owned(),
            None => {
                warn!("Unknown charset {:?} in text part", charset);
                charset::decode_raw(&self.body, &self.policy.default_charset)
                    .into_owned()
            }
        };

        if trim {
            let len = text.trim_end().len();
            text.truncate(len);
        } else if remove_trailing_newlines {
            let len = text.trim_end_matches('\n').len();
            text.truncate(len);
        } else if text.ends_with('\n') {
            text.pop();
        }
        text
    }

    /// Replace the body with `text`, encoded in the part's charset.
    ///
    /// If the charset can't represent the text, the part is switched to
    /// UTF-8.
    pub fn from_unicode_string(&mut self, text: &str) {
        let charset = self.content_type().effective_charset(&self.policy);
        let (body, used) = charset::encode_or_utf8(&charset, text);
        if !used.eq_ignore_ascii_case(&charset) {
            debug!("{:?} can't represent the text, using {}", charset, used);
            self.content_type_mut().set_charset(&used);
        }
        self.body = body;
        self.content_transfer_encoding_mut().set_decoded(true);
    }

    /// The first text part, depth first, including this content itself.
    pub fn text_content(&self) -> Option<&Content> {
        if self.content_type().is_text() {
            return Some(self);
        }
        self.contents()
            .into_iter()
            .find_map(|child| child.text_content())
    }

    /// All leaf parts except the main text part.
    ///
    /// Parts of `multipart/alternative` containers are skipped unless
    /// `include_alternatives` is set.
    pub fn attachments(&self, include_alternatives: bool) -> Vec<&Content> {
        let mut attachments = Vec::new();
        self.collect_attachments(include_alternatives, &mut attachments);
        if let Some(text) = self.text_content() {
            attachments.retain(|&c| !ptr::eq(c, text));
        }
        attachments
    }

    fn collect_attachments<'a>(
        &'a self,
        include_alternatives: bool,
        out: &mut Vec<&'a Content>,
    ) {
        let contents = self.contents();
        if contents.is_empty() {
            out.push(self);
            return;
        }

        for child in contents {
            if include_alternatives
                || ContentCategory::AlternativePart
                    != child.content_type().category()
            {
                child.collect_attachments(include_alternatives, out);
            }
        }
    }

    /// The direct children: the parts of a multipart, or the encapsulated
    /// message.
    pub fn contents(&self) -> Vec<&Content> {
        match self.parts {
            Parts::Leaf => Vec::new(),
            Parts::Multipart(ref children) => children.iter().collect(),
            Parts::Message(ref message) => {
                let content: &Content = message;
                vec![content]
            }
        }
    }

    pub fn contents_mut(&mut self) -> Vec<&mut Content> {
        match self.parts {
            Parts::Leaf => Vec::new(),
            Parts::Multipart(ref mut children) => children.iter_mut().collect(),
            Parts::Message(ref mut message) => {
                let content: &mut Content = message;
                vec![content]
            }
        }
    }

    /// Add a child part.
    ///
    /// A single-part content is first converted to `multipart/mixed`: its
    /// body and `Content-*` headers move into a new first child, while the
    /// other headers stay put.
    pub fn add_content(
        &mut self,
        child: Content,
        prepend: bool,
    ) -> Result<(), Error> {
        if self.body_is_message() {
            return Err(Error::EncapsulatedMessage);
        }

        let is_multipart = match self.parts {
            Parts::Multipart(_) => true,
            _ => false,
        };
        if !is_multipart && !self.content_type().is_multipart() {
            let mut main = Content::with_policy(self.policy.clone());
            let (mime_headers, others): (Vec<Header>, Vec<Header>) =
                mem::take(&mut self.headers)
                    .into_iter()
                    .partition(Header::is_mime_header);
            main.headers = mime_headers;
            self.headers = others;
            main.content_type_mut()
                .set_category(ContentCategory::MixedPart);
            main.body = mem::take(&mut self.body);
            self.parts = Parts::Multipart(vec![main]);

            let content_type = self.content_type_mut();
            content_type.set_mime_type("multipart/mixed");
            content_type.set_boundary(&multi_part_boundary());
            *self.content_transfer_encoding_mut() =
                ContentTransferEncoding::default();
        }

        match self.parts {
            Parts::Multipart(ref mut children) => {
                if prepend {
                    children.insert(0, child);
                } else {
                    children.push(child);
                }
            }
            _ => self.parts = Parts::Multipart(vec![child]),
        }
        Ok(())
    }

    /// Remove the child part at `index` (0-based) and return it.
    ///
    /// If only one part remains, this content turns back into a single
    /// part, taking over the remaining child's headers and body.
    pub fn remove_content(&mut self, index: usize) -> Option<Content> {
        let (removed, last) = match self.parts {
            Parts::Multipart(ref mut children) if index < children.len() => {
                let removed = children.remove(index);
                let last = if 1 == children.len() {
                    children.pop()
                } else {
                    None
                };
                (removed, last)
            }
            _ => return None,
        };

        if let Some(main) = last {
            self.parts = Parts::Leaf;
            for header in main.headers {
                self.set_header(header);
            }
            self.body = main.body;
            self.content_type_mut()
                .set_category(ContentCategory::Single);
        }

        Some(removed)
    }

    /// Change the transfer encoding of the body.
    ///
    /// Text parts are held decoded, so only the header changes. Other parts
    /// can only be converted to base64.
    pub fn change_encoding(
        &mut self,
        encoding: TransferEncoding,
    ) -> Result<(), Error> {
        if self.body_is_message() {
            return Err(Error::EncapsulatedMessage);
        }

        let current = self.content_transfer_encoding().encoding();
        if current == encoding {
            return Ok(());
        }

        if self.decode_text() {
            self.content_transfer_encoding_mut().set_encoding(encoding);
            Ok(())
        } else if TransferEncoding::Base64 == encoding {
            self.body = Base64Codec.encode(&self.decoded_content(), false);
            let header = self.content_transfer_encoding_mut();
            header.set_encoding(encoding);
            header.set_decoded(false);
            Ok(())
        } else {
            Err(Error::UnsupportedEncodingChange {
                from: current.name(),
                to: encoding.name(),
            })
        }
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn header_by_kind(&self, kind: &HeaderKind) -> Option<&Header> {
        self.header_by_type(kind.name())
    }

    /// The first header with the given (case-insensitive) name.
    pub fn header_by_type(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.kind().matches(name))
    }

    pub fn header_by_type_mut(&mut self, name: &str) -> Option<&mut Header> {
        self.headers.iter_mut().find(|h| h.kind().matches(name))
    }

    /// All headers with the given (case-insensitive) name.
    pub fn headers_by_type(&self, name: &str) -> Vec<&Header> {
        self.headers
            .iter()
            .filter(|h| h.kind().matches(name))
            .collect()
    }

    /// The first header of the given kind, appending an empty one if there
    /// is none.
    pub fn header_or_insert(&mut self, kind: HeaderKind) -> &mut Header {
        let ix = match self
            .headers
            .iter()
            .position(|h| h.kind().matches(kind.name()))
        {
            Some(ix) => {
                if *self.headers[ix].kind() != kind {
                    let raw = self.headers[ix].as_7bit_string(false);
                    self.headers[ix] = Header::parse(kind, &raw, &self.policy);
                }
                ix
            }
            None => {
                self.headers
                    .push(Header::with_policy(kind, self.policy.clone()));
                self.headers.len() - 1
            }
        };
        &mut self.headers[ix]
    }

    /// Replace all headers of the same name with `header`.
    pub fn set_header(&mut self, header: Header) {
        let name = header.name().to_owned();
        self.headers.retain(|h| !h.kind().matches(&name));
        self.append_header(header);
    }

    pub fn append_header(&mut self, mut header: Header) {
        header.set_policy(self.policy.clone());
        self.headers.push(header);
    }

    pub fn prepend_header(&mut self, mut header: Header) {
        header.set_policy(self.policy.clone());
        self.headers.insert(0, header);
    }

    /// Remove the first header with the given name.
    pub fn remove_header(&mut self, name: &str) -> bool {
        match self.headers.iter().position(|h| h.kind().matches(name)) {
            Some(ix) => {
                self.headers.remove(ix);
                true
            }
            None => false,
        }
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_by_type(name).is_some()
    }

    typed_header!(
        content_type,
        content_type_mut,
        ContentType,
        ContentType,
        NO_CONTENT_TYPE
    );
    typed_header!(
        content_transfer_encoding,
        content_transfer_encoding_mut,
        ContentTransferEncoding,
        ContentTransferEncoding,
        NO_CONTENT_TRANSFER_ENCODING
    );
    typed_header!(
        content_disposition,
        content_disposition_mut,
        ContentDisposition,
        ContentDisposition,
        NO_CONTENT_DISPOSITION
    );

    pub fn content_description(&self) -> Option<&Header> {
        self.header_by_kind(&HeaderKind::ContentDescription)
    }

    pub fn content_location(&self) -> Option<&Header> {
        self.header_by_kind(&HeaderKind::ContentLocation)
    }

    pub fn content_id(&self) -> Option<&Header> {
        self.header_by_kind(&HeaderKind::ContentId)
    }

    /// The size of the body as transmitted. For base64 this is an upper
    /// bound; for quoted-printable, only an approximation.
    pub fn size(&self) -> usize {
        let len = self.body.len();
        if TransferEncoding::Base64
            == self.content_transfer_encoding().encoding()
        {
            Base64Codec.max_encoded_size_for(len, false)
        } else {
            len
        }
    }

    /// The size of the raw head and body, including those of all children.
    pub fn storage_size(&self) -> usize {
        let contents = self.contents();
        if contents.is_empty() {
            self.head.len() + self.body.len()
        } else {
            self.head.len()
                + contents.iter().map(|c| c.storage_size()).sum::<usize>()
        }
    }

    /// The number of lines in the body, including the heads and bodies of
    /// child parts.
    pub fn line_count(&self) -> usize {
        self.count_lines(true)
    }

    fn count_lines(&self, top_level: bool) -> usize {
        let count = |s: &[u8]| s.iter().filter(|&&b| b'\n' == b).count();
        let mut lines = count(&self.body);
        if !top_level {
            lines += count(&self.head);
        }
        lines
            + self
                .contents()
                .iter()
                .map(|c| c.count_lines(false))
                .sum::<usize>()
    }

    /// The raw (unfolded) value of the first header called `name` in the
    /// raw head.
    pub fn raw_header(&self, name: &str) -> Option<Vec<u8>> {
        util::extract_header(&self.head, name)
    }

    pub fn raw_headers(&self, name: &str) -> Vec<Vec<u8>> {
        util::extract_headers(&self.head, name)
    }

    /// The part at `index` below this content. The empty index refers to
    /// this content.
    pub fn content(&self, index: &ContentIndex) -> Option<&Content> {
        let mut index = index.clone();
        match index.pop() {
            None => Some(self),
            Some(0) => None,
            Some(n) => self
                .contents()
                .get(n as usize - 1)
                .copied()
                .and_then(|child| child.content(&index)),
        }
    }

    pub fn content_mut(
        &mut self,
        index: &ContentIndex,
    ) -> Option<&mut Content> {
        let mut index = index.clone();
        match index.pop() {
            None => Some(self),
            Some(0) => None,
            Some(n) => self
                .contents_mut()
                .into_iter()
                .nth(n as usize - 1)
                .and_then(|child| child.content_mut(&index)),
        }
    }

    /// The index of `target` below this content, identified by address.
    pub fn index_for_content(&self, target: &Content) -> Option<ContentIndex> {
        let contents = self.contents();
        if let Some(ix) = contents.iter().position(|&c| ptr::eq(c, target)) {
            return Some(ContentIndex::from(vec![ix as u32 + 1]));
        }

        contents.iter().enumerate().find_map(|(ix, child)| {
            let mut index = child.index_for_content(target)?;
            index.push(ix as u32 + 1);
            Some(index)
        })
    }

    /// Whether the content type is `message/rfc822`.
    pub fn body_is_message(&self) -> bool {
        self.header_by_kind(&HeaderKind::ContentType)
            .and_then(Header::content_type)
            .map_or(false, |ct| ct.is_mime_type("message/rfc822"))
    }

    /// The encapsulated message, if this is a parsed `message/rfc822`.
    pub fn body_as_message(&self) -> Option<&Message> {
        match self.parts {
            Parts::Message(ref message) => Some(message),
            _ => None,
        }
    }

    pub fn body_as_message_mut(&mut self) -> Option<&mut Message> {
        match self.parts {
            Parts::Message(ref mut message) => Some(message),
            _ => None,
        }
    }
}
