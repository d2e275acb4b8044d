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


//! `Content-Type` and `Content-Disposition`: a leading token plus an RFC
//! 2045 parameter list.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use super::super::charset::CharsetPolicy;
use super::super::encoded_word::encode_rfc2047_string;
use super::super::header_parsing::{
    eat_cfws, parse_parameter_list_with_charset, parse_token,
};
use super::super::model::{ContentCategory, DispositionType};
use super::super::util::{add_quotes, encode_rfc2231_string};
use crate::support::settings;

/// A parameter map, keyed by lower-case name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    map: BTreeMap<String, String>,
}

impl Parameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&key.to_ascii_lowercase())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.map.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Parse the part of a header value after the leading `;`, returning
    /// the charset of the last encoded value.
    pub(super) fn parse(
        &mut self,
        raw: &[u8],
        policy: &CharsetPolicy,
    ) -> Option<Option<Arc<str>>> {
        let (_, (map, charset)) =
            parse_parameter_list_with_charset(raw, policy).ok()?;
        self.map = map;
        Some(charset)
    }

    /// Render as `key="value"; key*=charset''value`.
    ///
    /// ASCII values are always quoted. Anything else is written as an RFC
    /// 2231 extended value, or, with the Outlook compatibility setting, as
    /// quoted RFC 2047 encoded words.
    pub fn as_7bit_string(&self, charset: &str) -> String {
        let outlook = settings::use_outlook_attachment_encoding();
        let mut out = String::new();

        for (key, value) in &self.map {
            if !out.is_empty() {
                out.push_str("; ");
            }

            out.push_str(key);
            if value.is_ascii() {
                out.push('=');
                out.push_str(&add_quotes(value, true));
            } else if outlook {
                out.push_str("=\"");
                out.push_str(&encode_rfc2047_string(value, charset, false));
                out.push('"');
            } else {
                out.push_str("*=");
                out.push_str(&encode_rfc2231_string(value, charset));
            }
        }

        out
    }
}

impl From<BTreeMap<String, String>> for Parameters {
    fn from(map: BTreeMap<String, String>) -> Self {
        Parameters { map }
    }
}

// Parse `token [";" parameter-list]`, returning the lower-cased token, the
// parameters, and their charset. `token` may be a `type/subtype` pair if
// `with_subtype` is set.
fn parse_token_with_parameters(
    raw: &[u8],
    with_subtype: bool,
    policy: &CharsetPolicy,
) -> Option<(String, Parameters, Option<Arc<str>>)> {
    let i = eat_cfws(raw);
    let (i, token) = parse_token(i, false).ok()?;
    let mut value = String::from_utf8_lossy(token).to_ascii_lowercase();

    let mut i = eat_cfws(i);
    if with_subtype {
        match i.split_first() {
            Some((b'/', rest)) => i = eat_cfws(rest),
            _ => return None,
        }
        let (rest, subtype) = parse_token(i, false).ok()?;
        value.push('/');
        value.push_str(&String::from_utf8_lossy(subtype).to_ascii_lowercase());
        i = eat_cfws(rest);
    }

    let mut params = Parameters::default();
    let charset = match i.split_first() {
        None => None,
        Some((b';', rest)) => params.parse(rest, policy)?,
        Some(_) => return None,
    };

    Some((value, params, charset))
}

/// The value of a `Content-Type` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentType {
    mime_type: String,
    pub params: Parameters,
    category: ContentCategory,
}

impl ContentType {
    pub fn new(mime_type: &str) -> Self {
        let mut this = ContentType::default();
        this.set_mime_type(mime_type);
        this
    }

    pub(super) fn parse(
        raw: &[u8],
        policy: &CharsetPolicy,
    ) -> Option<(Self, Option<Arc<str>>)> {
        let (mime_type, params, charset) =
            parse_token_with_parameters(raw, true, policy)?;
        let mut this = ContentType {
            mime_type,
            params,
            category: ContentCategory::Single,
        };
        this.category = this.default_category();
        Some((this, charset))
    }

    pub(super) fn as_7bit_string(&self, charset: &str) -> String {
        let mut s = self.mime_type.clone();
        if !self.params.is_empty() {
            s.push_str("; ");
            s.push_str(&self.params.as_7bit_string(charset));
        }
        s
    }

    /// The full `type/subtype`, in lower case.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Replace the MIME type. This discards all parameters.
    pub fn set_mime_type(&mut self, mime_type: &str) {
        self.mime_type = mime_type.to_ascii_lowercase();
        self.params.clear();
        self.category = self.default_category();
    }

    fn default_category(&self) -> ContentCategory {
        if self.is_multipart() {
            ContentCategory::Container
        } else {
            ContentCategory::Single
        }
    }

    pub fn media_type(&self) -> &str {
        match self.mime_type.find('/') {
            Some(slash) => &self.mime_type[..slash],
            None => &self.mime_type,
        }
    }

    pub fn sub_type(&self) -> &str {
        match self.mime_type.find('/') {
            Some(slash) => &self.mime_type[slash + 1..],
            None => "",
        }
    }

    pub fn is_media_type(&self, media_type: &str) -> bool {
        self.media_type().eq_ignore_ascii_case(media_type)
    }

    pub fn is_sub_type(&self, sub_type: &str) -> bool {
        self.mime_type.contains('/')
            && self.sub_type().eq_ignore_ascii_case(sub_type)
    }

    pub fn is_mime_type(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    pub fn is_empty(&self) -> bool {
        self.mime_type.is_empty()
    }

    /// Whether this is a text type. An absent type is implicitly text.
    pub fn is_text(&self) -> bool {
        self.is_empty() || self.is_media_type("text")
    }

    pub fn is_plain_text(&self) -> bool {
        self.is_empty() || self.is_mime_type("text/plain")
    }

    pub fn is_html_text(&self) -> bool {
        self.is_mime_type("text/html")
    }

    pub fn is_image(&self) -> bool {
        self.is_media_type("image")
    }

    pub fn is_multipart(&self) -> bool {
        self.is_media_type("multipart")
    }

    pub fn is_partial(&self) -> bool {
        self.is_mime_type("message/partial")
    }

    /// The declared `charset` parameter, if any.
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").filter(|cs| !cs.is_empty())
    }

    /// The charset to decode with: the declared one, unless it is missing
    /// or `policy` forces the default.
    pub fn effective_charset(&self, policy: &CharsetPolicy) -> Arc<str> {
        policy.resolve(self.charset())
    }

    pub fn set_charset(&mut self, charset: &str) {
        self.params.set("charset", charset);
    }

    pub fn boundary(&self) -> Option<&str> {
        self.params.get("boundary")
    }

    pub fn set_boundary(&mut self, boundary: &str) {
        self.params.set("boundary", boundary);
    }

    pub fn name(&self) -> Option<&str> {
        self.params.get("name")
    }

    pub fn set_name(&mut self, name: &str) {
        self.params.set("name", name);
    }

    pub fn id(&self) -> Option<&str> {
        self.params.get("id")
    }

    pub fn set_id(&mut self, id: &str) {
        self.params.set("id", id);
    }

    /// The `number` of a `message/partial` fragment.
    pub fn partial_number(&self) -> Option<u32> {
        self.params.get("number").and_then(|n| n.trim().parse().ok())
    }

    /// The `total` of a `message/partial` fragment.
    pub fn partial_count(&self) -> Option<u32> {
        self.params.get("total").and_then(|n| n.trim().parse().ok())
    }

    pub fn set_partial_params(&mut self, total: u32, number: u32) {
        self.params.set("number", number.to_string());
        self.params.set("total", total.to_string());
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn set_category(&mut self, category: ContentCategory) {
        self.category = category;
    }
}

/// The value of a `Content-Disposition` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    pub disposition: DispositionType,
    pub params: Parameters,
}

impl ContentDisposition {
    pub fn new(disposition: DispositionType) -> Self {
        ContentDisposition {
            disposition,
            params: Parameters::default(),
        }
    }

    pub(super) fn parse(
        raw: &[u8],
        policy: &CharsetPolicy,
    ) -> Option<(Self, Option<Arc<str>>)> {
        let (token, params, charset) =
            parse_token_with_parameters(raw, false, policy)?;
        let disposition = match &token[..] {
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            _ => {
                warn!("Unknown disposition type {:?}", token);
                return None;
            }
        };

        Some((
            ContentDisposition {
                disposition,
                params,
            },
            charset,
        ))
    }

    pub(super) fn as_7bit_string(&self, charset: &str) -> String {
        let mut s = match self.disposition.name() {
            Some(name) => name.to_owned(),
            None => return String::new(),
        };
        if !self.params.is_empty() {
            s.push_str("; ");
            s.push_str(&self.params.as_7bit_string(charset));
        }
        s
    }

    pub fn is_empty(&self) -> bool {
        DispositionType::Invalid == self.disposition
    }

    pub fn filename(&self) -> Option<&str> {
        self.params.get("filename")
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.params.set("filename", filename);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn policy() -> CharsetPolicy {
        CharsetPolicy::new("us-ascii", false)
    }

    #[test]
    fn content_type_parsing() {
        let (ct, cs) = ContentType::parse(
            b"Text/HTML; Charset=\"UTF-8\"; format=flowed",
            &policy(),
        )
        .unwrap();
        assert_eq!("text/html", ct.mime_type());
        assert_eq!("text", ct.media_type());
        assert_eq!("html", ct.sub_type());
        assert!(ct.is_text());
        assert!(ct.is_html_text());
        assert!(!ct.is_plain_text());
        assert_eq!(Some("UTF-8"), ct.charset());
        assert_eq!(Some("flowed"), ct.params.get("FORMAT"));
        assert_eq!(ContentCategory::Single, ct.category());
        assert!(cs.is_none());

        let (ct, _) = ContentType::parse(
            b"multipart/alternative;\n boundary=\"=_xyz\"",
            &policy(),
        )
        .unwrap();
        assert!(ct.is_multipart());
        assert_eq!(Some("=_xyz"), ct.boundary());
        assert_eq!(ContentCategory::Container, ct.category());

        let (ct, _) = ContentType::parse(
            b"message/partial; number=2; total=3; id=\"abc@x\"",
            &policy(),
        )
        .unwrap();
        assert!(ct.is_partial());
        assert_eq!(Some(2), ct.partial_number());
        assert_eq!(Some(3), ct.partial_count());
        assert_eq!(Some("abc@x"), ct.id());

        assert!(ContentType::parse(b"text", &policy()).is_none());
        assert!(ContentType::parse(b"text/plain garbage", &policy()).is_none());
        assert!(ContentType::parse(b"", &policy()).is_none());
    }

    #[test]
    fn content_type_defaults() {
        let ct = ContentType::default();
        assert!(ct.is_empty());
        assert!(ct.is_text());
        assert!(ct.is_plain_text());
        assert!(!ct.is_sub_type("plain"));

        let forced = CharsetPolicy::new("iso-8859-15", true);
        let ct = ContentType::parse(b"text/plain; charset=utf-8", &forced)
            .unwrap()
            .0;
        assert_eq!("ISO-8859-15", &*ct.effective_charset(&forced));
        assert_eq!("UTF-8", &*ct.effective_charset(&policy()));
    }

    #[test]
    fn set_mime_type_resets_params() {
        let mut ct = ContentType::new("text/plain");
        ct.set_charset("utf-8");
        ct.set_mime_type("Multipart/Mixed");
        assert_eq!("multipart/mixed", ct.mime_type());
        assert!(ct.params.is_empty());
        assert_eq!(ContentCategory::Container, ct.category());
    }

    #[test]
    fn content_type_serialisation() {
        let mut ct = ContentType::new("text/plain");
        ct.set_charset("us-ascii");
        ct.set_name("my file.txt");
        assert_eq!(
            "text/plain; charset=\"us-ascii\"; name=\"my file.txt\"",
            ct.as_7bit_string("us-ascii")
        );

        ct.set_name("résumé.txt");
        assert_eq!(
            "text/plain; charset=\"us-ascii\"; \
             name*=utf-8''r%C3%A9sum%C3%A9%2Etxt",
            ct.as_7bit_string("utf-8")
        );
    }

    #[test]
    fn disposition() {
        let (cd, _) = ContentDisposition::parse(
            b"ATTACHMENT; filename*=iso-8859-1''%E9t%E9.pdf",
            &policy(),
        )
        .unwrap();
        assert_eq!(DispositionType::Attachment, cd.disposition);
        assert_eq!(Some("été.pdf"), cd.filename());

        let (cd, _) =
            ContentDisposition::parse(b"inline", &policy()).unwrap();
        assert_eq!(DispositionType::Inline, cd.disposition);
        assert_eq!("inline", cd.as_7bit_string("us-ascii"));

        assert!(ContentDisposition::parse(b"sideways", &policy()).is_none());

        let mut cd = ContentDisposition::new(DispositionType::Attachment);
        cd.set_filename("a\"b.txt");
        assert_eq!(
            "attachment; filename=\"a\\\"b.txt\"",
            cd.as_7bit_string("us-ascii")
        );
        assert!(ContentDisposition::default().is_empty());
        assert_eq!("", ContentDisposition::default().as_7bit_string("x"));
    }
}
