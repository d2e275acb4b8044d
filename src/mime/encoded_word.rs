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


//! RFC 2047 "encoded words" in both directions.

use std::sync::Arc;

use log::{debug, warn};
use nom::error::ErrorKind;

use super::charset::{self, cached_charset, cached_language, CharsetPolicy};
use super::header_parsing::{fail, PResult};
use crate::codec::{Codec, Rfc2047BCodec, Rfc2047QCodec, HEX_UPPER};
use crate::support::settings;

/// The payload of one successfully-decoded encoded word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedWord {
    pub text: String,
    /// The charset actually used for decoding.
    pub charset: Arc<str>,
    /// The RFC 2231 language tag, if the word carried one.
    pub language: Option<Arc<str>>,
}

/// Parse a single `=?charset[*lang]?Q|B?text?=` at the start of `i`.
///
/// If the word names a charset we don't know (or `policy` forces the
/// default charset), the text is decoded with the default charset instead.
/// On any structural problem, fails without consuming input so that the
/// caller can treat the leading `=` literally.
pub fn parse_encoded_word<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, EncodedWord> {
    if !i.starts_with(b"=?") {
        return fail(i, ErrorKind::Tag);
    }

    let mut fields = i[2..].splitn(3, |&b| b'?' == b);
    let (charset_and_lang, encoding, rest) =
        match (fields.next(), fields.next(), fields.next()) {
            (Some(c), Some(e), Some(r)) => (c, e, r),
            _ => return fail(i, ErrorKind::Tag),
        };

    // A `?` not followed by `=` is stray text inside the word; keep
    // looking for the real terminator.
    let end = match rest.windows(2).position(|w| w == b"?=") {
        Some(end) => end,
        None => {
            debug!("Premature end of encoded word");
            return fail(i, ErrorKind::TakeUntil);
        }
    };
    let encoded_text = &rest[..end];
    let consumed =
        2 + charset_and_lang.len() + 1 + encoding.len() + 1 + end + 2;

    let (charset_name, language) =
        match charset_and_lang.iter().position(|&b| b'*' == b) {
            Some(star) => (
                &charset_and_lang[..star],
                Some(&charset_and_lang[star + 1..]),
            ),
            None => (charset_and_lang, None),
        };
    if charset_name
        .iter()
        .any(|&b| b.is_ascii_whitespace() || b.is_ascii_control())
    {
        return fail(i, ErrorKind::Char);
    }
    let charset_name = String::from_utf8_lossy(charset_name);

    let codec: &dyn Codec = if encoding.eq_ignore_ascii_case(b"q") {
        &Rfc2047QCodec
    } else if encoding.eq_ignore_ascii_case(b"b") {
        &Rfc2047BCodec
    } else {
        debug!(
            "Unknown encoding {:?} in encoded word",
            String::from_utf8_lossy(encoding)
        );
        return fail(i, ErrorKind::Tag);
    };

    let used = if policy.force_default
        || charset_name.is_empty()
        || !charset::is_known(&charset_name)
    {
        if !policy.force_default && !charset_name.is_empty() {
            warn!(
                "Unknown charset {:?} in encoded word, using {}",
                charset_name, policy.default_charset
            );
        }
        Arc::clone(&policy.default_charset)
    } else {
        cached_charset(&charset_name)
    };

    let raw = codec.decode(encoded_text, false);
    let text = match charset::decode(&used, &raw) {
        Some(text) => text.into_owned(),
        None => {
            warn!("Unknown charset {:?}, encoded word left alone", used);
            return fail(i, ErrorKind::Verify);
        }
    };

    Ok((
        &i[consumed..],
        EncodedWord {
            text,
            charset: used,
            language: language
                .filter(|l| !l.is_empty())
                .map(|l| cached_language(&String::from_utf8_lossy(l))),
        },
    ))
}

/// Decode a whole header value which may contain encoded words.
///
/// Whitespace separating two encoded words is dropped; everything else is
/// copied through. Returns the text and the charset of the last encoded
/// word, if there was one.
///
/// If the result is not valid UTF-8 and a fallback charset is configured
/// (see `settings::set_fallback_charset`), the raw bytes are decoded with
/// the fallback charset instead.
pub fn decode_rfc2047_string(
    src: &[u8],
    policy: &CharsetPolicy,
) -> (String, Option<Arc<str>>) {
    decode_with_fallback(src, policy, &settings::fallback_charset())
}

/// Decode a header value using UTF-8 as the default charset.
pub fn decode_rfc2047(src: &[u8]) -> String {
    decode_rfc2047_string(src, &CharsetPolicy::new("utf-8", false)).0
}

pub(crate) fn decode_with_fallback(
    src: &[u8],
    policy: &CharsetPolicy,
    fallback_charset: &str,
) -> (String, Option<Arc<str>>) {
    let mut result = Vec::with_capacity(src.len());
    let mut space_buffer = Vec::new();
    let mut only_spaces_since_last_word = false;
    let mut used_charset = None;

    let mut cursor = src;
    while let Some(&ch) = cursor.first() {
        if only_spaces_since_last_word && ch.is_ascii_whitespace() {
            space_buffer.push(ch);
            cursor = &cursor[1..];
            continue;
        }

        if b'=' == ch {
            if let Ok((rest, word)) = parse_encoded_word(cursor, policy) {
                result.extend_from_slice(word.text.as_bytes());
                used_charset = Some(word.charset);
                only_spaces_since_last_word = true;
                space_buffer.clear();
                cursor = rest;
                continue;
            }
        }

        if only_spaces_since_last_word {
            result.append(&mut space_buffer);
            only_spaces_since_last_word = false;
        }
        result.push(ch);
        cursor = &cursor[1..];
    }

    let text = match String::from_utf8(result) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let fallback = if fallback_charset.is_empty() {
                None
            } else {
                charset::decode(fallback_charset, &bytes)
                    .map(|s| s.into_owned())
            };
            fallback
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned())
        }
    };

    (text, used_charset)
}

const ADDRESS_SPECIALS: &[u8] = b"\"()<>@,.;:\\[]=";

fn needs_encoding(b: u8, address_header: bool) -> bool {
    b >= 0x80 || 0x1B == b || (address_header && ADDRESS_SPECIALS.contains(&b))
}

/// Encode the words of `src` that need it as encoded words.
///
/// The text is converted to `charset` if possible, otherwise to UTF-8. The
/// encoded region spans from the start of the first word needing encoding
/// to the end of the last one; Q encoding is used for ISO 8859 charsets and
/// B encoding for everything else. In address headers, the RFC 2822
/// specials also force encoding.
pub fn encode_rfc2047_string(
    src: &str,
    charset: &str,
    address_header: bool,
) -> String {
    let (encoded, used) = charset::encode_or_utf8(charset, src);
    let used_name: &str = if used.eq_ignore_ascii_case(charset) {
        charset
    } else {
        "utf-8"
    };
    let use_q = used_name.contains("8859-");

    let mut start = 0;
    let first_special = encoded.iter().enumerate().find_map(|(ix, &b)| {
        if b' ' == b {
            start = ix + 1;
            None
        } else if needs_encoding(b, address_header) {
            Some(ix)
        } else {
            None
        }
    });

    if first_special.is_none() {
        return String::from_utf8_lossy(&encoded).into_owned();
    }

    let word_end = |from: usize| {
        from + encoded[from..]
            .iter()
            .position(|&b| b' ' == b)
            .unwrap_or(encoded.len() - from)
    };
    let mut end = word_end(start);
    let mut x = end;
    while x < encoded.len() {
        if needs_encoding(encoded[x], address_header) {
            end = word_end(x);
            x = end;
        } else {
            x += 1;
        }
    }

    let mut result = String::with_capacity(encoded.len() * 3);
    result.push_str(&String::from_utf8_lossy(&encoded[..start]));
    result.push_str("=?");
    result.push_str(used_name);
    if use_q {
        result.push_str("?Q?");
        for &b in &encoded[start..end] {
            if b' ' == b {
                result.push('_');
            } else if b.is_ascii_alphanumeric() {
                result.push(char::from(b));
            } else {
                result.push('=');
                result.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
                result.push(char::from(HEX_UPPER[usize::from(b & 0xF)]));
            }
        }
    } else {
        result.push_str("?B?");
        result.push_str(&base64::encode(&encoded[start..end]));
    }
    result.push_str("?=");
    result.push_str(&String::from_utf8_lossy(&encoded[end..]));
    result
}

/// Encode an address-like phrase word by word.
///
/// The text between the RFC 2822 specials is encoded with
/// `encode_rfc2047_string`; the specials themselves are copied through so
/// that the result still parses as an address.
pub fn encode_rfc2047_sentence(src: &str, charset: &str) -> String {
    let mut result = String::with_capacity(src.len());
    let mut word_start = 0;

    for (ix, ch) in src.char_indices() {
        if ch.is_ascii() && ADDRESS_SPECIALS.contains(&(ch as u8)) {
            if ix > word_start {
                result.push_str(&encode_rfc2047_string(
                    &src[word_start..ix],
                    charset,
                    false,
                ));
            }
            result.push(ch);
            word_start = ix + 1;
        }
    }

    if src.len() > word_start {
        result.push_str(&encode_rfc2047_string(
            &src[word_start..],
            charset,
            false,
        ));
    }
    result
}
