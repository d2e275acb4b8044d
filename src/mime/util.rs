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


//! Assorted helpers for raw header blocks and header text.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use memchr::{memchr, memchr_iter};
use rand::Rng;

use super::char_freq::{CharFreq, CharFreqType};
use super::charset::{self, cached_charset, CharsetPolicy};
use super::model::TransferEncoding;
use crate::codec::{hex_value, HEX_UPPER};
use crate::support::settings;

// RFC 2822 3.2.1 "specials"
const SPECIALS: &[u8] = b"()<>@,;:\\\".[]";
// RFC 2045 5.1 "tspecials"
const TSPECIALS: &[u8] = b"()<>@,;:\\\"/[]?=";

pub fn is_special(b: u8) -> bool {
    SPECIALS.contains(&b)
}

pub fn is_tspecial(b: u8) -> bool {
    TSPECIALS.contains(&b)
}

/// RFC 2822 `atext`, restricted to ASCII.
pub fn is_atext(b: u8) -> bool {
    b > b' ' && b < 0x7F && !is_special(b)
}

/// RFC 2045 token characters, restricted to ASCII.
pub fn is_ttext(b: u8) -> bool {
    b > b' ' && b < 0x7F && !is_tspecial(b)
}

/// Characters allowed unencoded inside an RFC 2047 Q-encoded word in a
/// phrase.
pub fn is_etext(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!*+-/".contains(&b)
}

/// The transfer encodings suitable for `data`, best first.
pub fn encodings_for_data(data: &[u8]) -> Vec<TransferEncoding> {
    let cf = CharFreq::new(data);
    let mut allowed = Vec::new();

    match cf.kind() {
        CharFreqType::SevenBitText => {
            allowed.push(TransferEncoding::SevenBit);
            allowed.push(TransferEncoding::EightBit);
        }
        CharFreqType::EightBitText => {
            allowed.push(TransferEncoding::EightBit);
        }
        _ => (),
    }

    match cf.kind() {
        CharFreqType::SevenBitText
        | CharFreqType::EightBitText
        | CharFreqType::SevenBitData => {
            if cf.printable_ratio() > 5.0 / 6.0 {
                allowed.push(TransferEncoding::QuotedPrintable);
                allowed.push(TransferEncoding::Base64);
            } else {
                allowed.push(TransferEncoding::Base64);
                allowed.push(TransferEncoding::QuotedPrintable);
            }
        }
        CharFreqType::EightBitData | CharFreqType::Binary => {
            allowed.push(TransferEncoding::Base64);
        }
    }

    allowed
}

/// The lower-case name of a transfer encoding, for display.
pub fn name_for_encoding(encoding: TransferEncoding) -> &'static str {
    match encoding {
        TransferEncoding::SevenBit => "7bit",
        TransferEncoding::EightBit => "8bit",
        TransferEncoding::QuotedPrintable => "quoted-printable",
        TransferEncoding::Base64 => "base64",
        TransferEncoding::UuEncode => "uuencode",
        TransferEncoding::Binary => "binary",
    }
}

/// Encode a parameter value as an RFC 2231 `charset''value`, if it needs
/// encoding at all.
pub fn encode_rfc2231_string(s: &str, charset: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let (encoded, used) = charset::encode_or_utf8(charset, s);
    if !encoded.iter().any(|&b| b < 0x20 || b >= 0x80) {
        return String::from_utf8_lossy(&encoded).into_owned();
    }

    let mut result = String::with_capacity(encoded.len() * 3);
    if used.eq_ignore_ascii_case(charset) {
        result.push_str(charset);
    } else {
        result.push_str("utf-8");
    }
    result.push_str("''");

    for &b in &encoded {
        if b >= 0x80 || b"%()<>@,;:\"/[]?.= \x1b".contains(&b) {
            result.push('%');
            result.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
            result.push(char::from(HEX_UPPER[usize::from(b & 0xF)]));
        } else {
            result.push(char::from(b));
        }
    }
    result
}

/// Decode an RFC 2231 `charset'language'value`.
///
/// A value without any `'` is decoded with the default charset; an unknown
/// charset also falls back to the default. Returns the text and the charset
/// actually used.
pub fn decode_rfc2231_string(
    s: &[u8],
    policy: &CharsetPolicy,
) -> (String, Arc<str>) {
    let first_quote = match memchr(b'\'', s) {
        Some(ix) => ix,
        None => {
            let text = charset::decode_raw(s, &policy.default_charset);
            return (text.into_owned(), Arc::clone(&policy.default_charset));
        }
    };

    let declared = String::from_utf8_lossy(&s[..first_quote]);
    let last_quote = s.iter().rposition(|&b| b'\'' == b).unwrap_or(first_quote);
    let raw = percent_decode(&s[last_quote + 1..]);

    let used = if policy.force_default || !charset::is_known(&declared) {
        Arc::clone(&policy.default_charset)
    } else {
        cached_charset(&declared)
    };
    let text = match charset::decode(&used, &raw) {
        Some(text) => text.into_owned(),
        None => charset::decode_raw(&raw, &used).into_owned(),
    };
    (text, used)
}

/// Undo `%XX` escapes, leaving malformed escapes alone.
pub(crate) fn percent_decode(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        if b'%' == s[ix] && ix + 2 < s.len() {
            if let (Some(hi), Some(lo)) =
                (hex_value(s[ix + 1]), hex_value(s[ix + 2]))
            {
                out.push(hi << 4 | lo);
                ix += 3;
                continue;
            }
        }
        out.push(s[ix]);
        ix += 1;
    }
    out
}

const UNIQUE_CHARS: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a string that is unique with high probability, suitable for use
/// in message ids and boundaries.
pub fn unique_string() -> String {
    let mut rng = rand::thread_rng();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let ran: u64 = rng.gen_range(1, 1001);
    let timeval = now / ran + u64::from(std::process::id());

    let mut s = timeval.to_string();
    s.push('.');
    for _ in 0..10 {
        s.push(char::from(UNIQUE_CHARS[rng.gen_range(0, 61)]));
    }
    s
}

/// Generate a unique identifier prefixed by the configured application
/// name (or product id).
pub fn create_unique_id() -> String {
    let (application, product) = settings::unique_id_seed();
    let prefix: String = if !application.is_empty() {
        application
    } else if !product.is_empty() {
        product
    } else {
        "mimetree".to_owned()
    }
    .chars()
    .filter(|&c| c.is_ascii_alphanumeric() || '-' == c || '_' == c)
    .collect();

    format!("{}-{}", prefix, unique_string())
}

pub fn multi_part_boundary() -> String {
    format!("nextPart{}", unique_string())
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || 0x0B == b
}

// Some broken mailers start continuation lines with a QP-escaped space or
// tab.
fn is_escaped_fold(s: &[u8]) -> bool {
    s.len() >= 3 && b'=' == s[0] && (b"09" == &s[1..3] || b"20" == &s[1..3])
}

/// Unfold a header value, replacing each line break and the whitespace
/// around it with a single space. A fold with nothing after it is dropped.
pub fn unfold_header(header: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(header.len());
    let mut pos = 0;

    for fold_mid in memchr_iter(b'\n', header) {
        if fold_mid < pos {
            continue;
        }

        let mut fold_begin = fold_mid;
        while fold_begin > pos && is_space(header[fold_begin - 1]) {
            fold_begin -= 1;
        }

        let mut fold_end = fold_mid;
        while fold_end < header.len() {
            if is_space(header[fold_end]) {
                fold_end += 1;
            } else if b'\n' == header[fold_end - 1]
                && is_escaped_fold(&header[fold_end..])
            {
                fold_end += 3;
            } else {
                break;
            }
        }

        result.extend_from_slice(&header[pos..fold_begin]);
        if fold_end < header.len() {
            result.push(b' ');
        }
        pos = fold_end;
    }

    if pos < header.len() {
        result.extend_from_slice(&header[pos..]);
    }
    result
}

/// Find the end of the (possibly folded) header line whose value starts at
/// `*data_begin`.
///
/// Returns the index of the terminating `\n` (or `src.len()` if there is
/// none) and whether the value was folded. `*data_begin` is advanced if the
/// first line of the value is empty and the real value starts on a
/// continuation line.
pub fn find_header_line_end(
    src: &[u8],
    data_begin: &mut usize,
) -> (usize, bool) {
    let mut folded = false;
    if *data_begin >= src.len() {
        return (src.len(), false);
    }

    let mut end = *data_begin;
    if b'\n' == src[end]
        && end + 2 < src.len()
        && (b' ' == src[end + 1] || b'\t' == src[end + 1])
    {
        *data_begin += 2;
        end += 2;
    }

    if b'\n' != src[end] {
        loop {
            end = match memchr(b'\n', &src[end + 1..]) {
                Some(ix) => end + 1 + ix,
                None => return (src.len(), folded),
            };

            let next = &src[end + 1..];
            match next.first() {
                None => break,
                Some(b' ') | Some(b'\t') => folded = true,
                Some(_) if is_escaped_fold(next) => folded = true,
                Some(_) => break,
            }
        }
    }

    (end, folded)
}

/// The location of one header within a raw header block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderPosition {
    /// Index of the first byte of the field name.
    pub start: usize,
    /// Index of the first byte of the value.
    pub data_begin: usize,
    /// Index of the `\n` ending the value, or the block length.
    pub end: usize,
    pub folded: bool,
}

/// Find the first header called `name` (case-insensitively) in `src`.
pub fn index_of_header(src: &[u8], name: &str) -> Option<HeaderPosition> {
    index_of_header_from(src, name, 0)
}

fn index_of_header_from(
    src: &[u8],
    name: &str,
    from: usize,
) -> Option<HeaderPosition> {
    let name = name.as_bytes();
    let matches_at = |ix: usize| {
        src.len() > ix + name.len()
            && src[ix..ix + name.len()].eq_ignore_ascii_case(name)
            && b':' == src[ix + name.len()]
    };

    let start = if 0 == from && matches_at(0) {
        0
    } else {
        memchr_iter(b'\n', &src[from..])
            .map(|ix| from + ix + 1)
            .find(|&ix| matches_at(ix))?
    };

    let mut data_begin = start + name.len() + 1;
    if Some(&b' ') == src.get(data_begin) {
        data_begin += 1;
    }
    let (end, folded) = find_header_line_end(src, &mut data_begin);
    Some(HeaderPosition {
        start,
        data_begin,
        end,
        folded,
    })
}

fn header_value(src: &[u8], pos: &HeaderPosition) -> Vec<u8> {
    let value = &src[pos.data_begin..pos.end.max(pos.data_begin)];
    if pos.folded {
        unfold_header(value)
    } else {
        value.to_vec()
    }
}

/// Extract the unfolded value of the first header called `name`.
pub fn extract_header(src: &[u8], name: &str) -> Option<Vec<u8>> {
    index_of_header(src, name).map(|pos| header_value(src, &pos))
}

/// Extract the unfolded values of all headers called `name`, in order.
pub fn extract_headers(src: &[u8], name: &str) -> Vec<Vec<u8>> {
    let mut result = Vec::new();
    let mut from = 0;
    while let Some(pos) = index_of_header_from(src, name, from) {
        result.push(header_value(src, &pos));
        if pos.end >= src.len() {
            break;
        }
        from = pos.end;
    }
    result
}

/// Remove the first header called `name` from `head`, including its line
/// ending. Returns whether anything was removed.
pub fn remove_header(head: &mut Vec<u8>, name: &str) -> bool {
    match index_of_header(head, name) {
        Some(pos) => {
            let end = (pos.end + 1).min(head.len());
            head.drain(pos.start..end);
            true
        }
        None => false,
    }
}

pub fn crlf_to_lf(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        if b'\r' == s[ix] && Some(&b'\n') == s.get(ix + 1) {
            ix += 1;
            continue;
        }
        out.push(s[ix]);
        ix += 1;
    }
    out
}

pub fn lf_to_crlf(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + s.len() / 32);
    for &b in s {
        if b'\n' == b {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

/// Escape backslashes and double quotes in `s`, and surround it with quotes
/// if `force` is set or it contains characters that would otherwise need
/// quoting in a phrase.
pub fn add_quotes(s: &str, force: bool) -> String {
    let mut needs_quotes = false;
    let mut escaped = String::with_capacity(s.len() + 2);
    for ch in s.chars() {
        if "()<>@,.;:[]=\\\"".contains(ch) {
            needs_quotes = true;
        }
        if '\\' == ch || '"' == ch {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    if needs_quotes || force {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

/// Remove double quotes from `s`, along with backslash escapes inside
/// quoted sections.
pub fn remove_quotes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_quote = false;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if '"' == ch {
            in_quote = !in_quote;
        } else if in_quote && '\\' == ch {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

const LRO: char = '\u{202D}';
const RLO: char = '\u{202E}';
const LRE: char = '\u{202A}';
const RLE: char = '\u{202B}';
const PDF: char = '\u{202C}';

/// Make sure every directional embedding/override in `s` is terminated, so
/// that it can't affect text displayed after it.
///
/// Surplus terminators are removed. Missing ones are added at the end, but
/// inside a trailing double quote.
pub fn balance_bidi_state(s: &str) -> String {
    let mut open = 0usize;
    let mut result = String::with_capacity(s.len() + 3);
    let mut removed_pdf = false;

    for ch in s.chars() {
        match ch {
            LRO | RLO | LRE | RLE => open += 1,
            PDF if open > 0 => open -= 1,
            PDF => {
                removed_pdf = true;
                continue;
            }
            _ => (),
        }
        result.push(ch);
    }

    if removed_pdf {
        warn!("Possible Unicode spoofing (unexpected PDF) detected in {:?}", s);
    }

    if open > 0 {
        warn!("Possible Unicode spoofing detected in {:?}", s);
        for _ in 0..open {
            if result.ends_with('"') {
                result.insert(result.len() - 1, PDF);
            } else {
                result.push(PDF);
            }
        }
    }

    result
}

/// Remove all directional embeddings and overrides from `s`.
pub fn remove_bidi_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| LRO != ch && RLO != ch && LRE != ch && RLE != ch)
        .collect()
}
