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


//! The RFC 2822 / RFC 2045 / RFC 2231 grammar, as `nom` parsers over raw
//! header bytes.
//!
//! Every parser takes the remaining input and, on success, returns what is
//! left after the production. On failure, the caller still holds its own
//! slice, so backtracking is free. CR and LF are treated as ordinary
//! folding whitespace, since unfolding has usually happened before these
//! parsers run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::prelude::*;
use log::{debug, warn};
use memchr::{memchr, memchr_iter, memrchr};
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while, take_while1};
use nom::combinator::map;
use nom::error::ErrorKind;
use nom::sequence::terminated;
use nom::IResult;

use super::charset::{self, cached_charset, decode_raw, CharsetPolicy};
use super::encoded_word::{decode_rfc2047_string, parse_encoded_word};
use super::model::{AddrSpec, Address, Mailbox, Timestamp};
use super::util::{
    find_header_line_end, is_atext, is_ttext, percent_decode, unfold_header,
};

pub type PResult<'a, T> = IResult<&'a [u8], T>;

pub(crate) fn fail<T>(i: &[u8], kind: ErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Error((i, kind)))
}

fn byte(c: u8) -> impl Fn(&[u8]) -> IResult<&[u8], u8> {
    move |i: &[u8]| match i.split_first() {
        Some((&b, rest)) if b == c => Ok((rest, b)),
        _ => fail(i, ErrorKind::Char),
    }
}

fn is_wsp(b: u8) -> bool {
    b' ' == b || b'\t' == b || b'\r' == b || b'\n' == b
}

/// Skip whitespace, including line folding.
pub fn eat_whitespace(i: &[u8]) -> &[u8] {
    let n = i.iter().take_while(|&&b| is_wsp(b)).count();
    &i[n..]
}

/// RFC 2822 3.2.3 "Comment or folding white space".
///
/// An unbalanced comment stops the scan at its opening parenthesis.
pub fn eat_cfws(mut i: &[u8]) -> &[u8] {
    loop {
        i = eat_whitespace(i);
        if Some(&b'(') != i.first() {
            return i;
        }

        match parse_comment(i) {
            Ok((rest, _)) => i = rest,
            Err(_) => {
                debug!("Unbalanced comment");
                return i;
            }
        }
    }
}

// Scan the inside of a quoted construct whose opening delimiter has already
// been consumed, up to the next unescaped `open` or `close` (which is also
// consumed). Quoted pairs are unescaped and folding is removed. Encoded
// words inside double quotes are decoded according to `policy`.
fn scan_quoted<'a>(
    mut i: &'a [u8],
    open: u8,
    close: u8,
    policy: &CharsetPolicy,
) -> PResult<'a, (Vec<u8>, u8)> {
    let start = i;
    let mut out = Vec::new();

    while let Some((&ch, rest)) = i.split_first() {
        let here = i;
        i = rest;

        if ch == close || ch == open {
            return Ok((i, (out, ch)));
        }

        match ch {
            b'\\' => match i.split_first() {
                Some((&escaped, rest)) => {
                    out.push(escaped);
                    i = rest;
                }
                None => break,
            },
            b'\r' if Some(&b'\n') == i.first() => match i.get(1) {
                // Folding; the WSP itself is kept
                Some(b' ') | Some(b'\t') => i = &i[1..],
                _ => {
                    out.extend_from_slice(b"\r\n");
                    i = &i[1..];
                }
            },
            b'\n' => match i.first() {
                Some(b' ') | Some(b'\t') => (),
                _ => out.push(b'\n'),
            },
            // Some agents put encoded words inside quoted strings.
            b'=' if b'"' == close && Some(&b'?') == i.first() => {
                match parse_encoded_word(here, policy) {
                    Ok((rest, word)) => {
                        out.extend_from_slice(word.text.as_bytes());
                        i = rest;
                    }
                    Err(_) => out.push(ch),
                }
            }
            _ => out.push(ch),
        }
    }

    fail(start, ErrorKind::Eof)
}

/// Parse a construct delimited by `open` and `close`, such as a quoted
/// string or domain literal, returning its unescaped content.
pub fn parse_generic_quoted_string(
    i: &[u8],
    open: u8,
    close: u8,
) -> PResult<'_, Vec<u8>> {
    quoted_with_policy(i, open, close, &CharsetPolicy::default())
}

fn quoted_with_policy<'a>(
    i: &'a [u8],
    open: u8,
    close: u8,
    policy: &CharsetPolicy,
) -> PResult<'a, Vec<u8>> {
    let (rest, _) = byte(open)(i)?;
    let (rest, (content, delim)) = scan_quoted(rest, open, close, policy)?;
    if delim != close {
        return fail(i, ErrorKind::Char);
    }
    Ok((rest, content))
}

// RFC 2822 3.2.5 "Quoted string"
pub fn parse_quoted_string(i: &[u8]) -> PResult<'_, Vec<u8>> {
    parse_quoted_string_with_policy(i, &CharsetPolicy::default())
}

/// Parse a quoted string, decoding any encoded words inside it with
/// `policy`.
pub fn parse_quoted_string_with_policy<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Vec<u8>> {
    quoted_with_policy(i, b'"', b'"', policy)
}

// RFC 2822 3.2.3 "Comment". Nested comments are kept, with their
// parentheses, in the returned text.
pub fn parse_comment(i: &[u8]) -> PResult<'_, Vec<u8>> {
    let (mut i, _) = byte(b'(')(i)?;
    let mut depth = 1usize;
    let mut text = Vec::new();

    while depth > 0 {
        let (rest, (part, delim)) =
            scan_quoted(i, b'(', b')', &CharsetPolicy::default())?;
        text.extend_from_slice(&part);
        if b')' == delim {
            depth -= 1;
            if depth > 0 {
                text.push(b')');
            }
        } else {
            depth += 1;
            text.push(b'(');
        }
        i = rest;
    }

    Ok((i, text))
}

// RFC 2822 3.2.4 "Atom text", optionally amended by RFC 6532 to include all
// non-ASCII bytes.
pub fn parse_atom(i: &[u8], allow_8bit: bool) -> PResult<'_, &[u8]> {
    take_while1(move |b: u8| is_atext(b) || (allow_8bit && b >= 0x80))(i)
}

// RFC 2045 5.1 "token"
pub fn parse_token(i: &[u8], allow_8bit: bool) -> PResult<'_, &[u8]> {
    take_while1(move |b: u8| is_ttext(b) || (allow_8bit && b >= 0x80))(i)
}

/// A decoded RFC 2822 phrase, such as a display name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    /// The charset of the last encoded word in the phrase, if any.
    pub charset: Option<Arc<str>>,
}

// RFC 2822 3.2.6 "phrase", including encoded words (RFC 2047 5(3)) and the
// obsolete syntax allowing unquoted '.'.
//
// Words are joined with single spaces, except that whitespace between
// adjacent encoded words vanishes and a '.' binds to whatever follows it
// unless whitespace intervenes.
pub fn parse_phrase<'a>(
    input: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Phrase> {
    let mut i = input;
    let mut phrase = Phrase::default();
    let mut found_any = false;
    let mut last_was_encoded_word = false;
    let mut glue_next = false;
    let mut successfully_parsed = input;

    fn push_word(
        phrase: &mut Phrase,
        found_any: &mut bool,
        glue_next: &mut bool,
        separate: bool,
        word: &str,
    ) {
        if *found_any && separate && !*glue_next {
            phrase.text.push(' ');
        }
        phrase.text.push_str(word);
        *found_any = true;
        *glue_next = false;
    }

    while let Some(&ch) = i.first() {
        match ch {
            b'.' => {
                if !found_any {
                    return fail(input, ErrorKind::Char);
                }
                i = &i[1..];
                phrase.text.push('.');
                glue_next = !matches!(i.first(), Some(&b) if is_wsp(b));
                successfully_parsed = i;
            }

            b'"' => match parse_quoted_string_with_policy(i, policy) {
                Ok((rest, quoted)) => {
                    push_word(
                        &mut phrase,
                        &mut found_any,
                        &mut glue_next,
                        true,
                        &decode_raw(&quoted, &policy.default_charset),
                    );
                    last_was_encoded_word = false;
                    i = rest;
                    successfully_parsed = i;
                }
                Err(_) => {
                    if !found_any {
                        return fail(input, ErrorKind::Char);
                    }
                    // Unterminated quoted string; take the rest as its
                    // content.
                    debug!("Premature end of quoted string in phrase");
                    let rest = &i[1..];
                    push_word(
                        &mut phrase,
                        &mut found_any,
                        &mut glue_next,
                        true,
                        &decode_raw(rest, &policy.default_charset),
                    );
                    return Ok((&i[i.len()..], phrase));
                }
            },

            b'(' => match parse_comment(i) {
                Ok((rest, _)) => {
                    last_was_encoded_word = false;
                    i = rest;
                    successfully_parsed = i;
                }
                Err(_) => {
                    return if found_any {
                        Ok((successfully_parsed, phrase))
                    } else {
                        fail(input, ErrorKind::Char)
                    };
                }
            },

            _ => {
                if b'=' == ch {
                    if let Ok((rest, word)) = parse_encoded_word(i, policy) {
                        push_word(
                            &mut phrase,
                            &mut found_any,
                            &mut glue_next,
                            !last_was_encoded_word,
                            &word.text,
                        );
                        phrase.charset = Some(word.charset);
                        last_was_encoded_word = true;
                        i = eat_whitespace(rest);
                        successfully_parsed = rest;
                        continue;
                    }
                }

                match parse_atom(i, true) {
                    Ok((rest, atom)) => {
                        push_word(
                            &mut phrase,
                            &mut found_any,
                            &mut glue_next,
                            true,
                            &decode_raw(atom, &policy.default_charset),
                        );
                        last_was_encoded_word = false;
                        i = rest;
                        successfully_parsed = i;
                    }
                    Err(_) => {
                        return if found_any {
                            Ok((successfully_parsed, phrase))
                        } else {
                            fail(input, ErrorKind::Alpha)
                        };
                    }
                }
            }
        }

        i = eat_whitespace(i);
    }

    if found_any {
        Ok((i, phrase))
    } else {
        fail(input, ErrorKind::Eof)
    }
}

// RFC 2822 3.2.4 "Dot atom", with CFWS allowed in front. A trailing '.' is
// left unconsumed.
pub fn parse_dot_atom(i: &[u8]) -> PResult<'_, String> {
    let i = eat_cfws(i);
    let (mut i, first) = parse_atom(i, true)?;
    let mut result = String::from_utf8_lossy(first).into_owned();

    while let Some((b'.', rest)) = i.split_first() {
        match parse_atom(rest, true) {
            Ok((rest, atom)) => {
                result.push('.');
                result.push_str(&String::from_utf8_lossy(atom));
                i = rest;
            }
            Err(_) => break,
        }
    }

    Ok((i, result))
}

// RFC 2822 3.4.1 "domain", including domain literals (returned with their
// brackets) and a trailing '.'.
pub fn parse_domain(i: &[u8]) -> PResult<'_, String> {
    let i = eat_cfws(i);
    if Some(&b'[') == i.first() {
        let (rest, literal) = parse_generic_quoted_string(i, b'[', b']')?;
        return Ok((
            rest,
            format!("[{}]", String::from_utf8_lossy(&literal)),
        ));
    }

    let (mut rest, mut domain) = parse_dot_atom(i)?;
    if Some(&b'.') == rest.first() {
        domain.push('.');
        rest = &rest[1..];
    }
    Ok((rest, domain))
}

// RFC 2822 4.4 "obs-route": `@domain,@domain:` before an addr-spec.
pub fn parse_obs_route(i: &[u8]) -> PResult<'_, Vec<String>> {
    let mut route = Vec::new();
    let mut cursor = i;

    loop {
        cursor = eat_cfws(cursor);
        match cursor.first() {
            None => return fail(i, ErrorKind::Eof),
            Some(b',') => cursor = &cursor[1..],
            Some(b':') => return Ok((&cursor[1..], route)),
            Some(b'@') => {
                let (rest, domain) = parse_domain(&cursor[1..])?;
                route.push(domain);
                cursor = eat_cfws(rest);
                match cursor.first() {
                    None => return fail(i, ErrorKind::Eof),
                    Some(b':') => return Ok((&cursor[1..], route)),
                    Some(b',') => cursor = &cursor[1..],
                    Some(_) => (),
                }
            }
            Some(_) => return fail(i, ErrorKind::Char),
        }
    }
}

// RFC 2822 3.4.1 "addr-spec", including the obsolete local-part syntax
// allowing CFWS and quoted strings between dots.
pub fn parse_addr_spec(i: &[u8]) -> PResult<'_, AddrSpec> {
    let mut local_part = Vec::new();
    let mut cursor = i;

    loop {
        cursor = eat_cfws(cursor);
        match cursor.first() {
            None => return fail(i, ErrorKind::Eof),
            Some(b'.') => {
                local_part.push(b'.');
                cursor = &cursor[1..];
            }
            Some(b'@') => {
                cursor = &cursor[1..];
                break;
            }
            Some(b'"') => {
                let (rest, quoted) = parse_quoted_string(cursor)?;
                local_part.extend_from_slice(&quoted);
                cursor = rest;
            }
            Some(_) => {
                let (rest, atom) = parse_atom(cursor, true)?;
                local_part.extend_from_slice(atom);
                cursor = rest;
            }
        }
    }

    let (rest, domain) = parse_domain(cursor)?;
    Ok((
        rest,
        AddrSpec {
            local_part: String::from_utf8_lossy(&local_part).into_owned(),
            domain,
        },
    ))
}

// RFC 2822 3.4 "angle-addr", including the obsolete source route, which is
// discarded.
pub fn parse_angle_addr(i: &[u8]) -> PResult<'_, AddrSpec> {
    let cursor = eat_cfws(i);
    let (cursor, _) = byte(b'<')(cursor)?;
    let mut cursor = eat_cfws(cursor);

    if let Some(b'@') | Some(b',') = cursor.first() {
        warn!("Obsolete source route found, ignoring");
        let (rest, _) = parse_obs_route(cursor)?;
        cursor = rest;
    }

    let (cursor, addr_spec) = parse_addr_spec(cursor)?;
    let cursor = eat_cfws(cursor);
    let (cursor, _) = byte(b'>')(cursor)?;
    Ok((cursor, addr_spec))
}

// A legacy "(Display Name)" comment after an address.
fn legacy_display_name<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> (&'a [u8], Option<String>) {
    let after_ws = eat_whitespace(i);
    if Some(&b'(') != after_ws.first() {
        return (i, None);
    }

    match parse_comment(after_ws) {
        Ok((rest, comment)) => {
            let (name, _) = decode_rfc2047_string(&comment, policy);
            (rest, Some(name))
        }
        Err(_) => (i, None),
    }
}

// RFC 2822 3.4 "mailbox".
//
// `[display-name] angle-addr` is tried before a bare `addr-spec`. Either may
// be followed by a legacy "(Display Name)" comment, which supplies the name
// if the primary form didn't.
pub fn parse_mailbox<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Mailbox> {
    let start = eat_cfws(i);
    if start.is_empty() {
        return fail(i, ErrorKind::Eof);
    }

    let (cursor, name) = match parse_phrase(start, policy) {
        Ok((rest, phrase)) => (eat_cfws(rest), Some(phrase.text)),
        Err(_) => (start, None),
    };
    if let Ok((rest, addr_spec)) = parse_angle_addr(cursor) {
        let (rest, name) = match name {
            Some(name) => (rest, name),
            None => {
                let (rest, legacy) = legacy_display_name(rest, policy);
                (rest, legacy.unwrap_or_default())
            }
        };
        return Ok((rest, Mailbox::new(&name, addr_spec)));
    }

    let (rest, addr_spec) = parse_addr_spec(start)?;
    let (rest, name) = legacy_display_name(rest, policy);
    Ok((rest, Mailbox::new(&name.unwrap_or_default(), addr_spec)))
}

// RFC 2822 3.4 "group", including the obsolete syntax allowing empty list
// entries.
pub fn parse_group<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Address> {
    let cursor = eat_cfws(i);
    let (cursor, phrase) = parse_phrase(cursor, policy)?;
    let cursor = eat_cfws(cursor);
    let (mut cursor, _) = byte(b':')(cursor)?;

    let mut group = Address {
        display_name: super::util::remove_bidi_control_chars(&phrase.text),
        mailboxes: Vec::new(),
    };

    loop {
        cursor = eat_cfws(cursor);
        match cursor.first() {
            None => return fail(i, ErrorKind::Eof),
            Some(b',') => cursor = &cursor[1..],
            Some(b';') => return Ok((&cursor[1..], group)),
            Some(_) => {
                let (rest, mailbox) = parse_mailbox(cursor, policy)?;
                group.mailboxes.push(mailbox);
                cursor = eat_cfws(rest);
                match cursor.first() {
                    None => return fail(i, ErrorKind::Eof),
                    Some(b';') => return Ok((&cursor[1..], group)),
                    Some(b',') => cursor = &cursor[1..],
                    Some(_) => (),
                }
            }
        }
    }
}

// RFC 2822 3.4 "address"
pub fn parse_address<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Address> {
    let i = eat_cfws(i);
    if let Ok((rest, mailbox)) = parse_mailbox(i, policy) {
        return Ok((rest, Address::from(mailbox)));
    }

    parse_group(i, policy)
}

// RFC 2822 3.4 "address-list", including the obsolete syntax allowing empty
// entries. Some agents separate entries with ';', which is accepted too.
pub fn parse_address_list<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Vec<Address>> {
    let mut result = Vec::new();
    let mut cursor = i;

    loop {
        cursor = eat_cfws(cursor);
        match cursor.first() {
            None => return Ok((cursor, result)),
            Some(b',') | Some(b';') => cursor = &cursor[1..],
            Some(_) => {
                let (rest, address) = parse_address(cursor, policy)?;
                result.push(address);
                cursor = eat_cfws(rest);
                match cursor.first() {
                    None => return Ok((cursor, result)),
                    Some(b',') => cursor = &cursor[1..],
                    Some(_) => (),
                }
            }
        }
    }
}

/// The raw value of one parameter, before RFC 2231 processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Token(Vec<u8>),
    Quoted(Vec<u8>),
    Empty,
}

impl ParamValue {
    fn bytes(&self) -> &[u8] {
        match *self {
            ParamValue::Token(ref v) | ParamValue::Quoted(ref v) => v,
            ParamValue::Empty => &[],
        }
    }
}

fn parameter_name(i: &[u8]) -> PResult<'_, String> {
    let i = eat_cfws(i);
    let (i, name) = parse_token(i, false)?;
    let i = eat_cfws(i);
    let (i, _) = byte(b'=')(i)?;
    Ok((i, String::from_utf8_lossy(name).to_ascii_lowercase()))
}

// RFC 2045 5.1 "parameter". The name is lower-cased; RFC 2231 suffixes are
// left on it for `parse_parameter_list` to interpret.
pub fn parse_parameter<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, (String, ParamValue)> {
    let (cursor, mut name) = parameter_name(i)?;
    let cursor = eat_cfws(cursor);

    if cursor.is_empty() {
        if name.ends_with('*') {
            name.pop();
        }
        return Ok((cursor, (name, ParamValue::Empty)));
    }

    if Some(&b'"') == cursor.first() {
        // Extended parameters can't have quoted values; treat it as a
        // regular one.
        if name.ends_with('*') {
            warn!("Parameter {} has a quoted extended value", name);
            name.pop();
        }
        let (rest, value) = parse_quoted_string_with_policy(cursor, policy)?;
        Ok((rest, (name, ParamValue::Quoted(value))))
    } else {
        let (rest, value) = parse_token(cursor, true)?;
        Ok((rest, (name, ParamValue::Token(value.to_vec()))))
    }
}

/// Parse a `;`-separated parameter list without RFC 2231 processing.
///
/// A malformed parameter is skipped up to the next `;`.
pub fn parse_raw_parameter_list<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, Vec<(String, ParamValue)>> {
    let mut result = Vec::new();
    let mut cursor = i;

    loop {
        cursor = eat_cfws(cursor);
        match cursor.first() {
            None => return Ok((cursor, result)),
            Some(b';') => {
                cursor = &cursor[1..];
                continue;
            }
            Some(_) => (),
        }

        match parse_parameter(cursor, policy) {
            Ok((rest, param)) => {
                result.push(param);
                cursor = eat_cfws(rest);
                if Some(&b';') == cursor.first() {
                    cursor = &cursor[1..];
                } else if !cursor.is_empty() {
                    debug!("Garbage after parameter {:?}", result.last());
                }
            }
            Err(_) => {
                debug!(
                    "Malformed parameter {:?}, skipping",
                    String::from_utf8_lossy(cursor)
                );
                cursor = match memchr(b';', cursor) {
                    Some(ix) => &cursor[ix + 1..],
                    None => &cursor[cursor.len()..],
                };
            }
        }
    }
}

struct Segment<'a> {
    section: u32,
    extended: bool,
    value: &'a ParamValue,
}

// Split `name*2*` into ("name", Some(2), true).
fn split_parameter_name(name: &str) -> (&str, Option<u32>, bool) {
    let (name, extended) = match name.strip_suffix('*') {
        Some(stripped) => (stripped, true),
        None => (name, false),
    };

    if let Some(star) = name.rfind('*') {
        if let Ok(section) = name[star + 1..].parse::<u32>() {
            return (&name[..star], Some(section), extended);
        }
    }

    (name, None, extended)
}

fn assemble_parameter(
    name: &str,
    segments: &mut Vec<Segment<'_>>,
    policy: &CharsetPolicy,
) -> (String, Option<Arc<str>>) {
    segments.sort_by_key(|s| s.section);

    // Outlook writes non-ASCII parameters as encoded words in quotes.
    if 1 == segments.len() {
        if let ParamValue::Quoted(value) = segments[0].value {
            if value.windows(2).any(|w| w == b"=?") {
                return decode_rfc2047_string(value, policy);
            }
        }
    }

    let mut charset = None;
    let mut bytes = Vec::new();
    for (ix, segment) in segments.iter().enumerate() {
        let raw = segment.value.bytes();
        let extended = segment.extended
            && matches!(segment.value, ParamValue::Token(_));

        if !extended {
            bytes.extend_from_slice(raw);
        } else if 0 != ix {
            bytes.extend_from_slice(&percent_decode(raw));
        } else {
            match (memchr(b'\'', raw), memrchr(b'\'', raw)) {
                (Some(first), Some(last)) => {
                    let declared = String::from_utf8_lossy(&raw[..first]);
                    charset = Some(
                        if policy.force_default
                            || declared.is_empty()
                            || !charset::is_known(&declared)
                        {
                            Arc::clone(&policy.default_charset)
                        } else {
                            cached_charset(&declared)
                        },
                    );
                    bytes.extend_from_slice(&percent_decode(&raw[last + 1..]));
                }
                _ => {
                    warn!("No charset in extended value of {}", name);
                    bytes.extend_from_slice(raw);
                }
            }
        }
    }

    let text = match charset {
        Some(ref charset) => charset::decode(charset, &bytes)
            .map(|s| s.into_owned())
            .unwrap_or_else(|| {
                decode_raw(&bytes, &policy.default_charset).into_owned()
            }),
        None => decode_raw(&bytes, &policy.default_charset).into_owned(),
    };
    (text, charset)
}

/// Parse a parameter list, reassembling RFC 2231 continuations and decoding
/// extended values.
///
/// Returns the parameters, keyed by lower-case name, and the charset of the
/// last encoded value, if any.
pub fn parse_parameter_list_with_charset<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, (BTreeMap<String, String>, Option<Arc<str>>)> {
    let (rest, raw) = parse_raw_parameter_list(i, policy)?;

    let mut grouped: BTreeMap<&str, Vec<Segment<'_>>> = BTreeMap::new();
    for (name, value) in &raw {
        let (base, section, extended) = split_parameter_name(name);
        grouped.entry(base).or_default().push(Segment {
            section: section.unwrap_or(0),
            extended,
            value,
        });
    }

    let mut params = BTreeMap::new();
    let mut charset = None;
    for (name, mut segments) in grouped {
        let (value, value_charset) =
            assemble_parameter(name, &mut segments, policy);
        if value_charset.is_some() {
            charset = value_charset;
        }
        params.insert(name.to_owned(), value);
    }

    Ok((rest, (params, charset)))
}

pub fn parse_parameter_list<'a>(
    i: &'a [u8],
    policy: &CharsetPolicy,
) -> PResult<'a, BTreeMap<String, String>> {
    let (rest, (params, _)) = parse_parameter_list_with_charset(i, policy)?;
    Ok((rest, params))
}

/// Parse a run of decimal digits, returning the value and the number of
/// digits.
pub fn parse_digits(i: &[u8]) -> PResult<'_, (u32, usize)> {
    map(take_while1(|b: u8| b.is_ascii_digit()), |digits: &[u8]| {
        let value = digits.iter().fold(0u32, |acc, &d| {
            acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
        });
        (value, digits.len())
    })(i)
}

fn alphas(i: &[u8]) -> PResult<'_, &[u8]> {
    take_while(|b: u8| b.is_ascii_alphabetic())(i)
}

// RFC 2822 3.3 "day-name", tolerating the full spelling
fn day_name(i: &[u8]) -> PResult<'_, &[u8]> {
    terminated(
        alt((
            tag_no_case("mon"),
            tag_no_case("tue"),
            tag_no_case("wed"),
            tag_no_case("thu"),
            tag_no_case("fri"),
            tag_no_case("sat"),
            tag_no_case("sun"),
        )),
        alphas,
    )(i)
}

// RFC 2822 3.3 "month-name", tolerating the full spelling
fn month_name(i: &[u8]) -> PResult<'_, u32> {
    terminated(
        alt((
            map(tag_no_case("jan"), |_| 1),
            map(tag_no_case("feb"), |_| 2),
            map(tag_no_case("mar"), |_| 3),
            map(tag_no_case("apr"), |_| 4),
            map(tag_no_case("may"), |_| 5),
            map(tag_no_case("jun"), |_| 6),
            map(tag_no_case("jul"), |_| 7),
            map(tag_no_case("aug"), |_| 8),
            map(tag_no_case("sep"), |_| 9),
            map(tag_no_case("oct"), |_| 10),
            map(tag_no_case("nov"), |_| 11),
            map(tag_no_case("dec"), |_| 12),
        )),
        alphas,
    )(i)
}

const HOUR: i32 = 3600;

// RFC 2822 4.3 obsolete zones, plus some common abbreviations seen in the
// wild.
const TIME_ZONES: &[(&str, i32)] = &[
    ("GMT", 0),
    ("UT", 0),
    ("UTC", 0),
    ("Z", 0),
    ("WET", 0),
    ("BST", HOUR),
    ("CET", HOUR),
    ("MET", HOUR),
    ("WEST", HOUR),
    ("CEST", 2 * HOUR),
    ("MEST", 2 * HOUR),
    ("EET", 2 * HOUR),
    ("EEST", 3 * HOUR),
    ("MSK", 3 * HOUR),
    ("HKT", 8 * HOUR),
    ("JST", 9 * HOUR),
    ("AEST", 10 * HOUR),
    ("NZST", 12 * HOUR),
    ("AST", -4 * HOUR),
    ("EDT", -4 * HOUR),
    ("EST", -5 * HOUR),
    ("CDT", -5 * HOUR),
    ("CST", -6 * HOUR),
    ("MDT", -6 * HOUR),
    ("MST", -7 * HOUR),
    ("PDT", -7 * HOUR),
    ("PST", -8 * HOUR),
];

/// A parsed RFC 2822 `time`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub offset_secs: i32,
    pub zone_known: bool,
}

fn time_separator(i: &[u8]) -> PResult<'_, u8> {
    let (i, sep) = byte(b':')(eat_cfws(i))?;
    Ok((eat_cfws(i), sep))
}

// RFC 2822 3.3 "time": `hh:mm[:ss] zone`. A missing or unrecognised zone
// yields an unknown zone, as does `-0000`.
pub fn parse_time(i: &[u8]) -> PResult<'_, TimeOfDay> {
    let cursor = eat_cfws(i);
    let (cursor, (hour, _)) = parse_digits(cursor)?;
    let (cursor, _) = time_separator(cursor)?;
    let (cursor, (minute, _)) = parse_digits(cursor)?;
    let (cursor, second) = match time_separator(cursor) {
        Ok((rest, _)) => {
            let (rest, (second, _)) = parse_digits(rest)?;
            (rest, second)
        }
        Err(_) => (cursor, 0),
    };

    let mut time = TimeOfDay {
        hour,
        minute,
        second,
        offset_secs: 0,
        zone_known: false,
    };

    let cursor = eat_cfws(cursor);
    let sign = match cursor.first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        Some(b) if b.is_ascii_alphabetic() => 0,
        // No zone; what follows may be an asctime() year
        _ => return Ok((cursor, time)),
    };

    if 0 != sign {
        let (rest, (zone, len)) = parse_digits(&cursor[1..])?;
        if 4 != len {
            return fail(cursor, ErrorKind::Digit);
        }
        let zone = zone as i32;
        time.offset_secs = sign * (zone / 100 * HOUR + zone % 100 * 60);
        time.zone_known = !(sign < 0 && 0 == zone);
        return Ok((rest, time));
    }

    let (rest, zone) = parse_token(cursor, false)?;
    match TIME_ZONES
        .iter()
        .find(|&&(name, _)| name.as_bytes().eq_ignore_ascii_case(zone))
    {
        Some(&(_, offset)) => {
            time.offset_secs = offset;
            time.zone_known = true;
        }
        None => {
            debug!("Unknown time zone {:?}", String::from_utf8_lossy(zone));
        }
    }
    Ok((rest, time))
}

// RFC 2822 3.3 "date-time", plus the obsolete forms: optional day name,
// two- and three-digit years, named zones, and the asctime() layout
// `Wed Jun 30 21:49:08 1993`.
pub fn parse_date_time(i: &[u8]) -> PResult<'_, Timestamp> {
    let mut cursor = eat_cfws(i);

    if let Ok((rest, _)) = day_name(cursor) {
        cursor = eat_cfws(rest);
        if Some(&b',') == cursor.first() {
            cursor = eat_cfws(&cursor[1..]);
        }
    }

    let mut month = None;
    if !matches!(cursor.first(), Some(b) if b.is_ascii_digit()) {
        let (rest, m) = month_name(cursor)?;
        month = Some(m);
        cursor = eat_cfws(rest);
    }
    let asctime = month.is_some();

    let (rest, (day, _)) = parse_digits(cursor)?;
    cursor = eat_cfws(rest);

    let month = match month {
        Some(month) => month,
        None => {
            let (rest, month) = month_name(cursor)?;
            cursor = eat_cfws(rest);
            month
        }
    };

    let mut year = None;
    if !asctime {
        let (rest, (y, _)) = parse_digits(cursor)?;
        year = Some(y);
        cursor = rest;
    }

    let (mut cursor, time) = parse_time(cursor)?;

    let year = match year {
        Some(year) => year,
        None => {
            let (rest, (year, _)) = parse_digits(eat_cfws(cursor))?;
            cursor = rest;
            year
        }
    };

    // RFC 2822 4.3 two- and three-digit years
    let year = if year < 50 {
        year + 2000
    } else if year < 1000 {
        year + 1900
    } else {
        year
    };
    if year < 1900 {
        return fail(i, ErrorKind::Verify);
    }

    let date_time = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| {
            date.and_hms_opt(time.hour, time.minute, time.second.min(59))
        })
        .and_then(|naive| {
            FixedOffset::east_opt(time.offset_secs)?
                .from_local_datetime(&naive)
                .single()
        });

    match date_time {
        Some(date_time) => Ok((
            eat_cfws(cursor),
            Timestamp {
                date_time,
                zone_known: time.zone_known,
            },
        )),
        None => fail(i, ErrorKind::Verify),
    }
}

/// One header extracted from a raw header block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawHeader {
    pub name: String,
    /// The unfolded value.
    pub value: Vec<u8>,
}

/// Extract the first header from `head`, returning it and the rest of the
/// block, or `None` if there are no more headers.
pub fn extract_first_header(head: &[u8]) -> Option<(RawHeader, &[u8])> {
    let colon = memchr(b':', head)?;

    let mut name = &head[..colon];
    if let Some(nl) = memrchr(b'\n', name) {
        warn!(
            "Skipping garbage in header block: {:?}",
            String::from_utf8_lossy(&name[..nl])
        );
        name = &name[nl + 1..];
    }

    let mut data_begin = colon + 1;
    if Some(&b' ') == head.get(data_begin) {
        data_begin += 1;
    }
    let (end, folded) = find_header_line_end(head, &mut data_begin);
    let raw_value = &head[data_begin.min(end)..end];
    let mut value = if folded {
        unfold_header(raw_value)
    } else {
        raw_value.to_vec()
    };
    if Some(&b'\r') == value.last() {
        value.pop();
    }

    Some((
        RawHeader {
            name: String::from_utf8_lossy(name).trim().to_owned(),
            value,
        },
        &head[(end + 1).min(head.len())..],
    ))
}

/// Split a message into its header block and body.
///
/// The header block keeps its final line ending; the blank line is
/// dropped. Content starting with a blank line has an empty header block,
/// and content without any blank line is all header.
pub fn extract_header_and_body(content: &[u8]) -> (&[u8], &[u8]) {
    if content.starts_with(b"\n") {
        return (&[], &content[1..]);
    }
    if content.starts_with(b"\r\n") {
        return (&[], &content[2..]);
    }

    for lf in memchr_iter(b'\n', content) {
        let after = &content[lf + 1..];
        if after.starts_with(b"\n") {
            return (&content[..=lf], &after[1..]);
        }
        if after.starts_with(b"\r\n") {
            return (&content[..=lf], &after[2..]);
        }
    }

    (content, &[])
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn policy() -> CharsetPolicy {
        CharsetPolicy::new("utf-8", false)
    }

    #[test]
    fn test_eat_cfws() {
        assert_eq!(b"x", eat_cfws(b"  \t\r\n x"));
        assert_eq!(b"x", eat_cfws(b" (comment (nested)) (another) x"));
        assert_eq!(b"(open x", eat_cfws(b" (open x"));
        assert_eq!(b"(a (b) x", eat_cfws(b"(a (b) x"));
        assert_eq!(b"", eat_cfws(b"(a \\) b)"));
    }

    #[test]
    fn test_quoted_strings() {
        assert_eq!(
            Ok((&b" rest"[..], b"hello \"world\"".to_vec())),
            parse_quoted_string(b"\"hello \\\"world\\\"\" rest")
        );
        assert_eq!(
            Ok((&b""[..], b"folded line".to_vec())),
            parse_quoted_string(b"\"folded\r\n line\"")
        );
        assert!(parse_quoted_string(b"\"unterminated").is_err());
        assert!(parse_quoted_string(b"no quote").is_err());

        assert_eq!(
            Ok((&b""[..], b"127.0.0.1".to_vec())),
            parse_generic_quoted_string(b"[127.0.0.1]", b'[', b']')
        );
        assert_eq!(
            Ok((&b""[..], "Andr\u{e9}".as_bytes().to_vec())),
            parse_quoted_string(b"\"=?ISO-8859-1?Q?Andr=E9?=\"")
        );

        let forced = CharsetPolicy::new("iso-8859-1", true);
        assert_eq!(
            Ok((&b""[..], "Andr\u{c3}\u{a9}".as_bytes().to_vec())),
            parse_quoted_string_with_policy(
                b"\"=?utf-8?q?Andr=C3=A9?=\"",
                &forced
            )
        );
        let (_, phrase) =
            parse_phrase(b"\"=?utf-8?q?Andr=C3=A9?= X\"", &forced).unwrap();
        assert_eq!("Andr\u{c3}\u{a9} X", phrase.text);
    }

    #[test]
    fn test_comment() {
        assert_eq!(
            Ok((&b" x"[..], b"a (b) c".to_vec())),
            parse_comment(b"(a (b) c) x")
        );
        assert!(parse_comment(b"(a (b) c x").is_err());
    }

    #[test]
    fn test_atoms_and_tokens() {
        assert_eq!(
            Ok((&b".b"[..], &b"a"[..])),
            parse_atom(b"a.b", false)
        );
        assert_eq!(
            Ok((&b"/plain"[..], &b"text"[..])),
            parse_token(b"text/plain", false)
        );
        assert_eq!(
            Ok((&b""[..], &b"v1.0"[..])),
            parse_token(b"v1.0", false)
        );
        assert!(parse_atom(b"\xe9t\xe9", false).is_err());
        assert!(parse_atom(b"\xe9t\xe9", true).is_ok());
    }

    #[test]
    fn test_phrase() {
        fn phrase(s: &[u8]) -> PResult<'_, String> {
            parse_phrase(s, &policy()).map(|(r, p)| (r, p.text))
        }

        assert_eq!(
            Ok((&b" <a@b>"[..], "John Doe".to_owned())),
            phrase(b"John  Doe <a@b>")
        );
        assert_eq!(
            Ok((&b" <a@b>"[..], "Doe, John".to_owned())),
            phrase(b"\"Doe, John\" <a@b>")
        );
        assert_eq!(
            Ok((&b""[..], "John Q. Public".to_owned())),
            phrase(b"John Q. Public")
        );
        assert_eq!(
            Ok((&b""[..], "Keld Jørn Simonsen".to_owned())),
            phrase(b"=?ISO-8859-1?Q?Keld_J=F8rn?= =?ISO-8859-1?Q?_Simonsen?=")
        );
        assert_eq!(
            Ok((&b""[..], "Patrik Fältström".to_owned())),
            phrase(b"Patrik =?ISO-8859-1?Q?F=E4ltstr=F6m?=")
        );
        assert_eq!(
            Ok((&b""[..], "a b".to_owned())),
            phrase(b"a (comment) b")
        );
        assert!(phrase(b".dot").is_err());
        assert!(phrase(b"<a@b>").is_err());

        let (_, p) = parse_phrase(b"=?koi8-r?b?1MXT1A==?=", &policy()).unwrap();
        assert_eq!("тест", p.text);
        assert_eq!(Some("KOI8-R"), p.charset.as_deref());
    }

    #[test]
    fn test_dot_atom_and_domain() {
        assert_eq!(
            Ok((&b""[..], "1.0".to_owned())),
            parse_dot_atom(b" 1.0")
        );
        assert_eq!(
            Ok((&b"."[..], "a.b".to_owned())),
            parse_dot_atom(b"a.b.")
        );
        assert_eq!(
            Ok((&b""[..], "example.com.".to_owned())),
            parse_domain(b"example.com.")
        );
        assert_eq!(
            Ok((&b">"[..], "[10.0.0.1]".to_owned())),
            parse_domain(b"[10.0.0.1]>")
        );
    }

    #[test]
    fn test_obs_route() {
        assert_eq!(
            Ok((
                &b"user@c"[..],
                vec!["a.example".to_owned(), "b.example".to_owned()]
            )),
            parse_obs_route(b"@a.example, @b.example:user@c")
        );
        assert!(parse_obs_route(b"a.example:").is_err());
    }

    #[test]
    fn test_addr_spec() {
        assert_eq!(
            Ok((&b""[..], AddrSpec::new("john", "example.com"))),
            parse_addr_spec(b"john@example.com")
        );
        assert_eq!(
            Ok((&b""[..], AddrSpec::new("first.last", "example.com"))),
            parse_addr_spec(b"first . last @ example.com")
        );
        assert_eq!(
            Ok((&b""[..], AddrSpec::new("john doe", "example.com"))),
            parse_addr_spec(b"\"john doe\"@example.com")
        );
        assert!(parse_addr_spec(b"no-at-sign").is_err());
        assert!(parse_addr_spec(b"a@").is_err());
    }

    #[test]
    fn test_angle_addr() {
        assert_eq!(
            Ok((&b""[..], AddrSpec::new("john", "example.com"))),
            parse_angle_addr(b" < john@example.com >")
        );
        assert_eq!(
            Ok((&b""[..], AddrSpec::new("user", "c.example"))),
            parse_angle_addr(b"<@a.example,@b.example:user@c.example>")
        );
        assert!(parse_angle_addr(b"<john@example.com").is_err());
    }

    #[test]
    fn test_mailbox() {
        let mailbox = |s: &[u8]| parse_mailbox(s, &policy()).unwrap().1;

        let mb = mailbox(b"John Doe <john@example.com>");
        assert_eq!("John Doe", mb.name());
        assert_eq!("john", mb.addr_spec().local_part);
        assert_eq!("example.com", mb.addr_spec().domain);

        let mb = mailbox(b"jdoe@machine.example (John Doe)");
        assert_eq!("John Doe", mb.name());
        assert_eq!("jdoe@machine.example", mb.address());

        let mb = mailbox(b"<jdoe@machine.example> (John Doe)");
        assert_eq!("John Doe", mb.name());

        let mb = mailbox(b"Real Name <x@y.example> (not the name)");
        assert_eq!("Real Name", mb.name());

        let mb = mailbox(
            b"Pete(A wonderful \\) chap) \
              <pete(his account)@silly.test(his host)>",
        );
        assert_eq!("Pete", mb.name());
        assert_eq!("pete@silly.test", mb.address());

        let mb =
            mailbox(b"=?ISO-8859-1?Q?Andr=E9?= Pirard <PIRARD@vm1.ulg.ac.be>");
        assert_eq!("André Pirard", mb.name());

        assert!(parse_mailbox(b"", &policy()).is_err());
        assert!(parse_mailbox(b"Just A Name", &policy()).is_err());
    }

    #[test]
    fn test_address_list() {
        let (rest, list) = parse_address_list(
            b"A Group:Chris Jones <c@a.test>,joe@where.test,\
              John <jdoe@one.test>;, \
              Mary Smith <mary@x.test>, , undisclosed-recipients:;",
            &policy(),
        )
        .unwrap();
        assert!(rest.is_empty());
        assert_eq!(3, list.len());

        assert_eq!("A Group", list[0].display_name);
        assert_eq!(3, list[0].mailboxes.len());
        assert_eq!("Chris Jones", list[0].mailboxes[0].name());
        assert_eq!("joe@where.test", list[0].mailboxes[1].address());

        assert!(!list[1].is_group());
        assert_eq!("mary@x.test", list[1].mailboxes[0].address());

        assert_eq!("undisclosed-recipients", list[2].display_name);
        assert!(list[2].mailboxes.is_empty());

        let (_, list) =
            parse_address_list(b"a@x.test; b@x.test", &policy()).unwrap();
        assert_eq!(2, list.len());

        assert!(parse_address_list(b"<<<", &policy()).is_err());
    }

    #[test]
    fn test_parameter() {
        assert_eq!(
            Ok((
                &b"; x"[..],
                ("charset".to_owned(), ParamValue::Token(b"us-ascii".to_vec()))
            )),
            parse_parameter(b" Charset = us-ascii; x", &policy())
        );
        assert_eq!(
            Ok((
                &b""[..],
                ("name".to_owned(), ParamValue::Quoted(b"a b".to_vec()))
            )),
            parse_parameter(b"name*=\"a b\"", &policy())
        );
        assert_eq!(
            Ok((&b""[..], ("name".to_owned(), ParamValue::Empty))),
            parse_parameter(b"name*=", &policy())
        );
        assert!(parse_parameter(b"=value", &policy()).is_err());
    }

    #[test]
    fn test_parameter_list() {
        let params = |s: &[u8]| parse_parameter_list(s, &policy()).unwrap().1;

        let p = params(b"charset=\"iso-8859-1\"; format=flowed;; delsp=yes");
        assert_eq!(3, p.len());
        assert_eq!("iso-8859-1", p["charset"]);
        assert_eq!("flowed", p["format"]);

        let p = params(b"title*0=foo; title*1=bar");
        assert_eq!("foobar", p["title"]);

        let p = params(b"title*1=\" world\"; title*0=hello");
        assert_eq!("hello world", p["title"]);

        let p = params(
            b"url*0=\"a\";url*1=\"b\";url*2=\"c\";url*3=\"d\";url*4=\"e\";\
              url*5=\"f\";url*6=\"g\";url*7=\"h\";url*8=\"i\";url*9=\"j\";\
              url*10=\"k\"",
        );
        assert_eq!("abcdefghijk", p["url"]);

        let p = params(b"bad=\"unterminated; good=yes");
        assert!(!p.contains_key("bad"));
        let p = params(b"bad=@@@; good=yes");
        assert_eq!("yes", p["good"]);
    }

    #[test]
    fn test_rfc2231_parameters() {
        let (_, (p, cs)) = parse_parameter_list_with_charset(
            b"title*=us-ascii'en-us'This%20is%20%2A%2A%2Afun%2A%2A%2A",
            &policy(),
        )
        .unwrap();
        assert_eq!("This is ***fun***", p["title"]);
        assert_eq!(Some("US-ASCII"), cs.as_deref());

        let (_, (p, cs)) = parse_parameter_list_with_charset(
            b"title*0*=iso-8859-1'de'Gr%FC; title*1*=%DFe; title*2=\" aus\"",
            &policy(),
        )
        .unwrap();
        assert_eq!("Grüße aus", p["title"]);
        assert_eq!(Some("ISO-8859-1"), cs.as_deref());

        let (_, (p, _)) = parse_parameter_list_with_charset(
            b"filename=\"=?utf-8?B?w6TDtsO8LnR4dA==?=\"",
            &policy(),
        )
        .unwrap();
        assert_eq!("äöü.txt", p["filename"]);

        let forced = CharsetPolicy::new("iso-8859-1", true);
        let (_, (p, _)) = parse_parameter_list_with_charset(
            b"name*=utf-8''%C3%A9",
            &forced,
        )
        .unwrap();
        assert_eq!("Ã©", p["name"]);
    }

    #[test]
    fn test_digits() {
        assert_eq!(Ok((&b"x"[..], (42, 4))), parse_digits(b"0042x"));
        assert!(parse_digits(b"x").is_err());
    }

    #[test]
    fn test_time() {
        let (_, t) = parse_time(b"09:55:06 -0600").unwrap();
        assert_eq!((9, 55, 6), (t.hour, t.minute, t.second));
        assert_eq!(-6 * 3600, t.offset_secs);
        assert!(t.zone_known);

        let (_, t) = parse_time(b"09 : 55 +0000").unwrap();
        assert_eq!(0, t.second);
        assert!(t.zone_known);

        let (_, t) = parse_time(b"09:55:06 -0000").unwrap();
        assert!(!t.zone_known);

        let (_, t) = parse_time(b"09:55:06 EDT").unwrap();
        assert_eq!(-4 * 3600, t.offset_secs);

        let (_, t) = parse_time(b"09:55:06 XYZ").unwrap();
        assert!(!t.zone_known);
        assert_eq!(0, t.offset_secs);

        let (_, t) = parse_time(b"09:55").unwrap();
        assert!(!t.zone_known);

        assert!(parse_time(b"09:55:06 +06").is_err());
    }

    fn date(s: &str) -> Option<Timestamp> {
        parse_date_time(s.as_bytes()).ok().map(|(_, t)| t)
    }

    #[test]
    fn test_date_time() {
        let t = date("Fri, 21 Nov 1997 09:55:06 -0600").unwrap();
        assert_eq!("1997-11-21T09:55:06-06:00", t.date_time.to_rfc3339());
        assert!(t.zone_known);

        // Obsolete forms
        let t = date("21 Nov 97 09:55:06 GMT").unwrap();
        assert_eq!("1997-11-21T09:55:06+00:00", t.date_time.to_rfc3339());
        let t = date(
            "Thu,\r\n 13\r\n Feb\r\n 1969\r\n 23:32\r\n \
             -0330 (Newfoundland Time)",
        )
        .unwrap();
        assert_eq!("1969-02-13T23:32:00-03:30", t.date_time.to_rfc3339());
        let t = date("Friday, 1 January 2010 00:00:00 +0100").unwrap();
        assert_eq!("2010-01-01T00:00:00+01:00", t.date_time.to_rfc3339());
        let t = date("Wed Jun 30 21:49:08 1993").unwrap();
        assert_eq!("1993-06-30T21:49:08+00:00", t.date_time.to_rfc3339());
        assert!(!t.zone_known);
        let t = date("1 Jan 05 10:00 -0000").unwrap();
        assert_eq!(2005, t.date_time.year());
        assert!(!t.zone_known);

        assert_eq!(None, date("31 Feb 2000 10:00:00 +0000"));
        assert_eq!(None, date("Fri, 21 Nov 1997"));
        assert_eq!(None, date("garbage"));
    }

    #[test]
    fn test_extract_first_header() {
        let head = b"Subject: hello\n world\nFrom:a@b\r\nX-Empty:\n";

        let (h, rest) = extract_first_header(head).unwrap();
        assert_eq!("Subject", h.name);
        assert_eq!(b"hello world".to_vec(), h.value);

        let (h, rest) = extract_first_header(rest).unwrap();
        assert_eq!("From", h.name);
        assert_eq!(b"a@b".to_vec(), h.value);

        let (h, rest) = extract_first_header(rest).unwrap();
        assert_eq!("X-Empty", h.name);
        assert!(h.value.is_empty());

        assert!(extract_first_header(rest).is_none());

        let (h, _) = extract_first_header(b"junk\nTo: x@y\n").unwrap();
        assert_eq!("To", h.name);
    }

    #[test]
    fn test_extract_header_and_body() {
        assert_eq!(
            (&b"A: b\n"[..], &b"body\n\nmore"[..]),
            extract_header_and_body(b"A: b\n\nbody\n\nmore")
        );
        assert_eq!(
            (&b"A: b\r\n"[..], &b"body"[..]),
            extract_header_and_body(b"A: b\r\n\r\nbody")
        );
        assert_eq!(
            (&b""[..], &b"body"[..]),
            extract_header_and_body(b"\nbody")
        );
        assert_eq!(
            (&b"A: b\n"[..], &b""[..]),
            extract_header_and_body(b"A: b\n")
        );
    }

    proptest! {
        #[test]
        fn address_lists_never_panic(s in r#"[ -~\t\r\n]{0,80}"#) {
            let _ = parse_address_list(s.as_bytes(), &policy());
        }

        #[test]
        fn parameter_lists_never_panic(s in r#"[ -~]{0,80}"#) {
            let _ = parse_parameter_list(s.as_bytes(), &policy());
        }

        #[test]
        fn dates_never_panic(s in r#"[ -~]{0,60}"#) {
            let _ = parse_date_time(s.as_bytes());
        }

        #[test]
        fn simple_mailboxes_parse(
            name in "[A-Za-z]{1,10}( [A-Za-z]{1,10}){0,2}",
            local in "[a-z0-9]{1,10}",
            domain in "[a-z]{1,10}\\.[a-z]{2,4}",
        ) {
            let s = format!("{} <{}@{}>", name, local, domain);
            let (rest, mb) = parse_mailbox(s.as_bytes(), &policy()).unwrap();
            prop_assert!(rest.is_empty());
            prop_assert_eq!(name, mb.name());
            prop_assert_eq!(local, mb.addr_spec().local_part.clone());
            prop_assert_eq!(domain, mb.addr_spec().domain.clone());
        }
    }
}
