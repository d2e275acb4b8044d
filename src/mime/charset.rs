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

//! Charset lookup, conversion, and interning.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use encoding_rs::{Encoding, UTF_8};
use lazy_static::lazy_static;
use log::debug;

/// The charset assumed for raw 8-bit header text when nothing better is
/// known.
pub const DEFAULT_CHARSET: &str = "ISO-8859-1";

/// An append-only table of upper-cased names, so that the many headers and
/// parts referring to the same charset can share one allocation.
#[derive(Debug, Default)]
pub struct CharsetCache {
    names: Mutex<HashSet<Arc<str>>>,
}

impl CharsetCache {
    pub fn new() -> Self {
        CharsetCache::default()
    }

    /// Return the interned, upper-cased form of `name`.
    pub fn intern(&self, name: &str) -> Arc<str> {
        let upper = name.trim().to_ascii_uppercase();
        let mut names = self
            .names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = names.get(upper.as_str()) {
            return Arc::clone(existing);
        }

        let interned: Arc<str> = Arc::from(upper);
        names.insert(Arc::clone(&interned));
        interned
    }

    pub fn len(&self) -> usize {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }
}

lazy_static! {
    static ref CHARSETS: CharsetCache = CharsetCache::new();
    static ref LANGUAGES: CharsetCache = CharsetCache::new();
}

/// Intern a charset name in the process-wide cache.
pub fn cached_charset(name: &str) -> Arc<str> {
    CHARSETS.intern(name)
}

/// Intern a language tag in the process-wide cache.
pub fn cached_language(name: &str) -> Arc<str> {
    LANGUAGES.intern(name)
}

/// The charset to use for a header or part: the default charset, the
/// "force" flag that makes it override whatever the data declares, or both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharsetPolicy {
    pub default_charset: Arc<str>,
    pub force_default: bool,
}

impl Default for CharsetPolicy {
    fn default() -> Self {
        CharsetPolicy {
            default_charset: cached_charset(DEFAULT_CHARSET),
            force_default: false,
        }
    }
}

impl CharsetPolicy {
    pub fn new(default_charset: &str, force_default: bool) -> Self {
        CharsetPolicy {
            default_charset: cached_charset(default_charset),
            force_default,
        }
    }

    /// Choose between a declared charset and the default.
    pub fn resolve(&self, declared: Option<&str>) -> Arc<str> {
        match declared {
            Some(declared) if !self.force_default && !declared.is_empty() => {
                cached_charset(declared)
            }
            _ => Arc::clone(&self.default_charset),
        }
    }
}

fn is_us_ascii_label(charset: &str) -> bool {
    charset.eq_ignore_ascii_case("us-ascii")
        || charset.eq_ignore_ascii_case("ascii")
        || charset.eq_ignore_ascii_case("ansi_x3.4-1968")
}

/// Find the converter for `charset`, if it is one we know.
pub fn encoding_for(charset: &str) -> Option<&'static Encoding> {
    let encoding =
        Encoding::for_label_no_replacement(charset.trim().as_bytes());
    if encoding.is_none() {
        debug!("Unknown charset {:?}", charset);
    }
    encoding
}

pub fn is_known(charset: &str) -> bool {
    encoding_for(charset).is_some()
}

/// Decode `bytes` from `charset`, returning `None` if the charset is
/// unknown.
pub fn decode<'a>(charset: &str, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    Some(encoding_for(charset)?.decode_with_bom_removal(bytes).0)
}

/// Decode raw header bytes: UTF-8 if they are valid UTF-8, otherwise the
/// given charset, otherwise Latin-1.
pub fn decode_raw<'a>(bytes: &'a [u8], charset: &str) -> Cow<'a, str> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(s);
    }

    decode(charset, bytes).unwrap_or_else(|| {
        Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
    })
}

/// Encode `text` in `charset`.
///
/// Returns `None` if the charset is unknown or cannot represent `text`.
pub fn encode(charset: &str, text: &str) -> Option<Vec<u8>> {
    if is_us_ascii_label(charset) {
        return if text.is_ascii() {
            Some(text.as_bytes().to_vec())
        } else {
            None
        };
    }

    let encoding = encoding_for(charset)?;
    let (encoded, actual, had_errors) = encoding.encode(text);
    if had_errors || actual != encoding {
        None
    } else {
        Some(encoded.into_owned())
    }
}

/// Encode `text` in `charset` if possible, otherwise in UTF-8.
///
/// Returns the bytes and the name of the charset actually used.
pub fn encode_or_utf8(charset: &str, text: &str) -> (Vec<u8>, Arc<str>) {
    match encode(charset, text) {
        Some(bytes) => (bytes, cached_charset(charset)),
        None => (text.as_bytes().to_vec(), cached_charset(UTF_8.name())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_shares_allocations() {
        let cache = CharsetCache::new();
        let a = cache.intern("iso-8859-1");
        let b = cache.intern("ISO-8859-1");
        assert_eq!("ISO-8859-1", &*a);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(1, cache.len());
    }

    #[test]
    fn policy_resolution() {
        let policy = CharsetPolicy::new("utf-8", false);
        assert_eq!("KOI8-R", &*policy.resolve(Some("koi8-r")));
        assert_eq!("UTF-8", &*policy.resolve(None));

        let forced = CharsetPolicy::new("utf-8", true);
        assert_eq!("UTF-8", &*forced.resolve(Some("koi8-r")));
    }

    #[test]
    fn conversions() {
        assert_eq!(
            "Klöcker",
            decode("iso-8859-15", b"Kl\xf6cker").unwrap()
        );
        assert!(decode("x-no-such-charset", b"x").is_none());

        assert_eq!("grüß", decode_raw("grüß".as_bytes(), "koi8-r"));
        assert_eq!("Kl\u{f6}cker", decode_raw(b"Kl\xf6cker", "iso-8859-1"));

        assert_eq!(
            Some(b"Kl\xf6cker".to_vec()),
            encode("ISO-8859-1", "Klöcker")
        );
        assert_eq!(None, encode("us-ascii", "Klöcker"));
        assert_eq!(None, encode("iso-8859-1", "日本"));

        let (bytes, used) = encode_or_utf8("iso-8859-1", "日本");
        assert_eq!("日本".as_bytes(), &bytes[..]);
        assert_eq!("UTF-8", &*used);
    }
}
