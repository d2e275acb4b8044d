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


//! Parsing and assembly of MIME messages and Usenet articles.
//!
//! A raw message is parsed into a tree of `Content` nodes: a head with its
//! typed headers, and either a body, a list of parts, or an encapsulated
//! message. The tree can be inspected, modified and serialised again with
//! the appropriate transfer encodings applied.
//!
//! Parsing never fails. Malformed input degrades to whatever structure can
//! be recovered, with the problems reported through the `log` crate.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod codec;
pub mod mime;
pub mod support;

pub use crate::mime::char_freq::{CharFreq, CharFreqType};
pub use crate::mime::charset::CharsetPolicy;
pub use crate::mime::content::Content;
pub use crate::mime::content_index::ContentIndex;
pub use crate::mime::headers::{Header, HeaderKind, HeaderValue};
pub use crate::mime::message::{
    has_attachment, is_crypto_part, is_encrypted, is_invitation, is_signed,
    Message, NewsArticle,
};
pub use crate::mime::model::{
    AddrSpec, Address, ContentCategory, DispositionType, Mailbox,
    TransferEncoding,
};
pub use crate::support::error::Error;
pub use crate::support::settings::Settings;
