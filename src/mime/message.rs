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


//! Top-level messages and Usenet articles.

use std::ops::{Deref, DerefMut};

use log::debug;

use super::charset::CharsetPolicy;
use super::content::Content;
use super::headers::{Header, HeaderKind};
use super::model::Timestamp;

/// The fields a message places first in its head, in this order. Any `X-`
/// headers follow, then everything else.
static MESSAGE_ORDER: &[HeaderKind] = &[
    HeaderKind::MessageId,
    HeaderKind::From,
    HeaderKind::Subject,
    HeaderKind::To,
    HeaderKind::Cc,
    HeaderKind::ReplyTo,
    HeaderKind::Date,
    HeaderKind::References,
    HeaderKind::Organization,
    HeaderKind::UserAgent,
    HeaderKind::InReplyTo,
    HeaderKind::MimeVersion,
];

/// The fields an article places before those of `MESSAGE_ORDER`.
static ARTICLE_ORDER: &[HeaderKind] = &[
    HeaderKind::Control,
    HeaderKind::Supersedes,
    HeaderKind::Newsgroups,
    HeaderKind::FollowUpTo,
    HeaderKind::MailCopiesTo,
    HeaderKind::Lines,
];

macro_rules! header_accessors {
    ($($name:ident => $kind:ident,)*) => {
        $(
            pub fn $name(&self) -> Option<&Header> {
                self.header_by_type(HeaderKind::$kind.name())
            }
        )*
    };
}

/// An RFC 2822 message: a root content that guarantees its mandatory
/// headers when assembled.
#[derive(Clone, Debug, Default)]
pub struct Message {
    content: Content,
}

impl Deref for Message {
    type Target = Content;

    fn deref(&self) -> &Content {
        &self.content
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut Content {
        &mut self.content
    }
}

impl From<Content> for Message {
    fn from(content: Content) -> Self {
        Message { content }
    }
}

impl Message {
    pub fn new() -> Self {
        Message::default()
    }

    pub fn with_policy(policy: CharsetPolicy) -> Self {
        Message {
            content: Content::with_policy(policy),
        }
    }

    /// Create a message from raw bytes and parse it.
    pub fn parse_bytes(raw: &[u8]) -> Self {
        let mut message = Message::new();
        message.set_content(raw);
        message.parse();
        message
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    header_accessors! {
        from => From,
        sender => Sender,
        to => To,
        cc => Cc,
        bcc => Bcc,
        reply_to => ReplyTo,
        subject => Subject,
        date => Date,
        message_id => MessageId,
        references => References,
        in_reply_to => InReplyTo,
        organization => Organization,
        user_agent => UserAgent,
    }

    /// Regenerate the head, and recursively those of all parts.
    ///
    /// Missing `Date` and `MIME-Version` headers are filled in, and the
    /// well-known headers are placed first in their conventional order.
    pub fn assemble(&mut self) {
        if self.is_frozen() {
            return;
        }

        self.ensure_mandatory_headers();
        let head = self.assemble_headers(MESSAGE_ORDER);
        self.replace_head(head);
        self.assemble_contents();
    }

    fn ensure_mandatory_headers(&mut self) {
        let date = self.header_or_insert(HeaderKind::Date);
        if date.is_empty() {
            debug!("Message has no date, using the current time");
            date.set_date_time(Timestamp::now());
        }

        let version = self.header_or_insert(HeaderKind::MimeVersion);
        if version.is_empty() {
            version.from_7bit_string(b"1.0");
        }

        self.header_or_insert(HeaderKind::From);
        self.header_or_insert(HeaderKind::Subject);
    }

    /// Find the part holding the main body.
    ///
    /// Descends through the first part of each multipart. At a
    /// `multipart/alternative`, returns the alternative of type `mime_type`
    /// (or the first alternative if `mime_type` is `None`). Otherwise, the
    /// first single part reached is returned if it is of type `mime_type`
    /// or `mime_type` is `None`.
    pub fn main_body_part(&self, mime_type: Option<&str>) -> Option<&Content> {
        let is_wanted = |content: &Content| {
            mime_type.map_or(true, |wanted| {
                let content_type = content.content_type();
                content_type.is_mime_type(wanted)
                    || (content_type.is_empty()
                        && wanted.eq_ignore_ascii_case("text/plain"))
            })
        };

        let mut content: &Content = self;
        loop {
            if !content.content_type().is_multipart() {
                return Some(content).filter(|&c| is_wanted(c));
            }

            let children = content.contents();
            let first = *children.first()?;
            if content.content_type().is_sub_type("alternative") {
                return children.into_iter().find(|&c| is_wanted(c));
            }

            content = first;
        }
    }
}

/// A Usenet article: a message with the additional news headers.
#[derive(Clone, Debug, Default)]
pub struct NewsArticle {
    message: Message,
}

impl Deref for NewsArticle {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for NewsArticle {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl NewsArticle {
    pub fn new() -> Self {
        NewsArticle::default()
    }

    pub fn parse_bytes(raw: &[u8]) -> Self {
        NewsArticle {
            message: Message::parse_bytes(raw),
        }
    }

    header_accessors! {
        control => Control,
        supersedes => Supersedes,
        mail_copies_to => MailCopiesTo,
        newsgroups => Newsgroups,
        followup_to => FollowUpTo,
        lines => Lines,
    }

    /// Like `Message::assemble`, but also fills in `Lines` if missing and
    /// places the news headers first.
    pub fn assemble(&mut self) {
        if self.is_frozen() {
            return;
        }

        self.message.ensure_mandatory_headers();
        if self.lines().map_or(true, Header::is_empty) {
            let lines = self.line_count() as u32;
            self.header_or_insert(HeaderKind::Lines)
                .set_number_of_lines(lines);
        }

        let order: Vec<HeaderKind> = ARTICLE_ORDER
            .iter()
            .chain(MESSAGE_ORDER)
            .cloned()
            .collect();
        let head = self.assemble_headers(&order);
        self.replace_head(head);
        self.assemble_contents();
    }
}

/// Whether `content` is part of the machinery of a signed or encrypted
/// message rather than something the user attached.
pub fn is_crypto_part(content: &Content) -> bool {
    if !content.has_header("Content-Type") {
        return false;
    }

    let content_type = content.content_type();
    if !content_type.is_media_type("application") {
        return false;
    }

    match content_type.sub_type() {
        "pgp-encrypted"
        | "pgp-signature"
        | "pkcs7-mime"
        | "pkcs7-signature"
        | "x-pkcs7-signature" => true,
        "octet-stream" => {
            content.has_header("Content-Disposition")
                && content
                    .content_disposition()
                    .filename()
                    .map_or(false, |f| f.eq_ignore_ascii_case("msg.asc"))
        }
        _ => false,
    }
}

/// Whether `content` is, or contains, a named part that isn't a crypto
/// part.
pub fn has_attachment(content: &Content) -> bool {
    let named = content
        .content_disposition()
        .filename()
        .or_else(|| content.content_type().name())
        .map_or(false, |name| !name.is_empty());
    if named && !is_crypto_part(content) {
        return true;
    }

    content.content_type().is_multipart()
        && content.contents().into_iter().any(has_attachment)
}

pub fn is_signed(message: &Message) -> bool {
    let content_type = message.content_type();
    ["signed", "pgp-signature", "pkcs7-signature", "x-pkcs7-signature"]
        .iter()
        .any(|sub_type| content_type.is_sub_type(sub_type))
        || [
            "multipart/signed",
            "application/pgp-signature",
            "application/pkcs7-signature",
            "application/x-pkcs7-signature",
        ]
        .iter()
        .any(|&t| message.main_body_part(Some(t)).is_some())
}

pub fn is_encrypted(message: &Message) -> bool {
    let content_type = message.content_type();
    ["encrypted", "pgp-encrypted", "pkcs7-mime"]
        .iter()
        .any(|sub_type| content_type.is_sub_type(sub_type))
        || [
            "multipart/encrypted",
            "application/pgp-encrypted",
            "application/pkcs7-mime",
        ]
        .iter()
        .any(|&t| message.main_body_part(Some(t)).is_some())
}

/// Whether `content` is an iCalendar invitation.
pub fn is_invitation(content: &Content) -> bool {
    content.has_header("Content-Type")
        && content.content_type().is_mime_type("text/calendar")
}
