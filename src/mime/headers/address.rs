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


//! Headers carrying addresses or message identifiers.

use log::warn;

use super::super::charset::CharsetPolicy;
use super::super::encoded_word::encode_rfc2047_string;
use super::super::header_parsing::{
    eat_cfws, parse_address_list, parse_angle_addr, parse_dot_atom,
    parse_mailbox,
};
use super::super::model::{AddrSpec, Address, Mailbox};
use super::super::util::add_quotes;

/// Parse an address list for a header that only allows mailboxes.
///
/// Groups are flattened into their members with a warning. If `single` is
/// set, more than one mailbox also draws a warning, but all are kept.
pub(super) fn parse_mailbox_list(
    raw: &[u8],
    policy: &CharsetPolicy,
    single: bool,
) -> Option<Vec<Mailbox>> {
    let (_, addresses) = parse_address_list(raw, policy).ok()?;

    let mut mailboxes = Vec::new();
    for address in addresses {
        if address.is_group() {
            warn!(
                "Mailbox group {:?} in header disallowing them",
                address.display_name
            );
        }
        mailboxes.extend(address.mailboxes);
    }

    if single && mailboxes.len() > 1 {
        warn!("Multiple mailboxes in header allowing only a single one");
    }
    Some(mailboxes)
}

pub(super) fn mailboxes_as_7bit_string(
    mailboxes: &[Mailbox],
    charset: &str,
) -> String {
    mailboxes
        .iter()
        .map(|mb| mb.as_7bit_string(charset))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) fn addresses_as_7bit_string(
    addresses: &[Address],
    charset: &str,
) -> String {
    addresses
        .iter()
        .map(|address| {
            if !address.is_group() {
                return mailboxes_as_7bit_string(&address.mailboxes, charset);
            }

            let name = if address.display_name.is_ascii() {
                add_quotes(&address.display_name, false)
            } else {
                encode_rfc2047_string(&address.display_name, charset, true)
            };
            format!(
                "{}: {};",
                name,
                mailboxes_as_7bit_string(&address.mailboxes, charset)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// Almost an angle-addr: `<` dot-atom `>`, as some agents generate for
// Content-ID.
fn parse_loose_ident(i: &[u8]) -> Option<(&[u8], AddrSpec)> {
    let i = eat_cfws(i);
    let i = i.strip_prefix(b"<")?;
    let (i, id) = parse_dot_atom(i).ok()?;
    let i = eat_cfws(i).strip_prefix(b">")?;
    Some((i, AddrSpec::new(id, "")))
}

/// Parse a list of message identifiers (`<left@right>`), optionally
/// separated by commas.
///
/// If `loose` is set and the strict grammar fails, identifiers without an
/// `@` are accepted too.
pub(super) fn parse_ident_list(
    raw: &[u8],
    loose: bool,
) -> Option<Vec<AddrSpec>> {
    fn parse_with(
        raw: &[u8],
        item: impl Fn(&[u8]) -> Option<(&[u8], AddrSpec)>,
    ) -> Option<Vec<AddrSpec>> {
        let mut ids = Vec::new();
        let mut i = raw;
        loop {
            i = eat_cfws(i);
            match i.first() {
                None => return Some(ids),
                Some(b',') => i = &i[1..],
                Some(_) => {
                    let (rest, id) = item(i)?;
                    ids.push(id);
                    i = rest;
                }
            }
        }
    }

    parse_with(raw, |i| parse_angle_addr(i).ok()).or_else(|| {
        if loose {
            parse_with(raw, parse_loose_ident)
        } else {
            None
        }
    })
}

pub(super) fn idents_as_7bit_string(ids: &[AddrSpec]) -> String {
    ids.iter()
        .filter(|id| !id.is_empty())
        .map(|id| format!("<{}>", id.as_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse `Return-Path`, which is an angle-addr that may be empty (`<>`).
pub(super) fn parse_return_path(
    raw: &[u8],
    policy: &CharsetPolicy,
) -> Option<Mailbox> {
    let i = eat_cfws(raw);
    if i.is_empty() {
        return None;
    }

    let (rest, mailbox) = match parse_mailbox(i, policy) {
        Ok((rest, mailbox)) => {
            if mailbox.has_name() {
                warn!("Display name {:?} in Return-Path", mailbox.name());
            }
            (rest, mailbox)
        }
        Err(_) => {
            let rest = eat_cfws(i.strip_prefix(b"<")?).strip_prefix(b">")?;
            (rest, Mailbox::default())
        }
    };

    if !eat_cfws(rest).is_empty() {
        warn!("Trailing garbage after angle-addr in Return-Path");
    }
    Some(mailbox)
}

/// The value of a `Mail-Copies-To` header: either explicit addresses, or
/// one of the keywords saying whether copies are wanted at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailCopiesTo {
    pub addresses: Vec<Address>,
    always: bool,
    never: bool,
}

impl MailCopiesTo {
    pub(super) fn parse(raw: &[u8], policy: &CharsetPolicy) -> Option<Self> {
        let keyword = String::from_utf8_lossy(raw);
        let keyword = keyword.trim();
        let mut this = MailCopiesTo::default();

        if keyword.eq_ignore_ascii_case("never")
            || keyword.eq_ignore_ascii_case("nobody")
        {
            this.never = true;
        } else if keyword.eq_ignore_ascii_case("always")
            || keyword.eq_ignore_ascii_case("poster")
        {
            this.always = true;
        } else {
            this.addresses = parse_address_list(raw, policy).ok()?.1;
        }

        Some(this)
    }

    pub(super) fn as_7bit_string(&self, charset: &str) -> String {
        if !self.addresses.is_empty() {
            addresses_as_7bit_string(&self.addresses, charset)
        } else if self.always {
            "poster".to_owned()
        } else if self.never {
            "nobody".to_owned()
        } else {
            String::new()
        }
    }

    /// Whether copies are wanted, either by keyword or because explicit
    /// addresses were given.
    pub fn always_copy(&self) -> bool {
        self.always || !self.addresses.is_empty()
    }

    pub fn set_always_copy(&mut self) {
        *self = MailCopiesTo::default();
        self.always = true;
    }

    pub fn never_copy(&self) -> bool {
        self.never
    }

    pub fn set_never_copy(&mut self) {
        *self = MailCopiesTo::default();
        self.never = true;
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && !self.always && !self.never
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn policy() -> CharsetPolicy {
        CharsetPolicy::new("utf-8", false)
    }

    #[test]
    fn mailbox_lists_flatten_groups() {
        let mailboxes = parse_mailbox_list(
            b"Friends: a@x.test, b@x.test;, Carol <c@x.test>",
            &policy(),
            false,
        )
        .unwrap();
        assert_eq!(
            vec!["a@x.test", "b@x.test", "c@x.test"],
            mailboxes.iter().map(Mailbox::address).collect::<Vec<_>>()
        );

        assert!(parse_mailbox_list(b"not an address", &policy(), true)
            .is_none());
    }

    #[test]
    fn address_serialisation() {
        let (_, addresses) = parse_address_list(
            b"\"Doe, Jane\" <jane@x.test>, Team: a@x.test, Bob <b@x.test>;",
            &policy(),
        )
        .unwrap();
        assert_eq!(
            "\"Doe, Jane\" <jane@x.test>, Team: a@x.test, Bob <b@x.test>;",
            addresses_as_7bit_string(&addresses, "utf-8")
        );
    }

    #[test]
    fn ident_lists() {
        let ids = parse_ident_list(
            b"<a@x.test>\n <b.c@y.test>,<d@[127.0.0.1]>",
            false,
        )
        .unwrap();
        assert_eq!(3, ids.len());
        assert_eq!("b.c", ids[1].local_part);
        assert_eq!(
            "<a@x.test> <b.c@y.test> <d@[127.0.0.1]>",
            idents_as_7bit_string(&ids)
        );

        assert!(parse_ident_list(b"<part1.abc>", false).is_none());
        let ids = parse_ident_list(b"<part1.abc>", true).unwrap();
        assert_eq!("part1.abc", ids[0].as_string());
        assert_eq!("<part1.abc>", idents_as_7bit_string(&ids));

        assert_eq!(Some(vec![]), parse_ident_list(b"", false));
    }

    #[test]
    fn return_path() {
        let mb = parse_return_path(b"<bounce@x.test>", &policy()).unwrap();
        assert_eq!("bounce@x.test", mb.address());

        let mb = parse_return_path(b" < > ", &policy()).unwrap();
        assert!(!mb.has_address());

        assert!(parse_return_path(b"", &policy()).is_none());
        assert!(parse_return_path(b"<", &policy()).is_none());
    }

    #[test]
    fn mail_copies_to() {
        let mct = MailCopiesTo::parse(b"Poster", &policy()).unwrap();
        assert!(mct.always_copy());
        assert!(!mct.never_copy());
        assert_eq!("poster", mct.as_7bit_string("utf-8"));

        let mct = MailCopiesTo::parse(b"never", &policy()).unwrap();
        assert!(mct.never_copy());
        assert_eq!("nobody", mct.as_7bit_string("utf-8"));

        let mut mct =
            MailCopiesTo::parse(b"me <me@x.test>", &policy()).unwrap();
        assert!(mct.always_copy());
        assert_eq!("me <me@x.test>", mct.as_7bit_string("utf-8"));

        mct.set_never_copy();
        assert!(mct.addresses.is_empty());
        assert!(!mct.always_copy());
        assert!(MailCopiesTo::default().is_empty());
    }
}
