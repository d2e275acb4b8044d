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

use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use super::error::Error;

/// Process-wide options that influence how header values are encoded and
/// decoded.
///
/// This can be stored in a TOML file:
///
/// ```toml
/// fallback_charset = "windows-1252"
/// outlook_attachment_encoding = true
/// application_name = "newsreader"
/// product_id = "-//Example//Newsreader 1.0//EN"
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Charset used to re-decode encoded words whose declared charset
    /// produced replacement characters.
    ///
    /// An empty string disables the fallback.
    pub fallback_charset: String,

    /// If true, non-ASCII parameter values (such as attachment file names)
    /// are written as quoted RFC 2047 encoded words instead of RFC 2231
    /// extended parameters.
    ///
    /// This is wrong according to the standards, but it is the only form
    /// Outlook understands.
    pub outlook_attachment_encoding: bool,

    /// Mixed into generated unique identifiers and boundaries.
    pub application_name: String,

    /// Mixed into generated unique identifiers and boundaries.
    pub product_id: String,
}

lazy_static! {
    static ref CURRENT: RwLock<Settings> = RwLock::new(Settings::default());
}

fn read() -> RwLockReadGuard<'static, Settings> {
    CURRENT.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write() -> RwLockWriteGuard<'static, Settings> {
    CURRENT.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Return a copy of the process-wide settings.
    pub fn current() -> Self {
        read().clone()
    }

    /// Replace the process-wide settings with `self`.
    pub fn install(self) {
        *write() = self;
    }
}

pub fn fallback_charset() -> String {
    read().fallback_charset.clone()
}

pub fn set_fallback_charset(charset: &str) {
    write().fallback_charset = charset.to_owned();
}

pub fn use_outlook_attachment_encoding() -> bool {
    read().outlook_attachment_encoding
}

pub fn set_use_outlook_attachment_encoding(enable: bool) {
    write().outlook_attachment_encoding = enable;
}

/// Return the `(application name, product id)` seed pair.
pub fn unique_id_seed() -> (String, String) {
    let settings = read();
    (
        settings.application_name.clone(),
        settings.product_id.clone(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_settings() {
        let settings = Settings::from_toml(
            r#"
fallback_charset = "windows-1252"
outlook_attachment_encoding = true
"#,
        )
        .unwrap();

        assert_eq!("windows-1252", settings.fallback_charset);
        assert!(settings.outlook_attachment_encoding);
        assert_eq!("", settings.application_name);
    }

    #[test]
    fn empty_settings_are_default() {
        assert_eq!(Settings::default(), Settings::from_toml("").unwrap());
    }

    #[test]
    fn malformed_settings_rejected() {
        assert_matches!(
            Err(Error::Toml(..)),
            Settings::from_toml("outlook_attachment_encoding = 42")
        );
    }
}
