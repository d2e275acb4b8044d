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


use std::fmt;
use std::str::FromStr;

/// The position of a part within a content tree, as the 1-based index of
/// each child along the path from the root (IMAP-style `1.2.3`).
///
/// The empty index refers to the root itself and is not "valid".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentIndex(Vec<u32>);

impl ContentIndex {
    pub fn new() -> Self {
        ContentIndex::default()
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Remove and return the outermost (first) index.
    pub fn pop(&mut self) -> Option<u32> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// Prepend an outer index.
    pub fn push(&mut self, index: u32) {
        self.0.insert(0, index);
    }

    /// Remove and return the innermost (last) index, moving the index up
    /// to the parent part.
    pub fn up(&mut self) -> Option<u32> {
        self.0.pop()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for ContentIndex {
    fn from(indices: Vec<u32>) -> Self {
        ContentIndex(indices)
    }
}

impl FromStr for ContentIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(ContentIndex::default());
        }

        s.split('.')
            .map(str::parse)
            .collect::<Result<Vec<u32>, _>>()
            .map(ContentIndex)
    }
}

impl fmt::Display for ContentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, index) in self.0.iter().enumerate() {
            if ix > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_format() {
        let ix: ContentIndex = "2.1".parse().unwrap();
        assert!(ix.is_valid());
        assert_eq!("2.1", ix.to_string());
        assert_eq!(&[2, 1], ix.as_slice());

        let root: ContentIndex = "".parse().unwrap();
        assert!(!root.is_valid());
        assert_eq!("", root.to_string());

        assert!("1..2".parse::<ContentIndex>().is_err());
        assert!("1.x".parse::<ContentIndex>().is_err());
    }

    #[test]
    fn push_pop_up() {
        let mut ix: ContentIndex = "2.1".parse().unwrap();
        assert_eq!(Some(2), ix.pop());
        assert_eq!("1".parse::<ContentIndex>().unwrap(), ix);

        ix.push(3);
        ix.push(4);
        assert_eq!("4.3.1", ix.to_string());
        assert_eq!(Some(1), ix.up());
        assert_eq!("4.3", ix.to_string());

        let mut root = ContentIndex::new();
        assert_eq!(None, root.pop());
        assert_eq!(None, root.up());
    }
}
