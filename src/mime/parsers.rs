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


//! Splitting of raw bodies: MIME multipart, and the uuencode and yEnc
//! formats that pre-MIME Usenet software embeds in plain text.

use lazy_static::lazy_static;
use log::debug;
use memchr::memchr;
use regex::bytes::Regex;

use crate::codec::{Codec, UuCodec};

lazy_static! {
    static ref UU_BEGIN: Regex = Regex::new(r"(?m)^begin [0-9]{3}").unwrap();
    static ref PART_OF: Regex = Regex::new(r"([0-9]+)/([0-9]+)").unwrap();
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }

    let mut pos = from;
    while let Some(ix) = memchr(needle[0], &haystack[pos..]) {
        let start = pos + ix;
        if haystack[start..].starts_with(needle) {
            return Some(start);
        }
        pos = start + 1;
    }
    None
}

// Drop the line break (LF or CRLF) that belongs to a following delimiter.
fn strip_line_break(s: &[u8]) -> &[u8] {
    let s = s.strip_suffix(b"\n").unwrap_or(s);
    s.strip_suffix(b"\r").unwrap_or(s)
}

/// A multipart body split at its boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartSplit<'a> {
    pub preamble: &'a [u8],
    pub parts: Vec<&'a [u8]>,
    pub epilogue: &'a [u8],
}

/// Split a multipart body at lines of the form `--boundary`.
///
/// Boundary delimiters are only recognised at the start of a line. The line
/// break (LF or CRLF) before a delimiter belongs to the delimiter. If the
/// closing `--boundary--` is missing, everything after the last delimiter is
/// the last part.
///
/// Returns `None` if there are no parts at all.
pub fn split_multipart<'a>(
    src: &'a [u8],
    boundary: &[u8],
) -> Option<MultipartSplit<'a>> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary);

    let at_line_start = |pos: usize| 0 == pos || b'\n' == src[pos - 1];
    let next_delimiter = |mut from: usize| loop {
        let pos = find(src, &delimiter, from)?;
        if at_line_start(pos) {
            return Some(pos);
        }
        from = pos + delimiter.len();
    };

    let mut split = MultipartSplit {
        preamble: &[],
        parts: Vec::new(),
        epilogue: &[],
    };

    let first = next_delimiter(0)?;
    let mut cursor = first + delimiter.len();
    if src[cursor..].starts_with(b"--") {
        debug!("Multipart body has nothing but a closing delimiter");
        return None;
    }
    split.preamble = strip_line_break(&src[..first]);

    loop {
        // The part starts on the line after the delimiter
        let part_start = match memchr(b'\n', &src[cursor..]) {
            Some(nl) => cursor + nl + 1,
            None => break,
        };

        let part_end = match next_delimiter(part_start) {
            Some(part_end) => part_end,
            None => {
                debug!("Multipart body lacks closing delimiter");
                if part_start < src.len() {
                    split.parts.push(&src[part_start..]);
                }
                break;
            }
        };

        split
            .parts
            .push(strip_line_break(&src[part_start..part_end]));
        cursor = part_end + delimiter.len();
        if src[cursor..].starts_with(b"--") {
            if let Some(nl) = memchr(b'\n', &src[cursor..]) {
                split.epilogue = &src[cursor + nl + 1..];
            }
            break;
        }
    }

    if split.parts.is_empty() {
        None
    } else {
        Some(split)
    }
}

/// One binary attachment recovered from a uuencoded or yEnc article.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryPart {
    pub filename: String,
    pub mime_type: &'static str,
    /// The decoded data.
    pub data: Vec<u8>,
}

/// The position of a fragment within an article split over several posts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialInfo {
    pub number: u32,
    pub total: u32,
}

/// A plain-text article with embedded binaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedArticle {
    /// The text surrounding the binaries.
    pub text: Vec<u8>,
    pub binaries: Vec<BinaryPart>,
    /// Set if the article is one fragment of a larger whole.
    pub partial: Option<PartialInfo>,
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let extension = match filename.rfind('.') {
        Some(dot) => filename[dot + 1..].to_ascii_uppercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "JPG" | "JPEG" => "image/jpeg",
        "GIF" => "image/gif",
        "PNG" => "image/png",
        "TIFF" | "TIF" => "image/tiff",
        "XPM" => "image/x-xpixmap",
        "XBM" => "image/x-xbitmap",
        "BMP" => "image/bmp",
        "TXT" | "ASC" | "H" | "C" | "CC" | "CPP" => "text/plain",
        "HTML" | "HTM" => "text/html",
        _ => "application/octet-stream",
    }
}

fn part_of_subject(subject: &[u8]) -> Option<PartialInfo> {
    let captures = PART_OF.captures(subject)?;
    let number = |ix: usize| {
        std::str::from_utf8(captures.get(ix)?.as_bytes())
            .ok()?
            .parse::<u32>()
            .ok()
    };
    Some(PartialInfo {
        number: number(1)?,
        total: number(2)?,
    })
}

/// Find uuencoded files in a plain-text body.
///
/// A block is recognised by its `begin NNN name` and `end` lines, and by
/// most of its lines starting with `M` (the length byte of a full line).
/// The very first block may lack its `begin` or `end` line if the article
/// is a fragment, in which case the fragment number is taken from an `N/M`
/// in `subject`.
pub fn parse_uuencoded(src: &[u8], subject: &[u8]) -> Option<EncodedArticle> {
    let mut article = EncodedArticle::default();
    let mut current = 0;
    let mut first_block = true;

    loop {
        let (begin_pos, uu_start, has_begin) =
            match UU_BEGIN.find_at(src, current) {
                Some(m) => match memchr(b'\n', &src[m.start()..]) {
                    Some(nl) => (m.start(), m.start() + nl + 1, true),
                    None => break,
                },
                None => (current, current, false),
            };

        let (end_pos, has_end) =
            match find(src, b"\nend", uu_start.saturating_sub(1)) {
                Some(end_pos) => (end_pos, true),
                None => (src.len(), false),
            };

        if !(has_begin && has_end) && !first_block {
            break;
        }

        let mut line_count = 0;
        let mut m_count = 0;
        let mut ix = uu_start;
        while ix < end_pos {
            if b'\n' == src[ix] {
                line_count += 1;
                if ix + 1 < end_pos && b'M' == src[ix + 1] {
                    ix += 1;
                    m_count += 1;
                }
            }
            ix += 1;
        }

        let complete = has_begin && has_end;
        if 0 == m_count
            || line_count - m_count > 10
            || (!complete && m_count < 15)
        {
            break;
        }

        if !complete {
            match part_of_subject(subject) {
                Some(partial) => article.partial = Some(partial),
                None => {
                    debug!("Fragmentary uuencoded block without N/M subject");
                    break;
                }
            }
        }

        article.text.extend_from_slice(&src[current..begin_pos]);

        let filename = if has_begin {
            let line = &src[(begin_pos + 10).min(uu_start - 1)..uu_start - 1];
            String::from_utf8_lossy(line).trim_end().to_owned()
        } else {
            String::new()
        };
        let encoded = &src[uu_start..(end_pos + 1).min(src.len())];
        article.binaries.push(BinaryPart {
            mime_type: guess_mime_type(&filename),
            filename,
            data: UuCodec.decode(encoded, false),
        });
        first_block = false;

        match find(src, b"\n", end_pos + 1) {
            Some(nl) => current = nl + 1,
            None => break,
        }
    }

    article.text.extend_from_slice(&src[current..]);

    let is_partial = article.partial.map_or(false, |p| 1 != p.total);
    if article.binaries.is_empty() && !is_partial {
        None
    } else {
        Some(article)
    }
}

// Look up the integer `name=value` in a yEnc header line.
fn yenc_meta(line: &[u8], name: &str) -> Option<u32> {
    let mut sought = Vec::with_capacity(name.len() + 1);
    sought.extend_from_slice(name.as_bytes());
    sought.push(b'=');

    let start = find(line, &sought, 0)? + sought.len();
    let end = line[start..]
        .iter()
        .position(|&b| b" \r\t\n".contains(&b))
        .map_or(line.len(), |ix| start + ix);
    let digits = &line[start..end];
    if !digits.first().map_or(false, u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Find yEnc-encoded files in a plain-text body.
///
/// Each file is framed by a `=ybegin` line (optionally followed by a
/// `=ypart` line) and a `=yend` line, and must decode to exactly the size
/// the framing declares.
pub fn parse_yenc(src: &[u8]) -> Option<EncodedArticle> {
    let mut article = EncodedArticle::default();
    let mut current = 0;

    while let Some(begin_pos) = find(src, b"=ybegin ", current) {
        if 0 != begin_pos && b'\n' != src[begin_pos - 1] {
            break;
        }

        let mut yenc_start = match memchr(b'\n', &src[begin_pos..]) {
            Some(nl) => begin_pos + nl + 1,
            None => break,
        };
        let has_part = src[yenc_start..].starts_with(b"=ypart");
        if has_part {
            yenc_start = match memchr(b'\n', &src[yenc_start..]) {
                Some(nl) => yenc_start + nl + 1,
                None => break,
            };
        }

        let meta = &src[begin_pos..yenc_start];
        let filename = match find(meta, b"name=", 0) {
            Some(name_pos) => {
                let name = &meta[name_pos + 5..];
                let eol = name
                    .iter()
                    .position(|&b| b'\r' == b || b'\n' == b)
                    .unwrap_or(name.len());
                String::from_utf8_lossy(&name[..eol]).into_owned()
            }
            None => {
                debug!("yEnc header without name");
                break;
            }
        };

        let (line_len, mut size) =
            match (yenc_meta(meta, "line"), yenc_meta(meta, "size")) {
                (Some(line_len), Some(size)) => (line_len, size),
                _ => break,
            };

        if has_part {
            let (number, part_begin, part_end) = match (
                yenc_meta(meta, "part"),
                yenc_meta(meta, "begin"),
                yenc_meta(meta, "end"),
            ) {
                (Some(n), Some(b), Some(e)) if e >= b => (n, b, e),
                _ => break,
            };
            let part_size = part_end - part_begin + 1;
            let total = if size == part_size {
                1
            } else {
                yenc_meta(meta, "total").unwrap_or(number + 1)
            };
            size = part_size;
            article.partial = Some(PartialInfo { number, total });
        }

        let size = size as usize;
        let line_len = line_len as usize;
        let mut data = Vec::with_capacity(size);
        let mut pos = yenc_start;
        let mut line_start = true;
        let mut line_bytes = 0;
        let mut has_end = false;

        while pos < src.len() {
            match src[pos] {
                b'\r' | b'\n' => {
                    if line_bytes < line_len && data.len() != size {
                        break;
                    }
                    if b'\n' == src[pos] {
                        line_start = true;
                        line_bytes = 0;
                    }
                    pos += 1;
                }
                b'=' => {
                    let escaped = match src.get(pos + 1) {
                        Some(&escaped) => escaped,
                        None => break,
                    };
                    if line_start && b'y' == escaped {
                        has_end = true;
                        break;
                    }
                    if data.len() >= size {
                        break;
                    }
                    data.push(escaped.wrapping_sub(64 + 42));
                    line_bytes += 1;
                    line_start = false;
                    pos += 2;
                }
                ch => {
                    if data.len() >= size {
                        break;
                    }
                    data.push(ch.wrapping_sub(42));
                    line_bytes += 1;
                    line_start = false;
                    pos += 1;
                }
            }
        }

        if !has_end || data.len() != size {
            debug!("yEnc data for {:?} is truncated or overlong", filename);
            break;
        }

        let eol = match memchr(b'\n', &src[pos..]) {
            Some(nl) => pos + nl,
            None => break,
        };
        if Some(size as u32) != yenc_meta(&src[pos..eol], "size") {
            debug!("yEnc trailer size mismatch for {:?}", filename);
            break;
        }

        article.text.extend_from_slice(&src[current..begin_pos]);
        article.binaries.push(BinaryPart {
            mime_type: guess_mime_type(&filename),
            filename,
            data,
        });
        current = eol + 1;
    }

    article.text.extend_from_slice(&src[current..]);

    if article.binaries.is_empty() {
        None
    } else {
        Some(article)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn multipart_split() {
        let split = split_multipart(
            b"preamble text\n--XYZ\npart1\n--XYZ\npart2\n--XYZ--\nepilogue",
            b"XYZ",
        )
        .unwrap();
        assert_eq!(b"preamble text", split.preamble);
        assert_eq!(vec![b"part1" as &[u8], b"part2"], split.parts);
        assert_eq!(b"epilogue", split.epilogue);
    }

    #[test]
    fn multipart_split_crlf() {
        let split = split_multipart(
            b"pre\r\n--XYZ\r\npart1\r\n--XYZ\r\npart2\r\n\r\n\
              --XYZ--\r\nepi",
            b"XYZ",
        )
        .unwrap();
        assert_eq!(b"pre", split.preamble);
        assert_eq!(vec![b"part1" as &[u8], b"part2\r\n"], split.parts);
        assert_eq!(b"epi", split.epilogue);
    }

    #[test]
    fn multipart_split_edge_cases() {
        // No preamble, delimiter mid-line ignored, transport padding on
        // the delimiter line
        let split = split_multipart(
            b"--b  \nx --b y\n--b\n\nsecond\n--b--  \n",
            b"b",
        )
        .unwrap();
        assert_eq!(b"", split.preamble);
        assert_eq!(vec![b"x --b y" as &[u8], b"\nsecond"], split.parts);
        assert_eq!(b"", split.epilogue);

        // Unterminated
        let split = split_multipart(b"--b\nonly part\n", b"b").unwrap();
        assert_eq!(vec![b"only part\n" as &[u8]], split.parts);

        assert_eq!(None, split_multipart(b"--b--\n", b"b"));
        assert_eq!(None, split_multipart(b"no delimiters here", b"b"));
        assert_eq!(None, split_multipart(b"x--b\ny\n", b"b"));
    }

    #[test]
    fn mime_type_guessing() {
        assert_eq!("image/jpeg", guess_mime_type("holiday.JPG"));
        assert_eq!("text/plain", guess_mime_type("main.cpp"));
        assert_eq!("text/html", guess_mime_type("index.htm"));
        assert_eq!("application/octet-stream", guess_mime_type("archive.zip"));
        assert_eq!("application/octet-stream", guess_mime_type("README"));
        assert_eq!("application/octet-stream", guess_mime_type(""));
    }

    fn uu_block(name: &str, data: &[u8]) -> Vec<u8> {
        let mut block = format!("begin 644 {}\n", name).into_bytes();
        block.extend_from_slice(&UuCodec.encode(data, false));
        block.extend_from_slice(b"end\n");
        block
    }

    #[test]
    fn uuencoded_article() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut src = b"Here is the picture:\n\n".to_vec();
        src.extend_from_slice(&uu_block("cat.gif", &data));
        src.extend_from_slice(b"Enjoy!\n");

        let article = parse_uuencoded(&src, b"A cat").unwrap();
        assert_eq!(None, article.partial);
        assert_eq!(1, article.binaries.len());
        assert_eq!("cat.gif", article.binaries[0].filename);
        assert_eq!("image/gif", article.binaries[0].mime_type);
        assert_eq!(data, article.binaries[0].data);
        assert_eq!(
            "Here is the picture:\n\nEnjoy!\n",
            String::from_utf8_lossy(&article.text)
        );
    }

    #[test]
    fn plain_text_is_not_uuencoded() {
        assert_eq!(None, parse_uuencoded(b"Just some text.\nMore.\n", b""));
        assert_eq!(
            None,
            parse_uuencoded(b"begin 644 x\nnot really\nend\n", b"")
        );
    }

    #[test]
    fn uuencoded_fragment() {
        // The middle of a long file: no begin or end line
        let data = vec![0x55u8; 45 * 20];
        let mut encoded = UuCodec.encode(&data, false);
        // Drop the terminator line
        encoded.truncate(encoded.len() - 2);

        let article =
            parse_uuencoded(&encoded, b"big.bin (2/5)").unwrap();
        assert_eq!(
            Some(PartialInfo {
                number: 2,
                total: 5
            }),
            article.partial
        );

        assert_eq!(None, parse_uuencoded(&encoded, b"big.bin"));
    }

    fn yenc(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &b in data {
            let ch = b.wrapping_add(42);
            if b"\0\r\n=".contains(&ch) {
                out.push(b'=');
                out.push(ch.wrapping_add(64));
            } else {
                out.push(ch);
            }
        }
        out
    }

    #[test]
    fn yenc_article() {
        let data = b"Hello, yEnc \x00\xd6\xe0\xe3\xff!";
        let mut src = format!(
            "Some text\n=ybegin line=128 size={} name=test file.bin\n",
            data.len()
        )
        .into_bytes();
        src.extend_from_slice(&yenc(data));
        src.extend_from_slice(
            format!("\n=yend size={}\nTrailing\n", data.len()).as_bytes(),
        );

        let article = parse_yenc(&src).unwrap();
        assert_eq!(None, article.partial);
        assert_eq!(1, article.binaries.len());
        assert_eq!("test file.bin", article.binaries[0].filename);
        assert_eq!(&data[..], &article.binaries[0].data[..]);
        assert_eq!(
            "Some text\nTrailing\n",
            String::from_utf8_lossy(&article.text)
        );
    }

    #[test]
    fn yenc_part() {
        let data = vec![b'x'; 20];
        let mut src = b"=ybegin part=1 total=2 line=128 size=40 name=x.bin\n\
                        =ypart begin=1 end=20\n"
            .to_vec();
        src.extend_from_slice(&yenc(&data));
        src.extend_from_slice(b"\n=yend size=20 part=1\n");

        let article = parse_yenc(&src).unwrap();
        assert_eq!(
            Some(PartialInfo {
                number: 1,
                total: 2
            }),
            article.partial
        );
        assert_eq!(data, article.binaries[0].data);
    }

    #[test]
    fn broken_yenc() {
        // Size mismatch
        let mut src = b"=ybegin line=128 size=5 name=a\n".to_vec();
        src.extend_from_slice(&yenc(b"abc"));
        src.extend_from_slice(b"\n=yend size=5\n");
        assert_eq!(None, parse_yenc(&src));

        // No name
        assert_eq!(
            None,
            parse_yenc(b"=ybegin line=128 size=0\n=yend size=0\n")
        );
        assert_eq!(None, parse_yenc(b"nothing to see"));
    }
}
