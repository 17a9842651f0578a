//! CMap parsing.
//!
//! [`CMap`] maps character codes to Unicode strings (`/ToUnicode`
//! streams, `bfchar`/`bfrange` sections). [`CidCMap`] maps codes to CIDs
//! for composite fonts, including the codespace ranges that say how many
//! bytes each code takes and the writing mode.

use std::collections::HashMap;

use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Int(i64),
    Word(String),
    Name(String),
    ArrayStart,
    ArrayEnd,
}

fn lex(data: &[u8]) -> Vec<Token> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                i += 1;
                let mut digits = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if data[i].is_ascii_hexdigit() {
                        digits.push(data[i]);
                    }
                    i += 1;
                }
                i += 1;
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let bytes = digits
                    .chunks(2)
                    .filter_map(|p| std::str::from_utf8(p).ok())
                    .filter_map(|s| u8::from_str_radix(s, 16).ok())
                    .collect();
                out.push(Token::Hex(bytes));
            }
            b'[' => {
                out.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                out.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings appear only in headers; skip them.
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'/' => {
                let start = i + 1;
                i += 1;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                out.push(Token::Name(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                let word = String::from_utf8_lossy(&data[start..i]).into_owned();
                match word.parse::<i64>() {
                    Ok(n) => out.push(Token::Int(n)),
                    Err(_) => out.push(Token::Word(word)),
                }
            }
        }
    }
    out
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'%' | b'{' | b'}')
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16be(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return char::from(bytes[0]).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// `dst` with its last UTF-16 unit advanced by `offset`.
fn offset_utf16(dst: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = dst
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    if dst.len() == 1 {
        units = vec![u16::from(dst[0])];
    }
    match units.last_mut() {
        Some(last) => *last = last.wrapping_add(offset as u16),
        None => return String::new(),
    }
    String::from_utf16_lossy(&units)
}

/// Longest a single range may expand to.
const MAX_RANGE: u32 = 0xffff;

/// A ToUnicode CMap.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    mappings: HashMap<u32, String>,
}

impl CMap {
    /// Parse `bfchar` and `bfrange` sections.
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let tokens = lex(data);
        let mut mappings = HashMap::new();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while i + 1 < tokens.len() && tokens[i] != Token::Word("endbfchar".into()) {
                        if let (Token::Hex(src), Token::Hex(dst)) = (&tokens[i], &tokens[i + 1]) {
                            mappings.insert(code_of(src), utf16be(dst));
                        }
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    while i + 2 < tokens.len() && tokens[i] != Token::Word("endbfrange".into()) {
                        let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                            i += 1;
                            continue;
                        };
                        let (lo, hi) = (code_of(lo), code_of(hi));
                        if hi < lo || hi - lo > MAX_RANGE {
                            let msg = format!("bad bfrange {lo:#x}..{hi:#x}");
                            return Err(BackendError::Parse(msg));
                        }
                        match &tokens[i + 2] {
                            Token::Hex(dst) => {
                                for offset in 0..=(hi - lo) {
                                    mappings.insert(lo + offset, offset_utf16(dst, offset));
                                }
                                i += 3;
                            }
                            Token::ArrayStart => {
                                i += 3;
                                let mut code = lo;
                                while i < tokens.len() && tokens[i] != Token::ArrayEnd {
                                    if let Token::Hex(dst) = &tokens[i] {
                                        if code <= hi {
                                            mappings.insert(code, utf16be(dst));
                                        }
                                        code += 1;
                                    }
                                    i += 1;
                                }
                                i += 1;
                            }
                            _ => i += 3,
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Ok(CMap { mappings })
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Codespace {
    bytes: usize,
    lo: u32,
    hi: u32,
}

/// A code-to-CID CMap with its codespace.
#[derive(Debug, Clone, Default)]
pub struct CidCMap {
    codespace: Vec<Codespace>,
    singles: HashMap<u32, u32>,
    /// `(lo, hi, first cid)`.
    ranges: Vec<(u32, u32, u32)>,
    name: Option<String>,
    writing_mode: u8,
    identity: bool,
}

impl CidCMap {
    /// The predefined `Identity-H`/`Identity-V` CMaps: two-byte codes
    /// equal to their CIDs.
    pub fn identity(vertical: bool) -> Self {
        Self {
            codespace: vec![Codespace {
                bytes: 2,
                lo: 0,
                hi: 0xffff,
            }],
            name: Some(if vertical { "Identity-V" } else { "Identity-H" }.to_string()),
            writing_mode: u8::from(vertical),
            identity: true,
            ..Self::default()
        }
    }

    /// Parse an embedded CMap stream.
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let tokens = lex(data);
        let mut cmap = CidCMap::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Name(n) if n == "CMapName" => {
                    if let Some(Token::Name(v)) = tokens.get(i + 1) {
                        cmap.name = Some(v.clone());
                    }
                }
                Token::Name(n) if n == "WMode" => {
                    if let Some(Token::Int(v)) = tokens.get(i + 1) {
                        cmap.writing_mode = u8::from(*v == 1);
                    }
                }
                Token::Word(w) if w == "begincodespacerange" => {
                    i += 1;
                    let end = Token::Word("endcodespacerange".into());
                    while i + 1 < tokens.len() && tokens[i] != end {
                        if let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) {
                            cmap.codespace.push(Codespace {
                                bytes: lo.len().clamp(1, 4),
                                lo: code_of(lo),
                                hi: code_of(hi),
                            });
                        }
                        i += 2;
                    }
                }
                Token::Word(w) if w == "begincidchar" => {
                    i += 1;
                    while i + 1 < tokens.len() && tokens[i] != Token::Word("endcidchar".into()) {
                        if let (Token::Hex(src), Token::Int(cid)) = (&tokens[i], &tokens[i + 1]) {
                            cmap.singles.insert(code_of(src), (*cid).max(0) as u32);
                        }
                        i += 2;
                    }
                }
                Token::Word(w) if w == "begincidrange" => {
                    i += 1;
                    while i + 2 < tokens.len() && tokens[i] != Token::Word("endcidrange".into()) {
                        if let (Token::Hex(lo), Token::Hex(hi), Token::Int(cid)) =
                            (&tokens[i], &tokens[i + 1], &tokens[i + 2])
                        {
                            cmap.ranges.push((code_of(lo), code_of(hi), (*cid).max(0) as u32));
                        }
                        i += 3;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if cmap.codespace.is_empty() {
            cmap.codespace.push(Codespace {
                bytes: 2,
                lo: 0,
                hi: 0xffff,
            });
        }
        Ok(cmap)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn writing_mode(&self) -> u8 {
        self.writing_mode
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Split the next code off `bytes`, returning the code and its length.
    ///
    /// Bytes that match no codespace range are consumed with the shortest
    /// range length.
    pub fn next_code(&self, bytes: &[u8]) -> Option<(u32, usize)> {
        if bytes.is_empty() {
            return None;
        }
        let mut lengths: Vec<usize> = self.codespace.iter().map(|c| c.bytes).collect();
        lengths.sort_unstable();
        lengths.dedup();
        for len in &lengths {
            if *len > bytes.len() {
                break;
            }
            let code = code_of(&bytes[..*len]);
            if self
                .codespace
                .iter()
                .any(|c| c.bytes == *len && code >= c.lo && code <= c.hi)
            {
                return Some((code, *len));
            }
        }
        let len = lengths.first().copied().unwrap_or(1).min(bytes.len());
        Some((code_of(&bytes[..len]), len))
    }

    /// CID for a code. Unmapped codes give CID 0.
    pub fn lookup(&self, code: u32) -> u32 {
        if self.identity {
            return code;
        }
        if let Some(cid) = self.singles.get(&code) {
            return *cid;
        }
        self.ranges
            .iter()
            .rev()
            .find(|(lo, hi, _)| code >= *lo && code <= *hi)
            .map_or(0, |(lo, _, cid)| cid + (code - lo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TO_UNICODE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <D83DDE00>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0066006C> <00DF>]
endbfrange
endcmap";

    // --- ToUnicode ---

    #[test]
    fn bfchar_and_surrogates() {
        let cmap = CMap::parse(TO_UNICODE).unwrap();
        assert_eq!(cmap.lookup(3), Some(" "));
        assert_eq!(cmap.lookup(0x11), Some("\u{1F600}"));
        assert_eq!(cmap.lookup(0x12), None);
    }

    #[test]
    fn bfrange_forms() {
        let cmap = CMap::parse(TO_UNICODE).unwrap();
        assert_eq!(cmap.lookup(0x24), Some("A"));
        assert_eq!(cmap.lookup(0x26), Some("C"));
        assert_eq!(cmap.lookup(0x30), Some("fl"));
        assert_eq!(cmap.lookup(0x31), Some("ß"));
        assert_eq!(cmap.len(), 7);
    }

    #[test]
    fn ligature_range_increments_last_unit() {
        let cmap = CMap::parse(b"beginbfrange <01> <02> <00660066> endbfrange").unwrap();
        assert_eq!(cmap.lookup(1), Some("ff"));
        assert_eq!(cmap.lookup(2), Some("fg"));
    }

    #[test]
    fn reversed_range_is_an_error() {
        assert!(CMap::parse(b"beginbfrange <05> <01> <0041> endbfrange").is_err());
    }

    #[test]
    fn empty_cmap() {
        assert!(CMap::parse(b"").unwrap().is_empty());
    }

    // --- CID CMaps ---

    #[test]
    fn identity_splits_two_bytes() {
        let cmap = CidCMap::identity(false);
        assert_eq!(cmap.next_code(&[0x01, 0x02, 0x03]), Some((0x0102, 2)));
        assert_eq!(cmap.lookup(0x0102), 0x0102);
        assert_eq!(cmap.writing_mode(), 0);
        assert_eq!(CidCMap::identity(true).writing_mode(), 1);
    }

    #[test]
    fn mixed_codespace() {
        let cmap = CidCMap::parse(
            b"/CMapName /Test-H def /WMode 1 def
2 begincodespacerange <00> <80> <8140> <9ffc> endcodespacerange
1 begincidrange <8140> <817e> 633 endcidrange
1 begincidchar <41> 34 endcidchar",
        )
        .unwrap();
        assert_eq!(cmap.name(), Some("Test-H"));
        assert_eq!(cmap.writing_mode(), 1);
        assert_eq!(cmap.next_code(b"A\x81\x41"), Some((0x41, 1)));
        assert_eq!(cmap.next_code(b"\x81\x41"), Some((0x8141, 2)));
        assert_eq!(cmap.lookup(0x41), 34);
        assert_eq!(cmap.lookup(0x8141), 634);
        assert_eq!(cmap.lookup(0x42), 0);
    }
}
