//! Simple-font encodings.
//!
//! Maps single-byte character codes to Unicode text through a base
//! encoding (`StandardEncoding`, `WinAnsiEncoding`, `MacRomanEncoding`)
//! overridden by a `/Differences` array of glyph names.

/// A named base encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    /// Encoding for an `/Encoding` or `/BaseEncoding` name.
    ///
    /// `MacExpertEncoding` is treated as `StandardEncoding`; its glyphs
    /// are small caps and old-style figures with the same letters.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" | "MacExpertEncoding" => Some(Self::Standard),
            "WinAnsiEncoding" => Some(Self::WinAnsi),
            "MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            Self::Standard => standard(code),
            Self::WinAnsi => match code {
                // Undefined in WinAnsi; WHATWG maps them to C1 controls.
                0x81 | 0x8d | 0x8f | 0x90 | 0x9d => None,
                0xa0 => Some(' '),
                0xad => Some('-'),
                _ => single_byte(encoding_rs::WINDOWS_1252, code),
            },
            Self::MacRoman => single_byte(encoding_rs::MACINTOSH, code),
        }
    }
}

fn single_byte(encoding: &'static encoding_rs::Encoding, code: u8) -> Option<char> {
    let bytes = [code];
    let (text, _) = encoding.decode_without_bom_handling(&bytes);
    text.chars().next().filter(|c| !c.is_control())
}

fn standard(code: u8) -> Option<char> {
    match code {
        0x27 => Some('\u{2019}'),
        0x60 => Some('\u{2018}'),
        0x20..=0x7e => Some(char::from(code)),
        _ => STANDARD_HIGH
            .binary_search_by_key(&code, |&(c, _)| c)
            .ok()
            .map(|i| STANDARD_HIGH[i].1),
    }
}

#[rustfmt::skip]
static STANDARD_HIGH: &[(u8, char)] = &[
    (0xa1, '\u{00A1}'), (0xa2, '\u{00A2}'), (0xa3, '\u{00A3}'), (0xa4, '\u{2044}'),
    (0xa5, '\u{00A5}'), (0xa6, '\u{0192}'), (0xa7, '\u{00A7}'), (0xa8, '\u{00A4}'),
    (0xa9, '\''),       (0xaa, '\u{201C}'), (0xab, '\u{00AB}'), (0xac, '\u{2039}'),
    (0xad, '\u{203A}'), (0xae, '\u{FB01}'), (0xaf, '\u{FB02}'), (0xb1, '\u{2013}'),
    (0xb2, '\u{2020}'), (0xb3, '\u{2021}'), (0xb4, '\u{00B7}'), (0xb6, '\u{00B6}'),
    (0xb7, '\u{2022}'), (0xb8, '\u{201A}'), (0xb9, '\u{201E}'), (0xba, '\u{201D}'),
    (0xbb, '\u{00BB}'), (0xbc, '\u{2026}'), (0xbd, '\u{2030}'), (0xbf, '\u{00BF}'),
    (0xc1, '`'),        (0xc2, '\u{00B4}'), (0xc3, '\u{02C6}'), (0xc4, '\u{02DC}'),
    (0xc5, '\u{00AF}'), (0xc6, '\u{02D8}'), (0xc7, '\u{02D9}'), (0xc8, '\u{00A8}'),
    (0xca, '\u{02DA}'), (0xcb, '\u{00B8}'), (0xcd, '\u{02DD}'), (0xce, '\u{02DB}'),
    (0xcf, '\u{02C7}'), (0xd0, '\u{2014}'), (0xe1, '\u{00C6}'), (0xe3, '\u{00AA}'),
    (0xe8, '\u{0141}'), (0xe9, '\u{00D8}'), (0xea, '\u{0152}'), (0xeb, '\u{00BA}'),
    (0xf1, '\u{00E6}'), (0xf5, '\u{0131}'), (0xf8, '\u{0142}'), (0xf9, '\u{00F8}'),
    (0xfa, '\u{0153}'), (0xfb, '\u{00DF}'),
];

/// Per-code text and glyph names of a simple font.
#[derive(Debug, Clone)]
pub struct SimpleEncoding {
    text: Vec<Option<String>>,
    names: Vec<Option<String>>,
}

impl SimpleEncoding {
    pub fn new(base: BaseEncoding) -> Self {
        Self {
            text: (0..=255u8).map(|c| base.decode(c).map(String::from)).collect(),
            names: vec![None; 256],
        }
    }

    /// Apply `/Differences` entries.
    pub fn apply_differences(&mut self, differences: &[(u8, String)]) {
        for (code, name) in differences {
            let slot = usize::from(*code);
            self.text[slot] = glyph_name_to_text(name);
            self.names[slot] = Some(name.clone());
        }
    }

    pub fn text(&self, code: u8) -> Option<&str> {
        self.text[usize::from(code)].as_deref()
    }

    /// Glyph name assigned by `/Differences`, if any.
    pub fn glyph_name(&self, code: u8) -> Option<&str> {
        self.names[usize::from(code)].as_deref()
    }
}

/// Unicode text for a glyph name.
///
/// Understands `uniXXXX` (several groups allowed), `uXXXX[XX]`,
/// ligature names joined with `_`, and drops `.suffix` variants.
pub fn glyph_name_to_text(name: &str) -> Option<String> {
    let name = name.split('.').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    if name.contains('_') {
        let parts: Option<String> = name.split('_').map(component_text).collect();
        return parts;
    }
    component_text(name)
}

fn component_text(name: &str) -> Option<String> {
    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
    let uni = name.strip_prefix("uni");
    if let Some(hex) = uni.filter(|h| h.len() >= 4 && h.len() % 4 == 0 && is_hex(h)) {
        let units: Vec<u16> = hex
            .as_bytes()
            .chunks(4)
            .filter_map(|c| std::str::from_utf8(c).ok())
            .filter_map(|s| u16::from_str_radix(s, 16).ok())
            .collect();
        return String::from_utf16(&units).ok();
    }
    if let Some(hex) = name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len()) && is_hex(h)) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Ok(i) = GLYPH_NAMES.binary_search_by_key(&name, |&(n, _)| n) {
        return Some(GLYPH_NAMES[i].1.to_string());
    }
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c.to_string()),
        _ => None,
    }
}

/// Adobe glyph names, sorted for binary search.
static GLYPH_NAMES: &[(&str, char)] = &[
    ("AE", '\u{00C6}'),
    ("Aacute", '\u{00C1}'),
    ("Acaron", '\u{01CD}'),
    ("Acircumflex", '\u{00C2}'),
    ("Adieresis", '\u{00C4}'),
    ("Agrave", '\u{00C0}'),
    ("Aring", '\u{00C5}'),
    ("Atilde", '\u{00C3}'),
    ("Cacute", '\u{0106}'),
    ("Ccaron", '\u{010C}'),
    ("Ccedilla", '\u{00C7}'),
    ("Ccircumflex", '\u{0108}'),
    ("Delta", '\u{2206}'),
    ("Eacute", '\u{00C9}'),
    ("Ecaron", '\u{011A}'),
    ("Ecedilla", '\u{0228}'),
    ("Ecircumflex", '\u{00CA}'),
    ("Edieresis", '\u{00CB}'),
    ("Egrave", '\u{00C8}'),
    ("Eth", '\u{00D0}'),
    ("Etilde", '\u{1EBC}'),
    ("Euro", '\u{20AC}'),
    ("Iacute", '\u{00CD}'),
    ("Icaron", '\u{01CF}'),
    ("Icircumflex", '\u{00CE}'),
    ("Idieresis", '\u{00CF}'),
    ("Igrave", '\u{00CC}'),
    ("Itilde", '\u{0128}'),
    ("Lslash", '\u{0141}'),
    ("Nacute", '\u{0143}'),
    ("Ncaron", '\u{0147}'),
    ("Ncedilla", '\u{0145}'),
    ("Ngrave", '\u{01F8}'),
    ("Ntilde", '\u{00D1}'),
    ("OE", '\u{0152}'),
    ("Oacute", '\u{00D3}'),
    ("Ocaron", '\u{01D1}'),
    ("Ocircumflex", '\u{00D4}'),
    ("Odieresis", '\u{00D6}'),
    ("Ograve", '\u{00D2}'),
    ("Omega", '\u{2126}'),
    ("Oslash", '\u{00D8}'),
    ("Otilde", '\u{00D5}'),
    ("Sacute", '\u{015A}'),
    ("Scaron", '\u{0160}'),
    ("Scedilla", '\u{015E}'),
    ("Scircumflex", '\u{015C}'),
    ("Thorn", '\u{00DE}'),
    ("Uacute", '\u{00DA}'),
    ("Ucaron", '\u{01D3}'),
    ("Ucircumflex", '\u{00DB}'),
    ("Udieresis", '\u{00DC}'),
    ("Ugrave", '\u{00D9}'),
    ("Uring", '\u{016E}'),
    ("Utilde", '\u{0168}'),
    ("Yacute", '\u{00DD}'),
    ("Ycircumflex", '\u{0176}'),
    ("Ydieresis", '\u{0178}'),
    ("Ygrave", '\u{1EF2}'),
    ("Ytilde", '\u{1EF8}'),
    ("Zacute", '\u{0179}'),
    ("Zcaron", '\u{017D}'),
    ("Zcircumflex", '\u{1E90}'),
    ("aacute", '\u{00E1}'),
    ("acaron", '\u{01CE}'),
    ("acircumflex", '\u{00E2}'),
    ("acute", '\u{00B4}'),
    ("adieresis", '\u{00E4}'),
    ("ae", '\u{00E6}'),
    ("agrave", '\u{00E0}'),
    ("ampersand", '&'),
    ("approxequal", '\u{2248}'),
    ("aring", '\u{00E5}'),
    ("arrowdown", '\u{2193}'),
    ("arrowleft", '\u{2190}'),
    ("arrowright", '\u{2192}'),
    ("arrowup", '\u{2191}'),
    ("asciicircum", '^'),
    ("asciitilde", '~'),
    ("asterisk", '*'),
    ("at", '@'),
    ("atilde", '\u{00E3}'),
    ("backslash", '\\'),
    ("bar", '|'),
    ("braceleft", '{'),
    ("braceright", '}'),
    ("bracketleft", '['),
    ("bracketright", ']'),
    ("breve", '\u{02D8}'),
    ("brokenbar", '\u{00A6}'),
    ("bullet", '\u{2022}'),
    ("cacute", '\u{0107}'),
    ("caron", '\u{02C7}'),
    ("ccaron", '\u{010D}'),
    ("ccedilla", '\u{00E7}'),
    ("ccircumflex", '\u{0109}'),
    ("cedilla", '\u{00B8}'),
    ("cent", '\u{00A2}'),
    ("checkmark", '\u{2713}'),
    ("circumflex", '\u{02C6}'),
    ("colon", ':'),
    ("comma", ','),
    ("copyright", '\u{00A9}'),
    ("currency", '\u{00A4}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("degree", '\u{00B0}'),
    ("dieresis", '\u{00A8}'),
    ("divide", '\u{00F7}'),
    ("dollar", '$'),
    ("dotaccent", '\u{02D9}'),
    ("dotlessi", '\u{0131}'),
    ("eacute", '\u{00E9}'),
    ("ecaron", '\u{011B}'),
    ("ecedilla", '\u{0229}'),
    ("ecircumflex", '\u{00EA}'),
    ("edieresis", '\u{00EB}'),
    ("egrave", '\u{00E8}'),
    ("eight", '8'),
    ("ellipsis", '\u{2026}'),
    ("emdash", '\u{2014}'),
    ("endash", '\u{2013}'),
    ("equal", '='),
    ("eth", '\u{00F0}'),
    ("etilde", '\u{1EBD}'),
    ("exclam", '!'),
    ("exclamdown", '\u{00A1}'),
    ("ff", '\u{FB00}'),
    ("ffi", '\u{FB03}'),
    ("ffl", '\u{FB04}'),
    ("fi", '\u{FB01}'),
    ("five", '5'),
    ("fl", '\u{FB02}'),
    ("florin", '\u{0192}'),
    ("four", '4'),
    ("fraction", '\u{2044}'),
    ("germandbls", '\u{00DF}'),
    ("grave", '`'),
    ("greater", '>'),
    ("greaterequal", '\u{2265}'),
    ("guillemotleft", '\u{00AB}'),
    ("guillemotright", '\u{00BB}'),
    ("guilsinglleft", '\u{2039}'),
    ("guilsinglright", '\u{203A}'),
    ("hungarumlaut", '\u{02DD}'),
    ("hyphen", '-'),
    ("iacute", '\u{00ED}'),
    ("icaron", '\u{01D0}'),
    ("icircumflex", '\u{00EE}'),
    ("idieresis", '\u{00EF}'),
    ("igrave", '\u{00EC}'),
    ("infinity", '\u{221E}'),
    ("integral", '\u{222B}'),
    ("itilde", '\u{0129}'),
    ("less", '<'),
    ("lessequal", '\u{2264}'),
    ("logicalnot", '\u{00AC}'),
    ("lozenge", '\u{25CA}'),
    ("lslash", '\u{0142}'),
    ("macron", '\u{00AF}'),
    ("minus", '\u{2212}'),
    ("mu", '\u{00B5}'),
    ("multiply", '\u{00D7}'),
    ("nacute", '\u{0144}'),
    ("nbspace", '\u{00A0}'),
    ("ncaron", '\u{0148}'),
    ("ncedilla", '\u{0146}'),
    ("ngrave", '\u{01F9}'),
    ("nine", '9'),
    ("notequal", '\u{2260}'),
    ("ntilde", '\u{00F1}'),
    ("numbersign", '#'),
    ("oacute", '\u{00F3}'),
    ("ocaron", '\u{01D2}'),
    ("ocircumflex", '\u{00F4}'),
    ("odieresis", '\u{00F6}'),
    ("oe", '\u{0153}'),
    ("ogonek", '\u{02DB}'),
    ("ograve", '\u{00F2}'),
    ("one", '1'),
    ("onehalf", '\u{00BD}'),
    ("onequarter", '\u{00BC}'),
    ("onesuperior", '\u{00B9}'),
    ("ordfeminine", '\u{00AA}'),
    ("ordmasculine", '\u{00BA}'),
    ("oslash", '\u{00F8}'),
    ("otilde", '\u{00F5}'),
    ("paragraph", '\u{00B6}'),
    ("parenleft", '('),
    ("parenright", ')'),
    ("partialdiff", '\u{2202}'),
    ("percent", '%'),
    ("period", '.'),
    ("periodcentered", '\u{00B7}'),
    ("perthousand", '\u{2030}'),
    ("pi", '\u{03C0}'),
    ("plus", '+'),
    ("plusminus", '\u{00B1}'),
    ("product", '\u{220F}'),
    ("question", '?'),
    ("questiondown", '\u{00BF}'),
    ("quotedbl", '"'),
    ("quotedblbase", '\u{201E}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotesinglbase", '\u{201A}'),
    ("quotesingle", '\''),
    ("radical", '\u{221A}'),
    ("registered", '\u{00AE}'),
    ("ring", '\u{02DA}'),
    ("sacute", '\u{015B}'),
    ("scaron", '\u{0161}'),
    ("scedilla", '\u{015F}'),
    ("scircumflex", '\u{015D}'),
    ("section", '\u{00A7}'),
    ("semicolon", ';'),
    ("seven", '7'),
    ("sfthyphen", '\u{00AD}'),
    ("six", '6'),
    ("slash", '/'),
    ("space", ' '),
    ("sterling", '\u{00A3}'),
    ("summation", '\u{2211}'),
    ("thorn", '\u{00FE}'),
    ("three", '3'),
    ("threequarters", '\u{00BE}'),
    ("threesuperior", '\u{00B3}'),
    ("tilde", '\u{02DC}'),
    ("trademark", '\u{2122}'),
    ("two", '2'),
    ("twosuperior", '\u{00B2}'),
    ("uacute", '\u{00FA}'),
    ("ucaron", '\u{01D4}'),
    ("ucircumflex", '\u{00FB}'),
    ("udieresis", '\u{00FC}'),
    ("ugrave", '\u{00F9}'),
    ("underscore", '_'),
    ("uring", '\u{016F}'),
    ("utilde", '\u{0169}'),
    ("yacute", '\u{00FD}'),
    ("ycircumflex", '\u{0177}'),
    ("ydieresis", '\u{00FF}'),
    ("yen", '\u{00A5}'),
    ("ygrave", '\u{1EF3}'),
    ("yring", '\u{1E99}'),
    ("ytilde", '\u{1EF9}'),
    ("zacute", '\u{017A}'),
    ("zcaron", '\u{017E}'),
    ("zcircumflex", '\u{1E91}'),
    ("zero", '0'),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_table_is_sorted() {
        assert!(GLYPH_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(STANDARD_HIGH.windows(2).all(|w| w[0].0 < w[1].0));
    }

    // --- base encodings ---

    #[test]
    fn standard_quotes_and_ligatures() {
        assert_eq!(BaseEncoding::Standard.decode(b'A'), Some('A'));
        assert_eq!(BaseEncoding::Standard.decode(0x27), Some('\u{2019}'));
        assert_eq!(BaseEncoding::Standard.decode(0xae), Some('\u{FB01}'));
        assert_eq!(BaseEncoding::Standard.decode(0xb0), None);
    }

    #[test]
    fn win_ansi_high_half() {
        assert_eq!(BaseEncoding::WinAnsi.decode(0x80), Some('\u{20AC}'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0xe9), Some('é'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x81), None);
        assert_eq!(BaseEncoding::WinAnsi.decode(0x0a), None);
    }

    #[test]
    fn mac_roman_differs_from_latin1() {
        assert_eq!(BaseEncoding::MacRoman.decode(0x8e), Some('é'));
        assert_eq!(BaseEncoding::from_name("MacRomanEncoding"), Some(BaseEncoding::MacRoman));
        assert_eq!(BaseEncoding::from_name("Custom"), None);
    }

    // --- glyph names ---

    #[test]
    fn glyph_name_forms() {
        assert_eq!(glyph_name_to_text("eacute").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_text("uni20AC").as_deref(), Some("€"));
        assert_eq!(glyph_name_to_text("uni00660069").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_text("u1F600").as_deref(), Some("\u{1F600}"));
        assert_eq!(glyph_name_to_text("f_f_i").as_deref(), Some("ffi"));
        assert_eq!(glyph_name_to_text("a.sc").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_text("g123"), None);
        assert_eq!(glyph_name_to_text(".notdef"), None);
    }

    #[test]
    fn differences_override_base() {
        let mut enc = SimpleEncoding::new(BaseEncoding::WinAnsi);
        enc.apply_differences(&[(0x41, "bullet".to_string()), (0x42, "xyzzy".to_string())]);
        assert_eq!(enc.text(0x41), Some("•"));
        assert_eq!(enc.glyph_name(0x41), Some("bullet"));
        assert_eq!(enc.text(0x42), None);
        assert_eq!(enc.text(0x43), Some("C"));
        assert_eq!(enc.glyph_name(0x43), None);
    }
}
