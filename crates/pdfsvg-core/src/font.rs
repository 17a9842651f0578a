//! Font inventory types and style inference.
//!
//! [`FontData`] derives CSS-style family/style/weight/stretch values for a
//! PDF font. [`FontCatalog`] aggregates every font in a document with the
//! pages that use it, and [`auto_font_strategies`] turns a uniform
//! [`FontStrategy`] into per-font [`FontFallback`] decisions.

use std::collections::{BTreeMap, BTreeSet};

use crate::font_system::{DescStretch, DescStyle, FontDescription, FontSystemCatalog, WEIGHT_NORMAL};

/// Stable identity of a font within one document.
///
/// Indirect fonts use their object number and generation. Direct fonts
/// use a positional or hashed surrogate whose generation is at least
/// [`FontId::SURROGATE_GEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontId {
    pub num: u32,
    pub r#gen: u32,
}

impl FontId {
    pub const SURROGATE_GEN: u32 = 100_000;

    pub fn new(num: u32, r#gen: u32) -> Self {
        Self { num, r#gen }
    }

    /// Font `index` inside a resource dictionary stored as object `dict_num`.
    pub fn positional(index: u32, dict_num: u32) -> Self {
        Self {
            num: index,
            r#gen: Self::SURROGATE_GEN + dict_num,
        }
    }

    /// Font identified only by the structural hash of its dictionary.
    pub fn hashed(hash: u32) -> Self {
        Self {
            num: hash,
            r#gen: Self::SURROGATE_GEN,
        }
    }

    pub fn is_surrogate(&self) -> bool {
        self.r#gen >= Self::SURROGATE_GEN
    }
}

impl std::fmt::Display for FontId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.r#gen)
    }
}

/// Width class declared by a font descriptor's `/FontStretch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontStretch {
    UltraCondensed,
    ExtraCondensed,
    Condensed,
    SemiCondensed,
    Normal,
    SemiExpanded,
    Expanded,
    ExtraExpanded,
    UltraExpanded,
}

impl FontStretch {
    /// Parse a PDF `/FontStretch` name.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        Some(match name {
            "UltraCondensed" => Self::UltraCondensed,
            "ExtraCondensed" => Self::ExtraCondensed,
            "Condensed" => Self::Condensed,
            "SemiCondensed" => Self::SemiCondensed,
            "Normal" => Self::Normal,
            "SemiExpanded" => Self::SemiExpanded,
            "Expanded" => Self::Expanded,
            "ExtraExpanded" => Self::ExtraExpanded,
            "UltraExpanded" => Self::UltraExpanded,
            _ => return None,
        })
    }

    pub fn as_css(&self) -> &'static str {
        match self {
            Self::UltraCondensed => "ultra-condensed",
            Self::ExtraCondensed => "extra-condensed",
            Self::Condensed => "condensed",
            Self::SemiCondensed => "semi-condensed",
            Self::Normal => "normal",
            Self::SemiExpanded => "semi-expanded",
            Self::Expanded => "expanded",
            Self::ExtraExpanded => "extra-expanded",
            Self::UltraExpanded => "ultra-expanded",
        }
    }
}

/// What the PDF itself says about a font.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NativeFontInfo {
    /// `/BaseFont`, possibly carrying a subset tag.
    pub name: Option<String>,
    /// `/FontFamily` from the font descriptor.
    pub family: Option<String>,
    pub italic: bool,
    /// Weight class 1..=9 (`/FontWeight` divided by 100).
    pub weight_class: Option<u16>,
    pub stretch: Option<FontStretch>,
    /// `/Subtype` of the font dictionary.
    pub subtype: String,
    pub is_cid: bool,
    pub embedded: bool,
}

/// Remove a `ABCDEF+` subset tag.
///
/// The tag must be exactly six uppercase ASCII letters followed by `+`,
/// and something must follow it.
pub fn strip_subset_tag(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > 7 && bytes[6] == b'+' && bytes[..6].iter().all(u8::is_ascii_uppercase) {
        &name[7..]
    } else {
        name
    }
}

// Alphabetical, applied in order; a later match overwrites an earlier one.
const NAME_WEIGHTS: &[(&str, &str)] = &[
    ("black", "900"),
    ("bold", "bold"),
    ("book", "normal"),
    ("demibold", "600"),
    ("extrabold", "800"),
    ("extralight", "200"),
    ("heavy", "900"),
    ("light", "300"),
    ("medium", "500"),
    ("normal", "normal"),
    ("regular", "normal"),
    ("roman", "normal"),
    ("semibold", "600"),
    ("thin", "100"),
    ("ultrabold", "800"),
    ("ultralight", "200"),
];

const NAME_STRETCHES: &[(&str, &str)] = &[
    ("condensed", "condensed"),
    ("expanded", "expanded"),
    ("extracondensed", "extra-condensed"),
    ("extraexpanded", "extra-expanded"),
    ("semicondensed", "semi-condensed"),
    ("semiexpanded", "semi-expanded"),
    ("ultracondensed", "ultra-condensed"),
    ("ultraexpanded", "ultra-expanded"),
];

/// Resolved style information for one font.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontData {
    /// PostScript name without the subset tag.
    pub name: String,
    /// Installed family; empty unless `found`.
    pub family: String,
    pub style: String,
    pub weight: String,
    pub stretch: String,
    /// The family is installed on this system.
    pub found: bool,
}

impl FontData {
    pub fn new(info: &NativeFontInfo, system: &dyn FontSystemCatalog) -> Self {
        let name = info.name.as_deref().map(strip_subset_tag).unwrap_or("").to_string();
        let mut data = FontData {
            name,
            ..Default::default()
        };
        data.apply_native(info);
        if !data.apply_system(info, system) {
            data.apply_name_keywords();
        }
        data
    }

    fn apply_native(&mut self, info: &NativeFontInfo) {
        self.style = if info.italic { "italic".into() } else { String::new() };
        self.weight = match info.weight_class {
            None | Some(4) => "normal".into(),
            Some(7) => "bold".into(),
            Some(n) => (u32::from(n) * 100).to_string(),
        };
        self.stretch = match info.stretch {
            Some(s) => s.as_css().into(),
            None => String::new(),
        };
    }

    fn apply_system(&mut self, info: &NativeFontInfo, system: &dyn FontSystemCatalog) -> bool {
        let mut desc = FontDescription::from_postscript_name(&self.name);
        if !system.has_family(&desc.family) {
            let Some(pdf_family) = info.family.as_deref().filter(|f| !f.is_empty()) else {
                return false;
            };
            desc = FontDescription::parse(&family_with_suffix(pdf_family, &self.name));
            if desc.family.is_empty() {
                desc = FontDescription::parse(pdf_family);
            }
            if !system.has_family(&desc.family) {
                return false;
            }
        }

        self.family = desc.family;
        match desc.style {
            DescStyle::Italic => self.style = "italic".into(),
            DescStyle::Oblique => self.style = "oblique".into(),
            DescStyle::Normal => {}
        }
        if desc.weight != WEIGHT_NORMAL {
            self.weight = desc.weight.to_string();
        }
        if desc.stretch != DescStretch::Normal {
            self.stretch = desc.stretch.as_css().into();
        }
        self.found = true;
        true
    }

    fn apply_name_keywords(&mut self) {
        let lower: String = self
            .name
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        if lower.contains("italic") || lower.contains("slanted") {
            self.style = "italic".into();
        } else if lower.contains("oblique") {
            self.style = "oblique".into();
        }
        for (key, value) in NAME_WEIGHTS {
            if lower.contains(key) {
                self.weight = (*value).into();
            }
        }
        for (key, value) in NAME_STRETCHES {
            if lower.contains(key) {
                self.stretch = (*value).into();
            }
        }
    }

    /// Best installed replacement for a font that was not found.
    ///
    /// Empty when the font is installed. `"sans"` when nothing matches.
    pub fn get_substitute(&self, system: &dyn FontSystemCatalog) -> String {
        if self.found {
            return String::new();
        }
        let desc = FontDescription::from_postscript_name(&self.name);
        match system.best_match(&desc) {
            Some(family) if system.has_family(&family) => family,
            _ => "sans".into(),
        }
    }

    /// `family` or `family-style`.
    pub fn get_specification(&self) -> String {
        if self.style.is_empty() {
            self.family.clone()
        } else {
            format!("{}-{}", self.family, self.style)
        }
    }
}

/// `"Univers"` plus the part of `"Univers-BoldCondensed"` after the first
/// dash, split at capitals: `"Univers Bold Condensed"`.
fn family_with_suffix(family: &str, name: &str) -> String {
    let mut out = family.to_string();
    if let Some((_, suffix)) = name.split_once('-') {
        for c in suffix.chars() {
            if c.is_ascii_uppercase() {
                out.push(' ');
            }
            out.push(c);
        }
    }
    out
}

/// One font in the document inventory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontRecord {
    pub id: FontId,
    pub data: FontData,
    pub native: NativeFontInfo,
    /// 1-based numbers of the pages that reference the font.
    pub pages: BTreeSet<u32>,
}

/// Document-wide font inventory keyed by [`FontId`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontCatalog {
    fonts: BTreeMap<FontId, FontRecord>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `page` uses the font `id`.
    ///
    /// `make` runs only on first sight of the font.
    pub fn insert_with<F>(&mut self, id: FontId, page: u32, make: F)
    where
        F: FnOnce() -> (NativeFontInfo, FontData),
    {
        let record = self.fonts.entry(id).or_insert_with(|| {
            let (native, data) = make();
            FontRecord {
                id,
                data,
                native,
                pages: BTreeSet::new(),
            }
        });
        record.pages.insert(page);
    }

    pub fn get(&self, id: &FontId) -> Option<&FontRecord> {
        self.fonts.get(id)
    }

    pub fn contains(&self, id: &FontId) -> bool {
        self.fonts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FontRecord> {
        self.fonts.values()
    }
}

/// How text in one font is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontFallback {
    /// Glyph outlines as paths.
    AsVectorShapes,
    /// Text elements naming the PDF font.
    #[default]
    AsTextKeepOriginalName,
    /// Text elements naming the closest installed font.
    AsTextSubstitute,
    DeleteText,
}

/// A uniform policy applied to every font of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontStrategy {
    #[default]
    RenderMissing,
    RenderAll,
    SubstituteMissing,
    KeepMissing,
    DeleteMissing,
    DeleteAll,
}

impl FontStrategy {
    pub fn fallback_for(&self, found: bool) -> FontFallback {
        match (self, found) {
            (Self::RenderAll, _) => FontFallback::AsVectorShapes,
            (Self::DeleteAll, _) => FontFallback::DeleteText,
            (Self::KeepMissing, _) => FontFallback::AsTextKeepOriginalName,
            (_, true) => FontFallback::AsTextKeepOriginalName,
            (Self::RenderMissing, false) => FontFallback::AsVectorShapes,
            (Self::SubstituteMissing, false) => FontFallback::AsTextSubstitute,
            (Self::DeleteMissing, false) => FontFallback::DeleteText,
        }
    }
}

/// Per-font fallback decisions. Fonts not listed keep their original name.
pub type FontStrategies = BTreeMap<FontId, FontFallback>;

pub fn auto_font_strategies(strategy: FontStrategy, catalog: &FontCatalog) -> FontStrategies {
    catalog
        .iter()
        .map(|record| (record.id, strategy.fallback_for(record.data.found)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_system::MemoryFontCatalog;

    fn info(name: &str) -> NativeFontInfo {
        NativeFontInfo {
            name: Some(name.into()),
            subtype: "Type1".into(),
            ..Default::default()
        }
    }

    // --- strip_subset_tag ---

    #[test]
    fn strip_valid_tag() {
        assert_eq!(strip_subset_tag("ABCDEF+Helvetica"), "Helvetica");
    }

    #[test]
    fn strip_is_idempotent() {
        let once = strip_subset_tag("QWERTY+ZXCVBN+Times");
        assert_eq!(once, "ZXCVBN+Times");
        let plain = strip_subset_tag("ABCDEF+Helvetica");
        assert_eq!(strip_subset_tag(plain), plain);
    }

    #[test]
    fn strip_rejects_other_shapes() {
        assert_eq!(strip_subset_tag("ABCDe+Helvetica"), "ABCDe+Helvetica");
        assert_eq!(strip_subset_tag("ABCDEFG+Helvetica"), "ABCDEFG+Helvetica");
        assert_eq!(strip_subset_tag("abcdef+Helvetica"), "abcdef+Helvetica");
        assert_eq!(strip_subset_tag("ABCDEF+"), "ABCDEF+");
        assert_eq!(strip_subset_tag("Arial"), "Arial");
    }

    // --- FontData tiers ---

    #[test]
    fn native_properties_fill_first_tier() {
        let system = MemoryFontCatalog::default();
        let mut i = info("XYZABC+Frutiger");
        i.italic = true;
        i.weight_class = Some(6);
        i.stretch = Some(FontStretch::SemiCondensed);
        let data = FontData::new(&i, &system);
        assert_eq!(data.name, "Frutiger");
        assert_eq!(data.style, "italic");
        assert_eq!(data.weight, "600");
        assert_eq!(data.stretch, "semi-condensed");
        assert!(!data.found);
        assert_eq!(data.family, "");
    }

    #[test]
    fn native_weight_table() {
        let system = MemoryFontCatalog::default();
        let mut i = info("Foo");
        i.weight_class = Some(7);
        assert_eq!(FontData::new(&i, &system).weight, "bold");
        i.weight_class = Some(4);
        assert_eq!(FontData::new(&i, &system).weight, "normal");
        i.weight_class = Some(1);
        assert_eq!(FontData::new(&i, &system).weight, "100");
    }

    #[test]
    fn system_match_from_postscript_name() {
        let system = MemoryFontCatalog::new(["DejaVu Sans"]);
        let data = FontData::new(&info("DejaVu Sans-Bold"), &system);
        assert!(data.found);
        assert_eq!(data.family, "DejaVu Sans");
        assert_eq!(data.weight, "700");
        assert_eq!(data.style, "");
    }

    #[test]
    fn system_match_from_pdf_family_and_camel_suffix() {
        let system = MemoryFontCatalog::new(["Univers"]);
        let mut i = info("Univers-BoldCondensedOblique");
        i.family = Some("Univers".into());
        let data = FontData::new(&i, &system);
        assert!(data.found);
        assert_eq!(data.family, "Univers");
        assert_eq!(data.weight, "700");
        assert_eq!(data.stretch, "condensed");
        assert_eq!(data.style, "oblique");
    }

    #[test]
    fn system_match_overrides_native_values() {
        let system = MemoryFontCatalog::new(["Gentium"]);
        let mut i = info("Gentium-Italic");
        i.weight_class = Some(7);
        let data = FontData::new(&i, &system);
        assert!(data.found);
        assert_eq!(data.style, "italic");
        // Normal system weight leaves the native value alone.
        assert_eq!(data.weight, "bold");
    }

    #[test]
    fn keyword_tier_last_match_wins() {
        let system = MemoryFontCatalog::default();
        let data = FontData::new(&info("Helvetica-ExtraBold"), &system);
        // "bold" matches first, "extrabold" later in the table.
        assert_eq!(data.weight, "800");

        let data = FontData::new(&info("Foo-UltraLight"), &system);
        // "light", "ultralight" both match; ultralight is last.
        assert_eq!(data.weight, "200");

        let data = FontData::new(&info("Foo-SemiBoldBook"), &system);
        // "bold", then "book", then "semibold".
        assert_eq!(data.weight, "600");
    }

    #[test]
    fn keyword_tier_styles_and_stretches() {
        let system = MemoryFontCatalog::default();
        let data = FontData::new(&info("Foo Slanted"), &system);
        assert_eq!(data.style, "italic");
        let data = FontData::new(&info("Foo-Oblique"), &system);
        assert_eq!(data.style, "oblique");
        let data = FontData::new(&info("Foo-ExtraCondensed"), &system);
        assert_eq!(data.stretch, "extra-condensed");
        let data = FontData::new(&info("Foo-UltraExpanded"), &system);
        assert_eq!(data.stretch, "ultra-expanded");
    }

    // --- substitute ---

    #[test]
    fn substitute_empty_when_found() {
        let system = MemoryFontCatalog::new(["Arial"]);
        let data = FontData::new(&info("Arial"), &system);
        assert_eq!(data.get_substitute(&system), "");
    }

    #[test]
    fn substitute_from_system_match() {
        let system = MemoryFontCatalog::new(["Liberation Sans"])
            .with_substitute("arial", "Liberation Sans");
        let data = FontData::new(&info("Arial-Bold"), &system);
        assert!(!data.found);
        assert_eq!(data.get_substitute(&system), "Liberation Sans");
    }

    #[test]
    fn substitute_falls_back_to_sans() {
        let system = MemoryFontCatalog::new(["DejaVu Serif"]);
        let data = FontData::new(&info("Nonexistent-Regular"), &system);
        assert_eq!(data.get_substitute(&system), "sans");
    }

    #[test]
    fn specification_joins_style() {
        let mut data = FontData {
            family: "Noto Sans".into(),
            ..Default::default()
        };
        assert_eq!(data.get_specification(), "Noto Sans");
        data.style = "italic".into();
        assert_eq!(data.get_specification(), "Noto Sans-italic");
    }

    // --- catalog and strategies ---

    #[test]
    fn catalog_aggregates_pages() {
        let system = MemoryFontCatalog::default();
        let mut catalog = FontCatalog::new();
        let id = FontId::new(12, 0);
        for page in [3, 1, 3] {
            catalog.insert_with(id, page, || {
                let i = info("Foo");
                let d = FontData::new(&i, &system);
                (i, d)
            });
        }
        assert_eq!(catalog.len(), 1);
        let pages: Vec<u32> = catalog.get(&id).unwrap().pages.iter().copied().collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn surrogate_ids() {
        assert_eq!(FontId::positional(2, 7), FontId::new(2, 100_007));
        assert!(FontId::hashed(99).is_surrogate());
        assert!(!FontId::new(5, 0).is_surrogate());
    }

    #[test]
    fn strategy_table() {
        use FontFallback::*;
        let cases = [
            (FontStrategy::RenderAll, [AsVectorShapes, AsVectorShapes]),
            (FontStrategy::DeleteAll, [DeleteText, DeleteText]),
            (FontStrategy::RenderMissing, [AsTextKeepOriginalName, AsVectorShapes]),
            (FontStrategy::SubstituteMissing, [AsTextKeepOriginalName, AsTextSubstitute]),
            (FontStrategy::KeepMissing, [AsTextKeepOriginalName, AsTextKeepOriginalName]),
            (FontStrategy::DeleteMissing, [AsTextKeepOriginalName, DeleteText]),
        ];
        for (strategy, [found, missing]) in cases {
            assert_eq!(strategy.fallback_for(true), found, "{strategy:?} found");
            assert_eq!(strategy.fallback_for(false), missing, "{strategy:?} missing");
        }
    }

    #[test]
    fn auto_strategies_cover_catalog() {
        let system = MemoryFontCatalog::new(["Arial"]);
        let mut catalog = FontCatalog::new();
        for (n, name) in [(1, "Arial"), (2, "Missing")] {
            catalog.insert_with(FontId::new(n, 0), 1, || {
                let i = info(name);
                let d = FontData::new(&i, &system);
                (i, d)
            });
        }
        let strategies = auto_font_strategies(FontStrategy::SubstituteMissing, &catalog);
        assert_eq!(strategies[&FontId::new(1, 0)], FontFallback::AsTextKeepOriginalName);
        assert_eq!(strategies[&FontId::new(2, 0)], FontFallback::AsTextSubstitute);
    }
}
