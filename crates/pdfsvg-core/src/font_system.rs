//! Access to the fonts installed on the host.
//!
//! The importer never talks to a process-wide font registry. Callers pass
//! a [`FontSystemCatalog`] by reference for the duration of an import.
//! [`MemoryFontCatalog`] is a fixed list, useful for tests and for
//! environments without a font service.

use std::collections::BTreeMap;

/// Slant of a font description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescStyle {
    #[default]
    Normal,
    Oblique,
    Italic,
}

/// Width class of a font description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescStretch {
    UltraCondensed,
    ExtraCondensed,
    Condensed,
    SemiCondensed,
    #[default]
    Normal,
    SemiExpanded,
    Expanded,
    ExtraExpanded,
    UltraExpanded,
}

impl DescStretch {
    /// CSS `font-stretch` keyword.
    pub fn as_css(&self) -> &'static str {
        match self {
            DescStretch::UltraCondensed => "ultra-condensed",
            DescStretch::ExtraCondensed => "extra-condensed",
            DescStretch::Condensed => "condensed",
            DescStretch::SemiCondensed => "semi-condensed",
            DescStretch::Normal => "normal",
            DescStretch::SemiExpanded => "semi-expanded",
            DescStretch::Expanded => "expanded",
            DescStretch::ExtraExpanded => "extra-expanded",
            DescStretch::UltraExpanded => "ultra-expanded",
        }
    }
}

/// Numeric weight of a regular face.
pub const WEIGHT_NORMAL: u16 = 400;

/// A parsed textual font description such as `"DejaVu Sans Bold Oblique"`.
///
/// Trailing words naming a style, weight, stretch, variant, or size are
/// consumed from the end; whatever remains is the family.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FontDescription {
    pub family: String,
    pub style: DescStyle,
    pub weight: u16,
    pub stretch: DescStretch,
}

const STYLE_WORDS: &[(&str, DescStyle)] = &[
    ("normal", DescStyle::Normal),
    ("roman", DescStyle::Normal),
    ("oblique", DescStyle::Oblique),
    ("italic", DescStyle::Italic),
];

const WEIGHT_WORDS: &[(&str, u16)] = &[
    ("thin", 100),
    ("ultralight", 200),
    ("extralight", 200),
    ("light", 300),
    ("semilight", 350),
    ("demilight", 350),
    ("book", 380),
    ("regular", 400),
    ("medium", 500),
    ("semibold", 600),
    ("demibold", 600),
    ("bold", 700),
    ("ultrabold", 800),
    ("extrabold", 800),
    ("heavy", 900),
    ("black", 900),
    ("ultrablack", 1000),
    ("extrablack", 1000),
];

const STRETCH_WORDS: &[(&str, DescStretch)] = &[
    ("ultracondensed", DescStretch::UltraCondensed),
    ("extracondensed", DescStretch::ExtraCondensed),
    ("condensed", DescStretch::Condensed),
    ("semicondensed", DescStretch::SemiCondensed),
    ("semiexpanded", DescStretch::SemiExpanded),
    ("expanded", DescStretch::Expanded),
    ("extraexpanded", DescStretch::ExtraExpanded),
    ("ultraexpanded", DescStretch::UltraExpanded),
];

const VARIANT_WORDS: &[&str] = &["smallcaps", "allsmallcaps", "petitecaps", "unicase", "titlecaps"];

impl FontDescription {
    /// Parse a description string. Matching of option words ignores case
    /// and hyphens.
    pub fn parse(text: &str) -> Self {
        let mut desc = FontDescription {
            weight: WEIGHT_NORMAL,
            ..Default::default()
        };
        let mut words: Vec<&str> = text.split([' ', ',']).filter(|w| !w.is_empty()).collect();
        while let Some(last) = words.last() {
            let key: String = last
                .chars()
                .filter(|c| *c != '-')
                .flat_map(char::to_lowercase)
                .collect();
            if let Some((_, s)) = STYLE_WORDS.iter().find(|(w, _)| *w == key) {
                if *s != DescStyle::Normal {
                    desc.style = *s;
                }
            } else if let Some((_, w)) = WEIGHT_WORDS.iter().find(|(w, _)| *w == key) {
                desc.weight = *w;
            } else if let Some((_, s)) = STRETCH_WORDS.iter().find(|(w, _)| *w == key) {
                desc.stretch = *s;
            } else if VARIANT_WORDS.contains(&key.as_str()) || key.parse::<f64>().is_ok() {
                // Variants and sizes carry no style information here.
            } else {
                break;
            }
            words.pop();
        }
        desc.family = words.join(" ");
        desc
    }

    /// Parse a PostScript font name such as `"Helvetica-BoldOblique"`.
    ///
    /// Dashes become spaces before parsing.
    pub fn from_postscript_name(name: &str) -> Self {
        Self::parse(&name.replace('-', " "))
    }
}

/// The host's installed fonts.
pub trait FontSystemCatalog {
    /// Whether a family with this exact name is installed (case-insensitive).
    fn has_family(&self, family: &str) -> bool;

    /// Family of the installed font that best matches `desc`, if any.
    fn best_match(&self, desc: &FontDescription) -> Option<String>;
}

/// A fixed in-memory list of families.
#[derive(Debug, Clone, Default)]
pub struct MemoryFontCatalog {
    families: Vec<String>,
    substitutes: BTreeMap<String, String>,
}

impl MemoryFontCatalog {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
            substitutes: BTreeMap::new(),
        }
    }

    /// Map a requested family (lowercase) onto an installed one.
    pub fn with_substitute(mut self, requested: &str, installed: &str) -> Self {
        self.substitutes
            .insert(requested.to_lowercase(), installed.to_string());
        self
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }
}

impl FontSystemCatalog for MemoryFontCatalog {
    fn has_family(&self, family: &str) -> bool {
        !family.is_empty() && self.families.iter().any(|f| f.eq_ignore_ascii_case(family))
    }

    fn best_match(&self, desc: &FontDescription) -> Option<String> {
        if let Some(f) = self.families.iter().find(|f| f.eq_ignore_ascii_case(&desc.family)) {
            return Some(f.clone());
        }
        self.substitutes.get(&desc.family.to_lowercase()).cloned()
    }
}

impl<T: FontSystemCatalog + ?Sized> FontSystemCatalog for &T {
    fn has_family(&self, family: &str) -> bool {
        (**self).has_family(family)
    }

    fn best_match(&self, desc: &FontDescription) -> Option<String> {
        (**self).best_match(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_family() {
        let d = FontDescription::parse("DejaVu Sans");
        assert_eq!(d.family, "DejaVu Sans");
        assert_eq!(d.style, DescStyle::Normal);
        assert_eq!(d.weight, WEIGHT_NORMAL);
        assert_eq!(d.stretch, DescStretch::Normal);
    }

    #[test]
    fn parse_trailing_options() {
        let d = FontDescription::parse("DejaVu Sans Condensed Bold Oblique 12");
        assert_eq!(d.family, "DejaVu Sans");
        assert_eq!(d.style, DescStyle::Oblique);
        assert_eq!(d.weight, 700);
        assert_eq!(d.stretch, DescStretch::Condensed);
    }

    #[test]
    fn parse_ignores_case_and_hyphens() {
        let d = FontDescription::parse("Noto Serif SEMI-BOLD italic");
        assert_eq!(d.family, "Noto Serif");
        assert_eq!(d.weight, 600);
        assert_eq!(d.style, DescStyle::Italic);
    }

    #[test]
    fn postscript_name_dashes_split_words() {
        let d = FontDescription::from_postscript_name("Helvetica-BoldOblique");
        // "BoldOblique" is a single unknown word, so it stays in the family.
        assert_eq!(d.family, "Helvetica BoldOblique");
        let d = FontDescription::from_postscript_name("Arial-Bold");
        assert_eq!(d.family, "Arial");
        assert_eq!(d.weight, 700);
    }

    #[test]
    fn memory_catalog_lookup_is_case_insensitive() {
        let cat = MemoryFontCatalog::new(["DejaVu Sans", "Liberation Serif"]);
        assert!(cat.has_family("dejavu sans"));
        assert!(!cat.has_family("Arial"));
        assert!(!cat.has_family(""));
        let desc = FontDescription::parse("liberation serif");
        assert_eq!(cat.best_match(&desc), Some("Liberation Serif".to_string()));
    }

    #[test]
    fn memory_catalog_substitutes() {
        let cat = MemoryFontCatalog::new(["Liberation Sans"])
            .with_substitute("Arial", "Liberation Sans");
        let desc = FontDescription::from_postscript_name("Arial-Bold");
        assert_eq!(cat.best_match(&desc), Some("Liberation Sans".to_string()));
    }
}
