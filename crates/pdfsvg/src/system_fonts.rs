//! Installed fonts, looked up through font-kit.

use std::collections::BTreeSet;

use font_kit::family_name::FamilyName;
use font_kit::properties::{Properties, Stretch, Style, Weight};
use font_kit::source::{Source, SystemSource};
use pdfsvg_core::font_system::{DescStretch, DescStyle};
use pdfsvg_core::{FontDescription, FontSystemCatalog};
use tracing::{debug, trace};

/// The fonts installed on this machine.
///
/// The family list is read once, when the catalog is created.
pub struct SystemFontCatalog {
    source: SystemSource,
    families: BTreeSet<String>,
}

impl SystemFontCatalog {
    pub fn new() -> Self {
        let source = SystemSource::new();
        let families: BTreeSet<String> = match source.all_families() {
            Ok(names) => names.iter().map(|n| n.to_lowercase()).collect(),
            Err(e) => {
                debug!(error = ?e, "installed font families unavailable");
                BTreeSet::new()
            }
        };
        debug!(families = families.len(), "system font catalog loaded");
        Self { source, families }
    }
}

impl Default for SystemFontCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemFontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemFontCatalog")
            .field("families", &self.families.len())
            .finish_non_exhaustive()
    }
}

impl FontSystemCatalog for SystemFontCatalog {
    fn has_family(&self, family: &str) -> bool {
        !family.is_empty() && self.families.contains(&family.to_lowercase())
    }

    fn best_match(&self, desc: &FontDescription) -> Option<String> {
        if desc.family.is_empty() {
            return None;
        }
        let handle = self
            .source
            .select_best_match(&[FamilyName::Title(desc.family.clone())], &properties_for(desc))
            .ok()?;
        let family = handle.load().ok()?.family_name();
        trace!(requested = %desc.family, %family, "system font match");
        Some(family)
    }
}

fn properties_for(desc: &FontDescription) -> Properties {
    let mut properties = Properties::new();
    properties.style = match desc.style {
        DescStyle::Normal => Style::Normal,
        DescStyle::Italic => Style::Italic,
        DescStyle::Oblique => Style::Oblique,
    };
    properties.weight = Weight(f32::from(desc.weight));
    properties.stretch = match desc.stretch {
        DescStretch::UltraCondensed => Stretch::ULTRA_CONDENSED,
        DescStretch::ExtraCondensed => Stretch::EXTRA_CONDENSED,
        DescStretch::Condensed => Stretch::CONDENSED,
        DescStretch::SemiCondensed => Stretch::SEMI_CONDENSED,
        DescStretch::Normal => Stretch::NORMAL,
        DescStretch::SemiExpanded => Stretch::SEMI_EXPANDED,
        DescStretch::Expanded => Stretch::EXPANDED,
        DescStretch::ExtraExpanded => Stretch::EXTRA_EXPANDED,
        DescStretch::UltraExpanded => Stretch::ULTRA_EXPANDED,
    };
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_maps_onto_properties() {
        let desc = FontDescription::parse("DejaVu Sans Bold Oblique");
        assert_eq!(desc.family, "DejaVu Sans");
        let p = properties_for(&desc);
        assert_eq!(p.weight, Weight(700.0));
        assert_eq!(p.style, Style::Oblique);
        assert_eq!(p.stretch, Stretch::NORMAL);
    }

    #[test]
    fn condensed_stretch() {
        let desc = FontDescription::parse("Liberation Sans Condensed");
        assert_eq!(properties_for(&desc).stretch, Stretch::CONDENSED);
        assert_eq!(properties_for(&desc).weight, Weight::NORMAL);
    }

    #[test]
    fn empty_family_is_never_installed() {
        let catalog = SystemFontCatalog::new();
        assert!(!catalog.has_family(""));
        assert_eq!(catalog.best_match(&FontDescription::default()), None);
    }
}
