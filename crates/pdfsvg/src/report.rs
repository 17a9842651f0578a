use pdfsvg_core::{FontCatalog, FontFallback, FontStrategies};

/// One row of the font inventory, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FontReport {
    /// `"num gen R"` of the font dictionary, or a surrogate identity.
    pub id: String,
    pub name: String,
    pub family: String,
    pub style: String,
    pub weight: String,
    pub stretch: String,
    pub subtype: String,
    pub embedded: bool,
    /// The family is installed on this system.
    pub found: bool,
    pub fallback: FontFallback,
    /// 1-based page numbers.
    pub pages: Vec<u32>,
}

/// Flatten a catalog, ordered by font identity.
pub fn font_reports(catalog: &FontCatalog, strategies: &FontStrategies) -> Vec<FontReport> {
    catalog
        .iter()
        .map(|record| FontReport {
            id: record.id.to_string(),
            name: record.data.name.clone(),
            family: record.data.family.clone(),
            style: record.data.style.clone(),
            weight: record.data.weight.clone(),
            stretch: record.data.stretch.clone(),
            subtype: record.native.subtype.clone(),
            embedded: record.native.embedded,
            found: record.data.found,
            fallback: strategies.get(&record.id).copied().unwrap_or_default(),
            pages: record.pages.iter().copied().collect(),
        })
        .collect()
}

/// The inventory as pretty-printed JSON.
#[cfg(feature = "serde")]
pub fn font_reports_json(reports: &[FontReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfsvg_core::{FontData, FontId, MemoryFontCatalog, NativeFontInfo};

    fn catalog() -> FontCatalog {
        let system = MemoryFontCatalog::default();
        let mut catalog = FontCatalog::new();
        let uses = [(9, "ABCDEF+Garamond-Italic", 2), (4, "Helvetica", 1), (9, "", 1)];
        for (num, name, page) in uses {
            catalog.insert_with(FontId::new(num, 0), page, || {
                let native = NativeFontInfo {
                    name: Some(name.into()),
                    subtype: "TrueType".into(),
                    embedded: true,
                    ..Default::default()
                };
                let data = FontData::new(&native, &system);
                (native, data)
            });
        }
        catalog
    }

    #[test]
    fn reports_follow_id_order() {
        let reports = font_reports(&catalog(), &FontStrategies::new());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, "4 0 R");
        assert_eq!(reports[1].name, "Garamond-Italic");
        assert_eq!(reports[1].pages, vec![1, 2]);
        assert_eq!(reports[1].fallback, FontFallback::AsTextKeepOriginalName);
        assert!(reports[1].embedded);
    }

    #[test]
    fn reports_carry_fallback_decisions() {
        let mut strategies = FontStrategies::new();
        strategies.insert(FontId::new(4, 0), FontFallback::DeleteText);
        let reports = font_reports(&catalog(), &strategies);
        assert_eq!(reports[0].fallback, FontFallback::DeleteText);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_lists_every_font() {
        let json = font_reports_json(&font_reports(&catalog(), &FontStrategies::new())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0]["name"], "Helvetica");
        assert_eq!(value[1]["fallback"], "AsTextKeepOriginalName");
    }
}
