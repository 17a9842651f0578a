//! ICC profile registration.
//!
//! Only the profile header and its description tag are read; colors are
//! still converted through the alternate space.

use std::collections::BTreeMap;

/// Description of an ICC profile (`desc` tag), if present and readable.
///
/// Handles both the version 2 `textDescriptionType` and the version 4
/// `multiLocalizedUnicodeType`.
pub fn profile_description(data: &[u8]) -> Option<String> {
    let be32 = |at: usize| -> Option<u32> {
        data.get(at..at + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    };
    let tag_count = be32(128)? as usize;
    for i in 0..tag_count.min(1024) {
        let entry = 132 + i * 12;
        if data.get(entry..entry + 4)? != b"desc" {
            continue;
        }
        let offset = be32(entry + 4)? as usize;
        let size = be32(entry + 8)? as usize;
        let tag = data.get(offset..offset.checked_add(size)?)?;
        return match tag.get(0..4)? {
            b"desc" => {
                let len = u32::from_be_bytes(tag.get(8..12)?.try_into().ok()?) as usize;
                let text = tag.get(12..12 + len)?;
                let text: Vec<u8> = text.iter().copied().take_while(|b| *b != 0).collect();
                Some(String::from_utf8_lossy(&text).into_owned())
            }
            b"mluc" => {
                let records = u32::from_be_bytes(tag.get(8..12)?.try_into().ok()?);
                if records == 0 {
                    return None;
                }
                let len = u32::from_be_bytes(tag.get(20..24)?.try_into().ok()?) as usize;
                let off = u32::from_be_bytes(tag.get(24..28)?.try_into().ok()?) as usize;
                let raw = tag.get(off..off + len)?;
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units).trim_end_matches('\0').to_string())
            }
            _ => None,
        };
    }
    None
}

/// Turn a description into something usable as an SVG profile name.
pub fn sanitize_profile_name(desc: &str) -> String {
    let name: String = desc
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let name = name.trim_matches('-').to_string();
    if name.is_empty() { "icc-profile".to_string() } else { name }
}

/// Distinct profiles seen in one document, keyed by their bytes.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    by_data: BTreeMap<Vec<u8>, String>,
    names: BTreeMap<String, usize>,
}

impl ProfileRegistry {
    /// Name for `data`, and whether it was newly registered.
    pub fn register(&mut self, data: &[u8]) -> (String, bool) {
        if let Some(name) = self.by_data.get(data) {
            return (name.clone(), false);
        }
        let base = sanitize_profile_name(&profile_description(data).unwrap_or_default());
        let count = self.names.entry(base.clone()).or_insert(0);
        *count += 1;
        let name = if *count == 1 { base } else { format!("{base}-{count}") };
        self.by_data.insert(data.to_vec(), name.clone());
        (name, true)
    }

    pub fn len(&self) -> usize {
        self.by_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_data.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_profile(desc: &str) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data.extend_from_slice(&1u32.to_be_bytes());
    let tag_offset = 128 + 4 + 12;
    let mut tag = Vec::new();
    tag.extend_from_slice(b"desc");
    tag.extend_from_slice(&[0; 4]);
    tag.extend_from_slice(&((desc.len() + 1) as u32).to_be_bytes());
    tag.extend_from_slice(desc.as_bytes());
    tag.push(0);
    data.extend_from_slice(b"desc");
    data.extend_from_slice(&(tag_offset as u32).to_be_bytes());
    data.extend_from_slice(&(tag.len() as u32).to_be_bytes());
    data.extend_from_slice(&tag);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_v2_description() {
        let profile = test_profile("sRGB IEC61966-2.1");
        assert_eq!(profile_description(&profile).as_deref(), Some("sRGB IEC61966-2.1"));
    }

    #[test]
    fn truncated_profile_has_no_description() {
        assert_eq!(profile_description(&[0; 64]), None);
        let mut p = test_profile("x");
        p.truncate(140);
        assert_eq!(profile_description(&p), None);
    }

    #[test]
    fn sanitized_names() {
        assert_eq!(sanitize_profile_name("sRGB IEC61966-2.1"), "sRGB-IEC61966-2.1");
        assert_eq!(sanitize_profile_name("  "), "icc-profile");
    }

    #[test]
    fn registry_dedupes_by_content() {
        let mut reg = ProfileRegistry::default();
        let a = test_profile("Coated");
        let mut b = test_profile("Coated");
        b[0] = 1;
        assert_eq!(reg.register(&a), ("Coated".to_string(), true));
        assert_eq!(reg.register(&a), ("Coated".to_string(), false));
        assert_eq!(reg.register(&b), ("Coated-2".to_string(), true));
        assert_eq!(reg.len(), 2);
    }
}
