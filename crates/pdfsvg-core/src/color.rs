//! Colors and resolved color spaces.
//!
//! Every paint ends up as an sRGB [`Color`] for the SVG output. Colors
//! painted through an ICC-based space additionally keep their original
//! components as an [`IccColor`] so the output can carry `icc-color()`.

use crate::function::{PdfFunction, clamp_between};

/// An sRGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: clamp_between(r, 0.0, 1.0),
            g: clamp_between(g, 0.0, 1.0),
            b: clamp_between(b, 0.0, 1.0),
        }
    }

    pub fn gray(g: f64) -> Self {
        Self::rgb(g, g, g)
    }

    /// Naive CMYK conversion, as used by most viewers without a profile.
    pub fn cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        Self::rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }

    /// CIE L*a*b* (D65 white point assumed) to sRGB.
    pub fn lab(l: f64, a: f64, b: f64) -> Self {
        let fy = (l + 16.0) / 116.0;
        let fx = fy + a / 500.0;
        let fz = fy - b / 200.0;
        let inv = |t: f64| {
            let t3 = t * t * t;
            if t3 > 0.008856 { t3 } else { (t - 16.0 / 116.0) / 7.787 }
        };
        let (x, y, z) = (0.95047 * inv(fx), inv(fy), 1.08883 * inv(fz));
        let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
        let g = -0.9689 * x + 1.8758 * y + 0.0415 * z;
        let bl = 0.0557 * x - 0.2040 * y + 1.0570 * z;
        let gamma = |c: f64| {
            if c <= 0.0031308 { 12.92 * c } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 }
        };
        Self::rgb(gamma(r), gamma(g), gamma(bl))
    }

    /// The `#rrggbb` hex notation.
    pub fn to_hex(&self) -> String {
        let byte = |v: f64| (clamp_between(v, 0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let byte = |v: f64| (clamp_between(v, 0.0, 1.0) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b)]
    }

    /// Largest per-channel difference.
    pub fn distance(&self, other: &Color) -> f64 {
        (self.r - other.r)
            .abs()
            .max((self.g - other.g).abs())
            .max((self.b - other.b).abs())
    }

    /// Channel-wise average of several colors.
    pub fn average(colors: &[Color]) -> Color {
        if colors.is_empty() {
            return Color::BLACK;
        }
        let n = colors.len() as f64;
        let (r, g, b) = colors
            .iter()
            .fold((0.0, 0.0, 0.0), |(r, g, b), c| (r + c.r, g + c.g, b + c.b));
        Color::rgb(r / n, g / n, b / n)
    }

    /// ITU-R BT.601 luminance, used for luminosity masks.
    pub fn luminance(&self) -> f64 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }
}

/// Original components of a color painted in an ICC-based space.
#[derive(Debug, Clone, PartialEq)]
pub struct IccColor {
    /// Name under which the profile was registered in the output.
    pub profile: String,
    pub components: Vec<f64>,
}

/// A resolved color space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    /// CIE-based Lab.
    Lab,
    /// ICC-based space converted through its alternate.
    IccBased {
        num_components: u32,
        alternate: Box<ColorSpace>,
        /// Registered profile name, once the profile is known to the output.
        profile: Option<String>,
    },
    /// Palette lookup into a base space.
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// Spot colors mapped through a tint transform.
    Separation {
        num_components: u32,
        alternate: Box<ColorSpace>,
        tint_transform: Option<PdfFunction>,
        /// `/None` separations paint nothing.
        none: bool,
    },
    /// Pattern space, with the underlying space of uncolored patterns.
    Pattern(Option<Box<ColorSpace>>),
}

impl ColorSpace {
    /// Number of color components an operand list carries.
    pub fn num_components(&self) -> u32 {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB | ColorSpace::Lab => 3,
            ColorSpace::DeviceCMYK => 4,
            ColorSpace::IccBased { num_components, .. } => *num_components,
            ColorSpace::Indexed { .. } => 1,
            ColorSpace::Separation { num_components, .. } => *num_components,
            ColorSpace::Pattern(base) => base.as_ref().map_or(0, |b| b.num_components()),
        }
    }

    /// Initial color after `cs`/`CS`.
    pub fn initial_components(&self) -> Vec<f64> {
        match self {
            ColorSpace::DeviceCMYK => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Separation { num_components, .. } => vec![1.0; *num_components as usize],
            other => vec![0.0; other.num_components() as usize],
        }
    }

    /// Default space for a component count.
    pub fn from_component_count(n: usize) -> ColorSpace {
        match n {
            3 => ColorSpace::DeviceRGB,
            4 => ColorSpace::DeviceCMYK,
            _ => ColorSpace::DeviceGray,
        }
    }

    /// Whether colors in this space paint nothing.
    pub fn paints_nothing(&self) -> bool {
        matches!(self, ColorSpace::Separation { none: true, .. })
    }

    /// Convert components to sRGB.
    pub fn to_rgb(&self, components: &[f64]) -> Color {
        let c = |i: usize| components.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray => Color::gray(c(0)),
            ColorSpace::DeviceRGB => Color::rgb(c(0), c(1), c(2)),
            ColorSpace::DeviceCMYK => Color::cmyk(c(0), c(1), c(2), c(3)),
            ColorSpace::Lab => Color::lab(c(0), c(1), c(2)),
            ColorSpace::IccBased { alternate, .. } => alternate.to_rgb(components),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (c(0).round().max(0.0) as u32).min(*hival) as usize;
                let n = base.num_components() as usize;
                let offset = index * n;
                match lookup.get(offset..offset + n) {
                    Some(entry) => {
                        let comps: Vec<f64> = entry.iter().map(|&b| f64::from(b) / 255.0).collect();
                        base.to_rgb(&comps)
                    }
                    None => Color::BLACK,
                }
            }
            ColorSpace::Separation {
                alternate,
                tint_transform,
                ..
            } => match tint_transform {
                Some(f) => alternate.to_rgb(&f.eval(components)),
                None => {
                    // Without a transform, treat the tint as ink coverage.
                    Color::gray(1.0 - c(0))
                }
            },
            ColorSpace::Pattern(Some(base)) => base.to_rgb(components),
            ColorSpace::Pattern(None) => Color::BLACK,
        }
    }

    /// Components decoded from a raw 8-bit image sample.
    pub fn decode_default(&self) -> Vec<f64> {
        match self {
            ColorSpace::Indexed { hival, .. } => vec![0.0, f64::from(*hival)],
            ColorSpace::Lab => vec![0.0, 100.0, -100.0, 100.0, -100.0, 100.0],
            other => {
                let n = other.num_components() as usize;
                (0..n).flat_map(|_| [0.0, 1.0]).collect()
            }
        }
    }

    /// The ICC color carried alongside sRGB, when this is a registered
    /// ICC-based space.
    pub fn icc_color(&self, components: &[f64]) -> Option<IccColor> {
        match self {
            ColorSpace::IccBased {
                profile: Some(name),
                ..
            } => Some(IccColor {
                profile: name.clone(),
                components: components.to_vec(),
            }),
            _ => None,
        }
    }
}
