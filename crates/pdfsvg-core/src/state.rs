//! The graphics state the builder reads at each callback.
//!
//! The interpreter owns a stack of [`GraphicsState`] values and passes
//! the current one by reference; the builder never keeps a copy beyond
//! the call, except for buffered glyphs inside a text object.

use std::rc::Rc;

use crate::color::{Color, IccColor};
use crate::geometry::Affine;
use crate::shading::Shading;
use crate::text::TextState;

/// How an area is painted.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// Separation `/None` and similar spaces.
    None,
    Solid { color: Color, icc: Option<IccColor> },
    /// A shading pattern. `matrix` maps shading space to page space.
    Shading { shading: Rc<Shading>, matrix: Affine },
    /// A tiling pattern already rendered into the output as `pattern_id`.
    /// `matrix` maps pattern space to page space.
    Tiling { pattern_id: String, matrix: Affine },
}

impl Paint {
    pub fn solid(color: Color) -> Self {
        Paint::Solid { color, icc: None }
    }

    /// SVG paint value for solid colors, with an ICC fallback when known.
    pub fn svg_color(&self) -> Option<String> {
        match self {
            Paint::Solid { color, icc: None } => Some(color.to_hex()),
            Paint::Solid {
                color,
                icc: Some(icc),
            } => {
                let comps: Vec<String> =
                    icc.components.iter().map(|c| crate::geometry::fmt_num(*c)).collect();
                Some(format!("{} icc-color({}, {})", color.to_hex(), icc.profile, comps.join(", ")))
            }
            _ => None,
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Paint::solid(Color::BLACK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => LineCap::Round,
            2 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }

    pub fn as_svg(&self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => LineJoin::Round,
            2 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }

    pub fn as_svg(&self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// Dash array and phase (`d` operator).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    pub array: Vec<f64>,
    pub phase: f64,
}

impl DashPattern {
    /// A solid line: empty array, or every entry zero.
    pub fn is_solid(&self) -> bool {
        self.array.iter().all(|d| *d <= 0.0)
    }
}

/// PDF blend modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        Some(match name {
            "Normal" | "Compatible" => Self::Normal,
            "Multiply" => Self::Multiply,
            "Screen" => Self::Screen,
            "Overlay" => Self::Overlay,
            "Darken" => Self::Darken,
            "Lighten" => Self::Lighten,
            "ColorDodge" => Self::ColorDodge,
            "ColorBurn" => Self::ColorBurn,
            "HardLight" => Self::HardLight,
            "SoftLight" => Self::SoftLight,
            "Difference" => Self::Difference,
            "Exclusion" => Self::Exclusion,
            "Hue" => Self::Hue,
            "Saturation" => Self::Saturation,
            "Color" => Self::Color,
            "Luminosity" => Self::Luminosity,
            _ => return None,
        })
    }

    /// CSS `mix-blend-mode` keyword.
    pub fn as_css(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color-dodge",
            Self::ColorBurn => "color-burn",
            Self::HardLight => "hard-light",
            Self::SoftLight => "soft-light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
            Self::Hue => "hue",
            Self::Saturation => "saturation",
            Self::Color => "color",
            Self::Luminosity => "luminosity",
        }
    }
}

/// Everything the builder needs to know about the graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// User space to page space.
    pub ctm: Affine,
    pub fill: Paint,
    pub stroke: Paint,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash: DashPattern,
    pub blend_mode: BlendMode,
    /// An `/SMask` other than `/None` is active.
    pub soft_mask: bool,
    pub text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Affine::identity(),
            fill: Paint::default(),
            stroke: Paint::default(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            dash: DashPattern::default(),
            blend_mode: BlendMode::default(),
            soft_mask: false,
            text: TextState::new(),
        }
    }
}

impl GraphicsState {
    pub fn with_ctm(ctm: Affine) -> Self {
        Self {
            ctm,
            ..Self::default()
        }
    }
}
