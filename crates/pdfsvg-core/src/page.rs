//! Page boxes and crop selection.

use crate::geometry::{Affine, Rect};

/// Which page box to crop the output to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CropBox {
    Media,
    Crop,
    Trim,
    Bleed,
    Art,
}

impl CropBox {
    /// Map the numeric box codes `0..=4` (media, crop, trim, bleed, art).
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Media,
            1 => Self::Crop,
            2 => Self::Trim,
            3 => Self::Bleed,
            4 => Self::Art,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Crop => "crop",
            Self::Trim => "trim",
            Self::Bleed => "bleed",
            Self::Art => "art",
        }
    }
}

impl std::str::FromStr for CropBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "media" | "mediabox" => Ok(Self::Media),
            "crop" | "cropbox" => Ok(Self::Crop),
            "trim" | "trimbox" => Ok(Self::Trim),
            "bleed" | "bleedbox" => Ok(Self::Bleed),
            "art" | "artbox" => Ok(Self::Art),
            other => Err(format!("unknown page box '{other}'")),
        }
    }
}

/// The boxes declared by a page, after inheritance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageBoxes {
    pub media: Rect,
    pub crop: Option<Rect>,
    pub trim: Option<Rect>,
    pub bleed: Option<Rect>,
    pub art: Option<Rect>,
    /// Clockwise rotation in degrees, normalized to 0, 90, 180 or 270.
    pub rotate: i32,
}

impl PageBoxes {
    pub fn new(media: Rect) -> Self {
        Self {
            media,
            crop: None,
            trim: None,
            bleed: None,
            art: None,
            rotate: 0,
        }
    }

    /// The crop box clamped to the media box, or the media box.
    pub fn effective_crop(&self) -> Rect {
        self.crop
            .and_then(|c| c.intersect(&self.media))
            .unwrap_or(self.media)
    }

    /// Resolve a box; a missing box falls back to the crop box, then the
    /// media box.
    pub fn select(&self, which: CropBox) -> Rect {
        let declared = match which {
            CropBox::Media => return self.media,
            CropBox::Crop => self.crop,
            CropBox::Trim => self.trim,
            CropBox::Bleed => self.bleed,
            CropBox::Art => self.art,
        };
        declared
            .and_then(|r| r.intersect(&self.media))
            .unwrap_or_else(|| self.effective_crop())
    }

    /// Normalize a `/Rotate` value to 0, 90, 180 or 270.
    pub fn normalize_rotation(rotate: i64) -> i32 {
        let r = rotate.rem_euclid(360);
        ((r / 90) * 90) as i32
    }
}

/// Placement of a page on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    /// The visible page area in PDF user space.
    pub view: Rect,
    /// Output width and height in points, after rotation.
    pub width: f64,
    pub height: f64,
    /// Maps PDF user space to output space (y down, origin top-left).
    pub transform: Affine,
}

impl PageFrame {
    pub fn new(view: Rect, rotate: i32) -> Self {
        let (w, h) = (view.width(), view.height());
        let to_origin = Affine::translate(-view.x0, -view.y0);
        let (rot, width, height) = match rotate {
            90 => (Affine::new(0.0, 1.0, 1.0, 0.0, 0.0, 0.0), h, w),
            180 => (Affine::new(-1.0, 0.0, 0.0, 1.0, w, 0.0), w, h),
            270 => (Affine::new(0.0, -1.0, -1.0, 0.0, h, w), h, w),
            _ => (Affine::new(1.0, 0.0, 0.0, -1.0, 0.0, h), w, h),
        };
        Self {
            view,
            width,
            height,
            transform: to_origin.multiply(&rot),
        }
    }
}
