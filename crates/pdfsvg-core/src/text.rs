//! Text state carried in the graphics state.
//!
//! Implements the PDF text state model: text object tracking (BT/ET),
//! font selection (Tf), text matrix (Tm) and line matrix management,
//! and text positioning operators (Td, TD, T*).

use std::fmt;
use std::rc::Rc;

use crate::font::FontId;
use crate::geometry::Affine;
use crate::path::Path;

/// Text rendering mode values (Tr operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    /// Fill character glyphs (default).
    #[default]
    Fill = 0,
    Stroke = 1,
    FillStroke = 2,
    /// Neither fill nor stroke.
    Invisible = 3,
    FillClip = 4,
    StrokeClip = 5,
    FillStrokeClip = 6,
    /// Add to clipping path only.
    Clip = 7,
}

impl TextRenderMode {
    /// Create a TextRenderMode from an integer value (0-7).
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Fill),
            1 => Some(Self::Stroke),
            2 => Some(Self::FillStroke),
            3 => Some(Self::Invisible),
            4 => Some(Self::FillClip),
            5 => Some(Self::StrokeClip),
            6 => Some(Self::FillStrokeClip),
            7 => Some(Self::Clip),
            _ => None,
        }
    }

    pub fn fills(&self) -> bool {
        matches!(self, Self::Fill | Self::FillStroke | Self::FillClip | Self::FillStrokeClip)
    }

    pub fn strokes(&self) -> bool {
        matches!(self, Self::Stroke | Self::FillStroke | Self::StrokeClip | Self::FillStrokeClip)
    }

    /// Modes 4 to 7 add glyph outlines to the clip.
    pub fn clips(&self) -> bool {
        (*self as u8) >= 4
    }
}

/// Source of glyph outlines for rendering text as shapes.
pub trait GlyphOutlines: fmt::Debug {
    /// Outline of the glyph for character `code`, in glyph space scaled
    /// so that one unit equals the font size (1000 font units = 1.0).
    fn outline(&self, code: u32) -> Option<Path>;
}

/// The font selected with `Tf`.
#[derive(Debug, Clone)]
pub struct TextFont {
    pub id: FontId,
    /// Resource name used with `Tf`.
    pub resource_name: String,
    /// `/BaseFont` with the subset tag removed.
    pub base_name: String,
    /// Outlines from the embedded font program, when it could be read.
    pub outlines: Option<Rc<dyn GlyphOutlines>>,
    /// Vertical writing mode (`Identity-V` and similar CMaps).
    pub vertical: bool,
}

impl PartialEq for TextFont {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.resource_name == other.resource_name
    }
}

/// Text state parameters. Everything except the matrices and the
/// text-object flag is saved and restored by `q`/`Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Character spacing (Tc).
    pub char_spacing: f64,
    /// Word spacing (Tw).
    pub word_spacing: f64,
    /// Horizontal scaling (Tz) as a percentage.
    pub h_scaling: f64,
    /// Text leading (TL).
    pub leading: f64,
    pub font: Option<TextFont>,
    pub font_size: f64,
    pub render_mode: TextRenderMode,
    /// Text rise (Ts).
    pub rise: f64,
    in_text_object: bool,
    text_matrix: Affine,
    line_matrix: Affine,
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

impl TextState {
    pub fn new() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 100.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            render_mode: TextRenderMode::default(),
            rise: 0.0,
            in_text_object: false,
            text_matrix: Affine::identity(),
            line_matrix: Affine::identity(),
        }
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    pub fn text_matrix(&self) -> &Affine {
        &self.text_matrix
    }

    pub fn line_matrix(&self) -> &Affine {
        &self.line_matrix
    }

    /// Horizontal scaling as a fraction (1.0 = 100%).
    pub fn h_scaling_normalized(&self) -> f64 {
        self.h_scaling / 100.0
    }

    /// Glyph space to text space: `[Tfs*Th 0 0 Tfs 0 Trise]`.
    pub fn font_matrix(&self) -> Affine {
        Affine::new(
            self.font_size * self.h_scaling_normalized(),
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        )
    }

    /// Text rendering matrix without the CTM: font matrix times Tm.
    pub fn rendering_matrix(&self) -> Affine {
        self.font_matrix().multiply(&self.text_matrix)
    }

    // --- BT / ET ---

    pub fn begin_text(&mut self) {
        self.text_matrix = Affine::identity();
        self.line_matrix = Affine::identity();
        self.in_text_object = true;
    }

    pub fn end_text(&mut self) {
        self.in_text_object = false;
    }

    // --- Tf ---

    pub fn set_font(&mut self, font: Option<TextFont>, font_size: f64) {
        self.font = font;
        self.font_size = font_size;
    }

    // --- Tm ---

    /// Replace both the text matrix and the line matrix.
    pub fn set_text_matrix(&mut self, m: Affine) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    // --- Td / TD / T* ---

    pub fn move_text_position(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Affine::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `TD`: sets leading to `-ty`, then moves like `Td`.
    pub fn move_text_position_and_set_leading(&mut self, tx: f64, ty: f64) {
        self.leading = -ty;
        self.move_text_position(tx, ty);
    }

    pub fn move_to_next_line(&mut self) {
        let leading = self.leading;
        self.move_text_position(0.0, -leading);
    }

    // --- glyph advance ---

    /// Move the text matrix by a displacement in unscaled text space.
    pub fn advance(&mut self, tx: f64, ty: f64) {
        self.text_matrix = Affine::translate(tx, ty).multiply(&self.text_matrix);
    }

    /// Horizontal displacement after a glyph of width `w0` (glyph units / 1000).
    ///
    /// `(w0 * Tfs + Tc + Tw) * Th`, where `Tw` only applies to single-byte code 32.
    pub fn horizontal_advance(&self, w0: f64, is_word_space: bool) -> f64 {
        let tw = if is_word_space { self.word_spacing } else { 0.0 };
        (w0 * self.font_size + self.char_spacing + tw) * self.h_scaling_normalized()
    }

    /// Vertical displacement after a glyph of height `w1` in vertical mode.
    pub fn vertical_advance(&self, w1: f64, is_word_space: bool) -> f64 {
        let tw = if is_word_space { self.word_spacing } else { 0.0 };
        w1 * self.font_size + self.char_spacing + tw
    }

    /// Carry the non-matrix parameters of `saved` back into this state.
    ///
    /// Used by `Q` inside a text object, where the matrices survive.
    pub fn restore_parameters(&mut self, saved: &TextState) {
        let (text, line, in_text) = (self.text_matrix, self.line_matrix, self.in_text_object);
        *self = saved.clone();
        self.text_matrix = text;
        self.line_matrix = line;
        self.in_text_object = in_text;
    }
}
