//! Text objects.
//!
//! Glyphs are buffered between `BT` and `ET` with a snapshot of the
//! state they were shown in. At `ET` consecutive glyphs sharing a style
//! and the linear part of their run transform become one `<text>`
//! element, or one outline `<path>` when the font is rendered as shapes.

use std::rc::Rc;

use tracing::trace;

use crate::document::NodeId;
use crate::error::PdfError;
use crate::font::{FontData, FontFallback};
use crate::geometry::{Affine, Point, Rect, fmt_num};
use crate::path::{FillRule, Path};
use crate::state::GraphicsState;
use crate::text::{GlyphOutlines, TextFont};

use super::SvgBuilder;

/// One shown character, reported before the text matrix advances.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphInput {
    /// Character code from the string operand.
    pub code: u32,
    /// Unicode text for the code, possibly empty or several characters.
    pub text: String,
    /// Advance width in glyph space (1.0 = font size).
    pub width: f64,
}

impl GlyphInput {
    pub fn new(code: u32, text: impl Into<String>, width: f64) -> Self {
        Self {
            code,
            text: text.into(),
            width,
        }
    }
}

#[derive(Debug, Clone)]
struct Glyph {
    code: u32,
    text: String,
    width: f64,
    /// Glyph origin in page space.
    origin: Point,
    /// Text element space to page space.
    run_transform: Affine,
    /// Glyph space to page space.
    trm: Affine,
    font_size: f64,
    style: Rc<GraphicsState>,
    style_changed: bool,
}

#[derive(Debug, Default)]
pub(super) struct TextRun {
    glyphs: Vec<Glyph>,
    dirty: bool,
    /// Glyph outlines collected for the clip modes, in page space.
    clip: Option<Path>,
}

impl TextRun {
    pub(super) fn has_glyphs(&self) -> bool {
        !self.glyphs.is_empty()
    }
}

/// Properties that split a run when they change.
fn same_text_style(a: &GraphicsState, b: &GraphicsState) -> bool {
    a.text.font == b.text.font
        && a.text.font_size == b.text.font_size
        && a.text.render_mode == b.text.render_mode
        && a.fill == b.fill
        && a.stroke == b.stroke
        && a.fill_alpha == b.fill_alpha
        && a.stroke_alpha == b.stroke_alpha
        && a.line_width == b.line_width
        && a.blend_mode == b.blend_mode
}

fn same_linear(a: &Affine, b: &Affine) -> bool {
    a.without_translation().approx_eq(&b.without_translation())
}

/// Replace characters XML cannot carry.
fn xml_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c < ' ' && !matches!(c, '\t' | '\n' | '\r') { '\u{fffd}' } else { c })
        .collect()
}

fn css_family(family: &str) -> String {
    if family.contains(' ') { format!("'{family}'") } else { family.to_string() }
}

impl SvgBuilder<'_> {
    /// `BT`.
    pub fn begin_text_object(&mut self, _state: &GraphicsState) {
        if self.text.has_glyphs() {
            self.flush_text();
        }
        self.text = TextRun {
            dirty: true,
            ..TextRun::default()
        };
    }

    /// Force the next glyph to start a new run.
    pub fn invalidate_text_style(&mut self) {
        self.text.dirty = true;
    }

    /// Buffer one glyph shown with `state`.
    ///
    /// A space at the start of a run or after another space is dropped;
    /// the caller still advances the text position for it.
    pub fn add_char(&mut self, state: &GraphicsState, glyph: &GlyphInput) {
        let is_space = glyph.text == " ";
        if is_space && self.text.glyphs.last().is_none_or(|g| g.text == " ") {
            return;
        }
        let ts = &state.text;
        let tm = *ts.text_matrix();
        let (font_size, sign) = if ts.font_size < 0.0 {
            (-ts.font_size, -1.0)
        } else {
            (ts.font_size, 1.0)
        };
        let run_transform = Affine::new(sign, 0.0, 0.0, -sign, 0.0, 0.0)
            .multiply(&Affine::scale(ts.h_scaling_normalized(), 1.0))
            .multiply(&tm)
            .multiply(&state.ctm);
        let user = tm.multiply(&state.ctm);
        let origin = user.transform_point(Point::new(0.0, ts.rise));
        let trm = ts.font_matrix().multiply(&user);

        if ts.render_mode.clips() && !is_space {
            let outline = ts
                .font
                .as_ref()
                .and_then(|f| f.outlines.as_ref())
                .and_then(|o| o.outline(glyph.code))
                .unwrap_or_else(|| Path::from_rect(&Rect::new(0.0, -0.2, glyph.width, 0.8)));
            self.text
                .clip
                .get_or_insert_with(Path::new)
                .extend(&outline.transform(&trm));
        }

        let (style, changed) = match self.text.glyphs.last() {
            Some(prev) if same_text_style(&prev.style, state) => (Rc::clone(&prev.style), false),
            _ => (Rc::new(state.clone()), true),
        };
        self.text.glyphs.push(Glyph {
            code: glyph.code,
            text: glyph.text.clone(),
            width: glyph.width,
            origin,
            run_transform,
            trm,
            font_size,
            style,
            style_changed: changed || self.text.dirty,
        });
        self.text.dirty = false;
    }

    /// `ET`: write the buffered glyphs, then apply a text clip.
    pub fn end_text_object(&mut self, _state: &GraphicsState) -> Result<(), PdfError> {
        self.flush_text();
        let clip = self.text.clip.take();
        self.text = TextRun::default();
        if let Some(path) = clip {
            self.apply_clip(Affine::identity(), path, FillRule::NonZero)?;
        }
        Ok(())
    }

    pub(super) fn flush_text(&mut self) {
        let glyphs = std::mem::take(&mut self.text.glyphs);
        let mut start = 0;
        for i in 1..=glyphs.len() {
            let split = i == glyphs.len()
                || glyphs[i].style_changed
                || !same_linear(&glyphs[i].run_transform, &glyphs[start].run_transform);
            if split {
                self.emit_run(&glyphs[start..i]);
                start = i;
            }
        }
    }

    fn emit_run(&mut self, run: &[Glyph]) {
        let Some(first) = run.first() else {
            return;
        };
        let font = first.style.text.font.clone();
        let (data, fallback) = self.resolve_font(font.as_ref());
        trace!(glyphs = run.len(), ?fallback, font = %data.name, "text run");
        match fallback {
            FontFallback::DeleteText => {}
            FontFallback::AsVectorShapes => match font.as_ref().and_then(|f| f.outlines.clone()) {
                Some(outlines) => self.emit_glyph_shapes(run, outlines.as_ref()),
                None => {
                    let family = self.substitute_family(&data);
                    self.emit_text_element(run, &data, &family);
                }
            },
            FontFallback::AsTextKeepOriginalName => {
                let family = if data.found { data.family.clone() } else { data.name.clone() };
                self.emit_text_element(run, &data, &family);
            }
            FontFallback::AsTextSubstitute => {
                let family = self.substitute_family(&data);
                self.emit_text_element(run, &data, &family);
            }
        }
    }

    fn resolve_font(&self, font: Option<&TextFont>) -> (FontData, FontFallback) {
        let Some(font) = font else {
            return (FontData::default(), FontFallback::AsTextSubstitute);
        };
        let data = match self.fonts.catalog.get(&font.id) {
            Some(record) => record.data.clone(),
            None => FontData {
                name: font.base_name.clone(),
                ..FontData::default()
            },
        };
        let fallback = self.fonts.strategies.get(&font.id).copied().unwrap_or_default();
        (data, fallback)
    }

    fn substitute_family(&self, data: &FontData) -> String {
        if data.found {
            data.family.clone()
        } else {
            data.get_substitute(self.fonts.system)
        }
    }

    fn emit_text_element(&mut self, run: &[Glyph], data: &FontData, family: &str) {
        let first = &run[0];
        let tr = first.run_transform;
        let Some(inv) = tr.inverse() else {
            trace!("degenerate text matrix, run skipped");
            return;
        };

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut text = String::new();
        for glyph in run {
            let chars: Vec<char> = xml_safe(&glyph.text).chars().collect();
            if chars.is_empty() {
                continue;
            }
            let p = inv.transform_point(glyph.origin);
            let step = glyph.width * glyph.font_size / chars.len() as f64;
            for (k, c) in chars.iter().enumerate() {
                xs.push(fmt_num(p.x + step * k as f64));
                ys.push(fmt_num(p.y));
                text.push(*c);
            }
        }
        if text.is_empty() {
            return;
        }

        let state = Rc::clone(&first.style);
        let node = self.doc.create("text");
        self.doc.set_attr(node, "xml:space", "preserve");
        self.doc.set_attr(node, "transform", &tr.to_svg());
        self.doc.set_style(node, "font-size", &fmt_num(first.font_size));
        let family = if family.is_empty() { "sans" } else { family };
        self.doc.set_style(node, "font-family", &css_family(family));
        if !data.style.is_empty() {
            self.doc.set_style(node, "font-style", &data.style);
        }
        if !data.weight.is_empty() && data.weight != "normal" {
            self.doc.set_style(node, "font-weight", &data.weight);
        }
        if !data.stretch.is_empty() && data.stretch != "normal" {
            self.doc.set_style(node, "font-stretch", &data.stretch);
        }
        self.set_text_paint(node, &state, &tr);

        let tspan = self.doc.create_child(node, "tspan");
        self.doc.set_attr(tspan, "x", &xs.join(" "));
        let y = if ys.iter().all(|y| *y == ys[0]) { ys[0].clone() } else { ys.join(" ") };
        self.doc.set_attr(tspan, "y", &y);
        self.doc.set_text(tspan, &text);
        self.add_to_container(node, &tr);
    }

    fn emit_glyph_shapes(&mut self, run: &[Glyph], outlines: &dyn GlyphOutlines) {
        let mut combined = Path::new();
        let mut label = String::new();
        for glyph in run {
            if let Some(outline) = outlines.outline(glyph.code) {
                combined.extend(&outline.transform(&glyph.trm));
            }
            label.push_str(&glyph.text);
        }
        if combined.is_empty() {
            return;
        }
        let state = Rc::clone(&run[0].style);
        let node = self.doc.create("path");
        self.doc.set_attr(node, "d", &combined.to_svg_data());
        let label = xml_safe(&label);
        if !label.trim().is_empty() {
            self.doc.set_attr(node, "aria-label", &label);
        }
        self.set_text_paint(node, &state, &Affine::identity());
        self.add_to_container(node, &Affine::identity());
    }

    /// Fill and stroke for text drawn in element space `node_tr`.
    fn set_text_paint(&mut self, node: NodeId, state: &GraphicsState, node_tr: &Affine) {
        let mode = state.text.render_mode;
        if mode.fills() {
            self.set_fill_style(node, state, false, node_tr);
        } else {
            self.doc.set_style(node, "fill", "none");
        }
        if mode.strokes() {
            self.set_stroke_style(node, state, node_tr);
            let scale = node_tr.expansion();
            if scale > 0.0 && state.line_width > 0.0 {
                let width = state.line_width * state.ctm.expansion() / scale;
                self.doc.set_style(node, "stroke-width", &fmt_num(width));
            }
        } else {
            self.doc.set_style(node, "stroke", "none");
        }
        self.set_blend_style(node, state.blend_mode);
    }
}
