//! Content stream interpreter.
//!
//! [`PageInterpreter`] executes the operators of a page (and of the form
//! XObjects, patterns and soft masks it reaches) against its own PDF
//! graphics state stack and reports every state change and painting
//! operation to an [`SvgBuilder`].
//!
//! Failures local to one operator become warnings on the builder and the
//! operator paints nothing. Only builder invariant violations end the
//! page.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::{Dictionary, Object, ObjectId, Stream};
use pdfsvg_core::{
    Affine, BlendMode, Color, ColorSpace, DashPattern, FillRule, FontId, GlyphInput, GraphicsState,
    GroupOptions, ImportWarningCode, LineCap, LineJoin, Paint, Path, PathBuilder, PdfError,
    Shading, SvgBuilder, TextRenderMode, TilingPatternInfo, ctm_to_affine,
};
use tracing::{debug, trace, warn};

use crate::color_space::ColorSpaceResolver;
use crate::error::BackendError;
use crate::font_catalog::resource_fonts;
use crate::fonts::PdfFont;
use crate::images::{DecodedImage, ImageMask, inline_image_stream, read_image};
use crate::lopdf_backend::{
    as_dict_like, dict_bool, dict_f64, dict_get, dict_name, name_of, numbers, object_to_f64,
    rect_from, resolve, stream_data,
};
use crate::shading::parse_shading;
use crate::tokenizer::{Lexer, Operand, Operator};

/// Resolver type used by the interpreter; profiles go to the builder.
type Spaces<'d, 'r> = ColorSpaceResolver<'d, &'r mut dyn FnMut(&[u8]) -> String>;

/// Limits applied while interpreting one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Maximum nesting of form XObjects, patterns and soft masks.
    pub max_recursion_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self { max_recursion_depth: 12 }
    }
}

/// Key under which an optional content group is registered with the
/// builder and looked up by marked content.
pub fn optional_group_key(id: ObjectId) -> String {
    format!("{} {} R", id.0, id.1)
}

/// The PDF-side state saved by `q`.
#[derive(Debug, Clone)]
struct InterpState {
    gs: GraphicsState,
    fill_space: ColorSpace,
    stroke_space: ColorSpace,
    fill_components: Vec<f64>,
    stroke_components: Vec<f64>,
    font: Option<Rc<PdfFont>>,
}

impl InterpState {
    fn new(ctm: Affine) -> Self {
        Self {
            gs: GraphicsState::with_ctm(ctm),
            fill_space: ColorSpace::DeviceGray,
            stroke_space: ColorSpace::DeviceGray,
            fill_components: vec![0.0],
            stroke_components: vec![0.0],
            font: None,
        }
    }
}

/// Whether a painting operator fills, strokes, or both.
#[derive(Debug, Clone, Copy)]
struct PaintOp {
    fill: bool,
    stroke: bool,
    even_odd: bool,
    close: bool,
}

impl PaintOp {
    const fn new(fill: bool, stroke: bool, even_odd: bool, close: bool) -> Self {
        Self {
            fill,
            stroke,
            even_odd,
            close,
        }
    }
}

fn op_error(msg: impl Into<String>) -> BackendError {
    BackendError::Interpreter(msg.into())
}

fn is_fatal(err: &BackendError) -> bool {
    matches!(err, BackendError::Core(PdfError::Invariant(_)))
}

fn warning_code(err: &BackendError) -> ImportWarningCode {
    match err {
        BackendError::Font(_) => ImportWarningCode::MissingFont,
        BackendError::Core(PdfError::ResourceLimitExceeded { .. }) => {
            ImportWarningCode::ResourceLimitReached
        }
        _ => ImportWarningCode::MalformedObject,
    }
}

fn num(op: &Operator, index: usize) -> Result<f64, BackendError> {
    op.num(index)
        .ok_or_else(|| op_error(format!("{} expects a number at operand {index}", op.name)))
}

fn nums<const N: usize>(op: &Operator) -> Result<[f64; N], BackendError> {
    let mut out = [0.0; N];
    if op.operands.len() < N {
        let got = op.operands.len();
        return Err(op_error(format!("{} expects {N} operands, got {got}", op.name)));
    }
    // Operands are taken from the end, as extra leading ones are ignored.
    let offset = op.operands.len() - N;
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = num(op, offset + i)?;
    }
    Ok(out)
}

fn name<'o>(op: &'o Operator, index: usize) -> Result<&'o str, BackendError> {
    op.name_operand(index)
        .ok_or_else(|| op_error(format!("{} expects a name at operand {index}", op.name)))
}

/// Drives an [`SvgBuilder`] from content streams.
pub struct PageInterpreter<'d, 'b, 'f> {
    doc: &'d lopdf::Document,
    builder: &'b mut SvgBuilder<'f>,
    options: InterpreterOptions,
    resources: Option<&'d Dictionary>,
    state: InterpState,
    stack: Vec<InterpState>,
    /// Stack height below which `Q` is ignored in the running stream.
    floor: usize,
    /// CTM at the start of the running stream; the pattern space.
    base_ctm: Affine,
    path: PathBuilder,
    pending_clip: Option<FillRule>,
    fonts: HashMap<FontId, Option<Rc<PdfFont>>>,
    shadings: HashMap<ObjectId, Rc<Shading>>,
    tiling: HashMap<(ObjectId, Option<String>), String>,
    depth: usize,
    /// Open `BX` sections; unknown operators are silent inside them.
    compat: usize,
}

impl std::fmt::Debug for PageInterpreter<'_, '_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageInterpreter")
            .field("depth", &self.depth)
            .field("stack", &self.stack.len())
            .field("fonts", &self.fonts.len())
            .finish_non_exhaustive()
    }
}

impl<'d, 'b, 'f> PageInterpreter<'d, 'b, 'f> {
    pub fn new(
        doc: &'d lopdf::Document,
        builder: &'b mut SvgBuilder<'f>,
        options: InterpreterOptions,
    ) -> Self {
        Self {
            doc,
            builder,
            options,
            resources: None,
            state: InterpState::new(Affine::identity()),
            stack: Vec::new(),
            floor: 0,
            base_ctm: Affine::identity(),
            path: PathBuilder::new(),
            pending_clip: None,
            fonts: HashMap::new(),
            shadings: HashMap::new(),
            tiling: HashMap::new(),
            depth: 0,
            compat: 0,
        }
    }

    /// Interpret a page content stream with the page's resources.
    ///
    /// # Errors
    ///
    /// Only builder invariant violations are returned; everything else is
    /// recorded as a warning.
    pub fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'d Dictionary>,
    ) -> Result<(), BackendError> {
        self.resources = resources;
        self.execute_stream(content)?;
        while self.stack.len() > self.floor {
            debug!(open = self.stack.len() - self.floor, "closing unbalanced saves at end of page");
            self.restore()?;
        }
        Ok(())
    }

    fn execute_stream(&mut self, content: &[u8]) -> Result<(), BackendError> {
        for item in Lexer::new(content) {
            let op = match item {
                Ok(op) => op,
                Err(e) => {
                    warn!(error = %e, "content stream truncated");
                    let msg = format!("content stream truncated: {e}");
                    self.builder.warn(ImportWarningCode::MalformedObject, msg);
                    break;
                }
            };
            if let Err(e) = self.execute(&op) {
                if is_fatal(&e) {
                    return Err(e);
                }
                debug!(operator = %op.name, error = %e, "operator skipped");
                self.builder.warn_at(warning_code(&e), &op.name, e.to_string());
            }
        }
        Ok(())
    }

    fn execute(&mut self, op: &Operator) -> Result<(), BackendError> {
        match op.name.as_str() {
            // --- Graphics state operators ---
            "q" => self.save(),
            "Q" => self.restore()?,
            "cm" => {
                let m = nums::<6>(op)?;
                self.state.gs.ctm = ctm_to_affine(&m).multiply(&self.state.gs.ctm);
            }
            "w" => self.state.gs.line_width = num(op, 0)?,
            "J" => self.state.gs.line_cap = LineCap::from_i64(num(op, 0)? as i64),
            "j" => self.state.gs.line_join = LineJoin::from_i64(num(op, 0)? as i64),
            "M" => self.state.gs.miter_limit = num(op, 0)?,
            "d" => {
                let array = match op.operands.first() {
                    Some(Operand::Array(items)) => {
                        items.iter().filter_map(Operand::as_f64).collect()
                    }
                    _ => return Err(op_error("d expects a dash array")),
                };
                let phase = op.num(1).unwrap_or(0.0);
                self.state.gs.dash = DashPattern { array, phase };
            }
            "gs" => self.apply_ext_gstate(name(op, 0)?)?,
            "ri" | "i" => {}

            // --- Path construction ---
            "m" => {
                let [x, y] = nums(op)?;
                self.path.move_to(x, y);
            }
            "l" => {
                let [x, y] = nums(op)?;
                self.path.line_to(x, y);
            }
            "c" => {
                let [x1, y1, x2, y2, x3, y3] = nums(op)?;
                self.path.curve_to(x1, y1, x2, y2, x3, y3);
            }
            "v" => {
                let [x2, y2, x3, y3] = nums(op)?;
                self.path.curve_to_v(x2, y2, x3, y3);
            }
            "y" => {
                let [x1, y1, x3, y3] = nums(op)?;
                self.path.curve_to_y(x1, y1, x3, y3);
            }
            "h" => self.path.close_path(),
            "re" => {
                let [x, y, w, h] = nums(op)?;
                self.path.rectangle(x, y, w, h);
            }

            // --- Path painting ---
            "S" => self.paint(PaintOp::new(false, true, false, false))?,
            "s" => self.paint(PaintOp::new(false, true, false, true))?,
            "f" | "F" => self.paint(PaintOp::new(true, false, false, false))?,
            "f*" => self.paint(PaintOp::new(true, false, true, false))?,
            "B" => self.paint(PaintOp::new(true, true, false, false))?,
            "B*" => self.paint(PaintOp::new(true, true, true, false))?,
            "b" => self.paint(PaintOp::new(true, true, false, true))?,
            "b*" => self.paint(PaintOp::new(true, true, true, true))?,
            "n" => self.paint(PaintOp::new(false, false, false, false))?,

            // --- Clipping ---
            "W" => self.pending_clip = Some(FillRule::NonZero),
            "W*" => self.pending_clip = Some(FillRule::EvenOdd),

            // --- Text objects ---
            "BT" => {
                self.state.gs.text.begin_text();
                self.builder.begin_text_object(&self.state.gs);
            }
            "ET" => {
                self.state.gs.text.end_text();
                self.builder.end_text_object(&self.state.gs)?;
            }

            // --- Text state ---
            "Tc" => self.state.gs.text.char_spacing = num(op, 0)?,
            "Tw" => self.state.gs.text.word_spacing = num(op, 0)?,
            "Tz" => self.state.gs.text.h_scaling = num(op, 0)?,
            "TL" => self.state.gs.text.leading = num(op, 0)?,
            "Ts" => self.state.gs.text.rise = num(op, 0)?,
            "Tr" => {
                let mode = num(op, 0)? as i64;
                self.state.gs.text.render_mode = TextRenderMode::from_i64(mode)
                    .ok_or_else(|| op_error(format!("invalid render mode {mode}")))?;
            }
            "Tf" => self.set_font(name(op, 0)?, num(op, 1)?)?,

            // --- Text positioning ---
            "Td" => {
                let [tx, ty] = nums(op)?;
                self.state.gs.text.move_text_position(tx, ty);
            }
            "TD" => {
                let [tx, ty] = nums(op)?;
                self.state.gs.text.move_text_position_and_set_leading(tx, ty);
            }
            "Tm" => {
                let m = nums::<6>(op)?;
                self.state.gs.text.set_text_matrix(Affine::from_ctm(m));
            }
            "T*" => self.state.gs.text.move_to_next_line(),

            // --- Text showing ---
            "Tj" => self.show_text(string_operand(op, 0)?)?,
            "TJ" => self.show_text_array(op)?,
            "'" => {
                self.state.gs.text.move_to_next_line();
                self.show_text(string_operand(op, 0)?)?;
            }
            "\"" => {
                let aw = num(op, 0)?;
                let ac = num(op, 1)?;
                self.state.gs.text.word_spacing = aw;
                self.state.gs.text.char_spacing = ac;
                self.state.gs.text.move_to_next_line();
                self.show_text(string_operand(op, 2)?)?;
            }

            // --- Type 3 glyph metrics ---
            "d0" | "d1" => {}

            // --- Color ---
            "CS" => self.set_color_space(name(op, 0)?, true)?,
            "cs" => self.set_color_space(name(op, 0)?, false)?,
            "SC" | "SCN" => self.set_color(op, true)?,
            "sc" | "scn" => self.set_color(op, false)?,
            "G" => self.set_device_color(ColorSpace::DeviceGray, &nums::<1>(op)?, true),
            "g" => self.set_device_color(ColorSpace::DeviceGray, &nums::<1>(op)?, false),
            "RG" => self.set_device_color(ColorSpace::DeviceRGB, &nums::<3>(op)?, true),
            "rg" => self.set_device_color(ColorSpace::DeviceRGB, &nums::<3>(op)?, false),
            "K" => self.set_device_color(ColorSpace::DeviceCMYK, &nums::<4>(op)?, true),
            "k" => self.set_device_color(ColorSpace::DeviceCMYK, &nums::<4>(op)?, false),

            // --- XObjects, shadings, inline images ---
            "Do" => self.handle_do(name(op, 0)?)?,
            "sh" => self.handle_sh(name(op, 0)?)?,
            "BI" => self.handle_inline_image(op)?,

            // --- Marked content ---
            "BMC" => self.builder.begin_marked_content(name(op, 0)?, None),
            "BDC" => {
                let tag = name(op, 0)?;
                let group = self.marked_content_group(tag, op.operands.get(1));
                self.builder.begin_marked_content(tag, group.as_deref());
            }
            "EMC" => self.builder.end_marked_content()?,
            "MP" | "DP" => {}

            // --- Compatibility ---
            "BX" => self.compat += 1,
            "EX" => self.compat = self.compat.saturating_sub(1),

            other => {
                if self.compat == 0 {
                    self.builder.warn_at(
                        ImportWarningCode::UnsupportedOperator,
                        other,
                        format!("unknown operator {other}"),
                    );
                } else {
                    trace!(operator = other, "unknown operator inside BX/EX");
                }
            }
        }
        Ok(())
    }

    // --- q / Q ---

    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.builder.save_state(&self.state.gs);
    }

    fn restore(&mut self) -> Result<(), BackendError> {
        if self.stack.len() <= self.floor {
            warn!("Q without matching q ignored");
            self.builder
                .warn_at(ImportWarningCode::UnbalancedState, "Q", "restore without matching save");
            return Ok(());
        }
        let Some(saved) = self.stack.pop() else {
            return Ok(());
        };
        let mut text = self.state.gs.text.clone();
        let in_text = text.in_text_object();
        self.state = saved;
        if in_text {
            // Matrices live in the text object, not the saved state.
            text.restore_parameters(&self.state.gs.text);
            self.state.gs.text = text;
        }
        self.builder.restore_state(&self.state.gs)?;
        Ok(())
    }

    // --- paths ---

    fn paint(&mut self, op: PaintOp) -> Result<(), BackendError> {
        if op.close {
            self.path.close_path();
        }
        let path = self.path.take_and_reset();
        let clip = self.pending_clip.take();
        if path.is_empty() {
            return Ok(());
        }
        if op.fill || op.stroke {
            self.builder
                .add_path(&self.state.gs, &path, op.fill, op.stroke, op.even_odd)?;
        }
        // The new clip takes effect after the path is painted.
        if let Some(rule) = clip {
            self.builder.set_clip(&self.state.gs, &path, rule)?;
        }
        Ok(())
    }

    // --- resources ---

    fn resource(&self, category: &[u8], key: &str) -> Option<&'d Object> {
        let doc = self.doc;
        let dict = self.resources.and_then(|r| dict_get(doc, r, category)).and_then(as_dict_like)?;
        dict.get(key.as_bytes()).ok()
    }

    fn with_spaces<R>(&mut self, f: impl FnOnce(&mut Spaces<'d, '_>) -> R) -> R {
        let builder = &mut *self.builder;
        let mut register = |data: &[u8]| builder.add_color_profile(data);
        let mut spaces = ColorSpaceResolver::new(
            self.doc,
            self.resources,
            &mut register as &mut dyn FnMut(&[u8]) -> String,
        );
        f(&mut spaces)
    }

    // --- text ---

    fn set_font(&mut self, resource_name: &str, size: f64) -> Result<(), BackendError> {
        let doc = self.doc;
        let entry = self.resources.and_then(|r| {
            resource_fonts(doc, r)
                .into_iter()
                .find(|f| f.name == resource_name.as_bytes())
        });
        let Some(entry) = entry else {
            self.state.font = None;
            self.state.gs.text.set_font(None, size);
            return Err(BackendError::Font(format!("font /{resource_name} not found in resources")));
        };
        let font = match self.fonts.get(&entry.id) {
            Some(cached) => cached.clone(),
            None => {
                let loaded = match PdfFont::load(doc, entry.dict, entry.id) {
                    Ok(font) => Some(Rc::new(font)),
                    Err(e) => {
                        self.builder.warn_at(
                            ImportWarningCode::MissingFont,
                            "Tf",
                            format!("font /{resource_name} unusable: {e}"),
                        );
                        None
                    }
                };
                self.fonts.insert(entry.id, loaded.clone());
                loaded
            }
        };
        let text_font = font.as_ref().map(|f| f.text_font(resource_name));
        self.state.font = font;
        self.state.gs.text.set_font(text_font, size);
        Ok(())
    }

    fn show_text(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        let Some(font) = self.state.font.clone() else {
            return Err(BackendError::Font("text shown without a usable font".to_string()));
        };
        for glyph in font.decode(bytes) {
            let input = GlyphInput::new(glyph.code, glyph.text, glyph.width);
            self.builder.add_char(&self.state.gs, &input);
            let text = &mut self.state.gs.text;
            if font.is_vertical() {
                let ty = text.vertical_advance(glyph.vertical_advance, glyph.word_space);
                text.advance(0.0, ty);
            } else {
                let tx = text.horizontal_advance(glyph.width, glyph.word_space);
                text.advance(tx, 0.0);
            }
        }
        Ok(())
    }

    fn show_text_array(&mut self, op: &Operator) -> Result<(), BackendError> {
        let Some(Operand::Array(items)) = op.operands.first() else {
            return Err(op_error("TJ expects an array"));
        };
        let vertical = self.state.font.as_ref().is_some_and(|f| f.is_vertical());
        for item in items {
            match item {
                Operand::String(bytes) => self.show_text(bytes)?,
                other => {
                    let Some(adjust) = other.as_f64() else {
                        continue;
                    };
                    let text = &mut self.state.gs.text;
                    let displacement = -adjust / 1000.0 * text.font_size;
                    if vertical {
                        text.advance(0.0, displacement);
                    } else {
                        text.advance(displacement * text.h_scaling_normalized(), 0.0);
                    }
                }
            }
        }
        Ok(())
    }

    // --- color ---

    fn set_color_space(&mut self, space_name: &str, stroke: bool) -> Result<(), BackendError> {
        let space = self
            .with_spaces(|spaces| spaces.resolve_name(space_name))
            .ok_or_else(|| op_error(format!("unknown color space /{space_name}")))?;
        let components = space.initial_components();
        let paint = match &space {
            ColorSpace::Pattern(_) => Paint::None,
            solid => solid_paint(solid, &components),
        };
        if stroke {
            self.state.stroke_space = space;
            self.state.stroke_components = components;
            self.state.gs.stroke = paint;
        } else {
            self.state.fill_space = space;
            self.state.fill_components = components;
            self.state.gs.fill = paint;
        }
        Ok(())
    }

    fn set_color(&mut self, op: &Operator, stroke: bool) -> Result<(), BackendError> {
        let space = if stroke {
            self.state.stroke_space.clone()
        } else {
            self.state.fill_space.clone()
        };
        let components: Vec<f64> = op.operands.iter().filter_map(Operand::as_f64).collect();
        let paint = match &space {
            ColorSpace::Pattern(base) => {
                let pattern = op
                    .operands
                    .last()
                    .and_then(Operand::as_name)
                    .ok_or_else(|| {
                        op_error(format!("{} in a pattern space needs a pattern name", op.name))
                    })?;
                let underlying = base.as_deref().map(|b| b.to_rgb(&components));
                self.pattern_paint(pattern, underlying)?
            }
            solid => {
                if components.len() < solid.num_components() as usize {
                    return Err(op_error(format!(
                        "{} expects {} components, got {}",
                        op.name,
                        solid.num_components(),
                        components.len()
                    )));
                }
                solid_paint(solid, &components)
            }
        };
        if stroke {
            self.state.stroke_components = components;
            self.state.gs.stroke = paint;
        } else {
            self.state.fill_components = components;
            self.state.gs.fill = paint;
        }
        Ok(())
    }

    fn set_device_color(&mut self, space: ColorSpace, components: &[f64], stroke: bool) {
        let paint = solid_paint(&space, components);
        if stroke {
            self.state.stroke_space = space;
            self.state.stroke_components = components.to_vec();
            self.state.gs.stroke = paint;
        } else {
            self.state.fill_space = space;
            self.state.fill_components = components.to_vec();
            self.state.gs.fill = paint;
        }
    }

    // --- patterns ---

    /// Paint for the pattern resource `key`. `underlying` is the color of
    /// an uncolored tiling pattern.
    fn pattern_paint(
        &mut self,
        key: &str,
        underlying: Option<Color>,
    ) -> Result<Paint, BackendError> {
        let entry = self
            .resource(b"Pattern", key)
            .ok_or_else(|| op_error(format!("pattern /{key} not found")))?;
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let doc = self.doc;
        let pattern = resolve(doc, entry);
        let dict = as_dict_like(pattern)
            .ok_or_else(|| op_error(format!("pattern /{key} is not a dictionary")))?;
        let matrix = dict_get(doc, dict, b"Matrix")
            .and_then(|m| numbers(doc, m))
            .and_then(|m| <[f64; 6]>::try_from(m).ok())
            .map_or_else(Affine::identity, Affine::from_ctm)
            .multiply(&self.base_ctm);

        match dict_f64(doc, dict, b"PatternType").map(|t| t as i64) {
            Some(1) => {
                let stream = pattern
                    .as_stream()
                    .map_err(|_| op_error(format!("tiling pattern /{key} is not a stream")))?;
                let colored = dict_f64(doc, dict, b"PaintType").is_none_or(|t| t as i64 != 2);
                let color = if colored { None } else { Some(underlying.unwrap_or(Color::BLACK)) };
                let pattern_id = match id {
                    Some(id) => {
                        let cache_key = (id, color.map(|c| c.to_hex()));
                        match self.tiling.get(&cache_key) {
                            Some(cached) => cached.clone(),
                            None => {
                                let rendered = self.render_tiling(stream, color)?;
                                self.tiling.insert(cache_key, rendered.clone());
                                rendered
                            }
                        }
                    }
                    None => self.render_tiling(stream, color)?,
                };
                Ok(Paint::Tiling { pattern_id, matrix })
            }
            Some(2) => {
                let source = dict_get(doc, dict, b"Shading")
                    .ok_or_else(|| op_error(format!("shading pattern /{key} has no /Shading")))?;
                let shading = match (id, dict.get(b"Shading").ok()) {
                    (_, Some(Object::Reference(shading_id))) => {
                        self.cached_shading(*shading_id, source)?
                    }
                    (Some(pattern_id), _) => self.cached_shading(pattern_id, source)?,
                    _ => Rc::new(self.read_shading(source)?),
                };
                Ok(Paint::Shading { shading, matrix })
            }
            other => Err(op_error(format!("unsupported pattern type {other:?}"))),
        }
    }

    fn render_tiling(
        &mut self,
        stream: &'d Stream,
        color: Option<Color>,
    ) -> Result<String, BackendError> {
        let doc = self.doc;
        let dict = &stream.dict;
        let bbox = dict_get(doc, dict, b"BBox")
            .and_then(|b| rect_from(doc, b))
            .ok_or_else(|| op_error("tiling pattern without /BBox"))?;
        let info = TilingPatternInfo {
            bbox,
            x_step: dict_f64(doc, dict, b"XStep").unwrap_or(bbox.width()),
            y_step: dict_f64(doc, dict, b"YStep").unwrap_or(bbox.height()),
        };
        if info.x_step == 0.0 || info.y_step == 0.0 {
            return Err(op_error("tiling pattern with a zero step"));
        }
        self.check_depth("tiling pattern")?;
        let content = stream_data(stream)?;
        let resources = dict_get(doc, dict, b"Resources").and_then(as_dict_like);

        self.builder.start_tiling_pattern(&info, &Affine::identity());
        let mut cell = InterpState::new(Affine::identity());
        if let Some(color) = color {
            cell.gs.fill = Paint::solid(color);
            cell.gs.stroke = Paint::solid(color);
        }
        let outer = std::mem::replace(&mut self.state, cell);
        let result = self.run_nested(&content, resources, Affine::identity());
        self.state = outer;
        result?;
        let id = self.builder.finish_tiling_pattern()?;
        trace!(id = %id, "tiling pattern rendered");
        Ok(id)
    }

    // --- shadings ---

    fn read_shading(&mut self, source: &Object) -> Result<Shading, BackendError> {
        let doc = self.doc;
        self.with_spaces(|spaces| parse_shading(doc, source, spaces))
    }

    fn cached_shading(
        &mut self,
        id: ObjectId,
        source: &Object,
    ) -> Result<Rc<Shading>, BackendError> {
        if let Some(cached) = self.shadings.get(&id) {
            return Ok(cached.clone());
        }
        let shading = Rc::new(self.read_shading(source)?);
        self.shadings.insert(id, shading.clone());
        Ok(shading)
    }

    fn handle_sh(&mut self, key: &str) -> Result<(), BackendError> {
        let entry = self
            .resource(b"Shading", key)
            .ok_or_else(|| op_error(format!("shading /{key} not found")))?;
        let source = resolve(self.doc, entry);
        let shading = match entry {
            Object::Reference(id) => self.cached_shading(*id, source),
            _ => self.read_shading(source).map(Rc::new),
        };
        let shading = match shading {
            Ok(s) => s,
            Err(e) => {
                let msg = format!("shading /{key}: {e}");
                self.builder.warn_at(ImportWarningCode::UnsupportedShading, "sh", msg);
                return Ok(());
            }
        };
        let ctm = self.state.gs.ctm;
        self.builder.add_clipped_fill(&self.state.gs, &shading, &ctm)?;
        Ok(())
    }

    // --- ExtGState ---

    fn apply_ext_gstate(&mut self, key: &str) -> Result<(), BackendError> {
        let doc = self.doc;
        let dict = self
            .resource(b"ExtGState", key)
            .map(|o| resolve(doc, o))
            .and_then(as_dict_like)
            .ok_or_else(|| op_error(format!("ExtGState /{key} not found")))?;
        let gs = &mut self.state.gs;
        if let Some(lw) = dict_f64(doc, dict, b"LW") {
            gs.line_width = lw;
        }
        if let Some(lc) = dict_f64(doc, dict, b"LC") {
            gs.line_cap = LineCap::from_i64(lc as i64);
        }
        if let Some(lj) = dict_f64(doc, dict, b"LJ") {
            gs.line_join = LineJoin::from_i64(lj as i64);
        }
        if let Some(ml) = dict_f64(doc, dict, b"ML") {
            gs.miter_limit = ml;
        }
        if let Some(Object::Array(parts)) = dict_get(doc, dict, b"D") {
            if let (Some(array), Some(phase)) = (
                parts.first().and_then(|a| numbers(doc, a)),
                parts.get(1).and_then(|p| object_to_f64(resolve(doc, p))),
            ) {
                gs.dash = DashPattern { array, phase };
            }
        }
        if let Some(ca) = dict_f64(doc, dict, b"CA") {
            gs.stroke_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(ca) = dict_f64(doc, dict, b"ca") {
            gs.fill_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(bm) = dict_get(doc, dict, b"BM") {
            let mode = match bm {
                Object::Array(items) => items
                    .iter()
                    .find_map(|i| name_of(resolve(doc, i)).and_then(BlendMode::from_pdf_name)),
                other => name_of(other).and_then(BlendMode::from_pdf_name),
            };
            gs.blend_mode = mode.unwrap_or_default();
        }
        match dict_get(doc, dict, b"SMask") {
            Some(Object::Name(n)) if n == b"None" => {
                self.state.gs.soft_mask = false;
                self.builder.end_soft_mask()?;
            }
            Some(mask) => match as_dict_like(mask) {
                Some(mask) => {
                    // A new mask replaces the one set earlier at this level.
                    if self.state.gs.soft_mask {
                        self.builder.end_soft_mask()?;
                    }
                    self.apply_soft_mask(mask)?
                }
                None => return Err(op_error(format!("ExtGState /{key} has a malformed /SMask"))),
            },
            None => {}
        }
        Ok(())
    }

    /// Render a soft mask's group form into a `<mask>` and link it to the
    /// current state level.
    fn apply_soft_mask(&mut self, mask: &'d Dictionary) -> Result<(), BackendError> {
        let doc = self.doc;
        let form = dict_get(doc, mask, b"G")
            .and_then(|g| g.as_stream().ok())
            .ok_or_else(|| op_error("soft mask without a /G form"))?;
        self.check_depth("soft mask")?;
        let alpha_mask = dict_name(doc, mask, b"S") == Some("Alpha");
        let group_space = dict_get(doc, &form.dict, b"Group")
            .and_then(as_dict_like)
            .and_then(|g| dict_get(doc, g, b"CS"));
        let backdrop = match dict_get(doc, mask, b"BC").and_then(|bc| numbers(doc, bc)) {
            Some(components) => {
                let space = group_space
                    .and_then(|cs| self.with_spaces(|spaces| spaces.resolve_object(cs)))
                    .unwrap_or_else(|| ColorSpace::from_component_count(components.len()));
                Some(space.to_rgb(&components))
            }
            None => None,
        };
        let options = GroupOptions {
            isolated: true,
            knockout: false,
            alpha_mask,
            backdrop,
        };
        let ctm = form_matrix(doc, &form.dict).multiply(&self.state.gs.ctm);
        let bbox = dict_get(doc, &form.dict, b"BBox")
            .and_then(|b| rect_from(doc, b))
            .ok_or_else(|| op_error("soft mask form without /BBox"))?;
        let content = stream_data(form)?;
        let resources = dict_get(doc, &form.dict, b"Resources").and_then(as_dict_like);

        let mask_state = InterpState::new(ctm);
        self.builder.start_group(&mask_state.gs, bbox, &options, true);
        let outer = std::mem::replace(&mut self.state, mask_state);
        let result = self.run_nested(&content, resources, ctm);
        let mask_gs = std::mem::replace(&mut self.state, outer).gs;
        result?;
        self.builder.finish_group(&mask_gs, true)?;
        self.state.gs.soft_mask = true;
        Ok(())
    }

    // --- XObjects ---

    fn handle_do(&mut self, key: &str) -> Result<(), BackendError> {
        let doc = self.doc;
        let stream = self
            .resource(b"XObject", key)
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .ok_or_else(|| op_error(format!("XObject /{key} not found")))?;
        match dict_name(doc, &stream.dict, b"Subtype") {
            Some("Form") => self.handle_form(key, stream),
            Some("Image") => {
                self.paint_image(stream, "Do");
                Ok(())
            }
            other => {
                debug!(key, subtype = ?other, "XObject subtype skipped");
                Ok(())
            }
        }
    }

    fn handle_form(&mut self, key: &str, form: &'d Stream) -> Result<(), BackendError> {
        let doc = self.doc;
        if let Err(e) = self.check_depth("form XObject") {
            let msg = format!("form /{key}: {e}");
            self.builder.warn_at(ImportWarningCode::ResourceLimitReached, "Do", msg);
            return Ok(());
        }
        let content = match stream_data(form) {
            Ok(c) => c,
            Err(e) => {
                self.builder
                    .warn_at(ImportWarningCode::MalformedObject, "Do", format!("form /{key}: {e}"));
                return Ok(());
            }
        };
        let dict = &form.dict;
        let bbox = dict_get(doc, dict, b"BBox").and_then(|b| rect_from(doc, b));
        let resources = dict_get(doc, dict, b"Resources").and_then(as_dict_like);
        let group = dict_get(doc, dict, b"Group")
            .and_then(as_dict_like)
            .filter(|g| dict_name(doc, g, b"S") == Some("Transparency"));

        self.save();
        self.state.gs.ctm = form_matrix(doc, dict).multiply(&self.state.gs.ctm);
        let ctm = self.state.gs.ctm;
        if let Some(group) = group {
            let options = GroupOptions {
                isolated: dict_bool(doc, group, b"I").unwrap_or(false),
                knockout: dict_bool(doc, group, b"K").unwrap_or(false),
                ..GroupOptions::default()
            };
            let area = bbox.unwrap_or_else(|| self.builder.frame().view);
            self.builder.start_group(&self.state.gs, area, &options, false);
            // Group opacity and blending apply to the group as a whole.
            let gs = &mut self.state.gs;
            gs.fill_alpha = 1.0;
            gs.stroke_alpha = 1.0;
            gs.blend_mode = BlendMode::Normal;
            gs.soft_mask = false;
            self.builder.save_state(&self.state.gs);
        }
        if let Some(bbox) = bbox {
            self.builder
                .set_clip(&self.state.gs, &Path::from_rect(&bbox), FillRule::NonZero)?;
        }
        debug!(key, depth = self.depth + 1, "form XObject");
        let result = self.run_nested(&content, resources, ctm);
        if group.is_some() {
            self.builder.restore_state(&self.state.gs)?;
            self.builder.finish_group(&self.state.gs, false)?;
        }
        self.restore()?;
        result?;
        if group.is_some() {
            self.builder.pop_group(&self.state.gs)?;
        }
        Ok(())
    }

    /// Run `content` as a nested stream: its own resources, pattern space
    /// and `q` floor. Saves left open by the stream are closed.
    fn run_nested(
        &mut self,
        content: &[u8],
        resources: Option<&'d Dictionary>,
        base_ctm: Affine,
    ) -> Result<(), BackendError> {
        let outer_resources = self.resources;
        self.resources = resources.or(outer_resources);
        let outer_base = std::mem::replace(&mut self.base_ctm, base_ctm);
        let outer_floor = std::mem::replace(&mut self.floor, self.stack.len());
        let outer_path = std::mem::take(&mut self.path);
        let outer_clip = self.pending_clip.take();
        self.depth += 1;

        let mut result = self.execute_stream(content);
        while result.is_ok() && self.stack.len() > self.floor {
            debug!("closing unbalanced save in nested stream");
            result = self.restore();
        }

        self.depth -= 1;
        self.path = outer_path;
        self.pending_clip = outer_clip;
        self.floor = outer_floor;
        self.base_ctm = outer_base;
        self.resources = outer_resources;
        result
    }

    fn check_depth(&self, what: &str) -> Result<(), BackendError> {
        if self.depth >= self.options.max_recursion_depth {
            return Err(BackendError::Core(PdfError::ResourceLimitExceeded {
                limit_name: format!("max_recursion_depth ({what})"),
                limit_value: self.options.max_recursion_depth,
                actual_value: self.depth + 1,
            }));
        }
        Ok(())
    }

    // --- images ---

    fn handle_inline_image(&mut self, op: &Operator) -> Result<(), BackendError> {
        let (Some(Operand::Dictionary(entries)), Some(Operand::String(data))) =
            (op.operands.first(), op.operands.get(1))
        else {
            return Err(op_error("malformed inline image"));
        };
        let stream = inline_image_stream(entries, data);
        self.paint_image(&stream, "BI");
        Ok(())
    }

    fn paint_image(&mut self, stream: &Stream, operator: &str) {
        let doc = self.doc;
        let decoded = self.with_spaces(|spaces| read_image(doc, stream, spaces));
        let gs = &self.state.gs;
        let painted = match decoded {
            Ok(DecodedImage::Stencil { mask, invert }) => {
                self.builder.add_image_mask(gs, &mask, invert)
            }
            Ok(DecodedImage::Raster { image, mask }) => match mask {
                ImageMask::None => self.builder.add_image(gs, &image, None),
                ImageMask::ColorKey(key) => self.builder.add_image(gs, &image, Some(&key)),
                ImageMask::Stencil { mask, invert } => {
                    self.builder.add_masked_image(gs, &image, &mask, invert)
                }
                ImageMask::Soft(soft) => self.builder.add_soft_masked_image(gs, &image, &soft),
            },
            Err(e) => {
                let msg = format!("image skipped: {e}");
                self.builder.warn_at(ImportWarningCode::ImageDecode, operator, msg);
                return;
            }
        };
        if let Err(e) = painted {
            let msg = format!("image not painted: {e}");
            self.builder.warn_at(ImportWarningCode::ImageDecode, operator, msg);
        }
    }

    // --- marked content ---

    /// The optional content group a `BDC /OC` sequence refers to.
    fn marked_content_group(&self, tag: &str, properties: Option<&Operand>) -> Option<String> {
        if tag != "OC" {
            return None;
        }
        let key = properties?.as_name()?;
        let doc = self.doc;
        match self.resource(b"Properties", key)? {
            Object::Reference(id) => {
                let dict = resolve(doc, doc.get_object(*id).ok()?).as_dict().ok()?;
                if dict_name(doc, dict, b"Type") == Some("OCMD") {
                    // Membership dictionaries are shown through their first group.
                    return match dict.get(b"OCGs").ok()? {
                        Object::Reference(ocg) => Some(optional_group_key(*ocg)),
                        Object::Array(items) => items.iter().find_map(|i| match i {
                            Object::Reference(ocg) => Some(optional_group_key(*ocg)),
                            _ => None,
                        }),
                        _ => None,
                    };
                }
                Some(optional_group_key(*id))
            }
            _ => None,
        }
    }
}

fn string_operand(op: &Operator, index: usize) -> Result<&[u8], BackendError> {
    op.operands
        .get(index)
        .and_then(Operand::as_bytes)
        .ok_or_else(|| op_error(format!("{} expects a string at operand {index}", op.name)))
}

fn solid_paint(space: &ColorSpace, components: &[f64]) -> Paint {
    if space.paints_nothing() {
        return Paint::None;
    }
    Paint::Solid {
        color: space.to_rgb(components),
        icc: space.icc_color(components),
    }
}

fn form_matrix(doc: &lopdf::Document, dict: &Dictionary) -> Affine {
    dict_get(doc, dict, b"Matrix")
        .and_then(|m| numbers(doc, m))
        .and_then(|m| <[f64; 6]>::try_from(m).ok())
        .map_or_else(Affine::identity, Affine::from_ctm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lopdf_backend::test_pdf::Builder;
    use lopdf::{Document, dictionary};
    use pdfsvg_core::{
        BuilderSettings, FontCatalog, FontContext, FontStrategies, ImportWarning, MemoryFontCatalog,
        PageFrame, Rect, SvgDocument,
    };

    struct Run {
        doc: SvgDocument,
        warnings: Vec<ImportWarning>,
    }

    fn interpret(doc: &Document, content: &[u8], resources: Option<&Dictionary>) -> Run {
        interpret_with(doc, content, resources, InterpreterOptions::default())
    }

    fn interpret_with(
        doc: &Document,
        content: &[u8],
        resources: Option<&Dictionary>,
        options: InterpreterOptions,
    ) -> Run {
        let catalog = FontCatalog::new();
        let strategies = FontStrategies::new();
        let system = MemoryFontCatalog::new(["DejaVu Sans"]);
        let fonts = FontContext {
            catalog: &catalog,
            strategies: &strategies,
            system: &system,
        };
        let frame = PageFrame::new(Rect::new(0.0, 0.0, 200.0, 200.0), 0);
        let mut builder = SvgBuilder::new(frame, BuilderSettings::default(), fonts);
        PageInterpreter::new(doc, &mut builder, options)
            .run(content, resources)
            .unwrap();
        let result = builder.finish();
        Run {
            doc: result.value,
            warnings: result.warnings,
        }
    }

    fn paths(doc: &SvgDocument) -> Vec<NodeSummary> {
        doc.elements_named("path")
            .into_iter()
            .filter(|id| doc.node(*id).parent().is_some_and(|p| doc.node(p).name != "clipPath"))
            .map(|id| NodeSummary {
                d: doc.attr(id, "d").unwrap_or_default().to_string(),
                fill: doc.style(id, "fill").map(str::to_string),
                stroke: doc.style(id, "stroke").map(str::to_string),
            })
            .collect()
    }

    #[derive(Debug)]
    struct NodeSummary {
        d: String,
        fill: Option<String>,
        stroke: Option<String>,
    }

    fn empty() -> Document {
        Document::with_version("1.5")
    }

    // --- Graphics state operators ---

    #[test]
    fn fill_uses_current_rgb_color() {
        let run = interpret(&empty(), b"1 0 0 rg 10 10 50 50 re f", None);
        let paths = paths(&run.doc);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].fill.as_deref(), Some("#ff0000"));
        assert_eq!(paths[0].stroke.as_deref(), Some("none"));
        assert!(run.warnings.is_empty());
    }

    #[test]
    fn restore_brings_back_saved_color() {
        let run = interpret(&empty(), b"0 0 1 rg q 1 0 0 rg 0 0 5 5 re f Q 10 10 5 5 re f", None);
        let paths = paths(&run.doc);
        assert_eq!(paths[0].fill.as_deref(), Some("#ff0000"));
        assert_eq!(paths[1].fill.as_deref(), Some("#0000ff"));
    }

    #[test]
    fn cm_sets_path_transform() {
        let run = interpret(&empty(), b"2 0 0 2 10 20 cm 0 0 5 5 re f", None);
        let node = run.doc.elements_named("path")[0];
        assert_eq!(run.doc.attr(node, "transform"), Some("matrix(2,0,0,2,10,20)"));
    }

    #[test]
    fn unbalanced_restore_is_a_warning() {
        let run = interpret(&empty(), b"Q 0 0 5 5 re f", None);
        assert_eq!(paths(&run.doc).len(), 1);
        assert!(run.warnings.iter().any(|w| {
            w.code == ImportWarningCode::UnbalancedState && w.operator.as_deref() == Some("Q")
        }));
    }

    #[test]
    fn cmyk_and_gray_colors() {
        let run = interpret(&empty(), b"0 0 0 1 k 0 0 5 5 re f 1 G 0 0 5 5 re S", None);
        let paths = paths(&run.doc);
        assert_eq!(paths[0].fill.as_deref(), Some("#000000"));
        assert_eq!(paths[1].stroke.as_deref(), Some("#ffffff"));
    }

    #[test]
    fn missing_operands_warn_and_continue() {
        let run = interpret(&empty(), b"1 rg 0 0 5 5 re f", None);
        assert_eq!(paths(&run.doc).len(), 1);
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(run.warnings[0].operator.as_deref(), Some("rg"));
    }

    #[test]
    fn unknown_operator_warns_outside_compatibility_section() {
        let run = interpret(&empty(), b"foo BX bar EX", None);
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(run.warnings[0].code, ImportWarningCode::UnsupportedOperator);
        assert_eq!(run.warnings[0].operator.as_deref(), Some("foo"));
    }

    // --- ExtGState ---

    #[test]
    fn gs_applies_line_width_dash_and_alpha() {
        let resources = dictionary! {
            "ExtGState" => dictionary! {
                "GS1" => dictionary! {
                    "LW" => 3,
                    "D" => Object::Array(vec![
                        Object::Array(vec![Object::Integer(2), Object::Integer(1)]),
                        Object::Integer(0),
                    ]),
                    "CA" => 0.5,
                    "BM" => "Multiply",
                },
            },
        };
        let run = interpret(&empty(), b"/GS1 gs 0 0 10 10 re S", Some(&resources));
        let node = run.doc.elements_named("path")[0];
        assert_eq!(run.doc.style(node, "stroke-width"), Some("3"));
        assert_eq!(run.doc.style(node, "stroke-dasharray"), Some("2,1"));
        assert_eq!(run.doc.style(node, "stroke-opacity"), Some("0.5"));
        assert_eq!(run.doc.style(node, "mix-blend-mode"), Some("multiply"));
    }

    #[test]
    fn missing_ext_gstate_is_a_warning() {
        let run = interpret(&empty(), b"/Nope gs", Some(&Dictionary::new()));
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(run.warnings[0].operator.as_deref(), Some("gs"));
    }

    // --- Paths and clipping ---

    #[test]
    fn stroke_of_filled_outline_merges() {
        let run = interpret(&empty(), b"0 0 10 10 re f 0 0 10 10 re S", None);
        let paths = paths(&run.doc);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].fill.as_deref(), Some("#000000"));
        assert_eq!(paths[0].stroke.as_deref(), Some("#000000"));
    }

    #[test]
    fn clip_applies_to_later_paths() {
        let run = interpret(&empty(), b"20 20 50 50 re W n 0 0 100 100 re f", None);
        assert_eq!(run.doc.elements_named("clipPath").len(), 1);
        let painted = paths(&run.doc);
        assert_eq!(painted.len(), 1);
        let node = run
            .doc
            .elements_named("path")
            .into_iter()
            .find(|id| run.doc.attr(*id, "d") == Some(painted[0].d.as_str()))
            .unwrap();
        assert!(run.doc.attr(node, "clip-path").is_some());
    }

    #[test]
    fn n_without_clip_paints_nothing() {
        let run = interpret(&empty(), b"0 0 10 10 re n", None);
        assert!(paths(&run.doc).is_empty());
    }

    // --- Text ---

    fn helvetica_resources() -> Dictionary {
        dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
            },
        }
    }

    #[test]
    fn text_becomes_text_element() {
        let resources = helvetica_resources();
        let run = interpret(&empty(), b"BT /F1 12 Tf 10 20 Td (Hi) Tj ET", Some(&resources));
        let texts = run.doc.elements_named("text");
        assert_eq!(texts.len(), 1);
        let all: String = run
            .doc
            .descendants(texts[0])
            .into_iter()
            .filter_map(|id| run.doc.node(id).text().map(str::to_string))
            .collect();
        assert!(all.contains("Hi"), "text content was {all:?}");
    }

    #[test]
    fn missing_font_warns_at_tf_and_tj() {
        let run = interpret(&empty(), b"BT /F9 12 Tf (x) Tj ET", Some(&Dictionary::new()));
        let codes: Vec<_> = run.warnings.iter().map(|w| w.code.clone()).collect();
        assert_eq!(codes, vec![ImportWarningCode::MissingFont, ImportWarningCode::MissingFont]);
        assert!(run.doc.elements_named("text").is_empty());
    }

    #[test]
    fn tj_adjustments_move_the_text_matrix() {
        let doc = empty();
        let resources = helvetica_resources();
        let catalog = FontCatalog::new();
        let strategies = FontStrategies::new();
        let system = MemoryFontCatalog::default();
        let fonts = FontContext {
            catalog: &catalog,
            strategies: &strategies,
            system: &system,
        };
        let frame = PageFrame::new(Rect::new(0.0, 0.0, 200.0, 200.0), 0);
        let mut builder = SvgBuilder::new(frame, BuilderSettings::default(), fonts);
        let mut interp = PageInterpreter::new(&doc, &mut builder, InterpreterOptions::default());
        interp
            .run(b"BT /F1 10 Tf [(A) -1000 (B)] TJ", Some(&resources))
            .unwrap();
        // 'A' and 'B' are 667/1000 wide; -1000 moves one em further.
        let e = interp.state.gs.text.text_matrix().e;
        assert!((e - (6.67 + 10.0 + 6.67)).abs() < 1e-6, "e = {e}");
    }

    #[test]
    fn restore_inside_text_keeps_position() {
        let doc = empty();
        let resources = helvetica_resources();
        let catalog = FontCatalog::new();
        let strategies = FontStrategies::new();
        let system = MemoryFontCatalog::default();
        let fonts = FontContext {
            catalog: &catalog,
            strategies: &strategies,
            system: &system,
        };
        let frame = PageFrame::new(Rect::new(0.0, 0.0, 200.0, 200.0), 0);
        let mut builder = SvgBuilder::new(frame, BuilderSettings::default(), fonts);
        let mut interp = PageInterpreter::new(&doc, &mut builder, InterpreterOptions::default());
        interp
            .run(b"BT /F1 10 Tf q 5 Tc 30 40 Td Q", Some(&resources))
            .unwrap();
        let text = &interp.state.gs.text;
        assert_eq!(text.char_spacing, 0.0);
        assert_eq!(text.text_matrix().e, 30.0);
        assert_eq!(text.text_matrix().f, 40.0);
    }

    // --- XObjects ---

    #[test]
    fn form_xobject_content_is_drawn() {
        let mut b = Builder::new();
        let form = b.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 50.into(), 50.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 10.into()],
            },
            b"0 1 0 rg 0 0 20 20 re f".to_vec(),
        ));
        let resources = dictionary! { "XObject" => dictionary! { "X1" => form } };
        let doc = b.finish();
        let run = interpret(&doc, b"/X1 Do", Some(&resources));
        let painted = paths(&run.doc);
        assert_eq!(painted.len(), 1);
        assert_eq!(painted[0].fill.as_deref(), Some("#00ff00"));
        assert!(run.warnings.is_empty(), "{:?}", run.warnings);
    }

    #[test]
    fn self_referencing_form_hits_the_recursion_limit() {
        let mut b = Builder::new();
        let form_id = b.doc.new_object_id();
        let form = Stream::new(
            dictionary! {
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                "Resources" => dictionary! { "XObject" => dictionary! { "Me" => form_id } },
            },
            b"0 0 1 1 re f /Me Do".to_vec(),
        );
        b.doc.objects.insert(form_id, Object::Stream(form));
        let resources = dictionary! { "XObject" => dictionary! { "Me" => form_id } };
        let doc = b.finish();
        let options = InterpreterOptions { max_recursion_depth: 3 };
        let run = interpret_with(&doc, b"/Me Do", Some(&resources), options);
        assert_eq!(paths(&run.doc).len(), 3);
        assert!(
            run.warnings
                .iter()
                .any(|w| w.code == ImportWarningCode::ResourceLimitReached)
        );
    }

    #[test]
    fn transparency_group_carries_invoking_opacity() {
        let mut b = Builder::new();
        let form = b.doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 50.into(), 50.into()],
                "Group" => dictionary! { "S" => "Transparency", "I" => true },
            },
            b"0 0 20 20 re f".to_vec(),
        ));
        let resources = dictionary! {
            "XObject" => dictionary! { "G1" => form },
            "ExtGState" => dictionary! { "Half" => dictionary! { "ca" => 0.5 } },
        };
        let doc = b.finish();
        let run = interpret(&doc, b"/Half gs /G1 Do", Some(&resources));
        let group = run
            .doc
            .elements_named("g")
            .into_iter()
            .find(|g| run.doc.style(*g, "isolation") == Some("isolate"))
            .expect("group element");
        assert_eq!(run.doc.style(group, "opacity"), Some("0.5"));
        // The content inside the group is painted opaque.
        let inner =
            run.doc.descendants(group).into_iter().find(|n| run.doc.node(*n).name == "path");
        assert_eq!(inner.and_then(|p| run.doc.style(p, "fill-opacity")), None);
    }

    #[test]
    fn missing_xobject_is_a_warning() {
        let run = interpret(&empty(), b"/X9 Do", Some(&Dictionary::new()));
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(run.warnings[0].operator.as_deref(), Some("Do"));
    }

    // --- Images ---

    #[test]
    fn inline_image_becomes_image_element() {
        let content = b"q 10 0 0 10 0 0 cm BI /W 2 /H 1 /CS /G /BPC 8 ID \x00\xff EI Q";
        let run = interpret(&empty(), content, None);
        assert_eq!(run.doc.elements_named("image").len(), 1);
        assert!(run.warnings.is_empty(), "{:?}", run.warnings);
    }

    #[test]
    fn image_xobject_is_painted() {
        let mut b = Builder::new();
        let image = b.doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0],
        ));
        let resources = dictionary! { "XObject" => dictionary! { "Im1" => image } };
        let doc = b.finish();
        let run = interpret(&doc, b"/Im1 Do", Some(&resources));
        assert_eq!(run.doc.elements_named("image").len(), 1);
    }

    #[test]
    fn undecodable_image_warns() {
        let mut b = Builder::new();
        let image = b.doc.add_object(Stream::new(
            dictionary! { "Subtype" => "Image", "Width" => 1, "Height" => 1, "BitsPerComponent" => 8 },
            vec![0],
        ));
        let resources = dictionary! { "XObject" => dictionary! { "Im1" => image } };
        let doc = b.finish();
        let run = interpret(&doc, b"/Im1 Do", Some(&resources));
        assert!(run.doc.elements_named("image").is_empty());
        assert_eq!(run.warnings[0].code, ImportWarningCode::ImageDecode);
    }

    // --- Shadings and patterns ---

    fn axial() -> Dictionary {
        dictionary! {
            "ShadingType" => 2,
            "ColorSpace" => "DeviceRGB",
            "Coords" => vec![0.into(), 0.into(), 100.into(), 0.into()],
            "Function" => dictionary! {
                "FunctionType" => 2,
                "Domain" => vec![0.into(), 1.into()],
                "C0" => vec![1.into(), 0.into(), 0.into()],
                "C1" => vec![0.into(), 0.into(), 1.into()],
                "N" => 1,
            },
        }
    }

    #[test]
    fn sh_paints_a_gradient() {
        let resources = dictionary! { "Shading" => dictionary! { "Sh1" => axial() } };
        let run = interpret(&empty(), b"/Sh1 sh", Some(&resources));
        assert_eq!(run.doc.elements_named("linearGradient").len(), 1);
        assert!(run.warnings.is_empty(), "{:?}", run.warnings);
    }

    #[test]
    fn shading_pattern_fill() {
        let resources = dictionary! {
            "Pattern" => dictionary! { "P1" => dictionary! { "PatternType" => 2, "Shading" => axial() } },
        };
        let run = interpret(&empty(), b"/Pattern cs /P1 scn 0 0 100 100 re f", Some(&resources));
        let node = run.doc.elements_named("path")[0];
        assert!(run.doc.style(node, "fill").is_some_and(|f| f.starts_with("url(#")));
    }

    #[test]
    fn tiling_pattern_is_rendered_once() {
        let mut b = Builder::new();
        let pattern = b.doc.add_object(Stream::new(
            dictionary! {
                "PatternType" => 1,
                "PaintType" => 1,
                "TilingType" => 1,
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                "XStep" => 10,
                "YStep" => 10,
            },
            b"1 0 0 rg 0 0 5 5 re f".to_vec(),
        ));
        let resources = dictionary! { "Pattern" => dictionary! { "P1" => pattern } };
        let doc = b.finish();
        let run = interpret(
            &doc,
            b"/Pattern cs /P1 scn 0 0 50 50 re f /P1 scn 60 60 20 20 re f",
            Some(&resources),
        );
        let cells: Vec<_> = run
            .doc
            .elements_named("pattern")
            .into_iter()
            .filter(|p| run.doc.attr(*p, "width").is_some())
            .collect();
        assert_eq!(cells.len(), 1);
        assert!(run.warnings.is_empty(), "{:?}", run.warnings);
    }

    // --- Marked content ---

    #[test]
    fn optional_content_opens_a_layer() {
        let mut b = Builder::new();
        let ocg = b.doc.add_object(dictionary! {
            "Type" => "OCG",
            "Name" => Object::string_literal("Notes"),
        });
        let resources = dictionary! { "Properties" => dictionary! { "oc1" => ocg } };
        let doc = b.finish();
        let catalog = FontCatalog::new();
        let strategies = FontStrategies::new();
        let system = MemoryFontCatalog::default();
        let fonts = FontContext {
            catalog: &catalog,
            strategies: &strategies,
            system: &system,
        };
        let frame = PageFrame::new(Rect::new(0.0, 0.0, 200.0, 200.0), 0);
        let mut builder = SvgBuilder::new(frame, BuilderSettings::default(), fonts);
        builder.add_optional_group(&optional_group_key(ocg), "Notes", false);
        PageInterpreter::new(&doc, &mut builder, InterpreterOptions::default())
            .run(b"/OC /oc1 BDC 0 0 5 5 re f EMC", Some(&resources))
            .unwrap();
        let svg = builder.finish().value;
        let layer = svg
            .elements_named("g")
            .into_iter()
            .find(|g| svg.attr(*g, "inkscape:label") == Some("Notes"))
            .expect("layer");
        assert_eq!(svg.style(layer, "display"), Some("none"));
        assert_eq!(svg.node(layer).children().len(), 1);
    }

    #[test]
    fn unmatched_emc_is_a_warning() {
        let run = interpret(&empty(), b"EMC", None);
        assert_eq!(run.warnings[0].code, ImportWarningCode::UnbalancedState);
    }
}
