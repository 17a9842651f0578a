//! Painted paths, their styles, and fill/stroke merging.

use crate::color::Color;
use crate::document::NodeId;
use crate::error::PdfError;
use crate::geometry::{Affine, fmt_num};
use crate::path::Path;
use crate::shading::Shading;
use crate::state::{BlendMode, GraphicsState, Paint};

use super::SvgBuilder;

impl SvgBuilder<'_> {
    /// Paint `path` (in the user space of `state`).
    ///
    /// A fill or stroke of the same outline right after the opposite
    /// operation is folded into the previous element.
    pub fn add_path(
        &mut self,
        state: &GraphicsState,
        path: &Path,
        fill: bool,
        stroke: bool,
        even_odd: bool,
    ) -> Result<(), PdfError> {
        if path.is_empty() || (!fill && !stroke) {
            return Ok(());
        }
        let d = path.to_svg_data();
        if fill != stroke && self.merge_path(state, fill, &d, even_odd) {
            return Ok(());
        }

        let mut fill = fill;
        if fill {
            if let Paint::Shading { ref shading, matrix } = state.fill {
                if !shading.is_gradient() {
                    self.add_shaded_fill(state, shading, &matrix, path, &state.ctm, even_odd)?;
                    if !stroke {
                        return Ok(());
                    }
                    fill = false;
                }
            }
        }

        let node = self.doc.create("path");
        self.doc.set_attr(node, "d", &d);
        if !state.ctm.is_identity() {
            self.doc.set_attr(node, "transform", &state.ctm.to_svg());
        }
        if fill {
            self.set_fill_style(node, state, even_odd, &state.ctm);
        } else {
            self.doc.set_style(node, "fill", "none");
        }
        if stroke {
            self.set_stroke_style(node, state, &state.ctm);
        } else {
            self.doc.set_style(node, "stroke", "none");
        }
        self.set_blend_style(node, state.blend_mode);
        self.add_to_container(node, &state.ctm);
        Ok(())
    }

    /// Whether the last element in the current container is a path with
    /// outline `path_data` (or that outline without its final close) and
    /// no paint for the operation being added.
    pub fn should_merge_path(&self, is_fill: bool, path_data: &str) -> bool {
        let Some(prev) = self.doc.last_child(self.container()) else {
            return false;
        };
        if self.doc.node(prev).name != "path" || self.doc.attr(prev, "mask").is_some() {
            return false;
        }
        let Some(d) = self.doc.attr(prev, "d") else {
            return false;
        };
        if d != path_data && path_data.strip_suffix(" Z") != Some(d) {
            return false;
        }
        let key = if is_fill { "fill" } else { "stroke" };
        self.doc.style(prev, key) == Some("none")
    }

    /// Add the fill or stroke of `path_data` to the previous element when
    /// it draws the same outline with the same winding rule, transform,
    /// clip and blend mode. Returns whether the paint was merged.
    ///
    /// Strokes count as nonzero, so an even-odd fill is never merged with
    /// a stroke.
    pub fn merge_path(
        &mut self,
        state: &GraphicsState,
        is_fill: bool,
        path_data: &str,
        even_odd: bool,
    ) -> bool {
        if !self.should_merge_path(is_fill, path_data) {
            return false;
        }
        let Some(prev) = self.doc.last_child(self.container()) else {
            return false;
        };
        let prev_even_odd = self.doc.style(prev, "fill-rule") == Some("evenodd");
        if prev_even_odd != (is_fill && even_odd) {
            return false;
        }
        let transform = (!state.ctm.is_identity()).then(|| state.ctm.to_svg());
        if self.doc.attr(prev, "transform") != transform.as_deref() {
            return false;
        }
        let blend = (state.blend_mode != BlendMode::Normal).then(|| state.blend_mode.as_css());
        if self.doc.style(prev, "mix-blend-mode") != blend {
            return false;
        }
        if is_fill {
            if let Paint::Shading { ref shading, .. } = state.fill {
                if !shading.is_gradient() {
                    return false;
                }
            }
        }
        let clip = self.clip_url(&state.ctm);
        if self.doc.attr(prev, "clip-path") != clip.as_deref() {
            return false;
        }

        if is_fill {
            self.set_fill_style(prev, state, even_odd, &state.ctm);
            // The stroke came first in the content stream.
            self.doc.set_style(prev, "paint-order", "stroke");
        } else {
            self.set_stroke_style(prev, state, &state.ctm);
        }
        true
    }

    // --- styles ---

    pub(super) fn set_fill_style(
        &mut self,
        node: NodeId,
        state: &GraphicsState,
        even_odd: bool,
        node_tr: &Affine,
    ) {
        let value = self.paint_value(&state.fill, node_tr);
        self.doc.set_style(node, "fill", &value);
        if state.fill_alpha < 1.0 {
            self.doc.set_style(node, "fill-opacity", &fmt_num(state.fill_alpha));
        }
        if even_odd {
            self.doc.set_style(node, "fill-rule", "evenodd");
        }
    }

    pub(super) fn set_stroke_style(
        &mut self,
        node: NodeId,
        state: &GraphicsState,
        node_tr: &Affine,
    ) {
        let value = self.paint_value(&state.stroke, node_tr);
        self.doc.set_style(node, "stroke", &value);
        let width = if state.line_width > 0.0 {
            state.line_width
        } else {
            // Thinnest visible line: one unit of page space.
            let expansion = state.ctm.expansion();
            if expansion > 0.0 { 1.0 / expansion } else { 1.0 }
        };
        self.doc.set_style(node, "stroke-width", &fmt_num(width));
        if state.line_cap != Default::default() {
            self.doc.set_style(node, "stroke-linecap", state.line_cap.as_svg());
        }
        if state.line_join != Default::default() {
            self.doc.set_style(node, "stroke-linejoin", state.line_join.as_svg());
        }
        if (state.miter_limit - 4.0).abs() > 1e-9 {
            self.doc.set_style(node, "stroke-miterlimit", &fmt_num(state.miter_limit.max(1.0)));
        }
        if !state.dash.is_solid() {
            let dashes: Vec<String> = state.dash.array.iter().map(|v| fmt_num(*v)).collect();
            self.doc.set_style(node, "stroke-dasharray", &dashes.join(","));
            if state.dash.phase != 0.0 {
                self.doc.set_style(node, "stroke-dashoffset", &fmt_num(state.dash.phase));
            }
        }
        if state.stroke_alpha < 1.0 {
            self.doc.set_style(node, "stroke-opacity", &fmt_num(state.stroke_alpha));
        }
    }

    pub(super) fn set_blend_style(&mut self, node: NodeId, mode: BlendMode) {
        if mode != BlendMode::Normal {
            self.doc.set_style(node, "mix-blend-mode", mode.as_css());
        }
    }

    /// SVG paint for `paint` on a node whose transform is `node_tr`.
    pub(super) fn paint_value(&mut self, paint: &Paint, node_tr: &Affine) -> String {
        match paint {
            Paint::None => "none".to_string(),
            Paint::Solid { .. } => paint.svg_color().unwrap_or_else(|| Color::BLACK.to_hex()),
            Paint::Shading { shading, matrix } => {
                if shading.is_gradient() {
                    if let Some(url) = self.gradient_url(shading, matrix, node_tr) {
                        return url;
                    }
                }
                self.fallback_color(shading).to_hex()
            }
            Paint::Tiling { pattern_id, matrix } => self.pattern_url(pattern_id, matrix, node_tr),
        }
    }

    /// Flat color standing in for a shading that cannot be expressed as
    /// a paint server.
    pub(super) fn fallback_color(&self, shading: &Shading) -> Color {
        if let Some(ref bg) = shading.background {
            return shading.color_space.to_rgb(bg);
        }
        let colors: Vec<Color> = if shading.is_gradient() {
            shading.gradient_stops(1.0).into_iter().map(|s| s.color).collect()
        } else {
            shading.tessellate(1.0).into_iter().map(|t| t.color).collect()
        };
        Color::average(&colors)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::color::Color;
    use crate::geometry::Affine;
    use crate::path::FillRule;
    use crate::state::{DashPattern, GraphicsState, LineCap, Paint};

    fn red_state() -> GraphicsState {
        let mut gs = GraphicsState::default();
        gs.fill = Paint::solid(Color::rgb(1.0, 0.0, 0.0));
        gs
    }

    // --- painting ---

    #[test]
    fn test_red_square() {
        let env = Env::new();
        let mut b = env.builder();
        b.add_path(&red_state(), &rect(10.0, 10.0, 60.0, 60.0), true, false, false)
            .unwrap();
        let doc = b.finish().value;
        let paths = doc.elements_named("path");
        assert_eq!(paths.len(), 1);
        assert_eq!(doc.attr(paths[0], "d"), Some("M 10,10 L 60,10 L 60,60 L 10,60 Z"));
        assert_eq!(doc.attr(paths[0], "transform"), None);
        assert_eq!(doc.node(paths[0]).style_string(), "fill:#ff0000;stroke:none");
        let svg = doc.to_svg_string();
        assert!(svg.contains("<g inkscape:groupmode=\"layer\""));
    }

    #[test]
    fn test_stroke_style_properties() {
        let env = Env::new();
        let mut b = env.builder();
        let mut gs = GraphicsState::with_ctm(Affine::scale(2.0, 2.0));
        gs.line_width = 3.0;
        gs.line_cap = LineCap::Round;
        gs.dash = DashPattern {
            array: vec![4.0, 2.0],
            phase: 1.0,
        };
        gs.stroke_alpha = 0.5;
        b.add_path(&gs, &rect(0.0, 0.0, 10.0, 10.0), false, true, false).unwrap();
        let doc = b.document();
        let path = doc.elements_named("path")[0];
        assert_eq!(doc.attr(path, "transform"), Some("matrix(2,0,0,2,0,0)"));
        assert_eq!(doc.style(path, "fill"), Some("none"));
        assert_eq!(doc.style(path, "stroke"), Some("#000000"));
        assert_eq!(doc.style(path, "stroke-width"), Some("3"));
        assert_eq!(doc.style(path, "stroke-linecap"), Some("round"));
        assert_eq!(doc.style(path, "stroke-miterlimit"), Some("10"));
        assert_eq!(doc.style(path, "stroke-dasharray"), Some("4,2"));
        assert_eq!(doc.style(path, "stroke-dashoffset"), Some("1"));
        assert_eq!(doc.style(path, "stroke-opacity"), Some("0.5"));
    }

    #[test]
    fn test_zero_width_line_is_hairline() {
        let env = Env::new();
        let mut b = env.builder();
        let mut gs = GraphicsState::with_ctm(Affine::scale(4.0, 4.0));
        gs.line_width = 0.0;
        b.add_path(&gs, &rect(0.0, 0.0, 1.0, 1.0), false, true, false).unwrap();
        let doc = b.document();
        let path = doc.elements_named("path")[0];
        assert_eq!(doc.style(path, "stroke-width"), Some("0.25"));
    }

    #[test]
    fn test_even_odd_fill_rule() {
        let env = Env::new();
        let mut b = env.builder();
        b.add_path(&red_state(), &rect(0.0, 0.0, 5.0, 5.0), true, false, true).unwrap();
        let doc = b.document();
        let path = doc.elements_named("path")[0];
        assert_eq!(doc.style(path, "fill-rule"), Some("evenodd"));
    }

    #[test]
    fn test_separation_none_paints_nothing() {
        let env = Env::new();
        let mut b = env.builder();
        let mut gs = GraphicsState::default();
        gs.fill = Paint::None;
        b.add_path(&gs, &rect(0.0, 0.0, 5.0, 5.0), true, false, false).unwrap();
        let doc = b.document();
        let path = doc.elements_named("path")[0];
        assert_eq!(doc.style(path, "fill"), Some("none"));
    }

    // --- merging ---

    #[test]
    fn test_fill_then_stroke_merges() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let square = rect(10.0, 10.0, 20.0, 20.0);
        b.add_path(&gs, &square, true, false, false).unwrap();
        b.add_path(&gs, &square, false, true, false).unwrap();
        let doc = b.document();
        let paths = doc.elements_named("path");
        assert_eq!(paths.len(), 1);
        assert_eq!(doc.style(paths[0], "fill"), Some("#ff0000"));
        assert_eq!(doc.style(paths[0], "stroke"), Some("#000000"));
        assert_eq!(doc.style(paths[0], "paint-order"), None);
    }

    #[test]
    fn test_stroke_then_fill_keeps_paint_order() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let square = rect(10.0, 10.0, 20.0, 20.0);
        b.add_path(&gs, &square, false, true, false).unwrap();
        b.add_path(&gs, &square, true, false, false).unwrap();
        let doc = b.document();
        let paths = doc.elements_named("path");
        assert_eq!(paths.len(), 1);
        assert_eq!(doc.style(paths[0], "paint-order"), Some("stroke"));
    }

    #[test]
    fn test_winding_rule_must_match_to_merge() {
        let env = Env::new();
        let gs = red_state();
        let square = rect(10.0, 10.0, 20.0, 20.0);

        let mut fill_first = env.builder();
        fill_first.add_path(&gs, &square, true, false, true).unwrap();
        fill_first.add_path(&gs, &square, false, true, false).unwrap();
        let doc = fill_first.document();
        let paths = doc.elements_named("path");
        assert_eq!(paths.len(), 2);
        assert_eq!(doc.style(paths[0], "fill-rule"), Some("evenodd"));
        assert_eq!(doc.style(paths[0], "stroke"), Some("none"));

        let mut stroke_first = env.builder();
        stroke_first.add_path(&gs, &square, false, true, false).unwrap();
        stroke_first.add_path(&gs, &square, true, false, true).unwrap();
        let doc = stroke_first.document();
        let paths = doc.elements_named("path");
        assert_eq!(paths.len(), 2);
        assert_eq!(doc.style(paths[0], "fill"), Some("none"));
        assert_eq!(doc.style(paths[1], "fill-rule"), Some("evenodd"));
    }

    #[test]
    fn test_intervening_draw_prevents_merge() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let a = rect(10.0, 10.0, 20.0, 20.0);
        b.add_path(&gs, &a, true, false, false).unwrap();
        b.add_path(&gs, &rect(30.0, 30.0, 40.0, 40.0), true, false, false).unwrap();
        b.add_path(&gs, &a, false, true, false).unwrap();
        assert_eq!(b.document().elements_named("path").len(), 3);
    }

    #[test]
    fn test_merge_accepts_closed_variant() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let mut open = crate::path::PathBuilder::new();
        open.move_to(0.0, 0.0);
        open.line_to(10.0, 0.0);
        open.line_to(10.0, 10.0);
        let open = open.build();
        let mut closed = open.clone();
        closed.segments.push(crate::path::PathSegment::ClosePath);
        b.add_path(&gs, &open, false, true, false).unwrap();
        assert!(b.should_merge_path(true, &closed.to_svg_data()));
        assert!(!b.should_merge_path(false, &closed.to_svg_data()));
    }

    #[test]
    fn test_no_merge_across_transform_change() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let square = rect(0.0, 0.0, 10.0, 10.0);
        b.add_path(&gs, &square, true, false, false).unwrap();
        let moved = GraphicsState {
            ctm: Affine::translate(5.0, 0.0),
            ..gs
        };
        b.add_path(&moved, &square, false, true, false).unwrap();
        assert_eq!(b.document().elements_named("path").len(), 2);
    }

    #[test]
    fn test_no_merge_across_clip_change() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = red_state();
        let square = rect(0.0, 0.0, 10.0, 10.0);
        b.add_path(&gs, &square, true, false, false).unwrap();
        b.save_state(&gs);
        b.set_clip(&gs, &rect(0.0, 0.0, 5.0, 5.0), FillRule::NonZero).unwrap();
        b.add_path(&gs, &square, false, true, false).unwrap();
        // Two painted paths plus the one inside the clipPath.
        assert_eq!(b.document().elements_named("path").len(), 3);
    }
}
