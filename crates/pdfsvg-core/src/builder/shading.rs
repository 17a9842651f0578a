//! Gradients, shading tiles, tiling patterns and color profiles.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, trace};

use crate::document::NodeId;
use crate::error::{InvariantViolation, PdfError};
use crate::geometry::{Affine, Rect, fmt_num};
use crate::path::{FillRule, Path};
use crate::shading::{Shading, ShadingKind};
use crate::state::GraphicsState;

use super::{ContainerKind, StateFrame, SvgBuilder};

/// Geometry of a tiling pattern cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingPatternInfo {
    /// `/BBox` in pattern space.
    pub bbox: Rect,
    pub x_step: f64,
    pub y_step: f64,
}

impl SvgBuilder<'_> {
    // --- shadings ---

    /// Paint `shading` over the whole current container (`sh`).
    ///
    /// `matrix` maps shading space to page space.
    pub fn add_clipped_fill(
        &mut self,
        state: &GraphicsState,
        shading: &Shading,
        matrix: &Affine,
    ) -> Result<(), PdfError> {
        let mut area = self.container_bbox();
        if let Some(bbox) = shading.bbox {
            match area.intersect(&bbox.transform(matrix)) {
                Some(r) => area = r,
                None => return Ok(()),
            }
        }

        if shading.is_gradient() {
            let Some(url) = self.gradient_url(shading, matrix, &Affine::identity()) else {
                return Ok(());
            };
            let node = self.doc.create("path");
            self.doc.set_attr(node, "d", &Path::from_rect(&area).to_svg_data());
            self.doc.set_style(node, "fill", &url);
            self.doc.set_style(node, "stroke", "none");
            if state.fill_alpha < 1.0 {
                self.doc.set_style(node, "fill-opacity", &fmt_num(state.fill_alpha));
            }
            self.set_blend_style(node, state.blend_mode);
            self.add_to_container(node, &Affine::identity());
            return Ok(());
        }

        let tiles = self.doc.create("g");
        self.add_tiles(tiles, shading, matrix);
        if state.fill_alpha < 1.0 {
            self.doc.set_style(tiles, "opacity", &fmt_num(state.fill_alpha));
        }
        self.set_blend_style(tiles, state.blend_mode);
        self.add_to_container(tiles, matrix);
        Ok(())
    }

    /// Fill `path` with a shading that has no gradient equivalent.
    ///
    /// `transform` maps the path's user space to page space and `matrix`
    /// maps shading space to page space.
    pub fn add_shaded_fill(
        &mut self,
        state: &GraphicsState,
        shading: &Shading,
        matrix: &Affine,
        path: &Path,
        transform: &Affine,
        even_odd: bool,
    ) -> Result<(), PdfError> {
        let group = self.doc.create("g");
        self.add_to_container(group, &Affine::identity());
        // The live clip and the path clip need one element each.
        let target = if self.doc.attr(group, "clip-path").is_some() {
            self.doc.create_child(group, "g")
        } else {
            group
        };
        let rule = if even_odd { FillRule::EvenOdd } else { FillRule::NonZero };
        let clip = self.clip_path_id(path.to_svg_data(), *transform, rule);
        self.doc.set_attr(target, "clip-path", &format!("url(#{clip})"));

        let tiles = self.doc.create_child(target, "g");
        self.add_tiles(tiles, shading, matrix);
        if state.fill_alpha < 1.0 {
            self.doc.set_style(group, "opacity", &fmt_num(state.fill_alpha));
        }
        self.set_blend_style(group, state.blend_mode);
        Ok(())
    }

    fn add_tiles(&mut self, parent: NodeId, shading: &Shading, matrix: &Affine) {
        if !matrix.is_identity() {
            self.doc.set_attr(parent, "transform", &matrix.to_svg());
        }
        let tiles = shading.tessellate(self.settings.color_delta);
        trace!(count = tiles.len(), shading_type = shading.shading_type, "shading tiles");
        for tile in tiles {
            let node = self.doc.create_child(parent, "path");
            self.doc.set_attr(node, "d", &Path::polygon(&tile.polygon).to_svg_data());
            self.doc.set_style(node, "fill", &tile.color.to_hex());
            self.doc.set_style(node, "stroke", "none");
        }
    }

    /// `url(#…)` of a new gradient for `shading`, positioned for a node
    /// whose transform is `node_tr`.
    pub(super) fn gradient_url(
        &mut self,
        shading: &Shading,
        matrix: &Affine,
        node_tr: &Affine,
    ) -> Option<String> {
        let tr = matrix.multiply(&node_tr.inverse()?);
        let defs = self.doc.defs();
        let grad = match shading.kind {
            ShadingKind::Axial { coords, .. } => {
                let g = self.doc.create_child(defs, "linearGradient");
                for (key, value) in ["x1", "y1", "x2", "y2"].iter().zip(coords) {
                    self.doc.set_attr(g, key, &fmt_num(value));
                }
                g
            }
            ShadingKind::Radial { coords, .. } => {
                let g = self.doc.create_child(defs, "radialGradient");
                let [x0, y0, r0, x1, y1, r1] = coords;
                let attrs = [("cx", x1), ("cy", y1), ("r", r1), ("fx", x0), ("fy", y0), ("fr", r0)];
                for (key, value) in attrs {
                    self.doc.set_attr(g, key, &fmt_num(value));
                }
                g
            }
            _ => return None,
        };
        self.doc.set_attr(grad, "gradientUnits", "userSpaceOnUse");
        if !tr.is_identity() {
            self.doc.set_attr(grad, "gradientTransform", &tr.to_svg());
        }
        for stop in shading.gradient_stops(self.settings.color_delta) {
            let node = self.doc.create_child(grad, "stop");
            self.doc.set_attr(node, "offset", &fmt_num(stop.offset));
            self.doc.set_style(node, "stop-color", &stop.color.to_hex());
        }
        let prefix = self.doc.node(grad).name.clone();
        let id = self.doc.ensure_id(grad, &prefix);
        Some(format!("url(#{id})"))
    }

    // --- tiling patterns ---

    /// Open a `<pattern>` cell. Content until [`finish_tiling_pattern`]
    /// is drawn in pattern space.
    ///
    /// `target_transform` maps pattern space to page space at the place
    /// the pattern was selected.
    ///
    /// [`finish_tiling_pattern`]: SvgBuilder::finish_tiling_pattern
    pub fn start_tiling_pattern(&mut self, info: &TilingPatternInfo, target_transform: &Affine) {
        let pattern = self.doc.create("pattern");
        self.doc.ensure_id(pattern, "pattern");
        self.doc.set_attr(pattern, "patternUnits", "userSpaceOnUse");
        self.doc.set_attr(pattern, "x", &fmt_num(info.bbox.x0));
        self.doc.set_attr(pattern, "y", &fmt_num(info.bbox.y0));
        self.doc.set_attr(pattern, "width", &fmt_num(info.x_step.abs()));
        self.doc.set_attr(pattern, "height", &fmt_num(info.y_step.abs()));
        if !target_transform.is_identity() {
            self.doc.set_attr(pattern, "patternTransform", &target_transform.to_svg());
        }
        self.frames.push(StateFrame::default());
        let defs = self.doc.defs();
        self.push_container(pattern, ContainerKind::Pattern, info.bbox, Some(defs), false);
    }

    /// Close the innermost pattern cell and return its id.
    pub fn finish_tiling_pattern(&mut self) -> Result<String, PdfError> {
        if self.text.has_glyphs() {
            self.flush_text();
        }
        let open = self.containers.iter().rposition(|c| c.kind == ContainerKind::Pattern);
        let Some(pos) = open else {
            return Err(InvariantViolation::ContainerStackUnderflow.into());
        };
        let depth = self.containers[pos].depth;
        while self.frames.len() > depth {
            debug!("unbalanced save inside tiling pattern");
            self.pop_frame()?;
        }
        while self.containers.len() > pos + 1 {
            self.pop_container()?;
        }
        let pattern = self.pop_container()?;
        self.frames.pop();
        Ok(self.doc.ensure_id(pattern.node, "pattern"))
    }

    /// `url(#…)` of `pattern_id` placed with `matrix` (pattern space to
    /// page space) for a node whose transform is `node_tr`.
    pub(super) fn pattern_url(
        &mut self,
        pattern_id: &str,
        matrix: &Affine,
        node_tr: &Affine,
    ) -> String {
        let tr = match node_tr.inverse() {
            Some(inv) => matrix.multiply(&inv),
            None => *matrix,
        };
        let key = (pattern_id.to_string(), tr.to_svg());
        if let Some(id) = self.pattern_refs.get(&key) {
            return format!("url(#{id})");
        }
        let defs = self.doc.defs();
        let wrapper = self.doc.create_child(defs, "pattern");
        let id = self.doc.ensure_id(wrapper, "pattern");
        self.doc.set_attr(wrapper, "xlink:href", &format!("#{pattern_id}"));
        self.doc.set_attr(wrapper, "patternTransform", &key.1);
        self.pattern_refs.insert(key, id.clone());
        format!("url(#{id})")
    }

    // --- color profiles ---

    /// Register an ICC profile and return the name colors refer to.
    pub fn add_color_profile(&mut self, data: &[u8]) -> String {
        let (name, is_new) = self.profiles.register(data);
        if is_new {
            let defs = self.doc.defs();
            let node = self.doc.create_child(defs, "color-profile");
            self.doc.set_attr(node, "name", &name);
            self.doc.set_attr(
                node,
                "xlink:href",
                &format!("data:application/vnd.iccprofile;base64,{}", STANDARD.encode(data)),
            );
        }
        name
    }
}
