//! Transparency groups, soft masks and optional content layers.

use tracing::{debug, warn};

use crate::color::Color;
use crate::error::{ImportWarningCode, InvariantViolation, PdfError};
use crate::geometry::{Rect, fmt_num};
use crate::path::Path;
use crate::state::GraphicsState;

use super::{ContainerKind, SvgBuilder};

/// `/Group` attributes of a form, plus the soft mask kind when the form
/// is the `/G` of a soft mask.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupOptions {
    pub isolated: bool,
    pub knockout: bool,
    /// `/S /Alpha`; a luminosity mask otherwise.
    pub alpha_mask: bool,
    /// `/BC` of a luminosity mask, converted through the group's space.
    pub backdrop: Option<Color>,
}

/// A registered `/OCG`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct OptionalGroup {
    label: String,
    visible: bool,
}

impl SvgBuilder<'_> {
    // --- transparency groups ---

    /// Open a group for a form XObject. `bbox` is the form's `/BBox` in the
    /// user space of `state`.
    ///
    /// With `for_softmask` the content is collected into a `<mask>` in
    /// `<defs>` instead of the page.
    pub fn start_group(
        &mut self,
        state: &GraphicsState,
        bbox: Rect,
        options: &GroupOptions,
        for_softmask: bool,
    ) {
        if self.text.has_glyphs() {
            self.flush_text();
        }
        let area = bbox.transform(&state.ctm);
        if for_softmask {
            let defs = self.doc.defs();
            let mask = self.doc.create("mask");
            self.doc.ensure_id(mask, "mask");
            self.doc.set_attr(mask, "maskUnits", "userSpaceOnUse");
            self.doc.set_attr(mask, "x", &fmt_num(area.x0));
            self.doc.set_attr(mask, "y", &fmt_num(area.y0));
            self.doc.set_attr(mask, "width", &fmt_num(area.width()));
            self.doc.set_attr(mask, "height", &fmt_num(area.height()));
            if options.alpha_mask {
                self.doc.set_style(mask, "mask-type", "alpha");
            }
            self.push_container(mask, ContainerKind::Mask, area, Some(defs), false);
            if let (false, Some(backdrop)) = (options.alpha_mask, options.backdrop) {
                let rect = self.doc.create_child(mask, "path");
                self.doc.set_attr(rect, "d", &Path::from_rect(&area).to_svg_data());
                self.doc.set_style(rect, "fill", &backdrop.to_hex());
                self.doc.set_style(rect, "stroke", "none");
            }
        } else {
            let group = self.doc.create("g");
            if options.isolated {
                self.doc.set_style(group, "isolation", "isolate");
            }
            self.push_container(group, ContainerKind::Group, area, None, true);
        }
        debug!(
            for_softmask,
            isolated = options.isolated,
            knockout = options.knockout,
            "group started"
        );
    }

    /// Close the group opened by [`start_group`].
    ///
    /// A finished soft mask is linked right away: a `<g mask>` container
    /// opens and stays open until the state level ends or the mask is
    /// reset. An ordinary group waits for [`pop_group`].
    ///
    /// [`start_group`]: SvgBuilder::start_group
    /// [`pop_group`]: SvgBuilder::pop_group
    pub fn finish_group(
        &mut self,
        _state: &GraphicsState,
        for_softmask: bool,
    ) -> Result<(), PdfError> {
        if self.text.has_glyphs() {
            self.flush_text();
        }
        let expected = if for_softmask { ContainerKind::Mask } else { ContainerKind::Group };
        if self.container_kind() != Some(expected) {
            return Err(InvariantViolation::ContainerStackUnderflow.into());
        }
        let container = self.pop_container()?;
        if for_softmask {
            let id = self.doc.ensure_id(container.node, "mask");
            let group = self.doc.create("g");
            self.doc.set_attr(group, "mask", &format!("url(#{id})"));
            let bbox = self.container_bbox();
            self.push_container(group, ContainerKind::MaskGroup, bbox, None, true);
            if let Some(frame) = self.frames.last_mut() {
                frame.mask_groups += 1;
            }
        } else {
            self.finished_groups.push(container.node);
        }
        Ok(())
    }

    /// Apply the invoking state's opacity and blend mode to the last
    /// finished group. Empty groups are dropped.
    pub fn pop_group(&mut self, state: &GraphicsState) -> Result<(), PdfError> {
        let group = self
            .finished_groups
            .pop()
            .ok_or(InvariantViolation::ContainerStackUnderflow)?;
        if self.doc.node(group).children().is_empty() {
            self.doc.detach(group);
            return Ok(());
        }
        if state.fill_alpha < 1.0 {
            self.doc.set_style(group, "opacity", &fmt_num(state.fill_alpha));
        }
        self.set_blend_style(group, state.blend_mode);
        Ok(())
    }

    /// `/SMask /None`: close the mask groups opened at this state level.
    ///
    /// A mask group with a clip group opened inside it stays open until
    /// the state level ends; content drawn before then is still masked.
    pub fn end_soft_mask(&mut self) -> Result<(), PdfError> {
        let depth = self.frames.len();
        loop {
            let open = self.frames.last().map_or(0, |f| f.mask_groups);
            if open == 0 {
                return Ok(());
            }
            match self.containers.last() {
                Some(top) if top.kind == ContainerKind::MaskGroup && top.depth == depth => {}
                _ => {
                    warn!("soft mask reset under an open clip; kept until restore");
                    self.warn(
                        ImportWarningCode::UnbalancedState,
                        "soft mask reset while a clip is open inside it; mask kept until Q",
                    );
                    return Ok(());
                }
            }
            self.pop_container()?;
            if let Some(frame) = self.frames.last_mut() {
                frame.mask_groups -= 1;
            }
        }
    }

    // --- optional content ---

    /// Make an `/OCG` known so marked content can refer to it.
    pub fn add_optional_group(&mut self, id: &str, label: &str, visible: bool) {
        self.optional_groups.insert(
            id.to_string(),
            OptionalGroup {
                label: label.to_string(),
                visible,
            },
        );
    }

    /// `BDC`/`BMC`. `/OC` content naming a registered group becomes a layer.
    pub fn begin_marked_content(&mut self, tag: &str, group: Option<&str>) {
        let layer = match (tag, group) {
            ("OC", Some(id)) => self.optional_groups.get(id).cloned(),
            _ => None,
        };
        let Some(layer) = layer else {
            self.marked.push(None);
            return;
        };
        if self.text.has_glyphs() {
            self.flush_text();
        }
        let node = self.doc.create("g");
        self.doc.set_attr(node, "inkscape:groupmode", "layer");
        self.doc.set_attr(node, "inkscape:label", &layer.label);
        if !layer.visible {
            self.doc.set_style(node, "display", "none");
        }
        let bbox = self.container_bbox();
        self.push_container(node, ContainerKind::Layer, bbox, None, true);
        self.marked.push(Some(node));
    }

    /// `EMC`.
    pub fn end_marked_content(&mut self) -> Result<(), PdfError> {
        let Some(entry) = self.marked.pop() else {
            self.warn(ImportWarningCode::UnbalancedState, "EMC without matching BMC/BDC");
            return Ok(());
        };
        let Some(node) = entry else {
            return Ok(());
        };
        if self.text.has_glyphs() {
            self.flush_text();
        }
        if self.container() == node {
            self.pop_container()?;
        } else if self.containers.iter().any(|c| c.node == node) {
            warn!("layer interleaved with save/restore; left open");
        }
        Ok(())
    }
}
