//! Turns interpreter callbacks into an [`SvgDocument`].
//!
//! [`SvgBuilder`] mirrors the interpreter's `q`/`Q` stack with tracker
//! frames, keeps a LIFO stack of open containers (the page layer, clip
//! groups, mask groups, transparency groups, masks, layers and patterns)
//! on top of a [`ClipHistory`], and appends paths, text, images and
//! shadings to whichever container is current.

mod groups;
mod images;
mod paths;
mod shading;
mod text;

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::clip::ClipHistory;
use crate::document::{NodeId, SvgDocument};
use crate::error::{ImportResult, ImportWarning, ImportWarningCode, InvariantViolation, PdfError};
use crate::font::{FontCatalog, FontStrategies};
use crate::font_system::FontSystemCatalog;
use crate::geometry::{Affine, Rect};
use crate::icc::ProfileRegistry;
use crate::page::PageFrame;
use crate::path::{FillRule, Path};
use crate::state::GraphicsState;

pub use groups::GroupOptions;
pub use shading::TilingPatternInfo;
pub use text::GlyphInput;

use text::TextRun;

/// Fonts and fallback decisions available while building one page.
#[derive(Clone, Copy)]
pub struct FontContext<'a> {
    pub catalog: &'a FontCatalog,
    pub strategies: &'a FontStrategies,
    pub system: &'a dyn FontSystemCatalog,
}

impl std::fmt::Debug for FontContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontContext")
            .field("fonts", &self.catalog.len())
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

/// Output settings for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderSettings {
    /// Color step for gradient sampling and mesh tessellation.
    pub color_delta: f64,
    pub embed_images: bool,
    /// Clip the page layer to the visible page area.
    pub crop: bool,
    /// 1-based page number, used for labels and warnings.
    pub page_number: usize,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            color_delta: 0.5,
            embed_images: true,
            crop: false,
            page_number: 1,
        }
    }
}

/// Kinds of container nodes on the node stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Page,
    ClipGroup,
    MaskGroup,
    Group,
    Mask,
    Layer,
    Pattern,
}

#[derive(Debug, Clone)]
struct Container {
    node: NodeId,
    kind: ContainerKind,
    /// Area covered by the container, in page space.
    bbox: Rect,
    /// Tracker depth when the container was opened.
    depth: usize,
}

/// One mirrored `q` level.
#[derive(Debug, Clone, Default)]
struct StateFrame {
    clip_groups: usize,
    mask_groups: usize,
    ctm: Affine,
}

/// Builds one page.
#[derive(Debug)]
pub struct SvgBuilder<'a> {
    doc: SvgDocument,
    frame: PageFrame,
    settings: BuilderSettings,
    fonts: FontContext<'a>,
    clip_history: ClipHistory,
    frames: Vec<StateFrame>,
    containers: Vec<Container>,
    finished_groups: Vec<NodeId>,
    clip_cache: BTreeMap<(String, String, FillRule), String>,
    pattern_refs: BTreeMap<(String, String), String>,
    profiles: ProfileRegistry,
    optional_groups: BTreeMap<String, groups::OptionalGroup>,
    marked: Vec<Option<NodeId>>,
    text: TextRun,
    warnings: Vec<ImportWarning>,
}

impl<'a> SvgBuilder<'a> {
    pub fn new(frame: PageFrame, settings: BuilderSettings, fonts: FontContext<'a>) -> Self {
        let mut builder = SvgBuilder {
            doc: SvgDocument::new(frame.width, frame.height),
            frame,
            settings,
            fonts,
            clip_history: ClipHistory::new(),
            frames: vec![StateFrame::default()],
            containers: Vec::new(),
            finished_groups: Vec::new(),
            clip_cache: BTreeMap::new(),
            pattern_refs: BTreeMap::new(),
            profiles: ProfileRegistry::default(),
            optional_groups: BTreeMap::new(),
            marked: Vec::new(),
            text: TextRun::default(),
            warnings: Vec::new(),
        };

        if settings.crop {
            let cropped = builder.clip_history.set_clip(
                Affine::identity(),
                Path::from_rect(&frame.view),
                FillRule::NonZero,
                false,
            );
            debug_assert!(cropped.is_ok(), "root clip frame starts empty");
        }
        let root = builder.doc.root();
        let page = builder.doc.create("g");
        builder.doc.set_attr(page, "inkscape:groupmode", "layer");
        builder
            .doc
            .set_attr(page, "inkscape:label", &format!("Page {}", settings.page_number));
        builder.doc.set_attr(page, "transform", &frame.transform.to_svg());
        builder.push_container(page, ContainerKind::Page, frame.view, Some(root), true);
        builder
    }

    pub fn document(&self) -> &SvgDocument {
        &self.doc
    }

    pub fn frame(&self) -> &PageFrame {
        &self.frame
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    /// Depth of mirrored `q` levels.
    pub fn state_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// CTM recorded by the innermost mirrored `q`.
    pub fn saved_ctm(&self) -> Affine {
        self.frames.last().map_or_else(Affine::identity, |f| f.ctm)
    }

    pub fn clip_history(&self) -> &ClipHistory {
        &self.clip_history
    }

    /// Node currently receiving content.
    pub fn container(&self) -> NodeId {
        match self.containers.last() {
            Some(c) => c.node,
            None => self.doc.root(),
        }
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        self.containers.last().map(|c| c.kind)
    }

    fn container_bbox(&self) -> Rect {
        self.containers.last().map_or(self.frame.view, |c| c.bbox)
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, code: ImportWarningCode, description: impl Into<String>) {
        let warning =
            ImportWarning::with_code(code, description).on_page(self.settings.page_number);
        debug!(%warning, "builder warning");
        self.warnings.push(warning);
    }

    /// Record a non-fatal problem raised by a content stream operator.
    pub fn warn_at(
        &mut self,
        code: ImportWarningCode,
        operator: &str,
        description: impl Into<String>,
    ) {
        let warning = ImportWarning::with_code(code, description)
            .on_page(self.settings.page_number)
            .at_operator(operator);
        debug!(%warning, "operator warning");
        self.warnings.push(warning);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    // --- containers ---

    /// Open `node` as the current container.
    ///
    /// The node is appended to `parent` (the current container when
    /// `None`); with `apply_clip` it receives the live clip. The clip
    /// history is then saved as cleared, so content inside does not
    /// repeat the clip.
    fn push_container(
        &mut self,
        node: NodeId,
        kind: ContainerKind,
        bbox: Rect,
        parent: Option<NodeId>,
        apply_clip: bool,
    ) {
        let parent = parent.unwrap_or_else(|| self.container());
        self.doc.append(parent, node);
        if apply_clip {
            self.apply_clip_attr(node, &Affine::identity());
        }
        trace!(?kind, depth = self.frames.len(), "push container");
        self.containers.push(Container {
            node,
            kind,
            bbox,
            depth: self.frames.len(),
        });
        self.clip_history.save(true);
    }

    fn pop_container(&mut self) -> Result<Container, PdfError> {
        let container = self
            .containers
            .pop()
            .ok_or(InvariantViolation::ContainerStackUnderflow)?;
        self.clip_history.restore()?;
        trace!(kind = ?container.kind, "pop container");
        if matches!(container.kind, ContainerKind::ClipGroup | ContainerKind::MaskGroup)
            && self.doc.node(container.node).children().is_empty()
        {
            self.doc.detach(container.node);
        }
        Ok(container)
    }

    /// Append a content node to the current container, with the live clip
    /// expressed relative to `node_tr` (the node's own transform).
    fn add_to_container(&mut self, node: NodeId, node_tr: &Affine) {
        let parent = self.container();
        self.doc.append(parent, node);
        self.apply_clip_attr(node, node_tr);
    }

    fn apply_clip_attr(&mut self, node: NodeId, node_tr: &Affine) {
        if let Some(url) = self.clip_url(node_tr) {
            self.doc.set_attr(node, "clip-path", &url);
        }
    }

    /// `url(#…)` of a clipPath reproducing the live clip for a node with
    /// transform `node_tr`. Identical clips share one element.
    fn clip_url(&mut self, node_tr: &Affine) -> Option<String> {
        let entry = self.clip_history.current();
        if !entry.has_clip() || entry.is_bbox() {
            return None;
        }
        let d = entry.path()?.to_svg_data();
        let rule = entry.fill_rule();
        let tr = entry.affine().multiply(&node_tr.inverse()?);
        Some(format!("url(#{})", self.clip_path_id(d, tr, rule)))
    }

    fn clip_path_id(&mut self, d: String, tr: Affine, rule: FillRule) -> String {
        let key = (d, tr.to_svg(), rule);
        if let Some(id) = self.clip_cache.get(&key) {
            return id.clone();
        }
        let defs = self.doc.defs();
        let clip = self.doc.create_child(defs, "clipPath");
        let id = self.doc.ensure_id(clip, "clipPath");
        self.doc.set_attr(clip, "clipPathUnits", "userSpaceOnUse");
        let path = self.doc.create_child(clip, "path");
        self.doc.set_attr(path, "d", &key.0);
        if !tr.is_identity() {
            self.doc.set_attr(path, "transform", &key.1);
        }
        if rule == FillRule::EvenOdd {
            self.doc.set_attr(path, "clip-rule", "evenodd");
        }
        self.clip_cache.insert(key, id.clone());
        id
    }

    // --- state tracking ---

    /// Mirror `q`.
    pub fn save_state(&mut self, state: &GraphicsState) {
        self.frames.push(StateFrame {
            ctm: state.ctm,
            ..StateFrame::default()
        });
        self.clip_history.save(false);
    }

    /// Mirror `Q`: close the clip and mask groups opened at this level,
    /// then drop the level's clip.
    pub fn restore_state(&mut self, _state: &GraphicsState) -> Result<(), PdfError> {
        if self.frames.len() <= self.frame_floor() {
            warn!("restore without matching save ignored");
            self.warn(ImportWarningCode::UnbalancedState, "restore without matching save");
            return Ok(());
        }
        if self.text.has_glyphs() {
            self.flush_text();
        }
        self.pop_frame()
    }

    /// Lowest frame count a restore may leave: the root frame, or the
    /// frame opened by the innermost tiling pattern.
    fn frame_floor(&self) -> usize {
        self.containers
            .iter()
            .rev()
            .find(|c| c.kind == ContainerKind::Pattern)
            .map_or(1, |c| c.depth)
    }

    fn pop_frame(&mut self) -> Result<(), PdfError> {
        let depth = self.frames.len();
        loop {
            let top = match self.containers.last() {
                Some(top)
                    if top.depth == depth
                        && !matches!(top.kind, ContainerKind::Page | ContainerKind::Pattern) =>
                {
                    top.clone()
                }
                _ => break,
            };
            if !matches!(top.kind, ContainerKind::ClipGroup | ContainerKind::MaskGroup) {
                warn!(kind = ?top.kind, "container left open at restore; closing it");
                for slot in self.marked.iter_mut() {
                    if *slot == Some(top.node) {
                        *slot = None;
                    }
                }
            }
            self.pop_container()?;
            if let Some(frame) = self.frames.last_mut() {
                match top.kind {
                    ContainerKind::ClipGroup => {
                        frame.clip_groups = frame.clip_groups.saturating_sub(1);
                    }
                    ContainerKind::MaskGroup => {
                        frame.mask_groups = frame.mask_groups.saturating_sub(1);
                    }
                    _ => {}
                }
            }
        }
        self.frames.pop();
        self.clip_history.restore()?;
        Ok(())
    }

    // --- clipping ---

    /// Intersect the clip with `path` (in the user space of `state`).
    pub fn set_clip(
        &mut self,
        state: &GraphicsState,
        path: &Path,
        rule: FillRule,
    ) -> Result<(), PdfError> {
        self.apply_clip(state.ctm, path.clone(), rule)
    }

    fn apply_clip(&mut self, affine: Affine, path: Path, rule: FillRule) -> Result<(), PdfError> {
        let is_bbox = self.covers_container(&affine, &path);
        let entry = self.clip_history.current();
        if is_bbox && entry.has_clip_path() {
            trace!("bounding box clip elided");
            return Ok(());
        }
        if entry.has_clip() {
            let group = self.doc.create("g");
            let bbox = self.container_bbox();
            self.push_container(group, ContainerKind::ClipGroup, bbox, None, true);
            if let Some(frame) = self.frames.last_mut() {
                frame.clip_groups += 1;
            }
        }
        self.clip_history.set_clip(affine, path, rule, is_bbox)?;
        Ok(())
    }

    /// The path is one axis-aligned rectangle containing the current
    /// container's area.
    fn covers_container(&self, affine: &Affine, path: &Path) -> bool {
        if !affine.preserves_axes() {
            return false;
        }
        match path.as_rect() {
            Some(rect) => rect.transform(affine).contains(&self.container_bbox()),
            None => false,
        }
    }

    // --- finishing ---

    /// Close everything still open and hand back the document.
    pub fn finish(mut self) -> ImportResult<SvgDocument> {
        if self.text.has_glyphs() {
            self.flush_text();
        }
        if !self.finished_groups.is_empty() {
            debug!(count = self.finished_groups.len(), "finished groups never popped");
        }
        while !self.containers.is_empty() {
            if self.pop_container().is_err() {
                break;
            }
        }
        ImportResult::with_warnings(self.doc, self.warnings)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_page_layer_carries_flip() {
        let env = Env::new();
        let b = env.builder();
        let page = b.container();
        assert_eq!(b.container_kind(), Some(ContainerKind::Page));
        assert_eq!(b.document().attr(page, "transform"), Some("matrix(1,0,0,-1,0,200)"));
        assert_eq!(b.document().attr(page, "inkscape:groupmode"), Some("layer"));
        assert_eq!(b.clip_history().depth(), 1);
    }

    #[test]
    fn test_unbalanced_restore_is_ignored() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = GraphicsState::default();
        b.restore_state(&gs).unwrap();
        assert_eq!(b.state_depth(), 0);
        let result = b.finish();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, ImportWarningCode::UnbalancedState);
    }

    #[test]
    fn test_save_restore_balances_clip_history() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = GraphicsState::default();
        let depth = b.clip_history().depth();
        for i in 0..3 {
            b.save_state(&GraphicsState::with_ctm(Affine::translate(f64::from(i), 0.0)));
            assert_eq!(b.saved_ctm(), Affine::translate(f64::from(i), 0.0));
            b.set_clip(&gs, &rect(10.0, 10.0, 50.0, 50.0), FillRule::NonZero).unwrap();
        }
        for _ in 0..3 {
            b.restore_state(&gs).unwrap();
        }
        assert_eq!(b.clip_history().depth(), depth);
        assert_eq!(b.container_kind(), Some(ContainerKind::Page));
        assert!(!b.clip_history().has_clip());
    }

    #[test]
    fn test_clip_covering_page_is_bbox() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = GraphicsState::default();
        b.save_state(&gs);
        b.set_clip(&gs, &rect(-10.0, -10.0, 300.0, 300.0), FillRule::NonZero).unwrap();
        assert!(b.clip_history().current().is_bbox());
        b.add_path(&gs, &rect(0.0, 0.0, 10.0, 10.0), true, false, false).unwrap();
        let doc = b.document();
        let path = doc.elements_named("path")[0];
        assert_eq!(doc.attr(path, "clip-path"), None);
        assert!(doc.elements_named("clipPath").is_empty());
    }

    #[test]
    fn test_bbox_clip_elided_when_clip_live() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = GraphicsState::default();
        b.save_state(&gs);
        b.set_clip(&gs, &rect(10.0, 10.0, 20.0, 20.0), FillRule::NonZero).unwrap();
        b.set_clip(&gs, &rect(0.0, 0.0, 200.0, 200.0), FillRule::NonZero).unwrap();
        // No clip group was needed.
        assert_eq!(b.container_kind(), Some(ContainerKind::Page));
        assert!(!b.clip_history().current().is_bbox());
    }

    #[test]
    fn test_crop_clips_page_layer() {
        let env = Env::new();
        let b = env.builder_with(BuilderSettings {
            crop: true,
            ..BuilderSettings::default()
        });
        let page = b.container();
        let doc = b.document();
        let clip = clip_of(doc, page).expect("page layer clipped");
        let path = doc.node(clip).children()[0];
        assert_eq!(doc.attr(path, "d"), Some("M 0,0 L 200,0 L 200,200 L 0,200 Z"));
    }
}
