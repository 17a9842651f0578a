//! Clip path history.
//!
//! A stack of clip snapshots that mirrors the interpreter's `q`/`Q` stack.
//! Each entry owns its path outright; a child entry starts as a deep copy
//! of its parent, so setting a clip on the child never touches the parent.

use crate::error::InvariantViolation;
use crate::geometry::Affine;
use crate::path::{FillRule, Path};

/// One frame of the clip history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClipEntry {
    path: Option<Path>,
    fill_rule: FillRule,
    /// Transform active when the clip operator ran.
    affine: Affine,
    is_bbox: bool,
    copied: bool,
    cleared: bool,
}

impl ClipEntry {
    /// The clip path, in the user space described by [`ClipEntry::affine`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Whether the clip only covers the bounding box of its container.
    pub fn is_bbox(&self) -> bool {
        self.is_bbox
    }

    /// Whether the path was inherited from the parent and not yet replaced.
    pub fn is_copied(&self) -> bool {
        self.copied
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn has_clip_path(&self) -> bool {
        self.path.is_some()
    }

    /// A path exists and has not been suspended.
    pub fn has_clip(&self) -> bool {
        self.path.is_some() && !self.cleared
    }
}

/// Vec-backed stack of [`ClipEntry`] frames.
///
/// The root frame always exists and can never be restored away.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipHistory {
    stack: Vec<ClipEntry>,
}

impl Default for ClipHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipHistory {
    pub fn new() -> Self {
        Self {
            stack: vec![ClipEntry::default()],
        }
    }

    /// Number of frames above the root.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn current(&self) -> &ClipEntry {
        // The root frame is never popped.
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut ClipEntry {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn has_clip(&self) -> bool {
        self.current().has_clip()
    }

    /// Push a frame. With `cleared` the new frame inherits the path but
    /// reports no active clip until a new one is set.
    pub fn save(&mut self, cleared: bool) -> &ClipEntry {
        let parent = self.current();
        let entry = match parent.path {
            Some(ref path) => ClipEntry {
                path: Some(path.clone()),
                fill_rule: parent.fill_rule,
                affine: parent.affine,
                is_bbox: parent.is_bbox,
                copied: true,
                cleared,
            },
            None => ClipEntry {
                cleared,
                ..ClipEntry::default()
            },
        };
        self.stack.push(entry);
        self.current()
    }

    /// Pop the current frame and return the one below it.
    pub fn restore(&mut self) -> Result<&ClipEntry, InvariantViolation> {
        if self.stack.len() <= 1 {
            return Err(InvariantViolation::ClipStackUnderflow);
        }
        self.stack.pop();
        Ok(self.current())
    }

    /// Replace the current frame's clip.
    ///
    /// Only an empty frame or one holding an untouched copy of its parent
    /// may receive a clip.
    pub fn set_clip(
        &mut self,
        affine: Affine,
        path: Path,
        fill_rule: FillRule,
        is_bbox: bool,
    ) -> Result<(), InvariantViolation> {
        let entry = self.current_mut();
        if entry.path.is_some() && !entry.copied {
            return Err(InvariantViolation::InvalidClipStateTransition);
        }
        entry.path = Some(path);
        entry.fill_rule = fill_rule;
        entry.affine = affine;
        entry.is_bbox = is_bbox;
        entry.copied = false;
        entry.cleared = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn rect_path(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        Path::from_rect(&Rect::new(x0, y0, x1, y1))
    }

    /// Clip to the square `[0, size]` with an identity transform.
    fn unit_clip(h: &mut ClipHistory, size: f64) -> Result<(), InvariantViolation> {
        h.set_clip(Affine::identity(), rect_path(0.0, 0.0, size, size), FillRule::NonZero, false)
    }

    #[test]
    fn test_new_history_has_no_clip() {
        let h = ClipHistory::new();
        assert_eq!(h.depth(), 0);
        assert!(!h.has_clip());
        assert!(!h.current().has_clip_path());
    }

    #[test]
    fn test_restore_root_underflows() {
        let mut h = ClipHistory::new();
        assert_eq!(h.restore().unwrap_err(), InvariantViolation::ClipStackUnderflow);
        assert_eq!(h.depth(), 0);
    }

    #[test]
    fn test_save_without_parent_path_is_empty() {
        let mut h = ClipHistory::new();
        let entry = h.save(false);
        assert!(!entry.has_clip_path());
        assert!(!entry.is_copied());
    }

    #[test]
    fn test_save_copies_parent_path() {
        let mut h = ClipHistory::new();
        h.set_clip(
            Affine::translate(1.0, 2.0),
            rect_path(0.0, 0.0, 5.0, 5.0),
            FillRule::EvenOdd,
            true,
        )
        .unwrap();
        let entry = h.save(false).clone();
        assert!(entry.is_copied());
        assert!(entry.is_bbox());
        assert_eq!(entry.fill_rule(), FillRule::EvenOdd);
        assert_eq!(*entry.affine(), Affine::translate(1.0, 2.0));
        assert_eq!(entry.path(), Some(&rect_path(0.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_cleared_save_suspends_clip() {
        let mut h = ClipHistory::new();
        unit_clip(&mut h, 1.0).unwrap();
        let entry = h.save(true);
        assert!(entry.has_clip_path());
        assert!(!entry.has_clip());
        unit_clip(&mut h, 2.0).unwrap();
        assert!(h.has_clip());
        assert!(!h.current().is_cleared());
    }

    #[test]
    fn test_double_set_clip_is_invalid() {
        let mut h = ClipHistory::new();
        h.save(false);
        unit_clip(&mut h, 1.0).unwrap();
        let err = unit_clip(&mut h, 2.0).unwrap_err();
        assert_eq!(err, InvariantViolation::InvalidClipStateTransition);
    }

    #[test]
    fn test_set_clip_on_copy_is_allowed_once() {
        let mut h = ClipHistory::new();
        unit_clip(&mut h, 1.0).unwrap();
        h.save(false);
        assert!(unit_clip(&mut h, 2.0).is_ok());
        assert!(!h.current().is_copied());
        assert!(unit_clip(&mut h, 3.0).is_err());
    }

    // --- Stack balance ---

    #[test]
    fn test_balanced_sequence_restores_depth_and_clip() {
        let mut h = ClipHistory::new();
        h.set_clip(
            Affine::scale(2.0, 2.0),
            rect_path(0.0, 0.0, 4.0, 4.0),
            FillRule::NonZero,
            false,
        )
        .unwrap();
        let before = h.current().clone();
        let depth = h.depth();

        for i in 0..5 {
            h.save(i % 2 == 0);
            let n = f64::from(i);
            h.set_clip(
                Affine::translate(n, n),
                rect_path(n, n, n + 1.0, n + 1.0),
                FillRule::EvenOdd,
                false,
            )
            .unwrap();
        }
        for _ in 0..5 {
            h.restore().unwrap();
        }

        assert_eq!(h.depth(), depth);
        assert_eq!(*h.current(), before);
    }

    // --- Copy-on-write isolation ---

    #[test]
    fn test_child_clip_does_not_alter_parent() {
        let mut h = ClipHistory::new();
        let parent_path = rect_path(0.0, 0.0, 100.0, 100.0);
        h.set_clip(Affine::identity(), parent_path.clone(), FillRule::NonZero, false).unwrap();

        h.save(false);
        h.set_clip(
            Affine::translate(5.0, 5.0),
            rect_path(10.0, 10.0, 20.0, 20.0),
            FillRule::EvenOdd,
            false,
        )
        .unwrap();
        let parent = h.restore().unwrap();

        assert_eq!(parent.path(), Some(&parent_path));
        assert_eq!(parent.fill_rule(), FillRule::NonZero);
        assert_eq!(*parent.affine(), Affine::identity());
    }
}
