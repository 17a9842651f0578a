//! End-to-end checks of the builder through its public API.

use pdfsvg_core::{
    Affine, BuilderSettings, ClipHistory, Color, FillRule, FontCatalog, FontContext, FontStrategies,
    GraphicsState, MemoryFontCatalog, Paint, PageFrame, Path, Rect, SvgBuilder, SvgDocument,
    strip_subset_tag,
};

struct Fonts {
    catalog: FontCatalog,
    strategies: FontStrategies,
    system: MemoryFontCatalog,
}

impl Fonts {
    fn new() -> Self {
        Fonts {
            catalog: FontCatalog::new(),
            strategies: FontStrategies::new(),
            system: MemoryFontCatalog::new(["DejaVu Sans"]),
        }
    }

    fn context(&self) -> FontContext<'_> {
        FontContext {
            catalog: &self.catalog,
            strategies: &self.strategies,
            system: &self.system,
        }
    }
}

fn page(fonts: &Fonts) -> SvgBuilder<'_> {
    SvgBuilder::new(
        PageFrame::new(Rect::new(0.0, 0.0, 100.0, 100.0), 0),
        BuilderSettings::default(),
        fonts.context(),
    )
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
    Path::from_rect(&Rect::new(x0, y0, x1, y1))
}

fn red() -> GraphicsState {
    let mut gs = GraphicsState::default();
    gs.fill = Paint::solid(Color::rgb(1.0, 0.0, 0.0));
    gs
}

fn clip_chain(doc: &SvgDocument, node: pdfsvg_core::NodeId) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = Some(node);
    while let Some(id) = cur {
        if let Some(url) = doc.attr(id, "clip-path") {
            out.push(url.to_string());
        }
        cur = doc.node(id).parent();
    }
    out
}

// --- clip history ---

#[test]
fn clip_stack_balances_over_nested_saves() {
    let mut history = ClipHistory::new();
    for _ in 0..5 {
        history.save(false);
    }
    history
        .set_clip(Affine::identity(), square(0.0, 0.0, 1.0, 1.0), FillRule::NonZero, false)
        .unwrap();
    for _ in 0..5 {
        history.restore().unwrap();
    }
    assert_eq!(history.depth(), 0);
    assert!(!history.has_clip());
    assert!(history.restore().is_err());
}

#[test]
fn clip_copy_does_not_leak_into_parent() {
    let mut history = ClipHistory::new();
    history
        .set_clip(Affine::identity(), square(0.0, 0.0, 10.0, 10.0), FillRule::NonZero, false)
        .unwrap();
    history.save(false);
    assert!(history.current().is_copied());
    history
        .set_clip(Affine::scale(2.0, 2.0), square(1.0, 1.0, 2.0, 2.0), FillRule::EvenOdd, false)
        .unwrap();
    let parent = history.restore().unwrap().clone();
    assert_eq!(parent.path(), Some(&square(0.0, 0.0, 10.0, 10.0)));
    assert_eq!(parent.fill_rule(), FillRule::NonZero);
    assert!(parent.affine().is_identity());
}

// --- pages ---

#[test]
fn red_square_page() {
    let fonts = Fonts::new();
    let mut b = page(&fonts);
    b.add_path(&red(), &square(10.0, 10.0, 60.0, 60.0), true, false, false)
        .unwrap();
    let result = b.finish();
    assert!(result.warnings.is_empty());
    let svg = result.value.to_svg_string();
    assert!(svg.starts_with("<?xml"));
    assert!(svg.contains(r#"d="M 10,10 L 60,10 L 60,60 L 10,60 Z""#));
    assert!(svg.contains("fill:#ff0000"));
    assert!(svg.contains(r#"inkscape:label="Page 1""#));
}

#[test]
fn nested_clips_intersect_through_groups() {
    let fonts = Fonts::new();
    let mut b = page(&fonts);
    let gs = GraphicsState::default();
    b.set_clip(&gs, &square(0.0, 0.0, 50.0, 50.0), FillRule::NonZero).unwrap();
    b.save_state(&gs);
    b.set_clip(&gs, &square(25.0, 25.0, 75.0, 75.0), FillRule::NonZero).unwrap();
    b.add_path(&red(), &square(0.0, 0.0, 100.0, 100.0), true, false, false)
        .unwrap();
    b.restore_state(&gs).unwrap();
    b.add_path(&red(), &square(0.0, 0.0, 10.0, 10.0), true, false, false)
        .unwrap();
    let doc = b.finish().value;

    let paths: Vec<_> = doc
        .elements_named("path")
        .into_iter()
        .filter(|p| doc.style(*p, "fill").is_some())
        .collect();
    assert_eq!(paths.len(), 2);
    let inner = clip_chain(&doc, paths[0]);
    assert_eq!(inner.len(), 2);
    assert_ne!(inner[0], inner[1]);
    // After the restore only the outer clip applies.
    assert_eq!(clip_chain(&doc, paths[1]), vec![inner[1].clone()]);
}

#[test]
fn path_merge_depends_on_adjacency() {
    let fonts = Fonts::new();
    let outline = square(10.0, 10.0, 20.0, 20.0);

    let mut b = page(&fonts);
    b.add_path(&red(), &outline, true, false, false).unwrap();
    b.add_path(&red(), &outline, false, true, false).unwrap();
    let merged = b.finish().value;
    assert_eq!(merged.elements_named("path").len(), 1);

    let mut b = page(&fonts);
    b.add_path(&red(), &outline, true, false, false).unwrap();
    b.add_path(&red(), &square(50.0, 50.0, 60.0, 60.0), true, false, false)
        .unwrap();
    b.add_path(&red(), &outline, false, true, false).unwrap();
    let separate = b.finish().value;
    assert_eq!(separate.elements_named("path").len(), 3);
}

// --- fonts ---

#[test]
fn subset_tag_strip_is_idempotent() {
    for name in ["ABCDEF+Helvetica", "Helvetica", "ABCDEF+", "abcdef+Times"] {
        let once = strip_subset_tag(name);
        assert_eq!(strip_subset_tag(once), once);
    }
    assert_eq!(strip_subset_tag("ABCDEF+Helvetica"), "Helvetica");
    assert_eq!(strip_subset_tag("ABCDEF+"), "ABCDEF+");
}
