//! Image XObjects and inline images.
//!
//! Every image is drawn into the unit square of its user space, so the
//! `<image>` element spans `0 0 1 1` and carries the flipped CTM.

use tracing::warn;

use crate::document::NodeId;
use crate::error::{ImportWarningCode, PdfError};
use crate::geometry::{Affine, fmt_num};
use crate::image::{
    ColorKeyMask, ImageEncodeError, RasterImage, StencilMask, image_data_uri, stencil_data_uri,
};
use crate::state::{GraphicsState, Paint};

use super::SvgBuilder;

impl SvgBuilder<'_> {
    /// Draw an opaque image, optionally with `/Mask [ranges]` color keying.
    pub fn add_image(
        &mut self,
        state: &GraphicsState,
        image: &RasterImage,
        color_key: Option<&ColorKeyMask>,
    ) -> Result<(), PdfError> {
        let href = if self.settings.embed_images {
            let alpha = color_key.map(|key| key.alpha(image.pixel_count()));
            match self.encoded(image_data_uri(image, alpha.as_deref())) {
                Some(uri) => Some(uri),
                None => return Ok(()),
            }
        } else {
            None
        };
        self.place_image(state, href, image.interpolate);
        Ok(())
    }

    /// Paint the fill color through a stencil mask (`/ImageMask true`).
    pub fn add_image_mask(
        &mut self,
        state: &GraphicsState,
        mask: &StencilMask,
        invert: bool,
    ) -> Result<(), PdfError> {
        let rgb = match &state.fill {
            Paint::None => return Ok(()),
            Paint::Solid { color, .. } => color.to_rgb8(),
            Paint::Shading { shading, .. } => self.fallback_color(shading).to_rgb8(),
            Paint::Tiling { .. } => [0, 0, 0],
        };
        let href = if self.settings.embed_images {
            match self.encoded(stencil_data_uri(mask, rgb, invert)) {
                Some(uri) => Some(uri),
                None => return Ok(()),
            }
        } else {
            None
        };
        self.place_image(state, href, mask.interpolate);
        Ok(())
    }

    /// Draw an image with an explicit stencil `/Mask` stream.
    pub fn add_masked_image(
        &mut self,
        state: &GraphicsState,
        image: &RasterImage,
        mask: &StencilMask,
        invert_mask: bool,
    ) -> Result<(), PdfError> {
        self.add_image_with_mask(state, image, &mask.to_luma_image(invert_mask))
    }

    /// Draw an image with a grayscale `/SMask`.
    pub fn add_soft_masked_image(
        &mut self,
        state: &GraphicsState,
        image: &RasterImage,
        soft_mask: &RasterImage,
    ) -> Result<(), PdfError> {
        let luma = RasterImage {
            components: 1,
            samples: soft_mask.to_luma(),
            jpeg: None,
            ..soft_mask.clone()
        };
        self.add_image_with_mask(state, image, &luma)
    }

    fn add_image_with_mask(
        &mut self,
        state: &GraphicsState,
        image: &RasterImage,
        luma: &RasterImage,
    ) -> Result<(), PdfError> {
        if !self.settings.embed_images {
            self.place_image(state, None, image.interpolate);
            return Ok(());
        }
        let Some(href) = self.encoded(image_data_uri(image, None)) else {
            return Ok(());
        };
        let mask = self.luminance_mask(luma);
        let node = self.place_image(state, Some(href), image.interpolate);
        if let Some(id) = mask {
            self.doc.set_attr(node, "mask", &format!("url(#{id})"));
        }
        Ok(())
    }

    /// A `<mask>` in `<defs>` holding `luma` over the unit square.
    fn luminance_mask(&mut self, luma: &RasterImage) -> Option<String> {
        let href = self.encoded(image_data_uri(luma, None))?;
        let defs = self.doc.defs();
        let mask = self.doc.create_child(defs, "mask");
        let id = self.doc.ensure_id(mask, "mask");
        self.doc.set_attr(mask, "maskUnits", "userSpaceOnUse");
        for (key, value) in [("x", "0"), ("y", "0"), ("width", "1"), ("height", "1")] {
            self.doc.set_attr(mask, key, value);
        }
        let image = self.doc.create_child(mask, "image");
        unit_square(&mut self.doc, image);
        self.doc.set_attr(image, "xlink:href", &href);
        Some(id)
    }

    fn place_image(
        &mut self,
        state: &GraphicsState,
        href: Option<String>,
        interpolate: bool,
    ) -> NodeId {
        let node = self.doc.create("image");
        unit_square(&mut self.doc, node);
        let transform = Affine::new(1.0, 0.0, 0.0, -1.0, 0.0, 1.0).multiply(&state.ctm);
        self.doc.set_attr(node, "transform", &transform.to_svg());
        if let Some(href) = href {
            self.doc.set_attr(node, "xlink:href", &href);
        }
        if !interpolate {
            self.doc.set_style(node, "image-rendering", "optimizeSpeed");
        }
        if state.fill_alpha < 1.0 {
            self.doc.set_style(node, "opacity", &fmt_num(state.fill_alpha));
        }
        self.set_blend_style(node, state.blend_mode);
        self.add_to_container(node, &transform);
        node
    }

    fn encoded(&mut self, result: Result<String, ImageEncodeError>) -> Option<String> {
        match result {
            Ok(uri) => Some(uri),
            Err(err) => {
                warn!(%err, "image skipped");
                self.warn(ImportWarningCode::ImageDecode, err.to_string());
                None
            }
        }
    }
}

fn unit_square(doc: &mut crate::document::SvgDocument, node: NodeId) {
    for (key, value) in [("x", "0"), ("y", "0"), ("width", "1"), ("height", "1")] {
        doc.set_attr(node, key, value);
    }
    doc.set_attr(node, "preserveAspectRatio", "none");
}

#[cfg(test)]
mod tests {
    use super::super::BuilderSettings;
    use super::super::test_support::*;
    use super::*;
    use crate::color::Color;

    fn checker() -> RasterImage {
        RasterImage::gray(2, 2, vec![0, 255, 255, 0])
    }

    fn placed(ctm: Affine) -> GraphicsState {
        GraphicsState::with_ctm(ctm)
    }

    #[test]
    fn test_image_spans_unit_square() {
        let env = Env::new();
        let mut b = env.builder();
        b.add_image(&placed(Affine::new(100.0, 0.0, 0.0, 50.0, 10.0, 20.0)), &checker(), None)
            .unwrap();
        let doc = b.document();
        let img = doc.elements_named("image")[0];
        assert_eq!(doc.attr(img, "width"), Some("1"));
        assert_eq!(doc.attr(img, "preserveAspectRatio"), Some("none"));
        assert_eq!(doc.attr(img, "transform"), Some("matrix(100,0,0,-50,10,70)"));
        assert!(doc.attr(img, "xlink:href").unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(doc.style(img, "image-rendering"), Some("optimizeSpeed"));
    }

    #[test]
    fn test_stencil_uses_fill_color() {
        let env = Env::new();
        let mut b = env.builder();
        let mut gs = placed(Affine::scale(10.0, 10.0));
        gs.fill = Paint::solid(Color::rgb(0.0, 1.0, 0.0));
        let mask = StencilMask {
            width: 1,
            height: 1,
            bits: vec![false],
            interpolate: true,
        };
        b.add_image_mask(&gs, &mask, false).unwrap();
        let doc = b.document();
        let img = doc.elements_named("image")[0];
        assert_eq!(doc.style(img, "image-rendering"), None);
        assert!(doc.attr(img, "xlink:href").is_some());

        gs.fill = Paint::None;
        let mut b = env.builder();
        b.add_image_mask(&gs, &mask, false).unwrap();
        assert!(b.document().elements_named("image").is_empty());
    }

    #[test]
    fn test_soft_masked_image_references_mask() {
        let env = Env::new();
        let mut b = env.builder();
        let smask = RasterImage::gray(2, 2, vec![255, 128, 64, 0]);
        b.add_soft_masked_image(&placed(Affine::scale(20.0, 20.0)), &checker(), &smask)
            .unwrap();
        let doc = b.document();
        let images = doc.elements_named("image");
        // The mask image in <defs> comes first.
        assert_eq!(images.len(), 2);
        let img = images[1];
        let url = doc.attr(img, "mask").unwrap();
        let mask = doc.find_by_id(url.trim_start_matches("url(#").trim_end_matches(')')).unwrap();
        assert_eq!(doc.node(mask).name, "mask");
        assert_eq!(doc.attr(mask, "maskUnits"), Some("userSpaceOnUse"));
        assert_eq!(doc.node(mask).children().len(), 1);
    }

    #[test]
    fn test_masked_image_with_stencil() {
        let env = Env::new();
        let mut b = env.builder();
        let mask = StencilMask {
            width: 2,
            height: 1,
            bits: vec![true, false],
            interpolate: false,
        };
        b.add_masked_image(&placed(Affine::identity()), &checker(), &mask, false)
            .unwrap();
        let doc = b.document();
        assert_eq!(doc.elements_named("mask").len(), 1);
    }

    #[test]
    fn test_images_not_embedded() {
        let env = Env::new();
        let mut b = env.builder_with(BuilderSettings {
            embed_images: false,
            ..BuilderSettings::default()
        });
        b.add_image(&placed(Affine::identity()), &checker(), None).unwrap();
        let doc = b.document();
        let img = doc.elements_named("image")[0];
        assert_eq!(doc.attr(img, "xlink:href"), None);
    }

    #[test]
    fn test_broken_image_is_a_warning() {
        let env = Env::new();
        let mut b = env.builder();
        let broken = RasterImage::rgb(10, 10, vec![0; 3]);
        b.add_image(&placed(Affine::identity()), &broken, None).unwrap();
        let result = b.finish();
        assert!(result.value.elements_named("image").is_empty());
        assert_eq!(result.warnings[0].code, ImportWarningCode::ImageDecode);
    }

    #[test]
    fn test_image_clip_is_relative_to_image_transform() {
        let env = Env::new();
        let mut b = env.builder();
        let gs = GraphicsState::default();
        b.set_clip(&gs, &rect(0.0, 0.0, 50.0, 50.0), crate::path::FillRule::NonZero)
            .unwrap();
        b.add_image(&placed(Affine::scale(100.0, 100.0)), &checker(), None).unwrap();
        let doc = b.document();
        let img = doc.elements_named("image")[0];
        let clip = clip_of(doc, img).unwrap();
        let path = doc.node(clip).children()[0];
        // Inverse of the unit-square transform [100 0 0 -100 0 100].
        assert_eq!(doc.attr(path, "transform"), Some("matrix(0.01,0,0,-0.01,0,1)"));
    }
}
