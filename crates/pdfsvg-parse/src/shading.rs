//! Shading dictionaries and mesh streams.
//!
//! Types 1 to 3 are read from their dictionaries. Types 4 to 7 carry
//! packed vertex and patch data in a stream; [`BitReader`] unpacks it
//! using `/BitsPerCoordinate`, `/BitsPerComponent`, `/BitsPerFlag` and the
//! `/Decode` ranges.

use lopdf::{Dictionary, Object};
use pdfsvg_core::shading::MeshPatch;
use pdfsvg_core::{Affine, ColorSpace, MeshVertex, Point, Shading, ShadingKind};
use tracing::{debug, warn};

use crate::color_space::ColorSpaceResolver;
use crate::error::BackendError;
use crate::function::parse_function;
use crate::lopdf_backend::{
    as_dict_like, dict_f64, dict_get, numbers, rect_from, resolve, stream_data,
};

/// Upper bound on decoded mesh elements.
const MAX_MESH_ELEMENTS: usize = 100_000;

fn shading_error(msg: impl Into<String>) -> BackendError {
    BackendError::Parse(msg.into())
}

/// Read a shading dictionary or stream.
pub fn parse_shading<F>(
    doc: &lopdf::Document,
    obj: &Object,
    spaces: &mut ColorSpaceResolver<'_, F>,
) -> Result<Shading, BackendError>
where
    F: FnMut(&[u8]) -> String,
{
    let obj = resolve(doc, obj);
    let dict = as_dict_like(obj).ok_or_else(|| shading_error("shading is not a dictionary"))?;
    let shading_type = dict_f64(doc, dict, b"ShadingType")
        .ok_or_else(|| shading_error("missing /ShadingType"))? as i64;
    if !(1..=7).contains(&shading_type) {
        return Err(shading_error(format!("unsupported shading type {shading_type}")));
    }
    let color_space = dict_get(doc, dict, b"ColorSpace")
        .and_then(|cs| spaces.resolve_object(cs))
        .ok_or_else(|| shading_error("shading has no usable /ColorSpace"))?;
    if matches!(color_space, ColorSpace::Pattern(_)) {
        return Err(shading_error("shading color space cannot be /Pattern"));
    }
    let function = match dict_get(doc, dict, b"Function") {
        Some(f) => Some(parse_function(doc, f).map_err(|e| shading_error(e.to_string()))?),
        None if shading_type <= 3 => return Err(shading_error("shading needs a /Function")),
        None => None,
    };
    let array = |key: &[u8]| dict_get(doc, dict, key).and_then(|o| numbers(doc, o));
    let background = array(b"Background");
    let bbox = dict_get(doc, dict, b"BBox").and_then(|o| rect_from(doc, o));
    let extend = match dict_get(doc, dict, b"Extend") {
        Some(Object::Array(items)) => {
            let flag = |i: usize| {
                matches!(items.get(i).map(|o| resolve(doc, o)), Some(Object::Boolean(true)))
            };
            [flag(0), flag(1)]
        }
        _ => [false, false],
    };
    let domain2 = || {
        let d = array(b"Domain").unwrap_or_default();
        match d.as_slice() {
            [a, b, ..] => [*a, *b],
            _ => [0.0, 1.0],
        }
    };

    let kind = match shading_type {
        1 => {
            let domain = match array(b"Domain").unwrap_or_default().as_slice() {
                [a, b, c, d, ..] => [*a, *b, *c, *d],
                _ => [0.0, 1.0, 0.0, 1.0],
            };
            let matrix = match array(b"Matrix").as_deref() {
                Some([a, b, c, d, e, f]) => Affine::new(*a, *b, *c, *d, *e, *f),
                _ => Affine::identity(),
            };
            ShadingKind::FunctionBased { domain, matrix }
        }
        2 => {
            let coords = match array(b"Coords").unwrap_or_default().as_slice() {
                [a, b, c, d] => [*a, *b, *c, *d],
                _ => return Err(shading_error("axial shading needs four /Coords")),
            };
            ShadingKind::Axial {
                coords,
                domain: domain2(),
                extend,
            }
        }
        3 => {
            let coords = match array(b"Coords").unwrap_or_default().as_slice() {
                [a, b, c, d, e, f] => [*a, *b, *c, *d, *e, *f],
                _ => return Err(shading_error("radial shading needs six /Coords")),
            };
            ShadingKind::Radial {
                coords,
                domain: domain2(),
                extend,
            }
        }
        _ => {
            let Object::Stream(stream) = obj else {
                return Err(shading_error("mesh shading must be a stream"));
            };
            let data = stream_data(stream)?;
            let layout =
                MeshLayout::read(doc, dict, &color_space, function.is_some(), shading_type)?;
            match shading_type {
                4 => ShadingKind::Triangles(free_triangles(&data, &layout)),
                5 => {
                    let per_row = dict_f64(doc, dict, b"VerticesPerRow").map_or(0, |v| v as usize);
                    if per_row < 2 {
                        return Err(shading_error("lattice shading needs /VerticesPerRow >= 2"));
                    }
                    ShadingKind::Triangles(lattice_triangles(&data, &layout, per_row))
                }
                _ => ShadingKind::Patches(patches(&data, &layout, shading_type == 7)),
            }
        }
    };
    debug!(shading_type, "shading parsed");
    Ok(Shading {
        shading_type: shading_type as u8,
        color_space,
        function,
        background,
        bbox,
        kind,
    })
}

// --- mesh data ---

/// How one mesh stream packs its values.
#[derive(Debug, Clone)]
struct MeshLayout {
    bits_per_coordinate: u32,
    bits_per_component: u32,
    bits_per_flag: u32,
    /// `[xmin xmax ymin ymax c1min c1max ...]`.
    decode: Vec<f64>,
    /// Color values per vertex: 1 with a function, the space's count otherwise.
    components: usize,
}

impl MeshLayout {
    fn read(
        doc: &lopdf::Document,
        dict: &Dictionary,
        space: &ColorSpace,
        has_function: bool,
        shading_type: i64,
    ) -> Result<Self, BackendError> {
        let bits = |key: &[u8]| dict_f64(doc, dict, key).map(|b| b as u32);
        let bits_per_coordinate = bits(b"BitsPerCoordinate").unwrap_or(0);
        let bits_per_component = bits(b"BitsPerComponent").unwrap_or(0);
        let bits_per_flag = if shading_type == 5 { 0 } else { bits(b"BitsPerFlag").unwrap_or(8) };
        if !matches!(bits_per_coordinate, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            return Err(shading_error(format!("bad BitsPerCoordinate {bits_per_coordinate}")));
        }
        if !(1..=16).contains(&bits_per_component) {
            return Err(shading_error(format!("bad BitsPerComponent {bits_per_component}")));
        }
        let components = if has_function { 1 } else { space.num_components() as usize };
        let decode = dict_get(doc, dict, b"Decode")
            .and_then(|o| numbers(doc, o))
            .unwrap_or_default();
        if decode.len() < 4 + 2 * components {
            return Err(shading_error("mesh shading /Decode is too short"));
        }
        Ok(Self {
            bits_per_coordinate,
            bits_per_component,
            bits_per_flag,
            decode,
            components,
        })
    }

    fn read_point(&self, r: &mut BitReader<'_>) -> Option<Point> {
        let x = r.read_decoded(self.bits_per_coordinate, self.decode[0], self.decode[1])?;
        let y = r.read_decoded(self.bits_per_coordinate, self.decode[2], self.decode[3])?;
        Some(Point::new(x, y))
    }

    fn read_color(&self, r: &mut BitReader<'_>) -> Option<Vec<f64>> {
        (0..self.components)
            .map(|i| {
                let (lo, hi) = (self.decode[4 + 2 * i], self.decode[5 + 2 * i]);
                r.read_decoded(self.bits_per_component, lo, hi)
            })
            .collect()
    }

    fn read_vertex(&self, r: &mut BitReader<'_>) -> Option<MeshVertex> {
        let point = self.read_point(r)?;
        let color = self.read_color(r)?;
        Some(MeshVertex { point, color })
    }
}

/// MSB-first bit reader.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    pub fn read(&mut self, bits: u32) -> Option<u64> {
        if bits == 0 {
            return Some(0);
        }
        if self.bit + bits as usize > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.data[self.bit / 8];
            let b = (byte >> (7 - (self.bit % 8))) & 1;
            value = (value << 1) | u64::from(b);
            self.bit += 1;
        }
        Some(value)
    }

    /// Read `bits` and map `0..=2^bits-1` onto `min..=max`.
    pub fn read_decoded(&mut self, bits: u32, min: f64, max: f64) -> Option<f64> {
        let raw = self.read(bits)? as f64;
        let top = ((1u64 << bits) - 1) as f64;
        Some(min + raw * (max - min) / top)
    }

    /// Skip to the next byte boundary.
    pub fn align(&mut self) {
        self.bit = self.bit.div_ceil(8) * 8;
    }
}

fn free_triangles(data: &[u8], layout: &MeshLayout) -> Vec<[MeshVertex; 3]> {
    let mut r = BitReader::new(data);
    let mut out: Vec<[MeshVertex; 3]> = Vec::new();
    let mut pending: Vec<MeshVertex> = Vec::new();
    while out.len() < MAX_MESH_ELEMENTS {
        let Some(flag) = r.read(layout.bits_per_flag) else { break };
        let Some(v) = layout.read_vertex(&mut r) else { break };
        r.align();
        let shared = match (flag, out.last()) {
            (1, Some([_, b, c])) if pending.is_empty() => Some((b.clone(), c.clone())),
            (2, Some([a, _, c])) if pending.is_empty() => Some((a.clone(), c.clone())),
            _ => None,
        };
        match shared {
            Some((p, q)) => out.push([p, q, v]),
            None => {
                pending.push(v);
                if pending.len() == 3 {
                    if let Ok(tri) = <[MeshVertex; 3]>::try_from(std::mem::take(&mut pending)) {
                        out.push(tri);
                    }
                }
            }
        }
    }
    out
}

fn lattice_triangles(data: &[u8], layout: &MeshLayout, per_row: usize) -> Vec<[MeshVertex; 3]> {
    let mut r = BitReader::new(data);
    let mut rows: Vec<Vec<MeshVertex>> = Vec::new();
    'rows: loop {
        let mut row = Vec::with_capacity(per_row);
        for _ in 0..per_row {
            match layout.read_vertex(&mut r) {
                Some(v) => row.push(v),
                None => break 'rows,
            }
        }
        rows.push(row);
        if rows.len() * per_row > MAX_MESH_ELEMENTS {
            break;
        }
    }
    let mut out = Vec::new();
    for pair in rows.windows(2) {
        let (top, bottom) = (&pair[0], &pair[1]);
        for i in 0..per_row - 1 {
            out.push([top[i].clone(), top[i + 1].clone(), bottom[i].clone()]);
            out.push([top[i + 1].clone(), bottom[i + 1].clone(), bottom[i].clone()]);
        }
    }
    out
}

fn patches(data: &[u8], layout: &MeshLayout, tensor: bool) -> Vec<MeshPatch> {
    let total = if tensor { 16 } else { 12 };
    let mut r = BitReader::new(data);
    let mut out = Vec::new();
    let mut prev: Option<(Vec<Point>, [Vec<f64>; 4])> = None;
    while out.len() < MAX_MESH_ELEMENTS {
        let Some(flag) = r.read(layout.bits_per_flag) else { break };
        let (mut points, mut colors): (Vec<Point>, Vec<Vec<f64>>) = match (flag, &prev) {
            (0, _) => (Vec::with_capacity(total), Vec::with_capacity(4)),
            (1..=3, Some((p, c))) => {
                let (idx, ci) = match flag {
                    1 => ([3, 4, 5, 6], [1, 2]),
                    2 => ([6, 7, 8, 9], [2, 3]),
                    _ => ([9, 10, 11, 0], [3, 0]),
                };
                (idx.iter().map(|i| p[*i]).collect(), ci.iter().map(|i| c[*i].clone()).collect())
            }
            _ => {
                warn!(flag, "patch edge flag without a previous patch");
                break;
            }
        };
        let point_count = total - points.len();
        let color_count = 4 - colors.len();
        let mut complete = true;
        for _ in 0..point_count {
            match layout.read_point(&mut r) {
                Some(p) => points.push(p),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        for _ in 0..color_count {
            match layout.read_color(&mut r) {
                Some(c) if complete => colors.push(c),
                _ => {
                    complete = false;
                    break;
                }
            }
        }
        r.align();
        if !complete {
            break;
        }
        let Ok(colors) = <[Vec<f64>; 4]>::try_from(colors) else { break };
        let patch = if tensor {
            match <[Point; 16]>::try_from(points.as_slice()) {
                Ok(p) => MeshPatch::from_tensor(&p, colors.clone()),
                Err(_) => break,
            }
        } else {
            match <[Point; 12]>::try_from(points.as_slice()) {
                Ok(p) => MeshPatch::from_coons(&p, colors.clone()),
                Err(_) => break,
            }
        };
        out.push(patch);
        prev = Some((points, colors));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn spaces(doc: &lopdf::Document) -> ColorSpaceResolver<'_, impl FnMut(&[u8]) -> String> {
        ColorSpaceResolver::new(doc, None, |_: &[u8]| "icc".to_string())
    }

    fn axial_dict() -> Dictionary {
        dictionary! {
            "ShadingType" => 2,
            "ColorSpace" => "DeviceRGB",
            "Coords" => vec![0.into(), 0.into(), 100.into(), 0.into()],
            "Extend" => vec![true.into(), false.into()],
            "Function" => dictionary! {
                "FunctionType" => 2,
                "Domain" => vec![0.into(), 1.into()],
                "C0" => vec![1.into(), 0.into(), 0.into()],
                "C1" => vec![0.into(), 0.into(), 1.into()],
                "N" => 1,
            },
        }
    }

    // --- dictionaries ---

    #[test]
    fn axial_shading() {
        let doc = lopdf::Document::new();
        let s = parse_shading(&doc, &axial_dict().into(), &mut spaces(&doc)).unwrap();
        assert_eq!(s.shading_type, 2);
        assert_eq!(s.color_space, ColorSpace::DeviceRGB);
        assert_eq!(
            s.kind,
            ShadingKind::Axial {
                coords: [0.0, 0.0, 100.0, 0.0],
                domain: [0.0, 1.0],
                extend: [true, false],
            }
        );
        assert!(s.function.is_some());
    }

    #[test]
    fn radial_needs_six_coords() {
        let doc = lopdf::Document::new();
        let mut dict = axial_dict();
        dict.set("ShadingType", 3);
        assert!(parse_shading(&doc, &dict.into(), &mut spaces(&doc)).is_err());
    }

    #[test]
    fn missing_function_is_an_error_for_gradients() {
        let doc = lopdf::Document::new();
        let mut dict = axial_dict();
        dict.remove(b"Function");
        assert!(parse_shading(&doc, &dict.into(), &mut spaces(&doc)).is_err());
    }

    // --- meshes ---

    #[test]
    fn bit_reader_reads_msb_first() {
        let mut r = BitReader::new(&[0b1010_0000, 0xff]);
        assert_eq!(r.read(1), Some(1));
        assert_eq!(r.read(3), Some(0b010));
        r.align();
        assert_eq!(r.read(8), Some(0xff));
        assert_eq!(r.read(1), None);
    }

    #[test]
    fn free_triangle_mesh_with_shared_edge() {
        let mut doc = lopdf::Document::new();
        // flag, x, y, gray: 8 bits each.
        let data = vec![
            0, 0, 0, 0, //
            0, 255, 0, 128, //
            0, 0, 255, 255, //
            1, 255, 255, 0, //
        ];
        let id = doc.add_object(Stream::new(
            dictionary! {
                "ShadingType" => 4,
                "ColorSpace" => "DeviceGray",
                "BitsPerCoordinate" => 8,
                "BitsPerComponent" => 8,
                "BitsPerFlag" => 8,
                "Decode" => vec![0.into(), 255.into(), 0.into(), 255.into(), 0.into(), 1.into()],
            },
            data,
        ));
        let s = parse_shading(&doc, &Object::Reference(id), &mut spaces(&doc)).unwrap();
        let ShadingKind::Triangles(tris) = s.kind else {
            panic!("expected triangles");
        };
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[1][0].point, Point::new(255.0, 0.0));
        assert_eq!(tris[1][2].point, Point::new(255.0, 255.0));
        assert_eq!(tris[0][2].color, vec![1.0]);
    }

    #[test]
    fn lattice_mesh_rows() {
        let mut doc = lopdf::Document::new();
        // Two rows of two vertices: x, y, gray.
        let data = vec![0, 0, 0, 10, 0, 0, 0, 10, 255, 10, 10, 255];
        let id = doc.add_object(Stream::new(
            dictionary! {
                "ShadingType" => 5,
                "ColorSpace" => "DeviceGray",
                "BitsPerCoordinate" => 8,
                "BitsPerComponent" => 8,
                "VerticesPerRow" => 2,
                "Decode" => vec![0.into(), 255.into(), 0.into(), 255.into(), 0.into(), 1.into()],
            },
            data,
        ));
        let s = parse_shading(&doc, &Object::Reference(id), &mut spaces(&doc)).unwrap();
        let ShadingKind::Triangles(tris) = s.kind else {
            panic!("expected triangles");
        };
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn coons_patch_and_continuation() {
        let mut doc = lopdf::Document::new();
        let mut data = vec![0u8];
        for i in 0..12u8 {
            data.extend_from_slice(&[i, i]);
        }
        data.extend_from_slice(&[0, 85, 170, 255]);
        // Continuation along edge 2: 8 points and 2 colors.
        data.push(2);
        for i in 0..8u8 {
            data.extend_from_slice(&[100 + i, 100 + i]);
        }
        data.extend_from_slice(&[10, 20]);
        let id = doc.add_object(Stream::new(
            dictionary! {
                "ShadingType" => 6,
                "ColorSpace" => "DeviceGray",
                "BitsPerCoordinate" => 8,
                "BitsPerComponent" => 8,
                "BitsPerFlag" => 8,
                "Decode" => vec![0.into(), 255.into(), 0.into(), 255.into(), 0.into(), 255.into()],
            },
            data,
        ));
        let s = parse_shading(&doc, &Object::Reference(id), &mut spaces(&doc)).unwrap();
        let ShadingKind::Patches(patches) = s.kind else {
            panic!("expected patches");
        };
        assert_eq!(patches.len(), 2);
        // The second patch starts at point 6 of the first.
        assert_eq!(patches[1].points[0][0], Point::new(6.0, 6.0));
        assert_eq!(patches[1].colors[0], vec![170.0]);
        assert_eq!(patches[1].colors[1], vec![255.0]);
        assert_eq!(patches[1].colors[2], vec![10.0]);
    }

    #[test]
    fn short_decode_is_rejected() {
        let mut doc = lopdf::Document::new();
        let id = doc.add_object(Stream::new(
            dictionary! {
                "ShadingType" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerCoordinate" => 8,
                "BitsPerComponent" => 8,
                "BitsPerFlag" => 8,
                "Decode" => vec![0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into()],
            },
            Vec::new(),
        ));
        assert!(parse_shading(&doc, &Object::Reference(id), &mut spaces(&doc)).is_err());
    }
}
