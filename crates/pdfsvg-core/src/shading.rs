//! Shadings and their vector approximation.
//!
//! Axial and radial shadings map onto SVG gradients; [`Shading::gradient_stops`]
//! samples their color function. Function-based and mesh shadings have no
//! SVG equivalent and are tessellated into flat-colored tiles by
//! [`Shading::tessellate`]. Both refine adaptively until neighbouring colors
//! differ by less than `color_delta`, up to [`MAX_SUBDIVISION_DEPTH`].

use crate::color::{Color, ColorSpace};
use crate::function::PdfFunction;
use crate::geometry::{Affine, Point, Rect};

/// Deepest subdivision applied to gradients and meshes.
pub const MAX_SUBDIVISION_DEPTH: u32 = 6;

/// A mesh vertex with its color components (or a single parametric `t`
/// when the shading has a function).
#[derive(Debug, Clone, PartialEq)]
pub struct MeshVertex {
    pub point: Point,
    pub color: Vec<f64>,
}

/// A Coons or tensor-product patch in tensor form.
///
/// `points[i][j]` is the control point at column `i` (u) and row `j` (v).
/// `colors` hold the corners at (u,v) = (0,0), (0,1), (1,1), (1,0).
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPatch {
    pub points: [[Point; 4]; 4],
    pub colors: [Vec<f64>; 4],
}

impl MeshPatch {
    /// Build from the 12 boundary points of a Coons patch, in stream order.
    pub fn from_coons(p: &[Point; 12], colors: [Vec<f64>; 4]) -> Self {
        let mut g = [[Point::default(); 4]; 4];
        g[0][0] = p[0];
        g[0][1] = p[1];
        g[0][2] = p[2];
        g[0][3] = p[3];
        g[1][3] = p[4];
        g[2][3] = p[5];
        g[3][3] = p[6];
        g[3][2] = p[7];
        g[3][1] = p[8];
        g[3][0] = p[9];
        g[2][0] = p[10];
        g[1][0] = p[11];
        let mix = |terms: &[(f64, Point)]| {
            let (x, y) = terms
                .iter()
                .fold((0.0, 0.0), |(x, y), (w, pt)| (x + w * pt.x, y + w * pt.y));
            Point::new(x / 9.0, y / 9.0)
        };
        g[1][1] = mix(&[
            (-4.0, g[0][0]),
            (6.0, g[0][1]),
            (6.0, g[1][0]),
            (-2.0, g[0][3]),
            (-2.0, g[3][0]),
            (3.0, g[3][1]),
            (3.0, g[1][3]),
            (-1.0, g[3][3]),
        ]);
        g[1][2] = mix(&[
            (-4.0, g[0][3]),
            (6.0, g[0][2]),
            (6.0, g[1][3]),
            (-2.0, g[0][0]),
            (-2.0, g[3][3]),
            (3.0, g[3][2]),
            (3.0, g[1][0]),
            (-1.0, g[3][0]),
        ]);
        g[2][1] = mix(&[
            (-4.0, g[3][0]),
            (6.0, g[3][1]),
            (6.0, g[2][0]),
            (-2.0, g[3][3]),
            (-2.0, g[0][0]),
            (3.0, g[0][1]),
            (3.0, g[2][3]),
            (-1.0, g[0][3]),
        ]);
        g[2][2] = mix(&[
            (-4.0, g[3][3]),
            (6.0, g[3][2]),
            (6.0, g[2][3]),
            (-2.0, g[3][0]),
            (-2.0, g[0][3]),
            (3.0, g[0][2]),
            (3.0, g[2][0]),
            (-1.0, g[0][0]),
        ]);
        Self { points: g, colors }
    }

    /// Build from the 16 points of a tensor-product patch, in stream order.
    pub fn from_tensor(p: &[Point; 16], colors: [Vec<f64>; 4]) -> Self {
        let mut g = [[Point::default(); 4]; 4];
        let order = [
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 3),
            (2, 3),
            (3, 3),
            (3, 2),
            (3, 1),
            (3, 0),
            (2, 0),
            (1, 0),
            (1, 1),
            (1, 2),
            (2, 2),
            (2, 1),
        ];
        for (k, (i, j)) in order.iter().enumerate() {
            g[*i][*j] = p[k];
        }
        Self { points: g, colors }
    }

    /// The surface point at `(u, v)`.
    pub fn point_at(&self, u: f64, v: f64) -> Point {
        let bern = |t: f64| {
            let s = 1.0 - t;
            [s * s * s, 3.0 * t * s * s, 3.0 * t * t * s, t * t * t]
        };
        let bu = bern(u);
        let bv = bern(v);
        let mut x = 0.0;
        let mut y = 0.0;
        for (i, column) in self.points.iter().enumerate() {
            for (j, p) in column.iter().enumerate() {
                let w = bu[i] * bv[j];
                x += w * p.x;
                y += w * p.y;
            }
        }
        Point::new(x, y)
    }

    fn color_at(&self, u: f64, v: f64) -> Vec<f64> {
        let weights = [(1.0 - u) * (1.0 - v), (1.0 - u) * v, u * v, u * (1.0 - v)];
        let n = self.colors.iter().map(Vec::len).max().unwrap_or(0);
        (0..n)
            .map(|k| {
                self.colors
                    .iter()
                    .zip(weights.iter())
                    .map(|(c, w)| w * c.get(k).copied().unwrap_or(0.0))
                    .sum()
            })
            .collect()
    }
}

/// Geometry of a shading.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadingKind {
    /// Type 1: color is a function of (x, y) over a domain rectangle.
    FunctionBased { domain: [f64; 4], matrix: Affine },
    /// Type 2: color varies along the axis `(x0,y0)-(x1,y1)`.
    Axial {
        coords: [f64; 4],
        domain: [f64; 2],
        extend: [bool; 2],
    },
    /// Type 3: color varies between two circles `(x0,y0,r0)` and `(x1,y1,r1)`.
    Radial {
        coords: [f64; 6],
        domain: [f64; 2],
        extend: [bool; 2],
    },
    /// Types 4 and 5: triangle meshes.
    Triangles(Vec<[MeshVertex; 3]>),
    /// Types 6 and 7: patch meshes.
    Patches(Vec<MeshPatch>),
}

/// A shading dictionary resolved into plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct Shading {
    /// `/ShadingType` (1 to 7).
    pub shading_type: u8,
    pub color_space: ColorSpace,
    pub function: Option<PdfFunction>,
    pub background: Option<Vec<f64>>,
    pub bbox: Option<Rect>,
    pub kind: ShadingKind,
}

/// One stop of a sampled gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient, `0.0..=1.0`.
    pub offset: f64,
    pub color: Color,
}

/// A flat-colored polygon approximating part of a shading.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTile {
    /// Polygon in shading space.
    pub polygon: Vec<Point>,
    pub color: Color,
}

impl Shading {
    /// Color for a set of components or a parametric value.
    pub fn color_for(&self, components: &[f64]) -> Color {
        match self.function {
            Some(ref f) => self.color_space.to_rgb(&f.eval(components)),
            None => self.color_space.to_rgb(components),
        }
    }

    /// Whether the shading converts to an SVG gradient.
    pub fn is_gradient(&self) -> bool {
        matches!(self.kind, ShadingKind::Axial { .. } | ShadingKind::Radial { .. })
    }

    /// Sample the color function of an axial or radial shading.
    ///
    /// Stops always include both ends and every stitching bound; further
    /// stops are inserted where linear interpolation between neighbours
    /// deviates by more than a quarter of `color_delta`.
    pub fn gradient_stops(&self, color_delta: f64) -> Vec<GradientStop> {
        let domain = match self.kind {
            ShadingKind::Axial { domain, .. } | ShadingKind::Radial { domain, .. } => domain,
            _ => return Vec::new(),
        };
        let (t0, t1) = (domain[0], domain[1]);
        let span = t1 - t0;
        let color_at = |s: f64| self.color_for(&[t0 + s * span]);

        let mut breaks = vec![0.0];
        if let Some(PdfFunction::Stitching { bounds, .. }) = &self.function {
            if span.abs() > f64::EPSILON {
                for b in bounds {
                    let s = (b - t0) / span;
                    if s > 0.0 && s < 1.0 {
                        breaks.push(s);
                    }
                }
            }
        }
        breaks.push(1.0);

        let mut stops = vec![GradientStop {
            offset: 0.0,
            color: color_at(0.0),
        }];
        for pair in breaks.windows(2) {
            refine_stops(&color_at, pair[0], pair[1], color_delta, 0, &mut stops);
        }
        stops
    }

    /// Approximate a function-based or mesh shading with flat tiles in
    /// shading space. Returns nothing for gradient shadings.
    pub fn tessellate(&self, color_delta: f64) -> Vec<MeshTile> {
        let mut tiles = Vec::new();
        match &self.kind {
            ShadingKind::FunctionBased { domain, matrix } => {
                self.tessellate_function(*domain, matrix, color_delta, 0, &mut tiles);
            }
            ShadingKind::Triangles(triangles) => {
                for tri in triangles {
                    self.tessellate_triangle(tri, color_delta, 0, &mut tiles);
                }
            }
            ShadingKind::Patches(patches) => {
                for patch in patches {
                    self.tessellate_patch(patch, [0.0, 1.0, 0.0, 1.0], color_delta, 0, &mut tiles);
                }
            }
            ShadingKind::Axial { .. } | ShadingKind::Radial { .. } => {}
        }
        tiles
    }

    fn tessellate_function(
        &self,
        d: [f64; 4],
        matrix: &Affine,
        color_delta: f64,
        depth: u32,
        out: &mut Vec<MeshTile>,
    ) {
        let [x0, x1, y0, y1] = d;
        let (xm, ym) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let center = self.color_for(&[xm, ym]);
        let corners = [
            self.color_for(&[x0, y0]),
            self.color_for(&[x1, y0]),
            self.color_for(&[x1, y1]),
            self.color_for(&[x0, y1]),
        ];
        let spread = corners.iter().map(|c| c.distance(&center)).fold(0.0, f64::max);
        if depth < MAX_SUBDIVISION_DEPTH && spread > color_delta {
            for quad in [
                [x0, xm, y0, ym],
                [xm, x1, y0, ym],
                [xm, x1, ym, y1],
                [x0, xm, ym, y1],
            ] {
                self.tessellate_function(quad, matrix, color_delta, depth + 1, out);
            }
            return;
        }
        let polygon = [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
        .iter()
        .map(|p| matrix.transform_point(*p))
        .collect();
        out.push(MeshTile {
            polygon,
            color: center,
        });
    }

    fn tessellate_triangle(
        &self,
        tri: &[MeshVertex; 3],
        color_delta: f64,
        depth: u32,
        out: &mut Vec<MeshTile>,
    ) {
        let colors: Vec<Color> = tri.iter().map(|v| self.color_for(&v.color)).collect();
        let spread = colors[0]
            .distance(&colors[1])
            .max(colors[1].distance(&colors[2]))
            .max(colors[0].distance(&colors[2]));
        if depth < MAX_SUBDIVISION_DEPTH && spread > color_delta {
            let mid = |a: &MeshVertex, b: &MeshVertex| MeshVertex {
                point: a.point.lerp(b.point, 0.5),
                color: lerp_components(&a.color, &b.color, 0.5),
            };
            let m01 = mid(&tri[0], &tri[1]);
            let m12 = mid(&tri[1], &tri[2]);
            let m20 = mid(&tri[2], &tri[0]);
            let children = [
                [tri[0].clone(), m01.clone(), m20.clone()],
                [m01.clone(), tri[1].clone(), m12.clone()],
                [m20.clone(), m12.clone(), tri[2].clone()],
                [m01, m12, m20],
            ];
            for child in &children {
                self.tessellate_triangle(child, color_delta, depth + 1, out);
            }
            return;
        }
        out.push(MeshTile {
            polygon: tri.iter().map(|v| v.point).collect(),
            color: Color::average(&colors),
        });
    }

    fn tessellate_patch(
        &self,
        patch: &MeshPatch,
        uv: [f64; 4],
        color_delta: f64,
        depth: u32,
        out: &mut Vec<MeshTile>,
    ) {
        let [u0, u1, v0, v1] = uv;
        let corners = [(u0, v0), (u0, v1), (u1, v1), (u1, v0)];
        let colors: Vec<Color> = corners
            .iter()
            .map(|(u, v)| self.color_for(&patch.color_at(*u, *v)))
            .collect();
        let spread = colors
            .iter()
            .flat_map(|a| colors.iter().map(move |b| a.distance(b)))
            .fold(0.0, f64::max);
        if depth < MAX_SUBDIVISION_DEPTH && spread > color_delta {
            let (um, vm) = ((u0 + u1) / 2.0, (v0 + v1) / 2.0);
            for sub in [
                [u0, um, v0, vm],
                [u0, um, vm, v1],
                [um, u1, vm, v1],
                [um, u1, v0, vm],
            ] {
                self.tessellate_patch(patch, sub, color_delta, depth + 1, out);
            }
            return;
        }
        out.push(MeshTile {
            polygon: corners.iter().map(|(u, v)| patch.point_at(*u, *v)).collect(),
            color: Color::average(&colors),
        });
    }
}

fn lerp_components(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x + (y - x) * t)
        .collect()
}

fn refine_stops(
    color_at: &dyn Fn(f64) -> Color,
    s0: f64,
    s1: f64,
    color_delta: f64,
    depth: u32,
    stops: &mut Vec<GradientStop>,
) {
    let c0 = color_at(s0);
    let c1 = color_at(s1);
    let sm = (s0 + s1) / 2.0;
    let cm = color_at(sm);
    let linear = Color::average(&[c0, c1]);
    if depth < MAX_SUBDIVISION_DEPTH && cm.distance(&linear) > color_delta / 4.0 {
        refine_stops(color_at, s0, sm, color_delta, depth + 1, stops);
        refine_stops(color_at, sm, s1, color_delta, depth + 1, stops);
        return;
    }
    stops.push(GradientStop {
        offset: s1,
        color: c1,
    });
}
