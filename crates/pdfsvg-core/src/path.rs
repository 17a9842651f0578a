//! Path geometry shared by the interpreter, the clip history, and the
//! builder.
//!
//! Paths are kept in the user space that was active when they were
//! constructed. Consumers pair them with the transform of that moment.

use crate::geometry::{Affine, Point, Rect, bounding_rect, fmt_num};

/// Winding rule used to fill or clip a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillRule {
    /// Nonzero winding number rule (`f`, `W`).
    #[default]
    NonZero,
    /// Even-odd rule (`f*`, `W*`).
    EvenOdd,
}

impl FillRule {
    /// SVG `fill-rule` / `clip-rule` value.
    pub fn as_svg(&self) -> &'static str {
        match self {
            FillRule::NonZero => "nonzero",
            FillRule::EvenOdd => "evenodd",
        }
    }
}

/// A segment of a path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathSegment {
    /// Move to a new point (starts a new subpath).
    MoveTo(Point),
    /// Straight line from current point to target.
    LineTo(Point),
    /// Cubic Bezier curve with two control points and an endpoint.
    CurveTo {
        /// First control point.
        cp1: Point,
        /// Second control point.
        cp2: Point,
        /// Endpoint of the curve.
        end: Point,
    },
    /// Close the current subpath.
    ClosePath,
}

/// A complete path consisting of segments.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    /// The path segments.
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closed axis-aligned rectangle.
    pub fn from_rect(r: &Rect) -> Self {
        let mut b = PathBuilder::new();
        b.rectangle(r.x0, r.y0, r.width(), r.height());
        b.build()
    }

    /// A closed polygon through `points`.
    pub fn polygon(points: &[Point]) -> Self {
        let mut segments = Vec::with_capacity(points.len() + 1);
        for (i, p) in points.iter().enumerate() {
            segments.push(if i == 0 {
                PathSegment::MoveTo(*p)
            } else {
                PathSegment::LineTo(*p)
            });
        }
        if !segments.is_empty() {
            segments.push(PathSegment::ClosePath);
        }
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append all subpaths of `other`.
    pub fn extend(&mut self, other: &Path) {
        self.segments.extend(other.segments.iter().cloned());
    }

    /// A copy with every point mapped through `m`.
    pub fn transform(&self, m: &Affine) -> Path {
        let segments = self
            .segments
            .iter()
            .map(|seg| match seg {
                PathSegment::MoveTo(p) => PathSegment::MoveTo(m.transform_point(*p)),
                PathSegment::LineTo(p) => PathSegment::LineTo(m.transform_point(*p)),
                PathSegment::CurveTo { cp1, cp2, end } => PathSegment::CurveTo {
                    cp1: m.transform_point(*cp1),
                    cp2: m.transform_point(*cp2),
                    end: m.transform_point(*end),
                },
                PathSegment::ClosePath => PathSegment::ClosePath,
            })
            .collect();
        Path { segments }
    }

    /// Control-point bounding box.
    pub fn bbox(&self) -> Option<Rect> {
        let points: Vec<Point> = self
            .segments
            .iter()
            .flat_map(|seg| match seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => vec![*p],
                PathSegment::CurveTo { cp1, cp2, end } => vec![*cp1, *cp2, *end],
                PathSegment::ClosePath => vec![],
            })
            .collect();
        bounding_rect(&points)
    }

    /// The rectangle this path describes, if it is exactly one
    /// axis-aligned rectangle (as produced by `re`).
    pub fn as_rect(&self) -> Option<Rect> {
        let mut points = Vec::with_capacity(5);
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::MoveTo(p) if i == 0 => points.push(*p),
                PathSegment::LineTo(p) if i > 0 => points.push(*p),
                PathSegment::ClosePath if i == self.segments.len() - 1 => {}
                _ => return None,
            }
        }
        if points.len() == 5 && points[4].distance(points[0]) < 1e-9 {
            points.pop();
        }
        if points.len() != 4 {
            return None;
        }
        const EPS: f64 = 1e-6;
        let horizontal_first = (points[0].y - points[1].y).abs() < EPS
            && (points[1].x - points[2].x).abs() < EPS
            && (points[2].y - points[3].y).abs() < EPS
            && (points[3].x - points[0].x).abs() < EPS;
        let vertical_first = (points[0].x - points[1].x).abs() < EPS
            && (points[1].y - points[2].y).abs() < EPS
            && (points[2].x - points[3].x).abs() < EPS
            && (points[3].y - points[0].y).abs() < EPS;
        if horizontal_first || vertical_first {
            bounding_rect(&points)
        } else {
            None
        }
    }

    /// SVG path data, e.g. `M 0,0 L 10,10 Z`.
    pub fn to_svg_data(&self) -> String {
        let mut parts = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            parts.push(match seg {
                PathSegment::MoveTo(p) => format!("M {}", pt(p)),
                PathSegment::LineTo(p) => format!("L {}", pt(p)),
                PathSegment::CurveTo { cp1, cp2, end } => {
                    format!("C {} {} {}", pt(cp1), pt(cp2), pt(end))
                }
                PathSegment::ClosePath => "Z".to_string(),
            });
        }
        parts.join(" ")
    }
}

fn pt(p: &Point) -> String {
    format!("{},{}", fmt_num(p.x), fmt_num(p.y))
}

/// Builder for constructing paths from PDF path operators.
///
/// Coordinates are stored as given, in current user space.
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    segments: Vec<PathSegment>,
    current_point: Option<Point>,
    subpath_start: Option<Point>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `m` operator: move to a new point, starting a new subpath.
    pub fn move_to(&mut self, x: f64, y: f64) {
        let p = Point::new(x, y);
        self.segments.push(PathSegment::MoveTo(p));
        self.current_point = Some(p);
        self.subpath_start = Some(p);
    }

    /// `l` operator. Without a current point this starts a subpath.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x, y);
            return;
        }
        let p = Point::new(x, y);
        self.segments.push(PathSegment::LineTo(p));
        self.current_point = Some(p);
    }

    /// `c` operator: cubic Bezier curve with three coordinate pairs.
    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        if self.current_point.is_none() {
            self.move_to(x1, y1);
        }
        let end = Point::new(x3, y3);
        self.segments.push(PathSegment::CurveTo {
            cp1: Point::new(x1, y1),
            cp2: Point::new(x2, y2),
            end,
        });
        self.current_point = Some(end);
    }

    /// `v` operator: first control point equals the current point.
    pub fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        let Some(cp1) = self.current_point else {
            return;
        };
        let end = Point::new(x3, y3);
        self.segments.push(PathSegment::CurveTo {
            cp1,
            cp2: Point::new(x2, y2),
            end,
        });
        self.current_point = Some(end);
    }

    /// `y` operator: last control point equals the endpoint.
    pub fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        if self.current_point.is_none() {
            return;
        }
        let end = Point::new(x3, y3);
        self.segments.push(PathSegment::CurveTo {
            cp1: Point::new(x1, y1),
            cp2: end,
            end,
        });
        self.current_point = Some(end);
    }

    /// `h` operator: close the current subpath.
    pub fn close_path(&mut self) {
        if self.current_point.is_none() {
            return;
        }
        self.segments.push(PathSegment::ClosePath);
        self.current_point = self.subpath_start;
    }

    /// `re` operator: moveto + 3 lineto + closepath.
    pub fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn build(self) -> Path {
        Path {
            segments: self.segments,
        }
    }

    /// Take the accumulated segments and reset the builder.
    pub fn take_and_reset(&mut self) -> Path {
        let segments = std::mem::take(&mut self.segments);
        self.current_point = None;
        self.subpath_start = None;
        Path { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builder_is_empty() {
        let b = PathBuilder::new();
        assert!(b.is_empty());
        assert_eq!(b.current_point(), None);
    }

    #[test]
    fn test_line_path_svg_data() {
        let mut b = PathBuilder::new();
        b.move_to(0.0, 0.0);
        b.line_to(10.0, 10.0);
        assert_eq!(b.build().to_svg_data(), "M 0,0 L 10,10");
    }

    #[test]
    fn test_curve_and_close_svg_data() {
        let mut b = PathBuilder::new();
        b.move_to(0.0, 0.0);
        b.curve_to(1.0, 2.0, 3.0, 4.0, 5.5, 6.0);
        b.close_path();
        assert_eq!(b.build().to_svg_data(), "M 0,0 C 1,2 3,4 5.5,6 Z");
    }

    #[test]
    fn test_curve_to_v_without_current_point_is_noop() {
        let mut b = PathBuilder::new();
        b.curve_to_v(1.0, 1.0, 2.0, 2.0);
        assert!(b.is_empty());
    }

    #[test]
    fn test_close_returns_to_subpath_start() {
        let mut b = PathBuilder::new();
        b.move_to(3.0, 4.0);
        b.line_to(9.0, 4.0);
        b.close_path();
        assert_eq!(b.current_point(), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_take_and_reset() {
        let mut b = PathBuilder::new();
        b.rectangle(0.0, 0.0, 1.0, 1.0);
        let path = b.take_and_reset();
        assert_eq!(path.segments.len(), 5);
        assert!(b.is_empty());
        assert_eq!(b.current_point(), None);
    }

    // --- Rectangle detection ---

    #[test]
    fn test_re_path_is_rect() {
        let mut b = PathBuilder::new();
        b.rectangle(10.0, 20.0, 100.0, 50.0);
        assert_eq!(b.build().as_rect(), Some(Rect::new(10.0, 20.0, 110.0, 70.0)));
    }

    #[test]
    fn test_negative_re_is_normalized() {
        let mut b = PathBuilder::new();
        b.rectangle(10.0, 10.0, -5.0, -5.0);
        assert_eq!(b.build().as_rect(), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn test_triangle_is_not_rect() {
        let path = Path::polygon(&[
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 5.0),
        ]);
        assert_eq!(path.as_rect(), None);
    }

    #[test]
    fn test_rotated_rect_is_not_rect() {
        let path =
            Path::from_rect(&Rect::new(0.0, 0.0, 10.0, 10.0)).transform(&Affine::rotate(45.0));
        assert_eq!(path.as_rect(), None);
    }

    #[test]
    fn test_rect_survives_axis_preserving_transform() {
        let path = Path::from_rect(&Rect::new(0.0, 0.0, 10.0, 10.0))
            .transform(&Affine::new(1.0, 0.0, 0.0, -1.0, 0.0, 100.0));
        assert_eq!(path.as_rect(), Some(Rect::new(0.0, 90.0, 10.0, 100.0)));
    }

    #[test]
    fn test_bbox_includes_control_points() {
        let mut b = PathBuilder::new();
        b.move_to(0.0, 0.0);
        b.curve_to(0.0, 20.0, 10.0, 20.0, 10.0, 0.0);
        assert_eq!(b.build().bbox(), Some(Rect::new(0.0, 0.0, 10.0, 20.0)));
    }

    #[test]
    fn test_fill_rule_svg_names() {
        assert_eq!(FillRule::NonZero.as_svg(), "nonzero");
        assert_eq!(FillRule::EvenOdd.as_svg(), "evenodd");
    }
}
