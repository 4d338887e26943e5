use std::cmp::Ordering;

use serde::Serialize;

use crate::error::{Result, SlicerError};

/// Tolerance for collinearity and zero-area checks, in square pixels
const GEOMETRY_EPSILON: f64 = 1e-6;

/// A point in source-image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Cross product of OA and OB; positive when O→A→B turns clockwise on screen
fn cross(o: Point, a: Point, b: Point) -> f64 {
    let oa = a.sub(o);
    let ob = b.sub(o);
    oa.x * ob.y - oa.y * ob.x
}

/// Four corners stored clockwise on screen (y grows downward).
///
/// Construction guarantees the shape is non-degenerate: no three corners are
/// collinear, the signed area is positive and the edges do not cross.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quadrilateral {
    corners: [Point; 4],
}

impl Quadrilateral {
    pub fn new(corners: [Point; 4]) -> Result<Self> {
        validate(&corners)?;
        Ok(Self { corners })
    }

    /// Upright rectangle with its top-left corner at (x, y)
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        Self::new([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn corner(&self, index: usize) -> Option<Point> {
        self.corners.get(index).copied()
    }

    /// Copy of this quadrilateral with one corner replaced
    pub fn with_corner(&self, index: usize, point: Point) -> Result<Self> {
        if index >= 4 {
            return Err(SlicerError::InvalidGeometry(format!(
                "corner index {} out of range",
                index
            )));
        }
        let mut corners = self.corners;
        corners[index] = point;
        Self::new(corners)
    }

    /// Shoelace area; positive for the clockwise-on-screen winding
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.corners)
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Mean of the four corners
    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Lengths of the top, right, bottom and left edges
    pub fn edge_lengths(&self) -> [f64; 4] {
        let c = &self.corners;
        [
            c[0].distance(c[1]),
            c[1].distance(c[2]),
            c[2].distance(c[3]),
            c[3].distance(c[0]),
        ]
    }

    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.corners)
    }

    /// Move every edge outward by `margin` pixels (inward when negative)
    pub fn offset(&self, margin: f64) -> Result<Self> {
        if margin == 0.0 {
            return Ok(*self);
        }
        let c = &self.corners;
        let mut lines = [(Point::new(0.0, 0.0), Point::new(0.0, 0.0)); 4];
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let d = b.sub(a);
            let len = d.x.hypot(d.y);
            let normal = Point::new(d.y / len, -d.x / len);
            let shifted = Point::new(a.x + normal.x * margin, a.y + normal.y * margin);
            lines[i] = (shifted, d);
        }

        let mut corners = [Point::new(0.0, 0.0); 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            let prev = lines[(i + 3) % 4];
            let next = lines[i];
            *corner = intersect_lines(prev, next).ok_or_else(|| {
                SlicerError::InvalidGeometry("parallel adjacent edges".to_string())
            })?;
        }

        // Contracting past the centre turns edges around; every offset edge
        // must keep the direction of the edge it came from
        for i in 0..4 {
            let old = lines[i].1;
            let new = corners[(i + 1) % 4].sub(corners[i]);
            if old.x * new.x + old.y * new.y <= 0.0 {
                return Err(SlicerError::InvalidGeometry(format!(
                    "margin {} collapses the boundary",
                    margin
                )));
            }
        }
        Self::new(corners)
    }

    /// Smallest distance between the two boundaries; zero when they overlap
    pub fn distance_to(&self, other: &Quadrilateral) -> f64 {
        let a = &self.corners;
        let b = &other.corners;

        if a.iter().any(|&p| other.contains(p)) || b.iter().any(|&p| self.contains(p)) {
            return 0.0;
        }
        for i in 0..4 {
            for j in 0..4 {
                if segments_cross(a[i], a[(i + 1) % 4], b[j], b[(j + 1) % 4]) {
                    return 0.0;
                }
            }
        }

        let mut best = f64::INFINITY;
        for i in 0..4 {
            for j in 0..4 {
                best = best
                    .min(point_segment_distance(a[i], b[j], b[(j + 1) % 4]))
                    .min(point_segment_distance(b[j], a[i], a[(i + 1) % 4]));
            }
        }
        best
    }
}

fn signed_area(corners: &[Point]) -> f64 {
    let n = corners.len();
    let mut twice = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += corners[i].x * corners[j].y - corners[j].x * corners[i].y;
    }
    twice / 2.0
}

fn validate(corners: &[Point; 4]) -> Result<()> {
    if corners.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(SlicerError::InvalidGeometry(
            "non-finite corner coordinate".to_string(),
        ));
    }

    // Every triple of the four corners
    for skip in 0..4 {
        let t: Vec<Point> = (0..4).filter(|&i| i != skip).map(|i| corners[i]).collect();
        if cross(t[0], t[1], t[2]).abs() <= GEOMETRY_EPSILON {
            return Err(SlicerError::InvalidGeometry(
                "three corners are collinear".to_string(),
            ));
        }
    }

    let area = signed_area(corners);
    if area <= GEOMETRY_EPSILON {
        return Err(SlicerError::InvalidGeometry(format!(
            "non-positive area {:.3} under clockwise winding",
            area
        )));
    }

    if segments_cross(corners[0], corners[1], corners[2], corners[3])
        || segments_cross(corners[1], corners[2], corners[3], corners[0])
    {
        return Err(SlicerError::InvalidGeometry(
            "edges intersect each other".to_string(),
        ));
    }

    Ok(())
}

/// Proper or touching intersection of segments AB and CD
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b.sub(a);
    let len2 = ab.x * ab.x + ab.y * ab.y;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let ap = p.sub(a);
    let t = ((ap.x * ab.x + ap.y * ab.y) / len2).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + ab.x * t, a.y + ab.y * t))
}

/// Even-odd ray casting
fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let mut inside = false;
    let n = poly.len();
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (poly[i], poly[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_at = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Intersection of two lines given as (point, direction)
fn intersect_lines((p, d): (Point, Point), (q, e): (Point, Point)) -> Option<Point> {
    let denom = d.x * e.y - d.y * e.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let qp = q.sub(p);
    let t = (qp.x * e.y - qp.y * e.x) / denom;
    Some(Point::new(p.x + d.x * t, p.y + d.y * t))
}

/// Convex hull by Andrew's monotone chain, clockwise on screen
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Minimum-area enclosing rectangle of a convex hull (rotating calipers).
///
/// Returns `None` when the hull has no area.
pub fn min_area_rect(hull: &[Point]) -> Option<[Point; 4]> {
    let n = hull.len();
    if n < 3 {
        return None;
    }

    let mut best: Option<(f64, [Point; 4])> = None;

    for i in 0..n {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % n];
        let edge = p2.sub(p1);
        let len = edge.x.hypot(edge.y);
        if len < 1e-12 {
            continue;
        }
        let u = Point::new(edge.x / len, edge.y / len);
        let v = Point::new(-u.y, u.x);

        let (mut min_u, mut max_u, mut min_v, mut max_v) =
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in hull {
            let d = p.sub(p1);
            let pu = d.x * u.x + d.y * u.y;
            let pv = d.x * v.x + d.y * v.y;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_some_and(|(a, _)| *a <= area + 1e-9) {
            continue;
        }

        let at = |a: f64, b: f64| Point::new(p1.x + u.x * a + v.x * b, p1.y + u.y * a + v.y * b);
        best = Some((
            area,
            [at(min_u, min_v), at(max_u, min_v), at(max_u, max_v), at(min_u, max_v)],
        ));
    }

    match best {
        Some((area, corners)) if area > GEOMETRY_EPSILON => Some(canonical_order(corners)),
        _ => None,
    }
}

/// Rotate a cyclic corner list so it runs clockwise on screen, starting from
/// the corner nearest the image origin
pub fn canonical_order(mut corners: [Point; 4]) -> [Point; 4] {
    if signed_area(&corners) < 0.0 {
        corners.reverse();
    }
    let start = (0..4)
        .min_by(|&a, &b| {
            let (pa, pb) = (corners[a], corners[b]);
            (pa.x + pa.y)
                .total_cmp(&(pb.x + pb.y))
                .then_with(|| pa.y.total_cmp(&pb.y))
        })
        .unwrap_or(0);
    corners.rotate_left(start);
    corners
}

/// Order two points top-to-bottom, then left-to-right
fn centroid_order(a: Point, b: Point) -> Ordering {
    a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x))
}

/// Sort boundaries into reading order: rows top-to-bottom, left-to-right within a row.
///
/// Boundaries are taken by centroid height; one joins the current row while
/// its top edge lies above the lowest bottom edge already in that row, so
/// photographs with aligned tops but different heights share a row.
pub fn reading_order(mut quads: Vec<Quadrilateral>) -> Vec<Quadrilateral> {
    quads.sort_by(|a, b| centroid_order(a.centroid(), b.centroid()));

    let by_x = |a: &Quadrilateral, b: &Quadrilateral| a.centroid().x.total_cmp(&b.centroid().x);
    let mut ordered = Vec::with_capacity(quads.len());
    let mut row: Vec<Quadrilateral> = Vec::new();
    let mut row_bottom = f64::NEG_INFINITY;
    for quad in quads {
        let top = quad.corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let bottom = quad.corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        if top >= row_bottom {
            row.sort_by(by_x);
            ordered.append(&mut row);
            row_bottom = bottom;
        } else {
            row_bottom = row_bottom.max(bottom);
        }
        row.push(quad);
    }
    row.sort_by(by_x);
    ordered.append(&mut row);
    ordered
}
