use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        std::array::from_fn(|r| std::array::from_fn(|c| self.h[(r, c)]))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    /// All nine entries are finite.
    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

fn hartley_normalization(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // translate to centroid, scale so the mean distance is sqrt(2)
    let cx = pts.iter().map(|p| p.x as f64).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y as f64).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / 4.0;

    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new(v[0], v[1])
    });
    (out, t)
}

/// Solve `dst ~ H * src` exactly from four correspondences (h33 = 1).
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular or the result cannot be rescaled.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32]
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = hartley_normalization(src);
    let (dst_n, t_dst) = hartley_normalization(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = r0 + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    // H = T_dst^-1 * Hn * T_src, rescaled so h33 = 1
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    let h = Homography::new(h / s);
    h.is_finite().then_some(h)
}

/// Why a four-point configuration cannot define a usable homography.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuadDegeneracy {
    Coincident { a: usize, b: usize },
    Collinear { a: usize, b: usize, c: usize },
}

/// Check four points for coincident pairs or collinear triples.
///
/// `rel_eps` is relative to the squared diameter of the point set, so the
/// test does not depend on the image resolution.
pub fn quad_degeneracy(pts: &[Point2<f32>; 4], rel_eps: f64) -> Option<QuadDegeneracy> {
    let p = pts.map(|p| (p.x as f64, p.y as f64));

    let mut diam2 = 0.0_f64;
    for a in 0..4 {
        for b in (a + 1)..4 {
            let d2 = (p[a].0 - p[b].0).powi(2) + (p[a].1 - p[b].1).powi(2);
            diam2 = diam2.max(d2);
        }
    }
    if diam2 <= f64::EPSILON {
        return Some(QuadDegeneracy::Coincident { a: 0, b: 1 });
    }

    for a in 0..4 {
        for b in (a + 1)..4 {
            let d2 = (p[a].0 - p[b].0).powi(2) + (p[a].1 - p[b].1).powi(2);
            if d2 <= rel_eps * diam2 {
                return Some(QuadDegeneracy::Coincident { a, b });
            }
        }
    }

    for (a, b, c) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
        let cross = (p[b].0 - p[a].0) * (p[c].1 - p[a].1) - (p[b].1 - p[a].1) * (p[c].0 - p[a].0);
        if cross.abs() <= rel_eps * diam2 {
            return Some(QuadDegeneracy::Collinear { a, b, c });
        }
    }

    None
}
