use nalgebra::{
    Matrix3,
    Vector3
};

use crate::math::curve::curve::{
    Curve,
    GaussianExpectation
};
use crate::math::curve::nonparametriccurve::nonparametriccurve::Point2D;
use crate::math::curve::nonparametriccurve::splineerror::SplineError;
use crate::math::gaussian::{
    erf,
    FRAC_1_SQRT_2,
    FRAC_1_SQRT_2PI
};

// ─────────────────────────────────────────────
// QuadraticSegment
// ─────────────────────────────────────────────
//
// 以全域座標存成 [a, b, c]，代表 a·x² + b·x + c，定義域 [lhs_x, rhs_x]。
// 選用二次式是因為它對高斯密度的積分有封閉解：
//
//   E[q(X)·1{L<X<R}] = s/√(2π)·[e_L·(b + a(L+u)) - e_R·(b + a(R+u))]
//                    + ½·(c + b·u + a(u² + v))·[erf((u-L)/√(2v)) - erf((u-R)/√(2v))]
//
// 其中 X ~ N(u, v)，s = √v，e_x = exp(-(x-u)²/(2v))。

#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticSegment {
    coefs: [f64; 3],
    lhs_x: f64,
    rhs_x: f64,
    /// 已被 refinement 驗證過精度；設定後不再重新檢查
    accurate: bool,
}

impl QuadraticSegment {
    pub fn new(a: f64, b: f64, c: f64, lhs_x: f64, rhs_x: f64) -> QuadraticSegment {
        QuadraticSegment {
            coefs: [a, b, c],
            lhs_x,
            rhs_x,
            accurate: false,
        }
    }

    /// 通過三點的二次式，定義域為 [p1.x, p3.x]
    ///
    /// 以 t = x - x1 的平移座標建立 Vandermonde 系統（窄區段時條件數較佳），
    /// LU 分解求出 α·t² + β·t + γ 後再展開回全域係數：
    ///   a = α，b = β - 2α·x1，c = γ - x1·(β - α·x1)
    pub fn through(p1: Point2D, p2: Point2D, p3: Point2D) -> Result<QuadraticSegment, SplineError> {
        let (x1, x2, x3) = (p1.x(), p2.x(), p3.x());
        if x1 == x2 || x2 == x3 || x1 == x3 {
            return Err(SplineError::NonDistinctAbscissae { x1, x2, x3 });
        }

        let (t2, t3) = (x2 - x1, x3 - x1);
        let vandermonde = Matrix3::new(
            0.0,     0.0, 1.0,
            t2 * t2, t2,  1.0,
            t3 * t3, t3,  1.0,
        );
        let rhs = Vector3::new(p1.y(), p2.y(), p3.y());
        let local = vandermonde
            .lu()
            .solve(&rhs)
            .ok_or(SplineError::SingularFit { x1, x2, x3 })?;

        let (alpha, beta, gamma) = (local[0], local[1], local[2]);
        let coefs = [
            alpha,
            beta - 2.0 * alpha * x1,
            gamma - x1 * (beta - alpha * x1),
        ];
        if coefs.iter().any(|c| !c.is_finite()) {
            return Err(SplineError::SingularFit { x1, x2, x3 });
        }

        Ok(QuadraticSegment::new(coefs[0], coefs[1], coefs[2], x1, x3))
    }

    pub fn a(&self) -> f64 {
        self.coefs[0]
    }

    pub fn b(&self) -> f64 {
        self.coefs[1]
    }

    pub fn c(&self) -> f64 {
        self.coefs[2]
    }

    pub fn lhs_x(&self) -> f64 {
        self.lhs_x
    }

    pub fn rhs_x(&self) -> f64 {
        self.rhs_x
    }

    pub fn middle_x(&self) -> f64 {
        0.5 * (self.lhs_x + self.rhs_x)
    }

    pub fn is_accurate(&self) -> bool {
        self.accurate
    }

    pub fn set_accurate(&mut self, accurate: bool) {
        self.accurate = accurate;
    }

    pub fn lhs_point(&self) -> Point2D {
        Point2D::on(self, self.lhs_x)
    }

    pub fn middle_point(&self) -> Point2D {
        Point2D::on(self, self.middle_x())
    }

    pub fn rhs_point(&self) -> Point2D {
        Point2D::on(self, self.rhs_x)
    }
}

impl Curve for QuadraticSegment {
    #[inline]
    fn value(&self, x: f64) -> f64 {
        let mut result = self.coefs[0];
        for &beta in &self.coefs[1..] {
            result = f64::mul_add(result, x, beta);
        }
        result
    }
}

impl GaussianExpectation for QuadraticSegment {
    fn gaussian_expectation(&self, mean: f64, variance: f64) -> f64 {
        let [a, b, c] = self.coefs;
        let (l, r, u) = (self.lhs_x, self.rhs_x, mean);
        let half_inv_var = 0.5 / variance;
        let sd = variance.sqrt();

        let density_term = FRAC_1_SQRT_2PI * sd * (
            (-(l - u) * (l - u) * half_inv_var).exp() * (b + a * (l + u))
          - (-(r - u) * (r - u) * half_inv_var).exp() * (b + a * (r + u))
        );
        let mass_term = 0.5 * (c + b * u + a * (u * u + variance));
        let inv_sqrt_2v = FRAC_1_SQRT_2 / sd;

        density_term + mass_term * (erf((u - l) * inv_sqrt_2v) - erf((u - r) * inv_sqrt_2v))
    }
}
