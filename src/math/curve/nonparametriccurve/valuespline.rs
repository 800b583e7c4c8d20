use crate::math::curve::curve::{
    Curve,
    GaussianExpectation
};
use crate::math::curve::nonparametriccurve::nonparametriccurve::{
    NonparametricCurve,
    Point2D
};
use crate::math::curve::nonparametriccurve::quadraticsegment::QuadraticSegment;
use crate::math::curve::nonparametriccurve::splineerror::SplineError;
use crate::math::gaussian::{
    erfc,
    FRAC_1_SQRT_2,
    FRAC_1_SQRT_2PI
};

// ─────────────────────────────────────────────
// ValueSpline
// ─────────────────────────────────────────────
//
// 單一 stage 的 value function：
//
//   V(x) = 0                      x < root
//        = q_i(x)                 x ∈ [L_i, R_i)，各段首尾相接
//        = slope · x              x ≥ asymptote_start
//
// 不變量：segments 依序無縫覆蓋 [root, asymptote_start)，
// 第一段的左端即 root，最後一段的右端即 asymptote_start。

/// 區段寬度低於此相對值（約 64 ulp）即視為無法再細分
const MIN_RELATIVE_WIDTH: f64 = 64.0 * f64::EPSILON;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpline {
    segments: Vec<QuadraticSegment>,
    root: f64,
    asymptote_start: f64,
    asymptote_slope: f64,
}

impl ValueSpline {
    /// max(0, x)：沒有二次段，斜率 1 的漸近線從 0 開始
    pub fn hinge() -> ValueSpline {
        ValueSpline {
            segments: Vec::new(),
            root: 0.0,
            asymptote_start: 0.0,
            asymptote_slope: 1.0,
        }
    }

    /// 以單一種子段建立，漸近線從種子段右端開始
    pub fn seeded(seed: QuadraticSegment, asymptote_slope: f64) -> ValueSpline {
        ValueSpline {
            root: seed.lhs_x(),
            asymptote_start: seed.rhs_x(),
            asymptote_slope,
            segments: vec![seed],
        }
    }

    pub fn root(&self) -> f64 {
        self.root
    }

    pub fn asymptote_start(&self) -> f64 {
        self.asymptote_start
    }

    pub fn asymptote_slope(&self) -> f64 {
        self.asymptote_slope
    }

    pub fn segments(&self) -> &[QuadraticSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// 檢查 segments 是否首尾相接地覆蓋 [root, asymptote_start)
    pub fn is_contiguous(&self) -> bool {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => {
                first.lhs_x() == self.root
                    && last.rhs_x() == self.asymptote_start
                    && self
                        .segments
                        .windows(2)
                        .all(|pair| pair[0].rhs_x() == pair[1].lhs_x() && pair[0].lhs_x() < pair[0].rhs_x())
            }
            _ => self.root == self.asymptote_start,
        }
    }

    fn find_segment(&self, x: f64) -> usize {
        self.segments
            .partition_point(|s| s.lhs_x() <= x)
            .saturating_sub(1)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if x < self.root {
            0.0
        } else if !self.covers(x) || self.segments.is_empty() {
            self.asymptote_slope * x
        } else {
            self.segments[self.find_segment(x)].value(x)
        }
    }

    /// E[V(X)]，X ~ N(mean, variance)；每段與漸近線皆為封閉解
    pub fn integrate(&self, mean: f64, variance: f64) -> f64 {
        let sd = variance.sqrt();
        let offset = self.asymptote_start - mean;
        let mut sum = self.asymptote_slope * (
            FRAC_1_SQRT_2PI * sd * (-offset * offset / (2.0 * variance)).exp()
          + 0.5 * mean * erfc(offset * FRAC_1_SQRT_2 / sd)
        );
        for segment in &self.segments {
            sum += segment.gaussian_expectation(mean, variance);
        }
        sum
    }

    /// 自適應細分：對每個尚未驗證的段，比較四分點上的插值與 eval 的真值，
    /// 誤差超過 tolerance 就在中點切成兩段二次式：
    ///
    ///   (L, L 四分點, 中點) 與 (中點, R 四分點, R)
    ///
    /// 某一半的誤差已在 tolerance 內時，新段直接標記為 accurate。
    /// 回傳切分次數。
    pub fn refine<F>(&mut self, eval: F, tolerance: f64, max_segments: usize) -> Result<usize, SplineError>
    where
        F: Fn(f64) -> f64,
    {
        let mut splits = 0;
        let mut i = 0;
        while i < self.segments.len() {
            if self.segments[i].is_accurate() {
                i += 1;
                continue;
            }

            let segment = &self.segments[i];
            let lhs_x = segment.lhs_x();
            let rhs_x = segment.rhs_x();
            let middle_x = segment.middle_x();
            let lhs_quarter_x = 0.5 * (lhs_x + middle_x);
            let rhs_quarter_x = 0.5 * (rhs_x + middle_x);

            let lhs_quarter_y = eval(lhs_quarter_x);
            let rhs_quarter_y = eval(rhs_quarter_x);
            let lhs_error = (lhs_quarter_y - segment.value(lhs_quarter_x)).abs();
            let rhs_error = (rhs_quarter_y - segment.value(rhs_quarter_x)).abs();

            if lhs_error.max(rhs_error) <= tolerance {
                self.segments[i].set_accurate(true);
                i += 1;
                continue;
            }

            let min_width = MIN_RELATIVE_WIDTH * lhs_x.abs().max(rhs_x.abs());
            if rhs_x - lhs_x <= min_width
                || !(lhs_x < lhs_quarter_x
                    && lhs_quarter_x < middle_x
                    && middle_x < rhs_quarter_x
                    && rhs_quarter_x < rhs_x)
            {
                return Err(SplineError::ToleranceUnreachable { tolerance, lhs_x, rhs_x });
            }
            if self.segments.len() >= max_segments {
                return Err(SplineError::SegmentLimitExceeded { limit: max_segments });
            }

            let lhs_point = segment.lhs_point();
            let middle_point = segment.middle_point();
            let rhs_point = segment.rhs_point();

            let mut lhs_half = QuadraticSegment::through(
                lhs_point,
                Point2D::new(lhs_quarter_x, lhs_quarter_y),
                middle_point,
            )?;
            let mut rhs_half = QuadraticSegment::through(
                middle_point,
                Point2D::new(rhs_quarter_x, rhs_quarter_y),
                rhs_point,
            )?;
            lhs_half.set_accurate(lhs_error < tolerance);
            rhs_half.set_accurate(rhs_error < tolerance);

            self.segments[i] = lhs_half;
            self.segments.insert(i + 1, rhs_half);
            splits += 1;
        }
        debug_assert!(self.is_contiguous());
        Ok(splits)
    }
}

impl Default for ValueSpline {
    fn default() -> Self {
        ValueSpline::hinge()
    }
}

// ─────────────────────────────────────────────
// Trait 實作
// ─────────────────────────────────────────────

impl NonparametricCurve for ValueSpline {
    fn points(&self) -> Vec<Point2D> {
        let mut pts: Vec<Point2D> = self
            .segments
            .iter()
            .map(|s| s.lhs_point())
            .collect();
        pts.push(Point2D::on(self, self.asymptote_start));
        pts
    }

    fn min_x(&self) -> f64 {
        self.root
    }

    fn max_x(&self) -> f64 {
        self.asymptote_start
    }
}

impl Curve for ValueSpline {
    fn value(&self, x: f64) -> f64 {
        self.evaluate(x)
    }
}

impl GaussianExpectation for ValueSpline {
    fn gaussian_expectation(&self, mean: f64, variance: f64) -> f64 {
        self.integrate(mean, variance)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::math::gaussian::expected_positive_part;

    fn seed_through<F: Fn(f64) -> f64>(f: &F, lhs_x: f64, rhs_x: f64, slope: f64) -> ValueSpline {
        let middle_x = 0.5 * (lhs_x + rhs_x);
        let seed = QuadraticSegment::through(
            Point2D::new(lhs_x, f(lhs_x)),
            Point2D::new(middle_x, f(middle_x)),
            Point2D::new(rhs_x, f(rhs_x)),
        )
        .unwrap();
        ValueSpline::seeded(seed, slope)
    }

    #[test]
    fn hinge_evaluates_to_positive_part() {
        let hinge = ValueSpline::hinge();
        assert_eq!(hinge.evaluate(-3.0), 0.0);
        assert_eq!(hinge.evaluate(0.0), 0.0);
        assert_eq!(hinge.evaluate(2.5), 2.5);
        assert!(hinge.is_contiguous());
        assert_eq!(hinge.points(), vec![Point2D::new(0.0, 0.0)]);
    }

    #[test]
    fn hinge_integral_is_expected_positive_part() {
        let hinge = ValueSpline::hinge();
        for &(mean, variance) in &[(0.0, 1.0), (-0.3, 0.5), (1.2, 0.02), (-2.0, 3.0)] {
            let expected = expected_positive_part(mean, variance);
            assert!((hinge.integrate(mean, variance) - expected).abs() < 1e-14);
        }
    }

    #[test]
    fn exact_quadratic_needs_no_refinement() {
        let f = |x: f64| 0.25 * x * x + x + 0.5;
        let mut spline = seed_through(&f, -1.0, 3.0, 2.0);
        let splits = spline.refine(f, 1e-9, 1 << 10).unwrap();
        assert_eq!(splits, 0);
        assert_eq!(spline.segment_count(), 1);
        assert!(spline.segments()[0].is_accurate());
    }

    #[test]
    fn accurate_segments_are_not_reverified() {
        let f = |x: f64| x.exp();
        let mut spline = seed_through(&f, 0.0, 2.0, 1.0);
        spline.refine(f, 1e-6, 1 << 16).unwrap();
        assert!(spline.segments().iter().all(|s| s.is_accurate()));

        let calls = Cell::new(0usize);
        let counting = |x: f64| {
            calls.set(calls.get() + 1);
            x.exp()
        };
        let splits = spline.refine(counting, 1e-6, 1 << 16).unwrap();
        assert_eq!(splits, 0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn refinement_tracks_smooth_function() {
        let f = |x: f64| x.exp();
        let mut spline = seed_through(&f, 0.0, 2.0, 1.0);
        let splits = spline.refine(f, 1e-6, 1 << 16).unwrap();
        assert!(splits > 0);
        assert_eq!(spline.segment_count(), splits + 1);
        assert!(spline.is_contiguous());
        assert_eq!(spline.root(), 0.0);
        assert_eq!(spline.asymptote_start(), 2.0);

        for i in 0..=1000 {
            let x = 2.0 * i as f64 / 1000.0 * 0.999_999;
            assert!(
                (spline.evaluate(x) - f(x)).abs() < 1e-5,
                "x = {x}: {} vs {}",
                spline.evaluate(x),
                f(x)
            );
        }
    }

    #[test]
    fn evaluate_uses_asymptote_past_last_segment() {
        let f = |x: f64| x * x;
        let spline = seed_through(&f, 0.0, 1.0, 3.0);
        assert_eq!(spline.evaluate(1.0), 3.0);
        assert_eq!(spline.evaluate(10.0), 30.0);
        assert_eq!(spline.evaluate(-0.1), 0.0);
        assert!((spline.evaluate(0.5) - 0.25).abs() < 1e-12);
        assert!(spline.covers(0.0) && spline.covers(0.999));
        assert!(!spline.covers(1.0) && !spline.covers(-0.1));
    }

    #[test]
    fn segment_limit_is_reported() {
        let f = |x: f64| x.sin() * 10.0;
        let mut spline = seed_through(&f, 0.0, 20.0, 0.0);
        let result = spline.refine(f, 1e-12, 4);
        assert!(matches!(result, Err(SplineError::SegmentLimitExceeded { limit: 4 })));
    }

    #[test]
    fn unreachable_tolerance_is_reported() {
        // 不連續函數在跳躍點附近永遠無法以二次式逼近
        let f = |x: f64| if x < 0.3 { 0.0 } else { 1.0 };
        let mut spline = seed_through(&f, 0.0, 1.0, 0.0);
        let result = spline.refine(f, 1e-3, usize::MAX);
        assert!(matches!(result, Err(SplineError::ToleranceUnreachable { .. })));
    }

    #[test]
    fn integral_matches_segment_sum_plus_asymptote() {
        // 漸近線斜率取 f(1)，使 x = 1 處連續
        let f = |x: f64| (0.5 * x).exp();
        let mut spline = seed_through(&f, -1.0, 1.0, f(1.0));
        spline.refine(f, 1e-8, 1 << 16).unwrap();

        // 以 Simpson 法對 evaluate 做參考積分（漸近線段積到 mean + 12 sd）
        let (mean, variance) = (0.2_f64, 0.3_f64);
        let sd = variance.sqrt();
        let density = |x: f64| crate::math::gaussian::normal_pdf((x - mean) / sd) / sd;
        let (lower, upper) = (-1.0, mean + 12.0 * sd);
        let steps = 200_000;
        let h = (upper - lower) / steps as f64;
        let integrand = |x: f64| spline.evaluate(x) * density(x);
        let mut sum = integrand(lower) + integrand(upper);
        for i in 1..steps {
            let x = lower + i as f64 * h;
            sum += if i % 2 == 1 { 4.0 } else { 2.0 } * integrand(x);
        }
        let reference = sum * h / 3.0;

        assert!((spline.integrate(mean, variance) - reference).abs() < 1e-6);
    }
}
