use tracing::{
    debug,
    trace
};

use crate::configuration::InductionConfig;
use crate::induction::inductionerror::{
    InductionError,
    Stage
};
use crate::math::curve::nonparametriccurve::nonparametriccurve::Point2D;
use crate::math::curve::nonparametriccurve::quadraticsegment::QuadraticSegment;
use crate::math::curve::nonparametriccurve::valuespline::ValueSpline;
use crate::math::rootfinding::{
    find_root,
    RootError
};

// ─────────────────────────────────────────────
// 單臂 Gittins backward induction
// ─────────────────────────────────────────────
//
// 一條 chain 由 (horizon n, 起始 pulls T) 決定，從 hinge 出發逐 stage 往回推：
//
//   V_t(x) = max(0, x + E[V_{t-1}(x + Z)])，Z ~ N(0, 1/(Tn·(Tn+1)))，Tn = T + n - t
//
// V_t 的根 r 即 stage t 的 index 的相反數：index(t, Tn) = -r。

/// stage t 時的後驗 pull 數
pub fn posterior_pulls(horizon: usize, pulls: usize, t: usize) -> usize {
    pulls + horizon - t
}

/// 觀測 pulls 次後後驗均值的變異數 1 / (p(p+1))
pub fn posterior_variance(pulls: usize) -> f64 {
    let p = pulls as u64;
    1.0 / (p * (p + 1)) as f64
}

/// 從 start 起反覆加倍，直到 done(x) 成立
pub(crate) fn double_until<P>(
    start: f64,
    max_doublings: usize,
    stage: Stage,
    done: P,
) -> Result<f64, InductionError>
where
    P: Fn(f64) -> bool,
{
    let mut x = start;
    let mut doublings = 0;
    while !done(x) {
        if doublings == max_doublings {
            return Err(InductionError::AsymptoteNotFound { stage, doublings, x });
        }
        x *= 2.0;
        doublings += 1;
    }
    Ok(x)
}

/// 一次 Bellman backup：由 prev 求出 stage t 的 value spline
pub fn backup(
    prev: &ValueSpline,
    t: usize,
    variance: f64,
    config: &InductionConfig,
    stage: Stage,
) -> Result<ValueSpline, InductionError> {
    let tolerance = config.tolerance;
    let floor = config.index_floor;
    let f = |x: f64| x + prev.integrate(x, variance);

    if prev.root() <= floor {
        return Err(InductionError::IndexBelowFloor { stage, floor, residual: f(floor) });
    }
    let root = find_root(&f, floor, prev.root(), tolerance, config.root_solver, config.max_bisections)
        .map_err(|error| match error {
            RootError::NoSignChange { f_lower, .. } => {
                InductionError::IndexBelowFloor { stage, floor, residual: f_lower }
            }
            other => InductionError::root_search(stage)(other),
        })?;

    let slope = t as f64;
    let right = double_until(1.0, config.max_doublings, stage, |x| (x * slope - f(x)).abs() <= tolerance)?;

    let middle = 0.5 * (root + right);
    let seed = QuadraticSegment::through(
        Point2D::new(root, f(root)),
        Point2D::new(middle, f(middle)),
        Point2D::new(right, right * slope),
    )
    .map_err(InductionError::refinement(stage))?;

    let mut next = ValueSpline::seeded(seed, slope);
    let splits = next
        .refine(&f, tolerance, config.max_segments)
        .map_err(InductionError::refinement(stage))?;
    trace!(%stage, root, right, splits, segments = next.segment_count(), "backup done");
    Ok(next)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GittinsStage {
    pub time_remaining: usize,
    pub pulls: usize,
    pub index: f64,
    pub segments: usize,
}

/// 一條 chain 的結果：每個 stage 的 index，以及最後一個 stage 的 spline
#[derive(Debug, Clone)]
pub struct GittinsChain {
    stages: Vec<GittinsStage>,
    spline: ValueSpline,
}

impl GittinsChain {
    /// 依 time_remaining 遞增排列，第一個為 m = 1
    pub fn stages(&self) -> &[GittinsStage] {
        &self.stages
    }

    pub fn terminal(&self) -> &GittinsStage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn spline(&self) -> &ValueSpline {
        &self.spline
    }

    pub fn into_stages(self) -> Vec<GittinsStage> {
        self.stages
    }
}

/// 計算 (horizon, pulls) 這條 chain 上所有 stage 的 index。
///
/// m = 1 時 index 即後驗均值 0；之後每個 stage 只保留前一個 spline。
pub fn run_chain(horizon: usize, pulls: usize, config: &InductionConfig) -> Result<GittinsChain, InductionError> {
    if horizon == 0 || pulls == 0 {
        return Err(InductionError::InvalidParameter(format!(
            "chain needs horizon >= 1 and pulls >= 1, got ({horizon}, {pulls})"
        )));
    }

    let mut stages = Vec::with_capacity(horizon);
    stages.push(GittinsStage {
        time_remaining: 1,
        pulls: posterior_pulls(horizon, pulls, 1),
        index: 0.0,
        segments: 0,
    });

    let mut spline = ValueSpline::hinge();
    for t in 2..=horizon {
        let tn = posterior_pulls(horizon, pulls, t);
        let stage = Stage::Gittins { time_remaining: t, pulls: tn };
        spline = backup(&spline, t, posterior_variance(tn), config, stage)?;
        stages.push(GittinsStage {
            time_remaining: t,
            pulls: tn,
            index: -spline.root(),
            segments: spline.segment_count(),
        });
    }
    debug!(horizon, pulls, index = stages[stages.len() - 1].index, "chain done");

    Ok(GittinsChain { stages, spline })
}
