use tracing::{
    debug,
    trace
};

use crate::configuration::InductionConfig;
use crate::induction::gittins::{
    double_until,
    posterior_variance
};
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
use crate::scheduler::pool::{
    Job,
    Pool
};

// ─────────────────────────────────────────────
// 雙臂 Bayes backward induction
// ─────────────────────────────────────────────
//
// 深度 m 的節點 (T1, T2) 以兩臂後驗均值差 x 為狀態：
//
//   V(x) = max(E[V1(x + Z1)], x + E[V2(x + Z2)])
//
// V1 = 節點 (m-1, T1+1, T2)（拉第一臂），V2 = 節點 (m-1, T1, T2+1)（拉第二臂），
// Z1 ~ N(0, 1/(T1(T1+1)))，Z2 ~ N(0, 1/(T2(T2+1)))。
// divide 為兩個選項相等的 x。
//
// 深度 m 的 T1 取 1..=N-m+1，T2 = N-m+2-T1，N 為總深度。

#[derive(Debug, Clone, PartialEq)]
pub struct BayesNode {
    spline: ValueSpline,
    divide: f64,
}

impl BayesNode {
    /// 深度 1：hinge，divide 為 0
    pub fn base() -> BayesNode {
        BayesNode {
            spline: ValueSpline::hinge(),
            divide: 0.0,
        }
    }

    pub fn spline(&self) -> &ValueSpline {
        &self.spline
    }

    pub fn divide(&self) -> f64 {
        self.divide
    }
}

/// 由兩個子節點的 spline 求出深度 `depth`、節點 (t1, t2) 的 spline 與 divide
pub fn backup(
    arm1_child: &ValueSpline,
    arm2_child: &ValueSpline,
    depth: usize,
    t1: usize,
    t2: usize,
    config: &InductionConfig,
) -> Result<BayesNode, InductionError> {
    let stage = Stage::Bayes { depth, pulls_arm1: t1, pulls_arm2: t2 };
    let tolerance = config.tolerance;
    let v1 = posterior_variance(t1);
    let v2 = posterior_variance(t2);

    let stay = |x: f64| arm1_child.integrate(x, v1);
    let switch = |x: f64| x + arm2_child.integrate(x, v2);
    let g = |x: f64| stay(x).max(switch(x));

    let slope = depth as f64;
    let left = double_until(-1.0, config.max_doublings, stage, |x| g(x) < tolerance)?;
    let right = double_until(1.0, config.max_doublings, stage, |x| g(x) < x * slope + tolerance)?;

    let middle = 0.5 * (left + right);
    let seed = QuadraticSegment::through(
        Point2D::new(left, 0.0),
        Point2D::new(middle, g(middle)),
        Point2D::new(right, right * slope),
    )
    .map_err(InductionError::refinement(stage))?;

    let mut spline = ValueSpline::seeded(seed, slope);
    let splits = spline
        .refine(&g, tolerance, config.max_segments)
        .map_err(InductionError::refinement(stage))?;

    // switch - stay 遞增；整段都偏好換臂時 divide 收斂到左端
    let advantage = |x: f64| switch(x) - stay(x);
    let divide = match find_root(advantage, left, right, tolerance, config.root_solver, config.max_bisections) {
        Ok(divide) => divide,
        Err(RootError::NoSignChange { lower, .. }) => lower,
        Err(other) => return Err(InductionError::root_search(stage)(other)),
    };
    trace!(%stage, left, right, splits, divide, "bayes backup done");

    Ok(BayesNode { spline, divide })
}

/// 同一深度的所有節點，nodes[T1 - 1] 對應 (T1, N - m + 2 - T1)
#[derive(Debug, Clone)]
pub struct BayesLevel {
    depth: usize,
    total_depth: usize,
    nodes: Vec<BayesNode>,
}

impl BayesLevel {
    pub fn base(total_depth: usize) -> BayesLevel {
        BayesLevel {
            depth: 1,
            total_depth,
            nodes: vec![BayesNode::base(); total_depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn nodes(&self) -> &[BayesNode] {
        &self.nodes
    }

    pub fn pulls_arm2(&self, t1: usize) -> usize {
        self.total_depth - self.depth + 2 - t1
    }

    /// (T1, T2, divide)，依 T1 遞增
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i + 1, self.pulls_arm2(i + 1), node.divide))
    }

    /// 以本層為子節點算出下一層；每個 T1 一個 job，全部完成後才返回
    pub fn advance(&self, pool: &Pool, config: &InductionConfig) -> Result<BayesLevel, InductionError> {
        let depth = self.depth + 1;
        if depth > self.total_depth {
            return Err(InductionError::InvalidParameter(format!(
                "depth {depth} is past the total depth {}",
                self.total_depth
            )));
        }
        let width = self.total_depth - depth + 1;
        debug!(depth, nodes = width, "advancing bayes level");

        let jobs: Vec<Job<'_, Result<BayesNode, InductionError>>> = (1..=width)
            .map(|t1| {
                let t2 = self.total_depth - depth + 2 - t1;
                let arm1_child = &self.nodes[t1].spline;
                let arm2_child = &self.nodes[t1 - 1].spline;
                Box::new(move || backup(arm1_child, arm2_child, depth, t1, t2, config))
                    as Job<'_, Result<BayesNode, InductionError>>
            })
            .collect();

        let nodes = pool.run(jobs).into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(BayesLevel {
            depth,
            total_depth: self.total_depth,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_level_layout() {
        let level = BayesLevel::base(4);
        assert_eq!(level.depth(), 1);
        let cells: Vec<(usize, usize, f64)> = level.cells().collect();
        assert_eq!(cells, vec![(1, 4, 0.0), (2, 3, 0.0), (3, 2, 0.0), (4, 1, 0.0)]);
    }

    #[test]
    fn advancing_shrinks_the_level() {
        let pool = Pool::new(2).unwrap();
        let config = InductionConfig::with_tolerance(1e-4);
        let level = BayesLevel::base(4).advance(&pool, &config).unwrap();
        assert_eq!(level.depth(), 2);
        let keys: Vec<(usize, usize)> = level.cells().map(|(t1, t2, _)| (t1, t2)).collect();
        assert_eq!(keys, vec![(1, 3), (2, 2), (3, 1)]);
        assert!(level.nodes().iter().all(|n| n.spline().is_contiguous()));

        let last = level.advance(&pool, &config).unwrap().advance(&pool, &config).unwrap();
        assert_eq!(last.depth(), 4);
        assert_eq!(last.cells().map(|(t1, t2, _)| (t1, t2)).collect::<Vec<_>>(), vec![(1, 1)]);
        assert!(last.advance(&pool, &config).is_err());
    }

    #[test]
    fn identical_children_divide_at_zero() {
        // 子節點相同時 switch - stay = x
        let hinge = ValueSpline::hinge();
        let node = backup(&hinge, &hinge, 2, 2, 2, &InductionConfig::with_tolerance(1e-8)).unwrap();
        assert!(node.divide().abs() < 1e-6, "divide = {}", node.divide());
    }

    #[test]
    fn base_spline_is_the_hinge() {
        let node = BayesNode::base();
        assert_eq!(node.divide(), 0.0);
        assert_eq!(node.spline(), &ValueSpline::hinge());
    }
}
