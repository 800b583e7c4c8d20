use std::fmt::Display;

use thiserror::Error;

use crate::configuration::ConfigurationError;
use crate::math::curve::nonparametriccurve::splineerror::SplineError;
use crate::math::rootfinding::RootError;
use crate::table::tableerror::TableError;

/// 定位出錯的 backup：單臂以 (m, T)，雙臂以 (depth, T1, T2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gittins { time_remaining: usize, pulls: usize },
    Bayes { depth: usize, pulls_arm1: usize, pulls_arm2: usize },
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Gittins { time_remaining, pulls } => {
                write!(f, "gittins stage (m = {time_remaining}, T = {pulls})")
            }
            Stage::Bayes { depth, pulls_arm1, pulls_arm2 } => {
                write!(f, "bayes node (m = {depth}, T1 = {pulls_arm1}, T2 = {pulls_arm2})")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum InductionError {
    /// f(floor) > 0：根落在 index_floor 以下，代表參數組合不合法
    #[error("{stage}: no index root above the floor {floor} (f(floor) = {residual})")]
    IndexBelowFloor { stage: Stage, floor: f64, residual: f64 },

    #[error("{stage}: tolerance unreachable at this precision, no asymptote edge found after {doublings} doublings (last x = {x})")]
    AsymptoteNotFound { stage: Stage, doublings: usize, x: f64 },

    #[error("{stage}: {source}")]
    Refinement {
        stage: Stage,
        #[source]
        source: SplineError,
    },

    #[error("{stage}: {source}")]
    RootSearch {
        stage: Stage,
        #[source]
        source: RootError,
    },

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl InductionError {
    pub(crate) fn refinement(stage: Stage) -> impl FnOnce(SplineError) -> InductionError {
        move |source| InductionError::Refinement { stage, source }
    }

    pub(crate) fn root_search(stage: Stage) -> impl FnOnce(RootError) -> InductionError {
        move |source| InductionError::RootSearch { stage, source }
    }

    /// 是否屬於「在此精度下無法達到 tolerance」這一類錯誤
    pub fn is_tolerance_unreachable(&self) -> bool {
        matches!(
            self,
            InductionError::AsymptoteNotFound { .. }
                | InductionError::Refinement {
                    source: SplineError::ToleranceUnreachable { .. } | SplineError::SegmentLimitExceeded { .. },
                    ..
                }
                | InductionError::RootSearch {
                    source: RootError::ToleranceUnreachable { .. } | RootError::IterationLimit { .. },
                    ..
                }
        )
    }
}
