use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplineError {
    /// 三點擬合需要互異的 x 座標
    #[error("quadratic fit needs distinct abscissae, got {x1}, {x2}, {x3}")]
    NonDistinctAbscissae { x1: f64, x2: f64, x3: f64 },

    #[error("quadratic fit through x = {x1}, {x2}, {x3} is numerically singular")]
    SingularFit { x1: f64, x2: f64, x3: f64 },

    /// 區段已窄到浮點數無法再二分
    #[error("tolerance {tolerance} unreachable at this precision on [{lhs_x}, {rhs_x}]")]
    ToleranceUnreachable {
        tolerance: f64,
        lhs_x: f64,
        rhs_x: f64,
    },

    #[error("refinement exceeded {limit} segments without reaching the tolerance")]
    SegmentLimitExceeded { limit: usize },
}
