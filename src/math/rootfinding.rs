use argmin::core::{
    CostFunction,
    Error,
    Executor,
    State
};
use argmin::solver::brent::BrentRoot;
use serde::{
    Deserialize,
    Serialize
};
use thiserror::Error;

// ─────────────────────────────────────────────
// 括號區間求根
// ─────────────────────────────────────────────
//
// 所有呼叫端的目標函數在區間內單調遞增，且保證 f(lower) <= 0：
//   - Gittins root：f(x) = x + E[V(x + noise)]
//   - Bayes divide：h(x) = x + E[V2] - E[V1]
// Bisection 與原始建表結果逐位元一致；Brent 僅作為替代選項。

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootSolver {
    #[default]
    Bisection,
    Brent,
}

#[derive(Debug, Error)]
pub enum RootError {
    #[error("no sign change on [{lower}, {upper}]: f(lower) = {f_lower} > 0")]
    NoSignChange {
        lower: f64,
        upper: f64,
        f_lower: f64,
    },

    #[error("tolerance {tolerance} unreachable at this precision near x = {x}")]
    ToleranceUnreachable { tolerance: f64, x: f64 },

    #[error("root search did not converge within {iterations} iterations")]
    IterationLimit { iterations: usize },

    #[error("root solver failed: {0}")]
    Solver(String),
}

/// 在 [lower, upper] 上尋找遞增函數 f 的零點，區間寬度收斂到 tolerance 以內。
///
/// 若 f(upper) <= 0，結果收斂到 upper 附近（與 bisection 的行為相同）。
pub fn find_root<F>(
    f: F,
    lower: f64,
    upper: f64,
    tolerance: f64,
    solver: RootSolver,
    max_iterations: usize,
) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
{
    let f_lower = f(lower);
    if f_lower > 0.0 {
        return Err(RootError::NoSignChange { lower, upper, f_lower });
    }

    match solver {
        RootSolver::Bisection => bisect(&f, lower, upper, tolerance, max_iterations),
        RootSolver::Brent => {
            if f_lower == 0.0 {
                return Ok(lower);
            }
            if f(upper) <= 0.0 {
                return Ok(upper);
            }
            brent(&f, lower, upper, tolerance, max_iterations)
        }
    }
}

fn bisect<F>(
    f: &F,
    mut lower: f64,
    mut upper: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
{
    let mut iterations = 0;
    while upper - lower > tolerance {
        if iterations == max_iterations {
            return Err(RootError::IterationLimit { iterations });
        }
        let middle = 0.5 * (lower + upper);
        if middle <= lower || middle >= upper {
            return Err(RootError::ToleranceUnreachable { tolerance, x: middle });
        }
        if f(middle) <= 0.0 {
            lower = middle;
        } else {
            upper = middle;
        }
        iterations += 1;
    }
    Ok(0.5 * (lower + upper))
}

struct BracketedCost<'a, F> {
    f: &'a F,
}

impl<F> CostFunction for BracketedCost<'_, F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok((self.f)(*x))
    }
}

fn brent<F>(
    f: &F,
    lower: f64,
    upper: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
{
    let solver = BrentRoot::new(lower, upper, tolerance);
    let result = Executor::new(BracketedCost { f }, solver)
        .configure(|state| state.max_iters(max_iterations as u64))
        .run()
        .map_err(|error| RootError::Solver(error.to_string()))?;

    let state = result.state();
    if state.get_iter() >= max_iterations as u64 {
        return Err(RootError::IterationLimit { iterations: max_iterations });
    }
    state
        .get_best_param()
        .or_else(|| state.get_param())
        .copied()
        .ok_or_else(|| RootError::Solver("BrentRoot returned no parameter".to_owned()))
}
