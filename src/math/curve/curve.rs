

pub trait Curve {
    fn value(&self, x: f64) -> f64;
}

/// 對 N(mean, variance) 取期望值：E[f(X)]，X ~ N(mean, variance)
pub trait GaussianExpectation {
    fn gaussian_expectation(&self, mean: f64, variance: f64) -> f64;
}
