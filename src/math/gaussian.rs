// ─────────────────────────────────────────────
// 常態分佈輔助函數
// ─────────────────────────────────────────────
//
// erf / erfc 交給 libm（與 C 標準庫同一套實作，精度到 ulp 等級），
// 其餘皆為封閉式公式。

/// 1 / √(2π)
pub const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// 1 / √2
pub const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

#[inline]
pub fn erf(x: f64) -> f64 {
    libm::erf(x)
}

#[inline]
pub fn erfc(x: f64) -> f64 {
    libm::erfc(x)
}

/// 標準常態密度 φ(z)
#[inline]
pub fn normal_pdf(z: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * z * z).exp()
}

/// 標準常態累積分佈 Φ(z)
#[inline]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * FRAC_1_SQRT_2)
}

/// E[max(0, X)]，X ~ N(mean, variance)
pub fn expected_positive_part(mean: f64, variance: f64) -> f64 {
    let sd = variance.sqrt();
    let z = mean / sd;
    mean * normal_cdf(z) + sd * normal_pdf(z)
}
