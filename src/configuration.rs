use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{
    Deserialize,
    Serialize
};
use thiserror::Error;

use crate::math::rootfinding::RootSolver;
use crate::table::gittinstable::TableFormat;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 每次 backup 共用的數值設定。
///
/// 遞迴中的每個迴圈都受某個 `max_*` 上限約束，達到上限即回報無法收斂的錯誤。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InductionConfig {
    /// refinement 誤差上限，同時是 root/divide 區間寬度與漸近線容許誤差
    pub tolerance: f64,
    /// 求根區間的下界；假設 index（即 -root）不超過 -index_floor
    pub index_floor: f64,
    pub max_bisections: usize,
    pub max_doublings: usize,
    pub max_segments: usize,
    pub root_solver: RootSolver,
}

impl Default for InductionConfig {
    fn default() -> Self {
        InductionConfig {
            tolerance: 1e-5,
            index_floor: -5.0,
            max_bisections: 200,
            max_doublings: 64,
            max_segments: 1 << 20,
            root_solver: RootSolver::Bisection,
        }
    }
}

impl InductionConfig {
    pub fn with_tolerance(tolerance: f64) -> InductionConfig {
        InductionConfig {
            tolerance,
            ..InductionConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigurationError::Invalid(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if !(self.index_floor.is_finite() && self.index_floor < 0.0) {
            return Err(ConfigurationError::Invalid(format!(
                "index_floor must be a negative finite number, got {}",
                self.index_floor
            )));
        }
        if self.max_bisections == 0 || self.max_doublings == 0 || self.max_segments == 0 {
            return Err(ConfigurationError::Invalid(
                "iteration caps must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 建表所需的全部設定：先由 JSON 載入，再以命令列參數覆寫。
///
/// ```json
/// {
///     "horizon": 1000,
///     "max_threads": 8,
///     "format": "headered",
///     "induction": { "tolerance": 1e-6, "root_solver": "brent" }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub horizon: usize,
    pub max_threads: usize,
    pub format: TableFormat,
    pub induction: InductionConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            horizon: 1,
            max_threads: 1,
            format: TableFormat::Bare,
            induction: InductionConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn from_reader<P: AsRef<Path>>(file_path: P) -> Result<BuildConfig, ConfigurationError> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let config: BuildConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.horizon == 0 {
            return Err(ConfigurationError::Invalid("horizon must be at least 1".to_owned()));
        }
        if self.max_threads == 0 {
            return Err(ConfigurationError::Invalid("max_threads must be at least 1".to_owned()));
        }
        self.induction.validate()
    }
}
