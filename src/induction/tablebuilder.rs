use tracing::info;

use crate::configuration::{
    BuildConfig,
    InductionConfig
};
use crate::induction::bayes::BayesLevel;
use crate::induction::gittins::{
    run_chain,
    GittinsChain
};
use crate::induction::inductionerror::InductionError;
use crate::scheduler::pool::{
    Job,
    Pool
};
use crate::table::bayestable::{
    BayesKey,
    BayesRecord,
    BayesTable
};
use crate::table::gittinstable::{
    triangular_number,
    GittinsTable
};

/// 前兩次 pull（每臂各一次）不進入遞迴
pub const BAYES_INITIAL_PULLS: usize = 2;

pub fn build_gittins_table(config: &BuildConfig) -> Result<GittinsTable, InductionError> {
    config.validate()?;
    let pool = Pool::new(config.max_threads)?;
    build_gittins_table_with(&pool, config.horizon, &config.induction)
}

/// 每條 chain k = n..1（T = 1）覆蓋 m + T = k + 1 的斜對角線，彼此獨立；
/// 全部完成後才寫入表格
pub fn build_gittins_table_with(
    pool: &Pool,
    horizon: usize,
    config: &InductionConfig,
) -> Result<GittinsTable, InductionError> {
    if horizon == 0 {
        return Err(InductionError::InvalidParameter("horizon must be at least 1".to_owned()));
    }
    info!(horizon, threads = pool.max_threads(), tolerance = config.tolerance, "building gittins table");

    let jobs: Vec<Job<'_, Result<GittinsChain, InductionError>>> = (1..=horizon)
        .rev()
        .map(|k| Box::new(move || run_chain(k, 1, config)) as Job<'_, Result<GittinsChain, InductionError>>)
        .collect();

    let mut table = GittinsTable::new(horizon);
    for chain in pool.run(jobs) {
        for stage in chain?.into_stages() {
            table.set_idx(stage.time_remaining, stage.pulls, stage.index);
        }
    }
    info!(cells = table.cell_count(), bytes = table.memory_bytes(), "gittins table built");
    Ok(table)
}

/// 雙臂表的遞迴深度：horizon 扣掉前兩次 pull
pub fn bayes_depth(horizon: usize) -> Result<usize, InductionError> {
    if horizon <= BAYES_INITIAL_PULLS {
        return Err(InductionError::InvalidParameter(format!(
            "bayes horizon must be at least {}, got {horizon}",
            BAYES_INITIAL_PULLS + 1
        )));
    }
    let depth = horizon - BAYES_INITIAL_PULLS;
    if depth + 1 > i32::MAX as usize {
        return Err(InductionError::InvalidParameter(format!(
            "bayes horizon {horizon} does not fit the 32-bit record keys"
        )));
    }
    Ok(depth)
}

pub fn build_bayes_table(config: &BuildConfig) -> Result<BayesTable, InductionError> {
    config.validate()?;
    let depth = bayes_depth(config.horizon)?;
    let pool = Pool::new(config.max_threads)?;
    let records = build_bayes_records(&pool, depth, &config.induction)?;
    Ok(BayesTable::from_records(records)?)
}

/// 依深度逐層推進，每層之間以 [`Pool::run`] 為屏障；推進後即釋放上一層。
/// 紀錄依 m 遞增、同層依 T1 遞增排列。
pub fn build_bayes_records(
    pool: &Pool,
    total_depth: usize,
    config: &InductionConfig,
) -> Result<Vec<BayesRecord>, InductionError> {
    if total_depth == 0 {
        return Err(InductionError::InvalidParameter("bayes depth must be at least 1".to_owned()));
    }
    info!(depth = total_depth, threads = pool.max_threads(), tolerance = config.tolerance, "building bayes table");

    let mut records = Vec::with_capacity(triangular_number(total_depth));
    let mut level = BayesLevel::base(total_depth);
    push_level(&mut records, &level);
    while level.depth() < total_depth {
        level = level.advance(pool, config)?;
        info!(depth = level.depth(), "depth done");
        push_level(&mut records, &level);
    }
    info!(records = records.len(), "bayes table built");
    Ok(records)
}

fn push_level(records: &mut Vec<BayesRecord>, level: &BayesLevel) {
    let m = level.depth() as u32;
    records.extend(level.cells().map(|(t1, t2, divide)| BayesRecord {
        key: BayesKey::new(m, t1 as u32, t2 as u32),
        divide,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gittins_table_fills_every_diagonal() {
        let pool = Pool::new(2).unwrap();
        let config = InductionConfig::with_tolerance(1e-5);
        let table = build_gittins_table_with(&pool, 8, &config).unwrap();
        assert_eq!(table.horizon(), 8);

        // m = 1 為 0，其餘為正
        for t in 1..=8 {
            assert_eq!(table.get_idx(1, t), 0.0);
        }
        for m in 2..=8 {
            for t in 1..=(9 - m) {
                assert!(table.get_idx(m, t) > 0.0, "cell ({m}, {t})");
            }
        }

        // 每個 cell 與單獨跑的那條 chain 完全一致
        let chain = run_chain(6, 1, &config).unwrap();
        for stage in chain.stages() {
            assert_eq!(table.get_idx(stage.time_remaining, stage.pulls), stage.index);
        }
    }

    #[test]
    fn bayes_depth_consumes_two_initial_pulls() {
        assert_eq!(bayes_depth(3).unwrap(), 1);
        assert_eq!(bayes_depth(10).unwrap(), 8);
        assert!(bayes_depth(2).is_err());
        assert!(bayes_depth(0).is_err());
    }

    #[test]
    fn bayes_records_are_ordered_by_depth_then_arm1() {
        let pool = Pool::new(2).unwrap();
        let records = build_bayes_records(&pool, 4, &InductionConfig::with_tolerance(1e-4)).unwrap();
        assert_eq!(records.len(), 10);
        let keys: Vec<BayesKey> = records.iter().map(|r| r.key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys[0], BayesKey::new(1, 1, 4));
        assert_eq!(keys[9], BayesKey::new(4, 1, 1));
        assert!(records[..4].iter().all(|r| r.divide == 0.0));
        for r in &records {
            assert_eq!(r.key.time_remaining + r.key.pulls_arm1 + r.key.pulls_arm2, 6);
        }
    }

    #[test]
    fn invalid_build_config_is_rejected_before_work() {
        let mut config = BuildConfig::default();
        config.max_threads = 0;
        assert!(matches!(build_gittins_table(&config), Err(InductionError::Configuration(_))));

        let config = BuildConfig { horizon: 2, ..BuildConfig::default() };
        assert!(matches!(build_bayes_table(&config), Err(InductionError::InvalidParameter(_))));
    }
}
