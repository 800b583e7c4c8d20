use rayon::prelude::*;
use rayon::{
    ThreadPool,
    ThreadPoolBuildError,
    ThreadPoolBuilder
};
use tracing::{
    debug,
    info
};

/// 交給 [`Pool`] 的工作；可借用呼叫端的資料，因為 [`Pool::run`] 會等到全部完成才返回
pub type Job<'a, T> = Box<dyn FnOnce() -> T + Send + 'a>;

/// 固定大小的 worker pool。
///
/// 每個 job 回傳自己的結果，由呼叫端在 [`Pool::run`] 返回後合併，
/// 因此 job 之間不共享任何可變的輸出。
pub struct Pool {
    thread_pool: ThreadPool,
    max_threads: usize,
}

impl Pool {
    pub fn new(max_threads: usize) -> Result<Pool, ThreadPoolBuildError> {
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(max_threads)
            .thread_name(|i| format!("gittins-worker-{i:02}"))
            .build()?;
        Ok(Pool { thread_pool, max_threads })
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// 執行所有 job，阻塞到全部完成；結果依提交順序排列
    pub fn run<'a, T: Send>(&self, jobs: Vec<Job<'a, T>>) -> Vec<T> {
        info!(jobs = jobs.len(), threads = self.max_threads, "running pool");
        self.thread_pool.install(|| {
            jobs.into_par_iter()
                .enumerate()
                .map(|(i, job)| {
                    debug!(job = i, "starting job");
                    job()
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering
    };

    use super::*;

    #[test]
    fn results_keep_submission_order() {
        let pool = Pool::new(4).unwrap();
        let jobs: Vec<Job<'_, usize>> = (0..64usize)
            .map(|i| Box::new(move || i * i) as Job<'_, usize>)
            .collect();
        let results = pool.run(jobs);
        assert_eq!(results, (0..64usize).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn run_blocks_until_every_job_is_done() {
        let pool = Pool::new(3).unwrap();
        let finished = AtomicUsize::new(0);
        let jobs: Vec<Job<'_, ()>> = (0..20)
            .map(|_| {
                let finished = &finished;
                Box::new(move || {
                    finished.fetch_add(1, Ordering::SeqCst);
                }) as Job<'_, ()>
            })
            .collect();
        pool.run(jobs);
        assert_eq!(finished.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn empty_batch() {
        let pool = Pool::new(1).unwrap();
        assert_eq!(pool.max_threads(), 1);
        assert!(pool.run(Vec::<Job<'_, u8>>::new()).is_empty());
    }
}
