// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Worker 池
//!
//! 每个被接受的连接都作为一个独立的 Tokio 任务运行。池本身只负责：
//! - `submit`：提交任务。配置了上限时，达到上限的提交会等待空位（对 acceptor 形成背压）。
//! - `close`：停止接受新任务，正在等待空位的提交立即失败。
//! - `drain`：在限定时间内等待所有任务结束，超时后强制取消剩余任务。

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
};

use crate::exception::Exception;

/// 停机时 worker 的收尾情况
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// 在期限内正常结束的任务数
    pub completed: usize,
    /// 超过期限被强制取消的任务数
    pub cancelled: usize,
}

pub struct WorkerPool {
    tasks: Mutex<JoinSet<()>>,
    permits: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
    closed: AtomicBool,
}

/// 任务结束（包括被取消）时把活跃计数减一
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// `limit` 为 `None` 时不限制并发数。
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            permits: limit.map(|n| Arc::new(Semaphore::new(n))),
            active: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn submit<F>(&self, job: F) -> Result<(), Exception>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(Exception::PoolClosed);
        }

        let permit = match &self.permits {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| Exception::PoolClosed)?,
            ),
            None => None,
        };

        let mut tasks = self.tasks.lock().await;
        if self.is_closed() {
            return Err(Exception::PoolClosed);
        }
        // 顺便回收已经结束的任务
        while tasks.try_join_next().is_some() {}

        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        tasks.spawn(async move {
            let _guard = guard;
            let _permit = permit;
            job.await;
        });
        Ok(())
    }

    /// 停止接受新任务。可以重复调用。
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("worker池已关闭，不再接受新连接");
        }
        if let Some(semaphore) = &self.permits {
            semaphore.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 当前仍在运行的 worker 数
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 关闭池并在 `deadline` 内等待所有任务结束，超时则取消剩余任务。
    pub async fn drain(&self, deadline: Duration) -> DrainReport {
        self.close();
        let mut tasks = self.tasks.lock().await;
        let mut completed = 0;

        let waited = tokio::time::timeout(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!("一个worker异常退出: {}", e);
                    }
                }
                completed += 1;
            }
        })
        .await;

        let mut cancelled = 0;
        if waited.is_err() {
            cancelled = tasks.len();
            warn!(
                "{}ms内仍有{}个worker未结束，强制取消",
                deadline.as_millis(),
                cancelled
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let report = DrainReport {
            completed,
            cancelled,
        };
        info!("worker池排空完成: {:?}", report);
        report
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(None)
    }
}
