// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 监听与停机模块
//!
//! - [`Server`]：持有监听 Socket，循环接受连接并交给 worker 池处理。
//!   每次 accept 都有超时，超时后重新检查停机标志，因此即使没有新连接，
//!   主循环也会定期观察到停机请求。
//! - [`ServerState`]：进程内共享的停机标志，只会从 `false` 变为 `true` 一次。
//! - [`ShutdownHandle`]：设置停机标志、等待监听 Socket 关闭，
//!   再在限定时间内排空 worker 池，超时的 worker 被强制取消。

use std::{net::SocketAddr, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{net::TcpListener, sync::watch};

use crate::{
    config::Config,
    connection::{handle_connection, ConnectionContext},
    exception::Exception,
    pool::{DrainReport, WorkerPool},
};

/// 共享的停机标志。克隆得到的句柄观察同一个标志。
#[derive(Clone)]
pub struct ServerState {
    shutting_down: Arc<watch::Sender<bool>>,
}

impl ServerState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutting_down: Arc::new(tx),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutting_down.borrow()
    }

    /// 设置停机标志。只有第一次调用返回 `true`。
    pub fn begin_shutdown(&self) -> bool {
        self.shutting_down.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                true
            }
        })
    }

    /// 等待停机标志被设置；已经设置时立即返回。
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutting_down.subscribe();
        let _ = rx.wait_for(|flag| *flag).await;
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: ServerState,
    pool: Arc<WorkerPool>,
    context: Arc<ConnectionContext>,
    accept_timeout: Duration,
    drain_timeout: Duration,
    listener_closed: watch::Sender<bool>,
}

impl Server {
    /// 绑定配置中的端口。失败时服务器不可用，调用方必须检查结果后再调用 [`Server::run`]。
    pub async fn bind(config: &Config) -> Result<Self, Exception> {
        Self::bind_with(config, ConnectionContext::from_config(config)).await
    }

    pub async fn bind_with(config: &Config, context: ConnectionContext) -> Result<Self, Exception> {
        let address = config.socket_addr();
        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", config.port(), e);
                return Err(Exception::BindFailed(e.kind()));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| Exception::BindFailed(e.kind()))?;
        info!("服务端将在{}上监听Socket连接", local_addr);

        let (listener_closed, _) = watch::channel(false);
        Ok(Self {
            listener,
            local_addr,
            state: ServerState::new(),
            pool: Arc::new(WorkerPool::new(config.max_connections())),
            context: Arc::new(context),
            accept_timeout: config.accept_timeout(),
            drain_timeout: config.drain_timeout(),
            listener_closed,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: self.state.clone(),
            pool: Arc::clone(&self.pool),
            listener_closed: self.listener_closed.subscribe(),
            accept_timeout: self.accept_timeout,
            drain_timeout: self.drain_timeout,
        }
    }

    /// # 主循环
    ///
    /// 持续接受新连接并提交到 worker 池，直到观察到停机标志。
    /// 超时和单次 accept 失败都被忽略。退出前关闭监听 Socket。
    pub async fn run(self) {
        let Server {
            listener,
            state,
            pool,
            context,
            accept_timeout,
            listener_closed,
            ..
        } = self;

        let mut id: u128 = 0;
        while !state.is_shutting_down() {
            let accepted = tokio::select! {
                result = tokio::time::timeout(accept_timeout, listener.accept()) => result,
                _ = state.wait_for_shutdown() => break,
            };

            let (stream, addr) = match accepted {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => {
                    debug!("接受连接失败: {}", e);
                    continue;
                }
                Err(_) => continue,
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let job = handle_connection(stream, id, Arc::clone(&context));
            if let Err(e) = pool.submit(job).await {
                warn!("[ID{}]{}，连接被丢弃", id, e);
            }
            id += 1;
        }

        drop(listener);
        listener_closed.send_replace(true);
        info!("主循环接收到停机指令，监听Socket已关闭");
    }
}

/// 停机协调器。可以克隆后交给信号处理或管理控制台。
#[derive(Clone)]
pub struct ShutdownHandle {
    state: ServerState,
    pool: Arc<WorkerPool>,
    listener_closed: watch::Receiver<bool>,
    accept_timeout: Duration,
    drain_timeout: Duration,
}

impl ShutdownHandle {
    pub fn active_workers(&self) -> usize {
        self.pool.active()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.is_shutting_down()
    }

    /// # 停机
    ///
    /// 1. 设置停机标志，主循环立即退出并关闭监听 Socket。
    /// 2. 关闭 worker 池，不再接受新任务。
    /// 3. 在 `drain_timeout` 内等待正在运行的 worker，之后强制取消剩余的 worker。
    ///
    /// 强制取消只记录日志，不视为停机失败。
    pub async fn shutdown(&self) -> DrainReport {
        if !self.state.begin_shutdown() {
            debug!("停机标志已经设置过");
        }
        self.pool.close();

        let mut closed = self.listener_closed.clone();
        match tokio::time::timeout(self.accept_timeout, closed.wait_for(|closed| *closed)).await {
            Ok(Ok(_)) => debug!("监听Socket已关闭"),
            // Server 已被丢弃，监听 Socket 随之关闭
            Ok(Err(_)) => debug!("Server已被释放"),
            Err(_) => warn!("等待监听Socket关闭超时，主循环可能尚未启动"),
        }

        self.pool.drain(self.drain_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    fn test_config(root: &str) -> Config {
        Config::default()
            .with_www_root(root)
            .with_port(0)
            .with_accept_timeout(Duration::from_millis(200))
            .with_drain_timeout(Duration::from_millis(300))
    }

    #[test]
    fn test_state_flips_once() {
        let state = ServerState::new();
        let observer = state.clone();

        assert!(!observer.is_shutting_down());
        assert!(state.begin_shutdown());
        assert!(observer.is_shutting_down());
        assert!(!state.begin_shutdown());
        assert!(observer.is_shutting_down());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_returns_when_already_set() {
        let state = ServerState::new();
        state.begin_shutdown();
        tokio::time::timeout(Duration::from_millis(100), state.wait_for_shutdown())
            .await
            .expect("should return immediately");
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = Server::bind(&test_config(".")).await.unwrap();
        let taken = first.local_addr().port();

        let result = Server::bind(&test_config(".").with_port(taken)).await;
        assert!(matches!(result, Err(Exception::BindFailed(_))));
    }

    #[tokio::test]
    async fn test_run_serves_and_shuts_down() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

        let server = Server::bind(&test_config(dir.path().to_str().unwrap()))
            .await
            .unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /hello.txt HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with(b"\r\n\r\nhi"));

        let report = handle.shutdown().await;
        assert_eq!(report.cancelled, 0);
        running.await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_is_bounded_with_stuck_worker() {
        let server = Server::bind(&test_config(".")).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        // 只发送一半请求且不关闭写方向，worker 会一直等待数据
        let mut stuck = TcpStream::connect(addr).await.unwrap();
        stuck.write_all(b"GET /x HTTP/1.1\r\n").await.unwrap();
        while handle.active_workers() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let started = Instant::now();
        let report = handle.shutdown().await;

        assert!(started.elapsed() < Duration::from_millis(300 + 500));
        assert_eq!(report.cancelled, 1);
        assert_eq!(handle.active_workers(), 0);
        running.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_twice_is_harmless() {
        let server = Server::bind(&test_config(".")).await.unwrap();
        let handle = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        handle.shutdown().await;
        let second = handle.shutdown().await;
        assert_eq!(second, DrainReport::default());
        running.await.unwrap();
    }
}
