// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 非持久连接静态文件服务器
//!
//! 每个连接只处理一个 GET 请求：读取请求头、查找文件、返回 200/400/404，
//! 然后关闭连接。核心功能包括：
//! - 基于 Tokio 多线程运行时的 worker 池，单个连接的阻塞不影响其他连接
//! - 带超时的 accept 循环，配合共享停机标志实现协作式停机
//! - 限时排空 worker 池，超时后强制取消
//! - 后台管理控制台（CLI 指令交互）

use np_webserver::{Config, Server, ShutdownHandle};

use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
};

use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "config/development.toml";
const LOG_CONFIG_PATH: &str = "config/log4rs.yaml";

/// # 程序入口点
///
/// 初始化日志、加载配置、构建运行时并启动主循环。
fn main() -> ExitCode {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG_PATH, Default::default()) {
        eprintln!("无法载入日志配置{}：{}，将不输出日志", LOG_CONFIG_PATH, e);
    }

    // 2. 环境配置加载：命令行第一个参数可以指定配置文件
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::from_toml(&config_path);
    info!("配置文件{}已载入", config_path);
    info!("www root: {}", config.www_root());

    // 3. 异步运行时：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> ExitCode {
    // 4. 绑定端口。失败时服务器不可用，直接退出
    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let handle = server.shutdown_handle();
    let accept_loop = tokio::spawn(server.run());

    // 5. 等待停机指令：控制台输入 stop 或 Ctrl-C
    tokio::select! {
        _ = console(handle.clone()) => info!("控制台发出停机指令"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("接收到Ctrl-C，开始停机"),
            Err(e) => error!("无法监听Ctrl-C信号：{}，开始停机", e),
        },
    }

    let report = handle.shutdown().await;
    if report.cancelled > 0 {
        warn!("有{}个连接在停机时被强制取消", report.cancelled);
    }
    if let Err(e) = accept_loop.await {
        error!("主循环异常退出：{}", e);
    }
    info!("服务器已停止");
    ExitCode::SUCCESS
}

/// # 管理控制台
///
/// 读取标准输入中的指令。输入 `stop` 时返回；标准输入关闭时不再读取，但也不会触发停机。
async fn console(handle: ShutdownHandle) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将在排空连接后关闭...");
                return;
            }
            "help" => {
                println!("== Webserver Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "status" => {
                println!("== Webserver 状态 ===");
                println!("当前活跃连接数: {}", handle.active_workers());
                println!("正在停机: {}", handle.is_shutting_down());
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
    std::future::pending::<()>().await
}
