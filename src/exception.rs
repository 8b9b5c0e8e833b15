// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义服务器在构造与运行过程中可能返回给调用方的错误。
//!
//! 注意：请求格式错误与文件不存在都不是错误，它们是正常的协议结果，
//! 分别以 400 与 404 响应体现，不会出现在这里。单个连接内部的 I/O 错误
//! 只在该连接的 worker 中记录日志，也不会向上传播。

use std::{fmt, io};

/// 服务器生命周期中可能出现的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 无法绑定或监听配置的端口。服务器处于不可用状态，调用方不应再启动主循环。
    BindFailed(io::ErrorKind),
    /// worker 池已关闭（正在停机），不再接受新的连接。
    PoolClosed,
    /// 配置文件无法打开或读取。
    ConfigUnreadable,
    /// 配置文件内容不是合法的 TOML，或字段类型不匹配。
    ConfigInvalid,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindFailed(kind) => write!(f, "Server not initialized properly: {}", kind),
            PoolClosed => write!(f, "Worker pool is closed"),
            ConfigUnreadable => write!(f, "Config file can't be read"),
            ConfigInvalid => write!(f, "Config file is not valid TOML"),
        }
    }
}

impl std::error::Error for Exception {}
