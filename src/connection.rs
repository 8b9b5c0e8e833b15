// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理模块
//!
//! 每个被接受的连接只处理一个请求，处理流程严格按顺序进行：
//! 读取请求头 → 查找文件 → 发送响应头 → 流式发送正文（仅 200）→ 关闭连接。
//!
//! 任何一步出现 I/O 错误都会中止该连接的处理并记录日志，不会重试，也不会影响其他连接。
//! 打开的文件与连接本身无论成功与否都会在结束时释放。

use std::{sync::Arc, time::Instant};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::{
    io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    config::Config,
    param::HEADER_BUFFER_SIZE,
    request::{ParseProgress, ParsedRequest, RequestParser},
    resolver::{FileOutcome, FileResolver},
    response::{ResponseHead, Status},
};

/// 所有 worker 共享的只读上下文
pub struct ConnectionContext {
    resolver: FileResolver,
    chunk_size: usize,
    max_header_bytes: usize,
}

impl ConnectionContext {
    pub fn new(resolver: FileResolver, chunk_size: usize, max_header_bytes: usize) -> Self {
        Self {
            resolver,
            chunk_size,
            max_header_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            FileResolver::new(config.www_root()),
            config.chunk_size(),
            config.max_header_bytes(),
        )
    }

    pub fn resolver(&self) -> &FileResolver {
        &self.resolver
    }
}

/// 一次请求处理完成后的摘要，用于日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub path: String,
    pub status: Status,
    pub body_bytes: u64,
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期。返回时连接的两个方向都已关闭。
pub async fn handle_connection(mut stream: TcpStream, id: u128, context: Arc<ConnectionContext>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let start_time = Instant::now();

    match serve(&mut stream, id, &context).await {
        Ok(exchange) => info!(
            "[ID{}] {}, /{}, {}, {}, {} bytes, {}ms",
            id,
            peer,
            exchange.path,
            exchange.status.code(),
            exchange.status.reason(),
            exchange.body_bytes,
            start_time.elapsed().as_millis()
        ),
        Err(e) => error!("[ID{}]连接处理中断: {}", id, e),
    }

    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭连接时遇到错误: {}", id, e);
    }
    debug!("[ID{}]连接已关闭", id);
}

/// 在任意双向字节流上完成一次请求/响应交换。
pub async fn serve<S>(stream: &mut S, id: u128, context: &ConnectionContext) -> io::Result<Exchange>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = read_request(stream, id, context.max_header_bytes).await?;
    debug!("[ID{}]HTTP请求接收完毕: {:?}", id, request);

    let outcome = if request.is_well_formed() {
        context.resolver.resolve(request.path(), id).await
    } else {
        warn!("[ID{}]请求格式不正确，返回400", id);
        FileOutcome::NotFound
    };

    let head = ResponseHead::build(&request, outcome.meta(), Utc::now());
    stream.write_all(&head.as_bytes()).await?;
    stream.flush().await?;
    debug!("[ID{}]响应头发送完毕: {}", id, head.status_code());

    let mut body_bytes = 0;
    if let FileOutcome::Found { mut file, meta } = outcome {
        body_bytes = stream_body(&mut file, stream, context.chunk_size).await?;
        if body_bytes != meta.size() {
            warn!(
                "[ID{}]文件在发送过程中发生变化：Content-Length为{}，实际发送{}字节",
                id,
                meta.size(),
                body_bytes
            );
        }
    }

    Ok(Exchange {
        path: request.path().to_string(),
        status: head.status(),
        body_bytes,
    })
}

/// 读取请求头，直到对端关闭写方向、出现请求头结束标志或达到字节上限。
async fn read_request<S>(stream: &mut S, id: u128, limit: usize) -> io::Result<ParsedRequest>
where
    S: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new(limit);
    let mut buffer = [0u8; HEADER_BUFFER_SIZE];

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            debug!("[ID{}]对端已关闭写方向", id);
            break;
        }
        match parser.feed(&buffer[..n]) {
            ParseProgress::NeedMore => {}
            ParseProgress::HeadersComplete => break,
            ParseProgress::LimitReached => {
                warn!("[ID{}]请求头超过{}字节，停止读取", id, limit);
                break;
            }
        }
    }
    Ok(parser.finish())
}

/// 以固定大小的分块把文件写入连接，每块之后都 flush。返回写出的字节数。
async fn stream_body<R, W>(file: &mut R, stream: &mut W, chunk_size: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; chunk_size];
    let mut total_sent = 0u64;
    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).await?;
        stream.flush().await?;
        total_sent += n as u64;
    }
    Ok(total_sent)
}
