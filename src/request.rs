// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 将 TCP 流中陆续到达的原始字节增量地解析为 `ParsedRequest`。
//!
//! 解析器按换行符（`\n`）切分逻辑行，对每个完整的行做一次折叠，
//! 只累积四个布尔标志和请求路径，不构建通用的标头表：
//! 1. 含有 `GET` 的行视为请求行，提取路径和协议版本。
//! 2. 否则含有 `Host` 的行视为 Host 标头。
//! 3. 内容仅为 `\r` 的行是请求头结束标志，其后的字节不再解析。
//!
//! 注意这里使用的是子串匹配而不是按标记精确匹配，所以路径或标头值中
//! 恰好含有 `GET` / `Host` 的行同样会设置对应标志。

use bytes::BytesMut;

use crate::param::HTTP_1_PREFIX;

/// 一个连接上解析得到的请求摘要。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequest {
    /// 是否出现过含有 `GET` 的行
    method_is_get: bool,
    /// 请求目标，已去掉开头的一个 `/`
    path: String,
    /// 请求行的第三个字段是否以 `HTTP/1.` 开头
    http_version_ok: bool,
    /// 是否出现过含有 `Host` 的行
    host_header_present: bool,
    /// 是否出现过仅由 `\r` 构成的空行
    headers_terminated: bool,
}

impl ParsedRequest {
    /// 四个标志全部为真时请求才是合法的。
    pub fn is_well_formed(&self) -> bool {
        self.method_is_get
            && self.http_version_ok
            && self.host_header_present
            && self.headers_terminated
    }

    pub fn method_is_get(&self) -> bool {
        self.method_is_get
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn http_version_ok(&self) -> bool {
        self.http_version_ok
    }

    pub fn host_header_present(&self) -> bool {
        self.host_header_present
    }

    pub fn headers_terminated(&self) -> bool {
        self.headers_terminated
    }
}

/// 每次喂入数据后解析器的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseProgress {
    /// 还没有看到请求头结束标志，需要继续读取
    NeedMore,
    /// 已经看到空行，之后的数据不会再被解析
    HeadersComplete,
    /// 读取的字节数达到上限，应当停止读取并给出结论
    LimitReached,
}

/// 增量式请求解析器。
///
/// 未以换行符结束的尾部字节保存在内部缓冲区中，等待下一次 `feed`。
#[derive(Debug)]
pub struct RequestParser {
    line: BytesMut,
    request: ParsedRequest,
    consumed: usize,
    limit: usize,
}

impl RequestParser {
    pub fn new(limit: usize) -> Self {
        Self {
            line: BytesMut::with_capacity(256),
            request: ParsedRequest::default(),
            consumed: 0,
            limit,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> ParseProgress {
        if self.request.headers_terminated {
            return ParseProgress::HeadersComplete;
        }

        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.line.extend_from_slice(&rest[..pos]);
            apply_line(&mut self.request, &self.line);
            self.line.clear();
            self.consumed += pos + 1;
            rest = &rest[pos + 1..];

            if self.request.headers_terminated {
                return ParseProgress::HeadersComplete;
            }
        }
        self.line.extend_from_slice(rest);
        self.consumed += rest.len();

        if self.consumed >= self.limit {
            ParseProgress::LimitReached
        } else {
            ParseProgress::NeedMore
        }
    }

    /// 已经送入解析器的字节数（不含结束标志之后被忽略的部分）
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// 结束解析。没有以换行符结束的尾部被丢弃。
    pub fn finish(self) -> ParsedRequest {
        self.request
    }
}

/// 一次性解析一段完整的字节序列。
pub fn parse(bytes: &[u8]) -> ParsedRequest {
    let mut parser = RequestParser::new(usize::MAX);
    parser.feed(bytes);
    parser.finish()
}

fn apply_line(request: &mut ParsedRequest, line: &[u8]) {
    let line = String::from_utf8_lossy(line);

    if line.contains("GET") {
        request.method_is_get = true;

        let parts: Vec<&str> = line.split(' ').collect();
        request.path = match parts.get(1) {
            Some(target) => target.strip_prefix('/').unwrap_or(target).to_string(),
            None => String::new(),
        };
        // 字段不足三个的请求行视为版本缺失
        request.http_version_ok = parts
            .get(2)
            .map_or(false, |version| version.starts_with(HTTP_1_PREFIX));
    } else if line.contains("Host") {
        request.host_header_present = true;
    }

    if line == "\r" {
        request.headers_terminated = true;
    }
}
