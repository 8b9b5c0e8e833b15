// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建模块
//!
//! 按照固定的优先级把解析结果和文件查找结果映射为响应头：
//!
//! | 条件 | 状态 |
//! |---|---|
//! | 请求不合法 | 400 Bad Request |
//! | 请求合法，文件不存在 | 404 Not Found |
//! | 请求合法，文件存在 | 200 OK，附带 `Last-Modified` / `Content-Length` / `Content-Type` |
//!
//! 所有响应都带有 `Date`、`Server` 和 `Connection: close`。正文（仅 200）由 worker 流式发送，
//! 不在这里构建。

use chrono::prelude::*;

use crate::{
    param::{CRLF, DATE_FORMAT, HTTP_VERSION, SERVER_NAME},
    request::ParsedRequest,
    resolver::FileMeta,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
        }
    }
}

/// 响应头的完整描述。只有 200 响应携带 `entity`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    status: Status,
    date: DateTime<Utc>,
    server_name: &'static str,
    entity: Option<FileMeta>,
}

impl ResponseHead {
    /// 根据请求是否合法与文件查找结果选择响应。`now` 用作 `Date` 字段。
    pub fn build(request: &ParsedRequest, file: Option<&FileMeta>, now: DateTime<Utc>) -> Self {
        let (status, entity) = match (request.is_well_formed(), file) {
            (false, _) => (Status::BadRequest, None),
            (true, None) => (Status::NotFound, None),
            (true, Some(meta)) => (Status::Ok, Some(meta.clone())),
        };
        Self {
            status,
            date: now,
            server_name: SERVER_NAME,
            entity,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.code()
    }

    pub fn information(&self) -> &str {
        self.status.reason()
    }

    /// 响应头之后应当发送的正文字节数
    pub fn content_length(&self) -> u64 {
        self.entity.as_ref().map_or(0, |meta| meta.size())
    }

    pub fn has_body(&self) -> bool {
        self.entity.is_some()
    }

    /// 序列化为线上格式：各字段以 CRLF 连接，最后以一个空行结束。
    pub fn as_bytes(&self) -> Vec<u8> {
        let status_code = self.status.code().to_string();
        let date = format_date(&self.date);

        let mut header = [
            HTTP_VERSION,
            " ",
            status_code.as_str(),
            " ",
            self.status.reason(),
            CRLF,
            "Date: ",
            date.as_str(),
            CRLF,
            "Server: ",
            self.server_name,
            CRLF,
        ]
        .concat();

        if let Some(meta) = &self.entity {
            header.push_str(
                &[
                    "Last-Modified: ",
                    format_date(meta.modified()).as_str(),
                    CRLF,
                    "Content-Length: ",
                    meta.size().to_string().as_str(),
                    CRLF,
                    "Content-Type: ",
                    meta.content_type(),
                    CRLF,
                ]
                .concat(),
            );
        }

        header.push_str("Connection: close");
        header.push_str(CRLF);
        header.push_str(CRLF);
        header.into_bytes()
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}
