// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义了服务器在连接生命周期中用到的常量：
//! - 响应头中的固定字段（服务器名称、换行符、日期格式）。
//! - 读取请求头与流式发送文件时使用的缓冲区大小。
//! - 文件后缀名到 MIME 类型的映射表。

use std::collections::HashMap;
use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "Missed-Connections";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 响应状态行中使用的协议版本
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// 合法请求行中版本字段必须具有的前缀
pub const HTTP_1_PREFIX: &str = "HTTP/1.";

/// `Date` 与 `Last-Modified` 共用的日期格式（IMF-fixdate，始终以 GMT 表示）
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// 读取请求头时每次从 Socket 读取的字节数
pub const HEADER_BUFFER_SIZE: usize = 1024;

/// 发送文件正文时默认的分块大小（32KB）
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

lazy_static! {
    /// 文件后缀名到 MIME 类型（Media Type）的映射表。
    ///
    /// 用于推测响应头中 `Content-Type` 字段的取值。表中不存在的后缀不视为错误，
    /// 此时 `Content-Type` 留空。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("aac", "audio/aac");
        map.insert("avi", "video/x-msvideo");
        map.insert("avif", "image/avif");
        map.insert("bin", "application/octet-stream");
        map.insert("bmp", "image/bmp");
        map.insert("bz2", "application/x-bzip2");
        map.insert("css", "text/css");
        map.insert("csv", "text/csv");
        map.insert("doc", "application/msword");
        map.insert("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document");
        map.insert("epub", "application/epub+zip");
        map.insert("gif", "image/gif");
        map.insert("gz", "application/gzip");
        map.insert("htm", "text/html");
        map.insert("html", "text/html");
        map.insert("ico", "image/vnd.microsoft.icon");
        map.insert("ics", "text/calendar");
        map.insert("jar", "application/java-archive");
        map.insert("jpeg", "image/jpeg");
        map.insert("jpg", "image/jpeg");
        map.insert("js", "text/javascript");
        map.insert("json", "application/json");
        map.insert("md", "text/markdown");
        map.insert("mjs", "text/javascript");
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("mpeg", "video/mpeg");
        map.insert("oga", "audio/ogg");
        map.insert("ogv", "video/ogg");
        map.insert("otf", "font/otf");
        map.insert("pdf", "application/pdf");
        map.insert("png", "image/png");
        map.insert("ppt", "application/vnd.ms-powerpoint");
        map.insert("rar", "application/vnd.rar");
        map.insert("rtf", "application/rtf");
        map.insert("sh", "application/x-sh");
        map.insert("svg", "image/svg+xml");
        map.insert("tar", "application/x-tar");
        map.insert("tif", "image/tiff");
        map.insert("tiff", "image/tiff");
        map.insert("ttf", "font/ttf");
        map.insert("txt", "text/plain");
        map.insert("wav", "audio/wav");
        map.insert("weba", "audio/webm");
        map.insert("webm", "video/webm");
        map.insert("webp", "image/webp");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("xhtml", "application/xhtml+xml");
        map.insert("xls", "application/vnd.ms-excel");
        map.insert("xml", "application/xml");
        map.insert("zip", "application/zip");
        map.insert("7z", "application/x-7z-compressed");
        map
    };
}
