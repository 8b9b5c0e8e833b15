// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件资源解析模块
//!
//! 把请求路径映射为本地文件，并收集响应头所需的元数据：大小、修改时间、MIME 类型。
//!
//! 路径直接拼接到 `www_root` 之后打开，不做规范化，也不阻止 `../` 之类的越级访问。
//! 除“打开成功且是普通文件”之外的所有情况（不存在、无权限、是目录……）
//! 一律视为未找到。

use std::{
    io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::fs::File as TokioFile;

use crate::param::MIME_TYPES;

/// 推测文件 MIME 类型的外部协作者。无法推测时返回 `None`，这不是错误。
#[cfg_attr(test, mockall::automock)]
pub trait ContentTypeProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Option<String>;
}

/// 根据文件后缀名查表推测 MIME 类型。
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionProbe;

impl ContentTypeProbe for ExtensionProbe {
    fn probe(&self, path: &Path) -> Option<String> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        MIME_TYPES.get(extension.as_str()).map(|mime| mime.to_string())
    }
}

/// 已找到的文件的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    size: u64,
    modified: DateTime<Utc>,
    content_type: String,
}

impl FileMeta {
    pub fn new(size: u64, modified: DateTime<Utc>, content_type: &str) -> Self {
        Self {
            size,
            modified,
            content_type: content_type.to_string(),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> &DateTime<Utc> {
        &self.modified
    }

    /// 可能为空字符串
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// 解析结果。找到文件时同时交出已经打开的文件句柄，由 worker 负责流式发送与关闭。
#[derive(Debug)]
pub enum FileOutcome {
    Found { file: TokioFile, meta: FileMeta },
    NotFound,
}

impl FileOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, FileOutcome::Found { .. })
    }

    pub fn meta(&self) -> Option<&FileMeta> {
        match self {
            FileOutcome::Found { meta, .. } => Some(meta),
            FileOutcome::NotFound => None,
        }
    }
}

pub struct FileResolver {
    root: PathBuf,
    probe: Box<dyn ContentTypeProbe>,
}

impl FileResolver {
    pub fn new(root: &str) -> Self {
        Self::with_probe(root, Box::new(ExtensionProbe))
    }

    pub fn with_probe(root: &str, probe: Box<dyn ContentTypeProbe>) -> Self {
        Self {
            root: PathBuf::from(root),
            probe,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn resolve(&self, path: &str, id: u128) -> FileOutcome {
        let full_path = self.root.join(path);
        debug!("[ID{}]映射物理路径：{}", id, full_path.display());

        match self.open(&full_path).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!("[ID{}]{}不是普通文件", id, full_path.display());
                FileOutcome::NotFound
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("[ID{}]文件{}不存在", id, full_path.display());
                FileOutcome::NotFound
            }
            Err(e) => {
                warn!("[ID{}]无法打开{}：{}，按未找到处理", id, full_path.display(), e);
                FileOutcome::NotFound
            }
        }
    }

    async fn open(&self, full_path: &Path) -> io::Result<Option<FileOutcome>> {
        let file = TokioFile::open(full_path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let content_type = self.probe.probe(full_path).unwrap_or_default();
        let meta = FileMeta {
            size: metadata.len(),
            modified: to_http_time(modified),
            content_type,
        };
        Ok(Some(FileOutcome::Found { file, meta }))
    }
}

impl Default for FileResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

/// 把文件系统时间截断到秒，`Last-Modified` 只有秒级精度。
pub fn to_http_time(time: SystemTime) -> DateTime<Utc> {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        dir
    }

    #[test]
    fn test_extension_probe() {
        let probe = ExtensionProbe;
        assert_eq!(probe.probe(Path::new("index.html")).as_deref(), Some("text/html"));
        assert_eq!(probe.probe(Path::new("a/b/photo.JPG")).as_deref(), Some("image/jpeg"));
        assert_eq!(probe.probe(Path::new("README")), None);
        assert_eq!(probe.probe(Path::new("data.unknown_extension")), None);
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let contents = "a".repeat(42);
        let dir = root_with(&[("index.html", contents.as_str())]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        let outcome = resolver.resolve("index.html", 0).await;
        let meta = outcome.meta().expect("file should be found");
        assert_eq!(meta.size(), 42);
        assert_eq!(meta.content_type(), "text/html");
        assert!(meta.modified().timestamp() > 0);
    }

    #[tokio::test]
    async fn test_resolve_nested_file() {
        let dir = root_with(&[("css/site.css", "body{}")]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        let outcome = resolver.resolve("css/site.css", 0).await;
        assert!(outcome.is_found());
        assert_eq!(outcome.meta().unwrap().content_type(), "text/css");
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let dir = root_with(&[]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        assert!(!resolver.resolve("missing.txt", 0).await.is_found());
    }

    #[tokio::test]
    async fn test_resolve_empty_path_is_not_found() {
        let dir = root_with(&[("index.html", "x")]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        assert!(!resolver.resolve("", 0).await.is_found());
    }

    #[tokio::test]
    async fn test_resolve_directory_is_not_found() {
        let dir = root_with(&[("sub/file.txt", "x")]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        assert!(!resolver.resolve("sub", 0).await.is_found());
    }

    #[tokio::test]
    async fn test_unknown_type_is_still_found() {
        let dir = root_with(&[("blob", "1234")]);
        let resolver = FileResolver::new(dir.path().to_str().unwrap());

        let outcome = resolver.resolve("blob", 0).await;
        assert!(outcome.is_found());
        assert_eq!(outcome.meta().unwrap().content_type(), "");
    }

    #[tokio::test]
    async fn test_resolver_uses_injected_probe() {
        let dir = root_with(&[("page.weird", "hello")]);
        let mut probe = MockContentTypeProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|_| Some("text/x-weird".to_string()));
        let resolver = FileResolver::with_probe(dir.path().to_str().unwrap(), Box::new(probe));

        let outcome = resolver.resolve("page.weird", 0).await;
        assert_eq!(outcome.meta().unwrap().content_type(), "text/x-weird");
    }

    #[tokio::test]
    async fn test_probe_not_called_for_missing_file() {
        let dir = root_with(&[]);
        let mut probe = MockContentTypeProbe::new();
        probe.expect_probe().times(0);
        let resolver = FileResolver::with_probe(dir.path().to_str().unwrap(), Box::new(probe));

        assert!(!resolver.resolve("nothing.html", 0).await.is_found());
    }

    #[test]
    fn test_to_http_time_truncates_subseconds() {
        let time = UNIX_EPOCH + std::time::Duration::from_millis(1_700_000_000_750);
        let converted = to_http_time(time);
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(converted.timestamp_subsec_nanos(), 0);
    }
}
