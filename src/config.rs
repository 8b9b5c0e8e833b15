use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::exception::Exception;
use crate::param::{DEFAULT_CHUNK_SIZE, HEADER_BUFFER_SIZE};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default)]
    max_connections: usize,
    #[serde(default = "default_accept_timeout_ms")]
    accept_timeout_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    drain_timeout_ms: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_max_header_bytes")]
    max_header_bytes: usize,
}

fn default_www_root() -> String {
    ".".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_accept_timeout_ms() -> u64 {
    2000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_header_bytes() -> usize {
    65536 // 64KB
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            port: default_port(),
            local: default_local(),
            worker_threads: 0,
            max_connections: 0,
            accept_timeout_ms: default_accept_timeout_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            chunk_size: default_chunk_size(),
            max_header_bytes: default_max_header_bytes(),
        }
    }

    /// 从 TOML 文件载入配置。文件缺失或内容非法时记录错误并退回默认配置。
    pub fn from_toml(filename: &str) -> Self {
        match Self::read_toml(filename) {
            Ok(config) => config,
            Err(e) => {
                error!("无法从配置文件{}构建配置对象（{}），使用默认配置", filename, e);
                Self::new().normalized()
            }
        }
    }

    pub fn read_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename).map_err(|_| Exception::ConfigUnreadable)?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|_| Exception::ConfigUnreadable)?;
        Self::parse(&str_val)
    }

    pub fn parse(text: &str) -> Result<Self, Exception> {
        let raw_config: Config = toml::from_str(text).map_err(|_| Exception::ConfigInvalid)?;
        Ok(raw_config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.chunk_size <= HEADER_BUFFER_SIZE {
            warn!(
                "chunk_size({})不大于请求头缓冲区({})，该值将被改为{}。",
                self.chunk_size, HEADER_BUFFER_SIZE, DEFAULT_CHUNK_SIZE
            );
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if self.max_header_bytes < HEADER_BUFFER_SIZE {
            warn!(
                "max_header_bytes({})过小，该值将被改为{}。",
                self.max_header_bytes, HEADER_BUFFER_SIZE
            );
            self.max_header_bytes = HEADER_BUFFER_SIZE;
        }
        if self.port != 0 && self.port < 1024 {
            warn!("端口{}是特权端口，建议使用1024以上的端口", self.port);
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().normalized()
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        let address = match self.local {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        SocketAddrV4::new(address, self.port)
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// 并发 worker 上限，`None` 表示不设上限。
    pub fn max_connections(&self) -> Option<usize> {
        match self.max_connections {
            0 => None,
            n => Some(n),
        }
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }
}

impl Config {
    pub fn with_www_root(mut self, root: &str) -> Self {
        self.www_root = root.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
