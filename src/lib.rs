pub mod config;
pub mod connection;
pub mod exception;
pub mod param;
pub mod pool;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;

pub use config::Config;
pub use connection::ConnectionContext;
pub use exception::Exception;
pub use pool::{DrainReport, WorkerPool};
pub use request::{ParsedRequest, RequestParser};
pub use resolver::{ContentTypeProbe, ExtensionProbe, FileMeta, FileOutcome, FileResolver};
pub use response::{ResponseHead, Status};
pub use server::{Server, ServerState, ShutdownHandle};
