// Library root. The binary entry point is src/main.rs.

pub mod analytics;
pub mod config;
pub mod documents;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod logger;
pub mod service;
pub mod store;
pub mod time;
pub mod wiki;

pub use error::{AppError, ErrorKind};
pub use service::DocGraph;
