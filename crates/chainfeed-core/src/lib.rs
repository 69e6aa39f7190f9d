pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;

// Re-export the engine surface at the crate root for convenience
pub use client::{Direction, EventSourceClient, EventTransport, QueryKind, QueryRequest, QueryResult};
pub use config::EngineConfig;
pub use error::FeedError;
pub use models::{Boundary, FeedEvent, MergeOptions};
pub use session::{Operation, SessionState, StreamSession};
pub use store::WindowCache;
