pub mod source;
pub mod transport;

pub use source::EventSourceClient;
pub use transport::{Direction, EventTransport, QueryKind, QueryRequest, QueryResult};
