use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::models::{Boundary, FeedEvent};

/// The four boundary-scoped query shapes the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// Events strictly within the requested boundary.
    Window,
    /// Single most recent event regardless of boundary.
    Latest,
    /// Single event immediately outside the boundary on the older side.
    AdjacentOlder,
    /// Single event immediately outside the boundary on the newer side.
    AdjacentNewer,
}

/// Side of the boundary an extension grows toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Older,
    Newer,
}

impl Direction {
    pub fn adjacent_kind(self) -> QueryKind {
        match self {
            Self::Older => QueryKind::AdjacentOlder,
            Self::Newer => QueryKind::AdjacentNewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub term: String,
    pub kind: QueryKind,
    pub boundary: Option<Boundary>,
}

/// What the feed answered. `Window` queries carry the server's authoritative
/// boundary for the result; single-event kinds return 0..1 events and no
/// boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub events: Vec<FeedEvent>,
    pub boundary: Option<Boundary>,
}

/// Abstract transport capability. The concrete wire protocol and
/// authentication live outside the engine; implementations only need to
/// answer the four query kinds.
pub trait EventTransport: Send + Sync {
    fn query(&self, request: QueryRequest) -> BoxFuture<'static, Result<QueryResult, FeedError>>;
}
