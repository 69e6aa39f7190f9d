use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::FeedError;
use crate::models::{Boundary, FeedEvent};

use super::transport::{Direction, EventTransport, QueryKind, QueryRequest, QueryResult};

type SharedFlight = Shared<BoxFuture<'static, Result<QueryResult, FeedError>>>;

/// Registry key for in-flight and recently-completed queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlightKey {
    term: String,
    kind: QueryKind,
    boundary_hash: u64,
}

impl FlightKey {
    fn for_request(request: &QueryRequest) -> Self {
        let mut hasher = DefaultHasher::new();
        request.boundary.hash(&mut hasher);
        Self {
            term: request.term.clone(),
            kind: request.kind,
            boundary_hash: hasher.finish(),
        }
    }
}

struct Inner {
    transport: Arc<dyn EventTransport>,
    retry_attempts: u32,
    retry_backoff: Duration,
    live_ttl: Duration,
    anchor_ttl: Duration,
    /// Completed results still inside their staleness window.
    fresh: Mutex<HashMap<FlightKey, (Instant, QueryResult)>>,
    /// Pending queries; a second request for the same key attaches here
    /// instead of issuing another transport call.
    in_flight: Mutex<HashMap<FlightKey, SharedFlight>>,
}

impl Inner {
    fn ttl_for(&self, kind: QueryKind) -> Duration {
        match kind {
            // Live queries go stale in seconds; an anchor probe, once
            // identified, refers to an immutable historical event.
            QueryKind::Window | QueryKind::Latest => self.live_ttl,
            QueryKind::AdjacentOlder | QueryKind::AdjacentNewer => self.anchor_ttl,
        }
    }
}

/// Core-facing client over the abstract transport: shapes the three request
/// kinds the coordinator needs, retries transient failures, serves repeat
/// queries from a staleness cache, and collapses concurrent identical
/// requests onto one in-flight call.
#[derive(Clone)]
pub struct EventSourceClient {
    inner: Arc<Inner>,
}

impl EventSourceClient {
    pub fn new(transport: Arc<dyn EventTransport>, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                retry_attempts: config.retry_attempts,
                retry_backoff: config.retry_backoff,
                live_ttl: config.live_ttl,
                anchor_ttl: config.anchor_ttl,
                fresh: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Events strictly within `boundary`, plus the server's authoritative
    /// boundary for the result.
    pub async fn fetch_window(
        &self,
        boundary: &Boundary,
        term: &str,
    ) -> Result<(Vec<FeedEvent>, Option<Boundary>), FeedError> {
        let result = self
            .query(QueryRequest {
                term: term.to_string(),
                kind: QueryKind::Window,
                boundary: Some(*boundary),
            })
            .await?;
        Ok((result.events, result.boundary))
    }

    /// Single most recent event for `term`, regardless of boundary.
    pub async fn fetch_latest(&self, term: &str) -> Result<Option<FeedEvent>, FeedError> {
        let result = self
            .query(QueryRequest {
                term: term.to_string(),
                kind: QueryKind::Latest,
                boundary: None,
            })
            .await?;
        Ok(result.events.into_iter().next())
    }

    /// The event immediately outside `boundary` on the given side, used to
    /// seed the next extension's anchor.
    pub async fn fetch_adjacent(
        &self,
        direction: Direction,
        boundary: &Boundary,
        term: &str,
    ) -> Result<Option<FeedEvent>, FeedError> {
        let result = self
            .query(QueryRequest {
                term: term.to_string(),
                kind: direction.adjacent_kind(),
                boundary: Some(*boundary),
            })
            .await?;
        Ok(result.events.into_iter().next())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResult, FeedError> {
        let key = FlightKey::for_request(&request);
        let ttl = self.inner.ttl_for(request.kind);

        if let Some(result) = self.lookup_fresh(&key, ttl) {
            tracing::debug!(
                "source: serving kind={:?} term={} from staleness cache",
                request.kind,
                request.term
            );
            return Ok(result);
        }

        self.join_or_launch(key, request).await
    }

    fn lookup_fresh(&self, key: &FlightKey, ttl: Duration) -> Option<QueryResult> {
        let fresh = self.inner.fresh.lock();
        let (stored_at, result) = fresh.get(key)?;
        (stored_at.elapsed() <= ttl).then(|| result.clone())
    }

    fn join_or_launch(&self, key: FlightKey, request: QueryRequest) -> SharedFlight {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(pending) = in_flight.get(&key) {
            tracing::debug!(
                "source: attaching to in-flight kind={:?} term={}",
                request.kind,
                request.term
            );
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let flight_key = key.clone();
        let flight = async move {
            let result = run_with_retry(&inner, request).await;
            if let Ok(ok) = &result {
                let mut fresh = inner.fresh.lock();
                fresh.retain(|k, entry| entry.0.elapsed() <= inner.ttl_for(k.kind));
                fresh.insert(flight_key.clone(), (Instant::now(), ok.clone()));
            }
            // Failures are never cached; dropping the in-flight entry lets
            // the caller retry immediately.
            inner.in_flight.lock().remove(&flight_key);
            result
        }
        .boxed()
        .shared();

        in_flight.insert(key, flight.clone());
        flight
    }
}

async fn run_with_retry(inner: &Inner, request: QueryRequest) -> Result<QueryResult, FeedError> {
    let mut attempt = 0u32;
    loop {
        match inner.transport.query(request.clone()).await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() && attempt < inner.retry_attempts => {
                attempt += 1;
                tracing::debug!(
                    "source: retrying kind={:?} term={} attempt={} err={}",
                    request.kind,
                    request.term,
                    attempt,
                    err
                );
                tokio::time::sleep(inner.retry_backoff * attempt).await;
            }
            Err(err) => {
                tracing::warn!(
                    "source: query failed kind={:?} term={} err={}",
                    request.kind,
                    request.term,
                    err
                );
                return Err(err);
            }
        }
    }
}
