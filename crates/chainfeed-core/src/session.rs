use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{Direction, EventSourceClient, EventTransport};
use crate::config::EngineConfig;
use crate::error::FeedError;
use crate::models::{Boundary, FeedEvent, MergeOptions};
use crate::store::WindowCache;

/// Coordinator state as seen by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    LoadingInitial,
    Ready,
    ExtendingOlder,
    ExtendingNewer,
}

/// The three fetch operations whose failures are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InitialLoad,
    ExtendOlder,
    ExtendNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    LoadingInitial,
    Ready,
}

struct SessionCore {
    term: Option<String>,
    /// Bumped on every query-term change. Completions tagged with an older
    /// generation are discarded without mutating anything.
    generation: u64,
    phase: Phase,
    extending: Option<Direction>,
    boundary: Boundary,
    cache: WindowCache,
    older_anchor: Option<FeedEvent>,
    newer_anchor: Option<FeedEvent>,
    /// Set once an older probe comes back empty: the tail of history.
    older_exhausted: bool,
    newer_available: bool,
    initial_error: Option<FeedError>,
    older_error: Option<FeedError>,
    newer_error: Option<FeedError>,
}

impl SessionCore {
    fn new(page_size: usize) -> Self {
        Self {
            term: None,
            generation: 0,
            phase: Phase::Empty,
            extending: None,
            boundary: Boundary::default(),
            cache: WindowCache::new(page_size),
            older_anchor: None,
            newer_anchor: None,
            older_exhausted: false,
            newer_available: false,
            initial_error: None,
            older_error: None,
            newer_error: None,
        }
    }

    fn reset(&mut self, term: String, page_size: usize) {
        let generation = self.generation + 1;
        *self = Self::new(page_size);
        self.term = Some(term);
        self.generation = generation;
    }

    /// True while a completion tagged `(term, generation)` still belongs to
    /// the live session.
    fn matches(&self, term: &str, generation: u64) -> bool {
        self.generation == generation && self.term.as_deref() == Some(term)
    }

    fn error_slot(&mut self, direction: Direction) -> &mut Option<FeedError> {
        match direction {
            Direction::Older => &mut self.older_error,
            Direction::Newer => &mut self.newer_error,
        }
    }
}

/// Rolls back the in-flight marker if the owning future is dropped before
/// its completion is applied, so an abandoned fetch cannot wedge the
/// session.
struct OpGuard {
    core: Arc<Mutex<SessionCore>>,
    operation: Operation,
    generation: u64,
    armed: bool,
}

impl OpGuard {
    fn arm(core: &Arc<Mutex<SessionCore>>, operation: Operation, generation: u64) -> Self {
        Self {
            core: Arc::clone(core),
            operation,
            generation,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut core = self.core.lock();
        if core.generation != self.generation {
            return;
        }
        match self.operation {
            Operation::InitialLoad => {
                if core.phase == Phase::LoadingInitial {
                    core.phase = Phase::Empty;
                }
            }
            Operation::ExtendOlder => {
                if core.extending == Some(Direction::Older) {
                    core.extending = None;
                }
            }
            Operation::ExtendNewer => {
                if core.extending == Some(Direction::Newer) {
                    core.extending = None;
                }
            }
        }
        tracing::debug!("session: abandoned {:?} rolled back", self.operation);
    }
}

/// What an anchored extension fetched before it is applied to the session.
struct ExtensionFetch {
    events: Vec<FeedEvent>,
    returned: Option<Boundary>,
    window: Boundary,
}

/// The Extension Coordinator: the single entry point the consuming layer
/// uses. Owns the tracked boundary and window cache for one query term and
/// decides whether a load request is served from the cache or through an
/// anchored fetch.
///
/// Cheap to clone; every clone shares the same session. The inner state is
/// guarded by a mutex that is never held across an await, so all mutation
/// happens in short exclusive sections between suspensions. Completions are
/// applied in the order their fetches resolve; the first-write-wins cache
/// initialization and the generation tag are the defenses against late
/// arrivals.
#[derive(Clone)]
pub struct StreamSession {
    client: EventSourceClient,
    config: EngineConfig,
    core: Arc<Mutex<SessionCore>>,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn EventTransport>, config: EngineConfig) -> Self {
        let client = EventSourceClient::new(transport, &config);
        let core = SessionCore::new(config.page_size);
        Self {
            client,
            config,
            core: Arc::new(Mutex::new(core)),
        }
    }

    /// Establish or change the query term driving the feed. A change starts
    /// a fresh boundary and a fresh cache; re-setting the current term is a
    /// no-op.
    pub fn set_query_term(&self, term: impl Into<String>) {
        let term = term.into();
        let mut core = self.core.lock();
        if core.term.as_deref() == Some(term.as_str()) {
            return;
        }
        tracing::debug!("session: query term set term={}", term);
        core.reset(term, self.config.page_size);
    }

    /// First population of the session from `boundary`. Guarded: without a
    /// query term or with an unset boundary no request is issued. Once the
    /// session is ready further calls are no-ops.
    pub async fn load_initial(&self, boundary: Boundary) -> Result<(), FeedError> {
        let (term, generation) = {
            let mut core = self.core.lock();
            if core.phase == Phase::Ready {
                tracing::debug!("session: initial load skipped, already populated");
                return Ok(());
            }
            let Some(term) = core.term.clone() else {
                tracing::debug!("session: initial load skipped, no query term");
                return Ok(());
            };
            if boundary.is_unset() {
                tracing::debug!("session: initial load skipped, boundary not set");
                return Ok(());
            }
            core.phase = Phase::LoadingInitial;
            core.initial_error = None;
            (term, core.generation)
        };

        let guard = OpGuard::arm(&self.core, Operation::InitialLoad, generation);

        match self.client.fetch_window(&boundary, &term).await {
            Ok((events, returned)) => {
                let mut core = self.core.lock();
                if !core.matches(&term, generation) {
                    tracing::debug!("session: stale initial response discarded term={}", term);
                    return Ok(());
                }
                if !core.cache.initialize(events) {
                    tracing::debug!("session: initial load raced, first write wins");
                }
                let merged = returned.unwrap_or(boundary);
                core.boundary = core.boundary.merge(Some(&merged), MergeOptions::default());
                core.phase = Phase::Ready;
                drop(core);
                guard.disarm();
                Ok(())
            }
            Err(err) => {
                let mut core = self.core.lock();
                if !core.matches(&term, generation) {
                    return Ok(());
                }
                tracing::warn!("session: initial load failed term={} err={}", term, err);
                core.initial_error = Some(err.clone());
                core.phase = Phase::Empty;
                drop(core);
                guard.disarm();
                Err(err)
            }
        }
    }

    /// Page backward. Served purely by a cursor shift while already-fetched
    /// older events remain; otherwise runs the anchored fetch protocol and
    /// widens the boundary backward.
    pub async fn load_older(&self) -> Result<(), FeedError> {
        let (term, generation, boundary) = {
            let mut core = self.core.lock();
            if core.phase != Phase::Ready {
                tracing::debug!("session: load_older ignored, not ready");
                return Ok(());
            }
            if core.extending.is_some() {
                tracing::debug!("session: load_older ignored, extension in flight");
                return Ok(());
            }
            if core.cache.older_buffered() > 0 {
                core.cache.advance_page(self.config.page_size as isize);
                return Ok(());
            }
            if core.older_exhausted {
                tracing::debug!("session: load_older ignored, tail of history reached");
                return Ok(());
            }
            let Some(term) = core.term.clone() else {
                return Ok(());
            };
            core.extending = Some(Direction::Older);
            core.older_error = None;
            (term, core.generation, core.boundary)
        };

        let guard = OpGuard::arm(&self.core, Operation::ExtendOlder, generation);
        let outcome = self.extend(Direction::Older, &term, generation, boundary).await;
        self.apply_extension(guard, Direction::Older, &term, generation, outcome)
    }

    /// Page forward. Served by a cursor shift while the head side still has
    /// buffered events; otherwise runs the anchored fetch protocol and
    /// widens the boundary forward.
    pub async fn load_newer(&self) -> Result<(), FeedError> {
        let (term, generation, boundary) = {
            let mut core = self.core.lock();
            if core.phase != Phase::Ready {
                tracing::debug!("session: load_newer ignored, not ready");
                return Ok(());
            }
            if core.extending.is_some() {
                tracing::debug!("session: load_newer ignored, extension in flight");
                return Ok(());
            }
            if core.cache.newer_buffered() > 0 {
                core.cache.advance_page(-(self.config.page_size as isize));
                return Ok(());
            }
            let Some(term) = core.term.clone() else {
                return Ok(());
            };
            core.extending = Some(Direction::Newer);
            core.newer_error = None;
            (term, core.generation, core.boundary)
        };

        let guard = OpGuard::arm(&self.core, Operation::ExtendNewer, generation);
        let outcome = self.extend(Direction::Newer, &term, generation, boundary).await;
        self.apply_extension(guard, Direction::Newer, &term, generation, outcome)
    }

    /// Probe the feed for the single most recent event and flag whether it
    /// is newer than anything cached. The flag backs a "new events"
    /// affordance in the rendering layer.
    pub async fn check_latest(&self) -> Result<bool, FeedError> {
        let (term, generation) = {
            let core = self.core.lock();
            let Some(term) = core.term.clone() else {
                return Ok(false);
            };
            (term, core.generation)
        };

        let latest = self.client.fetch_latest(&term).await?;

        let mut core = self.core.lock();
        if !core.matches(&term, generation) {
            return Ok(false);
        }
        let newer = match (&latest, core.cache.newest_timestamp()) {
            (Some(event), Some(newest)) => event.event_timestamp > newest,
            (Some(_), None) => true,
            (None, _) => false,
        };
        core.newer_available = newer;
        Ok(newer)
    }

    async fn extend(
        &self,
        direction: Direction,
        term: &str,
        generation: u64,
        boundary: Boundary,
    ) -> Result<Option<ExtensionFetch>, FeedError> {
        let Some(anchor) = self.client.fetch_adjacent(direction, &boundary, term).await? else {
            return Ok(None);
        };

        let window = match direction {
            Direction::Older => {
                Boundary::look_back(anchor.event_timestamp, self.config.older_lookback_secs)
            }
            Direction::Newer => {
                Boundary::look_ahead(anchor.event_timestamp, self.config.newer_lookahead_secs)
            }
        };

        // The anchor is replaced on every probe refresh, even if the window
        // fetch below fails.
        {
            let mut core = self.core.lock();
            if core.matches(term, generation) {
                match direction {
                    Direction::Older => core.older_anchor = Some(anchor),
                    Direction::Newer => core.newer_anchor = Some(anchor),
                }
            }
        }

        let (events, returned) = self.client.fetch_window(&window, term).await?;
        Ok(Some(ExtensionFetch {
            events,
            returned,
            window,
        }))
    }

    fn apply_extension(
        &self,
        guard: OpGuard,
        direction: Direction,
        term: &str,
        generation: u64,
        outcome: Result<Option<ExtensionFetch>, FeedError>,
    ) -> Result<(), FeedError> {
        let mut core = self.core.lock();
        if !core.matches(term, generation) {
            tracing::debug!(
                "session: stale {:?} extension discarded term={}",
                direction,
                term
            );
            return Ok(());
        }

        match outcome {
            Ok(Some(fetch)) => {
                // The server's boundary for the window is authoritative;
                // fall back to the requested window if it sent none.
                let merged = fetch.returned.unwrap_or(fetch.window);
                match direction {
                    Direction::Older => {
                        core.cache.append_older(fetch.events);
                        core.boundary = core.boundary.merge(
                            Some(&merged),
                            MergeOptions {
                                ignore_end: true,
                                ignore_start: false,
                            },
                        );
                    }
                    Direction::Newer => {
                        let fetched = !fetch.events.is_empty();
                        core.cache.prepend_newer(fetch.events);
                        core.boundary = core.boundary.merge(
                            Some(&merged),
                            MergeOptions {
                                ignore_start: true,
                                ignore_end: false,
                            },
                        );
                        if fetched {
                            core.newer_available = false;
                        }
                    }
                }
                core.extending = None;
                drop(core);
                guard.disarm();
                Ok(())
            }
            Ok(None) => {
                tracing::debug!("session: no {:?} anchor found", direction);
                if direction == Direction::Older {
                    core.older_exhausted = true;
                }
                core.extending = None;
                drop(core);
                guard.disarm();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    "session: {:?} extension failed term={} err={}",
                    direction,
                    term,
                    err
                );
                *core.error_slot(direction) = Some(err.clone());
                core.extending = None;
                drop(core);
                guard.disarm();
                Err(err)
            }
        }
    }

    // ===== Rendering-layer surface =====

    /// The currently visible page, newest first.
    pub fn page(&self) -> Vec<FeedEvent> {
        self.core.lock().cache.page().to_vec()
    }

    pub fn state(&self) -> SessionState {
        let core = self.core.lock();
        match (core.phase, core.extending) {
            (Phase::Empty, _) => SessionState::Empty,
            (Phase::LoadingInitial, _) => SessionState::LoadingInitial,
            (Phase::Ready, Some(Direction::Older)) => SessionState::ExtendingOlder,
            (Phase::Ready, Some(Direction::Newer)) => SessionState::ExtendingNewer,
            (Phase::Ready, None) => SessionState::Ready,
        }
    }

    pub fn is_loading_initial(&self) -> bool {
        self.core.lock().phase == Phase::LoadingInitial
    }

    pub fn is_extending_older(&self) -> bool {
        self.core.lock().extending == Some(Direction::Older)
    }

    pub fn is_extending_newer(&self) -> bool {
        self.core.lock().extending == Some(Direction::Newer)
    }

    /// Whether a probe has seen an event newer than anything cached.
    pub fn newer_available(&self) -> bool {
        self.core.lock().newer_available
    }

    /// Whether an older probe has established that no older events exist.
    pub fn older_exhausted(&self) -> bool {
        self.core.lock().older_exhausted
    }

    /// The tracked boundary the cache is complete over.
    pub fn boundary(&self) -> Boundary {
        self.core.lock().boundary
    }

    pub fn query_term(&self) -> Option<String> {
        self.core.lock().term.clone()
    }

    /// Last error for the given operation, cleared when the operation is
    /// next attempted.
    pub fn last_error(&self, operation: Operation) -> Option<FeedError> {
        let core = self.core.lock();
        match operation {
            Operation::InitialLoad => core.initial_error.clone(),
            Operation::ExtendOlder => core.older_error.clone(),
            Operation::ExtendNewer => core.newer_error.clone(),
        }
    }

    /// Most recent anchor probes, for diagnostics and rendering hints.
    pub fn older_anchor(&self) -> Option<FeedEvent> {
        self.core.lock().older_anchor.clone()
    }

    pub fn newer_anchor(&self) -> Option<FeedEvent> {
        self.core.lock().newer_anchor.clone()
    }
}
