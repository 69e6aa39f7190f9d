use std::time::Duration;

/// Default page length for the visible window.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Look-back span in seconds when extending backward around an older anchor.
/// Historical density is unknown, so backward pages stay conservative.
pub const DEFAULT_OLDER_LOOKBACK_SECS: u64 = 60;

/// Look-ahead span in seconds when extending forward around a newer anchor.
/// Recent activity is bursty; a larger forward slice cuts round-trips when
/// live-tailing.
pub const DEFAULT_NEWER_LOOKAHEAD_SECS: u64 = 5 * 60;

/// Staleness window for live queries (in-boundary window, latest).
pub const DEFAULT_LIVE_TTL: Duration = Duration::from_secs(5);

/// Staleness window for anchor probes. A historical anchor event, once
/// identified, does not change.
pub const DEFAULT_ANCHOR_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Extra attempts after the first failed transport call.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Base delay between retry attempts; multiplied by the attempt number.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Tunables for one stream engine instance.
///
/// The probe window spans are carried-over heuristics from the original
/// dashboard, not derived invariants. Treat them as configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub page_size: usize,
    pub older_lookback_secs: u64,
    pub newer_lookahead_secs: u64,
    pub live_ttl: Duration,
    pub anchor_ttl: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            older_lookback_secs: DEFAULT_OLDER_LOOKBACK_SECS,
            newer_lookahead_secs: DEFAULT_NEWER_LOOKAHEAD_SECS,
            live_ttl: DEFAULT_LIVE_TTL,
            anchor_ttl: DEFAULT_ANCHOR_TTL,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}
