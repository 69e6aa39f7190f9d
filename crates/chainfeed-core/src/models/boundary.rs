use serde::{Deserialize, Serialize};

/// Time interval over which the local cache is known to be complete.
///
/// A `None` bound means the interval is not yet established on that side.
/// Inclusivity is tracked per edge because extension sub-windows are
/// half-open while the tracked boundary is usually closed on both ends.
///
/// Invariant: once both bounds are set, `start_time <= end_time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundary {
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub include_start: bool,
    pub include_end: bool,
}

/// Per-edge suppression for [`Boundary::merge`]. Extending backward must not
/// move the forward edge and vice versa.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub ignore_start: bool,
    pub ignore_end: bool,
}

impl Boundary {
    /// Closed interval `[start, end]`.
    pub fn closed(start_time: u64, end_time: u64) -> Self {
        debug_assert!(start_time <= end_time);
        Self {
            start_time: Some(start_time),
            end_time: Some(end_time),
            include_start: true,
            include_end: true,
        }
    }

    /// Half-open look-back window `[anchor - span, anchor + 1)` used when
    /// extending backward around an older anchor.
    pub fn look_back(anchor_timestamp: u64, span_secs: u64) -> Self {
        Self {
            start_time: Some(anchor_timestamp.saturating_sub(span_secs)),
            end_time: Some(anchor_timestamp + 1),
            include_start: true,
            include_end: false,
        }
    }

    /// Half-open look-ahead window `(anchor - 1, anchor + span]` used when
    /// extending forward around a newer anchor.
    pub fn look_ahead(anchor_timestamp: u64, span_secs: u64) -> Self {
        Self {
            start_time: Some(anchor_timestamp.saturating_sub(1)),
            end_time: Some(anchor_timestamp + span_secs),
            include_start: false,
            include_end: true,
        }
    }

    /// True while neither bound has been established.
    pub fn is_unset(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Merge `incoming` into this boundary, producing the widened result.
    ///
    /// Each edge only moves outward: the start adopts an earlier (or equal)
    /// incoming start, the end adopts a later (or equal) incoming end, and an
    /// unset edge adopts whatever the incoming boundary establishes.
    /// Inclusivity becomes the OR of both flags whenever an edge is adopted.
    /// Merging the same incoming boundary twice produces no further change.
    pub fn merge(&self, incoming: Option<&Boundary>, opts: MergeOptions) -> Boundary {
        let Some(incoming) = incoming else {
            return *self;
        };

        let mut merged = *self;

        if !opts.ignore_start {
            match (self.start_time, incoming.start_time) {
                (None, Some(start)) => {
                    merged.start_time = Some(start);
                    merged.include_start = self.include_start || incoming.include_start;
                }
                (Some(current), Some(start)) if start <= current => {
                    if incoming.end_time.is_some_and(|end| end < current) {
                        tracing::debug!(
                            "boundary: widening start over non-overlapping window incoming_end={:?} current_start={}",
                            incoming.end_time,
                            current
                        );
                    }
                    merged.start_time = Some(start);
                    merged.include_start = self.include_start || incoming.include_start;
                }
                (None, None) => {
                    merged.include_start = self.include_start || incoming.include_start;
                }
                _ => {}
            }
        }

        if !opts.ignore_end {
            match (self.end_time, incoming.end_time) {
                (None, Some(end)) => {
                    merged.end_time = Some(end);
                    merged.include_end = self.include_end || incoming.include_end;
                }
                (Some(current), Some(end)) if end >= current => {
                    if incoming.start_time.is_some_and(|start| start > current) {
                        tracing::debug!(
                            "boundary: widening end over non-overlapping window incoming_start={:?} current_end={}",
                            incoming.start_time,
                            current
                        );
                    }
                    merged.end_time = Some(end);
                    merged.include_end = self.include_end || incoming.include_end;
                }
                (None, None) => {
                    merged.include_end = self.include_end || incoming.include_end;
                }
                _ => {}
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_absent_incoming_is_identity() {
        let current = Boundary::closed(1000, 1010);
        assert_eq!(current.merge(None, MergeOptions::default()), current);
    }

    #[test]
    fn test_merge_widens_both_edges() {
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::closed(990, 1005);

        let merged = current.merge(Some(&incoming), MergeOptions::default());

        assert_eq!(merged.start_time, Some(990));
        assert_eq!(merged.end_time, Some(1010));
        assert!(merged.include_start);
        assert!(merged.include_end);
    }

    #[test]
    fn test_merge_never_narrows() {
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::closed(1002, 1008);

        let merged = current.merge(Some(&incoming), MergeOptions::default());

        assert_eq!(merged, current);
    }

    #[test]
    fn test_merge_adopts_into_unset_boundary() {
        let current = Boundary::default();
        let incoming = Boundary::closed(500, 600);

        let merged = current.merge(Some(&incoming), MergeOptions::default());

        assert_eq!(merged.start_time, Some(500));
        assert_eq!(merged.end_time, Some(600));
        assert!(merged.include_start);
        assert!(merged.include_end);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::look_back(980, 60);

        let once = current.merge(Some(&incoming), MergeOptions::default());
        let twice = once.merge(Some(&incoming), MergeOptions::default());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_ignore_end_freezes_forward_edge() {
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::closed(900, 2000);

        let merged = current.merge(
            Some(&incoming),
            MergeOptions {
                ignore_end: true,
                ..Default::default()
            },
        );

        assert_eq!(merged.start_time, Some(900));
        assert_eq!(merged.end_time, Some(1010));
    }

    #[test]
    fn test_merge_ignore_start_freezes_backward_edge() {
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::closed(900, 2000);

        let merged = current.merge(
            Some(&incoming),
            MergeOptions {
                ignore_start: true,
                ..Default::default()
            },
        );

        assert_eq!(merged.start_time, Some(1000));
        assert_eq!(merged.end_time, Some(2000));
    }

    #[test]
    fn test_merge_ors_inclusivity_on_adoption() {
        let current = Boundary {
            start_time: Some(1000),
            end_time: Some(1010),
            include_start: false,
            include_end: false,
        };
        let incoming = Boundary {
            start_time: Some(1000),
            end_time: Some(1010),
            include_start: true,
            include_end: true,
        };

        let merged = current.merge(Some(&incoming), MergeOptions::default());

        assert!(merged.include_start);
        assert!(merged.include_end);
    }

    #[test]
    fn test_merge_sequence_is_monotonic() {
        let windows = [
            Boundary::closed(1000, 1010),
            Boundary::closed(940, 1001),
            Boundary::closed(1009, 1300),
            Boundary::closed(700, 760),
            Boundary::closed(1500, 1700),
        ];

        let mut tracked = Boundary::default();
        let mut last_start = u64::MAX;
        let mut last_end = 0u64;

        for window in &windows {
            tracked = tracked.merge(Some(window), MergeOptions::default());
            let start = tracked.start_time.unwrap();
            let end = tracked.end_time.unwrap();
            assert!(start <= last_start);
            assert!(end >= last_end);
            last_start = start;
            last_end = end;
        }

        assert_eq!(tracked.start_time, Some(700));
        assert_eq!(tracked.end_time, Some(1700));
    }

    #[test]
    fn test_merge_widens_over_gap() {
        // Non-adjacent incoming window: the edge still moves (the anchored
        // probe protocol guarantees the skipped region holds no events).
        let current = Boundary::closed(1000, 1010);
        let incoming = Boundary::closed(100, 160);

        let merged = current.merge(
            Some(&incoming),
            MergeOptions {
                ignore_end: true,
                ..Default::default()
            },
        );

        assert_eq!(merged.start_time, Some(100));
        assert_eq!(merged.end_time, Some(1010));
    }

    #[test]
    fn test_look_back_window_shape() {
        let window = Boundary::look_back(500, 60);
        assert_eq!(window.start_time, Some(440));
        assert_eq!(window.end_time, Some(501));
        assert!(window.include_start);
        assert!(!window.include_end);
    }

    #[test]
    fn test_look_ahead_window_shape() {
        let window = Boundary::look_ahead(500, 300);
        assert_eq!(window.start_time, Some(499));
        assert_eq!(window.end_time, Some(800));
        assert!(!window.include_start);
        assert!(window.include_end);
    }

    #[test]
    fn test_look_back_saturates_at_epoch() {
        let window = Boundary::look_back(30, 60);
        assert_eq!(window.start_time, Some(0));
    }
}
