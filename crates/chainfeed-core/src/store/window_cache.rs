use crate::models::FeedEvent;

/// Ordered local buffer of fetched events plus the page cursor.
///
/// Events are kept sorted by `event_timestamp` descending (newest first)
/// after every mutation. The cursor marks the start of the currently visible
/// page; `None` means no successful initial fetch has happened yet.
pub struct WindowCache {
    events: Vec<FeedEvent>,
    cursor: Option<usize>,
    page_size: usize,
}

impl WindowCache {
    pub fn new(page_size: usize) -> Self {
        Self {
            events: Vec::new(),
            cursor: None,
            page_size,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Timestamp of the newest cached event, if any.
    pub fn newest_timestamp(&self) -> Option<u64> {
        self.events.first().map(|e| e.event_timestamp)
    }

    /// Populate the cache for the first time. First write wins: once a
    /// cursor exists, later calls are no-ops so a duplicate concurrent
    /// initial fetch cannot clobber state. Returns whether this call took
    /// effect.
    ///
    /// `events` must already be sorted by `event_timestamp` descending.
    pub fn initialize(&mut self, events: Vec<FeedEvent>) -> bool {
        if self.is_initialized() {
            tracing::debug!("window_cache: initialize ignored, cache already populated");
            return false;
        }
        debug_assert!(is_sorted_descending(&events));

        self.events = events;
        self.cursor = Some(0);
        true
    }

    /// Concatenate strictly-older events after the existing tail. No
    /// de-duplication is performed; the anchor protocol guarantees callers
    /// only fetch events older than everything cached.
    pub fn append_older(&mut self, events: Vec<FeedEvent>) {
        if !self.is_initialized() {
            tracing::debug!("window_cache: append_older before initialize ignored");
            return;
        }
        debug_assert!(is_sorted_descending(&events));
        debug_assert!(joins_descending(self.events.last(), events.first()));

        self.events.extend(events);
    }

    /// Concatenate strictly-newer events before the existing head. The
    /// cursor advances by the inserted count only if the cache was non-empty
    /// before the call, so the page the user is viewing does not shift.
    pub fn prepend_newer(&mut self, events: Vec<FeedEvent>) {
        if !self.is_initialized() {
            tracing::debug!("window_cache: prepend_newer before initialize ignored");
            return;
        }
        debug_assert!(is_sorted_descending(&events));
        debug_assert!(joins_descending(events.last(), self.events.first()));

        let was_empty = self.events.is_empty();
        let inserted = events.len();

        let mut merged = events;
        merged.append(&mut self.events);
        self.events = merged;

        if !was_empty {
            if let Some(cursor) = self.cursor.as_mut() {
                *cursor += inserted;
            }
        }
    }

    /// The currently visible page: `events[cursor .. cursor + page_size]`,
    /// clipped to the available length. Empty before initialization.
    pub fn page(&self) -> &[FeedEvent] {
        let Some(cursor) = self.cursor else {
            return &[];
        };
        let start = cursor.min(self.events.len());
        let end = (start + self.page_size).min(self.events.len());
        &self.events[start..end]
    }

    /// Move the cursor by `delta`, clamped into `[0, len]`.
    pub fn advance_page(&mut self, delta: isize) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let moved = cursor as isize + delta;
        self.cursor = Some(moved.clamp(0, self.events.len() as isize) as usize);
    }

    /// Already-fetched events below the visible page (toward older).
    pub fn older_buffered(&self) -> usize {
        match self.cursor {
            Some(cursor) => self.events.len().saturating_sub(cursor + self.page_size),
            None => 0,
        }
    }

    /// Already-fetched events above the visible page (toward newer).
    pub fn newer_buffered(&self) -> usize {
        self.cursor.unwrap_or(0)
    }
}

fn is_sorted_descending(events: &[FeedEvent]) -> bool {
    events
        .windows(2)
        .all(|pair| pair[0].event_timestamp >= pair[1].event_timestamp)
}

fn joins_descending(newer: Option<&FeedEvent>, older: Option<&FeedEvent>) -> bool {
    match (newer, older) {
        (Some(newer), Some(older)) => newer.event_timestamp >= older.event_timestamp,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(timestamps: &[u64]) -> Vec<FeedEvent> {
        timestamps
            .iter()
            .map(|ts| FeedEvent::new(format!("e{ts}"), *ts))
            .collect()
    }

    fn timestamps(events: &[FeedEvent]) -> Vec<u64> {
        events.iter().map(|e| e.event_timestamp).collect()
    }

    #[test]
    fn test_initialize_sets_cursor_and_page() {
        let mut cache = WindowCache::new(2);
        assert!(!cache.is_initialized());
        assert!(cache.page().is_empty());

        assert!(cache.initialize(events(&[5, 4, 3])));

        assert_eq!(cache.cursor(), Some(0));
        assert_eq!(timestamps(cache.page()), vec![5, 4]);
    }

    #[test]
    fn test_initialize_first_write_wins() {
        let mut cache = WindowCache::new(2);
        assert!(cache.initialize(events(&[5, 4, 3])));
        assert!(!cache.initialize(events(&[9, 8])));

        assert_eq!(timestamps(cache.page()), vec![5, 4]);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_prepend_newer_shifts_cursor_and_keeps_view() {
        let mut cache = WindowCache::new(2);
        cache.initialize(events(&[5, 4, 3]));

        cache.prepend_newer(events(&[7, 6]));

        assert_eq!(cache.len(), 5);
        assert_eq!(cache.cursor(), Some(2));
        assert_eq!(timestamps(cache.page()), vec![5, 4]);
    }

    #[test]
    fn test_prepend_newer_into_empty_cache_keeps_cursor() {
        let mut cache = WindowCache::new(2);
        cache.initialize(Vec::new());

        cache.prepend_newer(events(&[7, 6]));

        // Nothing was on screen, so the new head becomes visible.
        assert_eq!(cache.cursor(), Some(0));
        assert_eq!(timestamps(cache.page()), vec![7, 6]);
    }

    #[test]
    fn test_append_older_extends_tail() {
        let mut cache = WindowCache::new(2);
        cache.initialize(events(&[5, 4]));

        cache.append_older(events(&[3, 2, 1]));

        assert_eq!(cache.len(), 5);
        assert_eq!(cache.cursor(), Some(0));
        assert_eq!(timestamps(cache.page()), vec![5, 4]);
        assert_eq!(cache.older_buffered(), 3);
    }

    #[test]
    fn test_mutations_preserve_descending_order() {
        let mut cache = WindowCache::new(3);
        cache.initialize(events(&[50, 40]));
        cache.append_older(events(&[30, 20]));
        cache.prepend_newer(events(&[70, 60]));
        cache.append_older(events(&[10]));

        // Walk the whole buffer page by page from the head.
        let mut collected = Vec::new();
        cache.advance_page(-(cache.len() as isize));
        while !cache.page().is_empty() {
            collected.extend(timestamps(cache.page()));
            cache.advance_page(cache.page_size() as isize);
        }
        assert_eq!(collected, vec![70, 60, 50, 40, 30, 20, 10]);
    }

    #[test]
    fn test_advance_page_clamps_to_bounds() {
        let mut cache = WindowCache::new(2);
        cache.initialize(events(&[5, 4, 3]));

        cache.advance_page(-10);
        assert_eq!(cache.cursor(), Some(0));

        cache.advance_page(100);
        assert_eq!(cache.cursor(), Some(3));
        assert!(cache.page().is_empty());
    }

    #[test]
    fn test_advance_page_before_initialize_is_noop() {
        let mut cache = WindowCache::new(2);
        cache.advance_page(5);
        assert_eq!(cache.cursor(), None);
    }

    #[test]
    fn test_buffered_counts() {
        let mut cache = WindowCache::new(2);
        cache.initialize(events(&[5, 4, 3, 2, 1]));

        assert_eq!(cache.older_buffered(), 3);
        assert_eq!(cache.newer_buffered(), 0);

        cache.advance_page(2);
        assert_eq!(cache.older_buffered(), 1);
        assert_eq!(cache.newer_buffered(), 2);

        cache.advance_page(2);
        assert_eq!(cache.older_buffered(), 0);
        assert_eq!(cache.newer_buffered(), 4);
    }

    #[test]
    fn test_page_clips_to_available_length() {
        let mut cache = WindowCache::new(4);
        cache.initialize(events(&[5, 4, 3]));
        assert_eq!(timestamps(cache.page()), vec![5, 4, 3]);
    }

    #[test]
    fn test_extensions_before_initialize_are_ignored() {
        let mut cache = WindowCache::new(2);
        cache.append_older(events(&[3]));
        cache.prepend_newer(events(&[9]));

        assert!(!cache.is_initialized());
        assert_eq!(cache.len(), 0);
    }
}
