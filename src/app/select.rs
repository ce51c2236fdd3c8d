use chrono::{DateTime, Utc};
use tracing::warn;

use crate::feed::FeedEntry;

/// Entries published strictly after `last_run`, oldest first.
///
/// Feeds list newest-first, so the feed order is reversed; the last element
/// is then the entry whose date becomes the next last-run marker. Entries
/// whose date cannot be read are never selected.
pub(crate) fn select_new_episodes<'a>(
    entries: &'a [FeedEntry],
    last_run: DateTime<Utc>,
    date_format: &str,
) -> Vec<&'a FeedEntry> {
    entries
        .iter()
        .rev()
        .filter(|entry| match entry.published_instant(date_format) {
            Some(published) => published > last_run,
            None => {
                warn!(
                    title = %entry.title,
                    published = %entry.published,
                    "skipping entry with unreadable publication date"
                );
                false
            }
        })
        .collect()
}
