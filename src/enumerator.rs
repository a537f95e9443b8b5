// src/enumerator.rs

use crate::models::{Collection, Item};
use crate::source::MessageSource;
use tracing::{debug, error, info, warn};

/// Messages requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Walks the whole history of `collection` and returns its media items in the
/// order the source delivered them.
///
/// Never fails: a page error is logged and whatever was gathered so far is
/// returned.
pub async fn enumerate(
    source: &dyn MessageSource,
    collection: &Collection,
    page_size: usize,
) -> Vec<Item> {
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut cursor: Option<u64> = None;

    info!(collection = %collection.name, "Fetching all messages with media");

    loop {
        let page = match source.list_page(collection, cursor, page_size).await {
            Ok(page) => page,
            Err(e) => {
                error!(collection = %collection.name, error = %e, "Failed to fetch messages");
                break;
            }
        };

        let Some(lowest) = page.iter().map(|message| message.id).min() else {
            break;
        };

        if cursor.is_some_and(|previous| lowest >= previous) {
            warn!(lowest, "Source did not advance past cursor, stopping enumeration");
            break;
        }

        let before = items.len();
        items.extend(
            page.iter()
                .filter_map(|message| Item::from_message(message, collection.id)),
        );
        debug!(
            page_len = page.len(),
            media = items.len() - before,
            lowest,
            "Fetched page"
        );

        cursor = Some(lowest);
    }

    info!(
        collection = %collection.name,
        count = items.len(),
        "Found messages with media"
    );
    items
}
