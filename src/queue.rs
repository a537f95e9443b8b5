use crate::models::Item;

/// An item with its 1-based position in the whole run.
#[derive(Debug, Clone, Copy)]
pub struct QueuedItem<'a> {
    pub file_index: usize,
    pub item: &'a Item,
}

/// Splits `items` into contiguous batches of at most `width`, keeping order.
pub fn plan_batches(items: &[Item], width: usize) -> Vec<Vec<QueuedItem<'_>>> {
    let width = width.max(1);
    items
        .chunks(width)
        .enumerate()
        .map(|(batch, chunk)| {
            chunk
                .iter()
                .enumerate()
                .map(|(offset, item)| QueuedItem {
                    file_index: batch * width + offset + 1,
                    item,
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn items(n: u64) -> Vec<Item> {
        (1..=n)
            .map(|id| Item {
                id,
                size: id,
                kind: MediaKind::Video,
                file_name: None,
                collection_id: 1,
            })
            .collect()
    }

    #[test]
    fn batches_are_contiguous_and_indexed_globally() {
        let items = items(45);
        let batches = plan_batches(&items, 20);

        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![20, 20, 5]);
        let indices: Vec<usize> = batches.iter().flatten().map(|q| q.file_index).collect();
        assert_eq!(indices, (1..=45).collect::<Vec<_>>());
        assert_eq!(batches[1][0].item.id, 21);
        assert_eq!(batches[2][4].item.id, 45);
    }

    #[test]
    fn empty_and_exact_multiples() {
        assert!(plan_batches(&[], 20).is_empty());
        assert_eq!(plan_batches(&items(40), 20).len(), 2);
        assert_eq!(plan_batches(&items(3), 0).len(), 3);
    }
}
