//! Deduplication and fixed-size partitioning.

use std::collections::BTreeSet;

/// Collapse duplicates and return the unique items in sorted order.
pub fn dedup<T, I>(items: I) -> Vec<T>
where
    T: Ord,
    I: IntoIterator<Item = T>,
{
    items.into_iter().collect::<BTreeSet<T>>().into_iter().collect()
}

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// Every chunk except possibly the last has exactly `size` elements. A
/// `size` of zero is treated as one.
pub fn partition<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Number of chunks [`partition`] would produce.
pub fn batch_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dedup_sorts_and_merges() {
        assert_eq!(dedup(vec!["b", "a", "b", "a"]), vec!["a", "b"]);
        assert!(dedup(Vec::<u8>::new()).is_empty());
    }

    #[test]
    fn test_partition_default_batch_size() {
        let items: Vec<u32> = (0..2000).collect();
        let sizes: Vec<usize> = partition(&items, 950).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![950, 950, 100]);
    }

    #[test]
    fn test_partition_edges() {
        let empty: [u8; 0] = [];
        assert!(partition(&empty, 10).is_empty());
        assert_eq!(partition(&[1, 2, 3], 0).len(), 3);
        assert_eq!(partition(&[1, 2, 3], 3), vec![&[1, 2, 3][..]]);
    }

    proptest! {
        #[test]
        fn prop_partition_preserves_order_and_bounds(
            items in prop::collection::vec(any::<u16>(), 0..500),
            size in 1usize..64,
        ) {
            let chunks = partition(&items, size);
            prop_assert_eq!(chunks.len(), batch_count(items.len(), size));
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(!chunk.is_empty());
                if i + 1 < chunks.len() {
                    prop_assert_eq!(chunk.len(), size);
                } else {
                    prop_assert!(chunk.len() <= size);
                }
            }
            let rejoined: Vec<u16> = chunks.concat();
            prop_assert_eq!(rejoined, items);
        }
    }
}
