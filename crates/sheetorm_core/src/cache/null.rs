use super::{RowCache, RowData, UidCache};

/// A cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl UidCache for NullCache {
    fn put_uid(&self, _uid: &str, _row: usize) {}

    fn get_row_num(&self, _uid: &str) -> Option<usize> {
        None
    }

    fn invalidate_uid(&self, _uid: &str) {}
}

impl RowCache for NullCache {
    fn put_row(&self, _row: usize, _data: &RowData) {}

    fn get_row(&self, _row: usize) -> Option<RowData> {
        None
    }

    fn invalidate_row(&self, _row: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_misses() {
        let cache = NullCache;
        cache.put_uid("a", 3);
        cache.put_row(3, &RowData::from([("A".to_string(), "a".to_string())]));

        assert_eq!(cache.get_row_num("a"), None);
        assert_eq!(cache.get_row(3), None);

        cache.invalidate_uid("a");
        cache.invalidate_row(3);
    }
}
