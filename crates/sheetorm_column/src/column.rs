//! Bijective base-26 column naming.
//!
//! Spreadsheet columns are numbered `A`..`Z`, then `AA`..`AZ`, `BA`.. and so on.
//! This is *bijective* base-26: digits run from 1 (`A`) to 26 (`Z`) and there is
//! no digit for zero, which is why `Z` is followed by `AA` rather than `BA`.

/// Returns true if `col` is a well-formed column token (`^[A-Z]+$`).
pub fn is_valid_col(col: &str) -> bool {
    !col.is_empty() && col.bytes().all(|b| b.is_ascii_uppercase())
}

/// Converts a column name to its zero-based index (`"A"` → 0, `"AA"` → 26).
///
/// Returns `None` if the token is malformed or too long to fit in `usize`.
pub fn col_index(col: &str) -> Option<usize> {
    if !is_valid_col(col) {
        return None;
    }

    let mut value: usize = 0;
    for b in col.bytes() {
        let digit = usize::from(b - b'A') + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }

    // the loop ran at least once, so value >= 1
    Some(value - 1)
}

/// Converts a zero-based index to its column name (0 → `"A"`, 26 → `"AA"`).
pub fn col_from_index(index: usize) -> String {
    // u128 so that usize::MAX + 1 cannot overflow
    let mut n = index as u128 + 1;
    let mut letters = Vec::new();

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }

    letters.iter().rev().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_columns() {
        for col in ["A", "B", "BA", "ZZZ"] {
            assert!(is_valid_col(col), "{col} should be valid");
        }
    }

    #[test]
    fn invalid_columns() {
        for col in ["", "ab", "12", "A1", "❤️", " A", "a"] {
            assert!(!is_valid_col(col), "{col:?} should be invalid");
        }
    }

    #[test]
    fn known_indexes() {
        assert_eq!(col_index("A"), Some(0));
        assert_eq!(col_index("Z"), Some(25));
        assert_eq!(col_index("AA"), Some(26));
        assert_eq!(col_index("AZ"), Some(51));
        assert_eq!(col_index("BA"), Some(52));
        assert_eq!(col_index("ZZ"), Some(701));
        assert_eq!(col_index("AAA"), Some(702));
    }

    #[test]
    fn known_names() {
        assert_eq!(col_from_index(0), "A");
        assert_eq!(col_from_index(25), "Z");
        assert_eq!(col_from_index(26), "AA");
        assert_eq!(col_from_index(701), "ZZ");
        assert_eq!(col_from_index(702), "AAA");
    }

    #[test]
    fn malformed_index_is_none() {
        assert_eq!(col_index(""), None);
        assert_eq!(col_index("a"), None);
        assert_eq!(col_index("A1"), None);
    }

    #[test]
    fn overlong_column_is_none() {
        let col = "Z".repeat(64);
        assert_eq!(col_index(&col), None);
    }

    #[test]
    fn sequential_indexes_roundtrip() {
        let handles: Vec<_> = (0..4)
            .map(|batch| {
                std::thread::spawn(move || {
                    for i in batch * 50_000..(batch + 1) * 50_000 {
                        let col = col_from_index(i);
                        assert!(is_valid_col(&col));
                        assert_eq!(col_index(&col), Some(i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    proptest! {
        #[test]
        fn index_roundtrip(n in 0usize..100_000_000) {
            prop_assert_eq!(col_index(&col_from_index(n)), Some(n));
        }

        #[test]
        fn name_roundtrip(col in "[A-Z]{1,6}") {
            let idx = col_index(&col).unwrap();
            prop_assert_eq!(col_from_index(idx), col);
        }
    }
}
