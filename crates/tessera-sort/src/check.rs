//! Sortedness oracle.

use crate::error::{Result, SortError};
use crate::network::SortDirection;

/// Fail at the first adjacent pair that violates `direction`.
pub fn check_sorted<T: PartialOrd>(data: &[T], direction: SortDirection) -> Result<()> {
    match data
        .windows(2)
        .position(|pair| direction.out_of_order(&pair[0], &pair[1]))
    {
        Some(index) => Err(SortError::Unsorted { index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_sorted() {
        assert!(check_sorted(&[1, 2, 2, 3], SortDirection::Ascending).is_ok());
        assert!(check_sorted(&[3, 2, 2, 1], SortDirection::Descending).is_ok());
        assert!(check_sorted::<i32>(&[], SortDirection::Ascending).is_ok());
        assert!(check_sorted(&[7], SortDirection::Descending).is_ok());
    }

    #[test]
    fn test_reports_first_violation() {
        let err = check_sorted(&[1, 3, 2, 4, 0], SortDirection::Ascending).unwrap_err();
        assert!(matches!(err, SortError::Unsorted { index: 1 }));
        assert_eq!(err.kind(), "UnsortedError");

        let err = check_sorted(&[1, 3, 2], SortDirection::Descending).unwrap_err();
        assert!(matches!(err, SortError::Unsorted { index: 0 }));
    }
}
