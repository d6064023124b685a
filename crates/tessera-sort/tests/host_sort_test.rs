//! Host path of the bitonic sorter, which needs no device.

mod common;

use common::random_array;
use tessera_sort::{BitonicSorter, ExecTarget, SortDirection, SortError, check_sorted};

#[test]
fn test_host_sort_matches_std_sort() {
    let sorter = BitonicSorter::new();
    for k in 0..=12 {
        let input = random_array(1 << k, k as u64);

        let mut up = input.clone();
        sorter.sort(&mut up, SortDirection::Ascending, ExecTarget::Host).unwrap();
        let mut expected = input.clone();
        expected.sort();
        assert_eq!(up, expected, "ascending, k = {k}");

        let mut down = input.clone();
        sorter.sort(&mut down, SortDirection::Descending, ExecTarget::Host).unwrap();
        expected.reverse();
        assert_eq!(down, expected, "descending, k = {k}");
    }
}

#[test]
fn test_scenario_eight_elements() {
    let input = vec![5, 3, 8, 1, 9, 2, 7, 4];
    let mut data = input.clone();
    BitonicSorter::new()
        .sort_on_host(&mut data, SortDirection::Ascending)
        .unwrap();

    let mut expected = input;
    expected.sort();
    assert_eq!(data, expected);
}

#[test]
fn test_host_sort_is_idempotent() {
    let sorter = BitonicSorter::new();
    let mut data = random_array(512, 7);
    sorter.sort_on_host(&mut data, SortDirection::Descending).unwrap();
    let once = data.clone();
    sorter.sort_on_host(&mut data, SortDirection::Descending).unwrap();
    assert_eq!(data, once);
    check_sorted(&data, SortDirection::Descending).unwrap();
}

#[test]
fn test_non_power_of_two_leaves_input_untouched() {
    let mut data = random_array(12, 3);
    let before = data.clone();
    let err = BitonicSorter::new()
        .sort(&mut data, SortDirection::Ascending, ExecTarget::Host)
        .unwrap_err();
    assert!(matches!(err, SortError::Size { len: 12 }));
    assert_eq!(data, before);
}
