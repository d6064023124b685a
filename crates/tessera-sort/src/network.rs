//! Index arithmetic of the bitonic network, and the host implementation of a pass.

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Name of the compute entry point that sorts in this direction.
    pub fn entry_point(self) -> &'static str {
        match self {
            SortDirection::Ascending => "sort_up",
            SortDirection::Descending => "sort_down",
        }
    }

    /// Whether `a` followed by `b` violates this order.
    pub fn out_of_order<T: PartialOrd>(self, a: &T, b: &T) -> bool {
        match self {
            SortDirection::Ascending => a > b,
            SortDirection::Descending => a < b,
        }
    }

    /// Compare-exchange rule: should the pair `(a, b)` be swapped?
    fn swaps<T: PartialOrd>(self, a: &T, b: &T) -> bool {
        let less = a < b;
        match self {
            SortDirection::Ascending => !less,
            SortDirection::Descending => less,
        }
    }
}

/// Number of merge stages for `len` elements, or `None` if `len` is not a
/// power of two.
pub fn stages(len: usize) -> Option<u32> {
    len.is_power_of_two().then(|| len.trailing_zeros())
}

/// Every `(stage, pass)` of a network with `stages` merge stages, in order.
///
/// There are `stages * (stages + 1) / 2` of them.
pub fn schedule(stages: u32) -> impl Iterator<Item = (u32, u32)> {
    (0..stages).flat_map(|i| (0..=i).map(move |j| (i, j)))
}

/// Indices compared by work-item `id` during pass `j` of stage `i`.
pub fn pair_indices(id: usize, i: u32, j: u32) -> (usize, usize) {
    let dif = i - j;
    let group = id >> dif;
    let in_group = id & !(group << dif);
    let id1 = group * (2 << dif) + in_group;
    let id2 = if j == 0 {
        (group + 1) * (2 << dif) - in_group - 1
    } else {
        id1 + (1 << dif)
    };
    (id1, id2)
}

/// Apply pass `j` of stage `i` to `data`, one compare-exchange per pair.
pub fn host_pass<T: PartialOrd>(data: &mut [T], direction: SortDirection, i: u32, j: u32) {
    for id in 0..data.len() / 2 {
        let (id1, id2) = pair_indices(id, i, j);
        if direction.swaps(&data[id1], &data[id2]) {
            data.swap(id1, id2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_stages() {
        assert_eq!(stages(1), Some(0));
        assert_eq!(stages(2), Some(1));
        assert_eq!(stages(1024), Some(10));
        assert_eq!(stages(0), None);
        assert_eq!(stages(3), None);
        assert_eq!(stages(1000), None);
    }

    #[test]
    fn test_schedule_order_and_length() {
        let passes: Vec<_> = schedule(3).collect();
        assert_eq!(
            passes,
            vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]
        );
        assert_eq!(schedule(10).count(), 55);
        assert_eq!(schedule(0).count(), 0);
    }

    #[test]
    fn test_first_pass_mirrors_within_block() {
        // Stage 1 pass 0 on 8 elements: blocks of 4, mirrored pairs.
        let pairs: Vec<_> = (0..4).map(|id| pair_indices(id, 1, 0)).collect();
        assert_eq!(pairs, vec![(0, 3), (1, 2), (4, 7), (5, 6)]);
    }

    #[test]
    fn test_later_pass_uses_stride() {
        // Stage 2 pass 1 on 8 elements: stride 2.
        let pairs: Vec<_> = (0..4).map(|id| pair_indices(id, 2, 1)).collect();
        assert_eq!(pairs, vec![(0, 2), (1, 3), (4, 6), (5, 7)]);
    }

    #[test]
    fn test_every_pass_is_a_perfect_matching() {
        let len = 64usize;
        for (i, j) in schedule(stages(len).unwrap()) {
            let mut seen = HashSet::new();
            for id in 0..len / 2 {
                let (a, b) = pair_indices(id, i, j);
                assert!(a < b, "pass ({i}, {j}) id {id}: {a} >= {b}");
                assert!(b < len);
                assert!(seen.insert(a) && seen.insert(b));
            }
            assert_eq!(seen.len(), len);
        }
    }

    #[test]
    fn test_host_passes_sort() {
        let mut data = vec![5, 3, 8, 1, 9, 2, 7, 4];
        for (i, j) in schedule(3) {
            host_pass(&mut data, SortDirection::Ascending, i, j);
        }
        assert_eq!(data, vec![1, 2, 3, 4, 5, 7, 8, 9]);

        for (i, j) in schedule(3) {
            host_pass(&mut data, SortDirection::Descending, i, j);
        }
        assert_eq!(data, vec![9, 8, 7, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_entry_points() {
        assert_eq!(SortDirection::Ascending.entry_point(), "sort_up");
        assert_eq!(SortDirection::Descending.entry_point(), "sort_down");
    }
}
