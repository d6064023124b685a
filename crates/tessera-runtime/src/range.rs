//! N-dimensional work extents.

/// Up to three work extents; the dimension count is however many were given.
///
/// Unused trailing extents read as 1 so a range can always be treated as
/// three-dimensional when computing dispatch counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NDRange {
    sizes: [u32; 3],
    dims: usize,
}

impl NDRange {
    /// A range with zero dimensions.
    pub const fn empty() -> Self {
        Self {
            sizes: [0; 3],
            dims: 0,
        }
    }

    pub const fn d1(x: u32) -> Self {
        Self {
            sizes: [x, 1, 1],
            dims: 1,
        }
    }

    pub const fn d2(x: u32, y: u32) -> Self {
        Self {
            sizes: [x, y, 1],
            dims: 2,
        }
    }

    pub const fn d3(x: u32, y: u32, z: u32) -> Self {
        Self {
            sizes: [x, y, z],
            dims: 3,
        }
    }

    /// Number of extents supplied (0–3).
    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.dims == 0
    }

    /// All three extents, padded with 1 past [`dimensions`](Self::dimensions).
    pub fn sizes(&self) -> [u32; 3] {
        match self.dims {
            0 => [1, 1, 1],
            _ => self.sizes,
        }
    }

    /// Only the supplied extents.
    pub fn as_slice(&self) -> &[u32] {
        &self.sizes[..self.dims]
    }

    /// Total number of work-items described by the range.
    pub fn work_items(&self) -> u64 {
        if self.dims == 0 {
            return 0;
        }
        self.as_slice().iter().map(|&s| s as u64).product()
    }
}

impl Default for NDRange {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<u32> for NDRange {
    fn from(x: u32) -> Self {
        Self::d1(x)
    }
}

impl From<(u32, u32)> for NDRange {
    fn from((x, y): (u32, u32)) -> Self {
        Self::d2(x, y)
    }
}

impl From<(u32, u32, u32)> for NDRange {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self::d3(x, y, z)
    }
}

impl From<[u32; 1]> for NDRange {
    fn from([x]: [u32; 1]) -> Self {
        Self::d1(x)
    }
}

impl From<[u32; 2]> for NDRange {
    fn from([x, y]: [u32; 2]) -> Self {
        Self::d2(x, y)
    }
}

impl From<[u32; 3]> for NDRange {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Self::d3(x, y, z)
    }
}
