//! Device memory buffers mirrored by host storage.

use crate::context::Context;
use crate::error::{Result, RuntimeError};
use bytemuck::Pod;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::sync::Arc;

/// How kernels are allowed to touch a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Kernels only read; the host never copies it back.
    ReadOnly,
    /// Kernels only write.
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn kernel_writable(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }

    pub fn host_readable(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }

    fn usage(self) -> wgpu::BufferUsages {
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        if self.host_readable() {
            usage | wgpu::BufferUsages::COPY_SRC
        } else {
            usage
        }
    }
}

/// Host-side mirror of a buffer: either owned here or lent by the caller.
///
/// A borrowed slice cannot change length, so the lender can never resize
/// storage out from under the device copy.
pub enum HostStorage<'a, T> {
    Owned(Vec<T>),
    Borrowed(&'a mut [T]),
}

impl<T: Copy> HostStorage<'_, T> {
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, HostStorage::Borrowed(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            HostStorage::Owned(vec) => vec,
            HostStorage::Borrowed(slice) => slice,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            HostStorage::Owned(vec) => vec,
            HostStorage::Borrowed(slice) => slice,
        }
    }

    /// Element at `index`; `index` must be strictly below [`len`](Self::len).
    pub fn get(&self, index: usize) -> Result<T> {
        let bound = self.len();
        self.as_slice()
            .get(index)
            .copied()
            .ok_or(RuntimeError::OutOfRange {
                what: "buffer",
                index,
                bound,
            })
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let bound = self.len();
        let slot = self
            .as_mut_slice()
            .get_mut(index)
            .ok_or(RuntimeError::OutOfRange {
                what: "buffer",
                index,
                bound,
            })?;
        *slot = value;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for HostStorage<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStorage::Owned(vec) => f.debug_tuple("Owned").field(&vec.len()).finish(),
            HostStorage::Borrowed(slice) => f.debug_tuple("Borrowed").field(&slice.len()).finish(),
        }
    }
}

/// Type-erased view of a buffer, as needed by transfer tasks.
pub trait MemoryObject {
    fn label(&self) -> &str;

    fn access(&self) -> AccessMode;

    /// Logical size in bytes.
    fn size(&self) -> u64;

    /// The device allocation.
    fn raw(&self) -> &wgpu::Buffer;

    /// Hand the current host bytes to `f`.
    fn with_host_bytes(&self, f: &mut dyn FnMut(&[u8])) -> Result<()>;

    /// Overwrite the host mirror with `bytes` (exactly [`size`](Self::size) long).
    fn store_host_bytes(&self, bytes: &[u8]) -> Result<()>;
}

/// A device allocation of `len` elements of `T`, mirrored on the host.
///
/// Host and device copies are synchronised only through
/// [`Task::Write`](crate::Task::Write) and [`Task::Read`](crate::Task::Read).
pub struct Buffer<'a, T: Pod> {
    label: String,
    raw: Arc<wgpu::Buffer>,
    access: AccessMode,
    len: usize,
    host: RefCell<HostStorage<'a, T>>,
    _ctx: &'a Context,
}

impl<'a, T: Pod> Buffer<'a, T> {
    /// Allocate `len` zeroed elements.
    ///
    /// # Errors
    /// [`RuntimeError::Size`] if `len` elements exceed the device's maximum
    /// buffer size; nothing is allocated on either side in that case.
    pub fn new(ctx: &'a Context, len: usize, access: AccessMode) -> Result<Self> {
        byte_size::<T>(ctx, len)?;
        Self::with_storage(ctx, HostStorage::Owned(vec![T::zeroed(); len]), access)
    }

    /// Allocate a buffer mirroring `data`; the buffer owns it.
    pub fn from_vec(ctx: &'a Context, data: Vec<T>, access: AccessMode) -> Result<Self> {
        Self::with_storage(ctx, HostStorage::Owned(data), access)
    }

    /// Allocate a buffer mirroring a caller-owned slice.
    ///
    /// Reads land directly in `data`. Dropping the buffer returns the slice to
    /// its owner without touching it.
    pub fn from_slice(ctx: &'a Context, data: &'a mut [T], access: AccessMode) -> Result<Self> {
        Self::with_storage(ctx, HostStorage::Borrowed(data), access)
    }

    fn with_storage(ctx: &'a Context, host: HostStorage<'a, T>, access: AccessMode) -> Result<Self> {
        let len = host.len();
        let size = byte_size::<T>(ctx, len)?;
        if size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(RuntimeError::Size(format!(
                "buffer of {len} x {} bytes is not a multiple of {} bytes",
                size_of::<T>(),
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }

        let label = format!("{}[{len}]", std::any::type_name::<T>());
        let device = ctx.primary();
        let ((raw, invalid), out_of_memory) = device.scoped(wgpu::ErrorFilter::OutOfMemory, |_| {
            device.scoped(wgpu::ErrorFilter::Validation, |raw| {
                // wgpu requires buffers to be at least 4 bytes
                raw.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&label),
                    size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
                    usage: access.usage(),
                    mapped_at_creation: false,
                })
            })
        });
        if let Some(e) = out_of_memory.or(invalid) {
            return Err(RuntimeError::Size(format!(
                "device refused {label} ({size} bytes): {e}"
            )));
        }

        tracing::debug!(%label, size, ?access, borrowed = host.is_borrowed(), "allocated buffer");

        Ok(Self {
            label,
            raw: Arc::new(raw),
            access,
            len,
            host: RefCell::new(host),
            _ctx: ctx,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        (self.len * size_of::<T>()) as u64
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Whether the host mirror is a slice lent by the caller.
    ///
    /// # Panics
    /// Panics if a mutable view from [`host_mut`](Self::host_mut) is alive.
    pub fn is_borrowed(&self) -> bool {
        self.host.borrow().is_borrowed()
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.host_ref("get")?.get(index)
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        self.host_ref_mut("set")?.set(index, value)
    }

    /// Borrow the host mirror.
    ///
    /// # Panics
    /// Panics if a mutable view from [`host_mut`](Self::host_mut) is alive.
    pub fn host(&self) -> Ref<'_, [T]> {
        Ref::map(self.host.borrow(), HostStorage::as_slice)
    }

    /// Mutably borrow the host mirror.
    ///
    /// # Panics
    /// Panics if any other view of the host mirror is alive.
    pub fn host_mut(&self) -> RefMut<'_, [T]> {
        RefMut::map(self.host.borrow_mut(), HostStorage::as_mut_slice)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.host().to_vec()
    }

    /// Consume the buffer, keeping the host contents.
    pub fn into_vec(mut self) -> Vec<T> {
        let host = std::mem::replace(&mut self.host, RefCell::new(HostStorage::Owned(Vec::new())));
        match host.into_inner() {
            HostStorage::Owned(vec) => vec,
            HostStorage::Borrowed(slice) => slice.to_vec(),
        }
    }

    /// Shared handle to the device allocation, for kernel bindings.
    pub(crate) fn raw_handle(&self) -> Arc<wgpu::Buffer> {
        Arc::clone(&self.raw)
    }

    fn host_ref(&self, operation: &'static str) -> Result<Ref<'_, HostStorage<'a, T>>> {
        self.host.try_borrow().map_err(|_| {
            RuntimeError::transfer(operation, format!("host view of {} is mutably borrowed", self.label))
        })
    }

    fn host_ref_mut(&self, operation: &'static str) -> Result<RefMut<'_, HostStorage<'a, T>>> {
        self.host.try_borrow_mut().map_err(|_| {
            RuntimeError::transfer(operation, format!("host view of {} is borrowed", self.label))
        })
    }
}

/// Bytes needed for `len` elements of `T`, checked against the primary
/// device's maximum buffer size.
fn byte_size<T>(ctx: &Context, len: usize) -> Result<u64> {
    let max = ctx.primary().limits().max_buffer_size;
    checked_size(len, size_of::<T>(), max)
}

fn checked_size(len: usize, element: usize, max: u64) -> Result<u64> {
    let size = len
        .checked_mul(element)
        .and_then(|size| u64::try_from(size).ok())
        .filter(|&size| size <= max);
    size.ok_or_else(|| {
        RuntimeError::Size(format!(
            "{len} elements of {element} bytes exceed the device maximum of {max} bytes"
        ))
    })
}

impl<T: Pod> MemoryObject for Buffer<'_, T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn access(&self) -> AccessMode {
        self.access
    }

    fn size(&self) -> u64 {
        Buffer::size(self)
    }

    fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    fn with_host_bytes(&self, f: &mut dyn FnMut(&[u8])) -> Result<()> {
        let host = self.host_ref("write")?;
        f(bytemuck::cast_slice(host.as_slice()));
        Ok(())
    }

    fn store_host_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut host = self.host_ref_mut("read")?;
        let target: &mut [u8] = bytemuck::cast_slice_mut(host.as_mut_slice());
        if target.len() != bytes.len() {
            return Err(RuntimeError::transfer(
                "read",
                format!("expected {} bytes, got {}", target.len(), bytes.len()),
            ));
        }
        target.copy_from_slice(bytes);
        Ok(())
    }
}

impl<T: Pod> fmt::Debug for Buffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.label)
            .field("len", &self.len)
            .field("access", &self.access)
            .finish()
    }
}

impl<T: Pod> Drop for Buffer<'_, T> {
    fn drop(&mut self) {
        tracing::debug!(label = %self.label, "released buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_strict() {
        let mut storage = HostStorage::Owned(vec![1i32, 2, 3, 4]);

        assert_eq!(storage.get(3).unwrap(), 4);
        assert!(matches!(
            storage.get(4),
            Err(RuntimeError::OutOfRange {
                what: "buffer",
                index: 4,
                bound: 4
            })
        ));

        storage.set(3, 40).unwrap();
        assert_eq!(storage.as_slice(), &[1, 2, 3, 40]);
        assert!(storage.set(4, 50).is_err());
    }

    #[test]
    fn test_borrowed_storage_writes_through() {
        let mut data = [0u32; 4];
        {
            let mut storage = HostStorage::Borrowed(&mut data);
            assert!(storage.is_borrowed());
            storage.set(0, 7).unwrap();
            storage.as_mut_slice()[3] = 9;
        }
        assert_eq!(data, [7, 0, 0, 9]);
    }

    #[test]
    fn test_empty_storage_rejects_every_index() {
        let storage: HostStorage<'_, f32> = HostStorage::Owned(Vec::new());
        assert!(storage.is_empty());
        assert!(storage.get(0).is_err());
    }

    #[test]
    fn test_checked_size() {
        assert_eq!(checked_size(4, 4, 16).unwrap(), 16);
        assert!(matches!(checked_size(5, 4, 16), Err(RuntimeError::Size(_))));
        assert!(matches!(
            checked_size(usize::MAX, 4, u64::MAX),
            Err(RuntimeError::Size(_))
        ));
    }

    #[test]
    fn test_access_mode_usages() {
        assert!(!AccessMode::ReadOnly.usage().contains(wgpu::BufferUsages::COPY_SRC));
        assert!(AccessMode::WriteOnly.usage().contains(wgpu::BufferUsages::COPY_SRC));
        assert!(AccessMode::ReadWrite.usage().contains(wgpu::BufferUsages::STORAGE));
        assert!(!AccessMode::ReadOnly.kernel_writable());
        assert!(AccessMode::WriteOnly.kernel_writable());
    }
}
