//! GPU buffer management.
//!
//! [`Buffer`] is a linear allocator over a host-mirrored GPU buffer. A frame
//! maps it (head back to zero), pushes data sequentially at the alignment each
//! element needs, then unmaps it, which uploads `[0, head)` to the backend.
//!
//! # Example
//!
//! ```
//! use glam::Mat4;
//! use prism_rhi::HeadlessDevice;
//! use prism_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example() -> Result<(), prism_rhi::RhiError> {
//! let mut device = HeadlessDevice::new();
//! let mut buffer = Buffer::new(&mut device, 256, BufferUsage::Uniform)?;
//!
//! buffer.map()?;
//! let offset = buffer.push_mat4(&Mat4::IDENTITY)?;
//! buffer.unmap(&mut device)?;
//!
//! assert_eq!(offset, 0);
//! assert_eq!(buffer.head(), 64);
//! # Ok(())
//! # }
//! ```

use bytemuck::Pod;
use glam::{Mat4, Vec3, Vec4};
use tracing::debug;

use crate::device::{BufferHandle, GraphicsDevice};
use crate::error::{RhiError, RhiResult};

/// Alignment of vec3/vec4/mat4 members inside a std140 uniform block.
pub const STD140_VEC4_ALIGNMENT: u32 = 16;

/// Buffer usage type.
///
/// Defines the binding target the buffer is created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - stores shader uniform blocks
    Uniform,
}

impl BufferUsage {
    /// Converts to the GL binding target.
    pub fn to_gl_target(self) -> u32 {
        match self {
            BufferUsage::Vertex => glow::ARRAY_BUFFER,
            BufferUsage::Index => glow::ELEMENT_ARRAY_BUFFER,
            BufferUsage::Uniform => glow::UNIFORM_BUFFER,
        }
    }

    /// Returns the GL usage hint.
    pub fn to_gl_usage(self) -> u32 {
        match self {
            // Rewritten every frame
            BufferUsage::Uniform => glow::DYNAMIC_DRAW,
            BufferUsage::Vertex | BufferUsage::Index => glow::STATIC_DRAW,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
        }
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two.
#[inline]
pub const fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Host-mirrored GPU buffer with a write head.
///
/// Invariant: `head <= size`. Writes past capacity fail with
/// [`RhiError::BufferOverflow`] and leave the head where it was.
pub struct Buffer {
    handle: BufferHandle,
    usage: BufferUsage,
    size: u32,
    head: u32,
    staging: Vec<u8>,
    mapped: bool,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or the backend refuses the allocation.
    pub fn new(device: &mut dyn GraphicsDevice, size: u32, usage: BufferUsage) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidArgument(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let handle = device.create_buffer(usage, size)?;
        debug!("Created {} buffer {}: {} bytes", usage.name(), handle, size);

        Ok(Self {
            handle,
            usage,
            size,
            head: 0,
            staging: vec![0; size as usize],
            mapped: false,
        })
    }

    /// Creates a buffer sized exactly for `data` and uploads it.
    pub fn new_with_data(
        device: &mut dyn GraphicsDevice,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let mut buffer = Self::new(device, data.len() as u32, usage)?;
        buffer.map()?;
        buffer.push_bytes(data)?;
        buffer.unmap(device)?;
        Ok(buffer)
    }

    /// Opens the write window and resets the head to zero.
    pub fn map(&mut self) -> RhiResult<()> {
        if self.mapped {
            return Err(RhiError::BufferAlreadyMapped);
        }
        self.mapped = true;
        self.head = 0;
        Ok(())
    }

    /// Closes the write window and uploads `[0, head)`.
    pub fn unmap(&mut self, device: &mut dyn GraphicsDevice) -> RhiResult<()> {
        if !self.mapped {
            return Err(RhiError::BufferNotMapped);
        }
        self.mapped = false;

        if self.head > 0 {
            device.write_buffer(
                self.handle,
                self.usage,
                0,
                &self.staging[..self.head as usize],
            )?;
        }
        Ok(())
    }

    /// Advances the head to the next multiple of `alignment`.
    ///
    /// Padding bytes are zeroed.
    pub fn align_head(&mut self, alignment: u32) -> RhiResult<()> {
        if !alignment.is_power_of_two() {
            return Err(RhiError::InvalidAlignment(alignment));
        }

        // Computed in u64 so heads near u32::MAX cannot wrap
        let mask = alignment as u64 - 1;
        let aligned = (self.head as u64 + mask) & !mask;
        if aligned > self.size as u64 {
            return Err(RhiError::BufferOverflow {
                end: aligned,
                capacity: self.size,
            });
        }

        let aligned = aligned as u32;
        self.staging[self.head as usize..aligned as usize].fill(0);
        self.head = aligned;
        Ok(())
    }

    /// Aligns the head, copies `data` there and advances past it.
    ///
    /// Returns the offset the data was written at. On overflow nothing is
    /// written and the head does not move.
    pub fn push_aligned(&mut self, data: &[u8], alignment: u32) -> RhiResult<u32> {
        if !self.mapped {
            return Err(RhiError::BufferNotMapped);
        }

        let previous = self.head;
        self.align_head(alignment)?;

        let start = self.head;
        let end = start as u64 + data.len() as u64;
        if end > self.size as u64 {
            self.head = previous;
            return Err(RhiError::BufferOverflow {
                end,
                capacity: self.size,
            });
        }

        self.staging[start as usize..end as usize].copy_from_slice(data);
        self.head = end as u32;
        Ok(start)
    }

    /// Pushes raw bytes with no alignment.
    pub fn push_bytes(&mut self, data: &[u8]) -> RhiResult<u32> {
        self.push_aligned(data, 1)
    }

    /// Pushes any plain-old-data value.
    pub fn push_pod<T: Pod>(&mut self, value: &T, alignment: u32) -> RhiResult<u32> {
        self.push_aligned(bytemuck::bytes_of(value), alignment)
    }

    pub fn push_u32(&mut self, value: u32) -> RhiResult<u32> {
        self.push_pod(&value, 4)
    }

    pub fn push_f32(&mut self, value: f32) -> RhiResult<u32> {
        self.push_pod(&value, 4)
    }

    /// Pushes a vec3 on a 16-byte boundary (12 bytes written).
    pub fn push_vec3(&mut self, value: Vec3) -> RhiResult<u32> {
        self.push_pod(&value.to_array(), STD140_VEC4_ALIGNMENT)
    }

    pub fn push_vec4(&mut self, value: Vec4) -> RhiResult<u32> {
        self.push_pod(&value.to_array(), STD140_VEC4_ALIGNMENT)
    }

    /// Pushes a column-major mat4 on a 16-byte boundary.
    pub fn push_mat4(&mut self, value: &Mat4) -> RhiResult<u32> {
        self.push_pod(&value.to_cols_array(), STD140_VEC4_ALIGNMENT)
    }

    /// Replaces the backend buffer with a new one of `size` bytes.
    ///
    /// The buffer must be unmapped. Contents are discarded.
    pub fn recreate(&mut self, device: &mut dyn GraphicsDevice, size: u32) -> RhiResult<()> {
        if self.mapped {
            return Err(RhiError::BufferAlreadyMapped);
        }
        if size == 0 {
            return Err(RhiError::InvalidArgument(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let handle = device.create_buffer(self.usage, size)?;
        device.destroy_buffer(self.handle);
        debug!(
            "Recreated {} buffer {} -> {}: {} -> {} bytes",
            self.usage.name(),
            self.handle,
            handle,
            self.size,
            size
        );

        self.handle = handle;
        self.size = size;
        self.head = 0;
        self.staging = vec![0; size as usize];
        Ok(())
    }

    /// Binds `[offset, offset + size)` to a uniform block binding point.
    pub fn bind_uniform_range(
        &self,
        device: &mut dyn GraphicsDevice,
        binding: u32,
        offset: u32,
        size: u32,
    ) -> RhiResult<()> {
        if self.usage != BufferUsage::Uniform {
            return Err(RhiError::InvalidArgument(format!(
                "Cannot bind {} buffer as a uniform range",
                self.usage.name()
            )));
        }
        if offset as u64 + size as u64 > self.size as u64 {
            return Err(RhiError::BufferOverflow {
                end: offset as u64 + size as u64,
                capacity: self.size,
            });
        }
        device.bind_uniform_range(binding, self.handle, offset, size);
        Ok(())
    }

    /// Releases the backend buffer. Safe to call twice.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if self.handle.is_null() {
            return;
        }
        device.destroy_buffer(self.handle);
        debug!("Destroyed {} buffer {}", self.usage.name(), self.handle);
        self.handle = BufferHandle::NULL;
        self.mapped = false;
        self.head = 0;
    }

    /// Returns the backend handle.
    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the current write head.
    #[inline]
    pub fn head(&self) -> u32 {
        self.head
    }

    /// Bytes left between the head and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.size - self.head
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Host copy of `[0, head)`.
    pub fn written(&self) -> &[u8] {
        &self.staging[..self.head as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessDevice;

    fn uniform_buffer(device: &mut HeadlessDevice, size: u32) -> Buffer {
        Buffer::new(device, size, BufferUsage::Uniform).unwrap()
    }

    #[test]
    fn test_buffer_usage_to_gl() {
        assert_eq!(BufferUsage::Vertex.to_gl_target(), glow::ARRAY_BUFFER);
        assert_eq!(BufferUsage::Index.to_gl_target(), glow::ELEMENT_ARRAY_BUFFER);
        assert_eq!(BufferUsage::Uniform.to_gl_target(), glow::UNIFORM_BUFFER);
        assert_eq!(BufferUsage::Uniform.to_gl_usage(), glow::DYNAMIC_DRAW);
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
    }

    #[test]
    fn test_align_up() {
        for alignment in [1u32, 2, 4, 16, 256] {
            for value in 0..600u32 {
                let aligned = align_up(value, alignment);
                assert_eq!(aligned % alignment, 0);
                assert!(aligned >= value);
                assert!(aligned - value < alignment);
                assert_eq!(align_up(aligned, alignment), aligned);
            }
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut device = HeadlessDevice::new();
        assert!(Buffer::new(&mut device, 0, BufferUsage::Uniform).is_err());
    }

    #[test]
    fn test_two_mat4_pushes_end_at_128() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 256);

        buffer.map().unwrap();
        let first = buffer.push_aligned(&[1u8; 64], 16).unwrap();
        let second = buffer.push_aligned(&[2u8; 64], 16).unwrap();
        buffer.unmap(&mut device).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 64);
        assert_eq!(buffer.head(), 128);

        let uploaded = device.buffer_contents(buffer.handle()).unwrap();
        assert!(uploaded[..64].iter().all(|&b| b == 1));
        assert!(uploaded[64..128].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_align_head_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);

        buffer.map().unwrap();
        buffer.push_bytes(&[7u8; 5]).unwrap();
        buffer.align_head(16).unwrap();
        assert_eq!(buffer.head(), 16);
        buffer.align_head(16).unwrap();
        assert_eq!(buffer.head(), 16);
        assert!(buffer.written()[5..16].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_align_head_rejects_non_power_of_two() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);
        buffer.map().unwrap();
        assert!(matches!(
            buffer.align_head(12),
            Err(RhiError::InvalidAlignment(12))
        ));
        assert!(matches!(
            buffer.align_head(0),
            Err(RhiError::InvalidAlignment(0))
        ));
    }

    #[test]
    fn test_align_head_past_end_fails() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 20);
        buffer.map().unwrap();
        buffer.push_bytes(&[0u8; 17]).unwrap();
        assert!(matches!(
            buffer.align_head(16),
            Err(RhiError::BufferOverflow { end: 32, capacity: 20 })
        ));
        assert_eq!(buffer.head(), 17);
    }

    #[test]
    fn test_cumulative_pushes_past_capacity_fail() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 100);

        buffer.map().unwrap();
        buffer.push_aligned(&[0u8; 48], 16).unwrap();
        buffer.push_aligned(&[0u8; 64], 16).unwrap_err();
        // Failed push leaves the head where it was
        assert_eq!(buffer.head(), 48);
        buffer.push_aligned(&[0u8; 4], 4).unwrap();
        assert_eq!(buffer.head(), 52);
    }

    #[test]
    fn test_exact_fit_succeeds() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);
        buffer.map().unwrap();
        buffer.push_mat4(&Mat4::IDENTITY).unwrap();
        assert_eq!(buffer.remaining(), 0);
        assert!(buffer.push_bytes(&[1]).is_err());
    }

    #[test]
    fn test_typed_pushes_respect_std140() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 128);

        buffer.map().unwrap();
        assert_eq!(buffer.push_vec3(Vec3::ONE).unwrap(), 0);
        assert_eq!(buffer.push_u32(3).unwrap(), 12);
        assert_eq!(buffer.push_vec3(Vec3::X).unwrap(), 16);
        assert_eq!(buffer.push_f32(1.0).unwrap(), 28);
        assert_eq!(buffer.push_vec4(Vec4::W).unwrap(), 32);
        assert_eq!(buffer.head(), 48);
    }

    #[test]
    fn test_map_misuse_is_an_error() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);

        assert!(matches!(
            buffer.push_u32(1),
            Err(RhiError::BufferNotMapped)
        ));
        assert!(matches!(
            buffer.unmap(&mut device),
            Err(RhiError::BufferNotMapped)
        ));
        buffer.map().unwrap();
        assert!(matches!(buffer.map(), Err(RhiError::BufferAlreadyMapped)));
    }

    #[test]
    fn test_map_resets_head() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);
        buffer.map().unwrap();
        buffer.push_u32(1).unwrap();
        buffer.unmap(&mut device).unwrap();
        buffer.map().unwrap();
        assert_eq!(buffer.head(), 0);
    }

    #[test]
    fn test_recreate() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);
        let old = buffer.handle();

        buffer.map().unwrap();
        assert!(buffer.recreate(&mut device, 128).is_err());
        buffer.unmap(&mut device).unwrap();

        buffer.recreate(&mut device, 128).unwrap();
        assert_ne!(buffer.handle(), old);
        assert_eq!(buffer.size(), 128);
        assert!(device.buffer_contents(old).is_none());
    }

    #[test]
    fn test_bind_uniform_range_checks_bounds() {
        let mut device = HeadlessDevice::new();
        let buffer = uniform_buffer(&mut device, 256);
        buffer.bind_uniform_range(&mut device, 1, 0, 192).unwrap();
        assert!(buffer.bind_uniform_range(&mut device, 1, 128, 192).is_err());
        assert_eq!(
            device.uniform_binding(1),
            Some((buffer.handle(), 0, 192))
        );
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut buffer = uniform_buffer(&mut device, 64);
        buffer.destroy(&mut device);
        buffer.destroy(&mut device);
        assert!(buffer.handle().is_null());
        assert_eq!(device.live_buffer_count(), 0);
    }
}
