use std::ops::{Deref, DerefMut};
use std::{any, mem};

use bytemuck::Pod;
use log::{debug, info};

use super::Bindable;

/// Storage buffer that exists both on the host machine and the GPU.
///
/// The buffer is sized after the data it's created with, and it's destroyed
/// together with this object; uses [`DerefMut`] to track whether the host
/// copy has been modified since the last flush.
#[derive(Debug)]
pub struct MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    label: String,
    buffer: wgpu::Buffer,
    data: T,
    dirty: bool,
}

impl<T> MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    /// Storage bindings can't be empty, so zero-sized data still allocates
    /// this many bytes.
    const MIN_SIZE: usize = 16;

    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, data: T) -> Self {
        let label = label.as_ref();
        let size = data.data().len().max(Self::MIN_SIZE);
        let size = (size + 3) & !3;

        info!(
            "Allocating storage buffer `{label}`; ty={}, size={size}",
            any::type_name::<T>(),
        );

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            size: size as _,
            mapped_at_creation: false,
        });

        Self {
            label: label.to_owned(),
            buffer,
            data,
            dirty: true,
        }
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    /// Uploads the host copy, if it's been modified since the last call.
    ///
    /// Returns whether anything got written.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> bool {
        if !mem::take(&mut self.dirty) {
            return false;
        }

        let data = self.data.data();

        assert!(
            data.len() as u64 <= self.buffer.size(),
            "storage buffer `{}` outgrew its allocation",
            self.label,
        );

        queue.write_buffer(&self.buffer, 0, data);

        true
    }
}

impl<T> Deref for MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;

        &mut self.data
    }
}

impl<T> Bindable for MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT
                | wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let resource = self.buffer.as_entire_binding();

        vec![(layout, resource)]
    }
}

impl<T> Drop for MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    fn drop(&mut self) {
        debug!("Releasing storage buffer `{}`", self.label);

        self.buffer.destroy();
    }
}

pub trait StorageBufferable {
    fn data(&self) -> &[u8];
}

impl<T> StorageBufferable for Vec<T>
where
    T: Pod,
{
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(self)
    }
}
