use std::ops::{Deref, DerefMut};
use std::{any, mem, slice};

use bytemuck::Pod;
use log::info;

use super::Bindable;

#[derive(Debug)]
pub struct MappedUniformBuffer<T> {
    buffer: wgpu::Buffer,
    data: T,
    dirty: bool,
}

impl<T> MappedUniformBuffer<T>
where
    T: UniformBufferable,
{
    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, data: T) -> Self {
        let label = label.as_ref();
        let size = data.size();
        let padded_size = (size + 31) & !31;

        info!(
            "Allocating uniform buffer `{label}`; ty={}, size={padded_size} \
             (padded from {size})",
            any::type_name::<T>(),
        );

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM,
            size: padded_size as _,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            data,
            dirty: true,
        }
    }

    /// Uploads the host copy, if it's been modified since the last call.
    ///
    /// Returns whether anything got written.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> bool {
        if !mem::take(&mut self.dirty) {
            return false;
        }

        queue.write_buffer(&self.buffer, 0, self.data.data());

        true
    }
}

impl<T> Deref for MappedUniformBuffer<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for MappedUniformBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;

        &mut self.data
    }
}

impl<T> Bindable for MappedUniformBuffer<T> {
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT
                | wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let resource = self.buffer.as_entire_binding();

        vec![(layout, resource)]
    }
}

impl<T> Drop for MappedUniformBuffer<T> {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

pub trait UniformBufferable {
    fn size(&self) -> usize;
    fn data(&self) -> &[u8];
}

impl<T> UniformBufferable for T
where
    T: Pod,
{
    fn size(&self) -> usize {
        mem::size_of::<Self>()
    }

    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(slice::from_ref(self))
    }
}
