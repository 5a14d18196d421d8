// src/wgpu_utils/uniform_buffer.rs - per-draw uniforms behind dynamic offsets
use std::marker::PhantomData;

/// Uniform buffer holding many `Content` blocks, addressed by dynamic offset.
///
/// Blocks are pushed on the CPU during a frame and uploaded in one write
/// before submission. The buffer grows (and its bind group is rebuilt) when
/// a frame pushes more blocks than it can hold.
pub struct DynamicUniformBuffer<Content> {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    content_type: PhantomData<Content>,
    staging: Vec<u8>,
    previous_upload: Vec<u8>,
    stride: u64,
    capacity: u64,
}

impl<Content: bytemuck::Pod> DynamicUniformBuffer<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        let pos = type_name.rfind(':').unwrap_or(0);
        if pos > 0 {
            &type_name[(pos + 1)..]
        } else {
            type_name
        }
    }

    /// Byte size of one block as seen by the shader.
    pub fn binding_size() -> wgpu::BufferSize {
        wgpu::BufferSize::new(std::mem::size_of::<Content>() as u64)
            .unwrap_or(wgpu::BufferSize::MIN)
    }

    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = wgpu::util::align_to(std::mem::size_of::<Content>() as u64, alignment);
        let capacity = capacity.max(1);
        let (buffer, bind_group) = Self::allocate(device, layout, stride * capacity);

        Self {
            buffer,
            bind_group,
            content_type: PhantomData,
            staging: Vec::new(),
            previous_upload: Vec::new(),
            stride,
            capacity,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        size: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("DynamicUniformBuffer: {}", Self::name())),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("DynamicUniformBindGroup: {}", Self::name())),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: Some(Self::binding_size()),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Appends a block and returns its dynamic offset.
    pub fn push(&mut self, content: &Content) -> u32 {
        let offset = self.staging.len() as u64;
        self.staging.extend_from_slice(bytemuck::bytes_of(content));
        self.staging.resize((offset + self.stride) as usize, 0);
        offset as u32
    }

    /// Forgets blocks pushed for a frame that will not be submitted.
    pub fn discard(&mut self) {
        self.staging.clear();
    }

    pub fn pending_blocks(&self) -> u64 {
        self.staging.len() as u64 / self.stride
    }

    /// Uploads this frame's blocks (skipping identical frames) and resets
    /// the staging area.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) {
        let needed = self.pending_blocks();
        if needed > self.capacity {
            let capacity = needed.next_power_of_two();
            log::debug!(
                "growing {} uniform buffer from {} to {} blocks",
                Self::name(),
                self.capacity,
                capacity
            );
            let (buffer, bind_group) = Self::allocate(device, layout, self.stride * capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
            self.previous_upload.clear();
        }

        if !self.staging.is_empty() && self.staging != self.previous_upload {
            queue.write_buffer(&self.buffer, 0, &self.staging);
            std::mem::swap(&mut self.previous_upload, &mut self.staging);
        }
        self.staging.clear();
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}
