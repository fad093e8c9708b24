use std::sync::Arc;

use glam::Vec3;
use image::Rgba32FImage;
use pollster::FutureExt as _;
use wgpu::util::DeviceExt;
use wgpu::{Extent3d, ImageDataLayout, TextureAspect};

use super::{BakeBackend, FrameEncoder, FrameSample, TexturePair};
use crate::error::BakeError;

/// Must match `@workgroup_size` in vat_encode.wgsl.
const WORKGROUP_SIZE: u32 = 8;

const BYTES_PER_TEXEL: u32 = 16; // Rgba32Float

pub fn align_to_256(n: u32) -> u32 {
    (n + 255) & !255
}

/// Thread-group count for a dispatch covering `vertex_count` vertices,
/// rounded up to a whole multiple of the group size. The kernel bounds-checks
/// the padded remainder.
fn workgroups_for(vertex_count: u32) -> u32 {
    vertex_count.div_ceil(WORKGROUP_SIZE).next_multiple_of(WORKGROUP_SIZE)
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameParams {
    root_position: [f32; 3],
    row: u32,
    vertex_count: u32,
    _pad: [u32; 3],
}

/// wgpu implementation of [`BakeBackend`].
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Stand-alone device for offline baking, no surface attached.
    pub fn headless() -> Result<Self, BakeError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&Default::default())
            .block_on()
            .ok_or(BakeError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("VAT Bake Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .block_on()
            .map_err(|e| BakeError::DeviceRequest(e.to_string()))?;
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    fn create_output_texture(&self, label: &str, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn read_texture(&self, texture: &wgpu::Texture) -> Result<Rgba32FImage, BakeError> {
        let width = texture.width();
        let height = texture.height();
        let unpadded_bytes_per_row = width * BYTES_PER_TEXEL;
        let padded_bytes_per_row = align_to_256(unpadded_bytes_per_row);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("VAT Readback Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("VAT Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let texels = {
            let buffer_slice = buffer.slice(..);
            let (tx, rx) = crossbeam::channel::bounded(1);
            buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|e| BakeError::Readback(e.to_string()))?
                .map_err(|e| BakeError::Readback(e.to_string()))?;

            let data = buffer_slice.get_mapped_range();
            let mut texels =
                Vec::with_capacity((width * height * BYTES_PER_TEXEL / 4) as usize);
            for row in 0..height {
                let start = (row * padded_bytes_per_row) as usize;
                let end = start + unpadded_bytes_per_row as usize;
                texels.extend_from_slice(bytemuck::cast_slice::<u8, f32>(&data[start..end]));
            }
            texels
        };
        buffer.unmap();

        Rgba32FImage::from_raw(width, height, texels)
            .ok_or_else(|| BakeError::Readback("texel count mismatch".to_string()))
    }

    /// Collects validation and out-of-memory errors raised since
    /// [`Self::push_error_scopes`].
    fn push_error_scopes(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    }

    fn pop_error_scopes(&self) -> Result<(), BakeError> {
        self.device.poll(wgpu::Maintain::Wait);
        for _ in 0..2 {
            if let Some(e) = self.device.pop_error_scope().block_on() {
                return Err(BakeError::Gpu(e.to_string()));
            }
        }
        Ok(())
    }
}

impl BakeBackend for GpuBackend {
    type Encoder = GpuFrameEncoder;

    fn create_encoder(
        &self,
        reference: &[Vec3],
        frame_count: u32,
        label: &str,
    ) -> Result<GpuFrameEncoder, BakeError> {
        let width = reference.len() as u32;
        if width == 0 {
            return Err(BakeError::EmptyMesh);
        }
        self.push_error_scopes();

        let position_tex =
            self.create_output_texture(&format!("{label}_position"), width, frame_count);
        let normal_tex =
            self.create_output_texture(&format!("{label}_normals"), width, frame_count);

        // Uploaded once; every frame is encoded relative to this pose.
        let reference_buffer =
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("VAT Reference Positions"),
                    contents: bytemuck::cast_slice(reference),
                    usage: wgpu::BufferUsages::STORAGE,
                });

        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("VAT Frame Params"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("VAT Encode Bind Group Layout"),
                    entries: &[
                        storage_buffer_entry(0),
                        storage_buffer_entry(1),
                        storage_buffer_entry(2),
                        wgpu::BindGroupLayoutEntry {
                            binding: 3,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        storage_texture_entry(4),
                        storage_texture_entry(5),
                    ],
                });
        let pipeline_layout =
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("VAT Encode Pipeline Layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
        let shader_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("VAT Encode Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("vat_encode.wgsl").into()),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("VAT Encode Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: "cs_main",
            });

        let position_view = position_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let normal_view = normal_tex.create_view(&wgpu::TextureViewDescriptor::default());

        self.pop_error_scopes()?;

        Ok(GpuFrameEncoder {
            device: self.device.clone(),
            queue: self.queue.clone(),
            pipeline,
            bind_group_layout,
            reference_buffer,
            params_buffer,
            position_tex,
            normal_tex,
            position_view,
            normal_view,
            width,
            height: frame_count,
        })
    }

    fn finish(&self, encoder: GpuFrameEncoder) -> Result<TexturePair, BakeError> {
        // Read-back is only issued on the fully written textures; GPU writes
        // are not guaranteed visible before this point.
        let position = self.read_texture(&encoder.position_tex)?;
        let normal = self.read_texture(&encoder.normal_tex)?;
        Ok(TexturePair { position, normal })
    }
}

fn storage_buffer_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba32Float,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// Owns the reference-pose buffer and the destination textures for one clip.
/// Transient per-frame buffers live only inside [`FrameEncoder::encode`].
pub struct GpuFrameEncoder {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    reference_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    position_tex: wgpu::Texture,
    normal_tex: wgpu::Texture,
    position_view: wgpu::TextureView,
    normal_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl FrameEncoder for GpuFrameEncoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn encode(&mut self, frame: &FrameSample) -> Result<(), BakeError> {
        if frame.index >= self.height {
            return Err(BakeError::RowOutOfRange {
                row: frame.index,
                height: self.height,
            });
        }
        // The kernel's vertex count is locked at construction; a drifting
        // mesh is a fatal inconsistency, not something to re-dispatch around.
        if frame.positions.len() as u32 != self.width {
            return Err(BakeError::VertexCountMismatch {
                expected: self.width,
                got: frame.positions.len() as u32,
            });
        }
        if frame.normals.len() != frame.positions.len() {
            return Err(BakeError::VertexCountMismatch {
                expected: self.width,
                got: frame.normals.len() as u32,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let position_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("VAT Frame Positions"),
                contents: bytemuck::cast_slice(&frame.positions),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let normal_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("VAT Frame Normals"),
                contents: bytemuck::cast_slice(&frame.normals),
                usage: wgpu::BufferUsages::STORAGE,
            });
        self.queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::cast_slice(&[FrameParams {
                root_position: frame.root_position.to_array(),
                row: frame.index,
                vertex_count: self.width,
                _pad: [0; 3],
            }]),
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("VAT Encode Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.reference_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: normal_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.position_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&self.normal_view),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("VAT Encode Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("VAT Encode Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups_for(self.width), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        log::debug!("dispatched row {} ({} vertices)", frame.index, self.width);

        // The transient uploads must not outlive this call.
        position_buffer.destroy();
        normal_buffer.destroy();

        self.device.poll(wgpu::Maintain::Wait);
        for _ in 0..2 {
            if let Some(e) = self.device.pop_error_scope().block_on() {
                return Err(BakeError::Gpu(e.to_string()));
            }
        }
        Ok(())
    }
}

impl Drop for GpuFrameEncoder {
    fn drop(&mut self) {
        // Runs exactly once, on every exit path including abort.
        self.reference_buffer.destroy();
    }
}
