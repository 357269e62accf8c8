//! Pass lifecycle and shared texture helpers.

use std::sync::Arc;

use crate::gpu::GpuError;

/// Workgroup edge length used by every surface compute shader.
pub(crate) const WORKGROUP_SIZE: u32 = 16;

/// Lifecycle of a pass's GPU resources.
///
/// Resources are allocated once, from `Unconfigured`. A failed allocation is
/// permanent; the pass stays inert until it is rebuilt.
#[derive(Debug)]
pub enum PassSlot<R> {
    Unconfigured,
    Ready(R),
    Failed(String),
}

impl<R> Default for PassSlot<R> {
    fn default() -> Self {
        PassSlot::Unconfigured
    }
}

impl<R> PassSlot<R> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PassSlot::Ready(_))
    }

    pub fn resources(&self) -> Option<&R> {
        match self {
            PassSlot::Ready(r) => Some(r),
            _ => None,
        }
    }

    pub fn resources_mut(&mut self) -> Option<&mut R> {
        match self {
            PassSlot::Ready(r) => Some(r),
            _ => None,
        }
    }

    /// Failure reason, if allocation failed.
    pub fn failure(&self) -> Option<&str> {
        match self {
            PassSlot::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            PassSlot::Unconfigured => "unconfigured",
            PassSlot::Ready(_) => "ready",
            PassSlot::Failed(_) => "failed",
        }
    }

    /// Run `allocate` inside validation and out-of-memory error scopes.
    ///
    /// Only runs from `Unconfigured`; returns whether an allocation was
    /// attempted.
    pub(crate) fn init_with<F>(&mut self, device: &wgpu::Device, pass: &str, allocate: F) -> bool
    where
        F: FnOnce() -> Result<R, GpuError>,
    {
        if !matches!(self, PassSlot::Unconfigured) {
            log::debug!("{pass}: init_pass ignored, pass is {}", self.state_name());
            return false;
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = allocate();
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());

        let captured = validation.or(out_of_memory);
        *self = match (result, captured) {
            (Ok(resources), None) => {
                log::info!("{pass}: resources allocated");
                PassSlot::Ready(resources)
            }
            (_, Some(error)) => {
                log::error!("{pass}: allocation failed: {error}");
                PassSlot::Failed(error.to_string())
            }
            (Err(error), None) => {
                log::error!("{pass}: allocation failed: {error}");
                PassSlot::Failed(error.to_string())
            }
        };
        true
    }
}

pub(crate) fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Fail early with a readable reason instead of a driver validation message.
pub(crate) fn check_resolution(device: &wgpu::Device, width: u32, height: u32) -> Result<(), GpuError> {
    let max = device.limits().max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(GpuError::InvalidConfig(format!(
            "resolution {width}x{height} outside 1..={max}"
        )));
    }
    Ok(())
}

pub(crate) fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Sampled float texture read with `textureLoad` or a sampler.
pub(crate) fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

pub(crate) fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::BindGroupLayout,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: shader,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

pub(crate) fn dispatch_2d(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    width: u32,
    height: u32,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE), 1);
}

/// Copy a whole texture into another of the same size and format.
pub(crate) fn copy_texture(encoder: &mut wgpu::CommandEncoder, src: &wgpu::Texture, dst: &wgpu::Texture) {
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: src,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyTexture {
            texture: dst,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        extent(src.width(), src.height()),
    );
}

/// Whether `texture` can be copied from as a pass input of the given shape.
pub(crate) fn matches_input(texture: &wgpu::Texture, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
    texture.width() == width
        && texture.height() == height
        && texture.format() == format
        && texture.usage().contains(wgpu::TextureUsages::COPY_SRC)
}

/// Keep a debug target only when the pass output can be copied into it.
pub(crate) fn accept_debug_target(
    pass: &str,
    target: Option<Arc<wgpu::Texture>>,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> Option<Arc<wgpu::Texture>> {
    let target = target?;
    let compatible = target.width() == width
        && target.height() == height
        && target.format() == format
        && target.usage().contains(wgpu::TextureUsages::COPY_DST);
    if compatible {
        Some(target)
    } else {
        log::warn!(
            "{pass}: debug target ignored, expected {width}x{height} {format:?} with COPY_DST, got {}x{} {:?} {:?}",
            target.width(),
            target.height(),
            target.format(),
            target.usage()
        );
        None
    }
}

/// Full-range write of `values` into a single-channel float texture.
pub(crate) fn write_r32_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, values: &[f32]) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(values),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(texture.width() * 4),
            rows_per_image: Some(texture.height()),
        },
        extent(texture.width(), texture.height()),
    );
}
