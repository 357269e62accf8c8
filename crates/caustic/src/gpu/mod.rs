pub mod params;
pub mod readback;
pub mod surface;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// GPU error type for device setup, buffer operations and pass configuration
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("GPU device lost")]
    DeviceLost,
    #[error("buffer map failed: {0:?}")]
    BufferMapFailed(wgpu::BufferAsyncError),
    #[error("channel disconnected")]
    ChannelDisconnected,
    #[error("invalid pass configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported texture format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
}

/// Wait for a buffer map operation to complete, returning Result instead of panicking.
///
/// A disconnected channel means the map callback was dropped with the device,
/// so the lost flag is raised.
pub fn await_buffer_map(
    rx: std::sync::mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
    device_lost: &AtomicBool,
) -> Result<(), GpuError> {
    if device_lost.load(Ordering::SeqCst) {
        return Err(GpuError::DeviceLost);
    }
    match rx.recv() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("Buffer map failed: {:?}", e);
            Err(GpuError::BufferMapFailed(e))
        }
        Err(_) => {
            log::error!("Buffer map channel disconnected - possible device lost");
            device_lost.store(true, Ordering::SeqCst);
            Err(GpuError::ChannelDisconnected)
        }
    }
}

/// Headless device + queue that simulation ticks are submitted to.
///
/// Each tick is recorded into a single encoder and submitted once, so ticks
/// execute in submission order on the queue.
pub struct SimulationContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    device_lost: Arc<AtomicBool>,
}

impl SimulationContext {
    pub async fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!("Using GPU: {:?}", adapter_info);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Liquid Surface Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost = device_lost.clone();
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("GPU uncaptured error: {:?}", error);
            if matches!(error, wgpu::Error::OutOfMemory { .. }) {
                lost.store(true, Ordering::SeqCst);
            }
        }));

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            device_lost,
        })
    }

    /// Blocking wrapper around [`SimulationContext::new`].
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }

    pub fn device_lost_flag(&self) -> &AtomicBool {
        &self.device_lost
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Record one tick into a fresh encoder and submit it.
    pub fn submit_tick<F>(&self, label: &str, record: F) -> wgpu::SubmissionIndex
    where
        F: FnOnce(&mut wgpu::CommandEncoder),
    {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        record(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()))
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
