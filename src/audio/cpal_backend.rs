use super::backend::{
  AudioBackend, BlockCallback, ErrorCallback, InputDevice, InputSession, StreamRequest,
};
use super::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig, SupportedBufferSize};
use log::{debug, warn};

/// Capture through the platform's default cpal host
/// (CoreAudio, WASAPI, ALSA/PulseAudio).
#[derive(Default)]
pub struct CpalBackend;

impl CpalBackend {
  pub fn new() -> Self {
    Self
  }

  fn input_devices(host: &cpal::Host) -> Result<Vec<Device>, CaptureError> {
    host
      .input_devices()
      .map(|devices| devices.collect())
      .map_err(|e| CaptureError::DeviceQuery(e.to_string()))
  }

  fn resolve(host: &cpal::Host, device: Option<usize>) -> Result<Device, CaptureError> {
    match device {
      Some(index) => Self::input_devices(host)?
        .into_iter()
        .nth(index)
        .ok_or_else(|| CaptureError::StreamOpen(format!("input device #{} disappeared", index))),
      None => host
        .default_input_device()
        .ok_or_else(|| CaptureError::StreamOpen("no default input device".to_string())),
    }
  }

  fn display_name(device: &Device) -> Option<String> {
    device
      .description()
      .ok()
      .map(|description| description.name().to_string())
  }

  fn channel_capacity(device: &Device) -> u16 {
    device
      .supported_input_configs()
      .ok()
      .and_then(|configs| configs.map(|config| config.channels()).max())
      .unwrap_or(0)
  }

  /// Ask for the exact block size when the device advertises it, otherwise
  /// let the audio server pick and rely on re-chunking downstream
  fn buffer_size(device: &Device, request: &StreamRequest) -> BufferSize {
    let fixed_supported = device
      .supported_input_configs()
      .map(|mut configs| {
        configs.any(|config| {
          config.channels() == request.channels
            && config.min_sample_rate() <= request.sample_rate
            && config.max_sample_rate() >= request.sample_rate
            && matches!(
              config.buffer_size(),
              SupportedBufferSize::Range { min, max }
                if *min <= request.block_size && request.block_size <= *max
            )
        })
      })
      .unwrap_or(false);

    if fixed_supported {
      BufferSize::Fixed(request.block_size)
    } else {
      warn!(
        "device does not advertise a {} sample block size, using the default buffer size",
        request.block_size
      );
      BufferSize::Default
    }
  }
}

impl AudioBackend for CpalBackend {
  fn list_input_devices(&self) -> Result<Vec<InputDevice>, CaptureError> {
    let host = cpal::default_host();
    let devices = Self::input_devices(&host)?;

    Ok(
      devices
        .iter()
        .enumerate()
        .map(|(index, device)| InputDevice {
          index,
          name: Self::display_name(device).unwrap_or_else(|| format!("input #{}", index)),
          max_input_channels: Self::channel_capacity(device),
        })
        .collect(),
    )
  }

  fn device_name(&self, device: Option<usize>) -> Option<String> {
    let host = cpal::default_host();
    Self::resolve(&host, device)
      .ok()
      .and_then(|device| Self::display_name(&device))
  }

  fn max_input_channels(&self, device: Option<usize>) -> Option<u16> {
    let host = cpal::default_host();
    Self::resolve(&host, device)
      .ok()
      .map(|device| Self::channel_capacity(&device))
      .filter(|&channels| channels > 0)
  }

  fn open_input_stream(
    &self,
    request: &StreamRequest,
    mut on_block: BlockCallback,
    mut on_error: ErrorCallback,
  ) -> Result<Box<dyn InputSession>, CaptureError> {
    let host = cpal::default_host();
    let device = Self::resolve(&host, request.device)?;

    let config = StreamConfig {
      channels: request.channels,
      sample_rate: request.sample_rate,
      buffer_size: Self::buffer_size(&device, request),
    };
    debug!("building input stream with {:?}", config);

    let data_callback = move |data: &[f32], _: &cpal::InputCallbackInfo| {
      on_block(data);
    };

    let error_callback = move |err: cpal::StreamError| {
      on_error(err.to_string());
    };

    let stream = device
      .build_input_stream(&config, data_callback, error_callback, None)
      .map_err(|e| CaptureError::StreamOpen(e.to_string()))?;

    stream
      .play()
      .map_err(|e| CaptureError::StreamOpen(e.to_string()))?;

    Ok(Box::new(CpalSession { stream }))
  }
}

struct CpalSession {
  stream: Stream,
}

impl InputSession for CpalSession {
  fn close(self: Box<Self>) {
    if let Err(e) = self.stream.pause() {
      debug!("pausing input stream on close: {}", e);
    }
    // dropping the stream joins cpal's callback thread
    drop(self.stream);
  }
}
