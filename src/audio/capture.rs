use super::backend::{select_input_device, AudioBackend, DeviceSelector, StreamRequest};
use super::handoff::FrameQueue;
use super::{downmix, AudioFrame, CaptureError};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Marker matched against device names when no device is configured
pub const DEFAULT_DEVICE_MARKER: &str = "blackhole";

/// What the capture thread should open
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
  pub sample_rate: u32,
  /// Samples per published frame, also requested as the device block size
  pub chunk_size: usize,
  /// Channels requested from the device before downmixing
  pub channels: u16,
  pub device: Option<DeviceSelector>,
  pub device_marker: String,
}

impl Default for CaptureRequest {
  fn default() -> Self {
    Self {
      sample_rate: 48_000,
      chunk_size: 8192,
      channels: 2,
      device: None,
      device_marker: DEFAULT_DEVICE_MARKER.to_string(),
    }
  }
}

enum Control {
  Stop,
  Failed(String),
}

/// State shared between the bridge and its capture thread
#[derive(Default)]
struct CaptureStatus {
  failed: AtomicBool,
  error: Mutex<Option<CaptureError>>,
}

impl CaptureStatus {
  fn fail(&self, err: CaptureError) {
    if let Ok(mut slot) = self.error.lock() {
      slot.get_or_insert(err);
    }
    self.failed.store(true, Ordering::Release);
  }
}

/// Owns the live input session on a dedicated capture thread.
///
/// The stream is opened, driven and closed entirely on that thread; the only
/// thing that leaves it is [`AudioFrame`]s pushed into the shared
/// [`FrameQueue`].
pub struct CaptureBridge {
  control: Sender<Control>,
  thread: Option<JoinHandle<()>>,
  status: Arc<CaptureStatus>,
  device_name: String,
}

impl CaptureBridge {
  /// Open the input stream and start publishing frames into `queue`.
  ///
  /// Blocks until the capture thread reports whether the stream opened.
  pub fn start(
    backend: Arc<dyn AudioBackend>,
    request: CaptureRequest,
    queue: Arc<FrameQueue>,
  ) -> Result<Self, CaptureError> {
    let (control_tx, control_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel();
    let status = Arc::new(CaptureStatus::default());

    let thread_control = control_tx.clone();
    let thread_status = status.clone();
    let thread = thread::Builder::new()
      .name("rta-capture".to_string())
      .spawn(move || {
        run_capture(
          backend.as_ref(),
          &request,
          queue,
          thread_control,
          control_rx,
          ready_tx,
          &thread_status,
        )
      })
      .map_err(|e| CaptureError::StreamOpen(format!("could not spawn capture thread: {}", e)))?;

    match ready_rx.recv() {
      Ok(Ok(device_name)) => Ok(Self {
        control: control_tx,
        thread: Some(thread),
        status,
        device_name,
      }),
      Ok(Err(e)) => {
        let _ = thread.join();
        Err(e)
      }
      Err(_) => {
        let _ = thread.join();
        Err(CaptureError::StreamOpen(
          "capture thread exited before the stream opened".to_string(),
        ))
      }
    }
  }

  pub fn device_name(&self) -> &str {
    &self.device_name
  }

  /// Whether the capture thread is still running
  pub fn is_alive(&self) -> bool {
    self
      .thread
      .as_ref()
      .is_some_and(|thread| !thread.is_finished())
  }

  /// Shared flag flipped when the stream fails, for watchers on other tasks
  pub fn failure_flag(&self) -> Arc<dyn FailureFlag> {
    self.status.clone()
  }

  /// Close the session and wait for the capture thread to exit.
  ///
  /// Returns the runtime error that ended the session early, if any. No
  /// frame is published after this returns.
  pub fn stop(mut self) -> Option<CaptureError> {
    self.shutdown();
    self.status.error.lock().ok().and_then(|mut slot| slot.take())
  }

  fn shutdown(&mut self) {
    let _ = self.control.send(Control::Stop);
    if let Some(thread) = self.thread.take() {
      if thread.join().is_err() {
        error!("capture thread panicked");
      }
    }
  }
}

impl Drop for CaptureBridge {
  fn drop(&mut self) {
    self.shutdown();
  }
}

/// Read-only view of a bridge's failure state
pub trait FailureFlag: Send + Sync {
  fn has_failed(&self) -> bool;
}

impl FailureFlag for CaptureStatus {
  fn has_failed(&self) -> bool {
    self.failed.load(Ordering::Acquire)
  }
}

fn run_capture(
  backend: &dyn AudioBackend,
  request: &CaptureRequest,
  queue: Arc<FrameQueue>,
  control_tx: Sender<Control>,
  control_rx: Receiver<Control>,
  ready_tx: Sender<Result<String, CaptureError>>,
  status: &CaptureStatus,
) {
  let (device, channels) = resolve_device(backend, request);
  let device_name = backend
    .device_name(device)
    .unwrap_or_else(|| "default input".to_string());

  let stream_request = StreamRequest {
    device,
    channels,
    sample_rate: request.sample_rate,
    block_size: request.chunk_size as u32,
  };

  let mut assembler = FrameAssembler::new(request.chunk_size);
  let channel_count = channels as usize;
  let on_block = Box::new(move |data: &[f32]| {
    assembler.push(data, channel_count, |frame| {
      queue.push(frame);
    });
  });

  let on_error = Box::new(move |message: String| {
    let _ = control_tx.send(Control::Failed(message));
  });

  let session = match backend.open_input_stream(&stream_request, on_block, on_error) {
    Ok(session) => session,
    Err(e) => {
      error!("could not open capture on {}: {}", device_name, e);
      let _ = ready_tx.send(Err(e));
      return;
    }
  };

  info!(
    "capture started on {}: {} Hz, {} channel(s), {} samples per frame",
    device_name, request.sample_rate, channels, request.chunk_size
  );
  let _ = ready_tx.send(Ok(device_name));

  loop {
    match control_rx.recv() {
      Ok(Control::Stop) | Err(_) => break,
      Ok(Control::Failed(message)) => {
        error!("capture stream error: {}", message);
        status.fail(CaptureError::StreamRuntime(message));
        break;
      }
    }
  }

  session.close();
  info!("capture stopped");
}

/// Pick a device index (or the default) and the channel count to request
fn resolve_device(backend: &dyn AudioBackend, request: &CaptureRequest) -> (Option<usize>, u16) {
  let device = match backend.list_input_devices() {
    Ok(devices) => {
      match select_input_device(&devices, request.device.as_ref(), &request.device_marker) {
        Ok(index) => Some(index),
        Err(e) => {
          warn!("{}; using the default input device", e);
          None
        }
      }
    }
    Err(e) => {
      warn!("{}; using the default input device", e);
      None
    }
  };

  let requested_channels = request.channels.max(1);
  let channels = match backend.max_input_channels(device) {
    Some(max_channels) if max_channels < requested_channels => {
      info!(
        "device supports {} input channel(s), requesting {} instead of {}",
        max_channels,
        max_channels.max(1),
        requested_channels
      );
      max_channels.max(1)
    }
    _ => requested_channels,
  };
  (device, channels)
}

/// Downmixes incoming blocks and cuts them into frames of exactly
/// `chunk_size` samples, whatever block size the device delivers.
struct FrameAssembler {
  chunk_size: usize,
  pending: Vec<f32>,
}

impl FrameAssembler {
  fn new(chunk_size: usize) -> Self {
    let chunk_size = chunk_size.max(1);
    Self {
      chunk_size,
      pending: Vec::with_capacity(chunk_size),
    }
  }

  fn push(&mut self, data: &[f32], channels: usize, mut publish: impl FnMut(AudioFrame)) {
    for sample in downmix(data, channels) {
      self.pending.push(sample);
      if self.pending.len() == self.chunk_size {
        let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
        publish(AudioFrame::from_mono(samples));
      }
    }
  }
}
