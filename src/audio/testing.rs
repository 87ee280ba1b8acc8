//! Scripted in-memory audio backend so capture and driver lifecycles can be
//! exercised without a sound device.

use super::backend::{
  AudioBackend, BlockCallback, ErrorCallback, InputDevice, InputSession, StreamRequest,
};
use super::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub enum FakeBehavior {
  /// Deliver silent blocks until closed
  Silent,
  /// Deliver blocks with fixed per-channel values
  Constant { left: f32, right: f32 },
  /// Deliver a sine at the given frequency (Hz)
  Sine(f32),
  /// Refuse to open the stream
  FailOpen,
  /// Report a stream error after this many blocks
  FailAfter(usize),
}

pub struct FakeBackend {
  behavior: FakeBehavior,
  session_open: Arc<AtomicBool>,
  last_request: Mutex<Option<StreamRequest>>,
}

impl FakeBackend {
  pub fn new(behavior: FakeBehavior) -> Self {
    Self {
      behavior,
      session_open: Arc::new(AtomicBool::new(false)),
      last_request: Mutex::new(None),
    }
  }

  pub fn session_open(&self) -> bool {
    self.session_open.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<StreamRequest> {
    self.last_request.lock().unwrap().clone()
  }

  fn devices() -> Vec<InputDevice> {
    vec![
      InputDevice {
        index: 0,
        name: "Built-in Microphone".to_string(),
        max_input_channels: 1,
      },
      InputDevice {
        index: 1,
        name: "BlackHole 2ch".to_string(),
        max_input_channels: 2,
      },
    ]
  }
}

impl AudioBackend for FakeBackend {
  fn list_input_devices(&self) -> Result<Vec<InputDevice>, CaptureError> {
    Ok(Self::devices())
  }

  fn device_name(&self, device: Option<usize>) -> Option<String> {
    let index = device.unwrap_or(0);
    Self::devices()
      .into_iter()
      .find(|d| d.index == index)
      .map(|d| d.name)
  }

  fn max_input_channels(&self, device: Option<usize>) -> Option<u16> {
    let index = device.unwrap_or(0);
    Self::devices()
      .into_iter()
      .find(|d| d.index == index)
      .map(|d| d.max_input_channels)
  }

  fn open_input_stream(
    &self,
    request: &StreamRequest,
    mut on_block: BlockCallback,
    mut on_error: ErrorCallback,
  ) -> Result<Box<dyn InputSession>, CaptureError> {
    *self.last_request.lock().unwrap() = Some(request.clone());

    if let FakeBehavior::FailOpen = self.behavior {
      return Err(CaptureError::StreamOpen("device busy".to_string()));
    }

    let behavior = self.behavior;
    let channels = request.channels.max(1) as usize;
    let frames = request.block_size.max(1) as usize;
    let sample_rate = request.sample_rate.max(1) as f32;
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = running.clone();
    let session_open = self.session_open.clone();
    session_open.store(true, Ordering::SeqCst);

    let thread = thread::spawn(move || {
      let mut block = vec![0.0f32; frames * channels];
      let mut delivered = 0usize;
      let mut phase = 0usize;

      while thread_running.load(Ordering::SeqCst) {
        match behavior {
          FakeBehavior::FailAfter(limit) if delivered >= limit => {
            on_error("device unplugged".to_string());
            break;
          }
          FakeBehavior::Constant { left, right } => {
            for frame in block.chunks_mut(channels) {
              frame[0] = left;
              if let Some(second) = frame.get_mut(1) {
                *second = right;
              }
            }
          }
          FakeBehavior::Sine(frequency) => {
            for frame in block.chunks_mut(channels) {
              let t = phase as f32 / sample_rate;
              frame.fill((2.0 * std::f32::consts::PI * frequency * t).sin());
              phase += 1;
            }
          }
          _ => {}
        }

        on_block(&block);
        delivered += 1;
        thread::sleep(Duration::from_millis(1));
      }
    });

    Ok(Box::new(FakeSession {
      running,
      session_open,
      thread: Some(thread),
    }))
  }
}

struct FakeSession {
  running: Arc<AtomicBool>,
  session_open: Arc<AtomicBool>,
  thread: Option<JoinHandle<()>>,
}

impl InputSession for FakeSession {
  fn close(mut self: Box<Self>) {
    self.running.store(false, Ordering::SeqCst);
    if let Some(thread) = self.thread.take() {
      let _ = thread.join();
    }
    self.session_open.store(false, Ordering::SeqCst);
  }
}
