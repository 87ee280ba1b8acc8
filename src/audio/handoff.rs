use super::AudioFrame;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of frames buffered between capture and analysis
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded hand-off between the capture thread and the tick loop.
///
/// Pushing never blocks: when the queue is full the oldest frame is evicted
/// to make room, so the audio callback always keeps the freshest audio.
pub struct FrameQueue {
  frames: ArrayQueue<AudioFrame>,
  evicted: AtomicU64,
}

impl FrameQueue {
  pub fn new(capacity: usize) -> Self {
    Self {
      frames: ArrayQueue::new(capacity.max(1)),
      evicted: AtomicU64::new(0),
    }
  }

  /// Publish a frame, evicting the oldest one if the queue is full
  pub fn push(&self, frame: AudioFrame) -> Option<AudioFrame> {
    let evicted = self.frames.force_push(frame);
    if evicted.is_some() {
      self.evicted.fetch_add(1, Ordering::Relaxed);
    }
    evicted
  }

  /// Pop the oldest queued frame
  #[cfg(test)]
  pub fn pop(&self) -> Option<AudioFrame> {
    self.frames.pop()
  }

  /// Drain everything and keep only the most recently published frame
  pub fn take_latest(&self) -> Option<AudioFrame> {
    let mut latest = None;
    while let Some(frame) = self.frames.pop() {
      latest = Some(frame);
    }
    latest
  }

  /// Drop every queued frame
  pub fn clear(&self) {
    while self.frames.pop().is_some() {}
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.frames.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  #[allow(dead_code)]
  pub fn capacity(&self) -> usize {
    self.frames.capacity()
  }

  /// Number of frames dropped to make room since the queue was created
  pub fn evicted(&self) -> u64 {
    self.evicted.load(Ordering::Relaxed)
  }
}

impl Default for FrameQueue {
  fn default() -> Self {
    Self::new(DEFAULT_CAPACITY)
  }
}
