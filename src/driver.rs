use crate::audio::{
  AudioBackend, CaptureBridge, CaptureRequest, FailureFlag, FrameQueue, SpectrumAnalyzer,
};
use crate::sink::RenderSink;
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Everything the driver needs to (re)start a capture session
#[derive(Clone, Debug, PartialEq)]
pub struct DriverSettings {
  pub capture: CaptureRequest,
  pub tick_rate: Duration,
  pub peak_decay: f32,
  pub queue_capacity: usize,
}

impl Default for DriverSettings {
  fn default() -> Self {
    Self {
      capture: CaptureRequest::default(),
      tick_rate: Duration::from_millis(16),
      peak_decay: crate::audio::DEFAULT_PEAK_DECAY,
      queue_capacity: crate::audio::DEFAULT_QUEUE_CAPACITY,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
  Stopped,
  Running,
}

/// One tick's worth of work: take the freshest frame, analyze, render.
struct TickPipeline {
  analyzer: SpectrumAnalyzer,
  sink: Arc<dyn RenderSink>,
  rendered: u64,
  skipped: u64,
}

impl TickPipeline {
  fn new(analyzer: SpectrumAnalyzer, sink: Arc<dyn RenderSink>) -> Self {
    Self {
      analyzer,
      sink,
      rendered: 0,
      skipped: 0,
    }
  }

  /// Returns false when no frame arrived since the previous tick
  fn tick(&mut self, queue: &FrameQueue) -> bool {
    let Some(frame) = queue.take_latest() else {
      self.skipped += 1;
      return false;
    };

    let reading = self.analyzer.analyze(&frame);
    self.sink.render(
      self.analyzer.center_frequencies(),
      &reading.levels,
      &reading.peaks,
    );
    self.rendered += 1;
    true
  }
}

struct RunningSession {
  bridge: CaptureBridge,
  queue: Arc<FrameQueue>,
  shutdown: oneshot::Sender<()>,
  ticks: JoinHandle<SpectrumAnalyzer>,
}

/// Runs the fixed-rate analysis loop on top of a capture session.
///
/// Start opens the capture bridge and then spawns the tick task. Stop halts
/// the tick task first, then closes the bridge, so no tick ever runs against
/// a closing session. The analyzer (and its peak-hold) outlives individual
/// sessions.
pub struct PresentationDriver {
  settings: DriverSettings,
  backend: Arc<dyn AudioBackend>,
  sink: Arc<dyn RenderSink>,
  analyzer: Option<SpectrumAnalyzer>,
  session: Option<RunningSession>,
  device_name: Option<String>,
  last_error: Option<String>,
}

impl PresentationDriver {
  pub fn new(
    settings: DriverSettings,
    backend: Arc<dyn AudioBackend>,
    sink: Arc<dyn RenderSink>,
  ) -> Self {
    let analyzer = SpectrumAnalyzer::with_decay(
      settings.capture.sample_rate,
      settings.capture.chunk_size,
      settings.peak_decay,
    );

    Self {
      settings,
      backend,
      sink,
      analyzer: Some(analyzer),
      session: None,
      device_name: None,
      last_error: None,
    }
  }

  pub fn state(&self) -> DriverState {
    if self.session.is_some() {
      DriverState::Running
    } else {
      DriverState::Stopped
    }
  }

  /// Message of the error that last stopped (or prevented) a session
  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// Name of the device of the current or most recent session
  pub fn device_name(&self) -> Option<&str> {
    self.device_name.as_deref()
  }

  pub async fn start(&mut self) -> Result<()> {
    if self.session.is_some() {
      return Ok(());
    }

    let queue = Arc::new(FrameQueue::new(self.settings.queue_capacity));
    let backend = self.backend.clone();
    let request = self.settings.capture.clone();
    let bridge_queue = queue.clone();

    let opened =
      tokio::task::spawn_blocking(move || CaptureBridge::start(backend, request, bridge_queue))
        .await?;

    let bridge = match opened {
      Ok(bridge) => bridge,
      Err(e) => {
        self.last_error = Some(e.to_string());
        return Err(anyhow!(e));
      }
    };

    self.last_error = None;
    self.device_name = Some(bridge.device_name().to_string());

    let analyzer = match self.analyzer.take() {
      Some(analyzer) => analyzer,
      None => self.build_analyzer(),
    };
    let pipeline = TickPipeline::new(analyzer, self.sink.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let ticks = tokio::spawn(run_ticks(
      pipeline,
      queue.clone(),
      bridge.failure_flag(),
      self.settings.tick_rate,
      shutdown_rx,
    ));

    info!(
      "analyzer running on {} every {} ms",
      bridge.device_name(),
      self.settings.tick_rate.as_millis()
    );

    self.session = Some(RunningSession {
      bridge,
      queue,
      shutdown: shutdown_tx,
      ticks,
    });
    Ok(())
  }

  /// Halt the tick loop, then close the capture session and wait for it.
  pub async fn stop(&mut self) -> Result<()> {
    let Some(session) = self.session.take() else {
      return Ok(());
    };

    let _ = session.shutdown.send(());
    match session.ticks.await {
      Ok(analyzer) => self.analyzer = Some(analyzer),
      Err(e) => error!("tick loop ended abnormally: {}", e),
    }

    let bridge = session.bridge;
    let runtime_error = tokio::task::spawn_blocking(move || bridge.stop()).await?;
    session.queue.clear();

    if let Some(e) = runtime_error {
      self.last_error = Some(e.to_string());
    }
    info!("analyzer stopped");
    Ok(())
  }

  pub async fn toggle(&mut self) -> Result<()> {
    match self.state() {
      DriverState::Running => self.stop().await,
      DriverState::Stopped => self.start().await,
    }
  }

  /// Notice a session that ended on its own (capture failure) and finish
  /// tearing it down.
  pub async fn refresh(&mut self) -> Result<DriverState> {
    let finished = self
      .session
      .as_ref()
      .is_some_and(|session| session.ticks.is_finished() || !session.bridge.is_alive());
    if finished {
      warn!("capture session ended unexpectedly");
      self.stop().await?;
    }
    Ok(self.state())
  }

  fn build_analyzer(&self) -> SpectrumAnalyzer {
    SpectrumAnalyzer::with_decay(
      self.settings.capture.sample_rate,
      self.settings.capture.chunk_size,
      self.settings.peak_decay,
    )
  }
}

async fn run_ticks(
  mut pipeline: TickPipeline,
  queue: Arc<FrameQueue>,
  failure: Arc<dyn FailureFlag>,
  tick_rate: Duration,
  mut shutdown: oneshot::Receiver<()>,
) -> SpectrumAnalyzer {
  let mut ticker = tokio::time::interval(tick_rate.max(Duration::from_millis(1)));
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      biased;
      _ = &mut shutdown => break,
      _ = ticker.tick() => {
        if failure.has_failed() {
          warn!("capture failed, halting the tick loop");
          break;
        }
        pipeline.tick(&queue);
      }
    }
  }

  debug!(
    "tick loop done: {} frames rendered, {} empty ticks, {} frames evicted",
    pipeline.rendered,
    pipeline.skipped,
    queue.evicted()
  );
  pipeline.analyzer
}
