use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::capture::domain::captured_frame::CapturedFrame;
use crate::capture::domain::image_reader::ImageReader;
use crate::classification::face_classifier::ClassifierError;
use crate::pipeline::enroll_identity_use_case::{EnrollIdentityUseCase, EnrollmentReport};
use crate::pipeline::pipeline_logger::{BufferedPipelineLogger, PipelineLogger};
use crate::pipeline::pipeline_state::{
    BusyGuard, CountersSnapshot, FrameDisposition, PipelineCounters, PipelineState, StateGate,
};
use crate::pipeline::recognition_context::RecognitionContext;
use crate::pipeline::recognize_faces_use_case::RecognizeFacesUseCase;
use crate::tracking::domain::face_tracker::FaceTracker;

/// How often a blocking enrollment re-checks a busy pipeline.
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("pipeline is {0}")]
    Busy(PipelineState),
    #[error("pipeline has been shut down")]
    ShutDown,
    #[error(transparent)]
    Enrollment(#[from] ClassifierError),
    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

/// Called once per submitted frame, before `submit_frame` returns, so the
/// capture source can deliver the next one.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync>;

type SharedLogger = Arc<Mutex<Box<dyn PipelineLogger>>>;
type EnrollReply = Sender<Result<EnrollmentReport, OrchestratorError>>;

struct EnrollJob {
    label: i32,
    images: Vec<PathBuf>,
    reply: EnrollReply,
}

/// Drop-on-busy frame pipeline with one detection and one enrollment worker.
///
/// Layout: `capture → [detect worker] → tracker`, `enroll → [enroll worker]`
///
/// A frame is accepted only while the pipeline is idle; anything arriving
/// while a frame or an enrollment is in flight is dropped and counted,
/// never queued.
pub struct Orchestrator {
    context: Arc<RecognitionContext>,
    tracker: Arc<dyn FaceTracker>,
    gate: Arc<StateGate>,
    counters: Arc<PipelineCounters>,
    logger: SharedLogger,
    ready: Option<ReadyCallback>,
    detect_tx: Option<Sender<CapturedFrame>>,
    enroll_tx: Option<Sender<EnrollJob>>,
    detect_handle: Option<JoinHandle<()>>,
    enroll_handle: Option<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        context: Arc<RecognitionContext>,
        tracker: Arc<dyn FaceTracker>,
        reader: Arc<dyn ImageReader>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, OrchestratorError> {
        let gate = Arc::new(StateGate::new());
        let counters = Arc::new(PipelineCounters::default());
        let logger: SharedLogger = Arc::new(Mutex::new(logger));

        // Single-slot channels: the gate admits one job at a time anyway.
        let (detect_tx, detect_rx) = crossbeam_channel::bounded::<CapturedFrame>(1);
        let (enroll_tx, enroll_rx) = crossbeam_channel::bounded::<EnrollJob>(1);

        let detect_handle = spawn_detector(
            RecognizeFacesUseCase::new(&context),
            detect_rx,
            tracker.clone(),
            gate.clone(),
            counters.clone(),
            logger.clone(),
        )?;
        let enroll_handle = spawn_enroller(
            EnrollIdentityUseCase::new(&context, reader),
            enroll_rx,
            gate.clone(),
            counters.clone(),
            logger.clone(),
        )?;

        Ok(Self {
            context,
            tracker,
            gate,
            counters,
            logger,
            ready: None,
            detect_tx: Some(detect_tx),
            enroll_tx: Some(enroll_tx),
            detect_handle: Some(detect_handle),
            enroll_handle: Some(enroll_handle),
        })
    }

    pub fn with_ready_callback(mut self, ready: ReadyCallback) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Offers a frame. The tracker always sees the new frame geometry; the
    /// frame itself is processed only if the pipeline is idle.
    pub fn submit_frame(&self, frame: CapturedFrame) -> FrameDisposition {
        self.tracker
            .on_frame(frame.geometry(), frame.luminance.clone(), frame.timestamp);

        let disposition = self.dispatch_frame(frame);
        match disposition {
            FrameDisposition::Accepted => self.counters.record_accepted(),
            FrameDisposition::Dropped => self.counters.record_dropped(),
        }

        if let Some(ready) = &self.ready {
            ready();
        }
        disposition
    }

    fn dispatch_frame(&self, frame: CapturedFrame) -> FrameDisposition {
        let Some(tx) = &self.detect_tx else {
            return FrameDisposition::Dropped;
        };
        if let Err(state) = self.gate.try_begin(PipelineState::Detecting) {
            log::trace!("Dropping frame {} while {state}", frame.frame.index());
            return FrameDisposition::Dropped;
        }
        if tx.try_send(frame).is_err() {
            self.gate.finish();
            return FrameDisposition::Dropped;
        }
        FrameDisposition::Accepted
    }

    /// Starts an enrollment if the pipeline is idle. The report arrives on
    /// the returned channel once training finishes.
    pub fn request_enrollment(
        &self,
        label: i32,
        images: Vec<PathBuf>,
    ) -> Result<Receiver<Result<EnrollmentReport, OrchestratorError>>, OrchestratorError> {
        let tx = self.enroll_tx.as_ref().ok_or(OrchestratorError::ShutDown)?;
        self.gate
            .try_begin(PipelineState::Training)
            .map_err(OrchestratorError::Busy)?;

        let (reply, result) = crossbeam_channel::bounded(1);
        if tx.try_send(EnrollJob { label, images, reply }).is_err() {
            self.gate.finish();
            return Err(OrchestratorError::ShutDown);
        }
        Ok(result)
    }

    /// Waits for the pipeline to go idle, then enrolls and waits for the
    /// report.
    pub fn enroll_identity(
        &self,
        label: i32,
        images: Vec<PathBuf>,
    ) -> Result<EnrollmentReport, OrchestratorError> {
        loop {
            match self.request_enrollment(label, images.clone()) {
                Ok(result) => return result.recv().map_err(|_| OrchestratorError::ShutDown)?,
                Err(OrchestratorError::Busy(_)) => {
                    self.gate.wait_until_idle(IDLE_POLL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        self.gate.current()
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    pub fn tracker(&self) -> &Arc<dyn FaceTracker> {
        &self.tracker
    }

    pub fn context(&self) -> &Arc<RecognitionContext> {
        &self.context
    }

    /// Blocks until no frame or enrollment is in flight, or `timeout`
    /// passes. Returns whether the pipeline is idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.gate.wait_until_idle(timeout)
    }

    /// Debug summary. Only takes locks that workers hold briefly, so it is
    /// safe to call from a render loop while a frame is in flight.
    pub fn stats(&self) -> String {
        let logger = self
            .logger
            .lock()
            .map(|l| l.stats())
            .unwrap_or_default();
        [
            format!("State: {}", self.state()),
            self.counters().to_string(),
            logger,
            self.context.stats(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Stops both workers after their current job, joins them and releases
    /// the models. Reports the first worker panic.
    pub fn shutdown(&mut self) -> Result<(), OrchestratorError> {
        if self.detect_tx.is_none() && self.enroll_tx.is_none() {
            return Ok(());
        }
        self.detect_tx = None;
        self.enroll_tx = None;

        let mut first_error = None;
        for (name, handle) in [
            ("detection", self.detect_handle.take()),
            ("enrollment", self.enroll_handle.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() && first_error.is_none() {
                    first_error = Some(OrchestratorError::WorkerPanicked(name));
                }
            }
        }

        self.context.shutdown();
        log::info!("Pipeline shut down: {}", self.counters().to_string().replace('\n', ", "));

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("{e}");
        }
    }
}

/// Hands a finished job's events to the shared logger.
fn forward_events(events: BufferedPipelineLogger, logger: &SharedLogger) {
    if events.is_empty() {
        return;
    }
    let mut shared = logger.lock().unwrap_or_else(PoisonError::into_inner);
    events.replay_into(shared.as_mut());
}

fn spawn_detector(
    use_case: RecognizeFacesUseCase,
    frame_rx: Receiver<CapturedFrame>,
    tracker: Arc<dyn FaceTracker>,
    gate: Arc<StateGate>,
    counters: Arc<PipelineCounters>,
    logger: SharedLogger,
) -> Result<JoinHandle<()>, OrchestratorError> {
    std::thread::Builder::new()
        .name("detection".into())
        .spawn(move || {
            for captured in frame_rx {
                let _busy = BusyGuard::new(&gate);
                let mut events = BufferedPipelineLogger::new();
                let result = use_case.execute(&captured, &mut events);
                forward_events(events, &logger);
                match result {
                    Ok(recognitions) => {
                        tracker.track_results(
                            &recognitions,
                            captured.luminance.clone(),
                            captured.timestamp,
                        );
                        counters.record_processed();
                    }
                    Err(e) => {
                        log::warn!("Recognition failed for frame {}: {e}", captured.frame.index());
                        counters.record_failed();
                    }
                }
            }
        })
        .map_err(|source| OrchestratorError::Spawn {
            name: "detection",
            source,
        })
}

fn spawn_enroller(
    use_case: EnrollIdentityUseCase,
    job_rx: Receiver<EnrollJob>,
    gate: Arc<StateGate>,
    counters: Arc<PipelineCounters>,
    logger: SharedLogger,
) -> Result<JoinHandle<()>, OrchestratorError> {
    std::thread::Builder::new()
        .name("enrollment".into())
        .spawn(move || {
            for job in job_rx {
                let result = {
                    let _busy = BusyGuard::new(&gate);
                    let mut events = BufferedPipelineLogger::new();
                    let result = use_case.execute(job.label, &job.images, &mut events);
                    forward_events(events, &logger);
                    result.map_err(OrchestratorError::from)
                };
                if result.is_ok() {
                    counters.record_enrollment();
                }
                // The requester may have stopped waiting.
                let _ = job.reply.send(result);
            }
        })
        .map_err(|source| OrchestratorError::Spawn {
            name: "enrollment",
            source,
        })
}
