//! Live capture of one display for the origin magnifier.
//!
//! A session is opened on the caller's thread so configuration failures are
//! reported synchronously; afterwards a worker thread owns the platform
//! source and posts decoded frames into a single-slot [`FrameMailbox`]. Only
//! the newest frame is kept, so a slow reader never blocks the worker.

use crate::overlay::display::{DisplayDescriptor, DisplayId};
use crate::overlay::error::CaptureError;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long the worker waits for the source before re-checking for a stop request.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Frames older than this are not shown by the magnifier.
pub const FRAME_STALENESS_LIMIT: Duration = Duration::from_secs(2);

/// Platform window handle, stored as an integer so it can cross threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at: Instant,
    pub sequence: u64,
}

impl Frame {
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.captured_at) > FRAME_STALENESS_LIMIT
    }
}

pub trait CaptureBackend: Send + Sync {
    /// Opens a capture session for `display` that leaves out `excluding`.
    fn open(
        &self,
        display: &DisplayDescriptor,
        excluding: &[WindowHandle],
    ) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

pub trait CaptureSource: Send {
    /// Waits up to `timeout` for the next decoded frame. `Ok(None)` means no
    /// frame arrived in time.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<RgbaImage>, CaptureError>;

    /// Releases the OS capture session. Called exactly once by the worker.
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Arc<Frame>>,
    sequence: u64,
    error: Option<CaptureError>,
    closed: bool,
}

/// Single-slot, overwrite-on-write hand-off between the capture worker and
/// the overlay thread.
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

#[derive(Debug, Clone)]
pub enum MailboxRead {
    Frame(Arc<Frame>),
    Failed(CaptureError),
    Closed,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the held frame. Returns the new frame's sequence number.
    pub fn post(&self, image: RgbaImage) -> u64 {
        let mut slot = self.lock();
        slot.sequence += 1;
        let sequence = slot.sequence;
        slot.frame = Some(Arc::new(Frame {
            image,
            captured_at: Instant::now(),
            sequence,
        }));
        drop(slot);
        self.ready.notify_all();
        sequence
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.lock().frame.clone()
    }

    pub fn fail(&self, error: CaptureError) {
        self.lock().error = Some(error);
        self.ready.notify_all();
    }

    pub fn error(&self) -> Option<CaptureError> {
        self.lock().error.clone()
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Blocks until a frame newer than `after` is posted, the session fails
    /// or the mailbox is closed. Newer frames take precedence.
    pub fn wait_newer(&self, after: u64) -> MailboxRead {
        let mut slot = self.lock();
        loop {
            if let Some(frame) = slot.frame.as_ref().filter(|f| f.sequence > after) {
                return MailboxRead::Frame(Arc::clone(frame));
            }
            if let Some(error) = slot.error.clone() {
                return MailboxRead::Failed(error);
            }
            if slot.closed {
                return MailboxRead::Closed;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Lazy, unbounded view of a session's frames. Intermediate frames are
/// skipped; a failure is yielded once and ends the stream.
#[derive(Debug, Clone)]
pub struct FrameStream {
    mailbox: Arc<FrameMailbox>,
    last_sequence: u64,
    finished: bool,
}

impl FrameStream {
    fn new(mailbox: Arc<FrameMailbox>) -> Self {
        Self {
            mailbox,
            last_sequence: 0,
            finished: false,
        }
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.mailbox.latest()
    }
}

impl Iterator for FrameStream {
    type Item = Result<Arc<Frame>, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.mailbox.wait_newer(self.last_sequence) {
            MailboxRead::Frame(frame) => {
                self.last_sequence = frame.sequence;
                Some(Ok(frame))
            }
            MailboxRead::Failed(error) => {
                self.finished = true;
                Some(Err(error))
            }
            MailboxRead::Closed => {
                self.finished = true;
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSessionInfo {
    pub target: DisplayDescriptor,
    pub last_frame: Option<Arc<Frame>>,
    pub is_active: bool,
}

struct ActiveSession {
    target: DisplayDescriptor,
    mailbox: Arc<FrameMailbox>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.mailbox.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(display = %self.target.id, "capture worker panicked");
            }
        }
    }
}

/// What the overlay sees when it polls the controller once per tick.
#[derive(Debug, Clone, Default)]
pub struct CapturePoll {
    pub frame: Option<Arc<Frame>>,
    /// Set on the first poll after the session failed.
    pub failure: Option<CaptureError>,
}

pub struct CaptureStreamController {
    backend: Arc<dyn CaptureBackend>,
    excluded: Vec<WindowHandle>,
    session: Option<ActiveSession>,
    last_error: Option<CaptureError>,
}

impl CaptureStreamController {
    pub fn new(backend: Arc<dyn CaptureBackend>, excluded: Vec<WindowHandle>) -> Self {
        Self {
            backend,
            excluded,
            session: None,
            last_error: None,
        }
    }

    pub fn set_excluded_windows(&mut self, excluded: Vec<WindowHandle>) {
        self.excluded = excluded;
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<DisplayId> {
        self.session.as_ref().map(|session| session.target.id)
    }

    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn session(&self) -> Option<CaptureSessionInfo> {
        self.session.as_ref().map(|session| CaptureSessionInfo {
            target: session.target,
            last_frame: session.mailbox.latest(),
            is_active: !session.mailbox.is_closed() && session.mailbox.error().is_none(),
        })
    }

    /// Starts capturing `target`. An active session for the same display is
    /// reused; a session for any other display is stopped first.
    pub fn start(&mut self, target: &DisplayDescriptor) -> Result<FrameStream, CaptureError> {
        if let Some(session) = &self.session {
            if session.target == *target && session.mailbox.error().is_none() {
                return Ok(FrameStream::new(Arc::clone(&session.mailbox)));
            }
            self.stop();
        }

        let mut source = match self.backend.open(target, &self.excluded) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(display = %target.id, error = %err, "capture session failed to open");
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let mailbox = Arc::new(FrameMailbox::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker_mailbox = Arc::clone(&mailbox);
        let worker_stop = Arc::clone(&stop);
        let display_id = target.id;
        let spawned = thread::Builder::new()
            .name("overlay-capture".to_string())
            .spawn(move || {
                run_capture_worker(source.as_mut(), &worker_mailbox, &worker_stop, display_id);
                source.close();
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(err) => {
                let err = CaptureError::backend(format!("failed to spawn capture worker: {err}"));
                tracing::error!(display = %target.id, error = %err, "capture worker spawn failed");
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        tracing::debug!(display = %target.id, "capture session started");
        self.last_error = None;
        self.session = Some(ActiveSession {
            target: *target,
            mailbox: Arc::clone(&mailbox),
            stop,
            worker: Some(worker),
        });
        Ok(FrameStream::new(mailbox))
    }

    /// Stops the active session, if any. Returns once the worker has exited
    /// and released the platform session.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
            tracing::debug!(display = %session.target.id, "capture session stopped");
        }
    }

    /// Latest frame for the magnifier. A failed session is torn down here and
    /// its error reported exactly once; nothing is restarted.
    pub fn poll(&mut self) -> CapturePoll {
        let Some(session) = &self.session else {
            return CapturePoll::default();
        };
        if let Some(error) = session.mailbox.error() {
            tracing::warn!(display = %session.target.id, error = %error, "capture session failed");
            self.stop();
            self.last_error = Some(error.clone());
            return CapturePoll {
                frame: None,
                failure: Some(error),
            };
        }
        CapturePoll {
            frame: session.mailbox.latest(),
            failure: None,
        }
    }
}

impl Drop for CaptureStreamController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_worker(
    source: &mut dyn CaptureSource,
    mailbox: &FrameMailbox,
    stop: &AtomicBool,
    display_id: DisplayId,
) {
    while !stop.load(Ordering::SeqCst) {
        match source.next_frame(WORKER_POLL_INTERVAL) {
            Ok(Some(image)) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                mailbox.post(image);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(display = %display_id, error = %err, "capture source reported failure");
                mailbox.fail(err);
                break;
            }
        }
    }
}
