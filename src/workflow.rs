//! Runs a [`ReviewSession`]'s remote calls off the control thread.
//!
//! Each request the session hands out is executed on its own worker thread.
//! Completions come back over a channel and are applied on the thread that
//! owns the `Workflow`, one at a time, through the session's `on_*` methods.
//! Stale completions are therefore discarded by the same generation check
//! whatever order the workers finish in.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::client::{DetectionService, PersistenceService};
use crate::error::{ClientError, ReviewError};
use crate::image_source::ImageSource;
use crate::model::{DetectionResponse, RecordId, SaveMetadata};
use crate::session::{DetectRequest, ReviewSession, SaveRequest};

/// A finished remote call, tagged with the generation it was issued for.
#[derive(Debug)]
pub enum Completion {
    Detected {
        generation: u64,
        result: Result<DetectionResponse, ClientError>,
    },
    Saved {
        generation: u64,
        result: Result<RecordId, ClientError>,
    },
}

/// What happened to one completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The session moved to a new phase.
    Current,
    /// The completion belonged to a superseded generation or phase.
    Stale,
}

pub struct Workflow {
    session: ReviewSession,
    detector: Arc<dyn DetectionService>,
    store: Arc<dyn PersistenceService>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    in_flight: usize,
}

impl Workflow {
    pub fn new(
        session: ReviewSession,
        detector: Arc<dyn DetectionService>,
        store: Arc<dyn PersistenceService>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            session,
            detector,
            store,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    /// Direct access for operations that need no network call
    /// (`select_object`, `set_rendered_dimensions`, `reset`, ...).
    pub fn session_mut(&mut self) -> &mut ReviewSession {
        &mut self.session
    }

    pub fn into_session(self) -> ReviewSession {
        self.session
    }

    /// Number of calls started and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Selects `file` and, if one was given, starts detection for it.
    pub fn select_image(&mut self, file: Option<ImageSource>) -> Result<(), ReviewError> {
        if let Some(request) = self.session.select_image(file)? {
            self.spawn_detect(request);
        }
        Ok(())
    }

    pub fn retry(&mut self) -> Result<(), ReviewError> {
        let request = self.session.retry()?;
        self.spawn_detect(request);
        Ok(())
    }

    /// Validates and starts saving. Validation failures return before any
    /// worker is started.
    pub fn save(&mut self, metadata: SaveMetadata) -> Result<(), ReviewError> {
        let request = self.session.save(metadata)?;
        self.spawn_save(request);
        Ok(())
    }

    /// Applies every completion already waiting, without blocking.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Waits up to `timeout` for one completion and applies it.
    ///
    /// Returns `None` if nothing arrived in time or nothing is in flight.
    pub fn wait(&mut self, timeout: Duration) -> Option<Applied> {
        if self.in_flight == 0 {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => Some(self.apply(completion)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Applies completions until nothing is in flight or `deadline` passes.
    ///
    /// Returns true if every outstanding call was applied.
    pub fn settle(&mut self, deadline: Duration) -> bool {
        let started = Instant::now();
        while self.in_flight > 0 {
            let Some(remaining) = deadline.checked_sub(started.elapsed()) else {
                return false;
            };
            if self.wait(remaining).is_none() {
                return self.in_flight == 0;
            }
        }
        true
    }

    fn apply(&mut self, completion: Completion) -> Applied {
        self.in_flight = self.in_flight.saturating_sub(1);
        let current = match completion {
            Completion::Detected {
                generation,
                result: Ok(response),
            } => self.session.on_detection_success(response, generation),
            Completion::Detected {
                generation,
                result: Err(err),
            } => self.session.on_detection_failure(err, generation),
            Completion::Saved {
                generation,
                result: Ok(id),
            } => self.session.on_save_success(id, generation),
            Completion::Saved {
                generation,
                result: Err(err),
            } => self.session.on_save_failure(err, generation),
        };
        if current {
            Applied::Current
        } else {
            Applied::Stale
        }
    }

    fn spawn_detect(&mut self, request: DetectRequest) {
        let detector = Arc::clone(&self.detector);
        let sender = self.sender.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = detector.detect(&request.image, request.location.as_deref());
            // The receiver only goes away with the workflow itself.
            let _ = sender.send(Completion::Detected {
                generation: request.generation,
                result,
            });
        });
    }

    fn spawn_save(&mut self, request: SaveRequest) {
        let store = Arc::clone(&self.store);
        let sender = self.sender.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = store.save(&request.record);
            let _ = sender.send(Completion::Saved {
                generation: request.generation,
                result,
            });
        });
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("session", &self.session)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
