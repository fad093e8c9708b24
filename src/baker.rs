use crossbeam::channel::{unbounded, Receiver};

use crate::clip::ClipOutput;
use crate::config::BakeConfig;
use crate::encoder::BakeBackend;
use crate::error::BakeError;
use crate::job::{BakeJob, JobProgress};

/// Owns at most one in-flight [`BakeJob`] and republishes its per-clip
/// notifications to the caller. The host drives it by calling
/// [`Baker::update`] once per tick.
pub struct Baker<B: BakeBackend> {
    backend: B,
    job: Option<BakeJob<B>>,
    events: Option<Receiver<ClipOutput>>,
}

impl<B: BakeBackend> Baker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            job: None,
            events: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Begins a bake, aborting any job already in flight first. A
    /// configuration error leaves the baker without a job; the previous job,
    /// if any, is still gone.
    pub fn start(&mut self, config: BakeConfig) -> Result<(), BakeError> {
        self.abort();
        let (tx, rx) = unbounded();
        let mut job = BakeJob::new(config, tx)?;
        job.start();
        self.job = Some(job);
        self.events = Some(rx);
        Ok(())
    }

    /// Cancels the active job, if any, and drops its undelivered
    /// notifications.
    pub fn abort(&mut self) {
        if let Some(mut job) = self.job.take() {
            job.abort();
        }
        self.events = None;
    }

    pub fn is_active(&self) -> bool {
        self.job.as_ref().is_some_and(|job| job.is_running())
    }

    /// Advances the active job one cooperative step and returns the clip
    /// notifications produced so far. On completion the job is cleared; on
    /// error it is cleared and the diagnostic propagated — the affected clip
    /// emits nothing.
    pub fn update(&mut self) -> Result<Vec<ClipOutput>, BakeError> {
        let Some(job) = self.job.as_mut() else {
            return Ok(Vec::new());
        };
        match job.advance(&self.backend) {
            Ok(progress) => {
                let outputs = self.drain();
                if progress == JobProgress::Finished {
                    self.job = None;
                    self.events = None;
                }
                Ok(outputs)
            }
            Err(e) => {
                self.job = None;
                self.events = None;
                Err(e)
            }
        }
    }

    fn drain(&mut self) -> Vec<ClipOutput> {
        self.events
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }
}
