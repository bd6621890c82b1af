//! Background decoding of sound files.
//!
//! Workers take [`LoadJob`]s from a shared queue, fetch the buffer through
//! the [`BufferCache`] and post the result back to the event queue as
//! [`Event::SoundLoaded`].

use crate::cache::BufferCache;
use crate::config::SoundDefinition;
use crate::error::{Result, TracksideError};
use crate::events::{Event, LoadCompletion};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Request to decode one sound of a track
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub generation: u64,
    pub index: usize,
    pub definition: SoundDefinition,
}

/// Where the session manager sends decode requests.
pub trait LoadDispatcher {
    fn dispatch(&self, job: LoadJob) -> Result<()>;
}

/// Queues jobs on a channel for the caller to run.
impl LoadDispatcher for Sender<LoadJob> {
    fn dispatch(&self, job: LoadJob) -> Result<()> {
        self.send(job)
            .map_err(|_| TracksideError::Engine("Load job receiver dropped".into()))
    }
}

pub struct LoaderPool {
    jobs: Option<Sender<LoadJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl LoaderPool {
    /// Spawns `threads` workers posting completions to `events`.
    pub fn spawn(threads: usize, cache: Arc<BufferCache>, events: Sender<Event>) -> Result<Self> {
        let (job_sender, job_receiver) = crossbeam_channel::unbounded::<LoadJob>();

        let mut workers = Vec::with_capacity(threads.max(1));
        for n in 0..threads.max(1) {
            let jobs = job_receiver.clone();
            let cache = Arc::clone(&cache);
            let events = events.clone();
            let handle = thread::Builder::new()
                .name(format!("sound-loader-{}", n))
                .spawn(move || worker(jobs, cache, events))?;
            workers.push(handle);
        }

        log::debug!("Loader pool spawned with {} threads", workers.len());

        Ok(Self {
            jobs: Some(job_sender),
            workers,
        })
    }

    pub fn submit(&self, job: LoadJob) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| TracksideError::Engine("Loader pool is shut down".into()))?;
        jobs.send(job)
            .map_err(|_| TracksideError::Engine("Loader pool workers exited".into()))
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting jobs and waits for the workers to drain the queue.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Sound loader thread panicked");
            }
        }
    }
}

impl LoadDispatcher for LoaderPool {
    fn dispatch(&self, job: LoadJob) -> Result<()> {
        self.submit(job)
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker(jobs: Receiver<LoadJob>, cache: Arc<BufferCache>, events: Sender<Event>) {
    for job in jobs.iter() {
        let result = cache.get_or_load(&job.definition.file);
        let completion = LoadCompletion {
            generation: job.generation,
            index: job.index,
            definition: job.definition,
            result,
        };
        if events.send(Event::SoundLoaded(completion)).is_err() {
            break;
        }
    }
}
