//! Render orchestration.
//!
//! A render job moves through
//!
//! ```text
//! Requested ──► Enqueued ──► Rendering ──► Ready
//!     │            │             │
//!     └────────────┴─────────────┴──► Error
//! ```
//!
//! [`Dispatcher::submit`] takes a job from Requested to Enqueued and returns at
//! once. A worker later calls [`RenderEngine::run_task`], which fetches the
//! history, renders it and stores the bytes under the job's handle. Readiness
//! is observable only as "a blob exists under the handle": a job that fails or
//! whose worker dies simply never becomes ready, and no partial blob is ever
//! stored.

use std::sync::Arc;

use log::{info, warn};

use crate::blobs::{Blob, BlobStore};
use crate::bounds::output_dimensions;
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::handle::{Handle, Params};
use crate::queue::{Task, TaskQueue};
use crate::request::RenderRequest;
use crate::source::HistorySource;
use crate::visualizer::Style;
use crate::History;

/// Worker endpoint that render tasks are addressed to.
pub const WORKER_PATH: &str = "/drawmap_worker";

/// Page a caller polls while a job is pending.
pub const DISPLAY_PAGE: &str = "display";

/// Page serving a finished image.
pub const RENDER_PAGE: &str = "render";

/// Lifecycle of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Requested,
    Enqueued,
    Rendering,
    Ready,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Error)
    }

    fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (from, Error) => !from.is_terminal(),
            (Requested, Enqueued) | (Requested, Rendering) => true,
            (Enqueued, Rendering) => true,
            (Rendering, Ready) => true,
            _ => false,
        }
    }
}

/// A render request bound to its handle, with its current state.
#[derive(Debug, Clone)]
pub struct RenderJob {
    handle: Handle,
    request: RenderRequest,
    state: JobState,
}

impl RenderJob {
    /// New job with a freshly generated handle.
    pub fn new(request: RenderRequest) -> Self {
        Self::with_handle(Handle::generate(), request)
    }

    pub fn with_handle(handle: Handle, request: RenderRequest) -> Self {
        info!("[RenderJob {}] {:?}", handle, JobState::Requested);
        Self {
            handle,
            request,
            state: JobState::Requested,
        }
    }

    /// Job picked up by a worker after it was enqueued elsewhere.
    fn resumed(handle: Handle, request: RenderRequest) -> Self {
        Self {
            handle,
            request,
            state: JobState::Enqueued,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                handle: self.handle.to_string(),
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            });
        }
        info!("[RenderJob {}] {:?} -> {:?}", self.handle, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Renders requests and stores the results.
pub struct RenderEngine {
    config: RenderConfig,
    blob_store: Arc<dyn BlobStore>,
}

impl RenderEngine {
    pub fn new(config: RenderConfig, blob_store: Arc<dyn BlobStore>) -> Self {
        Self { config, blob_store }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Style `request` will be rendered in.
    pub fn style_for(&self, request: &RenderRequest) -> Style {
        request.style.unwrap_or(self.config.default_style)
    }

    /// Path for `handle` on `page`, with the extension of `request`'s style.
    pub fn path_for(&self, handle: &Handle, request: &RenderRequest, page: &str) -> String {
        let suffix = self.style_for(request).visualizer(&self.config).suffix();
        handle.to_path(page, suffix)
    }

    /// Render `history` for `request`. Pure: nothing is stored.
    ///
    /// The image's longer side is `image_size_px`; the other side follows the
    /// bounding box aspect ratio.
    pub fn render(&self, history: &History, request: &RenderRequest) -> Result<Blob> {
        let (width, height) = output_dimensions(&request.bounds, self.config.image_size_px);
        let visualizer = self.style_for(request).visualizer(&self.config);

        let data = visualizer.visualize(history, &request.bounds, width as usize, height as usize)?;
        Ok(Blob::new(data))
    }

    /// Fetch, render and store one job. On any failure the job ends in
    /// [`JobState::Error`] and nothing is stored.
    ///
    /// A job that already finished is rejected with
    /// [`Error::InvalidTransition`] and left untouched.
    pub fn execute(&self, job: &mut RenderJob, source: &dyn HistorySource) -> Result<()> {
        job.advance(JobState::Rendering)?;

        match self.fetch_render_store(job, source) {
            Ok(()) => job.advance(JobState::Ready),
            Err(e) => {
                warn!("[RenderEngine] job {} failed: {}", job.handle, e);
                job.advance(JobState::Error)?;
                Err(e)
            }
        }
    }

    fn fetch_render_store(&self, job: &RenderJob, source: &dyn HistorySource) -> Result<()> {
        let request = &job.request;
        let history = source.fetch_range(request.start, request.end)?;
        info!(
            "[RenderEngine] job {}: {} points for {} .. {}",
            job.handle,
            history.len(),
            request.start,
            request.end
        );

        let blob = self.render(&history, request)?;
        self.blob_store.store(&job.handle, &blob)?;
        info!("[RenderEngine] job {}: stored {} bytes", job.handle, blob.data.len());
        Ok(())
    }

    /// Worker entry point: rebuild the job from `task` and execute it.
    pub fn run_task(&self, task: &Task, source: &dyn HistorySource) -> Result<RenderJob> {
        if task.path != WORKER_PATH {
            return Err(Error::Queue(format!("task addressed to {}, not {}", task.path, WORKER_PATH)));
        }

        let request = RenderRequest::from_params(&task.params)?;
        let handle = Handle::from_params(&task.params)?;
        info!("[RenderEngine] worker picked up job {}", handle);

        let mut job = RenderJob::resumed(handle, request);
        self.execute(&mut job, source)?;
        Ok(job)
    }

    /// Blob stored under `handle`, if any.
    pub fn fetch(&self, handle: &Handle) -> Result<Option<Blob>> {
        self.blob_store.fetch(handle)
    }

    /// Whether a result exists under `handle`. Storage errors count as not
    /// ready.
    pub fn is_ready(&self, handle: &Handle) -> bool {
        matches!(self.fetch(handle), Ok(Some(_)))
    }
}

/// Front door for render jobs: hands work to a task queue or runs it inline.
pub struct Dispatcher {
    engine: Arc<RenderEngine>,
    queue: Arc<dyn TaskQueue>,
}

impl Dispatcher {
    pub fn new(engine: Arc<RenderEngine>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { engine, queue }
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }

    /// Enqueue `request` for a worker and return immediately.
    ///
    /// The returned job is in [`JobState::Enqueued`]; poll
    /// [`display_path`](Self::display_path) or [`RenderEngine::is_ready`].
    pub fn submit(&self, request: RenderRequest) -> Result<RenderJob> {
        let mut job = RenderJob::new(request);

        let mut params = Params::new();
        job.request.write_params(&mut params);
        job.handle.write_params(&mut params);

        if let Err(e) = self.queue.enqueue(Task::new(WORKER_PATH, params)) {
            warn!("[Dispatcher] enqueue of job {} failed: {}", job.handle, e);
            job.advance(JobState::Error)?;
            return Err(e);
        }

        job.advance(JobState::Enqueued)?;
        Ok(job)
    }

    /// Render `request` synchronously, bypassing the queue.
    pub fn render_now(&self, request: RenderRequest, source: &dyn HistorySource) -> Result<RenderJob> {
        let mut job = RenderJob::new(request);
        self.engine.execute(&mut job, source)?;
        Ok(job)
    }

    /// Polling path for a pending job.
    pub fn display_path(&self, job: &RenderJob) -> String {
        self.engine.path_for(&job.handle, &job.request, DISPLAY_PAGE)
    }

    /// Path of a finished job's image.
    pub fn render_path(&self, job: &RenderJob) -> String {
        self.engine.path_for(&job.handle, &job.request, RENDER_PAGE)
    }
}
