use crate::audio_data::DecodedBuffer;
use crate::config::PannerParams;
use crate::error::{Result, TracksideError};
use crate::math::{ListenerPose, Vec3};
use crate::render::{AudioGraph, NodeId, Output, OutputStream, RenderContext, SessionKind};
use std::sync::{Arc, Mutex, MutexGuard};

/// [`RenderContext`] over a shared [`AudioGraph`], optionally played by an
/// [`OutputStream`].
pub struct GraphContext {
    kind: SessionKind,
    graph: Arc<Mutex<AudioGraph>>,
    output: Option<OutputStream>,
}

impl GraphContext {
    /// Context with no device; time advances through [`render_offline`](Self::render_offline).
    pub fn offline(kind: SessionKind, sample_rate: u32) -> Self {
        Self::with_graph(kind, Arc::new(Mutex::new(AudioGraph::new(sample_rate))), None)
    }

    pub fn with_graph(
        kind: SessionKind,
        graph: Arc<Mutex<AudioGraph>>,
        output: Option<OutputStream>,
    ) -> Self {
        Self {
            kind,
            graph,
            output,
        }
    }

    pub fn graph(&self) -> Arc<Mutex<AudioGraph>> {
        Arc::clone(&self.graph)
    }

    /// Renders `frames` stereo frames and returns them interleaved.
    pub fn render_offline(&self, frames: usize) -> Result<Vec<f32>> {
        let mut out = vec![0.0; frames * 2];
        self.lock()?.render(&mut out, 2);
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, AudioGraph>> {
        self.graph
            .lock()
            .map_err(|_| TracksideError::Engine(format!("{} graph lock poisoned", self.kind)))
    }
}

impl RenderContext for GraphContext {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    fn sample_rate(&self) -> u32 {
        self.lock().map(|g| g.sample_rate()).unwrap_or(0)
    }

    fn current_time(&self) -> f64 {
        self.lock().map(|g| g.current_time()).unwrap_or(0.0)
    }

    fn is_running(&self) -> bool {
        self.lock().map(|g| g.is_running()).unwrap_or(false)
    }

    fn is_closed(&self) -> bool {
        self.lock().map(|g| g.is_closed()).unwrap_or(true)
    }

    fn suspend(&mut self) -> Result<()> {
        self.lock()?.set_running(false)
    }

    fn resume(&mut self) -> Result<()> {
        self.lock()?.set_running(true)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
        self.lock()?.close();
        Ok(())
    }

    fn create_source(&mut self, buffer: Arc<DecodedBuffer>) -> Result<NodeId> {
        self.lock()?.add_source(buffer)
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId> {
        self.lock()?.add_gain(gain)
    }

    fn create_panner(&mut self, params: &PannerParams) -> Result<NodeId> {
        self.lock()?.add_panner(params.clone())
    }

    fn connect(&mut self, from: NodeId, to: Output) -> Result<()> {
        self.lock()?.connect(from, to)
    }

    fn set_loop(&mut self, source: NodeId, looping: bool) -> Result<()> {
        self.lock()?.set_loop(source, looping)
    }

    fn start(&mut self, source: NodeId) -> Result<()> {
        self.lock()?.start(source)
    }

    fn set_listener(&mut self, pose: ListenerPose) -> Result<()> {
        self.lock()?.set_listener(pose);
        Ok(())
    }

    fn ramp_listener(&mut self, position: Vec3, forward: Vec3, end_time: f64) -> Result<()> {
        self.lock()?.ramp_listener(position, forward, end_time);
        Ok(())
    }

    fn listener_at(&self, time: f64) -> ListenerPose {
        self.lock()
            .map(|g| g.listener_at(time))
            .unwrap_or_default()
    }

    fn is_playing(&self, source: NodeId) -> bool {
        self.lock().map(|g| g.is_playing(source)).unwrap_or(false)
    }

    fn panner_params(&self, node: NodeId) -> Option<PannerParams> {
        self.lock().ok()?.panner(node).cloned()
    }
}

impl Drop for GraphContext {
    fn drop(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
    }
}
