//! Rendering contexts and the audio graphs they play.
//!
//! The session layer talks to audio exclusively through [`RenderBackend`] and
//! [`RenderContext`]. [`CpalBackend`] plays through the default output device;
//! [`OfflineBackend`] renders on demand and backs the tests and the demo's
//! `--no-audio` mode.

mod backend;
mod context;
mod graph;
mod output;
pub mod panner;
mod param;
mod spatializer;

pub use backend::{CpalBackend, OfflineBackend};
pub use context::GraphContext;
pub use graph::AudioGraph;
pub use output::{OutputDesc, OutputStream};
pub use param::AudioParam;

use crate::audio_data::DecodedBuffer;
use crate::config::PannerParams;
use crate::error::Result;
use crate::math::{ListenerPose, Vec3};
use std::fmt;
use std::sync::Arc;

/// Handle of a node inside one context's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Where a node's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Node(NodeId),
    Destination,
}

/// The two rendering sessions the manager owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Positional,
    Ambient,
}

impl SessionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Positional => "Positional sounds",
            SessionKind::Ambient => "Ambient sounds",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Positional => f.write_str("positional"),
            SessionKind::Ambient => f.write_str("ambient"),
        }
    }
}

/// One audio rendering context: a graph, a clock and a suspend state.
///
/// Times are seconds on the context clock, which only advances while the
/// context is running.
pub trait RenderContext {
    fn kind(&self) -> SessionKind;
    fn sample_rate(&self) -> u32;
    fn current_time(&self) -> f64;
    fn is_running(&self) -> bool;
    fn is_closed(&self) -> bool;

    fn suspend(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Stops rendering for good and releases the output device.
    fn close(&mut self) -> Result<()>;

    fn create_source(&mut self, buffer: Arc<DecodedBuffer>) -> Result<NodeId>;
    fn create_gain(&mut self, gain: f32) -> Result<NodeId>;
    fn create_panner(&mut self, params: &PannerParams) -> Result<NodeId>;
    fn connect(&mut self, from: NodeId, to: Output) -> Result<()>;
    fn set_loop(&mut self, source: NodeId, looping: bool) -> Result<()>;
    fn start(&mut self, source: NodeId) -> Result<()>;

    /// Sets the listener immediately, cancelling any ramp.
    fn set_listener(&mut self, pose: ListenerPose) -> Result<()>;
    /// Ramps listener position and forward linearly from their current values,
    /// arriving at `end_time`.
    fn ramp_listener(&mut self, position: Vec3, forward: Vec3, end_time: f64) -> Result<()>;
    fn listener_at(&self, time: f64) -> ListenerPose;

    fn is_playing(&self, source: NodeId) -> bool;
    fn panner_params(&self, node: NodeId) -> Option<PannerParams>;
}

/// Factory for rendering contexts.
pub trait RenderBackend {
    fn create_context(&self, kind: SessionKind) -> Result<Box<dyn RenderContext>>;
}
