use crate::audio_data::DecodedBuffer;
use crate::config::PannerParams;
use crate::error::{Result, TracksideError};
use crate::math::{ListenerPose, Vec3};
use crate::render::param::AudioParam;
use crate::render::spatializer::Spatializer;
use crate::render::{NodeId, Output};
use std::sync::Arc;

/// Frames rendered per pass through the graph.
const RENDER_QUANTUM: usize = 256;

/// Playback state of a buffer source node.
#[derive(Debug, Clone)]
pub(crate) struct SourceNode {
    buffer: Arc<DecodedBuffer>,
    looping: bool,
    started: bool,
    finished: bool,
    cursor: usize,
}

impl SourceNode {
    fn new(buffer: Arc<DecodedBuffer>) -> Self {
        Self {
            buffer,
            looping: false,
            started: false,
            finished: false,
            cursor: 0,
        }
    }

    fn is_playing(&self) -> bool {
        self.started && !self.finished
    }

    /// Writes the next `block.len()` stereo frames into `block`.
    fn pull(&mut self, block: &mut [(f32, f32)]) {
        let total = self.buffer.total_frames();
        for frame in block.iter_mut() {
            if self.cursor >= total {
                if self.looping && total > 0 {
                    self.cursor = 0;
                } else {
                    self.finished = true;
                    *frame = (0.0, 0.0);
                    continue;
                }
            }
            *frame = self.buffer.stereo_frame(self.cursor);
            self.cursor += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PannerNode {
    params: PannerParams,
    /// Voice index inside the spatializer
    voice: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Source(SourceNode),
    Gain(f32),
    Panner(PannerNode),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    output: Option<Output>,
}

/// Listener position and orientation, one parameter per component.
#[derive(Debug, Clone)]
struct ListenerParams {
    position: [AudioParam; 3],
    forward: [AudioParam; 3],
    up: [AudioParam; 3],
}

impl ListenerParams {
    fn new(pose: ListenerPose) -> Self {
        let params = |v: Vec3| [AudioParam::new(v.x), AudioParam::new(v.y), AudioParam::new(v.z)];
        Self {
            position: params(pose.position),
            forward: params(pose.forward),
            up: params(pose.up),
        }
    }

    fn pose_at(&self, time: f64) -> ListenerPose {
        let vec = |p: &[AudioParam; 3]| {
            Vec3::new(p[0].value_at(time), p[1].value_at(time), p[2].value_at(time))
        };
        ListenerPose::new(vec(&self.position), vec(&self.forward), vec(&self.up))
    }

    fn ramp(params: &mut [AudioParam; 3], target: Vec3, end_time: f64, now: f64) {
        for (param, value) in params.iter_mut().zip(target.to_array()) {
            param.linear_ramp_to(value, end_time, now);
        }
    }
}

/// Audio graph rendered by one context.
///
/// Nodes are never removed individually; a context is closed and replaced as
/// a whole when its track changes.
///
/// The graph renders [`RENDER_QUANTUM`] frames at a time into a pending
/// buffer that [`AudioGraph::render`] drains, so callers may ask for any block
/// size. The listener pose is sampled once per quantum and panner gains ramp
/// across it. The spatializer is only created once a panner is added.
#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    nodes: Vec<Node>,
    listener: ListenerParams,
    frames_rendered: u64,
    quanta_rendered: u64,
    running: bool,
    closed: bool,
    spatializer: Option<Spatializer>,
    block: Vec<(f32, f32)>,
    pending: Vec<(f32, f32)>,
    pending_pos: usize,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            nodes: Vec::new(),
            listener: ListenerParams::new(ListenerPose::identity()),
            frames_rendered: 0,
            quanta_rendered: 0,
            running: true,
            closed: false,
            spatializer: None,
            block: vec![(0.0, 0.0); RENDER_QUANTUM],
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds rendered since creation.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_running(&mut self, running: bool) -> Result<()> {
        self.ensure_open()?;
        self.running = running;
        Ok(())
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.running = false;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of started sources that have not reached their end.
    pub fn playing_sources(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(&n.kind, NodeKind::Source(s) if s.is_playing()))
            .count()
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind) -> Result<NodeId> {
        self.ensure_open()?;
        self.nodes.push(Node { kind, output: None });
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn add_source(&mut self, buffer: Arc<DecodedBuffer>) -> Result<NodeId> {
        self.add_node(NodeKind::Source(SourceNode::new(buffer)))
    }

    pub fn add_gain(&mut self, gain: f32) -> Result<NodeId> {
        self.add_node(NodeKind::Gain(gain))
    }

    pub fn add_panner(&mut self, params: PannerParams) -> Result<NodeId> {
        self.ensure_open()?;
        let mut spatializer = match self.spatializer.take() {
            Some(spatializer) => spatializer,
            None => Spatializer::new(self.sample_rate, RENDER_QUANTUM)?,
        };
        let voice = spatializer.add_voice(params.clone());
        self.spatializer = Some(spatializer);
        let voice = voice?;
        self.add_node(NodeKind::Panner(PannerNode { params, voice }))
    }

    pub fn connect(&mut self, from: NodeId, to: Output) -> Result<()> {
        self.ensure_open()?;
        if let Output::Node(target) = to {
            if target == from {
                return Err(TracksideError::Graph(format!(
                    "Cannot connect node {} to itself",
                    from.0
                )));
            }
            self.node(target)?;
        }
        self.node_mut(from)?.output = Some(to);
        Ok(())
    }

    pub fn set_loop(&mut self, source: NodeId, looping: bool) -> Result<()> {
        self.source_mut(source)?.looping = looping;
        Ok(())
    }

    pub fn start(&mut self, source: NodeId) -> Result<()> {
        let node = self.source_mut(source)?;
        if node.started {
            return Err(TracksideError::Graph(format!(
                "Source {} already started",
                source.0
            )));
        }
        node.started = true;
        Ok(())
    }

    pub fn is_playing(&self, source: NodeId) -> bool {
        matches!(
            self.nodes.get(source.0).map(|n| &n.kind),
            Some(NodeKind::Source(s)) if s.is_playing()
        )
    }

    pub fn panner(&self, node: NodeId) -> Option<&PannerParams> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Panner(panner)) => Some(&panner.params),
            _ => None,
        }
    }

    pub fn gain(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Gain(gain)) => Some(*gain),
            _ => None,
        }
    }

    pub fn output_of(&self, node: NodeId) -> Option<Output> {
        self.nodes.get(node.0).and_then(|n| n.output)
    }

    pub fn set_listener(&mut self, pose: ListenerPose) {
        self.listener = ListenerParams::new(pose);
    }

    /// Schedules linear ramps of the listener position and forward vector.
    pub fn ramp_listener(&mut self, position: Vec3, forward: Vec3, end_time: f64) {
        let now = self.current_time();
        ListenerParams::ramp(&mut self.listener.position, position, end_time, now);
        ListenerParams::ramp(&mut self.listener.forward, forward, end_time, now);
    }

    pub fn listener_at(&self, time: f64) -> ListenerPose {
        self.listener.pose_at(time)
    }

    /// Fills `out` (interleaved, `channels` wide) with the next block.
    ///
    /// A suspended or closed graph writes silence and its clock stands still.
    pub fn render(&mut self, out: &mut [f32], channels: u16) {
        out.fill(0.0);
        if !self.is_running() || channels == 0 {
            return;
        }

        let channels = channels as usize;
        let frames = out.len() / channels;
        for frame in out.chunks_mut(channels).take(frames) {
            if self.pending_pos >= self.pending.len() {
                self.render_quantum();
            }
            let (left, right) = self.pending[self.pending_pos];
            self.pending_pos += 1;
            if channels == 1 {
                frame[0] = (left + right) * 0.5;
            } else {
                frame[0] = left;
                frame[1] = right;
            }
        }

        self.frames_rendered += frames as u64;
    }

    fn render_quantum(&mut self) {
        let start = (self.quanta_rendered * RENDER_QUANTUM as u64) as f64 / self.sample_rate as f64;
        let listener = self.listener.pose_at(start);

        self.pending.clear();
        self.pending.resize(RENDER_QUANTUM, (0.0, 0.0));
        self.pending_pos = 0;

        for index in 0..self.nodes.len() {
            let NodeKind::Source(source) = &mut self.nodes[index].kind else {
                continue;
            };
            if !source.is_playing() {
                continue;
            }
            source.pull(&mut self.block);

            let mut next = self.nodes[index].output;
            // A chain visits each node at most once
            let mut hops = 0;
            while let Some(Output::Node(id)) = next {
                hops += 1;
                if hops > self.nodes.len() {
                    next = None;
                    break;
                }
                let node = &self.nodes[id.0];
                match &node.kind {
                    NodeKind::Gain(gain) => {
                        for frame in self.block.iter_mut() {
                            frame.0 *= gain;
                            frame.1 *= gain;
                        }
                    }
                    NodeKind::Panner(panner) => {
                        // Panners end the chain and mix through the spatializer
                        if node.output == Some(Output::Destination) {
                            if let Some(spatializer) = self.spatializer.as_mut() {
                                spatializer.feed(panner.voice, &self.block);
                            }
                        }
                        next = None;
                        break;
                    }
                    NodeKind::Source(_) => {
                        next = None;
                        break;
                    }
                }
                next = node.output;
            }

            if next == Some(Output::Destination) {
                for (mixed, frame) in self.pending.iter_mut().zip(&self.block) {
                    mixed.0 += frame.0;
                    mixed.1 += frame.1;
                }
            }
        }

        if let Some(spatializer) = self.spatializer.as_mut() {
            if let Err(e) = spatializer.process(&listener, &mut self.pending) {
                log::error!("Spatial rendering failed: {}", e);
            }
        }
        self.quanta_rendered += 1;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(TracksideError::Graph("Context is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| TracksideError::Graph(format!("Unknown node {}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| TracksideError::Graph(format!("Unknown node {}", id.0)))
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut SourceNode> {
        self.ensure_open()?;
        match &mut self.node_mut(id)?.kind {
            NodeKind::Source(source) => Ok(source),
            _ => Err(TracksideError::Graph(format!(
                "Node {} is not a source",
                id.0
            ))),
        }
    }
}
