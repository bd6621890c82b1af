use crate::error::{Result, TracksideError};
use crate::render::{
    AudioGraph, GraphContext, OutputDesc, OutputStream, RenderBackend, RenderContext, SessionKind,
};
use std::sync::{Arc, Mutex};

/// Plays every context through its own stream on the default output device.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    desc: OutputDesc,
}

impl CpalBackend {
    pub fn new(desc: OutputDesc) -> Self {
        Self { desc }
    }
}

impl RenderBackend for CpalBackend {
    fn create_context(&self, kind: SessionKind) -> Result<Box<dyn RenderContext>> {
        let graph = Arc::new(Mutex::new(AudioGraph::new(self.desc.sample_rate)));
        let output = OutputStream::open(self.desc, Arc::clone(&graph))?;
        log::debug!("Created {} context on the default output device", kind);
        Ok(Box::new(GraphContext::with_graph(kind, graph, Some(output))))
    }
}

/// Contexts with no device behind them.
///
/// The backend keeps a handle on every graph it creates so callers can drive
/// the clock with [`render`](Self::render) and inspect what was built.
#[derive(Debug, Default)]
pub struct OfflineBackend {
    sample_rate: u32,
    created: Mutex<Vec<(SessionKind, Arc<Mutex<AudioGraph>>)>>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Graphs of every context created so far, oldest first.
    pub fn graphs(&self, kind: SessionKind) -> Vec<Arc<Mutex<AudioGraph>>> {
        self.created
            .lock()
            .map(|created| {
                created
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, graph)| Arc::clone(graph))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Graph of the most recently created context of `kind`.
    pub fn latest(&self, kind: SessionKind) -> Option<Arc<Mutex<AudioGraph>>> {
        self.graphs(kind).pop()
    }

    /// Renders `frames` frames on the most recent context of `kind` and
    /// returns them interleaved stereo.
    pub fn render(&self, kind: SessionKind, frames: usize) -> Result<Vec<f32>> {
        let graph = self
            .latest(kind)
            .ok_or_else(|| TracksideError::Engine(format!("No {} context created", kind)))?;
        let mut out = vec![0.0; frames * 2];
        graph
            .lock()
            .map_err(|_| TracksideError::Engine(format!("{} graph lock poisoned", kind)))?
            .render(&mut out, 2);
        Ok(out)
    }
}

impl RenderBackend for OfflineBackend {
    fn create_context(&self, kind: SessionKind) -> Result<Box<dyn RenderContext>> {
        let graph = Arc::new(Mutex::new(AudioGraph::new(self.sample_rate)));
        self.created
            .lock()
            .map_err(|_| TracksideError::Engine("offline backend lock poisoned".into()))?
            .push((kind, Arc::clone(&graph)));
        Ok(Box::new(GraphContext::with_graph(kind, graph, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_backend_tracks_contexts() {
        let backend = OfflineBackend::new(48000);
        assert!(backend.latest(SessionKind::Ambient).is_none());
        assert!(backend.render(SessionKind::Ambient, 10).is_err());

        let mut first = backend.create_context(SessionKind::Ambient).unwrap();
        let _positional = backend.create_context(SessionKind::Positional).unwrap();
        let second = backend.create_context(SessionKind::Ambient).unwrap();
        first.close().unwrap();

        assert_eq!(backend.graphs(SessionKind::Ambient).len(), 2);
        assert_eq!(backend.graphs(SessionKind::Positional).len(), 1);

        backend.render(SessionKind::Ambient, 4800).unwrap();
        assert!((second.current_time() - 0.1).abs() < 1e-9);
        assert_eq!(first.current_time(), 0.0);
    }
}
