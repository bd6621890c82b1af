use crate::error::Result;
use crate::render::{RenderContext, SessionKind};
use crate::voice::SpatialVoice;

/// A rendering context and the voices playing in it.
///
/// The running flag is the context's own suspend state; suspend and resume
/// act on the whole context at once.
pub struct RenderingSession {
    kind: SessionKind,
    context: Box<dyn RenderContext>,
    voices: Vec<SpatialVoice>,
}

impl RenderingSession {
    pub fn new(context: Box<dyn RenderContext>) -> Self {
        Self {
            kind: context.kind(),
            context,
            voices: Vec::new(),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> &mut dyn RenderContext {
        self.context.as_mut()
    }

    pub fn voices(&self) -> &[SpatialVoice] {
        &self.voices
    }

    pub fn add_voice(&mut self, voice: SpatialVoice) {
        self.voices.push(voice);
    }

    /// Suspends the context. Returns whether the state changed.
    pub fn suspend(&mut self) -> Result<bool> {
        if self.context.is_closed() || !self.context.is_running() {
            return Ok(false);
        }
        self.context.suspend()?;
        Ok(true)
    }

    /// Resumes the context. Returns whether the state changed.
    /// A closed context stays closed.
    pub fn resume(&mut self) -> Result<bool> {
        if self.context.is_closed() || self.context.is_running() {
            return Ok(false);
        }
        self.context.resume()?;
        Ok(true)
    }

    /// Closes the context and drops every voice.
    pub fn close(&mut self) -> Result<()> {
        self.voices.clear();
        if self.context.is_closed() {
            return Ok(());
        }
        self.context.close()
    }
}

impl std::fmt::Debug for RenderingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingSession")
            .field("kind", &self.kind)
            .field("running", &self.is_running())
            .field("voices", &self.voices.len())
            .finish()
    }
}
