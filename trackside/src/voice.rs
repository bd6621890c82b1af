use crate::audio_data::DecodedBuffer;
use crate::config::SoundDefinition;
use crate::error::Result;
use crate::render::{NodeId, Output, RenderContext};
use std::sync::Arc;

/// One playing sound: source → gain → [panner] → destination.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialVoice {
    /// Index of the definition in the track's catalog lookup
    pub index: usize,
    pub definition: SoundDefinition,
    pub source: NodeId,
    pub gain: NodeId,
    pub panner: Option<NodeId>,
}

impl SpatialVoice {
    /// Wires a looping voice for `definition` into `context` and starts it.
    pub fn build(
        context: &mut dyn RenderContext,
        index: usize,
        definition: &SoundDefinition,
        buffer: Arc<DecodedBuffer>,
    ) -> Result<Self> {
        let source = context.create_source(buffer)?;
        let gain = context.create_gain(definition.gain)?;
        context.connect(source, Output::Node(gain))?;

        let panner = match definition.panner_params() {
            Some(params) => {
                let panner = context.create_panner(&params)?;
                context.connect(gain, Output::Node(panner))?;
                context.connect(panner, Output::Destination)?;
                Some(panner)
            }
            None => {
                context.connect(gain, Output::Destination)?;
                None
            }
        };

        context.set_loop(source, true)?;
        context.start(source)?;

        Ok(Self {
            index,
            definition: definition.clone(),
            source,
            gain,
            panner,
        })
    }

    pub fn is_positional(&self) -> bool {
        self.panner.is_some()
    }
}
