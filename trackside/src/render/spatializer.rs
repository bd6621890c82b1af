use crate::config::PannerParams;
use crate::error::{Result, TracksideError};
use crate::math::ListenerPose;
use crate::render::panner;
use audionimbus::{
    AirAbsorptionModel, AmbisonicsDecodeEffect, AmbisonicsDecodeEffectParams,
    AmbisonicsDecodeEffectSettings, AmbisonicsEncodeEffect, AmbisonicsEncodeEffectParams,
    AmbisonicsEncodeEffectSettings, AudioBufferSettings, AudioSettings, Context, ContextSettings,
    CoordinateSystem, Direct, DirectEffect, DirectEffectParams, DirectEffectSettings,
    DirectSimulationParameters, DirectSimulationSettings, Direction, DistanceAttenuationModel,
    Equalizer, Hrtf, HrtfSettings, Point, Scene, SceneParams, SceneSettings, SimulationFlags,
    SimulationInputs, SimulationSharedInputs, Simulator, Source, SourceSettings, SpeakerLayout,
    Vector3, VolumeNormalization, audio_buffer::AudioBuffer as NimbusBuffer, geometry,
};
use std::fmt;

/// Second-order ambisonics
const AMBISONICS_CHANNELS: usize = 9;

fn nimbus_error<E: fmt::Display>(what: &'static str) -> impl FnOnce(E) -> TracksideError {
    move |e| TracksideError::SpatialAudio(format!("{}: {}", what, e))
}

/// Steam Audio state of one panner.
struct SpatialVoiceEffects {
    params: PannerParams,
    source: Source,
    direct_effect: DirectEffect,
    encode_effect: AmbisonicsEncodeEffect,
    /// Mono input gathered for the current quantum
    input: Vec<f32>,
    fed: bool,
    /// Gain reached at the end of the previous quantum
    gain: Option<f32>,
}

/// Binaural rendering of every panner in one graph.
///
/// Each quantum the simulator computes per-source distance attenuation and
/// air absorption for the current listener pose. The attenuation is ramped
/// per sample from its previous value, air absorption goes through a direct
/// effect, and every source is encoded into a shared second-order ambisonics
/// field that is decoded to stereo through the HRTF.
pub(crate) struct Spatializer {
    context: Context,
    simulator: Simulator<Direct>,
    #[allow(dead_code)] // Must outlive the simulator
    scene: Scene,
    hrtf: Hrtf,
    decode_effect: AmbisonicsDecodeEffect,
    voices: Vec<SpatialVoiceEffects>,
    frame_size: usize,
    sample_rate: u32,

    direct_buf: Vec<f32>,
    encoded_buf: Vec<f32>,
    summed_buf: Vec<f32>,
    decoded_buf: Vec<f32>,
    binaural_buf: Vec<f32>,
}

impl Spatializer {
    pub fn new(sample_rate: u32, frame_size: usize) -> Result<Self> {
        log::debug!(
            "Creating spatializer ({} Hz, {} frames per quantum)",
            sample_rate,
            frame_size
        );

        let context = Context::try_new(&ContextSettings::default())
            .map_err(nimbus_error("Failed to create Steam Audio context"))?;
        let audio_settings = AudioSettings {
            sampling_rate: sample_rate,
            frame_size: frame_size as u32,
        };

        let hrtf = Hrtf::try_new(
            &context,
            &audio_settings,
            &HrtfSettings {
                volume_normalization: VolumeNormalization::None,
                sofa_information: None,
                ..Default::default()
            },
        )
        .map_err(nimbus_error("Failed to create HRTF"))?;

        let decode_effect = AmbisonicsDecodeEffect::try_new(
            &context,
            &audio_settings,
            &AmbisonicsDecodeEffectSettings {
                max_order: 2,
                speaker_layout: SpeakerLayout::Stereo,
                hrtf: &hrtf,
            },
        )
        .map_err(nimbus_error("Failed to create ambisonics decoder"))?;

        let mut simulator = Simulator::builder(SceneParams::Default, sample_rate, frame_size as u32)
            .with_direct(DirectSimulationSettings {
                max_num_occlusion_samples: 32,
            })
            .try_build(&context)
            .map_err(nimbus_error("Failed to create simulator"))?;

        let scene = Scene::try_new(&context, &SceneSettings::default())
            .map_err(nimbus_error("Failed to create scene"))?;
        simulator.set_scene(&scene);
        simulator.commit();

        Ok(Self {
            context,
            simulator,
            scene,
            hrtf,
            decode_effect,
            voices: Vec::new(),
            frame_size,
            sample_rate,
            direct_buf: vec![0.0; frame_size],
            encoded_buf: vec![0.0; frame_size * AMBISONICS_CHANNELS],
            summed_buf: vec![0.0; frame_size * AMBISONICS_CHANNELS],
            decoded_buf: vec![0.0; frame_size * 2],
            binaural_buf: vec![0.0; frame_size * 2],
        })
    }

    /// Registers a panner and returns its voice index.
    pub fn add_voice(&mut self, params: PannerParams) -> Result<usize> {
        let audio_settings = AudioSettings {
            sampling_rate: self.sample_rate,
            frame_size: self.frame_size as u32,
        };

        let source = Source::try_new(
            &self.simulator,
            &SourceSettings {
                flags: SimulationFlags::DIRECT,
            },
        )
        .map_err(nimbus_error("Failed to create simulation source"))?;

        let direct_effect = DirectEffect::try_new(
            &self.context,
            &audio_settings,
            &DirectEffectSettings { num_channels: 1 },
        )
        .map_err(nimbus_error("Failed to create direct effect"))?;

        let encode_effect = AmbisonicsEncodeEffect::try_new(
            &self.context,
            &audio_settings,
            &AmbisonicsEncodeEffectSettings { max_order: 2 },
        )
        .map_err(nimbus_error("Failed to create ambisonics encoder"))?;

        self.simulator.add_source(&source);
        self.simulator.commit();

        self.voices.push(SpatialVoiceEffects {
            params,
            source,
            direct_effect,
            encode_effect,
            input: vec![0.0; self.frame_size],
            fed: false,
            gain: None,
        });
        Ok(self.voices.len() - 1)
    }

    /// Mixes a stereo block down into the mono input of `voice`.
    pub fn feed(&mut self, voice: usize, block: &[(f32, f32)]) {
        if let Some(voice) = self.voices.get_mut(voice) {
            for (sample, frame) in voice.input.iter_mut().zip(block) {
                *sample += (frame.0 + frame.1) * 0.5;
            }
            voice.fed = true;
        }
    }

    /// Renders every voice fed this quantum and adds the binaural result to
    /// `out`. Clears the voice inputs for the next quantum.
    pub fn process(&mut self, listener: &ListenerPose, out: &mut [(f32, f32)]) -> Result<()> {
        if !self.voices.iter().any(|v| v.fed) {
            return Ok(());
        }

        let result = self.render_voices(listener);
        for voice in &mut self.voices {
            voice.input.fill(0.0);
            voice.fed = false;
        }
        result?;

        for (frame, stereo) in out.iter_mut().zip(self.binaural_buf.chunks(2)) {
            frame.0 += stereo[0];
            frame.1 += stereo[1];
        }
        Ok(())
    }

    fn render_voices(&mut self, listener: &ListenerPose) -> Result<()> {
        self.simulate(listener);
        self.summed_buf.fill(0.0);

        for voice in self.voices.iter_mut().filter(|v| v.fed) {
            let outputs = voice.source.get_outputs(SimulationFlags::DIRECT);
            let direct_outputs = outputs.direct();
            let attenuation = direct_outputs.distance_attenuation.unwrap_or(1.0);
            let air_absorption = direct_outputs
                .air_absorption
                .as_ref()
                .map(|eq| Equalizer([eq[0], eq[1], eq[2]]))
                .unwrap_or(Equalizer([1.0, 1.0, 1.0]));

            let target = attenuation * panner::directivity(&voice.params, listener);
            let from = voice.gain.unwrap_or(target);
            panner::ramp_gain(&mut voice.input, from, target);
            voice.gain = Some(target);

            {
                let input_buf = NimbusBuffer::try_with_data_and_settings(
                    &voice.input,
                    AudioBufferSettings {
                        num_channels: Some(1),
                        ..Default::default()
                    },
                )
                .map_err(nimbus_error("Failed to create input buffer"))?;
                let direct_buf = NimbusBuffer::try_with_data_and_settings(
                    &mut self.direct_buf,
                    AudioBufferSettings {
                        num_channels: Some(1),
                        ..Default::default()
                    },
                )
                .map_err(nimbus_error("Failed to create direct buffer"))?;

                // Attenuation is already ramped into the input
                let params = DirectEffectParams {
                    distance_attenuation: None,
                    air_absorption: Some(air_absorption),
                    directivity: None,
                    occlusion: None,
                    transmission: None,
                };
                voice.direct_effect.apply(&params, &input_buf, &direct_buf);
            }

            {
                let direction = panner::listener_direction(&voice.params, listener);
                let params = AmbisonicsEncodeEffectParams {
                    direction: Direction::new(direction.x, direction.y, direction.z),
                    order: 2,
                };
                let direct_buf = NimbusBuffer::try_with_data_and_settings(
                    &self.direct_buf,
                    AudioBufferSettings {
                        num_channels: Some(1),
                        ..Default::default()
                    },
                )
                .map_err(nimbus_error("Failed to create direct buffer"))?;
                let encoded_buf = NimbusBuffer::try_with_data_and_settings(
                    &mut self.encoded_buf,
                    AudioBufferSettings {
                        num_channels: Some(9),
                        ..Default::default()
                    },
                )
                .map_err(nimbus_error("Failed to create encode buffer"))?;
                voice.encode_effect.apply(&params, &direct_buf, &encoded_buf);
            }

            for (sum, sample) in self.summed_buf.iter_mut().zip(&self.encoded_buf) {
                *sum += sample;
            }
        }

        self.decode()
    }

    fn decode(&mut self) -> Result<()> {
        let params = AmbisonicsDecodeEffectParams {
            order: 2,
            hrtf: &self.hrtf,
            orientation: CoordinateSystem {
                ahead: Vector3::new(0.0, 0.0, -1.0),
                ..Default::default()
            },
            binaural: true,
        };

        {
            let summed_buf = NimbusBuffer::try_with_data_and_settings(
                &self.summed_buf,
                AudioBufferSettings {
                    num_channels: Some(9),
                    ..Default::default()
                },
            )
            .map_err(nimbus_error("Failed to create ambisonics buffer"))?;
            let decoded_buf = NimbusBuffer::try_with_data_and_settings(
                &mut self.decoded_buf,
                AudioBufferSettings {
                    num_channels: Some(2),
                    ..Default::default()
                },
            )
            .map_err(nimbus_error("Failed to create stereo buffer"))?;
            self.decode_effect.apply(&params, &summed_buf, &decoded_buf);
        }

        let decoded_buf = NimbusBuffer::try_with_data_and_settings(
            &mut self.decoded_buf,
            AudioBufferSettings {
                num_channels: Some(2),
                ..Default::default()
            },
        )
        .map_err(nimbus_error("Failed to create stereo buffer"))?;
        decoded_buf.interleave(&self.context, &mut self.binaural_buf);
        Ok(())
    }

    fn simulate(&mut self, listener: &ListenerPose) {
        for voice in self.voices.iter_mut().filter(|v| v.fed) {
            let position = panner::simulated_position(&voice.params, listener);
            let inputs = SimulationInputs {
                source: geometry::CoordinateSystem {
                    origin: Point::new(position.x, position.y, position.z),
                    ..Default::default()
                },
                direct_simulation: Some(DirectSimulationParameters {
                    distance_attenuation: Some(DistanceAttenuationModel::Default),
                    air_absorption: Some(AirAbsorptionModel::Default),
                    directivity: None,
                    occlusion: None,
                }),
                reflections_simulation: None,
                pathing_simulation: None,
            };
            voice.source.set_inputs(SimulationFlags::DIRECT, inputs);
        }
        self.simulator.commit();

        let origin = listener.position;
        let right = listener.right();
        let up = listener.up.normalize_or_zero();
        let ahead = listener.forward.normalize_or_zero();
        let shared_inputs = SimulationSharedInputs {
            listener: geometry::CoordinateSystem {
                origin: Point::new(origin.x, origin.y, origin.z),
                right: Vector3::new(right.x, right.y, right.z),
                up: Vector3::new(up.x, up.y, up.z),
                ahead: Vector3::new(ahead.x, ahead.y, ahead.z),
            },
            num_rays: 1024,
            num_bounces: 10,
            duration: 3.0,
            order: 2,
            irradiance_min_distance: 1.0,
            pathing_visualization_callback: None,
        };
        self.simulator
            .set_shared_inputs(SimulationFlags::DIRECT, &shared_inputs);
        self.simulator.run_direct();
    }
}

impl fmt::Debug for Spatializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spatializer")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("voices", &self.voices.len())
            .finish()
    }
}
