//! # trackside
//!
//! Positional and ambient sound for a racing-simulation client, driven by the
//! telemetry of the simulation host.
//!
//! Each track has a set of configured sounds. Ambient sounds play at a fixed
//! level; positional sounds sit at a point on the circuit and are heard
//! relative to the car being viewed. trackside keeps the two groups in two
//! rendering sessions and decides from the host's view and session state when
//! each one plays.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//! use trackside::*;
//!
//! let config = AppConfig::load("config.toml")?;
//! let (events, receiver) = event_loop::channel();
//!
//! let cache = Arc::new(BufferCache::new(&config.render.sound_dir, config.render.sample_rate));
//! let loader = LoaderPool::spawn(config.render.loader_threads, cache.clone(), events.clone())?;
//! let backend = Arc::new(CpalBackend::new(OutputDesc::from(&config.render)));
//!
//! let manager = AudioSessionManager::new(
//!     backend,
//!     SoundCatalog::from_config(&config.sounds),
//!     cache,
//!     Box::new(loader),
//! )?;
//! let machine = PlaybackStateMachine::new(
//!     manager,
//!     ListenerStateUpdater::new(config.render.interpolation_window),
//!     config.render.settle_delay,
//! );
//!
//! // Feed host events from any thread
//! events.send(Event::SessionStarted).ok();
//! events.send(Event::Shutdown).ok();
//!
//! EventLoop::new(machine, receiver).run();
//! # Ok::<(), TracksideError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`SoundCatalog`]**: sound definitions per track code and track family
//! - **[`BufferCache`]**: decoded sound files, decoded once per path
//! - **[`AudioSessionManager`]**: the positional and ambient [`RenderingSession`]s
//! - **[`ListenerStateUpdater`]**: smooths telemetry into listener movement
//! - **[`PlaybackStateMachine`]**: play, pause and reload decisions
//! - **[`EventLoop`]**: the single consumer of every [`Event`]
//!
//! ## Threading
//!
//! 1. **Session thread**: runs the [`EventLoop`] and owns both sessions
//! 2. **Loader threads**: decode sound files and post [`Event::SoundLoaded`]
//! 3. **Audio callbacks**: render each context's graph, silent whenever the
//!    session thread holds the graph lock. Positional graphs spatialize
//!    binaurally through Steam Audio inside the callback.

pub mod audio_data;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod listener;
pub mod loader_pool;
pub mod machine;
pub mod manager;
pub mod math;
pub mod render;
pub mod session;
pub mod state;
pub mod voice;

pub use cache::BufferCache;
pub use catalog::{SoundCatalog, TrackId};
pub use config::{AppConfig, PannerParams, RenderDesc, SoundDefinition};
pub use error::{ConfigValidationError, SoundLoadError, TracksideError, TransportError};
pub use event_loop::EventLoop;
pub use events::{CameraMode, EntityTelemetry, Event, LoadCompletion, SessionPhase, StateUpdate};
pub use listener::ListenerStateUpdater;
pub use loader_pool::{LoadDispatcher, LoadJob, LoaderPool};
pub use machine::PlaybackStateMachine;
pub use manager::AudioSessionManager;
pub use math::{ListenerPose, Vec3};
pub use render::{
    CpalBackend, OfflineBackend, OutputDesc, RenderBackend, RenderContext, SessionKind,
};
pub use session::RenderingSession;
pub use state::{GameState, PlaybackState};
pub use voice::SpatialVoice;
