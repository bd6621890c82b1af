//! Ownership of the two rendering sessions and the voices of the current track.

use crate::audio_data::DecodedBuffer;
use crate::cache::BufferCache;
use crate::catalog::{SoundCatalog, TrackId};
use crate::config::SoundDefinition;
use crate::error::Result;
use crate::events::LoadCompletion;
use crate::loader_pool::{LoadDispatcher, LoadJob};
use crate::math::ListenerPose;
use crate::render::{RenderBackend, SessionKind};
use crate::session::RenderingSession;
use crate::voice::SpatialVoice;
use std::sync::Arc;

/// Builds, tears down, suspends and resumes the positional and ambient
/// sessions.
///
/// Every [`load_track`](Self::load_track) starts a new load generation.
/// Decodes dispatched in an earlier generation are discarded when they
/// complete, so a voice of a previous track never attaches to the sessions of
/// the current one.
pub struct AudioSessionManager {
    backend: Arc<dyn RenderBackend>,
    catalog: SoundCatalog,
    cache: Arc<BufferCache>,
    loader: Box<dyn LoadDispatcher>,
    positional: RenderingSession,
    ambient: RenderingSession,
    generation: u64,
    current_track: Option<TrackId>,
    pending_loads: usize,
}

impl AudioSessionManager {
    /// Creates both sessions, suspended and empty.
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        catalog: SoundCatalog,
        cache: Arc<BufferCache>,
        loader: Box<dyn LoadDispatcher>,
    ) -> Result<Self> {
        let mut positional = RenderingSession::new(backend.create_context(SessionKind::Positional)?);
        let mut ambient = RenderingSession::new(backend.create_context(SessionKind::Ambient)?);
        positional.suspend()?;
        ambient.suspend()?;

        Ok(Self {
            backend,
            catalog,
            cache,
            loader,
            positional,
            ambient,
            generation: 0,
            current_track: None,
            pending_loads: 0,
        })
    }

    /// Replaces both sessions with fresh ones holding the sounds of `track`.
    ///
    /// The new sessions start suspended. Sounds whose buffer is cached are
    /// wired immediately; the rest are decoded in the background and wired by
    /// [`on_sound_loaded`](Self::on_sound_loaded).
    pub fn load_track(&mut self, track: &TrackId) -> Result<()> {
        self.generation += 1;
        self.pending_loads = 0;
        log::info!("Load sounds for track: {}", track);

        self.close_sessions();
        self.current_track = Some(track.clone());

        self.positional = RenderingSession::new(self.backend.create_context(SessionKind::Positional)?);
        self.ambient = RenderingSession::new(self.backend.create_context(SessionKind::Ambient)?);
        self.positional
            .context_mut()
            .set_listener(ListenerPose::identity())?;
        self.positional.suspend()?;
        self.ambient.suspend()?;

        let definitions = self.catalog.lookup(track);
        if definitions.is_empty() {
            log::info!("No sounds configured for track {}", track);
        }

        for (index, definition) in definitions.into_iter().enumerate() {
            match self.cache.cached(&definition.file) {
                Some(buffer) => {
                    log::info!(
                        "Read sound #{} from cache: {}",
                        index + 1,
                        definition.describe()
                    );
                    self.attach(index, &definition, buffer);
                }
                None => {
                    log::info!(
                        "Read sound #{} from file: {}",
                        index + 1,
                        definition.describe()
                    );
                    let file = definition.file.clone();
                    let job = LoadJob {
                        generation: self.generation,
                        index,
                        definition,
                    };
                    match self.loader.dispatch(job) {
                        Ok(()) => self.pending_loads += 1,
                        Err(e) => log::error!("Failed to load sound {}: {}", file.display(), e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Wires the voice of a finished decode, unless it belongs to an earlier
    /// load generation.
    pub fn on_sound_loaded(&mut self, completion: LoadCompletion) {
        if completion.generation != self.generation {
            log::warn!(
                "Discarding sound #{} ({}) from load generation {}, current is {}",
                completion.index + 1,
                completion.definition.file.display(),
                completion.generation,
                self.generation
            );
            return;
        }

        self.pending_loads = self.pending_loads.saturating_sub(1);

        match completion.result {
            Ok(buffer) => self.attach(completion.index, &completion.definition, buffer),
            Err(e) => log::error!("{}", e),
        }
    }

    /// Closes both sessions and drops every voice. Outstanding decodes are
    /// discarded when they complete.
    pub fn unload(&mut self) {
        self.generation += 1;
        self.pending_loads = 0;
        self.current_track = None;
        self.close_sessions();
    }

    pub fn pause_positional(&mut self) -> Result<()> {
        Self::set_running(&mut self.positional, false)
    }

    pub fn resume_positional(&mut self) -> Result<()> {
        Self::set_running(&mut self.positional, true)
    }

    pub fn pause_ambient(&mut self) -> Result<()> {
        Self::set_running(&mut self.ambient, false)
    }

    pub fn resume_ambient(&mut self) -> Result<()> {
        Self::set_running(&mut self.ambient, true)
    }

    pub fn pause_all(&mut self) -> Result<()> {
        self.pause_positional()?;
        self.pause_ambient()
    }

    pub fn session(&self, kind: SessionKind) -> &RenderingSession {
        match kind {
            SessionKind::Positional => &self.positional,
            SessionKind::Ambient => &self.ambient,
        }
    }

    pub fn session_mut(&mut self, kind: SessionKind) -> &mut RenderingSession {
        match kind {
            SessionKind::Positional => &mut self.positional,
            SessionKind::Ambient => &mut self.ambient,
        }
    }

    pub fn is_running(&self, kind: SessionKind) -> bool {
        self.session(kind).is_running()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_track(&self) -> Option<&TrackId> {
        self.current_track.as_ref()
    }

    /// Decodes dispatched in the current generation that have not completed.
    pub fn pending_loads(&self) -> usize {
        self.pending_loads
    }

    pub fn cache(&self) -> &Arc<BufferCache> {
        &self.cache
    }

    fn set_running(session: &mut RenderingSession, running: bool) -> Result<()> {
        let changed = if running {
            session.resume()?
        } else {
            session.suspend()?
        };
        if changed {
            log::info!(
                "{}: {}",
                session.kind().label(),
                if running { "on" } else { "off" }
            );
        }
        Ok(())
    }

    fn attach(&mut self, index: usize, definition: &SoundDefinition, buffer: Arc<DecodedBuffer>) {
        let session = if definition.is_positional() {
            &mut self.positional
        } else {
            &mut self.ambient
        };

        match SpatialVoice::build(session.context_mut(), index, definition, buffer) {
            Ok(voice) => {
                log::info!("Sound #{} loaded: {}", index + 1, definition.describe());
                session.add_voice(voice);
            }
            Err(e) => log::error!(
                "Failed to load sound {}: {}",
                definition.file.display(),
                e
            ),
        }
    }

    fn close_sessions(&mut self) {
        for session in [&mut self.positional, &mut self.ambient] {
            if let Err(e) = session.close() {
                log::warn!("Failed to close {} session: {}", session.kind(), e);
            }
        }
    }
}

impl Drop for AudioSessionManager {
    fn drop(&mut self) {
        self.close_sessions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::{AudioDataLoader, LoadOptions};
    use crate::error::TracksideError;
    use crate::math::Vec3;
    use crate::render::{Output, OfflineBackend};
    use crossbeam_channel::Receiver;
    use std::path::Path;

    /// Decodes any file to a short tone, except names starting with `missing`.
    struct StubLoader;

    impl AudioDataLoader for StubLoader {
        fn load(&self, path: &Path, _options: &LoadOptions) -> Result<DecodedBuffer> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with("missing") {
                return Err(TracksideError::AudioLoading(format!("{} not found", name)));
            }
            Ok(DecodedBuffer::new(vec![0.5; 480], 48000, 1))
        }
    }

    struct Fixture {
        backend: Arc<OfflineBackend>,
        manager: AudioSessionManager,
        jobs: Receiver<LoadJob>,
    }

    impl Fixture {
        fn new(catalog: SoundCatalog) -> Self {
            let backend = Arc::new(OfflineBackend::new(48000));
            let cache = Arc::new(BufferCache::with_loader(
                Arc::new(StubLoader),
                "sounds",
                LoadOptions::default(),
            ));
            let (dispatcher, jobs) = crossbeam_channel::unbounded::<LoadJob>();
            let manager = AudioSessionManager::new(
                backend.clone(),
                catalog,
                cache,
                Box::new(dispatcher),
            )
            .unwrap();
            Self {
                backend,
                manager,
                jobs,
            }
        }

        fn take_jobs(&self) -> Vec<LoadJob> {
            self.jobs.try_iter().collect()
        }

        fn complete(&mut self, jobs: Vec<LoadJob>) {
            for job in jobs {
                let result = self.manager.cache().get_or_load(&job.definition.file);
                self.manager.on_sound_loaded(LoadCompletion {
                    generation: job.generation,
                    index: job.index,
                    definition: job.definition,
                    result,
                });
            }
        }

        fn files(&self, kind: SessionKind) -> Vec<String> {
            self.manager
                .session(kind)
                .voices()
                .iter()
                .map(|v| v.definition.file.display().to_string())
                .collect()
        }
    }

    fn two_track_catalog() -> SoundCatalog {
        SoundCatalog::builder()
            .track(
                "AA",
                [
                    SoundDefinition::ambient("a-birds.mp3", 1.0),
                    SoundDefinition::positional("a-crowd.mp3", Vec3::new(1.0, 2.0, 3.0), 1.0),
                ],
            )
            .track(
                "BB",
                [
                    SoundDefinition::ambient("b-wind.mp3", 1.0),
                    SoundDefinition::positional("b-horn.mp3", Vec3::new(4.0, 5.0, 6.0), 1.0),
                ],
            )
            .build()
    }

    #[test]
    fn test_starts_paused_without_track() {
        let fixture = Fixture::new(SoundCatalog::default());
        assert!(!fixture.manager.is_running(SessionKind::Positional));
        assert!(!fixture.manager.is_running(SessionKind::Ambient));
        assert!(fixture.manager.current_track().is_none());
        assert_eq!(fixture.manager.generation(), 0);
    }

    #[test]
    fn test_ambient_and_positional_voices() {
        let catalog = SoundCatalog::builder()
            .track(
                "BL1",
                [
                    SoundDefinition::ambient("birds.mp3", 0.5),
                    SoundDefinition::positional("crowd.mp3", Vec3::new(10.0, 0.0, 0.0), 1.0),
                ],
            )
            .build();
        let mut fixture = Fixture::new(catalog);

        fixture.manager.load_track(&TrackId::new("BL1")).unwrap();
        assert_eq!(fixture.manager.pending_loads(), 2);
        assert!(!fixture.manager.is_running(SessionKind::Positional));
        assert!(!fixture.manager.is_running(SessionKind::Ambient));

        let jobs = fixture.take_jobs();
        fixture.complete(jobs);
        assert_eq!(fixture.manager.pending_loads(), 0);

        let ambient = fixture.manager.session(SessionKind::Ambient);
        assert_eq!(ambient.voices().len(), 1);
        let voice = &ambient.voices()[0];
        assert!(voice.panner.is_none());
        assert_eq!(ambient.context().panner_params(voice.gain), None);

        let positional = fixture.manager.session(SessionKind::Positional);
        assert_eq!(positional.voices().len(), 1);
        let panner = positional.voices()[0].panner.unwrap();
        let params = positional.context().panner_params(panner).unwrap();
        assert_eq!(params.position, Vec3::new(10.0, 0.0, 0.0));

        let graph = fixture.backend.latest(SessionKind::Ambient).unwrap();
        let graph = graph.lock().unwrap();
        assert_eq!(graph.gain(voice.gain), Some(0.5));
        assert_eq!(graph.output_of(voice.gain), Some(Output::Destination));
        assert_eq!(graph.playing_sources(), 1);
    }

    #[test]
    fn test_stale_loads_never_attach() {
        let mut fixture = Fixture::new(two_track_catalog());

        fixture.manager.load_track(&TrackId::new("AA")).unwrap();
        let a_jobs = fixture.take_jobs();
        fixture.manager.load_track(&TrackId::new("BB")).unwrap();
        let b_jobs = fixture.take_jobs();
        assert_eq!(a_jobs.len(), 2);
        assert_eq!(b_jobs.len(), 2);

        fixture.complete(a_jobs);
        assert!(fixture.files(SessionKind::Ambient).is_empty());
        assert!(fixture.files(SessionKind::Positional).is_empty());

        fixture.complete(b_jobs);
        assert_eq!(fixture.files(SessionKind::Ambient), vec!["b-wind.mp3"]);
        assert_eq!(fixture.files(SessionKind::Positional), vec!["b-horn.mp3"]);

        // Contexts of the first load were closed before anything was wired
        for kind in [SessionKind::Ambient, SessionKind::Positional] {
            let graphs = fixture.backend.graphs(kind);
            assert_eq!(graphs.len(), 3);
            let first_load = graphs[1].lock().unwrap();
            assert!(first_load.is_closed());
            assert_eq!(first_load.node_count(), 0);
        }
    }

    #[test]
    fn test_cached_sounds_attach_synchronously() {
        let mut fixture = Fixture::new(two_track_catalog());
        let track = TrackId::new("AA");

        fixture.manager.load_track(&track).unwrap();
        let jobs = fixture.take_jobs();
        fixture.complete(jobs);
        let first_generation = fixture.manager.generation();

        fixture.manager.load_track(&track).unwrap();
        assert!(fixture.take_jobs().is_empty());
        assert_eq!(fixture.manager.pending_loads(), 0);
        assert_eq!(fixture.manager.generation(), first_generation + 1);
        assert_eq!(fixture.files(SessionKind::Ambient), vec!["a-birds.mp3"]);
        assert_eq!(fixture.files(SessionKind::Positional), vec!["a-crowd.mp3"]);
    }

    #[test]
    fn test_failed_sound_is_skipped() {
        let catalog = SoundCatalog::builder()
            .track(
                "SO",
                [
                    SoundDefinition::ambient("missing.mp3", 1.0),
                    SoundDefinition::ambient("rain.mp3", 1.0),
                ],
            )
            .build();
        let mut fixture = Fixture::new(catalog);

        fixture.manager.load_track(&TrackId::new("SO")).unwrap();
        let jobs = fixture.take_jobs();
        fixture.complete(jobs);

        assert_eq!(fixture.files(SessionKind::Ambient), vec!["rain.mp3"]);
        assert_eq!(fixture.manager.session(SessionKind::Ambient).voices()[0].index, 1);
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let mut fixture = Fixture::new(two_track_catalog());
        fixture.manager.load_track(&TrackId::new("AA")).unwrap();
        let manager = &mut fixture.manager;

        manager.resume_positional().unwrap();
        manager.resume_positional().unwrap();
        assert!(manager.is_running(SessionKind::Positional));
        assert!(!manager.is_running(SessionKind::Ambient));

        manager.resume_ambient().unwrap();
        manager.resume_ambient().unwrap();
        assert!(manager.is_running(SessionKind::Ambient));

        manager.pause_positional().unwrap();
        manager.pause_positional().unwrap();
        assert!(!manager.is_running(SessionKind::Positional));
        assert!(manager.is_running(SessionKind::Ambient));

        manager.pause_ambient().unwrap();
        manager.pause_ambient().unwrap();
        assert!(!manager.is_running(SessionKind::Ambient));
    }

    #[test]
    fn test_listener_reset_on_load() {
        let mut fixture = Fixture::new(two_track_catalog());
        fixture.manager.load_track(&TrackId::new("AA")).unwrap();
        fixture
            .manager
            .session_mut(SessionKind::Positional)
            .context_mut()
            .set_listener(ListenerPose::new(Vec3::splat(5.0), Vec3::X, Vec3::Y))
            .unwrap();

        fixture.manager.load_track(&TrackId::new("BB")).unwrap();
        let pose = fixture
            .manager
            .session(SessionKind::Positional)
            .context()
            .listener_at(0.0);
        assert_eq!(pose, ListenerPose::identity());
    }

    #[test]
    fn test_unload_discards_outstanding_loads() {
        let mut fixture = Fixture::new(two_track_catalog());
        fixture.manager.load_track(&TrackId::new("AA")).unwrap();
        let jobs = fixture.take_jobs();

        fixture.manager.unload();
        fixture.complete(jobs);

        assert!(fixture.manager.current_track().is_none());
        assert!(fixture.manager.session(SessionKind::Ambient).context().is_closed());
        assert!(fixture.files(SessionKind::Ambient).is_empty());
        fixture.manager.resume_ambient().unwrap();
        assert!(!fixture.manager.is_running(SessionKind::Ambient));
    }
}
