use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use trackside::*;

/// `step` is the phase advance per frame in radians.
fn write_tone(path: &Path, sample_rate: u32, channels: u16, frames: usize, step: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let value = ((i as f32 * step).sin() * 12000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn config(sound_dir: &Path) -> AppConfig {
    let text = format!(
        r#"
[insim]
port = 29999

[audio]
sound_dir = '{}'
sample_rate = 48000
loader_threads = 2
settle_delay_ms = 50

[[sounds.family.BL]]
file = "birds.wav"
gain = 0.5

[[sounds.track.BL1]]
file = "crowd.wav"
x = 10.0
y = 0.0
z = 0.0

[[sounds.track.BL1]]
file = "broken.wav"
"#,
        sound_dir.display()
    );
    AppConfig::from_toml_str(&text).unwrap()
}

fn sound_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_tone(&dir.path().join("birds.wav"), 44100, 2, 44100, 0.03);
    // High enough for the head shadow to separate the ears
    write_tone(&dir.path().join("crowd.wav"), 48000, 1, 24000, 0.6);
    std::fs::write(dir.path().join("broken.wav"), b"not a wave file").unwrap();
    dir
}

fn state(camera: CameraMode, phase: SessionPhase) -> Event {
    Event::StateChanged(StateUpdate {
        viewed_entity: 4,
        camera,
        track: Some("BL1".to_string()),
        phase,
        ui_overlay: false,
    })
}

#[test]
fn decodes_in_background_and_plays_after_settle() {
    let dir = sound_dir();
    let config = config(dir.path());
    let (events, receiver) = event_loop::channel();

    let backend = Arc::new(OfflineBackend::new(config.render.sample_rate));
    let cache = Arc::new(BufferCache::new(
        &config.render.sound_dir,
        config.render.sample_rate,
    ));
    let loader = LoaderPool::spawn(config.render.loader_threads, cache.clone(), events.clone())
        .unwrap();
    let manager = AudioSessionManager::new(
        backend.clone(),
        SoundCatalog::from_config(&config.sounds),
        cache.clone(),
        Box::new(loader),
    )
    .unwrap();
    let mut machine = PlaybackStateMachine::new(
        manager,
        ListenerStateUpdater::new(config.render.interpolation_window),
        config.render.settle_delay,
    );

    let t0 = Instant::now();
    machine.handle(state(CameraMode::Driver, SessionPhase::NoSession), t0);
    assert_eq!(machine.manager().pending_loads(), 3);

    while machine.manager().pending_loads() > 0 {
        let event = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(event, Event::SoundLoaded(_)));
        machine.handle(event, Instant::now());
    }

    // The broken file was skipped, the others were resampled to the context rate
    let ambient = machine.manager().session(SessionKind::Ambient);
    let positional = machine.manager().session(SessionKind::Positional);
    assert_eq!(ambient.voices().len(), 1);
    assert_eq!(positional.voices().len(), 1);
    let birds = cache.cached(Path::new("birds.wav")).unwrap();
    assert_eq!(birds.sample_rate(), 48000);
    assert!(cache.cached(Path::new("broken.wav")).is_none());

    // Loaded but idle until the session settles
    assert!(!machine.manager().is_running(SessionKind::Ambient));
    machine.handle(Event::SessionStarted, t0);
    machine.poll_timers(t0 + Duration::from_millis(49));
    assert!(!machine.manager().is_running(SessionKind::Ambient));
    machine.poll_timers(t0 + Duration::from_millis(50));
    assert!(machine.manager().is_running(SessionKind::Ambient));
    assert!(machine.manager().is_running(SessionKind::Positional));

    // The crowd is 10 m to the right of the default listener
    let out = backend.render(SessionKind::Positional, 4096).unwrap();
    let left: f32 = out[2048..].iter().step_by(2).map(|s| s * s).sum();
    let right: f32 = out[2049..].iter().step_by(2).map(|s| s * s).sum();
    assert!(right > 0.0);
    assert!(right > left * 2.0);

    // Both channels carry the ambient sound at the same level
    let out = backend.render(SessionKind::Ambient, 8192).unwrap();
    let left: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
    let right: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
    assert!(left > 0.0);
    assert!((left - right).abs() < 1e-3);

    machine.handle(Event::Shutdown, Instant::now());
    assert!(machine.manager().current_track().is_none());
}

#[test]
fn reload_of_known_track_reads_from_cache() {
    let dir = sound_dir();
    let config = config(dir.path());
    let cache = Arc::new(BufferCache::new(
        &config.render.sound_dir,
        config.render.sample_rate,
    ));
    cache.get_or_load(Path::new("birds.wav")).unwrap();
    cache.get_or_load(Path::new("crowd.wav")).unwrap();

    let (jobs, job_receiver) = crossbeam_channel::unbounded::<LoadJob>();
    let mut manager = AudioSessionManager::new(
        Arc::new(OfflineBackend::new(config.render.sample_rate)),
        SoundCatalog::from_config(&config.sounds),
        cache,
        Box::new(jobs),
    )
    .unwrap();

    manager.load_track(&TrackId::new("BL1")).unwrap();

    // Only the file that never decoded goes back to the loader
    let queued: Vec<LoadJob> = job_receiver.try_iter().collect();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].definition.file, Path::new("broken.wav"));
    assert_eq!(manager.session(SessionKind::Ambient).voices().len(), 1);
    assert_eq!(manager.session(SessionKind::Positional).voices().len(), 1);
}

#[test]
fn event_loop_resumes_after_settle_delay() {
    let dir = sound_dir();
    let config = config(dir.path());
    let cache = Arc::new(BufferCache::new(
        &config.render.sound_dir,
        config.render.sample_rate,
    ));
    cache.get_or_load(Path::new("birds.wav")).unwrap();
    cache.get_or_load(Path::new("crowd.wav")).unwrap();

    let (jobs, _job_receiver) = crossbeam_channel::unbounded::<LoadJob>();
    let manager = AudioSessionManager::new(
        Arc::new(OfflineBackend::new(config.render.sample_rate)),
        SoundCatalog::from_config(&config.sounds),
        cache,
        Box::new(jobs),
    )
    .unwrap();
    let machine = PlaybackStateMachine::new(
        manager,
        ListenerStateUpdater::new(config.render.interpolation_window),
        config.render.settle_delay,
    );

    let (events, receiver) = event_loop::channel();
    let producer = thread::spawn(move || {
        events
            .send(state(CameraMode::Driver, SessionPhase::NoSession))
            .unwrap();
        events.send(Event::SessionStarted).unwrap();
        thread::sleep(Duration::from_millis(300));
        events
            .send(Event::Telemetry(vec![EntityTelemetry {
                entity_id: 4,
                x: 65536 * 3,
                y: 65536 * 7,
                z: 65536,
                heading: 0,
            }]))
            .unwrap();
    });

    let mut event_loop = EventLoop::new(machine, receiver);
    let handled = event_loop.run();
    producer.join().unwrap();
    assert_eq!(handled, 3);

    let machine = event_loop.into_machine();
    assert!(machine.manager().is_running(SessionKind::Ambient));
    assert!(machine.manager().is_running(SessionKind::Positional));

    let listener = machine
        .manager()
        .session(SessionKind::Positional)
        .context()
        .listener_at(1.0);
    assert_eq!(listener.position, Vec3::new(3.0, 1.0, 7.0));
}

#[test]
fn invalid_config_reports_every_issue() {
    let err = AppConfig::from_toml_str(
        r#"
[insim]
port = 0

[[sounds.track.BL1]]
file = ""
x = 1.0
gain = -1.0
"#,
    )
    .unwrap_err();

    let text = err.to_string();
    assert!(text.starts_with("Error loading configuration file:"));
    assert!(text.contains("- insim -> port:"));
    assert!(text.contains("- sounds -> track -> BL1 -> 0 -> file:"));
    assert!(text.contains("- sounds -> track -> BL1 -> 0 -> gain:"));
    assert!(err.issues.len() >= 4);
}
