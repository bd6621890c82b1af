//! trackside demo
//!
//! Plays the configured track sounds while replaying a recorded host session.
//!
//! # Usage
//!
//! ```bash
//! trackside-demo --config demos/config.toml --script demos/session.jsonl
//! trackside-demo --no-audio < demos/session.jsonl
//! ```

mod replay;

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use trackside::config::CONFIG_FILE_NAME;
use trackside::*;

#[derive(Parser)]
#[command(name = "trackside-demo")]
#[command(author, version, about = "Track sounds driven by a recorded host session")]
struct Args {
    /// Configuration file
    #[arg(long, short = 'c', default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// JSON Lines event script (reads stdin when omitted)
    #[arg(long, short = 's')]
    script: Option<PathBuf>,

    /// Render into memory instead of the default output device
    #[arg(long)]
    no_audio: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(TracksideError::Config(e)) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    log::info!("Host {}:{}", config.insim.host, config.insim.port);

    let (events, receiver) = event_loop::channel();
    let cache = Arc::new(BufferCache::new(
        &config.render.sound_dir,
        config.render.sample_rate,
    ));
    if cache.sound_dir().is_dir() {
        log::info!("Sounds from {}", cache.sound_dir().display());
    } else {
        log::warn!(
            "Sound directory {} not found, every sound will fail to load",
            cache.sound_dir().display()
        );
    }
    let loader = LoaderPool::spawn(config.render.loader_threads, cache.clone(), events.clone())?;

    let backend: Arc<dyn RenderBackend> = if args.no_audio {
        Arc::new(OfflineBackend::new(config.render.sample_rate))
    } else {
        Arc::new(CpalBackend::new(OutputDesc::from(&config.render)))
    };

    let manager = AudioSessionManager::new(
        backend,
        SoundCatalog::from_config(&config.sounds),
        cache,
        Box::new(loader),
    )?;
    let machine = PlaybackStateMachine::new(
        manager,
        ListenerStateUpdater::new(config.render.interpolation_window),
        config.render.settle_delay,
    );

    let script = args.script.clone();
    let producer = thread::Builder::new()
        .name("event-replay".to_string())
        .spawn(move || -> Result<usize> {
            let start = Instant::now();
            let sent = match script {
                Some(path) => {
                    log::info!("Replaying events from {}", path.display());
                    let file = match File::open(&path) {
                        Ok(file) => file,
                        Err(e) => {
                            let _ = events.send(Event::Shutdown);
                            return Err(anyhow::anyhow!("{}: {}", path.display(), e));
                        }
                    };
                    replay::replay(BufReader::new(file), &events, start)
                }
                None => {
                    log::info!("Replaying events from stdin");
                    replay::replay(std::io::stdin().lock(), &events, start)
                }
            };
            Ok(sent)
        })?;

    let handled = EventLoop::new(machine, receiver).run();

    match producer.join() {
        Ok(Ok(sent)) => log::info!("Replayed {} events, handled {}", sent, handled),
        Ok(Err(e)) => return Err(e),
        Err(_) => anyhow::bail!("event replay thread panicked"),
    }
    Ok(())
}
