//! Process-wide cache of decoded sound files.
//!
//! Decodes are single-flight: the first caller for a path performs the decode
//! while concurrent callers for the same path wait on its slot and receive the
//! same buffer. Entries are never evicted. A failed decode leaves no entry
//! behind so the next call tries again. A decoder panic counts as a failed
//! decode.

use crate::audio_data::{AudioDataLoader, DecodedBuffer, DefaultAudioLoader, LoadOptions};
use crate::error::{SoundLoadError, TracksideError};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

type LoadResult = std::result::Result<Arc<DecodedBuffer>, SoundLoadError>;

enum Slot {
    Ready(Arc<DecodedBuffer>),
    Loading(Arc<Flight>),
}

/// An in-flight decode other callers can wait on.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<LoadResult>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, result: LoadResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.done.notify_all();
    }

    fn wait(&self, path: &Path) -> LoadResult {
        let mut slot = self.result.lock().map_err(|_| poisoned(path))?;
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.done.wait(slot).map_err(|_| poisoned(path))?;
        }
    }
}

fn poisoned(path: &Path) -> SoundLoadError {
    SoundLoadError::new(
        path,
        TracksideError::Engine("buffer cache lock poisoned".to_string()),
    )
}

enum Role {
    Owner(Arc<Flight>),
    Waiter(Arc<Flight>),
}

pub struct BufferCache {
    loader: Arc<dyn AudioDataLoader>,
    options: LoadOptions,
    sound_dir: PathBuf,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl BufferCache {
    /// Cache decoding with Symphonia and resampling to `sample_rate`.
    pub fn new(sound_dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self::with_loader(
            Arc::new(DefaultAudioLoader),
            sound_dir,
            LoadOptions::new().target_sample_rate(sample_rate),
        )
    }

    pub fn with_loader(
        loader: Arc<dyn AudioDataLoader>,
        sound_dir: impl Into<PathBuf>,
        options: LoadOptions,
    ) -> Self {
        Self {
            loader,
            options,
            sound_dir: sound_dir.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn sound_dir(&self) -> &Path {
        &self.sound_dir
    }

    /// Returns the decoded buffer for `path`, decoding it on first use.
    ///
    /// `path` is resolved against the sound directory. Blocks while another
    /// thread is decoding the same path.
    pub fn get_or_load(&self, path: &Path) -> LoadResult {
        let role = {
            let mut slots = self.lock_slots(path)?;
            match slots.get(path) {
                Some(Slot::Ready(buffer)) => return Ok(Arc::clone(buffer)),
                Some(Slot::Loading(flight)) => Role::Waiter(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::default());
                    slots.insert(path.to_path_buf(), Slot::Loading(Arc::clone(&flight)));
                    Role::Owner(flight)
                }
            }
        };

        match role {
            Role::Waiter(flight) => {
                log::debug!("Waiting for in-flight decode of {}", path.display());
                flight.wait(path)
            }
            Role::Owner(flight) => {
                let result = self.decode(path);

                // The slot must leave the Loading state or waiters block forever
                let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
                match &result {
                    Ok(buffer) => {
                        slots.insert(path.to_path_buf(), Slot::Ready(Arc::clone(buffer)));
                    }
                    Err(_) => {
                        slots.remove(path);
                    }
                }
                drop(slots);

                flight.complete(result.clone());
                result
            }
        }
    }

    /// Non-blocking probe: the buffer if it has already been decoded.
    pub fn cached(&self, path: &Path) -> Option<Arc<DecodedBuffer>> {
        let slots = self.slots.lock().ok()?;
        match slots.get(path) {
            Some(Slot::Ready(buffer)) => Some(Arc::clone(buffer)),
            _ => None,
        }
    }

    /// Number of decoded buffers held.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| {
                slots
                    .values()
                    .filter(|slot| matches!(slot, Slot::Ready(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn decode(&self, path: &Path) -> LoadResult {
        let full_path = self.sound_dir.join(path);
        log::debug!("Decoding {}", full_path.display());
        match panic::catch_unwind(AssertUnwindSafe(|| {
            self.loader.load(&full_path, &self.options)
        })) {
            Ok(result) => result
                .map(Arc::new)
                .map_err(|cause| SoundLoadError::new(path, cause)),
            Err(_) => {
                log::error!("Decoder panicked on {}", full_path.display());
                Err(SoundLoadError::new(
                    path,
                    TracksideError::AudioLoading("decoder panicked".to_string()),
                ))
            }
        }
    }

    fn lock_slots(
        &self,
        path: &Path,
    ) -> std::result::Result<MutexGuard<'_, HashMap<PathBuf, Slot>>, SoundLoadError> {
        self.slots.lock().map_err(|_| poisoned(path))
    }
}

impl std::fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCache")
            .field("sound_dir", &self.sound_dir)
            .field("buffers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Counts decodes; fails the first `failures` calls.
    struct CountingLoader {
        calls: AtomicUsize,
        failures: usize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(failures: usize, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AudioDataLoader for CountingLoader {
        fn load(&self, _path: &Path, _options: &LoadOptions) -> Result<DecodedBuffer> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if call < self.failures {
                return Err(TracksideError::AudioLoading("corrupt frame".to_string()));
            }
            Ok(DecodedBuffer::new(vec![0.25; 480], 48000, 1))
        }
    }

    /// Panics on the first call, decodes afterwards.
    struct PanickingLoader {
        calls: AtomicUsize,
    }

    impl AudioDataLoader for PanickingLoader {
        fn load(&self, _path: &Path, _options: &LoadOptions) -> Result<DecodedBuffer> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("malformed header");
            }
            Ok(DecodedBuffer::new(vec![0.5; 64], 48000, 1))
        }
    }

    fn cache(loader: Arc<CountingLoader>) -> BufferCache {
        BufferCache::with_loader(loader, "sounds", LoadOptions::default())
    }

    #[test]
    fn test_second_call_hits_cache() {
        let loader = CountingLoader::new(0, Duration::ZERO);
        let cache = cache(Arc::clone(&loader));
        let path = Path::new("birds.mp3");

        assert!(cache.cached(path).is_none());
        let first = cache.get_or_load(path).unwrap();
        let second = cache.get_or_load(path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &cache.cached(path).unwrap()));
        assert_eq!(loader.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_decode() {
        let loader = CountingLoader::new(0, Duration::from_millis(300));
        let cache = Arc::new(cache(Arc::clone(&loader)));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_load(Path::new("crowd.mp3")).unwrap()
                })
            })
            .collect();

        let buffers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loader.calls(), 1);
        for buffer in &buffers[1..] {
            assert!(Arc::ptr_eq(&buffers[0], buffer));
        }
    }

    #[test]
    fn test_failure_is_not_cached() {
        let loader = CountingLoader::new(1, Duration::ZERO);
        let cache = cache(Arc::clone(&loader));
        let path = Path::new("engine.mp3");

        let err = cache.get_or_load(path).unwrap_err();
        assert_eq!(err.path, PathBuf::from("engine.mp3"));
        assert!(cache.cached(path).is_none());

        assert!(cache.get_or_load(path).is_ok());
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn test_waiters_receive_the_failure() {
        let loader = CountingLoader::new(1, Duration::from_millis(300));
        let cache = Arc::new(cache(Arc::clone(&loader)));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_load(Path::new("horn.mp3")).is_err()
                })
            })
            .collect();

        let failed: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(failed, vec![true, true]);
        assert_eq!(loader.calls(), 1);
    }

    #[test]
    fn test_decoder_panic_releases_the_slot() {
        let loader = Arc::new(PanickingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(BufferCache::with_loader(
            loader,
            "sounds",
            LoadOptions::default(),
        ));
        let path = Path::new("pit_lane.mp3");

        let err = cache.get_or_load(path).unwrap_err();
        assert_eq!(err.path, PathBuf::from("pit_lane.mp3"));
        assert!(err.to_string().contains("decoder panicked"));
        assert!(cache.cached(path).is_none());

        // A later caller decodes again instead of waiting on the dead flight
        let (done, finished) = crossbeam_channel::bounded(1);
        let retry = Arc::clone(&cache);
        thread::spawn(move || {
            let _ = done.send(retry.get_or_load(Path::new("pit_lane.mp3")).is_ok());
        });
        assert_eq!(finished.recv_timeout(Duration::from_secs(5)), Ok(true));
        assert_eq!(cache.len(), 1);
    }
}
