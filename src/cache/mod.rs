//! Content-addressable on-disk signal cache.
//!
//! Synthesizing a constellation or a multi-aircraft scene takes seconds;
//! serving the cached buffer takes a file open. The cache canonicalizes
//! request parameters into a stable key, persists quantized sample buffers
//! next to a JSON metadata index, and guarantees at most one concurrent
//! generation per key.
//!
//! ## Layout
//!
//! ```text
//! <cache_dir>/
//!   signal_cache_metadata.json      key -> CacheEntry
//!   gps_gps_l1_<key12>.bin          raw signed 8-bit samples
//!   adsb_adsb_1090_<key12>.bin
//!   ...
//! ```
//!
//! Sample files and the metadata file are written via temp-file + rename so
//! a crash mid-write never leaves the index pointing at a truncated file.

pub mod key;
pub mod pregen;

use crate::types::{SampleBuffer, SignalError, SignalResult};
use key::{cache_key, ParamSchema, Params};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Name of the metadata index file inside the cache directory.
const METADATA_FILENAME: &str = "signal_cache_metadata.json";

/// Metadata for one cached signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Sample file name relative to the cache directory
    pub filename: String,
    /// Signal type ("gps", "adsb", "elrs", "jamming", "raw_energy")
    pub signal_type: String,
    /// Protocol identifier ("gps_l1", "adsb_1090", "elrs_915_jammer", ...)
    pub protocol: String,
    /// Parameters the signal was generated from
    pub parameters: Params,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Signal duration in seconds
    pub duration: f64,
    /// Size of the sample file in bytes
    pub file_size_bytes: u64,
    /// Creation time, seconds since the Unix epoch
    pub created_unix: f64,
    /// MD5 checksum of the file bytes
    pub checksum: String,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStatus {
    /// Entries in the index
    pub total_entries: usize,
    /// Entries whose sample file exists on disk
    pub existing_files: usize,
    /// Total bytes across indexed files
    pub total_bytes: u64,
    /// Entry counts per signal type
    pub type_counts: HashMap<String, usize>,
}

/// Content-addressable signal cache.
///
/// One instance is constructed at process start and shared by reference;
/// there is no hidden global.
pub struct SignalCache {
    cache_dir: PathBuf,
    metadata_path: PathBuf,
    schema: ParamSchema,
    index: Mutex<HashMap<String, CacheEntry>>,
    /// Per-key generation gates: same key blocks, distinct keys run freely.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SignalCache {
    /// Open (or create) a cache rooted at `dir`.
    ///
    /// A corrupt or unreadable metadata file is logged and treated as an
    /// empty cache; pre-generation rebuilds it.
    pub fn open(dir: impl AsRef<Path>) -> SignalResult<Self> {
        let cache_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        let metadata_path = cache_dir.join(METADATA_FILENAME);

        let index = match Self::load_metadata(&metadata_path) {
            Ok(entries) => {
                if !entries.is_empty() {
                    info!(count = entries.len(), "loaded cached signal index");
                }
                entries
            }
            Err(err) => {
                warn!(%err, "cache metadata unreadable, starting empty");
                HashMap::new()
            }
        };

        Ok(Self {
            cache_dir,
            metadata_path,
            schema: ParamSchema::default(),
            index: Mutex::new(index),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Canonical key for a request.
    pub fn cache_key(&self, signal_type: &str, protocol: &str, params: &Params) -> String {
        cache_key(signal_type, protocol, params, &self.schema)
    }

    fn load_metadata(path: &Path) -> SignalResult<HashMap<String, CacheEntry>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| SignalError::Metadata(e.to_string()))
    }

    /// Persist the index atomically. Callers hold the index lock.
    fn save_metadata(&self, index: &HashMap<String, CacheEntry>) -> SignalResult<()> {
        let text = serde_json::to_string_pretty(index)
            .map_err(|e| SignalError::Metadata(e.to_string()))?;
        let tmp = self.metadata_path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.metadata_path)?;
        Ok(())
    }

    /// Look up a cached file by key.
    ///
    /// Returns the path only when the entry is indexed and its file exists.
    /// An entry whose file was deleted externally is purged so the next
    /// request regenerates it.
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        self.lookup_entry(key).map(|(path, _)| path)
    }

    fn lookup_entry(&self, key: &str) -> Option<(PathBuf, f64)> {
        let mut index = self.index.lock().unwrap();
        let entry = index.get(key)?;
        let path = self.cache_dir.join(&entry.filename);
        if path.exists() {
            return Some((path, entry.sample_rate));
        }
        warn!(key, file = %entry.filename, "cached file missing, purging entry");
        index.remove(key);
        if let Err(err) = self.save_metadata(&index) {
            warn!(%err, "failed to persist metadata after purge");
        }
        None
    }

    /// Store a generated buffer under its request identity.
    ///
    /// Idempotent: when the key is already indexed and its file exists, the
    /// existing path is returned and nothing is rewritten.
    pub fn store(
        &self,
        signal_type: &str,
        protocol: &str,
        params: &Params,
        samples: &SampleBuffer,
        sample_rate: f64,
    ) -> SignalResult<PathBuf> {
        let key = self.cache_key(signal_type, protocol, params);
        self.store_with_key(&key, signal_type, protocol, params, samples, sample_rate)
    }

    fn store_with_key(
        &self,
        key: &str,
        signal_type: &str,
        protocol: &str,
        params: &Params,
        samples: &SampleBuffer,
        sample_rate: f64,
    ) -> SignalResult<PathBuf> {
        if let Some((path, _)) = self.lookup_entry(key) {
            return Ok(path);
        }

        let bytes = samples.to_i8_bytes();
        let filename = format!("{}_{}_{}.bin", signal_type, protocol, &key[..12]);
        let path = self.cache_dir.join(&filename);

        // Durable-atomic write: a crash here leaves only a stray temp file.
        let tmp = self.cache_dir.join(format!(".{}.tmp", &key[..12]));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        let checksum = format!("{:x}", Md5::digest(&bytes));
        let created_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let entry = CacheEntry {
            filename: filename.clone(),
            signal_type: signal_type.to_string(),
            protocol: protocol.to_string(),
            parameters: params.clone(),
            sample_rate,
            duration: params.get_f64("duration").unwrap_or(0.0),
            file_size_bytes: bytes.len() as u64,
            created_unix,
            checksum,
        };

        let mut index = self.index.lock().unwrap();
        index.insert(key.to_string(), entry);
        self.save_metadata(&index)?;
        drop(index);

        info!(
            signal_type,
            protocol,
            file = %filename,
            bytes = bytes.len(),
            "cached signal"
        );
        Ok(path)
    }

    /// Serve a request from the cache, generating and storing on miss.
    ///
    /// Concurrent callers for the same key block on a per-key gate and
    /// receive the in-flight result instead of duplicating work; callers for
    /// distinct keys proceed in parallel. Encoder failures cache nothing, so
    /// the next request retries from scratch.
    pub fn get_or_generate<F>(
        &self,
        signal_type: &str,
        protocol: &str,
        params: &Params,
        encoder: F,
    ) -> SignalResult<(PathBuf, f64)>
    where
        F: FnOnce(&Params) -> SignalResult<(SampleBuffer, f64)>,
    {
        let key = self.cache_key(signal_type, protocol, params);

        if let Some(hit) = self.lookup_entry(&key) {
            return Ok(hit);
        }

        let gate = {
            let mut inflight = self.inflight.lock().unwrap();
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().unwrap();

        // A caller that held the gate first may have finished the work.
        if let Some(hit) = self.lookup_entry(&key) {
            self.release_gate(&key);
            return Ok(hit);
        }

        debug!(signal_type, protocol, key = %&key[..12], "cache miss, generating");
        let result = encoder(params).and_then(|(samples, sample_rate)| {
            let path =
                self.store_with_key(&key, signal_type, protocol, params, &samples, sample_rate)?;
            Ok((path, sample_rate))
        });

        self.release_gate(&key);
        result
    }

    /// Drop a key's gate once no generation is pending behind it.
    ///
    /// Waiters still holding the old gate re-check the index after acquiring
    /// it, so removal is safe at any point after the outcome is decided.
    fn release_gate(&self, key: &str) {
        self.inflight.lock().unwrap().remove(key);
    }

    /// Remove every cached file and the metadata index.
    pub fn clear(&self) -> SignalResult<()> {
        let mut index = self.index.lock().unwrap();
        for entry in index.values() {
            let path = self.cache_dir.join(&entry.filename);
            if path.exists() {
                if let Err(err) = fs::remove_file(&path) {
                    warn!(file = %entry.filename, %err, "failed to remove cached file");
                }
            }
        }
        if self.metadata_path.exists() {
            fs::remove_file(&self.metadata_path)?;
        }
        index.clear();
        info!("signal cache cleared");
        Ok(())
    }

    /// Aggregate statistics over the index.
    pub fn status(&self) -> CacheStatus {
        let index = self.index.lock().unwrap();
        let mut status = CacheStatus {
            total_entries: index.len(),
            ..Default::default()
        };
        for entry in index.values() {
            if self.cache_dir.join(&entry.filename).exists() {
                status.existing_files += 1;
            }
            status.total_bytes += entry.file_size_bytes;
            *status
                .type_counts
                .entry(entry.signal_type.clone())
                .or_insert(0) += 1;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IQSample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn test_params(duration: f64) -> Params {
        Params::new().with("duration", duration).with("band", "L1")
    }

    fn ramp_buffer(n: usize) -> SampleBuffer {
        SampleBuffer::Real((0..n).map(|i| (i as f64 / n as f64) - 0.5).collect())
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);

        let path = cache
            .store("gps", "gps_l1", &params, &ramp_buffer(64), 2e6)
            .unwrap();
        assert!(path.exists());

        let key = cache.cache_key("gps", "gps_l1", &params);
        assert_eq!(cache.lookup(&key), Some(path));
    }

    #[test]
    fn test_store_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);

        let first = cache
            .store("gps", "gps_l1", &params, &ramp_buffer(64), 2e6)
            .unwrap();
        let second = cache
            .store("gps", "gps_l1", &params, &ramp_buffer(64), 2e6)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_contents_are_signed_8bit() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);
        let buffer = SampleBuffer::Iq(vec![IQSample::new(1.0, -1.0), IQSample::new(0.0, 0.5)]);

        let path = cache
            .store("jamming", "drone_video", &params, &buffer, 25e6)
            .unwrap();
        let bytes = fs::read(path).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0] as i8, 127);
        assert_eq!(bytes[1] as i8, -127);
    }

    #[test]
    fn test_missing_file_purged_and_regenerated() {
        // Scenario D: delete the cached file, re-request, get a fresh entry.
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);
        let calls = AtomicUsize::new(0);

        let generate = |_: &Params| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok((ramp_buffer(32), 2e6))
        };

        let (path, _) = cache
            .get_or_generate("gps", "gps_l1", &params, generate)
            .unwrap();
        fs::remove_file(&path).unwrap();

        let key = cache.cache_key("gps", "gps_l1", &params);
        assert_eq!(cache.lookup(&key), None, "stale entry must be purged");

        let (path2, _) = cache
            .get_or_generate("gps", "gps_l1", &params, |_: &Params| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((ramp_buffer(32), 2e6))
            })
            .unwrap();
        assert!(path2.exists());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hit_does_not_invoke_encoder() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);

        cache
            .get_or_generate("gps", "gps_l1", &params, |_| Ok((ramp_buffer(32), 2e6)))
            .unwrap();
        let (_, rate) = cache
            .get_or_generate("gps", "gps_l1", &params, |_| {
                panic!("encoder must not run on a cache hit")
            })
            .unwrap();
        assert_eq!(rate, 2e6);
    }

    #[test]
    fn test_encoder_failure_caches_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);

        let result = cache.get_or_generate("gps", "gps_l1", &params, |_| {
            Err(SignalError::MissingParameter("frequency".into()))
        });
        assert!(result.is_err());

        // The failed attempt left nothing behind; the retry generates.
        let calls = AtomicUsize::new(0);
        cache
            .get_or_generate("gps", "gps_l1", &params, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((ramp_buffer(32), 2e6))
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_same_key_generates_once() {
        // Scenario C: two concurrent identical requests, one encoder run.
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(SignalCache::open(dir.path()).unwrap());
        let params = Params::new()
            .with("band", "915")
            .with("packet_rate", 100_i64)
            .with("duration", 10.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let params = params.clone();
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_generate("elrs", "elrs_915", &params, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Widen the race window
                            std::thread::sleep(std::time::Duration::from_millis(50));
                            Ok((ramp_buffer(128), 2e6))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "encoder must run exactly once");
        let first = &results[0].0;
        assert!(results.iter().all(|(p, _)| p == first));
    }

    #[test]
    fn test_concurrent_distinct_keys_both_generate() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(SignalCache::open(dir.path()).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    let params = test_params(i as f64 + 1.0);
                    cache
                        .get_or_generate("gps", "gps_l1", &params, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok((ramp_buffer(32), 2e6))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_metadata_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let params = test_params(2.0);
        let key;
        {
            let cache = SignalCache::open(dir.path()).unwrap();
            cache
                .store("adsb", "adsb_1090", &params, &ramp_buffer(64), 2e6)
                .unwrap();
            key = cache.cache_key("adsb", "adsb_1090", &params);
        }
        let reopened = SignalCache::open(dir.path()).unwrap();
        assert!(reopened.lookup(&key).is_some());
    }

    #[test]
    fn test_corrupt_metadata_starts_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(METADATA_FILENAME), b"{not json").unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        assert_eq!(cache.status().total_entries, 0);
    }

    #[test]
    fn test_clear_removes_files_and_index() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);
        let path = cache
            .store("gps", "gps_l1", &params, &ramp_buffer(64), 2e6)
            .unwrap();

        cache.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(cache.status().total_entries, 0);
    }

    #[test]
    fn test_checksum_matches_file_bytes() {
        let dir = TempDir::new().unwrap();
        let cache = SignalCache::open(dir.path()).unwrap();
        let params = test_params(1.0);
        let path = cache
            .store("gps", "gps_l1", &params, &ramp_buffer(64), 2e6)
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        let expected = format!("{:x}", Md5::digest(&bytes));
        let key = cache.cache_key("gps", "gps_l1", &params);
        let entry = cache.index.lock().unwrap().get(&key).cloned().unwrap();
        assert_eq!(entry.checksum, expected);
        assert_eq!(entry.file_size_bytes, bytes.len() as u64);
    }
}
