//! Face-position sampling
//!
//! Detection itself is external. A [`FaceSource`] hands back one observation
//! per call (possibly after slow inference); [`FaceSampler`] polls it on a
//! fixed interval with at most one call in flight, and delivers finished
//! samples to the daemon loop.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// One face observation. `x`/`y` are the normalized face centre in camera space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FaceSample {
    pub x: f64,
    pub y: f64,
    pub detected: bool,
    #[serde(default)]
    pub processing_time_ms: f64,
}

impl FaceSample {
    pub fn not_detected() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            detected: false,
            processing_time_ms: 0.0,
        }
    }
}

pub trait FaceSource: Send + 'static {
    /// Produce the next observation. May block. `Ok(None)` means no face.
    fn next_sample(&mut self) -> Result<Option<FaceSample>>;
}

/// Reads one JSON sample per line, e.g. from a FIFO fed by a detector process:
/// `{"x":0.42,"y":0.51,"detected":true,"processing_time_ms":18.5}`
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send + 'static> FaceSource for JsonLinesSource<R> {
    fn next_sample(&mut self) -> Result<Option<FaceSample>> {
        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .context("Failed to read face sample line")?;
        let line = self.line.trim();
        if read == 0 || line.is_empty() {
            return Ok(None);
        }
        let sample: FaceSample = serde_json::from_str(line)
            .context(format!("Invalid face sample line: {line}"))?;
        Ok(Some(sample))
    }
}

/// JSON-lines stream at a path, opened on the first read. Opening a FIFO waits
/// for a writer, so it has to happen on the sampling thread.
pub struct SampleStream {
    path: PathBuf,
    lines: Option<JsonLinesSource<BufReader<File>>>,
}

impl SampleStream {
    /// Fails only when nothing exists at `path`; the stream is not opened yet
    pub fn new(path: &Path) -> Result<Self> {
        std::fs::metadata(path)
            .context(format!("Face sample stream {} not found", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: None,
        })
    }
}

impl FaceSource for SampleStream {
    fn next_sample(&mut self) -> Result<Option<FaceSample>> {
        if self.lines.is_none() {
            let file = File::open(&self.path)
                .context(format!("Failed to open face sample stream {}", self.path.display()))?;
            info!(path = %self.path.display(), "Reading face samples");
            self.lines = Some(JsonLinesSource::new(BufReader::new(file)));
        }
        match self.lines.as_mut() {
            Some(lines) => lines.next_sample(),
            None => Ok(None),
        }
    }
}

/// Clears the in-flight flag when the sample finishes, even on panic
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn capture<S: FaceSource>(source: &Mutex<S>) -> FaceSample {
    let Ok(mut source) = source.lock() else {
        warn!("Face source poisoned, reporting no face");
        return FaceSample::not_detected();
    };
    match source.next_sample() {
        Ok(Some(sample)) => sample,
        Ok(None) => FaceSample::not_detected(),
        Err(e) => {
            warn!(error = %e, "Face source failed, reporting no face");
            FaceSample::not_detected()
        }
    }
}

/// Interval-driven, single-flight face sampling. Must be spawned inside a
/// tokio runtime. Stopping or dropping it ends the ticker and closes the
/// channel, so a sample still being computed on the blocking pool is discarded.
pub struct FaceSampler {
    ticker: JoinHandle<()>,
    samples: mpsc::Receiver<FaceSample>,
}

impl FaceSampler {
    pub fn spawn<S: FaceSource>(source: S, interval: Duration) -> Self {
        let (tx, samples) = mpsc::channel(1);
        let source = Arc::new(Mutex::new(source));
        let in_flight = Arc::new(AtomicBool::new(false));

        let ticker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if in_flight.swap(true, Ordering::AcqRel) {
                    debug!("Face sample still in flight, dropping tick");
                    continue;
                }
                let guard = InFlight(Arc::clone(&in_flight));
                let source = Arc::clone(&source);
                let tx = tx.clone();
                tokio::task::spawn_blocking(move || {
                    let _guard = guard;
                    let sample = capture(&source);
                    if tx.blocking_send(sample).is_err() {
                        debug!("Face sampler stopped, discarding sample");
                    }
                });
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Face sampler started");
        Self { ticker, samples }
    }

    pub async fn recv(&mut self) -> Option<FaceSample> {
        self.samples.recv().await
    }

    pub fn stop(self) {
        info!("Face sampler stopped");
    }
}

impl Drop for FaceSampler {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;

    struct ScriptedSource {
        samples: Vec<Result<Option<FaceSample>>>,
    }

    impl FaceSource for ScriptedSource {
        fn next_sample(&mut self) -> Result<Option<FaceSample>> {
            if self.samples.is_empty() {
                Ok(None)
            } else {
                self.samples.remove(0)
            }
        }
    }

    /// Blocks every call until the test releases it
    struct GatedSource {
        gate: std_mpsc::Receiver<()>,
        calls: Arc<AtomicUsize>,
    }

    impl FaceSource for GatedSource {
        fn next_sample(&mut self) -> Result<Option<FaceSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(Some(FaceSample {
                x: 0.5,
                y: 0.5,
                detected: true,
                processing_time_ms: 1.0,
            }))
        }
    }

    fn face(x: f64) -> FaceSample {
        FaceSample {
            x,
            y: 0.5,
            detected: true,
            processing_time_ms: 2.0,
        }
    }

    #[test]
    fn test_json_lines_source_parses_samples() {
        let input = "{\"x\":0.25,\"y\":0.75,\"detected\":true,\"processing_time_ms\":12.5}\n\
                     {\"x\":0.5,\"y\":0.5,\"detected\":false}\n";
        let mut source = JsonLinesSource::new(Cursor::new(input));

        let first = source.next_sample().unwrap().unwrap();
        assert_eq!(first.x, 0.25);
        assert_eq!(first.y, 0.75);
        assert!(first.detected);
        assert_eq!(first.processing_time_ms, 12.5);

        let second = source.next_sample().unwrap().unwrap();
        assert!(!second.detected);
        assert_eq!(second.processing_time_ms, 0.0);

        // End of stream reads as no face
        assert!(source.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_sample_stream_opens_lazily() {
        let dir = std::env::temp_dir().join(format!("edge-light-stream-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("faces.jsonl");
        std::fs::write(&path, "{\"x\":0.3,\"y\":0.6,\"detected\":true}\n").unwrap();

        let mut stream = SampleStream::new(&path).unwrap();
        assert!(stream.lines.is_none());
        let sample = stream.next_sample().unwrap().unwrap();
        assert_eq!(sample.x, 0.3);
        assert!(stream.lines.is_some());
        assert!(stream.next_sample().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(SampleStream::new(&path).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sample_stream_on_fifo_does_not_block_construction() {
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::process::Command;

        let dir = std::env::temp_dir().join(format!("edge-light-fifo-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("faces.fifo");
        let status = Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());

        // No writer yet: construction must still return
        let mut stream = SampleStream::new(&path).unwrap();

        // Read-write open of a FIFO never blocks on Linux and counts as a writer
        let mut writer = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        writer.write_all(b"{\"x\":0.7,\"y\":0.4,\"detected\":true}\n").unwrap();
        let sample = stream.next_sample().unwrap().unwrap();
        assert_eq!(sample.x, 0.7);

        drop(writer);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_lines_source_rejects_garbage() {
        let mut source = JsonLinesSource::new(Cursor::new("not json\n"));
        assert!(source.next_sample().is_err());
    }

    #[test]
    fn test_capture_maps_failures_to_no_face() {
        let source = Mutex::new(ScriptedSource {
            samples: vec![Err(anyhow::anyhow!("camera unplugged")), Ok(None), Ok(Some(face(0.1)))],
        });
        assert!(!capture(&source).detected);
        assert!(!capture(&source).detected);
        assert_eq!(capture(&source), face(0.1));
    }

    #[tokio::test]
    async fn test_sampler_delivers_in_order() {
        let source = ScriptedSource {
            samples: vec![Ok(Some(face(0.1))), Ok(Some(face(0.2)))],
        };
        let mut sampler = FaceSampler::spawn(source, Duration::from_millis(5));
        assert_eq!(sampler.recv().await, Some(face(0.1)));
        assert_eq!(sampler.recv().await, Some(face(0.2)));
        assert!(!sampler.recv().await.unwrap().detected);
        sampler.stop();
    }

    #[tokio::test]
    async fn test_sampler_drops_ticks_while_in_flight() {
        let (release, gate) = std_mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let source = GatedSource {
            gate,
            calls: Arc::clone(&calls),
        };
        let mut sampler = FaceSampler::spawn(source, Duration::from_millis(5));

        // Many ticks elapse while the first call is blocked
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        assert!(sampler.recv().await.unwrap().detected);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        release.send(()).unwrap();
        sampler.stop();
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_sample() {
        let (release, gate) = std_mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let source = GatedSource {
            gate,
            calls: Arc::clone(&calls),
        };
        let sampler = FaceSampler::spawn(source, Duration::from_millis(5));
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Returns while the call is still blocked
        sampler.stop();
        release.send(()).unwrap();

        // The finished sample goes nowhere and no further ticks start a call
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
