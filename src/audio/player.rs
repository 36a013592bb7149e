//! Polyphonic sound-effect mixer.
//!
//! Numeric play-ids start at 0 and increase monotonically. Playback is
//! capped at a fixed channel count; absent files or decode failures are
//! logged and return a null id rather than raising.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{error, warn};

use crate::scheduler::action::SoundPlayAction;

const MAX_CHANNELS: usize = 30;

struct State {
    // Kept alive for the lifetime of the player; dropping it silences all playback.
    _stream: Option<OutputStream>,
    handle: Option<OutputStreamHandle>,
    sinks: HashMap<u64, Sink>,
    next_id: u64,
}

pub struct AudioPlayer {
    base_dir: PathBuf,
    state: Mutex<State>,
}

impl AudioPlayer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let (stream, handle) = match OutputStream::try_default() {
            Ok((stream, handle)) => (Some(stream), Some(handle)),
            Err(err) => {
                error!(%err, "no audio output device available, sound playback disabled");
                (None, None)
            }
        };
        Self {
            base_dir: base_dir.into(),
            state: Mutex::new(State { _stream: stream, handle, sinks: HashMap::new(), next_id: 0 }),
        }
    }

    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        let candidate = Path::new(path);
        let resolved = if candidate.is_absolute() { candidate.to_path_buf() } else { self.base_dir.join(candidate) };
        if resolved.exists() {
            Some(resolved)
        } else {
            None
        }
    }

    /// Returns the file's playback duration (seconds), adjusted for
    /// `speed`. Returns 0.0 if the file is missing or its duration
    /// cannot be determined without a full decode.
    pub fn get_duration(&self, sound: &SoundPlayAction) -> f64 {
        let Some(resolved) = self.resolve_path(&sound.path) else {
            warn!(path = %sound.path, "sound file not found");
            return 0.0;
        };
        let speed = if sound.speed > 0.0 { sound.speed } else { 1.0 };

        match resolved.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wav") => match hound::WavReader::open(&resolved) {
                Ok(reader) => {
                    let spec = reader.spec();
                    let frames = reader.duration() as f64;
                    if spec.sample_rate == 0 {
                        0.0
                    } else {
                        (frames / spec.sample_rate as f64) / speed
                    }
                }
                Err(err) => {
                    warn!(path = %sound.path, %err, "failed to read wav header");
                    0.0
                }
            },
            _ => {
                warn!(path = %sound.path, "duration unavailable for non-wav sound without full decode");
                0.0
            }
        }
    }

    /// Plays `sound` on the next available channel; returns `None` if the
    /// file is missing, playback is disabled, or every channel is busy.
    pub async fn play(&self, sound: &SoundPlayAction) -> Option<u64> {
        let Some(resolved) = self.resolve_path(&sound.path) else {
            warn!(path = %sound.path, "sound file not found");
            return None;
        };
        let speed = if sound.speed > 0.0 { sound.speed } else { 1.0 };
        let volume = sound.volume.clamp(0.0, 1.0) as f32;

        let sound = sound.clone();
        let result = tokio::task::spawn_blocking(move || Self::decode(&resolved)).await.ok().flatten();

        let Some(source) = result else {
            warn!(path = %sound.path, "failed to decode sound file");
            return None;
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let handle = state.handle.clone()?;
        if state.sinks.len() >= MAX_CHANNELS {
            warn!("audio channel limit reached, dropping playback request");
            return None;
        }

        let sink = match Sink::try_new(&handle) {
            Ok(sink) => sink,
            Err(err) => {
                error!(%err, "failed to allocate audio sink");
                return None;
            }
        };
        sink.set_volume(volume);
        sink.set_speed(speed as f32);
        sink.append(source);

        let id = state.next_id;
        state.next_id += 1;
        state.sinks.insert(id, sink);
        Some(id)
    }

    fn decode(path: &Path) -> Option<rodio::Decoder<BufReader<File>>> {
        let file = File::open(path).ok()?;
        rodio::Decoder::new(BufReader::new(file)).ok()
    }

    pub fn stop(&self, play_id: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sink) = state.sinks.remove(&play_id) {
            sink.stop();
        }
    }

    pub fn is_playing(&self, play_id: u64) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sinks.get(&play_id).map(|s| !s.empty()).unwrap_or(false)
    }

    pub fn get_playing_count(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sinks.retain(|_, sink| !sink.empty());
        state.sinks.len()
    }

    pub fn stop_all(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for (_, sink) in state.sinks.drain() {
            sink.stop();
        }
    }

    /// Lists known sound files under the base directory, as paths
    /// relative to it.
    pub fn list_sounds(&self) -> Vec<String> {
        let mut sounds = Vec::new();
        Self::walk(&self.base_dir, &self.base_dir, &mut sounds);
        sounds.sort();
        sounds
    }

    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                Self::walk(base, &path, out);
            } else if matches!(path.extension().and_then(|e| e.to_str()), Some("wav" | "mp3" | "ogg" | "flac")) {
                if let Ok(relative) = path.strip_prefix(base) {
                    out.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
}
