//! Headless controller for the sappy playback engine.
//!
//! Owns a ROM and its table layout, and either plays a song on the default
//! audio device or renders it offline.

mod wav;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use sappy_audio::{AudioError, AudioOutput, CpalOutput, RingBuffer, DEFAULT_MARGIN};
use thiserror::Error;

pub use sappy_engine::{EngineConfig, EngineSnapshot, Frame, PlaybackEngine};
pub use sappy_ir::{PlayerTableInfo, Rom, SongHeader, SongTableInfo, SoundMode};

pub use wav::{frames_to_wav, sample_to_i16, write_wav};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Rom(#[from] sappy_ir::Error),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("playback thread exited before starting")]
    ThreadExited,
}

pub type Result<T> = std::result::Result<T, ControllerError>;

/// Owns a ROM with its song and player tables and manages playback.
pub struct Controller {
    rom: Rom,
    song_table: SongTableInfo,
    player_table: PlayerTableInfo,
    sound_mode: SoundMode,
    config: EngineConfig,
    ring_margin: usize,
    snapshot: Arc<Mutex<EngineSnapshot>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    ring: Arc<RingBuffer>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(rom: Rom, song_table: SongTableInfo) -> Self {
        Self {
            rom,
            song_table,
            player_table: PlayerTableInfo::default(),
            sound_mode: SoundMode::default(),
            config: EngineConfig::default(),
            ring_margin: DEFAULT_MARGIN,
            snapshot: Arc::new(Mutex::new(EngineSnapshot::default())),
            playback: None,
        }
    }

    pub fn with_player_table(mut self, player_table: PlayerTableInfo) -> Self {
        self.player_table = player_table;
        self
    }

    pub fn with_sound_mode(mut self, sound_mode: SoundMode) -> Self {
        self.sound_mode = sound_mode;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Consumer-sized chunks the producer may run ahead of the device.
    pub fn with_ring_margin(mut self, margin: usize) -> Self {
        self.ring_margin = margin;
        self
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn song_table(&self) -> SongTableInfo {
        self.song_table
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Header of song `number`.
    pub fn song_header(&self, number: usize) -> Result<SongHeader> {
        let entry = self.song_table.entry(&self.rom, number)?;
        Ok(SongHeader::read(&self.rom, entry.header_pos)?)
    }

    fn engine(&self, config: EngineConfig) -> PlaybackEngine {
        PlaybackEngine::new(
            self.rom.clone(),
            self.song_table,
            &self.player_table,
            self.sound_mode,
            config,
        )
    }

    // --- Real-time playback ---

    /// Play song `number` on the default output device.
    ///
    /// Returns once the device is open and the producer thread runs.
    pub fn play(&mut self, number: usize) -> Result<()> {
        self.stop();
        self.song_header(number)?;

        let ring = Arc::new(RingBuffer::new(self.ring_margin));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let producer = Producer {
            rom: self.rom.clone(),
            song_table: self.song_table,
            player_table: self.player_table.clone(),
            sound_mode: self.sound_mode,
            config: self.config.clone(),
            number,
            ring: ring.clone(),
            stop_signal: stop_signal.clone(),
            finished: finished.clone(),
            snapshot: self.snapshot.clone(),
        };
        let thread = std::thread::spawn(move || producer.run(ready_tx));

        let handle = PlaybackHandle { stop_signal, finished, ring, thread: Some(thread) };
        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.playback = Some(handle);
                Ok(())
            }
            Ok(Err(err)) => {
                join(handle);
                Err(err)
            }
            Err(_) => {
                join(handle);
                Err(ControllerError::ThreadExited)
            }
        }
    }

    /// Stop playback and wait for the producer thread.
    pub fn stop(&mut self) {
        if let Some(handle) = self.playback.take() {
            join(handle);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Engine state after the last block handed to the device.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot.lock().clone()
    }

    // --- Offline rendering ---

    /// Render song `number` until it ends or `max_frames` frames exist.
    pub fn render_frames(&self, number: usize, max_frames: usize) -> Result<Vec<Frame>> {
        let mut engine = self.engine(self.config.clone());
        engine.start_song_number(number)?;

        let mut frames = Vec::with_capacity(max_frames.min(self.config.sample_rate as usize * 60));
        while !engine.has_ended() && frames.len() < max_frames {
            engine.advance_one_frame();
            let master = engine.master_buffer();
            let room = max_frames - frames.len();
            frames.extend(
                master.left().iter().zip(master.right()).take(room).map(|(&l, &r)| Frame::new(l, r)),
            );
        }
        *self.snapshot.lock() = engine.snapshot();
        Ok(frames)
    }

    /// Render at most `max_seconds` of song `number` as a WAV file image.
    pub fn render_to_wav(&self, number: usize, max_seconds: u32) -> Result<Vec<u8>> {
        let sample_rate = self.config.sample_rate;
        let max_frames = (sample_rate as u64 * max_seconds as u64) as usize;
        let frames = self.render_frames(number, max_frames)?;
        log::info!("rendered {} frames of song {number}", frames.len());
        Ok(wav::frames_to_wav(&frames, sample_rate))
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join(mut handle: PlaybackHandle) {
    handle.stop_signal.store(true, Ordering::Relaxed);
    handle.ring.close();
    if let Some(thread) = handle.thread.take() {
        if thread.join().is_err() {
            log::error!("playback thread panicked");
        }
    }
}

/// State moved onto the producer thread.
struct Producer {
    rom: Rom,
    song_table: SongTableInfo,
    player_table: PlayerTableInfo,
    sound_mode: SoundMode,
    config: EngineConfig,
    number: usize,
    ring: Arc<RingBuffer>,
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    snapshot: Arc<Mutex<EngineSnapshot>>,
}

impl Producer {
    fn run(self, ready: mpsc::Sender<Result<()>>) {
        match self.open() {
            Ok((output, engine)) => {
                let _ = ready.send(Ok(()));
                self.pump(engine);
                drop(output);
            }
            Err(err) => {
                let _ = ready.send(Err(err));
            }
        }
        self.finished.store(true, Ordering::Relaxed);
    }

    fn open(&self) -> Result<(CpalOutput, PlaybackEngine)> {
        let mut output = CpalOutput::new(self.ring.clone())?;
        let config = EngineConfig { sample_rate: output.sample_rate(), ..self.config.clone() };
        let mut engine = PlaybackEngine::new(
            self.rom.clone(),
            self.song_table,
            &self.player_table,
            self.sound_mode,
            config,
        );
        engine.start_song_number(self.number)?;
        output.build_stream()?;
        output.start()?;
        log::debug!("playing song {} at {} Hz", self.number, output.sample_rate());
        Ok((output, engine))
    }

    fn pump(&self, mut engine: PlaybackEngine) {
        let mut interleaved = Vec::new();
        while !engine.has_ended() && !self.stop_signal.load(Ordering::Relaxed) {
            engine.advance_one_frame();
            interleaved.clear();
            engine.master_buffer().interleave_into(&mut interleaved);
            if !self.ring.put(&interleaved) {
                break;
            }
            *self.snapshot.lock() = engine.snapshot();
        }

        // Let the device drain what is buffered.
        interleaved.iter_mut().for_each(|s| *s = 0.0);
        let chunks = (self.ring.capacity() / interleaved.len().max(1)).max(1);
        for _ in 0..chunks {
            if self.stop_signal.load(Ordering::Relaxed) || !self.ring.put(&interleaved) {
                break;
            }
        }
        log::debug!("song {} finished", self.number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Song table at 0, header at 0x10, one track at 0x20:
    // VOICE 0, VOL 100, N04 C4 v100, W04, FINE. Voice group at 0x30 holds
    // a square 2 instrument.
    fn rom() -> Rom {
        let mut data = vec![0u8; 0x40];
        data[0..4].copy_from_slice(&0x0800_0010u32.to_le_bytes());
        data[0x10] = 1;
        data[0x14..0x18].copy_from_slice(&0x0800_0030u32.to_le_bytes());
        data[0x18..0x1C].copy_from_slice(&0x0800_0020u32.to_le_bytes());
        data[0x20..0x29].copy_from_slice(&[0xBD, 0, 0xBE, 100, 0xD3, 60, 100, 0x84, 0xB1]);
        data[0x30..0x3C].copy_from_slice(&[0x02, 60, 0, 0, 2, 0, 0, 0, 0, 0, 15, 0]);
        Rom::new(data)
    }

    #[test]
    fn renders_until_song_ends() {
        let controller = Controller::new(rom(), SongTableInfo::new(0, 1));
        let frames = controller.render_frames(0, 48000 * 30).unwrap();
        assert!(!frames.is_empty());
        assert!(frames.len() < 48000 * 30);
        assert!(frames.iter().any(|f| f.left != 0.0));
    }

    #[test]
    fn render_respects_frame_limit() {
        let controller = Controller::new(rom(), SongTableInfo::new(0, 1));
        let frames = controller.render_frames(0, 1000).unwrap();
        assert_eq!(frames.len(), 1000);
    }

    #[test]
    fn wav_has_header_and_data() {
        let controller = Controller::new(rom(), SongTableInfo::new(0, 1));
        let wav = controller.render_to_wav(0, 1).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        let data_size = u32::from_le_bytes(wav[40..44].try_into().unwrap()) as usize;
        assert_eq!(wav.len(), 44 + data_size);
    }

    #[test]
    fn bad_song_number_is_an_error() {
        let controller = Controller::new(rom(), SongTableInfo::new(0, 1));
        assert!(matches!(
            controller.render_frames(3, 100),
            Err(ControllerError::Rom(sappy_ir::Error::InvalidSongIndex { index: 3, count: 1 }))
        ));
    }

    #[test]
    fn snapshot_follows_offline_render() {
        let controller = Controller::new(rom(), SongTableInfo::new(0, 1));
        controller.render_frames(0, 48000 * 30).unwrap();
        let snapshot = controller.snapshot();
        assert!(snapshot.players[0].song_ended);
        assert_eq!(snapshot.active_note_count(), 0);
    }
}
