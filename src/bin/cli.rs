//! sappy CLI: play or render songs of a GBA ROM using the MP2K sound driver.
//!
//! Usage:
//!   sappy-cli game.gba --table 0x4A32CC --count 400 --song 12
//!   sappy-cli game.gba --table 0x4A32CC --count 400 --song 12 --wav out.wav

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use sappy_engine::EngineConfig;
use sappy_master::{Controller, ControllerError, Rom, SongTableInfo, SoundMode};

#[derive(Debug, Parser)]
#[command(name = "sappy-cli", version, about = "Play songs of the GBA MP2K sound driver")]
struct Args {
    /// ROM image.
    rom: PathBuf,

    /// Byte offset of the song table (decimal or 0x-prefixed hex).
    #[arg(short, long, value_parser = parse_offset)]
    table: usize,

    /// Number of songs in the table.
    #[arg(short, long, default_value_t = 1)]
    count: usize,

    /// Song to play.
    #[arg(short, long, default_value_t = 0)]
    song: usize,

    /// Render to this WAV file instead of playing.
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Longest rendering, in seconds.
    #[arg(long, default_value_t = 300)]
    seconds: u32,

    /// Engine settings in TOML.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Value of the driver's sound mode register (0x-prefixed hex allowed).
    #[arg(long, value_parser = parse_register)]
    sound_mode: Option<u32>,

    /// Loops before the fade out; 0 loops forever.
    #[arg(long)]
    loops: Option<u32>,

    /// Tempo multiplier.
    #[arg(long)]
    speed: Option<f32>,
}

fn parse_offset(s: &str) -> Result<usize, String> {
    parse_register(s).map(|v| v as usize)
}

fn parse_register(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

fn load_config(args: &Args) -> Result<EngineConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            toml::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(loops) = args.loops {
        config.max_loops = (loops > 0).then_some(loops);
    }
    if let Some(speed) = args.speed {
        if speed.is_nan() || speed <= 0.0 {
            return Err(format!("speed must be positive, got {speed}"));
        }
        config.speed_factor = speed;
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let config = load_config(args)?;
    let data = fs::read(&args.rom).map_err(|e| format!("failed to read {}: {e}", args.rom.display()))?;
    let sound_mode = args.sound_mode.map(SoundMode::from_register).unwrap_or_default();

    let mut ctrl = Controller::new(Rom::new(data), SongTableInfo::new(args.table, args.count))
        .with_sound_mode(sound_mode)
        .with_config(config);

    let header = ctrl.song_header(args.song).map_err(|e| e.to_string())?;
    println!("Song:     {} of {}", args.song, args.count);
    println!("Header:   {:#X}", header.pos);
    println!("Tracks:   {}", header.tracks.len());
    println!("Priority: {}", header.priority);
    println!("Reverb:   {:#04X}", header.reverb);
    println!();

    let result = match &args.wav {
        Some(path) => render_to_wav(&ctrl, args, path),
        None => play_audio(&mut ctrl, args.song),
    };
    result.map_err(|e| e.to_string())
}

fn play_audio(ctrl: &mut Controller, song: usize) -> Result<(), ControllerError> {
    ctrl.play(song)?;
    println!("Playing...");
    println!();

    while ctrl.is_playing() {
        let snapshot = ctrl.snapshot();
        if let Some(player) = snapshot.players.iter().find(|p| p.playing) {
            let cursors: Vec<String> = player.tracks.iter().map(|t| format!("{:06X}", t.pos)).collect();
            print!(
                "\rBPM: {:3} | Loops: {} | Notes: {:2} | {}",
                player.bpm,
                player.loops,
                snapshot.active_note_count(),
                cursors.join(" ")
            );
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("\rDone.{:60}", "");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, args: &Args, path: &Path) -> Result<(), ControllerError> {
    println!("Rendering to {} at {} Hz...", path.display(), ctrl.config().sample_rate);
    let wav = ctrl.render_to_wav(args.song, args.seconds)?;
    println!("Rendered {} bytes", wav.len());
    fs::write(path, &wav)?;
    println!("Done.");
    Ok(())
}
