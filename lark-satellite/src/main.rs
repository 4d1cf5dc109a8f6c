//! Lark satellite daemon entry point.
//!
//! Runs the control-protocol server and logs inbound frames and
//! connection-state changes as structured events. Two diagnostic replay
//! modes exist for tuning detector settings against captured data:
//! `--wav <path>` feeds a 16 kHz mono PCM16 recording through the
//! silence detector on a synthetic clock, and `--wake-probs <path>`
//! feeds a recorded per-chunk probability trace (JSON array of floats)
//! through the active wake word's window/refractory machine.

mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lark_core::events::{ConnectionEvent, UtteranceEndedEvent, WakeEvent};
use lark_core::{
    MessageRegistry, ScriptedWakeModel, Server, SilenceDetector, WakeWordDetector,
    WakeWordManifest,
};
use settings::{default_settings_path, load_settings, SatelliteSettings};

/// 10 ms of PCM16 at 16 kHz.
const FRAME_SAMPLES: usize = 160;
const FRAME_INTERVAL: Duration = Duration::from_millis(10);

struct Args {
    config: PathBuf,
    wav: Option<PathBuf>,
    wake_probs: Option<PathBuf>,
    port: Option<u16>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: default_settings_path(),
        wav: None,
        wake_probs: None,
        port: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config = iter.next().context("--config requires a path")?.into();
            }
            "--wav" => {
                args.wav = Some(iter.next().context("--wav requires a path")?.into());
            }
            "--wake-probs" => {
                args.wake_probs =
                    Some(iter.next().context("--wake-probs requires a path")?.into());
            }
            "--port" => {
                args.port = Some(iter.next().context("--port requires a number")?.parse()?);
            }
            other => {
                bail!("unknown argument: {other} (expected --config/--wav/--wake-probs/--port)")
            }
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = parse_args()?;
    let mut settings = load_settings(&args.config)
        .with_context(|| format!("loading settings from {:?}", args.config))?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    // A misconfigured wake word is a startup failure, not a satellite
    // that silently never wakes.
    let wake_manifest = load_wake_manifest(&settings)?;

    if let Some(wav) = &args.wav {
        return replay_wav(wav, &settings);
    }
    if let Some(probs) = &args.wake_probs {
        let manifest = wake_manifest
            .context("--wake-probs requires an activeWakeWord in the settings file")?;
        let model_id = settings.active_wake_word.clone().unwrap_or_default();
        return replay_wake_probs(probs, &model_id, &manifest).map(|_| ());
    }

    run_server(&settings).await
}

/// Load and validate the configured wake word's manifest, if any.
fn load_wake_manifest(settings: &SatelliteSettings) -> anyhow::Result<Option<WakeWordManifest>> {
    let Some(path) = settings.wake_manifest_path() else {
        return Ok(None);
    };
    let manifest =
        WakeWordManifest::load(&path).with_context(|| format!("loading wake manifest {path:?}"))?;
    info!(
        wake_word = %manifest.wake_word,
        model = %manifest.model,
        "wake word configured"
    );
    Ok(Some(manifest))
}

async fn run_server(settings: &SatelliteSettings) -> anyhow::Result<()> {
    let registry: MessageRegistry = settings.known_message_types.iter().copied().collect();
    let server = Server::new(registry);
    let addr = server.start(settings.port).await?;
    info!(%addr, "satellite ready");

    let mut frames = server.subscribe_frames();
    let mut state = server.subscribe_state();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = frames.recv() => match frame {
                Ok(frame) => info!(
                    frame_type = frame.frame_type,
                    len = frame.payload.len(),
                    "frame received"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(e) => warn!("frame subscription lagged: {e}"),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let event = ConnectionEvent {
                    connected: *state.borrow_and_update(),
                    peer: None,
                };
                info!(event = %serde_json::to_string(&event)?, "connection state");
            }
        }
    }

    info!("shutting down");
    server.stop();
    Ok(())
}

/// Feed a recorded WAV through the silence detector, frame by frame, on
/// a clock derived from the sample position rather than wall time.
fn replay_wav(path: &std::path::Path, settings: &SatelliteSettings) -> anyhow::Result<()> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {path:?}"))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        bail!(
            "expected 16-bit mono WAV, got {} ch / {} bit",
            spec.channels,
            spec.bits_per_sample
        );
    }
    if spec.sample_rate != 16_000 {
        warn!(
            sample_rate = spec.sample_rate,
            "WAV is not 16 kHz; frame timing will be approximated"
        );
    }

    let mut detector = SilenceDetector::new(
        settings.silence_threshold,
        settings.silence_duration_ms,
        settings.min_speech_duration_ms,
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()?;
    info!(
        frames = samples.len() / FRAME_SAMPLES,
        duration_secs = samples.len() as f64 / f64::from(spec.sample_rate),
        "replaying"
    );

    let start = Instant::now();
    let mut now = start;
    let mut speech_started: Option<Instant> = None;
    let mut utterances = 0u32;

    for frame in samples.chunks(FRAME_SAMPLES) {
        let bytes: Vec<u8> = frame.iter().flat_map(|s| s.to_le_bytes()).collect();
        let was_speaking = detector.is_speaking();
        let ended = detector.process_at(&bytes, now);

        if !was_speaking && detector.is_speaking() {
            speech_started = Some(now);
        }
        if ended {
            utterances += 1;
            let duration = speech_started
                .map(|t| now.duration_since(t))
                .unwrap_or_default()
                .saturating_sub(Duration::from_millis(settings.silence_duration_ms));
            let event = UtteranceEndedEvent {
                duration_ms: duration.as_millis() as u64,
            };
            println!("{}", serde_json::to_string(&event)?);
        }

        now += FRAME_INTERVAL;
    }

    info!(utterances, "replay finished");
    Ok(())
}

/// Replay a recorded per-chunk probability trace (JSON array of floats
/// in [0, 1]) through the active wake word's detector, printing one
/// `WakeEvent` per detection. Exercises the exact window, cutoff and
/// refractory settings the manifest ships. Returns the detection count.
fn replay_wake_probs(
    path: &std::path::Path,
    model_id: &str,
    manifest: &WakeWordManifest,
) -> anyhow::Result<u32> {
    let text = std::fs::read_to_string(path).with_context(|| format!("opening {path:?}"))?;
    let probs: Vec<f32> = serde_json::from_str(&text)
        .with_context(|| format!("parsing {path:?} as a JSON array of probabilities"))?;
    if probs.is_empty() {
        bail!("{path:?} holds no probabilities");
    }

    let chunks = probs.len();
    // The scripted model replays the trace and never reads its input, so
    // one feature row per chunk satisfies the detector's shape check.
    let features = vec![0.0f32; 1];
    let model = ScriptedWakeModel::from_probabilities(manifest.micro.feature_step_size, probs);
    let mut detector = WakeWordDetector::from_manifest(model_id, manifest, Box::new(model))?;

    let mut detections = 0u32;
    for chunk in 0..chunks {
        if detector.process_chunk(&features)? {
            detections += 1;
            let event = WakeEvent {
                model_id: detector.id().to_string(),
                wake_word: detector.wake_word().to_string(),
            };
            info!(chunk, "wake word detected");
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    info!(chunks, detections, "replay finished");
    Ok(detections)
}
