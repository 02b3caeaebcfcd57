use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use vetline::voice::{
    AudioCapture, AudioClip, AudioPlayback, AudioSink, MicrophoneSource, SpeechToText,
    Synthesizer, TextToSpeech, calculate_energy,
};
use vetline::{AgentSettings, Components, Config, PerplexityReasoner, VoiceAgent};

/// Vetline - voice assistant for pet health questions
#[derive(Parser)]
#[command(name = "vetline", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,vetline=info",
        1 => "info,vetline=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    // Credentials are checked before any audio device is touched
    let reasoner = PerplexityReasoner::new(&config.llm)?;
    let transcriber = SpeechToText::from_config(&config.voice, &config.api_keys)?;
    let synthesizer = TextToSpeech::from_config(&config.voice, &config.api_keys)?;
    let sink = AudioPlayback::new()?;
    tracing::info!(device = %sink.device_name(), model = %reasoner.model(), "backends ready");

    let mut source = MicrophoneSource::open()?;
    source.calibrate(config.voice.ambient_noise_duration).await;

    let components = Components {
        source: Box::new(source),
        transcriber: Arc::new(transcriber),
        synthesizer: Arc::new(synthesizer),
        sink: Arc::new(sink),
        reasoner: Arc::new(reasoner),
    };
    let settings = AgentSettings::from_config(&config.voice, &config.agent);
    let agent = VoiceAgent::new(components, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutting down agent...");
        shutdown_tx.send_replace(true);
    });

    tracing::info!("vetline ready - describe what's going on with your pet");
    let history = agent.run(shutdown_rx).await;
    tracing::info!(entries = history.len(), "conversation ended");

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;
    println!("Output device: {}", playback.device_name());

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    let clip = AudioClip::new(samples, sample_rate);
    tokio::task::spawn_blocking(move || playback.play(&clip)).await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;
    let settings = AgentSettings::from_config(&config.voice, &config.agent);

    println!("Synthesizing speech...");
    let clip = tts.synthesize(text, &settings.playback.synthesis).await?;
    println!(
        "Got {:.2}s of audio at {} Hz",
        clip.duration().as_secs_f32(),
        clip.sample_rate()
    );

    let playback = AudioPlayback::new()?;
    println!("Playing...");
    tokio::task::spawn_blocking(move || playback.play(&clip)).await??;

    println!("Done!");
    Ok(())
}
