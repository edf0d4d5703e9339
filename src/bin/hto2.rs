//! hto2 - track hands on a video feed and publish each detection.
//!
//! This binary:
//! 1. Loads configuration (file, environment, flags)
//! 2. Joins the messaging ensemble and loads the hand model
//! 3. Reads control commands from stdin (toggle/start/stop/quit) and Ctrl-C
//! 4. Runs the frame loop at the display refresh rate until told to quit
//! 5. Optionally writes the last rendered overlay to disk

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use handtrack_o2::detect::SyntheticLoader;
use handtrack_o2::transport::parse_mqtt_endpoint;
use handtrack_o2::{
    drive, initialize, open_source, BridgeConfig, Control, DriveLimits, LogMessenger, LogStatus,
    Messenger, MessengerKind, MessengerSettings, MqttMessenger, RefreshScheduler,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Track hands on a video feed and publish detections as O2lite-style messages"
)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "HTO2_CONFIG")]
    config: Option<PathBuf>,

    /// Ensemble to join.
    #[arg(long)]
    ensemble: Option<String>,

    /// Video source url (stub://camera, stub://denied, or a V4L2 device path).
    #[arg(long)]
    video_url: Option<String>,

    /// Messenger to publish through (log|mqtt).
    #[arg(long, value_name = "KIND")]
    messenger: Option<String>,

    /// MQTT broker address (implies --messenger mqtt).
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// What to do when detection fails (halt|skip).
    #[arg(long, value_name = "POLICY")]
    on_detect_error: Option<String>,

    /// Start tracking right away instead of waiting for a toggle.
    #[arg(long)]
    autostart: bool,

    /// Quit after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Write the last rendered overlay to this image file on exit.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::new(ui::UiMode::parse(&args.ui), std::io::stderr().is_terminal());

    let config = {
        let _stage = ui.stage("Load configuration");
        let mut config = BridgeConfig::load_from(args.config.as_deref())?;
        apply_args(&mut config, &args)?;
        config.validate()?;
        config
    };

    let video = open_source(&config.video)?;
    let messenger = build_messenger(&config.messenger)?;
    let mut frame_loop = {
        let _stage = ui.stage("Join ensemble and load hand model");
        initialize(
            &config,
            &mut SyntheticLoader,
            video,
            messenger,
            Box::new(LogStatus::new()),
        )?
    };

    let (tx, rx) = mpsc::channel();
    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(Control::Quit);
    })
    .context("install Ctrl-C handler")?;
    spawn_stdin_reader(tx.clone());
    if args.autostart {
        tx.send(Control::Start)
            .map_err(|_| anyhow!("control channel closed before start"))?;
    }
    drop(tx);

    log::info!(
        "hto2 ready: ensemble={} address={} video={} model={}",
        config.ensemble,
        config.address,
        config.video.url,
        frame_loop.model_name()
    );
    log::info!("type 't' + Enter to toggle tracking, 'q' to quit");

    let mut scheduler = RefreshScheduler::new(config.refresh_hz)?;
    let summary = drive(
        &mut frame_loop,
        &rx,
        &mut scheduler,
        DriveLimits {
            max_ticks: args.max_ticks,
        },
    );
    frame_loop.shutdown()?;

    if let Some(path) = &args.snapshot {
        frame_loop.canvas().save(path)?;
        log::info!("overlay snapshot written to {}", path.display());
    }
    log::info!(
        "published {} messages over {} ticks",
        summary.messages_sent,
        summary.ticks
    );
    Ok(())
}

fn apply_args(config: &mut BridgeConfig, args: &Args) -> Result<()> {
    if let Some(ensemble) = &args.ensemble {
        config.ensemble = ensemble.clone();
    }
    if let Some(url) = &args.video_url {
        config.video.url = url.clone();
    }
    if let Some(broker) = &args.mqtt_broker {
        config.messenger.broker = broker.clone();
        config.messenger.kind = MessengerKind::Mqtt;
    }
    if let Some(kind) = &args.messenger {
        config.messenger.kind = kind.parse()?;
    }
    if let Some(policy) = &args.on_detect_error {
        config.on_detect_error = policy.parse()?;
    }
    Ok(())
}

fn build_messenger(settings: &MessengerSettings) -> Result<Box<dyn Messenger>> {
    match settings.kind {
        MessengerKind::Log => Ok(Box::new(LogMessenger::new())),
        MessengerKind::Mqtt => {
            let endpoint = parse_mqtt_endpoint(&settings.broker)
                .with_context(|| format!("invalid MQTT broker {}", settings.broker))?;
            Ok(Box::new(MqttMessenger::new(
                endpoint,
                settings.client_id.clone(),
            )))
        }
    }
}

fn spawn_stdin_reader(tx: Sender<Control>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    });
}
