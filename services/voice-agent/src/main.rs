use anyhow::{Context, Result};
use clap::Parser;
use gemini_live::ClientConfig;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;
use voice_agent::config::Config;
use voice_agent::console::{self, Command};
use voice_agent::gemini_adapter::GeminiConnector;
use voice_agent::prompt_loader;
use voice_core::generic_types::LiveConfig;
use voice_core::{ControllerSettings, SessionController};
use voice_native_utils::CpalPlatform;

#[derive(Parser)]
#[command(version, about = "Talk to a Gemini Live model from the terminal")]
struct Cli {
    /// Print the available audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Name of the microphone to use instead of the default
    #[arg(long)]
    input_device: Option<String>,

    /// Name of the speaker to use instead of the default
    #[arg(long)]
    output_device: Option<String>,

    /// Read the system instruction from this file
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,

    /// Live model id, overrides GEMINI_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Start a session immediately instead of waiting for Enter
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if args.list_devices {
        println!("Input devices:\n{}", voice_native_utils::device::get_available_inputs()?);
        println!("Output devices:\n{}", voice_native_utils::device::get_available_outputs()?);
        return Ok(());
    }

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // stdout belongs to the conversation, logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting voice agent...");

    // --- 3. Resolve the Session Settings ---
    let system_prompt = match &args.system_prompt_file {
        Some(path) => prompt_loader::load_system_prompt(path).context("Failed to load system prompt")?,
        None => config.system_prompt.clone(),
    };
    let model = args.model.clone().unwrap_or_else(|| config.model.clone());

    let live = LiveConfig::new(model)
        .with_system_instruction(system_prompt)
        .with_voice(config.voice.clone());
    let mut settings = ControllerSettings::new(live);
    settings.agent_finality = config.agent_finality;

    // --- 4. Wire the Controller ---
    let client_config = ClientConfig::builder()
        .with_api_key(config.gemini_api_key)
        .build();
    let connector = GeminiConnector::new(client_config);
    let platform = CpalPlatform::new(args.input_device.clone(), args.output_device.clone());

    let (mut controller, mut events) = SessionController::new(connector, platform, settings);
    let renderer = tokio::spawn(console::render(controller.subscribe()));

    let (command_tx, mut commands) = mpsc::channel::<Command>(8);
    console::spawn_command_reader(command_tx).context("Failed to start the command reader")?;

    if args.autostart {
        controller.toggle().await;
    }

    // --- 5. Run Until Quit ---
    loop {
        tokio::select! {
            Some(event) = events.recv() => controller.handle_event(event).await,
            command = commands.recv() => match command {
                Some(Command::Toggle) => controller.toggle().await,
                Some(Command::Quit) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    controller.shutdown().await;
    drop(controller);
    if let Err(e) = renderer.await {
        tracing::warn!("Renderer task failed: {}", e);
    }
    tracing::info!("Shutting down...");
    Ok(())
}
