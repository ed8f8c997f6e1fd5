use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use serde_json::Value;

use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use wot_consumer::router::ChannelOutput;
use wot_consumer::runtime::SimulatedRuntime;
use wot_consumer::{ConsumerConfig, Message, RequestOutcome, ThingConsumer};
use wot_td::ThingDescription;

const BUFFER_SIZE: usize = 64;

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "Feeds messages to a Web of Things consumer backed by a simulated device."
)]
struct Cli {
    /// Thing Description of the simulated device.
    #[arg(long)]
    td: PathBuf,
    /// Incoming message. An empty message is used when missing.
    #[arg(long)]
    message: Option<PathBuf>,
    /// Consumer configuration. Defaults are used when missing.
    #[arg(long)]
    config: Option<PathBuf>,
    /// How many times the message is handled.
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    /// Prints debug information.
    #[arg(short, long)]
    verbose: bool,
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .init();

    let thing = ThingDescription::from_value(read_json(&cli.td)?)?;

    let config = match &cli.config {
        Some(path) => ConsumerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ConsumerConfig::new(),
    }
    .thing_description(thing);

    let message = match &cli.message {
        Some(path) => Message::from_value(read_json(path)?)
            .ok_or("The incoming message must be a JSON object")?,
        None => Message::new(),
    };

    let (output, mut messages, mut diagnostics) = ChannelOutput::new(BUFFER_SIZE);

    let printer = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            println!("{}", message.into_value());
        }
    });

    let reporter = tokio::spawn(async move {
        while let Some(diagnostic) = diagnostics.recv().await {
            eprintln!("{}", diagnostic.error);
        }
    });

    let runtime = SimulatedRuntime::new();
    let consumer = ThingConsumer::start(&runtime, config, Arc::new(output)).await?;

    for request in 1..=cli.repeat {
        match consumer.handle(message.clone()).await {
            RequestOutcome::Done { routed, failed } => {
                info!("Request {request}: {routed} results routed, {failed} failed");
            }
            RequestOutcome::Dropped => info!("Request {request}: no matching affordance"),
            RequestOutcome::Errored(e) => error!("Request {request}: {e}"),
        }
    }

    info!("Devices consumed: {}", runtime.consumed());

    // Dropping the consumer closes the output channels.
    consumer.shutdown().await;

    for handle in [printer, reporter] {
        if let Err(e) = handle.await {
            error!("Failed to await the output task: {e}");
        }
    }

    Ok(())
}
