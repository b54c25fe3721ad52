// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! BTSwitch command-line application

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btswitch::bluetooth::{
    Address, BluetoothAdapter, Command, DeviceSelector, SessionEvent, SessionHandle,
};
use btswitch::config::Config;
use btswitch::events::EventProcessor;
use btswitch::ui::{self, ConsoleAction};

#[derive(Parser)]
#[command(name = "btswitch")]
#[command(about = "Control a relay board over Bluetooth SPP", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Connect and handshake timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Connect to a fixed RFCOMM channel instead of looking up the SPP service
    #[arg(long, global = true)]
    channel: Option<u8>,

    /// Turn Bluetooth on without asking if it is off
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List paired devices
    Devices,
    /// Interactive console (default)
    Connect {
        /// Device index, address or name; asks when omitted
        device: Option<String>,
    },
    /// Connect, print the board status and disconnect
    Status {
        /// Device index, address or name
        device: String,
    },
    /// Connect, send one command and disconnect
    Send {
        /// Device index, address or name
        device: String,
        #[arg(value_enum)]
        command: CommandArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CommandArg {
    OutOn,
    OutOff,
    LedsOn,
    LedsOff,
}

impl From<CommandArg> for Command {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::OutOn => Command::OutOn,
            CommandArg::OutOff => Command::OutOff,
            CommandArg::LedsOn => Command::LedsOn,
            CommandArg::LedsOff => Command::LedsOff,
        }
    }
}

type Input = Lines<BufReader<tokio::io::Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let directive = match cli.verbose {
        0 => "btswitch=warn",
        1 => "btswitch=info",
        _ => "btswitch=debug",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    info!("Starting BTSwitch v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let stored = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {}", stored.path.display());

    // Command-line overrides are not persisted
    let mut config = stored.clone();
    if let Some(timeout) = cli.timeout {
        if timeout == 0 {
            bail!("--timeout must be greater than zero");
        }
        config.bluetooth.connect_timeout_secs = timeout;
    }
    if cli.channel.is_some() {
        config.bluetooth.rfcomm_channel = cli.channel;
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let adapter = Arc::new(BluetoothAdapter::open(config.bluetooth.rfcomm_channel).await?);
    ensure_powered(&adapter, cli.yes || config.bluetooth.auto_power_on, &mut input).await?;

    match cli.command.unwrap_or(Commands::Connect { device: None }) {
        Commands::Devices => {
            let selector = DeviceSelector::new(adapter.bonded_devices().await?);
            println!("{}", ui::render_list(&selector, config.last_device()));
        }
        Commands::Connect { device } => {
            let (session, events) = SessionHandle::spawn(adapter.clone(), config.session_config());
            let processor = EventProcessor::new(stored);
            run_console(&adapter, &session, events, processor, device, &mut input).await?;
        }
        Commands::Status { device } => {
            let address = resolve_device(&adapter, &device).await?;
            let (session, events) = SessionHandle::spawn(adapter.clone(), config.session_config());
            drop(events);

            let info = session.connect(address).await?;
            println!("{}", info.about);
            println!("{}", info.status);
            session.disconnect().await;
        }
        Commands::Send { device, command } => {
            let address = resolve_device(&adapter, &device).await?;
            let (session, events) = SessionHandle::spawn(adapter.clone(), config.session_config());
            drop(events);

            session.connect(address).await?;
            let command = Command::from(command);
            let result = session.send(command).await;
            session.disconnect().await;
            result?;
            println!("Sent {}", command);
        }
    }

    info!("BTSwitch stopped");
    Ok(())
}

/// Make sure the adapter is on, asking the user when it is not.
async fn ensure_powered<R>(adapter: &BluetoothAdapter, assume_yes: bool, input: &mut Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    if let Err(e) = adapter.ensure_powered().await {
        ui::confirm_power_on(e, assume_yes, input).await?;
        adapter.power_on().await?;
    }
    Ok(())
}

async fn resolve_device(adapter: &BluetoothAdapter, device: &str) -> Result<Address> {
    let selector = DeviceSelector::new(adapter.bonded_devices().await?);
    selector
        .select(device)
        .ok_or_else(|| anyhow!("No paired device matches '{}'", device))
}

/// Interactive console loop.
async fn run_console(
    adapter: &BluetoothAdapter,
    session: &SessionHandle,
    mut events: mpsc::Receiver<SessionEvent>,
    mut processor: EventProcessor,
    device: Option<String>,
    input: &mut Input,
) -> Result<()> {
    let mut last_device = processor.config().last_device();

    println!("Type 'help' for commands.");
    handle_action(adapter, session, ConsoleAction::Connect(device), &mut last_device, input).await?;

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                match ConsoleAction::parse(&line) {
                    Ok(Some(ConsoleAction::Quit)) => break,
                    Ok(Some(action)) => {
                        handle_action(adapter, session, action, &mut last_device, input).await?;
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Some(event) = events.recv() => {
                if let SessionEvent::Connected { address, .. } = &event {
                    last_device = Some(*address);
                }
                processor.process_event(&event);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.disconnect().await;
    while let Ok(event) = events.try_recv() {
        processor.process_event(&event);
    }
    Ok(())
}

async fn handle_action(
    adapter: &BluetoothAdapter,
    session: &SessionHandle,
    action: ConsoleAction,
    last_device: &mut Option<Address>,
    input: &mut Input,
) -> Result<()> {
    let state = session.state();

    match action {
        ConsoleAction::Connect(device) => {
            if state.get_status().is_busy() {
                println!("Already connecting");
                return Ok(());
            }

            let selector = DeviceSelector::new(adapter.bonded_devices().await?);
            let address = match device {
                Some(device) => selector.select(&device),
                None => ui::pick_device(&selector, *last_device, input).await?,
            };
            let Some(address) = address else {
                println!("No device selected");
                return Ok(());
            };

            // Result arrives as a session event
            let session = session.clone();
            tokio::spawn(async move {
                if let Err(e) = session.connect(address).await {
                    info!("Connect attempt ended: {}", e);
                }
            });
        }
        ConsoleAction::Disconnect => {
            if state.get_status().is_busy() || state.is_connected() {
                session.disconnect().await;
            } else {
                println!("Not connected");
            }
        }
        ConsoleAction::Output(_) | ConsoleAction::Leds(_) => {
            let Some(command) = action.command(state) else {
                return Ok(());
            };
            match session.send(command).await {
                Ok(()) => println!("{}", ui::status_line(state)),
                Err(e) => println!("{} not sent: {}", command, e),
            }
        }
        ConsoleAction::Refresh => match session.refresh().await {
            Ok(status) => println!("{}", status),
            Err(e) => println!("Refresh failed: {}", e),
        },
        ConsoleAction::Devices => {
            let selector = DeviceSelector::new(adapter.bonded_devices().await?);
            println!("{}", ui::render_list(&selector, *last_device));
        }
        ConsoleAction::Status => println!("{}", ui::status_line(state)),
        ConsoleAction::Help => println!("{}", ui::HELP),
        ConsoleAction::Quit => {}
    }

    if let Err(e) = std::io::stdout().flush() {
        error!("Failed to flush stdout: {}", e);
    }
    Ok(())
}
