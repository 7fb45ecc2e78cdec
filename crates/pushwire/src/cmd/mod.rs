use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod serve;
pub mod split;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split one message file and report the frames it becomes.
    Split(SplitArgs),
    /// Accept device connections and deliver messages to each one.
    Serve(ServeArgs),
    /// Connect as a device and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Split(args) => split::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// File holding one JSON message.
    pub file: PathBuf,
    /// Accumulation budget per frame in bytes.
    #[arg(long, value_name = "BYTES", env = "PUSHWIRE_PAYLOAD_BUDGET")]
    pub budget: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (e.g. 127.0.0.1:9090, port 0 picks one).
    pub addr: String,
    /// JSON-lines file of messages delivered to every device, in order.
    #[arg(long, value_name = "FILE")]
    pub messages: PathBuf,
    /// Stop after serving N device connections.
    #[arg(long, value_name = "N")]
    pub max_sessions: Option<usize>,
    /// Accumulation budget per frame in bytes.
    #[arg(long, value_name = "BYTES", env = "PUSHWIRE_PAYLOAD_BUDGET")]
    pub budget: Option<usize>,
    /// Ping interval announced in the connect acknowledgement.
    #[arg(long, default_value = "10m")]
    pub ping_interval: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Server address to connect to.
    pub addr: String,
    /// Device id sent in the connect message.
    #[arg(long, default_value = "pushwire-cli")]
    pub device_id: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Maximum wait for each message (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
