use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warwalker")]
#[command(about = "A Wi-Fi handshake capture front-end")]
pub struct Cli {
    /// Interpreter used to launch the scan process
    #[arg(long, default_value = "python3")]
    pub interpreter: String,

    /// Scan entry-point script passed to the interpreter
    #[arg(long, default_value = "main.py")]
    pub script: PathBuf,

    /// Refresh rate in milliseconds
    #[arg(short, long, default_value = "250")]
    pub refresh_rate: u64,

    /// Run one scan headless and print status transitions instead of the TUI
    #[arg(long)]
    pub no_tui: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
