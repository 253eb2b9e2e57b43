//! Interactive RFCOMM test console for vendor Bluetooth HALs.

use bthal::{app, native, rfcomm, Config, Console};
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tokio::io::BufReader;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[clap(
    name = "rfcommtest",
    about = "Interactive console driving the RFCOMM test interface of a vendor Bluetooth HAL.",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Opts {
    /// Vendor Bluetooth library to load.
    #[clap(long)]
    library: Option<String>,
    /// Symbol of the Bluetooth interface table.
    #[clap(long)]
    symbol: Option<String>,
    /// Maximum number of concurrently running background commands.
    #[clap(long, short)]
    jobs: Option<usize>,
    /// PID file to remove when the library cannot be loaded.
    #[clap(long)]
    pid_file: Option<PathBuf>,
    /// Switch to the Bluetooth user and groups before loading the library.
    #[clap(long)]
    drop_privileges: bool,
}

impl From<Opts> for Config {
    fn from(opts: Opts) -> Self {
        let default = Config::default();
        Config {
            library: opts.library.unwrap_or(default.library),
            symbol: opts.symbol.unwrap_or(default.symbol),
            jobs: opts.jobs.unwrap_or(default.jobs),
            pid_file: opts.pid_file.unwrap_or(default.pid_file),
            drop_privileges: opts.drop_privileges,
            ..default
        }
    }
}

async fn run(config: &Config) -> bthal::Result<()> {
    let console = Console::stdout();
    let loaded = native::load(config);
    let input = BufReader::new(tokio::io::stdin());
    let start = |hal| rfcomm::start(hal, config, console.clone());
    app::launch(loaded, config, &console, start, input).await
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::from(Opts::parse());
    if config.drop_privileges {
        app::drop_privileges();
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(&config));
    // A stdin read may still be blocked after Ctrl-C.
    rt.shutdown_background();

    if let Err(err) = result {
        log::error!("{err}");
        exit(1);
    }
    Ok(())
}
