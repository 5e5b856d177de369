//! Entry point for **autoscaler**.
//!
//! Loads the configuration once, then runs the control loop on the main
//! task with the `xev` watcher in the background until Ctrl-C or a fatal
//! error.

use autoscaler::command::ShellCommand;
use autoscaler::config::{self, Config};
use autoscaler::control::ControlLoop;
use autoscaler::error::Error;
use autoscaler::signal;
use autoscaler::x11::xev::Xev;
use autoscaler::x11::xrandr::Xrandr;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "autoscaler", version, about = "Run a command when a display's resolution changes.")]
struct Args {
    /// Path to the configuration file (default: $XDG_CONFIG_HOME/autoscaler/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Program printing xrandr-style screen output
    #[arg(long, default_value = "xrandr")]
    query_cmd: String,

    /// Program streaming xev-style events (invoked with -root)
    #[arg(long, default_value = "xev")]
    watch_cmd: String,

    /// Run one check and exit without watching for changes
    #[arg(long)]
    once: bool,

    /// Log the command instead of running it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let path = args.config.unwrap_or_else(config::default_path);
    let config = Config::load(&path)?;
    info!("loaded config from {}", path.display());

    let runner = ShellCommand::new(config.command.clone()).dry_run(args.dry_run);
    let control = ControlLoop::new(config, Xrandr::new(args.query_cmd), runner);

    if args.once {
        let outcome = control.cycle().await?;
        info!("{:?}", outcome);
        return Ok(());
    }

    let (trigger, shutdown) = signal::shutdown();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupted, shutting down");
                trigger.trigger();
            }
            Err(e) => error!("cannot listen for Ctrl-C: {}", e),
        }
    });

    control.run(Xev::new(args.watch_cmd), shutdown).await
}
