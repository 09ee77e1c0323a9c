use log::{error, info, warn};
use std::process::ExitCode;

use anticipation::signal::{self, Shutdown};
use anticipation::{AppConfig, EdgeLoop, LineManager, Players};

#[cfg(not(feature = "sysfs-gpio"))]
use anticipation::MockGpioBackend;
#[cfg(feature = "sysfs-gpio")]
use anticipation::SysfsBackend;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let players = match Players::from_args(args.iter().cloned()) {
        Ok(players) => players,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match args
        .get(2)
        .cloned()
        .or_else(|| std::env::var("ANTICIPATION_CONFIG").ok())
    {
        Some(path) => match AppConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    println!(
        "Welcome to the game of Anticipation, {} and {}!",
        players.first, players.second
    );

    let shutdown = Shutdown::new();
    signal::install_handler(&shutdown);

    let backend = {
        #[cfg(feature = "sysfs-gpio")]
        {
            SysfsBackend::new(&config.sysfs_root)
        }
        #[cfg(not(feature = "sysfs-gpio"))]
        {
            MockGpioBackend::default()
        }
    };

    let (mut lines, failures) = LineManager::setup(&config, backend);
    if !failures.is_empty() {
        warn!("{} lines failed to set up", failures.len());
    }

    let mut edge_loop = EdgeLoop::new(&config, shutdown);
    match edge_loop.run(&mut lines) {
        Ok(stats) => info!(
            "{} iterations, {} poll timeouts",
            stats.iterations, stats.timeouts
        ),
        Err(e) => error!("{e}; is the program exiting?"),
    }

    let errors = lines.teardown();
    if !errors.is_empty() {
        warn!("{} teardown steps failed", errors.len());
    }

    info!("lines released, exiting");
    ExitCode::SUCCESS
}
