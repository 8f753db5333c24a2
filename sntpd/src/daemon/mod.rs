pub mod clock;
pub mod config;
pub mod observer;
pub mod tracing;
pub mod transport;

use std::{error::Error, path::PathBuf, time::Duration};

use ::tracing::{debug, info};
pub use config::Config;
pub use observer::ClockSnapshot;
use sntp_proto::NtpClient;
use tracing_subscriber::util::SubscriberInitExt;

use config::{SntpClockAction, SntpClockOptions};

use self::{clock::MonotonicMillis, tracing::LogLevel, transport::UdpTransport};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the run loop reports the current time.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

pub fn main() -> Result<(), Box<dyn Error>> {
    let options = SntpClockOptions::try_parse_from(std::env::args())?;

    match options.action {
        SntpClockAction::Help => {
            println!("{}", config::long_help_message());
        }
        SntpClockAction::Version => {
            eprintln!("sntp-clock {VERSION}");
        }
        SntpClockAction::Run => run(options)?,
        SntpClockAction::Once => once(options)?,
    }

    Ok(())
}

// initializes the logger so that logs during config parsing are reported. Then it overrides the
// log level based on the config if required.
pub(crate) fn initialize_logging_parse_config(
    initial_log_level: Option<LogLevel>,
    config_path: Option<PathBuf>,
    server: Option<String>,
) -> Config {
    let mut log_level = initial_log_level.unwrap_or_default();

    let config_tracing = self::tracing::tracing_init(log_level, true);
    let config = ::tracing::subscriber::with_default(config_tracing, || {
        match Config::from_args(config_path, server) {
            Ok(c) => c,
            Err(e) => {
                // print to stderr because tracing is not yet setup
                eprintln!("There was an error loading the config: {e}");
                std::process::exit(exitcode::CONFIG);
            }
        }
    });

    if let Some(config_log_level) = config.observability.log_level {
        if initial_log_level.is_none() {
            log_level = config_log_level;
        }
    }

    // set a default global subscriber from now on
    let tracing_inst = self::tracing::tracing_init(log_level, config.observability.ansi_colors);
    tracing_inst.init();

    // give the user a warning that we use the command line option
    if config.observability.log_level.is_some() && initial_log_level.is_some() {
        info!("Log level override from command line arguments is active");
    }

    // Warn if the config is unreasonable. We do this after finishing
    // tracing setup to ensure logging is fully configured.
    config.check();

    config
}

fn start_client(
    options: SntpClockOptions,
) -> Result<NtpClient<UdpTransport, MonotonicMillis>, Box<dyn Error>> {
    let config = initialize_logging_parse_config(options.log_level, options.config, options.server);

    let mut client = NtpClient::new(UdpTransport::new(), MonotonicMillis::new(), config.client);
    client.begin()?;
    debug!(
        server = %client.config().server,
        local_addr = ?client.transport().local_addr(),
        "client started"
    );

    Ok(client)
}

fn run(options: SntpClockOptions) -> Result<(), Box<dyn Error>> {
    let mut client = start_client(options)?;

    loop {
        // failures are logged by the client and retried after the update interval
        client.update();

        info!(
            time = %client.local_time(),
            synchronized = client.is_synchronized(),
            "current time"
        );
        std::thread::sleep(REPORT_INTERVAL);
    }
}

fn once(options: SntpClockOptions) -> Result<(), Box<dyn Error>> {
    let mut client = start_client(options)?;

    let result = client.try_force_update();
    client.end();
    result?;

    let snapshot = ClockSnapshot::from_client(&client);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

pub(crate) mod exitcode {
    /// Something was found in an unconfigured or misconfigured state.
    pub const CONFIG: i32 = 78;
}
