use serde::Deserialize;
use sntp_proto::ClientConfig;
use std::{
    fmt::Display,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{info, warn};

use super::tracing::LogLevel;

const USAGE_MSG: &str = "\
usage: sntp-clock [-c PATH] [-l LOG_LEVEL] [-s SERVER] [-1]
       sntp-clock -h
       sntp-clock -v";

const DESCRIPTOR: &str = "sntp-clock - keep track of the current time using an SNTP server";

const HELP_MSG: &str = "Options:
  -c, --config=PATH             change the config .toml file
  -l, --log-level=LOG_LEVEL     change the log level
  -s, --server=SERVER           override the time server from the config
  -1, --once                    synchronize once, print the result as json and exit
  -h, --help                    display this help text
  -v, --version                 display version information";

pub fn long_help_message() -> String {
    format!("{DESCRIPTOR}\n\n{USAGE_MSG}\n\n{HELP_MSG}")
}

#[derive(Debug, Default)]
pub(crate) struct SntpClockOptions {
    /// Path of the configuration file
    pub config: Option<PathBuf>,
    /// Level for messages to display in logs
    pub log_level: Option<LogLevel>,
    /// Time server to use instead of the configured one
    pub server: Option<String>,
    help: bool,
    version: bool,
    once: bool,
    pub action: SntpClockAction,
}

/// One command line option after splitting combined short options and
/// attaching option values to their option.
#[derive(Debug, PartialEq, Eq)]
pub enum CliArg {
    Flag(String),
    Argument(String, String),
    Rest(Vec<String>),
}

impl CliArg {
    /// Turn raw arguments (program name first) into options.
    ///
    /// Options listed in `takes_argument` (long, with dashes) or
    /// `takes_argument_short` take a value, either attached (`--config=x`,
    /// `-cx`) or from the next argument. Everything after `--` and every
    /// argument not starting with a dash ends up in a trailing `Rest`.
    pub fn normalize_arguments<I>(
        takes_argument: &[&str],
        takes_argument_short: &[char],
        iter: I,
    ) -> Result<Vec<Self>, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = iter.into_iter().skip(1);
        let mut options = vec![];
        let mut positional = vec![];

        while let Some(arg) = args.next() {
            if arg == "--" {
                positional.extend(&mut args);
                break;
            }

            if let Some(name) = arg.strip_prefix("--") {
                options.push(Self::long_option(name, takes_argument, &mut args)?);
            } else if let Some(group) = arg.strip_prefix('-').filter(|g| !g.is_empty()) {
                Self::short_options(group, takes_argument_short, &mut args, &mut options)?;
            } else {
                positional.push(arg);
            }
        }

        if !positional.is_empty() {
            options.push(CliArg::Rest(positional));
        }

        Ok(options)
    }

    fn long_option(
        name: &str,
        takes_argument: &[&str],
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, String> {
        let (key, attached) = match name.split_once('=') {
            Some((key, value)) => (format!("--{key}"), Some(value)),
            None => (format!("--{name}"), None),
        };

        if !takes_argument.contains(&key.as_str()) {
            return match attached {
                Some(_) => Err(format!("invalid option: '--{name}'")),
                None => Ok(CliArg::Flag(key)),
            };
        }

        let value = match attached {
            Some(value) => value.to_owned(),
            None => args
                .next()
                .ok_or_else(|| format!("'{key}' expects an argument"))?,
        };
        Ok(CliArg::Argument(key, value))
    }

    /// Split a group such as `-1cpath` into `-1` and `-c path`. The first
    /// option taking a value consumes the remainder of the group.
    fn short_options(
        group: &str,
        takes_argument_short: &[char],
        args: &mut impl Iterator<Item = String>,
        options: &mut Vec<Self>,
    ) -> Result<(), String> {
        for (index, option) in group.char_indices() {
            let flag = format!("-{option}");
            if !takes_argument_short.contains(&option) {
                options.push(CliArg::Flag(flag));
                continue;
            }

            let attached = group[index + option.len_utf8()..].trim();
            if attached.starts_with('=') {
                return Err(format!("invalid option: '{flag}{attached}'"));
            }

            let value = if attached.is_empty() {
                args.next()
                    .ok_or_else(|| format!("'{flag}' expects an argument"))?
            } else {
                attached.to_owned()
            };
            options.push(CliArg::Argument(flag, value));
            break;
        }

        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum SntpClockAction {
    #[default]
    Help,
    Version,
    Run,
    Once,
}

impl SntpClockOptions {
    const TAKES_ARGUMENT: &'static [&'static str] = &["--config", "--log-level", "--server"];
    const TAKES_ARGUMENT_SHORT: &'static [char] = &['c', 'l', 's'];

    /// parse an iterator over command line arguments
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str> + Clone,
    {
        let mut options = SntpClockOptions::default();
        let arg_iter = CliArg::normalize_arguments(
            Self::TAKES_ARGUMENT,
            Self::TAKES_ARGUMENT_SHORT,
            iter.into_iter().map(|x| x.as_ref().to_string()),
        )?;

        for arg in arg_iter {
            match arg {
                CliArg::Flag(flag) => match flag.as_str() {
                    "-h" | "--help" => {
                        options.help = true;
                    }
                    "-v" | "--version" => {
                        options.version = true;
                    }
                    "-1" | "--once" => {
                        options.once = true;
                    }
                    option => {
                        Err(format!("invalid option provided: {option}"))?;
                    }
                },
                CliArg::Argument(option, value) => match option.as_str() {
                    "-c" | "--config" => {
                        options.config = Some(PathBuf::from(value));
                    }
                    "-l" | "--log-level" => match LogLevel::from_str(&value) {
                        Ok(level) => options.log_level = Some(level),
                        Err(_) => return Err("invalid log level".into()),
                    },
                    "-s" | "--server" => {
                        if value.is_empty() {
                            return Err("server cannot be empty".into());
                        }
                        options.server = Some(value);
                    }
                    option => {
                        Err(format!("invalid option provided: {option}"))?;
                    }
                },
                CliArg::Rest(_rest) => { /* do nothing, drop remaining arguments */ }
            }
        }

        options.resolve_action();

        Ok(options)
    }

    /// from the arguments resolve which action should be performed
    fn resolve_action(&mut self) {
        if self.help {
            self.action = SntpClockAction::Help;
        } else if self.version {
            self.action = SntpClockAction::Version;
        } else if self.once {
            self.action = SntpClockAction::Once;
        } else {
            self.action = SntpClockAction::Run;
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default = "default_ansi_colors")]
    pub ansi_colors: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: Default::default(),
            ansi_colors: default_ansi_colors(),
        }
    }
}

const fn default_ansi_colors() -> bool {
    true
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    const GLOBAL_PATH: &'static str = "/etc/sntp-clock/sntp.toml";

    fn from_file(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let meta = std::fs::metadata(&file)?;
            if meta.permissions().mode() & 0o002 != 0 {
                warn!("Unrestricted config file permissions: Others can write.");
            }
        }

        let contents = std::fs::read_to_string(file)?;
        Ok(toml::de::from_str(&contents)?)
    }

    fn from_first_file(file: Option<impl AsRef<Path>>) -> Result<Config, ConfigError> {
        // if an explicit file is given, always use that one
        if let Some(f) = file {
            let path: &Path = f.as_ref();
            info!(?path, "using config file");
            return Config::from_file(f);
        }

        // for the global file we also ignore it when there are permission errors
        let global_path = Path::new(Self::GLOBAL_PATH);
        if global_path.exists() {
            info!("using config file at default location `{:?}`", global_path);
            match Config::from_file(global_path) {
                Err(ConfigError::Io(e)) if e.kind() == ErrorKind::PermissionDenied => {
                    info!("permission denied on global config file! using default config ...");
                }
                other => {
                    return other;
                }
            }
        }

        Ok(Config::default())
    }

    pub fn from_args(
        file: Option<impl AsRef<Path>>,
        server: Option<String>,
    ) -> Result<Config, ConfigError> {
        let mut config = Config::from_first_file(file.as_ref())?;

        if let Some(server) = server {
            info!(%server, "overriding server from configuration");
            config.client.server = server;
        }

        Ok(config)
    }

    /// Check that the config is reasonable. Problems are logged, the
    /// client still runs with whatever was configured.
    pub fn check(&self) -> bool {
        let mut ok = true;
        let client = &self.client;

        if client.server_port == 0 {
            warn!("Server port 0 is not valid, synchronization will fail.");
            ok = false;
        }

        if client.response_timeout == 0 {
            warn!("Response timeout is zero, only responses that are already waiting will be seen.");
            ok = false;
        }

        if client.update_interval < client.response_timeout {
            warn!(
                update_interval = client.update_interval,
                response_timeout = client.response_timeout,
                "Update interval is shorter than the response timeout; an unreachable server will be queried continuously."
            );
            ok = false;
        }

        if client.local_port == 0 {
            info!("No local port configured, using an ephemeral port.");
        }

        ok
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
}

impl std::error::Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error while reading config: {e}"),
            Self::Toml(e) => write!(f, "config toml parsing error: {e}"),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.client, ClientConfig::default());
        assert!(config.observability.log_level.is_none());
        assert!(config.observability.ansi_colors);

        let config: Config = toml::from_str(
            r#"
            [client]
            server = "pool.ntp.org"
            local-port = 2390
            time-offset = 3600
            update-interval = 300000
            response-timeout = 500
            [observability]
            log-level = "debug"
            ansi-colors = false
            "#,
        )
        .unwrap();

        assert_eq!(config.client.server, "pool.ntp.org");
        assert_eq!(config.client.server_port, 123);
        assert_eq!(config.client.local_port, 2390);
        assert_eq!(config.client.time_offset, 3600);
        assert_eq!(config.client.update_interval, 300_000);
        assert_eq!(config.client.response_timeout, 500);
        assert_eq!(config.observability.log_level, Some(LogLevel::Debug));
        assert!(!config.observability.ansi_colors);
        assert!(config.check());
    }

    #[test]
    fn default_config_file() {
        let config: Config =
            toml::from_str(include_str!("../../../docs/sntp.toml.default")).unwrap();
        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.observability.log_level, Some(LogLevel::Info));
        assert!(config.check());
    }

    #[test]
    fn deny_unknown_fields() {
        let config: Result<Config, _> = toml::from_str(
            r#"
            [client]
            unknown-field = 42
            "#,
        );
        let error = config.unwrap_err();
        assert!(error.to_string().contains("unknown field"));

        let config: Result<Config, _> = toml::from_str("[source]\nmode = \"server\"");
        assert!(config.is_err());

        let config: Result<Config, _> = toml::from_str("[observability]\nlog-level = \"loud\"");
        assert!(config.is_err());
    }

    #[test]
    fn check_flags_suspicious_values() {
        let mut config = Config::default();
        assert!(config.check());

        config.client.update_interval = 500;
        assert!(!config.check());

        let mut config = Config::default();
        config.client.server_port = 0;
        assert!(!config.check());

        let mut config = Config::default();
        config.client.response_timeout = 0;
        assert!(!config.check());

        let mut config = Config::default();
        config.client.local_port = 0;
        assert!(config.check());
    }

    #[test]
    fn config_from_file() {
        let path = std::env::temp_dir().join(format!("sntp-clock-test-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"[client]\nserver = \"ntp.example.org\"\n")
            .unwrap();
        drop(file);

        let config = Config::from_args(Some(&path), None).unwrap();
        assert_eq!(config.client.server, "ntp.example.org");

        let config = Config::from_args(Some(&path), Some("127.0.0.1".to_string())).unwrap();
        assert_eq!(config.client.server, "127.0.0.1");

        std::fs::remove_file(&path).unwrap();

        let error = Config::from_args(Some(&path), None).unwrap_err();
        assert!(matches!(error, ConfigError::Io(e) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn cli_no_arguments() {
        let arguments: [String; 0] = [];
        let parsed_empty = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert!(parsed_empty.config.is_none());
        assert!(parsed_empty.log_level.is_none());
        assert!(parsed_empty.server.is_none());
        assert_eq!(parsed_empty.action, SntpClockAction::Run);
    }

    #[test]
    fn cli_external_config() {
        let arguments = &["/usr/bin/sntp-clock", "--config", "other.toml"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.config, Some("other.toml".into()));
        assert!(parsed.log_level.is_none());
        assert_eq!(parsed.action, SntpClockAction::Run);

        let arguments = &["/usr/bin/sntp-clock", "-c", "other.toml"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.config, Some("other.toml".into()));
        assert_eq!(parsed.action, SntpClockAction::Run);

        let arguments = &["/usr/bin/sntp-clock", "--config=other.toml"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.config, Some("other.toml".into()));
    }

    #[test]
    fn cli_log_level() {
        let arguments = &["/usr/bin/sntp-clock", "--log-level", "debug"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert!(parsed.config.is_none());
        assert_eq!(parsed.log_level.unwrap(), LogLevel::Debug);

        let arguments = &["/usr/bin/sntp-clock", "-l", "debug"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.log_level.unwrap(), LogLevel::Debug);

        let arguments = &["/usr/bin/sntp-clock", "-l", "chatty"];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());
    }

    #[test]
    fn cli_server_and_once() {
        let arguments = &["/usr/bin/sntp-clock", "-1", "-s", "pool.ntp.org"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.server.as_deref(), Some("pool.ntp.org"));
        assert_eq!(parsed.action, SntpClockAction::Once);

        let arguments = &["/usr/bin/sntp-clock", "--once", "--server=time.nist.gov"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.server.as_deref(), Some("time.nist.gov"));
        assert_eq!(parsed.action, SntpClockAction::Once);

        let arguments = &["/usr/bin/sntp-clock", "--server="];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());
    }

    #[test]
    fn cli_help_and_version() {
        let arguments = &["/usr/bin/sntp-clock", "-1", "-h"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.action, SntpClockAction::Help);

        let arguments = &["/usr/bin/sntp-clock", "--version"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.action, SntpClockAction::Version);

        let arguments = &["/usr/bin/sntp-clock", "--verbose"];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());

        assert!(long_help_message().contains("--once"));
    }

    #[test]
    fn cli_missing_argument() {
        let arguments = &["/usr/bin/sntp-clock", "-c"];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());

        let arguments = &["/usr/bin/sntp-clock", "--log-level"];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());
    }

    #[test]
    fn cli_combined_short_options() {
        let arguments = &["/usr/bin/sntp-clock", "-cother.toml"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.config, Some("other.toml".into()));

        let arguments = &["/usr/bin/sntp-clock", "-1l", "debug"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.log_level, Some(LogLevel::Debug));
        assert_eq!(parsed.action, SntpClockAction::Once);

        let arguments = &["/usr/bin/sntp-clock", "-c=other.toml"];
        assert!(SntpClockOptions::try_parse_from(arguments).is_err());
    }

    #[test]
    fn cli_non_ascii_short_options() {
        let normalized = CliArg::normalize_arguments(
            SntpClockOptions::TAKES_ARGUMENT,
            SntpClockOptions::TAKES_ARGUMENT_SHORT,
            ["sntp-clock", "-ééc", "x"].map(String::from),
        )
        .unwrap();
        assert_eq!(
            normalized,
            vec![
                CliArg::Flag("-é".into()),
                CliArg::Flag("-é".into()),
                CliArg::Argument("-c".into(), "x".into()),
            ]
        );

        let arguments = &["/usr/bin/sntp-clock", "-ééc", "x"];
        let error = SntpClockOptions::try_parse_from(arguments).unwrap_err();
        assert!(error.contains("-é"));

        let arguments = &["/usr/bin/sntp-clock", "-cßtime.toml"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.config, Some("ßtime.toml".into()));
    }

    #[test]
    fn cli_positional_arguments_ignored() {
        let arguments = &["/usr/bin/sntp-clock", "-1", "--", "-c", "unused"];
        let parsed = SntpClockOptions::try_parse_from(arguments).unwrap();
        assert!(parsed.config.is_none());
        assert_eq!(parsed.action, SntpClockAction::Once);
    }
}
