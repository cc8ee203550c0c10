//! Server Configuration
//!
//! Command-line flags and their defaults. Parsing never exits the process;
//! the binary decides what to do with `--help`, `--version` and errors.

use crate::connection::ReactorMode;
use crate::storage::MIN_SHARD_SIZE;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

/// Default total cache budget (64 MiB)
pub const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

/// Default number of cache shards
pub const DEFAULT_SHARDS: usize = 4;

/// Errors from parsing or validating the command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("capacity of {capacity} bytes gives {shard_size}-byte shards, below the {min}-byte minimum")]
    CapacityTooSmall {
        capacity: usize,
        shard_size: usize,
        min: usize,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(ServerConfig),
    Help,
    Version,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    pub mode: ReactorMode,
    /// Worker threads in multi-threaded mode
    pub workers: usize,
    pub shards: usize,
    /// Total cache budget in bytes, split evenly across shards
    pub capacity: usize,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mode: ReactorMode::MultiThreaded,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            shards: DEFAULT_SHARDS,
            capacity: DEFAULT_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses configuration from the process arguments.
    pub fn from_args() -> ConfigResult<Invocation> {
        Self::parse_from(std::env::args().skip(1))
    }

    /// Parses configuration from an argument list, excluding the program
    /// name.
    pub fn parse_from<I, T>(args: I) -> ConfigResult<Invocation>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut config = ServerConfig::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                "--host" | "-h" => config.host = value_for(&arg, args.next())?,
                "--port" | "-p" => config.port = parse_number(&arg, args.next())?,
                "--mode" | "-m" => {
                    let value = value_for(&arg, args.next())?;
                    config.mode = match value.as_str() {
                        "st" => ReactorMode::SingleThreaded,
                        "mt" => ReactorMode::MultiThreaded,
                        _ => return Err(invalid(&arg, value)),
                    };
                }
                "--workers" | "-w" => config.workers = parse_number(&arg, args.next())?,
                "--shards" | "-s" => config.shards = parse_number(&arg, args.next())?,
                "--capacity" | "-c" => {
                    let value = value_for(&arg, args.next())?;
                    config.capacity = parse_size(&value).ok_or_else(|| invalid(&arg, value))?;
                }
                "--log-level" | "-l" => config.log_level = value_for(&arg, args.next())?,
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        config.validate()?;
        Ok(Invocation::Run(config))
    }

    /// Checks settings the cache and runtime cannot start with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.shards == 0 {
            return Err(ConfigError::Zero("shards"));
        }
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }

        let shard_size = self.capacity / self.shards;
        if shard_size < MIN_SHARD_SIZE {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.capacity,
                shard_size,
                min: MIN_SHARD_SIZE,
            });
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn value_for(flag: &str, value: Option<String>) -> ConfigResult<String> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_number<N: std::str::FromStr>(flag: &str, value: Option<String>) -> ConfigResult<N> {
    let value = value_for(flag, value)?;
    value.parse().map_err(|_| invalid(flag, value))
}

fn invalid(flag: &str, value: String) -> ConfigError {
    ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    }
}

/// Parses a byte count with an optional `K`, `M` or `G` suffix (powers of
/// 1024, case-insensitive).
fn parse_size(value: &str) -> Option<usize> {
    let (digits, multiplier) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1024),
        (i, 'm' | 'M') => (&value[..i], 1024 * 1024),
        (i, 'g' | 'G') => (&value[..i], 1024 * 1024 * 1024),
        _ => (value, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> ServerConfig {
        match ServerConfig::parse_from(args.iter().copied()) {
            Ok(Invocation::Run(config)) => config,
            other => panic!("expected a runnable config, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = run(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 11211);
        assert_eq!(config.mode, ReactorMode::MultiThreaded);
        assert_eq!(config.shards, 4);
        assert_eq!(config.capacity, 64 * 1024 * 1024);
        assert_eq!(config.log_level, "info");
        assert!(config.workers >= 1);
        assert_eq!(config.bind_address(), "127.0.0.1:11211");
    }

    #[test]
    fn test_all_flags() {
        let config = run(&[
            "--host", "0.0.0.0", "-p", "22122", "-m", "st", "-w", "2", "--shards", "8",
            "-c", "512M", "-l", "debug",
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:22122");
        assert_eq!(config.mode, ReactorMode::SingleThreaded);
        assert_eq!(config.workers, 2);
        assert_eq!(config.shards, 8);
        assert_eq!(config.capacity, 512 * 1024 * 1024);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(
            ServerConfig::parse_from(["--help"]).unwrap(),
            Invocation::Help
        );
        assert_eq!(
            ServerConfig::parse_from(["-p", "1", "-v"]).unwrap(),
            Invocation::Version
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            ServerConfig::parse_from(["--port"]),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            ServerConfig::parse_from(["--port", "99999"]),
            Err(ConfigError::InvalidValue {
                flag: "--port".to_string(),
                value: "99999".to_string()
            })
        );
        assert!(matches!(
            ServerConfig::parse_from(["-m", "fast"]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            ServerConfig::parse_from(["--turbo"]),
            Err(ConfigError::UnknownArgument("--turbo".to_string()))
        );
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            ServerConfig::parse_from(["-s", "0"]),
            Err(ConfigError::Zero("shards"))
        );
        assert_eq!(
            ServerConfig::parse_from(["-w", "0"]),
            Err(ConfigError::Zero("workers"))
        );
        assert!(matches!(
            ServerConfig::parse_from(["-s", "8", "-c", "4M"]),
            Err(ConfigError::CapacityTooSmall { shard_size: 524288, .. })
        ));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1048576"), Some(1024 * 1024));
        assert_eq!(parse_size("16k"), Some(16 * 1024));
        assert_eq!(parse_size("2G"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("M"), None);
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("12x"), None);
    }
}
