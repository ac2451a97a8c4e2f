use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use stream_core::ReadingKind;
use stream_io::{BrokerConfig, SearchAuth, SearchConfig, TlsConfig};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("unknown argument '{0}' (see --help)")]
    UnknownArgument(String),

    #[error("--sink file requires --record <PATH>")]
    MissingRecordPath,

    #[error("KAFKA_CA_PATH is set but this build lacks the `broker-tls` feature")]
    BrokerTlsUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Produce,
    Consume,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    Kafka,
    Elastic,
    #[default]
    Log,
    File,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kafka" => Ok(Self::Kafka),
            "elastic" | "elasticsearch" => Ok(Self::Elastic),
            "log" => Ok(Self::Log),
            "file" => Ok(Self::File),
            other => Err(format!("unknown sink '{other}' (expected kafka|elastic|log|file)")),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kafka => "kafka",
            Self::Elastic => "elastic",
            Self::Log => "log",
            Self::File => "file",
        })
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub command: Command,
    pub sink: SinkKind,
    pub reading: ReadingKind,
    pub interval_ms: i64,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub record_path: Option<PathBuf>,
    /// Base name for the hourly indices written by the elastic sink
    pub index_base: String,
    /// Index queried by the `search` command
    pub search_index: String,
    pub broker: BrokerConfig,
    pub search: SearchConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            command: Command::Produce,
            sink: SinkKind::Log,
            reading: ReadingKind::Voltage,
            interval_ms: 100,
            run_seconds: None,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            record_path: None,
            index_base: "machine-sensor".to_string(),
            search_index: "machine-sensor-rollup".to_string(),
            broker: BrokerConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, ConfigError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parsed<T>(args: &[String], i: usize, flag: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = value(args, i, flag)?;
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args_with_env(&args, |key| std::env::var(key).ok())
    }

    /// Environment values seed the defaults; flags override them.
    pub fn from_args_with_env<E>(args: &[String], env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_env(&env);

        let mut i = 1;
        if let Some(first) = args.get(1) {
            let command = match first.as_str() {
                "produce" => Some(Command::Produce),
                "consume" => Some(Command::Consume),
                "search" => Some(Command::Search),
                _ => None,
            };
            if let Some(command) = command {
                cfg.command = command;
                i = 2;
            }
        }

        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--sink" => {
                    cfg.sink = parsed(args, i, flag)?;
                    i += 1;
                }
                "--reading" => {
                    cfg.reading = parsed(args, i, flag)?;
                    i += 1;
                }
                "--interval-ms" => {
                    cfg.interval_ms = parsed(args, i, flag)?;
                    i += 1;
                }
                "--run-seconds" => {
                    cfg.run_seconds = Some(parsed(args, i, flag)?);
                    i += 1;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-dir" => {
                    cfg.log_dir = Some(PathBuf::from(value(args, i, flag)?));
                    i += 1;
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(value(args, i, flag)?.to_string());
                    i += 1;
                }
                "--record" => {
                    cfg.record_path = Some(PathBuf::from(value(args, i, flag)?));
                    i += 1;
                }
                "--brokers" => {
                    cfg.broker.brokers = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--topic" => {
                    cfg.broker.topic = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--group" => {
                    cfg.broker.group_id = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--es-url" => {
                    cfg.search.url = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--index-base" => {
                    cfg.index_base = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--index" => {
                    cfg.search_index = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(ConfigError::UnknownArgument(other.to_string())),
            }
            i += 1;
        }

        if cfg.show_help {
            return Ok(cfg);
        }
        if cfg.command == Command::Produce
            && cfg.sink == SinkKind::File
            && cfg.record_path.is_none()
        {
            return Err(ConfigError::MissingRecordPath);
        }
        if cfg.uses_broker() && cfg.broker.tls.enabled && !cfg!(feature = "broker-tls") {
            return Err(ConfigError::BrokerTlsUnavailable);
        }
        Ok(cfg)
    }

    fn uses_broker(&self) -> bool {
        match self.command {
            Command::Produce => self.sink == SinkKind::Kafka,
            Command::Consume => true,
            Command::Search => false,
        }
    }

    fn apply_env<E>(&mut self, env: &E)
    where
        E: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("KAFKA_CLUSTER_URL") {
            self.broker.brokers = url;
        }
        if let Some(ca) = non_empty("KAFKA_CA_PATH") {
            self.broker.tls = TlsConfig {
                enabled: true,
                ca_path: ca,
                cert_path: non_empty("KAFKA_CERT_PATH").unwrap_or_default(),
                key_path: non_empty("KAFKA_KEY_PATH").unwrap_or_default(),
            };
        }

        if let Some(url) = non_empty("ES_URL") {
            self.search.url = url;
        }
        if let Some(ca) = non_empty("ES_CA_PATH") {
            self.search.tls = TlsConfig {
                enabled: true,
                ca_path: ca,
                ..Default::default()
            };
        }
        // API key wins over basic auth when both are present.
        if let Some(key) = non_empty("ES_API_KEY") {
            self.search.auth = SearchAuth::api_key(&key);
        } else if let Some(password) = non_empty("ES_PASSWORD") {
            self.search.auth = SearchAuth::Basic {
                username: non_empty("ES_USERNAME").unwrap_or_else(|| "elastic".to_string()),
                password,
            };
        }
    }

    pub fn print_help() {
        println!(
            r#"iot-stream - Synthetic sensor readings for Kafka and Elasticsearch

USAGE:
    iot-stream [COMMAND] [OPTIONS]

COMMANDS:
    produce                 Generate readings and deliver them to a sink (default)
    consume                 Print messages from the Kafka topic
    search                  Run a match_all query and print the hits

OPTIONS:
    --sink <NAME>           Delivery sink (kafka|elastic|log|file) [default: log]
    --reading <KIND>        Reading variant (voltage|rpm) [default: voltage]
    --interval-ms <MS>      Emission interval in milliseconds [default: 100]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --record <PATH>         JSONL output file for the file sink
    --brokers <LIST>        Kafka bootstrap servers [default: localhost:9092]
    --topic <NAME>          Kafka topic [default: iot-stream]
    --group <ID>            Kafka consumer group [default: test-group]
    --es-url <URL>          Elasticsearch base URL [default: http://localhost:9200]
    --index-base <NAME>     Base name of the hourly indices [default: machine-sensor]
    --index <NAME>          Index queried by `search` [default: machine-sensor-rollup]
    --json-logs             Output logs in JSON format (for log aggregation)
    --log-dir <PATH>        Also write logs to a daily-rolling file in this directory
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES (also read from .env):
    KAFKA_CLUSTER_URL       Kafka bootstrap servers
    KAFKA_CA_PATH           CA bundle for the broker (enables TLS; needs the broker-tls feature)
    KAFKA_CERT_PATH         Client certificate for the broker
    KAFKA_KEY_PATH          Client private key for the broker
    ES_URL                  Elasticsearch base URL
    ES_CA_PATH              CA bundle for Elasticsearch over HTTPS
    ES_USERNAME             Basic auth user [default: elastic]
    ES_PASSWORD             Basic auth password
    ES_API_KEY              API key (`id:key` or its base64 form), preferred over basic auth
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,iot_stream=trace)

EXAMPLES:
    # Print readings to the log for ten seconds
    iot-stream --run-seconds 10

    # Publish rpm readings to Kafka
    iot-stream produce --sink kafka --reading rpm --metrics-addr 0.0.0.0:9090

    # Read them back
    iot-stream consume
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("iot-stream")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_produce_to_log() {
        let cfg = RuntimeConfig::from_args_with_env(&args(&[]), no_env).unwrap();
        assert_eq!(cfg.command, Command::Produce);
        assert_eq!(cfg.sink, SinkKind::Log);
        assert_eq!(cfg.reading, ReadingKind::Voltage);
        assert_eq!(cfg.interval_ms, 100);
        assert_eq!(cfg.broker.topic, "iot-stream");
        assert_eq!(cfg.broker.group_id, "test-group");
        assert_eq!(cfg.search_index, "machine-sensor-rollup");
        assert!(matches!(cfg.search.auth, SearchAuth::None));
    }

    #[test]
    fn parses_command_and_flags() {
        let cfg = RuntimeConfig::from_args_with_env(
            &args(&[
                "produce",
                "--sink",
                "kafka",
                "--reading",
                "RPM",
                "--interval-ms",
                "250",
                "--run-seconds",
                "3",
                "--json-logs",
                "--topic",
                "readings",
            ]),
            no_env,
        )
        .unwrap();
        assert_eq!(cfg.sink, SinkKind::Kafka);
        assert_eq!(cfg.reading, ReadingKind::Rpm);
        assert_eq!(cfg.interval_ms, 250);
        assert_eq!(cfg.run_seconds, Some(3));
        assert!(cfg.json_logs);
        assert_eq!(cfg.broker.topic, "readings");

        let cfg =
            RuntimeConfig::from_args_with_env(&args(&["search", "--index", "other"]), no_env)
                .unwrap();
        assert_eq!(cfg.command, Command::Search);
        assert_eq!(cfg.search_index, "other");
    }

    #[test]
    fn negative_interval_is_left_for_the_generator_to_reject() {
        let cfg =
            RuntimeConfig::from_args_with_env(&args(&["--interval-ms", "-5"]), no_env).unwrap();
        assert_eq!(cfg.interval_ms, -5);
    }

    #[test]
    fn bad_values_are_reported() {
        assert_eq!(
            RuntimeConfig::from_args_with_env(&args(&["--interval-ms"]), no_env).unwrap_err(),
            ConfigError::MissingValue("--interval-ms".into())
        );
        assert!(matches!(
            RuntimeConfig::from_args_with_env(&args(&["--sink", "carrier-pigeon"]), no_env),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            RuntimeConfig::from_args_with_env(&args(&["--bogus"]), no_env).unwrap_err(),
            ConfigError::UnknownArgument("--bogus".into())
        );
        assert_eq!(
            RuntimeConfig::from_args_with_env(&args(&["--sink", "file"]), no_env).unwrap_err(),
            ConfigError::MissingRecordPath
        );
    }

    #[test]
    fn help_short_circuits_validation() {
        let cfg =
            RuntimeConfig::from_args_with_env(&args(&["--sink", "file", "--help"]), no_env)
                .unwrap();
        assert!(cfg.show_help);
    }

    #[test]
    fn environment_fills_connection_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KAFKA_CLUSTER_URL", "kafka-1:9093"),
            ("KAFKA_CA_PATH", "/certs/ca.pem"),
            ("KAFKA_CERT_PATH", "/certs/client.pem"),
            ("KAFKA_KEY_PATH", "/certs/client.key"),
            ("ES_URL", "https://search:9200"),
            ("ES_PASSWORD", "changeme"),
        ]);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let cfg = RuntimeConfig::from_args_with_env(&args(&[]), lookup).unwrap();
        assert_eq!(cfg.broker.brokers, "kafka-1:9093");
        assert!(cfg.broker.tls.enabled);
        assert!(cfg.broker.tls.has_client_identity());
        assert_eq!(cfg.search.url, "https://search:9200");
        match cfg.search.auth {
            SearchAuth::Basic { username, password } => {
                assert_eq!(username, "elastic");
                assert_eq!(password, "changeme");
            }
            other => panic!("unexpected auth {other:?}"),
        }
    }

    #[cfg(not(feature = "broker-tls"))]
    #[test]
    fn broker_tls_without_feature_is_a_config_error() {
        let lookup = |key: &str| (key == "KAFKA_CA_PATH").then(|| "/certs/ca.pem".to_string());

        assert_eq!(
            RuntimeConfig::from_args_with_env(&args(&["--sink", "kafka"]), lookup).unwrap_err(),
            ConfigError::BrokerTlsUnavailable
        );
        assert_eq!(
            RuntimeConfig::from_args_with_env(&args(&["consume"]), lookup).unwrap_err(),
            ConfigError::BrokerTlsUnavailable
        );
        // Commands that never touch the broker are unaffected.
        assert!(RuntimeConfig::from_args_with_env(&args(&["search"]), lookup).is_ok());
        assert!(RuntimeConfig::from_args_with_env(&args(&["--sink", "log"]), lookup).is_ok());
    }

    #[test]
    fn flags_override_environment_and_api_key_wins() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ES_URL", "http://from-env:9200"),
            ("ES_PASSWORD", "changeme"),
            ("ES_API_KEY", "id:key"),
            ("KAFKA_CLUSTER_URL", ""),
        ]);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let cfg = RuntimeConfig::from_args_with_env(
            &args(&["--es-url", "http://from-flag:9200"]),
            lookup,
        )
        .unwrap();
        assert_eq!(cfg.search.url, "http://from-flag:9200");
        assert_eq!(cfg.broker.brokers, "localhost:9092");
        assert!(!cfg.broker.tls.enabled);
        assert!(matches!(cfg.search.auth, SearchAuth::ApiKey(ref k) if k == "aWQ6a2V5"));
    }
}
