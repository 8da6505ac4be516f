use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use sensorchan_bus::{BusKind, SERVICE_NAME};
use sensorchan_channel::{BusSessionManager, ChannelConfig, ChannelSession, SampleDecoder};
use sensorchan_socket::{SocketConfig, DEFAULT_SOCKET_PATH};
use tracing::debug;

use crate::exit::{bus_error, CliError, CliResult, FAILURE, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod info;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a session on a sensor and print its metadata.
    Info(InfoArgs),
    /// Start a sensor and print the samples it delivers.
    Stream(StreamArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Check that the sensor daemon is reachable.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Stream(args) => stream::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum BusArg {
    System,
    Session,
}

impl From<BusArg> for BusKind {
    fn from(value: BusArg) -> Self {
        match value {
            BusArg::System => BusKind::System,
            BusArg::Session => BusKind::Session,
        }
    }
}

/// Where to find the daemon.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Sample socket of the daemon.
    #[arg(long, env = "SENSORCHAN_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Bus name of the daemon.
    #[arg(long, env = "SENSORCHAN_SERVICE", default_value = SERVICE_NAME)]
    pub service: String,
    /// Message bus the daemon is registered on.
    #[arg(long, env = "SENSORCHAN_BUS", value_enum, default_value = "system")]
    pub bus: BusArg,
    /// Sample socket handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub handshake_timeout: String,
}

impl ConnectionArgs {
    pub fn channel_config(&self) -> CliResult<ChannelConfig> {
        Ok(ChannelConfig {
            service_name: self.service.clone(),
            bus: self.bus.into(),
            socket: SocketConfig {
                path: self.socket.clone(),
                handshake_timeout: parse_duration(&self.handshake_timeout)?,
                ..SocketConfig::default()
            },
        })
    }
}

/// The sensor to open.
#[derive(Args, Debug, Clone)]
pub struct SensorArgs {
    /// Sensor id as known to the daemon (e.g. accelerometersensor).
    pub sensor: String,
    /// Bus interface of the sensor channel. Defaults to the well-known
    /// interface of the sensor id.
    #[arg(long)]
    pub interface: Option<String>,
}

impl SensorArgs {
    pub fn interface(&self) -> CliResult<String> {
        if let Some(interface) = &self.interface {
            return Ok(interface.clone());
        }
        known_interface(&self.sensor)
            .map(str::to_string)
            .ok_or_else(|| {
                CliError::new(
                    USAGE,
                    format!("no known interface for {}; pass --interface", self.sensor),
                )
            })
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub target: SensorArgs,
    #[command(flatten)]
    pub conn: ConnectionArgs,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("layout").required(true).args(["record_size", "xyz"])))]
pub struct StreamArgs {
    #[command(flatten)]
    pub target: SensorArgs,
    #[command(flatten)]
    pub conn: ConnectionArgs,
    /// Sampling interval to request.
    #[arg(long)]
    pub interval: Option<i32>,
    /// Daemon-side buffer interval.
    #[arg(long)]
    pub buffer_interval: Option<u32>,
    /// Daemon-side buffer size, in samples.
    #[arg(long)]
    pub buffer_size: Option<u32>,
    /// Keep the sensor running while the display is off.
    #[arg(long)]
    pub standby_override: bool,
    /// Select the advertised data range at this index.
    #[arg(long)]
    pub data_range_index: Option<i32>,
    /// Size of one sample record in bytes.
    #[arg(long)]
    pub record_size: Option<usize>,
    /// Decode records as timestamped x/y/z samples.
    #[arg(long)]
    pub xyz: bool,
    /// Records arrive in counted batches.
    #[arg(long)]
    pub batch: bool,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Stop streaming after this long (e.g. 10s). Fails if --count is unmet.
    #[arg(long)]
    pub timeout: Option<String>,
    /// How long each wait for samples may block (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub poll: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub conn: ConnectionArgs,
}

/// Load the sensor plugin, request a session and open its channel.
pub fn open_session(
    target: &SensorArgs,
    config: &ChannelConfig,
    decoder: Box<dyn SampleDecoder>,
) -> CliResult<ChannelSession> {
    let manager = BusSessionManager::connect(config);
    if !manager.is_valid() {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!(
                "{} is not reachable on the {} bus",
                config.service_name,
                config.bus.name()
            ),
        ));
    }

    let loaded = manager
        .load_plugin(&target.sensor)
        .into_result()
        .map_err(|err| bus_error("loadPlugin failed", err))?;
    if !loaded {
        return Err(CliError::new(
            FAILURE,
            format!("daemon could not load plugin for {}", target.sensor),
        ));
    }

    let session_id = manager
        .request_sensor(&target.sensor)
        .into_result()
        .map_err(|err| bus_error("requestSensor failed", err))?;
    if session_id < 0 {
        return Err(CliError::new(
            FAILURE,
            format!("daemon refused a session for {}", target.sensor),
        ));
    }
    debug!(sensor = %target.sensor, session_id, "session granted");

    Ok(ChannelSession::open(
        config,
        &BusSessionManager::channel_path(&target.sensor),
        decoder,
        session_id,
        Arc::new(manager),
    ))
}

fn known_interface(sensor: &str) -> Option<&'static str> {
    let interface = match sensor {
        "accelerometersensor" => "local.AccelerometerSensor",
        "alssensor" => "local.ALSSensor",
        "compasssensor" => "local.CompassSensor",
        "gyroscopesensor" => "local.GyroscopeSensor",
        "magnetometersensor" => "local.MagnetometerSensor",
        "orientationsensor" => "local.OrientationSensor",
        "pressuresensor" => "local.PressureSensor",
        "proximitysensor" => "local.ProximitySensor",
        "rotationsensor" => "local.RotationSensor",
        "tapsensor" => "local.TapSensor",
        "temperaturesensor" => "local.TemperatureSensor",
        _ => return None,
    };
    Some(interface)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn interface_override_wins() {
        let target = SensorArgs {
            sensor: "customsensor".to_string(),
            interface: Some("local.CustomSensor".to_string()),
        };
        assert_eq!(target.interface().unwrap(), "local.CustomSensor");
    }

    #[test]
    fn well_known_sensor_resolves_interface() {
        let target = SensorArgs {
            sensor: "accelerometersensor".to_string(),
            interface: None,
        };
        assert_eq!(target.interface().unwrap(), "local.AccelerometerSensor");

        let unknown = SensorArgs {
            sensor: "customsensor".to_string(),
            interface: None,
        };
        assert_eq!(unknown.interface().unwrap_err().code, USAGE);
    }

    #[test]
    fn connection_args_build_channel_config() {
        let conn = ConnectionArgs {
            socket: PathBuf::from("/tmp/sensord.sock"),
            service: "com.example.Sensors".to_string(),
            bus: BusArg::Session,
            handshake_timeout: "750ms".to_string(),
        };
        let config = conn.channel_config().unwrap();
        assert_eq!(config.service_name, "com.example.Sensors");
        assert_eq!(config.bus, BusKind::Session);
        assert_eq!(config.socket.path, PathBuf::from("/tmp/sensord.sock"));
        assert_eq!(config.socket.handshake_timeout, Duration::from_millis(750));
    }
}
