mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sensorchan", version, about = "Sensor channel client CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_subcommand() {
        let cli = Cli::try_parse_from([
            "sensorchan",
            "stream",
            "accelerometersensor",
            "--xyz",
            "--interval",
            "100",
            "--buffer-size",
            "8",
            "--count",
            "5",
            "--timeout",
            "10s",
        ])
        .expect("stream args should parse");

        let Command::Stream(args) = cli.command else {
            panic!("expected stream command");
        };
        assert_eq!(args.interval, Some(100));
        assert_eq!(args.buffer_size, Some(8));
        assert_eq!(args.timeout.as_deref(), Some("10s"));
        assert!(args.xyz);
    }

    #[test]
    fn stream_requires_a_record_layout() {
        let err = Cli::try_parse_from(["sensorchan", "stream", "accelerometersensor"])
            .expect_err("missing layout should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn rejects_conflicting_layouts() {
        let err = Cli::try_parse_from([
            "sensorchan",
            "stream",
            "accelerometersensor",
            "--xyz",
            "--record-size",
            "12",
        ])
        .expect_err("conflicting layouts should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_info_with_session_bus() {
        let cli = Cli::try_parse_from([
            "sensorchan",
            "info",
            "alssensor",
            "--bus",
            "session",
            "--socket",
            "/tmp/sensord.sock",
        ])
        .expect("info args should parse");
        assert!(matches!(cli.command, Command::Info(_)));
    }
}
