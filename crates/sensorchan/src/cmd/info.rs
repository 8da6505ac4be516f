use std::fmt::Display;
use std::num::NonZeroUsize;

use bytes::Bytes;
use sensorchan_channel::{
    ChannelSession, ChannelState, DataRange, DesiredConfig, FixedRecordDecoder, IntegerRange,
    SessionId,
};
use serde::Serialize;

use crate::cmd::{open_session, InfoArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: &'static str,
    sensor: String,
    interface: String,
    session_id: SessionId,
    state: ChannelState,
    description: Option<String>,
    id: Option<String>,
    sensor_type: Option<String>,
    /// Applied on start; `info` never starts the channel.
    desired: DesiredConfig,
    hw_buffering: Option<bool>,
    current_data_range: Option<DataRange>,
    data_ranges: Vec<DataRange>,
    intervals: Vec<DataRange>,
    buffer_intervals: Vec<IntegerRange>,
    buffer_sizes: Vec<IntegerRange>,
    error_code: i32,
    error: String,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.conn.channel_config()?;
    let interface = args.target.interface()?;
    // Info never starts the channel, so records are never decoded.
    let decoder =
        FixedRecordDecoder::new(interface.clone(), NonZeroUsize::MIN, |_record: Bytes| {});
    let mut session = open_session(&args.target, &config, Box::new(decoder))?;

    let out = collect(args.target.sensor.clone(), interface, &mut session);
    print_info(&out, format);
    Ok(SUCCESS)
}

fn collect(sensor: String, interface: String, session: &mut ChannelSession) -> InfoOutput {
    // Read the error view first: range queries clear the local error.
    let error_code = session.error_code().code();
    let error = session.error_string();

    InfoOutput {
        schema_id: "https://schemas.3leaps.dev/sensorchan/cli/v1/sensor-info.schema.json",
        sensor,
        interface,
        session_id: session.session_id(),
        state: session.state(),
        description: session.description().into_value(),
        id: session.id().into_value(),
        sensor_type: session.sensor_type().into_value(),
        desired: session.desired().clone(),
        hw_buffering: session.hw_buffering().into_value(),
        current_data_range: session.current_data_range().into_value(),
        data_ranges: session.available_data_ranges().value_or_default(),
        intervals: session.available_intervals().value_or_default(),
        buffer_intervals: session.available_buffer_intervals().value_or_default(),
        buffer_sizes: session.available_buffer_sizes().value_or_default(),
        error_code,
        error,
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_fields(&rows(out)),
        OutputFormat::Pretty => {
            println!("Sensor Info:");
            for (field, value) in rows(out) {
                println!("  {:<20}{}", format!("{field}:"), value);
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.session_id);
        }
    }
}

fn rows(out: &InfoOutput) -> Vec<(&'static str, String)> {
    vec![
        ("Sensor", out.sensor.clone()),
        ("Interface", out.interface.clone()),
        ("Session", out.session_id.to_string()),
        ("State", format!("{:?}", out.state)),
        ("Description", show(&out.description)),
        ("Id", show(&out.id)),
        ("Type", show(&out.sensor_type)),
        ("Desired interval", out.desired.interval.to_string()),
        ("Desired buffer interval", out.desired.buffer_interval.to_string()),
        ("Desired buffer size", out.desired.buffer_size.to_string()),
        ("Desired standby", out.desired.standby_override.to_string()),
        ("HW buffering", show(&out.hw_buffering)),
        ("Data range", show(&out.current_data_range)),
        ("Data ranges", list(&out.data_ranges)),
        ("Intervals", list(&out.intervals)),
        ("Buffer intervals", list(&out.buffer_intervals)),
        ("Buffer sizes", list(&out.buffer_sizes)),
        ("Error", format!("{} {}", out.error_code, out.error)),
    ]
}

fn show<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unavailable".to_string())
}

fn list<T: Display>(values: &[T]) -> String {
    if values.is_empty() {
        return "none".to_string();
    }
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
