use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sensorchan_channel::XyzSample;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SampleOutput<'a> {
    schema_id: &'a str,
    sensor: &'a str,
    sequence: usize,
    #[serde(flatten)]
    sample: XyzSample,
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    schema_id: &'a str,
    sensor: &'a str,
    sequence: usize,
    size: usize,
    record: String,
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Two-column table of `(field, value)` rows.
pub fn print_fields(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn print_sample(sensor: &str, sequence: usize, sample: XyzSample, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SampleOutput {
            schema_id: "https://schemas.3leaps.dev/sensorchan/cli/v1/xyz-sample.schema.json",
            sensor,
            sequence,
            sample,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "TIMESTAMP", "X", "Y", "Z"])
                .add_row(vec![
                    sequence.to_string(),
                    sample.timestamp.to_string(),
                    sample.x.to_string(),
                    sample.y.to_string(),
                    sample.z.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{sequence} t={} x={} y={} z={}",
                sample.timestamp, sample.x, sample.y, sample.z
            );
        }
        OutputFormat::Raw => {
            println!("{} {} {} {}", sample.timestamp, sample.x, sample.y, sample.z);
        }
    }
}

pub fn print_record(sensor: &str, sequence: usize, record: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&RecordOutput {
            schema_id: "https://schemas.3leaps.dev/sensorchan/cli/v1/sample-record.schema.json",
            sensor,
            sequence,
            size: record.len(),
            record: hex(record),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "SIZE", "RECORD"])
                .add_row(vec![
                    sequence.to_string(),
                    record.len().to_string(),
                    hex(record),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("#{sequence} size={} record={}", record.len(), hex(record));
        }
        OutputFormat::Raw => print_raw(record),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0a, 0xff]), "000aff");
    }

    #[test]
    fn sample_output_flattens_axes() {
        let out = SampleOutput {
            schema_id: "x",
            sensor: "accelerometersensor",
            sequence: 3,
            sample: XyzSample {
                timestamp: 10,
                x: 1,
                y: -2,
                z: 3,
            },
        };
        let json = serde_json::to_value(&out).expect("sample output should serialize");
        assert_eq!(json["x"], 1);
        assert_eq!(json["y"], -2);
        assert_eq!(json["timestamp"], 10);
        assert_eq!(json["sequence"], 3);
    }
}
