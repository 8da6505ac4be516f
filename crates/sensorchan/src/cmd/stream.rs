use std::cell::Cell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use sensorchan_channel::{BatchDecoder, Dispatch, FixedRecordDecoder, SampleDecoder, XyzSample};
use tracing::{info, warn};

use crate::cmd::{open_session, parse_duration, StreamArgs};
use crate::exit::{
    bus_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, TRANSPORT_ERROR, USAGE,
};
use crate::output::{print_record, print_sample, OutputFormat};

/// Prints decoded records until the requested count is reached.
struct Printer {
    sensor: String,
    xyz: bool,
    limit: Option<usize>,
    printed: Rc<Cell<usize>>,
    format: OutputFormat,
}

impl Printer {
    fn emit(&self, record: &[u8]) {
        let sequence = self.printed.get();
        if self.limit.is_some_and(|limit| sequence >= limit) {
            return;
        }
        if self.xyz {
            match XyzSample::decode(record) {
                Some(sample) => print_sample(&self.sensor, sequence, sample, self.format),
                None => {
                    warn!(size = record.len(), "short xyz record");
                    return;
                }
            }
        } else {
            print_record(&self.sensor, sequence, record, self.format);
        }
        self.printed.set(sequence + 1);
    }
}

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.conn.channel_config()?;
    let poll = parse_duration(&args.poll)?;
    let limit = args.timeout.as_deref().map(parse_duration).transpose()?;
    let interface = args.target.interface()?;
    let record_size = record_size(&args)?;

    let printed = Rc::new(Cell::new(0usize));
    let printer = Printer {
        sensor: args.target.sensor.clone(),
        xyz: args.xyz,
        limit: args.count,
        printed: Rc::clone(&printed),
        format,
    };
    let decoder: Box<dyn SampleDecoder> = if args.batch {
        Box::new(BatchDecoder::new(
            interface,
            record_size,
            move |records: Vec<Bytes>| {
                for record in &records {
                    printer.emit(record);
                }
            },
        ))
    } else {
        Box::new(FixedRecordDecoder::new(
            interface,
            record_size,
            move |record: Bytes| printer.emit(&record),
        ))
    };

    let mut session = open_session(&args.target, &config, decoder)?;
    if !session.is_connected() {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!(
                "{}: {}",
                config.socket.path.display(),
                session.error_string()
            ),
        ));
    }

    if let Some(interval) = args.interval {
        session.set_interval(interval);
    }
    if let Some(buffer_interval) = args.buffer_interval {
        session.set_buffer_interval(buffer_interval);
    }
    if let Some(buffer_size) = args.buffer_size {
        session.set_buffer_size(buffer_size);
    }
    if args.standby_override && !session.set_standby_override(true) {
        warn!("daemon declined standby override");
    }
    if let Some(index) = args.data_range_index {
        if !session.set_data_range_index(index) {
            warn!(index, "requested data range is not active");
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    session
        .start()
        .into_result()
        .map_err(|err| bus_error("start failed", err))?;
    info!(
        sensor = %args.target.sensor,
        session_id = session.session_id(),
        "streaming samples"
    );

    let deadline = limit.map(|limit| Instant::now() + limit);
    let mut outcome = Ok(SUCCESS);
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed.get() >= count) {
            break;
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            outcome = deadline_outcome(printed.get(), args.count);
            break;
        }
        match session.process_events(Some(poll)) {
            Dispatch::Disconnected => {
                outcome = Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("sample stream ended: {}", session.error_string()),
                ));
                break;
            }
            Dispatch::Idle | Dispatch::Delivered(_) => {}
        }
    }

    let _ = session.stop();
    outcome
}

fn record_size(args: &StreamArgs) -> CliResult<NonZeroUsize> {
    if args.xyz {
        return Ok(XyzSample::RECORD_SIZE);
    }
    match args.record_size {
        Some(size) => NonZeroUsize::new(size)
            .ok_or_else(|| CliError::new(USAGE, "record size must be greater than zero")),
        None => Err(CliError::new(USAGE, "pass --record-size or --xyz")),
    }
}

/// Exit status when the stream deadline passes with `printed` records out.
fn deadline_outcome(printed: usize, count: Option<usize>) -> CliResult<i32> {
    match count {
        Some(count) if printed < count => Err(CliError::new(
            TIMEOUT,
            format!("received {printed} of {count} records before the deadline"),
        )),
        _ => Ok(SUCCESS),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_fails_only_when_count_is_unmet() {
        let err = deadline_outcome(3, Some(5)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.contains("3 of 5"));
        assert_eq!(deadline_outcome(5, Some(5)).unwrap(), SUCCESS);
        assert_eq!(deadline_outcome(0, None).unwrap(), SUCCESS);
    }
}
