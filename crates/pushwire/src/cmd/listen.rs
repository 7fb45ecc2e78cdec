use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pushwire_frame::{FrameConfig, FrameError};
use pushwire_protocol::{encoded_len, ConnectMsg, FramePolicy, Message, ProtocolError, Session};

use crate::cmd::ListenArgs;
use crate::exit::{
    io_error, protocol_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let stream =
        TcpStream::connect(&args.addr).map_err(|err| io_error("connect failed", err))?;
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let mut session = Session::from_tcp(stream, &config, FramePolicy::default())
        .map_err(|err| protocol_error("session setup failed", err))?;

    let connect = ConnectMsg::new(env!("CARGO_PKG_VERSION"), args.device_id.as_str());
    session
        .send(&connect.into())
        .map_err(|err| protocol_error("connect failed", err))?;

    let peer = args.addr.as_str();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let message = match session.recv() {
            Ok(message) => message,
            Err(ProtocolError::Frame(FrameError::ConnectionClosed)) => {
                return match args.count {
                    Some(count) if printed < count => Err(CliError::new(
                        FAILURE,
                        format!("connection closed after {printed} of {count} messages"),
                    )),
                    _ => Ok(SUCCESS),
                };
            }
            Err(err) => return Err(protocol_error("receive failed", err)),
        };

        let size = frame_size(&message);
        print_message(&message, size, peer, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn frame_size(message: &Message) -> usize {
    encoded_len(message).unwrap_or_default()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
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
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Ok(Duration::from_secs(value)),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
