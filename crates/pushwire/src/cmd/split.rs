use std::path::Path;

use pushwire_protocol::{FramePolicy, Message};

use crate::cmd::SplitArgs;
use crate::exit::{io_error, protocol_error, CliResult, SUCCESS};
use crate::output::{print_frame_rows, FrameRow, OutputFormat};

pub fn run(args: SplitArgs, format: OutputFormat) -> CliResult<i32> {
    let policy = policy_for(args.budget)?;
    let mut message = load_message(&args.file)?;
    let rows = split_rows(&mut message, &policy)?;
    print_frame_rows(&rows, format);
    Ok(SUCCESS)
}

pub fn policy_for(budget: Option<usize>) -> CliResult<FramePolicy> {
    match budget {
        Some(budget) => FramePolicy::with_payload_budget(budget)
            .map_err(|err| protocol_error("invalid --budget", err)),
        None => Ok(FramePolicy::default()),
    }
}

fn load_message(path: &Path) -> CliResult<Message> {
    let bytes = std::fs::read(path)
        .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?;
    Message::from_slice(&bytes).map_err(|err| protocol_error("invalid message", err))
}

/// Run the splitter to completion, capturing each emitted frame.
pub fn split_rows(message: &mut Message, policy: &FramePolicy) -> CliResult<Vec<FrameRow>> {
    let mut rows = Vec::new();
    loop {
        let done = message
            .split_with(policy)
            .map_err(|err| protocol_error("split failed", err))?;
        let size = message
            .to_vec()
            .map_err(|err| protocol_error("encode failed", err))?
            .len();
        rows.push(FrameRow::capture(rows.len() + 1, message, size));
        if done {
            break;
        }
    }
    tracing::debug!(frames = rows.len(), "split complete");
    Ok(rows)
}
