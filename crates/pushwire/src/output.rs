use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pushwire_protocol::Message;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// One emitted frame of a split message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FrameRow {
    pub round: usize,
    pub msg_type: String,
    pub elements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_level: Option<i64>,
    pub size: usize,
}

impl FrameRow {
    pub fn capture(round: usize, message: &Message, size: usize) -> Self {
        let top_level = match message {
            Message::Broadcast(b) => Some(b.top_level),
            _ => None,
        };
        Self {
            round,
            msg_type: message.msg_type().to_string(),
            elements: message.element_count(),
            top_level,
            size,
        }
    }
}

pub fn print_frame_rows(rows: &[FrameRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ROUND", "TYPE", "ELEMENTS", "TOP LEVEL", "SIZE"]);
            for row in rows {
                table.add_row(vec![
                    row.round.to_string(),
                    row.msg_type.clone(),
                    row.elements.to_string(),
                    row.top_level.map(|l| l.to_string()).unwrap_or_default(),
                    row.size.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                match row.top_level {
                    Some(level) => println!(
                        "round={} type={} elements={} top_level={} size={}",
                        row.round, row.msg_type, row.elements, level, row.size
                    ),
                    None => println!(
                        "round={} type={} elements={} size={}",
                        row.round, row.msg_type, row.elements, row.size
                    ),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    msg_type: &'a str,
    elements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_level: Option<i64>,
    frame_size: usize,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(message: &Message, frame_size: usize, peer: &str, format: OutputFormat) {
    let top_level = match message {
        Message::Broadcast(b) => Some(b.top_level),
        _ => None,
    };
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                msg_type: message.msg_type(),
                elements: message.element_count(),
                top_level,
                frame_size,
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "ELEMENTS", "TOP LEVEL", "SIZE", "PEER"])
                .add_row(vec![
                    message.msg_type().to_string(),
                    message.element_count().to_string(),
                    top_level.map(|l| l.to_string()).unwrap_or_default(),
                    frame_size.to_string(),
                    peer.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} elements={} size={} peer={}",
                message.msg_type(),
                message.element_count(),
                frame_size,
                peer
            );
        }
    }
}

/// Announce the bound address on stdout so callers binding port 0 can find it.
pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(r#"{{"listening":"{addr}"}}"#),
        OutputFormat::Table | OutputFormat::Pretty => println!("listening on {addr}"),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
