use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;

use pushwire_frame::{FrameConfig, FrameError};
use pushwire_protocol::{ConnAckMsg, ConnBrokenMsg, Message, PingPongMsg, ProtocolError, Session};
use pushwire_transport::{DeviceListener, ListenerConfig};
use tracing::{debug, info};

use crate::cmd::split::policy_for;
use crate::cmd::ServeArgs;
use crate::exit::{io_error, protocol_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let policy = policy_for(args.budget)?;
    let messages = Arc::new(load_messages(&args.messages)?);

    let listener = DeviceListener::bind(&args.addr)
        .map_err(|err| transport_error("bind failed", err))?
        .with_config(ListenerConfig {
            session_limit: args.max_sessions,
            ..ListenerConfig::default()
        });
    let local = listener
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;
    print_listening(local, format);

    let frame_config = FrameConfig::default();
    let ping_interval = args.ping_interval;
    listener
        .accept_loop(move |stream: TcpStream, peer: SocketAddr| -> Result<(), ProtocolError> {
            let mut session = Session::from_tcp(stream, &frame_config, policy)?;
            serve_device(&mut session, peer, &messages, &ping_interval)
        })
        .map_err(|err| transport_error("accept failed", err))?;

    Ok(SUCCESS)
}

/// Parse a JSON-lines message file; blank lines are skipped.
pub fn load_messages(path: &Path) -> CliResult<Vec<Message>> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Message::from_slice(line.as_bytes())
                .map_err(|err| protocol_error(&format!("line {}", idx + 1), err))
        })
        .collect()
}

/// Run one device session: handshake, deliver every message, then keep the
/// connection alive answering pings until the device leaves.
fn serve_device<R, W>(
    session: &mut Session<R, W>,
    peer: SocketAddr,
    messages: &[Message],
    ping_interval: &str,
) -> Result<(), ProtocolError>
where
    R: std::io::Read,
    W: std::io::Write,
{
    match session.recv()? {
        Message::Connect(connect) => {
            info!(%peer, device = %connect.device_id, "device connected");
            session.send(&ConnAckMsg::new(ping_interval).into())?;
        }
        other => {
            debug!(%peer, msg_type = other.msg_type(), "expected connect");
            let mut broken = Message::from(ConnBrokenMsg::new("expected connect"));
            session.send_oneway(&mut broken)?;
            return Ok(());
        }
    }

    for message in messages {
        let mut message = message.clone();
        message.reset();
        if !session.send_oneway(&mut message)? {
            info!(%peer, "session ended by server");
            return Ok(());
        }
    }

    loop {
        match session.recv() {
            Ok(Message::PingPong(ping)) if ping.msg_type == "ping" => {
                session.send(&PingPongMsg::pong().into())?;
            }
            Ok(other) => debug!(%peer, msg_type = other.msg_type(), "ignoring device message"),
            Err(ProtocolError::Frame(FrameError::ConnectionClosed)) => {
                info!(%peer, "device disconnected");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pushwire_frame::{FrameReader, FrameWriter};
    use pushwire_protocol::{read_message, ConnWarnMsg, ConnectMsg, FramePolicy};

    use super::*;

    fn device_wire(messages: &[Message]) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new());
        for message in messages {
            pushwire_protocol::send_message(&mut writer, message).unwrap();
        }
        writer.into_inner()
    }

    fn server_output(wire: Vec<u8>) -> Vec<String> {
        let mut reader = FrameReader::new(Cursor::new(wire));
        let mut types = Vec::new();
        while let Ok(message) = read_message(&mut reader) {
            types.push(message.msg_type().to_string());
        }
        types
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn delivers_after_connect_and_answers_pings() {
        let wire = device_wire(&[
            ConnectMsg::new("0.1", "dev-1").into(),
            PingPongMsg::ping().into(),
        ]);
        let mut session = Session::new(
            FrameReader::new(Cursor::new(wire)),
            FrameWriter::new(Vec::new()),
            FramePolicy::default(),
        );
        let messages = vec![Message::from(ConnWarnMsg::new("unauthorized"))];

        serve_device_ref(&mut session, &messages);

        let sent = server_output(session.writer_mut().get_ref().clone());
        assert_eq!(sent, vec!["connack", "connwarn", "pong"]);
    }

    #[test]
    fn oneway_break_stops_delivery() {
        let wire = device_wire(&[ConnectMsg::new("0.1", "dev-1").into()]);
        let mut session = Session::new(
            FrameReader::new(Cursor::new(wire)),
            FrameWriter::new(Vec::new()),
            FramePolicy::default(),
        );
        let messages = vec![
            Message::from(ConnBrokenMsg::new("host-mismatch")),
            Message::from(ConnWarnMsg::new("never sent")),
        ];

        serve_device_ref(&mut session, &messages);

        let sent = server_output(session.writer_mut().get_ref().clone());
        assert_eq!(sent, vec!["connack", "connbroken"]);
    }

    #[test]
    fn non_connect_opening_is_refused() {
        let wire = device_wire(&[PingPongMsg::ping().into()]);
        let mut session = Session::new(
            FrameReader::new(Cursor::new(wire)),
            FrameWriter::new(Vec::new()),
            FramePolicy::default(),
        );

        serve_device_ref(&mut session, &[]);

        let sent = server_output(session.writer_mut().get_ref().clone());
        assert_eq!(sent, vec!["connbroken"]);
    }

    #[test]
    fn loads_json_lines_skipping_blanks() {
        let path = std::env::temp_dir().join(format!(
            "pushwire-serve-{}-messages.jsonl",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "{\"T\":\"connwarn\",\"Reason\":\"x\"}\n\n{\"T\":\"broadcast\",\"ChanId\":\"0\",\"TopLevel\":1,\"Payloads\":[1]}\n",
        )
        .expect("message file should be writable");

        let messages = load_messages(&path).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].msg_type(), "broadcast");

        std::fs::write(&path, "{\"T\":\"bogus\"}\n").expect("message file should be writable");
        let err = load_messages(&path).unwrap_err();
        assert!(err.message.starts_with("line 1:"));

        let _ = std::fs::remove_file(&path);
    }

    fn serve_device_ref(
        session: &mut Session<Cursor<Vec<u8>>, Vec<u8>>,
        messages: &[Message],
    ) {
        serve_device(session, peer(), messages, "10m").expect("session should finish cleanly");
    }
}
