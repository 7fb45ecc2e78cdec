//! Sending and receiving protocol messages over framed streams.

use std::io::{Read, Write};
use std::net::TcpStream;

use pushwire_frame::{FrameConfig, FrameReader, FrameWriter};
use tracing::{debug, trace};

use crate::error::Result;
use crate::messages::Message;
use crate::policy::FramePolicy;

/// Encode `message` as-is and write it as one frame.
pub fn send_message<W: Write>(writer: &mut FrameWriter<W>, message: &Message) -> Result<()> {
    let payload = message.to_vec()?;
    trace!(msg_type = message.msg_type(), size = payload.len(), "sending message");
    writer.send(&payload)?;
    Ok(())
}

/// Split `message` under `policy` and write every resulting frame, in order.
///
/// Returns the number of frames written. The message is left in its final
/// split state; call [`Message::reset`] before reusing it.
pub fn deliver<W: Write>(
    writer: &mut FrameWriter<W>,
    message: &mut Message,
    policy: &FramePolicy,
) -> Result<usize> {
    let mut frames = 0usize;
    loop {
        let done = message.split_with(policy)?;
        send_message(writer, message)?;
        frames += 1;
        if done {
            break;
        }
    }
    debug!(msg_type = message.msg_type(), frames, "delivered message");
    Ok(frames)
}

/// Read and decode the next message.
pub fn read_message<R: Read>(reader: &mut FrameReader<R>) -> Result<Message> {
    let frame = reader.read_frame()?;
    let message = Message::from_slice(&frame.payload)?;
    trace!(msg_type = message.msg_type(), size = frame.payload.len(), "received message");
    Ok(message)
}

/// One device connection: a framed reader and writer plus the split policy.
pub struct Session<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    policy: FramePolicy,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>, policy: FramePolicy) -> Self {
        Self {
            reader,
            writer,
            policy,
        }
    }

    /// Send a message that needs no splitting.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        send_message(&mut self.writer, message)
    }

    /// Split and send a message; see [`deliver`].
    pub fn deliver(&mut self, message: &mut Message) -> Result<usize> {
        deliver(&mut self.writer, message, &self.policy)
    }

    /// Send a oneway message and report whether the session should go on.
    ///
    /// Messages without a oneway contract count as continuing.
    pub fn send_oneway(&mut self, message: &mut Message) -> Result<bool> {
        self.deliver(message)?;
        Ok(message.oneway_continue().unwrap_or(true))
    }

    pub fn recv(&mut self) -> Result<Message> {
        read_message(&mut self.reader)
    }

    pub fn writer_mut(&mut self) -> &mut FrameWriter<W> {
        &mut self.writer
    }
}

impl Session<TcpStream, TcpStream> {
    /// Build a session over a TCP connection, applying the configured
    /// timeouts to both halves.
    pub fn from_tcp(stream: TcpStream, config: &FrameConfig, policy: FramePolicy) -> Result<Self> {
        policy.validate()?;
        let read_half = stream.try_clone()?;
        let reader = FrameReader::with_config_tcp(read_half, config.clone())?;
        let writer = FrameWriter::with_config_tcp(stream, config.clone())?;
        Ok(Self::new(reader, writer, policy))
    }
}
