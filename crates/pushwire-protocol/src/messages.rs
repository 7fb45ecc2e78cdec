//! Wire messages exchanged between the push server and devices.
//!
//! Every message serializes to compact JSON with its type under the `"T"`
//! key and the remaining fields in PascalCase. Payloads are carried as raw
//! JSON and never inspected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::debug;

use crate::control::{OnewayMsg, Splittable};
use crate::error::{ProtocolError, Result};
use crate::policy::{encoded_len, FramePolicy};
use crate::split::SplitState;

/// Messages that always travel in one frame.
macro_rules! impl_single_frame {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Splittable for $ty {
                fn split_with(&mut self, _policy: &FramePolicy) -> Result<bool> {
                    Ok(true)
                }
            }
        )*
    };
}

/// An opaque JSON payload.
pub type Payload = Box<RawValue>;

pub const TYPE_CONNECT: &str = "connect";
pub const TYPE_CONNACK: &str = "connack";
pub const TYPE_CONNBROKEN: &str = "connbroken";
pub const TYPE_CONNWARN: &str = "connwarn";
pub const TYPE_SETPARAMS: &str = "setparams";
pub const TYPE_PING: &str = "ping";
pub const TYPE_PONG: &str = "pong";
pub const TYPE_ACK: &str = "ack";
pub const TYPE_BROADCAST: &str = "broadcast";
pub const TYPE_NOTIFICATIONS: &str = "notifications";

/// `ConnBrokenMsg` reason: the device connected to the wrong host.
pub const BROKEN_HOST_MISMATCH: &str = "host-mismatch";
/// `ConnWarnMsg` reason: the device failed authorization.
pub const WARN_UNAUTHORIZED: &str = "unauthorized";

/// First message from a device on a new connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    pub client_ver: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authorization: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cookie: String,
    /// Last level the device has seen per broadcast channel.
    #[serde(default)]
    pub levels: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ConnectMsg {
    pub fn new(client_ver: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            msg_type: TYPE_CONNECT.to_string(),
            client_ver: client_ver.into(),
            device_id: device_id.into(),
            authorization: String::new(),
            cookie: String::new(),
            levels: BTreeMap::new(),
            info: None,
        }
    }
}

/// Connection parameters the server acknowledges a connect with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnAckParams {
    /// How often the server pings, e.g. `10m`.
    pub ping_interval: String,
}

/// Server reply to [`ConnectMsg`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnAckMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    pub params: ConnAckParams,
}

impl ConnAckMsg {
    pub fn new(ping_interval: impl Into<String>) -> Self {
        Self {
            msg_type: TYPE_CONNACK.to_string(),
            params: ConnAckParams {
                ping_interval: ping_interval.into(),
            },
        }
    }
}

/// The connection is being torn down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnBrokenMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    #[serde(default)]
    pub reason: String,
}

impl ConnBrokenMsg {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            msg_type: TYPE_CONNBROKEN.to_string(),
            reason: reason.into(),
        }
    }
}

impl OnewayMsg for ConnBrokenMsg {
    fn oneway_continue(&self) -> bool {
        false
    }
}

/// A warning that does not end the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnWarnMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    #[serde(default)]
    pub reason: String,
}

impl ConnWarnMsg {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            msg_type: TYPE_CONNWARN.to_string(),
            reason: reason.into(),
        }
    }
}

impl OnewayMsg for ConnWarnMsg {
    fn oneway_continue(&self) -> bool {
        true
    }
}

/// Updates session parameters on the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SetParamsMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_cookie: String,
}

impl SetParamsMsg {
    pub fn new(set_cookie: impl Into<String>) -> Self {
        Self {
            msg_type: TYPE_SETPARAMS.to_string(),
            set_cookie: set_cookie.into(),
        }
    }
}

impl OnewayMsg for SetParamsMsg {
    fn oneway_continue(&self) -> bool {
        true
    }
}

/// Keepalive; `T` is either `ping` or `pong`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PingPongMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
}

impl PingPongMsg {
    pub fn ping() -> Self {
        Self {
            msg_type: TYPE_PING.to_string(),
        }
    }

    pub fn pong() -> Self {
        Self {
            msg_type: TYPE_PONG.to_string(),
        }
    }
}

/// Device acknowledgement of a delivered broadcast or notification batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
}

impl Default for AckMsg {
    fn default() -> Self {
        Self {
            msg_type: TYPE_ACK.to_string(),
        }
    }
}

impl_single_frame!(
    ConnectMsg,
    ConnAckMsg,
    ConnBrokenMsg,
    ConnWarnMsg,
    SetParamsMsg,
    PingPongMsg,
    AckMsg,
);

/// New top level of a broadcast channel plus the payloads that lead to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BroadcastMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    pub chan_id: String,
    /// Level reached once every payload currently held is applied.
    pub top_level: i64,
    /// One payload per level, oldest first.
    #[serde(default)]
    pub payloads: Vec<Payload>,
    #[serde(skip)]
    split: SplitState<Payload>,
}

impl BroadcastMsg {
    pub fn new(chan_id: impl Into<String>, top_level: i64, payloads: Vec<Payload>) -> Self {
        Self {
            msg_type: TYPE_BROADCAST.to_string(),
            app_id: String::new(),
            chan_id: chan_id.into(),
            top_level,
            payloads,
            split: SplitState::default(),
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Fragmentation rounds emitted since construction or the last reset.
    pub fn splitting(&self) -> usize {
        self.split.rounds()
    }

    /// Prepare the message for reuse with a new payload list.
    pub fn reset(&mut self) {
        self.msg_type = TYPE_BROADCAST.to_string();
        self.split.reset();
    }
}

impl BroadcastMsg {
    fn emit_round(&mut self, policy: &FramePolicy, target: i64) -> Result<bool> {
        self.payloads.clear();
        // Widest level the envelope can carry.
        self.top_level = i64::MIN;
        let envelope = encoded_len(&*self)?;

        let taken = self
            .split
            .carve(&mut self.payloads, policy.round_budget(envelope), |p| {
                Ok(policy.payload_cost(p))
            })?;
        self.top_level = target - self.split.pending() as i64;

        let size = policy.check_frame(encoded_len(&*self)?)?;
        self.split.commit();
        debug!(
            chan = %self.chan_id,
            round = self.split.rounds(),
            payloads = taken,
            top_level = self.top_level,
            size,
            "split broadcast"
        );
        Ok(self.split.pending() == 0)
    }
}

impl Splittable for BroadcastMsg {
    /// On error the round is not emitted. A failure before the first round
    /// leaves the message exactly as it was.
    fn split_with(&mut self, policy: &FramePolicy) -> Result<bool> {
        policy.validate()?;

        let target = if self.split.rounds() == 0 {
            if encoded_len(&*self)? <= policy.max_frame_size {
                return Ok(true);
            }
            self.split.begin(&mut self.payloads);
            self.top_level
        } else {
            if self.split.pending() == 0 {
                return Err(ProtocolError::Exhausted);
            }
            self.top_level + self.split.pending() as i64
        };

        self.emit_round(policy, target).inspect_err(|_| {
            self.split.unwind(&mut self.payloads);
            self.top_level = target - self.split.pending() as i64;
        })
    }
}

/// One notification addressed to an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    pub app_id: String,
    pub msg_id: String,
    pub payload: Payload,
}

impl Notification {
    pub fn new(app_id: impl Into<String>, msg_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            app_id: app_id.into(),
            msg_id: msg_id.into(),
            payload,
        }
    }
}

/// A batch of notifications, possibly for several applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationsMsg {
    #[serde(rename = "T")]
    pub msg_type: String,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(skip)]
    split: SplitState<Notification>,
}

impl NotificationsMsg {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            msg_type: TYPE_NOTIFICATIONS.to_string(),
            notifications,
            split: SplitState::default(),
        }
    }

    /// Fragmentation rounds emitted since construction or the last reset.
    pub fn splitting(&self) -> usize {
        self.split.rounds()
    }

    /// Prepare the message for reuse with a new batch.
    pub fn reset(&mut self) {
        self.msg_type = TYPE_NOTIFICATIONS.to_string();
        self.split.reset();
    }
}

impl NotificationsMsg {
    fn emit_round(&mut self, policy: &FramePolicy) -> Result<bool> {
        self.notifications.clear();
        let envelope = encoded_len(&*self)?;

        let taken = self.split.carve(
            &mut self.notifications,
            policy.round_budget(envelope),
            |n| policy.notification_cost(n),
        )?;

        let size = policy.check_frame(encoded_len(&*self)?)?;
        self.split.commit();
        debug!(
            round = self.split.rounds(),
            notifications = taken,
            size,
            "split notifications"
        );
        Ok(self.split.pending() == 0)
    }
}

impl Splittable for NotificationsMsg {
    /// On error the round is not emitted. A failure before the first round
    /// leaves the message exactly as it was.
    fn split_with(&mut self, policy: &FramePolicy) -> Result<bool> {
        policy.validate()?;

        if self.split.rounds() == 0 {
            if encoded_len(&*self)? <= policy.max_frame_size {
                return Ok(true);
            }
            self.split.begin(&mut self.notifications);
        } else if self.split.pending() == 0 {
            return Err(ProtocolError::Exhausted);
        }

        self.emit_round(policy)
            .inspect_err(|_| self.split.unwind(&mut self.notifications))
    }
}

/// Payloads of `notifications`, in order. `None` when there are none.
pub fn extract_payloads(notifications: &[Notification]) -> Option<Vec<Payload>> {
    if notifications.is_empty() {
        return None;
    }
    Some(notifications.iter().map(|n| n.payload.clone()).collect())
}

/// Every message of the protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Message {
    Connect(ConnectMsg),
    ConnAck(ConnAckMsg),
    ConnBroken(ConnBrokenMsg),
    ConnWarn(ConnWarnMsg),
    SetParams(SetParamsMsg),
    PingPong(PingPongMsg),
    Ack(AckMsg),
    Broadcast(BroadcastMsg),
    Notifications(NotificationsMsg),
}

#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "T")]
    msg_type: String,
}

impl Message {
    /// Decode a message from one frame payload, dispatching on `"T"`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let tag: TypeTag = serde_json::from_slice(bytes)?;
        let message = match tag.msg_type.as_str() {
            TYPE_CONNECT => Self::Connect(serde_json::from_slice(bytes)?),
            TYPE_CONNACK => Self::ConnAck(serde_json::from_slice(bytes)?),
            TYPE_CONNBROKEN => Self::ConnBroken(serde_json::from_slice(bytes)?),
            TYPE_CONNWARN => Self::ConnWarn(serde_json::from_slice(bytes)?),
            TYPE_SETPARAMS => Self::SetParams(serde_json::from_slice(bytes)?),
            TYPE_PING | TYPE_PONG => Self::PingPong(serde_json::from_slice(bytes)?),
            TYPE_ACK => Self::Ack(serde_json::from_slice(bytes)?),
            TYPE_BROADCAST => Self::Broadcast(serde_json::from_slice(bytes)?),
            TYPE_NOTIFICATIONS => Self::Notifications(serde_json::from_slice(bytes)?),
            _ => return Err(ProtocolError::UnknownType(tag.msg_type)),
        };
        Ok(message)
    }

    /// Compact JSON encoding of the message in its current state.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The `"T"` discriminator.
    pub fn msg_type(&self) -> &str {
        match self {
            Self::Connect(m) => &m.msg_type,
            Self::ConnAck(m) => &m.msg_type,
            Self::ConnBroken(m) => &m.msg_type,
            Self::ConnWarn(m) => &m.msg_type,
            Self::SetParams(m) => &m.msg_type,
            Self::PingPong(m) => &m.msg_type,
            Self::Ack(m) => &m.msg_type,
            Self::Broadcast(m) => &m.msg_type,
            Self::Notifications(m) => &m.msg_type,
        }
    }

    /// Split against explicit budgets; see [`Splittable`].
    pub fn split_with(&mut self, policy: &FramePolicy) -> Result<bool> {
        match self {
            Self::Connect(m) => m.split_with(policy),
            Self::ConnAck(m) => m.split_with(policy),
            Self::ConnBroken(m) => m.split_with(policy),
            Self::ConnWarn(m) => m.split_with(policy),
            Self::SetParams(m) => m.split_with(policy),
            Self::PingPong(m) => m.split_with(policy),
            Self::Ack(m) => m.split_with(policy),
            Self::Broadcast(m) => m.split_with(policy),
            Self::Notifications(m) => m.split_with(policy),
        }
    }

    /// Split against the default budgets.
    pub fn split(&mut self) -> Result<bool> {
        self.split_with(&FramePolicy::default())
    }

    /// Continuation decision for oneway messages; `None` for the rest.
    pub fn oneway_continue(&self) -> Option<bool> {
        match self {
            Self::ConnBroken(m) => Some(m.oneway_continue()),
            Self::ConnWarn(m) => Some(m.oneway_continue()),
            Self::SetParams(m) => Some(m.oneway_continue()),
            _ => None,
        }
    }

    /// Reset split progress on reusable messages.
    pub fn reset(&mut self) {
        match self {
            Self::Broadcast(m) => m.reset(),
            Self::Notifications(m) => m.reset(),
            _ => {}
        }
    }

    /// Number of fragmentable elements the message currently holds.
    pub fn element_count(&self) -> usize {
        match self {
            Self::Broadcast(m) => m.payloads.len(),
            Self::Notifications(m) => m.notifications.len(),
            _ => 0,
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(msg: $ty) -> Self {
                    Self::$variant(msg)
                }
            }
        )*
    };
}

impl_from_variant!(
    Connect(ConnectMsg),
    ConnAck(ConnAckMsg),
    ConnBroken(ConnBrokenMsg),
    ConnWarn(ConnWarnMsg),
    SetParams(SetParamsMsg),
    PingPong(PingPongMsg),
    Ack(AckMsg),
    Broadcast(BroadcastMsg),
    Notifications(NotificationsMsg),
);
