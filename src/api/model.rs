use std::fmt;

use anyhow::{Error, Result};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{CALL_TYPE, CHANNEL_TYPE};

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

#[derive(Debug, Clone)]
pub struct WrappedMap(Map<String, Value>);

impl WrappedMap {
    fn get<T, F: FnOnce(WrappedMap) -> Result<T>>(
        &mut self,
        key: &str,
        decode: F,
    ) -> Option<Result<T>> {
        let value = self.0.remove(key)?;
        if value.is_null() {
            return None;
        }
        Some(WrappedValue(value).to_decoder(decode))
    }

    fn get_value<T, F: FnOnce(WrappedValue) -> Result<T>>(
        &mut self,
        key: &str,
        decode: F,
    ) -> Option<Result<T>> {
        let value = self.0.remove(key)?;
        if value.is_null() {
            return None;
        }
        Some(decode(WrappedValue(value)))
    }

    fn get_array<T, F: Clone + Fn(WrappedMap) -> Result<T>>(
        &mut self,
        key: &str,
        decode: F,
    ) -> Option<Result<Vec<T>>> {
        let value = self.0.remove(key)?;
        if value.is_null() {
            return None;
        }
        Some(WrappedValue(value).to_array_decoder(decode))
    }

    /// like `get_value`, but a missing or null key is an error
    fn require_value<T, F: FnOnce(WrappedValue) -> Result<T>>(
        &mut self,
        key: &str,
        decode: F,
    ) -> Result<T> {
        self.get_value(key, decode)
            .unwrap_or_else(|| Err(Error::msg(format!("missing field {:?}", key))))
    }

    fn require<T, F: FnOnce(WrappedMap) -> Result<T>>(&mut self, key: &str, decode: F) -> Result<T> {
        self.get(key, decode)
            .unwrap_or_else(|| Err(Error::msg(format!("missing field {:?}", key))))
    }

    /// type_name is used in the log line
    fn check_empty(self, type_name: &str) {
        if !self.0.is_empty() {
            let keys: Vec<&String> = self.0.keys().collect();
            tracing::trace!(type_name, ?keys, "fields left undecoded");
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrappedValue(Value);

impl WrappedValue {
    fn into_string(self) -> Result<String> {
        match self.0 {
            Value::String(string) => Ok(string),
            other => Err(Error::msg(format!("{} is not a string", other))),
        }
    }

    fn into_u64(self) -> Result<u64> {
        self.0
            .as_u64()
            .ok_or_else(|| Error::msg(format!("{} is not a u64", self.0)))
    }

    fn to_decoder<T, F: FnOnce(WrappedMap) -> Result<T>>(self, decode: F) -> Result<T> {
        decode(self.into_map()?)
    }

    fn into_map(self) -> Result<WrappedMap> {
        match self.0 {
            Value::Object(map) => Ok(WrappedMap(map)),
            other => Err(Error::msg(format!("{} is not an object", other))),
        }
    }

    fn to_array_decoder<T, F: Clone + Fn(WrappedMap) -> Result<T>>(
        self,
        decode: F,
    ) -> Result<Vec<T>> {
        match self.0 {
            Value::Array(values) => values
                .into_iter()
                .map(|x| WrappedValue(x).to_decoder(decode.clone()))
                .collect::<Result<Vec<_>>>(),
            other => Err(Error::msg(format!("{} is not an array", other))),
        }
    }
}

#[derive(Clone, Hash, PartialEq, PartialOrd, Ord, Eq, Debug)]
pub struct UserId(pub String);

impl UserId {
    fn decode(value: WrappedValue) -> Result<Self> {
        Ok(Self(value.into_string()?))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Hash, PartialEq, PartialOrd, Ord, Eq, Debug)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn decode(value: WrappedValue) -> Result<Self> {
        Ok(Self(value.into_string()?))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Servers only exist as metadata on channels, so this is whatever string the
/// creating client stamped into `serverId`.
#[derive(Clone, Hash, PartialEq, PartialOrd, Ord, Eq, Debug)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn decode(value: WrappedValue) -> Result<Self> {
        Ok(Self(value.into_string()?))
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Hash, PartialEq, PartialOrd, Ord, Eq, Debug)]
pub struct CallId(pub String);

impl CallId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn decode(value: WrappedValue) -> Result<Self> {
        Ok(Self(value.into_string()?))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub image: Option<String>,
}

/// Custom metadata stamped on a channel by this client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelData {
    pub server_id: Option<ServerId>,
    pub server: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

impl ChannelData {
    pub fn for_server(server: &Server, category: impl Into<String>) -> Self {
        Self {
            server_id: Some(server.id.clone()),
            server: Some(server.name.clone()),
            category: Some(category.into()),
            image: server.image.clone(),
        }
    }

    /// The key a channel is grouped under. Channels written before server ids
    /// existed only carry the server name, which then stands in for the id.
    pub fn server_key(&self) -> Option<&str> {
        self.server_id
            .as_ref()
            .map(|id| id.0.as_str())
            .or(self.server.as_deref())
    }

    fn decode(mut map: WrappedMap) -> Result<Self> {
        let server_id = map.get_value("serverId", ServerId::decode).transpose()?;
        let server = map
            .get_value("server", WrappedValue::into_string)
            .transpose()?;
        let category = map
            .get_value("category", WrappedValue::into_string)
            .transpose()?;
        let image = map
            .get_value("image", WrappedValue::into_string)
            .transpose()?;
        map.check_empty("ChannelData");
        Ok(Self {
            server_id,
            server,
            category,
            image,
        })
    }

    pub fn encode(&self) -> Value {
        let mut map = Map::new();
        if let Some(server_id) = &self.server_id {
            map.insert("serverId".into(), json!(server_id.0));
        }
        if let Some(server) = &self.server {
            map.insert("server".into(), json!(server));
        }
        if let Some(category) = &self.category {
            map.insert("category".into(), json!(category));
        }
        if let Some(image) = &self.image {
            map.insert("image".into(), json!(image));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: String,
    pub name: Option<String>,
    pub member_count: u64,
    pub members: Vec<UserId>,
    pub data: ChannelData,
}

impl Channel {
    /// Decodes one entry of a channel query or create response:
    /// `{"channel": {...}, "members": [{"user_id": ...}]}`.
    pub fn decode(mut map: WrappedMap) -> Result<Self> {
        let members = map
            .get_array("members", decode_member)
            .transpose()?
            .unwrap_or_default();
        let mut channel = map.require("channel", Ok)?;
        map.check_empty("ChannelState");

        let id = channel.require_value("id", ChannelId::decode)?;
        let kind = channel.require_value("type", WrappedValue::into_string)?;
        let name = channel
            .get_value("name", WrappedValue::into_string)
            .transpose()?;
        let member_count = channel
            .get_value("member_count", WrappedValue::into_u64)
            .transpose()?
            .unwrap_or(members.len() as u64);
        let data = channel
            .get("data", ChannelData::decode)
            .transpose()?
            .unwrap_or_default();
        channel.check_empty("Channel");
        Ok(Self {
            id,
            kind,
            name,
            member_count,
            members,
            data,
        })
    }

    /// Name shown in a channel list. Unnamed direct messages are labelled by
    /// the members other than `me`.
    pub fn display_name(&self, me: Option<&UserId>) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.members
            .iter()
            .filter(|member| Some(*member) != me)
            .map(|member| member.0.clone())
            .collect::<Vec<String>>()
            .join(", ")
    }
}

fn decode_member(mut map: WrappedMap) -> Result<UserId> {
    map.require_value("user_id", UserId::decode)
}

/// Decodes the `{"channels": [...]}` body of a channel query.
pub fn decode_channels(body: Value) -> Result<Vec<Channel>> {
    let mut map = WrappedValue(body).into_map()?;
    let channels = map
        .get_array("channels", Channel::decode)
        .transpose()?
        .unwrap_or_default();
    map.check_empty("QueryChannelsResponse");
    Ok(channels)
}

/// Decodes the `{"channel": {...}, "members": [...]}` body of a channel create.
pub fn decode_channel(body: Value) -> Result<Channel> {
    WrappedValue(body).to_decoder(Channel::decode)
}

/// Decodes the `{"call": {"id": ...}}` body of a call create.
pub fn decode_call_id(body: Value) -> Result<CallId> {
    let mut map = WrappedValue(body).into_map()?;
    let mut call = map.require("call", Ok)?;
    call.require_value("id", CallId::decode)
}

/// Channel query sent to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFilter {
    pub kind: String,
    pub member: UserId,
    pub member_count: Option<u64>,
}

impl ChannelFilter {
    /// Every messaging channel `member` belongs to.
    pub fn for_member(member: UserId) -> Self {
        Self {
            kind: CHANNEL_TYPE.to_string(),
            member,
            member_count: None,
        }
    }

    /// Narrows the filter to two-member channels.
    pub fn direct_messages(mut self) -> Self {
        self.member_count = Some(2);
        self
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        channel.kind == self.kind
            && channel.members.contains(&self.member)
            && self
                .member_count
                .map_or(true, |count| channel.member_count == count)
    }

    pub fn encode(&self) -> Value {
        let mut filter = json!({
            "type": self.kind,
            "members": { "$in": [self.member.0] },
        });
        if let Some(count) = self.member_count {
            filter["member_count"] = json!(count);
        }
        filter
    }
}

/// Channel create request. With `id: None` the platform assigns one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub kind: String,
    pub id: Option<ChannelId>,
    pub name: String,
    pub members: Vec<UserId>,
    pub data: ChannelData,
}

impl NewChannel {
    pub fn messaging(name: impl Into<String>, members: Vec<UserId>, data: ChannelData) -> Self {
        Self {
            kind: CHANNEL_TYPE.to_string(),
            id: None,
            name: name.into(),
            members,
            data,
        }
    }

    pub fn with_id(mut self, id: ChannelId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn encode(&self) -> Value {
        json!({
            "data": {
                "name": self.name,
                "members": self.members.iter().map(|x| x.0.as_str()).collect::<Vec<_>>(),
                "data": self.data.encode(),
            }
        })
    }
}

/// Call create request for the video platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCall {
    pub kind: String,
    pub id: CallId,
    pub server_id: ServerId,
    pub server_name: String,
    pub call_name: String,
    pub members: Vec<UserId>,
}

impl NewCall {
    pub fn for_server(server: &Server, call_name: impl Into<String>, members: Vec<UserId>) -> Self {
        Self {
            kind: CALL_TYPE.to_string(),
            id: CallId::generate(),
            server_id: server.id.clone(),
            server_name: server.name.clone(),
            call_name: call_name.into(),
            members,
        }
    }

    pub fn encode(&self) -> Value {
        let members: Vec<Value> = self
            .members
            .iter()
            .map(|x| json!({ "user_id": x.0 }))
            .collect();
        json!({
            "data": {
                "custom": {
                    "serverId": self.server_id.0,
                    "serverName": self.server_name,
                    "callName": self.call_name,
                },
                "members": members,
            }
        })
    }
}
