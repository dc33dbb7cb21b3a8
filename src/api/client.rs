use std::time::Duration;

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::config::Config;

use super::{
    auth::Session,
    model::{
        decode_call_id, decode_channel, decode_channels, CallId, Channel, ChannelFilter, NewCall,
        NewChannel, UserId,
    },
    ratelimit::RateLimits,
    USER_AGENT,
};

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

/// Page size for channel queries.
const QUERY_LIMIT: u64 = 30;

/// The hosted chat platform, as far as the view model needs it.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The signed-in user, if there is a session.
    fn user_id(&self) -> Option<UserId>;

    async fn query_channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>>;

    async fn create_channel(&self, channel: NewChannel) -> Result<Channel>;
}

/// The hosted video platform.
#[async_trait]
pub trait CallPlatform: Send + Sync {
    async fn create_call(&self, call: NewCall) -> Result<CallId>;
}

/// REST client for both platforms, authenticated as one user.
#[derive(Debug)]
pub struct Client {
    ratelimits: RateLimits,
    client: reqwest::Client,
    api_key: String,
    token: SecretString,
    user_id: UserId,
    chat_url: String,
    video_url: String,
}

impl Client {
    pub fn new(config: &Config, session: &Session) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .context("building platform http client")?;
        Ok(Self {
            ratelimits: Default::default(),
            client,
            api_key: config.api_key.clone(),
            token: session.token.clone(),
            user_id: session.user_id.clone(),
            chat_url: config.chat_url.clone(),
            video_url: config.video_url.clone(),
        })
    }

    async fn send(&self, url: &str, json_body: &Value) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .header("Authorization", self.token.expose_secret())
            .header("stream-auth-type", "jwt")
            .json(json_body)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        Ok(response)
    }

    /// POSTs `json_body`, honouring rate limits, and returns the decoded JSON
    /// body of a successful response.
    async fn request(&self, url: &str, json_body: Value) -> Result<Value> {
        if let Some(wait) = self.ratelimits.pre_check(url) {
            tracing::debug!(url, ?wait, "waiting for ratelimit window");
            tokio::time::sleep(wait).await;
        }
        let mut response = self.send(url, &json_body).await?;
        if let Some(retry_after) =
            self.ratelimits
                .check_for_ratelimit(url, response.status(), response.headers())
        {
            tracing::warn!(url, ?retry_after, "ratelimited, retrying once");
            tokio::time::sleep(retry_after).await;
            response = self.send(url, &json_body).await?;
            self.ratelimits
                .check_for_ratelimit(url, response.status(), response.headers());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::msg(format!("POST {} returned {}: {}", url, status, body)));
        }
        response
            .json::<Value>()
            .await
            .with_context(|| format!("decoding response of POST {}", url))
    }
}

#[async_trait]
impl ChatPlatform for Client {
    fn user_id(&self) -> Option<UserId> {
        Some(self.user_id.clone())
    }

    async fn query_channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>> {
        let url = format!("{}/channels", self.chat_url);
        let body = json!({
            "filter_conditions": filter.encode(),
            "sort": [{ "field": "last_message_at", "direction": -1 }],
            "state": true,
            "watch": false,
            "limit": QUERY_LIMIT,
        });
        let channels = decode_channels(self.request(&url, body).await?)?;
        tracing::debug!(count = channels.len(), "queried channels");
        Ok(channels)
    }

    async fn create_channel(&self, channel: NewChannel) -> Result<Channel> {
        let url = match &channel.id {
            Some(id) => format!("{}/channels/{}/{}/query", self.chat_url, channel.kind, id),
            None => format!("{}/channels/{}/query", self.chat_url, channel.kind),
        };
        decode_channel(self.request(&url, channel.encode()).await?)
    }
}

#[async_trait]
impl CallPlatform for Client {
    async fn create_call(&self, call: NewCall) -> Result<CallId> {
        let url = format!("{}/video/call/{}/{}", self.video_url, call.kind, call.id);
        decode_call_id(self.request(&url, call.encode()).await?)
    }
}
