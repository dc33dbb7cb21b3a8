//! Client-side view model derived from the chat platform's channel list.
//!
//! DESIGN
//! ======
//! Servers are not a platform concept: they are reconstructed from the
//! `serverId`/`server`/`category` metadata this client stamps on channels.
//! The [`Store`] owns one [`State`] and publishes every change through a
//! `tokio::sync::watch` cell, so subscribers always re-read a whole snapshot.
//!
//! Each mutation is a single merge into that cell. `channels_by_category` is
//! rebuilt from scratch on every selection, never patched.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use futures::Stream;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

use super::{
    client::{CallPlatform, ChatPlatform},
    model::{
        CallId, Channel, ChannelData, ChannelFilter, ChannelId, NewCall, NewChannel, Server, ServerId,
        UserId,
    },
};

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

pub const DIRECT_MESSAGES: &str = "Direct Messages";
pub const TEXT_CHANNELS: &str = "Text Channels";
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const WELCOME_CHANNEL: &str = "Welcome";
pub const GENERAL_VOICE_CHANNEL: &str = "General Voice Channel";

/// Category name → channels, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap(Vec<(String, Vec<Channel>)>);

impl CategoryMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, category: &str) -> Option<&[Channel]> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, channels)| channels.as_slice())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Channel])> {
        self.0
            .iter()
            .map(|(name, channels)| (name.as_str(), channels.as_slice()))
    }

    fn push(&mut self, category: &str, channel: Channel) {
        match self.0.iter_mut().find(|(name, _)| name == category) {
            Some((_, channels)) => channels.push(channel),
            None => self.0.push((category.to_string(), vec![channel])),
        }
    }
}

/// Snapshot published to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// `None` means direct-messages mode.
    pub selected_server: Option<Server>,
    pub active_call: Option<CallId>,
    pub channels_by_category: CategoryMap,
    pub servers: Vec<Server>,
}

impl State {
    pub fn is_direct_messages(&self) -> bool {
        self.selected_server.is_none()
    }
}

/// Servers referenced by `channels`, one per server id, in first-seen order.
///
/// A channel tagged only with a server name joins the id-keyed server of the
/// same name when there is one, and is keyed by that name otherwise.
pub fn derive_servers(channels: &[Channel]) -> Vec<Server> {
    let mut servers: Vec<Server> = Vec::new();
    for channel in channels {
        let (Some(key), Some(name)) = (channel.data.server_key(), channel.data.server.as_ref()) else {
            continue;
        };
        if channel.data.server_id.is_none() && has_id_keyed_server(channels, name) {
            continue;
        }
        if servers.iter().any(|server| server.id.0 == key) {
            continue;
        }
        servers.push(Server {
            id: ServerId(key.to_string()),
            name: name.clone(),
            image: channel.data.image.clone(),
        });
    }
    servers
}

fn has_id_keyed_server(channels: &[Channel], name: &str) -> bool {
    channels.iter().any(|channel| {
        channel.data.server_id.is_some() && channel.data.server.as_deref() == Some(name)
    })
}

fn belongs_to(channel: &Channel, server: &Server) -> bool {
    match &channel.data.server_id {
        Some(id) => *id == server.id,
        None => channel.data.server.as_deref() == Some(server.name.as_str()),
    }
}

/// Groups the channels belonging to `server` by their category.
pub fn group_by_category(channels: Vec<Channel>, server: &Server) -> CategoryMap {
    let mut categories = CategoryMap::default();
    for channel in channels.into_iter().filter(|channel| belongs_to(channel, server)) {
        let category = channel
            .data
            .category
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        categories.push(&category, channel);
    }
    categories
}

/// Puts every channel under the single direct-messages category.
pub fn direct_messages(channels: Vec<Channel>) -> CategoryMap {
    CategoryMap(vec![(DIRECT_MESSAGES.to_string(), channels)])
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no user session is active")]
    NoSession,
    #[error("no server is selected")]
    NoServerSelected,
    #[error("chat platform request failed: {0:#}")]
    Chat(#[source] anyhow::Error),
    #[error("call platform request failed: {0:#}")]
    Call(#[source] anyhow::Error),
}

/// Result of [`Store::create_server`]. `call` is `None` when the server's
/// channel was created but its voice channel could not be provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCreated {
    pub server: Server,
    pub call: Option<CallId>,
}

/// A UI event, for fire-and-forget use through [`Store::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LoadServers,
    SelectServer(Option<Server>),
    CreateServer {
        name: String,
        image_url: String,
        members: Vec<UserId>,
    },
    CreateChannel {
        name: String,
        category: String,
        members: Vec<UserId>,
    },
    CreateCall {
        server: Server,
        channel_name: String,
        members: Vec<UserId>,
    },
    SetActiveCall(Option<CallId>),
}

pub struct Store {
    chat: Arc<dyn ChatPlatform>,
    calls: Arc<dyn CallPlatform>,
    state: watch::Sender<State>,
    /// Stamp of the latest `select_server` call.
    select_seq: AtomicU64,
}

impl Store {
    pub fn new(chat: Arc<dyn ChatPlatform>, calls: Arc<dyn CallPlatform>) -> Self {
        let (state, _) = watch::channel(State::default());
        Self {
            chat,
            calls,
            state,
            select_seq: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> State {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Every snapshot published from now on. Ends when the store is dropped.
    /// Snapshots published faster than they are polled are coalesced.
    pub fn changes(&self) -> impl Stream<Item = State> {
        futures::stream::unfold(self.state.subscribe(), |mut receiver| async move {
            receiver.changed().await.ok()?;
            let state = receiver.borrow_and_update().clone();
            Some((state, receiver))
        })
    }

    fn current_user(&self) -> Result<UserId, StoreError> {
        self.chat.user_id().ok_or_else(|| {
            tracing::error!("no user session is active");
            StoreError::NoSession
        })
    }

    async fn query(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError> {
        self.chat.query_channels(filter).await.map_err(|e| {
            tracing::error!(error = %e, "channel query failed");
            StoreError::Chat(e)
        })
    }

    /// Switches to `server`, or to direct messages with `None`, and rebuilds
    /// the category grouping from a fresh query.
    ///
    /// If another selection starts before this one's query returns, this
    /// response is dropped and the later selection wins.
    pub async fn select_server(&self, server: Option<Server>) -> Result<(), StoreError> {
        let mut filter = ChannelFilter::for_member(self.current_user()?);
        let seq = self.select_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if server.is_none() {
            filter = filter.direct_messages();
        }

        let channels = self.query(&filter).await?;
        let channels_by_category = match &server {
            Some(server) => group_by_category(channels, server),
            None => direct_messages(channels),
        };

        let server_id = server.as_ref().map(|x| x.id.0.clone());
        let categories = channels_by_category.len();
        let published = self.state.send_if_modified(|state| {
            if self.select_seq.load(Ordering::SeqCst) != seq {
                return false;
            }
            state.selected_server = server;
            state.channels_by_category = channels_by_category;
            true
        });
        if published {
            tracing::debug!(?server_id, categories, "selected server");
        } else {
            tracing::debug!(?server_id, seq, "discarding stale server selection");
        }
        Ok(())
    }

    /// Rebuilds the server list from every channel the user belongs to and
    /// selects the first server, if any.
    pub async fn load_servers(&self) -> Result<Vec<Server>, StoreError> {
        let filter = ChannelFilter::for_member(self.current_user()?);
        let servers = derive_servers(&self.query(&filter).await?);
        tracing::info!(count = servers.len(), "loaded server list");

        self.state.send_modify(|state| state.servers = servers.clone());
        if let Some(first) = servers.first() {
            self.select_server(Some(first.clone())).await?;
        }
        Ok(servers)
    }

    /// Creates a server: its welcome text channel, then its default voice
    /// channel.
    pub async fn create_server(
        &self,
        name: &str,
        image_url: &str,
        members: Vec<UserId>,
    ) -> Result<ServerCreated, StoreError> {
        let server = Server {
            id: ServerId::generate(),
            name: name.to_string(),
            image: (!image_url.is_empty()).then(|| image_url.to_string()),
        };
        let welcome = NewChannel::messaging(
            WELCOME_CHANNEL,
            members.clone(),
            ChannelData::for_server(&server, TEXT_CHANNELS),
        )
        .with_id(ChannelId::generate());

        let channel = self.chat.create_channel(welcome).await.map_err(|e| {
            tracing::error!(server = name, error = %e, "failed to create server");
            StoreError::Chat(e)
        })?;
        tracing::info!(server_id = %server.id, channel_id = %channel.id, "created server");

        let call = self
            .create_call(&server, GENERAL_VOICE_CHANNEL, members)
            .await
            .ok();
        Ok(ServerCreated { server, call })
    }

    /// Creates a channel in the selected server. The category grouping is not
    /// refreshed; call [`Store::select_server`] again to see the new channel.
    pub async fn create_channel(
        &self,
        name: &str,
        category: &str,
        members: Vec<UserId>,
    ) -> Result<Channel, StoreError> {
        self.current_user()?;
        let server = self.state.borrow().selected_server.clone().ok_or_else(|| {
            tracing::error!(channel = name, "cannot create a channel without a selected server");
            StoreError::NoServerSelected
        })?;

        let request = NewChannel::messaging(name, members, ChannelData::for_server(&server, category));
        let channel = self.chat.create_channel(request).await.map_err(|e| {
            tracing::error!(server_id = %server.id, channel = name, error = %e, "failed to create channel");
            StoreError::Chat(e)
        })?;
        tracing::info!(server_id = %server.id, channel_id = %channel.id, category, "created channel");
        Ok(channel)
    }

    /// Provisions a voice call tagged with `server`.
    pub async fn create_call(
        &self,
        server: &Server,
        channel_name: &str,
        members: Vec<UserId>,
    ) -> Result<CallId, StoreError> {
        let request = NewCall::for_server(server, channel_name, members);
        let requested = request.id.clone();
        match self.calls.create_call(request).await {
            Ok(call_id) => {
                tracing::info!(%call_id, server_id = %server.id, "created call");
                Ok(call_id)
            }
            Err(e) => {
                tracing::error!(call_id = %requested, server_id = %server.id, error = %e, "failed to create call");
                Err(StoreError::Call(e))
            }
        }
    }

    /// Enters the call view, or returns to the channel view with `None`.
    pub fn set_active_call(&self, call_id: Option<CallId>) {
        self.state.send_modify(|state| state.active_call = call_id);
    }

    pub async fn apply(&self, action: Action) -> Result<(), StoreError> {
        match action {
            Action::LoadServers => self.load_servers().await.map(drop),
            Action::SelectServer(server) => self.select_server(server).await,
            Action::CreateServer {
                name,
                image_url,
                members,
            } => self.create_server(&name, &image_url, members).await.map(drop),
            Action::CreateChannel {
                name,
                category,
                members,
            } => self.create_channel(&name, &category, members).await.map(drop),
            Action::CreateCall {
                server,
                channel_name,
                members,
            } => self.create_call(&server, &channel_name, members).await.map(drop),
            Action::SetActiveCall(call_id) => {
                self.set_active_call(call_id);
                Ok(())
            }
        }
    }

    /// Runs `action` in the background. Failures are logged by the operation
    /// itself and otherwise dropped.
    pub fn dispatch(self: &Arc<Self>, action: Action) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = store.apply(action).await {
                tracing::debug!(error = %e, "dispatched action failed");
            }
        })
    }
}
