pub mod auth;
pub mod client;
pub mod model;
mod ratelimit;
pub mod state;
#[cfg(test)]
mod stub_server;

const USER_AGENT: &str = "hoscord";
/// Channel type every server and direct-message channel is created with.
pub const CHANNEL_TYPE: &str = "messaging";
pub const CALL_TYPE: &str = "default";
