//! Chat/voice client core: signs in against the app's token endpoint, talks
//! to the hosted chat and video platforms, and derives the server/channel
//! view model the UI renders.

pub mod api;
pub mod config;
pub mod ui;
