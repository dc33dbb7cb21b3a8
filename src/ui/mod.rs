//! Plain-text rendering of a [`State`] snapshot.
//!
//! Panes are stacked top to bottom: the server list, the channel list of the
//! selected server, then the central panel (the active call, or the channel
//! view when there is none).

mod central_panel;
mod channel_list;
mod server_list;

use crate::api::{model::UserId, state::State};

pub use server_list::ServerIcon;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Renders every pane of `state`. `me` hides the signed-in user from
/// direct-message labels.
pub fn render(state: &State, me: Option<&UserId>) -> String {
    [
        server_list::server_list(state),
        channel_list::channel_list(state, me),
        central_panel::central_panel(state),
    ]
    .join("\n")
}
