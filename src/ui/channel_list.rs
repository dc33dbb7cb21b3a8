use crate::api::{model::UserId, state::State};

pub fn channel_list(state: &State, me: Option<&UserId>) -> String {
    let title = match &state.selected_server {
        Some(server) => server.name.as_str(),
        None => "Direct Messages",
    };
    let mut lines = vec![format!("== {} ==", title)];
    if state.channels_by_category.is_empty() {
        lines.push("  (no channels)".to_string());
    }
    for (category, channels) in state.channels_by_category.iter() {
        lines.push(format!("{}:", category.to_uppercase()));
        for channel in channels {
            lines.push(format!("  # {}", channel.display_name(me)));
        }
    }
    lines.join("\n")
}
