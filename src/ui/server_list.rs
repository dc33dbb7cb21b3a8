use reqwest::Url;

use crate::api::{model::Server, state::State};

const HOME: &str = "[home]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerIcon {
    Image(String),
    Initial(char),
}

impl ServerIcon {
    /// The server's image when it is an absolute URL, else its first letter.
    pub fn for_server(server: &Server) -> Self {
        match &server.image {
            Some(image) if Url::parse(image).is_ok() => ServerIcon::Image(image.clone()),
            _ => ServerIcon::Initial(server.name.chars().next().unwrap_or('?')),
        }
    }

    fn label(&self) -> String {
        match self {
            ServerIcon::Image(_) => "[img]".to_string(),
            ServerIcon::Initial(initial) => format!("[{}]", initial),
        }
    }
}

fn marker(selected: bool) -> &'static str {
    if selected {
        ">"
    } else {
        " "
    }
}

pub fn server_list(state: &State) -> String {
    let mut lines = vec![format!("{} {} Direct Messages", marker(state.is_direct_messages()), HOME)];
    for server in &state.servers {
        let selected = state
            .selected_server
            .as_ref()
            .is_some_and(|x| x.id == server.id);
        lines.push(format!(
            "{} {} {}",
            marker(selected),
            ServerIcon::for_server(server).label(),
            server.name
        ));
    }
    lines.join("\n")
}
