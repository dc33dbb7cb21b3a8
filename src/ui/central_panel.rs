use crate::api::state::State;

pub fn central_panel(state: &State) -> String {
    match &state.active_call {
        Some(call_id) => format!("[in call {}]", call_id),
        None => "[channel view]".to_string(),
    }
}
