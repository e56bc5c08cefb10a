use crate::ipc::error::{err, ok, source_err};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(roster_path) = state.roster_path() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let roster = match roster::load_roster(&roster_path) {
        Ok(r) => r,
        Err(e) => return source_err(&req.id, e),
    };

    let classes: Vec<serde_json::Value> = roster
        .class_counts()
        .iter()
        .map(|(class_name, students)| {
            json!({
                "className": class_name,
                "students": students,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "totalStudents": roster.total(),
            "classes": classes,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
