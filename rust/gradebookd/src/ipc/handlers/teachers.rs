use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::repo::hash_credential;
use crate::store::Store;
use serde_json::json;

fn teachers_register(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let school_name = get_optional_str(params, "schoolName").unwrap_or_default();
    let pin = get_required_str(params, "pin")?;
    let teacher = store
        .teachers()
        .register(&name, school_name.trim(), &hash_credential(&pin))?;
    Ok(json!({ "teacher": teacher }))
}

fn teachers_login(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let pin = get_required_str(params, "pin")?;
    let teacher = store.teachers().login(&name, &hash_credential(&pin))?;
    Ok(json!({ "teacher": teacher }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "teachers.register" => teachers_register,
        "teachers.login" => teachers_login,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
