use crate::export::{export_class_report, ExportFormat};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::ClassReport;
use crate::store::Store;
use serde_json::json;
use std::path::PathBuf;

fn reports_model(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let report = ClassReport::snapshot(store, classroom_id)?;
    Ok(json!(report))
}

fn export(store: &Store, params: &serde_json::Value, format: ExportFormat) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let summary = export_class_report(store, classroom_id, &out_path, format)?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "summary": summary,
    }))
}

fn reports_export_xlsx(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    export(store, params, ExportFormat::Xlsx)
}

fn reports_export_pdf(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    export(store, params, ExportFormat::Pdf)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "reports.model" => reports_model,
        "reports.exportXlsx" => reports_export_xlsx,
        "reports.exportPdf" => reports_export_pdf,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
