//! Template file listing and retrieval

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::AdminState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub name: String,
}

/// Last path component; traversal segments never survive
pub fn safe_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?;
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base)
    }
}

fn is_listed(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !name.starts_with('.') && (lower.ends_with(".html") || lower.ends_with(".txt"))
}

/// Sorted `.html`/`.txt` files in `dir`; a missing directory lists nothing
pub async fn list_templates(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str()
            && is_listed(name)
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub async fn list_handler(State(state): State<AdminState>) -> Result<Json<serde_json::Value>> {
    let templates = list_templates(&state.config.templates_dir).await?;
    Ok(Json(json!({ "templates": templates })))
}

pub async fn get_handler(
    State(state): State<AdminState>,
    Query(query): Query<TemplateQuery>,
) -> Response {
    let not_found = || (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response();

    let Some(name) = safe_name(&query.name) else {
        return not_found();
    };
    let path = state.config.templates_dir.join(name);
    if !tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return not_found();
    }
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("failed to read template {}: {}", path.display(), e);
            not_found()
        }
    }
}
