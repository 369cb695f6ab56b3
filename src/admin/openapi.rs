//! OpenAPI document and Swagger UI for the admin API

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use serde_json::{Map, Value, json};

const SWAGGER_PAGE: &str = include_str!("../../assets/swagger.html");

fn json_object(properties: Value) -> Value {
    json!({
        "application/json": {
            "schema": { "type": "object", "properties": properties }
        }
    })
}

fn render_post(description: &str, ok: Value) -> Value {
    json!({
        "tags": ["Templates"],
        "summary": description,
        "requestBody": {
            "content": {
                "application/x-www-form-urlencoded": {
                    "schema": {
                        "type": "object",
                        "properties": {
                            "template": { "type": "string" },
                            "image_url": { "type": "string" }
                        }
                    }
                },
                "application/json": {
                    "schema": {
                        "type": "object",
                        "properties": {
                            "template": { "type": "string" },
                            "image_url": { "type": "string" }
                        }
                    }
                },
                "text/plain": { "schema": { "type": "string" } }
            }
        },
        "responses": {
            "200": ok,
            "400": { "description": "Template error" },
            "413": { "description": "Template too large" }
        }
    })
}

fn get_op(tag: &str, summary: &str, responses: Value) -> Value {
    json!({ "get": { "tags": [tag], "summary": summary, "responses": responses } })
}

fn admin_path() -> Value {
    get_op(
        "Admin",
        "Admin metadata",
        json!({
            "200": {
                "description": "Admin service metadata",
                "content": json_object(json!({
                    "service": { "type": "string" },
                    "version": { "type": "string" },
                    "notes": { "type": "string" }
                }))
            }
        }),
    )
}

fn status_path() -> Value {
    get_op(
        "Admin",
        "Service health",
        json!({
            "200": {
                "description": "Service health",
                "content": json_object(json!({
                    "ok": { "type": "boolean" },
                    "component": { "type": "string" }
                }))
            }
        }),
    )
}

fn templates_list_path() -> Value {
    get_op(
        "Templates",
        "List available template files",
        json!({
            "200": {
                "description": "List of templates",
                "content": json_object(json!({
                    "templates": { "type": "array", "items": { "type": "string" } }
                }))
            }
        }),
    )
}

fn templates_get_path() -> Value {
    let mut path = get_op(
        "Templates",
        "Return a template file (raw text)",
        json!({
            "200": {
                "description": "Template content (text/plain)",
                "content": { "text/plain": { "schema": { "type": "string" } } }
            },
            "404": { "description": "Not found" }
        }),
    );
    path["get"]["parameters"] = json!([{
        "name": "name",
        "in": "query",
        "required": true,
        "description": "Template filename to fetch",
        "schema": { "type": "string" }
    }]);
    path
}

fn render_path() -> Value {
    let mut path = get_op(
        "Templates",
        "Return the render page UI",
        json!({
            "200": {
                "description": "Render page HTML",
                "content": { "text/html": { "schema": { "type": "string" } } }
            },
            "500": { "description": "Operator error" }
        }),
    );
    path["post"] = render_post(
        "Render submitted template text",
        json!({
            "description": "Rendered HTML preview",
            "content": { "text/html": { "schema": { "type": "string" } } }
        }),
    );
    path
}

fn render_json_path() -> Value {
    json!({
        "post": render_post(
            "Render submitted template and return JSON (Swagger-friendly)",
            json!({
                "description": "Rendered HTML wrapped in JSON (for Swagger UI)",
                "content": json_object(json!({ "rendered_html": { "type": "string" } }))
            }),
        )
    })
}

/// The full OpenAPI 3 document served at `/openapi/openapi.json`
pub fn document() -> Value {
    let mut paths = Map::new();
    paths.insert("/admin".into(), admin_path());
    paths.insert("/status".into(), status_path());
    paths.insert("/templates/list".into(), templates_list_path());
    paths.insert("/templates/get".into(), templates_get_path());
    paths.insert("/render".into(), render_path());
    paths.insert("/render/json".into(), render_json_path());

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Endpoints",
            "version": "1.0.0",
            "description": "This service was left in a development state; internal endpoints may be exposed. Accessible only via the training environment; do not use in production."
        },
        "servers": [{ "url": "http://localhost:9000" }],
        "tags": [
            { "name": "Admin", "description": "Administrative endpoints" },
            { "name": "Templates", "description": "Template management and rendering" }
        ],
        "paths": paths
    })
}

pub async fn openapi_json_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        document().to_string(),
    )
}

pub async fn swagger_handler() -> Html<&'static str> {
    Html(SWAGGER_PAGE)
}
