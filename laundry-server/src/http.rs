//! HTTP routes: HTML pages, form posts and the JSON API.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use laundry_core::college::{display_name, is_valid_slug, normalize_slug};
use laundry_core::{Command, CommandError, MachineSet, DEFAULT_COLLEGE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::session::{CommandOutcome, DataSource, Modal};
use crate::views;
use crate::{get_service_version, query, AppState, StoreError};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route("/home", get(landing_handler))
        .route("/go", get(go_handler))
        .route("/health", get(health_check))
        .route("/api/machines/{id}", get(get_machine_handler))
        .route(
            "/api/colleges/{college}/machines/{id}/commands",
            post(api_command_handler),
        )
        .route("/{college}", get(college_handler))
        .route("/{college}/machines/{id}", post(form_command_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_lowercase()
        .contains("text/html")
}

fn command_error_status(error: &CommandError) -> StatusCode {
    match error {
        CommandError::UnknownCommand(_) | CommandError::MissingTarget(_) => {
            StatusCode::BAD_REQUEST
        }
        CommandError::UnknownMachine(_) => StatusCode::NOT_FOUND,
        CommandError::NotOffered { .. } | CommandError::TargetUnavailable { .. } => {
            StatusCode::CONFLICT
        }
    }
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Normalize the college segment of a path.
///
/// Segments that cannot be a college slug are rejected before any session
/// exists for them, so they never seed the store.
#[allow(clippy::result_large_err)] // Response is large but this is idiomatic in Axum handlers
fn college_slug(raw: &str) -> Result<String, Response> {
    let slug = normalize_slug(raw);
    if is_valid_slug(&slug) {
        Ok(slug)
    } else {
        Err(error_json(
            StatusCode::NOT_FOUND,
            format!("no college named {}", raw),
        ))
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "laundry",
        "version": get_service_version(),
        "store": state.store.backend_name(),
    }))
}

async fn landing_handler() -> Html<String> {
    Html(views::landing::render(&get_service_version()))
}

#[derive(Debug, Deserialize)]
struct GoParams {
    college: Option<String>,
}

async fn go_handler(Query(params): Query<GoParams>) -> Redirect {
    let slug = params
        .college
        .map(|c| normalize_slug(&c))
        .filter(|c| is_valid_slug(c))
        .unwrap_or_else(|| DEFAULT_COLLEGE.to_string());
    Redirect::to(&format!("/{}", views::path_segment(&slug)))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    machine: Option<String>,
}

#[derive(Debug, Serialize)]
struct CollegeResponse<'a> {
    college: &'a str,
    name: String,
    source: DataSource,
    #[serde(flatten)]
    machines: &'a MachineSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    modal: Option<&'a Modal>,
}

async fn college_handler(
    Path(college): Path<String>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let college = match college_slug(&college) {
        Ok(college) => college,
        Err(response) => return response,
    };
    let machine_id = params.machine.as_deref().filter(|id| !id.is_empty());

    let session = state.session(&college).await;
    let mut session = session.lock().await;
    // Opening a modal reads the view already on screen.
    if machine_id.is_none() || session.view().is_empty() {
        session.reload().await;
    }

    let modal = match machine_id {
        Some(id) => match session.modal(id) {
            Some(modal) => Some(modal),
            None => {
                return error_json(
                    StatusCode::NOT_FOUND,
                    format!("no machine with id {} in {}", id, college),
                )
            }
        },
        None => None,
    };

    if prefers_html(&headers) {
        let html = views::college::render(&session, modal.as_ref(), &get_service_version());
        return Html(html).into_response();
    }

    Json(CollegeResponse {
        college: session.college(),
        name: display_name(session.college()),
        source: session.source(),
        machines: session.view(),
        modal: modal.as_ref(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct CommandForm {
    command: String,
    target: Option<String>,
}

async fn execute(
    state: &AppState,
    college: &str,
    machine_id: &str,
    command: &Command,
) -> Result<(CommandOutcome, MachineSet), CommandError> {
    let session = state.session(college).await;
    let mut session = session.lock().await;
    if session.view().is_empty() {
        session.load().await;
    }

    let outcome = session.execute(machine_id, command).await?;
    info!(
        "Executed {} on {} in {} ({} write(s))",
        command.kind(),
        machine_id,
        college,
        outcome.writes().len()
    );
    Ok((outcome, session.view().clone()))
}

async fn form_command_handler(
    Path((college, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Form(form): Form<CommandForm>,
) -> Response {
    let college = match college_slug(&college) {
        Ok(college) => college,
        Err(response) => return response,
    };
    let result = match Command::from_parts(&form.command, form.target.as_deref()) {
        Ok(command) => execute(&state, &college, &id, &command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Redirect::to(&format!("/{}", views::path_segment(&college))).into_response(),
        Err(e) => {
            warn!("Rejected command for {} in {}: {}", id, college, e);
            (command_error_status(&e), e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    #[serde(flatten)]
    outcome: CommandOutcome,
    machines: MachineSet,
}

async fn api_command_handler(
    Path((college, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_json(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let college = match college_slug(&college) {
        Ok(college) => college,
        Err(response) => return response,
    };
    let result = match Command::from_parts(&request.command, request.target.as_deref()) {
        Ok(command) => execute(&state, &college, &id, &command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok((outcome, machines)) => Json(CommandResponse { outcome, machines }).into_response(),
        Err(e) => {
            warn!("Rejected command for {} in {}: {}", id, college, e);
            error_json(command_error_status(&e), e.to_string())
        }
    }
}

async fn get_machine_handler(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match query::get_by_id(state.store.as_ref(), &id).await {
        Ok(machine) => Json(machine).into_response(),
        Err(e @ StoreError::NotFound { .. }) => error_json(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_json(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}
