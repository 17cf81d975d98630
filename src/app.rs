use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::page::{PageRenderer, PageView, quantity_field};
use crate::session::{Notice, SESSION_COOKIE, SessionStore};
use crate::table::MATERIAL_SLOTS;
use crate::tracker::{LootEntry, Tracker};

lazy_static! {
    static ref SLOT_FIELD: Regex = Regex::new(r"^slot_(\d+)_(\d+)$").unwrap();
}

/// Shared state behind every handler: the file-backed tracker, the live
/// sessions and the compiled page templates.
pub struct AppState {
    tracker: Tracker,
    sessions: SessionStore,
    pages: PageRenderer,
}

impl AppState {
    /// Build the state for one server.
    ///
    /// # Arguments
    /// * `config` - Where the two files live and what their headers are called
    ///
    /// # Returns
    /// * `Result<Self, Box<dyn std::error::Error>>` - Fails only if a page template does not compile
    pub fn new(config: TrackerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(AppState {
            tracker: Tracker::new(config),
            sessions: SessionStore::new(),
            pages: PageRenderer::new()?,
        })
    }
}

/// Body of `POST /loot`. Blank quantities read as zero.
#[derive(Deserialize)]
struct LootForm {
    boss: String,
    #[serde(default)]
    q0: String,
    #[serde(default)]
    q1: String,
    #[serde(default)]
    q2: String,
}

/// All routes of the tracker, with `Cache-Control: no-store` on every
/// response so a reload always shows the files as they are now.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_tracker))
        .route("/loot", post(submit_loot))
        .route("/inventory", post(edit_inventory))
        .route("/reset", post(reset_week))
        .route("/api/summary", get(get_summary))
        .route("/static/tracker.css", get(serve_stylesheet))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

/// Bind the configured address and serve until the process is stopped.
///
/// The files are loaded once up front only to log what was found; a load
/// failure here is reported but does not stop the server.
///
/// # Arguments
/// * `config` - File locations and bind address
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error if binding or serving fails
pub async fn run(config: TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr;
    info!(
        "tracking {} with names from {}",
        config.data_file.display(),
        config.meta_file.display()
    );

    let state = Arc::new(AppState::new(config)?);
    match state.tracker.load() {
        Ok(data) => info!(
            "loaded {} bosses, {} reference rows",
            data.counts.bosses().len(),
            data.reference.len()
        ),
        // Not fatal for the process: every page render reloads and reports it.
        Err(e) => error!("{}", e),
    }
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Session id from the cookie, or a new one. The returned jar always carries
/// the cookie so a first visit gets one.
fn session_id(jar: CookieJar) -> (CookieJar, String) {
    let id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(SessionStore::new_id);

    let mut cookie = Cookie::new(SESSION_COOKIE, id.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    (jar.add(cookie), id)
}

/// Handler for `GET /`
///
/// Reloads both files and renders the page for the caller's session,
/// draining its pending notices. A load failure renders only the error.
///
/// # Arguments
/// * `state` - Shared application state
/// * `jar` - Request cookies, carrying the session id if there is one
///
/// # Returns
/// * `Response` - The tracker page, or the error page with status 500
async fn serve_tracker(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);

    let rendered = state.sessions.with_session(&id, |ctx| {
        let notices = ctx.take_notices();
        state
            .tracker
            .snapshot(&ctx.progress)
            .map(|snapshot| PageView::build(&snapshot, &ctx.progress, notices))
    });

    let (status, body) = match rendered {
        Ok(view) => (StatusCode::OK, state.pages.render_tracker(&view)),
        Err(e) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, state.pages.render_fatal(&e.to_string()))
        }
    };

    match body {
        Ok(html) => (status, jar, Html(html)).into_response(),
        Err(e) => {
            error!("failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, jar, "Failed to render page").into_response()
        }
    }
}

/// Handler for `POST /loot`
///
/// Adds the quantities to the chosen boss, saves, and marks the boss done
/// for this session. The outcome is queued as a notice and the browser is
/// sent back to the page.
///
/// # Arguments
/// * `state` - Shared application state
/// * `jar` - Request cookies
/// * `form` - Boss name and the three quantities
///
/// # Returns
/// * `(CookieJar, Redirect)` - Session cookie and a 303 to `/`
async fn submit_loot(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LootForm>,
) -> (CookieJar, Redirect) {
    let (jar, id) = session_id(jar);

    state.sessions.with_session(&id, |ctx| {
        let entry = match parse_loot(form) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{}", e);
                ctx.notify(Notice::warning(e.to_string()));
                return;
            }
        };

        match state.tracker.log_loot(&mut ctx.progress, &entry) {
            Ok(report) => {
                if report.receipt.already_done {
                    ctx.notify(Notice::warning(format!(
                        "注意：'{}' 本周已标记为完成。",
                        entry.boss
                    )));
                }
                match report.save_error {
                    Some(e) => {
                        error!("{}", e);
                        ctx.notify(Notice::error(e.to_string()));
                    }
                    None => ctx.notify(Notice::success(format!(
                        "🎈 数据保存成功！{} 总计 {}",
                        entry.boss, report.receipt.total
                    ))),
                }
            }
            Err(e) => {
                if e.is_validation() {
                    warn!("{}", e);
                    ctx.notify(Notice::warning(e.to_string()));
                } else {
                    error!("{}", e);
                    ctx.notify(Notice::error(e.to_string()));
                }
            }
        }
    });

    (jar, Redirect::to("/"))
}

/// Handler for `POST /inventory`
///
/// The inventory grid posts every field on each change. Fields that differ
/// from the file are written in one save and each is reported as a notice.
///
/// # Arguments
/// * `state` - Shared application state
/// * `jar` - Request cookies
/// * `fields` - `slot_<column>_<slot>` fields; anything else is ignored
///
/// # Returns
/// * `(CookieJar, Redirect)` - Session cookie and a 303 to `/`
async fn edit_inventory(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(fields): Form<HashMap<String, String>>,
) -> (CookieJar, Redirect) {
    let (jar, id) = session_id(jar);

    let outcome = parse_inventory(&fields).and_then(|cells| state.tracker.edit_cells(&cells));

    state.sessions.with_session(&id, |ctx| match outcome {
        Ok(report) => {
            if let Some(e) = report.save_error {
                error!("{}", e);
                ctx.notify(Notice::error(e.to_string()));
                return;
            }
            for edit in report.applied {
                ctx.notify(Notice::success(format!(
                    "✅ 已更新 {} - {} 为 {}",
                    edit.boss, edit.material, edit.value
                )));
            }
        }
        Err(e) => {
            if e.is_validation() {
                warn!("{}", e);
                ctx.notify(Notice::warning(e.to_string()));
            } else {
                error!("{}", e);
                ctx.notify(Notice::error(e.to_string()));
            }
        }
    });

    (jar, Redirect::to("/"))
}

/// Handler for `POST /reset`
///
/// Starts a new week for this session once three bosses are done;
/// otherwise only leaves an info notice. The counts file is never touched.
async fn reset_week(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (jar, id) = session_id(jar);

    state.sessions.with_session(&id, |ctx| {
        if ctx.progress.reset() {
            info!("weekly progress reset");
            ctx.notify(Notice::success("新的一周开始了！"));
        } else {
            ctx.notify(Notice::info("本周还未完成三个周本，无需重置。"));
        }
    });

    (jar, Redirect::to("/"))
}

/// Handler for `GET /api/summary`
///
/// The same data the page shows, as JSON: this session's progress, the
/// recommendations and every boss with its counts.
async fn get_summary(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);

    let summary = state.sessions.with_session(&id, |ctx| {
        state.tracker.snapshot(&ctx.progress).map(|snapshot| {
            json!({
                "progress": {
                    "completed": ctx.progress.completed(),
                    "state": ctx.progress.state(),
                    "started_at": ctx.progress.started_at(),
                },
                "recommendations": snapshot.recommendations,
                "bosses": snapshot.bosses,
                "warnings": snapshot.warnings,
            })
        })
    });

    match summary {
        Ok(body) => (jar, Json(body)).into_response(),
        Err(e) => {
            let status = if e.is_fatal() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, jar, Json(json!({ "status": "error", "message": e.to_string() })))
                .into_response()
        }
    }
}

async fn serve_stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("./static/tracker.css"),
    )
}

fn parse_quantity(field: &str, value: &str) -> Result<u32, TrackerError> {
    value.trim().parse().map_err(|_| TrackerError::InvalidQuantity {
        field: field.to_string(),
        value: value.trim().to_string(),
    })
}

fn parse_loot(form: LootForm) -> Result<LootEntry, TrackerError> {
    let raw = [form.q0, form.q1, form.q2];
    let mut quantities = [0u32; MATERIAL_SLOTS];
    for (slot, value) in raw.iter().enumerate() {
        if !value.trim().is_empty() {
            quantities[slot] = parse_quantity(&quantity_field(slot), value)?;
        }
    }
    Ok(LootEntry {
        boss: form.boss,
        quantities,
    })
}

/// `(column, slot, value)` for every inventory field in the form, sorted by
/// column then slot. Unrelated fields are ignored, and so are cleared ones:
/// a blank cell keeps its stored value.
fn parse_inventory(fields: &HashMap<String, String>) -> Result<Vec<(usize, usize, u32)>, TrackerError> {
    let mut edits = Vec::new();
    for (name, value) in fields {
        let Some(caps) = SLOT_FIELD.captures(name) else {
            continue;
        };
        let col: usize = caps[1].parse().map_err(|_| TrackerError::UnknownBoss(name.clone()))?;
        let slot: usize = caps[2].parse().map_err(|_| TrackerError::InvalidSlot(usize::MAX))?;
        if slot >= MATERIAL_SLOTS {
            return Err(TrackerError::InvalidSlot(slot));
        }
        if value.trim().is_empty() {
            continue;
        }
        edits.push((col, slot, parse_quantity(name, value)?));
    }
    edits.sort_unstable();
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn blank_quantity_is_zero() {
        let entry = parse_loot(LootForm {
            boss: "风魔龙".into(),
            q0: "2".into(),
            q1: "".into(),
            q2: " 1 ".into(),
        })
        .unwrap();
        assert_eq!(entry.quantities, [2, 0, 1]);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = parse_loot(LootForm {
            boss: "风魔龙".into(),
            q0: "-1".into(),
            q1: "0".into(),
            q2: "0".into(),
        })
        .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidQuantity { field, .. } if field == "q0"));
    }

    #[test]
    fn inventory_fields_parse_and_sort() {
        let edits = parse_inventory(&form(&[
            ("slot_1_2", "4"),
            ("slot_0_0", "7"),
            ("other", "x"),
        ]))
        .unwrap();
        assert_eq!(edits, vec![(0, 0, 7), (1, 2, 4)]);
    }

    #[test]
    fn cleared_inventory_field_is_left_alone() {
        let edits = parse_inventory(&form(&[
            ("slot_0_0", ""),
            ("slot_0_1", " "),
            ("slot_0_2", "5"),
        ]))
        .unwrap();
        assert_eq!(edits, vec![(0, 2, 5)]);
    }

    #[test]
    fn inventory_slot_out_of_range() {
        let err = parse_inventory(&form(&[("slot_0_3", "1")])).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidSlot(3)));
    }
}
