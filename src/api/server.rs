//! Actix-web front end for the diagrams API (feature-gated)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use serde_json::Value;

use super::service::{ClaimsVerifier, DiagramService, ServiceError, TokenVerifier, owner_from_header};
use super::{DiagramList, ErrorBody};
use crate::persistence::settings::AppSettings;

static REQ_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Shared by every worker.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<DiagramService>,
    pub verifier: Arc<dyn TokenVerifier + Send + Sync>,
    /// Where request lines go. `None` keeps the request log off.
    pub log_dir: Option<PathBuf>,
}

impl ApiState {
    pub fn new(service: Arc<DiagramService>) -> Self {
        Self { service, verifier: Arc::new(ClaimsVerifier), log_dir: None }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier + Send + Sync>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    fn log(&self, line: &str) {
        if let Some(dir) = &self.log_dir {
            log_line(dir, line);
        }
    }
}

fn ensure_dir(p: &Path) {
    if let Some(parent) = p.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

fn log_line(dir: &Path, line: &str) {
    use std::io::Write;
    let now = time::OffsetDateTime::now_utc();
    let date = time::macros::format_description!("[year][month][day]");
    let ts = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let fname = match now.format(&date) { Ok(s) => format!("api_{}.log", s), Err(_) => "api.log".to_string() };
    let path = dir.join(fname);
    ensure_dir(&path);
    let ts_s = now.format(&ts).unwrap_or_else(|_| String::new());
    let msg = format!("{} | {}\n", ts_s, line);
    if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        let _ = f.write_all(msg.as_bytes());
    }
}

fn next_request_id() -> String {
    let n = REQ_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    format!("{}-{}", now, n)
}

fn error_response(err: &ServiceError) -> HttpResponse {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(ErrorBody { error: err.to_string() })
}

fn owner(state: &ApiState, req: &HttpRequest) -> Result<String, ServiceError> {
    let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok());
    owner_from_header(state.verifier.as_ref(), header)
}

// An empty body is read as `{}`.
fn json_body(body: &[u8]) -> Result<Value, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|_| ServiceError::BadRequest("Invalid JSON".into()))
}

/// Run a handler body, then write one request line with status and timing.
fn respond(
    state: &ApiState,
    req: &HttpRequest,
    route: &str,
    f: impl FnOnce() -> Result<HttpResponse, ServiceError>,
) -> HttpResponse {
    let rid = next_request_id();
    let t0 = Instant::now();
    let resp = match f() {
        Ok(resp) => resp,
        Err(e) => {
            log::debug!("RID={} {} failed: {}", rid, route, e);
            error_response(&e)
        }
    };
    let peer = req.peer_addr().map(|a| a.to_string()).unwrap_or_else(|| "unknown".into());
    state.log(&format!(
        "RID={} {} {} from {} status={} dt_ms={}",
        rid,
        req.method(),
        route,
        peer,
        resp.status().as_u16(),
        t0.elapsed().as_millis()
    ));
    resp
}

async fn list_diagrams(state: web::Data<ApiState>, req: HttpRequest) -> HttpResponse {
    respond(&state, &req, "/diagrams", || {
        let owner = owner(&state, &req)?;
        Ok(HttpResponse::Ok().json(DiagramList { diagrams: state.service.list(&owner) }))
    })
}

async fn create_diagram(state: web::Data<ApiState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    respond(&state, &req, "/diagrams", || {
        let owner = owner(&state, &req)?;
        let summary = state.service.create_from_json(&owner, &json_body(&body)?)?;
        Ok(HttpResponse::Created().json(summary))
    })
}

async fn get_diagram(state: web::Data<ApiState>, req: HttpRequest, path: web::Path<String>) -> HttpResponse {
    respond(&state, &req, "/diagrams/{id}", || {
        let owner = owner(&state, &req)?;
        Ok(HttpResponse::Ok().json(state.service.get(&owner, &path)?))
    })
}

async fn update_diagram(
    state: web::Data<ApiState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    respond(&state, &req, "/diagrams/{id}", || {
        let owner = owner(&state, &req)?;
        let summary = state.service.update_from_json(&owner, &path, &json_body(&body)?)?;
        Ok(HttpResponse::Ok().json(summary))
    })
}

async fn delete_diagram(state: web::Data<ApiState>, req: HttpRequest, path: web::Path<String>) -> HttpResponse {
    respond(&state, &req, "/diagrams/{id}", || {
        let owner = owner(&state, &req)?;
        state.service.delete(&owner, &path)?;
        Ok(HttpResponse::NoContent().finish())
    })
}

async fn get_public_diagram(state: web::Data<ApiState>, req: HttpRequest, path: web::Path<String>) -> HttpResponse {
    respond(&state, &req, "/public/{id}", || Ok(HttpResponse::Ok().json(state.service.get_public(&path)?)))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody { error: "Not found".into() })
}

/// Register the API routes. Used by the server and by route tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/diagrams", web::get().to(list_diagrams))
        .route("/diagrams", web::post().to(create_diagram))
        .route("/diagrams/{id}", web::get().to(get_diagram))
        .route("/diagrams/{id}", web::put().to(update_diagram))
        .route("/diagrams/{id}", web::delete().to(delete_diagram))
        .route("/public/{id}", web::get().to(get_public_diagram));
}

/// Build the app for `state`. Unknown routes get a JSON 404.
pub fn app(
    state: ApiState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .configure(configure)
        .default_service(web::to(not_found))
}

fn state_for(cfg: &AppSettings, service: Arc<DiagramService>) -> ApiState {
    ApiState::new(service).with_log_dir(cfg.api_log_dir())
}

/// Run the server on the calling thread until it is stopped (Ctrl-C).
pub fn serve(cfg: &AppSettings, service: Arc<DiagramService>) -> anyhow::Result<()> {
    let bind = cfg.api_endpoint();
    let state = state_for(cfg, service);
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        state.log(&format!("Server starting on {}", bind));
        log::info!("API listening on {}", bind);
        HttpServer::new(move || app(state.clone())).bind(&bind)?.run().await
    })?;
    Ok(())
}
