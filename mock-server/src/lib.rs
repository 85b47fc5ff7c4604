//! In-process stand-in for the Unipol Move web service.
//!
//! Serves the four endpoints the client uses: the public environment
//! document, the login form, the paginated movements list and the report
//! renderer. Sessions and call counters live in shared state so tests can
//! assert on how the client drove the server.

use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const CONTRACT_ID: &str = "P000000000";
pub const USERNAME: &str = "mario.rossi@example.com";
pub const PASSWORD: &str = "correct horse";
pub const MOVEMENTS_CLIENT_ID: &str = "mobility-client";
pub const MOVEMENTS_CLIENT_SECRET: &str = "mobility-secret";
pub const REPORT_CLIENT_ID: &str = "us-client";
pub const REPORT_CLIENT_SECRET: &str = "us-secret";

pub const MOVEMENTS_PATH: &str =
    "/api/ut/prv/unipolmove/portale-tlpd/servizi-mobilita/v6/contratti/{contract_id}/movimenti";
pub const REPORT_PATH: &str =
    "/api/us/prv/tpd/telepedaggio-us/post-vendita/v1/contratti/{contract_id}/movimenti/stampa";

/// Fixture data served by the mock.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub contract_id: String,
    pub username: String,
    pub password: String,
    pub movements: Vec<Value>,
    /// Filler bytes appended to every rendered report.
    pub report_padding: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            contract_id: CONTRACT_ID.to_string(),
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            movements: sample_movements(237),
            report_padding: 0,
        }
    }
}

/// Requests seen by the mock, per endpoint.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    pub environment: usize,
    pub login: usize,
    pub movements: usize,
    pub report: usize,
    /// `(offset, limite)` of every movements request, in order.
    pub pages: Vec<(usize, usize)>,
    /// Body of the most recent accepted report request.
    pub last_report: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct MockState {
    config: Arc<MockConfig>,
    sessions: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<CallLog>>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(CallLog::default())),
        }
    }

    pub async fn calls(&self) -> CallLog {
        self.calls.read().await.clone()
    }

    /// Snapshot of the call log from a thread outside the runtime.
    pub fn calls_blocking(&self) -> CallLog {
        self.calls.blocking_read().clone()
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

/// `count` movements with descending dates spread over 2024.
pub fn sample_movements(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let month = 12 - (i / 28) % 12;
            let day = 28 - i % 28;
            json!({
                "dataIngresso": format!("2024-{month:02}-{day:02}T08:{:02}:00", i % 60),
                "dataUscita": format!("2024-{month:02}-{day:02}T09:{:02}:00", i % 60),
                "inizioTratta": "MILANO SUD",
                "fineTratta": "BOLOGNA B.PANIGALE",
                "saldo": format!("{}.{:02}", 5 + i % 20, i % 100),
                "progressivo": i,
            })
        })
        .collect()
}

/// Bytes the report endpoint returns for a given request.
pub fn render_pdf(recipient: &str, movements: usize) -> Vec<u8> {
    format!(
        "%PDF-1.4\n% Unipol Move expense report\n% intestatario: {recipient}\n% movimenti: {movements}\n%%EOF\n"
    )
    .into_bytes()
}

pub fn app(state: MockState) -> Router {
    Router::new()
        .route("/app/config/environment.json", get(environment))
        .route("/login", post(login))
        .route(&axum_path(MOVEMENTS_PATH), get(list_movements))
        .route(&axum_path(REPORT_PATH), post(print_report))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

fn axum_path(template: &str) -> String {
    template.replace("{contract_id}", "{contract}")
}

async fn environment(State(state): State<MockState>) -> Json<Value> {
    state.calls.write().await.environment += 1;
    Json(json!({
        "production": false,
        "apiConnect": {
            "headers_ut_prv_mobility_service": {
                "x-ibm-client-id": MOVEMENTS_CLIENT_ID,
                "x-ibm-client-secret": MOVEMENTS_CLIENT_SECRET
            },
            "headers_us": {
                "x-ibm-client-id": REPORT_CLIENT_ID,
                "x-ibm-client-secret": REPORT_CLIENT_SECRET
            }
        }
    }))
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

async fn login(State(state): State<MockState>, Form(form): Form<LoginForm>) -> Response {
    state.calls.write().await.login += 1;
    if form.username != state.config.username || form.password != state.config.password {
        return (StatusCode::UNAUTHORIZED, Json(json!({"esito": "KO"}))).into_response();
    }
    let token = Uuid::new_v4().simple().to_string();
    state.sessions.write().await.insert(token.clone());
    (
        AppendHeaders([
            (header::SET_COOKIE, format!("MRHSession={token}; path=/; secure; HttpOnly")),
            (header::SET_COOKIE, format!("LastMRH_Session={}; path=/; secure", &token[..8])),
        ]),
        Json(json!({"esito": "OK"})),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct MovementsParams {
    pub offset: usize,
    #[serde(rename = "limite")]
    pub limit: usize,
    #[serde(rename = "intervallo")]
    pub interval: String,
    #[serde(rename = "ordinaPer")]
    pub order_by: Option<String>,
    #[serde(rename = "statoPagamento")]
    pub payment_status: Option<String>,
}

async fn list_movements(
    State(state): State<MockState>,
    Path(contract): Path<String>,
    headers: HeaderMap,
    Query(params): Query<MovementsParams>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&state, &contract, &headers, MOVEMENTS_CLIENT_ID, MOVEMENTS_CLIENT_SECRET).await?;
    if params.offset == 0 || params.limit == 0 || params.interval.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    {
        let mut calls = state.calls.write().await;
        calls.movements += 1;
        calls.pages.push((params.offset, params.limit));
    }
    let page: Vec<Value> = state
        .config
        .movements
        .iter()
        .skip(params.offset - 1)
        .take(params.limit)
        .cloned()
        .collect();
    Ok(Json(json!({
        "dispositivi": [{"codiceDispositivo": "OBU-0001", "targa": "AB123CD"}],
        "listaMovimenti": page,
    })))
}

async fn print_report(
    State(state): State<MockState>,
    Path(contract): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, StatusCode> {
    authorize(&state, &contract, &headers, REPORT_CLIENT_ID, REPORT_CLIENT_SECRET).await?;
    let recipient = body["intestatario"].as_str().unwrap_or_default().to_string();
    let count = body["listaMovimenti"].as_array().map_or(0, Vec::len);
    if recipient.is_empty() || count == 0 {
        let envelope = json!({"errore": "intestatario e movimenti obbligatori"});
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(envelope)).into_response());
    }
    {
        let mut calls = state.calls.write().await;
        calls.report += 1;
        calls.last_report = Some(body);
    }
    let mut pdf = render_pdf(&recipient, count);
    pdf.resize(pdf.len() + state.config.report_padding, b'\n');
    Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf).into_response())
}

/// Require a known contract, a live session cookie and the gateway keys of
/// the API family being called.
async fn authorize(
    state: &MockState,
    contract: &str,
    headers: &HeaderMap,
    client_id: &str,
    client_secret: &str,
) -> Result<(), StatusCode> {
    if contract != state.config.contract_id {
        return Err(StatusCode::NOT_FOUND);
    }
    let header_is = |name: &str, expected: &str| {
        headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected)
    };
    if !header_is("x-ibm-client-id", client_id) || !header_is("x-ibm-client-secret", client_secret)
    {
        return Err(StatusCode::FORBIDDEN);
    }
    let session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, "MRHSession"))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !state.sessions.read().await.contains(session) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}
