//! Request builders and response parsers for the Unipol Move endpoints.
//!
//! # Design
//! `MovementsApi` never performs I/O. Each endpoint is split into a
//! `build_*` method producing an `HttpRequest` and a `parse_*` method
//! consuming an `HttpResponse`, so headers, cookies and payloads can be
//! checked without a server. `UnipolMoveClient` pairs these with a
//! `Transport` to run the actual round-trips.

use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::session::SessionState;
use crate::types::{
    ApiKeys, EnvironmentDocument, GatewayKey, Movement, MovementPage, MovementQuery,
    ReportRequest,
};

pub const ENVIRONMENT_PATH: &str = "/app/config/environment.json";
const MOVEMENTS_PATH: &str =
    "/api/ut/prv/unipolmove/portale-tlpd/servizi-mobilita/v6/contratti/{contract_id}/movimenti";
const REPORT_PATH: &str =
    "/api/us/prv/tpd/telepedaggio-us/post-vendita/v1/contratti/{contract_id}/movimenti/stampa";

const ACCEPT_LANGUAGE: &str = "it-IT,it;q=0.8,en-US;q=0.5,en;q=0.3";
const LOGIN_REFERER: &str = "/app/login";
const MOVEMENTS_REFERER: &str = "/app/post-vendita/homepage/movements";

/// Stateless builder/parser for the service's HTTP API.
#[derive(Debug, Clone)]
pub struct MovementsApi {
    base_url: String,
    contract_id: String,
    session_id: String,
    login_path: String,
    user_agent: String,
}

impl MovementsApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            contract_id: config.contract_id.clone(),
            session_id: config.session_id.clone(),
            login_path: config.login_path.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn environment_url(&self) -> String {
        format!("{}{ENVIRONMENT_PATH}", self.base_url)
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }

    pub fn movements_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url,
            MOVEMENTS_PATH.replace("{contract_id}", &self.contract_id)
        )
    }

    pub fn report_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url,
            REPORT_PATH.replace("{contract_id}", &self.contract_id)
        )
    }

    pub fn build_environment(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.environment_url(),
            query: Vec::new(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), self.user_agent.clone()),
            ],
            body: None,
        }
    }

    pub fn parse_environment(&self, response: HttpResponse) -> Result<ApiKeys, ApiError> {
        check_status(&response, &self.environment_url())?;
        let doc: EnvironmentDocument = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::Deserialization(format!("environment document: {e}")))?;
        Ok(ApiKeys {
            movements: doc.api_connect.headers_ut_prv_mobility_service,
            report: doc.api_connect.headers_us,
        })
    }

    /// The login form goes without gateway keys.
    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        let mut headers = self.base_headers("application/json, text/plain, */*");
        headers.push((
            "Referer".to_string(),
            format!("{}{LOGIN_REFERER}", self.base_url),
        ));
        HttpRequest {
            method: HttpMethod::Post,
            url: self.login_url(),
            query: Vec::new(),
            headers,
            body: Some(RequestBody::Form(vec![
                ("username".to_string(), username.to_string()),
                ("password".to_string(), password.to_string()),
            ])),
        }
    }

    /// Accepts any 2xx or 3xx answer: the gateway may redirect after setting
    /// the cookies, and the redirect itself is not followed.
    pub fn parse_login(&self, response: HttpResponse) -> Result<SessionState, ApiError> {
        if !(200..400).contains(&response.status) {
            return Err(ApiError::Authentication {
                status: Some(response.status),
                reason: "login rejected".to_string(),
            });
        }
        SessionState::from_response(&response).map_err(|missing| ApiError::Authentication {
            status: Some(response.status),
            reason: format!("response did not set the {missing} cookie"),
        })
    }

    pub fn build_movements(
        &self,
        session: &SessionState,
        key: &GatewayKey,
        query: &MovementQuery,
    ) -> Result<HttpRequest, ApiError> {
        if query.offset < 1 {
            return Err(ApiError::InvalidQuery("offset starts at 1".to_string()));
        }
        if query.limit == 0 {
            return Err(ApiError::InvalidQuery("limit must be positive".to_string()));
        }
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: self.movements_url(),
            query: vec![
                ("offset".to_string(), query.offset.to_string()),
                ("limite".to_string(), query.limit.to_string()),
                ("intervallo".to_string(), query.interval.as_token().to_string()),
                ("ordinaPer".to_string(), query.order_by.as_token().to_string()),
                ("statoPagamento".to_string(), query.payment_status.as_token()),
            ],
            headers: self.api_headers(session, key),
            body: None,
        })
    }

    pub fn parse_movements(&self, response: HttpResponse) -> Result<MovementPage, ApiError> {
        check_status(&response, &self.movements_url())?;
        serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::Deserialization(format!("movements page: {e}")))
    }

    pub fn build_report(
        &self,
        session: &SessionState,
        key: &GatewayKey,
        recipient: &str,
        movements: &[Movement],
    ) -> Result<HttpRequest, ApiError> {
        let payload = ReportRequest::new(recipient, movements);
        let body = serde_json::to_string(&payload)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = self.api_headers(session, key);
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.report_url(),
            query: Vec::new(),
            headers,
            body: Some(RequestBody::Json(body)),
        })
    }

    /// Returns the PDF bytes. A JSON body on a success status is the
    /// service's error envelope, not a document.
    pub fn parse_report(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        let endpoint = self.report_url();
        check_status(&response, &endpoint)?;
        let is_json = response
            .header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json {
            return Err(ApiError::Http {
                status: response.status,
                endpoint,
                body: response.body_text(),
            });
        }
        Ok(response.body)
    }

    fn base_headers(&self, accept: &str) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), accept.to_string()),
            ("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()),
            ("X-UNIPOL-REQUESTID".to_string(), Uuid::new_v4().to_string()),
            ("X-UNIPOL-SEQUENCEID".to_string(), "0".to_string()),
            ("X-UNIPOL-SESSIONID".to_string(), self.session_id.clone()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ]
    }

    fn api_headers(&self, session: &SessionState, key: &GatewayKey) -> Vec<(String, String)> {
        let mut headers = self.base_headers("application/json");
        headers.extend([
            ("x-ibm-client-id".to_string(), key.client_id.clone()),
            ("x-ibm-client-secret".to_string(), key.client_secret.clone()),
            ("X-UNIPOL-CANALE".to_string(), "WEB".to_string()),
            (
                "Referer".to_string(),
                format!("{}{MOVEMENTS_REFERER}", self.base_url),
            ),
            ("Cookie".to_string(), session.cookie_header()),
        ]);
        headers
    }
}

/// Map a non-success status to `ApiError::Http`.
fn check_status(response: &HttpResponse, endpoint: &str) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        endpoint: endpoint.to_string(),
        body: response.body_text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interval, OrderBy, PaymentStatusFilter};
    use serde_json::json;

    fn api() -> MovementsApi {
        let config = ClientConfig::new("P000000001")
            .with_base_url("http://localhost:3000")
            .with_session_id("session-1");
        MovementsApi::new(&config)
    }

    fn session() -> SessionState {
        SessionState::new("mrh", "last")
    }

    fn key() -> GatewayKey {
        GatewayKey {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn urls_embed_contract_id() {
        let api = api();
        assert_eq!(
            api.movements_url(),
            "http://localhost:3000/api/ut/prv/unipolmove/portale-tlpd/servizi-mobilita/v6/contratti/P000000001/movimenti"
        );
        assert_eq!(
            api.report_url(),
            "http://localhost:3000/api/us/prv/tpd/telepedaggio-us/post-vendita/v1/contratti/P000000001/movimenti/stampa"
        );
        assert_eq!(api.login_url(), "http://localhost:3000/login");
    }

    #[test]
    fn build_login_sends_form_without_gateway_keys() {
        let req = api().build_login("user@example.com", "pw");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("X-UNIPOL-SESSIONID"), Some("session-1"));
        assert_eq!(req.header("x-ibm-client-id"), None);
        assert_eq!(req.header("cookie"), None);
        assert_eq!(
            req.body,
            Some(RequestBody::Form(vec![
                ("username".into(), "user@example.com".into()),
                ("password".into(), "pw".into()),
            ]))
        );
    }

    #[test]
    fn parse_login_reads_cookies() {
        let mut resp = response(302, "");
        resp.headers = vec![
            ("Set-Cookie".into(), "MRHSession=abc; path=/".into()),
            ("Set-Cookie".into(), "LastMRH_Session=def; path=/".into()),
        ];
        let session = api().parse_login(resp).unwrap();
        assert_eq!(session, SessionState::new("abc", "def"));
    }

    #[test]
    fn parse_login_rejects_error_status_and_missing_cookies() {
        let err = api().parse_login(response(401, "nope")).unwrap_err();
        assert!(matches!(err, ApiError::Authentication { status: Some(401), .. }));

        let err = api().parse_login(response(200, "<html>")).unwrap_err();
        match err {
            ApiError::Authentication { reason, .. } => assert!(reason.contains("MRHSession")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn build_movements_sets_query_headers_and_cookies() {
        let query = MovementQuery {
            offset: 101,
            limit: 50,
            interval: Interval::LastYear,
            order_by: OrderBy::DateAscending,
            payment_status: PaymentStatusFilter::default(),
        };
        let req = api().build_movements(&session(), &key(), &query).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert_eq!(req.query_param("offset"), Some("101"));
        assert_eq!(req.query_param("limite"), Some("50"));
        assert_eq!(req.query_param("intervallo"), Some("ULTIMO_ANNO"));
        assert_eq!(req.query_param("ordinaPer"), Some("date-A"));
        assert_eq!(req.query_param("statoPagamento"), Some("0,1,3,4"));
        assert_eq!(req.header("x-ibm-client-id"), Some("cid"));
        assert_eq!(req.header("x-ibm-client-secret"), Some("csecret"));
        assert_eq!(req.header("X-UNIPOL-CANALE"), Some("WEB"));
        assert_eq!(
            req.header("Cookie"),
            Some("MRHSession=mrh; LastMRH_Session=last; isLogged=true")
        );
    }

    #[test]
    fn request_ids_are_fresh_per_request() {
        let api = api();
        let a = api.build_login("u", "p");
        let b = api.build_login("u", "p");
        assert_ne!(a.header("X-UNIPOL-REQUESTID"), b.header("X-UNIPOL-REQUESTID"));
    }

    #[test]
    fn build_movements_rejects_bad_pagination() {
        let api = api();
        let query = MovementQuery {
            offset: 0,
            ..MovementQuery::default()
        };
        assert!(matches!(
            api.build_movements(&session(), &key(), &query),
            Err(ApiError::InvalidQuery(_))
        ));
        let query = MovementQuery {
            limit: 0,
            ..MovementQuery::default()
        };
        assert!(matches!(
            api.build_movements(&session(), &key(), &query),
            Err(ApiError::InvalidQuery(_))
        ));
    }

    #[test]
    fn parse_movements_success_and_failures() {
        let api = api();
        let page = api
            .parse_movements(response(
                200,
                r#"{"dispositivi":[{"codice":"OBU1"}],"listaMovimenti":[{"saldo":1.5},{"saldo":2}]}"#,
            ))
            .unwrap();
        assert_eq!(page.devices.len(), 1);
        assert_eq!(page.movements.len(), 2);

        let err = api.parse_movements(response(500, "boom")).unwrap_err();
        match err {
            ApiError::Http { status, endpoint, body } => {
                assert_eq!(status, 500);
                assert!(endpoint.ends_with("/movimenti"));
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = api.parse_movements(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn build_report_wraps_movements() {
        let movements: Vec<Movement> = vec![
            serde_json::from_value(json!({"saldo": 1})).unwrap(),
            serde_json::from_value(json!({"saldo": 2})).unwrap(),
        ];
        let req = api()
            .build_report(&session(), &key(), "JOHN DOE", &movements)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        let Some(RequestBody::Json(body)) = req.body else {
            panic!("expected JSON body");
        };
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["intestatario"], "JOHN DOE");
        assert_eq!(body["listaMovimenti"].as_array().unwrap().len(), 2);
        assert_eq!(body["listaMovimenti"][1]["saldo"], 2);
    }

    #[test]
    fn parse_report_returns_bytes_verbatim() {
        let mut resp = response(200, "");
        resp.body = b"%PDF-1.4\n\x00\xff binary".to_vec();
        resp.headers = vec![("Content-Type".into(), "application/pdf".into())];
        assert_eq!(api().parse_report(resp).unwrap(), b"%PDF-1.4\n\x00\xff binary");
    }

    #[test]
    fn parse_report_treats_json_envelope_as_error() {
        let mut resp = response(200, r#"{"errore":"nessun movimento"}"#);
        resp.headers = vec![("content-type".into(), "application/json;charset=UTF-8".into())];
        let err = api().parse_report(resp).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 200, .. }));

        let err = api().parse_report(response(403, "forbidden")).unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn parse_environment_extracts_both_key_pairs() {
        let body = json!({
            "apiConnect": {
                "headers_ut_prv_mobility_service": {
                    "x-ibm-client-id": "mid", "x-ibm-client-secret": "msec"
                },
                "headers_us": {"x-ibm-client-id": "rid", "x-ibm-client-secret": "rsec"},
                "other": {}
            },
            "production": true
        });
        let keys = api()
            .parse_environment(response(200, &body.to_string()))
            .unwrap();
        assert_eq!(keys.movements.client_id, "mid");
        assert_eq!(keys.report.client_secret, "rsec");

        let err = api()
            .parse_environment(response(200, r#"{"apiConnect":{}}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
