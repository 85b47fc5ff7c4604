//! Blocking client for the Unipol Move toll-movement API.
//!
//! # Overview
//! Logs in with username and password, pages through the contract's toll
//! movements, filters them by date on the client side, and asks the service
//! to render a selection as a PDF expense report.
//!
//! # Design
//! - `MovementsApi` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network, so every endpoint's headers and
//!   payloads are testable as plain data.
//! - `Transport` is the I/O seam; `UreqTransport` is the blocking default.
//! - `UnipolMoveClient` owns the session cookies and runs the call sequence.
//! - `Movement` keeps the service's raw JSON object and exposes typed
//!   accessors only for the fields the client relies on.
//! - No retries are performed. The service's rate limits are unknown, so
//!   backoff is left to the caller.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use api::MovementsApi;
pub use client::UnipolMoveClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use filter::{filter_movements_by_date, DateRange};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use session::SessionState;
pub use transport::{Transport, UreqTransport};
pub use types::{
    ApiKeys, GatewayKey, Interval, Movement, MovementPage, MovementQuery, OrderBy, PaymentStatus,
    PaymentStatusFilter, ReportRequest,
};
