//! Blocking, stateful client for the Unipol Move service.
//!
//! # Design
//! `UnipolMoveClient` owns the session cookies and the cached gateway keys,
//! and drives `MovementsApi` through a `Transport`. Every method that needs
//! a session checks for it before building a request, so an unauthenticated
//! call fails without touching the network. Mutating calls take `&mut self`;
//! sharing one client across threads requires external locking.

use std::num::NonZeroU32;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::api::MovementsApi;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::filter::{filter_movements_by_date, DateRange};
use crate::http::{HttpRequest, HttpResponse};
use crate::session::SessionState;
use crate::transport::{Transport, UreqTransport};
use crate::types::{ApiKeys, Interval, Movement, MovementPage, MovementQuery};

pub struct UnipolMoveClient<T: Transport = UreqTransport> {
    api: MovementsApi,
    transport: T,
    session: Option<SessionState>,
    api_keys: Option<ApiKeys>,
    max_pages: NonZeroU32,
}

impl UnipolMoveClient<UreqTransport> {
    /// Client using the blocking `ureq` transport with the configured timeout.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> UnipolMoveClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            api: MovementsApi::new(&config),
            transport,
            session: config.session,
            api_keys: config.api_keys,
            max_pages: config.max_pages,
        }
    }

    pub fn api(&self) -> &MovementsApi {
        &self.api
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Log in and store the session cookies.
    ///
    /// Returns `Ok(false)` when the service rejects the credentials or does
    /// not issue both cookies; the previous session, if any, is kept.
    /// Transport failures are still errors.
    pub fn login(&mut self, username: &str, password: &str) -> Result<bool, ApiError> {
        match self.authenticate(username, password) {
            Ok(()) => Ok(true),
            Err(ApiError::Authentication { status, reason }) => {
                warn!(?status, %reason, "login rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`login`](Self::login) but reports a rejected login as
    /// `ApiError::Authentication`.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<(), ApiError> {
        let request = self.api.build_login(username, password);
        let response = self.send(request)?;
        let session = self.api.parse_login(response)?;
        info!("login succeeded");
        self.session = Some(session);
        Ok(())
    }

    /// Fetch a single page of movements.
    pub fn fetch_movements(&mut self, query: &MovementQuery) -> Result<MovementPage, ApiError> {
        let session = self.session.clone().ok_or(ApiError::NotAuthenticated)?;
        let keys = self.api_keys()?;
        let request = self.api.build_movements(&session, &keys.movements, query)?;
        let response = self.send(request)?;
        let page = self.api.parse_movements(response)?;
        debug!(
            offset = query.offset,
            limit = query.limit,
            received = page.movements.len(),
            "fetched movements page"
        );
        Ok(page)
    }

    /// Fetch every movement in `interval`, `batch_size` records per request.
    ///
    /// Stops at the first empty or short page, or once the service's
    /// reported total is reached. Any page error aborts the whole call and
    /// discards what was fetched so far.
    ///
    /// The configured page cap counts full pages: after `max_pages` of them
    /// one more request is made, and it must come back short or empty.
    pub fn fetch_all_movements(
        &mut self,
        batch_size: u32,
        interval: Interval,
    ) -> Result<Vec<Movement>, ApiError> {
        if batch_size == 0 {
            return Err(ApiError::InvalidQuery("batch size must be positive".to_string()));
        }
        let mut all = Vec::new();
        let mut query = MovementQuery {
            offset: 1,
            limit: batch_size,
            interval,
            ..MovementQuery::default()
        };
        let mut pages = 0u32;

        loop {
            let page = self.fetch_movements(&query)?;
            pages += 1;

            let received = page.movements.len();
            all.extend(page.movements);

            if received < batch_size as usize {
                break;
            }
            if page.total.is_some_and(|total| all.len() as u64 >= total) {
                break;
            }
            if pages > self.max_pages.get() {
                return Err(ApiError::PaginationOverrun {
                    pages: self.max_pages.get(),
                });
            }
            query.offset = query.offset.checked_add(batch_size).ok_or_else(|| {
                ApiError::InvalidQuery("offset overflowed while paginating".to_string())
            })?;
        }

        info!(pages, movements = all.len(), "fetched all movements");
        Ok(all)
    }

    /// See [`filter_movements_by_date`].
    pub fn filter_movements_by_date(&self, movements: &[Movement], range: DateRange) -> Vec<Movement> {
        filter_movements_by_date(movements, range)
    }

    /// Ask the service to render `movements` as a PDF expense report.
    ///
    /// When `output_path` is given the bytes are also written there. A failed
    /// write returns `ApiError::LocalIo`, which still carries the PDF.
    pub fn generate_pdf_report(
        &mut self,
        movements: &[Movement],
        recipient: &str,
        output_path: Option<&Path>,
    ) -> Result<Vec<u8>, ApiError> {
        let session = self.session.clone().ok_or(ApiError::NotAuthenticated)?;
        let keys = self.api_keys()?;
        let request = self
            .api
            .build_report(&session, &keys.report, recipient, movements)?;
        let response = self.send(request)?;
        let pdf = self.api.parse_report(response)?;
        info!(movements = movements.len(), bytes = pdf.len(), "report generated");

        if let Some(path) = output_path {
            if let Err(source) = std::fs::write(path, &pdf) {
                warn!(path = %path.display(), error = %source, "could not save report");
                return Err(ApiError::LocalIo {
                    path: path.to_path_buf(),
                    source,
                    pdf,
                });
            }
            debug!(path = %path.display(), "report saved");
        }
        Ok(pdf)
    }

    /// Gateway keys, fetched from the environment document on first use.
    fn api_keys(&mut self) -> Result<ApiKeys, ApiError> {
        if let Some(keys) = &self.api_keys {
            return Ok(keys.clone());
        }
        let request = self.api.build_environment();
        let response = self.send(request)?;
        let keys = self.api.parse_environment(response)?;
        debug!(
            movements_client = %keys.movements.client_id,
            report_client = %keys.report.client_id,
            "loaded gateway keys"
        );
        self.api_keys = Some(keys.clone());
        Ok(keys)
    }

    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = ?request.method, url = %request.url, "sending request");
        self.transport.execute(request)
    }
}
