//! Domain types for the Unipol Move API.
//!
//! # Design
//! The service's JSON is loosely typed and reverse-engineered, so `Movement`
//! keeps the raw object and only exposes typed accessors for the few fields
//! the client reads. Unknown fields pass through untouched in both
//! directions, which keeps the client working when the upstream schema
//! grows. Query vocabularies (`Interval`, `OrderBy`, `PaymentStatus`) are
//! closed enums with an escape hatch for tokens the service may add.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENTRY_DATE_FIELD: &str = "dataIngresso";
pub const EXIT_DATE_FIELD: &str = "dataUscita";
pub const AMOUNT_FIELD: &str = "saldo";
pub const ENTRY_POINT_FIELD: &str = "inizioTratta";
pub const EXIT_POINT_FIELD: &str = "fineTratta";

/// A single toll transaction as returned by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Movement(Map<String, Value>);

impl Movement {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Raw date string used for filtering: the entry date, or the exit date
    /// when the entry date is missing or blank.
    pub fn date_str(&self) -> Option<&str> {
        self.non_empty_str(ENTRY_DATE_FIELD)
            .or_else(|| self.non_empty_str(EXIT_DATE_FIELD))
    }

    /// Calendar date of the transaction, if the service sent a parseable one.
    pub fn entry_date(&self) -> Option<NaiveDate> {
        self.date_str().and_then(parse_movement_date)
    }

    /// Amount charged in euro. The service has sent both numbers and
    /// strings (with either decimal separator) for this field.
    pub fn charged_amount(&self) -> Option<f64> {
        match self.0.get(AMOUNT_FIELD)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', ".").parse().ok(),
            _ => None,
        }
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.non_empty_str(ENTRY_POINT_FIELD)
    }

    pub fn exit_point(&self) -> Option<&str> {
        self.non_empty_str(EXIT_POINT_FIELD)
    }

    fn non_empty_str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl From<Map<String, Value>> for Movement {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Parse the date formats seen in movement records: plain `YYYY-MM-DD`, or
/// ISO 8601 date-times with or without a UTC offset.
///
/// Only the calendar date as written is kept; the time and offset are
/// validated but never used to shift the date.
pub fn parse_movement_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let Some((date, time)) = raw.split_once('T') else {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    is_iso_time(time).then_some(date)
}

/// `HH[:MM[:SS[.fff]]]` optionally followed by `Z`, `±HH`, `±HHMM` or `±HH:MM`.
fn is_iso_time(time: &str) -> bool {
    let (clock, offset) = match time.find(['Z', 'z', '+', '-']) {
        Some(idx) => time.split_at(idx),
        None => (time, ""),
    };
    let clock_ok = ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .any(|fmt| NaiveTime::parse_from_str(clock, fmt).is_ok())
        || (clock.len() == 2 && clock.parse::<u8>().is_ok_and(|h| h < 24));
    clock_ok && is_iso_offset(offset)
}

fn is_iso_offset(offset: &str) -> bool {
    if offset.is_empty() || offset.eq_ignore_ascii_case("z") {
        return true;
    }
    let digits: String = offset[1..].chars().filter(|c| *c != ':').collect();
    let well_formed = match offset.len() - 1 {
        2 | 4 => !offset[1..].contains(':'),
        5 => offset.as_bytes()[3] == b':',
        _ => false,
    };
    well_formed
        && digits.chars().all(|c| c.is_ascii_digit())
        && digits[..2].parse::<u8>().is_ok_and(|h| h < 24)
        && digits.get(2..).map_or(true, |m| m.is_empty() || m.parse::<u8>().is_ok_and(|m| m < 60))
}

/// One page of the movements endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementPage {
    /// Toll devices (transponders) on the contract, passed through as-is.
    #[serde(rename = "dispositivi", default)]
    pub devices: Vec<Value>,
    #[serde(rename = "listaMovimenti", default)]
    pub movements: Vec<Movement>,
    /// Total number of movements matching the query, when the service
    /// reports it.
    #[serde(
        rename = "totaleMovimenti",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Time window token understood by the movements endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    LastYear,
    /// Any other token the service accepts, sent verbatim.
    Other(String),
}

impl Interval {
    pub fn as_token(&self) -> &str {
        match self {
            Interval::LastYear => "ULTIMO_ANNO",
            Interval::Other(token) => token,
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err("interval token must not be empty".to_string());
        }
        Ok(match token.to_ascii_uppercase().as_str() {
            "ULTIMO_ANNO" => Interval::LastYear,
            _ => Interval::Other(token.to_string()),
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Sort order for the movements endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    DateDescending,
    DateAscending,
}

impl OrderBy {
    pub fn as_token(&self) -> &'static str {
        match self {
            OrderBy::DateDescending => "date-D",
            OrderBy::DateAscending => "date-A",
        }
    }
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "date-D" => Ok(OrderBy::DateDescending),
            "date-A" => Ok(OrderBy::DateAscending),
            other => Err(format!("unknown order: {other} (expected date-D or date-A)")),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Payment status code of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// `DA_ADDEBITARE`: not yet charged.
    ToBeCharged,
    /// `ADDEBITATO`: charged.
    Charged,
    /// Codes whose meaning the service does not document (3 and 4 are in
    /// the web portal's default filter).
    Code(u8),
}

impl PaymentStatus {
    pub fn code(&self) -> u8 {
        match self {
            PaymentStatus::ToBeCharged => 0,
            PaymentStatus::Charged => 1,
            PaymentStatus::Code(c) => *c,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => PaymentStatus::ToBeCharged,
            1 => PaymentStatus::Charged,
            c => PaymentStatus::Code(c),
        }
    }
}

/// Set of payment statuses to include, sent comma separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentStatusFilter(Vec<PaymentStatus>);

impl PaymentStatusFilter {
    pub fn new(statuses: Vec<PaymentStatus>) -> Self {
        Self(statuses)
    }

    pub fn statuses(&self) -> &[PaymentStatus] {
        &self.0
    }

    pub fn as_token(&self) -> String {
        self.0
            .iter()
            .map(|s| s.code().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for PaymentStatusFilter {
    /// The filter the web portal uses: `0,1,3,4`.
    fn default() -> Self {
        Self(vec![
            PaymentStatus::ToBeCharged,
            PaymentStatus::Charged,
            PaymentStatus::Code(3),
            PaymentStatus::Code(4),
        ])
    }
}

impl FromStr for PaymentStatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let statuses = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u8>()
                    .map(PaymentStatus::from_code)
                    .map_err(|_| format!("invalid payment status code: {part}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if statuses.is_empty() {
            return Err("payment status filter must name at least one code".to_string());
        }
        Ok(Self(statuses))
    }
}

/// Parameters of a single movements page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementQuery {
    /// 1-based index of the first record.
    pub offset: u32,
    pub limit: u32,
    pub interval: Interval,
    pub order_by: OrderBy,
    pub payment_status: PaymentStatusFilter,
}

impl Default for MovementQuery {
    fn default() -> Self {
        Self {
            offset: 1,
            limit: 100,
            interval: Interval::default(),
            order_by: OrderBy::default(),
            payment_status: PaymentStatusFilter::default(),
        }
    }
}

/// API gateway credential pair sent as `x-ibm-client-id`/`x-ibm-client-secret`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayKey {
    #[serde(rename = "x-ibm-client-id")]
    pub client_id: String,
    #[serde(rename = "x-ibm-client-secret")]
    pub client_secret: String,
}

impl fmt::Debug for GatewayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayKey")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Gateway keys for the two API families the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeys {
    /// Keys for the mobility-service (movements) API.
    pub movements: GatewayKey,
    /// Keys for the post-sale (report) API.
    pub report: GatewayKey,
}

/// Shape of `/app/config/environment.json`, reduced to what the client needs.
#[derive(Debug, Deserialize)]
pub(crate) struct EnvironmentDocument {
    #[serde(rename = "apiConnect")]
    pub api_connect: ApiConnectSection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiConnectSection {
    pub headers_ut_prv_mobility_service: GatewayKey,
    pub headers_us: GatewayKey,
}

/// Body of the report request.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    /// Name printed as the report's holder.
    #[serde(rename = "intestatario")]
    pub recipient: String,
    #[serde(rename = "listaMovimenti")]
    pub movements: Vec<Map<String, Value>>,
}

impl ReportRequest {
    /// Copy `movements` in order, marking each as selected and numbering it
    /// the way the portal's report form does.
    pub fn new(recipient: &str, movements: &[Movement]) -> Self {
        let movements = movements
            .iter()
            .enumerate()
            .map(|(idx, movement)| {
                let mut fields = movement.fields().clone();
                fields.insert("checked".to_string(), Value::Bool(true));
                fields.insert("id".to_string(), Value::String(idx.to_string()));
                fields
            })
            .collect();
        Self {
            recipient: recipient.to_string(),
            movements,
        }
    }
}
