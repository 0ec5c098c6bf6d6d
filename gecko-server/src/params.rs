//! Coercion of request values: path segments, query strings and form fields.
//!
//! Text is trimmed and inner whitespace collapsed before conversion. An empty
//! value is [`GeckoError::MissingData`]; anything unparsable is
//! [`GeckoError::InvalidData`].

use crate::access_log::AppError;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use chrono::NaiveDate;
use gecko_core::GeckoError;
use std::collections::HashMap;
use std::str::FromStr;

/// Trim and collapse runs of whitespace (tabs, newlines) into one space.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

/// `true` only for `on`, `true` or `1`, in any case.
pub fn to_bool(text: &str) -> bool {
    matches!(compact(text).to_lowercase().as_str(), "on" | "true" | "1")
}

fn parse<T: FromStr>(text: &str, what: &str) -> Result<T, GeckoError> {
    let text = compact(text);
    if text.is_empty() {
        return Err(GeckoError::MissingData(what.into()));
    }
    text.parse()
        .map_err(|_| GeckoError::InvalidData(format!("'{text}' is not a valid {what}")))
}

pub fn to_int(text: &str) -> Result<i64, GeckoError> {
    parse(text, "integer")
}

pub fn to_u64(text: &str) -> Result<u64, GeckoError> {
    parse(text, "positive integer")
}

/// Money amount in cents: `"$1,200.5"` is `120050`.
pub fn to_cents(text: &str) -> Result<i64, GeckoError> {
    let amount = compact(text).replace(',', "");
    let amount = amount.trim_start_matches('$');
    if amount.is_empty() {
        return Err(GeckoError::MissingData("amount".into()));
    }
    let (units, cents) = amount.split_once('.').unwrap_or((amount, ""));
    if cents.contains('.') {
        return Err(GeckoError::InvalidData(format!("more than one decimal point in '{amount}'")));
    }
    let digits = match cents.len() {
        0 => format!("{units}00"),
        1 => format!("{units}{cents}0"),
        2 => format!("{units}{cents}"),
        _ => {
            return Err(GeckoError::InvalidData(format!(
                "only two decimals allowed for cents: '{cents}'"
            )));
        }
    };
    digits
        .parse()
        .map_err(|_| GeckoError::InvalidData(format!("'{amount}' is not a valid amount")))
}

const DATE_HINT: &str = "use 25/12/2024 or 2024-12-25 for dates";

/// Calendar date from `2024-12-25`, `2024/12/25`, `25-12-2024` or `25/12/2024`.
pub fn to_date(text: &str) -> Result<NaiveDate, GeckoError> {
    let text = compact(text).replace('/', "-");
    if text.is_empty() {
        return Err(GeckoError::MissingData("date".into()));
    }
    if text.len() != 10 || !text.is_ascii() {
        return Err(GeckoError::InvalidData(DATE_HINT.into()));
    }
    let iso = if &text[2..3] == "-" {
        format!("{}-{}-{}", &text[6..], &text[3..5], &text[..2])
    } else {
        text
    };
    NaiveDate::parse_from_str(&iso, "%Y-%m-%d")
        .map_err(|_| GeckoError::InvalidData(DATE_HINT.into()))
}

/// Named request values with the coercions above. Extracted from the query
/// string; wrap a `Form<HashMap<String, String>>` with `Params::from` for
/// form bodies.
#[derive(Debug, Clone, Default)]
pub struct Params(HashMap<String, String>);

impl From<HashMap<String, String>> for Params {
    fn from(values: HashMap<String, String>) -> Self {
        Params(values)
    }
}

impl Params {
    /// Value exactly as received, `""` when absent.
    pub fn raw(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn text(&self, name: &str) -> String {
        clean(self.raw(name))
    }

    pub fn text_or(&self, name: &str, default: &str) -> String {
        match self.text(name) {
            text if text.is_empty() => default.to_string(),
            text => text,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        to_bool(self.raw(name))
    }

    pub fn int(&self, name: &str) -> Result<i64, GeckoError> {
        to_int(self.raw(name)).map_err(|e| named(name, e))
    }

    pub fn u64(&self, name: &str) -> Result<u64, GeckoError> {
        to_u64(self.raw(name)).map_err(|e| named(name, e))
    }

    pub fn cents(&self, name: &str) -> Result<i64, GeckoError> {
        to_cents(self.raw(name)).map_err(|e| named(name, e))
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate, GeckoError> {
        to_date(self.raw(name)).map_err(|e| named(name, e))
    }
}

fn named(name: &str, err: GeckoError) -> GeckoError {
    match err {
        GeckoError::MissingData(_) => GeckoError::MissingData(name.into()),
        GeckoError::InvalidData(msg) => GeckoError::InvalidData(format!("{name}: {msg}")),
        other => other,
    }
}

impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(values) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError(GeckoError::InvalidData(e.body_text())))?;
        Ok(Params(values))
    }
}
