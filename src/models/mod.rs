use chrono::{Datelike, DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Player (group) row from the `jugadors` table.
///
/// Rows in the hosted table may predate any validation, so every column but
/// the id is nullable. Columns this service does not know about are kept in
/// `extra` and returned unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id_grup: i64,
    pub numero_partida: Option<i64>,
    pub nom_grup: Option<String>,
    pub numero_claus: Option<i64>,
    pub guanyador: Option<i64>,
    pub data_partida: Option<String>,
    pub darrera_connexio: Option<String>,
    pub darrera_posicio_x: Option<f64>,
    pub darrera_posicio_y: Option<f64>,
    #[serde(flatten)]
    #[sqlx(skip)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of POST /jugadors.
///
/// Every optional column and its default lives here; nothing else in the
/// service fills in missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub numero_partida: i64,
    pub nom_grup: String,
    #[serde(default)]
    pub numero_claus: i64,
    #[serde(default)]
    pub guanyador: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_partida: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darrera_connexio: Option<String>,
    #[serde(default)]
    pub darrera_posicio_x: f64,
    #[serde(default)]
    pub darrera_posicio_y: f64,
}

impl NewPlayer {
    /// Check field ranges and normalise timestamps before the row is sent to the store
    pub fn validate(mut self) -> Result<Self, ApiError> {
        if self.numero_partida < 1 {
            return Err(ApiError::validation("numeroPartida ha de ser un enter positiu"));
        }
        if self.nom_grup.trim().is_empty() {
            return Err(ApiError::validation("nomGrup no pot ser buit"));
        }
        check_numero_claus(self.numero_claus)?;
        check_guanyador(self.guanyador)?;
        check_position("darreraPosicioX", self.darrera_posicio_x)?;
        check_position("darreraPosicioY", self.darrera_posicio_y)?;

        self.data_partida = self
            .data_partida
            .as_deref()
            .map(|raw| parse_timestamp_field("dataPartida", raw))
            .transpose()?;
        self.darrera_connexio = self
            .darrera_connexio
            .as_deref()
            .map(|raw| parse_timestamp_field("darreraConnexio", raw))
            .transpose()?;

        Ok(self)
    }
}

/// Body of PUT /jugadors/{idGrup}: any subset of the mutable columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_partida: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom_grup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_claus: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guanyador: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_partida: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darrera_connexio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darrera_posicio_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darrera_posicio_y: Option<f64>,
}

impl PlayerUpdate {
    pub fn is_empty(&self) -> bool {
        *self == PlayerUpdate::default()
    }

    pub fn validate(mut self) -> Result<Self, ApiError> {
        if self.is_empty() {
            return Err(ApiError::validation("no hi ha cap camp per actualitzar"));
        }
        if let Some(numero) = self.numero_partida {
            if numero < 1 {
                return Err(ApiError::validation("numeroPartida ha de ser un enter positiu"));
            }
        }
        if let Some(nom) = &self.nom_grup {
            if nom.trim().is_empty() {
                return Err(ApiError::validation("nomGrup no pot ser buit"));
            }
        }
        if let Some(claus) = self.numero_claus {
            check_numero_claus(claus)?;
        }
        if let Some(guanyador) = self.guanyador {
            check_guanyador(guanyador)?;
        }
        if let Some(x) = self.darrera_posicio_x {
            check_position("darreraPosicioX", x)?;
        }
        if let Some(y) = self.darrera_posicio_y {
            check_position("darreraPosicioY", y)?;
        }

        self.data_partida = self
            .data_partida
            .as_deref()
            .map(|raw| parse_timestamp_field("dataPartida", raw))
            .transpose()?;
        self.darrera_connexio = self
            .darrera_connexio
            .as_deref()
            .map(|raw| parse_timestamp_field("darreraConnexio", raw))
            .transpose()?;

        Ok(self)
    }
}

/// Body of DELETE /jugadors/antics
#[derive(Debug, Default, Deserialize)]
pub struct DeleteOldPlayers {
    #[serde(default)]
    pub data: Option<String>,
}

impl DeleteOldPlayers {
    /// Resolve the cutoff date. Returns the `YYYY-MM-DD` string to echo back
    /// and the instant (midnight UTC) before which records are deleted.
    pub fn cutoff(&self, today: NaiveDate) -> Result<(String, DateTime<Utc>), ApiError> {
        let date = match self.data.as_deref().map(str::trim) {
            None | Some("") => today,
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .filter(|date| has_four_digit_year(*date))
                .ok_or_else(|| {
                    ApiError::validation(format!(
                        "data ha de tenir el format YYYY-MM-DD, s'ha rebut '{raw}'"
                    ))
                })?,
        };

        let instant = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Ok((date.format("%Y-%m-%d").to_string(), instant))
    }
}

/// Format an instant the way timestamps are stored and compared
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse RFC 3339, a naive date-time (taken as UTC) or a bare date
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();

    let ts = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        naive.and_utc()
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.and_time(chrono::NaiveTime::MIN).and_utc()
    } else {
        return None;
    };

    // Stored timestamps are compared as text
    has_four_digit_year(ts.date_naive()).then(|| format_timestamp(ts))
}

fn has_four_digit_year(date: NaiveDate) -> bool {
    (0..=9999).contains(&date.year())
}

fn parse_timestamp_field(field: &str, raw: &str) -> Result<String, ApiError> {
    normalize_timestamp(raw)
        .ok_or_else(|| ApiError::validation(format!("{field} no és una data vàlida: '{raw}'")))
}

fn check_numero_claus(claus: i64) -> Result<(), ApiError> {
    if claus < 0 {
        return Err(ApiError::validation("numeroClaus no pot ser negatiu"));
    }
    Ok(())
}

fn check_guanyador(guanyador: i64) -> Result<(), ApiError> {
    if guanyador != 0 && guanyador != 1 {
        return Err(ApiError::validation("guanyador ha de ser 0 o 1"));
    }
    Ok(())
}

fn check_position(field: &str, value: f64) -> Result<(), ApiError> {
    if !value.is_finite() {
        return Err(ApiError::validation(format!("{field} ha de ser un nombre finit")));
    }
    Ok(())
}

/// Response for GET /
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Response for GET /novapartida
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResponse {
    pub codi_partida: i64,
}

/// Response for POST /jugadors
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCreatedResponse {
    pub message: String,
    pub id_grup: i64,
    pub numero_partida: i64,
    pub nom_grup: String,
}

/// Response for DELETE /jugadors/antics
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldPlayersDeletedResponse {
    pub message: String,
    pub data_limit: String,
    pub eliminats: u64,
}
