use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};

use super::{Store, StoreError, COUNTER_TABLE, PLAYERS_TABLE};
use crate::models::{format_timestamp, NewPlayer, PlayerRecord, PlayerUpdate};

/// Media type asking PostgREST for exactly one row as a bare object
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Hosted Supabase database, reached through its PostgREST endpoint
#[derive(Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct CounterRow {
    numero: i64,
}

/// Error body returned by PostgREST
#[derive(Deserialize)]
struct PostgrestError {
    message: Option<String>,
}

impl SupabaseStore {
    pub fn new(url: &str, service_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            service_key: service_key.into(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Send a write that returns the affected rows and count them
    async fn count_rows(&self, request: RequestBuilder) -> Result<u64, StoreError> {
        let response = request
            .header("Prefer", RETURN_REPRESENTATION)
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = decode(response).await?;
        Ok(rows.len() as u64)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<PostgrestError>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("la petició a la base de dades ha fallat")
                .to_string()
        });

    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Store for SupabaseStore {
    async fn read_counter(&self) -> Result<i64, StoreError> {
        let response = self
            .request(Method::GET, COUNTER_TABLE)
            .query(&[("select", "numero"), ("limit", "1")])
            .header(header::ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;

        let row: CounterRow = decode(response).await?;
        Ok(row.numero)
    }

    async fn compare_and_set_counter(&self, expected: i64, next: i64) -> Result<u64, StoreError> {
        let request = self
            .request(Method::PATCH, COUNTER_TABLE)
            .query(&[("numero", format!("eq.{expected}"))])
            .json(&serde_json::json!({ "numero": next }));

        self.count_rows(request).await
    }

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let response = self
            .request(Method::GET, PLAYERS_TABLE)
            .query(&[("select", "*")])
            .send()
            .await?;

        decode(response).await
    }

    async fn insert_player(&self, player: &NewPlayer) -> Result<PlayerRecord, StoreError> {
        let response = self
            .request(Method::POST, PLAYERS_TABLE)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[player])
            .send()
            .await?;

        let rows: Vec<PlayerRecord> = decode(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("la inserció no ha retornat cap fila".to_string()))
    }

    async fn update_player(&self, id_grup: i64, update: &PlayerUpdate) -> Result<u64, StoreError> {
        let request = self
            .request(Method::PATCH, PLAYERS_TABLE)
            .query(&[("idGrup", format!("eq.{id_grup}"))])
            .json(update);

        self.count_rows(request).await
    }

    async fn delete_players_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let request = self
            .request(Method::DELETE, PLAYERS_TABLE)
            .query(&[("dataPartida", format!("lt.{}", format_timestamp(cutoff)))]);

        self.count_rows(request).await
    }
}
