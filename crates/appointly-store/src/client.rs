//! Cloud Firestore REST client for the appointment collection.

use std::time::Duration;

use appointly_core::FirebaseConfig;
use tracing::instrument;

use crate::backend::AppointmentBackend;
use crate::document::{decode_document, encode_fields, ApiErrorBody, Document, RunQueryResponse};
use crate::error::{StoreError, StoreResult};
use crate::types::{Appointment, NewAppointment};

pub struct FirestoreClient {
    client: reqwest::Client,
    /// `{endpoint}/v1/projects/{project}/databases/{database}/documents`
    documents_url: String,
    collection: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

impl FirestoreClient {
    /// Build a client for the configured project.
    ///
    /// # Errors
    /// Returns `StoreError::Network` if the HTTP client cannot be constructed.
    pub fn from_config(config: &FirebaseConfig) -> StoreResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let documents_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&config.project_id),
            config.database_id,
        );

        tracing::debug!("Firestore documents root: {}", documents_url);

        Ok(Self {
            client: builder.build()?,
            documents_url,
            collection: config.collection.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.documents_url, urlencoding::encode(&self.collection))
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id))
    }

    /// Attach the API key and bearer token, when configured.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> StoreResult<T> {
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidDocument(format!("JSON parse error: {}", e)))
    }

    async fn check_status(&self, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);

        Err(match status.as_u16() {
            401 => StoreError::Unauthenticated,
            403 => StoreError::PermissionDenied(message),
            404 => StoreError::NotFound(message),
            429 => StoreError::RateLimited(retry_after.unwrap_or(60)),
            code => StoreError::Api {
                status: code,
                message,
            },
        })
    }
}

impl AppointmentBackend for FirestoreClient {
    /// Fetch the collection with a single `runQuery` call.
    #[instrument(skip(self), fields(collection = %self.collection), level = "info")]
    async fn list_all(&self) -> StoreResult<Vec<Appointment>> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = serde_json::json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }]
            }
        });

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let rows: Vec<RunQueryResponse> = self.handle_response(response).await?;

        let appointments = rows
            .into_iter()
            .filter_map(|row| row.document)
            .map(decode_document)
            .collect::<StoreResult<Vec<_>>>()?;

        tracing::debug!("Fetched {} appointments", appointments.len());
        Ok(appointments)
    }

    #[instrument(skip(self, appointment), level = "info")]
    async fn create(&self, appointment: &NewAppointment) -> StoreResult<String> {
        let document = Document {
            fields: encode_fields(
                appointment.start_date,
                appointment.end_date,
                &appointment.fields,
            ),
            ..Document::default()
        };

        let response = self
            .authorize(self.client.post(self.collection_url()))
            .json(&document)
            .send()
            .await?;

        let created: Document = self.handle_response(response).await?;
        let id = created
            .id()
            .ok_or_else(|| StoreError::InvalidDocument("created document has no name".into()))?
            .to_string();

        tracing::info!("Created appointment {}", id);
        Ok(id)
    }

    #[instrument(skip(self, appointment), fields(id = %appointment.id), level = "info")]
    async fn replace(&self, appointment: &Appointment) -> StoreResult<()> {
        let document = Document {
            fields: encode_fields(
                appointment.start_date,
                appointment.end_date,
                &appointment.fields,
            ),
            ..Document::default()
        };

        // Without an update mask PATCH replaces the whole document; the
        // precondition stops it from resurrecting a deleted one.
        let response = self
            .authorize(self.client.patch(self.document_url(&appointment.id)))
            .query(&[("currentDocument.exists", "true")])
            .json(&document)
            .send()
            .await?;

        let _: Document = self.handle_response(response).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "info")]
    async fn delete(&self, id: &str) -> StoreResult<()> {
        let response = self
            .authorize(self.client.delete(self.document_url(id)))
            .send()
            .await?;

        self.check_status(response).await?;
        Ok(())
    }
}
