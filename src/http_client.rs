//! The Transactions API over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    AppConfig, Error,
    api::{
        BulkUpdateRequest, BulkUpdateResponse, CategoryUpdate, LabelUpdate, TagUpdate,
        TransactionPageQuery, TransactionsApi, TransactionsResponse,
    },
    change_log::{LogCount, NewLogEntry, TransactionLog},
    database_id::{TagId, TransactionId},
    logging::{log_request, log_response},
    transaction::{Tag, TransactionType},
};

/// Talks to the Transactions API with `reqwest`.
///
/// Every request carries the bearer token, if one is configured, and gives
/// up after the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpTransactionsApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

/// The error body the backend sends with a non-success status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// The query params for `GET /tags`. Unlike `GET /transactions`, the tags
/// endpoint expects the type in lower case.
#[derive(Serialize)]
struct TagQuery {
    #[serde(rename = "type")]
    tag_type: &'static str,
}

impl TagQuery {
    fn new(tag_type: TransactionType) -> Self {
        let tag_type = match tag_type {
            TransactionType::Business => "business",
            TransactionType::Personal => "personal",
        };
        Self { tag_type }
    }
}

impl HttpTransactionsApi {
    /// Create a client for the API at `config.api_url`.
    ///
    /// # Errors
    /// Returns [Error::InvalidApiUrl] if the URL cannot be parsed, or
    /// [Error::Network] if the HTTP client cannot be created.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        // A trailing slash makes `Url::join` append to the path instead of
        // replacing its last segment.
        let base_url = format!("{}/", config.api_url.trim_end_matches('/'));
        let base_url = Url::parse(&base_url)
            .map_err(|_| Error::InvalidApiUrl(config.api_url.clone()))
            .inspect_err(|error| tracing::error!("{error}"))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| Error::Network(error.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, Error> {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| Error::InvalidApiUrl(format!("{}{path}", self.base_url)))?;

        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    fn with_json<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<RequestBuilder, Error> {
        let text = serde_json::to_string(body)?;
        log_request(method.as_str(), path, &text);

        Ok(self.request(method, path)?.json(body))
    }

    /// Send `builder` and return the body of a successful response.
    async fn send(builder: RequestBuilder) -> Result<String, Error> {
        let response = builder.send().await.map_err(|error| {
            tracing::error!("request to the Transactions API failed: {error}");
            Error::Network(error.to_string())
        })?;

        let status = response.status();
        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|error| Error::Network(error.to_string()))?;
        log_response(status.as_u16(), &url, &body);

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_owned()
            });
            tracing::error!("{url} returned {status}: {message}");

            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn send_for<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, Error> {
        let body = Self::send(builder).await?;

        serde_json::from_str(&body).map_err(|error| {
            tracing::error!("could not parse response body: {error}");
            Error::InvalidResponse(error.to_string())
        })
    }
}

fn error_message(body: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(body).ok()?;
    body.error
        .or(body.message)
        .filter(|message| !message.trim().is_empty())
}

#[async_trait]
impl TransactionsApi for HttpTransactionsApi {
    async fn fetch_transactions(
        &self,
        query: &TransactionPageQuery,
    ) -> Result<TransactionsResponse, Error> {
        log_request("GET", "transactions", "");
        let builder = self.request(Method::GET, "transactions")?.query(query);

        Self::send_for(builder).await
    }

    async fn bulk_update(&self, request: &BulkUpdateRequest) -> Result<BulkUpdateResponse, Error> {
        let builder = self.with_json(Method::POST, "transactions/bulk-update", request)?;

        Self::send_for(builder).await
    }

    async fn update_transaction_category(
        &self,
        id: TransactionId,
        update: &CategoryUpdate,
    ) -> Result<(), Error> {
        let builder = self.with_json(Method::PUT, &format!("transactions/{id}/category"), update)?;

        Self::send(builder).await.map(|_| ())
    }

    async fn update_label(&self, id: TransactionId, update: &LabelUpdate) -> Result<(), Error> {
        let builder = self.with_json(Method::PUT, &format!("transactionlabel/{id}"), update)?;

        Self::send(builder).await.map(|_| ())
    }

    async fn update_transaction_tag(&self, id: TransactionId, tag_id: TagId) -> Result<(), Error> {
        let builder = self.with_json(
            Method::PUT,
            &format!("transactions/{id}/tag"),
            &TagUpdate { tag_id },
        )?;

        Self::send(builder).await.map(|_| ())
    }

    async fn fetch_tags(&self, tag_type: Option<TransactionType>) -> Result<Vec<Tag>, Error> {
        log_request("GET", "tags", "");
        let mut builder = self.request(Method::GET, "tags")?;
        if let Some(tag_type) = tag_type {
            builder = builder.query(&TagQuery::new(tag_type));
        }

        Self::send_for(builder).await
    }

    async fn add_log(&self, entry: &NewLogEntry) -> Result<(), Error> {
        let builder = self.with_json(Method::POST, "translog", entry)?;

        Self::send(builder).await.map(|_| ())
    }

    async fn fetch_logs(&self, id: TransactionId) -> Result<Vec<TransactionLog>, Error> {
        let path = format!("translog/{id}");
        log_request("GET", &path, "");

        Self::send_for(self.request(Method::GET, &path)?).await
    }

    async fn log_count(&self, id: TransactionId) -> Result<u64, Error> {
        let path = format!("translog/count/{id}");
        log_request("GET", &path, "");
        let body: LogCount = Self::send_for(self.request(Method::GET, &path)?).await?;

        Ok(body.count)
    }
}
