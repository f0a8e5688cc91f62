use super::{CallContext, HttpRequester, RequestError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

const LOG_TARGET: &str = "   graphql";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a, V> {
    operation_name: &'a str,
    query: &'a str,
    variables: &'a V,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Sends GraphQL operations as JSON POST requests through an [`HttpRequester`].
#[derive(Debug, Clone)]
pub struct GraphQlRequester {
    http: HttpRequester,
    endpoint: Url,
}

impl GraphQlRequester {
    #[must_use]
    pub const fn new(http: HttpRequester, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run `query` and decode its `data` member into `T`.
    ///
    /// A non-empty `errors` array fails the call with [`RequestError::GraphQl`], even
    /// when partial data is present.
    pub async fn query<V, T>(&self, ctx: &CallContext, operation_name: &str, query: &str, variables: &V) -> Result<T, RequestError>
    where
        V: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = GraphQlRequest {
            operation_name,
            query,
            variables,
        };

        let request = self
            .http
            .client()
            .post(self.endpoint.clone())
            .json(&body)
            .build()
            .map_err(RequestError::Transport)?;

        log::trace!(target: LOG_TARGET, "sending operation {operation_name} to {}", self.endpoint);

        let response = self.http.execute(ctx, request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::from_status(status));
        }

        let bytes = ctx.run(response.bytes()).await?.map_err(RequestError::Transport)?;
        let decoded: GraphQlResponse<T> = serde_json::from_slice(&bytes).map_err(RequestError::Decode)?;

        if !decoded.errors.is_empty() {
            return Err(RequestError::GraphQl(decoded.errors.into_iter().map(|e| e.message).collect()));
        }

        decoded
            .data
            .ok_or_else(|| RequestError::GraphQl(vec![format!("operation {operation_name} returned no data")]))
    }
}
