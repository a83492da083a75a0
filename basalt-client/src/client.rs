//! The client: a request pipeline of cache, concurrency limiting, retry,
//! and HTTP transport, plus the query/CRUD/batch surface built on it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheMiddleware, CacheStore, CacheableRequest, MemoryCacheStore};
use crate::config::ClientConfig;
use crate::constants::{
    FIELD_CREATED_AT, FIELD_OBJECT_ID, FIELD_UPDATED_AT, HEADER_API_KEY, HEADER_APPLICATION_ID,
    HEADER_MASTER_KEY, HEADER_SESSION_TOKEN, ITERATION_PAGE_SIZE,
};
use crate::error::{Error, Result};
use crate::object::{Record, decode_date};
use crate::operations::{BatchOutcome, BatchRequest, Operation, batch};
use crate::query::{
    CachePolicy, CompileContext, Constraint, Limit, Operator, Order, Query, QueryBuilder,
};
use crate::resilience::{ConcurrencyLimiter, RetryPolicy};

/// An async client for one application on one server.
///
/// Cloning is cheap-ish but unnecessary: the client is `Send + Sync` and
/// designed to be shared behind an `Arc`.
pub struct Client {
    config: ClientConfig,
    ctx: CompileContext,
    http: reqwest::Client,
    cache: CacheMiddleware,
    retry: RetryPolicy,
    limiter: ConcurrencyLimiter,
}

/// Everything one outbound request needs from its caller.
struct RequestSpec<'a> {
    method: Method,
    /// Server-relative path, mount point included.
    path: String,
    params: Vec<(String, String)>,
    body: Option<Value>,
    session_token: Option<&'a str>,
    use_master_key: bool,
    cache: CachePolicy,
    collection: Option<&'a str>,
}

impl<'a> RequestSpec<'a> {
    fn get(path: String) -> Self {
        Self {
            method: Method::GET,
            path,
            params: Vec::new(),
            body: None,
            session_token: None,
            use_master_key: false,
            cache: CachePolicy::Disabled,
            collection: None,
        }
    }

    fn write(method: Method, path: String, body: Option<Value>) -> Self {
        Self {
            method,
            path,
            params: Vec::new(),
            body,
            session_token: None,
            use_master_key: false,
            cache: CachePolicy::Disabled,
            collection: None,
        }
    }
}

impl Client {
    /// Build a client with the default in-process cache store.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_cache_store(config, Arc::new(MemoryCacheStore::new()))
    }

    /// Build a client over an injected cache store, memory-local or shared.
    pub fn with_cache_store(config: ClientConfig, store: Arc<dyn CacheStore>) -> Result<Self> {
        if config.server_url.is_empty() {
            return Err(Error::InvalidQuery("server_url is empty".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(Error::from_transport)?;
        let cache = CacheMiddleware::new(store, config.cache_ttl);
        let retry = RetryPolicy::new(config.retry.clone());
        let limiter = ConcurrencyLimiter::new(config.concurrency.clone());
        let ctx = config.compile_context();

        Ok(Self {
            config,
            ctx,
            http,
            cache,
            retry,
            limiter,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a fluent query against a collection.
    pub fn query(&self, collection: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(collection)
    }

    /// A fresh record carrying the class's configured default ACL.
    pub fn new_record(&self, class_name: impl Into<String>) -> Record {
        let class_name = class_name.into();
        let default_acl = self.config.default_acl(&class_name);
        Record::with_default_acl(class_name, default_acl)
    }

    // ---- query execution ----------------------------------------------

    /// Run a query and decode its result page.
    pub async fn find(&self, query: &Query) -> Result<Vec<Record>> {
        let collection = query.collection().to_string();
        let mut spec = RequestSpec::get(self.class_path(&collection));
        spec.params = query.compile(&self.ctx)?;
        spec.session_token = query.session_token();
        spec.use_master_key = query.use_master_key();
        spec.cache = query.cache();
        spec.collection = Some(&collection);

        let (_, body) = self.execute(spec).await?;
        self.decode_results(&collection, &body)
    }

    /// Run a query limited to one result.
    pub async fn first(&self, mut query: Query) -> Result<Option<Record>> {
        query.set_limit(Limit::Exact(1));
        Ok(self.find(&query).await?.into_iter().next())
    }

    /// Count matching records without fetching them.
    pub async fn count(&self, mut query: Query) -> Result<u64> {
        query.set_count();
        let collection = query.collection().to_string();
        let mut spec = RequestSpec::get(self.class_path(&collection));
        spec.params = query.compile(&self.ctx)?;
        spec.session_token = query.session_token();
        spec.use_master_key = query.use_master_key();
        spec.cache = query.cache();
        spec.collection = Some(&collection);

        let (_, body) = self.execute(spec).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Transport("count response carries no count".into()))
    }

    /// Visit every record matching a query, paging on the server-managed
    /// creation timestamp.
    ///
    /// Because the timestamps are the iteration cursor, queries filtering on
    /// `createdAt`/`updatedAt` (either spelling) are rejected up front.
    pub async fn for_each<F>(&self, query: Query, mut visit: F) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()>,
    {
        if query.touches_cursor_fields(&self.ctx) {
            return Err(Error::InvalidQuery(
                "createdAt/updatedAt filters are reserved for the iteration cursor".into(),
            ));
        }

        let mut base = query;
        base.clear_order();
        base.add_order(Order::ascending(FIELD_CREATED_AT));
        base.add_order(Order::ascending(FIELD_OBJECT_ID));
        base.set_limit(Limit::Exact(ITERATION_PAGE_SIZE));
        base.set_cache(CachePolicy::Disabled);

        let mut visited: u64 = 0;
        let mut cursor: Option<chrono::DateTime<chrono::Utc>> = None;
        // Records already emitted at the cursor timestamp, to absorb the
        // page-boundary overlap of the gte cursor constraint.
        let mut boundary_ids: HashSet<String> = HashSet::new();

        loop {
            let mut page = base.clone();
            if let Some(ts) = cursor {
                page.add_constraint(Constraint::new(
                    FIELD_CREATED_AT,
                    Operator::GreaterThanOrEqual,
                    ts,
                ));
            }

            let records = self.find(&page).await?;
            let fetched = records.len();
            let mut emitted = 0u64;

            for record in records {
                let created = record.created_at();
                let id = record.object_id().map(str::to_string);

                if created == cursor {
                    if let Some(id) = &id {
                        if boundary_ids.contains(id) {
                            continue;
                        }
                    }
                }

                if created > cursor {
                    cursor = created;
                    boundary_ids.clear();
                }
                if let Some(id) = id {
                    boundary_ids.insert(id);
                }

                visit(record)?;
                visited += 1;
                emitted += 1;
            }

            if (fetched as u64) < ITERATION_PAGE_SIZE || emitted == 0 {
                break;
            }
        }

        Ok(visited)
    }

    // ---- record CRUD --------------------------------------------------

    /// Fetch one record by id.
    pub async fn fetch(&self, collection: &str, id: &str) -> Result<Record> {
        let mut spec = RequestSpec::get(format!("{}/{id}", self.class_path(collection)));
        spec.cache = CachePolicy::Default;
        spec.collection = Some(collection);

        let (_, body) = self.execute(spec).await?;
        Record::from_server(collection, &body, self.config.default_acl(collection))
    }

    /// Persist a record: create when new, otherwise update dirty fields.
    pub async fn save(&self, record: &mut Record) -> Result<()> {
        if record.is_new() {
            self.create(record).await
        } else {
            self.update(record).await
        }
    }

    async fn create(&self, record: &mut Record) -> Result<()> {
        let collection = record.class_name().to_string();
        let mut spec = RequestSpec::write(
            Method::POST,
            self.class_path(&collection),
            Some(record.create_payload()),
        );
        spec.collection = Some(&collection);

        let (_, body) = self.execute(spec).await?;
        record.mark_saved(
            body.get(FIELD_OBJECT_ID)
                .and_then(Value::as_str)
                .map(String::from),
            body.get(FIELD_CREATED_AT).and_then(decode_date),
            None,
        );
        Ok(())
    }

    async fn update(&self, record: &mut Record) -> Result<()> {
        if !record.is_dirty() {
            return Ok(());
        }
        let pointer = record.pointer()?;
        let mut spec = RequestSpec::write(
            Method::PUT,
            format!("{}/{}", self.class_path(&pointer.class_name), pointer.object_id),
            Some(record.update_payload()),
        );
        spec.collection = Some(&pointer.class_name);

        let (_, body) = self.execute(spec).await?;
        record.mark_saved(None, None, body.get(FIELD_UPDATED_AT).and_then(decode_date));
        Ok(())
    }

    /// Delete a persisted record on the server.
    pub async fn delete(&self, record: &Record) -> Result<()> {
        let pointer = record.pointer()?;
        let mut spec = RequestSpec::write(
            Method::DELETE,
            format!("{}/{}", self.class_path(&pointer.class_name), pointer.object_id),
            None,
        );
        spec.collection = Some(&pointer.class_name);

        self.execute(spec).await?;
        Ok(())
    }

    // ---- batch --------------------------------------------------------

    /// Execute writes in chunked, concurrent batch requests. Outcomes come
    /// back in input order; see [`crate::operations::batch`].
    pub async fn execute_batch(&self, operations: Vec<Operation>) -> Result<Vec<BatchOutcome>> {
        self.execute_batch_with(operations, None).await
    }

    /// Batch execution with a deadline shared by every chunk and all of
    /// their retries.
    pub async fn execute_batch_with(
        &self,
        operations: Vec<Operation>,
        deadline: Option<Duration>,
    ) -> Result<Vec<BatchOutcome>> {
        // Server state is about to change; drop cached reads up front.
        let collections: HashSet<String> = operations
            .iter()
            .map(|op| op.collection().to_string())
            .collect();
        for collection in &collections {
            self.cache.invalidate_collection(collection).await;
        }

        let request = BatchRequest::new(operations);
        let url = self.build_url(&format!("{}/batch", self.mount()), &[]);

        let outcomes = batch::execute(
            &request,
            &self.config.mount_path,
            self.config.caps.max_batch_size,
            &self.limiter,
            &self.retry,
            deadline,
            |index, body| {
                let url = url.clone();
                async move {
                    debug!("sending batch chunk {index}");
                    let (_, _, text) = self
                        .send_once(Method::POST, &url, Some(&body), None, false)
                        .await?;
                    Ok(serde_json::from_str(&text)?)
                }
            },
        )
        .await;
        Ok(outcomes)
    }

    // ---- request pipeline ---------------------------------------------

    async fn execute(&self, spec: RequestSpec<'_>) -> Result<(u16, Value)> {
        if spec.use_master_key && self.config.master_key.is_none() {
            return Err(Error::InvalidQuery(
                "master key requested but not configured".into(),
            ));
        }

        let url = self.build_url(&spec.path, &spec.params);
        let body_bytes = match &spec.body {
            Some(body) => Some(serde_json::to_vec(body)?),
            None => None,
        };
        let cacheable = CacheableRequest {
            method: spec.method.as_str(),
            url: &url,
            body: body_bytes.as_deref(),
            collection: spec.collection,
            policy: spec.cache,
        };

        if let Some(hit) = self.cache.before(&cacheable).await {
            return Ok((hit.status, serde_json::from_str(&hit.body)?));
        }

        let correlation_id = Uuid::new_v4();
        let label = format!("{} {} [{correlation_id}]", spec.method, spec.path);
        let _permit = self.limiter.acquire().await;

        let (status, headers, text) = self
            .retry
            .execute(&label, None, || {
                self.send_once(
                    spec.method.clone(),
                    &url,
                    spec.body.as_ref(),
                    spec.session_token,
                    spec.use_master_key,
                )
            })
            .await?;

        self.cache.after(&cacheable, status, &headers, &text).await;

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, body))
    }

    /// One transport attempt: send, read, classify.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        session_token: Option<&str>,
        use_master_key: bool,
    ) -> Result<(u16, Vec<(String, String)>, String)> {
        let mut request = self
            .http
            .request(method, url)
            .header(HEADER_APPLICATION_ID, &self.config.application_id);

        if use_master_key {
            if let Some(master_key) = &self.config.master_key {
                request = request.header(HEADER_MASTER_KEY, master_key);
            }
        } else if let Some(api_key) = &self.config.api_key {
            request = request.header(HEADER_API_KEY, api_key);
        }
        if let Some(token) = session_token {
            request = request.header(HEADER_SESSION_TOKEN, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Error::from_transport)?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| name.as_str() == "content-type")
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(Error::from_transport)?;

        classify_status(status, &text)?;
        Ok((status, headers, text))
    }

    fn decode_results(&self, collection: &str, body: &Value) -> Result<Vec<Record>> {
        let default_acl = self.config.default_acl(collection);
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Transport("query response carries no results".into()))?;
        results
            .iter()
            .map(|item| Record::from_server(collection, item, default_acl))
            .collect()
    }

    fn mount(&self) -> String {
        let trimmed = self.config.mount_path.trim_end_matches('/');
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    fn class_path(&self, collection: &str) -> String {
        format!("{}/classes/{collection}", self.mount())
    }

    fn build_url(&self, path: &str, params: &[(String, String)]) -> String {
        let base = self.config.server_url.trim_end_matches('/');
        if params.is_empty() {
            return format!("{base}{path}");
        }
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{base}{path}?{query}")
    }
}

/// Map a response status onto the error taxonomy. Authorization failures
/// surface immediately; rate limiting and unavailability become transient
/// errors the retry policy may act on.
fn classify_status(status: u16, body: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(Error::Unauthorized {
            status,
            message: server_error_message(body),
        }),
        429 => Err(Error::rate_limited(format!(
            "rate limited: {}",
            server_error_message(body)
        ))),
        503 => Err(Error::service_unavailable(format!(
            "service unavailable: {}",
            server_error_message(body)
        ))),
        _ => {
            let (code, message) = server_error(body, status);
            Err(Error::Api { code, message })
        }
    }
}

fn server_error(body: &str, status: u16) -> (i64, String) {
    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => {
            let code = parsed
                .get("code")
                .and_then(Value::as_i64)
                .unwrap_or(i64::from(status));
            let message = parsed
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown server error")
                .to_string();
            (code, message)
        }
        Err(_) => (i64::from(status), body.trim().to_string()),
    }
}

fn server_error_message(body: &str) -> String {
    server_error(body, 0).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientKind;
    use serde_json::json;

    fn client() -> Client {
        let config = ClientConfig::builder("https://api.example.com/", "app-id")
            .api_key("rest-key")
            .build();
        Client::new(config).unwrap()
    }

    #[test]
    fn test_class_path_carries_mount() {
        let client = client();
        assert_eq!(client.class_path("Song"), "/1/classes/Song");
    }

    #[test]
    fn test_build_url_encodes_params() {
        let client = client();
        let url = client.build_url(
            "/1/classes/Song",
            &[("where".to_string(), r#"{"name":"A B"}"#.to_string())],
        );
        assert_eq!(
            url,
            "https://api.example.com/1/classes/Song?where=%7B%22name%22%3A%22A%20B%22%7D"
        );
    }

    #[test]
    fn test_classify_status_taxonomy() {
        assert!(classify_status(200, "{}").is_ok());

        assert!(matches!(
            classify_status(403, r#"{"code":119,"error":"unauthorized"}"#),
            Err(Error::Unauthorized { status: 403, .. })
        ));
        assert_eq!(
            classify_status(429, "{}").unwrap_err().transient_kind(),
            Some(TransientKind::RateLimited)
        );
        assert_eq!(
            classify_status(503, "{}").unwrap_err().transient_kind(),
            Some(TransientKind::ServiceUnavailable)
        );

        match classify_status(400, r#"{"code":101,"error":"object not found"}"#) {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 101);
                assert_eq!(message, "object not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_status_with_unparseable_body() {
        match classify_status(500, "<html>oops</html>") {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "<html>oops</html>");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_results() {
        let client = client();
        let body = json!({"results": [
            {"objectId": "a", "name": "A"},
            {"objectId": "b", "name": "B"},
        ]});

        let records = client.decode_results("Song", &body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].object_id(), Some("a"));
        assert_eq!(records[1].get("name"), Some(&json!("B")));
    }

    #[tokio::test]
    async fn test_for_each_rejects_cursor_field_filters() {
        let client = client();
        let query = client
            .query("Song")
            .after("created_at", "2024-01-01")
            .build();

        let result = client.for_each(query, |_| Ok(())).await;
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_master_key_requires_configuration() {
        let client = client();
        let query = client.query("Song").master_key().build();

        let result = client.find(&query).await;
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }
}
