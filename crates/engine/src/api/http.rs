//! HTTP routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use grimoire_domain::{
    CacheStats, EntityRecord, FetchResult, FilterClause, FilterOp, FilterSpec, FilterValue,
    RecordOrigin, ScalarValue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::App;
use crate::infrastructure::filter_aliases::FilterAliases;
use crate::use_cases::content::CacheError;

/// Page size when the caller does not pass `limit`.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest accepted `limit`.
pub const MAX_LIMIT: u32 = 1000;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/{entity_type}", get(fetch_records))
        .route("/api/{entity_type}/batch", post(upsert_batch))
        .route("/api/{entity_type}/stats", get(get_stats))
        .route("/api/{entity_type}/{key}", get(get_record))
}

async fn health() -> &'static str {
    "OK"
}

async fn fetch_records(
    State(app): State<Arc<App>>,
    Path(entity_type): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FetchResult>, ApiError> {
    let query = parse_filter_params(&params, &app.aliases)?;
    let result = app
        .content
        .fetch(&entity_type, query.filters, query.limit, query.offset)
        .await?;
    Ok(Json(result))
}

async fn get_record(
    State(app): State<Arc<App>>,
    Path((entity_type, key)): Path<(String, String)>,
) -> Result<Json<EntityRecord>, ApiError> {
    let record = app
        .content
        .get(&entity_type, &key)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(record))
}

async fn get_stats(
    State(app): State<Arc<App>>,
    Path(entity_type): Path<String>,
) -> Result<Json<CacheStats>, ApiError> {
    Ok(Json(app.content.stats(&entity_type).await?))
}

/// A record as callers submit it. Timestamps are assigned by the store.
#[derive(Debug, Deserialize)]
pub struct RecordInput {
    pub key: String,
    #[serde(alias = "name")]
    pub display_name: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attributes: BTreeMap<String, ScalarValue>,
    #[serde(default = "default_origin_id")]
    pub origin_id: String,
}

fn default_origin_id() -> String {
    "api".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectedSummary {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub applied: usize,
    pub rejected: Vec<RejectedSummary>,
}

async fn upsert_batch(
    State(app): State<Arc<App>>,
    Path(entity_type): Path<String>,
    Json(inputs): Json<Vec<RecordInput>>,
) -> Result<Json<BatchResponse>, ApiError> {
    let schema = app
        .content
        .registry()
        .resolve(&entity_type)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let now = app.clock.now();

    let records = inputs
        .into_iter()
        .map(|input| {
            let mut record = EntityRecord::new(
                schema.entity_type.clone(),
                input.key,
                input.display_name,
                input.payload,
                RecordOrigin::Import,
                input.origin_id,
                now,
            );
            record.attributes = input.attributes;
            record
        })
        .collect();

    let outcome = app.content.upsert_batch(&entity_type, records).await?;
    Ok(Json(BatchResponse {
        applied: outcome.applied_count(),
        rejected: outcome
            .rejected
            .into_iter()
            .map(|rejected| RejectedSummary {
                key: rejected.record.key,
                reason: rejected.reason.to_string(),
            })
            .collect(),
    }))
}

// =============================================================================
// Query parameters
// =============================================================================

/// Filters and window parsed from a query string.
#[derive(Debug, PartialEq)]
pub struct FetchQuery {
    pub filters: FilterSpec,
    pub limit: u32,
    pub offset: u32,
}

/// Parse `limit`, `offset` and `<field or alias>=[<op>:]<value>` pairs.
///
/// An alias supplies the field and the default operator; an explicit
/// `op:` prefix overrides the operator. `in_set` values are comma separated.
pub fn parse_filter_params(
    params: &[(String, String)],
    aliases: &FilterAliases,
) -> Result<FetchQuery, ApiError> {
    let mut limit = DEFAULT_LIMIT;
    let mut offset = 0;
    let mut clauses = Vec::new();

    for (name, raw) in params {
        match name.as_str() {
            "limit" => {
                limit = parse_number(name, raw)?.min(MAX_LIMIT);
                continue;
            }
            "offset" => {
                offset = parse_number(name, raw)?;
                continue;
            }
            _ => {}
        }

        let (field, default_op) = aliases
            .resolve(name)
            .unwrap_or((name.as_str(), FilterOp::Eq));
        let (op, literal) = split_operator(raw).unwrap_or((default_op, raw.as_str()));

        let value = if op == FilterOp::InSet {
            FilterValue::Set(
                literal
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(ScalarValue::infer)
                    .collect(),
            )
        } else {
            FilterValue::Scalar(ScalarValue::infer(literal))
        };
        clauses.push(FilterClause::new(field, op, value));
    }

    Ok(FetchQuery {
        filters: FilterSpec::from_clauses(clauses),
        limit,
        offset,
    })
}

fn parse_number(name: &str, raw: &str) -> Result<u32, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a non-negative integer", name)))
}

/// `gte:3` → `(RangeGte, "3")`. Values whose prefix is not an operator are
/// left alone, so `Tasha's: Mind Whip` stays a plain value.
fn split_operator(raw: &str) -> Option<(FilterOp, &str)> {
    let (prefix, rest) = raw.split_once(':')?;
    prefix.parse::<FilterOp>().ok().map(|op| (op, rest))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidFilter(msg) => ApiError::BadRequest(msg),
            CacheError::ProviderNetwork(msg) | CacheError::ProviderPermanent(msg) => {
                ApiError::BadGateway(msg)
            }
            CacheError::StoreUnavailable(_) | CacheError::Import(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{
        EntityStore, MockContentProvider, ProviderError, ProviderPage,
    };
    use crate::infrastructure::sqlite::SqliteEntityStore;
    use crate::use_cases::content::FetchSettings;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use grimoire_domain::{Provenance, SchemaRegistry};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_window_aliases_and_operators() {
        let query = parse_filter_params(
            &params(&[
                ("limit", "10"),
                ("offset", "20"),
                ("min_level", "3"),
                ("school", "ieq:evocation"),
                ("name", "fire*"),
                ("dnd_class", "in:Wizard, Sorcerer"),
            ]),
            &FilterAliases::srd_defaults(),
        )
        .expect("parses");

        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 20);
        assert_eq!(
            query.filters,
            FilterSpec::new()
                .gte("level", 3)
                .ieq("school", "evocation")
                .eq("name", "fire*")
                .in_set("dnd_class", vec!["Wizard".into(), "Sorcerer".into()])
        );
    }

    #[test]
    fn colon_without_operator_is_part_of_the_value() {
        let query = parse_filter_params(
            &params(&[("name", "Tasha's: Mind Whip")]),
            &FilterAliases::new(),
        )
        .expect("parses");
        assert_eq!(
            query.filters,
            FilterSpec::new().eq("name", "Tasha's: Mind Whip")
        );
    }

    #[test]
    fn limit_is_clamped_and_validated() {
        let query = parse_filter_params(&params(&[("limit", "999999")]), &FilterAliases::new())
            .expect("parses");
        assert_eq!(query.limit, MAX_LIMIT);

        assert!(matches!(
            parse_filter_params(&params(&[("offset", "-1")]), &FilterAliases::new()),
            Err(ApiError::BadRequest(_))
        ));
    }

    async fn app_with(provider: MockContentProvider) -> Arc<App> {
        let store: Arc<dyn EntityStore> =
            Arc::new(SqliteEntityStore::open_in_memory().await.expect("open"));
        let clock = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).single().expect("valid time");
        Arc::new(App::new(
            store,
            Arc::new(provider),
            Arc::new(FixedClock(clock)),
            Arc::new(SchemaRegistry::srd_defaults()),
            FilterAliases::srd_defaults(),
            FetchSettings::default(),
        ))
    }

    fn offline() -> MockContentProvider {
        let mut provider = MockContentProvider::new();
        provider.expect_origin_id().return_const("open5e".to_string());
        provider
            .expect_fetch_page()
            .returning(|_, _, _| Err(ProviderError::network("offline")));
        provider
    }

    async fn send(app: &Arc<App>, request: Request<Body>) -> (StatusCode, Value) {
        let response = routes()
            .with_state(app.clone())
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn batch_then_fetch_through_http() {
        let app = app_with(offline()).await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/spells/batch",
                json!([
                    {"key": "fireball", "name": "Fireball", "payload": {"slug": "fireball", "name": "Fireball", "level_int": 3}},
                    {"key": "fire-bolt", "name": "Fire Bolt", "payload": {"slug": "fire-bolt", "name": "Fire Bolt", "level_int": 0}},
                    {"key": "", "name": "Broken", "payload": {}}
                ]),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!(2));
        assert_eq!(body["rejected"][0]["reason"], json!("record key is empty"));

        let (status, body) = send(&app, get_request("/api/spells?search=fire&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provenance"], json!(Provenance::CacheOnly));
        assert_eq!(body["partial"], json!(true));
        let names: Vec<&str> = body["records"]
            .as_array()
            .expect("records array")
            .iter()
            .filter_map(|r| r["display_name"].as_str())
            .collect();
        assert_eq!(names, vec!["Fire Bolt", "Fireball"]);

        let (status, body) = send(&app, get_request("/api/spells/fireball")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], json!("fireball"));

        let (status, body) = send(&app, get_request("/api/spells/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record_count"], json!(2));
    }

    #[tokio::test]
    async fn error_statuses() {
        let app = app_with(offline()).await;

        let (status, _) = send(&app, get_request("/api/spells?hit_points=3")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_request("/api/vehicles")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_request("/api/spells/wish")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Nothing cached and the provider is down.
        let (status, _) = send(&app, get_request("/api/spells?school=Evocation")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn empty_set_query_returns_no_records() {
        let mut provider = MockContentProvider::new();
        provider.expect_fetch_page().times(0);
        let app = app_with(provider).await;

        let (status, body) = send(&app, get_request("/api/spells?school=in:")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], json!([]));
        assert_eq!(body["partial"], json!(false));
    }

    #[tokio::test]
    async fn fresh_provider_results_are_served() {
        let mut provider = MockContentProvider::new();
        provider.expect_origin_id().return_const("open5e".to_string());
        provider.expect_fetch_page().returning(|_, _, _| {
            Ok(ProviderPage {
                items: vec![json!({"slug": "wish", "name": "Wish", "level_int": 9})],
                next_page: None,
            })
        });
        let app = app_with(provider).await;

        let (status, body) = send(&app, get_request("/api/spells?min_level=9")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provenance"], json!("fresh"));
        assert_eq!(body["records"][0]["key"], json!("wish"));
    }
}
