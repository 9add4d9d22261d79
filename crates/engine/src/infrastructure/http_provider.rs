//! HTTP content provider for Open5e-style paginated JSON APIs.
//!
//! `GET {base}/{entity_type}/?{params}` returns
//! `{"results": [...], "next": "<url>" | null}`. Filters are translated into
//! the Django-style lookup dialect these APIs accept.

use async_trait::async_trait;
use grimoire_domain::{
    EntitySchema, EntityType, FieldRef, FilterClause, FilterOp, FilterSpec, FilterValue,
    SchemaRegistry, WILDCARD,
};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{ContentProvider, ProviderError, ProviderPage};

/// Default provider base URL.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.open5e.com/v1";

/// Client for a paginated content API.
#[derive(Clone)]
pub struct HttpContentProvider {
    client: Client,
    base_url: Url,
    page_size: u32,
    registry: Arc<SchemaRegistry>,
}

impl HttpContentProvider {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Permanent` if the base URL does not parse.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        page_size: u32,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self, ProviderError> {
        // Url::join replaces the last segment unless the base ends in a slash.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ProviderError::permanent(format!("invalid provider URL: {}", e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            base_url,
            page_size: page_size.max(1),
            registry,
        })
    }

    /// URL of the first page for a filtered listing.
    fn first_page_url(
        &self,
        entity_type: &EntityType,
        filters: &FilterSpec,
    ) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(&format!("{}/", entity_type))
            .map_err(|e| ProviderError::permanent(format!("invalid listing URL: {}", e)))?;

        let schema = self.registry.get(entity_type);
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query_pairs(schema, filters) {
                pairs.append_pair(&name, &value);
            }
            pairs.append_pair("limit", &self.page_size.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch_page(
        &self,
        entity_type: &EntityType,
        filters: &FilterSpec,
        page_token: Option<String>,
    ) -> Result<ProviderPage, ProviderError> {
        let url = match page_token {
            Some(next) => Url::parse(&next)
                .map_err(|e| ProviderError::permanent(format!("invalid page token: {}", e)))?,
            None => self.first_page_url(entity_type, filters)?,
        };

        tracing::debug!(entity_type = %entity_type, url = %url, "Requesting provider page");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ProviderError::network)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(error) = classify_status(status, retry_after.as_deref()) {
            return Err(error);
        }

        let body: ListingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::permanent(format!("undecodable listing: {}", e)))?;

        Ok(ProviderPage {
            items: body.results,
            next_page: body.next.filter(|next| !next.is_empty()),
        })
    }

    fn origin_id(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

/// Map a non-success HTTP status to a provider error. `None` means success.
fn classify_status(status: StatusCode, retry_after: Option<&str>) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Some(ProviderError::RateLimited { retry_after });
    }
    if status.is_server_error() {
        return Some(ProviderError::network(format!("provider returned {}", status)));
    }
    Some(ProviderError::permanent(format!("provider returned {}", status)))
}

// =============================================================================
// Query dialect
// =============================================================================

/// Translate filters into `(param, value)` pairs.
///
/// Unknown fields pass through under their own name; the filter compiler
/// rejects them before the provider is ever asked.
fn query_pairs(schema: Option<&EntitySchema>, filters: &FilterSpec) -> Vec<(String, String)> {
    filters
        .into_iter()
        .map(|clause| {
            let field = remote_field(schema, &clause.field);
            let is_name = matches!(
                schema.map(|s| s.field(&clause.field)),
                Some(Ok(FieldRef::Name))
            );
            let (suffix, value) = lookup(clause, is_name);
            let name = if suffix.is_empty() {
                field
            } else {
                format!("{}__{}", field, suffix)
            };
            (name, value)
        })
        .collect()
}

fn remote_field(schema: Option<&EntitySchema>, field: &str) -> String {
    let path = match schema.map(|s| (s, s.field(field))) {
        Some((s, Ok(FieldRef::Key))) => s.key_path.clone(),
        Some((s, Ok(FieldRef::Name))) => s.name_path.clone(),
        Some((_, Ok(FieldRef::Attribute(def)))) => def.path.clone(),
        _ => field.to_string(),
    };
    path.replace('.', "__")
}

/// Name matches are case-insensitive on both sides, so `eq` on the name
/// field goes out as `iexact`, and only name values treat `*` as a wildcard.
fn lookup(clause: &FilterClause, is_name: bool) -> (&'static str, String) {
    let single = match &clause.value {
        FilterValue::Scalar(value) => value.to_text(),
        FilterValue::Set(values) => values
            .iter()
            .map(|v| v.to_text())
            .collect::<Vec<_>>()
            .join(","),
    };

    match clause.op {
        FilterOp::InSet => ("in", single),
        FilterOp::RangeGte => ("gte", single),
        FilterOp::RangeLte => ("lte", single),
        FilterOp::Contains => wildcard_lookup(&single).unwrap_or(("icontains", single)),
        FilterOp::Eq | FilterOp::Ieq if is_name && clause.value.has_wildcard() => {
            wildcard_lookup(&single).unwrap_or(("icontains", single))
        }
        FilterOp::Eq if is_name => ("iexact", single),
        FilterOp::Eq => ("", single),
        FilterOp::Ieq => ("iexact", single),
    }
}

/// Approximate a wildcard pattern with a single remote lookup.
///
/// The dialect has no general pattern match, so `fire*` becomes a prefix
/// lookup, `*ball` a suffix lookup and anything else a substring lookup on
/// the longest literal run. The orchestrator re-applies the exact pattern to
/// whatever comes back.
fn wildcard_lookup(pattern: &str) -> Option<(&'static str, String)> {
    if !pattern.contains(WILDCARD) {
        return None;
    }
    let inner = pattern.trim_matches(WILDCARD);
    if !inner.is_empty() && !inner.contains(WILDCARD) {
        let leading = pattern.starts_with(WILDCARD);
        let trailing = pattern.ends_with(WILDCARD);
        return Some(match (leading, trailing) {
            (false, true) => ("istartswith", inner.to_string()),
            (true, false) => ("iendswith", inner.to_string()),
            _ => ("icontains", inner.to_string()),
        });
    }
    let longest = pattern
        .split(WILDCARD)
        .max_by_key(|segment| segment.len())
        .unwrap_or_default();
    Some(("icontains", longest.to_string()))
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
    #[serde(default)]
    next: Option<String>,
}
