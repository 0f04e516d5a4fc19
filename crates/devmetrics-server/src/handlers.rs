use std::sync::Arc;

use devmetrics_crypto::{Hasher, Sha256Hasher};
use devmetrics_dto::{Metric, MetricKind};
use devmetrics_storage::Repository;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::settings::ServerSettings;

pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub settings: Arc<ServerSettings>,
    pub logger: slog::Logger,
    pub crypto_key: Option<devmetrics_crypto::RsaPrivateKey>,
    pub trusted_network: Option<ipnetwork::IpNetwork>,
}

/// A handler's result before the router applies response-side gzip negotiation and turns it
/// into a real `hyper::Response`. Kept as raw bytes so the router can encode once, in one
/// place, instead of every handler reaching into a body type.
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

fn text_response(status: StatusCode, body: impl Into<String>) -> RawResponse {
    RawResponse {
        status,
        content_type: "text/plain",
        body: body.into().into_bytes(),
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> RawResponse {
    RawResponse {
        status,
        content_type: "application/json",
        body,
    }
}

/// `GET /` — current metric values rendered as a minimal HTML table. The spec calls this an
/// "HTML dashboard"; rendering itself is an external collaborator (spec §1 Non-goals), so this
/// emits a plain listing rather than templating through a file on disk.
pub async fn dashboard(state: &AppState) -> Result<RawResponse, ServerError> {
    let snapshot = state.repo.get_all().await?;

    let mut body = String::from("<html><body><table>\n");
    for (id, value) in &snapshot.gauges {
        body.push_str(&format!("<tr><td>{id}</td><td>{value}</td></tr>\n"));
    }
    for (id, value) in &snapshot.counters {
        body.push_str(&format!("<tr><td>{id}</td><td>{value}</td></tr>\n"));
    }
    body.push_str("</table></body></html>");

    Ok(RawResponse {
        status: StatusCode::OK,
        content_type: "text/html",
        body: body.into_bytes(),
    })
}

/// `GET /ping` — liveness for storage connectivity.
pub async fn ping(state: &AppState) -> Result<RawResponse, ServerError> {
    match state.repo.ping().await {
        Ok(()) => Ok(text_response(StatusCode::OK, "")),
        Err(err) => {
            slog::warn!(state.logger, "ping failed"; "error" => %err);
            Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

/// `GET /value/{kind}/{id}` — plain-text current value.
pub async fn get_value_path(
    state: &AppState,
    kind: &str,
    id: &str,
) -> Result<RawResponse, ServerError> {
    match kind {
        "gauge" => match state.repo.get_gauge(id).await? {
            Some(value) => Ok(text_response(StatusCode::OK, value.to_string())),
            None => Err(ServerError::NotFound),
        },
        "counter" => match state.repo.get_counter(id).await? {
            Some(value) => Ok(text_response(StatusCode::OK, value.to_string())),
            None => Err(ServerError::NotFound),
        },
        _ => Err(ServerError::NotImplemented),
    }
}

#[derive(Debug, Deserialize)]
struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
}

/// `POST /value/` — query one metric by JSON `{id, type}`.
pub async fn get_value_json(
    state: &AppState,
    body: &[u8],
) -> Result<RawResponse, ServerError> {
    let query: MetricQuery =
        serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let metric = match query.kind {
        MetricKind::Gauge => match state.repo.get_gauge(&query.id).await? {
            Some(value) => Metric::gauge(query.id, value),
            None => return Err(ServerError::NotFound),
        },
        MetricKind::Counter => match state.repo.get_counter(&query.id).await? {
            Some(delta) => Metric::counter(query.id, delta),
            None => return Err(ServerError::NotFound),
        },
    };

    let json = serde_json::to_vec(&metric).expect("Metric serialization never fails");
    Ok(json_response(StatusCode::OK, json))
}

/// `POST /update/{kind}/{id}/{value}` — legacy path-form write.
pub async fn update_path(
    state: &AppState,
    kind: &str,
    id: &str,
    value: &str,
) -> Result<RawResponse, ServerError> {
    if id.is_empty() {
        return Err(ServerError::NotFound);
    }

    match kind {
        "gauge" => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| ServerError::BadRequest("invalid gauge value".to_string()))?;
            state.repo.store_gauge(id, parsed).await?;
            Ok(text_response(StatusCode::OK, value.to_string()))
        }
        "counter" => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| ServerError::BadRequest("invalid counter delta".to_string()))?;
            state.repo.store_counter(id, parsed).await?;
            let total = state.repo.get_counter(id).await?.unwrap_or(parsed);
            Ok(text_response(StatusCode::OK, total.to_string()))
        }
        _ => Err(ServerError::NotImplemented),
    }
}

/// `POST /update/` — JSON single write. Fixes the documented source bug (spec §9): an HMAC
/// mismatch now returns 400 without committing instead of logging and continuing.
pub async fn update_json(
    state: &AppState,
    body: &[u8],
) -> Result<RawResponse, ServerError> {
    let metric: Metric =
        serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    metric.validate()?;

    verify_signature(state, &metric)?;

    let committed = match metric.kind {
        MetricKind::Gauge => {
            let value = metric.value.expect("validated");
            state.repo.store_gauge(&metric.id, value).await?;
            Metric::gauge(metric.id.clone(), value)
        }
        MetricKind::Counter => {
            let delta = metric.delta.expect("validated");
            state.repo.store_counter(&metric.id, delta).await?;
            let total = state.repo.get_counter(&metric.id).await?.unwrap_or(delta);
            Metric::counter(metric.id.clone(), total)
        }
    };

    let json = serde_json::to_vec(&committed).expect("Metric serialization never fails");
    Ok(json_response(StatusCode::OK, json))
}

#[derive(Debug, Serialize)]
struct BatchResponse<'a> {
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Updated")]
    updated: &'a [Metric],
}

/// `POST /updates/` — JSON batch write. A mismatched signature on one envelope is
/// skip-and-log (spec §7): the rest of the batch still commits. `Updated` reports, for
/// each unique accepted `(id, kind)`, the post-commit value re-signed with the server's
/// key (spec §4.3) — duplicate entries within the request are merged by the repository's
/// `set_batch` and appear once here.
pub async fn update_batch(
    state: &AppState,
    body: &[u8],
) -> Result<RawResponse, ServerError> {
    let metrics: Vec<Metric> =
        serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let mut accepted = Vec::with_capacity(metrics.len());
    let mut unique_ids = std::collections::HashSet::new();
    let mut order = Vec::new();
    for metric in metrics {
        if metric.validate().is_err() {
            slog::warn!(state.logger, "dropping invalid metric from batch"; "id" => &metric.id);
            continue;
        }
        if verify_signature(state, &metric).is_err() {
            slog::warn!(state.logger, "dropping unsigned/mismatched metric from batch"; "id" => &metric.id);
            continue;
        }
        if unique_ids.insert((metric.id.clone(), metric.kind)) {
            order.push((metric.id.clone(), metric.kind));
        }
        accepted.push(metric);
    }

    state.repo.set_batch(&accepted).await?;

    let mut updated = Vec::with_capacity(order.len());
    for (id, kind) in order {
        let committed = match kind {
            MetricKind::Gauge => state
                .repo
                .get_gauge(&id)
                .await?
                .map(|value| Metric::gauge(id.clone(), value)),
            MetricKind::Counter => state
                .repo
                .get_counter(&id)
                .await?
                .map(|delta| Metric::counter(id.clone(), delta)),
        };

        if let Some(metric) = committed {
            updated.push(resign(state, metric));
        }
    }

    let response = BatchResponse {
        status: "OK",
        updated: &updated,
    };
    let json = serde_json::to_vec(&response).expect("batch response serialization never fails");
    Ok(json_response(StatusCode::OK, json))
}

/// Re-signs a metric with the server's own key, matching `Updated`'s contract of
/// server-signed post-commit values (spec §4.3). A no-op when signing is disabled.
fn resign(state: &AppState, metric: Metric) -> Metric {
    let key = &state.settings.hash_key;
    if key.is_empty() {
        return metric;
    }

    let canonical = metric
        .canonical_string()
        .expect("a value freshly read from storage is always a valid metric");
    let hash = Sha256Hasher::new().hash(&canonical, key);
    metric.with_hash(hash)
}

fn verify_signature(state: &AppState, metric: &Metric) -> Result<(), ServerError> {
    let key = &state.settings.hash_key;
    if key.is_empty() {
        return Ok(());
    }

    let hash = metric.hash.as_deref().unwrap_or("");

    let canonical = metric
        .canonical_string()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if Sha256Hasher::new().compare(hash, &canonical, key) {
        Ok(())
    } else {
        Err(ServerError::BadRequest(
            "metric signature verification failed".to_string(),
        ))
    }
}

pub fn error_response(err: &ServerError) -> RawResponse {
    text_response(err.status_code(), format!("{err}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmetrics_storage::MemoryRepository;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState {
            repo: Arc::new(MemoryRepository::new(
                "",
                Duration::ZERO,
                false,
                slog::Logger::root(slog::Discard, slog::o!()),
            )),
            settings: Arc::new(ServerSettings::default()),
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            crypto_key: None,
            trusted_network: None,
        }
    }

    #[tokio::test]
    async fn unknown_kind_on_path_update_is_not_implemented() {
        let state = test_state();
        let err = update_path(&state, "gaugeInvalid", "X", "6")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotImplemented));
    }

    #[tokio::test]
    async fn missing_id_on_path_update_is_not_found() {
        let state = test_state();
        let err = update_path(&state, "gauge", "", "6").await.unwrap_err();
        assert!(matches!(err, ServerError::NotFound));
    }

    #[tokio::test]
    async fn counter_accumulates_across_path_updates() {
        let state = test_state();
        update_path(&state, "counter", "PollCount", "3")
            .await
            .unwrap();
        update_path(&state, "counter", "PollCount", "8")
            .await
            .unwrap();
        let response = get_value_path(&state, "counter", "PollCount").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"11");
    }

    #[tokio::test]
    async fn signature_mismatch_on_single_update_returns_bad_request_without_committing() {
        let mut state = test_state();
        state.settings = Arc::new(ServerSettings {
            hash_key: "K".to_string(),
            ..ServerSettings::default()
        });

        let bad_hash = Sha256Hasher::new().hash("X:counter:1", "K");
        let body = serde_json::to_vec(&Metric::counter("X", 2).with_hash(bad_hash)).unwrap();

        let err = update_json(&state, &body).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        assert_eq!(state.repo.get_counter("X").await.unwrap(), None);
    }
}
