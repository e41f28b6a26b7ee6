use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use aiact_api::{
    AssessRequest, AssessmentApi, ClassifyRequest, ClassifyResult, RecommendationList,
    RulesListing, API_CONTRACT_VERSION,
};
use aiact_core::{AssessmentRecord, KernelError};
use aiact_store::StoreSummary;
use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");
const DEFAULT_LOG_FILTER: &str = "info";

/// One session store per process, serialized behind a single lock.
#[derive(Debug, Clone)]
struct ServiceState {
    api: Arc<Mutex<AssessmentApi>>,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    #[serde(skip)]
    status: StatusCode,
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    ruleset_version: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RulesQuery {
    category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AssessmentsQuery {
    recent: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
struct AssessmentList {
    total: usize,
    records: Vec<AssessmentRecord>,
}

#[derive(Debug, Parser)]
#[command(name = "aiact-service")]
#[command(about = "Local HTTP service for EU AI Act self-assessments")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
    /// Start with an empty store instead of the two demonstration records.
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl ServiceError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
    }

    /// Domain errors are caller mistakes; anything else is ours.
    fn from_api(err: &anyhow::Error) -> Self {
        let status = match err.downcast_ref::<KernelError>() {
            Some(KernelError::IdExhausted { .. }) | None => StatusCode::INTERNAL_SERVER_ERROR,
            Some(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }

    /// Extractor failures keep the JSON error shape instead of axum's plain-text body.
    fn from_rejection(body_text: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, body_text)
    }
}

impl ServiceState {
    fn new(api: AssessmentApi) -> Self {
        Self { api: Arc::new(Mutex::new(api)) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AssessmentApi>, ServiceError> {
        self.api.lock().map_err(|_| {
            ServiceError::new(StatusCode::INTERNAL_SERVER_ERROR, "assessment session lock poisoned")
        })
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/rules", get(rules_list))
        .route("/v1/classify", post(classify))
        .route("/v1/recommendations/:tier", get(recommendations))
        .route("/v1/assessments", get(assessments_list).post(assessments_create))
        .route("/v1/assessments/summary", get(assessments_summary))
        .route("/v1/assessments/export.csv", get(assessments_export_csv))
        .route("/v1/assessments/:id", get(assessments_show))
        .with_state(state)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let api = if args.no_seed { AssessmentApi::empty() } else { AssessmentApi::new() };
    let state = ServiceState::new(api);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(bind = %args.bind, seeded = !args.no_seed, "aiact service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse {
        status: "ok",
        ruleset_version: aiact_core::RuleCatalog::eu_ai_act().version(),
    }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn rules_list(
    State(state): State<ServiceState>,
    query: Result<Query<RulesQuery>, QueryRejection>,
) -> Result<Json<ServiceEnvelope<RulesListing>>, ServiceError> {
    let Query(query) = query.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let category = query
        .category
        .as_deref()
        .map(AssessmentApi::parse_category)
        .transpose()
        .map_err(|err| ServiceError::from_api(&err))?;
    let listing = state.lock()?.rules(category);
    Ok(Json(envelope(listing)))
}

async fn classify(
    State(state): State<ServiceState>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ServiceEnvelope<ClassifyResult>>, ServiceError> {
    let Json(request) = payload.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let result = state.lock()?.classify(&request);
    Ok(Json(envelope(result)))
}

async fn recommendations(
    State(state): State<ServiceState>,
    tier: Result<Path<String>, PathRejection>,
) -> Result<Json<ServiceEnvelope<RecommendationList>>, ServiceError> {
    let Path(tier) = tier.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let list = state.lock()?.recommend(&tier).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(list)))
}

async fn assessments_create(
    State(state): State<ServiceState>,
    payload: Result<Json<AssessRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceEnvelope<AssessmentRecord>>), ServiceError> {
    let Json(request) = payload.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let record = state.lock()?.assess(request).map_err(|err| ServiceError::from_api(&err))?;
    Ok((StatusCode::CREATED, Json(envelope(record))))
}

async fn assessments_list(
    State(state): State<ServiceState>,
    query: Result<Query<AssessmentsQuery>, QueryRejection>,
) -> Result<Json<ServiceEnvelope<AssessmentList>>, ServiceError> {
    let Query(query) = query.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let api = state.lock()?;
    let records = match query.recent {
        Some(limit) => api.recent(limit).into_iter().cloned().collect(),
        None => api.records().to_vec(),
    };
    Ok(Json(envelope(AssessmentList { total: api.records().len(), records })))
}

async fn assessments_summary(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<StoreSummary>>, ServiceError> {
    let summary = state.lock()?.summary();
    Ok(Json(envelope(summary)))
}

async fn assessments_show(
    State(state): State<ServiceState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ServiceEnvelope<AssessmentRecord>>, ServiceError> {
    let Path(id) = id.map_err(|rejection| ServiceError::from_rejection(rejection.body_text()))?;
    let record = state.lock()?.record(id).cloned().ok_or_else(|| {
        ServiceError::new(StatusCode::NOT_FOUND, format!("assessment not found: {id}"))
    })?;
    Ok(Json(envelope(record)))
}

async fn assessments_export_csv(
    State(state): State<ServiceState>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = state.lock()?.export_csv().map_err(|err| ServiceError::from_api(&err))?;
    Ok((StatusCode::OK, [("content-type", "text/csv; charset=utf-8")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::Request;
    use tower::ServiceExt;

    fn seeded_router() -> Router {
        app(ServiceState::new(AssessmentApi::new()))
    }

    async fn body_text(response: Response) -> String {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = body_text(response).await;
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response {
        let builder = Request::builder().uri(uri).method(method);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body.to_string())),
            None => builder.body(axum::body::Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

        match router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    fn resume_request() -> serde_json::Value {
        serde_json::json!({
            "system_name": "Resume ranker",
            "use_case": "Automated resume screening and candidate ranking",
            "context": "HR recruitment process",
            "sector": "employment",
            "stage": "production",
            "data_types": ["personal_data", "behavioral_data"]
        })
    }

    // Test IDs: TSVC-001
    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = send(&seeded_router(), "GET", "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value["service_contract_version"], SERVICE_CONTRACT_VERSION);
        assert_eq!(value["api_contract_version"], API_CONTRACT_VERSION);
        assert_eq!(value["data"]["status"], "ok");
        assert_eq!(value["data"]["ruleset_version"], aiact_core::CATALOG_VERSION);
    }

    // Test IDs: TSVC-002
    #[tokio::test]
    async fn openapi_endpoint_returns_versioned_artifact() {
        let response = send(&seeded_router(), "GET", "/v1/openapi", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("openapi: 3.1.0"));
        assert!(body.contains("version: service.v1"));
        assert!(body.contains("/v1/classify"));
        assert!(body.contains("/v1/assessments/{id}"));
    }

    // Test IDs: TSVC-003
    #[tokio::test]
    async fn classify_returns_tier_score_and_recommendations() {
        let payload = serde_json::json!({
            "use_case": "chatbot for customer service",
            "context": "e-commerce website",
            "data_types": ["text_data"]
        });
        let response = send(&seeded_router(), "POST", "/v1/classify", Some(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        let data = &value["data"];
        assert_eq!(data["classification"]["tier"], "limited");
        assert_eq!(data["classification"]["score"], 35);
        assert_eq!(data["classification"]["matched_rules"][0]["id"], "LR1");
        assert_eq!(data["compliance_score"], 85);
        assert_eq!(data["recommendations"].as_array().map(Vec::len), Some(3));
        assert_eq!(data["catalog_digest"], aiact_core::RuleCatalog::eu_ai_act().digest());
    }

    // Test IDs: TSVC-004
    #[tokio::test]
    async fn assessment_flow_appends_and_reads_back() {
        let router = seeded_router();

        let created = send(&router, "POST", "/v1/assessments", Some(resume_request())).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let record = response_json(created).await;
        assert_eq!(record["data"]["id"], 3);
        assert_eq!(record["data"]["tier"], "high");
        assert_eq!(record["data"]["risk_score"], 70);
        assert_eq!(record["data"]["compliance_score"], 60);
        assert_eq!(record["data"]["matched_rules"], serde_json::json!(["HR3"]));

        let shown = response_json(send(&router, "GET", "/v1/assessments/3", None).await).await;
        assert_eq!(shown["data"], record["data"]);

        let summary = response_json(send(&router, "GET", "/v1/assessments/summary", None).await).await;
        assert_eq!(summary["data"]["total"], 3);
        assert_eq!(summary["data"]["by_tier"]["high"], 2);

        let recent =
            response_json(send(&router, "GET", "/v1/assessments?recent=1", None).await).await;
        assert_eq!(recent["data"]["total"], 3);
        assert_eq!(recent["data"]["records"][0]["id"], 3);
    }

    // Test IDs: TSVC-005
    #[tokio::test]
    async fn invalid_assessments_are_rejected_without_storing() {
        let router = seeded_router();

        let mut missing = resume_request();
        missing["use_case"] = serde_json::json!("   ");
        missing["data_types"] = serde_json::json!([]);
        let response = send(&router, "POST", "/v1/assessments", Some(missing)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = response_json(response).await;
        assert_eq!(
            value["error"],
            "validation error: missing required field(s): use_case, data_types"
        );

        let mut unknown_sector = resume_request();
        unknown_sector["sector"] = serde_json::json!("mining");
        let response = send(&router, "POST", "/v1/assessments", Some(unknown_sector)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let summary = response_json(send(&router, "GET", "/v1/assessments/summary", None).await).await;
        assert_eq!(summary["data"]["total"], 2);
    }

    // Test IDs: TSVC-006
    #[tokio::test]
    async fn lookups_distinguish_bad_requests_from_missing_records() {
        let router = seeded_router();

        let high = send(&router, "GET", "/v1/recommendations/high", None).await;
        assert_eq!(high.status(), StatusCode::OK);
        let value = response_json(high).await;
        assert_eq!(value["data"]["recommendations"].as_array().map(Vec::len), Some(5));

        let unknown = send(&router, "GET", "/v1/recommendations/severe", None).await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(unknown).await["error"], "unknown risk tier: severe");

        let missing = send(&router, "GET", "/v1/assessments/42", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_json(missing).await["error"], "assessment not found: 42");
    }

    // Test IDs: TSVC-007
    #[tokio::test]
    async fn rules_endpoint_filters_by_category() {
        let router = seeded_router();

        let all = response_json(send(&router, "GET", "/v1/rules", None).await).await;
        assert_eq!(all["data"]["rules"].as_array().map(Vec::len), Some(10));
        assert_eq!(all["data"]["ruleset_version"], aiact_core::CATALOG_VERSION);

        let prohibited =
            response_json(send(&router, "GET", "/v1/rules?category=prohibited", None).await).await;
        assert_eq!(prohibited["data"]["rules"].as_array().map(Vec::len), Some(3));
        assert_eq!(prohibited["data"]["digest"], all["data"]["digest"]);

        let unknown = send(&router, "GET", "/v1/rules?category=annex", None).await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    }

    // Test IDs: TSVC-008
    #[tokio::test]
    async fn csv_export_lists_every_record() {
        let router = seeded_router();
        let created = send(&router, "POST", "/v1/assessments", Some(resume_request())).await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let response = send(&router, "GET", "/v1/assessments/export.csv", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|value| value.to_str().ok()),
            Some("text/csv; charset=utf-8")
        );

        let body = body_text(response).await;
        let lines = body.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("3,Resume ranker,"));
        assert!(lines[3].contains(",production,high,70,60,true,"));
    }

    // Test IDs: TSVC-009
    #[tokio::test]
    async fn malformed_query_and_path_values_return_json_errors() {
        let router = seeded_router();

        for uri in ["/v1/assessments?recent=abc", "/v1/assessments/abc", "/v1/assessments/-1"] {
            let response = send(&router, "GET", uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri={uri}");
            assert_eq!(
                response.headers().get("content-type").and_then(|value| value.to_str().ok()),
                Some("application/json"),
                "uri={uri}"
            );
            let value = response_json(response).await;
            assert_eq!(value["service_contract_version"], SERVICE_CONTRACT_VERSION);
            assert!(
                value["error"].as_str().is_some_and(|error| !error.is_empty()),
                "uri={uri} body={value}"
            );
        }

        let summary = response_json(send(&router, "GET", "/v1/assessments/summary", None).await).await;
        assert_eq!(summary["data"]["total"], 2);
    }
}
