use crate::http_api::request_types::{Report, Snapshot};
use crate::prometheus_metrics::PrometheusMetrics;
use crate::SyncServer;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use actix_web::{App, HttpServer};
use paperclip::actix::{
    api_v2_errors,
    api_v2_operation,
    // use this instead of actix_web::web
    web::{self, Json},
    // extension trait for actix_web::App and proc-macro attributes
    OpenApiExt,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

struct SyncData {
    server: Arc<Mutex<SyncServer>>,
    metrics: Arc<PrometheusMetrics>,
}

impl SyncData {
    fn new(server: Arc<Mutex<SyncServer>>, metrics: Arc<PrometheusMetrics>) -> Self {
        Self { server, metrics }
    }

    fn server(&self) -> &Mutex<SyncServer> {
        self.server.as_ref()
    }

    fn metrics(&self) -> &PrometheusMetrics {
        self.metrics.as_ref()
    }
}

#[api_v2_errors(404)]
#[derive(Debug)]
enum ErrorResponse {
    NotFound,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not found"),
        }
    }
}

impl ResponseError for ErrorResponse {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

// Used for health checks
#[api_v2_operation]
async fn status() -> web::Json<()> {
    Json(())
}

#[tracing::instrument(skip(data))]
#[api_v2_operation]
async fn metrics(data: web::Data<SyncData>) -> String {
    data.get_ref().metrics().gather_metrics()
}

#[tracing::instrument(skip(data))]
#[api_v2_operation]
async fn get_snapshot(
    data: web::Data<SyncData>,
    role: web::Path<String>,
) -> Result<web::Json<Snapshot>, ErrorResponse> {
    let role = role.into_inner();
    let server = data.get_ref().server().lock().await;
    match server.snapshot(&role) {
        Some(snapshot) => Ok(Json(Snapshot::new(&role, &snapshot))),
        None => Err(ErrorResponse::NotFound),
    }
}

#[tracing::instrument(skip(data))]
#[api_v2_operation]
async fn get_reports(data: web::Data<SyncData>) -> Result<web::Json<Vec<Report>>, ErrorResponse> {
    let server = data.get_ref().server().lock().await;
    match server.last_reports() {
        Some(reports) => Ok(Json(reports.iter().map(Report::from).collect())),
        None => Err(ErrorResponse::NotFound),
    }
}

// The stage-indexed actions hold the full action enum, which has no OpenAPI
// schema, so they go out as plain JSON.
#[tracing::instrument(skip(data))]
#[api_v2_operation]
async fn get_rate_limits(data: web::Data<SyncData>) -> HttpResponse {
    let server = data.get_ref().server().lock().await;
    HttpResponse::Ok().json(server.rate_limits())
}

pub async fn run_http_server(
    address: &str,
    server: Arc<Mutex<SyncServer>>,
    prometheus_metrics: Arc<PrometheusMetrics>,
) -> std::io::Result<()> {
    let data = web::Data::new(SyncData::new(server, prometheus_metrics));

    // This uses the paperclip crate to generate an OpenAPI spec.
    // Ref: https://paperclip.waffles.space/actix-plugin.html

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .with_json_spec_at("/api/spec")
            .app_data(data.clone())
            .route("/status", web::get().to(status))
            .route("/metrics", web::get().to(metrics))
            .route("/snapshot/{role}", web::get().to(get_snapshot))
            .route("/reports", web::get().to(get_reports))
            .route("/ratelimits", web::get().to(get_rate_limits))
            .build()
    })
    .bind(address)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::http_api::request_types::Resources;
    use crate::prometheus_metrics::tests::TEST_PROMETHEUS_HANDLE;
    use crate::topology::tests::{topology_file, TOPOLOGY};
    use actix_web::{test, web};
    use ratelimit_sync::snapshot::RATE_LIMIT_ROLE;
    use ratelimit_sync::xds::RATE_LIMIT_CONFIG_TYPE_URL;

    // The sync logic itself is tested in the library; these tests only check
    // that each endpoint serves what the last pass left behind.

    fn sync_data(synced: bool) -> web::Data<SyncData> {
        let prometheus_metrics: Arc<PrometheusMetrics> =
            Arc::new(PrometheusMetrics::new_with_handle(TEST_PROMETHEUS_HANDLE.clone()));
        let mut server = SyncServer::new(&Configuration::default(), prometheus_metrics.clone());
        if synced {
            let file = topology_file(TOPOLOGY);
            server.sync_from_file(&file.path()).unwrap();
        }
        web::Data::new(SyncData::new(Arc::new(Mutex::new(server)), prometheus_metrics))
    }

    #[actix_rt::test]
    async fn test_status() {
        let app = test::init_service(App::new().route("/status", web::get().to(status))).await;

        let req = test::TestRequest::with_uri("/status").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_metrics() {
        let data = sync_data(true);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .route("/metrics", web::get().to(metrics)),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_and_read_body(&app, req).await;
        let resp_string = String::from_utf8(resp.to_vec()).unwrap();

        // No need to check the whole output. We just want to make sure that it
        // returns something with the prometheus format.
        assert!(resp_string.contains("# HELP ratelimit_sync_up The rate limit syncer is running"));
        assert!(resp_string.contains("ratelimit_xds_connected_state{role=\"ratelimit\"}"));
    }

    #[actix_rt::test]
    async fn test_snapshot_read() {
        let data = sync_data(true);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .route("/snapshot/{role}", web::get().to(get_snapshot)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/snapshot/{RATE_LIMIT_ROLE}"))
            .to_request();
        let snapshot: Snapshot = test::call_and_read_body_json(&app, req).await;

        assert_eq!(snapshot.role, RATE_LIMIT_ROLE);
        assert_eq!(snapshot.resources.len(), 1);
        let Resources {
            type_url,
            version,
            names,
        } = &snapshot.resources[0];
        assert_eq!(type_url, RATE_LIMIT_CONFIG_TYPE_URL);
        assert_eq!(version.len(), 16);
        assert_eq!(names, &vec!["crd", "custom", "ingress"]);

        let req = test::TestRequest::get().uri("/snapshot/gateway").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_reports_read() {
        let data = sync_data(false);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .route("/reports", web::get().to(get_reports)),
        )
        .await;

        // Nothing to report before the first pass
        let req = test::TestRequest::get().uri("/reports").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let file = topology_file(TOPOLOGY);
        data.get_ref()
            .server()
            .lock()
            .await
            .sync_from_file(&file.path())
            .unwrap();

        let req = test::TestRequest::get().uri("/reports").to_request();
        let reports: Vec<Report> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|report| report.state == "Accepted"));
        assert!(reports
            .iter()
            .any(|report| report.kind == "RateLimitConfig" && report.name == "per-path"));
    }

    #[actix_rt::test]
    async fn test_reports_reject_invalid_inline_set_actions() {
        let data = sync_data(false);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .route("/reports", web::get().to(get_reports)),
        )
        .await;

        let topology = TOPOLOGY.replace(
            "                  options:\n                    rateLimitConfigs:",
            "                  options:\n                    ratelimit:\n                      - setActions:\n                          - genericKey:\n                              descriptorValue: \"\"\n                    rateLimitConfigs:",
        );
        assert_ne!(topology, TOPOLOGY);
        let file = topology_file(&topology);
        let result = data.get_ref().server().lock().await.sync_from_file(&file.path());
        assert!(result.is_err());

        let req = test::TestRequest::get().uri("/reports").to_request();
        let reports: Vec<Report> = test::call_and_read_body_json(&app, req).await;
        let proxy = reports
            .iter()
            .find(|report| report.kind == "Proxy")
            .unwrap();
        assert_eq!(proxy.name, "gateway-proxy");
        assert_eq!(proxy.state, "Rejected");
        assert_eq!(proxy.errors.len(), 1);
        assert!(proxy.errors[0].contains("genericKey requires a descriptor value"));
    }

    #[actix_rt::test]
    async fn test_rate_limits_read() {
        let data = sync_data(true);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .route("/ratelimits", web::get().to(get_rate_limits)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ratelimits").to_request();
        let proxies: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let virtual_host = &proxies[0]["virtualHosts"][0];
        assert_eq!(virtual_host["name"], "foo.host");
        assert_eq!(virtual_host["rateLimits"]["0"].as_array().unwrap().len(), 2);
        let route = &virtual_host["routes"][0];
        assert_eq!(route["name"], "per-path");
        assert_eq!(route["rateLimits"]["2"].as_array().unwrap().len(), 1);
    }
}
