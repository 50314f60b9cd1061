//! HTTP handler functions for the flood route API.

use actix_web::{HttpResponse, web};
use flood_route_flood_models::features::{parse_feature_collection, to_feature_collection};
use flood_route_flood_models::{Coordinate, ModelError, RoadSegment};
use flood_route_routing_models::RouteRequest;
use flood_route_server_models::{
    ApiError, ApiEvictResult, ApiHealth, ApiRoadRisk, ApiStoreResult, EvictParams,
    PredictionWindowParams, RiskUpdateRequest, RouteQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/route`
///
/// Routes from `start` to `goal` (both `lat,lon`) around active flooding.
pub async fn route(
    state: web::Data<AppState>,
    params: web::Query<RouteQueryParams>,
) -> HttpResponse {
    let start = match parse_coordinate("start", params.start.as_deref()) {
        Ok(c) => c,
        Err(message) => return HttpResponse::BadRequest().json(ApiError::new(message)),
    };
    let goal = match parse_coordinate("goal", params.goal.as_deref()) {
        Ok(c) => c,
        Err(message) => return HttpResponse::BadRequest().json(ApiError::new(message)),
    };

    let request = RouteRequest::new(start, goal)
        .with_window(params.window.unwrap_or(state.prediction_window_minutes));

    match state.orchestrator.route(&request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("Route query failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to compute route"))
        }
    }
}

/// `POST /api/predictions`
///
/// Stores a `FeatureCollection` of flood predictions as one batch.
pub async fn store_predictions(state: web::Data<AppState>, body: String) -> HttpResponse {
    let batch = match parse_feature_collection(&body) {
        Ok(batch) => batch,
        Err(e) => {
            log::warn!("Rejected prediction batch: {e}");
            return HttpResponse::BadRequest().json(ApiError::new(e.to_string()));
        }
    };

    match state.floods.store(&batch.predictions).await {
        Ok(stored) => {
            log::info!(
                "Stored {stored} flood predictions ({} skipped)",
                batch.skipped
            );
            HttpResponse::Ok().json(ApiStoreResult {
                stored,
                skipped: batch.skipped,
            })
        }
        Err(e) => {
            log::error!("Failed to store predictions: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to store predictions"))
        }
    }
}

/// `GET /api/predictions`
///
/// Returns the active predictions as a `FeatureCollection`.
pub async fn list_predictions(
    state: web::Data<AppState>,
    params: web::Query<PredictionWindowParams>,
) -> HttpResponse {
    let window = params.window.unwrap_or(state.prediction_window_minutes);

    match state.floods.latest(window).await {
        Ok(predictions) => HttpResponse::Ok().json(to_feature_collection(&predictions)),
        Err(e) => {
            log::error!("Failed to read predictions: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to read predictions"))
        }
    }
}

/// `DELETE /api/predictions`
pub async fn evict_predictions(
    state: web::Data<AppState>,
    params: web::Query<EvictParams>,
) -> HttpResponse {
    let hours = params.older_than_hours.unwrap_or(state.eviction_horizon_hours);

    match state.floods.evict(hours).await {
        Ok(evicted) => {
            log::info!("Evicted {evicted} predictions older than {hours}h");
            HttpResponse::Ok().json(ApiEvictResult { evicted })
        }
        Err(e) => {
            log::error!("Eviction failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to evict predictions"))
        }
    }
}

/// `POST /api/road-risks/update`
///
/// Recomputes road risk. An empty body re-evaluates the stored segments
/// over the default window.
pub async fn update_road_risks(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RiskUpdateRequest::default()
    } else {
        match serde_json::from_slice::<RiskUpdateRequest>(&body) {
            Ok(request) => request,
            Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
        }
    };

    let segments = match request.segments.map(|inputs| {
        inputs
            .into_iter()
            .map(RoadSegment::try_from)
            .collect::<Result<Vec<_>, ModelError>>()
    }) {
        None => None,
        Some(Ok(segments)) => Some(segments),
        Some(Err(e)) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };

    let window = request.window.unwrap_or(state.prediction_window_minutes);

    match state
        .engine
        .update_from_store(state.floods.as_ref(), segments, window)
        .await
    {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => {
            log::error!("Road risk update failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to update road risks"))
        }
    }
}

/// `GET /api/road-risks`
pub async fn list_road_risks(state: web::Data<AppState>) -> HttpResponse {
    match state.road_risks.list().await {
        Ok(risks) => {
            let risks: Vec<ApiRoadRisk> = risks.iter().map(ApiRoadRisk::from).collect();
            HttpResponse::Ok().json(risks)
        }
        Err(e) => {
            log::error!("Failed to list road risks: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to list road risks"))
        }
    }
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<Coordinate, String> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("Missing required parameter '{name}'"))?;
    raw.parse().map_err(|e: ModelError| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use flood_route_config::RoutingConfig;
    use flood_route_database::db::{self, StoreBackend};
    use flood_route_pathfinder::synthetic::SyntheticPathFinder;
    use serde_json::Value;

    use super::*;

    const FLOOD_BATCH: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[80.0, 12.8], [80.5, 12.8], [80.5, 13.2], [80.0, 13.2], [80.0, 12.8]]]
                },
                "properties": { "submergence_ratio": 0.45, "velocity": 0.5, "timestamp": "2099-12-31T00:00:00Z" }
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "submergence_ratio": 0.9 }
            }
        ]
    }"#;

    async fn state() -> web::Data<AppState> {
        let stores = db::open(&StoreBackend::Memory).await.unwrap();
        web::Data::new(AppState::new(
            stores,
            Arc::new(SyntheticPathFinder),
            &RoutingConfig::default(),
        ))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(crate::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let state = state().await;
        let app = app!(state);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/health").to_request())
                .await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn route_rejects_bad_coordinates() {
        let state = state().await;
        let app = app!(state);

        for uri in [
            "/api/route?goal=12.95,80.22",
            "/api/route?start=13.08&goal=12.95,80.22",
            "/api/route?start=abc,80.27&goal=12.95,80.22",
            "/api/route?start=95.0,80.27&goal=12.95,80.22",
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
        }
    }

    #[actix_web::test]
    async fn ingest_then_route_is_rerouted() {
        let state = state().await;
        let app = app!(state);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload(FLOOD_BATCH)
                .to_request(),
        )
        .await;
        assert_eq!(body["stored"], 1);
        assert_eq!(body["skipped"], 1);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/route?start=13.08,80.27&goal=12.95,80.22")
                .to_request(),
        )
        .await;
        assert_eq!(body["status"], "rerouted");
        assert_eq!(body["risk_level"], "high");
        assert_eq!(body["max_submergence_ratio"], 0.45);
        assert_eq!(body["start"], serde_json::json!([13.08, 80.27]));
        assert_eq!(body["route"].as_array().map(Vec::len), Some(11));
    }

    #[actix_web::test]
    async fn invalid_batch_is_rejected_whole() {
        let state = state().await;
        let app = app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload(FLOOD_BATCH.replace("0.45", "1.5"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.floods.count().await.unwrap(), 0);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload("[]")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_and_evict_predictions() {
        let state = state().await;
        let app = app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload(FLOOD_BATCH)
                .to_request(),
        )
        .await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/predictions?window=5").to_request(),
        )
        .await;
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["features"][0]["properties"]["submergence_ratio"], 0.45);

        // Future-dated predictions are never older than the cutoff.
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete()
                .uri("/api/predictions?olderThanHours=0")
                .to_request(),
        )
        .await;
        assert_eq!(body["evicted"], 0);
        assert_eq!(state.floods.count().await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn evict_accepts_the_largest_horizon() {
        let state = state().await;
        let app = app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload(FLOOD_BATCH)
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri("/api/predictions?olderThanHours=4294967295")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["evicted"], 0);
        assert_eq!(state.floods.count().await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn road_risk_update_and_listing() {
        let state = state().await;
        let app = app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_payload(FLOOD_BATCH)
                .to_request(),
        )
        .await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/road-risks/update")
                .set_json(serde_json::json!({
                    "segments": [
                        {
                            "road_segment_id": "anna-salai",
                            "geometry": { "type": "LineString", "coordinates": [[80.1, 13.0], [80.3, 13.05]] },
                            "base_weight": 2.0
                        },
                        { "road_segment_id": "ecr" }
                    ]
                }))
                .to_request(),
        )
        .await;
        assert_eq!(body["updated"], 1);
        assert_eq!(body["closed"], 0);
        assert_eq!(body["total_segments"], 2);
        assert_eq!(body["flood_polygon_count"], 1);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/road-risks").to_request(),
        )
        .await;
        let risks = body.as_array().unwrap();
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0]["roadSegmentId"], "anna-salai");
        assert_eq!(risks[0]["dynamicWeight"], 10.0);
        assert_eq!(risks[0]["isClosed"], false);

        // Empty body re-evaluates what is already stored.
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/road-risks/update").to_request(),
        )
        .await;
        assert_eq!(body["updated"], 1);
        assert_eq!(body["total_segments"], 1);
    }

    #[actix_web::test]
    async fn road_risk_update_rejects_invalid_segments() {
        let state = state().await;
        let app = app!(state);

        for payload in [
            r#"{"segments": [{"road_segment_id": ""}]}"#,
            r#"{"segments": [{"road_segment_id": "a", "base_weight": -1.0}]}"#,
            "not json",
        ] {
            let resp = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/api/road-risks/update")
                    .insert_header(("content-type", "application/json"))
                    .set_payload(payload)
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{payload}");
        }
    }
}
