#![cfg(feature = "http_api")]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use cart_reservations::{
    FixedClock, MemoryReservationStore, Reservation, ReservationService, http_api,
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn new_state() -> http_api::AppState {
    let now = NaiveDate::from_ymd_opt(2025, 3, 5)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let service = ReservationService::new(
        Arc::new(MemoryReservationStore::new()),
        Arc::new(FixedClock(now)),
    );
    http_api::AppState::new(service)
}

fn new_router() -> axum::Router {
    http_api::router(new_state())
}

fn as_caller(mut request: Request<Body>, email: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(http_api::REQUESTER_HEADER, email.parse().unwrap());
    request
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn booking(course: &str, date: &str, slots: Value) -> Value {
    json!({
        "course": course,
        "date": date,
        "accepted_terms": true,
        "slots": slots,
        "requester": { "id": "u1", "email": "teacher@school.cl", "name": "Teacher" }
    })
}

#[tokio::test]
async fn health_courses_and_dates() {
    let app = new_router();

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/courses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let courses = json_body(response).await;
    assert_eq!(courses.as_array().unwrap().len(), 24);

    let response = app.oneshot(get("/dates")).await.unwrap();
    let dates = json_body(response).await;
    assert_eq!(dates[0], "2025-03-05");
    assert_eq!(dates.as_array().unwrap().last().unwrap(), "2025-03-12");
}

#[tokio::test]
async fn oversize_horizon_is_a_bad_request() {
    let app = new_router();

    let response = app
        .clone()
        .oneshot(get("/dates?horizon_days=4294967295"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");

    let response = app.oneshot(get("/dates?horizon_days=14")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dates = json_body(response).await;
    assert_eq!(dates.as_array().unwrap().last().unwrap(), "2025-03-19");
}

#[tokio::test]
async fn missing_rows_and_weekends_have_no_free_units() {
    let app = new_router();

    let response = app
        .clone()
        .oneshot(get("/courses/4to%20A/availability/7?date=2025-03-05"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/courses/4to%20A/availability/1?date=2025-03-08"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_views_follow_the_allowlist() {
    let app = http_api::router(new_state().with_admins(["Admin@School.cl"]));

    let payload = booking("5to A", "2025-03-07", json!([{ "block": 2, "unit": 1 }]));
    let response = app
        .clone()
        .oneshot(post_json("/reservations", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let uri = format!("/reservations/{}", created["id"].as_str().unwrap());

    // Statistics and the full listing need an admin
    let response = app.clone().oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "forbidden");
    let response = app
        .clone()
        .oneshot(as_caller(get("/stats"), "teacher@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .clone()
        .oneshot(as_caller(get("/stats"), "admin@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(as_caller(get("/reservations"), "teacher@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Owners see their own reservations
    let response = app
        .clone()
        .oneshot(as_caller(
            get("/reservations?requester=teacher@school.cl"),
            "Teacher@School.cl",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    // Upcoming stays public
    let response = app.clone().oneshot(get("/reservations/upcoming")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Someone else cannot cancel, the owner can
    let response = app
        .clone()
        .oneshot(as_caller(delete(&uri), "other@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .clone()
        .oneshot(as_caller(get(&uri), "other@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(as_caller(delete(&uri), "teacher@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Already gone, still idempotent
    let response = app
        .oneshot(as_caller(delete(&uri), "other@school.cl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn template_and_lookup_errors() {
    let app = new_router();

    let response = app
        .clone()
        .oneshot(get("/courses/I%20Medio%20A/template?date=2025-03-06"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let template = json_body(response).await;
    assert_eq!(template["blocks"].as_array().unwrap().len(), 10);

    let response = app
        .clone()
        .oneshot(get("/courses/9no%20Z/template?date=2025-03-06"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");

    let response = app
        .clone()
        .oneshot(get("/courses/4to%20A/template?date=2025-03-08"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/courses/4to%20A/template"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reservation_lifecycle_via_http_api() {
    let app = new_router();

    // Book carts 3 and 4 in Senior row 6
    let response = app
        .clone()
        .oneshot(post_json(
            "/reservations",
            &booking(
                "I Medio A",
                "2025-03-06",
                json!([{ "block": 6, "unit": 3 }, { "block": 6, "unit": 4 }]),
            ),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let created: Reservation = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(created.slots[0].block_key.value(), 60);

    // Units are gone for Senior viewers, still there for Middle
    let response = app
        .clone()
        .oneshot(get("/courses/II%20Medio%20A/availability/6?date=2025-03-06"))
        .await
        .unwrap();
    let free = json_body(response).await;
    assert_eq!(free["free_units"], json!([1, 2, 5, 6, 7, 8, 9, 10]));

    let response = app
        .clone()
        .oneshot(get("/courses/4to%20A/availability?date=2025-03-06"))
        .await
        .unwrap();
    let grid = json_body(response).await;
    assert_eq!(grid[6]["free_units"].as_array().unwrap().len(), 10);

    // Fetch, list and cancel
    let uri = format!("/reservations/{}", created.id);
    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/reservations?requester=TEACHER@school.cl"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    let response = app.clone().oneshot(get("/stats")).await.unwrap();
    assert_eq!(json_body(response).await["total"], 1);

    let response = app.clone().oneshot(get("/reservations/upcoming")).await.unwrap();
    let upcoming = json_body(response).await;
    assert_eq!(upcoming["chromebook"].as_array().unwrap().len(), 1);

    let response = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_submission_lists_every_violation() {
    let app = new_router();
    let mut payload = booking(
        "4to A",
        "2025-03-06",
        json!([
            { "block": 1, "unit": 1 },
            { "block": 2, "unit": 1 },
            { "block": 3, "unit": 1 }
        ]),
    );
    payload["accepted_terms"] = json!(false);

    let response = app.oneshot(post_json("/reservations", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["refresh_availability"], false);
    let codes: Vec<&str> = body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["terms_not_accepted", "too_many_concurrent_blocks"]);
    assert_eq!(body["violations"][0]["field"], "accepted_terms");
}

#[tokio::test]
async fn taken_slot_asks_for_refresh() {
    let app = new_router();
    let first = booking("5to A", "2025-03-07", json!([{ "block": 2, "unit": 7 }]));
    let response = app.clone().oneshot(post_json("/reservations", &first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let second = booking("6to B", "2025-03-07", json!([{ "block": 2, "unit": 7 }]));
    let response = app.oneshot(post_json("/reservations", &second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["refresh_availability"], true);
    assert_eq!(body["violations"][0]["code"], "slot_no_longer_available");
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let app = new_router();
    let response = app.oneshot(delete("/reservations/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
