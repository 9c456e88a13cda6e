use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::availability::BlockAvailability;
use crate::calendar::MAX_HORIZON_DAYS;
use crate::catalog::{CatalogError, ScheduleTemplate};
use crate::course::Course;
use crate::persistence::PersistenceError;
use crate::report::{DEFAULT_UPCOMING_LIMIT, ReservationStats, UpcomingReservations};
use crate::reservation::{Reservation, ReservationRequest};
use crate::service::{ReservationService, ServiceError, SubmitError};
use crate::validation::ValidationError;

/// Header carrying the caller's verified email, set by the fronting auth proxy.
pub const REQUESTER_HEADER: &str = "x-requester-email";

#[derive(Clone)]
pub struct AppState {
    service: Arc<ReservationService>,
    admins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(service: ReservationService) -> Self {
        Self {
            service: Arc::new(service),
            admins: Arc::new(Vec::new()),
        }
    }

    /// Limit statistics, other people's reservations and cancelling them to
    /// these emails. An empty list leaves them open.
    pub fn with_admins<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admins = emails
            .into_iter()
            .map(|email| email.as_ref().trim().to_ascii_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        self.admins = Arc::new(admins);
        self
    }

    fn service(&self) -> &ReservationService {
        &self.service
    }

    fn is_admin(&self, caller: Option<&str>) -> bool {
        self.admins.is_empty()
            || caller.is_some_and(|email| self.admins.iter().any(|admin| same_email(admin, email)))
    }

    fn require_admin(&self, caller: Option<&str>) -> Result<(), ApiError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Owners may act on their own reservation; admins on any.
    fn require_owner_or_admin(
        &self,
        caller: Option<&str>,
        reservation: &Reservation,
    ) -> Result<(), ApiError> {
        let owner = caller.is_some_and(|email| same_email(email, &reservation.requester_email));
        if owner {
            Ok(())
        } else {
            self.require_admin(caller)
        }
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn caller_email(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUESTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug, Serialize)]
struct Violation<'a> {
    field: &'static str,
    message: String,
    #[serde(flatten)]
    detail: &'a ValidationError,
}

#[derive(Debug, Serialize)]
struct RejectionBody<'a> {
    error: &'a str,
    message: String,
    refresh_availability: bool,
    violations: Vec<Violation<'a>>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Invalid(String),
    Forbidden,
    Rejected {
        errors: Vec<ValidationError>,
        refresh: bool,
    },
    Internal,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<CatalogError> for ApiError {
    fn from(value: CatalogError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        error!(error = %value, "repository failure");
        ApiError::Internal
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Catalog(err) => err.into(),
            ServiceError::Repository(err) => err.into(),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(value: SubmitError) -> Self {
        let refresh = value.needs_refresh();
        match value {
            SubmitError::Rejected(errors) => ApiError::Rejected { errors, refresh },
            SubmitError::Repository(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                let body = Json(ErrorBody {
                    error: "not_found",
                    message,
                });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Invalid(message) => {
                let body = Json(ErrorBody {
                    error: "invalid_request",
                    message,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Forbidden => {
                let body = Json(ErrorBody {
                    error: "forbidden",
                    message: "this view is restricted to administrators".to_string(),
                });
                (StatusCode::FORBIDDEN, body).into_response()
            }
            ApiError::Rejected { errors, refresh } => {
                let violations = errors
                    .iter()
                    .map(|detail| Violation {
                        field: detail.field(),
                        message: detail.to_string(),
                        detail,
                    })
                    .collect();
                let body = Json(RejectionBody {
                    error: "validation_failed",
                    message: format!("{} rule(s) not satisfied", errors.len()),
                    refresh_availability: refresh,
                    violations,
                });
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(ErrorBody {
                    error: "internal_error",
                    message: "the request could not be completed, please try again".to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HorizonQuery {
    horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    requester: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct FreeUnitsBody {
    course: String,
    date: NaiveDate,
    block: u8,
    free_units: Vec<u8>,
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("{field} must be YYYY-MM-DD, got '{value}'")))
}

fn required_date(query: &DateQuery) -> Result<NaiveDate, ApiError> {
    match query.date.as_deref() {
        Some(value) => parse_date("date", value),
        None => Err(ApiError::invalid("missing 'date' query parameter")),
    }
}

fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    value.map(|value| parse_date(field, value)).transpose()
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::invalid(format!("'{raw}' is not a reservation id")))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/dates", get(list_dates))
        .route("/courses/:course/template", get(get_template))
        .route("/courses/:course/availability", get(get_day_grid))
        .route("/courses/:course/availability/:block", get(get_free_units))
        .route(
            "/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route("/reservations/upcoming", get(upcoming_reservations))
        .route(
            "/reservations/:id",
            get(get_reservation).delete(cancel_reservation),
        )
        .route("/stats", get(statistics))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_courses(State(state): State<AppState>) -> Json<Vec<Course>> {
    Json(state.service().catalog().courses().to_vec())
}

async fn list_dates(
    State(state): State<AppState>,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<NaiveDate>>, ApiError> {
    let service = state.service();
    let horizon = query.horizon_days.unwrap_or_else(|| service.horizon_days());
    if horizon > MAX_HORIZON_DAYS {
        return Err(ApiError::invalid(format!(
            "horizon_days must be at most {MAX_HORIZON_DAYS}, got {horizon}"
        )));
    }
    Ok(Json(service.available_dates_within(horizon)))
}

async fn get_template(
    State(state): State<AppState>,
    Path(course): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ScheduleTemplate>, ApiError> {
    let date = required_date(&query)?;
    let template = state.service().template(&course, date)?;
    Ok(Json(template.clone()))
}

async fn get_day_grid(
    State(state): State<AppState>,
    Path(course): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<BlockAvailability>>, ApiError> {
    let date = required_date(&query)?;
    let grid = state.service().day_grid(&course, date)?;
    Ok(Json(grid))
}

async fn get_free_units(
    State(state): State<AppState>,
    Path((course, block)): Path<(String, u8)>,
    Query(query): Query<DateQuery>,
) -> Result<Json<FreeUnitsBody>, ApiError> {
    let date = required_date(&query)?;
    let free = state.service().free_units(&course, Some(date), block)?;
    Ok(Json(FreeUnitsBody {
        course,
        date,
        block,
        free_units: free.into_iter().collect(),
    }))
}

async fn list_reservations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let caller = caller_email(&headers);
    let own = match (query.requester.as_deref(), caller) {
        (Some(requester), Some(caller)) => same_email(requester, caller),
        _ => false,
    };
    if !own {
        state.require_admin(caller)?;
    }
    let from = optional_date("from", query.from.as_deref())?;
    let to = optional_date("to", query.to.as_deref())?;
    let service = state.service();
    let reservations = match query.requester.as_deref() {
        Some(email) => service
            .reservations_for(email)?
            .into_iter()
            .filter(|r| from.is_none_or(|from| r.date >= from))
            .filter(|r| to.is_none_or(|to| r.date <= to))
            .collect(),
        None if from.is_some() || to.is_some() => service.reservations_between(from, to)?,
        None => service.all_reservations()?,
    };
    Ok(Json(reservations))
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let reservation = state.service().submit(&request)?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn get_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    let id = parse_id(&raw_id)?;
    match state.service().reservation(id)? {
        Some(reservation) => {
            state.require_owner_or_admin(caller_email(&headers), &reservation)?;
            Ok(Json(reservation))
        }
        None => Err(ApiError::not_found(format!("reservation {id} not found"))),
    }
}

async fn cancel_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    if let Some(reservation) = state.service().reservation(id)? {
        state.require_owner_or_admin(caller_email(&headers), &reservation)?;
    }
    state.service().cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upcoming_reservations(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<UpcomingReservations>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
    Ok(Json(state.service().upcoming(limit)?))
}

async fn statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReservationStats>, ApiError> {
    state.require_admin(caller_email(&headers))?;
    Ok(Json(state.service().statistics()?))
}
