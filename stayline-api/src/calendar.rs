use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stayline_shared::{BlockingRange, RangeSource, StayRange};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CalendarEntry {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub source: RangeSource,
}

impl From<BlockingRange> for CalendarEntry {
    fn from(b: BlockingRange) -> Self {
        Self {
            date_from: b.range.date_from,
            date_to: b.range.date_to,
            source: b.source,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub unit_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub blocked: Vec<CalendarEntry>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/units/{id}/calendar", get(unit_calendar))
}

/// Occupied ranges for a unit's calendar. Defaults to the next twelve
/// months when no window is given.
async fn unit_calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let today = Utc::now().date_naive();
    let from = q.from.unwrap_or(today);
    let to = q.to.unwrap_or(from + Duration::days(365));
    let range = StayRange::new(from, to);
    if !range.is_valid() {
        return Err(AppError::BadRequest("'to' must be after 'from'".to_string()));
    }

    let blocked = state
        .availability
        .list_blocking_ranges(id, range)
        .await?
        .into_iter()
        .map(CalendarEntry::from)
        .collect();

    Ok(Json(CalendarResponse {
        unit_id: id,
        date_from: from,
        date_to: to,
        blocked,
    }))
}
