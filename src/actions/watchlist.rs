use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::actions::{DataResponse, json_error};
use crate::watchlist::{Watchlist, WatchlistBody};
use crate::web::AppState;

/// GET /data/watchlist - Active watchlist
pub async fn get_watchlist(State(state): State<AppState>) -> impl IntoResponse {
    let watchlist = state.watchlist.snapshot();
    Json(DataResponse {
        data: WatchlistBody::from(watchlist.as_ref()),
    })
}

/// PUT /data/watchlist - Replace the watchlist; applies from the next poll cycle
pub async fn replace_watchlist(
    State(state): State<AppState>,
    Json(body): Json<WatchlistBody>,
) -> impl IntoResponse {
    if body.callsigns.iter().any(|c| c.contains(',')) {
        return json_error(StatusCode::BAD_REQUEST, "Callsigns must not contain commas")
            .into_response();
    }

    let watchlist = Watchlist::from_entries(body.callsigns);
    info!("Watchlist replaced with {} entries", watchlist.len());
    let response = WatchlistBody::from(&watchlist);
    state.watchlist.replace(watchlist);

    (StatusCode::OK, Json(DataResponse { data: response })).into_response()
}
