//! Team handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use roster_core::teams;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateTeamRequest, Envelope, TeamDto, TeamsResponse};

/// `POST /api/teams`: the caller becomes the team's admin.
pub async fn create_team_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<CreateTeamRequest>,
) -> AppResult<(StatusCode, Json<Envelope<TeamDto>>)> {
    let team = teams::create_team(
        state.store.as_ref(),
        &user.identity,
        &body.name,
        body.description.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(TeamDto::from(&team)))))
}

/// `GET /api/teams/my-teams`
pub async fn my_teams_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<TeamsResponse>>> {
    let teams = teams::my_teams(state.store.as_ref(), &user.identity).await?;
    Ok(Json(Envelope::ok(TeamsResponse {
        teams: teams.iter().map(TeamDto::from).collect(),
    })))
}
