//! Teams: create a team and list the caller's teams.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::models::identity::Identity;
use crate::models::team::{NewTeam, Team};
use crate::store::Store;
use crate::tenancy::MAX_TENANT_NAME_LEN;

/// The caller becomes the team's `admin`.
pub async fn create_team(
    store: &dyn Store,
    actor: &Identity,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<Team> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("Team name is required".into()));
    }
    if name.chars().count() > MAX_TENANT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Team name must be at most {MAX_TENANT_NAME_LEN} characters"
        )));
    }
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned);
    let team = store
        .create_team(
            NewTeam {
                name: name.to_string(),
                description,
            },
            actor,
            now,
        )
        .await?;
    info!(team_id = %team.id, user_id = %actor.id, "team created");
    Ok(team)
}

pub async fn my_teams(store: &dyn Store, actor: &Identity) -> CoreResult<Vec<Team>> {
    store.teams_for_user(actor.id).await
}
