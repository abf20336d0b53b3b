use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::account::{current_user, to_login};
use crate::error::AppError;
use crate::job::{jobs_owned_by, open_jobs};
use crate::models::Role;
use crate::proposal::sent_by;
use crate::views::page_context;
use crate::AppState;

/// Owners see their own jobs; providers see open jobs and their quotes.
pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let Some(user) = current_user(&state, &headers).await? else {
        return Ok(to_login());
    };

    let mut context = page_context(Some(&user));
    let user_id = user.id;

    if user.has_role(Role::Owner) {
        let my_jobs = state
            .db
            .run(move |conn| Ok(jobs_owned_by(conn, user_id)?))
            .await?;
        context.insert("my_jobs", &my_jobs);
        return Ok(state.views.render("owner_dashboard.html", &context)?.into_response());
    }

    let (open, mine) = state
        .db
        .run(move |conn| Ok((open_jobs(conn)?, sent_by(conn, user_id)?)))
        .await?;
    context.insert("open_jobs", &open);
    context.insert("my_props", &mine);
    Ok(state.views.render("provider_dashboard.html", &context)?.into_response())
}
