use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Deserializer};

use crate::account::{current_user, to_login, user_with_role};
use crate::error::AppError;
use crate::models::{Job, JobStatus, NewJob, Role};
use crate::proposal::{entries_for_job, ProposalEntry};
use crate::schema::jobs;
use crate::views::page_context;
use crate::AppState;

fn default_units() -> i32 {
    1
}

/// A blank `units` field counts as the default rather than a bad request.
fn lenient_units<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default_units());
    }
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
pub struct PostJobForm {
    pub service_type: String,
    pub city: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub address_note: String,
    #[serde(default)]
    pub ac_type: String,
    #[serde(default = "default_units", deserialize_with = "lenient_units")]
    pub units: i32,
    #[serde(default)]
    pub floor: String,
    /// `"1"` marks the job urgent; anything else does not.
    #[serde(default)]
    pub urgent: String,
    #[serde(default)]
    pub time_window: String,
    #[serde(default)]
    pub description: String,
}

impl PostJobForm {
    pub fn into_new_job(self, owner_id: i32) -> NewJob {
        NewJob {
            owner_id,
            service_type: self.service_type.trim().to_string(),
            city: self.city.trim().to_string(),
            district: self.district.trim().to_string(),
            address_note: self.address_note.trim().to_string(),
            ac_type: self.ac_type.trim().to_string(),
            units: self.units.max(1),
            floor: self.floor.trim().to_string(),
            urgent: self.urgent == "1",
            time_window: self.time_window.trim().to_string(),
            description: self.description.trim().to_string(),
            status: JobStatus::Open.as_str(),
            created_at: Utc::now().naive_utc(),
        }
    }
}

pub fn insert_job(conn: &mut SqliteConnection, new_job: &NewJob) -> QueryResult<Job> {
    diesel::insert_into(jobs::table)
        .values(new_job)
        .returning(Job::as_returning())
        .get_result(conn)
}

pub fn find_job(conn: &mut SqliteConnection, job_id: i32) -> QueryResult<Option<Job>> {
    jobs::table.find(job_id).first(conn).optional()
}

/// Open jobs, newest first.
pub fn open_jobs(conn: &mut SqliteConnection) -> QueryResult<Vec<Job>> {
    jobs::table
        .filter(jobs::status.eq(JobStatus::Open.as_str()))
        .order((jobs::created_at.desc(), jobs::id.desc()))
        .load(conn)
}

/// Every job posted by `owner_id`, newest first.
pub fn jobs_owned_by(conn: &mut SqliteConnection, owner_id: i32) -> QueryResult<Vec<Job>> {
    jobs::table
        .filter(jobs::owner_id.eq(owner_id))
        .order((jobs::created_at.desc(), jobs::id.desc()))
        .load(conn)
}

/// Marks the job closed if `owner_id` posted it. Returns false, touching
/// nothing, for an unknown job or someone else's.
pub fn close(conn: &mut SqliteConnection, job_id: i32, owner_id: i32) -> QueryResult<bool> {
    let updated = diesel::update(
        jobs::table
            .filter(jobs::id.eq(job_id))
            .filter(jobs::owner_id.eq(owner_id)),
    )
    .set(jobs::status.eq(JobStatus::Closed.as_str()))
    .execute(conn)?;
    Ok(updated == 1)
}

pub async fn list_jobs(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let user = current_user(&state, &headers).await?;
    let jobs = state.db.run(|conn| Ok(open_jobs(conn)?)).await?;

    let mut context = page_context(user.as_ref());
    context.insert("jobs", &jobs);
    Ok(state.views.render("jobs.html", &context)?.into_response())
}

pub async fn post_job_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Owner).await? else {
        return Ok(to_login());
    };
    let context = page_context(Some(&user));
    Ok(state.views.render("post_job.html", &context)?.into_response())
}

pub async fn post_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PostJobForm>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Owner).await? else {
        return Ok(to_login());
    };

    let new_job = form.into_new_job(user.id);
    let job = state
        .db
        .run(move |conn| Ok(insert_job(conn, &new_job)?))
        .await?;
    log::info!("Owner {} posted job {}", user.id, job.id);

    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn job_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<i32>,
) -> Result<Response, AppError> {
    let user = current_user(&state, &headers).await?;
    let viewer_owner_id = user
        .as_ref()
        .filter(|u| u.has_role(Role::Owner))
        .map(|u| u.id);

    let found = state
        .db
        .run(move |conn| {
            let Some(job) = find_job(conn, job_id)? else {
                return Ok(None);
            };
            // Quotes stay private to the job's owner.
            let is_job_owner = viewer_owner_id == Some(job.owner_id);
            let proposals: Vec<ProposalEntry> = if is_job_owner {
                entries_for_job(conn, job.id)?
            } else {
                Vec::new()
            };
            Ok(Some((job, is_job_owner, proposals)))
        })
        .await?;

    let Some((job, is_job_owner, proposals)) = found else {
        return Ok(Redirect::to("/jobs").into_response());
    };
    let can_propose = job.is_open() && user.as_ref().is_some_and(|u| u.has_role(Role::Provider));

    let mut context = page_context(user.as_ref());
    context.insert("job", &job);
    context.insert("is_job_owner", &is_job_owner);
    context.insert("can_propose", &can_propose);
    context.insert("proposals", &proposals);
    Ok(state.views.render("job_detail.html", &context)?.into_response())
}

pub async fn close_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<i32>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Owner).await? else {
        return Ok(to_login());
    };

    let owner_id = user.id;
    let closed = state
        .db
        .run(move |conn| Ok(close(conn, job_id, owner_id)?))
        .await?;
    if !closed {
        log::warn!("Owner {} cannot close job {}", owner_id, job_id);
        return Ok(Redirect::to("/jobs").into_response());
    }

    log::info!("Owner {} closed job {}", owner_id, job_id);
    Ok(Redirect::to(&format!("/jobs/{}", job_id)).into_response())
}
