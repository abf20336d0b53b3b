use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::account::{to_login, user_with_role};
use crate::error::AppError;
use crate::job::find_job;
use crate::models::{badges_for_profile, Badge, Job, NewProposal, Proposal, Role, User};
use crate::provider::profiles_for;
use crate::schema::{jobs, proposals, users};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposeForm {
    pub price: i32,
    #[serde(default)]
    pub available_time: String,
    #[serde(default)]
    pub warranty: String,
    #[serde(default)]
    pub note: String,
}

/// A quote as the job owner sees it: who sent it and how verified they are.
#[derive(Debug, Serialize)]
pub struct ProposalEntry {
    pub proposal: Proposal,
    pub provider: User,
    pub badges: Vec<Badge>,
}

/// A provider's own quote alongside the job it targets.
#[derive(Debug, Serialize)]
pub struct MyProposal {
    pub proposal: Proposal,
    pub job: Job,
}

/// Records the quote if the job exists and is still open. The job check and
/// the insert share a write transaction so a concurrent close cannot slip
/// between them.
pub fn submit(
    conn: &mut SqliteConnection,
    job_id: i32,
    provider_id: i32,
    form: &ProposeForm,
) -> QueryResult<Option<Proposal>> {
    conn.immediate_transaction(|conn| {
        match find_job(conn, job_id)? {
            Some(job) if job.is_open() => {}
            _ => return Ok(None),
        }

        let proposal = diesel::insert_into(proposals::table)
            .values(NewProposal {
                job_id,
                provider_id,
                price: form.price.max(0),
                available_time: form.available_time.trim().to_string(),
                warranty: form.warranty.trim().to_string(),
                note: form.note.trim().to_string(),
                created_at: Utc::now().naive_utc(),
            })
            .returning(Proposal::as_returning())
            .get_result(conn)?;
        Ok(Some(proposal))
    })
}

/// Quotes on a job, newest first, each with its provider and badges.
pub fn entries_for_job(conn: &mut SqliteConnection, job_id: i32) -> QueryResult<Vec<ProposalEntry>> {
    let rows: Vec<(Proposal, User)> = proposals::table
        .inner_join(users::table)
        .filter(proposals::job_id.eq(job_id))
        .order((proposals::created_at.desc(), proposals::id.desc()))
        .select((Proposal::as_select(), User::as_select()))
        .load(conn)?;

    let mut provider_ids: Vec<i32> = rows.iter().map(|(p, _)| p.provider_id).collect();
    provider_ids.sort_unstable();
    provider_ids.dedup();
    let profiles: HashMap<i32, _> = profiles_for(conn, &provider_ids)?
        .into_iter()
        .map(|profile| (profile.user_id, profile))
        .collect();

    Ok(rows
        .into_iter()
        .map(|(proposal, provider)| ProposalEntry {
            badges: badges_for_profile(profiles.get(&provider.id)),
            proposal,
            provider,
        })
        .collect())
}

/// Quotes sent by `provider_id`, newest first.
pub fn sent_by(conn: &mut SqliteConnection, provider_id: i32) -> QueryResult<Vec<MyProposal>> {
    let rows: Vec<(Proposal, Job)> = proposals::table
        .inner_join(jobs::table)
        .filter(proposals::provider_id.eq(provider_id))
        .order((proposals::created_at.desc(), proposals::id.desc()))
        .select((Proposal::as_select(), Job::as_select()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(proposal, job)| MyProposal { proposal, job })
        .collect())
}

pub async fn propose(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<i32>,
    Form(form): Form<ProposeForm>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let provider_id = user.id;
    let submitted = state
        .db
        .run(move |conn| Ok(submit(conn, job_id, provider_id, &form)?))
        .await?;

    match submitted {
        Some(proposal) => {
            log::info!(
                "Provider {} quoted {} on job {}",
                provider_id,
                proposal.price,
                job_id
            );
            Ok(Redirect::to("/dashboard").into_response())
        }
        None => {
            log::warn!("Provider {} cannot quote on job {}", provider_id, job_id);
            Ok(Redirect::to("/jobs").into_response())
        }
    }
}
