use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;

use crate::account::{current_user, to_login, user_with_role};
use crate::error::AppError;
use crate::models::{
    badges_for_profile, NewPortfolioItem, NewProviderProfile, PortfolioItem, ProviderProfile,
    ProviderProfileChanges, Role, User, MAX_PORTFOLIO_ITEMS,
};
use crate::schema::{provider_portfolio, provider_profiles, users};
use crate::views::{page_context, Flash};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub display_name: String,
    pub shop_name: String,
    pub city: String,
    pub specialties: String,
    pub bio: String,
    pub identity_doc_url: String,
    pub business_doc_url: String,
    pub license_doc_url: String,
}

impl ProfileForm {
    fn into_changes(self) -> ProviderProfileChanges {
        ProviderProfileChanges {
            display_name: clip(&self.display_name, 60),
            shop_name: clip(&self.shop_name, 80),
            city: clip(&self.city, 30),
            specialties: clean_specialties(&self.specialties),
            bio: self.bio.trim().to_string(),
            identity_doc_url: clip(&self.identity_doc_url, 300),
            business_doc_url: clip(&self.business_doc_url, 300),
            license_doc_url: clip(&self.license_doc_url, 300),
            updated_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PortfolioForm {
    pub image_url: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    BadUrl,
    Full,
}

/// Trims `value` and keeps at most `max` characters.
pub fn clip(value: &str, max: usize) -> String {
    value.trim().chars().take(max).collect()
}

/// Normalizes a free-text specialty list: `、` counts as a comma, blanks and
/// repeats are dropped, first-seen order is kept.
pub fn clean_specialties(raw: &str) -> String {
    let normalized = raw.replace('、', ",");
    let mut seen: Vec<&str> = Vec::new();
    for part in normalized.split(',').map(str::trim) {
        if !part.is_empty() && !seen.contains(&part) {
            seen.push(part);
        }
    }
    seen.join(",").chars().take(120).collect()
}

/// Creates the provider's profile unless one exists, then returns it.
pub fn ensure_profile(conn: &mut SqliteConnection, user: &User) -> QueryResult<ProviderProfile> {
    diesel::insert_or_ignore_into(provider_profiles::table)
        .values(NewProviderProfile {
            user_id: user.id,
            city: &user.city,
            updated_at: Utc::now().naive_utc(),
        })
        .execute(conn)?;
    provider_profiles::table
        .filter(provider_profiles::user_id.eq(user.id))
        .first(conn)
}

pub fn find_profile(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<ProviderProfile>> {
    provider_profiles::table
        .filter(provider_profiles::user_id.eq(user_id))
        .first(conn)
        .optional()
}

pub fn profiles_for(conn: &mut SqliteConnection, user_ids: &[i32]) -> QueryResult<Vec<ProviderProfile>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    provider_profiles::table
        .filter(provider_profiles::user_id.eq_any(user_ids))
        .load(conn)
}

pub fn update_profile(
    conn: &mut SqliteConnection,
    user: &User,
    changes: &ProviderProfileChanges,
) -> QueryResult<ProviderProfile> {
    let profile = ensure_profile(conn, user)?;
    diesel::update(&profile).set(changes).get_result(conn)
}

/// Newest first.
pub fn portfolio_for(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<PortfolioItem>> {
    provider_portfolio::table
        .filter(provider_portfolio::user_id.eq(user_id))
        .order((
            provider_portfolio::created_at.desc(),
            provider_portfolio::id.desc(),
        ))
        .load(conn)
}

pub fn add_item(
    conn: &mut SqliteConnection,
    user_id: i32,
    form: &PortfolioForm,
) -> QueryResult<AddOutcome> {
    let image_url = form.image_url.trim();
    if !(image_url.starts_with("http://") || image_url.starts_with("https://")) {
        return Ok(AddOutcome::BadUrl);
    }

    // Count and insert under one write lock so concurrent adds cannot
    // overshoot the cap.
    conn.immediate_transaction(|conn| {
        let existing: i64 = provider_portfolio::table
            .filter(provider_portfolio::user_id.eq(user_id))
            .count()
            .get_result(conn)?;
        if existing >= MAX_PORTFOLIO_ITEMS as i64 {
            return Ok(AddOutcome::Full);
        }

        diesel::insert_into(provider_portfolio::table)
            .values(NewPortfolioItem {
                user_id,
                image_url: clip(image_url, 400),
                service_type: clip(&form.service_type, 30),
                caption: clip(&form.caption, 120),
                created_at: Utc::now().naive_utc(),
            })
            .execute(conn)?;
        Ok(AddOutcome::Added)
    })
}

/// Deletes the item only if `user_id` owns it.
pub fn delete_item(conn: &mut SqliteConnection, user_id: i32, item_id: i32) -> QueryResult<bool> {
    let deleted = diesel::delete(
        provider_portfolio::table
            .filter(provider_portfolio::id.eq(item_id))
            .filter(provider_portfolio::user_id.eq(user_id)),
    )
    .execute(conn)?;
    Ok(deleted == 1)
}

pub async fn profile_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider_id): Path<i32>,
) -> Result<Response, AppError> {
    let viewer = current_user(&state, &headers).await?;

    let found = state
        .db
        .run(move |conn| {
            let provider = users::table
                .find(provider_id)
                .first::<User>(conn)
                .optional()?
                .filter(|u| u.has_role(Role::Provider));
            let Some(provider) = provider else {
                return Ok(None);
            };
            let profile = find_profile(conn, provider.id)?;
            let portfolio = portfolio_for(conn, provider.id)?;
            Ok(Some((provider, profile, portfolio)))
        })
        .await?;

    let Some((provider, profile, mut portfolio)) = found else {
        return Ok(Redirect::to("/jobs").into_response());
    };
    portfolio.truncate(MAX_PORTFOLIO_ITEMS);
    let badges = badges_for_profile(profile.as_ref());
    let profile = profile.unwrap_or_else(|| ProviderProfile::blank_for(&provider));

    let mut context = page_context(viewer.as_ref());
    context.insert("provider", &provider);
    context.insert("profile", &profile);
    context.insert("badges", &badges);
    context.insert("portfolio", &portfolio);
    Ok(state.views.render("provider_profile.html", &context)?.into_response())
}

pub async fn my_profile_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let owner = user.clone();
    let profile = state
        .db
        .run(move |conn| Ok(ensure_profile(conn, &owner)?))
        .await?;

    let mut context = page_context(Some(&user));
    flash.insert_into(&mut context);
    context.insert("badges", &badges_for_profile(Some(&profile)));
    context.insert("profile", &profile);
    Ok(state.views.render("me_provider.html", &context)?.into_response())
}

pub async fn save_my_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let changes = form.into_changes();
    let user_id = user.id;
    state
        .db
        .run(move |conn| Ok(update_profile(conn, &user, &changes)?))
        .await?;
    log::info!("Provider {} updated their profile", user_id);

    Ok(Redirect::to("/me/provider?saved=1").into_response())
}

pub async fn my_portfolio_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let owner = user.clone();
    let (profile, mut items) = state
        .db
        .run(move |conn| {
            let profile = ensure_profile(conn, &owner)?;
            let items = portfolio_for(conn, owner.id)?;
            Ok((profile, items))
        })
        .await?;
    let count = items.len();
    items.truncate(MAX_PORTFOLIO_ITEMS);

    let mut context = page_context(Some(&user));
    flash.insert_into(&mut context);
    context.insert("profile", &profile);
    context.insert("badges", &badges_for_profile(Some(&profile)));
    context.insert("items", &items);
    context.insert("count", &count);
    context.insert("max_count", &MAX_PORTFOLIO_ITEMS);
    Ok(state.views.render("me_portfolio.html", &context)?.into_response())
}

pub async fn add_portfolio_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PortfolioForm>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let user_id = user.id;
    let outcome = state
        .db
        .run(move |conn| Ok(add_item(conn, user_id, &form)?))
        .await?;

    let location = match outcome {
        AddOutcome::Added => {
            log::info!("Provider {} added a portfolio item", user_id);
            "/me/portfolio?added=1"
        }
        AddOutcome::BadUrl => "/me/portfolio?err=bad_url",
        AddOutcome::Full => "/me/portfolio?err=max6",
    };
    Ok(Redirect::to(location).into_response())
}

pub async fn delete_portfolio_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<i32>,
) -> Result<Response, AppError> {
    let Some(user) = user_with_role(&state, &headers, Role::Provider).await? else {
        return Ok(to_login());
    };

    let user_id = user.id;
    let deleted = state
        .db
        .run(move |conn| Ok(delete_item(conn, user_id, item_id)?))
        .await?;
    if deleted {
        log::info!("Provider {} deleted portfolio item {}", user_id, item_id);
    } else {
        log::warn!("Provider {} cannot delete portfolio item {}", user_id, item_id);
    }

    Ok(Redirect::to("/me/portfolio?deleted=1").into_response())
}
