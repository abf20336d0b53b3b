use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;

use crate::auth;
use crate::error::AppError;
use crate::models::{NewUser, Role, User};
use crate::provider::ensure_profile;
use crate::schema::users;
use crate::views::{page_context, Flash};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub role: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub city: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// The signed-in user, or `None` when the cookie is missing, invalid, or
/// names a user that no longer exists.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, AppError> {
    let Some(user_id) = state.sessions.user_id(headers) else {
        return Ok(None);
    };
    state
        .db
        .run(move |conn| Ok(users::table.find(user_id).first::<User>(conn).optional()?))
        .await
}

/// The signed-in user if they hold `role`.
pub async fn user_with_role(
    state: &AppState,
    headers: &HeaderMap,
    role: Role,
) -> Result<Option<User>, AppError> {
    Ok(current_user(state, headers)
        .await?
        .filter(|user| user.has_role(role)))
}

pub fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .first::<User>(conn)
        .optional()
}

/// Creates the account, plus an empty profile for providers. `None` when the
/// email is already taken.
pub fn create_account(
    conn: &mut SqliteConnection,
    role: Role,
    form: &RegisterForm,
    email: &str,
) -> Result<Option<User>, AppError> {
    if find_by_email(conn, email)?.is_some() {
        return Ok(None);
    }

    let password_hash = auth::hash_password(&form.password)?;
    let new_user = NewUser {
        role: role.as_str(),
        name: form.name.trim(),
        phone: form.phone.trim(),
        city: form.city.trim(),
        email,
        password_hash: &password_hash,
        created_at: Utc::now().naive_utc(),
    };

    let created = conn.transaction(|conn| {
        let user = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)?;
        if role == Role::Provider {
            ensure_profile(conn, &user)?;
        }
        Ok::<_, DieselError>(user)
    });

    match created {
        Ok(user) => Ok(Some(user)),
        // Lost a race against a concurrent registration with the same email.
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Redirect to `location` that also starts a session for `user_id`.
fn signed_in(state: &AppState, user_id: i32, location: &str) -> Result<Response, AppError> {
    let cookie = state.sessions.session_cookie(user_id)?;
    Ok(([(SET_COOKIE, cookie)], Redirect::to(location)).into_response())
}

pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let user = current_user(&state, &headers).await?;
    let context = page_context(user.as_ref());
    Ok(state.views.render("home.html", &context)?.into_response())
}

pub async fn register_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let user = current_user(&state, &headers).await?;
    let mut context = page_context(user.as_ref());
    flash.insert_into(&mut context);
    Ok(state.views.render("register.html", &context)?.into_response())
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let Ok(role) = form.role.trim().to_lowercase().parse::<Role>() else {
        log::debug!("Registration rejected: unknown role {:?}", form.role);
        return Ok(Redirect::to("/register?err=bad_role").into_response());
    };

    let email = normalize_email(&form.email);
    let created = state
        .db
        .run(move |conn| create_account(conn, role, &form, &email))
        .await?;

    match created {
        Some(user) => {
            log::info!("Registered {} account {}", role, user.id);
            signed_in(&state, user.id, "/")
        }
        None => {
            log::debug!("Registration rejected: email already in use");
            Ok(Redirect::to("/register?err=email_exists").into_response())
        }
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let user = current_user(&state, &headers).await?;
    let mut context = page_context(user.as_ref());
    flash.insert_into(&mut context);
    Ok(state.views.render("login.html", &context)?.into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = normalize_email(&form.email);
    let found = state
        .db
        .run(move |conn| Ok(find_by_email(conn, &email)?))
        .await?;

    // Hash checks run after the pooled connection is returned.
    let user = match found {
        Some(user) => {
            tokio::task::spawn_blocking(move || {
                auth::verify_password(&form.password, &user.password_hash).then_some(user)
            })
            .await?
        }
        None => None,
    };

    match user {
        Some(user) => {
            log::info!("User {} logged in", user.id);
            signed_in(&state, user.id, "/")
        }
        None => {
            log::debug!("Login rejected");
            Ok(Redirect::to("/login?err=bad_login").into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, state.sessions.removal_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}
