use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{jobs, proposals, provider_portfolio, provider_profiles, users};

/// Maximum number of portfolio items a provider may keep.
pub const MAX_PORTFOLIO_ITEMS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A customer posting service jobs.
    Owner,
    /// A technician bidding on jobs.
    Provider,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Provider => "provider",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "provider" => Ok(Role::Provider),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Job lifecycle. The only transition is `Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Open,
    Closed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub role: String,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role.as_str()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub role: &'a str,
    pub name: &'a str,
    pub phone: &'a str,
    pub city: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = jobs)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Job {
    pub id: i32,
    pub owner_id: i32,
    pub service_type: String,
    pub city: String,
    pub district: String,
    pub address_note: String,
    pub ac_type: String,
    pub units: i32,
    pub floor: String,
    pub urgent: bool,
    pub time_window: String,
    pub description: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl Job {
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open.as_str()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub owner_id: i32,
    pub service_type: String,
    pub city: String,
    pub district: String,
    pub address_note: String,
    pub ac_type: String,
    pub units: i32,
    pub floor: String,
    pub urgent: bool,
    pub time_window: String,
    pub description: String,
    pub status: &'static str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = proposals)]
#[diesel(belongs_to(Job))]
#[diesel(belongs_to(User, foreign_key = provider_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Proposal {
    pub id: i32,
    pub job_id: i32,
    pub provider_id: i32,
    pub price: i32,
    pub available_time: String,
    pub warranty: String,
    pub note: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = proposals)]
pub struct NewProposal {
    pub job_id: i32,
    pub provider_id: i32,
    pub price: i32,
    pub available_time: String,
    pub warranty: String,
    pub note: String,
    pub created_at: NaiveDateTime,
}

/// One-to-one extension of a provider account. The `verified_*` flags are
/// flipped by an operator after reviewing the submitted document URLs.
#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = provider_profiles)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderProfile {
    pub id: i32,
    pub user_id: i32,
    pub display_name: String,
    pub shop_name: String,
    pub city: String,
    pub specialties: String,
    pub bio: String,
    pub verified_identity: bool,
    pub verified_business: bool,
    pub verified_license: bool,
    pub verified_at: Option<NaiveDateTime>,
    pub identity_doc_url: String,
    pub business_doc_url: String,
    pub license_doc_url: String,
    pub updated_at: NaiveDateTime,
}

impl ProviderProfile {
    /// Unsaved blank profile for providers that predate profile creation.
    pub fn blank_for(user: &User) -> Self {
        Self {
            id: 0,
            user_id: user.id,
            display_name: String::new(),
            shop_name: String::new(),
            city: user.city.clone(),
            specialties: String::new(),
            bio: String::new(),
            verified_identity: false,
            verified_business: false,
            verified_license: false,
            verified_at: None,
            identity_doc_url: String::new(),
            business_doc_url: String::new(),
            license_doc_url: String::new(),
            updated_at: user.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = provider_profiles)]
pub struct NewProviderProfile<'a> {
    pub user_id: i32,
    pub city: &'a str,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = provider_profiles)]
pub struct ProviderProfileChanges {
    pub display_name: String,
    pub shop_name: String,
    pub city: String,
    pub specialties: String,
    pub bio: String,
    pub identity_doc_url: String,
    pub business_doc_url: String,
    pub license_doc_url: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = provider_portfolio)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PortfolioItem {
    pub id: i32,
    pub user_id: i32,
    pub image_url: String,
    pub service_type: String,
    pub caption: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = provider_portfolio)]
pub struct NewPortfolioItem {
    pub user_id: i32,
    pub image_url: String,
    pub service_type: String,
    pub caption: String,
    pub created_at: NaiveDateTime,
}

/// Verification badge as shown next to a provider's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub key: &'static str,
    pub label: &'static str,
    pub ok: bool,
    pub date: Option<String>,
}

/// Badges for a provider, all unearned when the provider has no profile.
/// The three flags share a single verification date.
pub fn badges_for_profile(profile: Option<&ProviderProfile>) -> Vec<Badge> {
    let date = profile
        .and_then(|p| p.verified_at)
        .map(|at| at.format("%Y-%m-%d").to_string());
    let flag = |f: fn(&ProviderProfile) -> bool| profile.map(f).unwrap_or(false);

    vec![
        Badge {
            key: "identity",
            label: "Identity verified",
            ok: flag(|p| p.verified_identity),
            date: date.clone(),
        },
        Badge {
            key: "business",
            label: "Business verified",
            ok: flag(|p| p.verified_business),
            date: date.clone(),
        },
        Badge {
            key: "license",
            label: "License on file",
            ok: flag(|p| p.verified_license),
            date,
        },
    ]
}
