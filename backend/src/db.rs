use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;

use crate::error::AppError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// Per-connection pragmas. SQLite leaves foreign keys off by default and
/// fails immediately on a locked database without a busy timeout.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Creates the tables and indexes that do not exist yet.
pub fn apply_schema(conn: &mut SqliteConnection) -> Result<(), AppError> {
    conn.batch_execute(SCHEMA)?;
    Ok(())
}

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Opens the SQLite file at `database_url`, applying the schema once.
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, AppError> {
        log::info!("Opening database at {}", database_url);
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: Duration::from_secs(5),
            }))
            .build(manager)
            .map_err(|e| {
                log::error!("Failed to build connection pool: {}", e);
                e
            })?;

        let mut conn = pool.get()?;
        conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        apply_schema(&mut conn)?;
        log::info!("Database schema is up to date");

        Ok(Self { pool })
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    use diesel::Connection;

    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    conn.batch_execute("PRAGMA foreign_keys = ON;")
        .expect("enable foreign keys");
    apply_schema(&mut conn).expect("apply schema");
    conn
}

#[cfg(test)]
pub(crate) fn insert_test_user(
    conn: &mut SqliteConnection,
    role: crate::models::Role,
    email: &str,
) -> crate::models::User {
    use crate::models::{NewUser, User};
    use crate::schema::users;
    use diesel::prelude::*;

    diesel::insert_into(users::table)
        .values(NewUser {
            role: role.as_str(),
            name: "Tsai",
            phone: "0922",
            city: "Taichung",
            email,
            password_hash: "x",
            created_at: chrono::Utc::now().naive_utc(),
        })
        .returning(User::as_returning())
        .get_result(conn)
        .expect("insert test user")
}
