//! User lookup in the receiving application's database.
//!
//! The `users` table belongs to the receiving application; this service
//! only reads it to decide between the login and signup handoff variants,
//! so no migrations are shipped and the query is checked at runtime.

use chrono::NaiveDateTime;
use sqlx::{FromRow, Pool, Postgres};

/// Minimal user row needed for a login handoff.
#[derive(Debug, FromRow, PartialEq)]
pub struct User {
    pub id: i32,
    /// Stored without a zone by the receiving application, interpreted as
    /// UTC. NULL until the user completes a first login there.
    pub last_login_at: Option<NaiveDateTime>,
}

impl User {
    /// Find a user row by authenticated email.
    ///
    /// `None` means the email is new and the signup variant applies.
    pub async fn find_by_email(
        conn: &Pool<Postgres>,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, last_login_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(conn)
        .await
    }
}
