use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::{Role, User};

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub birth_date: Option<NaiveDate>,
    pub grade: Option<i32>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct Credentials {
    pub id: i32,
    pub password_hash: String,
    pub role: String,
}

pub async fn insert(pool: &PgPool, user: NewUser) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"INSERT INTO users (email, password_hash, display_name, role, birth_date, grade, country, phone)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING id"#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(user.role.as_str())
    .bind(user.birth_date)
    .bind(user.grade)
    .bind(&user.country)
    .bind(&user.phone)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"SELECT id, email, display_name, role, birth_date, grade, country, phone,
                  wallet_balance_cents, created_at
           FROM users
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn credentials_by_email(pool: &PgPool, email: &str) -> Result<Option<Credentials>, sqlx::Error> {
    sqlx::query_as::<_, Credentials>("SELECT id, password_hash, role FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}
