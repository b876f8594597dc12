// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, post, web, Error, HttpMessage};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use utoipa::ToSchema;
use validator::Validate;

use crate::db;
use crate::error::{ok, ApiError, ApiResult};
use crate::models::Role;
use crate::{phone, AppState};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    role: Role,
    exp: usize,
}

/// Caller identity placed into request extensions by [`JwtMiddleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin only"))
        }
    }

    /// Admins always pass.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("role not allowed"))
        }
    }

    pub fn ensure_owner_or_admin(&self, owner_id: i32) -> Result<(), ApiError> {
        if self.is_admin() || self.id == owner_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("only the owner or an admin may do this"))
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 80))]
    pub display_name: String,
    pub role: Role,
    pub birth_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 12))]
    pub grade: Option<i32>,
    #[validate(length(equal = 2))]
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
    pub role: Role,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid data"),
        (status = 403, description = "Role cannot be self-assigned"),
        (status = 409, description = "Email already registered")
    )
)]
#[post("/auth/register")]
pub async fn register(state: web::Data<AppState>, payload: web::Json<RegisterRequest>) -> ApiResult {
    let payload = payload.into_inner();
    payload.validate()?;

    if payload.role == Role::Admin {
        return Err(ApiError::Forbidden("admin accounts cannot be self-registered"));
    }

    let country = payload.country.as_deref().map(str::to_ascii_uppercase);
    if let Some(c) = country.as_deref() {
        if phone::find_by_iso(c).is_none() {
            return Err(ApiError::BadRequest(format!("unknown country `{c}`")));
        }
    }

    let phone_e164 = match (payload.phone.as_deref(), country.as_deref()) {
        (Some(raw), Some(c)) => Some(phone::validate(c, raw)?),
        (Some(_), None) => {
            return Err(ApiError::BadRequest("country is required with phone".to_string()))
        }
        (None, _) => None,
    };

    if let Some(birth_date) = payload.birth_date {
        if birth_date >= Utc::now().date_naive() {
            return Err(ApiError::BadRequest("birth_date must be in the past".to_string()));
        }
    }

    let password = payload.password.clone();
    let password_hash = web::block(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking pool: {e}")))?
        .map_err(|e| ApiError::Internal(format!("bcrypt hash error: {e}")))?;

    let user_id = db::users::insert(
        &state.pool,
        db::users::NewUser {
            email: payload.email.trim().to_lowercase(),
            password_hash,
            display_name: payload.display_name.trim().to_string(),
            role: payload.role,
            birth_date: payload.birth_date,
            grade: payload.grade,
            country,
            phone: phone_e164,
        },
    )
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, "email already registered"))?;

    let token = generate_jwt(&state.config.jwt_secret, state.config.jwt_ttl_days, user_id, payload.role)?;
    log::info!("user registered user_id={} role={}", user_id, payload.role);

    Ok(ok(AuthResponse {
        token,
        user_id,
        role: payload.role,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> ApiResult {
    payload.validate()?;

    let Some(creds) = db::users::credentials_by_email(&state.pool, &payload.email.trim().to_lowercase()).await?
    else {
        return Err(ApiError::Unauthorized("invalid credentials"));
    };

    let password = payload.password.clone();
    let stored_hash = creds.password_hash.clone();
    let valid = web::block(move || verify(password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking pool: {e}")))?
        .map_err(|e| ApiError::Internal(format!("bcrypt verify error: {e}")))?;

    if !valid {
        return Err(ApiError::Unauthorized("invalid credentials"));
    }

    let role: Role = creds.role.parse().map_err(ApiError::Internal)?;
    let token = generate_jwt(&state.config.jwt_secret, state.config.jwt_ttl_days, creds.id, role)?;

    Ok(ok(AuthResponse {
        token,
        user_id: creds.id,
        role,
    }))
}

#[get("/me")]
pub async fn me(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    let profile = db::users::get(&state.pool, user.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(ok(profile))
}

pub fn generate_jwt(secret: &str, ttl_days: i64, user_id: i32, role: Role) -> Result<String, ApiError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(ttl_days))
        .ok_or_else(|| ApiError::Internal("token expiry overflow".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("jwt encode error: {e}")))
}

pub fn decode_token(secret: &str, token: &str) -> Result<AuthUser, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| AuthUser {
        id: data.claims.sub,
        role: data.claims.role,
    })
    .map_err(|_| ApiError::Unauthorized("invalid token"))
}

/// Middleware that:
/// - reads `Authorization: Bearer <jwt>`
/// - validates the JWT against the configured secret
/// - puts an [`AuthUser`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(secret) = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.jwt_secret.clone())
        else {
            return Box::pin(async move {
                Err(ApiError::Internal("app state not registered".to_string()).into())
            });
        };

        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        let Some(token) = token else {
            return Box::pin(async move {
                Err(ApiError::Unauthorized("missing or invalid Authorization header").into())
            });
        };

        match decode_token(&secret, token) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
