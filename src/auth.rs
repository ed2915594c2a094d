use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    dev::Payload,
    http::StatusCode,
    web, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::deadline::{iso_timestamp, local_now};
use crate::error::{AppError, Notice, StoreError};
use crate::models::User;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

/// Identity attached to a request by the authentication middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub username: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        CurrentUser {
            user_id: claims.sub,
            username: claims.username,
        }
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<CurrentUser>()
                .cloned()
                .ok_or(AppError::Unauthenticated),
        )
    }
}

#[derive(Deserialize)]
pub struct SignupInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    notice: Notice,
    token: String,
    user_id: String,
    username: String,
}

// JWT Creation
pub fn create_jwt(
    user: &User,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user.user_id.clone(),
        username: user.username.clone(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// POST /auth/register
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> Result<HttpResponse, AppError> {
    let SignupInfo { username, password } = signup_info.into_inner();
    let username = username.trim().to_string();
    let password = password.trim().to_string();

    if username.is_empty() || password.is_empty() {
        return Ok(Notice::new("Please fill in all fields.", "/auth/register")
            .respond(StatusCode::BAD_REQUEST));
    }

    let cost = data.config.bcrypt_cost;
    let password_hash = web::block(move || hash(password, cost)).await??;

    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        username,
        password_hash,
        created_at: iso_timestamp(local_now()),
    };

    match data.store.insert_user(&new_user).await {
        Ok(()) => {
            info!("User registered: {}", new_user.user_id);
            Ok(Notice::new("Account created! Please log in.", "/auth/login")
                .respond(StatusCode::CREATED))
        }
        Err(StoreError::DuplicateUsername) => {
            debug!("Registration rejected, username taken: {}", new_user.username);
            Err(StoreError::DuplicateUsername.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> Result<HttpResponse, AppError> {
    let LoginInfo { username, password } = login_info.into_inner();
    let username = username.trim();
    let password = password.trim().to_string();

    let user = match data.store.find_user_by_username(username).await? {
        Some(user) => user,
        None => return Ok(invalid_credentials()),
    };

    let stored_hash = user.password_hash.clone();
    let verified = web::block(move || verify(password, &stored_hash))
        .await?
        .unwrap_or(false);
    if !verified {
        return Ok(invalid_credentials());
    }

    let token = create_jwt(&user, &data.config.jwt_secret, data.config.session_ttl_hours)?;
    let cookie = Cookie::build(SESSION_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::hours(data.config.session_ttl_hours))
        .finish();

    info!("User logged in: {}", user.user_id);
    Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
        notice: Notice::new(format!("Welcome back, {}!", user.username), "/dashboard"),
        token,
        user_id: user.user_id,
        username: user.username,
    }))
}

fn invalid_credentials() -> HttpResponse {
    Notice::new("Invalid username or password.", "/auth/login").respond(StatusCode::UNAUTHORIZED)
}

/// POST /auth/logout
pub async fn logout() -> HttpResponse {
    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();
    HttpResponse::Ok()
        .cookie(removal)
        .json(Notice::new("You are logged out.", "/auth/login"))
}
