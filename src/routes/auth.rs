use std::sync::Arc;
use std::time::Duration;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_email::Email;
use uuid::Uuid;

use super::{
    user::{CreateUserRequest, UserService},
    utils,
};
use crate::{db::auth::RefreshTokenStore, Error};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user_id
    pub email: String,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Email,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

// Authentication service
pub struct AuthService {
    users: Arc<UserService>,
    tokens: Arc<dyn RefreshTokenStore>,
    settings: TokenSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<UserService>,
        tokens: Arc<dyn RefreshTokenStore>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            settings,
        }
    }

    pub async fn register(&self, req: CreateUserRequest) -> Result<AuthResponse, Error> {
        let user = self.users.create_user(req).await?;
        self.issue_tokens(user.id, &user.email).await
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, Error> {
        tracing::info!("Attempting to log in user with email: {}", req.email);

        // Unknown email and wrong password look the same to the caller
        let user = self
            .users
            .find_by_email(req.email.as_str())
            .await?
            .ok_or(Error::Unauthorized("invalid credentials"))?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|err| Error::Internal(format!("stored password hash is malformed: {err}")))?;
        if Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Invalid credentials for user: {}", user.id);
            return Err(Error::Unauthorized("invalid credentials"));
        }
        tracing::info!("Password verified for user: {}", user.id);

        self.issue_tokens(user.id, &user.email).await
    }

    /// Exchanges a live refresh token for a new pair. The old token is
    /// consumed, so only one exchange per token ever succeeds.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, Error> {
        let user = self
            .tokens
            .consume_refresh_token(refresh_token)
            .await?
            .ok_or(Error::Unauthorized("invalid refresh token"))?;

        self.issue_tokens(user.id, &user.email).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), Error> {
        if !self.tokens.revoke_refresh_token(refresh_token).await? {
            tracing::debug!("logout with unknown refresh token");
        }
        Ok(())
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, Error> {
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 10;
        validation.validate_exp = true;

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::debug!("Error decoding token: {:?}", err);
            Error::Unauthorized("invalid token")
        })?;

        Ok(token_data.claims)
    }

    async fn issue_tokens(&self, user_id: i64, email: &str) -> Result<AuthResponse, Error> {
        let now = Utc::now();

        let access_claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (now + self.settings.access_token_ttl).timestamp(),
            iat: now.timestamp(),
        };
        let access_token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &access_claims,
            &jsonwebtoken::EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )
        .map_err(|err| Error::Internal(format!("unable to sign token: {err}")))?;

        let refresh_token = Uuid::new_v4().to_string();
        let expires_at = now + self.settings.refresh_token_ttl;
        self.tokens
            .store_refresh_token(user_id, &refresh_token, expires_at)
            .await?;
        tracing::info!("Stored refresh token for user: {}", user_id);

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.settings.access_token_ttl.as_secs(),
            user_id,
        })
    }
}

// Route for handling new user registration
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, Error> {
    let response = service.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// Route for handling user login
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(service.login(req).await?))
}

// Route for handling token refresh
pub async fn refresh_token_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(service.refresh_token(&req.refresh_token).await?))
}

pub async fn logout_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, Error> {
    service.logout(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify_handler(
    headers: HeaderMap,
    State(service): State<Arc<AuthService>>,
) -> Result<impl IntoResponse, Error> {
    let claims = service.verify_token(utils::bearer_token(&headers)?)?;
    Ok(Json(claims))
}

pub fn auth_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_token_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/verify", get(verify_handler))
        .with_state(service)
}
