use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_email::Email;

use super::{auth::AuthService, utils};
use crate::{
    db::{
        user::{NewUser, User, UserStore, EMAIL_MAX_CHARS, USERNAME_MAX_CHARS},
        StoreError,
    },
    Error,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: Email,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub username: String,
}

pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, Error> {
        let username = req.username.trim();
        if username.is_empty() {
            return Err(Error::InvalidArgument("username is required".to_string()));
        }
        if username.chars().count() > USERNAME_MAX_CHARS {
            return Err(Error::InvalidArgument(format!(
                "username is longer than {USERNAME_MAX_CHARS} characters"
            )));
        }
        if req.email.as_str().chars().count() > EMAIL_MAX_CHARS {
            return Err(Error::InvalidArgument(format!(
                "email is longer than {EMAIL_MAX_CHARS} characters"
            )));
        }
        utils::check_password(&req.password)?;

        // Hash password
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|err| Error::Internal(format!("unable to hash password: {err}")))?
            .to_string();

        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: req.email.as_str().to_string(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                err if err.violates_unique("email") => {
                    Error::Conflict(format!("user with email {} already exists", req.email))
                }
                err if err.violates_unique("username") => {
                    Error::Conflict(format!("user with username {username} already exists"))
                }
                StoreError::UniqueViolation(_) => Error::Conflict("user already exists".to_string()),
                err => Error::Store(err),
            })?;
        tracing::info!("user created with id: {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, Error> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or(Error::NotFound("user"))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self.store.find_user_by_email(email).await?)
    }

    pub async fn search_by_username(&self, username: &str) -> Result<User, Error> {
        self.store
            .find_user_by_username(username.trim())
            .await?
            .ok_or(Error::NotFound("user"))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, Error> {
        Ok(self.store.list_users().await?)
    }
}

async fn create_user(
    State((_, users)): State<(Arc<AuthService>, Arc<UserService>)>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, Error> {
    let user = users.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    headers: HeaderMap,
    State((service, users)): State<(Arc<AuthService>, Arc<UserService>)>,
) -> Result<impl IntoResponse, Error> {
    utils::validate_auth_token(&headers, &service)?;
    Ok(Json(users.list_users().await?))
}

async fn get_user(
    headers: HeaderMap,
    State((service, users)): State<(Arc<AuthService>, Arc<UserService>)>,
) -> Result<impl IntoResponse, Error> {
    let uid = utils::validate_auth_token(&headers, &service)?;
    tracing::info!("Token validation succeeded for user: {}", uid);
    Ok(Json(users.get_user(uid).await?))
}

async fn search_user(
    headers: HeaderMap,
    State((service, users)): State<(Arc<AuthService>, Arc<UserService>)>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, Error> {
    utils::validate_auth_token(&headers, &service)?;
    Ok(Json(users.search_by_username(&query.username).await?))
}

pub fn user_routes(service: Arc<AuthService>, users: Arc<UserService>) -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/me", get(get_user))
        .route("/users/search", get(search_user))
        .with_state((service, users))
}
