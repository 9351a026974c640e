//! Axum integration: JWT issuing and verification, the authenticated-caller
//! extractor, and a router exposing the facade over HTTP.
//!
//! Authorization lives at this boundary. Handlers verify the bearer token,
//! build an [`Actor`] from the claims, and consult its predicates before
//! calling into the facade; the facade itself never sees tokens or roles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ::axum::Router;
use ::axum::extract::{FromRequestParts, Json, Path, State};
use ::axum::http::header::AUTHORIZATION;
use ::axum::http::request::Parts;
use ::axum::http::{HeaderMap, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::axum::routing::{get, post};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authz::Actor;
use crate::error::Error;
use crate::facade::Facade;
use crate::model::{
    Amenity, AmenityPatch, NewPlace, NewUser, Place, PlacePatch, Review, ReviewPatch, User,
    UserPatch,
};
use crate::store::Store;
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};

/// Errors returned by token helpers and the auth extractor.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Authorization header is missing.
    #[error("missing authorization header")]
    MissingAuthorization,
    /// Authorization header format is invalid.
    #[error("invalid authorization header")]
    InvalidAuthorization,
    /// JWT validation error.
    #[error("invalid token")]
    InvalidToken,
    /// Required claims are missing or invalid.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
    /// Token signing failed.
    #[error("failed to sign token")]
    Signing,
}

/// Rejection type for the auth extractor.
#[derive(Debug)]
pub struct AuthRejection {
    status: StatusCode,
    message: String,
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Signed claim set: subject is the user id, with the role flag and email
/// carried alongside so requests need no user lookup to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a UUID string.
    pub sub: String,
    /// Email at issue time.
    pub email: String,
    /// Administrator flag at issue time.
    pub is_admin: bool,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// JWT signing and verification state.
pub struct TokenAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("keys", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenAuth {
    /// Creates token state from a shared HS256 secret and a token lifetime.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl,
        }
    }

    /// Issues a token for a verified user.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::Signing)
    }

    /// Verifies a token and builds the caller identity from its claims.
    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        AuthUser::from_claims(data.claims)
    }
}

/// Authenticated caller, extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Identity and role for authorization decisions.
    pub actor: Actor,
    /// Email claim, as carried in the token.
    pub email: String,
}

impl AuthUser {
    fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let user_id = UserId::try_from(claims.sub.as_str())
            .map_err(|err| AuthError::InvalidClaims(err.to_string()))?;
        Ok(Self {
            actor: Actor::new(user_id, claims.is_admin),
            email: claims.email,
        })
    }
}

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<AuthUser>() {
            return Ok(existing.clone());
        }
        let token = bearer_token(&parts.headers)?;
        let auth = state.tokens.verify(&token)?;
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }
    Ok(token.to_string())
}

/// Shared handler state: the facade plus token settings.
pub struct AppState<S> {
    facade: Arc<Facade<S>>,
    tokens: Arc<TokenAuth>,
}

// Manual impl: `#[derive(Clone)]` would demand `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            facade: self.facade.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<S> AppState<S> {
    /// Creates handler state from a facade and token settings.
    pub fn new(facade: Facade<S>, tokens: TokenAuth) -> Self {
        Self {
            facade: Arc::new(facade),
            tokens: Arc::new(tokens),
        }
    }

    /// Returns the wrapped facade.
    pub fn facade(&self) -> &Facade<S> {
        &self.facade
    }

    /// Returns the token state.
    pub fn tokens(&self) -> &TokenAuth {
        &self.tokens
    }
}

/// HTTP error with a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            Error::Duplicate(_) | Error::Conflict(_) => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            Error::Validation(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            Error::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            Error::Hash(_) | Error::Store(_) => {
                tracing::error!(error = %err, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response: a bearer token plus the authenticated user.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

/// Place creation body. The host is always the authenticated caller, so
/// there is no host field to spoof.
#[derive(Debug, Deserialize)]
pub struct CreatePlace {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub city_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rooms: u32,
    pub bathrooms: u32,
    pub price_per_night: f64,
    pub max_guests: u32,
    #[serde(default)]
    pub amenity_ids: Vec<AmenityId>,
}

/// Review creation body. The author is always the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct CreateReview {
    pub place_id: PlaceId,
    pub rating: u8,
    pub comment: String,
}

/// Amenity creation body.
#[derive(Debug, Deserialize)]
pub struct CreateAmenity {
    pub name: String,
}

/// Builds the full API router over the given state.
pub fn router<S>(state: AppState<S>) -> Router
where
    S: Store + 'static,
{
    Router::new()
        .route("/auth/login", post(login::<S>))
        .route("/users", post(create_user::<S>).get(list_users::<S>))
        .route("/users/{id}", get(get_user::<S>).put(update_user::<S>))
        .route("/places", post(create_place::<S>).get(list_places::<S>))
        .route("/places/{id}", get(get_place::<S>).put(update_place::<S>))
        .route("/reviews", post(create_review::<S>).get(list_reviews::<S>))
        .route(
            "/reviews/{id}",
            get(get_review::<S>)
                .put(update_review::<S>)
                .delete(delete_review::<S>),
        )
        .route("/amenities", post(create_amenity::<S>).get(list_amenities::<S>))
        .route("/amenities/{id}", get(get_amenity::<S>).put(update_amenity::<S>))
        .with_state(state)
}

// Handlers

async fn login<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .facade
        .verify_credentials(&body.email, &body.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;
    let access_token = state
        .tokens
        .issue(&user)
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(LoginResponse { access_token, user }))
}

async fn create_user<S: Store>(
    State(state): State<AppState<S>>,
    Json(mut body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    // Open registration never grants the administrator role.
    body.is_admin = false;
    let user = state.facade.create_user(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.facade.users().await?))
}

async fn get_user<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.facade.user(&id).await?))
}

async fn update_user<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(id): Path<UserId>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    if !auth.actor.may_modify(&id).is_allowed() {
        return Err(ApiError::forbidden("cannot modify another user's account"));
    }
    if patch.is_admin.is_some() && !auth.actor.require_admin().is_allowed() {
        return Err(ApiError::forbidden("only administrators may change roles"));
    }
    Ok(Json(state.facade.update_user(&id, patch).await?))
}

async fn create_place<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(body): Json<CreatePlace>,
) -> Result<(StatusCode, Json<Place>), ApiError> {
    let input = NewPlace {
        name: body.name,
        description: body.description,
        address: body.address,
        city_id: body.city_id,
        latitude: body.latitude,
        longitude: body.longitude,
        host_id: auth.actor.user_id,
        rooms: body.rooms,
        bathrooms: body.bathrooms,
        price_per_night: body.price_per_night,
        max_guests: body.max_guests,
        amenity_ids: body.amenity_ids,
    };
    let place = state.facade.create_place(input).await?;
    Ok((StatusCode::CREATED, Json(place)))
}

async fn list_places<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Place>>, ApiError> {
    Ok(Json(state.facade.places().await?))
}

async fn get_place<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<PlaceId>,
) -> Result<Json<Place>, ApiError> {
    Ok(Json(state.facade.place(&id).await?))
}

async fn update_place<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(id): Path<PlaceId>,
    Json(patch): Json<PlacePatch>,
) -> Result<Json<Place>, ApiError> {
    let place = state.facade.place(&id).await?;
    if !auth.actor.may_modify(&place.host_id).is_allowed() {
        return Err(ApiError::forbidden("only the host or an administrator may edit a place"));
    }
    Ok(Json(state.facade.update_place(&id, patch).await?))
}

async fn create_review<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(body): Json<CreateReview>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let place = state.facade.place(&body.place_id).await?;
    if place.host_id == auth.actor.user_id {
        return Err(ApiError::forbidden("hosts cannot review their own place"));
    }
    let review = state
        .facade
        .create_review(body.place_id, auth.actor.user_id, body.rating, &body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_reviews<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.facade.reviews().await?))
}

async fn get_review<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>, ApiError> {
    Ok(Json(state.facade.review(&id).await?))
}

async fn update_review<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(id): Path<ReviewId>,
    Json(patch): Json<ReviewPatch>,
) -> Result<Json<Review>, ApiError> {
    let review = state.facade.review(&id).await?;
    if !auth.actor.may_modify(&review.user_id).is_allowed() {
        return Err(ApiError::forbidden(
            "only the author or an administrator may edit a review",
        ));
    }
    Ok(Json(state.facade.update_review(&id, patch).await?))
}

async fn delete_review<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, ApiError> {
    let review = state.facade.review(&id).await?;
    if !auth.actor.may_modify(&review.user_id).is_allowed() {
        return Err(ApiError::forbidden(
            "only the author or an administrator may delete a review",
        ));
    }
    state.facade.delete_review(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_amenity<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(body): Json<CreateAmenity>,
) -> Result<(StatusCode, Json<Amenity>), ApiError> {
    if !auth.actor.require_admin().is_allowed() {
        return Err(ApiError::forbidden("only administrators may create amenities"));
    }
    let amenity = state.facade.create_amenity(&body.name).await?;
    Ok((StatusCode::CREATED, Json(amenity)))
}

async fn list_amenities<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Amenity>>, ApiError> {
    Ok(Json(state.facade.amenities().await?))
}

async fn get_amenity<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<AmenityId>,
) -> Result<Json<Amenity>, ApiError> {
    Ok(Json(state.facade.amenity(&id).await?))
}

async fn update_amenity<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(id): Path<AmenityId>,
    Json(patch): Json<AmenityPatch>,
) -> Result<Json<Amenity>, ApiError> {
    if !auth.actor.require_admin().is_allowed() {
        return Err(ApiError::forbidden("only administrators may edit amenities"));
    }
    Ok(Json(state.facade.update_amenity(&id, patch).await?))
}
