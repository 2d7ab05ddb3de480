use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

// --- Core Catalog Schemas (Mapped to Database) ---

/// Actor
///
/// A row of the `actors` table. The same shape is accepted as the request body for
/// `POST /actor_create` (id ignored) and `PUT /actor_update` (id selects the row),
/// and is embedded in film payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Actor {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    /// "male" or "female". Kept as text so an unknown value reaches validation
    /// instead of failing JSON decoding.
    #[serde(default)]
    pub gender: String,
    #[schema(value_type = String, format = Date, example = "1967-07-18")]
    pub date_of_birth: NaiveDate,
}

/// Film
///
/// A row of the `films` table plus the actors linked through `actor_film`.
/// `list_actors` is populated on read; on create it carries the actors to link
/// (existing ones are matched by exact name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Film {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, format = Date, example = "2001-06-18")]
    pub release_date: NaiveDate,
    pub rating: f32,
    #[serde(default)]
    #[sqlx(skip)]
    pub list_actors: Vec<Actor>,
}

/// ActorWithFilms
///
/// Output schema for `GET /get_list_actors_films`: one actor and every film they appear in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Default)]
pub struct ActorWithFilms {
    pub id: i32,
    pub name: String,
    pub gender: String,
    #[schema(value_type = String, format = Date)]
    pub date_of_birth: NaiveDate,
    pub films: Vec<Film>,
}

impl ActorWithFilms {
    pub fn new(actor: Actor, films: Vec<Film>) -> Self {
        Self {
            id: actor.id,
            name: actor.name,
            gender: actor.gender,
            date_of_birth: actor.date_of_birth,
            films,
        }
    }
}

// --- Users & Roles ---

/// Role
///
/// The RBAC field stored in `users.role_id` and embedded in every token.
/// Serialized as its integer code (1 = user, 2 = admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum Role {
    User = 1,
    Admin = 2,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> i32 {
        role as i32
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::User),
            2 => Ok(Role::Admin),
            other => Err(format!("unknown role {other}")),
        }
    }
}

/// User
///
/// A row of the `users` table. `password` always holds the bcrypt hash. Not `Serialize`;
/// responses use `UserResponse`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    #[sqlx(rename = "name")]
    pub username: String,
    pub password: String,
    #[sqlx(rename = "role_id")]
    pub role: Role,
}

/// NewUser
///
/// Insert payload for the repository, produced by the auth service after hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Request Payloads (Input Schemas) ---

/// SignUpRequest
///
/// Input payload for `POST /auth/sign_up`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// 1 = user, 2 = admin. 0 (or absent) is treated as missing.
    #[serde(default)]
    pub role: i32,
}

/// SignInRequest
///
/// Input payload for `POST /auth/sign_in`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignInRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// FilmListQuery
///
/// Query parameters of `GET /films_get_list`.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct FilmListQuery {
    /// "", "name" or "release_date".
    pub sort_by: Option<String>,
}

/// FilmSearchQuery
///
/// Query parameters of `GET /films/search`. At least one must be non-blank.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct FilmSearchQuery {
    /// Fragment of an actor's name.
    pub actor: Option<String>,
    /// Fragment of the film's name.
    pub movie: Option<String>,
}

// --- Response Schemas (Output) ---

/// SignUpResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignUpResponse {
    pub token: String,
}

/// UserResponse
///
/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    #[schema(value_type = i32)]
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// AuthResponse
///
/// Output of `POST /auth/sign_in`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserResponse,
}

/// MessageResponse
///
/// Flat `{"message": "..."}` body used for delete confirmations and every error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Join Rows (Internal) ---

/// ActorFilmRow
///
/// One row of `actors LEFT JOIN actor_film LEFT JOIN films`: an actor and at most one
/// of their films. Film columns are NULL for actors without films.
#[derive(Debug, Clone, FromRow)]
pub struct ActorFilmRow {
    pub actor_id: i32,
    pub actor_name: String,
    pub actor_gender: String,
    pub actor_date_of_birth: NaiveDate,
    pub film_id: Option<i32>,
    pub film_name: Option<String>,
    pub film_description: Option<String>,
    pub film_release_date: Option<NaiveDate>,
    pub film_rating: Option<f32>,
}

/// FilmActorRow
///
/// One row of `films LEFT JOIN actor_film LEFT JOIN actors`: a film and at most one
/// of its actors.
#[derive(Debug, Clone, FromRow)]
pub struct FilmActorRow {
    pub film_id: i32,
    pub film_name: String,
    pub film_description: String,
    pub film_release_date: NaiveDate,
    pub film_rating: f32,
    pub actor_id: Option<i32>,
    pub actor_name: Option<String>,
    pub actor_gender: Option<String>,
    pub actor_date_of_birth: Option<NaiveDate>,
}
