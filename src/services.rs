//! Business rules between the handlers and the repository: validation, existence
//! checks, password hashing and token issuance.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use crate::{
    auth::Claims,
    config::AppConfig,
    models::{Actor, ActorWithFilms, Film, NewUser, Role, SignInRequest, SignUpRequest, User},
    repository::{RepositoryError, RepositoryState},
    validation::{FilmSort, SearchFilter, ValidationError},
};

const TOKEN_TTL_HOURS: i64 = 24;
/// Bounds of `users.name`, which is `VARCHAR(50)`.
const USERNAME_CHARS: std::ops::RangeInclusive<usize> = 3..=50;

/// ServiceError
///
/// Business-level failures. Repository errors pass through unchanged in kind so the
/// HTTP layer can log the cause and answer 500.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Services
///
/// Every service the handlers use, built once at startup over the same repository.
#[derive(Clone)]
pub struct Services {
    pub actors: ActorService,
    pub films: FilmService,
    pub catalog: CatalogService,
    pub auth: AuthService,
}

impl Services {
    pub fn new(repo: RepositoryState, config: &AppConfig) -> Self {
        Self {
            actors: ActorService::new(repo.clone()),
            films: FilmService::new(repo.clone()),
            catalog: CatalogService::new(repo.clone()),
            auth: AuthService::new(repo, &config.jwt_secret, config.bcrypt_cost),
        }
    }
}

// --- Actors ---

#[derive(Clone)]
pub struct ActorService {
    repo: RepositoryState,
}

impl ActorService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Creates an actor. Names are unique among actors.
    pub async fn add(&self, actor: &Actor) -> ServiceResult<Actor> {
        actor.validate()?;
        if self.repo.actor_exists_by_name(&actor.name).await? {
            return Err(ServiceError::AlreadyExists("actor already exists".to_string()));
        }
        let created = self.repo.create_actor(actor).await?;
        tracing::info!(actor_id = created.id, "actor created");
        Ok(created)
    }

    pub async fn update(&self, actor: &Actor) -> ServiceResult<Actor> {
        actor.validate()?;
        if !self.repo.actor_exists_by_id(actor.id).await? {
            return Err(actor_not_found());
        }
        // The row can still vanish between the check and the write.
        let updated = self
            .repo
            .update_actor(actor)
            .await?
            .ok_or_else(actor_not_found)?;
        tracing::info!(actor_id = updated.id, "actor updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        if !self.repo.actor_exists_by_id(id).await? || !self.repo.delete_actor(id).await? {
            return Err(actor_not_found());
        }
        tracing::info!(actor_id = id, "actor deleted");
        Ok(())
    }
}

fn actor_not_found() -> ServiceError {
    ServiceError::NotFound("actor not found".to_string())
}

// --- Films ---

#[derive(Clone)]
pub struct FilmService {
    repo: RepositoryState,
}

impl FilmService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// add
    ///
    /// Creates the film and links its embedded actors in one transaction. Every embedded
    /// actor must pass the same rules as a standalone actor, even the ones that already
    /// exist and are only matched by name.
    pub async fn add(&self, film: &Film) -> ServiceResult<Film> {
        film.validate()?;
        for actor in &film.list_actors {
            actor.validate()?;
        }
        if self.repo.film_exists_by_name(&film.name).await? {
            return Err(ServiceError::AlreadyExists("film already exists".to_string()));
        }
        let created = self.repo.create_film(film).await?;
        tracing::info!(
            film_id = created.id,
            actors = created.list_actors.len(),
            "film created"
        );
        Ok(created)
    }

    /// Replaces the film's own columns; its actor links are left as they are.
    pub async fn update(&self, film: &Film) -> ServiceResult<Film> {
        film.validate()?;
        if !self.repo.film_exists_by_id(film.id).await? {
            return Err(film_not_found());
        }
        let updated = self.repo.update_film(film).await?.ok_or_else(film_not_found)?;
        tracing::info!(film_id = updated.id, "film updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        if !self.repo.film_exists_by_id(id).await? || !self.repo.delete_film(id).await? {
            return Err(film_not_found());
        }
        tracing::info!(film_id = id, "film deleted");
        Ok(())
    }

    /// Every film with its actors. An empty catalog is an empty list.
    pub async fn get_films(&self, sort_by: &str) -> ServiceResult<Vec<Film>> {
        let sort = FilmSort::parse(sort_by)?;
        let films = self.repo.get_films(sort).await?;
        tracing::debug!(count = films.len(), ?sort, "films listed");
        Ok(films)
    }

    /// The best match with all of its actors, or an empty `Film` when nothing matches.
    pub async fn search_film(&self, filter: &SearchFilter) -> ServiceResult<Film> {
        filter.validate()?;
        Ok(self.repo.search_film(filter).await?.unwrap_or_default())
    }
}

fn film_not_found() -> ServiceError {
    ServiceError::NotFound("film not found".to_string())
}

// --- Actor/Film association ---

#[derive(Clone)]
pub struct CatalogService {
    repo: RepositoryState,
}

impl CatalogService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn get_actors_with_films(&self) -> ServiceResult<Vec<ActorWithFilms>> {
        Ok(self.repo.get_actors_with_films().await?)
    }
}

// --- Auth ---

/// AuthService
///
/// Owns the password and token lifecycle: bcrypt hashing on sign-up, hash comparison
/// on sign-in, HS256 tokens valid for 24 hours. Hashing runs on the blocking pool.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    encoding: EncodingKey,
    decoding: DecodingKey,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(repo: RepositoryState, secret: &str, bcrypt_cost: u32) -> Self {
        Self {
            repo,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            bcrypt_cost,
        }
    }

    /// create_user
    ///
    /// Registers a user and returns a token for them. Username, password and role are
    /// all required; the role must be a known code.
    pub async fn create_user(&self, request: SignUpRequest) -> ServiceResult<String> {
        if request.username.is_empty() || request.password.is_empty() || request.role == 0 {
            return Err(ValidationError("username, password and role are required".to_string()).into());
        }
        if !USERNAME_CHARS.contains(&request.username.chars().count()) {
            return Err(ValidationError("username must be from 3 to 50 characters".to_string()).into());
        }
        let role = Role::try_from(request.role).map_err(ValidationError)?;

        let cost = self.bcrypt_cost;
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))?;

        let new_user = NewUser {
            username: request.username,
            password_hash,
            role,
        };
        let user = self.repo.create_user(&new_user).await.map_err(|e| match e {
            RepositoryError::UniqueViolation { .. } => {
                ServiceError::AlreadyExists("user already exists".to_string())
            }
            other => other.into(),
        })?;

        tracing::info!(user_id = user.id, role = ?user.role, "user signed up");
        self.issue_token(&user)
    }

    /// verify_user
    ///
    /// Looks the user up by name and compares the password against the stored hash.
    /// An unknown user and a wrong password are indistinguishable to the caller.
    pub async fn verify_user(&self, request: SignInRequest) -> ServiceResult<(String, User)> {
        if request.username.is_empty() || request.password.is_empty() {
            return Err(ValidationError("username or password are required".to_string()).into());
        }

        let user = self
            .repo
            .get_user_by_username(&request.username)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        let password = request.password;
        let hash = user.password.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("hashing task failed: {e}")))?
            .unwrap_or(false);
        if !matches {
            return Err(ServiceError::Unauthorized);
        }

        tracing::info!(user_id = user.id, "user signed in");
        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    pub fn issue_token(&self, user: &User) -> ServiceResult<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    /// Checks signature and expiry.
    pub fn verify_token(&self, token: &str) -> ServiceResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| ServiceError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepository, Repository};
    use chrono::NaiveDate;
    use std::sync::Arc;

    const SECRET: &str = "unit-test-secret";

    fn services() -> (Arc<InMemoryRepository>, Services) {
        let repo = Arc::new(InMemoryRepository::new());
        let config = AppConfig {
            jwt_secret: SECRET.to_string(),
            bcrypt_cost: 4,
            ..AppConfig::default()
        };
        let services = Services::new(repo.clone(), &config);
        (repo, services)
    }

    fn actor(name: &str) -> Actor {
        Actor {
            id: 0,
            name: name.to_string(),
            gender: "female".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1968, 12, 18).unwrap(),
        }
    }

    fn film(name: &str, actors: Vec<Actor>) -> Film {
        Film {
            name: name.to_string(),
            description: "heist".to_string(),
            release_date: NaiveDate::from_ymd_opt(2001, 6, 18).unwrap(),
            rating: 6.8,
            list_actors: actors,
            ..Film::default()
        }
    }

    #[tokio::test]
    async fn actor_name_must_be_unique() {
        let (_, services) = services();
        services.actors.add(&actor("Michelle")).await.unwrap();
        let err = services.actors.add(&actor("Michelle")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let (_, services) = services();
        let ghost = Actor { id: 99, ..actor("Ghost") };
        assert!(matches!(
            services.actors.update(&ghost).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(services.films.delete(99).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let (_, services) = services();
        let created = services.actors.add(&actor("Once")).await.unwrap();
        services.actors.delete(created.id).await.unwrap();
        assert!(matches!(
            services.actors.delete(created.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_embedded_actor_rejects_the_film() {
        let (repo, services) = services();
        let bad = Actor {
            gender: "robot".to_string(),
            ..actor("Bad")
        };
        let err = services
            .films
            .add(&film("Fast", vec![actor("Good"), bad]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(repo.film_count(), 0);
        assert_eq!(repo.actor_count(), 0);
    }

    #[tokio::test]
    async fn search_without_match_is_an_empty_film() {
        let (_, services) = services();
        services.films.add(&film("Heat", vec![actor("Pacino")])).await.unwrap();
        let filter = SearchFilter {
            actor: None,
            film: Some("Matrix".to_string()),
        };
        assert_eq!(services.films.search_film(&filter).await.unwrap(), Film::default());
    }

    #[tokio::test]
    async fn repository_failure_surfaces_as_repository_error() {
        let repo: RepositoryState = Arc::new(InMemoryRepository::new_failing());
        let films = FilmService::new(repo);
        assert!(matches!(films.get_films("").await, Err(ServiceError::Repository(_))));
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let (_, services) = services();
        let token = services
            .auth
            .create_user(SignUpRequest {
                username: "neo".to_string(),
                password: "p".to_string(),
                role: 2,
            })
            .await
            .unwrap();
        let claims = services.auth.verify_token(&token).unwrap();
        assert_eq!(claims.username, "neo");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);

        let (_, user) = services
            .auth
            .verify_user(SignInRequest {
                username: "neo".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.id, claims.user_id);
        assert_ne!(user.password, "p");

        let wrong = services
            .auth
            .verify_user(SignInRequest {
                username: "neo".to_string(),
                password: "nope".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(ServiceError::Unauthorized)));
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicates_and_unknown_roles() {
        let (_, services) = services();
        let request = |role| SignUpRequest {
            username: "dup".to_string(),
            password: "p".to_string(),
            role,
        };
        assert!(matches!(
            services.auth.create_user(request(7)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            services.auth.create_user(request(0)).await,
            Err(ServiceError::Validation(_))
        ));
        services.auth.create_user(request(1)).await.unwrap();
        assert!(matches!(
            services.auth.create_user(request(1)).await,
            Err(ServiceError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn sign_up_username_length_is_bounded() {
        let (repo, services) = services();
        let request = |len: usize| SignUpRequest {
            username: "я".repeat(len),
            password: "p".to_string(),
            role: 1,
        };

        services.auth.create_user(request(50)).await.unwrap();
        for len in [2, 51] {
            let result = services.auth.create_user(request(len)).await;
            assert!(
                matches!(&result, Err(ServiceError::Validation(e)) if e.0 == "username must be from 3 to 50 characters"),
                "length {len}: {result:?}"
            );
        }
        assert!(repo.get_user_by_username(&"я".repeat(51)).await.unwrap().is_none());
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let (_, services) = services();
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: 1,
            username: "u".to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            services.auth.verify_token(&expired),
            Err(ServiceError::InvalidToken(_))
        ));

        let foreign = encode(
            &Header::new(Algorithm::HS256),
            &Claims { exp: now + 3600, ..claims },
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();
        assert!(services.auth.verify_token(&foreign).is_err());
        assert!(services.auth.verify_token("not-a-token").is_err());
    }
}
