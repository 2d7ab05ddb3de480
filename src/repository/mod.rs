use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Actor, ActorWithFilms, Film, NewUser, User};
use crate::validation::{FilmSort, SearchFilter};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// A failed store call, tagged with the operation that issued it. Unique-constraint
/// violations are split out so the service can answer 409 instead of 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{op}: unique constraint violated")]
    UniqueViolation { op: &'static str },
    #[error("{op}: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl RepositoryError {
    /// Returns a mapper for `map_err` that records `op` and classifies the error.
    pub fn db(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| {
            let unique = source
                .as_database_error()
                .is_some_and(|e| e.is_unique_violation());
            if unique {
                RepositoryError::UniqueViolation { op }
            } else {
                RepositoryError::Database { op, source }
            }
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract for the catalog. Services depend on this trait only, so
/// the Postgres implementation and the in-memory one are interchangeable.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Actors ---
    /// Inserts the actor and returns it with its generated id.
    async fn create_actor(&self, actor: &Actor) -> RepoResult<Actor>;
    /// Replaces name, gender and birth date of `actor.id`. `None` if the row is gone.
    async fn update_actor(&self, actor: &Actor) -> RepoResult<Option<Actor>>;
    /// Hard delete; link rows go with it. `false` if nothing was deleted.
    async fn delete_actor(&self, id: i32) -> RepoResult<bool>;
    async fn actor_exists_by_id(&self, id: i32) -> RepoResult<bool>;
    async fn actor_exists_by_name(&self, name: &str) -> RepoResult<bool>;

    // --- Films ---
    /// Inserts the film and links `film.list_actors` in one transaction: each actor is
    /// matched by exact name or inserted. Any failure leaves no film, actor or link.
    async fn create_film(&self, film: &Film) -> RepoResult<Film>;
    /// Replaces name, description, release date and rating. Links are untouched.
    async fn update_film(&self, film: &Film) -> RepoResult<Option<Film>>;
    async fn delete_film(&self, id: i32) -> RepoResult<bool>;
    async fn film_exists_by_id(&self, id: i32) -> RepoResult<bool>;
    async fn film_exists_by_name(&self, name: &str) -> RepoResult<bool>;
    /// Every film with its actors, in the requested order. Name order compares
    /// lowercased names; equal keys keep id order.
    async fn get_films(&self, sort: FilmSort) -> RepoResult<Vec<Film>>;
    /// The highest-rated film whose name contains `filter.film` and which has an actor
    /// whose name contains `filter.actor` (case-insensitive), with all of its actors.
    async fn search_film(&self, filter: &SearchFilter) -> RepoResult<Option<Film>>;

    // --- Actor/Film association ---
    /// Every actor with the films they appear in.
    async fn get_actors_with_films(&self) -> RepoResult<Vec<ActorWithFilms>>;

    // --- Users ---
    async fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
