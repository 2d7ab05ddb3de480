use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::{RepoResult, Repository, RepositoryError};
use crate::aggregate::{actors_with_films, films_with_actors};
use crate::models::{Actor, ActorFilmRow, ActorWithFilms, Film, FilmActorRow, NewUser, User};
use crate::validation::{FilmSort, SearchFilter};

#[derive(Debug, Clone, Default)]
struct State {
    actors: BTreeMap<i32, Actor>,
    films: BTreeMap<i32, Film>,
    /// (actor_id, film_id)
    links: BTreeSet<(i32, i32)>,
    users: Vec<User>,
    last_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    /// Mirrors the CHECK constraint on `actors.gender`.
    fn insert_actor(&mut self, actor: &Actor) -> RepoResult<Actor> {
        if actor.gender != "male" && actor.gender != "female" {
            return Err(RepositoryError::Database {
                op: "insert_actor",
                source: sqlx::Error::Protocol("actors_gender_check violated".to_string()),
            });
        }
        let stored = Actor {
            id: self.next_id(),
            ..actor.clone()
        };
        self.actors.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn film_rows(&self, film_ids: &[i32]) -> Vec<FilmActorRow> {
        let mut rows = Vec::new();
        for film_id in film_ids {
            let Some(film) = self.films.get(film_id) else {
                continue;
            };
            let row = |actor: Option<&Actor>| FilmActorRow {
                film_id: film.id,
                film_name: film.name.clone(),
                film_description: film.description.clone(),
                film_release_date: film.release_date,
                film_rating: film.rating,
                actor_id: actor.map(|a| a.id),
                actor_name: actor.map(|a| a.name.clone()),
                actor_gender: actor.map(|a| a.gender.clone()),
                actor_date_of_birth: actor.map(|a| a.date_of_birth),
            };
            let mut linked = self.actors_of(film.id).peekable();
            if linked.peek().is_none() {
                rows.push(row(None));
            }
            rows.extend(linked.map(|a| row(Some(a))));
        }
        rows
    }

    fn actors_of(&self, film_id: i32) -> impl Iterator<Item = &Actor> {
        self.links
            .iter()
            .filter(move |(_, f)| *f == film_id)
            .filter_map(|(a, _)| self.actors.get(a))
    }
}

fn ilike(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// InMemoryRepository
///
/// A `Repository` kept in process memory, honouring the same contract as
/// `PostgresRepository`: generated ids, cascade on delete, unique usernames, the gender
/// CHECK constraint and all-or-nothing film creation. Used by the router and service
/// tests so they run without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
    /// When true, every call fails as if the pool were closed.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn state(&self, op: &'static str) -> RepoResult<MutexGuard<'_, State>> {
        if self.should_fail {
            return Err(RepositoryError::Database {
                op,
                source: sqlx::Error::PoolClosed,
            });
        }
        // A poisoned lock only means another test thread panicked mid-write.
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn actor_count(&self) -> usize {
        self.state.lock().map(|s| s.actors.len()).unwrap_or_default()
    }

    pub fn film_count(&self) -> usize {
        self.state.lock().map(|s| s.films.len()).unwrap_or_default()
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().map(|s| s.links.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_actor(&self, actor: &Actor) -> RepoResult<Actor> {
        self.state("create_actor")?.insert_actor(actor)
    }

    async fn update_actor(&self, actor: &Actor) -> RepoResult<Option<Actor>> {
        let mut state = self.state("update_actor")?;
        Ok(state.actors.get_mut(&actor.id).map(|stored| {
            *stored = actor.clone();
            stored.clone()
        }))
    }

    async fn delete_actor(&self, id: i32) -> RepoResult<bool> {
        let mut state = self.state("delete_actor")?;
        let removed = state.actors.remove(&id).is_some();
        state.links.retain(|(a, _)| *a != id);
        Ok(removed)
    }

    async fn actor_exists_by_id(&self, id: i32) -> RepoResult<bool> {
        Ok(self.state("actor_exists_by_id")?.actors.contains_key(&id))
    }

    async fn actor_exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let state = self.state("actor_exists_by_name")?;
        Ok(state.actors.values().any(|a| a.name == name))
    }

    /// Works on a copy of the state and swaps it in only when every step succeeded.
    async fn create_film(&self, film: &Film) -> RepoResult<Film> {
        let mut guard = self.state("create_film")?;
        let mut tx = guard.clone();

        let mut created = Film {
            id: tx.next_id(),
            list_actors: Vec::new(),
            ..film.clone()
        };
        tx.films.insert(created.id, created.clone());

        for actor in &film.list_actors {
            let existing = tx
                .actors
                .values()
                .find(|a| a.name == actor.name)
                .cloned();
            let linked = match existing {
                Some(found) => found,
                None => tx.insert_actor(actor)?,
            };
            tx.links.insert((linked.id, created.id));
            if !created.list_actors.iter().any(|a| a.id == linked.id) {
                created.list_actors.push(linked);
            }
        }

        *guard = tx;
        Ok(created)
    }

    async fn update_film(&self, film: &Film) -> RepoResult<Option<Film>> {
        let mut state = self.state("update_film")?;
        Ok(state.films.get_mut(&film.id).map(|stored| {
            stored.name = film.name.clone();
            stored.description = film.description.clone();
            stored.release_date = film.release_date;
            stored.rating = film.rating;
            stored.clone()
        }))
    }

    async fn delete_film(&self, id: i32) -> RepoResult<bool> {
        let mut state = self.state("delete_film")?;
        let removed = state.films.remove(&id).is_some();
        state.links.retain(|(_, f)| *f != id);
        Ok(removed)
    }

    async fn film_exists_by_id(&self, id: i32) -> RepoResult<bool> {
        Ok(self.state("film_exists_by_id")?.films.contains_key(&id))
    }

    async fn film_exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let state = self.state("film_exists_by_name")?;
        Ok(state.films.values().any(|f| f.name == name))
    }

    async fn get_films(&self, sort: FilmSort) -> RepoResult<Vec<Film>> {
        let state = self.state("get_films")?;
        let mut films: Vec<&Film> = state.films.values().collect();
        match sort {
            FilmSort::Rating => films.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
            FilmSort::Name => films.sort_by_cached_key(|f| f.name.to_lowercase()),
            FilmSort::ReleaseDate => films.sort_by_key(|f| f.release_date),
        }
        let ids: Vec<i32> = films.iter().map(|f| f.id).collect();
        Ok(films_with_actors(state.film_rows(&ids)))
    }

    async fn search_film(&self, filter: &SearchFilter) -> RepoResult<Option<Film>> {
        let state = self.state("search_film")?;
        let mut matches: Vec<&Film> = state
            .films
            .values()
            .filter(|f| filter.film.as_deref().is_none_or(|q| ilike(&f.name, q)))
            .filter(|f| {
                filter
                    .actor
                    .as_deref()
                    .is_none_or(|q| state.actors_of(f.id).any(|a| ilike(&a.name, q)))
            })
            .collect();
        matches.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        let Some(best) = matches.first().map(|f| f.id) else {
            return Ok(None);
        };
        Ok(films_with_actors(state.film_rows(&[best])).into_iter().next())
    }

    async fn get_actors_with_films(&self) -> RepoResult<Vec<ActorWithFilms>> {
        let state = self.state("get_actors_with_films")?;
        let mut rows = Vec::new();
        for actor in state.actors.values() {
            let row = |film: Option<&Film>| ActorFilmRow {
                actor_id: actor.id,
                actor_name: actor.name.clone(),
                actor_gender: actor.gender.clone(),
                actor_date_of_birth: actor.date_of_birth,
                film_id: film.map(|f| f.id),
                film_name: film.map(|f| f.name.clone()),
                film_description: film.map(|f| f.description.clone()),
                film_release_date: film.map(|f| f.release_date),
                film_rating: film.map(|f| f.rating),
            };
            let films: Vec<&Film> = state
                .links
                .iter()
                .filter(|(a, _)| *a == actor.id)
                .filter_map(|(_, f)| state.films.get(f))
                .collect();
            if films.is_empty() {
                rows.push(row(None));
            }
            rows.extend(films.into_iter().map(|f| row(Some(f))));
        }
        Ok(actors_with_films(rows))
    }

    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let mut state = self.state("create_user")?;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::UniqueViolation { op: "create_user" });
        }
        let stored = User {
            id: state.next_id(),
            username: user.username.clone(),
            password: user.password_hash.clone(),
            role: user.role,
        };
        state.users.push(stored.clone());
        Ok(stored)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let state = self.state("get_user_by_username")?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }
}
