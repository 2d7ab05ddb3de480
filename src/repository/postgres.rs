use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};

use super::{RepoResult, Repository, RepositoryError};
use crate::aggregate::{actors_with_films, films_with_actors};
use crate::models::{Actor, ActorFilmRow, ActorWithFilms, Film, FilmActorRow, NewUser, User};
use crate::validation::{FilmSort, SearchFilter};

const FILM_ACTOR_COLUMNS: &str = r#"
    f.id AS film_id, f.name AS film_name, f.description AS film_description,
    f.release_date AS film_release_date, f.rating AS film_rating,
    a.id AS actor_id, a.name AS actor_name, a.gender AS actor_gender,
    a.date_of_birth AS actor_date_of_birth
"#;

const FILMS_JOIN_ACTORS: &str = r#"
    FROM films f
    LEFT JOIN actor_film af ON af.film_id = f.id
    LEFT JOIN actors a ON a.id = af.actor_id
"#;

/// Escapes LIKE metacharacters and wraps the fragment for a substring match.
fn contains_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- ACTORS ---

    async fn create_actor(&self, actor: &Actor) -> RepoResult<Actor> {
        sqlx::query_as::<_, Actor>(
            r#"INSERT INTO actors (name, gender, date_of_birth)
               VALUES ($1, $2, $3)
               RETURNING id, name, gender, date_of_birth"#,
        )
        .bind(&actor.name)
        .bind(&actor.gender)
        .bind(actor.date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::db("create_actor"))
    }

    async fn update_actor(&self, actor: &Actor) -> RepoResult<Option<Actor>> {
        sqlx::query_as::<_, Actor>(
            r#"UPDATE actors SET name = $1, gender = $2, date_of_birth = $3
               WHERE id = $4
               RETURNING id, name, gender, date_of_birth"#,
        )
        .bind(&actor.name)
        .bind(&actor.gender)
        .bind(actor.date_of_birth)
        .bind(actor.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::db("update_actor"))
    }

    async fn delete_actor(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::db("delete_actor"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn actor_exists_by_id(&self, id: i32) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM actors WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::db("actor_exists_by_id"))
    }

    async fn actor_exists_by_name(&self, name: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM actors WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::db("actor_exists_by_name"))
    }

    // --- FILMS ---

    /// create_film
    ///
    /// The only multi-statement write. The transaction is rolled back when `tx` is
    /// dropped on any early return.
    async fn create_film(&self, film: &Film) -> RepoResult<Film> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(RepositoryError::db("create_film.begin"))?;

        let mut created = sqlx::query_as::<_, Film>(
            r#"INSERT INTO films (name, description, release_date, rating)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, description, release_date, rating"#,
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.rating)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::db("create_film.insert_film"))?;

        for actor in &film.list_actors {
            let existing = sqlx::query_as::<_, Actor>(
                "SELECT id, name, gender, date_of_birth FROM actors WHERE name = $1 ORDER BY id LIMIT 1",
            )
            .bind(&actor.name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::db("create_film.find_actor"))?;

            let linked = match existing {
                Some(found) => found,
                None => sqlx::query_as::<_, Actor>(
                    r#"INSERT INTO actors (name, gender, date_of_birth)
                       VALUES ($1, $2, $3)
                       RETURNING id, name, gender, date_of_birth"#,
                )
                .bind(&actor.name)
                .bind(&actor.gender)
                .bind(actor.date_of_birth)
                .fetch_one(&mut *tx)
                .await
                .map_err(RepositoryError::db("create_film.insert_actor"))?,
            };

            sqlx::query(
                "INSERT INTO actor_film (actor_id, film_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(linked.id)
            .bind(created.id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::db("create_film.link"))?;

            if !created.list_actors.iter().any(|a| a.id == linked.id) {
                created.list_actors.push(linked);
            }
        }

        tx.commit()
            .await
            .map_err(RepositoryError::db("create_film.commit"))?;

        Ok(created)
    }

    async fn update_film(&self, film: &Film) -> RepoResult<Option<Film>> {
        sqlx::query_as::<_, Film>(
            r#"UPDATE films SET name = $1, description = $2, release_date = $3, rating = $4
               WHERE id = $5
               RETURNING id, name, description, release_date, rating"#,
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.rating)
        .bind(film.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::db("update_film"))
    }

    async fn delete_film(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM films WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::db("delete_film"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn film_exists_by_id(&self, id: i32) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM films WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::db("film_exists_by_id"))
    }

    async fn film_exists_by_name(&self, name: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM films WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::db("film_exists_by_name"))
    }

    /// get_films
    ///
    /// The ORDER BY fragment comes from the closed `FilmSort` enum, so formatting it
    /// into the statement is safe.
    async fn get_films(&self, sort: FilmSort) -> RepoResult<Vec<Film>> {
        let sql = format!(
            "SELECT {FILM_ACTOR_COLUMNS} {FILMS_JOIN_ACTORS} ORDER BY {}, a.id",
            sort.order_by()
        );
        let rows = sqlx::query_as::<_, FilmActorRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::db("get_films"))?;
        Ok(films_with_actors(rows))
    }

    /// search_film
    ///
    /// Picks one film id with a filtered sub-select, then loads that film with every
    /// actor, not only the ones matching the actor filter.
    async fn search_film(&self, filter: &SearchFilter) -> RepoResult<Option<Film>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {FILM_ACTOR_COLUMNS} {FILMS_JOIN_ACTORS} WHERE f.id = (SELECT s.id FROM films s WHERE TRUE"
        ));

        if let Some(film) = &filter.film {
            builder.push(" AND s.name ILIKE ");
            builder.push_bind(contains_pattern(film));
        }

        if let Some(actor) = &filter.actor {
            builder.push(
                " AND EXISTS (SELECT 1 FROM actor_film saf JOIN actors sa ON sa.id = saf.actor_id \
                 WHERE saf.film_id = s.id AND sa.name ILIKE ",
            );
            builder.push_bind(contains_pattern(actor));
            builder.push(")");
        }

        builder.push(" ORDER BY s.rating DESC, s.id LIMIT 1) ORDER BY a.id");

        let rows = builder
            .build_query_as::<FilmActorRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::db("search_film"))?;

        Ok(films_with_actors(rows).into_iter().next())
    }

    // --- ACTOR/FILM ASSOCIATION ---

    async fn get_actors_with_films(&self) -> RepoResult<Vec<ActorWithFilms>> {
        let rows = sqlx::query_as::<_, ActorFilmRow>(
            r#"
            SELECT a.id AS actor_id, a.name AS actor_name, a.gender AS actor_gender,
                   a.date_of_birth AS actor_date_of_birth,
                   f.id AS film_id, f.name AS film_name, f.description AS film_description,
                   f.release_date AS film_release_date, f.rating AS film_rating
            FROM actors a
            LEFT JOIN actor_film af ON af.actor_id = a.id
            LEFT JOIN films f ON f.id = af.film_id
            ORDER BY a.id, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::db("get_actors_with_films"))?;

        Ok(actors_with_films(rows))
    }

    // --- USERS ---

    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (name, password, role_id)
               VALUES ($1, $2, $3)
               RETURNING id, name, password, role_id"#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::db("create_user"))
    }

    /// Looks a user up by name only; the password is checked against the hash by the
    /// auth service, never in SQL.
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, name, password, role_id FROM users WHERE name = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::db("get_user_by_username"))
    }
}
