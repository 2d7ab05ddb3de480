use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        Actor, ActorWithFilms, AuthResponse, Film, FilmListQuery, FilmSearchQuery,
        MessageResponse, SignInRequest, SignUpRequest, SignUpResponse, UserResponse,
    },
    validation::SearchFilter,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};

// --- Auth ---

/// sign_up
///
/// [Public Route] Registers a user and returns a token for them straight away.
#[utoipa::path(
    post,
    path = "/auth/sign_up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Registered", body = SignUpResponse),
        (status = 400, description = "Missing fields or unknown role", body = MessageResponse),
        (status = 409, description = "Username taken", body = MessageResponse)
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    let Json(request) = payload?;
    let token = state
        .services
        .auth
        .create_user(request)
        .await
        .map_err(|e| ApiError::service(e, "Failed to create user"))?;
    Ok((StatusCode::CREATED, Json(SignUpResponse { token })))
}

/// sign_in
///
/// [Public Route] Exchanges username and password for an access token.
#[utoipa::path(
    post,
    path = "/auth/sign_in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(request) = payload?;
    let (access_token, user) = state
        .services
        .auth
        .verify_user(request)
        .await
        .map_err(|e| ApiError::service(e, "Failed to sign in"))?;
    Ok(Json(AuthResponse {
        access_token,
        user: UserResponse::from(&user),
    }))
}

// --- Actors ---

/// create_actor
///
/// [Admin Route] Adds an actor. Actor names are unique.
#[utoipa::path(
    post,
    path = "/actor_create",
    request_body = Actor,
    responses(
        (status = 201, description = "Created", body = Actor),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 409, description = "Actor already exists", body = MessageResponse)
    )
)]
pub async fn create_actor(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<Actor>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Actor>)> {
    let Json(actor) = payload?;
    actor.validate()?;
    let created = state
        .services
        .actors
        .add(&actor)
        .await
        .map_err(|e| ApiError::service(e, "Failed to create actor"))?;
    tracing::debug!(user_id, actor_id = created.id, "create_actor handled");
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_actor
///
/// [Admin Route] Replaces name, gender and birth date of the actor with the body's `id`.
#[utoipa::path(
    put,
    path = "/actor_update",
    request_body = Actor,
    responses(
        (status = 200, description = "Updated", body = Actor),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Actor not found", body = MessageResponse)
    )
)]
pub async fn update_actor(
    State(state): State<AppState>,
    payload: Result<Json<Actor>, JsonRejection>,
) -> ApiResult<Json<Actor>> {
    let Json(actor) = payload?;
    actor.validate()?;
    let updated = state
        .services
        .actors
        .update(&actor)
        .await
        .map_err(|e| ApiError::service(e, "Failed to update actor"))?;
    Ok(Json(updated))
}

/// delete_actor
///
/// [Admin Route] Hard-deletes an actor; their film links go with them.
#[utoipa::path(
    delete,
    path = "/actor_delete/{id}",
    params(("id" = i32, Path, description = "Actor ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Actor not found", body = MessageResponse)
    )
)]
pub async fn delete_actor(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(id) = id.map_err(ApiError::invalid_id("actor"))?;
    state
        .services
        .actors
        .delete(id)
        .await
        .map_err(|e| ApiError::service(e, "Failed to delete actor"))?;
    Ok(Json(MessageResponse::new("actor deleted successfully")))
}

// --- Films ---

/// create_film
///
/// [Admin Route] Adds a film together with its `list_actors`. Actors are matched by
/// exact name or created; the whole operation is one transaction.
#[utoipa::path(
    post,
    path = "/film_create",
    request_body = Film,
    responses(
        (status = 201, description = "Created", body = Film),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 409, description = "Film already exists", body = MessageResponse)
    )
)]
pub async fn create_film(
    State(state): State<AppState>,
    payload: Result<Json<Film>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Film>)> {
    let Json(film) = payload?;
    film.validate()?;
    let created = state
        .services
        .films
        .add(&film)
        .await
        .map_err(|e| ApiError::service(e, "Failed to create film"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_film
///
/// [Admin Route] Replaces the film's own fields. Actor links are not touched.
#[utoipa::path(
    put,
    path = "/film_update",
    request_body = Film,
    responses(
        (status = 200, description = "Updated", body = Film),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Film not found", body = MessageResponse)
    )
)]
pub async fn update_film(
    State(state): State<AppState>,
    payload: Result<Json<Film>, JsonRejection>,
) -> ApiResult<Json<Film>> {
    let Json(film) = payload?;
    film.validate()?;
    let updated = state
        .services
        .films
        .update(&film)
        .await
        .map_err(|e| ApiError::service(e, "Failed to update film"))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/film_delete/{id}",
    params(("id" = i32, Path, description = "Film ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Film not found", body = MessageResponse)
    )
)]
pub async fn delete_film(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(id) = id.map_err(ApiError::invalid_id("film"))?;
    state
        .services
        .films
        .delete(id)
        .await
        .map_err(|e| ApiError::service(e, "Failed to delete film"))?;
    Ok(Json(MessageResponse::new("movie deleted successfully")))
}

/// get_films
///
/// [Authenticated Route] Lists every film with its actors. `sort_by` is "" (rating,
/// highest first), "name" or "release_date".
#[utoipa::path(
    get,
    path = "/films_get_list",
    params(FilmListQuery),
    responses(
        (status = 200, description = "Films", body = [Film]),
        (status = 400, description = "Unknown sort key", body = MessageResponse)
    )
)]
pub async fn get_films(
    State(state): State<AppState>,
    query: Result<Query<FilmListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Film>>> {
    let Query(query) = query?;
    let films = state
        .services
        .films
        .get_films(query.sort_by.as_deref().unwrap_or_default())
        .await
        .map_err(|e| ApiError::service(e, "Failed to get films"))?;
    Ok(Json(films))
}

/// search_film
///
/// [Authenticated Route] Finds the highest-rated film matching both fragments
/// (case-insensitive). An empty film object means no match.
#[utoipa::path(
    get,
    path = "/films/search",
    params(FilmSearchQuery),
    responses(
        (status = 200, description = "Best match", body = Film),
        (status = 400, description = "Invalid search parameters", body = MessageResponse)
    )
)]
pub async fn search_film(
    State(state): State<AppState>,
    query: Result<Query<FilmSearchQuery>, QueryRejection>,
) -> ApiResult<Json<Film>> {
    let Query(query) = query?;
    let filter = SearchFilter::from_query(&query)?;
    let film = state
        .services
        .films
        .search_film(&filter)
        .await
        .map_err(|e| ApiError::service(e, "Failed to search film"))?;
    Ok(Json(film))
}

// --- Actor/Film association ---

/// get_actors_with_films
///
/// [Admin Route] Every actor with the films they appear in.
#[utoipa::path(
    get,
    path = "/get_list_actors_films",
    responses((status = 200, description = "Actors with films", body = [ActorWithFilms]))
)]
pub async fn get_actors_with_films(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ActorWithFilms>>> {
    let actors = state
        .services
        .catalog
        .get_actors_with_films()
        .await
        .map_err(|e| ApiError::service(e, "Failed to get actors with films"))?;
    Ok(Json(actors))
}
