//! Collapses flat join rows (one row per parent/child pair) into parents with
//! their child lists.

use std::collections::HashMap;

use crate::models::{Actor, ActorFilmRow, ActorWithFilms, Film, FilmActorRow};

/// A join row that can be split into a keyed parent and an optional keyed child.
/// The child is `None` when an outer join found nothing on the other side.
pub trait JoinRow {
    type Parent;
    type Child;

    fn split(self) -> (i32, Self::Parent, Option<(i32, Self::Child)>);
}

/// Group
///
/// One parent with its deduplicated children, in the order rows were seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<P, C> {
    pub parent: P,
    pub children: Vec<C>,
    child_ids: Vec<i32>,
}

impl<P, C> Group<P, C> {
    fn push(&mut self, id: i32, child: C) {
        if self.child_ids.contains(&id) {
            return;
        }
        self.child_ids.push(id);
        self.children.push(child);
    }
}

/// Aggregated
///
/// Parents keyed by id. Keeps the first-seen order of parents so an ORDER BY on the
/// underlying query survives aggregation.
#[derive(Debug, Clone)]
pub struct Aggregated<P, C> {
    groups: Vec<Group<P, C>>,
    index: HashMap<i32, usize>,
}

impl<P, C> Default for Aggregated<P, C> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<P, C> Aggregated<P, C> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Group<P, C>> {
        self.index.get(&id).map(|&pos| &self.groups[pos])
    }

    pub fn into_groups(self) -> Vec<Group<P, C>> {
        self.groups
    }
}

/// aggregate
///
/// Later rows for a parent already seen contribute only their child; the parent data
/// from the first row wins. A child id appearing twice under one parent is kept once.
pub fn aggregate<R, I>(rows: I) -> Aggregated<R::Parent, R::Child>
where
    R: JoinRow,
    I: IntoIterator<Item = R>,
{
    let mut out = Aggregated::default();
    for row in rows {
        let (parent_id, parent, child) = row.split();
        let pos = match out.index.get(&parent_id) {
            Some(&pos) => pos,
            None => {
                out.groups.push(Group {
                    parent,
                    children: Vec::new(),
                    child_ids: Vec::new(),
                });
                out.index.insert(parent_id, out.groups.len() - 1);
                out.groups.len() - 1
            }
        };
        if let Some((child_id, child)) = child {
            out.groups[pos].push(child_id, child);
        }
    }
    out
}

// --- Catalog row types ---

impl JoinRow for ActorFilmRow {
    type Parent = Actor;
    type Child = Film;

    fn split(self) -> (i32, Actor, Option<(i32, Film)>) {
        let actor = Actor {
            id: self.actor_id,
            name: self.actor_name,
            gender: self.actor_gender,
            date_of_birth: self.actor_date_of_birth,
        };
        let film = match (self.film_id, self.film_name, self.film_release_date) {
            (Some(id), Some(name), Some(release_date)) => Some((
                id,
                Film {
                    id,
                    name,
                    description: self.film_description.unwrap_or_default(),
                    release_date,
                    rating: self.film_rating.unwrap_or_default(),
                    list_actors: Vec::new(),
                },
            )),
            _ => None,
        };
        (self.actor_id, actor, film)
    }
}

impl JoinRow for FilmActorRow {
    type Parent = Film;
    type Child = Actor;

    fn split(self) -> (i32, Film, Option<(i32, Actor)>) {
        let film = Film {
            id: self.film_id,
            name: self.film_name,
            description: self.film_description,
            release_date: self.film_release_date,
            rating: self.film_rating,
            list_actors: Vec::new(),
        };
        let actor = match (self.actor_id, self.actor_name, self.actor_date_of_birth) {
            (Some(id), Some(name), Some(date_of_birth)) => Some((
                id,
                Actor {
                    id,
                    name,
                    gender: self.actor_gender.unwrap_or_default(),
                    date_of_birth,
                },
            )),
            _ => None,
        };
        (self.film_id, film, actor)
    }
}

impl From<Group<Film, Actor>> for Film {
    fn from(group: Group<Film, Actor>) -> Self {
        Film {
            list_actors: group.children,
            ..group.parent
        }
    }
}

impl From<Group<Actor, Film>> for ActorWithFilms {
    fn from(group: Group<Actor, Film>) -> Self {
        ActorWithFilms::new(group.parent, group.children)
    }
}

/// Films with their actors, in query order.
pub fn films_with_actors(rows: Vec<FilmActorRow>) -> Vec<Film> {
    aggregate(rows).into_groups().into_iter().map(Film::from).collect()
}

/// Actors with their films, in query order.
pub fn actors_with_films(rows: Vec<ActorFilmRow>) -> Vec<ActorWithFilms> {
    aggregate(rows)
        .into_groups()
        .into_iter()
        .map(ActorWithFilms::from)
        .collect()
}
