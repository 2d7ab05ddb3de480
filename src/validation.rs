//! Field and parameter rules checked before anything touches the store.
//!
//! Every function here is pure: no I/O, no mutation. Handlers run them first and
//! answer 400 with the message; services run the entity rules again before writing.

use chrono::{Datelike, NaiveDate, Utc};
use std::str::FromStr;
use thiserror::Error;

use crate::models::{Actor, Film, FilmSearchQuery};

const ACTOR_NAME_MAX: usize = 100;
const ACTOR_MIN_AGE_YEARS: i32 = 5;
const FILM_NAME_MAX: usize = 150;
const FILM_DESCRIPTION_MAX: usize = 1000;
const SEARCH_FILM_RANGE: (usize, usize) = (2, 150);
const SEARCH_ACTOR_RANGE: (usize, usize) = (2, 100);

/// A rejected input. The message is returned to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Gender values accepted for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "" => Err(ValidationError::new("не указан пол")),
            _ => Err(ValidationError::new("несуществующий пол")),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl Actor {
    /// Checks the actor against today's date (UTC).
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_at(Utc::now().date_naive())
    }

    /// validate_at
    ///
    /// Same rules as [`Actor::validate`] with an explicit "today", so the date rules
    /// can be tested without depending on the clock.
    pub fn validate_at(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if self.name.is_empty() || char_len(&self.name) > ACTOR_NAME_MAX {
            return Err(ValidationError::new(
                "имя актера не может быть пустым и не должно превышать 100 символов",
            ));
        }

        self.gender.parse::<Gender>()?;

        if self.date_of_birth > today {
            return Err(ValidationError::new("дата рождения не может быть в будущем"));
        }

        // Calendar-year difference, not exact age.
        if today.year() - self.date_of_birth.year() < ACTOR_MIN_AGE_YEARS {
            return Err(ValidationError::new("актёр должен быть старше 5 лет"));
        }

        Ok(())
    }
}

impl Film {
    /// Checks the film's own columns. Embedded actors are validated separately by the
    /// service, since only film creation reads them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() || char_len(&self.name) > FILM_NAME_MAX {
            return Err(ValidationError::new(
                "название фильма должно быть от 1 до 150 символов",
            ));
        }
        if char_len(&self.description) > FILM_DESCRIPTION_MAX {
            return Err(ValidationError::new(
                "описание не должно превышать 1000 символов",
            ));
        }
        if !(0.0..=10.0).contains(&self.rating) {
            return Err(ValidationError::new("рейтинг должен быть от 0 до 10"));
        }
        Ok(())
    }
}

/// SearchFilter
///
/// Trimmed, validated search filters. A `None` field places no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFilter {
    pub actor: Option<String>,
    pub film: Option<String>,
}

impl SearchFilter {
    /// Builds a filter from raw query parameters, trimming whitespace and treating
    /// blank values as absent.
    pub fn from_query(query: &FilmSearchQuery) -> Result<Self, ValidationError> {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let filter = Self {
            actor: clean(&query.actor),
            film: clean(&query.movie),
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.actor.is_none() && self.film.is_none() {
            return Err(ValidationError::new(
                "необходимо указать либо название фильма, либо имя актёра",
            ));
        }
        if let Some(film) = &self.film {
            let len = char_len(film);
            if len < SEARCH_FILM_RANGE.0 || len > SEARCH_FILM_RANGE.1 {
                return Err(ValidationError::new(
                    "название фильма для поиска должно быть от 2 до 150 символов",
                ));
            }
        }
        if let Some(actor) = &self.actor {
            let len = char_len(actor);
            if len < SEARCH_ACTOR_RANGE.0 || len > SEARCH_ACTOR_RANGE.1 {
                return Err(ValidationError::new(
                    "имя актёра для поиска должно быть от 2 до 100 символов",
                ));
            }
        }
        Ok(())
    }
}

/// FilmSort
///
/// The closed set of orderings for the film listing. The ORDER BY fragment is only
/// ever taken from this enum, never from request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilmSort {
    #[default]
    Rating,
    Name,
    ReleaseDate,
}

impl FilmSort {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "" => Ok(FilmSort::Rating),
            "name" => Ok(FilmSort::Name),
            "release_date" => Ok(FilmSort::ReleaseDate),
            _ => Err(ValidationError::new("Некорректная сортировка")),
        }
    }

    pub fn order_by(self) -> &'static str {
        match self {
            FilmSort::Rating => "f.rating DESC, f.id",
            FilmSort::Name => "LOWER(f.name) ASC, f.id",
            FilmSort::ReleaseDate => "f.release_date ASC, f.id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    fn actor(name: &str, gender: &str, dob: NaiveDate) -> Actor {
        Actor {
            id: 0,
            name: name.to_string(),
            gender: gender.to_string(),
            date_of_birth: dob,
        }
    }

    fn film(name: &str, description: &str, rating: f32) -> Film {
        Film {
            name: name.to_string(),
            description: description.to_string(),
            release_date: date(2001, 6, 18),
            rating,
            ..Film::default()
        }
    }

    #[test]
    fn accepts_valid_actor() {
        assert!(actor("Vin Diesel", "male", date(1967, 7, 18)).validate_at(today()).is_ok());
    }

    #[test]
    fn rejects_empty_and_long_actor_names() {
        let long = "я".repeat(101);
        for name in ["", long.as_str()] {
            let err = actor(name, "male", date(1980, 1, 1)).validate_at(today()).unwrap_err();
            assert_eq!(
                err.0,
                "имя актера не может быть пустым и не должно превышать 100 символов"
            );
        }
        // 100 multi-byte characters are still within the limit.
        let exact = "я".repeat(100);
        assert!(actor(&exact, "female", date(1980, 1, 1)).validate_at(today()).is_ok());
    }

    #[test]
    fn rejects_missing_and_unknown_gender() {
        let missing = actor("A", "", date(1980, 1, 1)).validate_at(today()).unwrap_err();
        assert_eq!(missing.0, "не указан пол");
        let unknown = actor("A", "other", date(1980, 1, 1)).validate_at(today()).unwrap_err();
        assert_eq!(unknown.0, "несуществующий пол");
    }

    #[test]
    fn rejects_future_birth_and_young_actors() {
        let future = actor("A", "male", date(2024, 6, 2)).validate_at(today()).unwrap_err();
        assert_eq!(future.0, "дата рождения не может быть в будущем");

        let young = actor("A", "male", date(2020, 1, 1)).validate_at(today()).unwrap_err();
        assert_eq!(young.0, "актёр должен быть старше 5 лет");

        assert!(actor("A", "male", date(2019, 12, 31)).validate_at(today()).is_ok());
    }

    #[test]
    fn film_rules() {
        assert!(film("Форсаж", "street racing", 6.8).validate().is_ok());
        assert!(film("Boundary", "", 0.0).validate().is_ok());
        assert!(film("Boundary", "", 10.0).validate().is_ok());

        let empty = film("", "description", 9.3).validate().unwrap_err();
        assert_eq!(empty.0, "название фильма должно быть от 1 до 150 символов");
        assert!(film(&"x".repeat(151), "", 5.0).validate().is_err());
        assert!(film("x", &"d".repeat(1001), 5.0).validate().is_err());

        for rating in [-0.1, 10.1, f32::NAN] {
            let err = film("x", "", rating).validate().unwrap_err();
            assert_eq!(err.0, "рейтинг должен быть от 0 до 10");
        }
    }

    #[test]
    fn search_filter_requires_one_field() {
        let query = FilmSearchQuery {
            actor: Some("   ".to_string()),
            movie: None,
        };
        let err = SearchFilter::from_query(&query).unwrap_err();
        assert_eq!(err.0, "необходимо указать либо название фильма, либо имя актёра");
    }

    #[test]
    fn search_filter_trims_and_checks_lengths() {
        let query = FilmSearchQuery {
            actor: Some("  Дизель ".to_string()),
            movie: Some("".to_string()),
        };
        let filter = SearchFilter::from_query(&query).unwrap();
        assert_eq!(filter.actor.as_deref(), Some("Дизель"));
        assert_eq!(filter.film, None);

        let short = SearchFilter {
            actor: None,
            film: Some("x".to_string()),
        };
        assert!(short.validate().is_err());
        let long_actor = SearchFilter {
            actor: Some("a".repeat(101)),
            film: None,
        };
        assert!(long_actor.validate().is_err());
    }

    #[test]
    fn sort_key_is_a_closed_set() {
        assert_eq!(FilmSort::parse("").unwrap(), FilmSort::Rating);
        assert_eq!(FilmSort::parse("name").unwrap(), FilmSort::Name);
        assert_eq!(FilmSort::parse("release_date").unwrap(), FilmSort::ReleaseDate);
        for bad in ["bogus", "actor", "name; DROP TABLE films"] {
            assert_eq!(FilmSort::parse(bad).unwrap_err().0, "Некорректная сортировка");
        }
    }
}
