use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenreList {
    pub genres: Vec<Genre>,
}

/// The slice of a movie/show details payload this client cares about.
#[derive(Debug, Deserialize)]
pub(crate) struct MediaDetails {
    #[serde(default)]
    pub genres: Vec<Genre>,
}
