pub mod error;
pub mod types;

pub use error::{Result, TmdbError};
pub use types::Genre;

use serde::de::DeserializeOwned;
use types::{GenreList, MediaDetails};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Responses are requested in Brazilian Portuguese.
const LANGUAGE: &str = "pt-BR";

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Genre catalogue for `movie` or `tv`.
    pub async fn genres(&self, media_type: &str) -> Result<Vec<Genre>> {
        let list: GenreList = self.get(&format!("/genre/{media_type}/list")).await?;
        Ok(list.genres)
    }

    /// Genre ids attached to a single movie or show.
    pub async fn media_genre_ids(&self, media_type: &str, id: &str) -> Result<Vec<i64>> {
        let details: MediaDetails = self.get(&format!("/{media_type}/{id}")).await?;
        Ok(details.genres.into_iter().map(|g| g.id).collect())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", LANGUAGE)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(path, status = status.as_u16(), "TMDb request failed");
            return Err(TmdbError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = TmdbClient::with_base_url("k".into(), "http://localhost:9/3/".into());
        assert_eq!(client.base_url, "http://localhost:9/3");
    }

    #[test]
    fn details_without_genres_parse_as_empty() {
        let details: MediaDetails = serde_json::from_str(r#"{"id": 1, "title": "x"}"#).unwrap();
        assert!(details.genres.is_empty());
    }

    #[test]
    fn genre_list_parses() {
        let list: GenreList =
            serde_json::from_str(r#"{"genres":[{"id":28,"name":"Ação"},{"id":18,"name":"Drama"}]}"#)
                .unwrap();
        assert_eq!(list.genres.len(), 2);
        assert_eq!(list.genres[0].id, 28);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = TmdbClient::with_base_url("k".into(), "http://127.0.0.1:9".into());
        let err = client.genres("movie").await.unwrap_err();
        assert!(matches!(err, TmdbError::Network(_)));
    }
}
