use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
const LANGUAGE: &str = "en-US";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// At most this many raw search rows are considered for disambiguation.
pub const MAX_CANDIDATES: usize = 3;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("tmdb request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tmdb returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self, TmdbError> {
        Self::with_base_url(api_key, TMDB_BASE_URL.to_string())
    }

    fn with_base_url(api_key: String, base_url: String) -> Result<Self, TmdbError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { api_key, base_url, http })
    }

    /// Combined movie/TV search, first page, provider relevance order.
    pub async fn multi_search(&self, query: &str) -> Result<Vec<SearchEntry>, TmdbError> {
        let url = format!(
            "{}/search/multi?api_key={}&query={}&language={}&page=1",
            self.base_url,
            self.api_key,
            urlencoding::encode(query),
            LANGUAGE,
        );
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TmdbError::Status(resp.status()));
        }
        let data: SearchResponse = resp.json().await?;
        Ok(data.results)
    }

    /// Full record for one movie or TV show.
    pub async fn get_detail(&self, kind: MediaKind, id: u64) -> Result<MediaDetail, TmdbError> {
        let url = format!(
            "{}/{}/{}?api_key={}&language={}",
            self.base_url, kind, id, self.api_key, LANGUAGE,
        );
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TmdbError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            _ => Err(()),
        }
    }
}

/* ======= DTOs ======= */

#[derive(Deserialize, Debug)]
struct SearchResponse {
    results: Vec<SearchEntry>,
}

/// One raw row of `/search/multi`. The endpoint mixes movies, TV shows and
/// people, so everything except the id is optional.
#[derive(Deserialize, Debug, Clone)]
pub struct SearchEntry {
    pub id: u64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

impl SearchEntry {
    pub fn kind(&self) -> Option<MediaKind> {
        self.media_type.as_deref().and_then(|t| t.parse().ok())
    }

    /// `title` for movies, `name` for TV shows.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().or(self.name.as_deref()).unwrap_or("")
    }

    /// First four characters of the release date, empty when absent.
    pub fn display_year(&self) -> &str {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
            .map(four_char_year)
            .unwrap_or("")
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MediaDetail {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

// A single eligible search hit is rendered as-is, without a detail round trip.
impl From<SearchEntry> for MediaDetail {
    fn from(e: SearchEntry) -> Self {
        Self {
            title: e.title,
            name: e.name,
            overview: e.overview,
            poster_path: e.poster_path,
            release_date: e.release_date,
            first_air_date: e.first_air_date,
        }
    }
}

/// First 3 raw rows, movies and TV shows only, provider order preserved.
pub fn eligible_candidates(raw: &[SearchEntry]) -> Vec<SearchEntry> {
    raw.iter()
        .take(MAX_CANDIDATES)
        .filter(|e| e.kind().is_some())
        .cloned()
        .collect()
}

pub fn four_char_year(date: &str) -> &str {
    date.get(..4).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(media_type: &str, id: u64) -> SearchEntry {
        SearchEntry {
            id,
            media_type: Some(media_type.to_string()),
            title: None,
            name: None,
            overview: None,
            poster_path: None,
            release_date: None,
            first_air_date: None,
        }
    }

    #[test]
    fn filters_out_people_and_keeps_order() {
        let raw = vec![entry("movie", 1), entry("person", 2), entry("tv", 3)];
        let eligible = eligible_candidates(&raw);
        assert_eq!(
            eligible.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn one_movie_one_person_leaves_one_candidate() {
        let raw = vec![entry("movie", 1), entry("person", 2)];
        assert_eq!(eligible_candidates(&raw).len(), 1);
    }

    #[test]
    fn caps_at_three_before_filtering() {
        let raw = vec![
            entry("movie", 1),
            entry("movie", 2),
            entry("person", 3),
            entry("movie", 4),
        ];
        // The fourth row is beyond the window even though a person was dropped.
        assert_eq!(eligible_candidates(&raw).len(), 2);
    }

    #[test]
    fn display_fields_prefer_movie_shapes() {
        let mut e = entry("movie", 1);
        e.title = Some("Alien".into());
        e.release_date = Some("1979-05-25".into());
        assert_eq!(e.display_title(), "Alien");
        assert_eq!(e.display_year(), "1979");

        let mut tv = entry("tv", 2);
        tv.name = Some("Severance".into());
        tv.first_air_date = Some("2022-02-18".into());
        assert_eq!(tv.display_title(), "Severance");
        assert_eq!(tv.display_year(), "2022");
    }

    #[test]
    fn display_year_handles_short_and_missing_dates() {
        let mut e = entry("movie", 1);
        assert_eq!(e.display_year(), "");
        e.release_date = Some("19".into());
        assert_eq!(e.display_year(), "19");
    }

    #[tokio::test]
    async fn multi_search_decodes_mixed_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .and(query_param("query", "alien covenant"))
            .and(query_param("language", "en-US"))
            .and(query_param("page", "1"))
            .and(query_param("api_key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1,
                "results": [
                    {
                        "id": 126889,
                        "media_type": "movie",
                        "title": "Alien: Covenant",
                        "release_date": "2017-05-09",
                        "overview": "Bound for a remote planet...",
                        "poster_path": "/zecMELPbU5YMQpC81Z8ImaaXuf9.jpg"
                    },
                    { "id": 7, "media_type": "person", "name": "Ridley Scott" }
                ]
            })))
            .mount(&server)
            .await;

        let client = TmdbClient::with_base_url("k".into(), server.uri()).unwrap();
        let raw = client.multi_search("alien covenant").await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].kind(), Some(MediaKind::Movie));
        assert_eq!(raw[0].display_title(), "Alien: Covenant");
        assert_eq!(raw[1].kind(), None);

        let eligible = eligible_candidates(&raw);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, 126889);
    }

    #[tokio::test]
    async fn multi_search_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = TmdbClient::with_base_url("k".into(), server.uri()).unwrap();
        let err = client.multi_search("anything").await.unwrap_err();
        assert!(matches!(err, TmdbError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn get_detail_uses_kind_in_the_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/1396"))
            .and(query_param("api_key", "k"))
            .and(query_param("language", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1396,
                "name": "Breaking Bad",
                "first_air_date": "2008-01-20",
                "overview": "A chemistry teacher...",
                "poster_path": "/ztkUQFLlC19CCMYHW9o1zWhJRNq.jpg"
            })))
            .mount(&server)
            .await;

        let client = TmdbClient::with_base_url("k".into(), server.uri()).unwrap();
        let detail = client.get_detail(MediaKind::Tv, 1396).await.unwrap();
        assert_eq!(detail.name.as_deref(), Some("Breaking Bad"));
        assert!(detail.title.is_none());
    }

    #[tokio::test]
    async fn get_detail_not_found_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TmdbClient::with_base_url("k".into(), server.uri()).unwrap();
        let err = client.get_detail(MediaKind::Movie, 1).await.unwrap_err();
        assert!(matches!(err, TmdbError::Status(s) if s.as_u16() == 404));
    }
}
