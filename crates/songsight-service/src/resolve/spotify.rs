//! Spotify Web API resolver.
//!
//! Looks up tracks that are not in the local catalog. Audio features come
//! from the `audio-features` endpoint; popularity, which that endpoint does
//! not carry, comes from the `tracks` endpoint and is only fetched when the
//! feature set asks for it.
//!
//! Authentication uses the client-credentials flow. The access token is
//! cached until shortly before it expires, and dropped early if the API
//! answers 401 so the next attempt fetches a fresh one.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use songsight_core::{FeatureSet, FeatureVector};

use super::CatalogResolver;
use crate::error::{ResolveError, ResolveResult};
use crate::resilience::{RateLimiter, RetryPolicy};

const SOURCE_NAME: &str = "Spotify";
const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens are refreshed this long before Spotify says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn from_response(response: TokenResponse, now: Instant) -> Self {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        Self {
            access_token: response.access_token,
            expires_at: now + lifetime,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

/// Build a feature vector from a flat JSON object of named values.
///
/// Numbers are taken as-is and booleans read as 0 or 1. A feature absent
/// from `fields`, or null, is a [`ResolveError::MissingFeature`]; a value
/// outside the feature's declared domain is a [`ResolveError::Parse`].
pub fn vector_from_fields(
    id: &str,
    fields: &Map<String, Value>,
    features: &FeatureSet,
) -> ResolveResult<FeatureVector> {
    let values = features
        .iter()
        .map(|spec| {
            let value = match fields.get(&spec.name) {
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            }
            .ok_or_else(|| ResolveError::MissingFeature {
                id: id.to_string(),
                source_name: SOURCE_NAME.to_string(),
                feature: spec.name.clone(),
            })?;

            if !value.is_finite() || !spec.admits(value) {
                return Err(ResolveError::Parse {
                    source_name: SOURCE_NAME.to_string(),
                    message: format!("{} for track {} is out of range: {}", spec.name, id, value),
                });
            }
            Ok(value)
        })
        .collect::<ResolveResult<Vec<_>>>()?;

    Ok(FeatureVector::new(values))
}

/// Map an HTTP status to the resolver error it stands for, if any.
fn status_error(status: StatusCode, id: &str) -> Option<ResolveError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => ResolveError::NotFound {
            id: id.to_string(),
            source_name: SOURCE_NAME.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => ResolveError::RateLimited {
            source_name: SOURCE_NAME.to_string(),
        },
        s if s.is_server_error() || s == StatusCode::UNAUTHORIZED => ResolveError::Http {
            source_name: SOURCE_NAME.to_string(),
            message: s.to_string(),
        },
        s => ResolveError::Rejected {
            source_name: SOURCE_NAME.to_string(),
            message: s.to_string(),
        },
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Resolver backed by the Spotify Web API.
///
/// Wraps a [`reqwest::Client`] with a user-agent and a 30-second timeout.
/// Requests are spaced by a [`RateLimiter`] and transient failures are
/// retried per the [`RetryPolicy`].
#[derive(Debug)]
pub struct SpotifyResolver {
    http: Client,
    client_id: String,
    client_secret: String,
    features: FeatureSet,
    api_base: String,
    token_url: String,
    token: Mutex<Option<CachedToken>>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl SpotifyResolver {
    /// Create a resolver producing vectors over `features`.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        features: FeatureSet,
    ) -> ResolveResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("songsight/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            features,
            api_base: SPOTIFY_API_BASE.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            token: Mutex::new(None),
            rate_limiter: RateLimiter::new(10),
            retry: RetryPolicy::default(),
        })
    }

    /// Point the resolver at other endpoints (a proxy or a local stand-in).
    #[must_use]
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.token_url = token_url.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = RateLimiter::new(requests_per_second);
        self
    }

    async fn fetch_token(&self) -> ResolveResult<CachedToken> {
        log::debug!("Requesting Spotify access token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ResolveError::Rejected {
                source_name: SOURCE_NAME.to_string(),
                message: format!("client credentials refused ({status})"),
            });
        }
        if let Some(e) = status_error(status, "token") {
            return Err(e);
        }

        let token: TokenResponse = parse_json(response).await?;
        Ok(CachedToken::from_response(token, Instant::now()))
    }

    async fn access_token(&self) -> ResolveResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn authorized(&self, request: RequestBuilder) -> ResolveResult<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// One GET of `path` under the API base, without retries.
    async fn get_once<T: serde::de::DeserializeOwned>(&self, path: &str, id: &str) -> ResolveResult<T> {
        self.rate_limiter.acquire().await;

        let request = self.authorized(self.http.get(format!("{}{}", self.api_base, path))).await?;
        let response = request.send().await?;

        if let Some(e) = status_error(response.status(), id) {
            if response.status() == StatusCode::UNAUTHORIZED {
                *self.token.lock().await = None;
            }
            return Err(e);
        }
        parse_json(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, id: &str) -> ResolveResult<T> {
        self.retry.run(SOURCE_NAME, || self.get_once(path, id)).await
    }

    /// Raw audio features for one track.
    pub async fn audio_features(&self, id: &str) -> ResolveResult<Map<String, Value>> {
        self.get(&format!("/audio-features/{id}"), id).await
    }

    /// Track popularity (0 to 100).
    pub async fn popularity(&self, id: &str) -> ResolveResult<f64> {
        let track: Map<String, Value> = self.get(&format!("/tracks/{id}"), id).await?;
        track
            .get("popularity")
            .and_then(Value::as_f64)
            .ok_or_else(|| ResolveError::MissingFeature {
                id: id.to_string(),
                source_name: SOURCE_NAME.to_string(),
                feature: "popularity".to_string(),
            })
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> ResolveResult<T> {
    response.json().await.map_err(|e| ResolveError::Parse {
        source_name: SOURCE_NAME.to_string(),
        message: e.to_string(),
    })
}

#[async_trait::async_trait]
impl CatalogResolver for SpotifyResolver {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector> {
        log::info!("Looking up {} on Spotify", id);
        let mut fields = self.audio_features(id).await?;

        if self.features.contains("popularity") && !fields.contains_key("popularity") {
            let popularity = self.popularity(id).await?;
            fields.insert("popularity".to_string(), Value::from(popularity));
        }

        vector_from_fields(id, &fields, &self.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songsight_core::FeatureSpec;

    fn audio_features_json() -> Map<String, Value> {
        let json = r#"{
            "acousticness": 0.00242,
            "danceability": 0.585,
            "duration_ms": 237040,
            "energy": 0.842,
            "id": "2takcwOaAZWiXQijPHIx7B",
            "instrumentalness": 0.00686,
            "key": 9,
            "liveness": 0.0866,
            "loudness": -5.883,
            "mode": 0,
            "speechiness": 0.0556,
            "tempo": 118.211,
            "time_signature": 4,
            "type": "audio_features",
            "valence": 0.428
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_vector_from_audio_features() {
        let mut fields = audio_features_json();
        fields.insert("popularity".to_string(), Value::from(61));

        let features = FeatureSet::default();
        let vector = vector_from_fields("2takcwOaAZWiXQijPHIx7B", &fields, &features).unwrap();
        assert_eq!(vector.len(), features.len());
        assert_eq!(vector[features.position("tempo").unwrap()], 118.211);
        assert_eq!(vector[features.position("key").unwrap()], 9.0);
        assert_eq!(vector[features.position("popularity").unwrap()], 61.0);
    }

    #[test]
    fn test_vector_missing_feature() {
        let fields = audio_features_json();
        let err = vector_from_fields("x", &fields, &FeatureSet::default()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingFeature { ref feature, .. } if feature == "popularity"
        ));
    }

    #[test]
    fn test_vector_reads_booleans_and_checks_bounds() {
        let features = FeatureSet::new(vec![
            FeatureSpec::bounded("mode", 0.0, 1.0),
            FeatureSpec::bounded("energy", 0.0, 1.0),
        ])
        .unwrap();

        let mut fields = Map::new();
        fields.insert("mode".to_string(), Value::Bool(true));
        fields.insert("energy".to_string(), Value::from(0.4));
        let vector = vector_from_fields("x", &fields, &features).unwrap();
        assert_eq!(vector.as_slice(), &[1.0, 0.4]);

        fields.insert("energy".to_string(), Value::from(1.5));
        assert!(matches!(
            vector_from_fields("x", &fields, &features),
            Err(ResolveError::Parse { .. })
        ));

        fields.insert("energy".to_string(), Value::Null);
        assert!(matches!(
            vector_from_fields("x", &fields, &features),
            Err(ResolveError::MissingFeature { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::OK, "x").is_none());
        assert!(status_error(StatusCode::NOT_FOUND, "x").unwrap().is_not_found());

        let limited = status_error(StatusCode::TOO_MANY_REQUESTS, "x").unwrap();
        assert!(matches!(limited, ResolveError::RateLimited { .. }));
        assert!(limited.is_transient());

        assert!(status_error(StatusCode::BAD_GATEWAY, "x").unwrap().is_transient());
        assert!(status_error(StatusCode::UNAUTHORIZED, "x").unwrap().is_transient());

        let rejected = status_error(StatusCode::BAD_REQUEST, "x").unwrap();
        assert!(matches!(rejected, ResolveError::Rejected { .. }));
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_token_expiry() {
        let now = Instant::now();
        let token = CachedToken::from_response(
            TokenResponse {
                access_token: "abc".to_string(),
                expires_in: 3600,
            },
            now,
        );
        assert!(token.is_fresh(now));
        assert!(token.is_fresh(now + Duration::from_secs(3500)));
        assert!(!token.is_fresh(now + Duration::from_secs(3541)));

        let short = CachedToken::from_response(
            TokenResponse {
                access_token: "abc".to_string(),
                expires_in: 30,
            },
            now,
        );
        assert!(!short.is_fresh(now));
    }

    #[test]
    fn test_resolver_construction() {
        let resolver = SpotifyResolver::new("id", "secret", FeatureSet::default())
            .unwrap()
            .with_endpoints("http://localhost:9/v1/", "http://localhost:9/token");
        assert_eq!(resolver.name(), "Spotify");
        assert_eq!(resolver.api_base, "http://localhost:9/v1");
    }
}
