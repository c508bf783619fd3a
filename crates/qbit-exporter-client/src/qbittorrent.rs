use std::collections::BTreeMap;

use async_trait::async_trait;
use qbit_exporter_common::{
    ExporterConfig,
    error::{ExporterError, FetchError},
};
use reqwest::{
    StatusCode,
    header::{COOKIE, HeaderValue, REFERER, SET_COOKIE},
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use url::Url;

use crate::{
    client::UpstreamClient,
    types::{CategoryInfo, MainData, StatusPayload, Torrent},
};

const LOGIN_PATH: &str = "api/v2/auth/login";
const VERSION_PATH: &str = "api/v2/app/version";
const MAINDATA_PATH: &str = "api/v2/sync/maindata";
const CATEGORIES_PATH: &str = "api/v2/torrents/categories";
const TORRENTS_PATH: &str = "api/v2/torrents/info";

#[derive(Default)]
struct Session {
    /// Incremented after every login attempt, successful or not.
    generation: u64,
    cookie: Option<HeaderValue>,
    failure: Option<FetchError>,
}

/// [`UpstreamClient`] backed by the qBittorrent WebUI API v2.
///
/// The session cookie is obtained lazily and a `403` triggers one login
/// followed by one retry. Requests that were rejected with the same session
/// share a single login attempt and its outcome, so a wrong password costs
/// one failed login per scrape rather than one per endpoint.
pub struct QbittorrentClient {
    base_url: Url,
    username: String,
    password: String,
    http: reqwest::Client,
    session: Mutex<Session>,
}

impl QbittorrentClient {
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        let mut base_url = Url::parse(&config.base_url()).map_err(|err| {
            ExporterError::InternalError(format!(
                "invalid upstream url {}: {err}",
                config.base_url()
            ))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.fetch_timeout)
            .timeout(config.fetch_timeout)
            .danger_accept_invalid_certs(!config.verify_webui_certificate)
            .user_agent(concat!("qbit-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                ExporterError::InternalError(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            http,
            session: Mutex::new(Session::default()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|err| FetchError::Connection(format!("invalid endpoint {path}: {err}")))
    }

    async fn login(&self) -> Result<Option<HeaderValue>, FetchError> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH)?)
            .header(REFERER, self.base_url.as_str())
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|err| transport_error(LOGIN_PATH, err))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(FetchError::Authentication(
                "login refused, the exporter address may be banned after failed attempts"
                    .to_string(),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::MalformedResponse(format!(
                "{LOGIN_PATH} returned status {status}"
            )));
        }

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .find(|pair| pair.contains('='))
            .and_then(|pair| HeaderValue::from_str(pair).ok());

        let body = response
            .text()
            .await
            .map_err(|err| transport_error(LOGIN_PATH, err))?;
        if body.trim() != "Ok." {
            return Err(FetchError::Authentication(
                "invalid username or password".to_string(),
            ));
        }

        info!(server = %self.base_url, "logged in to qBittorrent");
        Ok(cookie)
    }

    /// Logs in unless another caller already attempted it since generation
    /// `seen`, in which case that attempt's outcome is reused.
    async fn refresh_session(&self, seen: u64) -> Result<Option<HeaderValue>, FetchError> {
        let mut session = self.session.lock().await;
        if session.generation == seen {
            match self.login().await {
                Ok(cookie) => {
                    session.cookie = cookie;
                    session.failure = None;
                }
                Err(err) => {
                    session.cookie = None;
                    session.failure = Some(err);
                }
            }
            session.generation += 1;
        }

        match &session.failure {
            Some(err) => Err(err.clone()),
            None => Ok(session.cookie.clone()),
        }
    }

    async fn send_get(
        &self,
        path: &str,
        url: Url,
        cookie: Option<HeaderValue>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.http.get(url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        request.send().await.map_err(|err| transport_error(path, err))
    }

    async fn get(&self, path: &'static str) -> Result<reqwest::Response, FetchError> {
        let url = self.endpoint(path)?;
        let (seen, cookie) = {
            let session = self.session.lock().await;
            (session.generation, session.cookie.clone())
        };

        let response = self.send_get(path, url.clone(), cookie).await?;
        if response.status() != StatusCode::FORBIDDEN {
            return check_status(path, response);
        }

        debug!(path, "session rejected, logging in");
        let cookie = self.refresh_session(seen).await?;
        let response = self.send_get(path, url, cookie).await?;
        if response.status() == StatusCode::FORBIDDEN {
            return Err(FetchError::Authentication(format!(
                "{path} is still forbidden after logging in"
            )));
        }
        check_status(path, response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, FetchError> {
        let body = self
            .get(path)
            .await?
            .bytes()
            .await
            .map_err(|err| transport_error(path, err))?;

        serde_json::from_slice(&body)
            .map_err(|err| FetchError::MalformedResponse(format!("{path}: {err}")))
    }

    async fn get_text(&self, path: &'static str) -> Result<String, FetchError> {
        self.get(path)
            .await?
            .text()
            .await
            .map_err(|err| transport_error(path, err))
    }
}

#[async_trait]
impl UpstreamClient for QbittorrentClient {
    async fn fetch_status(&self) -> Result<StatusPayload, FetchError> {
        let maindata: MainData = self.get_json(MAINDATA_PATH).await?;
        let version = match self.get_text(VERSION_PATH).await {
            Ok(version) => version.trim().to_string(),
            Err(err) => {
                error!(reason = err.reason(), error = %err, "couldn't get server version");
                String::new()
            }
        };

        Ok(StatusPayload {
            server_state: maindata.server_state,
            version,
        })
    }

    async fn fetch_categories(&self) -> Result<BTreeMap<String, CategoryInfo>, FetchError> {
        self.get_json(CATEGORIES_PATH).await
    }

    async fn fetch_items(&self) -> Result<Vec<Torrent>, FetchError> {
        self.get_json(TORRENTS_PATH).await
    }
}

fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Authentication(format!(
            "{path} returned status {status}"
        )));
    }

    Err(FetchError::MalformedResponse(format!(
        "{path} returned status {status}"
    )))
}

fn transport_error(path: &str, err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::MalformedResponse(format!("{path}: {err}"))
    } else {
        FetchError::Connection(format!("{path}: {err}"))
    }
}
