use core::time::Duration;
use log::{info, warn};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::error::Error;

pub mod roster;

use roster::TeamRosters;

/// HTTP collaborator for the roster source and the score submission sink.
/// Both endpoints are plain unauthenticated URLs; submission is
/// fire-and-forget from the caller's point of view.
pub struct PortalClient {
    roster_url: String,
    submit_url: String,
    client: Client,
}

impl PortalClient {
    pub fn new(
        roster_url: &str,
        submit_url: &str,
        require_https: bool,
        timeout: Duration,
    ) -> Result<Self, Box<dyn Error>> {
        let client = ClientBuilder::new()
            .https_only(require_https)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            roster_url: roster_url.trim_end_matches('/').to_string(),
            submit_url: submit_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn has_roster_source(&self) -> bool {
        !self.roster_url.is_empty()
    }

    pub fn has_submit_sink(&self) -> bool {
        !self.submit_url.is_empty()
    }

    pub fn fetch_teams(
        &self,
    ) -> impl std::future::Future<Output = Result<TeamRosters, Box<dyn Error>>> + use<> {
        let request = self.client.get(&self.roster_url).send();

        async move {
            let response = request.await?;

            if response.status() == StatusCode::OK {
                let body = response.text().await?;
                let teams = roster::parse_rosters(&body)?;
                info!("Fetched rosters for {} teams", teams.len());
                Ok(teams)
            } else {
                warn!("Roster fetch failed, response: {response:?}");
                let body = response.text().await?;
                Err(Box::new(ApiError::new(body)))?
            }
        }
    }

    pub fn post_game_log(
        &self,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), Box<dyn Error>>> + use<> {
        let request = self.client.post(&self.submit_url).json(&payload).send();

        async move {
            let response = request.await?;

            if response.status().is_success() {
                info!("Game log submission successful");
                Ok(())
            } else {
                warn!("Game log submission failed, response: {response:?}");
                let body = response.text().await?;
                Err(Box::new(ApiError::new(body)))?
            }
        }
    }
}

#[derive(Debug)]
struct ApiError {
    message: String,
}

impl ApiError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ApiError {}
