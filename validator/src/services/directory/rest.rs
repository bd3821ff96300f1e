//! JSON-over-HTTP client for the identity directory.
//!
//! A [`RestDirectory`] is a logged-in session: [`RestDirectory::login`] builds an
//! HTTP client carrying the bearer token and checks it against `GET /session`
//! before anything else is sent. The session lives as long as the value; a run
//! creates one at start and drops it at the end.
//!
//! Endpoints used, relative to the configured base URL:
//! - `GET  userProfile/{username}`: account by name, 404 when absent
//! - `GET  userGroupHeaders?prefix=..`: prefix search, used for digit-only names
//! - `GET  team/{team}/member/{id}`: 200 when a member, 404 when not
//! - `GET  team/{team}/openInvitation?limit=..&offset=..`: open invitations
//! - `POST membershipInvitation`: invite an account to a team
//! - `POST message`: send a notice to an account

use super::{DirectoryError, IdentityDirectory, Notice};
use crate::config::DirectoryConfig;
use crate::validation::username::is_numeric;
use common::model::account::Account;
use log::{debug, info};
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const INVITATION_PAGE_SIZE: usize = 50;

pub struct RestDirectory {
    base: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GroupHeader {
    #[serde(rename = "ownerId")]
    owner_id: String,
    #[serde(rename = "userName", default)]
    user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupHeaderPage {
    #[serde(default)]
    children: Vec<GroupHeader>,
}

#[derive(Debug, Deserialize)]
struct Invitation {
    #[serde(rename = "inviteeId")]
    invitee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvitationPage {
    #[serde(default)]
    results: Vec<Invitation>,
}

/// First header whose user name is exactly `username`. Teams and partial prefix
/// matches are ignored.
fn pick_exact(headers: Vec<GroupHeader>, username: &str) -> Option<Account> {
    headers
        .into_iter()
        .find(|h| h.user_name.as_deref() == Some(username))
        .map(|h| Account {
            id: h.owner_id,
            user_name: username.to_string(),
        })
}

fn parse_body<T: DeserializeOwned>(text: &str, endpoint: &str) -> Result<T, DirectoryError> {
    serde_json::from_str(text).map_err(|e| DirectoryError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, DirectoryError> {
    let text = response
        .text()
        .map_err(|e| DirectoryError::Unavailable(format!("{}: {}", endpoint, e)))?;
    parse_body(&text, endpoint)
}

fn unexpected(response: &Response, endpoint: &str) -> DirectoryError {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DirectoryError::Unauthorized(response.status().as_u16())
        }
        status => DirectoryError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        },
    }
}

/// HTTP client settings shared by every request of a session.
fn client_builder(config: &DirectoryConfig, token: &str) -> Result<ClientBuilder, DirectoryError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| DirectoryError::Setup("token contains invalid characters".into()))?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs)))
}

impl RestDirectory {
    /// Opens a session with the directory and verifies the token.
    pub fn login(config: &DirectoryConfig, token: &str) -> Result<Self, DirectoryError> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|e| DirectoryError::Setup(format!("base_url: {}", e)))?;

        let client = client_builder(config, token)?
            .build()
            .map_err(|e| DirectoryError::Setup(e.to_string()))?;
        Self::open(base, client)
    }

    /// Checks the session with an already configured client.
    fn open(base: Url, client: Client) -> Result<Self, DirectoryError> {
        let directory = Self::with_client(base, client);
        let url = directory.endpoint(&["session"])?;
        let response = directory.send(directory.client.get(url), "session")?;
        if !response.status().is_success() {
            return Err(unexpected(&response, "session"));
        }

        info!("Logged in to directory at {}", directory.base);
        Ok(directory)
    }

    fn with_client(base: Url, client: Client) -> Self {
        Self { base, client }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Setup(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response, DirectoryError> {
        debug!("Directory request: {}", endpoint);
        request
            .send()
            .map_err(|e| DirectoryError::Unavailable(format!("{}: {}", endpoint, e)))
    }

    /// GET that maps 404 to `None`.
    fn get_optional(&self, segments: &[&str]) -> Result<Option<Response>, DirectoryError> {
        let endpoint = segments.join("/");
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.get(url), &endpoint)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            _ => Err(unexpected(&response, &endpoint)),
        }
    }

    fn search_headers(&self, username: &str) -> Result<Option<Account>, DirectoryError> {
        let endpoint = "userGroupHeaders";
        let mut url = self.endpoint(&[endpoint])?;
        url.query_pairs_mut().append_pair("prefix", username);

        let response = self.send(self.client.get(url), endpoint)?;
        if !response.status().is_success() {
            return Err(unexpected(&response, endpoint));
        }
        let page: GroupHeaderPage = decode(response, endpoint)?;
        Ok(pick_exact(page.children, username))
    }

    fn post(&self, segments: &[&str], body: &serde_json::Value) -> Result<(), DirectoryError> {
        let endpoint = segments.join("/");
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.post(url).json(body), &endpoint)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(&response, &endpoint))
        }
    }
}

impl IdentityDirectory for RestDirectory {
    fn lookup_account(&self, username: &str) -> Result<Option<Account>, DirectoryError> {
        // A name made of digits would be read as an account id by userProfile.
        if is_numeric(username) {
            return self.search_headers(username);
        }
        match self.get_optional(&["userProfile", username])? {
            Some(response) => decode(response, "userProfile").map(Some),
            None => Ok(None),
        }
    }

    fn is_registered(&self, account_id: &str, code: &str) -> Result<bool, DirectoryError> {
        Ok(self
            .get_optional(&["team", code, "member", account_id])?
            .is_some())
    }

    fn open_invitations(&self, team: &str) -> Result<Vec<String>, DirectoryError> {
        let endpoint = format!("team/{}/openInvitation", team);
        let mut invitees = Vec::new();
        let mut offset = 0;

        loop {
            let mut url = self.endpoint(&["team", team, "openInvitation"])?;
            url.query_pairs_mut()
                .append_pair("limit", &INVITATION_PAGE_SIZE.to_string())
                .append_pair("offset", &offset.to_string());

            let response = self.send(self.client.get(url), &endpoint)?;
            if !response.status().is_success() {
                return Err(unexpected(&response, &endpoint));
            }
            let page: InvitationPage = decode(response, &endpoint)?;
            let fetched = page.results.len();
            invitees.extend(page.results.into_iter().filter_map(|i| i.invitee_id));

            if fetched < INVITATION_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        debug!("Team {} has {} open invitation(s)", team, invitees.len());
        Ok(invitees)
    }

    fn send_invitation(
        &self,
        team: &str,
        account_id: &str,
        message: &str,
    ) -> Result<(), DirectoryError> {
        self.post(
            &["membershipInvitation"],
            &json!({
                "teamId": team,
                "inviteeId": account_id,
                "message": message,
            }),
        )
    }

    fn send_notice(&self, account_id: &str, notice: &Notice) -> Result<(), DirectoryError> {
        self.post(
            &["message"],
            &json!({
                "recipients": [account_id],
                "subject": notice.subject,
                "body": notice.body,
                "contentType": "text/html",
            }),
        )
    }
}
