use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    credentials::AccessToken,
    error::{Error, Result},
};

pub const PAGE_SIZE: u32 = 100;

/// A variable as returned by `projects.configs.variables.list` with
/// `returnValues=true`. Carries either `text` or base64 `value`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListVariablesResponse {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Lists variables under a config, one page per call.
pub trait VariableSource {
    fn list_variables(&self, parent: &str, page_token: Option<&str>)
        -> Result<ListVariablesResponse>;
}

/// Error response bodies are only used for messages.
pub fn body_text(body: reqwest::Result<String>) -> String {
    body.unwrap_or_else(|err| format!("<unreadable body: {err}>"))
}

pub fn parent(project: &str, config_name: &str) -> String {
    format!("projects/{project}/configs/{config_name}")
}

pub struct Client {
    http: reqwest::blocking::Client,
    api_root: String,
    token: AccessToken,
}

impl Client {
    pub fn new(api_root: &str, token: AccessToken, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("rcloadenv/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build().map_err(Error::HttpClient)?,
            api_root: api_root.to_owned(),
            token,
        })
    }

    fn variables_url(&self, parent: &str) -> String {
        format!("{}/{}/variables", self.api_root.trim_end_matches('/'), parent)
    }
}

impl VariableSource for Client {
    fn list_variables(
        &self,
        parent: &str,
        page_token: Option<&str>,
    ) -> Result<ListVariablesResponse> {
        let mut query = vec![
            ("returnValues", "true".to_owned()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_owned()));
        }

        let response = self
            .http
            .get(self.variables_url(parent))
            .bearer_auth(self.token.secret())
            .query(&query)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response.text());
            return Err(Error::Api { status, body });
        }

        Ok(response.json()?)
    }
}
