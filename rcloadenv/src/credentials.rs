use std::{fs, path::Path, process::Command, time::Duration};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
    runtimeconfig,
};

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

pub const SCOPE: &str = "https://www.googleapis.com/auth/cloudruntimeconfig";

/// OAuth bearer token, kept out of `Debug` output.
#[derive(Clone, PartialEq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

fn default_token_uri() -> String {
    TOKEN_URI.to_owned()
}

/// The two credential file kinds ADC understands: a service account key and
/// the refresh token written by `gcloud auth application-default login`.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KeyFile {
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default)]
        private_key_id: Option<String>,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
}

#[derive(Serialize, Debug)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Finds a token using, in order: the `GOOGLE_OAUTH_ACCESS_TOKEN` setting,
/// key files (`GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_CLOUD_KEYFILE`,
/// `GCLOUD_KEYFILE`, then the inline `*_KEYFILE_JSON`), the gcloud
/// well-known credentials file, the compute metadata server, and the Cloud
/// SDK.
///
/// A key file that is configured but unusable is an error, later sources
/// are not tried.
pub fn obtain(config: &Config) -> Result<AccessToken> {
    if let Some(token) = config.access_token() {
        tracing::debug!("using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
        return Ok(AccessToken::new(token));
    }

    let http = http_client(config.timeout()?)?;

    if let Some(path) = config.key_file_paths().first() {
        tracing::debug!("using key file {}", path);
        return read_key_file(Path::new(path))
            .and_then(|key| from_key_file(&http, &key))
            .map_err(|err| Error::Credentials(format!("key file {path}: {err}")));
    }

    if let Some(json) = config.key_file_json() {
        tracing::debug!("using inline key file");
        return parse_key_file(json)
            .and_then(|key| from_key_file(&http, &key))
            .map_err(|err| Error::Credentials(format!("inline key file: {err}")));
    }

    if let Some(path) = config.well_known_credentials().filter(|path| path.is_file()) {
        tracing::debug!("using {}", path.display());
        return read_key_file(&path)
            .and_then(|key| from_key_file(&http, &key))
            .map_err(|err| Error::Credentials(format!("{}: {err}", path.display())));
    }

    let mut failures = Vec::new();

    match from_metadata_server(config.metadata_host()) {
        Ok(token) => return Ok(token),
        Err(err) => failures.push(format!("metadata server: {err}")),
    }

    match from_gcloud() {
        Ok(token) => return Ok(token),
        Err(err) => failures.push(format!("gcloud: {err}")),
    }

    Err(Error::Credentials(failures.join("; ")))
}

fn http_client(timeout: Option<Duration>) -> Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(Error::HttpClient)
}

fn read_key_file(path: &Path) -> std::result::Result<KeyFile, BoxError> {
    parse_key_file(&fs::read_to_string(path)?)
}

fn parse_key_file(json: &str) -> std::result::Result<KeyFile, BoxError> {
    Ok(serde_json::from_str(json)?)
}

fn from_key_file(
    http: &reqwest::blocking::Client,
    key: &KeyFile,
) -> std::result::Result<AccessToken, BoxError> {
    match key {
        KeyFile::ServiceAccount {
            client_email,
            private_key,
            private_key_id,
            token_uri,
        } => {
            let now = chrono::Utc::now().timestamp();
            let claims = Claims {
                iss: client_email,
                scope: SCOPE,
                aud: token_uri,
                iat: now,
                exp: now + ASSERTION_LIFETIME_SECS,
            };
            let mut header = Header::new(Algorithm::RS256);
            header.kid.clone_from(private_key_id);
            let assertion = jsonwebtoken::encode(
                &header,
                &claims,
                &EncodingKey::from_rsa_pem(private_key.as_bytes())?,
            )?;

            tracing::debug!("exchanging service account assertion for {}", client_email);
            exchange(
                http,
                token_uri,
                &[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ],
            )
        }
        KeyFile::AuthorizedUser {
            client_id,
            client_secret,
            refresh_token,
            token_uri,
        } => {
            tracing::debug!("refreshing user credentials for client {}", client_id);
            exchange(
                http,
                token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ],
            )
        }
    }
}

fn exchange(
    http: &reqwest::blocking::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> std::result::Result<AccessToken, BoxError> {
    let response = http.post(token_uri).form(form).send()?;
    let status = response.status();
    if !status.is_success() {
        let body = runtimeconfig::body_text(response.text());
        return Err(format!("status {status}: {}", body.trim()).into());
    }

    parse_token(&response.text()?)
}

fn from_metadata_server(host: &str) -> std::result::Result<AccessToken, BoxError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(METADATA_TIMEOUT)
        .build()?;

    let response = client
        .get(format!("http://{host}{METADATA_TOKEN_PATH}"))
        .query(&[("scopes", SCOPE)])
        .header("Metadata-Flavor", "Google")
        .send()?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()).into());
    }

    let token = parse_token(&response.text()?)?;
    tracing::debug!("using metadata server token");
    Ok(token)
}

fn parse_token(body: &str) -> std::result::Result<AccessToken, BoxError> {
    let token: TokenResponse = serde_json::from_str(body)?;
    tracing::debug!("token expires in {}s", token.expires_in);
    Ok(AccessToken::new(token.access_token))
}

fn from_gcloud() -> std::result::Result<AccessToken, BoxError> {
    let output = Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{}: {}", output.status, stderr.trim()).into());
    }

    let token = String::from_utf8(output.stdout)?.trim().to_owned();
    if token.is_empty() {
        return Err("empty token".into());
    }

    tracing::debug!("using gcloud application-default token");
    Ok(AccessToken::new(token))
}
