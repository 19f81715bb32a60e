use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_API_ROOT: &str = "https://runtimeconfig.googleapis.com/v1beta1/";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Settings read from the environment, never from files.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Config {
    pub google_cloud_project: Option<String>,
    /// Legacy name, only consulted when `GOOGLE_CLOUD_PROJECT` is unset.
    pub gcloud_project: Option<String>,

    pub google_oauth_access_token: Option<String>,
    pub google_application_credentials: Option<String>,
    pub google_cloud_keyfile: Option<String>,
    pub gcloud_keyfile: Option<String>,
    pub google_cloud_keyfile_json: Option<String>,
    pub gcloud_keyfile_json: Option<String>,
    pub cloudsdk_config: Option<String>,
    pub home: Option<String>,
    pub gce_metadata_host: Option<String>,

    pub rcloadenv_only: Option<String>,
    pub rcloadenv_except: Option<String>,
    pub rcloadenv_timeout: Option<String>,
    pub rcloadenv_api_root: Option<String>,
    pub rcloadenv_debug: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars_os())
    }

    /// Variables whose name or value isn't UTF-8 are skipped, none of ours
    /// can be like that.
    pub fn from_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)));
        Ok(envy::from_iter(vars)?)
    }

    pub fn project_id(&self) -> Option<&str> {
        non_empty(&self.google_cloud_project).or_else(|| non_empty(&self.gcloud_project))
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.google_oauth_access_token)
    }

    /// Key file paths, in the order they are tried.
    pub fn key_file_paths(&self) -> Vec<&str> {
        [
            &self.google_application_credentials,
            &self.google_cloud_keyfile,
            &self.gcloud_keyfile,
        ]
        .into_iter()
        .filter_map(non_empty)
        .collect()
    }

    /// Inline key file contents.
    pub fn key_file_json(&self) -> Option<&str> {
        non_empty(&self.google_cloud_keyfile_json).or_else(|| non_empty(&self.gcloud_keyfile_json))
    }

    /// Where `gcloud auth application-default login` stores credentials.
    pub fn well_known_credentials(&self) -> Option<PathBuf> {
        let dir = match non_empty(&self.cloudsdk_config) {
            Some(dir) => PathBuf::from(dir),
            None => Path::new(non_empty(&self.home)?).join(".config").join("gcloud"),
        };
        Some(dir.join("application_default_credentials.json"))
    }

    pub fn metadata_host(&self) -> &str {
        non_empty(&self.gce_metadata_host).unwrap_or(DEFAULT_METADATA_HOST)
    }

    pub fn api_root(&self) -> &str {
        non_empty(&self.rcloadenv_api_root).unwrap_or(DEFAULT_API_ROOT)
    }

    pub fn only(&self) -> Vec<String> {
        split_list(&self.rcloadenv_only)
    }

    pub fn except(&self) -> Vec<String> {
        split_list(&self.rcloadenv_except)
    }

    /// `None` leaves the HTTP client's default in place.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(value) = non_empty(&self.rcloadenv_timeout) else {
            return Ok(None);
        };

        value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|err| Error::InvalidSetting {
                name: "RCLOADENV_TIMEOUT",
                value: value.to_owned(),
                reason: err.to_string(),
            })
    }

    pub fn debug(&self) -> Result<bool> {
        let Some(value) = non_empty(&self.rcloadenv_debug) else {
            return Ok(false);
        };

        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidSetting {
                name: "RCLOADENV_DEBUG",
                value: value.to_owned(),
                reason: "expected a boolean".to_owned(),
            }),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
