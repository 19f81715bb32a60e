use std::{ffi::OsString, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read settings from environment: {0}")]
    Config(#[from] envy::Error),

    #[error("invalid setting {name}={value:?}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not create client: {0}")]
    Credentials(String),

    #[error("could not create client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("could not fetch config: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not fetch config: {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode variable {name}, {value}: {reason}")]
    Decode {
        name: String,
        value: String,
        reason: String,
    },

    #[error("failed to find command {command:?}: {source}")]
    CommandNotFound {
        command: OsString,
        #[source]
        source: which::Error,
    },

    #[error("failed to run process {binary:?} {args:?}: {source}")]
    Exec {
        binary: PathBuf,
        args: Vec<OsString>,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
