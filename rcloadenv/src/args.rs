use std::ffi::OsString;

use crate::config::Config;

/// Marks where our own arguments end and the target command begins.
pub const SEPARATOR: &str = "--";

/// Checks the number of arguments and the location of the separator.
///
/// `args` includes the program name at index 0.
pub fn validate(args: &[OsString]) -> bool {
    if args.len() < 3 {
        return false;
    }
    if args[2] == SEPARATOR && args.len() < 4 {
        return false;
    }
    if args[1] != SEPARATOR && args[2] != SEPARATOR {
        return false;
    }
    true
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [config_name] {SEPARATOR} command [args to command]\n\
         Populates the environment from Runtime Config (if config_name is set) and executes the command"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_name: Option<String>,
    /// Target command; `command[0]` is passed through as argv[0].
    pub command: Vec<OsString>,
}

impl Invocation {
    /// Splits validated arguments, returns `None` if `validate` rejects them.
    pub fn parse(args: &[OsString]) -> Option<Self> {
        if !validate(args) {
            return None;
        }

        if args[1] == SEPARATOR {
            return Some(Self {
                config_name: None,
                command: args[2..].to_vec(),
            });
        }

        Some(Self {
            config_name: Some(args[1].to_string_lossy().into_owned()),
            command: args[3..].to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    NoConfigName,
    NoProject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadDecision<'a> {
    Skip(SkipReason),
    Load {
        project: &'a str,
        config_name: &'a str,
    },
}

/// Decides whether variables should be fetched at all.
///
/// Missing inputs are not an error: the command then runs with the inherited
/// environment.
pub fn decide<'a>(invocation: &'a Invocation, config: &'a Config) -> LoadDecision<'a> {
    let Some(config_name) = invocation.config_name.as_deref() else {
        tracing::info!("not loading from RuntimeConfig API because config name not specified");
        return LoadDecision::Skip(SkipReason::NoConfigName);
    };

    let Some(project) = config.project_id() else {
        tracing::info!(
            "not loading from RuntimeConfig API because GOOGLE_CLOUD_PROJECT/GCLOUD_PROJECT not set"
        );
        return LoadDecision::Skip(SkipReason::NoProject);
    };

    LoadDecision::Load {
        project,
        config_name,
    }
}
