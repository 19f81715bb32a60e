use std::convert::Infallible;

use crate::{
    args::{self, Invocation, LoadDecision},
    config::Config,
    credentials,
    env::Environment,
    error::Result,
    exec::Executor,
    loader::{self, Filter},
    runtimeconfig::{self, VariableSource},
};

/// Builds the authorized Runtime Config client.
pub fn connect(config: &Config) -> Result<runtimeconfig::Client> {
    let token = credentials::obtain(config)?;
    runtimeconfig::Client::new(config.api_root(), token, config.timeout()?)
}

/// Loads the config (when enabled) and replaces the process with the target
/// command. `connect` is only called if variables are actually fetched.
pub fn run<S, F, E>(
    invocation: &Invocation,
    config: &Config,
    base: Environment,
    connect: F,
    executor: &E,
) -> Result<Infallible>
where
    S: VariableSource,
    F: FnOnce(&Config) -> Result<S>,
    E: Executor,
{
    let decision = args::decide(invocation, config);

    let binary = executor.resolve(&invocation.command[0])?;

    let env = match decision {
        LoadDecision::Skip(reason) => {
            tracing::debug!("running without runtime config: {:?}", reason);
            base
        }
        LoadDecision::Load {
            project,
            config_name,
        } => {
            tracing::info!("fetching runtime config {} from {}", config_name, project);
            let source = connect(config)?;
            let filter = Filter {
                only: config.only(),
                except: config.except(),
            };
            let vals = loader::list_variables(&source, project, config_name, &filter)?;
            tracing::info!("loaded {} variables from {}", vals.len(), config_name);
            base.merge(&vals)
        }
    };

    executor.replace(&binary, &invocation.command, &env)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        ffi::{OsStr, OsString},
        path::{Path, PathBuf},
    };

    use super::*;
    use crate::{
        error::Error,
        runtimeconfig::{ListVariablesResponse, Variable},
    };

    #[derive(Default)]
    struct RecordingExecutor {
        replaced: RefCell<Option<(PathBuf, Vec<OsString>, Environment)>>,
    }

    impl Executor for RecordingExecutor {
        fn resolve(&self, command: &OsStr) -> Result<PathBuf> {
            Ok(Path::new("/usr/bin").join(command))
        }

        fn replace(
            &self,
            binary: &Path,
            args: &[OsString],
            env: &Environment,
        ) -> Result<Infallible> {
            *self.replaced.borrow_mut() = Some((binary.to_owned(), args.to_vec(), env.clone()));
            Err(Error::Exec {
                binary: binary.to_owned(),
                args: args.to_vec(),
                source: std::io::Error::other("recorded"),
            })
        }
    }

    struct OnePage(ListVariablesResponse);

    impl VariableSource for OnePage {
        fn list_variables(&self, _: &str, _: Option<&str>) -> Result<ListVariablesResponse> {
            Ok(self.0.clone())
        }
    }

    fn os_args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    fn base_env() -> Environment {
        [
            (OsString::from("PATH"), OsString::from("/usr/bin:/bin")),
            (OsString::from("HOME"), OsString::from("/root")),
        ]
        .into_iter()
        .collect()
    }

    fn never_connect(_: &Config) -> Result<OnePage> {
        panic!("config should not be loaded");
    }

    #[test]
    fn test_no_config_name_runs_with_inherited_env() {
        let invocation = Invocation::parse(&os_args(&["rcloadenv", "--", "echo", "hi"])).unwrap();
        let config = Config {
            google_cloud_project: Some("my-project".into()),
            ..Config::default()
        };
        let executor = RecordingExecutor::default();

        let result = run(&invocation, &config, base_env(), never_connect, &executor);

        assert!(matches!(result, Err(Error::Exec { .. })));
        let (binary, args, env) = executor.replaced.take().unwrap();
        assert_eq!(binary, PathBuf::from("/usr/bin/echo"));
        assert_eq!(args, os_args(&["echo", "hi"]));
        assert_eq!(env, base_env());
    }

    #[test]
    fn test_no_project_runs_with_inherited_env() {
        let invocation =
            Invocation::parse(&os_args(&["rcloadenv", "myconfig", "--", "echo", "hi"])).unwrap();
        let executor = RecordingExecutor::default();

        let _ = run(&invocation, &Config::default(), base_env(), never_connect, &executor);

        let (_, args, env) = executor.replaced.take().unwrap();
        assert_eq!(args, os_args(&["echo", "hi"]));
        assert_eq!(env, base_env());
    }

    #[test]
    fn test_loaded_variable_reaches_command() {
        let invocation =
            Invocation::parse(&os_args(&["rcloadenv", "myconfig", "--", "printenv", "FOO"]))
                .unwrap();
        let config = Config {
            gcloud_project: Some("my-project".into()),
            ..Config::default()
        };
        let executor = RecordingExecutor::default();
        let connect = |_: &Config| {
            Ok(OnePage(ListVariablesResponse {
                variables: vec![Variable {
                    name: "projects/my-project/configs/myconfig/variables/foo".into(),
                    text: Some("bar".into()),
                    value: None,
                }],
                next_page_token: None,
            }))
        };

        let _ = run(&invocation, &config, base_env(), connect, &executor);

        let (binary, args, env) = executor.replaced.take().unwrap();
        assert_eq!(binary, PathBuf::from("/usr/bin/printenv"));
        assert_eq!(args, os_args(&["printenv", "FOO"]));
        assert_eq!(env.get("FOO"), Some(OsStr::new("bar")));
        assert_eq!(env.get("HOME"), Some(OsStr::new("/root")));
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let invocation =
            Invocation::parse(&os_args(&["rcloadenv", "myconfig", "--", "true"])).unwrap();
        let config = Config {
            google_cloud_project: Some("my-project".into()),
            ..Config::default()
        };
        let executor = RecordingExecutor::default();
        let connect = |_: &Config| -> Result<OnePage> { Err(Error::Credentials("no token".into())) };

        let result = run(&invocation, &config, base_env(), connect, &executor);

        assert!(matches!(result, Err(Error::Credentials(_))));
        assert!(executor.replaced.take().is_none());
    }

    #[test]
    fn test_decode_failure_is_fatal() {
        let invocation =
            Invocation::parse(&os_args(&["rcloadenv", "myconfig", "--", "true"])).unwrap();
        let config = Config {
            google_cloud_project: Some("my-project".into()),
            ..Config::default()
        };
        let executor = RecordingExecutor::default();
        let connect = |_: &Config| {
            Ok(OnePage(ListVariablesResponse {
                variables: vec![Variable {
                    name: "projects/my-project/configs/myconfig/variables/bad".into(),
                    text: None,
                    value: Some("%%%".into()),
                }],
                next_page_token: None,
            }))
        };

        let result = run(&invocation, &config, base_env(), connect, &executor);

        assert!(matches!(result, Err(Error::Decode { .. })));
        assert!(executor.replaced.take().is_none());
    }

    #[test]
    fn test_connect_uses_configured_api_root() {
        let server = httpmock::MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/v1beta1/projects/my-project/configs/myconfig/variables")
                .header("authorization", "Bearer ya29.configured");
            then.status(200).json_body(serde_json::json!({
                "variables": [
                    {
                        "name": "projects/my-project/configs/myconfig/variables/foo",
                        "value": "YmFy"
                    }
                ]
            }));
        });

        let invocation =
            Invocation::parse(&os_args(&["rcloadenv", "myconfig", "--", "printenv", "FOO"]))
                .unwrap();
        let config = Config {
            google_cloud_project: Some("my-project".into()),
            google_oauth_access_token: Some("ya29.configured".into()),
            rcloadenv_api_root: Some(server.url("/v1beta1/")),
            ..Config::default()
        };
        let executor = RecordingExecutor::default();

        let _ = run(&invocation, &config, base_env(), connect, &executor);

        listing.assert();
        let (_, _, env) = executor.replaced.take().unwrap();
        assert_eq!(env.get("FOO"), Some(OsStr::new("bar")));
    }
}
