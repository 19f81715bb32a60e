use std::{
    convert::Infallible,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    env::Environment,
    error::{Error, Result},
};

pub trait Executor {
    /// Looks the command up like a shell would, using `PATH`.
    fn resolve(&self, command: &OsStr) -> Result<PathBuf>;

    /// Runs `binary` in place of the current process. Only ever returns an
    /// error.
    fn replace(&self, binary: &Path, args: &[OsString], env: &Environment)
        -> Result<Infallible>;
}

/// Replaces the process image on unix. Elsewhere the command runs as a child
/// and its exit code becomes ours.
pub struct ProcessExecutor;

impl ProcessExecutor {
    fn command(binary: &Path, args: &[OsString], env: &Environment) -> Command {
        let mut command = Command::new(binary);
        command
            .args(args.iter().skip(1))
            .env_clear()
            .envs(env.iter());
        command
    }

    fn error(binary: &Path, args: &[OsString], source: std::io::Error) -> Error {
        Error::Exec {
            binary: binary.to_owned(),
            args: args.to_vec(),
            source,
        }
    }
}

impl Executor for ProcessExecutor {
    fn resolve(&self, command: &OsStr) -> Result<PathBuf> {
        which::which(command).map_err(|source| Error::CommandNotFound {
            command: command.to_owned(),
            source,
        })
    }

    #[cfg(target_family = "unix")]
    fn replace(
        &self,
        binary: &Path,
        args: &[OsString],
        env: &Environment,
    ) -> Result<Infallible> {
        use std::os::unix::process::CommandExt;

        let mut command = Self::command(binary, args, env);
        if let Some(arg0) = args.first() {
            command.arg0(arg0);
        }

        Err(Self::error(binary, args, command.exec()))
    }

    #[cfg(not(target_family = "unix"))]
    fn replace(
        &self,
        binary: &Path,
        args: &[OsString],
        env: &Environment,
    ) -> Result<Infallible> {
        let status = Self::command(binary, args, env)
            .status()
            .map_err(|err| Self::error(binary, args, err))?;
        std::process::exit(status.code().unwrap_or(1));
    }
}
