mod app;
mod args;
mod config;
mod credentials;
mod env;
mod error;
mod exec;
mod loader;
mod runtimeconfig;

use std::ffi::OsString;

use tracing_subscriber::EnvFilter;

use args::Invocation;
use config::Config;
use env::Environment;
use exec::ProcessExecutor;

fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let Some(invocation) = Invocation::parse(&argv) else {
        let program = argv
            .first()
            .map(|program| program.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rcloadenv".to_owned());
        eprintln!("{}", args::usage(&program));
        std::process::exit(1);
    };

    // create config from environment vars
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };

    // set-up logging, stdout belongs to the command we exec
    let debug = config.debug().unwrap_or_else(|err| {
        eprintln!("warn: {}", err);
        false
    });
    let filter = if debug {
        EnvFilter::new("info,rcloadenv=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = app::run(
        &invocation,
        &config,
        Environment::from_process(),
        app::connect,
        &ProcessExecutor,
    );

    match result {
        Ok(never) => match never {},
        Err(err) => {
            tracing::error!("{}", err);
            std::process::exit(1);
        }
    }
}
