// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use rollcall_app::{ConsoleState, RecordGateway};
use rollcall_db::Store;
use rollcall_testkit::RegistryFaker;
use runtime::GatewayRuntime;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEMO_SEED: u64 = 7;
const DEMO_PARTICIPANTS: usize = 40;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `rollcall --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let backend = Backend::resolve(&config, options.demo)?;
    if options.print_db_path {
        println!("{}", backend.describe());
        return Ok(());
    }

    logging::init(config.log_level(), &config.log_file()?)?;
    info!(backend = %backend.describe(), "starting");

    let gateway = backend.open(&config)?;
    if options.check_only {
        gateway
            .probe()
            .with_context(|| format!("probe {}", backend.describe()))?;
        return Ok(());
    }

    let mut state = ConsoleState::new(config.start_view(), config.cascade_mode());
    let mut runtime = GatewayRuntime::new(gateway);
    rollcall_tui::run_app(&mut state, &mut runtime)
}

/// Where records live for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    Demo,
    Local(PathBuf),
    Remote(String),
}

impl Backend {
    fn resolve(config: &Config, demo: bool) -> Result<Self> {
        if demo {
            return Ok(Self::Demo);
        }
        match config.remote_base_url() {
            Some(url) => Ok(Self::Remote(url.to_owned())),
            None => Ok(Self::Local(config.db_path()?)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Demo => ":memory:".to_owned(),
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }

    fn open(&self, config: &Config) -> Result<Arc<dyn RecordGateway>> {
        match self {
            Self::Demo => {
                let store = Store::open_memory()?;
                store.bootstrap()?;
                seed_demo_data(&store)?;
                Ok(Arc::new(store))
            }
            Self::Local(path) => {
                let store = Store::open(path).with_context(|| {
                    format!(
                        "open database {} -- if this path is wrong, set [storage].db_path or ROLLCALL_DB_PATH",
                        path.display()
                    )
                })?;
                store.bootstrap()?;
                Ok(Arc::new(store))
            }
            Self::Remote(url) => {
                let api_key = config.api_key().ok_or_else(|| {
                    anyhow!("[remote].base_url is set but no API key; set [remote].api_key or ROLLCALL_API_KEY")
                })?;
                let client = rollcall_rest::Client::new(url, &api_key, config.timeout()?)
                    .context("invalid [remote] config; fix base_url/api_key/timeout values")?
                    .with_cascade_function(config.cascade_function());
                Ok(Arc::new(client))
            }
        }
    }
}

fn seed_demo_data(store: &Store) -> Result<()> {
    let mut faker = RegistryFaker::new(DEMO_SEED);
    for record in faker.registry(DEMO_PARTICIPANTS) {
        let id = store.create_participant_at(&record.payload, record.updated_at)?;
        for transaction in record.transactions_for(&id) {
            store.create_transaction(&transaction)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("rollcall");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path or remote URL");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config and probe the backend");
    println!("  --help                   Show this help");
}
