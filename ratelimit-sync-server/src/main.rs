#![deny(clippy::all, clippy::cargo)]

#[macro_use]
extern crate log;
extern crate clap;

use crate::config::Configuration;
use crate::http_api::server::run_http_server;
use crate::prometheus_metrics::PrometheusMetrics;
use crate::reporter::StatusReporter;
use crate::topology::Topology;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use log::LevelFilter;
use notify::event::ModifyKind;
use notify::{Error, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ratelimit_sync::errors::{ErrorList, SyncError, TranslationError};
use ratelimit_sync::metrics::MetricsSink;
use ratelimit_sync::model::RateLimitServerSettings;
use ratelimit_sync::plugin::ProxyRateLimits;
use ratelimit_sync::snapshot::{GenericSnapshot, InMemorySnapshotCache, SnapshotCache};
use ratelimit_sync::{
    CollectorType, DefaultCollectorFactory, RateLimitPlugin, RateLimitSyncer, ResourceReports, RlCache,
    SyncOutcome,
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Mutex;

mod config;
mod http_api;
mod prometheus_metrics;
mod reporter;
mod topology;

const RATELIMIT_SYNC_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RATELIMIT_SYNC_GIT_HASH"),
    ") ",
    env!("RATELIMIT_SYNC_PROFILE"),
);

#[derive(Error, Debug)]
pub enum RateLimitSyncServerError {
    #[error("Invalid topology file: {0}")]
    ConfigFile(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),
    #[error("Sync failed: {0}")]
    Sync(#[from] ErrorList<SyncError>),
}

/// Runs the proxy-side translation and the server-side sync over the
/// topology file, and keeps what the admin API serves.
pub struct SyncServer {
    plugin: RateLimitPlugin,
    syncer: RateLimitSyncer,
    rl_cache: Arc<RlCache>,
    snapshot_cache: Arc<InMemorySnapshotCache>,
    reporter: Arc<StatusReporter>,
    rate_limit_before_auth: bool,
    rate_limits: Vec<ProxyRateLimits>,
}

impl SyncServer {
    pub fn new(config: &Configuration, metrics: Arc<dyn MetricsSink>) -> Self {
        let rl_cache = Arc::new(RlCache::with_capacity(config.rl_cache_capacity));
        let reporter = Arc::new(StatusReporter::new());
        let syncer = RateLimitSyncer::new(
            Arc::new(DefaultCollectorFactory::new(rl_cache.clone())),
            reporter.clone(),
            metrics,
        )
        .with_collectors(config.collectors.clone());

        Self {
            plugin: RateLimitPlugin::with_cache(rl_cache.clone()),
            syncer,
            rl_cache,
            snapshot_cache: Arc::new(InMemorySnapshotCache::new()),
            reporter,
            rate_limit_before_auth: config.rate_limit_before_auth,
            rate_limits: Vec::new(),
        }
    }

    pub fn collectors(&self) -> &[CollectorType] {
        self.syncer.collector_types()
    }

    pub fn snapshot(&self, role: &str) -> Option<GenericSnapshot> {
        self.snapshot_cache.get_snapshot(role)
    }

    pub fn last_reports(&self) -> Option<ResourceReports> {
        self.reporter.last_reports()
    }

    pub fn rate_limits(&self) -> &[ProxyRateLimits] {
        &self.rate_limits
    }

    pub fn sync_from_file<P: AsRef<Path>>(&mut self, path: &P) -> Result<SyncOutcome, RateLimitSyncServerError> {
        let (mut settings, snapshot) = Topology::load_from_file(path)?.into_snapshot();
        if self.rate_limit_before_auth {
            settings
                .ratelimit_server
                .get_or_insert_with(RateLimitServerSettings::default)
                .rate_limit_before_auth = true;
        }
        let snapshot = Arc::new(snapshot);

        let mut proxy_reports = ResourceReports::new();
        self.rate_limits = self
            .plugin
            .process_snapshot(&snapshot, &settings, &mut proxy_reports)?;

        let mut reports = ResourceReports::new();
        let outcome = self.syncer.sync_with_reports(
            &snapshot,
            &settings,
            self.snapshot_cache.as_ref(),
            &mut reports,
            &proxy_reports,
        );
        self.rl_cache.release(&snapshot);
        Ok(outcome?)
    }
}

fn config_from_matches(matches: &ArgMatches) -> Result<Configuration, RateLimitSyncServerError> {
    let missing = |name: &str| RateLimitSyncServerError::Config(format!("missing argument {name}"));

    let topology_file = matches
        .get_one::<String>("TOPOLOGY_FILE")
        .ok_or_else(|| missing("TOPOLOGY_FILE"))?;
    let http_ip = matches
        .get_one::<String>("http_ip")
        .ok_or_else(|| missing("http_ip"))?;
    let http_port = matches
        .get_one::<u16>("http_port")
        .ok_or_else(|| missing("http_port"))?;
    let rl_cache_capacity = matches
        .get_one::<usize>("rl_cache_capacity")
        .ok_or_else(|| missing("rl_cache_capacity"))?;
    let collectors = match matches.get_many::<CollectorType>("collectors") {
        Some(collectors) => collectors.copied().collect(),
        None => CollectorType::ALL.to_vec(),
    };

    Ok(Configuration::with(
        topology_file.to_string(),
        http_ip.to_string(),
        *http_port,
        matches.get_flag("rate_limit_before_auth"),
        *rl_cache_capacity,
        collectors,
    ))
}

#[actix_rt::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cmdline = Command::new("Rate Limit Sync Server")
        .version(RATELIMIT_SYNC_VERSION)
        .about("Compiles rate limit configuration for Envoy and keeps it in sync")
        .arg(
            Arg::new("config_from_env")
                .short('E')
                .long("use-env-vars")
                .action(ArgAction::SetTrue)
                .help("Sets the server up from ENV VARS instead of these options")
                .exclusive(true),
        )
        .arg(
            Arg::new("TOPOLOGY_FILE")
                .help("The topology file to sync")
                .required_unless_present("config_from_env")
                .index(1),
        )
        .arg(
            Arg::new("http_ip")
                .short('B')
                .long("http-ip")
                .default_value(Configuration::DEFAULT_IP_BIND)
                .display_order(1)
                .help("The IP to listen on for HTTP"),
        )
        .arg(
            Arg::new("http_port")
                .short('P')
                .long("http-port")
                .default_value(Configuration::DEFAULT_HTTP_PORT)
                .value_parser(value_parser!(u16))
                .display_order(2)
                .help("The port to listen on for HTTP"),
        )
        .arg(
            Arg::new("rate_limit_before_auth")
                .long("rate-limit-before-auth")
                .action(ArgAction::SetTrue)
                .display_order(3)
                .help("Rate limit before auth, whatever the topology settings say"),
        )
        .arg(
            Arg::new("rl_cache_capacity")
                .long("rl-cache-capacity")
                .default_value(Configuration::DEFAULT_RL_CACHE_CAPACITY)
                .value_parser(value_parser!(usize))
                .display_order(4)
                .help("Number of snapshots whose RateLimitConfig index is kept"),
        )
        .arg(
            Arg::new("collectors")
                .short('c')
                .long("collectors")
                .value_delimiter(',')
                .value_parser(|name: &str| name.parse::<CollectorType>())
                .display_order(5)
                .help("Collectors to run: basic, crd, global [default: all]"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .action(ArgAction::Count)
                .display_order(6)
                .help("Sets the level of verbosity"),
        );
    let matches = cmdline.get_matches();

    let config = if matches.get_flag("config_from_env") {
        Configuration::from_env()
    } else {
        config_from_matches(&matches)
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1)
        }
    };

    let level_filter = match matches.get_count("v") {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = Builder::new();

    builder
        .filter(None, level_filter)
        .parse_default_env()
        .init();

    info!("Using config: {:?}", config);

    let prometheus_metrics = match PrometheusMetrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            eprintln!("Failed to set up metrics: {e}");
            process::exit(1)
        }
    };

    let topology_file = config.topology_file.clone();
    let http_api_address = config.http_address();
    let server = Arc::new(Mutex::new(SyncServer::new(&config, prometheus_metrics.clone())));
    info!("Running collectors: {:?}", server.lock().await.collectors());

    match server.lock().await.sync_from_file(&topology_file) {
        Ok(outcome) => {
            prometheus_metrics.incr_sync_passes("ok");
            info!("Initial sync done, version {}", outcome.version());
        }
        Err(RateLimitSyncServerError::Sync(errors)) => {
            prometheus_metrics.incr_sync_passes("failed");
            warn!("Initial sync failed: {}", errors);
        }
        Err(e) => {
            eprintln!("Failed to load topology file: {e}");
            process::exit(1)
        }
    }

    let watched = Arc::clone(&server);
    let watched_metrics = Arc::clone(&prometheus_metrics);
    let handle = Handle::current();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, Error>| match result {
            Ok(ref event) => {
                if let EventKind::Modify(ModifyKind::Data(_)) = event.kind {
                    let Some(location) = event.paths.first().cloned() else {
                        return;
                    };
                    let server = watched.clone();
                    let metrics = watched_metrics.clone();
                    handle.spawn(async move {
                        match server.lock().await.sync_from_file(&location) {
                            Ok(outcome) => {
                                metrics.incr_sync_passes("ok");
                                info!("Resynced topology file, version {}", outcome.version())
                            }
                            Err(e) => {
                                metrics.incr_sync_passes("failed");
                                error!("Failed syncing topology file: {}", e)
                            }
                        }
                    });
                }
            }
            Err(ref e) => {
                warn!("Something went wrong while watching topology file: {}", e);
            }
        },
        notify::Config::default(),
    )?;

    watcher.watch(Path::new(&topology_file), RecursiveMode::Recursive)?;

    info!("HTTP server starting on {}", http_api_address);
    run_http_server(&http_api_address, server, prometheus_metrics).await?;

    Ok(())
}
