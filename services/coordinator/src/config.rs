use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use jury_allocator::{
    AllocatorConfig, ScoreRange, TeamRange, DEFAULT_BATCH_SIZE, DEFAULT_LOCALITY_WINDOW,
    DEFAULT_MAX_TEAMS, DEFAULT_TEAM_RANGE,
};

use crate::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    /// `None` runs on the in-memory store.
    pub database: Option<DbConfig>,
    pub allocator: AllocatorConfig,
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("JURY_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .context("JURY_LISTEN_ADDR")?;

        let log_level = lookup("JURY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = lookup("JURY_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let database = DbConfig::from_lookup(&lookup);

        let team_range = TeamRange::new(
            parse_var(&lookup, "JURY_TEAM_START", DEFAULT_TEAM_RANGE.start())?,
            parse_var(&lookup, "JURY_TEAM_END", DEFAULT_TEAM_RANGE.end())?,
        )?;
        let defaults = ScoreRange::default();
        let score_range = ScoreRange::new(
            parse_var(&lookup, "JURY_SCORE_MIN", defaults.min)?,
            parse_var(&lookup, "JURY_SCORE_MAX", defaults.max)?,
        )?;
        let allocator = AllocatorConfig {
            team_range,
            batch_size: parse_var(&lookup, "JURY_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            window: parse_var(&lookup, "JURY_LOCALITY_WINDOW", DEFAULT_LOCALITY_WINDOW)?,
            score_range,
            max_teams: parse_var(&lookup, "JURY_MAX_TEAMS", DEFAULT_MAX_TEAMS)?,
        };
        allocator.validate()?;

        let rng_seed = lookup("JURY_RNG_SEED")
            .map(|raw| raw.parse::<u64>().context("JURY_RNG_SEED"))
            .transpose()?;

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            database,
            allocator,
            rng_seed,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
