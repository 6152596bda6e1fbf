use crate::errors::{EngineError, EngineResult};
use crate::limits::ComputeLimits;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// `*` allows any origin.
    pub cors_allow_origin: String,
    pub limits: ComputeLimits,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = ComputeLimits::default();

        let server_port = parse_var("SERVER_PORT", "8000")?;
        let max_lattice_steps = parse_var("MAX_LATTICE_STEPS", &defaults.max_lattice_steps.to_string())?;
        let max_grid_steps = parse_var("MAX_GRID_STEPS", &defaults.max_grid_steps.to_string())?;
        let max_surface_work = parse_var("MAX_SURFACE_WORK", &defaults.max_surface_work.to_string())?;
        let max_monte_carlo_work = parse_var("MAX_MONTE_CARLO_WORK", &defaults.max_monte_carlo_work.to_string())?;

        Ok(Self {
            server_host: env_var_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            cors_allow_origin: env_var_or("CORS_ALLOW_ORIGIN", "*"),
            limits: ComputeLimits {
                max_lattice_steps,
                max_grid_steps,
                max_surface_work,
                max_monte_carlo_work,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            cors_allow_origin: "*".to_string(),
            limits: ComputeLimits::default(),
        }
    }
}

fn parse_var<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
