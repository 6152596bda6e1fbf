use crate::config::AppConfig;
use crate::engine::PricingEngine;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub closed_form_priced: AtomicU64,
    pub lattices_priced: AtomicU64,
    pub surfaces_evaluated: AtomicU64,
    pub simulations_run: AtomicU64,
    pub domain_errors: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            closed_form_priced: AtomicU64::new(0),
            lattices_priced: AtomicU64::new(0),
            surfaces_evaluated: AtomicU64::new(0),
            simulations_run: AtomicU64::new(0),
            domain_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            closed_form_priced: self.closed_form_priced.load(Ordering::Relaxed),
            lattices_priced: self.lattices_priced.load(Ordering::Relaxed),
            surfaces_evaluated: self.surfaces_evaluated.load(Ordering::Relaxed),
            simulations_run: self.simulations_run.load(Ordering::Relaxed),
            domain_errors: self.domain_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub closed_form_priced: u64,
    pub lattices_priced: u64,
    pub surfaces_evaluated: u64,
    pub simulations_run: u64,
    pub domain_errors: u64,
}

// ── Application shared state (no locks; the engine itself is stateless) ──

pub struct AppState {
    pub config: AppConfig,
    pub engine: PricingEngine,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let engine = PricingEngine::new(config.limits);
        Arc::new(Self {
            config,
            engine,
            counters: PerfCounters::new(),
        })
    }
}
