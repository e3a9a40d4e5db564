// ABOUTME: Shared test fixtures and utilities for behavioral tests
//
// Provides:
// - Harness: SimpleSplitter over ReplayMapper with a virtual clock
// - pools(): parsed pool lists
// - config_file(): TOML config written to a temp file

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mapper_proxy::config::{PoolUrl, ProxyConfig};
use mapper_proxy::replay::{replay_factory, ReplayMapper, VirtualClock};
use mapper_proxy::splitter::{
    LoginRequest, MapperFactory, MapperId, MinerHandle, ProxyEvent, SimpleSplitter, Splitter,
};
use tempfile::NamedTempFile;

/// Parse pool URLs, panicking on bad input
pub fn pools(urls: &[&str]) -> Vec<PoolUrl> {
    urls.iter().map(|url| PoolUrl::parse(url).unwrap()).collect()
}

/// Config with one pool and the given reuse timeout
pub fn config(reuse_secs: u64) -> ProxyConfig {
    ProxyConfig {
        reuse_timeout: Duration::from_secs(reuse_secs),
        colors: false,
        pools: pools(&["stratum+tcp://pool-a.example.com:3333"]),
        ..ProxyConfig::default()
    }
}

/// Write `content` to a temporary `.toml` file
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Splitter plus the clock and release counter its mappers share
pub struct Harness<F: MapperFactory<Mapper = ReplayMapper>> {
    pub splitter: SimpleSplitter<F>,
    pub clock: VirtualClock,
    released: Arc<AtomicU64>,
    ticks: u64,
}

pub fn harness(reuse_secs: u64) -> Harness<impl MapperFactory<Mapper = ReplayMapper>> {
    harness_with(config(reuse_secs))
}

pub fn harness_with(config: ProxyConfig) -> Harness<impl MapperFactory<Mapper = ReplayMapper>> {
    let clock = VirtualClock::new();
    let released = Arc::new(AtomicU64::new(0));
    let splitter = SimpleSplitter::new(config, replay_factory(&clock, &released));
    Harness {
        splitter,
        clock,
        released,
        ticks: 0,
    }
}

impl<F: MapperFactory<Mapper = ReplayMapper>> Harness<F> {
    pub fn login(&mut self, miner: &MinerHandle) {
        self.splitter.on_event(ProxyEvent::Login {
            miner: miner.clone(),
            request: LoginRequest::default(),
        });
    }

    pub fn close(&mut self, miner: &MinerHandle) {
        self.splitter.on_event(ProxyEvent::Close {
            miner: miner.clone(),
        });
    }

    /// Move the mapper clock to `secs` after start
    pub fn at(&mut self, secs: u64) -> &mut Self {
        self.clock.advance_to(Duration::from_secs(secs));
        self
    }

    /// One sweeper tick; returns mappers evicted
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        self.splitter.tick_at(self.ticks, Instant::now())
    }

    /// Mappers dropped so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn mapper(&self, id: u64) -> Option<&ReplayMapper> {
        self.splitter.mapper(MapperId(id))
    }
}
