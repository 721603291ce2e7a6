use super::clock::MockClock;
use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wpfix_core::{HarnessConfig, InMemorySite, TokenGenerator, CONFIG_FILE_NAME};

/// An isolated site under test with its config written to a temp directory
pub struct TestSite {
    dir: TempDir,
    config: HarnessConfig,
    site: InMemorySite,
    clock: MockClock,
}

impl TestSite {
    /// Write `config` to disk, load it back, and build a site on `clock`
    pub fn new(config: HarnessConfig, clock: MockClock) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        config.save(&path).context("Failed to write config")?;

        let loaded = HarnessConfig::load(&path).context("Failed to load config")?;
        ensure!(loaded == config, "config did not survive a save/load cycle");

        let site = InMemorySite::new().with_time_provider(Arc::new(clock.as_provider()));
        Ok(Self {
            dir,
            config: loaded,
            site,
            clock,
        })
    }

    pub fn site(&self) -> &InMemorySite {
        &self.site
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join(CONFIG_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Token generator driven by the mock clock
    pub fn tokens(&self) -> TokenGenerator {
        TokenGenerator::new(&self.config.token).with_time_provider(Arc::new(self.clock.as_provider()))
    }

    /// True when no principal or content item is left
    pub fn is_empty(&self) -> bool {
        self.site.principal_count() == 0 && self.site.content_count() == 0
    }
}
