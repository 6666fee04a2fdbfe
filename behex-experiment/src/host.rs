//! The environment hosting a run: who the participant is, which
//! counterbalancing applies, and where to go afterwards.

use behex_core::random::flip_fair;
use behex_core::Result;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SUBJECT_FILE: &str = "subject_nr";
const MAX_SUBJECT_NR: u64 = 1_000_000_000;

pub trait Host {
    fn subject_id(&mut self, rng: &mut dyn RngCore) -> String;

    /// Counterbalancing flag, `default` unless the host assigns one.
    fn manipulation(&mut self, name: &str, default: u8) -> u8;

    fn report_event(&mut self, msg: &str);

    fn finish(&mut self, url: &str);
}

/// Draws a manipulation the usual way: fair coin unless overridden.
pub fn manipulation_or_flip(host: &mut dyn Host, name: &str, rng: &mut dyn RngCore) -> bool {
    let default = flip_fair(rng);
    host.manipulation(name, default) == 1
}

/// Standalone host backed by a data directory.
#[derive(Debug, Clone)]
pub struct LocalHost {
    dir: PathBuf,
    overrides: BTreeMap<String, u8>,
    assigned: BTreeMap<String, u8>,
    finished: Option<String>,
}

impl LocalHost {
    pub fn new(dir: impl Into<PathBuf>, overrides: BTreeMap<String, u8>) -> Self {
        Self {
            dir: dir.into(),
            overrides,
            assigned: BTreeMap::new(),
            finished: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Manipulations handed out so far.
    pub fn assigned(&self) -> &BTreeMap<String, u8> {
        &self.assigned
    }

    pub fn finished_url(&self) -> Option<&str> {
        self.finished.as_deref()
    }

    fn read_subject(&self) -> Option<String> {
        let text = std::fs::read_to_string(self.dir.join(SUBJECT_FILE)).ok()?;
        let id = text.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn write_subject(&self, id: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(SUBJECT_FILE), id)?;
        Ok(())
    }
}

impl Host for LocalHost {
    fn subject_id(&mut self, rng: &mut dyn RngCore) -> String {
        if let Some(id) = self.read_subject() {
            return id;
        }
        let id = rng.random_range(0..MAX_SUBJECT_NR).to_string();
        if let Err(e) = self.write_subject(&id) {
            warn!("could not persist subject id in {}: {e}", self.dir.display());
        }
        id
    }

    fn manipulation(&mut self, name: &str, default: u8) -> u8 {
        let value = match self.overrides.get(name) {
            Some(&v) => v,
            None => {
                info!(manipulation = name, default, "manipulation not set by host, using default");
                default
            }
        };
        self.assigned.insert(name.to_string(), value);
        value
    }

    fn report_event(&mut self, msg: &str) {
        info!(target: "behex::host", "{msg}");
    }

    fn finish(&mut self, url: &str) {
        info!(url, "session finished");
        self.finished = Some(url.to_string());
    }
}
