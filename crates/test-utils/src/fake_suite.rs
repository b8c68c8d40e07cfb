use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::anyhow;
use suitewatch::errors::Error;
use suitewatch::suite::{Suite, SuiteFactory, SuiteSpec};
use suitewatch::watch::FingerprintRegistry;

/// A fake suite factory that:
/// - records which suites were constructed
/// - lets tests attach extra dependency directories per suite path
/// - can be scripted to fail construction or the run-marking for chosen
///   paths.
///
/// The produced [`FakeSuite`] mirrors a real collaborator's change
/// accounting: its own directory is judged by the test-modified time, every
/// other dependency by the code-modified time, and a deleted dependency
/// always counts as changed.
///
/// Clones share the construction log, so a test can keep a probe handle
/// while the engine owns the factory.
#[derive(Clone, Debug)]
pub struct FakeSuiteFactory {
    extra_deps: HashMap<PathBuf, Vec<PathBuf>>,
    fail_construct: HashSet<PathBuf>,
    fail_mark: HashSet<PathBuf>,
    constructed: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeSuiteFactory {
    pub fn new() -> Self {
        Self {
            extra_deps: HashMap::new(),
            fail_construct: HashSet::new(),
            fail_mark: HashSet::new(),
            constructed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Suites at `suite` additionally depend on the directory `dep`.
    pub fn with_dependency(mut self, suite: impl Into<PathBuf>, dep: impl Into<PathBuf>) -> Self {
        self.extra_deps
            .entry(suite.into())
            .or_default()
            .push(dep.into());
        self
    }

    /// Construction of the suite at `suite` fails until unscripted.
    pub fn failing_construction_for(mut self, suite: impl Into<PathBuf>) -> Self {
        self.fail_construct.insert(suite.into());
        self
    }

    /// Marking the suite at `suite` as run fails.
    pub fn failing_mark_for(mut self, suite: impl Into<PathBuf>) -> Self {
        self.fail_mark.insert(suite.into());
        self
    }

    /// Every suite path constructed so far, in order.
    pub fn constructed(&self) -> Vec<PathBuf> {
        self.constructed.lock().unwrap().clone()
    }
}

impl Default for FakeSuiteFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteFactory for FakeSuiteFactory {
    type Suite = FakeSuite;

    fn construct(
        &self,
        spec: &SuiteSpec,
        _max_depth: u32,
        registry: &Arc<FingerprintRegistry>,
    ) -> Result<FakeSuite, Error> {
        if self.fail_construct.contains(&spec.path) {
            return Err(anyhow!(
                "scripted construction failure for {}",
                spec.path.display()
            ));
        }

        let mut deps = vec![spec.path.clone()];
        if let Some(extra) = self.extra_deps.get(&spec.path) {
            deps.extend(extra.iter().cloned());
        }
        for dep in &deps {
            registry.add(dep)?;
        }

        self.constructed.lock().unwrap().push(spec.path.clone());

        Ok(FakeSuite {
            path: spec.path.clone(),
            deps,
            registry: Arc::clone(registry),
            last_run: SystemTime::now(),
            fail_mark: self.fail_mark.contains(&spec.path),
        })
    }
}

/// Suite collaborator with a scripted dependency set.
#[derive(Debug)]
pub struct FakeSuite {
    path: PathBuf,
    deps: Vec<PathBuf>,
    registry: Arc<FingerprintRegistry>,
    last_run: SystemTime,
    fail_mark: bool,
}

impl FakeSuite {
    fn dependency_changed(&self, dep: &Path) -> bool {
        let Some(snapshot) = self.registry.get(dep) else {
            return false;
        };
        if snapshot.deleted {
            return true;
        }
        if dep == self.path {
            snapshot.test_modified > self.last_run
        } else {
            snapshot.code_modified > self.last_run
        }
    }
}

impl Suite for FakeSuite {
    fn changed_dependency_count(&self) -> usize {
        // Query every dependency, not just until the first hit, so each one
        // is marked as used in the registry's current window.
        self.deps
            .iter()
            .filter(|dep| self.dependency_changed(dep))
            .count()
    }

    fn mark_as_run_and_recompute(&mut self, _max_depth: u32) -> Result<(), Error> {
        if self.fail_mark {
            return Err(anyhow!("scripted mark failure for {}", self.path.display()));
        }
        self.last_run = SystemTime::now();
        for dep in &self.deps {
            self.registry.add(dep)?;
        }
        Ok(())
    }
}
