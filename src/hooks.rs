//! Named initialization hooks run once per page load.
//!
//! Fragments register their setup under a key while the page loads; the
//! page controller runs them all, in registration order, when loading
//! completes.

use std::rc::Rc;

use crate::error::ViewError;

pub type Hook = Rc<dyn Fn() -> Result<(), ViewError>>;

#[derive(Default)]
pub struct InitHooks {
    hooks: Vec<(String, Hook)>,
    loaded: bool,
}

impl InitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` under `key`. Registering an existing key replaces the
    /// hook but keeps its place in the order.
    pub fn register(&mut self, key: impl Into<String>, hook: Hook) {
        let key = key.into();
        match self.hooks.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => {
                tracing::debug!(%key, "replacing init hook");
                slot.1 = hook;
            }
            None => self.hooks.push((key, hook)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|(key, _)| key.as_str())
    }

    /// Marks the pass as loaded and hands out the hooks to run. `None` when
    /// the pass already ran.
    ///
    /// The batch owns its hooks so nothing here is borrowed while they run.
    pub fn start_load(&mut self) -> Option<LoadBatch> {
        if self.loaded {
            return None;
        }
        self.loaded = true;
        Some(LoadBatch {
            hooks: self.hooks.clone(),
        })
    }

    /// Drops every hook and opens a new pass.
    pub fn reset(&mut self) {
        self.hooks.clear();
        self.loaded = false;
    }
}

pub struct LoadBatch {
    hooks: Vec<(String, Hook)>,
}

impl LoadBatch {
    /// Invokes every hook in order. The first failure stops the batch.
    pub fn run(self) -> Result<usize, ViewError> {
        let mut ran = 0;
        for (key, hook) in self.hooks {
            tracing::debug!(%key, "running init hook");
            hook().map_err(|err| {
                tracing::error!(%key, %err, "init hook failed");
                err
            })?;
            ran += 1;
        }
        Ok(ran)
    }
}
