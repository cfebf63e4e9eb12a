//! Named registry of constructed bridges

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::carpenter::Carpenter;
use crate::config::AuthMethod;
use crate::error::{Error, Result};

/// A mounted bridge; lock it to issue requests.
pub type SharedBridge = Arc<Mutex<Bridge>>;

/// Name-keyed bridges built through a `Carpenter`.
///
/// Safe to share across tasks. Mounting a name that already exists replaces
/// the previous bridge; handles already resolved keep the old one.
pub struct BridgeStack {
    carpenter: Carpenter,
    bridges: RwLock<HashMap<String, SharedBridge>>,
}

impl BridgeStack {
    pub fn new(carpenter: Carpenter) -> Self {
        Self {
            carpenter,
            bridges: RwLock::new(HashMap::new()),
        }
    }

    pub fn carpenter(&self) -> &Carpenter {
        &self.carpenter
    }

    /// Build a bridge and store it under `name`.
    ///
    /// Nothing is stored when construction fails.
    pub async fn mount(
        &self,
        name: impl Into<String>,
        credential: Option<&str>,
        service: Option<&str>,
        auth: Option<AuthMethod>,
    ) -> Result<&Self> {
        let name = name.into();
        let bridge = self
            .carpenter
            .construct_bridge(credential, service, auth)
            .await?;

        let replaced = self
            .bridges
            .write()
            .await
            .insert(name.clone(), Arc::new(Mutex::new(bridge)))
            .is_some();
        if replaced {
            warn!(bridge = %name, "replaced mounted bridge");
        } else {
            info!(bridge = %name, "bridge mounted");
        }
        Ok(self)
    }

    pub async fn resolve(&self, name: &str) -> Result<SharedBridge> {
        self.bridges
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                Error::Configuration(format!("The Bridge with name \"{name}\" does not exist."))
            })
    }

    /// Remove `name`, returning its bridge if it was mounted.
    pub async fn unmount(&self, name: &str) -> Option<SharedBridge> {
        let removed = self.bridges.write().await.remove(name);
        if removed.is_some() {
            info!(bridge = %name, "bridge unmounted");
        }
        removed
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.bridges.read().await.contains_key(name)
    }

    /// Mounted names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bridges.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.bridges.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bridges.read().await.is_empty()
    }
}
