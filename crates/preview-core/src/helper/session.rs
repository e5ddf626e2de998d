//! One helper session: process, client and catalog together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::PreviewConfig;
use crate::helper::client::HelperClient;
use crate::helper::supervisor::{HelperProcessSupervisor, HelperState};
use crate::traits::{HostBridge, PreviewService};

/// Owns the supervisor, the client and the catalog snapshot of one session.
///
/// `ensure_ready` walks start, readiness poll and catalog fetch. A helper
/// that never answers is stopped again. A helper whose process died is
/// restarted while the restart budget lasts.
#[derive(Debug)]
pub struct HelperSession {
    config: PreviewConfig,
    supervisor: HelperProcessSupervisor,
    client: Option<Arc<HelperClient>>,
    catalog: Catalog,
}

impl HelperSession {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            supervisor: HelperProcessSupervisor::new(config.clone()),
            config,
            client: None,
            catalog: Catalog::default(),
        }
    }

    /// Root hint from the config, else from the host's extension path
    pub fn root_hint(&self, host: &dyn HostBridge) -> Option<PathBuf> {
        self.config.helper_root.clone().or_else(|| host.extension_path())
    }

    /// `ensure_ready` with the root taken from the host bridge
    pub fn ensure_ready_with_host(&mut self, host: &dyn HostBridge) -> bool {
        let hint = self.root_hint(host);
        self.ensure_ready(hint.as_deref())
    }

    /// Bring the helper to a usable state; `false` means previews are off
    pub fn ensure_ready(&mut self, root_hint: Option<&Path>) -> bool {
        let running = self.supervisor.is_running();
        if running && self.supervisor.has_exited() {
            warn!("Font helper process died");
            self.drop_client();
            if !self.supervisor.restart() {
                self.stop();
                return false;
            }
            return self.connect();
        }

        if self.is_ready() {
            return true;
        }

        if !running && !self.supervisor.start(root_hint) {
            return false;
        }
        self.connect()
    }

    /// Use a helper that is already listening at `base_url`
    pub fn attach(&mut self, base_url: &str) -> bool {
        self.connect_to(base_url)
    }

    fn connect(&mut self) -> bool {
        let Some(base_url) = self.supervisor.base_url() else {
            return false;
        };
        if self.connect_to(&base_url) {
            return true;
        }
        self.supervisor.stop();
        false
    }

    fn connect_to(&mut self, base_url: &str) -> bool {
        let client = HelperClient::from_config(base_url, &self.config);
        if !client.wait_until_ready(self.config.ready_timeout(), self.config.effective_ready_interval()) {
            self.drop_client();
            return false;
        }
        self.catalog = client.fetch_catalog();
        info!(
            "Font helper ready at {} with {} catalog fonts",
            client.base_url(),
            self.catalog.len()
        );
        self.client = Some(Arc::new(client));
        true
    }

    fn drop_client(&mut self) {
        if let Some(client) = self.client.take() {
            client.mark_unavailable();
        }
        self.catalog = Catalog::default();
    }

    pub fn is_ready(&self) -> bool {
        self.client.as_ref().is_some_and(|client| client.is_ready())
    }

    pub fn client(&self) -> Option<Arc<HelperClient>> {
        self.client.clone()
    }

    /// The client as a batch service for the orchestrator
    pub fn service(&self) -> Option<Arc<dyn PreviewService>> {
        self.client
            .clone()
            .map(|client| client as Arc<dyn PreviewService>)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> HelperState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &HelperProcessSupervisor {
        &self.supervisor
    }

    /// Tear the session down; the catalog is discarded with it
    pub fn stop(&mut self) {
        self.drop_client();
        self.supervisor.stop();
    }
}
