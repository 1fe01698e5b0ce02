// ── keedavault / events ────────────────────────────────────────────────────────
//
// Typed notifications about vault lifecycle, mutations and saves, fanned out
// over a broadcast channel.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

use keeda_core::VaultError;

use crate::store::VaultId;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VaultEvent {
    Created { vault_id: VaultId, name: String },
    Opened { vault_id: VaultId, name: String },
    Closed { vault_id: VaultId },
    Locked { vault_id: VaultId },
    Mutated { vault_id: VaultId, command: String, revision: u64 },
    MutationFailed { vault_id: VaultId, command: String, error: VaultError },
    Saved {
        vault_id: VaultId,
        path: PathBuf,
        verified: bool,
        backup_path: Option<PathBuf>,
    },
    SaveFailed { vault_id: VaultId, error: VaultError },
    /// An automatic save had nothing to write to
    SaveSkipped { vault_id: VaultId, reason: String },
}

impl VaultEvent {
    pub fn vault_id(&self) -> &VaultId {
        match self {
            Self::Created { vault_id, .. }
            | Self::Opened { vault_id, .. }
            | Self::Closed { vault_id }
            | Self::Locked { vault_id }
            | Self::Mutated { vault_id, .. }
            | Self::MutationFailed { vault_id, .. }
            | Self::Saved { vault_id, .. }
            | Self::SaveFailed { vault_id, .. }
            | Self::SaveSkipped { vault_id, .. } => vault_id,
        }
    }
}

/// Sender side of the event stream. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VaultEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: VaultEvent) {
        log::trace!("event: {:?}", event);
        let _ = self.tx.send(event);
    }
}
