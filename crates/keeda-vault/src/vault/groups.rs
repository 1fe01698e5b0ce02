// ── keeda-vault / groups ───────────────────────────────────────────────────────
//
// Group (folder) mutations: create, update / re-parent, rename, delete.
// Every operation validates first and only then touches the document.

use chrono::Utc;
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

use super::document::{GroupNode, VaultDocument};
use super::types::*;

impl VaultDocument {
    // ─── Create Group ─────────────────────────────────────────────────

    /// Create a child group under `parent`.
    pub fn add_group(
        &mut self,
        parent: &Uuid,
        name: &str,
        icon_id: Option<u32>,
        allow_add: Option<bool>,
    ) -> VaultResult<Uuid> {
        if self.group(parent).is_none() {
            return Err(VaultError::invalid_target(format!("Parent group not found: {}", parent)));
        }

        let mut group = GroupNode::new(name, icon_id.unwrap_or(DEFAULT_GROUP_ICON), Utc::now());
        if let Some(allow) = allow_add {
            group.set_allow_add(allow);
        }
        let uuid = self.insert_group(parent, group)?;

        log::info!("Created group '{}' ({}) under {}", name, uuid, parent);
        Ok(uuid)
    }

    // ─── Update Group ─────────────────────────────────────────────────

    /// Rename, re-icon, re-parent and/or change the `allow_add` policy.
    pub fn update_group(&mut self, group: &Uuid, update: &GroupUpdate) -> VaultResult<()> {
        self.require_group(group)?;
        let now = Utc::now();

        if let Some(new_parent) = update.parent_uuid {
            if self.group_parent(group) != Some(new_parent) {
                self.relocate_group(group, &new_parent, now)?;
                log::info!("Moved group {} under {}", group, new_parent);
            }
        }

        let node = self
            .group_mut(group)
            .ok_or_else(|| VaultError::group_not_found(group))?;
        node.name = update.name.clone();
        if let Some(icon) = update.icon_id {
            node.icon_id = icon;
        }
        if let Some(allow) = update.allow_add {
            node.set_allow_add(allow);
        }
        node.times.last_modified = now;

        log::info!("Updated group {}", group);
        Ok(())
    }

    /// Change only the display name.
    pub fn rename_group(&mut self, group: &Uuid, name: &str) -> VaultResult<()> {
        let node = self
            .group_mut(group)
            .ok_or_else(|| VaultError::group_not_found(group))?;
        node.name = name.to_string();
        node.times.last_modified = Utc::now();
        Ok(())
    }

    // ─── Delete Group ─────────────────────────────────────────────────

    /// Permanently delete an empty group. Groups still holding entries
    /// anywhere in their subtree are refused with `GroupNotEmpty`.
    pub fn delete_group(&mut self, group: &Uuid) -> VaultResult<()> {
        self.require_group(group)?;
        if group == &self.root() {
            return Err(VaultError::invalid_operation("Cannot delete the root group"));
        }
        if self.is_recycle_bin(group) {
            return Err(VaultError::invalid_operation("Cannot delete the recycle bin"));
        }

        let count = self.count_entries_recursive(group);
        if count > 0 {
            return Err(VaultError::group_not_empty(count));
        }

        let removed = self.detach_group(group)?;
        log::info!("Deleted group {} ({} groups removed)", group, removed);
        Ok(())
    }

    // ─── Info ─────────────────────────────────────────────────────────

    pub fn group_info(&self, group: &Uuid) -> Option<GroupInfo> {
        self.group(group).map(|g| GroupInfo {
            uuid: g.uuid,
            name: g.name.clone(),
            icon: g.icon_id,
        })
    }
}
