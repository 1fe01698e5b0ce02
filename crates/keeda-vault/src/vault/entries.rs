// ── keeda-vault / entries ──────────────────────────────────────────────────────
//
// Entry mutations: create, update (with history), soft delete into the
// recycle bin, permanent purge, move, restore, empty bin.

use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

use super::document::{EntryNode, VaultDocument};
use super::otp::generate_otp_url;
use super::types::*;

/// Display name used when a restore lands in an unnamed group.
const ROOT_DISPLAY_NAME: &str = "Root";

impl VaultDocument {
    // ─── Create Entry ─────────────────────────────────────────────────

    /// Create an entry in `form.group_uuid`.
    pub fn add_entry(&mut self, form: &EntryForm) -> VaultResult<Uuid> {
        let group = self
            .group(&form.group_uuid)
            .ok_or_else(|| VaultError::invalid_target(format!("Target group not found: {}", form.group_uuid)))?;
        if self.is_recycle_bin(&group.uuid) || !group.allow_add() {
            return Err(VaultError::invalid_operation(format!(
                "Entries cannot be added to '{}'",
                group.name
            )));
        }

        let mut entry = EntryNode::new(Utc::now());
        apply_standard_fields(&mut entry, form);
        if !form.email.is_empty() {
            entry.set(FIELD_EMAIL, form.email.as_str(), false);
        }
        if let Some(ref fields) = form.custom_fields {
            apply_custom_fields(&mut entry, fields);
        }
        if let Some(ref attachments) = form.attachments {
            for att in attachments {
                entry.binaries.insert(att.name.clone(), att.data.clone());
            }
        }

        let uuid = self.insert_entry(&form.group_uuid, entry)?;
        log::info!("Created entry '{}' ({}) in {}", form.title, uuid, form.group_uuid);
        Ok(uuid)
    }

    // ─── Update Entry ─────────────────────────────────────────────────

    /// Overwrite an entry from `form`, moving it first when the group
    /// differs. Exactly one history snapshot is appended per call.
    pub fn update_entry(&mut self, entry: &Uuid, form: &EntryForm) -> VaultResult<()> {
        self.require_entry(entry)?;
        let current = self
            .entry_parent(entry)
            .ok_or_else(|| VaultError::entry_not_found(entry))?;
        if current != form.group_uuid && self.group(&form.group_uuid).is_none() {
            return Err(VaultError::invalid_target(format!(
                "Target group not found: {}",
                form.group_uuid
            )));
        }

        let now = Utc::now();
        if current != form.group_uuid {
            self.relocate_entry(entry, &form.group_uuid, now)?;
        }

        let node = self
            .entry_mut(entry)
            .ok_or_else(|| VaultError::entry_not_found(entry))?;
        node.push_history();

        apply_standard_fields(node, form);
        node.set(FIELD_EMAIL, form.email.as_str(), false);

        let empty = BTreeMap::new();
        let fields = form.custom_fields.as_ref().unwrap_or(&empty);
        node.fields
            .retain(|key, _| is_reserved_field(key) || fields.contains_key(key));
        apply_custom_fields(node, fields);

        if let Some(ref attachments) = form.attachments {
            node.binaries = attachments
                .iter()
                .map(|att| (att.name.clone(), att.data.clone()))
                .collect();
        }
        node.times.last_modified = now;

        log::info!("Updated entry {} ({} history items)", entry, node.history.len());
        Ok(())
    }

    // ─── Delete / Recycle Entry ───────────────────────────────────────

    /// Which branch `delete_entry` would take for this entry.
    pub fn deletion_kind(&self, entry: &Uuid) -> VaultResult<DeletionKind> {
        self.require_entry(entry)?;
        if self.is_entry_in_recycle_bin(entry) {
            Ok(DeletionKind::Permanent)
        } else {
            Ok(DeletionKind::MoveToRecycleBin)
        }
    }

    /// Move an entry into the recycle bin, or purge it if it is already there.
    pub fn delete_entry(&mut self, entry: &Uuid) -> VaultResult<DeletionKind> {
        let kind = self.deletion_kind(entry)?;
        match kind {
            DeletionKind::Permanent => {
                self.detach_entry(entry)?;
                log::info!("Permanently deleted entry {}", entry);
            }
            DeletionKind::MoveToRecycleBin => {
                let original = self
                    .entry_parent(entry)
                    .ok_or_else(|| VaultError::entry_not_found(entry))?;
                let now = Utc::now();
                let bin = self.ensure_recycle_bin(now)?;
                if original == bin {
                    // left behind in a disabled bin; keep the recorded origin
                    log::info!("Entry {} is already in the re-enabled recycle bin", entry);
                    return Ok(kind);
                }
                self.relocate_entry(entry, &bin, now)?;
                if let Some(node) = self.entry_mut(entry) {
                    node.set(ORIGINAL_GROUP_FIELD, original.to_string(), false);
                    node.times.last_modified = now;
                }
                log::info!("Moved entry {} to recycle bin", entry);
            }
        }
        Ok(kind)
    }

    pub fn is_entry_in_recycle_bin(&self, entry: &Uuid) -> bool {
        match (self.entry_parent(entry), self.recycle_bin()) {
            (Some(parent), Some(bin)) => parent == bin,
            _ => false,
        }
    }

    /// Purge every entry currently in the recycle bin. Failures on one entry
    /// do not stop the rest.
    pub fn empty_recycle_bin(&mut self) -> usize {
        let Some(bin) = self.recycle_bin() else {
            return 0;
        };
        let entries = self
            .group(&bin)
            .map(|g| g.entries.clone())
            .unwrap_or_default();

        let mut purged = 0;
        for entry in entries {
            match self.detach_entry(&entry) {
                Ok(_) => purged += 1,
                Err(e) => log::warn!("Failed to purge entry {}: {}", entry, e),
            }
        }
        log::info!("Emptied recycle bin ({} entries purged)", purged);
        purged
    }

    // ─── Restore ──────────────────────────────────────────────────────

    /// Restore a recycled entry to the group it was deleted from.
    pub fn restore_entry(&mut self, entry: &Uuid, fallback: RestoreFallback) -> VaultResult<RestoreOutcome> {
        self.require_entry(entry)?;
        if !self.is_entry_in_recycle_bin(entry) {
            return Err(VaultError::invalid_operation("Entry is not in the recycle bin"));
        }

        let recorded = self.recorded_original_group(entry);
        let (target, fell_back_to_root) = match recorded {
            Some(group) => (group, false),
            None => match fallback {
                RestoreFallback::Root => (self.root(), true),
                RestoreFallback::Fail => {
                    return Err(VaultError::restore_target_missing(
                        "The original group of this entry no longer exists",
                    ))
                }
            },
        };

        let now = Utc::now();
        self.relocate_entry(entry, &target, now)?;
        if let Some(node) = self.entry_mut(entry) {
            node.remove(ORIGINAL_GROUP_FIELD);
            node.times.last_modified = now;
        }

        let group = self.require_group(&target)?;
        log::info!("Restored entry {} to '{}'", entry, group.name);
        Ok(RestoreOutcome {
            group_uuid: target,
            group_name: display_name(&group.name),
            group_icon: group.icon_id,
            fell_back_to_root,
        })
    }

    /// The group a recycled entry would be restored into, falling back to the
    /// root when the record is missing or stale.
    pub fn original_group_info(&self, entry: &Uuid) -> VaultResult<GroupInfo> {
        self.require_entry(entry)?;
        let target = self
            .recorded_original_group(entry)
            .unwrap_or_else(|| self.root());
        let group = self.require_group(&target)?;
        Ok(GroupInfo {
            uuid: target,
            name: display_name(&group.name),
            icon: group.icon_id,
        })
    }

    /// Recorded original group, only if it still exists outside the bin.
    fn recorded_original_group(&self, entry: &Uuid) -> Option<Uuid> {
        let node = self.entry(entry)?;
        if !node.has(ORIGINAL_GROUP_FIELD) {
            return None;
        }
        let uuid = Uuid::parse_str(node.get(ORIGINAL_GROUP_FIELD)).ok()?;
        if self.group(&uuid).is_none() || self.is_recycle_bin(&uuid) {
            return None;
        }
        Some(uuid)
    }

    // ─── Move Entry ───────────────────────────────────────────────────

    /// Move an entry into another group. Returns `false` when it already
    /// sits there.
    pub fn move_entry(&mut self, entry: &Uuid, target: &Uuid) -> VaultResult<bool> {
        let current = self
            .entry_parent(entry)
            .ok_or_else(|| VaultError::entry_not_found(entry))?;
        if &current == target {
            return Ok(false);
        }
        if self.group(target).is_none() {
            return Err(VaultError::invalid_target(format!("Target group not found: {}", target)));
        }
        self.relocate_entry(entry, target, Utc::now())?;
        log::info!("Moved entry {} to {}", entry, target);
        Ok(true)
    }

    /// Move several entries; failures are collected, not fatal. Entries
    /// already in `target` count as neither moved nor failed.
    pub fn move_entries(&mut self, entries: &[Uuid], target: &Uuid) -> BulkMoveResult {
        let mut result = BulkMoveResult::default();
        for entry in entries {
            match self.move_entry(entry, target) {
                Ok(true) => result.moved += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Failed to move entry {}: {}", entry, e);
                    result.failed.push(*entry);
                }
            }
        }
        result
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn display_name(name: &str) -> String {
    if name.is_empty() {
        ROOT_DISPLAY_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Title, username, password, URL, notes, icon, tags, OTP and expiry.
fn apply_standard_fields(entry: &mut EntryNode, form: &EntryForm) {
    entry.set(FIELD_TITLE, form.title.as_str(), false);
    entry.set(FIELD_USERNAME, form.username.as_str(), false);
    entry.set(FIELD_PASSWORD, form.password.clone(), true);
    entry.set(FIELD_URL, form.url.as_str(), false);
    entry.set(FIELD_NOTES, form.notes.as_str(), false);
    if let Some(icon) = form.icon_id {
        entry.icon_id = icon;
    }
    if let Some(ref tags) = form.tags {
        entry.tags = tags.clone();
    }
    if let Some(url) = generate_otp_url(&form.totp_secret, &form.title) {
        entry.set(FIELD_OTP, url, true);
    }
    entry.times.set_expiry(form.expiry_time);
}

/// Set each custom field whose key and value are both non-empty.
fn apply_custom_fields(entry: &mut EntryNode, fields: &BTreeMap<String, String>) {
    for (key, value) in fields {
        if key.is_empty() || value.is_empty() || is_reserved_field(key) {
            continue;
        }
        entry.set(key.clone(), value.as_str(), false);
    }
}
