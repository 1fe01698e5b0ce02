// ── keeda-vault / document ─────────────────────────────────────────────────────
//
// Arena + index document model. Groups and entries live in flat maps keyed by
// UUID; each group keeps ordered child lists and the document keeps explicit
// parent maps so lookups, moves and cycle checks are O(1) / O(depth).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

use super::types::*;

// ─── Nodes ────────────────────────────────────────────────────────────────────

/// Timestamps shared by groups and entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Times {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub location_changed: DateTime<Utc>,
    /// Whether `expiry_time` is in effect
    pub expires: bool,
    pub expiry_time: Option<DateTime<Utc>>,
    pub usage_count: u32,
}

impl Times {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created: now,
            last_modified: now,
            last_accessed: now,
            location_changed: now,
            expires: false,
            expiry_time: None,
            usage_count: 0,
        }
    }

    pub fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>) {
        self.expires = expiry.is_some();
        self.expiry_time = expiry;
    }
}

/// A string field value plus its protection flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomField {
    pub value: ProtectedString,
    pub is_protected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupNode {
    pub uuid: Uuid,
    pub name: String,
    pub notes: String,
    pub icon_id: u32,
    pub times: Times,
    pub enable_searching: Option<bool>,
    pub custom_data: BTreeMap<String, String>,
    /// Child groups in display order
    pub groups: Vec<Uuid>,
    /// Entries in display order
    pub entries: Vec<Uuid>,
}

impl GroupNode {
    pub fn new(name: impl Into<String>, icon_id: u32, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            notes: String::new(),
            icon_id,
            times: Times::at(now),
            enable_searching: None,
            custom_data: BTreeMap::new(),
            groups: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// The `allow_add` policy as stored in custom data (absent means allowed).
    pub fn allow_add(&self) -> bool {
        self.custom_data.get(ALLOW_ADD_KEY).map(String::as_str) != Some("false")
    }

    pub fn set_allow_add(&mut self, allow: bool) {
        self.custom_data
            .insert(ALLOW_ADD_KEY.to_string(), allow.to_string());
    }
}

/// A frozen prior version of an entry. Snapshots never carry history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntrySnapshot {
    pub icon_id: u32,
    pub fields: BTreeMap<String, CustomField>,
    pub binaries: BTreeMap<String, Vec<u8>>,
    pub tags: Vec<String>,
    pub times: Times,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryNode {
    pub uuid: Uuid,
    pub icon_id: u32,
    pub fields: BTreeMap<String, CustomField>,
    pub binaries: BTreeMap<String, Vec<u8>>,
    pub tags: Vec<String>,
    pub times: Times,
    pub auto_type_enabled: bool,
    /// Oldest first, append only
    pub history: Vec<EntrySnapshot>,
}

impl EntryNode {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            icon_id: DEFAULT_ENTRY_ICON,
            fields: BTreeMap::new(),
            binaries: BTreeMap::new(),
            tags: Vec::new(),
            times: Times::at(now),
            auto_type_enabled: true,
            history: Vec::new(),
        }
    }

    /// Field value, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(|f| f.value.expose()).unwrap_or("")
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ProtectedString>, is_protected: bool) {
        self.fields.insert(
            key.into(),
            CustomField {
                value: value.into(),
                is_protected,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<CustomField> {
        self.fields.remove(key)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            icon_id: self.icon_id,
            fields: self.fields.clone(),
            binaries: self.binaries.clone(),
            tags: self.tags.clone(),
            times: self.times.clone(),
        }
    }

    /// Freeze the current state onto the end of the history list.
    pub fn push_history(&mut self) {
        let snapshot = self.snapshot();
        self.history.push(snapshot);
    }
}

/// Document-wide metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMeta {
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub recycle_bin_enabled: bool,
    pub recycle_bin_uuid: Option<Uuid>,
}

// ─── Document ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDocument {
    pub meta: DocumentMeta,
    root: Uuid,
    groups: HashMap<Uuid, GroupNode>,
    entries: HashMap<Uuid, EntryNode>,
    #[serde(skip)]
    group_parents: HashMap<Uuid, Uuid>,
    #[serde(skip)]
    entry_parents: HashMap<Uuid, Uuid>,
}

impl VaultDocument {
    /// A document holding only a root group named after the vault.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let name = name.into();
        let root = GroupNode::new(name.clone(), DEFAULT_GROUP_ICON, now);
        let root_uuid = root.uuid;
        let mut groups = HashMap::new();
        groups.insert(root_uuid, root);
        Self {
            meta: DocumentMeta {
                name,
                description: String::new(),
                created: now,
                recycle_bin_enabled: true,
                recycle_bin_uuid: None,
            },
            root: root_uuid,
            groups,
            entries: HashMap::new(),
            group_parents: HashMap::new(),
            entry_parents: HashMap::new(),
        }
    }

    // ─── Lookup ───────────────────────────────────────────────────────

    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn root_group(&self) -> Option<&GroupNode> {
        self.groups.get(&self.root)
    }

    pub fn group(&self, uuid: &Uuid) -> Option<&GroupNode> {
        self.groups.get(uuid)
    }

    pub fn group_mut(&mut self, uuid: &Uuid) -> Option<&mut GroupNode> {
        self.groups.get_mut(uuid)
    }

    pub fn entry(&self, uuid: &Uuid) -> Option<&EntryNode> {
        self.entries.get(uuid)
    }

    pub fn entry_mut(&mut self, uuid: &Uuid) -> Option<&mut EntryNode> {
        self.entries.get_mut(uuid)
    }

    pub(crate) fn require_group(&self, uuid: &Uuid) -> VaultResult<&GroupNode> {
        self.groups
            .get(uuid)
            .ok_or_else(|| VaultError::group_not_found(uuid))
    }

    pub(crate) fn require_entry(&self, uuid: &Uuid) -> VaultResult<&EntryNode> {
        self.entries
            .get(uuid)
            .ok_or_else(|| VaultError::entry_not_found(uuid))
    }

    pub fn group_parent(&self, uuid: &Uuid) -> Option<Uuid> {
        self.group_parents.get(uuid).copied()
    }

    pub fn entry_parent(&self, uuid: &Uuid) -> Option<Uuid> {
        self.entry_parents.get(uuid).copied()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The declared recycle bin, if enabled and still present.
    pub fn recycle_bin(&self) -> Option<Uuid> {
        if !self.meta.recycle_bin_enabled {
            return None;
        }
        self.meta
            .recycle_bin_uuid
            .filter(|uuid| self.groups.contains_key(uuid))
    }

    pub fn is_recycle_bin(&self, group: &Uuid) -> bool {
        self.recycle_bin().as_ref() == Some(group)
    }

    /// Whether `candidate` is `ancestor` or sits somewhere below it.
    pub fn is_descendant_or_self(&self, candidate: &Uuid, ancestor: &Uuid) -> bool {
        let mut current = Some(*candidate);
        while let Some(uuid) = current {
            if &uuid == ancestor {
                return true;
            }
            current = self.group_parents.get(&uuid).copied();
        }
        false
    }

    /// Entries in this group and every descendant group.
    pub fn count_entries_recursive(&self, group: &Uuid) -> usize {
        match self.groups.get(group) {
            Some(node) => {
                node.entries.len()
                    + node
                        .groups
                        .iter()
                        .map(|g| self.count_entries_recursive(g))
                        .sum::<usize>()
            }
            None => 0,
        }
    }

    /// Group UUID plus every descendant group UUID, depth first.
    pub fn subtree_groups(&self, group: &Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut stack = vec![*group];
        while let Some(uuid) = stack.pop() {
            if let Some(node) = self.groups.get(&uuid) {
                out.push(uuid);
                stack.extend(node.groups.iter().rev().copied());
            }
        }
        out
    }

    // ─── Structural Primitives ────────────────────────────────────────

    /// Attach a new group under `parent`.
    pub fn insert_group(&mut self, parent: &Uuid, node: GroupNode) -> VaultResult<Uuid> {
        if !self.groups.contains_key(parent) {
            return Err(VaultError::invalid_target(format!("Parent group not found: {}", parent)));
        }
        let uuid = node.uuid;
        self.groups.insert(uuid, node);
        self.group_parents.insert(uuid, *parent);
        if let Some(p) = self.groups.get_mut(parent) {
            p.groups.push(uuid);
        }
        Ok(uuid)
    }

    /// Attach a new entry under `group`.
    pub fn insert_entry(&mut self, group: &Uuid, node: EntryNode) -> VaultResult<Uuid> {
        if !self.groups.contains_key(group) {
            return Err(VaultError::invalid_target(format!("Group not found: {}", group)));
        }
        let uuid = node.uuid;
        self.entries.insert(uuid, node);
        self.entry_parents.insert(uuid, *group);
        if let Some(g) = self.groups.get_mut(group) {
            g.entries.push(uuid);
        }
        Ok(uuid)
    }

    /// Re-link an entry under another group.
    pub fn relocate_entry(&mut self, entry: &Uuid, target: &Uuid, now: DateTime<Utc>) -> VaultResult<()> {
        let current = self
            .entry_parents
            .get(entry)
            .copied()
            .ok_or_else(|| VaultError::entry_not_found(entry))?;
        if !self.groups.contains_key(target) {
            return Err(VaultError::invalid_target(format!("Target group not found: {}", target)));
        }
        if &current == target {
            return Ok(());
        }
        if let Some(old) = self.groups.get_mut(&current) {
            old.entries.retain(|e| e != entry);
        }
        if let Some(new) = self.groups.get_mut(target) {
            new.entries.push(*entry);
        }
        self.entry_parents.insert(*entry, *target);
        if let Some(node) = self.entries.get_mut(entry) {
            node.times.location_changed = now;
        }
        Ok(())
    }

    /// Re-link a group under another group, refusing cycles.
    pub fn relocate_group(&mut self, group: &Uuid, target: &Uuid, now: DateTime<Utc>) -> VaultResult<()> {
        if group == &self.root {
            return Err(VaultError::invalid_operation("Cannot move the root group"));
        }
        if !self.groups.contains_key(target) {
            return Err(VaultError::invalid_target(format!("Target group not found: {}", target)));
        }
        let current = self
            .group_parents
            .get(group)
            .copied()
            .ok_or_else(|| VaultError::group_not_found(group))?;
        if self.is_descendant_or_self(target, group) {
            return Err(VaultError::invalid_operation(
                "Cannot move group into itself or its children",
            ));
        }
        if &current == target {
            return Ok(());
        }
        if let Some(old) = self.groups.get_mut(&current) {
            old.groups.retain(|g| g != group);
        }
        if let Some(new) = self.groups.get_mut(target) {
            new.groups.push(*group);
        }
        self.group_parents.insert(*group, *target);
        if let Some(node) = self.groups.get_mut(group) {
            node.times.location_changed = now;
        }
        Ok(())
    }

    /// Unlink and drop an entry.
    pub fn detach_entry(&mut self, entry: &Uuid) -> VaultResult<EntryNode> {
        let parent = self
            .entry_parents
            .remove(entry)
            .ok_or_else(|| VaultError::entry_not_found(entry))?;
        if let Some(g) = self.groups.get_mut(&parent) {
            g.entries.retain(|e| e != entry);
        }
        self.entries
            .remove(entry)
            .ok_or_else(|| VaultError::entry_not_found(entry))
    }

    /// Unlink and drop a group with its whole subtree.
    pub fn detach_group(&mut self, group: &Uuid) -> VaultResult<usize> {
        if group == &self.root {
            return Err(VaultError::invalid_operation("Cannot delete the root group"));
        }
        let parent = self
            .group_parents
            .get(group)
            .copied()
            .ok_or_else(|| VaultError::group_not_found(group))?;
        if let Some(p) = self.groups.get_mut(&parent) {
            p.groups.retain(|g| g != group);
        }
        let subtree = self.subtree_groups(group);
        for uuid in &subtree {
            if let Some(node) = self.groups.remove(uuid) {
                for entry in node.entries {
                    self.entries.remove(&entry);
                    self.entry_parents.remove(&entry);
                }
            }
            self.group_parents.remove(uuid);
        }
        if self.meta.recycle_bin_uuid.map_or(false, |bin| subtree.contains(&bin)) {
            self.meta.recycle_bin_uuid = None;
        }
        Ok(subtree.len())
    }

    /// The recycle bin, created under the root when missing.
    pub fn ensure_recycle_bin(&mut self, now: DateTime<Utc>) -> VaultResult<Uuid> {
        if let Some(bin) = self.meta.recycle_bin_uuid.filter(|uuid| self.groups.contains_key(uuid)) {
            self.meta.recycle_bin_enabled = true;
            return Ok(bin);
        }
        let mut bin = GroupNode::new(RECYCLE_BIN_NAME, RECYCLE_BIN_ICON, now);
        bin.set_allow_add(false);
        bin.enable_searching = Some(false);
        let root = self.root;
        let uuid = self.insert_group(&root, bin)?;
        self.meta.recycle_bin_uuid = Some(uuid);
        self.meta.recycle_bin_enabled = true;
        log::info!("Created recycle bin {}", uuid);
        Ok(uuid)
    }

    // ─── Index ────────────────────────────────────────────────────────

    /// Rebuild the parent maps from the child lists, validating that the
    /// arena forms a single tree rooted at `root`.
    pub fn reindex(&mut self) -> VaultResult<()> {
        if !self.groups.contains_key(&self.root) {
            return Err(VaultError::unsupported("Document has no root group"));
        }

        let mut group_parents = HashMap::with_capacity(self.groups.len());
        let mut entry_parents = HashMap::with_capacity(self.entries.len());
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut stack = vec![self.root];
        seen.insert(self.root);

        while let Some(uuid) = stack.pop() {
            let node = self
                .groups
                .get(&uuid)
                .ok_or_else(|| VaultError::unsupported(format!("Dangling group reference: {}", uuid)))?;
            for child in &node.groups {
                if !seen.insert(*child) {
                    return Err(VaultError::unsupported(format!("Group {} has more than one parent", child)));
                }
                group_parents.insert(*child, uuid);
                stack.push(*child);
            }
            for entry in &node.entries {
                if !self.entries.contains_key(entry) {
                    return Err(VaultError::unsupported(format!("Dangling entry reference: {}", entry)));
                }
                if entry_parents.insert(*entry, uuid).is_some() {
                    return Err(VaultError::unsupported(format!("Entry {} has more than one parent", entry)));
                }
            }
        }

        if seen.len() != self.groups.len() || entry_parents.len() != self.entries.len() {
            return Err(VaultError::unsupported("Document contains unreachable nodes"));
        }

        self.group_parents = group_parents;
        self.entry_parents = entry_parents;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> VaultDocument {
        VaultDocument::new("Test", Utc::now())
    }

    // ── Structure ───────────────────────────────────────────────────────

    #[test]
    fn insert_and_relocate_keep_parent_maps_in_sync() {
        let mut d = doc();
        let root = d.root();
        let a = d.insert_group(&root, GroupNode::new("A", 48, Utc::now())).unwrap();
        let b = d.insert_group(&root, GroupNode::new("B", 48, Utc::now())).unwrap();
        let e = d.insert_entry(&a, EntryNode::new(Utc::now())).unwrap();

        d.relocate_entry(&e, &b, Utc::now()).unwrap();
        assert_eq!(d.entry_parent(&e), Some(b));
        assert!(d.group(&a).unwrap().entries.is_empty());
        assert_eq!(d.group(&b).unwrap().entries, vec![e]);
    }

    #[test]
    fn relocate_group_rejects_cycles() {
        let mut d = doc();
        let root = d.root();
        let a = d.insert_group(&root, GroupNode::new("A", 48, Utc::now())).unwrap();
        let child = d.insert_group(&a, GroupNode::new("Child", 48, Utc::now())).unwrap();

        let err = d.relocate_group(&a, &child, Utc::now()).unwrap_err();
        assert!(err.message.contains("Cannot move group into itself"));
        let err = d.relocate_group(&a, &a, Utc::now()).unwrap_err();
        assert!(err.message.contains("Cannot move group into itself"));
        assert_eq!(d.group_parent(&a), Some(root));
    }

    #[test]
    fn detach_group_drops_subtree() {
        let mut d = doc();
        let root = d.root();
        let a = d.insert_group(&root, GroupNode::new("A", 48, Utc::now())).unwrap();
        let child = d.insert_group(&a, GroupNode::new("Child", 48, Utc::now())).unwrap();
        d.insert_entry(&child, EntryNode::new(Utc::now())).unwrap();

        assert_eq!(d.detach_group(&a).unwrap(), 2);
        assert_eq!(d.group_count(), 1);
        assert_eq!(d.entry_count(), 0);
        assert!(d.root_group().unwrap().groups.is_empty());
    }

    #[test]
    fn recycle_bin_is_created_once() {
        let mut d = doc();
        let first = d.ensure_recycle_bin(Utc::now()).unwrap();
        let second = d.ensure_recycle_bin(Utc::now()).unwrap();
        assert_eq!(first, second);
        let bin = d.group(&first).unwrap();
        assert_eq!(bin.name, RECYCLE_BIN_NAME);
        assert_eq!(bin.icon_id, RECYCLE_BIN_ICON);
        assert!(!bin.allow_add());
    }

    // ── Index ───────────────────────────────────────────────────────────

    #[test]
    fn reindex_after_deserialize() {
        let mut d = doc();
        let root = d.root();
        let a = d.insert_group(&root, GroupNode::new("A", 48, Utc::now())).unwrap();
        let e = d.insert_entry(&a, EntryNode::new(Utc::now())).unwrap();

        let json = serde_json::to_string(&d).unwrap();
        let mut back: VaultDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entry_parent(&e), None);
        back.reindex().unwrap();
        assert_eq!(back.entry_parent(&e), Some(a));
        assert_eq!(back.group_parent(&a), Some(root));
    }

    #[test]
    fn reindex_rejects_orphans() {
        let mut d = doc();
        let orphan = GroupNode::new("Orphan", 48, Utc::now());
        d.groups.insert(orphan.uuid, orphan);
        assert!(d.reindex().is_err());
    }

    #[test]
    fn history_is_appended() {
        let mut e = EntryNode::new(Utc::now());
        e.set(FIELD_TITLE, "One", false);
        e.push_history();
        e.set(FIELD_TITLE, "Two", false);
        e.push_history();
        assert_eq!(e.history.len(), 2);
        assert_eq!(e.history[0].fields[FIELD_TITLE].value.expose(), "One");
        assert_eq!(e.history[1].fields[FIELD_TITLE].value.expose(), "Two");
    }
}
