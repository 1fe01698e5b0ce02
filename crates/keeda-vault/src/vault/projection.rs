// ── keeda-vault / projection ───────────────────────────────────────────────────
//
// Builds the immutable `VaultGroup` / `VaultEntry` tree handed to consumers.
// Pure: the document is only read, and a fresh tree is built every call.

use uuid::Uuid;

use super::document::{EntryNode, EntrySnapshot, GroupNode, VaultDocument};
use super::otp::{normalize_otp_value, OTP_FIELD_NAMES};
use super::types::*;

const UNNAMED_GROUP: &str = "Unnamed Group";
const UNTITLED_ENTRY: &str = "Untitled";
const FALLBACK_OTP_LABEL: &str = "Account";

/// Project the whole document. The result always holds exactly the root.
pub fn project(doc: &VaultDocument) -> Vec<VaultGroup> {
    doc.root_group()
        .map(|root| vec![project_group(doc, root)])
        .unwrap_or_default()
}

/// Project a single group subtree.
pub fn project_group(doc: &VaultDocument, group: &GroupNode) -> VaultGroup {
    let is_recycle_bin = doc.is_recycle_bin(&group.uuid);

    let entries = group
        .entries
        .iter()
        .filter_map(|uuid| doc.entry(uuid))
        .map(|entry| project_entry(entry, group.uuid))
        .collect();

    let mut subgroups: Vec<VaultGroup> = group
        .groups
        .iter()
        .filter_map(|uuid| doc.group(uuid))
        .map(|child| project_group(doc, child))
        .collect();
    // stable: only the bin moves
    subgroups.sort_by_key(|g| g.is_recycle_bin);

    VaultGroup {
        uuid: group.uuid,
        name: if group.name.is_empty() {
            UNNAMED_GROUP.to_string()
        } else {
            group.name.clone()
        },
        icon: group.icon_id,
        entries,
        subgroups,
        is_recycle_bin,
        allow_add: !is_recycle_bin && group.allow_add(),
        enable_searching: group.enable_searching,
    }
}

/// Project one entry, with its history flattened to one level.
pub fn project_entry(entry: &EntryNode, group_uuid: Uuid) -> VaultEntry {
    let mut projected = project_snapshot(&entry.snapshot(), entry.uuid, group_uuid);
    projected.history = entry
        .history
        .iter()
        .map(|snapshot| project_snapshot(snapshot, entry.uuid, group_uuid))
        .collect();
    projected
}

fn field_value<'a>(snapshot: &'a EntrySnapshot, key: &str) -> &'a str {
    snapshot
        .fields
        .get(key)
        .map(|f| f.value.expose())
        .unwrap_or("")
}

fn project_snapshot(snapshot: &EntrySnapshot, uuid: Uuid, group_uuid: Uuid) -> VaultEntry {
    let field = |key: &str| field_value(snapshot, key);

    let title = field(FIELD_TITLE);
    let otp_label = if title.is_empty() { FALLBACK_OTP_LABEL } else { title };
    let otp_url = OTP_FIELD_NAMES
        .iter()
        .map(|name| field_value(snapshot, name))
        .find(|value| !value.is_empty())
        .and_then(|value| normalize_otp_value(value, otp_label));

    let email = field(FIELD_EMAIL);

    VaultEntry {
        uuid,
        group_uuid,
        title: if title.is_empty() {
            UNTITLED_ENTRY.to_string()
        } else {
            title.to_string()
        },
        username: field(FIELD_USERNAME).to_string(),
        email: if email.is_empty() { None } else { Some(email.to_string()) },
        password: snapshot
            .fields
            .get(FIELD_PASSWORD)
            .map(|f| f.value.clone())
            .unwrap_or_default(),
        url: field(FIELD_URL).to_string(),
        notes: field(FIELD_NOTES).to_string(),
        icon: snapshot.icon_id,
        fields: snapshot
            .fields
            .iter()
            .filter(|(key, _)| !is_reserved_field(key))
            .map(|(key, f)| (key.clone(), f.value.expose().to_string()))
            .collect(),
        tags: snapshot.tags.clone(),
        creation_time: snapshot.times.created,
        last_mod_time: snapshot.times.last_modified,
        otp_url,
        expiry_time: if snapshot.times.expires {
            snapshot.times.expiry_time
        } else {
            None
        },
        attachments: snapshot
            .binaries
            .iter()
            .map(|(name, data)| Attachment {
                name: name.clone(),
                data: data.clone(),
            })
            .collect(),
        history: Vec::new(),
    }
}
