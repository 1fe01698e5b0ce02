// ── keedavault / command ───────────────────────────────────────────────────────
//
// The mutation surface as data. `apply` dispatches one command to the
// document engine; every command either fully applies or leaves the
// container untouched. Imports are the exception: entries that fail are
// reported in the outcome while the rest are kept.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keeda_core::VaultResult;
use keeda_vault::{
    update_properties, BulkMoveResult, Container, DeletionKind, EntryForm, GroupUpdate, ImportResult,
    PropertiesUpdate, RestoreFallback, RestoreOutcome, VaultProperties,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VaultCommand {
    AddGroup {
        parent: Uuid,
        name: String,
        icon_id: Option<u32>,
        allow_add: Option<bool>,
    },
    UpdateGroup { group: Uuid, update: GroupUpdate },
    RenameGroup { group: Uuid, name: String },
    DeleteGroup { group: Uuid },
    AddEntry { form: EntryForm },
    UpdateEntry { entry: Uuid, form: EntryForm },
    DeleteEntry { entry: Uuid },
    MoveEntry { entry: Uuid, target: Uuid },
    MoveEntries { entries: Vec<Uuid>, target: Uuid },
    RestoreEntry { entry: Uuid },
    EmptyRecycleBin,
    UpdateProperties { update: PropertiesUpdate },
    ImportEntries { target: Uuid, entries: Vec<EntryForm> },
}

impl VaultCommand {
    /// Short name for logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddGroup { .. } => "add_group",
            Self::UpdateGroup { .. } => "update_group",
            Self::RenameGroup { .. } => "rename_group",
            Self::DeleteGroup { .. } => "delete_group",
            Self::AddEntry { .. } => "add_entry",
            Self::UpdateEntry { .. } => "update_entry",
            Self::DeleteEntry { .. } => "delete_entry",
            Self::MoveEntry { .. } => "move_entry",
            Self::MoveEntries { .. } => "move_entries",
            Self::RestoreEntry { .. } => "restore_entry",
            Self::EmptyRecycleBin => "empty_recycle_bin",
            Self::UpdateProperties { .. } => "update_properties",
            Self::ImportEntries { .. } => "import_entries",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CommandOutcome {
    GroupAdded(Uuid),
    EntryAdded(Uuid),
    Updated,
    Deleted(DeletionKind),
    Moved(BulkMoveResult),
    Restored(RestoreOutcome),
    RecycleBinEmptied(usize),
    Properties(VaultProperties),
    Imported(ImportResult),
}

pub fn apply<C: Container>(
    container: &mut C,
    command: &VaultCommand,
    fallback: RestoreFallback,
) -> VaultResult<CommandOutcome> {
    let doc = container.document_mut();
    match command {
        VaultCommand::AddGroup { parent, name, icon_id, allow_add } => {
            doc.add_group(parent, name, *icon_id, *allow_add).map(CommandOutcome::GroupAdded)
        }
        VaultCommand::UpdateGroup { group, update } => {
            doc.update_group(group, update).map(|_| CommandOutcome::Updated)
        }
        VaultCommand::RenameGroup { group, name } => {
            doc.rename_group(group, name).map(|_| CommandOutcome::Updated)
        }
        VaultCommand::DeleteGroup { group } => doc
            .delete_group(group)
            .map(|_| CommandOutcome::Deleted(DeletionKind::Permanent)),
        VaultCommand::AddEntry { form } => doc.add_entry(form).map(CommandOutcome::EntryAdded),
        VaultCommand::UpdateEntry { entry, form } => {
            doc.update_entry(entry, form).map(|_| CommandOutcome::Updated)
        }
        VaultCommand::DeleteEntry { entry } => doc.delete_entry(entry).map(CommandOutcome::Deleted),
        VaultCommand::MoveEntry { entry, target } => doc.move_entry(entry, target).map(|moved| {
            CommandOutcome::Moved(BulkMoveResult {
                moved: usize::from(moved),
                failed: Vec::new(),
            })
        }),
        VaultCommand::MoveEntries { entries, target } => Ok(CommandOutcome::Moved(doc.move_entries(entries, target))),
        VaultCommand::RestoreEntry { entry } => doc.restore_entry(entry, fallback).map(CommandOutcome::Restored),
        VaultCommand::EmptyRecycleBin => Ok(CommandOutcome::RecycleBinEmptied(doc.empty_recycle_bin())),
        VaultCommand::UpdateProperties { update } => {
            update_properties(container, update).map(CommandOutcome::Properties)
        }
        VaultCommand::ImportEntries { target, entries } => {
            doc.import_entries(target, entries).map(CommandOutcome::Imported)
        }
    }
}

/// Whether the command changed anything worth saving.
pub fn is_noop(outcome: &CommandOutcome) -> bool {
    match outcome {
        CommandOutcome::Moved(result) => result.moved == 0,
        CommandOutcome::RecycleBinEmptied(count) => *count == 0,
        CommandOutcome::Imported(result) => result.imported == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeda_core::VaultErrorKind;
    use keeda_vault::{CreateOptions, CryptoSettings, Credentials, Kdf, SealedContainer};
    use std::sync::Arc;

    fn container() -> SealedContainer {
        let opts = CreateOptions {
            crypto: CryptoSettings {
                kdf: Kdf::AesKdf { rounds: 10 },
                ..Default::default()
            },
            default_groups: false,
        };
        SealedContainer::create("Cmd", Arc::new(Credentials::password_only("pw")), &opts).unwrap()
    }

    #[test]
    fn add_group_then_entry() {
        let mut c = container();
        let root = c.document().root();
        let outcome = apply(
            &mut c,
            &VaultCommand::AddGroup { parent: root, name: "Work".into(), icon_id: None, allow_add: None },
            RestoreFallback::Root,
        )
        .unwrap();
        let CommandOutcome::GroupAdded(work) = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };

        let outcome = apply(
            &mut c,
            &VaultCommand::AddEntry { form: EntryForm::new(work, "GitHub") },
            RestoreFallback::Root,
        )
        .unwrap();
        assert!(matches!(outcome, CommandOutcome::EntryAdded(_)));
        assert_eq!(c.document().count_entries_recursive(&work), 1);
    }

    #[test]
    fn failed_command_leaves_document_unchanged() {
        let mut c = container();
        let root = c.document().root();
        let work = c.document_mut().add_group(&root, "Work", None, None).unwrap();
        c.document_mut().add_entry(&EntryForm::new(work, "GitHub")).unwrap();
        let before = c.document().group_count();

        let err = apply(&mut c, &VaultCommand::DeleteGroup { group: work }, RestoreFallback::Root).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::GroupNotEmpty);
        assert_eq!(err.count, Some(1));
        assert_eq!(c.document().group_count(), before);
    }

    #[test]
    fn empty_bin_on_clean_vault_is_noop() {
        let mut c = container();
        let outcome = apply(&mut c, &VaultCommand::EmptyRecycleBin, RestoreFallback::Root).unwrap();
        assert!(is_noop(&outcome));
    }

    #[test]
    fn move_into_current_group_is_noop() {
        let mut c = container();
        let root = c.document().root();
        let entry = c.document_mut().add_entry(&EntryForm::new(root, "GitHub")).unwrap();

        let outcome = apply(&mut c, &VaultCommand::MoveEntry { entry, target: root }, RestoreFallback::Root).unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Moved(BulkMoveResult { moved: 0, failed: Vec::new() })
        );
        assert!(is_noop(&outcome));
    }

    #[test]
    fn import_reports_failures_and_keeps_the_rest() {
        let mut c = container();
        let root = c.document().root();
        let entries = vec![EntryForm::new(Uuid::nil(), "One"), EntryForm::new(Uuid::nil(), "Two")];

        let outcome = apply(
            &mut c,
            &VaultCommand::ImportEntries { target: root, entries },
            RestoreFallback::Root,
        )
        .unwrap();
        let CommandOutcome::Imported(result) = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(result.imported, 2);
        assert!(result.errors.is_empty());
        assert_eq!(c.document().entry_count(), 2);

        let outcome = apply(
            &mut c,
            &VaultCommand::ImportEntries { target: root, entries: Vec::new() },
            RestoreFallback::Root,
        )
        .unwrap();
        assert!(is_noop(&outcome));
    }

    #[test]
    fn import_into_missing_group_fails_whole() {
        let mut c = container();
        let err = apply(
            &mut c,
            &VaultCommand::ImportEntries {
                target: Uuid::new_v4(),
                entries: vec![EntryForm::new(Uuid::nil(), "One")],
            },
            RestoreFallback::Root,
        )
        .unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::InvalidTarget);
        assert_eq!(c.document().entry_count(), 0);
    }

    #[test]
    fn commands_round_trip_through_json() {
        let cmd = VaultCommand::RenameGroup { group: Uuid::new_v4(), name: "Home".into() };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"renameGroup\""));
        let back: VaultCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "rename_group");
    }
}
