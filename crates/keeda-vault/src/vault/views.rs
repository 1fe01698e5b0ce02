// ── keeda-vault / views ────────────────────────────────────────────────────────
//
// Read-only queries over a projected tree: smart views and search.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{VaultEntry, VaultGroup};

/// Cross-group entry filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmartView {
    /// Entries with a URL
    Websites,
    /// Entries carrying an OTP configuration
    TwoFactor,
    /// Entries with notes
    Notes,
    /// Entries sharing a non-empty password with at least one other entry
    DuplicatedPasswords,
}

/// Every entry in the forest, depth first.
pub fn flatten(groups: &[VaultGroup]) -> Vec<&VaultEntry> {
    groups.iter().flat_map(|g| g.all_entries()).collect()
}

pub fn smart_view(groups: &[VaultGroup], view: SmartView) -> Vec<VaultEntry> {
    let all = flatten(groups);
    match view {
        SmartView::Websites => all.into_iter().filter(|e| !e.url.is_empty()).cloned().collect(),
        SmartView::TwoFactor => all.into_iter().filter(|e| e.otp_url.is_some()).cloned().collect(),
        SmartView::Notes => all.into_iter().filter(|e| !e.notes.is_empty()).cloned().collect(),
        SmartView::DuplicatedPasswords => duplicated_passwords(&all),
    }
}

/// Groups of entries sharing a password, in order of first appearance.
fn duplicated_passwords(all: &[&VaultEntry]) -> Vec<VaultEntry> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_password: HashMap<&str, Vec<&VaultEntry>> = HashMap::new();
    for entry in all {
        let password = entry.password.expose();
        if password.is_empty() {
            continue;
        }
        let bucket = by_password.entry(password).or_default();
        if bucket.is_empty() {
            order.push(password);
        }
        bucket.push(*entry);
    }

    order
        .into_iter()
        .filter_map(|password| by_password.remove(password))
        .filter(|bucket| bucket.len() > 1)
        .flatten()
        .cloned()
        .collect()
}

/// Case-insensitive substring search over title, username and URL.
/// A blank query matches everything.
pub fn search(groups: &[VaultGroup], query: &str) -> Vec<VaultEntry> {
    let all = flatten(groups);
    if query.trim().is_empty() {
        return all.into_iter().cloned().collect();
    }
    let q = query.to_lowercase();
    all.into_iter()
        .filter(|e| {
            e.title.to_lowercase().contains(&q)
                || e.username.to_lowercase().contains(&q)
                || e.url.to_lowercase().contains(&q)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::document::VaultDocument;
    use crate::vault::projection::project;
    use crate::vault::types::EntryForm;
    use chrono::Utc;

    fn vault() -> Vec<VaultGroup> {
        let mut doc = VaultDocument::new("Vault", Utc::now());
        let root = doc.root();
        let work = doc.add_group(&root, "Work", None, None).unwrap();
        doc.add_entry(&EntryForm::new(work, "A").password("abc123").url("https://a.example"))
            .unwrap();
        doc.add_entry(&EntryForm::new(work, "B").password("abc123").notes("remember"))
            .unwrap();
        doc.add_entry(&EntryForm::new(root, "C").password("xyz789").username("Carol"))
            .unwrap();
        doc.add_entry(&EntryForm::new(root, "D").totp_secret("JBSWY3DP")).unwrap();
        project(&doc)
    }

    fn titles(entries: &[VaultEntry]) -> Vec<&str> {
        let mut t: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        t.sort();
        t
    }

    #[test]
    fn duplicated_passwords_only_returns_shared() {
        let tree = vault();
        let dupes = smart_view(&tree, SmartView::DuplicatedPasswords);
        assert_eq!(titles(&dupes), vec!["A", "B"]);
    }

    #[test]
    fn simple_views() {
        let tree = vault();
        assert_eq!(titles(&smart_view(&tree, SmartView::Websites)), vec!["A"]);
        assert_eq!(titles(&smart_view(&tree, SmartView::Notes)), vec!["B"]);
        assert_eq!(titles(&smart_view(&tree, SmartView::TwoFactor)), vec!["D"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let tree = vault();
        assert_eq!(titles(&search(&tree, "carol")), vec!["C"]);
        assert_eq!(titles(&search(&tree, "A.EXAMPLE")), vec!["A"]);
        assert_eq!(search(&tree, "  ").len(), 4);
        assert!(search(&tree, "nothing").is_empty());
    }
}
