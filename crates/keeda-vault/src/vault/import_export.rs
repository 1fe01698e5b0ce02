// ── keeda-vault / import_export ────────────────────────────────────────────────
//
// Import from other password managers' exports (generic CSV, Bitwarden JSON,
// LastPass, Apple, Chrome, Firefox) and from another vault file. Export to CSV
// or into a brand-new vault.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

use super::container::{Container, CreateOptions};
use super::crypto::Credentials;
use super::document::VaultDocument;
use super::otp::secret_from_otp_value;
use super::projection::project;
use super::types::*;
use super::views::flatten;

pub const UNTITLED: &str = "Untitled";
pub const UNTITLED_NOTE: &str = "Untitled Note";

/// Group that receives every entry of an exported vault.
pub const EXPORT_GROUP_NAME: &str = "Exported Entries";

const CSV_EXPORT_HEADERS: [&str; 6] = ["Title", "Username", "Password", "URL", "Notes", "OTP"];

// Bitwarden item types
const BITWARDEN_LOGIN: u32 = 1;
const BITWARDEN_SECURE_NOTE: u32 = 2;

/// Text export formats understood by [`parse_import`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImportFormat {
    /// Any CSV with recognisable column names
    GenericCsv,
    BitwardenJson,
    LastPassCsv,
    AppleCsv,
    ChromeCsv,
    FirefoxCsv,
}

/// Outcome of adding parsed entries to a vault.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported: usize,
    /// `"<title>: <reason>"` for each entry that could not be added
    pub errors: Vec<String>,
}

// ─── Import: Parsing ──────────────────────────────────────────────────────────

/// Parse an export into entry forms. The forms carry a nil group; the
/// importer assigns the destination.
pub fn parse_import(format: ImportFormat, data: &str) -> VaultResult<Vec<EntryForm>> {
    let forms = match format {
        ImportFormat::GenericCsv => parse_csv(data, generic_column)?,
        ImportFormat::BitwardenJson => parse_bitwarden_json(data)?,
        ImportFormat::LastPassCsv => parse_csv(data, lastpass_column)?,
        ImportFormat::AppleCsv => parse_csv(data, apple_column)?,
        ImportFormat::ChromeCsv => parse_csv(data, chrome_column)?,
        ImportFormat::FirefoxCsv => parse_firefox_csv(data)?,
    };
    log::info!("Parsed {} entries from {:?} import", forms.len(), format);
    Ok(forms)
}

/// Unlock another vault file and flatten every entry it holds.
pub fn parse_vault_entries<C: Container>(bytes: &[u8], credentials: Arc<Credentials>) -> VaultResult<Vec<EntryForm>> {
    let source = C::load(bytes, credentials)?;
    let tree = project(source.document());
    let forms: Vec<EntryForm> = flatten(&tree)
        .into_iter()
        .map(|entry| {
            let mut form = form_from_entry(entry, Uuid::nil());
            if form.title.is_empty() {
                form.title = UNTITLED.to_string();
            }
            form
        })
        .collect();
    log::info!("Parsed {} entries from vault '{}'", forms.len(), source.document().meta.name);
    Ok(forms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Title,
    Username,
    Password,
    Url,
    Notes,
    Otp,
}

fn generic_column(header: &str) -> Option<Column> {
    if header.contains("title") {
        Some(Column::Title)
    } else if header.contains("user") {
        Some(Column::Username)
    } else if header.contains("pass") {
        Some(Column::Password)
    } else if header.contains("url") || header.contains("website") {
        Some(Column::Url)
    } else if header.contains("note") {
        Some(Column::Notes)
    } else if header.contains("otp") {
        Some(Column::Otp)
    } else {
        None
    }
}

fn lastpass_column(header: &str) -> Option<Column> {
    match header {
        "name" => Some(Column::Title),
        "url" => Some(Column::Url),
        "username" => Some(Column::Username),
        "password" => Some(Column::Password),
        "totp" => Some(Column::Otp),
        "extra" => Some(Column::Notes),
        _ => None,
    }
}

fn apple_column(header: &str) -> Option<Column> {
    match header {
        "title" => Some(Column::Title),
        "url" => Some(Column::Url),
        "username" => Some(Column::Username),
        "password" => Some(Column::Password),
        "notes" => Some(Column::Notes),
        "otpauth" => Some(Column::Otp),
        _ => None,
    }
}

fn chrome_column(header: &str) -> Option<Column> {
    match header {
        "name" => Some(Column::Title),
        "url" => Some(Column::Url),
        "username" => Some(Column::Username),
        "password" => Some(Column::Password),
        "note" => Some(Column::Notes),
        _ => None,
    }
}

fn firefox_column(header: &str) -> Option<Column> {
    match header {
        "url" => Some(Column::Url),
        "username" => Some(Column::Username),
        "password" => Some(Column::Password),
        _ => None,
    }
}

fn csv_error(e: csv::Error) -> VaultError {
    VaultError::serialization(format!("Invalid CSV: {}", e))
}

/// A header row (lower-cased, trimmed) mapped to columns, plus the data rows.
/// Blank rows are dropped. A later header matching the same column wins.
struct CsvTable {
    columns: HashMap<Column, usize>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    fn read(data: &str, classify: fn(&str) -> Option<Column>) -> VaultResult<Self> {
        let data = data.trim_start_matches('\u{feff}');
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(data.as_bytes());

        let mut columns = HashMap::new();
        for (i, header) in reader.headers().map_err(csv_error)?.iter().enumerate() {
            if let Some(column) = classify(&header.trim().to_lowercase()) {
                columns.insert(column, i);
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            if record.iter().all(|value| value.is_empty()) {
                continue;
            }
            rows.push(record);
        }
        Ok(Self { columns, rows })
    }

    fn get<'a>(&self, row: &'a StringRecord, column: Column) -> &'a str {
        self.columns
            .get(&column)
            .and_then(|&i| row.get(i))
            .unwrap_or("")
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn parse_csv(data: &str, classify: fn(&str) -> Option<Column>) -> VaultResult<Vec<EntryForm>> {
    let table = CsvTable::read(data, classify)?;
    Ok(table
        .rows
        .iter()
        .map(|row| EntryForm {
            group_uuid: Uuid::nil(),
            title: non_empty_or(table.get(row, Column::Title), UNTITLED),
            username: table.get(row, Column::Username).to_string(),
            password: table.get(row, Column::Password).into(),
            url: table.get(row, Column::Url).to_string(),
            notes: table.get(row, Column::Notes).to_string(),
            totp_secret: secret_from_otp_value(table.get(row, Column::Otp)),
            ..Default::default()
        })
        .collect())
}

/// Firefox exports have no title column; the host name stands in for one.
fn parse_firefox_csv(data: &str) -> VaultResult<Vec<EntryForm>> {
    let table = CsvTable::read(data, firefox_column)?;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            let url = table.get(row, Column::Url);
            EntryForm {
                group_uuid: Uuid::nil(),
                title: title_from_url(url),
                username: table.get(row, Column::Username).to_string(),
                password: table.get(row, Column::Password).into(),
                url: url.to_string(),
                ..Default::default()
            }
        })
        .collect())
}

fn title_from_url(url: &str) -> String {
    if url.is_empty() {
        return UNTITLED.to_string();
    }
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or(url).to_string(),
        Err(_) => url.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct BitwardenExport {
    items: Option<Vec<BitwardenItem>>,
}

#[derive(Debug, Deserialize)]
struct BitwardenItem {
    #[serde(rename = "type", default)]
    kind: u32,
    name: Option<String>,
    notes: Option<String>,
    login: Option<BitwardenLogin>,
}

#[derive(Debug, Deserialize)]
struct BitwardenLogin {
    username: Option<String>,
    password: Option<String>,
    totp: Option<String>,
    uris: Option<Vec<BitwardenUri>>,
}

#[derive(Debug, Deserialize)]
struct BitwardenUri {
    uri: Option<String>,
}

/// Logins and secure notes; cards and identities are skipped.
fn parse_bitwarden_json(data: &str) -> VaultResult<Vec<EntryForm>> {
    let export: BitwardenExport = serde_json::from_str(data)
        .map_err(|e| VaultError::serialization(format!("Invalid Bitwarden JSON: {}", e)))?;

    let mut forms = Vec::new();
    for item in export.items.unwrap_or_default() {
        let name = item.name.unwrap_or_default();
        let notes = item.notes.unwrap_or_default();
        match (item.kind, item.login) {
            (BITWARDEN_LOGIN, Some(login)) => {
                let url = login
                    .uris
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .and_then(|u| u.uri)
                    .unwrap_or_default();
                forms.push(EntryForm {
                    group_uuid: Uuid::nil(),
                    title: non_empty_or(&name, UNTITLED),
                    username: login.username.unwrap_or_default(),
                    password: login.password.unwrap_or_default().into(),
                    url,
                    notes,
                    totp_secret: secret_from_otp_value(&login.totp.unwrap_or_default()),
                    ..Default::default()
                });
            }
            (BITWARDEN_SECURE_NOTE, _) => forms.push(EntryForm {
                group_uuid: Uuid::nil(),
                title: non_empty_or(&name, UNTITLED_NOTE),
                notes,
                ..Default::default()
            }),
            (kind, _) => log::debug!("Skipping Bitwarden item '{}' of type {}", name, kind),
        }
    }
    Ok(forms)
}

// ─── Import: Insertion ────────────────────────────────────────────────────────

impl VaultDocument {
    /// Add parsed entries to `target`, one `add_entry` per form. A failing
    /// entry is reported and the rest still go in.
    pub fn import_entries(&mut self, target: &Uuid, forms: &[EntryForm]) -> VaultResult<ImportResult> {
        let group = self
            .group(target)
            .ok_or_else(|| VaultError::invalid_target(format!("Target group not found: {}", target)))?;
        if self.is_recycle_bin(target) || !group.allow_add() {
            return Err(VaultError::invalid_operation(format!(
                "Entries cannot be imported into '{}'",
                group.name
            )));
        }

        let mut result = ImportResult::default();
        for form in forms {
            let form = EntryForm {
                group_uuid: *target,
                ..form.clone()
            };
            match self.add_entry(&form) {
                Ok(_) => result.imported += 1,
                Err(e) => {
                    log::warn!("Failed to import '{}': {}", form.title, e);
                    result.errors.push(format!("{}: {}", form.title, e.message));
                }
            }
        }
        log::info!("Imported {} entries into {} ({} failed)", result.imported, target, result.errors.len());
        Ok(result)
    }
}

// ─── Export ───────────────────────────────────────────────────────────────────

/// Entries to export, depth first. `None` selects every entry, including
/// those in the recycle bin.
pub fn select_entries(doc: &VaultDocument, selection: Option<&[Uuid]>) -> Vec<VaultEntry> {
    let tree = project(doc);
    flatten(&tree)
        .into_iter()
        .filter(|entry| selection.map_or(true, |ids| ids.contains(&entry.uuid)))
        .cloned()
        .collect()
}

/// Standard columns, quoted only where needed.
pub fn entries_to_csv(entries: &[VaultEntry]) -> VaultResult<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(CSV_EXPORT_HEADERS).map_err(csv_error)?;
    for entry in entries {
        writer
            .write_record([
                entry.title.as_str(),
                entry.username.as_str(),
                entry.password.expose(),
                entry.url.as_str(),
                entry.notes.as_str(),
                entry.otp_url.as_deref().unwrap_or(""),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| VaultError::serialization(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| VaultError::serialization(format!("CSV export failed: {}", e)))
}

/// A new vault holding copies of `entries` in a single
/// [`EXPORT_GROUP_NAME`] group. Creation and modification times carry over.
pub fn entries_to_vault<C: Container>(
    entries: &[VaultEntry],
    name: &str,
    credentials: Arc<Credentials>,
    options: &CreateOptions,
) -> VaultResult<C> {
    let options = CreateOptions {
        default_groups: false,
        ..options.clone()
    };
    let mut container = C::create(name, credentials, &options)?;
    let doc = container.document_mut();
    let root = doc.root();
    let group = doc.add_group(&root, EXPORT_GROUP_NAME, None, None)?;
    for entry in entries {
        let uuid = doc.add_entry(&form_from_entry(entry, group))?;
        if let Some(node) = doc.entry_mut(&uuid) {
            node.times.created = entry.creation_time;
            node.times.last_modified = entry.last_mod_time;
        }
    }
    log::info!("Exported {} entries to new vault '{}'", entries.len(), name);
    Ok(container)
}

/// Copy of a projected entry's data, addressed to `group`. History is not
/// carried.
fn form_from_entry(entry: &VaultEntry, group: Uuid) -> EntryForm {
    EntryForm {
        group_uuid: group,
        title: entry.title.clone(),
        username: entry.username.clone(),
        email: entry.email.clone().unwrap_or_default(),
        password: entry.password.clone(),
        url: entry.url.clone(),
        notes: entry.notes.clone(),
        totp_secret: entry
            .otp_url
            .as_deref()
            .map(secret_from_otp_value)
            .unwrap_or_default(),
        expiry_time: entry.expiry_time,
        custom_fields: Some(entry.fields.clone()),
        attachments: Some(entry.attachments.clone()),
        icon_id: Some(entry.icon),
        tags: Some(entry.tags.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::container::{CryptoSettings, SealedContainer};
    use super::super::params::Kdf;
    use keeda_core::VaultErrorKind;

    fn fast_options() -> CreateOptions {
        CreateOptions {
            crypto: CryptoSettings {
                kdf: Kdf::AesKdf { rounds: 10 },
                ..Default::default()
            },
            default_groups: false,
        }
    }

    // ── CSV formats ─────────────────────────────────────────────────────

    #[test]
    fn generic_csv_matches_loose_headers() {
        let data = "Title,User Name,Passphrase,Website,Notes,TOTP\n\
                    GitHub,octocat,abc123,https://github.com,\"line one, with comma\",otpauth://totp/GitHub?secret=JBSWY3DP\n\
                    \n\
                    ,,,,,\n\
                    ,bob,pw,,,\n";
        let forms = parse_import(ImportFormat::GenericCsv, data).unwrap();

        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].title, "GitHub");
        assert_eq!(forms[0].username, "octocat");
        assert_eq!(forms[0].password.expose(), "abc123");
        assert_eq!(forms[0].url, "https://github.com");
        assert_eq!(forms[0].notes, "line one, with comma");
        assert_eq!(forms[0].totp_secret, "JBSWY3DP");
        assert_eq!(forms[1].title, UNTITLED);
        assert_eq!(forms[1].username, "bob");
    }

    #[test]
    fn header_only_or_empty_csv_gives_nothing() {
        assert!(parse_import(ImportFormat::GenericCsv, "").unwrap().is_empty());
        assert!(parse_import(ImportFormat::ChromeCsv, "name,url,username,password\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn lastpass_csv_uses_exact_columns() {
        let data = "url,username,password,totp,extra,name,grouping,fav\n\
                    https://mail.example,alice,s3cret,jbswy3dp,Recovery codes inside,Mail,Personal,0\n";
        let forms = parse_import(ImportFormat::LastPassCsv, data).unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].title, "Mail");
        assert_eq!(forms[0].notes, "Recovery codes inside");
        assert_eq!(forms[0].totp_secret, "jbswy3dp");
    }

    #[test]
    fn apple_csv_extracts_secret_from_otpauth() {
        let data = "Title,URL,Username,Password,Notes,OTPAuth\n\
                    Bank,https://bank.example,alice,pw,,otpauth://totp/Bank:alice?secret=GEZDGNBV&issuer=Bank\n\
                    Shop,https://shop.example,bob,pw2,,not-a-url\n";
        let forms = parse_import(ImportFormat::AppleCsv, data).unwrap();
        assert_eq!(forms[0].totp_secret, "GEZDGNBV");
        assert_eq!(forms[1].totp_secret, "not-a-url");
    }

    #[test]
    fn chrome_csv_has_no_otp() {
        let data = "\u{feff}name,url,username,password,note\n\
                    example.com,https://example.com/login,carol,pw,hello\n";
        let forms = parse_import(ImportFormat::ChromeCsv, data).unwrap();
        assert_eq!(forms[0].title, "example.com");
        assert_eq!(forms[0].notes, "hello");
        assert!(forms[0].totp_secret.is_empty());
    }

    #[test]
    fn firefox_titles_come_from_host() {
        let data = "\"url\",\"username\",\"password\",\"httpRealm\"\n\
                    \"https://accounts.example.org:8443/login\",\"dave\",\"pw\",\"\"\n\
                    \"not a url\",\"erin\",\"pw\",\"\"\n\
                    \"\",\"frank\",\"pw\",\"\"\n";
        let forms = parse_import(ImportFormat::FirefoxCsv, data).unwrap();
        let titles: Vec<&str> = forms.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["accounts.example.org", "not a url", UNTITLED]);
        assert_eq!(forms[0].url, "https://accounts.example.org:8443/login");
    }

    // ── Bitwarden ───────────────────────────────────────────────────────

    #[test]
    fn bitwarden_logins_and_notes() {
        let data = r#"{
            "items": [
                { "type": 1, "name": "GitHub", "notes": null,
                  "login": { "username": "octocat", "password": "abc123",
                             "totp": "otpauth://totp/GitHub?secret=JBSWY3DP",
                             "uris": [ { "uri": "https://github.com" }, { "uri": "https://gist.github.com" } ] } },
                { "type": 2, "name": "", "notes": "Wifi: hunter2" },
                { "type": 3, "name": "Visa", "card": {} },
                { "type": 1, "name": "Broken" }
            ]
        }"#;
        let forms = parse_import(ImportFormat::BitwardenJson, data).unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].url, "https://github.com");
        assert_eq!(forms[0].totp_secret, "JBSWY3DP");
        assert_eq!(forms[1].title, UNTITLED_NOTE);
        assert_eq!(forms[1].notes, "Wifi: hunter2");
    }

    #[test]
    fn bitwarden_without_items_is_empty_and_bad_json_fails() {
        assert!(parse_import(ImportFormat::BitwardenJson, r#"{ "folders": [] }"#)
            .unwrap()
            .is_empty());
        let err = parse_import(ImportFormat::BitwardenJson, "{ nope").unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::Serialization);
    }

    // ── Insertion ───────────────────────────────────────────────────────

    #[test]
    fn import_goes_through_add_entry() {
        let mut doc = VaultDocument::new("Vault", chrono::Utc::now());
        let root = doc.root();
        let target = doc.add_group(&root, "Imported", None, None).unwrap();
        let forms = parse_import(
            ImportFormat::ChromeCsv,
            "name,url,username,password\nSite,https://site.example,me,pw\n",
        )
        .unwrap();

        let result = doc.import_entries(&target, &forms).unwrap();
        assert_eq!(result, ImportResult { imported: 1, errors: Vec::new() });
        let tree = project(&doc);
        let group = tree[0].find_group(&target).unwrap();
        assert_eq!(group.entries[0].title, "Site");
        assert_eq!(group.entries[0].password.expose(), "pw");
    }

    #[test]
    fn import_rejects_bad_targets() {
        let mut doc = VaultDocument::new("Vault", chrono::Utc::now());
        let forms = vec![EntryForm::new(Uuid::nil(), "X")];

        let err = doc.import_entries(&Uuid::new_v4(), &forms).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::InvalidTarget);

        let bin = doc.ensure_recycle_bin(chrono::Utc::now()).unwrap();
        let err = doc.import_entries(&bin, &forms).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::InvalidOperation);
        assert_eq!(doc.entry_count(), 0);
    }

    // ── Export ──────────────────────────────────────────────────────────

    #[test]
    fn csv_export_quotes_only_when_needed() {
        let mut doc = VaultDocument::new("Vault", chrono::Utc::now());
        let root = doc.root();
        doc.add_entry(
            &EntryForm::new(root, "Plain")
                .username("alice")
                .password("pw")
                .totp_secret("JBSWY3DP"),
        )
        .unwrap();
        doc.add_entry(&EntryForm::new(root, "Say \"hi\", ok").notes("two\nlines"))
            .unwrap();

        let csv = entries_to_csv(&select_entries(&doc, None)).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Title,Username,Password,URL,Notes,OTP"));
        assert_eq!(
            lines.next(),
            Some("Plain,alice,pw,,,otpauth://totp/KeedaVault:Plain?secret=JBSWY3DP&issuer=KeedaVault")
        );
        assert!(csv.contains("\"Say \"\"hi\"\", ok\",,,,\"two\nlines\","));
    }

    #[test]
    fn selection_limits_export() {
        let mut doc = VaultDocument::new("Vault", chrono::Utc::now());
        let root = doc.root();
        let a = doc.add_entry(&EntryForm::new(root, "A")).unwrap();
        doc.add_entry(&EntryForm::new(root, "B")).unwrap();

        let picked = select_entries(&doc, Some(&[a][..]));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].title, "A");
        assert_eq!(select_entries(&doc, None).len(), 2);
    }

    #[test]
    fn vault_export_reimports_cleanly() {
        let mut doc = VaultDocument::new("Vault", chrono::Utc::now());
        let root = doc.root();
        let mut custom = std::collections::BTreeMap::new();
        custom.insert("PIN".to_string(), "1234".to_string());
        doc.add_entry(&EntryForm {
            custom_fields: Some(custom),
            ..EntryForm::new(root, "Bank").username("alice").password("s3cret").totp_secret("JBSWY3DP")
        })
        .unwrap();
        let entries = select_entries(&doc, None);

        let credentials = Arc::new(Credentials::password_only("export"));
        let exported: SealedContainer =
            entries_to_vault(&entries, "Export", Arc::clone(&credentials), &fast_options()).unwrap();
        let tree = project(exported.document());
        assert_eq!(tree[0].subgroups.len(), 1);
        assert_eq!(tree[0].subgroups[0].name, EXPORT_GROUP_NAME);
        let copy = &tree[0].subgroups[0].entries[0];
        assert_eq!(copy.fields["PIN"], "1234");
        assert_eq!(copy.creation_time, entries[0].creation_time);

        let bytes = exported.save().unwrap();
        let err = parse_vault_entries::<SealedContainer>(&bytes, Arc::new(Credentials::password_only("nope")))
            .unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::DecryptError);

        let forms = parse_vault_entries::<SealedContainer>(&bytes, credentials).unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].title, "Bank");
        assert_eq!(forms[0].password.expose(), "s3cret");
        assert_eq!(forms[0].totp_secret, "JBSWY3DP");
        assert!(forms[0].group_uuid.is_nil());
    }
}
