// ── keeda-vault / otp ──────────────────────────────────────────────────────────
//
// otpauth:// URL generation from raw Base32 secrets and normalisation of the
// various field conventions other password managers use.

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use url::Url;

pub const OTP_ISSUER: &str = "KeedaVault";
const OTP_SCHEME: &str = "otpauth://";

/// Fields that may hold an OTP URL or secret, in lookup order.
pub const OTP_FIELD_NAMES: [&str; 5] = ["otp", "TOTP", "totp", "TOTP Settings", "otpauth"];

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

lazy_static! {
    static ref BASE32_RE: Regex = Regex::new(r"^[A-Z2-7=]+$").unwrap();
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whitespace-free upper-case secret, or `None` when it is not Base32.
pub fn clean_secret(secret: &str) -> Option<String> {
    let clean = strip_whitespace(secret).to_uppercase();
    if clean.is_empty() || !BASE32_RE.is_match(&clean) {
        return None;
    }
    Some(clean)
}

/// Build the URL stored on an entry from a user-supplied secret.
pub fn generate_otp_url(secret: &str, label: &str) -> Option<String> {
    let clean = clean_secret(secret)?;
    let issuer = encode_component(OTP_ISSUER);
    Some(format!(
        "{}totp/{}:{}?secret={}&issuer={}",
        OTP_SCHEME,
        issuer,
        encode_component(label),
        clean,
        issuer
    ))
}

/// The `secret` query parameter of an otpauth URL.
pub fn otp_url_secret(value: &str) -> Option<String> {
    if !value.starts_with(OTP_SCHEME) {
        return None;
    }
    let url = Url::parse(value).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "secret")
        .map(|(_, secret)| secret.into_owned())
}

/// A raw secret from whatever an importer found in an OTP column: URLs give
/// up their `secret` parameter, anything else is taken as the secret.
pub fn secret_from_otp_value(value: &str) -> String {
    if value.starts_with(OTP_SCHEME) {
        otp_url_secret(value).unwrap_or_default()
    } else {
        value.to_string()
    }
}

/// Turn a stored OTP value into a URL. Full URLs pass through untouched;
/// bare secrets are wrapped using `label` (usually the entry title).
pub fn normalize_otp_value(value: &str, label: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if value.starts_with(OTP_SCHEME) {
        return Some(value.to_string());
    }
    let secret = strip_whitespace(value);
    if secret.is_empty() {
        return Some(value.to_string());
    }
    Some(format!(
        "{}totp/{}?secret={}&issuer={}",
        OTP_SCHEME,
        encode_component(label),
        secret,
        encode_component(OTP_ISSUER)
    ))
}
