use anyhow::Context;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::Result;

/// Domain applied to cookies that do not carry their own.
pub const DEFAULT_COOKIE_DOMAIN: &str = ".youtube.com";

/// Expiry applied to cookies that do not carry their own.
pub const FAR_FUTURE_EXPIRY: i64 = 9_999_999_999;

/// User agent used when the credential bundle does not provide one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Credential material as stored in the cookies secret or exported by the
/// browser harvesting script.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialBundle {
    pub cookies: CookieData,
    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub profile: Option<String>,
    pub extracted_at: Option<String>,
    pub cookie_count: Option<u64>,
}

impl CredentialBundle {
    /// Load a bundle from a cookie export file on disk.
    pub fn from_export_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse cookie export file: {}", path.display())
        })
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Cookie material in one of the two shapes the secret may hold, decided
/// once at deserialization time.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CookieData {
    /// Single "name1=value1; name2=value2" string
    Raw(String),
    /// List of structured cookie objects
    Structured(Vec<CookieEntry>),
}

/// One structured cookie as exported from a browser cookie store.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    pub expires: Option<i64>,
}

/// A materialized Netscape-format cookie jar on disk.
///
/// The jar is a scoped resource: the file is removed when the jar is dropped
/// (or discarded explicitly), so it cannot outlive the download phase no
/// matter how that phase exits.
#[derive(Debug)]
pub struct CookieJar {
    path: PathBuf,
    entry_count: usize,
}

impl CookieJar {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Delete the jar file now instead of waiting for drop.
    pub fn discard(self) {
        // Drop does the actual removal
    }
}

impl Drop for CookieJar {
    fn drop(&mut self) {
        match fs_err::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed cookie jar: {}", self.path.display()),
            Err(err) => tracing::warn!("Could not remove cookie jar: {}", err),
        }
    }
}

/// Write the bundle's cookies to a Netscape-format jar file in `scratch_dir`.
///
/// Returns `None` when there is no bundle or no usable cookie entries -
/// anonymous download attempts are a normal mode, not an error.
pub fn materialize(
    bundle: Option<&CredentialBundle>,
    scratch_dir: &Path,
) -> Result<Option<CookieJar>> {
    let Some(bundle) = bundle else {
        return Ok(None);
    };

    let lines = match &bundle.cookies {
        CookieData::Raw(raw) => jar_lines_from_raw(raw),
        CookieData::Structured(entries) => jar_lines_from_entries(entries),
    };

    if lines.is_empty() {
        tracing::info!("Credential bundle contained no usable cookies");
        return Ok(None);
    }

    let entry_count = lines.len();
    let path = scratch_dir.join(format!(
        "cookies_{}.txt",
        &Uuid::new_v4().to_string()[..8]
    ));

    let mut file = fs_err::File::create(&path)?;
    writeln!(file, "# Netscape HTTP Cookie File")?;
    writeln!(file, "# Generated by mp3maker")?;
    writeln!(file)?;
    for line in &lines {
        writeln!(file, "{}", line)?;
    }

    tracing::info!(
        "Cookie jar created with {} entries: {}",
        entry_count,
        path.display()
    );

    Ok(Some(CookieJar { path, entry_count }))
}

/// Netscape format: domain, include-subdomains flag, path, secure flag,
/// expiry, name, value - tab separated.
fn jar_line(domain: &str, path: &str, secure: bool, expires: i64, name: &str, value: &str) -> String {
    format!(
        "{}\tTRUE\t{}\t{}\t{}\t{}\t{}",
        domain,
        path,
        if secure { "TRUE" } else { "FALSE" },
        expires,
        name,
        value
    )
}

fn jar_lines_from_raw(raw: &str) -> Vec<String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(jar_line(
                DEFAULT_COOKIE_DOMAIN,
                "/",
                false,
                FAR_FUTURE_EXPIRY,
                name,
                value,
            ))
        })
        .collect()
}

fn jar_lines_from_entries(entries: &[CookieEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| !entry.name.is_empty() && !entry.value.is_empty())
        .map(|entry| {
            // Widen bare domains to their subdomains; yt-dlp needs the
            // leading dot to send the cookie on googlevideo requests too.
            let domain = match entry.domain.as_deref() {
                None | Some("") => DEFAULT_COOKIE_DOMAIN.to_string(),
                Some(domain) if domain.starts_with('.') => domain.to_string(),
                Some(domain) => format!(".{}", domain),
            };
            jar_line(
                &domain,
                entry.path.as_deref().unwrap_or("/"),
                entry.secure,
                entry.expires.unwrap_or(FAR_FUTURE_EXPIRY),
                &entry.name,
                &entry.value,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bundle(cookies: CookieData) -> CredentialBundle {
        CredentialBundle {
            cookies,
            user_agent: None,
            browser: None,
            profile: None,
            extracted_at: None,
            cookie_count: None,
        }
    }

    fn jar_body(jar: &CookieJar) -> String {
        fs_err::read_to_string(jar.path()).unwrap()
    }

    #[test]
    fn test_raw_cookie_string() {
        let scratch = TempDir::new().unwrap();
        let bundle = bundle(CookieData::Raw("a=1; b=2".to_string()));

        let jar = materialize(Some(&bundle), scratch.path()).unwrap().unwrap();
        assert_eq!(jar.entry_count(), 2);

        let body = jar_body(&jar);
        assert!(body.starts_with("# Netscape HTTP Cookie File"));
        assert!(body.contains(".youtube.com\tTRUE\t/\tFALSE\t9999999999\ta\t1"));
        assert!(body.contains(".youtube.com\tTRUE\t/\tFALSE\t9999999999\tb\t2"));
    }

    #[test]
    fn test_raw_string_drops_malformed_pairs() {
        let scratch = TempDir::new().unwrap();
        let bundle = bundle(CookieData::Raw("a=1; garbage; =empty; b=".to_string()));

        let jar = materialize(Some(&bundle), scratch.path()).unwrap().unwrap();
        assert_eq!(jar.entry_count(), 1);
    }

    #[test]
    fn test_structured_cookies_keep_their_fields() {
        let scratch = TempDir::new().unwrap();
        let bundle = bundle(CookieData::Structured(vec![CookieEntry {
            name: "SID".to_string(),
            value: "xyz".to_string(),
            domain: Some(".google.com".to_string()),
            path: Some("/accounts".to_string()),
            secure: true,
            expires: Some(1_900_000_000),
        }]));

        let jar = materialize(Some(&bundle), scratch.path()).unwrap().unwrap();
        let body = jar_body(&jar);
        assert!(body.contains(".google.com\tTRUE\t/accounts\tTRUE\t1900000000\tSID\txyz"));
    }

    #[test]
    fn test_bare_domain_gets_leading_dot() {
        let scratch = TempDir::new().unwrap();
        let bundle = bundle(CookieData::Structured(vec![CookieEntry {
            name: "PREF".to_string(),
            value: "v".to_string(),
            domain: Some("youtube.com".to_string()),
            path: None,
            secure: false,
            expires: None,
        }]));

        let jar = materialize(Some(&bundle), scratch.path()).unwrap().unwrap();
        assert!(jar_body(&jar).contains(".youtube.com\tTRUE\t/\tFALSE\t9999999999\tPREF\tv"));
    }

    #[test]
    fn test_empty_entries_yield_no_jar() {
        let scratch = TempDir::new().unwrap();
        assert!(materialize(None, scratch.path()).unwrap().is_none());

        let empty = bundle(CookieData::Raw(String::new()));
        assert!(materialize(Some(&empty), scratch.path()).unwrap().is_none());

        let nameless = bundle(CookieData::Structured(vec![CookieEntry {
            name: String::new(),
            value: "v".to_string(),
            domain: None,
            path: None,
            secure: false,
            expires: None,
        }]));
        assert!(materialize(Some(&nameless), scratch.path()).unwrap().is_none());
    }

    #[test]
    fn test_jar_file_removed_on_drop() {
        let scratch = TempDir::new().unwrap();
        let bundle = bundle(CookieData::Raw("a=1".to_string()));

        let jar = materialize(Some(&bundle), scratch.path()).unwrap().unwrap();
        let path = jar.path().to_path_buf();
        assert!(path.exists());

        drop(jar);
        assert!(!path.exists());
    }

    #[test]
    fn test_bundle_deserializes_both_cookie_shapes() {
        let raw: CredentialBundle =
            serde_json::from_str(r#"{"cookies": "a=1; b=2", "user_agent": "UA"}"#).unwrap();
        assert!(matches!(raw.cookies, CookieData::Raw(_)));
        assert_eq!(raw.user_agent(), "UA");

        let structured: CredentialBundle = serde_json::from_str(
            r#"{"cookies": [{"name": "SID", "value": "x", "secure": true, "httponly": false}],
                "browser": "Brave", "cookie_count": 1}"#,
        )
        .unwrap();
        match &structured.cookies {
            CookieData::Structured(entries) => assert_eq!(entries.len(), 1),
            CookieData::Raw(_) => panic!("expected structured cookies"),
        }
        assert_eq!(structured.user_agent(), DEFAULT_USER_AGENT);
    }
}
