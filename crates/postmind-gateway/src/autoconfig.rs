//! IMAP auto-configuration by mail provider.
//!
//! When an integration is created without explicit IMAP settings, the
//! gateway derives them from the address domain so clients only need an
//! email and a password.

use serde_json::Value;

/// Derived IMAP connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
}

fn ssl_settings(host: &str) -> ImapSettings {
    ImapSettings {
        host: host.to_string(),
        port: 993,
        use_ssl: true,
    }
}

/// Resolve IMAP settings for an email address.
pub fn imap_settings_for_email(email: &str) -> ImapSettings {
    let domain = match email.split_once('@') {
        Some((_, domain)) => domain.trim().to_lowercase(),
        None => return default_settings(email),
    };

    match domain.as_str() {
        "gmail.com" => ssl_settings("imap.gmail.com"),
        "outlook.com" | "hotmail.com" | "live.com" | "msn.com" => {
            ssl_settings("outlook.office365.com")
        }
        "yandex.ru" | "yandex.com" => ssl_settings("imap.yandex.ru"),
        "mail.ru" | "inbox.ru" | "list.ru" | "bk.ru" => ssl_settings("imap.mail.ru"),
        "yahoo.com" | "yahoo.co.uk" | "yahoo.fr" => ssl_settings("imap.mail.yahoo.com"),
        // ProtonMail only speaks IMAP through the local bridge.
        "protonmail.com" | "proton.me" => ImapSettings {
            host: "127.0.0.1".to_string(),
            port: 1143,
            use_ssl: false,
        },
        _ => default_settings(&domain),
    }
}

fn default_settings(domain: &str) -> ImapSettings {
    ssl_settings(&format!("imap.{domain}"))
}

/// Fill missing IMAP fields in an integration-creation body.
///
/// Returns `true` when the body was modified. Bodies without an
/// `email_address` pass through untouched.
pub fn apply_auto_config(body: &mut Value) -> bool {
    let Some(object) = body.as_object_mut() else {
        return false;
    };

    let Some(email) = object
        .get("email_address")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
    else {
        return false;
    };

    let host_missing = object
        .get("imap_host")
        .and_then(Value::as_str)
        .map(str::is_empty)
        .unwrap_or(true);

    if host_missing {
        let settings = imap_settings_for_email(&email);
        object.insert("imap_host".into(), Value::from(settings.host));
        object.insert("imap_port".into(), Value::from(settings.port));
        object.insert("use_ssl".into(), Value::from(settings.use_ssl));
        return true;
    }

    // Host given explicitly: only backfill the companions.
    let mut changed = false;
    if object.get("imap_port").map(Value::is_null).unwrap_or(true) {
        object.insert("imap_port".into(), Value::from(993));
        changed = true;
    }
    if object.get("use_ssl").map(Value::is_null).unwrap_or(true) {
        object.insert("use_ssl".into(), Value::from(true));
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gmail() {
        let settings = imap_settings_for_email("user@gmail.com");
        assert_eq!(settings, ssl_settings("imap.gmail.com"));
    }

    #[test]
    fn test_microsoft_family() {
        for domain in ["outlook.com", "hotmail.com", "live.com", "msn.com"] {
            let settings = imap_settings_for_email(&format!("u@{domain}"));
            assert_eq!(settings.host, "outlook.office365.com");
            assert_eq!(settings.port, 993);
            assert!(settings.use_ssl);
        }
    }

    #[test]
    fn test_yandex_and_mailru() {
        assert_eq!(
            imap_settings_for_email("u@yandex.com").host,
            "imap.yandex.ru"
        );
        for domain in ["mail.ru", "inbox.ru", "list.ru", "bk.ru"] {
            assert_eq!(
                imap_settings_for_email(&format!("u@{domain}")).host,
                "imap.mail.ru"
            );
        }
    }

    #[test]
    fn test_yahoo() {
        assert_eq!(
            imap_settings_for_email("u@yahoo.co.uk").host,
            "imap.mail.yahoo.com"
        );
    }

    #[test]
    fn test_proton_uses_local_bridge() {
        let settings = imap_settings_for_email("u@proton.me");
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 1143);
        assert!(!settings.use_ssl);
    }

    #[test]
    fn test_unknown_domain_guesses_imap_prefix() {
        let settings = imap_settings_for_email("u@example.org");
        assert_eq!(settings.host, "imap.example.org");
        assert_eq!(settings.port, 993);
        assert!(settings.use_ssl);
    }

    #[test]
    fn test_domain_is_case_insensitive() {
        assert_eq!(
            imap_settings_for_email("u@GMAIL.com").host,
            "imap.gmail.com"
        );
    }

    #[test]
    fn test_apply_fills_missing_host() {
        let mut body = json!({ "email_address": "u@gmail.com", "password": "p" });
        assert!(apply_auto_config(&mut body));
        assert_eq!(body["imap_host"], "imap.gmail.com");
        assert_eq!(body["imap_port"], 993);
        assert_eq!(body["use_ssl"], true);
    }

    #[test]
    fn test_apply_backfills_port_and_ssl_only() {
        let mut body = json!({ "email_address": "u@corp.io", "imap_host": "mail.corp.io" });
        assert!(apply_auto_config(&mut body));
        assert_eq!(body["imap_host"], "mail.corp.io");
        assert_eq!(body["imap_port"], 993);
        assert_eq!(body["use_ssl"], true);
    }

    #[test]
    fn test_apply_leaves_complete_body_alone() {
        let mut body = json!({
            "email_address": "u@corp.io",
            "imap_host": "mail.corp.io",
            "imap_port": 143,
            "use_ssl": false,
        });
        assert!(!apply_auto_config(&mut body));
        assert_eq!(body["imap_port"], 143);
        assert_eq!(body["use_ssl"], false);
    }

    #[test]
    fn test_apply_skips_bodies_without_email() {
        let mut body = json!({ "password": "p" });
        assert!(!apply_auto_config(&mut body));
        assert!(body.get("imap_host").is_none());
    }
}
