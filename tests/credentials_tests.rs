use kodegen_tools_mediascrape::auth::{
    SameSite, StepAction, parse_cookie_json, to_netscape, write_netscape_file,
};
use kodegen_tools_mediascrape::{CookieEntry, CredentialStore};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_username_and_password_synonyms() {
    let store = CredentialStore::from_json(
        r#"{
            "bsky.app": {"handle": "ada.bsky.social", "appPassword": "abcd-efgh"},
            "example.org": {"login": "grace", "secret": "pw"},
            "half.net": {"username": "only-user"}
        }"#,
        None,
    )
    .unwrap();

    let bsky = store.load("bsky.app").unwrap();
    let login = bsky.login.unwrap();
    assert_eq!(login.username, "ada.bsky.social");
    assert_eq!(login.password, "abcd-efgh");

    let org = store.load("example.org").unwrap().login.unwrap();
    assert_eq!(org.username, "grace");

    // One half of a login pair is not enough for form login
    assert!(!store.load("half.net").unwrap().can_form_login());
}

#[test]
fn test_lookup_tries_www_then_parent_domains() {
    let store = CredentialStore::from_json(
        r#"{"sites": {"example.com": {"username": "a", "password": "b"}, "deep.example.com": {"username": "c", "password": "d"}}}"#,
        None,
    )
    .unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.load("https://www.example.com/x").unwrap().domain, "example.com");
    assert_eq!(store.load("img.cdn.example.com").unwrap().domain, "example.com");
    assert_eq!(store.load("a.deep.example.com").unwrap().domain, "deep.example.com");
    assert!(store.load("example.net").is_none());
    assert!(store.load("com").is_none());
}

#[test]
fn test_relative_cookie_file_resolves_against_document() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("cookies")).unwrap();
    fs::write(
        dir.path().join("cookies/site.json"),
        r#"[
            {"name": "sid", "value": "1", "domain": ".site.com", "httpOnly": true, "sameSite": "no_restriction", "expirationDate": 1893456000.5},
            {"name": "", "value": "dropped", "domain": ".site.com"}
        ]"#,
    )
    .unwrap();
    let doc = dir.path().join("credentials.json");
    fs::write(
        &doc,
        r#"{"site.com": {"cookie_file": "cookies/site.json", "cookies": [{"name": "lang", "value": "en", "domain": "site.com"}]}}"#,
    )
    .unwrap();

    let store = CredentialStore::from_file(&doc).unwrap();
    let credential = store.load("site.com").unwrap();

    assert!(credential.has_cookies());
    let names: Vec<&str> = credential.cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["lang", "sid"]);
    let sid = &credential.cookies[1];
    assert!(sid.http_only);
    assert_eq!(sid.same_site, Some(SameSite::None));
    assert_eq!(sid.expiry_secs(), 1_893_456_000);
}

#[test]
fn test_missing_cookie_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("credentials.json");
    fs::write(&doc, r#"{"site.com": {"cookie_file": "nope.json"}}"#).unwrap();

    let err = CredentialStore::from_file(&doc).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}

#[test]
fn test_login_steps_accept_action_alias() {
    let store = CredentialStore::from_json(
        r#"{"a.com": {"login_steps": [{"action": "navigate", "value": "https://a.com/login"}, {"type": "wait"}]}}"#,
        None,
    )
    .unwrap();
    let steps = store.load("a.com").unwrap().login_steps;
    assert_eq!(steps[0].action, StepAction::Navigate);
    assert_eq!(steps[1].action, StepAction::Wait);
    assert!(steps[1].selector.is_none());
}

#[test]
fn test_rejects_non_object_document() {
    assert!(CredentialStore::from_json("[1, 2]", None).is_err());
    assert!(CredentialStore::from_json(r#"{"sites": []}"#, None).is_err());
}

#[test]
fn test_cookie_json_drops_unusable_entries() {
    let cookies = parse_cookie_json(
        r#"[{"name": "a", "value": "1", "domain": "x.com", "sameSite": "weird"}, {"name": "b", "value": "2"}]"#,
    )
    .unwrap();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].same_site, None);
    assert_eq!(cookies[0].path, "/");
}

#[tokio::test]
async fn test_netscape_export() {
    let mut secure = CookieEntry::new("sid", "abc", ".example.com");
    secure.secure = true;
    secure.expires = Some(2_000_000_000.0);
    let session = CookieEntry::new("tmp", "x", "example.com");

    let text = to_netscape(&[secure.clone(), session.clone()]);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# Netscape HTTP Cookie File");
    assert_eq!(lines[1], ".example.com\tTRUE\t/\tTRUE\t2000000000\tsid\tabc");
    assert_eq!(lines[2], "example.com\tFALSE\t/\tFALSE\t2147483647\ttmp\tx");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jar/cookies.txt");
    write_netscape_file(&path, &[secure, session]).await.unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}
