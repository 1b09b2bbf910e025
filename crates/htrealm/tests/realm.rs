//! End-to-end tests over a small population of users.

use htrealm::{
    AuthTester, AuthenticationFailure, ConfigStore, Error, HtpasswdAuthenticator, HtpasswdConfig,
    HtpasswdGroupResolver, InMemoryConfigStore, SourceRegistry, apr1_md5,
};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// user;password;email;display name;groups
const USERS: &str = "\
# the crew
trillian;trilli123;tricia.mcmillan@hitchhiker.com;Tricia McMillan;HeartOfGold,RestaurantAtTheEndOfTheUniverse,HappyVerticalPeopleTransporter
arthur;dent123;;Arthur Dent;RestaurantAtTheEndOfTheUniverse
prefect;prefi123;ford.prefect at hitchhiker.com;Ford Prefect;HappyVerticalPeopleTransporter
zaphod;zaphod123;zaphod.beeblebrox@hitchhiker.com;;
dephn;dephn123;dent@hitchhiker.com;Dent Phn;HeartOfGold
";

struct Fixture {
    _dir: TempDir,
    config: HtpasswdConfig,
    sources: Arc<SourceRegistry>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = HtpasswdConfig::new(
            dir.path().join("htpasswd"),
            dir.path().join("htgroup"),
            dir.path().join("htmeta"),
        );

        let mut htpasswd = String::new();
        let mut htmeta = String::new();
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for line in USERS.lines().filter(|l| !l.starts_with('#')) {
            let fields: Vec<&str> = line.split(';').collect();
            let (user, password) = (fields[0], fields[1]);
            let (email, display_name) = (fields[2], fields[3]);
            htpasswd.push_str(&format!("{user}:{}\n", apr1_md5::hash(password, "test")));
            htmeta.push_str(&format!("{user}:{email}:{display_name}\n"));
            for group in fields[4].split(',').filter(|g| !g.is_empty()) {
                match groups.iter_mut().find(|(name, _)| name == group) {
                    Some((_, members)) => members.push(user.to_string()),
                    None => groups.push((group.to_string(), vec![user.to_string()])),
                }
            }
        }
        let htgroup: String = groups
            .iter()
            .map(|(group, members)| format!("{group}: {} \n", members.join(" ")))
            .collect();

        write(&config.htpasswd_file, &htpasswd, 0);
        write(&config.htgroup_file, &htgroup, 0);
        write(&config.htmeta_file, &htmeta, 0);

        Self {
            _dir: dir,
            config,
            sources: Arc::new(SourceRegistry::new()),
        }
    }

    fn authenticator(&self) -> HtpasswdAuthenticator {
        HtpasswdAuthenticator::new(self.config.clone(), Arc::clone(&self.sources))
    }

    fn resolver(&self) -> HtpasswdGroupResolver {
        HtpasswdGroupResolver::from_config(self.config.clone(), Arc::clone(&self.sources))
    }
}

/// Replaces `path` and moves its mtime `secs` seconds forward.
fn write(path: &Path, content: &str, secs: u64) {
    let mut file = File::create(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

fn set(groups: &[&str]) -> BTreeSet<String> {
    groups.iter().map(|g| g.to_string()).collect()
}

#[test]
fn test_authenticate_trillian() {
    let fixture = Fixture::new();
    let user = fixture
        .authenticator()
        .authenticate("trillian", "trilli123")
        .unwrap()
        .expect("trillian should authenticate");

    assert_eq!(user.name, "trillian");
    assert_eq!(user.display_name, "Tricia McMillan");
    assert_eq!(user.mail.as_deref(), Some("tricia.mcmillan@hitchhiker.com"));
}

#[test]
fn test_unknown_user_is_no_match() {
    let fixture = Fixture::new();
    assert_eq!(fixture.authenticator().authenticate("unknown", "secret").unwrap(), None);
}

#[test]
fn test_wrong_password_fails() {
    let fixture = Fixture::new();
    let err = fixture
        .authenticator()
        .authenticate("trillian", "i_don't_know")
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed { ref username } if username == "trillian"));
}

#[test]
fn test_user_without_mail() {
    let fixture = Fixture::new();
    let user = fixture.authenticator().authenticate("arthur", "dent123").unwrap().unwrap();
    assert_eq!(user.mail, None);
    assert_eq!(user.display_name, "Arthur Dent");
}

#[test]
fn test_invalid_mail_is_dropped() {
    let fixture = Fixture::new();
    let user = fixture.authenticator().authenticate("prefect", "prefi123").unwrap().unwrap();
    assert_eq!(user.mail, None);
}

#[test]
fn test_user_without_display_name() {
    let fixture = Fixture::new();
    let user = fixture.authenticator().authenticate("zaphod", "zaphod123").unwrap().unwrap();
    assert_eq!(user.display_name, "zaphod");
    assert_eq!(user.mail.as_deref(), Some("zaphod.beeblebrox@hitchhiker.com"));
}

#[test]
fn test_authenticate_after_file_update() {
    let fixture = Fixture::new();
    let authenticator = fixture.authenticator();
    assert!(authenticator.authenticate("prefect", "prefi123").unwrap().is_some());

    write(
        &fixture.config.htpasswd_file,
        &format!("prefect:{}\n", apr1_md5::hash("updated123", "test!")),
        60,
    );
    write(
        &fixture.config.htmeta_file,
        "prefect:ford.prefect@hitchhiker.com:Ford Prefect!\n",
        60,
    );

    let user = authenticator.authenticate("prefect", "updated123").unwrap().unwrap();
    assert_eq!(user.name, "prefect");
    assert_eq!(user.display_name, "Ford Prefect!");
    assert_eq!(user.mail.as_deref(), Some("ford.prefect@hitchhiker.com"));

    // Everybody else disappeared with the rewrite.
    assert_eq!(authenticator.authenticate("trillian", "trilli123").unwrap(), None);
}

#[test]
fn test_resolve_groups() {
    let fixture = Fixture::new();
    let resolver = fixture.resolver();

    assert_eq!(
        resolver.resolve("trillian"),
        set(&[
            "HeartOfGold",
            "RestaurantAtTheEndOfTheUniverse",
            "HappyVerticalPeopleTransporter"
        ])
    );
    assert!(resolver.resolve("zaphod").is_empty());
    assert!(resolver.resolve("slarti").is_empty());
}

#[test]
fn test_resolve_groups_disabled_or_invalid() {
    let fixture = Fixture::new();
    let store = Arc::new(InMemoryConfigStore::with_config(fixture.config.clone()));
    let resolver = HtpasswdGroupResolver::new(store.clone(), Arc::clone(&fixture.sources));
    assert!(!resolver.resolve("trillian").is_empty());

    let mut disabled = fixture.config.clone();
    disabled.enabled = false;
    store.set(disabled);
    assert!(resolver.resolve("trillian").is_empty());

    let mut invalid = fixture.config.clone();
    invalid.htgroup_file = Default::default();
    store.set(invalid);
    assert!(resolver.resolve("trillian").is_empty());
}

#[test]
fn test_resolve_groups_after_update() {
    let fixture = Fixture::new();
    let resolver = fixture.resolver();
    assert_eq!(resolver.resolve("dephn"), set(&["HeartOfGold"]));

    let mut file = OpenOptions::new()
        .append(true)
        .open(&fixture.config.htgroup_file)
        .unwrap();
    writeln!(file, "test: dephn").unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    drop(file);

    assert_eq!(resolver.resolve("dephn"), set(&["HeartOfGold", "test"]));
    assert_eq!(resolver.resolve("trillian").len(), 3);
}

#[test]
fn test_tester_success() {
    let fixture = Fixture::new();
    let result = AuthTester::new(fixture.config.clone(), Arc::clone(&fixture.sources))
        .test("trillian", "trilli123");

    assert!(result.is_success());
    assert_eq!(result.user.unwrap().name, "trillian");
    assert_eq!(result.groups.len(), 3);
}

#[test]
fn test_tester_disabled_config_has_no_groups() {
    let fixture = Fixture::new();
    let mut config = fixture.config.clone();
    config.enabled = false;
    let result =
        AuthTester::new(config, Arc::clone(&fixture.sources)).test("trillian", "trilli123");

    assert!(result.is_success());
    assert_eq!(result.user.unwrap().name, "trillian");
    assert!(result.groups.is_empty());
}

#[test]
fn test_tester_user_not_found() {
    let fixture = Fixture::new();
    let result = AuthTester::new(fixture.config.clone(), Arc::clone(&fixture.sources))
        .test("hansolo", "trilli123");
    assert_eq!(result.failure, Some(AuthenticationFailure::user_not_found()));
    assert_eq!(result.user, None);
}

#[test]
fn test_tester_authentication_failed() {
    let fixture = Fixture::new();
    let result = AuthTester::new(fixture.config.clone(), Arc::clone(&fixture.sources))
        .test("trillian", "trilli1234");

    let failure = result.failure.unwrap();
    assert!(failure.configured);
    assert!(failure.user_found);
    assert!(!failure.user_authenticated);
    assert!(!failure.exception.unwrap().is_empty());
}

#[test]
fn test_tester_invalid_configuration() {
    let fixture = Fixture::new();
    let mut config = fixture.config.clone();
    config.htpasswd_file = Default::default();
    let result =
        AuthTester::new(config, Arc::clone(&fixture.sources)).test("trillian", "trilli123");

    let failure = result.failure.unwrap();
    assert!(!failure.configured);
    assert!(!failure.user_found);
    assert!(!failure.user_authenticated);
    assert!(!failure.exception.unwrap().is_empty());
}

#[test]
fn test_components_share_cache_entries() {
    let fixture = Fixture::new();
    fixture.authenticator().authenticate("trillian", "trilli123").unwrap();
    fixture.authenticator().authenticate("arthur", "dent123").unwrap();
    fixture.resolver().resolve("trillian");

    // htpasswd + htmeta + htgroup
    assert_eq!(fixture.sources.len(), 3);
}
