use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use vigil_core::{
    Config, CoreError, Environment, Manager, ProviderError, ProviderSettings, Registry, Scheduler,
    Session, SessionError, DEFAULT_REASON,
};
use vigil_providers::default_providers;
use vigil_providers::mock::MockProvider;

/// Manager with the built-in providers in a bare environment, where only the
/// fallback provider is available.
fn bare_manager(dir: &Path) -> Manager {
    let environment = Environment::default();
    let scheduler = Scheduler::new().unwrap();
    let registry = Arc::new(Registry::new());
    for provider in default_providers(
        &environment,
        scheduler.handle().clone(),
        &ProviderSettings::default(),
    ) {
        registry.register(provider).unwrap();
    }

    Manager::with_registry(Config::new(dir.to_path_buf()), environment, registry, scheduler)
}

fn mock_manager(dir: &Path, providers: &[Arc<MockProvider>]) -> Manager {
    let registry = Arc::new(Registry::new());
    for provider in providers {
        registry.register(provider.clone()).unwrap();
    }

    Manager::with_registry(
        Config::new(dir.to_path_buf()),
        Environment::default(),
        registry,
        Scheduler::new().unwrap(),
    )
}

fn persisted(dir: &Path) -> serde_json::Value {
    let bytes = fs::read(dir.join(vigil_core::STATE_FILE_NAME)).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_timed_session_expires() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());

    let session = manager
        .start("demo", Duration::from_millis(100), None)
        .unwrap();
    assert_eq!(session.provider_name, "fallback");
    assert_eq!(session.reason, "demo");

    let status = manager.get_status();
    assert!(status.active);
    assert_eq!(status.sessions.len(), 1);
    assert_eq!(status.available_providers, vec!["fallback"]);

    thread::sleep(Duration::from_millis(250));
    let status = manager.get_status();
    assert!(!status.active);
    assert!(status.sessions.is_empty());

    // Expiry re-persisted the empty table
    assert_eq!(persisted(dir.path())["sessions"], serde_json::json!([]));
}

#[test]
fn test_state_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());

    let session = manager
        .start("compile", Duration::from_secs(60), None)
        .unwrap();
    let state = persisted(dir.path());

    assert_eq!(state["version"], "1.0");
    assert!(state["saved_at"].is_string());
    let record = &state["sessions"][0];
    assert_eq!(record["id"], session.id.as_str());
    assert_eq!(record["provider"], "fallback");
    assert_eq!(record["duration"], 60_000_000_000i64);
    assert_eq!(record["reason"], "compile");
    assert!(record["expires_at"].is_string());
    assert!(record.get("cookie").is_none());
}

#[test]
fn test_blank_reason_gets_default() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());

    let session = manager.start("  ", Duration::ZERO, None).unwrap();
    assert_eq!(session.reason, DEFAULT_REASON);
}

#[test]
fn test_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (forever, timed) = {
        let manager = bare_manager(dir.path());
        let forever = manager.start("forever", Duration::ZERO, None).unwrap();
        let timed = manager
            .start("timed", Duration::from_secs(3600), None)
            .unwrap();
        (forever, timed)
    };

    let manager = bare_manager(dir.path());
    let sessions = manager.list_sessions();
    assert_eq!(sessions, vec![forever.clone(), timed.clone()]);

    // Restored sessions can be stopped like any other
    manager.stop(&forever.id).unwrap();
    assert_eq!(manager.list_sessions(), vec![timed]);
}

#[test]
fn test_restored_session_keeps_remaining_time() {
    let dir = tempfile::tempdir().unwrap();
    {
        let manager = bare_manager(dir.path());
        manager
            .start("short", Duration::from_millis(300), None)
            .unwrap();
    }

    let manager = bare_manager(dir.path());
    assert_eq!(manager.list_sessions().len(), 1);

    thread::sleep(Duration::from_millis(500));
    assert!(manager.list_sessions().is_empty());
    assert_eq!(persisted(dir.path())["sessions"], serde_json::json!([]));
}

#[test]
fn test_expired_and_stale_sessions_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    let mut expired = Session::new(
        "fallback".to_string(),
        "expired".to_string(),
        Duration::from_secs(60),
    );
    expired.start_time = now - chrono::Duration::minutes(5);
    expired.expires_at = Some(now - chrono::Duration::minutes(4));

    let mut stale = Session::new("fallback".to_string(), "stale".to_string(), Duration::ZERO);
    stale.start_time = now - chrono::Duration::hours(25);

    let fresh = Session::new(
        "fallback".to_string(),
        "fresh".to_string(),
        Duration::from_secs(3600),
    );

    vigil_core::StateStore::new(dir.path())
        .save(vec![expired, stale, fresh.clone()])
        .unwrap();

    let manager = bare_manager(dir.path());
    assert_eq!(manager.list_sessions(), vec![fresh.clone()]);

    // The pruned table was written back
    let state = persisted(dir.path());
    assert_eq!(state["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(state["sessions"][0]["id"], fresh.id.as_str());
}

#[test]
fn test_corrupt_state_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(vigil_core::STATE_FILE_NAME);
    fs::write(&path, "{ this is not json").unwrap();

    let manager = bare_manager(dir.path());
    assert!(manager.list_sessions().is_empty());
    assert!(!path.exists());

    // And the manager still works
    manager.start("after", Duration::ZERO, None).unwrap();
    assert!(path.exists());
}

#[test]
fn test_stop_unknown_session() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());
    manager.start("keep", Duration::ZERO, None).unwrap();

    let err = manager.stop("missing").unwrap_err();
    assert!(matches!(
        err,
        CoreError::Session(SessionError::NotFound(id)) if id == "missing"
    ));
    assert_eq!(manager.list_sessions().len(), 1);
}

#[test]
fn test_stop_all_without_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());

    let err = manager.stop_all().unwrap_err();
    assert!(matches!(err, CoreError::NoActiveSessions));
    assert_eq!(err.to_string(), "no active sessions");

    // Empty id means all
    assert!(matches!(manager.stop(""), Err(CoreError::NoActiveSessions)));
}

#[test]
fn test_stop_all_clears_despite_release_failures() {
    let dir = tempfile::tempdir().unwrap();
    let flaky = Arc::new(MockProvider::new("flaky", 50));
    let solid = Arc::new(MockProvider::new("solid", 10));
    let manager = mock_manager(dir.path(), &[flaky.clone(), solid.clone()]);

    manager.start("a", Duration::ZERO, None).unwrap();
    manager.start("b", Duration::ZERO, Some("solid")).unwrap();
    manager.start("c", Duration::from_secs(60), None).unwrap();
    flaky.set_fail_release(true);

    let err = manager.stop("").unwrap_err();
    assert!(matches!(
        err,
        CoreError::Session(SessionError::ReleaseFailures(_))
    ));
    assert!(manager.list_sessions().is_empty());
    assert!(!manager.get_status().active);
    assert_eq!(persisted(dir.path())["sessions"], serde_json::json!([]));
}

#[test]
fn test_provider_selection_errors() {
    let dir = tempfile::tempdir().unwrap();
    let a = Arc::new(MockProvider::new("A", 10));
    let b = Arc::new(MockProvider::new("B", 90));
    let manager = mock_manager(dir.path(), &[a.clone(), b.clone()]);

    assert_eq!(
        manager.start("x", Duration::ZERO, None).unwrap().provider_name,
        "B"
    );

    b.set_available(false);
    let err = manager.start("x", Duration::ZERO, Some("B")).unwrap_err();
    assert_eq!(err.to_string(), "Provider not available: B");

    let err = manager.start("x", Duration::ZERO, Some("C")).unwrap_err();
    assert_eq!(err.to_string(), "Provider not found: C");

    a.set_available(false);
    let err = manager.start("x", Duration::ZERO, None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Session(SessionError::Provider(ProviderError::NoProvidersAvailable))
    ));
    assert_eq!(manager.list_sessions().len(), 1);
}

#[test]
fn test_provider_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());

    let statuses = manager.provider_statuses();
    let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["session-bus", "init-manager", "display-server", "fallback"]
    );
    assert!(statuses.iter().all(|s| !s.active));

    manager.start("x", Duration::ZERO, None).unwrap();
    let fallback = manager
        .provider_statuses()
        .into_iter()
        .find(|s| s.name == "fallback")
        .unwrap();
    assert!(fallback.active);
    assert!(fallback.available);
}

#[test]
fn test_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(MockProvider::new("mock", 10));
    let manager = mock_manager(dir.path(), &[provider.clone()]);

    manager.start("a", Duration::ZERO, None).unwrap();
    provider.set_fail_release(true);
    assert!(manager.state_path().exists());

    manager.cleanup().unwrap();
    assert!(manager.list_sessions().is_empty());
    assert!(!manager.state_path().exists());

    // Nothing to clean is fine too
    manager.cleanup().unwrap();
}

#[test]
fn test_environment_is_exposed() {
    let dir = tempfile::tempdir().unwrap();
    let manager = bare_manager(dir.path());
    assert_eq!(manager.get_environment(), &Environment::default());
    assert_eq!(manager.config().state_dir, dir.path());
}
