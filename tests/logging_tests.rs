use link_estudiantil::{
    InMemoryRepository, LookupMode, RoleResolver,
    guard::{AllowedRoles, RouteGuard},
    models::{Principal, Role},
    session::Session,
};
use serde_json::Value;
use std::{
    io,
    sync::{Arc, Mutex},
};
use tracing::Level;
use uuid::Uuid;

// --- Log Capture ---

/// In-memory sink for the JSON formatter.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn events(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .collect()
    }

    /// Every captured event that carries a `denial` field.
    fn denials(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["fields"]["denial"].is_string())
            .collect()
    }
}

/// Installs a JSON subscriber writing into a fresh capture for the current thread.
fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

async fn evaluate(repo: &InMemoryRepository, session: &Session, allowed: Role) {
    let resolver = RoleResolver::new(Arc::new(repo.clone()), LookupMode::Sequential);
    let guard = RouteGuard::new(AllowedRoles::only(allowed), "/");
    let _ = guard.evaluate(&session.subscribe(), &resolver).await;
}

// --- Tests ---

#[tokio::test]
async fn test_denials_are_logged_with_distinct_kind_and_level() {
    let (capture, _default) = capture_logs();

    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Advisor, u1, "Ana");

    // Provisioning gap: signed in, no profile anywhere.
    evaluate(&repo, &Session::signed_in(Principal::new(u2, "u2@duocuc.cl")), Role::Student).await;
    // Wrong role for the route.
    evaluate(&repo, &Session::signed_in(Principal::new(u1, "u1@duocuc.cl")), Role::Coordinator).await;
    // Nobody signed in.
    evaluate(&repo, &Session::signed_out(), Role::Student).await;

    let denials = capture.denials();
    assert_eq!(denials.len(), 3, "{:#?}", denials);

    let gap = &denials[0];
    assert_eq!(gap["level"], "WARN");
    assert_eq!(gap["fields"]["denial"], "no_recognized_role");
    assert_eq!(gap["fields"]["principal_id"], u2.to_string());

    let mismatch = &denials[1];
    assert_eq!(mismatch["level"], "INFO");
    assert_eq!(mismatch["fields"]["denial"], "role_mismatch");
    assert_eq!(mismatch["fields"]["principal_id"], u1.to_string());
    assert_eq!(mismatch["fields"]["role"], "consejero");

    let signed_out = &denials[2];
    assert_eq!(signed_out["level"], "DEBUG");
    assert_eq!(signed_out["fields"]["denial"], "unauthenticated");
    assert!(signed_out["fields"]["principal_id"].is_null());
}

#[tokio::test]
async fn test_concurrent_lookup_logs_failures_behind_a_match() {
    let (capture, _default) = capture_logs();

    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new()
        .with_profile(Role::Student, id, "Alumno")
        .failing_role(Role::Advisor)
        .failing_role(Role::Coordinator);
    let resolver = RoleResolver::new(Arc::new(repo), LookupMode::Concurrent);

    assert_eq!(resolver.resolve(id).await, Ok(Some(Role::Student)));

    let mut failed_tables: Vec<String> = capture
        .events()
        .into_iter()
        .filter(|event| event["level"] == "ERROR")
        .filter(|event| event["fields"]["principal_id"] == id.to_string())
        .map(|event| event["fields"]["table"].as_str().unwrap_or_default().to_string())
        .collect();
    failed_tables.sort();
    assert_eq!(failed_tables, vec!["consejeros", "coordinadores"]);
}
