use link_estudiantil::{
    InMemoryRepository, LookupMode, RoleResolver,
    error::BackendError,
    models::Role,
};
use std::sync::Arc;
use uuid::Uuid;

fn resolver(repo: &InMemoryRepository, mode: LookupMode) -> RoleResolver {
    RoleResolver::new(Arc::new(repo.clone()), mode)
}

const MODES: [LookupMode; 2] = [LookupMode::Sequential, LookupMode::Concurrent];

#[tokio::test]
async fn test_single_role_is_resolved() {
    let u1 = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Advisor, u1, "Ana");

    for mode in MODES {
        let role = resolver(&repo, mode).resolve(u1).await;
        assert_eq!(role, Ok(Some(Role::Advisor)), "mode {:?}", mode);
    }
}

#[tokio::test]
async fn test_unknown_principal_has_no_role() {
    let repo = InMemoryRepository::new().with_profile(Role::Student, Uuid::new_v4(), "Otro");

    for mode in MODES {
        let role = resolver(&repo, mode).resolve(Uuid::new_v4()).await;
        assert_eq!(role, Ok(None), "mode {:?}", mode);
    }
}

#[tokio::test]
async fn test_priority_order_when_principal_is_in_several_tables() {
    let id = Uuid::new_v4();
    let all_three = InMemoryRepository::new()
        .with_profile(Role::Coordinator, id, "C")
        .with_profile(Role::Advisor, id, "A")
        .with_profile(Role::Student, id, "S");
    let advisor_and_coordinator = InMemoryRepository::new()
        .with_profile(Role::Coordinator, id, "C")
        .with_profile(Role::Advisor, id, "A");

    for mode in MODES {
        // Repeated calls stay deterministic.
        for _ in 0..5 {
            assert_eq!(
                resolver(&all_three, mode).resolve(id).await,
                Ok(Some(Role::Student))
            );
            assert_eq!(
                resolver(&advisor_and_coordinator, mode).resolve(id).await,
                Ok(Some(Role::Advisor))
            );
        }
    }
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Coordinator, id, "Coord");
    let resolver = resolver(&repo, LookupMode::Sequential);

    let first = resolver.resolve(id).await;
    let second = resolver.resolve(id).await;
    assert_eq!(first, second);
    assert_eq!(first, Ok(Some(Role::Coordinator)));
}

#[tokio::test]
async fn test_sequential_mode_stops_at_first_match() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Student, id, "Alumno");

    resolver(&repo, LookupMode::Sequential).resolve(id).await.unwrap();
    assert_eq!(repo.profile_lookups(), 1);
}

#[tokio::test]
async fn test_concurrent_mode_probes_every_table() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Student, id, "Alumno");

    let role = resolver(&repo, LookupMode::Concurrent).resolve(id).await;
    assert_eq!(role, Ok(Some(Role::Student)));
    assert_eq!(repo.profile_lookups(), 3);
}

#[tokio::test]
async fn test_failed_probe_passes_through_to_lower_priority_match() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new()
        .failing_role(Role::Student)
        .with_profile(Role::Advisor, id, "Ana");

    for mode in MODES {
        let role = resolver(&repo, mode).resolve(id).await;
        assert_eq!(role, Ok(Some(Role::Advisor)), "mode {:?}", mode);
    }
}

#[tokio::test]
async fn test_failure_without_any_match_is_reported_not_hidden() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new().failing_role(Role::Coordinator);

    for mode in MODES {
        let role = resolver(&repo, mode).resolve(id).await;
        assert!(
            matches!(role, Err(BackendError::Transport(_))),
            "mode {:?} returned {:?}",
            mode,
            role
        );
    }
}

#[tokio::test]
async fn test_resolve_profile_returns_matching_row() {
    let id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_profile(Role::Advisor, id, "Ana");

    let (role, profile) = resolver(&repo, LookupMode::Sequential)
        .resolve_profile(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(role, Role::Advisor);
    assert_eq!(profile.id, id);
    assert_eq!(profile.nombre.as_deref(), Some("Ana"));
}

#[test]
fn test_lookup_mode_parsing() {
    assert_eq!("sequential".parse::<LookupMode>(), Ok(LookupMode::Sequential));
    assert_eq!(" Concurrent ".parse::<LookupMode>(), Ok(LookupMode::Concurrent));
    assert!("parallel".parse::<LookupMode>().is_err());
    assert_eq!(LookupMode::default(), LookupMode::Sequential);
}
