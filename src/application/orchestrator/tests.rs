use super::*;
use crate::adapters::flood::InMemoryFloodTracker;
use crate::adapters::memory::{InMemoryLogRepository, InMemoryPolicyRepository, InMemoryTenantDirectory};
use crate::adapters::provider::{InMemoryConnectionProvider, OutboundCall};
use crate::application::test_support::{
    group, key, message, metadata, participant, session, tenant, RecordingPublisher,
};
use crate::application::MuteScheduler;
use crate::domain::foundation::{ErrorCode, MessageRef, ParticipantId};
use crate::domain::policy::{GroupKey, PolicyPatch};
use crate::domain::session::SessionIdentity;
use crate::ports::{ConnectionProvider, GroupDelta, GroupMetadata, TenantRole};

struct Fixture {
    orchestrator: SessionOrchestrator,
    provider: InMemoryConnectionProvider,
    tenants: Arc<InMemoryTenantDirectory>,
    policies: Arc<PolicyService>,
    log: Arc<InMemoryLogRepository>,
    audit: AuditTrail,
    publisher: Arc<RecordingPublisher>,
}

fn fixture() -> Fixture {
    let provider = InMemoryConnectionProvider::new();
    let tenants = Arc::new(InMemoryTenantDirectory::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let log = Arc::new(InMemoryLogRepository::new());
    let (audit, _) = AuditTrail::spawn(log.clone(), 64);
    let policies = Arc::new(PolicyService::new(
        Arc::new(InMemoryPolicyRepository::new()),
        publisher.clone(),
        Arc::new(MuteScheduler::new()),
    ));
    let orchestrator = SessionOrchestrator::new(
        OrchestratorParts {
            provider: Arc::new(provider.clone()),
            tenants: tenants.clone(),
            policies: policies.clone(),
            flood: Arc::new(InMemoryFloodTracker::new()),
            publisher: publisher.clone(),
            audit: audit.clone(),
            bot: BotProfile::new("Group Sentinel", "test"),
        },
        OrchestratorSettings::default(),
    );
    Fixture {
        orchestrator,
        provider,
        tenants,
        policies,
        log,
        audit,
        publisher,
    }
}

fn identity() -> SessionIdentity {
    SessionIdentity {
        account: ParticipantId::new("15550001@s.net").unwrap(),
        display_name: Some("Sentinel".into()),
    }
}

/// Let every spawned task run until idle. Time is paused, so this only
/// advances the clock by a few milliseconds.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn state_of(f: &Fixture, id: &SessionId) -> SessionState {
    f.orchestrator.session(id).unwrap().state()
}

async fn connected_fixture() -> Fixture {
    let f = fixture();
    f.provider.set_group(metadata()).await;
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    f.provider.connect(&session(), Some(identity())).await;
    settle().await;
    f
}

/// Group and message of every delete call so far, in call order.
async fn deletions(f: &Fixture) -> Vec<(GroupId, MessageRef)> {
    f.provider
        .calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            OutboundCall::Deleted { group, message, .. } => Some((group, message)),
            _ => None,
        })
        .collect()
}

fn logouts(calls: &[OutboundCall]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, OutboundCall::LoggedOut { .. }))
        .count()
}

fn anti_link() -> PolicyPatch {
    PolicyPatch {
        anti_link_active: Some(true),
        ..PolicyPatch::default()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Lifecycle
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn create_session_opens_provider_and_broadcasts() {
    let f = fixture();

    let created = f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    assert_eq!(created.state(), SessionState::Initializing);
    assert_eq!(f.provider.open_count(&session()).await, 1);
    assert_eq!(f.orchestrator.session_count(), 1);
    assert!(!f.publisher.of_kind(LiveEventKind::SessionUpdate).is_empty());

    f.audit.flush().await;
    assert_eq!(f.log.entries_of(AuditKind::SessionCreated).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn generated_ids_are_scoped_to_the_tenant() {
    let f = fixture();
    let created = f.orchestrator.create_session(&tenant(), None).await.unwrap();
    assert!(created.id().as_str().starts_with("session_tenant-1_"));
}

#[tokio::test(start_paused = true)]
async fn second_live_session_for_tenant_conflicts() {
    let f = fixture();
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    let err = f
        .orchestrator
        .create_session(&tenant(), Some(SessionId::new("session-2").unwrap()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SessionConflict);
    assert!(matches!(err, SessionError::Conflict { existing, .. } if existing == session()));
    assert_eq!(f.orchestrator.session_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn elevated_tenant_may_hold_several_sessions() {
    let f = fixture();
    f.tenants.set_role(tenant(), TenantRole::Admin).await;

    f.orchestrator.create_session(&tenant(), None).await.unwrap();
    f.orchestrator.create_session(&tenant(), None).await.unwrap();

    assert_eq!(f.orchestrator.sessions_for(&tenant()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn session_id_of_another_tenant_conflicts() {
    let f = fixture();
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    let other = TenantId::new("tenant-2").unwrap();
    let err = f.orchestrator.create_session(&other, Some(session())).await.unwrap_err();
    assert!(matches!(err, SessionError::Conflict { .. }));
}

#[tokio::test(start_paused = true)]
async fn creating_a_live_session_again_returns_it() {
    let f = fixture();
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    let again = f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    assert_eq!(again.state(), SessionState::Initializing);
    assert_eq!(f.provider.open_count(&session()).await, 1);
}

#[tokio::test(start_paused = true)]
async fn open_failure_leaves_session_failed() {
    let f = fixture();
    f.provider.fail_next_opens(1).await;

    let err = f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::ProviderError);
    assert_eq!(state_of(&f, &session()), SessionState::Failed);

    // A failed session does not block the tenant and can be replaced.
    let replaced = f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    assert_eq!(replaced.state(), SessionState::Initializing);
    assert_eq!(f.orchestrator.session_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pairing_then_connect_syncs_groups() {
    let f = fixture();
    f.provider.set_group(metadata()).await;
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();

    f.provider.pair(&session(), "qr-1").await;
    settle().await;
    let pairing = f.orchestrator.session(&session()).unwrap();
    assert_eq!(pairing.state(), SessionState::AwaitingScan);
    assert_eq!(pairing.pairing().map(|p| p.as_str()), Some("qr-1"));

    f.provider.connect(&session(), Some(identity())).await;
    settle().await;
    let connected = f.orchestrator.session(&session()).unwrap();
    assert_eq!(connected.state(), SessionState::Connected);
    assert!(connected.pairing().is_none());
    assert_eq!(connected.identity(), Some(&identity()));

    let record = f.policies.group(&key()).await.unwrap().unwrap();
    assert_eq!(record.subject, "Test Group");
    assert_eq!(record.session_id, session());
    assert!(!f.publisher.of_kind(LiveEventKind::GroupUpdate).is_empty());

    f.audit.flush().await;
    assert_eq!(f.log.entries_of(AuditKind::GroupsSynced).await.len(), 1);
}

// ════════════════════════════════════════════════════════════════════════════
// Disconnects and reconnects
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn involuntary_drop_reconnects_after_delay() {
    let f = connected_fixture().await;

    f.provider.drop_connection(&session(), false).await;
    settle().await;
    assert_eq!(state_of(&f, &session()), SessionState::Disconnected);
    assert_eq!(f.provider.open_count(&session()).await, 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    let session_now = f.orchestrator.session(&session()).unwrap();
    assert_eq!(session_now.state(), SessionState::Initializing);
    assert_eq!(session_now.reconnect_attempts(), 1);
    assert_eq!(f.provider.open_count(&session()).await, 2);

    f.provider.connect(&session(), None).await;
    settle().await;
    let reconnected = f.orchestrator.session(&session()).unwrap();
    assert_eq!(reconnected.state(), SessionState::Connected);
    assert_eq!(reconnected.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_is_retried() {
    let f = connected_fixture().await;
    f.provider.fail_next_opens(1).await;

    f.provider.drop_connection(&session(), false).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(state_of(&f, &session()), SessionState::Disconnected);
    assert_eq!(f.provider.open_count(&session()).await, 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(state_of(&f, &session()), SessionState::Initializing);
    assert_eq!(f.provider.open_count(&session()).await, 3);
}

#[tokio::test(start_paused = true)]
async fn logout_fails_the_session_without_reconnect() {
    let f = connected_fixture().await;

    f.provider.drop_connection(&session(), true).await;
    settle().await;
    let failed = f.orchestrator.session(&session()).unwrap();
    assert_eq!(failed.state(), SessionState::Failed);
    assert_eq!(failed.history().last(), Some(&SessionState::Failed));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(f.provider.open_count(&session()).await, 1);
}

#[tokio::test(start_paused = true)]
async fn operator_disconnect_is_idempotent_and_suppresses_reconnect() {
    let f = connected_fixture().await;

    let first = f.orchestrator.disconnect_session(&session()).await.unwrap();
    let second = f.orchestrator.disconnect_session(&session()).await.unwrap();

    assert_eq!(first.state(), SessionState::Disconnected);
    assert!(first.is_operator_disconnected());
    assert_eq!(second.state(), SessionState::Disconnected);
    assert_eq!(logouts(&f.provider.calls().await), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(f.provider.open_count(&session()).await, 1);

    // An explicit create restarts it.
    let restarted = f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    assert_eq!(restarted.state(), SessionState::Initializing);
    assert_eq!(restarted.reconnect_attempts(), 0);
    assert_eq!(f.provider.open_count(&session()).await, 2);

    f.provider.connect(&session(), None).await;
    settle().await;
    assert_eq!(state_of(&f, &session()), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let f = connected_fixture().await;
    f.provider.drop_connection(&session(), false).await;
    settle().await;

    f.orchestrator.disconnect_session(&session()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(f.provider.open_count(&session()).await, 1);
    assert_eq!(state_of(&f, &session()), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn delete_session_cancels_reconnect_and_mutes() {
    let f = connected_fixture().await;
    f.policies
        .mutes()
        .schedule(key(), Duration::from_secs(600), async {});
    f.provider.drop_connection(&session(), false).await;
    settle().await;

    f.orchestrator.delete_session(&session()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(f.orchestrator.session(&session()).is_none());
    assert_eq!(f.provider.open_count(&session()).await, 1);
    assert_eq!(f.policies.mutes().pending(), 0);

    f.audit.flush().await;
    assert_eq!(f.log.entries_of(AuditKind::SessionDeleted).await.len(), 1);
    let err = f.orchestrator.delete_session(&session()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SessionNotFound);
}

#[tokio::test(start_paused = true)]
async fn connection_opened_after_delete_is_logged_out() {
    let f = fixture();
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    let entry = f.orchestrator.inner.lookup(&session()).unwrap();
    f.orchestrator.delete_session(&session()).await.unwrap();
    assert_eq!(logouts(&f.provider.calls().await), 1);

    // A reconnect whose open completes after the delete.
    let late = f.provider.open(&session()).await.unwrap();
    f.orchestrator.inner.attach(&entry, late);
    settle().await;

    assert!(entry.runtime().worker.is_none());
    assert!(entry.handle().is_none());
    assert_eq!(logouts(&f.provider.calls().await), 2);
    assert!(!f.provider.connect(&session(), None).await);
}

#[tokio::test(start_paused = true)]
async fn stopped_runtime_refuses_a_late_worker() {
    let f = fixture();
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    let entry = f.orchestrator.inner.lookup(&session()).unwrap();

    // Still registered and initializing; only the stop stands in the way.
    entry.runtime().stop();
    let late = f.provider.open(&session()).await.unwrap();
    f.orchestrator.inner.attach(&entry, late);
    settle().await;

    assert!(entry.runtime().worker.is_none());
    assert!(entry.handle().is_none());
    assert_eq!(logouts(&f.provider.calls().await), 1);
    assert_eq!(state_of(&f, &session()), SessionState::Initializing);
}

// ════════════════════════════════════════════════════════════════════════════
// Message routing
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn link_in_managed_group_is_deleted() {
    let f = connected_fixture().await;
    let patch = PolicyPatch {
        anti_link_active: Some(true),
        ..PolicyPatch::default()
    };
    f.policies.set_policy(&key(), &patch).await.unwrap();

    f.provider
        .deliver(&session(), message("member@s.net", "join https://spam.example"))
        .await;
    settle().await;

    let deleted = f
        .provider
        .calls()
        .await
        .into_iter()
        .any(|c| matches!(c, OutboundCall::Deleted { .. }));
    assert!(deleted);
}

#[tokio::test(start_paused = true)]
async fn prefixed_message_runs_command_instead_of_moderation() {
    let f = connected_fixture().await;

    f.provider.deliver(&session(), message("admin@s.net", "!mute")).await;
    settle().await;

    let policy = f.policies.get_policy(&key()).await.unwrap();
    assert!(policy.admin_only_mode);
    assert!(!f.provider.sent_texts(&session()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn own_and_direct_messages_are_ignored() {
    let f = connected_fixture().await;
    let mut own = message("admin@s.net", "!mute");
    own.from_self = true;
    let mut direct = message("admin@s.net", "!mute");
    direct.is_group = false;

    f.provider.deliver(&session(), own).await;
    f.provider.deliver(&session(), direct).await;
    settle().await;

    assert!(!f.policies.get_policy(&key()).await.unwrap().admin_only_mode);
    assert!(f.provider.sent_texts(&session()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn messages_from_unknown_groups_are_ignored() {
    let f = connected_fixture().await;
    let mut stray = message("admin@s.net", "!mute");
    stray.conversation_id = GroupId::new("999@g.us").unwrap();

    f.provider.deliver(&session(), stray).await;
    settle().await;

    assert!(f.provider.sent_texts(&session()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn managed_messages_are_audited_as_received() {
    let f = connected_fixture().await;
    let hello = message("member@s.net", "hello there");
    let mut stray = message("member@s.net", "hello elsewhere");
    stray.conversation_id = GroupId::new("999@g.us").unwrap();

    f.provider.deliver(&session(), hello.clone()).await;
    f.provider.deliver(&session(), stray).await;
    settle().await;

    f.audit.flush().await;
    let received = f.log.entries_of(AuditKind::MessageReceived).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].actor, Some(participant("member@s.net")));
    assert_eq!(received[0].message_ref, Some(hello.message_ref));
    assert_eq!(received[0].group_id, Some(group()));
    assert_eq!(received[0].details, "Message from member@s.net: hello there");
}

#[tokio::test(start_paused = true)]
async fn deactivated_group_is_left_alone() {
    let f = connected_fixture().await;
    f.policies.set_policy(&key(), &anti_link()).await.unwrap();
    assert!(f.policies.set_group_active(&key(), false).await.unwrap());

    f.provider.deliver(&session(), message("admin@s.net", "!mute")).await;
    f.provider
        .deliver(&session(), message("member@s.net", "join https://spam.example"))
        .await;
    settle().await;

    assert!(!f.policies.get_policy(&key()).await.unwrap().admin_only_mode);
    assert!(deletions(&f).await.is_empty());
    assert!(f.provider.sent_texts(&session()).await.is_empty());

    // Rediscovery on reconnect keeps it inactive.
    f.provider.drop_connection(&session(), false).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    f.provider.connect(&session(), None).await;
    settle().await;
    assert!(!f.policies.group(&key()).await.unwrap().unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn policy_command_applies_to_the_next_message_in_the_group() {
    let f = connected_fixture().await;
    let link = message("member@s.net", "join https://spam.example");

    f.provider.deliver(&session(), message("admin@s.net", "!antilink on")).await;
    f.provider.deliver(&session(), link.clone()).await;
    settle().await;

    assert!(f.policies.get_policy(&key()).await.unwrap().anti_link.active);
    assert_eq!(deletions(&f).await, vec![(group(), link.message_ref)]);
}

#[tokio::test(start_paused = true)]
async fn stalled_group_does_not_hold_up_other_groups() {
    let f = fixture();
    let other = GroupMetadata {
        id: GroupId::new("888@g.us").unwrap(),
        subject: "Other Group".to_string(),
        ..metadata()
    };
    let other_key = GroupKey::new(session(), other.id.clone());
    f.provider.set_group(metadata()).await;
    f.provider.set_group(other.clone()).await;
    f.orchestrator.create_session(&tenant(), Some(session())).await.unwrap();
    f.provider.connect(&session(), Some(identity())).await;
    settle().await;
    f.policies.set_policy(&key(), &anti_link()).await.unwrap();
    f.policies.set_policy(&other_key, &anti_link()).await.unwrap();

    f.provider.stall_group(&group()).await;
    let held = message("member@s.net", "join https://spam.example");
    let mut elsewhere = message("member@s.net", "see https://spam.example/other");
    elsewhere.conversation_id = other.id.clone();
    f.provider.deliver(&session(), held.clone()).await;
    f.provider.deliver(&session(), elsewhere.clone()).await;
    settle().await;

    assert_eq!(deletions(&f).await, vec![(other.id.clone(), elsewhere.message_ref.clone())]);

    f.provider.release_group(&group()).await;
    settle().await;
    assert_eq!(
        deletions(&f).await,
        vec![(other.id, elsewhere.message_ref), (group(), held.message_ref)]
    );
}

#[tokio::test(start_paused = true)]
async fn tenants_sharing_a_group_keep_separate_policies() {
    let f = connected_fixture().await;
    let other_tenant = TenantId::new("tenant-2").unwrap();
    let other_session = SessionId::new("session-2").unwrap();
    let other_key = GroupKey::new(other_session.clone(), group());
    f.orchestrator
        .create_session(&other_tenant, Some(other_session.clone()))
        .await
        .unwrap();
    f.provider.connect(&other_session, None).await;
    settle().await;

    f.provider.deliver(&other_session, message("admin@s.net", "!mute")).await;
    settle().await;

    assert!(f.policies.get_policy(&other_key).await.unwrap().admin_only_mode);
    assert!(!f.policies.get_policy(&key()).await.unwrap().admin_only_mode);
    assert_eq!(f.policies.groups_for(&session()).await.unwrap().len(), 1);
    assert_eq!(f.policies.groups_for(&other_session).await.unwrap().len(), 1);
    assert!(f.provider.sent_texts(&session()).await.is_empty());
    assert_eq!(f.provider.sent_texts(&other_session).await.len(), 1);

    // The first tenant's members can still talk.
    f.provider.deliver(&session(), message("member@s.net", "still here")).await;
    settle().await;
    assert!(deletions(&f).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn join_delta_registers_group_and_sends_welcome() {
    let f = connected_fixture().await;
    let new_group = GroupId::new("777@g.us").unwrap();
    let new_key = GroupKey::new(session(), new_group.clone());

    f.provider
        .group_changed(
            &session(),
            GroupDelta {
                group_id: new_group.clone(),
                subject: Some("Fresh".into()),
                joined: vec![],
            },
        )
        .await;
    settle().await;
    assert_eq!(f.policies.group(&new_key).await.unwrap().unwrap().subject, "Fresh");

    let patch = PolicyPatch {
        welcome_message: Some("Welcome aboard".into()),
        ..PolicyPatch::default()
    };
    f.policies.set_policy(&new_key, &patch).await.unwrap();
    f.provider
        .group_changed(
            &session(),
            GroupDelta {
                group_id: new_group.clone(),
                subject: Some("Renamed".into()),
                joined: vec![participant("new@s.net")],
            },
        )
        .await;
    settle().await;

    assert_eq!(f.policies.group(&new_key).await.unwrap().unwrap().subject, "Renamed");
    assert_eq!(f.provider.sent_texts(&session()).await, vec!["Welcome aboard".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn send_to_group_requires_an_open_connection() {
    let f = connected_fixture().await;

    f.orchestrator.send_to_group(&session(), &group(), "hello").await.unwrap();
    assert_eq!(f.provider.sent_texts(&session()).await, vec!["hello".to_string()]);

    f.orchestrator.disconnect_session(&session()).await.unwrap();
    let err = f
        .orchestrator
        .send_to_group(&session(), &group(), "again")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProviderError);
}

#[tokio::test(start_paused = true)]
async fn shutdown_clears_the_registry() {
    let f = connected_fixture().await;
    f.orchestrator.shutdown();
    assert_eq!(f.orchestrator.session_count(), 0);
}
