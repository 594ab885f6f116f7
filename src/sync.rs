use crate::auth::Session;
use crate::errors::RemoteError;
use crate::models::{AuthView, Identity, PartialDataset, Period, Scope};
use crate::remote::{Owner, SnapshotClient};
use crate::storage::SessionStore;
use crate::store::HabitStore;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Session),
}

/// Outcome of a sync action, shown to the user as a short status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Loaded,
    Empty,
    Unchanged,
    Saved,
    SignedIn { migrated: usize },
    SignedOut,
    Stale,
    LoadFailed,
    SaveFailed,
    MigrationFailed,
    LinkSent,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Loaded => f.write_str("Loaded from cloud"),
            SyncStatus::Empty => f.write_str("No cloud record for this month (empty)"),
            SyncStatus::Unchanged => f.write_str("Already showing this month"),
            SyncStatus::Saved => f.write_str("Saved to cloud"),
            SyncStatus::SignedIn { migrated: 0 } => f.write_str("Signed in"),
            SyncStatus::SignedIn { migrated } => {
                write!(f, "Moved {migrated} records from this device to your account")
            }
            SyncStatus::SignedOut => f.write_str("Signed out"),
            SyncStatus::Stale => f.write_str("Ignored an outdated cloud response"),
            SyncStatus::LoadFailed => f.write_str("Cloud read failed"),
            SyncStatus::SaveFailed => f.write_str("Cloud save failed"),
            SyncStatus::MigrationFailed => {
                f.write_str("Could not move device records to your account")
            }
            SyncStatus::LinkSent => f.write_str("Check your email for the sign-in link"),
        }
    }
}

/// Identifies the request a load result belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub owner: Owner,
    pub period: Period,
}

/// Keeps the resident month in step with the snapshot scope of the current
/// identity. Loads that resolve after a newer request are discarded.
pub struct SyncOrchestrator {
    identity: Identity,
    client: SnapshotClient,
    store: Arc<Mutex<HabitStore>>,
    sessions: Option<SessionStore>,
    auth: RwLock<AuthState>,
    generation: AtomicU64,
    last_status: Mutex<Option<SyncStatus>>,
}

impl SyncOrchestrator {
    pub fn new(identity: Identity, client: SnapshotClient, store: Arc<Mutex<HabitStore>>) -> Self {
        Self {
            identity,
            client,
            store,
            sessions: None,
            auth: RwLock::new(AuthState::Anonymous),
            generation: AtomicU64::new(0),
            last_status: Mutex::new(None),
        }
    }

    /// Persists sessions so a restart does not sign the user out.
    pub fn with_session_store(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Adopts the persisted session, if any. No migration or load is run.
    pub async fn restore_session(&self) -> bool {
        let Some(sessions) = &self.sessions else {
            return false;
        };
        let Some(session) = sessions.load().await else {
            return false;
        };
        self.client
            .backend()
            .set_access_token(Some(session.access_token.clone()));
        info!(user_id = %session.user_id, "restored session");
        if let Some(sessions) = &self.sessions {
            sessions.save(&session).await;
        }
        *self.auth.write().await = AuthState::Authenticated(session);
        self.bump_generation();
        true
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<Mutex<HabitStore>> {
        &self.store
    }

    pub async fn auth_state(&self) -> AuthState {
        self.auth.read().await.clone()
    }

    pub async fn auth_view(&self, sign_in_available: bool) -> AuthView {
        match &*self.auth.read().await {
            AuthState::Anonymous => AuthView {
                scope: Scope::Device,
                user_id: None,
                email: None,
                sign_in_available,
            },
            AuthState::Authenticated(session) => AuthView {
                scope: Scope::User,
                user_id: Some(session.user_id.clone()),
                email: session.email.clone(),
                sign_in_available,
            },
        }
    }

    pub async fn last_status(&self) -> Option<SyncStatus> {
        self.last_status.lock().await.clone()
    }

    pub(crate) async fn record(&self, status: SyncStatus) -> SyncStatus {
        if status != SyncStatus::Stale {
            *self.last_status.lock().await = Some(status.clone());
        }
        status
    }

    async fn current_owner(&self) -> Owner {
        match &*self.auth.read().await {
            AuthState::Anonymous => Owner::Device(self.identity.device_id.clone()),
            AuthState::Authenticated(session) => Owner::User(session.user_id.clone()),
        }
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Issues a ticket for the period the store shows. The caller holds the store lock.
    async fn issue_ticket(&self, store: &HabitStore) -> Ticket {
        Ticket {
            generation: self.bump_generation(),
            owner: self.current_owner().await,
            period: store.period(),
        }
    }

    /// Hydrates the store from `payload` if `ticket` is still the latest request.
    async fn hydrate_if_current(&self, ticket: &Ticket, payload: PartialDataset) -> bool {
        let mut store = self.store.lock().await;
        if !self.is_current(ticket) || store.period() != ticket.period {
            warn!(period = %ticket.period, generation = ticket.generation, "discarding stale snapshot");
            return false;
        }
        store.hydrate(payload).await;
        true
    }

    async fn clear_if_current(&self, ticket: &Ticket) -> bool {
        let mut store = self.store.lock().await;
        if !self.is_current(ticket) || store.period() != ticket.period {
            warn!(period = %ticket.period, generation = ticket.generation, "discarding stale empty result");
            return false;
        }
        store.clear_data().await;
        true
    }

    /// Switches the resident month and loads its snapshot for the current identity.
    ///
    /// Habits carry over into the new month; recorded values do not unless a
    /// snapshot is found.
    pub async fn navigate(&self, period: Period) -> SyncStatus {
        let ticket = {
            let mut store = self.store.lock().await;
            if store.period() == period {
                return SyncStatus::Unchanged;
            }
            store.start_period(period).await;
            self.issue_ticket(&store).await
        };
        info!(%period, scope = ?ticket.owner.scope(), "month changed");

        let status = match self.client.load_snapshot(&ticket.owner, period).await {
            Ok(Some(payload)) => {
                if self.hydrate_if_current(&ticket, payload).await {
                    SyncStatus::Loaded
                } else {
                    SyncStatus::Stale
                }
            }
            Ok(None) if self.is_current(&ticket) => SyncStatus::Empty,
            Ok(None) => SyncStatus::Stale,
            Err(err) => {
                warn!(%period, "snapshot load failed: {err}");
                SyncStatus::LoadFailed
            }
        };
        self.record(status).await
    }

    /// Writes the resident month to the current identity's scope.
    pub async fn save(&self) -> SyncStatus {
        let owner = self.current_owner().await;
        let dataset = self.store.lock().await.export_dataset();
        let status = match self.client.save_snapshot(&owner, &dataset).await {
            Ok(()) => SyncStatus::Saved,
            Err(err) => {
                warn!(period = %dataset.period(), "snapshot save failed: {err}");
                SyncStatus::SaveFailed
            }
        };
        self.record(status).await
    }

    /// Reads the resident month from the current identity's scope.
    ///
    /// When signed in and the account has no snapshot for the month, the
    /// device snapshot is copied to the account and used instead.
    pub async fn load(&self) -> SyncStatus {
        let ticket = {
            let store = self.store.lock().await;
            self.issue_ticket(&store).await
        };

        let status = match self.fetch_with_fallback(&ticket).await {
            Ok(Some(payload)) => {
                if self.hydrate_if_current(&ticket, payload).await {
                    SyncStatus::Loaded
                } else {
                    SyncStatus::Stale
                }
            }
            Ok(None) => {
                if self.clear_if_current(&ticket).await {
                    SyncStatus::Empty
                } else {
                    SyncStatus::Stale
                }
            }
            Err(err) => {
                warn!(period = %ticket.period, "snapshot load failed: {err}");
                SyncStatus::LoadFailed
            }
        };
        self.record(status).await
    }

    async fn fetch_with_fallback(
        &self,
        ticket: &Ticket,
    ) -> Result<Option<PartialDataset>, RemoteError> {
        if let Some(found) = self.client.load_snapshot(&ticket.owner, ticket.period).await? {
            return Ok(Some(found));
        }
        if ticket.owner.scope() != Scope::User {
            return Ok(None);
        }

        let device = Owner::Device(self.identity.device_id.clone());
        let Some(payload) = self.client.load_payload(&device, ticket.period).await? else {
            return Ok(None);
        };
        self.client
            .save_payload(&ticket.owner, ticket.period, payload.clone())
            .await?;
        info!(period = %ticket.period, "copied device snapshot to account");
        PartialDataset::from_value(&payload)
            .map(Some)
            .ok_or_else(|| RemoteError::Decode(format!("snapshot for {} is not an object", ticket.period)))
    }

    /// Adopts `session`, copies device history to the account, then reloads
    /// the resident month from the account if it has a snapshot.
    pub async fn sign_in(&self, session: Session) -> SyncStatus {
        let user_id = session.user_id.clone();
        self.client
            .backend()
            .set_access_token(Some(session.access_token.clone()));
        *self.auth.write().await = AuthState::Authenticated(session);
        self.bump_generation();
        info!(%user_id, "signed in");

        let migrated = match self
            .client
            .migrate_device_to_user(&self.identity.device_id, &user_id)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                warn!("device migration failed: {err}");
                return self.record(SyncStatus::MigrationFailed).await;
            }
        };

        let ticket = {
            let store = self.store.lock().await;
            self.issue_ticket(&store).await
        };
        match self.client.load_snapshot(&ticket.owner, ticket.period).await {
            Ok(Some(payload)) => {
                if !self.hydrate_if_current(&ticket, payload).await {
                    return SyncStatus::Stale;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(period = %ticket.period, "post sign-in load failed: {err}");
                return self.record(SyncStatus::LoadFailed).await;
            }
        }
        self.record(SyncStatus::SignedIn { migrated }).await
    }

    /// Drops the session. Nothing is deleted; later reads use the device scope.
    pub async fn sign_out(&self) -> SyncStatus {
        *self.auth.write().await = AuthState::Anonymous;
        self.client.backend().set_access_token(None);
        if let Some(sessions) = &self.sessions {
            sessions.clear().await;
        }
        self.bump_generation();
        info!("signed out");
        self.record(SyncStatus::SignedOut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayValues, HabitDraft, MonthDataset};
    use crate::remote::{MemoryBackend, SnapshotBackend, SnapshotRow};
    use crate::storage::{LocalStorage, SessionStore};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    const DEVICE: &str = "device-1";

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn session(user_id: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
            access_token: "token".to_string(),
        }
    }

    fn snapshot(at: Period, title: &str, gym_day_one: f64) -> MonthDataset {
        let mut dataset = MonthDataset::fresh(at);
        dataset.title = title.to_string();
        dataset
            .data
            .insert("gym".to_string(), DayValues::from([(1, Some(gym_day_one))]));
        dataset
    }

    fn orchestrator_with(
        dir: &TempDir,
        backend: Arc<dyn SnapshotBackend>,
        start: Period,
    ) -> SyncOrchestrator {
        let store = HabitStore::new(
            MonthDataset::fresh(start),
            LocalStorage::new(dir.path().join("state.json")),
        );
        SyncOrchestrator::new(
            Identity::new(DEVICE),
            SnapshotClient::new(backend),
            Arc::new(Mutex::new(store)),
        )
    }

    #[tokio::test]
    async fn navigate_hydrates_from_device_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let client = SnapshotClient::new(backend.clone());
        let feb = snapshot(period(2025, 2), "February", 40.0);
        client
            .save_snapshot(&Owner::Device(DEVICE.into()), &feb)
            .await
            .unwrap();

        let sync = orchestrator_with(&dir, backend, period(2025, 1));
        assert_eq!(sync.navigate(period(2025, 2)).await, SyncStatus::Loaded);

        let store = sync.store().lock().await;
        assert_eq!(store.dataset(), &feb);
    }

    #[tokio::test]
    async fn navigate_without_snapshot_keeps_habits_and_clears_data() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let sync = orchestrator_with(&dir, backend, period(2025, 1));
        {
            let mut store = sync.store().lock().await;
            store.add_habit(HabitDraft::default()).await.unwrap();
            store.set_cell("gym", 3, Some(30.0)).await.unwrap();
        }
        sync.save().await;
        let habits = sync.store().lock().await.dataset().habits.clone();

        assert_eq!(sync.navigate(period(2025, 2)).await, SyncStatus::Empty);
        {
            let store = sync.store().lock().await;
            assert_eq!(store.period(), period(2025, 2));
            assert_eq!(store.dataset().habits, habits);
            assert!(store.dataset().data.is_empty());
        }

        assert_eq!(sync.navigate(period(2025, 1)).await, SyncStatus::Loaded);
        assert_eq!(sync.store().lock().await.dataset().value("gym", 3), Some(30.0));
    }

    #[tokio::test]
    async fn navigate_to_same_month_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let sync = orchestrator_with(&dir, Arc::new(MemoryBackend::default()), period(2025, 1));
        sync.store()
            .lock()
            .await
            .set_cell("gym", 1, Some(10.0))
            .await
            .unwrap();

        assert_eq!(sync.navigate(period(2025, 1)).await, SyncStatus::Unchanged);
        assert_eq!(sync.store().lock().await.dataset().value("gym", 1), Some(10.0));
    }

    #[tokio::test]
    async fn save_targets_scope_of_current_identity() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let client = SnapshotClient::new(backend.clone());
        let sync = orchestrator_with(&dir, backend, period(2025, 5));

        assert_eq!(sync.save().await, SyncStatus::Saved);
        let device = client
            .load_payload(&Owner::Device(DEVICE.into()), period(2025, 5))
            .await
            .unwrap();
        assert!(device.is_some());

        sync.sign_in(session("u1")).await;
        sync.store().lock().await.set_title("Account").await;
        assert_eq!(sync.save().await, SyncStatus::Saved);
        let user = client
            .load_snapshot(&Owner::User("u1".into()), period(2025, 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.title.as_deref(), Some("Account"));
        assert_eq!(sync.last_status().await, Some(SyncStatus::Saved));
    }

    #[tokio::test]
    async fn sign_in_migrates_device_history_and_hydrates() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let client = SnapshotClient::new(backend.clone());
        let device = Owner::Device(DEVICE.into());
        let jan = snapshot(period(2025, 1), "January", 60.0);
        let feb = snapshot(period(2025, 2), "February", 20.0);
        client.save_snapshot(&device, &jan).await.unwrap();
        client.save_snapshot(&device, &feb).await.unwrap();

        let sync = orchestrator_with(&dir, backend, period(2025, 1));
        assert_eq!(
            sync.sign_in(session("u1")).await,
            SyncStatus::SignedIn { migrated: 2 }
        );
        assert!(matches!(sync.auth_state().await, AuthState::Authenticated(_)));

        let user = Owner::User("u1".into());
        assert_eq!(
            client.load_payload(&user, period(2025, 1)).await.unwrap(),
            client.load_payload(&device, period(2025, 1)).await.unwrap()
        );
        assert!(client.load_payload(&device, period(2025, 2)).await.unwrap().is_some());
        assert_eq!(sync.store().lock().await.dataset(), &jan);
    }

    #[tokio::test]
    async fn sign_in_without_user_snapshot_keeps_current_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let sync = orchestrator_with(&dir, Arc::new(MemoryBackend::default()), period(2025, 1));
        sync.store()
            .lock()
            .await
            .set_cell("gym", 2, Some(15.0))
            .await
            .unwrap();

        assert_eq!(
            sync.sign_in(session("u1")).await,
            SyncStatus::SignedIn { migrated: 0 }
        );
        assert_eq!(sync.store().lock().await.dataset().value("gym", 2), Some(15.0));
    }

    #[tokio::test]
    async fn manual_load_copies_device_snapshot_to_account() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let client = SnapshotClient::new(backend.clone());
        let sync = orchestrator_with(&dir, backend, period(2025, 3));
        sync.sign_in(session("u1")).await;

        let march = snapshot(period(2025, 3), "March", 45.0);
        client
            .save_snapshot(&Owner::Device(DEVICE.into()), &march)
            .await
            .unwrap();

        assert_eq!(sync.load().await, SyncStatus::Loaded);
        assert_eq!(sync.store().lock().await.dataset(), &march);
        let copied = client
            .load_snapshot(&Owner::User("u1".into()), period(2025, 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(copied.into_dataset(period(2025, 3)), march);
    }

    #[tokio::test]
    async fn manual_load_without_any_snapshot_empties_month() {
        let dir = tempfile::tempdir().unwrap();
        let sync = orchestrator_with(&dir, Arc::new(MemoryBackend::default()), period(2025, 3));
        sync.store()
            .lock()
            .await
            .set_cell("gym", 2, Some(15.0))
            .await
            .unwrap();

        assert_eq!(sync.load().await, SyncStatus::Empty);
        let store = sync.store().lock().await;
        assert!(store.dataset().data.is_empty());
        assert!(!store.dataset().habits.is_empty());
    }

    #[tokio::test]
    async fn sign_out_falls_back_to_device_scope() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let client = SnapshotClient::new(backend.clone());
        let sync = orchestrator_with(&dir, backend, period(2025, 1));

        sync.sign_in(session("u1")).await;
        sync.save().await;
        assert_eq!(sync.sign_out().await, SyncStatus::SignedOut);
        assert_eq!(sync.auth_state().await, AuthState::Anonymous);
        assert_eq!(sync.auth_view(true).await.scope, Scope::Device);

        assert_eq!(sync.save().await, SyncStatus::Saved);
        assert!(client
            .load_payload(&Owner::User("u1".into()), period(2025, 1))
            .await
            .unwrap()
            .is_some());
        assert!(client
            .load_payload(&Owner::Device(DEVICE.into()), period(2025, 1))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn session_survives_restart_until_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let sessions = SessionStore::new(dir.path().join("session.json"));

        let first = orchestrator_with(&dir, backend.clone(), period(2025, 1))
            .with_session_store(sessions.clone());
        first.sign_in(session("u1")).await;

        let restarted = orchestrator_with(&dir, backend.clone(), period(2025, 1))
            .with_session_store(sessions.clone());
        assert!(restarted.restore_session().await);
        assert_eq!(
            restarted.auth_state().await,
            AuthState::Authenticated(session("u1"))
        );
        assert_eq!(restarted.auth_view(true).await.scope, Scope::User);

        restarted.sign_out().await;
        let after_sign_out = orchestrator_with(&dir, backend, period(2025, 1))
            .with_session_store(sessions);
        assert!(!after_sign_out.restore_session().await);
        assert_eq!(after_sign_out.auth_state().await, AuthState::Anonymous);
    }

    struct FailingBackend;

    #[async_trait]
    impl SnapshotBackend for FailingBackend {
        async fn upsert(&self, _owner: &Owner, _rows: Vec<SnapshotRow>) -> Result<(), RemoteError> {
            Err(RemoteError::Transport("offline".into()))
        }

        async fn select_one(&self, _owner: &Owner, _period: Period) -> Result<Option<Value>, RemoteError> {
            Err(RemoteError::Transport("offline".into()))
        }

        async fn select_all(&self, _owner: &Owner) -> Result<Vec<SnapshotRow>, RemoteError> {
            Err(RemoteError::Transport("offline".into()))
        }
    }

    #[tokio::test]
    async fn remote_failures_leave_dataset_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sync = orchestrator_with(&dir, Arc::new(FailingBackend), period(2025, 1));
        sync.store()
            .lock()
            .await
            .set_cell("gym", 2, Some(15.0))
            .await
            .unwrap();
        let before = sync.store().lock().await.export_dataset();

        assert_eq!(sync.save().await, SyncStatus::SaveFailed);
        assert_eq!(sync.load().await, SyncStatus::LoadFailed);
        assert_eq!(sync.sign_in(session("u1")).await, SyncStatus::MigrationFailed);
        assert_eq!(sync.store().lock().await.export_dataset(), before);
        assert_eq!(
            sync.last_status().await.map(|status| status.to_string()).as_deref(),
            Some("Could not move device records to your account")
        );
    }

    /// Holds the first lookup until released so a later request can overtake it.
    struct GatedBackend {
        inner: MemoryBackend,
        gate: Notify,
        held: AtomicBool,
    }

    #[async_trait]
    impl SnapshotBackend for GatedBackend {
        async fn upsert(&self, owner: &Owner, rows: Vec<SnapshotRow>) -> Result<(), RemoteError> {
            self.inner.upsert(owner, rows).await
        }

        async fn select_one(&self, owner: &Owner, period: Period) -> Result<Option<Value>, RemoteError> {
            if !self.held.swap(true, Ordering::SeqCst) {
                self.gate.notified().await;
            }
            self.inner.select_one(owner, period).await
        }

        async fn select_all(&self, owner: &Owner) -> Result<Vec<SnapshotRow>, RemoteError> {
            self.inner.select_all(owner).await
        }
    }

    #[tokio::test]
    async fn stale_navigation_result_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(GatedBackend {
            inner: MemoryBackend::default(),
            gate: Notify::new(),
            held: AtomicBool::new(false),
        });
        let client = SnapshotClient::new(backend.clone());
        let device = Owner::Device(DEVICE.into());
        client
            .save_snapshot(&device, &snapshot(period(2025, 2), "February", 20.0))
            .await
            .unwrap();
        let march = snapshot(period(2025, 3), "March", 30.0);
        client.save_snapshot(&device, &march).await.unwrap();

        let sync = Arc::new(orchestrator_with(&dir, backend.clone(), period(2025, 1)));
        let slow = {
            let sync = Arc::clone(&sync);
            tokio::spawn(async move { sync.navigate(period(2025, 2)).await })
        };
        while !backend.held.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        assert_eq!(sync.navigate(period(2025, 3)).await, SyncStatus::Loaded);
        backend.gate.notify_one();
        assert_eq!(slow.await.unwrap(), SyncStatus::Stale);

        assert_eq!(sync.store().lock().await.dataset(), &march);
        assert_eq!(sync.last_status().await, Some(SyncStatus::Loaded));
    }
}
