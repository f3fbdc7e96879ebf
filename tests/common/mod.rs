//! Shared fixtures for the onboarding and approval integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use tokio::sync::Mutex;

use registrar::auth::SessionIssuer;
use registrar::db::schemas::{
    AddressDoc, AddressInput, ApplicationStatus, BusinessApplicationDoc, IdentityDoc,
    ManagerApplicationDoc, ProfileChanges, ProfileDoc, Role, Verdict,
};
use registrar::services::{
    ApprovalConfig, ApprovalService, AuthenticationService, BusinessSignup, ConsumerSignup,
    ManagerSignup, NotificationKind, NotificationPayload, Notifier, OwnerSignup, ProfileService,
    RegistrationService, StaffSignup,
};
use registrar::store::{
    AddressBook, ApplicationQueue, IdentityRegistry, ManagerLinker, MemoryStore, ProfileStore,
};
use registrar::types::Result;

pub const ADMIN_EMAIL: &str = "root@example.com";
pub const PASSWORD: &str = "hunter2hunter2";

/// Everything a flow test needs, wired over one shared in-memory store.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub registration: RegistrationService,
    pub approval: ApprovalService,
    pub authentication: AuthenticationService,
    pub profiles: ProfileService,
    pub admin_id: ObjectId,
}

pub async fn fixture() -> Fixture {
    fixture_with_config(ApprovalConfig::default()).await
}

pub async fn fixture_with_config(config: ApprovalConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let admin_id = ApprovalService::bootstrap_admin(store.as_ref(), staff_signup(ADMIN_EMAIL))
        .await
        .expect("bootstrap admin");

    let registration = RegistrationService::new(store.clone());
    let approval = ApprovalService::with_config(store.clone(), notifier.clone(), config);
    let authentication = AuthenticationService::new(store.clone(), session_issuer());
    let profiles = ProfileService::new(store.clone());

    Fixture {
        store,
        notifier,
        registration,
        approval,
        authentication,
        profiles,
        admin_id,
    }
}

pub fn session_issuer() -> SessionIssuer {
    SessionIssuer::new(
        "integration-test-secret-0123456789abcdef".to_string(),
        3600,
    )
    .expect("session issuer")
}

// ============================================================================
// Signup builders
// ============================================================================

pub fn address() -> AddressInput {
    AddressInput {
        street: "14 Talaat Harb".to_string(),
        area: "Downtown".to_string(),
        city: "Cairo".to_string(),
        postal_code: "11511".to_string(),
        country: "EG".to_string(),
    }
}

pub fn staff_signup(email: &str) -> StaffSignup {
    StaffSignup {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        phone: "+20100000000".to_string(),
        first_name: "Root".to_string(),
        last_name: "Admin".to_string(),
    }
}

pub fn consumer_signup(email: &str) -> ConsumerSignup {
    ConsumerSignup {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        phone: "+20100000001".to_string(),
        first_name: "Karim".to_string(),
        last_name: "Adel".to_string(),
        date_of_birth: None,
    }
}

pub fn owner_signup(email: &str) -> OwnerSignup {
    OwnerSignup {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        phone: "+20100000002".to_string(),
        first_name: "Mona".to_string(),
        last_name: "Hassan".to_string(),
        date_of_birth: None,
        national_id_number: Some("29001011234567".to_string()),
        national_id_image_ref: None,
    }
}

pub fn business_signup(owner_identity_id: ObjectId, business_name: &str) -> BusinessSignup {
    BusinessSignup {
        owner_identity_id,
        business_name: business_name.to_string(),
        legal_name: format!("{business_name} LLC"),
        contact_email: "contact@nilebikes.example".to_string(),
        contact_phone: "+20222222222".to_string(),
        license_number: Some("CAI-4471".to_string()),
        tax_certificate_number: None,
        address: address(),
    }
}

pub fn manager_signup(
    linked_application_id: ObjectId,
    owner_identity_id: ObjectId,
    email: &str,
) -> ManagerSignup {
    ManagerSignup {
        linked_application_id,
        owner_identity_id,
        email: email.to_string(),
        password: PASSWORD.to_string(),
        phone: "+20100000003".to_string(),
        first_name: "Sara".to_string(),
        last_name: "Fahmy".to_string(),
        date_of_birth: None,
        national_id_number: Some("29505051234567".to_string()),
        address: address(),
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

/// Captures every dispatched notification for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationKind, NotificationPayload)>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<(NotificationKind, NotificationPayload)> {
        self.sent.lock().await.clone()
    }

    pub async fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, kind: NotificationKind, payload: &NotificationPayload) -> std::result::Result<(), String> {
        self.sent.lock().await.push((kind, payload.clone()));
        Ok(())
    }
}

// ============================================================================
// Fault-injecting store
// ============================================================================

/// Delegates to a real `MemoryStore` but fails selected writes once,
/// for exercising the all-or-nothing step boundaries.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub fail_next_profile_insert: AtomicBool,
    pub fail_next_application_insert: AtomicBool,
    pub fail_next_manager_application_insert: AtomicBool,
    pub fail_next_address_insert: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn injected(&self, flag: &AtomicBool) -> Result<()> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(registrar::RegistrarError::Store(
                "injected write failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityRegistry for FlakyStore {
    async fn insert_identity(&self, identity: IdentityDoc) -> Result<ObjectId> {
        self.inner.insert_identity(identity).await
    }

    async fn find_identity(&self, id: &ObjectId) -> Result<Option<IdentityDoc>> {
        self.inner.find_identity(id).await
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityDoc>> {
        self.inner.find_identity_by_email(email).await
    }

    async fn promote_identity(&self, id: &ObjectId, verified: bool, role: Option<Role>) -> Result<()> {
        self.inner.promote_identity(id, verified, role).await
    }

    async fn set_identity_phone(&self, id: &ObjectId, phone: &str) -> Result<()> {
        self.inner.set_identity_phone(id, phone).await
    }

    async fn remove_identity(&self, id: &ObjectId) -> Result<()> {
        self.inner.remove_identity(id).await
    }
}

#[async_trait]
impl ProfileStore for FlakyStore {
    async fn insert_profile(&self, profile: ProfileDoc) -> Result<ObjectId> {
        self.injected(&self.fail_next_profile_insert)?;
        self.inner.insert_profile(profile).await
    }

    async fn find_profile_by_identity(&self, identity_id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.inner.find_profile_by_identity(identity_id).await
    }

    async fn apply_profile_changes(
        &self,
        identity_id: &ObjectId,
        changes: &ProfileChanges,
        new_address_id: Option<ObjectId>,
    ) -> Result<Option<ProfileDoc>> {
        self.inner
            .apply_profile_changes(identity_id, changes, new_address_id)
            .await
    }

    async fn remove_profile_by_identity(&self, identity_id: &ObjectId) -> Result<()> {
        self.inner.remove_profile_by_identity(identity_id).await
    }
}

#[async_trait]
impl AddressBook for FlakyStore {
    async fn insert_address(&self, address: AddressDoc) -> Result<ObjectId> {
        self.injected(&self.fail_next_address_insert)?;
        self.inner.insert_address(address).await
    }

    async fn find_address(&self, id: &ObjectId) -> Result<Option<AddressDoc>> {
        self.inner.find_address(id).await
    }

    async fn remove_address(&self, id: &ObjectId) -> Result<()> {
        self.inner.remove_address(id).await
    }
}

#[async_trait]
impl ApplicationQueue for FlakyStore {
    async fn insert_application(&self, application: BusinessApplicationDoc) -> Result<ObjectId> {
        self.injected(&self.fail_next_application_insert)?;
        self.inner.insert_application(application).await
    }

    async fn find_application(&self, id: &ObjectId) -> Result<Option<BusinessApplicationDoc>> {
        self.inner.find_application(id).await
    }

    async fn applications_for_owner(
        &self,
        owner_identity_id: &ObjectId,
    ) -> Result<Vec<BusinessApplicationDoc>> {
        self.inner.applications_for_owner(owner_identity_id).await
    }

    async fn pending_applications(&self) -> Result<Vec<BusinessApplicationDoc>> {
        self.inner.pending_applications().await
    }

    async fn decide_application(
        &self,
        id: &ObjectId,
        verdict: &Verdict,
        decided_by: &ObjectId,
    ) -> Result<Option<BusinessApplicationDoc>> {
        self.inner.decide_application(id, verdict, decided_by).await
    }
}

#[async_trait]
impl ManagerLinker for FlakyStore {
    async fn insert_manager_application(
        &self,
        application: ManagerApplicationDoc,
    ) -> Result<ObjectId> {
        self.injected(&self.fail_next_manager_application_insert)?;
        self.inner.insert_manager_application(application).await
    }

    async fn find_manager_application(&self, id: &ObjectId) -> Result<Option<ManagerApplicationDoc>> {
        self.inner.find_manager_application(id).await
    }

    async fn manager_applications_for(
        &self,
        linked_application_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        self.inner.manager_applications_for(linked_application_id).await
    }

    async fn approved_links_for_identity(
        &self,
        manager_identity_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        self.inner.approved_links_for_identity(manager_identity_id).await
    }

    async fn decide_manager_application(
        &self,
        id: &ObjectId,
        status: ApplicationStatus,
        decided_by: &ObjectId,
    ) -> Result<Option<ManagerApplicationDoc>> {
        self.inner
            .decide_manager_application(id, status, decided_by)
            .await
    }
}
