//! Approval engine behavior: decision monotonicity under racing
//! administrators, role-choice policy, manager finalization and the
//! rejection cascade.

mod common;

use std::sync::Arc;

use common::*;
use registrar::db::schemas::{ApplicationStatus, ApprovedRole, Role};
use registrar::services::{ApprovalConfig, ApprovalService, NotificationKind};
use registrar::store::{ApplicationQueue, IdentityRegistry, ManagerLinker};
use registrar::RegistrarError;

#[tokio::test]
async fn test_racing_decisions_land_exactly_once() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();

    let second_admin = fx
        .approval
        .register_staff(&fx.admin_id, staff_signup("ops-admin@example.com"), Role::Admin)
        .await
        .unwrap();

    // Two admins race conflicting verdicts over shared state
    let approver = Arc::new(ApprovalService::new(fx.store.clone(), fx.notifier.clone()));
    let rejecter = Arc::new(ApprovalService::new(fx.store.clone(), fx.notifier.clone()));

    let approve_task = tokio::spawn({
        let service = approver.clone();
        let admin = fx.admin_id;
        async move {
            service
                .approve(&admin, &application_id, ApprovedRole::BusinessOwner)
                .await
        }
    });
    let reject_task = tokio::spawn({
        let service = rejecter.clone();
        async move {
            service
                .reject(&second_admin, &application_id, "documents unreadable")
                .await
        }
    });

    let approve_result = approve_task.await.unwrap();
    let reject_result = reject_task.await.unwrap();

    // Exactly one verdict wins; the loser observes AlreadyDecided
    assert!(approve_result.is_ok() != reject_result.is_ok());
    let loser = if approve_result.is_ok() {
        reject_result.unwrap_err()
    } else {
        approve_result.unwrap_err()
    };
    assert!(matches!(loser, RegistrarError::AlreadyDecided));

    let application = fx
        .store
        .find_application(&application_id)
        .await
        .unwrap()
        .unwrap();
    let owner = fx.store.find_identity(&owner_id).await.unwrap().unwrap();
    match application.status {
        ApplicationStatus::Approved => {
            assert!(owner.verified);
            assert_eq!(application.rejection_reason, None);
            assert_eq!(
                fx.notifier.count_of(NotificationKind::ApplicationApproved).await,
                1
            );
            assert_eq!(
                fx.notifier.count_of(NotificationKind::ApplicationRejected).await,
                0
            );
        }
        ApplicationStatus::Rejected => {
            // The losing approval applied no identity side effect
            assert!(!owner.verified);
            assert_eq!(
                application.rejection_reason.as_deref(),
                Some("documents unreadable")
            );
            assert_eq!(
                fx.notifier.count_of(NotificationKind::ApplicationRejected).await,
                1
            );
            assert_eq!(
                fx.notifier.count_of(NotificationKind::ApplicationApproved).await,
                0
            );
        }
        ApplicationStatus::Pending => panic!("application left undecided"),
    }
}

#[tokio::test]
async fn test_decisions_are_monotone() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();

    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap();

    let err = fx
        .approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AlreadyDecided));

    let err = fx
        .approval
        .reject(&fx.admin_id, &application_id, "changed my mind")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AlreadyDecided));

    // The stored verdict never flips
    let application = fx
        .store
        .find_application(&application_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Approved);
    assert_eq!(application.rejection_reason, None);
}

#[tokio::test]
async fn test_rejection_requires_a_reason() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();

    let err = fx
        .approval
        .reject(&fx.admin_id, &application_id, "")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::MissingReason));

    let err = fx
        .approval
        .reject(&fx.admin_id, &application_id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::MissingReason));

    // Still pending: the failed attempts claimed nothing
    let application = fx
        .store
        .find_application(&application_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Pending);
}

#[tokio::test]
async fn test_decisions_require_an_admin() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let consumer_id = fx
        .registration
        .register_consumer(consumer_signup("karim@example.com"))
        .await
        .unwrap();

    let err = fx
        .approval
        .approve(&consumer_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AdminRequired));

    // Non-admin staff do not qualify either
    let ops_id = fx
        .approval
        .register_staff(&fx.admin_id, staff_signup("ops@example.com"), Role::Operations)
        .await
        .unwrap();
    let err = fx
        .approval
        .reject(&ops_id, &application_id, "not my call")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AdminRequired));

    let err = fx
        .approval
        .approve(&fx.admin_id, &bson::oid::ObjectId::new(), ApprovedRole::BusinessOwner)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::ApplicationNotFound));
}

#[tokio::test]
async fn test_strict_role_choice_blocks_unlinked_manager_grant() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();

    let err = fx
        .approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessManager)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::Validation(_)));

    // The guard fires before the claim: the application is still pending
    let application = fx
        .store
        .find_application(&application_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Pending);

    // With a manager link on file the same grant goes through
    fx.registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();
    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessManager)
        .await
        .unwrap();
    let owner = fx.store.find_identity(&owner_id).await.unwrap().unwrap();
    assert!(owner.verified);
    assert_eq!(owner.role, Role::BusinessManager);
}

#[tokio::test]
async fn test_lax_role_choice_applies_grant_verbatim() {
    let fx = fixture_with_config(ApprovalConfig {
        strict_role_choice: false,
    })
    .await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();

    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessManager)
        .await
        .unwrap();

    let owner = fx.store.find_identity(&owner_id).await.unwrap().unwrap();
    assert!(owner.verified);
    assert_eq!(owner.role, Role::BusinessManager);
}

// ============================================================================
// Manager finalization
// ============================================================================

#[tokio::test]
async fn test_manager_finalization_grants_membership() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let link_id = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();

    // The business must be approved before any link can finalize
    let err = fx
        .approval
        .finalize_manager(&fx.admin_id, &link_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::ApplicationNotApproved));

    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap();
    let decided = fx
        .approval
        .finalize_manager(&fx.admin_id, &link_id)
        .await
        .unwrap();
    assert_eq!(decided.status, ApplicationStatus::Approved);
    assert_eq!(decided.decided_by, Some(fx.admin_id));

    let manager = fx
        .store
        .find_identity_by_email("sara@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(manager.verified);
    assert_eq!(manager.role, Role::BusinessManager);

    // The membership surfaces at sign-in
    let principal = fx
        .authentication
        .authenticate("sara@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(principal.businesses.len(), 1);
    assert_eq!(principal.businesses[0].application_id, application_id);
    assert_eq!(principal.businesses[0].business_name, "Nile Bikes");

    assert_eq!(
        fx.notifier.count_of(NotificationKind::ManagerLinkApproved).await,
        1
    );

    let err = fx
        .approval
        .finalize_manager(&fx.admin_id, &link_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AlreadyDecided));
}

#[tokio::test]
async fn test_finalized_reused_identity_keeps_its_role() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let consumer_id = fx
        .registration
        .register_consumer(consumer_signup("sara@example.com"))
        .await
        .unwrap();
    let link_id = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();

    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap();
    fx.approval
        .finalize_manager(&fx.admin_id, &link_id)
        .await
        .unwrap();

    // Verified, but the stored role is untouched
    let identity = fx.store.find_identity(&consumer_id).await.unwrap().unwrap();
    assert!(identity.verified);
    assert_eq!(identity.role, Role::Consumer);

    // Membership still surfaces despite the consumer role
    let principal = fx
        .authentication
        .authenticate("sara@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(principal.role, Role::Consumer);
    assert_eq!(principal.businesses.len(), 1);
    assert_eq!(principal.businesses[0].application_id, application_id);
}

#[tokio::test]
async fn test_rejecting_business_cascades_to_pending_links() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let link_id = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();

    fx.approval
        .reject(&fx.admin_id, &application_id, "license expired")
        .await
        .unwrap();

    let link = fx
        .store
        .find_manager_application(&link_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.status, ApplicationStatus::Rejected);

    // The cascaded link is settled; nothing can finalize it later
    let err = fx
        .approval
        .finalize_manager(&fx.admin_id, &link_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::ApplicationNotApproved));

    // The manager identity was created by the link step and stays, gated
    let manager = fx
        .store
        .find_identity_by_email("sara@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!manager.verified);
}

#[tokio::test]
async fn test_reject_manager_leaves_identity_untouched() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let link_id = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();
    fx.approval
        .approve(&fx.admin_id, &application_id, ApprovedRole::BusinessOwner)
        .await
        .unwrap();

    let decided = fx
        .approval
        .reject_manager(&fx.admin_id, &link_id)
        .await
        .unwrap();
    assert_eq!(decided.status, ApplicationStatus::Rejected);

    let manager = fx
        .store
        .find_identity_by_email("sara@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!manager.verified);

    let err = fx
        .approval
        .reject_manager(&fx.admin_id, &link_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::AlreadyDecided));

    let err = fx
        .approval
        .finalize_manager(&fx.admin_id, &bson::oid::ObjectId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::ManagerApplicationNotFound));
}

#[tokio::test]
async fn test_admin_can_verify_identity_directly() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();

    fx.approval.verify_identity(&fx.admin_id, &owner_id).await.unwrap();

    let owner = fx.store.find_identity(&owner_id).await.unwrap().unwrap();
    assert!(owner.verified);
    assert_eq!(owner.role, Role::BusinessOwner);

    // Verification alone unlocks sign-in; no application was decided
    let principal = fx
        .authentication
        .authenticate("mona@example.com", PASSWORD)
        .await
        .unwrap();
    assert!(principal.verified);

    let err = fx
        .approval
        .verify_identity(&fx.admin_id, &bson::oid::ObjectId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::UserNotFound));
}

#[tokio::test]
async fn test_manager_links_listing_for_admin_review() {
    let fx = fixture().await;

    let owner_id = fx
        .registration
        .register_owner(owner_signup("mona@example.com"))
        .await
        .unwrap();
    let application_id = fx
        .registration
        .register_business(business_signup(owner_id, "Nile Bikes"))
        .await
        .unwrap();
    let first = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "sara@example.com"))
        .await
        .unwrap();
    let second = fx
        .registration
        .register_manager(manager_signup(application_id, owner_id, "tarek@example.com"))
        .await
        .unwrap();

    let links = fx.approval.manager_links(&application_id).await.unwrap();
    let mut ids: Vec<_> = links.iter().filter_map(|l| l.id).collect();
    ids.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(links.iter().all(|l| l.status == ApplicationStatus::Pending));
}
