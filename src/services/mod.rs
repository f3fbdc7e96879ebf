//! Business services: registration, approval, authentication, profiles

pub mod approval;
pub mod authentication;
pub mod notification;
pub mod profile;
pub mod registration;

pub use approval::{ApprovalConfig, ApprovalService, StaffSignup};
pub use authentication::{AuthenticatedPrincipal, AuthenticationService, BusinessSummary};
pub use notification::{LogNotifier, NotificationKind, NotificationPayload, Notifier};
pub use profile::ProfileService;
pub use registration::{
    BusinessSignup, ConsumerSignup, ManagerResolution, ManagerSignup, OwnerSignup,
    RegistrationService,
};
