//! Configuration for the registrar service
//!
//! Every flag is backed by an environment variable so deployments can
//! configure the binary without a wrapper script.

use clap::{Parser, Subcommand, ValueEnum};

use crate::db::schemas::{ApprovedRole, Role};

/// Registrar - registration and approval engine
#[derive(Parser, Debug, Clone)]
#[command(name = "registrar")]
#[command(about = "Registration and approval engine for consumer and business onboarding")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "registrar")]
    pub mongodb_db: String,

    /// JWT secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT session expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Enable development mode (insecure JWT fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Restrict the role granted at approval time to the path the
    /// applicant actually submitted
    #[arg(long, env = "STRICT_ROLE_CHOICE", default_value = "true")]
    pub strict_role_choice: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Operator commands for the approval queue and staff provisioning.
///
/// Registration itself arrives through the service API; these commands
/// cover the admin side of the lifecycle plus first-run bootstrap.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Provision the first administrator identity (idempotent)
    BootstrapAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Create a back-office staff identity
    CreateStaff {
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
        #[arg(long, value_enum)]
        role: StaffRoleArg,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// List business applications awaiting a decision
    Pending,
    /// List manager applications linked to a business application
    Managers {
        application_id: String,
    },
    /// Approve a pending business application
    Approve {
        application_id: String,
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
        /// Role granted to the applicant on first approval
        #[arg(long, value_enum, default_value_t = ApprovedRoleArg::BusinessOwner)]
        role: ApprovedRoleArg,
    },
    /// Reject a pending business application
    Reject {
        application_id: String,
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
        /// Reason surfaced to the applicant (required)
        #[arg(long)]
        reason: String,
    },
    /// Finalize a manager link once its business is approved
    FinalizeManager {
        manager_application_id: String,
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
    },
    /// Reject a pending manager link
    RejectManager {
        manager_application_id: String,
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
    },
    /// Mark an identity as verified without an application decision
    Verify {
        /// Email of the identity to verify
        email: String,
        /// Email of the acting administrator
        #[arg(long)]
        admin: String,
    },
    /// Show an identity with its profile and business applications
    ShowIdentity {
        email: String,
    },
}

/// Role choice exposed on `approve`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovedRoleArg {
    BusinessOwner,
    BusinessManager,
}

impl From<ApprovedRoleArg> for ApprovedRole {
    fn from(arg: ApprovedRoleArg) -> Self {
        match arg {
            ApprovedRoleArg::BusinessOwner => ApprovedRole::BusinessOwner,
            ApprovedRoleArg::BusinessManager => ApprovedRole::BusinessManager,
        }
    }
}

/// Staff role choice exposed on `create-staff`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRoleArg {
    Admin,
    Operations,
    SocialMedia,
}

impl From<StaffRoleArg> for Role {
    fn from(arg: StaffRoleArg) -> Self {
        match arg {
            StaffRoleArg::Admin => Role::Admin,
            StaffRoleArg::Operations => Role::Operations,
            StaffRoleArg::SocialMedia => Role::SocialMedia,
        }
    }
}

impl Args {
    /// Effective JWT secret; dev mode falls back to an insecure default
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Reject configurations that cannot run safely
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}
