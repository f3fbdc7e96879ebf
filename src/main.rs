//! Registrar ops CLI
//!
//! Admin-side surface of the registration lifecycle: bootstrap, staff
//! provisioning, the approval queue and decision commands. Applicant
//! registration itself arrives through the service API.

use std::sync::Arc;

use anyhow::Context;
use bson::oid::ObjectId;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registrar::config::{Args, Command};
use registrar::db::MongoClient;
use registrar::db::schemas::{BusinessApplicationDoc, IdentityDoc, ManagerApplicationDoc};
use registrar::services::{ApprovalConfig, ApprovalService, LogNotifier, StaffSignup};
use registrar::store::{MongoStore, RegistryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; environment variables win either way
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("registrar={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Registrar onboarding operations");
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Strict role choice: {}", args.strict_role_choice);

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn RegistryStore> = Arc::new(MongoStore::new(mongo));
    let approval = ApprovalService::with_config(
        store.clone(),
        Arc::new(LogNotifier),
        ApprovalConfig {
            strict_role_choice: args.strict_role_choice,
        },
    );

    match run_command(args.command, store.as_ref(), &approval).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Execute one operator command and return printable output.
async fn run_command(
    command: Command,
    store: &dyn RegistryStore,
    approval: &ApprovalService,
) -> anyhow::Result<String> {
    match command {
        Command::BootstrapAdmin {
            email,
            password,
            phone,
            first_name,
            last_name,
        } => {
            let admin_id = ApprovalService::bootstrap_admin(
                store,
                StaffSignup {
                    email,
                    password,
                    phone,
                    first_name,
                    last_name,
                },
            )
            .await?;
            Ok(format!("Administrator ready: {admin_id}"))
        }

        Command::CreateStaff {
            admin,
            role,
            email,
            password,
            phone,
            first_name,
            last_name,
        } => {
            let admin_id = resolve_identity(store, &admin).await?;
            let staff_id = approval
                .register_staff(
                    &admin_id,
                    StaffSignup {
                        email,
                        password,
                        phone,
                        first_name,
                        last_name,
                    },
                    role.into(),
                )
                .await?;
            Ok(format!("Staff identity created: {staff_id}"))
        }

        Command::Pending => {
            let pending = approval.pending_applications().await?;
            if pending.is_empty() {
                return Ok("No pending applications".to_string());
            }
            let mut out = format!("{} pending application(s):\n", pending.len());
            for application in &pending {
                out.push_str(&format_application(application));
                out.push('\n');
            }
            Ok(out.trim_end().to_string())
        }

        Command::Managers { application_id } => {
            let application_id = parse_id(&application_id)?;
            let links = approval.manager_links(&application_id).await?;
            if links.is_empty() {
                return Ok("No manager applications".to_string());
            }
            let mut out = format!("{} manager application(s):\n", links.len());
            for link in &links {
                out.push_str(&format_manager_link(link));
                out.push('\n');
            }
            Ok(out.trim_end().to_string())
        }

        Command::Approve {
            application_id,
            admin,
            role,
        } => {
            let application_id = parse_id(&application_id)?;
            let admin_id = resolve_identity(store, &admin).await?;
            let decided = approval.approve(&admin_id, &application_id, role.into()).await?;
            Ok(format!(
                "Approved: {}",
                format_application(&decided).trim_end()
            ))
        }

        Command::Reject {
            application_id,
            admin,
            reason,
        } => {
            let application_id = parse_id(&application_id)?;
            let admin_id = resolve_identity(store, &admin).await?;
            let decided = approval.reject(&admin_id, &application_id, &reason).await?;
            Ok(format!(
                "Rejected: {}",
                format_application(&decided).trim_end()
            ))
        }

        Command::FinalizeManager {
            manager_application_id,
            admin,
        } => {
            let manager_application_id = parse_id(&manager_application_id)?;
            let admin_id = resolve_identity(store, &admin).await?;
            let decided = approval
                .finalize_manager(&admin_id, &manager_application_id)
                .await?;
            Ok(format!(
                "Finalized: {}",
                format_manager_link(&decided).trim_end()
            ))
        }

        Command::RejectManager {
            manager_application_id,
            admin,
        } => {
            let manager_application_id = parse_id(&manager_application_id)?;
            let admin_id = resolve_identity(store, &admin).await?;
            let decided = approval
                .reject_manager(&admin_id, &manager_application_id)
                .await?;
            Ok(format!(
                "Rejected: {}",
                format_manager_link(&decided).trim_end()
            ))
        }

        Command::Verify { email, admin } => {
            let admin_id = resolve_identity(store, &admin).await?;
            let identity_id = resolve_identity(store, &email).await?;
            approval.verify_identity(&admin_id, &identity_id).await?;
            Ok(format!("Verified: {identity_id} ({email})"))
        }

        Command::ShowIdentity { email } => {
            let identity = store
                .find_identity_by_email(&registrar::db::schemas::normalize_email(&email))
                .await?
                .with_context(|| format!("no identity with email '{email}'"))?;
            let identity_id = identity.id.context("stored identity has no id")?;

            let mut out = format_identity(&identity);
            if let Some(profile) = store.find_profile_by_identity(&identity_id).await? {
                out.push_str(&format!(
                    "  profile: {} {} (kind: {:?}, loyalty: {})\n",
                    profile.first_name, profile.last_name, profile.kind, profile.loyalty_points
                ));
            }
            let applications = store.applications_for_owner(&identity_id).await?;
            for application in &applications {
                out.push_str(&format_application(application));
                out.push('\n');
            }
            let links = store.approved_links_for_identity(&identity_id).await?;
            for link in &links {
                out.push_str(&format_manager_link(link));
                out.push('\n');
            }
            Ok(out.trim_end().to_string())
        }
    }
}

async fn resolve_identity(store: &dyn RegistryStore, email: &str) -> anyhow::Result<ObjectId> {
    let identity = store
        .find_identity_by_email(&registrar::db::schemas::normalize_email(email))
        .await?
        .with_context(|| format!("no identity with email '{email}'"))?;
    identity.id.context("stored identity has no id")
}

fn parse_id(raw: &str) -> anyhow::Result<ObjectId> {
    ObjectId::parse_str(raw).with_context(|| format!("'{raw}' is not a valid id"))
}

fn format_identity(identity: &IdentityDoc) -> String {
    format!(
        "{} <{}> role={} verified={}\n",
        identity
            .id
            .map(|id| id.to_hex())
            .unwrap_or_else(|| "-".to_string()),
        identity.email,
        identity.role,
        identity.verified,
    )
}

fn format_application(application: &BusinessApplicationDoc) -> String {
    let mut line = format!(
        "  [{}] {} ({}) status={}",
        application
            .id
            .map(|id| id.to_hex())
            .unwrap_or_else(|| "-".to_string()),
        application.business_name,
        application.legal_name,
        application.status,
    );
    if let Some(reason) = &application.rejection_reason {
        line.push_str(&format!(" reason={reason:?}"));
    }
    if let Some(decided_at) = application.decided_at {
        line.push_str(&format!(" decided_at={decided_at}"));
    }
    line
}

fn format_manager_link(link: &ManagerApplicationDoc) -> String {
    format!(
        "  [{}] manager={} application={} status={}",
        link.id.map(|id| id.to_hex()).unwrap_or_else(|| "-".to_string()),
        link.manager_identity_id
            .map(|id| id.to_hex())
            .unwrap_or_else(|| "unresolved".to_string()),
        link.linked_application_id.to_hex(),
        link.status,
    )
}
