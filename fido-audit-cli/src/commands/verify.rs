//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use fido_audit_core::encoding::encode_b64url;
use fido_audit_core::{
    Audit, AuthnrData, CeremonyKind, Validator, VerificationContext, VerifyError,
};
use serde::Serialize;
use tracing::{error, info};

use crate::utils::load_ceremony;

/// How results are reported on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    ceremony: CeremonyKind,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit: Option<&'a Audit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authnr_data: Option<&'a AuthnrData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Serialize)]
struct ErrorReport {
    code: &'static str,
    message: String,
}

/// Execute the verify command for one ceremony file.
pub async fn execute(
    validator: &Validator,
    kind: CeremonyKind,
    file: PathBuf,
    output: OutputOptions,
) -> Result<()> {
    let ceremony = load_ceremony(&file)?;
    info!(path = %file.display(), ceremony = %kind, "Loaded ceremony file");

    let ctx = VerificationContext::new(kind, ceremony.request, Some(ceremony.expectations));
    let result = match kind {
        CeremonyKind::Registration => validator.verify_registration(ctx).await,
        CeremonyKind::Assertion => validator.verify_assertion(ctx).await,
    };

    match result {
        Ok(ctx) => {
            info!(ceremony = %kind, "Verification successful");
            if output.json {
                print_json(&Report {
                    ceremony: kind,
                    verified: true,
                    audit: Some(ctx.audit()),
                    authnr_data: Some(&ctx.authnr_data),
                    error: None,
                })?;
            } else if !output.quiet {
                print_verified(kind, &ctx);
            }
            Ok(())
        }
        Err(err) => {
            error!(code = err.code(), reason = %err, "Ceremony rejected");
            if output.json {
                print_json(&Report {
                    ceremony: kind,
                    verified: false,
                    audit: None,
                    authnr_data: None,
                    error: Some(ErrorReport {
                        code: err.code(),
                        message: err.to_string(),
                    }),
                })?;
            } else if !output.quiet {
                print_rejected(kind, &err);
            }
            Err(anyhow::Error::new(err).context("Verification failed"))
        }
    }
}

fn print_json(report: &Report<'_>) -> Result<()> {
    let body = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{body}");
    Ok(())
}

fn print_verified(kind: CeremonyKind, ctx: &VerificationContext) {
    let data = &ctx.authnr_data;

    println!();
    println!("{}", "╔════════════════════════════════════════╗".green());
    println!(
        "{}",
        "║              VERIFIED                  ║".green().bold()
    );
    println!("{}", "╚════════════════════════════════════════╝".green());
    println!();
    println!("   {} {}", "Ceremony:".dimmed(), kind);
    println!(
        "   {} {} fields, complete",
        "Audit:".dimmed(),
        ctx.audit().journal().len()
    );
    if let Some(at) = ctx.audit().finalized_at() {
        println!("   {} {}", "Finalized:".dimmed(), at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(flags) = data.flags {
        println!("   {} {}", "Flags:".dimmed(), flags);
    }
    if let Some(counter) = data.counter {
        println!("   {} {}", "Counter:".dimmed(), counter);
    }

    if kind == CeremonyKind::Registration {
        if let Some(fmt) = &data.fmt {
            println!("   {} {}", "Attestation:".dimmed(), fmt);
        }
        if let Some(cred_id) = &data.cred_id {
            println!("   {} {}", "Credential:".dimmed(), encode_b64url(cred_id));
        }
        if let Some(pem) = &data.credential_public_key_pem {
            println!();
            print!("{pem}");
        }
    }
}

fn print_rejected(kind: CeremonyKind, err: &VerifyError) {
    println!();
    println!("{}", "╔════════════════════════════════════════╗".red());
    println!(
        "{}",
        "║              REJECTED                  ║".red().bold()
    );
    println!("{}", "╚════════════════════════════════════════╝".red());
    println!();
    println!("   {} {}", "Ceremony:".dimmed(), kind);
    println!("   {} {}", "Code:".dimmed(), err.code().red());
    println!("   {} {}", "Reason:".dimmed(), err.to_string().red());
}
