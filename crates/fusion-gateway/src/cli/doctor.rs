//! `fusion-gateway doctor` — diagnostic checks against the current config
//! and runtime environment, printed the way `sa_gateway::cli::doctor` did,
//! adapted to this gateway's ambient stack (spec SPEC_FULL §4.18).

use std::path::Path;

use fusion_domain::config::Config;

use crate::bootstrap::RuntimeFlags;

/// Runs every check and prints a summary. Returns `Ok(true)` when every
/// check passes.
pub async fn run(config: &Config, config_path: &Path, flags: &RuntimeFlags) -> anyhow::Result<bool> {
    println!("fusion-gateway doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_state_dir(flags, &mut all_passed);
    check_auth_setup_url(config, flags, &mut all_passed);
    check_services_and_commands(config);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &Path, all_passed: &mut bool) {
    let exists = config_path.exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.display().to_string()
        } else {
            format!("{} not found", config_path.display())
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    match config.validate() {
        Ok(()) => print_check("Config validation", true, "no issues".into()),
        Err(e) => {
            print_check("Config validation", false, e.to_string());
            *all_passed = false;
        }
    }
}

fn check_state_dir(flags: &RuntimeFlags, all_passed: &mut bool) {
    let path = &flags.state_dir;
    let writable = std::fs::create_dir_all(path).is_ok() && {
        let probe = path.join(".fusion_doctor_probe");
        let ok = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        ok
    };

    print_check(
        "State directory writable",
        writable,
        if writable {
            format!("{} (writable)", path.display())
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

/// A service configured for `oauth2_external`/`user_credentials` auth needs
/// `MCP_FUSION_EXTERNAL_URL` set for its `{service}_auth_setup` tool to work
/// (spec §4.15).
fn check_auth_setup_url(config: &Config, flags: &RuntimeFlags, all_passed: &mut bool) {
    use fusion_domain::config::AuthType;

    let needs_external_url = config
        .services
        .values()
        .any(|svc| matches!(svc.auth.auth_type, AuthType::Oauth2External | AuthType::UserCredentials));

    if !needs_external_url {
        print_check("Auth-setup external URL", true, "no configured service requires it".into());
        return;
    }

    let configured = flags.external_url.is_some();
    print_check(
        "Auth-setup external URL",
        configured,
        if configured {
            "MCP_FUSION_EXTERNAL_URL set".into()
        } else {
            "MCP_FUSION_EXTERNAL_URL not set but a configured service needs auth-setup".into()
        },
    );
    if !configured {
        *all_passed = false;
    }
}

fn check_services_and_commands(config: &Config) {
    let tool_count = config.tool_names().len();
    print_check(
        "Tools registered",
        true,
        format!(
            "{} service(s), {} command group(s), {} tool(s)",
            config.services.len(),
            config.commands.len(),
            tool_count
        ),
    );
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
