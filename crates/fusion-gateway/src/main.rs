mod auth_complete;
mod auth_setup;
mod bootstrap;
mod cli;
mod dispatch;
mod registrar;
mod stores;

use std::io::{BufRead, Write};

use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use bootstrap::{Gateway, RuntimeFlags};
use cli::{AuthCommand, Cli, Command, ConfigCommand};
use fusion_domain::tenant::TenantContext;
use stores::derive_tenant_hash;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let flags = RuntimeFlags::from_env();
            bootstrap::init_tracing(&flags);
            let (config, _path) = cli::load_config()?;
            let gateway = Gateway::build(config, &flags)?;
            tracing::info!(tools = gateway.tools.len(), "fusion-gateway ready");
            serve_stdin(&gateway).await
        }
        Some(Command::Doctor) => {
            let flags = RuntimeFlags::from_env();
            let (config, path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &path, &flags).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, path) = cli::load_config()?;
            if !cli::config::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Auth(AuthCommand::Complete { instruction, code, redirect_uri, fields })) => {
            let flags = RuntimeFlags::from_env();
            let (config, _path) = cli::load_config()?;
            let gateway = Gateway::build(config, &flags)?;
            let parsed_fields = auth_complete::parse_fields(&fields)?;
            let message = auth_complete::complete(&gateway, &instruction, code.as_deref(), redirect_uri.as_deref(), &parsed_fields).await?;
            println!("{message}");
            Ok(())
        }
        Some(Command::Version) => {
            println!("fusion-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// One line of stdin per tool invocation (a dev-loop stand-in for the
/// out-of-scope network listener, spec §1). Each line is a JSON object;
/// the result (or a JSON-encoded error) is written to stdout as one line.
#[derive(Debug, Deserialize)]
struct StdinRequest {
    tool: String,
    #[serde(default)]
    args: Map<String, Value>,
    service: String,
    #[serde(default)]
    bearer_token: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default = "default_request_id")]
    request_id: String,
}

fn default_request_id() -> String {
    "cli-request".to_string()
}

async fn serve_stdin(gateway: &Gateway) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(gateway, &line).await;
        writeln!(out, "{response}")?;
        out.flush()?;
    }

    Ok(())
}

async fn handle_line(gateway: &Gateway, line: &str) -> Value {
    let request: StdinRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return json!({"error": format!("invalid request: {e}")}),
    };

    let mut ctx = TenantContext::new_no_auth(&request.service, &request.request_id);
    if let Some(token) = &request.bearer_token {
        ctx.tenant_hash = derive_tenant_hash(token);
    }
    ctx.user_id = request.user_id;

    match gateway.invoke_tool(&request.tool, request.args, &ctx, CancellationToken::new()).await {
        Ok(result) => json!({"result": result}),
        Err(e) => json!({"error": e.to_string()}),
    }
}
