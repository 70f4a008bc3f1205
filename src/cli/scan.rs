use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use super::commands::ScanArgs;
use super::progress::ScanProgress;
use crate::config::credentials::redact_credentials;
use crate::config::{load_layered_config, VulnAgentConfig};
use crate::errors::VulnAgentError;
use crate::llm::create_provider;
use crate::models::ScanResult;
use crate::pipeline::{ScanEvent, ScanOrchestrator};
use crate::session::SessionStore;
use crate::transport::GuardedTransport;
use crate::utils::formatting::format_duration;

pub async fn handle_scan(args: ScanArgs, quiet: bool) -> Result<ScanResult, VulnAgentError> {
    let (mut config, source) = load_layered_config(args.config.as_deref().map(Path::new)).await?;
    apply_overrides(&mut config, &args);
    let target = parse_target(&args.target)?;

    let transport = GuardedTransport::new(config.transport_config())?;
    if !transport.whitelist().allows(&target) {
        return Err(VulnAgentError::NotWhitelisted(format!(
            "{} (add its host with --whitelist or transport.whitelist)",
            target
        )));
    }
    let settings = config.llm_settings();
    let llm = create_provider(&settings)?;

    info!(
        target = %target,
        config = %source.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
        max_steps = config.scan.max_steps,
        "Starting scan"
    );

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            ctrl_c_token.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<ScanEvent>();
    let display = tokio::spawn(async move {
        let mut progress = if quiet { None } else { Some(ScanProgress::new()) };
        while let Some(event) = rx.recv().await {
            if let Some(p) = progress.as_mut() {
                p.handle_event(&event);
            }
        }
    });

    let orchestrator = ScanOrchestrator::new(
        Arc::new(SessionStore::new()),
        llm,
        Arc::new(transport),
        config.scan_config(),
    )
    .with_cancel_token(cancel)
    .with_event_channel(tx);

    let mut result = orchestrator.run(target.as_str()).await;
    if let (Some(error), Some(key)) = (result.error.as_mut(), settings.api_key.as_deref()) {
        *error = redact_credentials(error, &[key]);
    }
    orchestrator.store().clear_session(&result.session_id);
    drop(orchestrator);
    let _ = display.await;

    if let Some(path) = &args.output {
        write_result(Path::new(path), &result).await?;
        info!(path = %path, "Scan result written");
    }
    if !quiet {
        print_summary(&result);
    }

    Ok(result)
}

fn apply_overrides(config: &mut VulnAgentConfig, args: &ScanArgs) {
    if let Some(llm) = &args.llm {
        config.llm.provider = llm.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    for host in &args.whitelist {
        let host = host.trim();
        if !host.is_empty() && !config.transport.whitelist.iter().any(|h| h == host) {
            config.transport.whitelist.push(host.to_string());
        }
    }
    if let Some(max_steps) = args.max_steps {
        config.scan.max_steps = max_steps.max(1);
    }
}

fn parse_target(raw: &str) -> Result<Url, VulnAgentError> {
    let url = Url::parse(raw).map_err(|e| VulnAgentError::InvalidTarget(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(VulnAgentError::InvalidTarget(format!("{} is not an http(s) URL", raw))),
    }
}

async fn write_result(path: &Path, result: &ScanResult) -> Result<(), VulnAgentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(PathBuf::from(path), json).await?;
    Ok(())
}

fn print_summary(result: &ScanResult) {
    println!();
    let status = if result.completed {
        style("completed").green().bold()
    } else {
        style("failed").red().bold()
    };
    println!(
        "{} {} | {} steps | {}",
        style(&result.session_id).dim(),
        status,
        result.steps_executed,
        format_duration(result.duration_ms)
    );
    if let Some(error) = &result.error {
        println!("  {}", style(error).red());
    }

    println!("  Tools used: {}", if result.tools_used.is_empty() { "none".to_string() } else { result.tools_used.join(", ") });
    if result.findings.is_empty() {
        println!("  No findings.");
        return;
    }

    println!("  {} findings:", result.total_findings());
    let mut findings: Vec<_> = result.findings.iter().collect();
    findings.sort_by_key(|f| f.severity.rank());
    for f in findings {
        let severity = match f.severity.rank() {
            0 | 1 => style(f.severity.as_str()).red().bold(),
            2 => style(f.severity.as_str()).yellow(),
            _ => style(f.severity.as_str()).dim(),
        };
        let param = f.parameter.as_deref().map(|p| format!(" ({})", p)).unwrap_or_default();
        println!("    [{}] {} {}{}", severity, f.class.as_str(), f.url, param);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(whitelist: &[&str], max_steps: Option<u32>) -> ScanArgs {
        ScanArgs {
            target: "http://example.com".into(),
            config: None,
            llm: Some("openai".into()),
            model: None,
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            max_steps,
            output: None,
        }
    }

    #[test]
    fn test_overrides_merge_whitelist() {
        let mut config = VulnAgentConfig::default();
        config.transport.whitelist.push("example.com".into());
        apply_overrides(&mut config, &args(&["example.com", " api.example.com ", ""], Some(0)));
        assert_eq!(config.transport.whitelist, vec!["example.com", "api.example.com"]);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.scan.max_steps, 1);
    }

    #[test]
    fn test_parse_target() {
        assert!(parse_target("https://example.com/app").is_ok());
        assert!(matches!(parse_target("ftp://example.com"), Err(VulnAgentError::InvalidTarget(_))));
        assert!(matches!(parse_target("not a url"), Err(VulnAgentError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_write_result_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.json");
        let result = ScanResult {
            session_id: "scan-1".into(),
            target_url: "http://example.com".into(),
            findings: vec![],
            steps_executed: 2,
            duration_ms: 10,
            error: None,
            failure: None,
            tools_used: vec!["probe".into()],
            strategy: None,
            strategy_updates: 0,
            state: crate::pipeline::ScanState::Completed,
            completed: true,
        };
        write_result(&path, &result).await.unwrap();
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["session_id"], "scan-1");
        assert_eq!(written["state"], "completed");
    }
}
