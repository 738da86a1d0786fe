use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gleaner_client::{HttpSession, SessionConfig};
use gleaner_core::record::{RuleSet, write_csv};
use gleaner_core::scrape::review;
use gleaner_core::{DelayRange, ScrapeRunner, UrlTemplate};

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Marker-based page harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every target in a list and emit one CSV row per target
    Run {
        /// File with one target name per line (# starts a comment)
        #[arg(short, long)]
        targets: PathBuf,

        /// URL template with a {name} placeholder,
        /// e.g. "https://example.test/city/{name}-California.html"
        #[arg(short = 'T', long)]
        template: String,

        /// JSON rules file: {"fields": [{"name", "start", "end", "strip_markup"?}, ...]}
        #[arg(short, long)]
        rules: PathBuf,

        /// Write CSV here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Minimum pause between requests, in milliseconds
        #[arg(long, default_value_t = 200)]
        min_delay_ms: u64,

        /// Maximum pause between requests, in milliseconds
        #[arg(long, default_value_t = 500)]
        max_delay_ms: u64,

        /// Skip the post-run review listing
        #[arg(long, default_value_t = false)]
        no_review: bool,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Fetch a single URL and print the body
    Fetch {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Fetch head information only (no body)
        #[arg(long, default_value_t = false)]
        head: bool,

        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Transport options shared by all commands.
#[derive(Args)]
struct SessionArgs {
    /// Override the default desktop-browser User-Agent
    #[arg(long, env = "GLEANER_USER_AGENT")]
    user_agent: Option<String>,

    /// Proxy URL (http, https or socks5) for all requests
    #[arg(long, env = "GLEANER_PROXY")]
    proxy: Option<String>,

    /// Referer header for all requests
    #[arg(long)]
    referrer: Option<String>,

    /// Basic auth as user:pass
    #[arg(long, env = "GLEANER_BASIC_AUTH")]
    basic_auth: Option<String>,

    /// Persist cookies at this path and resend them on later requests
    #[arg(long)]
    cookie_jar: Option<PathBuf>,

    /// Extra request header as "Name: Value"; may be repeated
    #[arg(long = "header")]
    headers: Vec<String>,

    /// Accept invalid TLS certificates. Helps against misconfigured hosts
    /// but removes a security guarantee; never on by default.
    #[arg(long, default_value_t = false)]
    insecure: bool,
}

impl SessionArgs {
    fn to_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::new();
        if let Some(ua) = &self.user_agent {
            config = config.user_agent(ua);
        }
        if let Some(proxy) = &self.proxy {
            config = config.proxy(proxy);
        }
        if let Some(referrer) = &self.referrer {
            config = config.referrer(referrer);
        }
        if let Some(auth) = &self.basic_auth {
            let (user, pass) = auth
                .split_once(':')
                .context("--basic-auth must be user:pass")?;
            config = config.credentials(user, pass);
        }
        if let Some(path) = &self.cookie_jar {
            config = config.cookie_jar(path);
        }
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .with_context(|| format!("--header {header:?} must be \"Name: Value\""))?;
            config = config.header(name.trim(), value.trim());
        }
        if self.insecure {
            config = config.accept_invalid_certs(true);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gleaner=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            targets,
            template,
            rules,
            out,
            min_delay_ms,
            max_delay_ms,
            no_review,
            session,
        } => {
            cmd_run(
                &targets,
                &template,
                &rules,
                out.as_deref(),
                min_delay_ms,
                max_delay_ms,
                no_review,
                &session,
            )
            .await?;
        }
        Commands::Fetch {
            url,
            timeout_secs,
            head,
            session,
        } => {
            cmd_fetch(&url, timeout_secs, head, &session).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    targets_path: &std::path::Path,
    template: &str,
    rules_path: &std::path::Path,
    out: Option<&std::path::Path>,
    min_delay_ms: u64,
    max_delay_ms: u64,
    no_review: bool,
    session_args: &SessionArgs,
) -> Result<()> {
    let targets_text = std::fs::read_to_string(targets_path)
        .with_context(|| format!("Failed to read target list: {}", targets_path.display()))?;
    let targets = parse_targets(&targets_text);
    anyhow::ensure!(!targets.is_empty(), "target list is empty");

    let rules_text = std::fs::read_to_string(rules_path)
        .with_context(|| format!("Failed to read rules file: {}", rules_path.display()))?;
    let rules: RuleSet = serde_json::from_str(&rules_text).context("Invalid JSON in rules file")?;
    anyhow::ensure!(!rules.fields.is_empty(), "rules file defines no fields");

    let session = HttpSession::new(session_args.to_config()?)?;
    let template = UrlTemplate::new(template);
    let delay = DelayRange::from_millis(min_delay_ms, max_delay_ms);

    tracing::info!(
        targets = targets.len(),
        fields = rules.fields.len(),
        "Starting harvest"
    );

    let runner = ScrapeRunner::new(session.clone(), rules.fields, delay);
    let records = runner.run(&targets, &template).await;

    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_csv(&records, file)?;
            tracing::info!(records = records.len(), out = %path.display(), "Wrote CSV");
        }
        None => {
            write_csv(&records, std::io::stdout().lock())?;
        }
    }

    if !no_review {
        for line in review(&records, &template) {
            println!(
                "{} ({}) - {}",
                line.name,
                line.value.as_deref().unwrap_or(""),
                line.url
            );
        }
    }

    // Persist cookies for the next run, if a jar was configured.
    session.close()?;
    Ok(())
}

async fn cmd_fetch(
    url: &str,
    timeout_secs: Option<u64>,
    head: bool,
    session_args: &SessionArgs,
) -> Result<()> {
    let config = session_args.to_config()?.head_only(head);
    let session = HttpSession::new(config)?;

    let timeout = timeout_secs.map(Duration::from_secs);
    let resp = session.get(url, timeout).await?;

    tracing::info!(
        status = resp.status,
        effective_url = %resp.effective_url,
        bytes = resp.body.len(),
        "Fetched"
    );
    print!("{}", resp.body);

    session.close()?;
    Ok(())
}

/// One target name per line; blank lines and `#` comments are skipped.
fn parse_targets(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_targets_skips_blanks_and_comments() {
        let text = "Alameda\n\n# county seat\n  Berkeley  \nSan Leandro\n";
        assert_eq!(
            parse_targets(text),
            vec!["Alameda", "Berkeley", "San Leandro"]
        );
    }

    #[test]
    fn session_args_reject_malformed_auth() {
        let args = SessionArgs {
            user_agent: None,
            proxy: None,
            referrer: None,
            basic_auth: Some("no-colon".to_string()),
            cookie_jar: None,
            headers: Vec::new(),
            insecure: false,
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn session_args_parse_headers() {
        let args = SessionArgs {
            user_agent: Some("TestAgent/1.0".to_string()),
            proxy: None,
            referrer: None,
            basic_auth: Some("pera:joe".to_string()),
            cookie_jar: None,
            headers: vec!["Accept-Language: de,en;q=0.7".to_string()],
            insecure: false,
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(
            config.credentials,
            Some(("pera".to_string(), "joe".to_string()))
        );
        assert_eq!(
            config.headers,
            vec![("Accept-Language".to_string(), "de,en;q=0.7".to_string())]
        );
    }
}
