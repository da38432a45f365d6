use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use lurker_core::connectivity::ConnectivityWatchdog;
use lurker_core::crawl::{CrawlOptions, CrawlSummary, SeedRunner};
use lurker_core::keywords::KeywordFilter;
use lurker_core::output::OutputFormat;
use lurker_core::pipeline::{FileSink, ResultPipeline};
use lurker_core::security::HostFilter;
use lurker_scanner::HttpSettings;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

pub const NO_INPUT_HINT: &str = "No urls detected. Hint: cat urls.txt | lurker";

/// Install the stderr log subscriber. Stdout is reserved for results.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Parse a stdin line as an absolute seed URL.
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match Url::parse(line) {
        Ok(url) if url.has_host() => Some(line.to_string()),
        Ok(_) => {
            warn!("Error parsing URL {}: no host", line);
            None
        }
        Err(e) => {
            warn!("Error parsing URL {}: {}", line, e);
            None
        }
    }
}

/// Split `Name: value;;Other: value` into header pairs.
pub fn parse_headers(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(";;")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| -> Result<(String, String)> {
            let (name, value) = part
                .split_once(':')
                .with_context(|| format!("Invalid header '{}', expected 'Name: value'", part))?;
            let name = name.trim();
            if name.is_empty() {
                bail!("Invalid header '{}', missing name", part);
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Load the keyword file, expanding a leading `~`.
pub fn load_keywords(path: Option<&String>) -> Result<KeywordFilter> {
    let Some(path) = path else {
        return Ok(KeywordFilter::default());
    };

    let expanded = shellexpand::tilde(path);
    let filter = KeywordFilter::load(Path::new(expanded.as_ref()))?;
    info!("Loaded {} keywords from {}", filter.len(), expanded);
    Ok(filter)
}

pub fn output_path(matches: &ArgMatches) -> PathBuf {
    let raw = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("matched_urls.txt");
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn build_options(matches: &ArgMatches) -> Result<CrawlOptions> {
    let headers = match matches.get_one::<String>("headers") {
        Some(raw) => parse_headers(raw)?,
        None => Vec::new(),
    };

    let http = HttpSettings {
        insecure: matches.get_flag("insecure"),
        proxy: matches
            .get_one::<String>("proxy")
            .filter(|p| !p.is_empty())
            .cloned(),
        follow_redirects: !matches.get_flag("disable-redirects"),
        headers,
        ..HttpSettings::default()
    };

    Ok(CrawlOptions {
        threads: matches.get_one::<usize>("threads").copied().unwrap_or(8).max(1),
        max_depth: matches.get_one::<usize>("depth").copied().unwrap_or(2),
        max_page_size: matches.get_one::<usize>("size").map(|kb| kb.saturating_mul(1024)),
        include_subdomains: matches.get_flag("subs"),
        inside: matches.get_flag("inside"),
        timeout: matches
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs)),
        format: OutputFormat {
            json: matches.get_flag("json"),
            show_source: matches.get_flag("show-source"),
            show_where: matches.get_flag("show-where"),
        },
        http,
    })
}

/// Feed every seed line from `reader` through `runner`, one at a time.
pub async fn run_seeds<R>(reader: R, runner: &mut SeedRunner) -> Result<CrawlSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some(seed) = parse_url_line(&line) else {
            continue;
        };
        runner.run_seed(&seed).await;
    }
    Ok(runner.summary().clone())
}

pub async fn handle_run(matches: &ArgMatches) -> Result<()> {
    if std::io::stdin().is_terminal() {
        bail!(NO_INPUT_HINT);
    }

    let keywords = load_keywords(matches.get_one::<String>("keywords"))?;
    let options = build_options(matches)?;
    let unique = matches.get_flag("unique");

    let watchdog = Arc::new(ConnectivityWatchdog::new());
    watchdog.wait_until_connected().await;

    let sink = FileSink::open(&output_path(matches))?;
    let (pipeline, consumer) = ResultPipeline::new(options.threads, unique, Some(sink));
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        consumer.drain(&mut stdout).await
    });

    let mut runner = SeedRunner::new(
        options,
        keywords,
        pipeline.clone(),
        Arc::new(HostFilter::default()),
    )?
    .with_watchdog(watchdog);

    let stdin = BufReader::new(tokio::io::stdin());
    let summary = run_seeds(stdin, &mut runner).await;

    pipeline.close().await;
    let printed = printer
        .await
        .context("Result printer stopped unexpectedly")?
        .context("Failed to write results to stdout")?;

    let summary = summary?;
    summary.log();
    info!("{} results written", printed);
    if summary.seeds == 0 {
        eprintln!("{} No valid URLs were read from stdin", "⚠".yellow().bold());
    }
    Ok(())
}
