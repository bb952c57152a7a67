use clap::ArgMatches;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strider_engine::{ExploreOutcome, Explorer, HttpExtractor, ProgressCallback};
use tracing_subscriber;
use url::Url;

// Helper functions for the explore handler

/// Load seed URLs from either a file or a single URL argument
pub fn load_seeds_from_source(
    url: Option<&Url>,
    seeds_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(seeds_file_path) = seeds_file {
        load_seeds_from_file(seeds_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --seeds-file must be provided".to_string())
    }
}

/// Load and parse seed URLs from a file
pub fn load_seeds_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seeds file {}: {}", path.display(), e))?;

    let seeds: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if seeds.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(seeds)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    None
}

/// Extract the path component from a URL for compact display
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Render the discovered set and run stats as a plain-text report,
/// grouped by host
pub fn render_text_report(outcome: &ExploreOutcome) -> String {
    let mut report = String::new();

    report.push_str("Summary:\n");
    report.push_str(&format!(
        "  Nodes discovered: {}\n",
        outcome.discovered.len()
    ));
    report.push_str(&format!(
        "  Expansions completed: {}\n",
        outcome.stats.expansions_ok
    ));
    report.push_str(&format!(
        "  Expansions failed: {}\n",
        outcome.stats.expansions_failed
    ));
    report.push_str(&format!(
        "  Duplicate links rejected: {}\n",
        outcome.stats.duplicates_rejected
    ));
    if outcome.cancelled {
        report.push_str("  Run was cancelled; the set below is partial.\n");
    }

    // Group discovered nodes by host
    let mut by_host: HashMap<String, Vec<&str>> = HashMap::new();
    for node in &outcome.discovered {
        let host = Url::parse(node)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(node);
    }
    let mut hosts: Vec<_> = by_host.into_iter().collect();
    hosts.sort_by(|a, b| a.0.cmp(&b.0));

    report.push_str("\nNodes discovered:\n");
    for (host, mut nodes) in hosts {
        nodes.sort_unstable();
        report.push_str(&format!("\n  {}\n", host));
        report.push_str(&format!("  {}\n", "-".repeat(host.len())));
        for node in nodes {
            report.push_str(&format!("    {}\n", extract_url_path(node)));
        }
    }

    report
}

/// Render the outcome as pretty-printed JSON
pub fn render_json_report(outcome: &ExploreOutcome) -> String {
    serde_json::to_string_pretty(outcome)
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

pub async fn handle_explore(sub_matches: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let url = sub_matches.get_one::<Url>("url");
    let seeds_file = sub_matches.get_one::<PathBuf>("seeds-file");
    let threads = *sub_matches.get_one::<usize>("threads").unwrap_or(&10);
    let timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    let follow_external = sub_matches.get_flag("follow-external");
    let output = sub_matches.get_one::<PathBuf>("output");
    let format = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");

    let seeds = match load_seeds_from_source(url, seeds_file) {
        Ok(seeds) => seeds,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    println!(
        "Exploring from {} seed(s) with {} workers{}\n",
        seeds.len(),
        threads,
        if follow_external {
            " (following external hosts)"
        } else {
            ""
        }
    );

    let extractor = match HttpExtractor::with_timeout(timeout_secs) {
        Ok(extractor) => Arc::new(extractor.with_same_host_only(!follow_external)),
        Err(e) => {
            eprintln!("{} Failed to build HTTP client: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    // One spinner per worker, fed by the engine's progress callback
    let multi = MultiProgress::new();
    let worker_bars: Arc<Vec<ProgressBar>> = Arc::new(
        (0..threads)
            .map(|i| {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} Worker {msg}")
                        .unwrap(),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message(format!("{}: idle", i));
                pb
            })
            .collect(),
    );

    let bars = worker_bars.clone();
    let progress_callback: ProgressCallback = Arc::new(move |worker_id, node| {
        if let Some(pb) = bars.get(worker_id) {
            pb.set_message(format!("{}: {}", worker_id, extract_url_path(&node)));
        }
    });

    let explorer = Explorer::new(extractor)
        .with_workers(threads)
        .with_progress_callback(progress_callback);

    // Ctrl-C forces the run to drain and report the partial set
    let cancel = explorer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match explorer.run(seeds).await {
        Ok(outcome) => {
            for pb in worker_bars.iter() {
                pb.finish_and_clear();
            }
            multi.clear().unwrap();

            if outcome.cancelled {
                println!("{} Exploration cancelled, partial results follow\n", "!".yellow());
            } else {
                println!("{} Exploration complete!\n", "✓".green());
            }

            let report = match format {
                "json" => render_json_report(&outcome),
                _ => render_text_report(&outcome),
            };

            match output {
                Some(path) => {
                    if let Err(e) = fs::write(path, &report) {
                        eprintln!(
                            "{} Failed to write report to {}: {}",
                            "✗".red(),
                            path.display(),
                            e
                        );
                        std::process::exit(1);
                    }
                    println!("Report saved to {}", path.display());
                }
                None => print!("{}", report),
            }
        }
        Err(e) => {
            for pb in worker_bars.iter() {
                pb.finish_and_clear();
            }
            multi.clear().unwrap();
            eprintln!("{} Exploration failed: {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}
