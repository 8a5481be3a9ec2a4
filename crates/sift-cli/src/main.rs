//! Sift CLI
//!
//! Element picker rule synthesis against DOM fixtures, hit URL decoding and
//! request log replay through the interceptor.

mod fixture;
mod replay;

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sift_core::{parse_css_rule_from_url, InterceptorConfig};
use sift_picker::{construct_css_selector, construct_rule_text, get_element_info, RuleOptions};

use crate::fixture::with_target;
use crate::replay::{run_replay, ReplayLog};

#[derive(Parser)]
#[command(name = "sift-cli")]
#[command(about = "Sift element picker and request interceptor tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the filter rule for the target element of a DOM fixture
    Rule {
        /// DOM fixture (JSON)
        #[arg(short, long)]
        fixture: String,

        /// URL of the page the element lives on
        #[arg(short, long)]
        url: String,

        /// Block this resource URL instead of hiding the element
        #[arg(long)]
        block_url: Option<String>,

        /// Hide all elements sharing the element's classes
        #[arg(long)]
        similar: bool,

        /// Apply the rule on every site
        #[arg(long)]
        all_sites: bool,

        /// Extra selector text appended to element hiding rules
        #[arg(long)]
        attributes: Option<String>,
    },

    /// Print the CSS selector of the target element
    Selector {
        /// DOM fixture (JSON)
        #[arg(short, long)]
        fixture: String,

        /// Class-based selector for similar elements
        #[arg(long)]
        similar: bool,
    },

    /// Dump picker info about the target element as JSON
    Info {
        /// DOM fixture (JSON)
        #[arg(short, long)]
        fixture: String,
    },

    /// Decode a cosmetic rule hit URL
    Hit {
        url: String,
    },

    /// Replay a request log through the interceptor
    Replay {
        /// Request log (JSON)
        #[arg(short, long)]
        input: String,

        /// Interceptor config (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Rule {
            fixture,
            url,
            block_url,
            similar,
            all_sites,
            attributes,
        } => {
            let options = RuleOptions {
                is_block_by_url: block_url.is_some(),
                url_mask: block_url,
                is_block_similar: similar,
                is_block_one_domain: all_sites,
                url,
                attributes,
            };
            cmd_rule(&fixture, &options)
        }
        Commands::Selector { fixture, similar } => cmd_selector(&fixture, similar),
        Commands::Info { fixture } => cmd_info(&fixture),
        Commands::Hit { url } => cmd_hit(&url),
        Commands::Replay { input, config } => cmd_replay(&input, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_rule(fixture: &str, options: &RuleOptions) -> Result<(), String> {
    let rule = with_target(fixture, |element| construct_rule_text(&element, options))?;
    if rule.is_empty() {
        return Err("No selector available for the target element".to_string());
    }
    println!("{}", rule);
    Ok(())
}

fn cmd_selector(fixture: &str, similar: bool) -> Result<(), String> {
    let selector = with_target(fixture, |element| construct_css_selector(&element, similar))?;
    println!("{}", selector);
    Ok(())
}

fn cmd_info(fixture: &str) -> Result<(), String> {
    let info = with_target(fixture, |element| get_element_info(&element))?;
    let json = serde_json::to_string_pretty(&info).map_err(|e| format!("Failed to encode info: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_hit(url: &str) -> Result<(), String> {
    let hit = parse_css_rule_from_url(url).ok_or_else(|| format!("Not a rule hit URL: {}", url))?;
    println!("Filter:  {}", hit.filter_id);
    println!("Rule:    {}", hit.rule_text);
    Ok(())
}

fn cmd_replay(input: &str, config_path: Option<&str>) -> Result<(), String> {
    let config = match config_path {
        Some(path) => InterceptorConfig::load(Path::new(path)).map_err(|e| e.to_string())?,
        None => InterceptorConfig::default(),
    };

    let content = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let log: ReplayLog =
        serde_json::from_str(&content).map_err(|e| format!("Invalid request log '{}': {}", input, e))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    let report = runtime.block_on(run_replay(&log, &config))?;

    for line in &report.lines {
        println!("{}", line);
    }
    println!();
    println!("Blocked:");
    for (tab_id, count) in &report.blocked {
        println!("  tab {:<6} {}", tab_id, count);
    }
    println!("Rule hits:");
    for (key, count) in &report.hits {
        println!(
            "  {} {} (filter {}): {}",
            key.domain.as_deref().unwrap_or("-"),
            key.rule_text,
            key.filter_id,
            count
        );
    }
    println!("Behavior changes: {}", report.behavior_changes);

    Ok(())
}
