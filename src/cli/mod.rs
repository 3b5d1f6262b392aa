//! Housing Model Server CLI Module
//!
//! Command-line interface for serving the model or fitting it offline.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::server::{run_server, ServerConfig};
use crate::training::HousingRegressionBuilder;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString    { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

// ─── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "housing-model-server", version, about = "Serve a housing price regression model over HTTP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, env = "API_PORT", default_value_t = 3000)]
        port: u16,
        /// Directory served at the site root
        #[arg(long, env = "STATIC_DIR")]
        static_dir: Option<String>,
        /// CSV the model is fitted on
        #[arg(long, env = "DATASET_PATH")]
        dataset: Option<String>,
        /// Dependent variable column
        #[arg(long, env = "TARGET_COLUMN")]
        target: Option<String>,
    },
    /// Fit the model once and print it as JSON
    Build {
        #[arg(long, env = "DATASET_PATH", default_value = "./data/california_housing.csv")]
        dataset: PathBuf,
        #[arg(long, env = "TARGET_COLUMN", default_value = "MedHouseVal")]
        target: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    host: &str,
    port: u16,
    static_dir: Option<String>,
    dataset: Option<String>,
    target: Option<String>,
) -> anyhow::Result<()> {
    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: host.to_string(),
        port,
        static_dir: static_dir.or(defaults.static_dir.clone()),
        dataset_path: dataset.unwrap_or(defaults.dataset_path.clone()),
        target_column: target.unwrap_or(defaults.target_column.clone()),
        ..defaults
    };

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Housing Model Server".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Model  ", &format!("http://{}:{}/api/house-price-model", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box(&kv("Data   ", &config.dataset_path));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

pub fn cmd_build(dataset: &Path, target: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let model = HousingRegressionBuilder::new(dataset, target).fit()?;
    let json = serde_json::to_string_pretty(&model)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!(
                "  {} model written to {} {}",
                ok("✓"),
                path.display(),
                dim(&format!("({:.2}s)", start.elapsed().as_secs_f64()))
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
