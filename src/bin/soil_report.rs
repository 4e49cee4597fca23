//! Soil Report CLI
//!
//! Renders a Markdown report for every paddock of an extraction payload.
//! Sections without pre-written commentary get the template narrative.
//!
//! Run with: cargo run --bin soil_report -- <extraction.json> [thresholds.json]

use anyhow::{bail, Context, Result};
use soil_report_rust::narrative::{fallback_summary, ReportSection, StatusCategories};
use soil_report_rust::report::{ExportFormat, ReportSession};
use soil_report_rust::ThresholdConfig;
use std::fs;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn fill_template_sections(session: &mut ReportSession) -> Result<()> {
    let nutrients = session.nutrients();
    for &section in ReportSection::ALL {
        if session.section_text(section).is_some() || section.nutrients(&nutrients).is_empty() {
            continue;
        }
        let categories = StatusCategories::from_section(section, &nutrients);
        session.set_section_text(section, &fallback_summary(section, &categories))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soil_report_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: {} <extraction.json> [thresholds.json]", args[0]);
    }

    let thresholds = match args.get(2) {
        Some(path) => ThresholdConfig::load(Path::new(path))?,
        None => ThresholdConfig::default(),
    };

    let extraction_path = Path::new(&args[1]);
    let contents = fs::read_to_string(extraction_path)
        .with_context(|| format!("Failed to read extraction file: {:?}", extraction_path))?;

    let mut session = ReportSession::new(thresholds);
    session
        .load_json(&contents)
        .with_context(|| format!("Failed to load extraction: {:?}", extraction_path))?;

    let paddocks: Vec<String> = session.paddock_names().into_iter().map(String::from).collect();
    let mut reports = Vec::with_capacity(paddocks.len());
    for name in &paddocks {
        session.select_paddock(name)?;
        fill_template_sections(&mut session)?;

        let summary = session.summary();
        tracing::info!(
            "{}: {:.1}/100 {} ({} nutrients)",
            name,
            summary.score,
            summary.stars_display,
            summary.scored_nutrients
        );
        reports.push(session.export(ExportFormat::Markdown)?);
    }

    println!("{}", reports.join("\n\n"));
    Ok(())
}
