use crate::nutrients::SourceCategory;
use crate::report::products::ProductStage;
use crate::report::{NutrientRow, SoilReport};

/// Markdown formatter for soil reports
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    /// Format report as markdown
    pub fn format(report: &SoilReport) -> String {
        let mut md = String::with_capacity(4096);

        // Cover
        md.push_str(&format!("# Soil Therapy Report - {}\n\n", report.paddock));
        if !report.client_name.is_empty() {
            md.push_str(&format!("**Client:** {}  \n", report.client_name));
        }
        if !report.crop.is_empty() {
            md.push_str(&format!("**Crop:** {}  \n", report.crop));
        }
        if !report.report_date.is_empty() {
            md.push_str(&format!("**Date:** {}  \n", report.report_date));
        }
        if !report.agronomist.name.is_empty() {
            md.push_str(&format!(
                "**Agronomist:** {}{}  \n",
                report.agronomist.name,
                if report.agronomist.role.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", report.agronomist.role)
                }
            ));
        }
        md.push('\n');

        // Score
        md.push_str(&format!(
            "## Soil Health Score\n\n{} **{:.1}/100** ({} of 5 stars, {} nutrients scored)\n\n",
            report.overall.stars_display,
            report.overall.score,
            report.overall.stars,
            report.overall.scored_nutrients
        ));

        for warning in &report.warnings {
            md.push_str(&format!("> ⚠ {}\n\n", warning));
        }

        // Narrative
        if !report.sections.is_empty() {
            md.push_str("## Nutrient Status Overview\n\n");
            for section in &report.sections {
                md.push_str(&format!("### {}\n\n{}\n\n", section.title, section.text));
            }
        }

        // Nutrient tables, one per panel
        for category in [
            SourceCategory::Albrecht,
            SourceCategory::BaseSaturation,
            SourceCategory::LamotteReams,
            SourceCategory::Tae,
        ] {
            let rows: Vec<&NutrientRow> = report.nutrients.iter().filter(|r| r.category == category).collect();
            if !rows.is_empty() {
                Self::format_nutrient_table(&mut md, category, &rows);
            }
        }

        // Ratios
        if report.ratios.iter().any(|r| r.value.is_some()) {
            md.push_str("## Nutritional Ratios\n\n");
            md.push_str("| Ratio | Value | Ideal | Deviation | Status |\n");
            md.push_str("|-------|-------|-------|-----------|--------|\n");
            for ratio in &report.ratios {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    ratio.label,
                    ratio.value.map_or("-".to_string(), |v| format!("{:.2}", v)),
                    ratio.ideal,
                    ratio.deviation_pct.map_or("-".to_string(), |d| format!("{:+.1}%", d)),
                    ratio.status.map_or("-", |s| s.display_text()),
                ));
            }
            md.push('\n');
        }

        // Products
        if !report.products.is_empty() || !report.soil_amendments.is_empty() {
            md.push_str("## Product Recommendations\n\n");
            if !report.soil_amendments.is_empty() {
                md.push_str("### Soil Amendments\n\n");
                md.push_str("| Fertilizer | Nutrient | Rate | Unit |\n");
                md.push_str("|------------|----------|------|------|\n");
                for amendment in &report.soil_amendments {
                    md.push_str(&format!(
                        "| {} | {} | {:.1} | {} |\n",
                        amendment.fertilizer, amendment.nutrient, amendment.rate, amendment.unit
                    ));
                }
                md.push('\n');
            }
            for &stage in ProductStage::ALL {
                let items = report.products.list(stage);
                if items.is_empty() {
                    continue;
                }
                md.push_str(&format!("### {}\n\n", stage.display_text()));
                md.push_str("| Product | Rate | Unit |\n");
                md.push_str("|---------|------|------|\n");
                for item in items {
                    md.push_str(&format!("| {} | {} | {} |\n", item.product, item.rate, item.unit));
                }
                md.push('\n');
            }
        }

        // Tank mixing
        if !report.tank_mix.is_empty() {
            md.push_str("## Tank Mixing Sequence\n\n");
            md.push_str("| # | Product Description | Products | Notes |\n");
            md.push_str("|---|---------------------|----------|-------|\n");
            for item in &report.tank_mix {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    item.sequence,
                    item.product_description,
                    if item.products.is_empty() {
                        "-".to_string()
                    } else {
                        item.products.join(", ")
                    },
                    item.notes
                ));
            }
            md.push('\n');
        }

        // Paddock comparison
        if report.paddock_scores.len() > 1 {
            md.push_str("## Paddock Summary\n\n");
            md.push_str("| Paddock | Score | Stars |\n");
            md.push_str("|---------|-------|-------|\n");
            for paddock in &report.paddock_scores {
                md.push_str(&format!(
                    "| {} | {:.1} | {} |\n",
                    paddock.paddock, paddock.overall.score, paddock.overall.stars_display
                ));
            }
            md.push('\n');
        }

        if !report.agronomist.email.is_empty() {
            md.push_str(&format!("{}  \n{}\n\n", report.agronomist.name, report.agronomist.email));
        }

        md.push_str("---\n\n");
        md.push_str(&format!("*{}*\n", report.footer));

        md
    }

    fn format_nutrient_table(md: &mut String, category: SourceCategory, rows: &[&NutrientRow]) {
        md.push_str(&format!("## {}\n\n", category.display_text()));
        md.push_str("| Nutrient | Current | Ideal | Unit | Status | Deviation | Score |\n");
        md.push_str("|----------|---------|-------|------|--------|-----------|-------|\n");

        for row in rows {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                row.label,
                row.current.map_or("-".to_string(), |v| format!("{}", v)),
                row.target_text(),
                if row.unit.is_empty() { "-" } else { &row.unit },
                row.status.map_or("-", |s| s.display_text()),
                row.deviation_pct.map_or("-".to_string(), |d| format!("{:+.1}%", d)),
                row.score.map_or("-".to_string(), |s| format!("{:.0}", s)),
            ));
        }
        md.push('\n');
    }
}
