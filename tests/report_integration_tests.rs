// Report Pipeline Integration Tests
//
// Purpose: Upload payload -> canonical nutrients -> scores -> rendered report
// Run with: cargo test --test report_integration_tests

use approx::assert_relative_eq;
use serde_json::json;
use soil_report_rust::narrative::{ReportSection, TemplateCommentSource};
use soil_report_rust::nutrients::aggregate::find;
use soil_report_rust::nutrients::{CanonicalKey, Element, NutrientSlot, SourceCategory};
use soil_report_rust::report::{ExportFormat, ProductStage, ReportSession, SessionUpdate};
use soil_report_rust::scorer::{paddock_summary, score_paddocks, summary_csv};
use soil_report_rust::{aggregate, ExtractionResponse, NutrientReading, NutrientStatus, ThresholdConfig};

fn lab_report() -> ExtractionResponse {
    serde_json::from_value(json!({
        "analyses": [
            {"id": 1, "info": {"paddock": "Top Block", "crop": "Wheat", "date": "12/03/2025"}, "nutrients": [
                {"name": "Calcium (Mehlich III)", "current": 1030, "ideal": 1317, "unit": "ppm", "category": "albrecht"},
                {"name": "Calcium (Ammonium Acetate)", "current": 900, "ideal": 1317, "unit": "ppm", "category": "albrecht"},
                {"name": "Calcium", "current": 81.05, "ideal": 64, "unit": "%", "category": "base_saturation"},
                {"name": "Magnesium", "current": 1.4, "ideal": 1.8, "unit": "meq/100g", "category": "base_saturation"},
                {"name": "Magnesium", "current": 11.2, "ideal": 15, "unit": "%", "category": "base_saturation"},
                {"name": "Calcium_TAE", "current": 2400, "ideal": 3000, "unit": "ppm", "category": "tae"},
                {"name": "pH-level (1:5 water)", "current": "6.2", "ideal": 6.5},
                {"name": "Organic Matter (Calc)", "current": 4.1, "range": "4 - 8", "unit": "%"}
            ]},
            {"id": 2, "info": {"paddock": "Creek Flat"}, "nutrients": [
                {"name": "Zinc (DTPA)", "current": 0.5, "ideal": 5, "unit": "ppm"}
            ]}
        ],
        "count": 2
    }))
    .unwrap()
}

#[test]
fn test_cross_category_calcium_does_not_collide() {
    let readings = vec![
        NutrientReading::new("Calcium (Mehlich III)", 1030.0, 1317.0, "ppm", SourceCategory::Albrecht),
        NutrientReading::new("Calcium", 81.05, 64.0, "%", SourceCategory::BaseSaturation),
    ];
    let nutrients = aggregate(&readings);

    let albrecht = find(&nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::Calcium)).unwrap();
    assert_eq!(albrecht.current, Some(1030.0));
    assert_eq!(albrecht.ideal, Some(1317.0));
    assert_eq!(albrecht.unit, "ppm");

    let saturation = find(&nutrients, &NutrientSlot::primary(SourceCategory::BaseSaturation, Element::Calcium)).unwrap();
    assert_eq!(saturation.current, Some(81.05));
    assert_eq!(saturation.ideal, Some(64.0));
    assert_eq!(saturation.unit, "%");
    assert_eq!(saturation.status, Some(NutrientStatus::High));
}

#[test]
fn test_upload_pipeline() {
    let mut session = ReportSession::default();
    assert_eq!(session.load(&lab_report()).unwrap(), 2);
    assert_eq!(session.paddock_names(), vec!["Top Block", "Creek Flat"]);

    let nutrients = session.nutrients();

    // Mehlich III beats the other extraction method
    let calcium = find(&nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::Calcium)).unwrap();
    assert_eq!(calcium.current, Some(1030.0));

    // the % reading wins in base saturation
    let magnesium = find(&nutrients, &NutrientSlot::primary(SourceCategory::BaseSaturation, Element::Magnesium)).unwrap();
    assert_eq!(magnesium.current, Some(11.2));
    assert_eq!(magnesium.unit, "%");

    // TAE keeps its own record
    let tae = find(
        &nutrients,
        &NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(Element::Calcium)),
    )
    .unwrap();
    assert_eq!(tae.current, Some(2400.0));

    // textual values and printed ranges
    let ph = find(&nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::Ph)).unwrap();
    assert_eq!(ph.current, Some(6.2));
    let organic = find(&nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::OrganicMatter)).unwrap();
    assert_eq!(organic.status, Some(NutrientStatus::Optimal));

    // every known slot is rendered, even when empty
    let copper = find(&nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::Copper)).unwrap();
    assert!(copper.is_empty());
    assert_eq!(copper.current, None);
}

#[test]
fn test_every_nutrient_on_target_scores_full_marks() {
    let readings = vec![
        NutrientReading::new("Calcium (Mehlich III)", 1317.0, 1317.0, "ppm", SourceCategory::Albrecht),
        NutrientReading::new("Calcium", 64.0, 64.0, "%", SourceCategory::BaseSaturation),
        NutrientReading::new("Zinc (DTPA)", 5.0, 5.0, "ppm", SourceCategory::Albrecht),
    ];
    let mut session = ReportSession::default();
    let extraction: ExtractionResponse = serde_json::from_value(json!({
        "analyses": [{"id": 1, "nutrients": readings.iter().map(|r| json!({
            "name": r.name, "current": r.current, "ideal": r.ideal, "unit": r.unit,
            "category": match r.category {
                SourceCategory::BaseSaturation => "base_saturation",
                _ => "albrecht",
            }
        })).collect::<Vec<_>>()}]
    }))
    .unwrap();
    session.load(&extraction).unwrap();

    let summary = session.summary();
    assert_relative_eq!(summary.score, 100.0);
    assert_eq!(summary.stars, 5);
    assert_eq!(summary.scored_nutrients, 3);
}

#[test]
fn test_paddock_summary_lowest_first() {
    let mut session = ReportSession::default();
    session.load(&lab_report()).unwrap();

    let report = session.build_report().unwrap();
    assert_eq!(report.paddock_scores.len(), 2);
    assert_eq!(report.paddock_scores[0].paddock, "Creek Flat");

    let batches: Vec<(String, Vec<_>)> = report
        .paddock_scores
        .iter()
        .map(|p| (p.paddock.clone(), Vec::new()))
        .collect();
    let scores = score_paddocks(&batches);
    let mut table = paddock_summary(&scores).unwrap();
    assert_eq!(table.height(), 2);
    let csv = summary_csv(&mut table).unwrap();
    assert!(csv.starts_with("paddock,score,stars"));
}

#[tokio::test]
async fn test_full_report_markdown() {
    let mut session = ReportSession::new(ThresholdConfig::default());
    session.load(&lab_report()).unwrap();
    session
        .update(SessionUpdate {
            client_name: Some("Riverbend Farm".into()),
            ..Default::default()
        })
        .unwrap();
    session.products.add(ProductStage::SoilDrench, "Humic Acid", "5", "L/ha").unwrap();

    let comments = session.generate_comments(&TemplateCommentSource, None).await.unwrap();
    assert!(comments.errors.is_empty());
    assert!(session.section_text(ReportSection::BaseSaturation).is_some());
    assert!(session.section_text(ReportSection::LamotteReams).is_none());

    let md = session.export(ExportFormat::Markdown).unwrap();
    assert!(md.starts_with("# Soil Therapy Report - Top Block"));
    assert!(md.contains("**Client:** Riverbend Farm"));
    assert!(md.contains("**Crop:** Wheat"));
    assert!(md.contains("### Base Saturation"));
    assert!(md.contains("| Humic Acid | 5 | L/ha |"));
    assert!(md.contains("## Tank Mixing Sequence"));
    assert!(md.contains("## Paddock Summary"));
}

#[test]
fn test_section_text_follows_selected_paddock() {
    let mut session = ReportSession::default();
    session.load(&lab_report()).unwrap();
    session.set_section_text(ReportSection::SoilPh, "Slightly acidic.").unwrap();

    session.select_paddock("Creek Flat").unwrap();
    assert_eq!(session.section_text(ReportSection::SoilPh), None);

    session.select_paddock("Top Block").unwrap();
    assert_eq!(session.section_text(ReportSection::SoilPh), Some("Slightly acidic."));
}
