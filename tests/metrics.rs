// tests/metrics.rs
use hk_ipo_scorer::{ScoringEngine, SponsorReference};
use metrics_exporter_prometheus::PrometheusBuilder;

#[test]
fn scoring_runs_emit_series() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    let engine = ScoringEngine::builtin();
    let reference = SponsorReference::builtin();
    let doc = format!(
        "行業概覽\n本集團專注於人工智能技術。\n監管概覽\n{}",
        "本段為一般披露資料。".repeat(600)
    );

    metrics::with_local_recorder(&recorder, || {
        engine.score(&doc, "2677", &reference).unwrap();
        engine.score("掃描版", "2677", &reference).unwrap_err();
    });

    let out = handle.render();
    assert!(out.contains(r#"ipo_scoring_runs_total{tier="worth_considering"} 1"#), "{out}");
    assert!(out.contains("ipo_scoring_rejected_total 1"), "{out}");
    assert!(out.contains("ipo_scoring_total_score"), "{out}");
    // No section names a sponsor, cornerstone or lock-up here.
    assert!(out.contains(r#"ipo_rule_fallback_total{rule="sponsor"} 1"#), "{out}");
    assert!(!out.contains(r#"rule="industry""#), "{out}");
}
