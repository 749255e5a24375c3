//! Terminal rendering for decisions, batch summaries, and cache stats.

use scopesignal_ai::{BatchOutcome, EvaluationReport};
use scopesignal_core::{Classification, ClassifiedDecision, DowngradeReason};
use scopesignal_store::CacheStats;

pub fn print_decision_card(result: &ClassifiedDecision) {
    let d = &result.decision;
    let m = &result.metadata;

    println!("=== {} ({}%) ===", d.classification(), d.confidence());
    println!();
    println!("  {:<20} {}", "Trade", m.category);
    println!("  {:<20} {}", "Trade relevant", if d.relevant() { "yes" } else { "no" });
    println!("  {:<20} {}", "Reasoning", d.reasoning());
    println!("  {:<20} {}", "Risk", d.risk_note());
    println!("  {:<20} {}", "Next step", d.recommended_action());
    if let Some(reason) = m.downgrade_reason {
        println!("  {:<20} {}", "Downgraded", downgrade_label(reason));
    }
    println!();

    let source = match m.cache_age_secs {
        Some(age) if m.cache_hit => format!("cache ({})", format_age(age)),
        _ => format!("{} attempt(s), {} ms", m.attempts, m.latency_ms),
    };
    println!("  {:<20} {}", "Model", m.model);
    println!("  {:<20} {}", "Source", source);
    println!("  {:<20} {}", "Fingerprint", m.fingerprint);
}

pub fn print_batch_summary(outcomes: &[BatchOutcome]) {
    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            BatchOutcome::Failed(record) => Some(record),
            BatchOutcome::Classified(_) => None,
        })
        .collect();
    eprintln!(
        "Classified {} of {} update(s), {} failed",
        outcomes.len() - failed.len(),
        outcomes.len(),
        failed.len()
    );
    for record in failed {
        let label = record.id.as_deref().unwrap_or("-");
        eprintln!("  #{} [{}] {}: {}", record.index, label, record.category, record.error);
    }
}

pub fn print_cache_stats(stats: &CacheStats) {
    println!("=== Result cache ===");
    println!("  {:<20} {}", "Entries", stats.entry_count);
    println!("  {:<20} {}", "Size", format_bytes(stats.total_size_bytes));
    match (stats.oldest_age_secs, stats.newest_age_secs) {
        (Some(oldest), Some(newest)) => {
            println!("  {:<20} {}", "Oldest", format_age(oldest));
            println!("  {:<20} {}", "Newest", format_age(newest));
        }
        _ => println!("  {:<20} -", "Ages"),
    }
}

pub fn print_evaluation(report: &EvaluationReport) {
    println!("=== Evaluation ===");
    println!("  {:<20} {}", "Updates", report.total);
    println!("  {:<20} {}", "Classified", report.classified);
    println!("  {:<20} {}", "Failed", report.failed);
    for (kind, count) in &report.failures_by_kind {
        println!("    {kind:<18} {count}");
    }
    println!(
        "  {:<20} {} ({} of {} labelled)",
        "Accuracy",
        percent(report.accuracy),
        report.correct,
        report.labelled
    );
    println!();

    println!("Confusion (rows expected, columns returned)");
    print!("  {:<14}", "");
    for class in Classification::ALL {
        print!(" {:>12}", class.as_str());
    }
    println!();
    for expected in Classification::ALL {
        print!("  {:<14}", expected.as_str());
        for predicted in Classification::ALL {
            print!(" {:>12}", report.confusion.get(expected, predicted));
        }
        println!();
    }
    println!();

    println!(
        "  {:<14} {:>10} {:>10} {:>8} {:>8} {:>9}",
        "Class", "Precision", "Recall", "F1", "Support", "Mean conf"
    );
    for m in &report.per_class {
        println!(
            "  {:<14} {:>10} {:>10} {:>8.3} {:>8} {:>9}",
            m.class.as_str(),
            percent(m.precision),
            percent(m.recall),
            m.f1,
            m.support,
            m.mean_confidence
                .map(|c| format!("{c:.1}"))
                .unwrap_or_else(|| "-".into())
        );
    }
    println!("  {:<20} {:.3}", "Macro F1", report.macro_f1);
    println!("  {:<20} {:.3}", "Weighted F1", report.weighted_f1);
    println!();

    let mean_or_dash = |v: Option<f64>| v.map(|c| format!("{c:.1}")).unwrap_or_else(|| "-".into());
    println!("  {:<20} {}", "Conf. when correct", mean_or_dash(report.mean_confidence_correct));
    println!("  {:<20} {}", "Conf. when wrong", mean_or_dash(report.mean_confidence_incorrect));
    for (category, score) in &report.by_category {
        let accuracy = score.accuracy().map(percent).unwrap_or_else(|| "-".into());
        println!("  {category:<20} {accuracy} of {}", score.labelled);
    }
    println!(
        "  {:<20} {} hit(s), {} miss(es), {}",
        "Cache",
        report.cache.hits,
        report.cache.misses,
        percent(report.cache.hit_rate)
    );
    if let Some(latency) = report.cache.mean_latency_ms {
        println!("  {:<20} {latency:.0} ms", "Mean latency");
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn downgrade_label(reason: DowngradeReason) -> &'static str {
    match reason {
        DowngradeReason::TradeIrrelevant => "not relevant to this trade",
        DowngradeReason::AmbiguousLanguage => "ambiguous language",
    }
}

fn format_age(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h {}m ago", s / 3600, (s % 3600) / 60),
        s => format!("{}d {}h ago", s / 86_400, (s % 86_400) / 3600),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
