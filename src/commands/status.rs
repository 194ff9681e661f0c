//! `status` and `score`: read-only views of today.

use crate::common::constants::RHYTHM_SEGMENTS;
use crate::common::utils::format_minutes;
use crate::pacing::PaceDirection;
use crate::session::{HydrationSession, StatusReport};

pub fn handle_status(session: &HydrationSession) {
    let report = session.status();
    log_version!();
    log_block_start!("Today ({})", report.day_key);
    log_indented!(
        "{} / {} ml ({}%)",
        report.consumed_ml,
        report.goal_ml,
        report.percent
    );
    log_indented!(
        "Bottle: {} ml, {}% full, {} finished",
        report.bottle_ml,
        (report.remaining * 100.0).round(),
        report.completed_bottles
    );
    if report.carry_ml > 0 || report.extra_ml > 0 {
        log_indented!(
            "Earlier bottles: {} ml, extra: {} ml",
            report.carry_ml,
            report.extra_ml
        );
    }

    log_block_start!("Pacing");
    log_indented!("{}", pacing_line(&report));
    log_indented!(
        "Target line: {}% of the bottle",
        (report.target_line * 100.0).round()
    );
    log_indented!(
        "Next day starts {}",
        report.next_rollover.format("%Y-%m-%d %H:%M")
    );

    if report.morning_reset_pending {
        log_block_start!("Morning reset pending, run `hydrated ack` to dismiss");
    }
    if let Some(celebration) = &report.celebration {
        log_block_start!(
            "Last milestone: {}% ({} ml)",
            celebration.percent,
            celebration.consumed_ml
        );
    }
    log_score(session, &report);
}

pub fn handle_score(session: &HydrationSession) {
    let report = session.status();
    log_version!();
    log_score(session, &report);
}

fn pacing_line(report: &StatusReport) -> String {
    let pacing = &report.pacing;
    if !pacing.beyond_tolerance {
        return format!("On pace ({} ml due by now)", report.expected_ml);
    }
    let gap = pacing.delta_ml.unsigned_abs();
    match pacing.direction {
        PaceDirection::Ahead => format!("{gap} ml ahead of {} ml due", report.expected_ml),
        PaceDirection::Behind => format!("{gap} ml behind {} ml due", report.expected_ml),
    }
}

fn log_score(session: &HydrationSession, report: &StatusReport) {
    let window = session.config().window();
    let segment_minutes = window.duration_minutes() / RHYTHM_SEGMENTS as i64;

    log_block_start!(
        "Rhythm score: {} (consistency {}, volume {})",
        report.today_score.total(),
        report.today_score.consistency,
        report.today_score.volume
    );
    for (index, tally) in report.windows.iter().enumerate() {
        let start = window.wake() + segment_minutes * index as i64;
        log_indented!(
            "{}  {} sips, {} ml",
            format_minutes(start),
            tally.hits,
            tally.ml
        );
    }
    log_indented!("7-day average: {:.1}", report.rolling_score);
}
