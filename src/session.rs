//! The hydration session: one owner for today's state and everything that reacts to it.
//!
//! A `HydrationSession` is built once per process (the daemon, or a single
//! CLI command) and owns the consumption snapshot, the nudge tokens, the
//! persistence backend, the notification service and the clock. All mutations
//! go through it so the rollover check, persistence and nudge re-evaluation
//! always happen in the same order.
//!
//! Persistence and notification failures never leave this module: they are
//! logged in debug mode and the in-memory state stays authoritative.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::constants::*;
use crate::config::Config;
use crate::day::DayKey;
use crate::estimate::{CancellationToken, EstimateError, EstimationClient};
use crate::nudge::{
    self, NotificationService, NudgeDecision, NudgeInputs, NudgeKind, NudgeTokens, ScheduledNudge,
    morning_reset_token,
};
use crate::pacing::{self, PacingStatus, TargetLinePolicy};
use crate::rhythm::{self, DayScore, WindowTally};
use crate::state::{
    Action, Celebration, CelebrationKind, ConsumptionState, DayContext, MutationOutcome,
    RolloverReport, RolloverTimer,
};
use crate::store::{self, KeyValueStore};
use crate::time_source::TimeSource;

/// Snapshot of today's progress for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub now: NaiveDateTime,
    pub day_key: DayKey,
    pub consumed_ml: u32,
    pub goal_ml: u32,
    pub percent: u32,
    pub bottle_ml: u32,
    pub completed_bottles: u32,
    pub remaining: f64,
    pub carry_ml: u32,
    pub extra_ml: u32,
    pub expected_ml: u32,
    pub pacing: PacingStatus,
    /// Fill fraction the current bottle should show now.
    pub target_line: f64,
    pub next_rollover: NaiveDateTime,
    pub windows: [WindowTally; RHYTHM_SEGMENTS],
    pub today_score: DayScore,
    pub rolling_score: f64,
    pub morning_reset_pending: bool,
    pub celebration: Option<Celebration>,
}

pub struct HydrationSession {
    state: ConsumptionState,
    tokens: NudgeTokens,
    store: Box<dyn KeyValueStore>,
    notifier: Box<dyn NotificationService>,
    clock: Arc<dyn TimeSource>,
    config: Config,
    target_line: TargetLinePolicy,
    rollover_timer: RolloverTimer,
    /// Notifications handed to the service and not yet delivered, by id.
    pending: BTreeMap<&'static str, NaiveDateTime>,
    estimate_token: Option<CancellationToken>,
    notifications_allowed: bool,
    /// Morning reset token already announced by notification this process.
    announced_morning: Option<String>,
}

impl HydrationSession {
    /// Load persisted state and bring it in line with `config`.
    pub fn new(
        config: Config,
        store: Box<dyn KeyValueStore>,
        mut notifier: Box<dyn NotificationService>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let defaults = ConsumptionState::new(config.goal(), config.bottle());
        let state = match store::load_state(store.as_ref(), &defaults) {
            Ok(Some(state)) => state,
            Ok(None) => defaults,
            Err(e) => {
                log_debug!("Ignoring stored state: {:#}", e);
                defaults
            }
        };
        let tokens = NudgeTokens::load(store.as_ref());

        let notifications_allowed = if config.nudges_enabled() {
            match notifier.request_permission() {
                Ok(granted) => granted,
                Err(e) => {
                    log_debug!("Notification permission request failed: {:#}", e);
                    false
                }
            }
        } else {
            false
        };

        let mut session = Self {
            state,
            tokens,
            store,
            notifier,
            clock,
            config,
            target_line: TargetLinePolicy::default(),
            rollover_timer: RolloverTimer::new(),
            pending: BTreeMap::new(),
            estimate_token: None,
            notifications_allowed,
            announced_morning: None,
        };
        session.sync_with_config();
        session.schedule_rollover();
        session
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now_naive()
    }

    fn context(&self) -> DayContext {
        DayContext::new(self.now(), self.config.window())
    }

    pub fn state(&self) -> &ConsumptionState {
        &self.state
    }

    pub fn tokens(&self) -> &NudgeTokens {
        &self.tokens
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifications_allowed(&self) -> bool {
        self.notifications_allowed
    }

    pub fn next_rollover(&self) -> Option<NaiveDateTime> {
        self.rollover_timer.due_at()
    }

    // Mutations

    /// Set the bottle level to `fraction` (snapped per config).
    pub fn set_bottle_level(&mut self, fraction: f64, action: Action) -> MutationOutcome {
        let level = self.config.snap_mode().snap(fraction);
        self.mutate(true, |state, ctx| state.set_bottle_level(level, action, ctx))
    }

    /// "I drank down to here", as a percentage of the bottle.
    pub fn track(&mut self, percent: f64) -> MutationOutcome {
        self.set_bottle_level(percent / 100.0, Action::Track)
    }

    /// Move the level without an explicit commit, as a percentage of the bottle.
    pub fn adjust(&mut self, percent: f64) -> MutationOutcome {
        self.set_bottle_level(percent / 100.0, Action::Adjust)
    }

    pub fn add_extra(&mut self, ml: u32) -> MutationOutcome {
        self.mutate(true, |state, ctx| state.add_extra(ml, ctx))
    }

    pub fn undo(&mut self) -> MutationOutcome {
        self.mutate(false, |state, ctx| state.undo(ctx))
    }

    pub fn switch_bottle(&mut self, bottle_ml: u32) -> MutationOutcome {
        self.mutate(false, |state, ctx| state.switch_bottle(bottle_ml, ctx))
    }

    /// Commit `pending_percent` (the current level when `None`) and start a full bottle.
    pub fn refill(&mut self, pending_percent: Option<f64>) -> MutationOutcome {
        let pending = match pending_percent {
            Some(percent) => self.config.snap_mode().snap(percent / 100.0),
            None => self.state.remaining,
        };
        self.mutate(true, |state, ctx| state.refill(pending, ctx))
    }

    pub fn set_goal(&mut self, goal_ml: u32) -> MutationOutcome {
        self.mutate(false, |state, ctx| state.set_goal(goal_ml, ctx))
    }

    /// Run one mutation with the rollover check first and persistence and nudges after.
    fn mutate<F>(&mut self, logs_intake: bool, apply: F) -> MutationOutcome
    where
        F: FnOnce(&mut ConsumptionState, &DayContext) -> MutationOutcome,
    {
        let ctx = self.context();
        let rollover = self.state.ensure_current(&ctx);
        if let Some(report) = &rollover {
            self.report_rollover(report);
        }

        let before = self.state.raw_total_ml();
        let mut outcome = apply(&mut self.state, &ctx);
        outcome.rollover = outcome.rollover.or(rollover);

        if outcome.changed {
            // Acting on the day dismisses the morning prompt
            self.tokens.morning_reset = Some(self.morning_token(&ctx));
            if logs_intake && self.state.raw_total_ml() > before {
                self.record_log(ctx.now);
            }
        }
        if let Some(celebration) = &outcome.celebration {
            report_celebration(celebration);
        }

        self.persist();
        self.evaluate_nudges();
        outcome
    }

    /// A consumption log withdraws the pending early reminder.
    fn record_log(&mut self, at: NaiveDateTime) {
        self.tokens.last_log_at = Some(at);
        if self.pending.remove(NudgeKind::Early.id()).is_some() {
            self.cancel_notification(NudgeKind::Early.id());
            log_debug!("Early nudge withdrawn after a log");
        }
    }

    // Lifecycle

    /// The user opened the app: roll over if needed and remember the visit.
    pub fn on_foreground(&mut self) -> Option<RolloverReport> {
        let report = self.check_day();
        self.tokens.last_opened = Some(self.now());
        self.persist_tokens();
        self.evaluate_nudges();
        report
    }

    /// Going away: force a write of everything.
    pub fn on_background(&mut self) {
        self.cancel_estimate();
        self.persist();
    }

    /// Rollover check without marking a visit (resume, clock change, timer).
    pub fn check_day(&mut self) -> Option<RolloverReport> {
        let ctx = self.context();
        let report = self.state.ensure_current(&ctx);
        if let Some(report) = &report {
            self.report_rollover(report);
            self.persist_state();
        }
        self.schedule_rollover();
        report
    }

    /// Re-read state and tokens written by another process.
    ///
    /// Keeps the in-memory copy when the store cannot be read.
    pub fn reload(&mut self) {
        let defaults = ConsumptionState::new(self.config.goal(), self.config.bottle());
        match store::load_state(self.store.as_ref(), &defaults) {
            Ok(Some(state)) => self.state = state,
            Ok(None) => {}
            Err(e) => log_debug!("Keeping in-memory state, reload failed: {:#}", e),
        }
        let previous_log = self.tokens.last_log_at;
        self.tokens = NudgeTokens::load(self.store.as_ref());
        if let Some(logged) = self.tokens.last_log_at
            && previous_log.is_none_or(|previous| logged > previous)
        {
            self.record_log(logged);
        }
    }

    /// Timer work: rollover when due, deliver due notifications, re-evaluate nudges.
    pub fn tick(&mut self) {
        let now = self.now();
        if self.rollover_timer.is_due(now) {
            log_debug!("Rollover timer fired");
            self.check_day();
        }
        self.deliver_due();
        self.evaluate_nudges();
    }

    /// Hand every due notification to the service and record what was shown.
    pub fn deliver_due(&mut self) {
        let now = self.now();
        match self.notifier.dispatch_due(now) {
            Ok(delivered) => {
                for id in delivered {
                    self.record_delivery(&id, now);
                }
            }
            Err(e) => log_debug!("Notification delivery failed: {:#}", e),
        }
    }

    /// When the daemon should next call `tick`.
    pub fn next_deadline(&self) -> NaiveDateTime {
        let now = self.now();
        let recheck = now + chrono::Duration::seconds(NUDGE_RECHECK_INTERVAL_SECS as i64);
        [self.rollover_timer.due_at(), self.notifier.next_due()]
            .into_iter()
            .flatten()
            .fold(recheck, NaiveDateTime::min)
    }

    fn record_delivery(&mut self, id: &str, at: NaiveDateTime) {
        let today = self.context().today();
        let kind = [
            NudgeKind::MorningReset,
            NudgeKind::Early,
            NudgeKind::Late,
            NudgeKind::Praise,
        ]
        .into_iter()
        .find(|kind| kind.id() == id);
        let Some(kind) = kind else {
            return;
        };
        self.pending.remove(kind.id());

        match kind {
            NudgeKind::Early => {
                self.tokens.early = Some(today);
                self.tokens.early_fired_at = Some(at);
            }
            NudgeKind::Late => self.tokens.late = Some(today),
            // Praise is recorded when scheduled, the reset when acknowledged
            NudgeKind::Praise | NudgeKind::MorningReset => return,
        }
        log_debug!("Delivered {} notification", id);
        self.persist_tokens();
    }

    fn schedule_rollover(&mut self) {
        let now = self.now();
        let due = self.rollover_timer.schedule(now, self.config.window().wake());
        log_debug!("Next rollover at {}", due.format("%Y-%m-%d %H:%M:%S"));
    }

    /// Apply a reloaded configuration.
    pub fn apply_config(&mut self, config: Config) {
        let schedule_changed = self.config.schedule_changed(&config);
        let nudges_toggled = self.config.nudges_enabled() != config.nudges_enabled();
        self.config = config;

        if nudges_toggled && self.config.nudges_enabled() && !self.notifications_allowed {
            self.notifications_allowed = self.notifier.request_permission().unwrap_or(false);
        }

        self.sync_with_config();
        if schedule_changed {
            log_debug!("Schedule changed, recomputing the day boundary");
            self.check_day();
        }
        self.evaluate_nudges();
    }

    /// Carry goal and bottle changes from the config into the state.
    fn sync_with_config(&mut self) {
        if self.state.bottle_ml != self.config.bottle() {
            log_debug!(
                "Bottle changed from {} ml to {} ml",
                self.state.bottle_ml,
                self.config.bottle()
            );
            let bottle = self.config.bottle();
            let ctx = self.context();
            self.state.switch_bottle(bottle, &ctx);
        }
        if self.state.goal_ml != self.config.goal() {
            let goal = self.config.goal();
            let ctx = self.context();
            self.state.set_goal(goal, &ctx);
        }
        self.persist_state();
    }

    // Morning reset

    fn morning_token(&self, ctx: &DayContext) -> String {
        morning_reset_token(&ctx.today(), ctx.window.wake())
    }

    pub fn morning_reset_pending(&self) -> bool {
        nudge::morning_reset_due(&self.nudge_inputs(), &self.tokens)
    }

    /// Dismiss today's morning reset prompt. Returns false if there was nothing to dismiss.
    pub fn acknowledge_morning_reset(&mut self) -> bool {
        if !self.morning_reset_pending() {
            return false;
        }
        let ctx = self.context();
        if let Some(report) = self.state.ensure_current(&ctx) {
            self.report_rollover(&report);
        }
        self.tokens.morning_reset = Some(self.morning_token(&ctx));
        self.withdraw(NudgeKind::MorningReset);
        self.persist();
        true
    }

    // Nudges

    fn nudge_inputs(&self) -> NudgeInputs {
        let ctx = self.context();
        let today = ctx.today();
        // A stale snapshot means nothing has been drunk yet today
        let consumed_ml = if self.state.day_key == today {
            self.state.total_consumed()
        } else {
            0
        };
        NudgeInputs {
            now: ctx.now,
            window: ctx.window,
            today,
            goal_ml: self.state.goal_ml,
            bottle_ml: self.state.bottle_ml,
            consumed_ml,
        }
    }

    /// Decide every nudge again and sync the notification service.
    pub fn evaluate_nudges(&mut self) {
        if !self.config.nudges_enabled() || !self.notifications_allowed {
            for kind in [
                NudgeKind::MorningReset,
                NudgeKind::Early,
                NudgeKind::Late,
                NudgeKind::Praise,
            ] {
                self.withdraw(kind);
            }
            return;
        }

        let inputs = self.nudge_inputs();

        if nudge::morning_reset_due(&inputs, &self.tokens) {
            let token = morning_reset_token(&inputs.today, inputs.window.wake());
            if self.announced_morning.as_ref() != Some(&token)
                && let NudgeDecision::Schedule(prompt) =
                    nudge::morning_reset_prompt(&inputs, &self.tokens)
            {
                self.announced_morning = Some(token);
                self.schedule(prompt);
            }
        } else {
            self.withdraw(NudgeKind::MorningReset);
        }

        let early = nudge::early_nudge(&inputs, &self.tokens);
        self.apply_decision(NudgeKind::Early, early);
        let late = nudge::late_nudge(&inputs, &self.tokens);
        self.apply_decision(NudgeKind::Late, late);

        if let Some(praise) = nudge::praise(&inputs, &self.tokens) {
            self.tokens.praise = Some(inputs.today.clone());
            self.schedule(praise);
            self.persist_tokens();
        }
    }

    fn apply_decision(&mut self, kind: NudgeKind, decision: NudgeDecision) {
        match decision {
            NudgeDecision::Schedule(mut nudge) => {
                // Keep an earlier pending time instead of pushing it back
                let now = self.now();
                if let Some(previous) = self.pending.get(kind.id())
                    && *previous > now
                {
                    nudge.at = nudge.at.min(*previous);
                }
                self.schedule(nudge);
            }
            NudgeDecision::Withdraw => self.withdraw(kind),
        }
    }

    fn schedule(&mut self, nudge: ScheduledNudge) {
        let id = nudge.kind.id();
        match self
            .notifier
            .schedule(id, &nudge.title, &nudge.body, nudge.at)
        {
            Ok(()) => {
                if self.pending.insert(id, nudge.at) != Some(nudge.at) {
                    log_debug!("Scheduled {} for {}", id, nudge.at.format("%H:%M"));
                }
            }
            Err(e) => log_debug!("Failed to schedule {}: {:#}", id, e),
        }
    }

    fn withdraw(&mut self, kind: NudgeKind) {
        if self.pending.remove(kind.id()).is_some() {
            self.cancel_notification(kind.id());
        }
    }

    fn cancel_notification(&mut self, id: &str) {
        if let Err(e) = self.notifier.cancel(id) {
            log_debug!("Failed to cancel {}: {:#}", id, e);
        }
    }

    // Estimation

    /// Start a new estimation, aborting any earlier one.
    pub fn begin_estimate(&mut self) -> CancellationToken {
        self.cancel_estimate();
        let token = CancellationToken::new();
        self.estimate_token = Some(token.clone());
        token
    }

    pub fn cancel_estimate(&mut self) {
        if let Some(token) = self.estimate_token.take() {
            token.cancel();
        }
    }

    /// Apply an estimation result if `token` is still the live request.
    pub fn apply_estimate(&mut self, token: &CancellationToken, percent: f64) -> Option<MutationOutcome> {
        let current = self.estimate_token.as_ref()?;
        if !current.same_as(token) || token.is_cancelled() {
            log_debug!("Discarding superseded estimation result");
            return None;
        }
        self.estimate_token = None;
        Some(self.set_bottle_level(percent / 100.0, Action::Estimate))
    }

    /// Estimate the level from an image and apply it.
    pub fn estimate_with(
        &mut self,
        client: &EstimationClient,
        image_data_url: &str,
        token: &CancellationToken,
    ) -> Result<MutationOutcome, EstimateError> {
        let percent = client.estimate(image_data_url, token)?;
        self.apply_estimate(token, percent)
            .ok_or(EstimateError::Cancelled)
    }

    // Reporting

    pub fn rolling_score(&self) -> f64 {
        let today = self.context().today();
        let consumed_ml = if self.state.day_key == today {
            self.state.total_consumed()
        } else {
            0
        };
        rhythm::rolling_score(&self.state.daily_log, &today, consumed_ml, self.state.goal_ml)
    }

    pub fn status(&self) -> StatusReport {
        let ctx = self.context();
        let state = &self.state;
        let consumed_ml = state.total_consumed();
        let expected_ml = pacing::expected_volume(state.goal_ml, ctx.now, &ctx.window);
        let windows = state.today_windows();

        StatusReport {
            now: ctx.now,
            day_key: state.day_key.clone(),
            consumed_ml,
            goal_ml: state.goal_ml,
            percent: state.percent_of_goal(),
            bottle_ml: state.bottle_ml,
            completed_bottles: state.completed_bottles,
            remaining: state.remaining,
            carry_ml: state.carry_ml,
            extra_ml: state.extra_ml,
            expected_ml,
            pacing: pacing::pacing_status(consumed_ml, expected_ml, state.goal_ml),
            target_line: self.target_line.target_fill_fraction(
                expected_ml,
                state.credited_outside_bottle(),
                state.bottle_ml,
            ),
            next_rollover: self
                .rollover_timer
                .due_at()
                .unwrap_or_else(|| RolloverTimer::new().schedule(ctx.now, ctx.boundary_minutes())),
            windows,
            today_score: rhythm::day_score(&windows, consumed_ml, state.goal_ml),
            rolling_score: self.rolling_score(),
            morning_reset_pending: self.morning_reset_pending(),
            celebration: state.celebrate,
        }
    }

    // Persistence

    fn persist(&mut self) {
        self.persist_state();
        self.persist_tokens();
    }

    fn persist_state(&mut self) {
        if let Err(e) = store::save_state(self.store.as_mut(), &self.state) {
            log_debug!("Failed to persist state: {:#}", e);
        }
    }

    fn persist_tokens(&mut self) {
        if let Err(e) = self.tokens.save(self.store.as_mut()) {
            log_debug!("Failed to persist nudge tokens: {:#}", e);
        }
    }

    fn report_rollover(&self, report: &RolloverReport) {
        match &report.closed_day {
            Some(day) => {
                log_block_start!("Day {} closed at {} ml", day, report.consumed_ml);
                log_indented!("Tracking {}", report.today);
                if report.pruned > 0 {
                    log_indented!("Pruned {} old log entries", report.pruned);
                }
            }
            None => log_debug!("Started tracking {}", report.today),
        }
    }
}

fn report_celebration(celebration: &Celebration) {
    match celebration.kind {
        CelebrationKind::Goal => log_block_start!(
            "Goal reached: {} ml ({}%)",
            celebration.consumed_ml,
            celebration.percent
        ),
        CelebrationKind::Bottle => log_block_start!(
            "Bottle finished: {} ml so far ({}%)",
            celebration.consumed_ml,
            celebration.percent
        ),
    }
}
