//! `ack`: dismiss today's morning reset prompt.

use crate::session::HydrationSession;

pub fn handle_ack(session: &mut HydrationSession) {
    log_version!();
    if session.acknowledge_morning_reset() {
        let state = session.state();
        log_block_start!("Good morning, tracking {}", state.day_key);
        log_indented!(
            "Goal {} ml with a {} ml bottle",
            state.goal_ml,
            state.bottle_ml
        );
    } else {
        log_block_start!("Nothing to acknowledge");
    }
}
