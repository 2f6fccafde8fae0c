use chrono::Duration;

use super::super::domain::{InterviewId, Timestamp, UserId};
use super::domain::{Interview, TimeWindow};

/// An interviewer is already booked during the requested window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interviewer {interviewer} is unavailable at that time (interview {interview_id} booked {window})")]
pub struct SchedulingConflict {
    pub interviewer: UserId,
    pub interview_id: InterviewId,
    pub window: TimeWindow,
}

/// Check a candidate window against interviews already holding any of `interviewers`.
///
/// `exclude` skips the interview being rescheduled. The earliest clashing booking is reported.
pub fn detect_conflict(
    existing: &[Interview],
    candidate: &TimeWindow,
    interviewers: &[UserId],
    exclude: Option<InterviewId>,
) -> Result<(), SchedulingConflict> {
    let mut clash: Option<(&Interview, UserId)> = None;

    for interview in existing {
        if Some(interview.id) == exclude || !interview.status.occupies_time() {
            continue;
        }
        let Some(interviewer) = interview.shares_interviewer(interviewers) else {
            continue;
        };
        if !interview.window().overlaps(candidate) {
            continue;
        }
        let earlier = clash
            .map(|(current, _)| interview.scheduled_at < current.scheduled_at)
            .unwrap_or(true);
        if earlier {
            clash = Some((interview, interviewer));
        }
    }

    match clash {
        Some((interview, interviewer)) => Err(SchedulingConflict {
            interviewer,
            interview_id: interview.id,
            window: interview.window(),
        }),
        None => Ok(()),
    }
}

/// Free slots of `slot_minutes` between `day_start` and `day_end`, stepping past busy windows.
pub fn free_slots(
    busy: &[TimeWindow],
    day_start: Timestamp,
    day_end: Timestamp,
    slot_minutes: u32,
) -> Vec<TimeWindow> {
    let mut slots = Vec::new();
    if slot_minutes == 0 {
        return slots;
    }

    let mut busy: Vec<TimeWindow> = busy.to_vec();
    busy.sort_by_key(|window| window.start);

    let step = Duration::minutes(i64::from(slot_minutes));
    let mut cursor = day_start;
    while cursor + step <= day_end {
        let slot = TimeWindow::new(cursor, slot_minutes);
        match busy.iter().find(|window| window.overlaps(&slot)) {
            Some(blocking) => cursor = blocking.end.max(cursor + Duration::minutes(1)),
            None => {
                slots.push(slot);
                cursor = slot.end;
            }
        }
    }

    slots
}
