use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_config::SchedulingConfig;

use crate::models::{
    AvailabilityRule, BookedInterval, DoctorError, NewAvailabilityRule, Physician, Slot,
};

/// Turns weekly availability rules into the bookable slots of one date.
///
/// Pure: callers supply the physician, the rules, the intervals already held
/// by active appointments and "now". The appointment cell feeds it from the
/// booking ledger, so the same computation serves slot listing and the
/// re-check performed inside `reserve`.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    min_lead_time: Duration,
    offset: FixedOffset,
}

pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

impl AvailabilityResolver {
    pub fn new(config: &SchedulingConfig) -> Self {
        let seconds = config.clinic_utc_offset_minutes.clamp(-1439, 1439) * 60;
        let offset = FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix());
        Self {
            min_lead_time: Duration::minutes(config.min_lead_time_minutes.max(0)),
            offset,
        }
    }

    /// Instant of a physician-local date and clock time.
    pub fn local_instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        (local - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }

    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn compute_slots(
        &self,
        physician: &Physician,
        rules: &[AvailabilityRule],
        date: NaiveDate,
        booked: &[BookedInterval],
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DoctorError> {
        if !physician.accepts_new_patients {
            return Err(DoctorError::NotAcceptingPatients(physician.id));
        }

        let today = self.local_today(now);
        if date < today {
            return Err(DoctorError::InvalidDate(format!(
                "{} is in the past (today is {})",
                date, today
            )));
        }

        if physician.consultation_duration_minutes <= 0 {
            return Err(DoctorError::InvalidRule(format!(
                "physician {} has no consultation duration configured",
                physician.id
            )));
        }

        let weekday = day_of_week(date);
        let duration = Duration::minutes(physician.consultation_duration_minutes);
        let step = Duration::minutes(physician.slot_step_minutes());
        let earliest = now + self.min_lead_time;

        let mut slots = Vec::new();

        for rule in rules.iter().filter(|r| r.day_of_week == weekday) {
            let window_end = date.and_time(rule.end_time);
            let mut cursor = date.and_time(rule.start_time);

            // A slot may start up to the rule end and run past it.
            while cursor < window_end {
                let starts_at = self.local_instant(date, cursor.time());
                let ends_at = starts_at + duration;

                if starts_at >= earliest {
                    let available = !booked.iter().any(|b| b.overlaps(starts_at, ends_at));
                    slots.push(Slot {
                        time: cursor.time(),
                        end_time: (cursor + duration).time(),
                        starts_at,
                        available,
                    });
                }

                cursor += step;
            }
        }

        slots.sort_by_key(|slot| slot.starts_at);
        slots.dedup_by_key(|slot| slot.starts_at);

        debug!(
            "Computed {} slots for physician {} on {} ({} unavailable)",
            slots.len(),
            physician.id,
            date,
            slots.iter().filter(|s| !s.available).count()
        );

        Ok(slots)
    }
}

/// Validate a full replacement rule set and assign ids.
pub fn validate_rules(
    physician_id: Uuid,
    rules: Vec<NewAvailabilityRule>,
) -> Result<Vec<AvailabilityRule>, DoctorError> {
    let mut validated: Vec<AvailabilityRule> = Vec::with_capacity(rules.len());

    for rule in rules {
        if rule.day_of_week > 6 {
            return Err(DoctorError::InvalidRule(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if rule.start_time >= rule.end_time {
            return Err(DoctorError::InvalidRule(format!(
                "Start time {} must be before end time {}",
                rule.start_time, rule.end_time
            )));
        }

        let candidate = AvailabilityRule {
            id: Uuid::new_v4(),
            physician_id,
            day_of_week: rule.day_of_week,
            start_time: rule.start_time,
            end_time: rule.end_time,
        };

        if let Some(existing) = validated.iter().find(|r| r.overlaps(&candidate)) {
            return Err(DoctorError::InvalidRule(format!(
                "Rule {}-{} overlaps {}-{} on day {}",
                candidate.start_time,
                candidate.end_time,
                existing.start_time,
                existing.end_time,
                candidate.day_of_week
            )));
        }

        validated.push(candidate);
    }

    validated.sort_by_key(|r| (r.day_of_week, r.start_time));
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn physician() -> Physician {
        Physician {
            id: Uuid::new_v4(),
            display_name: "Dr. Tuesday".to_string(),
            consultation_duration_minutes: 30,
            buffer_minutes: 10,
            consultation_price_cents: None,
            accepts_new_patients: true,
        }
    }

    fn tuesday_rule(physician: &Physician) -> AvailabilityRule {
        AvailabilityRule {
            id: Uuid::new_v4(),
            physician_id: physician.id,
            day_of_week: 2,
            start_time: t(9, 0),
            end_time: t(12, 0),
        }
    }

    fn resolver() -> AvailabilityResolver {
        AvailabilityResolver::new(&SchedulingConfig {
            min_lead_time_minutes: 0,
            ..SchedulingConfig::default()
        })
    }

    // 2026-03-03 is a Tuesday.
    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    fn the_day_before() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn tuesday_morning_grid_with_buffer() {
        let p = physician();
        let slots = resolver()
            .compute_slots(&p, &[tuesday_rule(&p)], tuesday(), &[], the_day_before())
            .unwrap();

        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 40), t(10, 20), t(11, 0), t(11, 40)]);
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn booked_interval_marks_slot_unavailable_without_removing_it() {
        let p = physician();
        let r = resolver();
        let booked = BookedInterval {
            starts_at: r.local_instant(tuesday(), t(10, 20)),
            ends_at: r.local_instant(tuesday(), t(10, 50)),
        };

        let slots = r
            .compute_slots(&p, &[tuesday_rule(&p)], tuesday(), &[booked], the_day_before())
            .unwrap();

        assert_eq!(slots.len(), 5);
        let unavailable: Vec<NaiveTime> =
            slots.iter().filter(|s| !s.available).map(|s| s.time).collect();
        assert_eq!(unavailable, vec![t(10, 20)]);
    }

    #[test]
    fn last_slot_may_overrun_into_an_adjacent_rule() {
        let p = physician();
        let r = resolver();
        let noon_rule = AvailabilityRule {
            id: Uuid::new_v4(),
            physician_id: p.id,
            day_of_week: 2,
            start_time: t(12, 0),
            end_time: t(13, 0),
        };
        let rules = [tuesday_rule(&p), noon_rule];

        let slots = r
            .compute_slots(&p, &rules, tuesday(), &[], the_day_before())
            .unwrap();
        let last_morning = slots.iter().find(|s| s.time == t(11, 40)).unwrap();
        assert_eq!(last_morning.end_time, t(12, 10));
        assert!(slots.iter().any(|s| s.time == t(12, 0) && s.available));

        // Holding the overrunning slot blocks the one it overlaps.
        let booked = BookedInterval {
            starts_at: last_morning.starts_at,
            ends_at: last_morning.starts_at + Duration::minutes(30),
        };
        let slots = r
            .compute_slots(&p, &rules, tuesday(), &[booked], the_day_before())
            .unwrap();
        let noon = slots.iter().find(|s| s.time == t(12, 0)).unwrap();
        assert!(!noon.available);
        assert!(slots.iter().any(|s| s.time == t(12, 40) && s.available));
    }

    #[test]
    fn other_weekdays_yield_nothing() {
        let p = physician();
        let wednesday = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let slots = resolver()
            .compute_slots(&p, &[tuesday_rule(&p)], wednesday, &[], the_day_before())
            .unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn past_dates_are_rejected() {
        let p = physician();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        assert_matches!(
            resolver().compute_slots(&p, &[tuesday_rule(&p)], tuesday(), &[], now),
            Err(DoctorError::InvalidDate(_))
        );
    }

    #[test]
    fn today_respects_minimum_lead_time() {
        let p = physician();
        let r = AvailabilityResolver::new(&SchedulingConfig {
            min_lead_time_minutes: 30,
            ..SchedulingConfig::default()
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 9, 50, 0).unwrap();

        let slots = r
            .compute_slots(&p, &[tuesday_rule(&p)], tuesday(), &[], now)
            .unwrap();
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(10, 20), t(11, 0), t(11, 40)]);
    }

    #[test]
    fn physician_not_accepting_patients_is_not_found() {
        let mut p = physician();
        p.accepts_new_patients = false;
        assert_matches!(
            resolver().compute_slots(&p, &[], tuesday(), &[], the_day_before()),
            Err(DoctorError::NotAcceptingPatients(_))
        );
    }

    #[test]
    fn clinic_offset_shifts_instants_not_clock_times() {
        let p = physician();
        let r = AvailabilityResolver::new(&SchedulingConfig {
            min_lead_time_minutes: 0,
            clinic_utc_offset_minutes: -180,
            ..SchedulingConfig::default()
        });
        let slots = r
            .compute_slots(&p, &[tuesday_rule(&p)], tuesday(), &[], the_day_before())
            .unwrap();
        assert_eq!(slots[0].time, t(9, 0));
        assert_eq!(slots[0].starts_at, Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn overlapping_rules_on_same_day_are_rejected() {
        let id = Uuid::new_v4();
        let rules = vec![
            NewAvailabilityRule { day_of_week: 2, start_time: t(9, 0), end_time: t(12, 0) },
            NewAvailabilityRule { day_of_week: 2, start_time: t(11, 0), end_time: t(13, 0) },
        ];
        assert_matches!(validate_rules(id, rules), Err(DoctorError::InvalidRule(_)));
    }

    #[test]
    fn same_window_on_different_days_is_fine() {
        let id = Uuid::new_v4();
        let rules = vec![
            NewAvailabilityRule { day_of_week: 4, start_time: t(9, 0), end_time: t(12, 0) },
            NewAvailabilityRule { day_of_week: 2, start_time: t(9, 0), end_time: t(12, 0) },
        ];
        let validated = validate_rules(id, rules).unwrap();
        assert_eq!(validated[0].day_of_week, 2);
        assert!(validated.iter().all(|r| r.physician_id == id));
    }

    #[test]
    fn inverted_and_out_of_range_rules_are_rejected() {
        let id = Uuid::new_v4();
        assert_matches!(
            validate_rules(id, vec![NewAvailabilityRule { day_of_week: 1, start_time: t(12, 0), end_time: t(9, 0) }]),
            Err(DoctorError::InvalidRule(_))
        );
        assert_matches!(
            validate_rules(id, vec![NewAvailabilityRule { day_of_week: 7, start_time: t(9, 0), end_time: t(10, 0) }]),
            Err(DoctorError::InvalidRule(_))
        );
    }
}
