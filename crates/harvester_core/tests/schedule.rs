use harvester_core::{FallbackSchedule, ScheduleError};

#[test]
fn default_schedule_is_whole_region_then_nine() {
    assert_eq!(FallbackSchedule::default().factors(), &[1, 9]);
}

#[test]
fn accepts_increasing_square_factors() {
    let schedule = FallbackSchedule::new(vec![1, 4, 9, 16]).unwrap();
    assert_eq!(schedule.len(), 4);
}

#[test]
fn rejects_invalid_schedules() {
    assert_eq!(FallbackSchedule::new(vec![]), Err(ScheduleError::Empty));
    assert_eq!(
        FallbackSchedule::new(vec![1, 6]),
        Err(ScheduleError::NotSquare(6))
    );
    assert_eq!(
        FallbackSchedule::new(vec![9, 4]),
        Err(ScheduleError::NotIncreasing {
            previous: 9,
            next: 4
        })
    );
}
