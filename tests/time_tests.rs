use std::time::Duration;

use anticipation::Timespec;

fn samples() -> Vec<Timespec> {
    vec![
        Timespec::ZERO,
        Timespec::new(0, 1),
        Timespec::new(0, 999_999_999),
        Timespec::new(1, 500_000_000),
        Timespec::new(2, 900_000_000),
        Timespec::new(-3, 250_000_000),
        Timespec::new(1_000_000, 0),
    ]
}

#[test]
fn subtract_undoes_add() {
    for x in samples() {
        for y in samples() {
            let (sum, _) = x.add(&y);
            let (back, _) = sum.subtract(&y);
            assert_eq!(back, x, "({x:?} + {y:?}) - {y:?}");
            assert!((0..1_000_000_000).contains(&back.nsec()));
        }
    }
}

#[test]
fn add_carries_nanoseconds() {
    let (sum, negative) = Timespec::new(0, 900_000_000).add(&Timespec::new(0, 200_000_000));
    assert_eq!(sum, Timespec::new(1, 100_000_000));
    assert_eq!(sum.sec(), 1);
    assert_eq!(sum.nsec(), 100_000_000);
    assert!(!negative);
}

#[test]
fn add_carries_an_exact_second() {
    let (sum, negative) = Timespec::new(0, 500_000_000).add(&Timespec::new(0, 500_000_000));
    assert_eq!(sum.sec(), 1);
    assert_eq!(sum.nsec(), 0);
    assert!(!negative);
}

#[test]
fn add_reports_overflow_as_negative() {
    let (sum, negative) = Timespec::new(i64::MAX, 0).add(&Timespec::new(1, 0));
    assert!(negative);
    assert!(sum.is_negative());

    let (sum, negative) =
        Timespec::new(i64::MAX, 600_000_000).add(&Timespec::new(0, 600_000_000));
    assert!(negative);
    assert_eq!(sum.sec(), i64::MIN);
    assert_eq!(sum.nsec(), 200_000_000);
}

#[test]
fn subtract_larger_operand_is_negative() {
    let (diff, negative) = Timespec::new(5, 0).subtract(&Timespec::new(6, 0));
    assert!(negative);
    assert_eq!(diff.sec(), -1);
    assert_eq!(diff.nsec(), 0);
}

#[test]
fn subtract_borrows_a_second() {
    let (diff, negative) = Timespec::new(3, 100_000_000).subtract(&Timespec::new(1, 600_000_000));
    assert!(!negative);
    assert_eq!(diff, Timespec::new(1, 500_000_000));
}

#[test]
fn to_millis_truncates() {
    assert_eq!(Timespec::new(1, 500_000_000).to_millis(), 1500);
    assert_eq!(Timespec::new(0, 1_999_999).to_millis(), 1);
    assert_eq!(Timespec::new(0, 999_999).to_millis(), 0);
    assert_eq!(Timespec::new(-1, 500_000_000).to_millis(), -500);
}

#[test]
fn to_millis_is_monotonic() {
    let mut values = samples();
    values.push(Timespec::new(-1, 999_999_999));
    values.push(Timespec::new(0, 1_000_000));
    values.sort();

    for pair in values.windows(2) {
        assert!(
            pair[0].to_millis() <= pair[1].to_millis(),
            "{:?} then {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn new_normalizes_out_of_range_nanoseconds() {
    assert_eq!(Timespec::new(1, -1), Timespec::new(0, 999_999_999));
    let t = Timespec::new(0, 2_500_000_000);
    assert_eq!((t.sec(), t.nsec()), (2, 500_000_000));
}

#[test]
fn conversions_from_milliseconds_and_duration() {
    assert_eq!(Timespec::from_millis(1500), Timespec::new(1, 500_000_000));
    assert_eq!(Timespec::from_millis(-1).to_millis(), -1);
    assert_eq!(
        Timespec::from(Duration::from_millis(2250)),
        Timespec::new(2, 250_000_000)
    );
}

#[test]
fn monotonic_clock_does_not_go_backwards() {
    let a = Timespec::now().expect("clock_gettime");
    let b = Timespec::now().expect("clock_gettime");
    let (_, negative) = b.subtract(&a);
    assert!(!negative);
}
