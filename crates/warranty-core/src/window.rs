//! Warranty window arithmetic.

use chrono::{Datelike, NaiveDate};

use crate::model::WarrantyYears;

/// End date recorded for lifetime coverage.
pub fn lifetime_end() -> NaiveDate {
  NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Start and end of coverage, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarrantyWindow {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl WarrantyWindow {
  /// Coverage beginning on `start` for `years`.
  ///
  /// Year arithmetic is calendar based; a start of Feb 29 lands on Mar 1 in
  /// a non-leap end year.
  pub fn compute(start: NaiveDate, years: WarrantyYears) -> Self {
    let end = match years {
      WarrantyYears::Lifetime => lifetime_end(),
      WarrantyYears::None | WarrantyYears::Years(0) => start,
      WarrantyYears::Years(n) => add_years(start, n),
    };
    Self { start, end }
  }
}

fn add_years(start: NaiveDate, n: u16) -> NaiveDate {
  let year = start.year() + i32::from(n);
  NaiveDate::from_ymd_opt(year, start.month(), start.day())
    .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
    .unwrap_or_else(lifetime_end)
}

/// Combine the coverage of two implanted products.
///
/// No warranty on either side means none overall. Lifetime only survives
/// when both sides are lifetime; otherwise the shorter finite term wins.
pub fn reconcile(
  primary: WarrantyYears,
  secondary: Option<WarrantyYears>,
) -> WarrantyYears {
  let Some(secondary) = secondary else {
    return primary;
  };
  match (primary, secondary) {
    (a, b) if a.is_zero() || b.is_zero() => WarrantyYears::None,
    (WarrantyYears::Lifetime, other) | (other, WarrantyYears::Lifetime) => other,
    (WarrantyYears::Years(a), WarrantyYears::Years(b)) => {
      WarrantyYears::Years(a.min(b))
    }
    _ => WarrantyYears::None,
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn five_years_from_new_year() {
    let w = WarrantyWindow::compute(date(2024, 1, 1), WarrantyYears::Years(5));
    assert_eq!(w.end, date(2029, 1, 1));
  }

  #[test]
  fn zero_years_ends_on_start() {
    let w = WarrantyWindow::compute(date(2024, 3, 10), WarrantyYears::None);
    assert_eq!(w.start, w.end);
  }

  #[test]
  fn lifetime_uses_sentinel() {
    let w = WarrantyWindow::compute(date(2024, 3, 10), WarrantyYears::Lifetime);
    assert_eq!(w.end, date(9999, 12, 31));
  }

  #[test]
  fn leap_day_rolls_to_march_first() {
    let w = WarrantyWindow::compute(date(2024, 2, 29), WarrantyYears::Years(1));
    assert_eq!(w.end, date(2025, 3, 1));
    let w = WarrantyWindow::compute(date(2024, 2, 29), WarrantyYears::Years(4));
    assert_eq!(w.end, date(2028, 2, 29));
  }

  #[test]
  fn reconcile_cases() {
    use WarrantyYears::{Lifetime, Years};
    let none = WarrantyYears::None;
    assert_eq!(reconcile(Years(5), Option::None), Years(5));
    assert_eq!(reconcile(Years(5), Some(Lifetime)), Years(5));
    assert_eq!(reconcile(Lifetime, Some(Years(7))), Years(7));
    assert_eq!(reconcile(none, Some(Years(5))), none);
    assert_eq!(reconcile(Lifetime, Some(none)), none);
    assert_eq!(reconcile(Lifetime, Some(Lifetime)), Lifetime);
    assert_eq!(reconcile(Years(10), Some(Years(3))), Years(3));
  }

  fn years() -> impl Strategy<Value = WarrantyYears> {
    prop_oneof![
      Just(WarrantyYears::None),
      Just(WarrantyYears::Lifetime),
      (1u16..=50).prop_map(WarrantyYears::Years),
    ]
  }

  proptest! {
    #[test]
    fn reconcile_is_symmetric(a in years(), b in years()) {
      prop_assert_eq!(reconcile(a, Some(b)), reconcile(b, Some(a)));
    }

    #[test]
    fn reconciled_window_never_outlasts_either(a in years(), b in years()) {
      let start = date(2024, 5, 17);
      let both = WarrantyWindow::compute(start, reconcile(a, Some(b)));
      prop_assert!(both.end <= WarrantyWindow::compute(start, a).end);
      prop_assert!(both.end <= WarrantyWindow::compute(start, b).end);
    }
  }
}
