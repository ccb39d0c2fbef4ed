use crate::schedule::TariffSchedule;
use bigdecimal::{BigDecimal, Zero};
use thiserror::Error;
use tracing::debug;

/// Prices are quoted in minor currency units (cents, kopecks); charges are reported in major ones.
const MINOR_UNITS_PER_MAJOR: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TariffError {
    #[error("A tariff schedule needs at least two tiers, got {count}")]
    TooFewTiers { count: usize },

    #[error("More than one tier starts at {0}")]
    DuplicateBoundary(BigDecimal),

    #[error("Got {consumption} consumption values but {factors} register factors")]
    LengthMismatch { consumption: usize, factors: usize },
}

/// Consumption-weighted sum of the register factors, and the total consumption.
///
/// Their ratio is the blended factor. Returns `None` when nothing was consumed.
fn weighted_consumption(
    consumption: &[BigDecimal],
    factors: &[BigDecimal],
) -> Result<Option<(BigDecimal, BigDecimal)>, TariffError> {
    if consumption.len() != factors.len() {
        return Err(TariffError::LengthMismatch {
            consumption: consumption.len(),
            factors: factors.len(),
        });
    }
    let total: BigDecimal = consumption.iter().sum();
    if total.is_zero() {
        return Ok(None);
    }
    let weighted: BigDecimal = consumption
        .iter()
        .zip(factors)
        .map(|(amount, factor)| amount * factor)
        .sum();
    Ok(Some((weighted, total)))
}

/// Weights each register's factor by that register's share of the total consumption.
///
/// Returns `None` when nothing was consumed, since there is no share to weight by.
pub fn blended_factor(
    consumption: &[BigDecimal],
    factors: &[BigDecimal],
) -> Result<Option<BigDecimal>, TariffError> {
    Ok(weighted_consumption(consumption, factors)?.map(|(weighted, total)| weighted / total))
}

/// Total charge, in major currency units, for the given per-register consumption.
///
/// `consumption` and `factors` are indexed by register and must be the same length.
/// Zero total consumption is always free.
pub fn compute(
    consumption: &[BigDecimal],
    factors: &[BigDecimal],
    schedule: &TariffSchedule,
) -> Result<BigDecimal, TariffError> {
    let Some((weighted, total)) = weighted_consumption(consumption, factors)? else {
        return Ok(BigDecimal::zero());
    };
    let minor: BigDecimal = schedule
        .allocate(&total)
        .iter()
        .map(|allocation| &allocation.portion * &allocation.tier.price)
        .sum();
    debug!(%total, %weighted, %minor, "Priced consumption");
    // One division, last: register shares need not terminate.
    Ok(minor * weighted / (total * BigDecimal::from(MINOR_UNITS_PER_MAJOR)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn decs(values: &[&str]) -> Vec<BigDecimal> {
        values.iter().map(|value| dec(value)).collect()
    }

    fn schedule() -> TariffSchedule {
        TariffSchedule::new([
            (dec("0"), dec("7140")),
            (dec("100"), dec("12900")),
            (dec("600"), dec("16380")),
        ])
        .unwrap()
    }

    #[test]
    fn day_only_within_first_tier() {
        let charge = compute(&decs(&["50", "0"]), &decs(&["1", "0.5"]), &schedule()).unwrap();
        assert_eq!(charge, dec("3570"));
    }

    #[test]
    fn day_only_spills_into_second_tier() {
        let charge = compute(&decs(&["150", "0"]), &decs(&["1", "0.5"]), &schedule()).unwrap();
        assert_eq!(charge, dec("13590"));
    }

    #[test]
    fn night_only_spans_every_tier() {
        let charge = compute(&decs(&["0", "700"]), &decs(&["1", "0.5"]), &schedule()).unwrap();
        // (100 * 7140 + 500 * 12900 + 100 * 16380) * 0.5 / 100
        assert_eq!(charge, dec("44010"));
    }

    #[test]
    fn mixed_registers_use_weighted_factor() {
        // 60 day at 1 and 40 night at 0.5 blend to 0.8.
        let factor = blended_factor(&decs(&["60", "40"]), &decs(&["1", "0.5"])).unwrap();
        assert_eq!(factor, Some(dec("0.8")));

        let charge = compute(&decs(&["60", "40"]), &decs(&["1", "0.5"]), &schedule()).unwrap();
        assert_eq!(charge, dec("5712"));
    }

    #[test]
    fn uneven_register_split_stays_exact() {
        // A 1/3 share of the total does not terminate as a decimal; the charge does.
        let schedule = TariffSchedule::new([(dec("0"), dec("300")), (dec("100"), dec("400"))]).unwrap();
        let charge = compute(&decs(&["1", "2"]), &decs(&["1", "0.5"]), &schedule).unwrap();
        assert_eq!(charge, dec("6"));
    }

    #[test]
    fn zero_consumption_is_free() {
        let charge = compute(&decs(&["0", "0"]), &decs(&["1", "0.5"]), &schedule()).unwrap();
        assert_eq!(charge, BigDecimal::zero());
        assert_eq!(
            blended_factor(&decs(&["0", "0"]), &decs(&["3", "7"])).unwrap(),
            None
        );
    }

    #[test]
    fn single_register_keeps_its_own_factor() {
        for (consumption, expected) in [(["123.4", "0"], "1.7"), (["0", "5"], "0.25")] {
            let factor = blended_factor(&decs(&consumption), &decs(&["1.7", "0.25"])).unwrap();
            assert_eq!(factor, Some(dec(expected)));
        }
    }

    #[test]
    fn consumption_on_boundary_stays_in_lower_tier() {
        let charge = compute(&decs(&["100", "0"]), &decs(&["1", "1"]), &schedule()).unwrap();
        assert_eq!(charge, dec("7140"));

        let charge = compute(&decs(&["600", "0"]), &decs(&["1", "1"]), &schedule()).unwrap();
        assert_eq!(charge, dec("71640"));
    }

    #[test]
    fn charge_never_decreases_with_more_consumption() {
        let factors = decs(&["1", "0.5"]);
        for register in 0..2 {
            let mut previous = BigDecimal::zero();
            for step in 0..80 {
                let mut consumption = decs(&["30", "45"]);
                consumption[register] = BigDecimal::from(step * 10);
                let charge = compute(&consumption, &factors, &schedule()).unwrap();
                assert!(
                    charge >= previous,
                    "charge dropped from {previous} to {charge} at {consumption:?}"
                );
                previous = charge;
            }
        }
    }

    #[test]
    fn consumption_under_first_boundary_is_free() {
        let schedule = TariffSchedule::new([(dec("50"), dec("10")), (dec("100"), dec("20"))]).unwrap();
        let charge = compute(&decs(&["20", "10"]), &decs(&["1", "1"]), &schedule).unwrap();
        assert_eq!(charge, BigDecimal::zero());

        let charge = compute(&decs(&["60", "0"]), &decs(&["1", "1"]), &schedule).unwrap();
        assert_eq!(charge, dec("1"));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = compute(&decs(&["1", "2", "3"]), &decs(&["1", "0.5"]), &schedule()).unwrap_err();
        assert_eq!(
            err,
            TariffError::LengthMismatch {
                consumption: 3,
                factors: 2
            }
        );

        // Reported even when nothing was consumed.
        let err = compute(&decs(&["0"]), &decs(&["1", "0.5"]), &schedule()).unwrap_err();
        assert!(matches!(err, TariffError::LengthMismatch { .. }));
    }
}
