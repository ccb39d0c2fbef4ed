use crate::tariff::TariffError;
use bigdecimal::{BigDecimal, Zero};
use csv::StringRecord;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// One priced band of consumption, `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub lower: BigDecimal,
    /// `None` for the top tier, which takes everything above its lower bound.
    pub upper: Option<BigDecimal>,
    /// Price per unit of consumption, in minor currency units.
    pub price: BigDecimal,
}

impl Tier {
    pub fn width(&self) -> Option<BigDecimal> {
        self.upper.as_ref().map(|upper| upper - &self.lower)
    }
}

/// The part of a consumption total billed within a single tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierAllocation<'a> {
    pub tier: &'a Tier,
    pub portion: BigDecimal,
}

/// A progressive price schedule, normalized into ascending, non-overlapping tiers.
///
/// Each boundary starts a tier priced at that boundary's price, running up to the next
/// boundary. The highest boundary starts an unbounded tier. Consumption below the
/// lowest boundary is not billed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffSchedule {
    tiers: Vec<Tier>,
}

impl TariffSchedule {
    /// Builds a schedule from `(boundary, price)` pairs given in any order.
    pub fn new(
        entries: impl IntoIterator<Item = (BigDecimal, BigDecimal)>,
    ) -> Result<Self, TariffError> {
        let mut entries: Vec<_> = entries.into_iter().collect();
        if entries.len() < 2 {
            return Err(TariffError::TooFewTiers {
                count: entries.len(),
            });
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(TariffError::DuplicateBoundary(pair[0].0.clone()));
        }
        Ok(Self::from_sorted(entries))
    }

    fn from_sorted(entries: Vec<(BigDecimal, BigDecimal)>) -> Self {
        let uppers: Vec<_> = entries
            .iter()
            .skip(1)
            .map(|(boundary, _)| Some(boundary.clone()))
            .chain(std::iter::once(None))
            .collect();
        let tiers = entries
            .into_iter()
            .zip(uppers)
            .map(|((lower, price), upper)| Tier {
                lower,
                upper,
                price,
            })
            .collect();
        Self { tiers }
    }

    /// Reads a schedule from CSV with a `BOUNDARY,PRICE` header and one tier per row.
    pub fn from_csv(reader: impl Read) -> Result<Self, ScheduleFileError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        if headers != *EXPECTED_HEADERS {
            return Err(ScheduleFileError::Headers {
                found: headers,
                expected: EXPECTED_HEADERS.clone(),
            });
        }
        let entries = csv_reader
            .into_records()
            .map(|r| -> Result<_, ScheduleFileError> {
                let record = r?;
                let line = record.position().map_or(0, |pos| pos.line());
                Ok((
                    parse_field(&record, 0, "boundary", line)?,
                    parse_field(&record, 1, "price", line)?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries)?)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, ScheduleFileError> {
        Self::from_csv(std::fs::File::open(path)?)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Consumption up to this amount is free.
    pub fn lowest_boundary(&self) -> &BigDecimal {
        &self.tiers[0].lower
    }

    /// Splits `total` consumption across the tiers, lowest first.
    ///
    /// Only tiers that receive a positive portion are returned. The portions add up to
    /// whatever of `total` lies above the lowest boundary.
    pub fn allocate(&self, total: &BigDecimal) -> Vec<TierAllocation<'_>> {
        let billable = total - self.lowest_boundary();
        if billable < BigDecimal::zero() {
            warn!(
                %total,
                floor = %self.lowest_boundary(),
                "Lowest tier boundary is above the whole consumption"
            );
            return Vec::new();
        }
        if billable.is_zero() {
            return Vec::new();
        }
        let (ControlFlow::Continue((_, allocations)) | ControlFlow::Break((_, allocations))) =
            self.tiers
                .iter()
                .try_fold((billable, Vec::new()), |(remaining, mut allocations), tier| {
                    let portion = match tier.width() {
                        Some(width) => remaining.clone().min(width),
                        None => remaining.clone(),
                    };
                    let remaining = remaining - &portion;
                    debug!(lower = %tier.lower, price = %tier.price, %portion, "Allocated tier");
                    allocations.push(TierAllocation { tier, portion });
                    if remaining <= BigDecimal::zero() {
                        ControlFlow::Break((remaining, allocations))
                    } else {
                        ControlFlow::Continue((remaining, allocations))
                    }
                });
        allocations
    }
}

impl Default for TariffSchedule {
    /// Residential tariff: 71.4 up to 100 units, 129 up to 600, 163.8 beyond.
    fn default() -> Self {
        Self::from_sorted(vec![
            (BigDecimal::from(0), BigDecimal::new(714.into(), 1)),
            (BigDecimal::from(100), BigDecimal::from(129)),
            (BigDecimal::from(600), BigDecimal::new(1638.into(), 1)),
        ])
    }
}

#[derive(Debug, Error)]
pub enum ScheduleFileError {
    #[error("Could not read tariff schedule: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not open tariff schedule: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected headers in tariff schedule: {found:?}. Expected: {expected:?}")]
    Headers {
        found: StringRecord,
        expected: StringRecord,
    },

    #[error("Line {line}: invalid {column} {value:?}")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error(transparent)]
    Schedule(#[from] TariffError),
}

static EXPECTED_HEADERS: LazyLock<StringRecord> =
    LazyLock::new(|| StringRecord::from(vec!["BOUNDARY", "PRICE"]));

fn parse_field(
    record: &StringRecord,
    index: usize,
    column: &'static str,
    line: u64,
) -> Result<BigDecimal, ScheduleFileError> {
    let value = record.get(index).unwrap_or_default();
    BigDecimal::from_str(value).map_err(|_| ScheduleFileError::InvalidNumber {
        line,
        column,
        value: value.to_string(),
    })
}
