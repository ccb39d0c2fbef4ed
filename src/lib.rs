//! Charges for metered utility consumption under a progressive, tiered tariff.
//!
//! Consumption is read from several registers (typically "day" and "night"), each
//! with its own cost factor. The factors are blended by each register's share of
//! the total, and the total is then billed tier by tier against a
//! [`TariffSchedule`](schedule::TariffSchedule).

pub mod readings;
pub mod schedule;
pub mod tariff;

pub use readings::{MeterReadings, ReadingError, RegisterReading};
pub use schedule::{ScheduleFileError, TariffSchedule, Tier, TierAllocation};
pub use tariff::{TariffError, blended_factor, compute};
