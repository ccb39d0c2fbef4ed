use bigdecimal::{BigDecimal, Zero};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadingError {
    #[error("Got {old} old readings but {new} new readings")]
    CountMismatch { old: usize, new: usize },

    #[error("Register {register}: reading {value} is negative")]
    Negative { register: usize, value: BigDecimal },

    #[error("Register {register}: old reading {old} is greater than new reading {new}")]
    OldExceedsNew {
        register: usize,
        old: BigDecimal,
        new: BigDecimal,
    },

    #[error("Readings have not changed since the last bill")]
    Unchanged,
}

/// Meter register values at the previous and the current bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReading {
    pub old: BigDecimal,
    pub new: BigDecimal,
}

impl RegisterReading {
    pub fn delta(&self) -> BigDecimal {
        &self.new - &self.old
    }
}

/// Checked readings for every register of one meter.
#[derive(Debug, Clone)]
pub struct MeterReadings {
    registers: Vec<RegisterReading>,
}

impl MeterReadings {
    /// Pairs up old and new readings by register. An empty `old` means a fresh meter,
    /// with every register starting at zero.
    pub fn new(old: &[BigDecimal], new: &[BigDecimal]) -> Result<Self, ReadingError> {
        let zeros;
        let old: &[BigDecimal] = if old.is_empty() {
            zeros = vec![BigDecimal::zero(); new.len()];
            &zeros
        } else {
            old
        };
        if old.len() != new.len() {
            return Err(ReadingError::CountMismatch {
                old: old.len(),
                new: new.len(),
            });
        }

        let mut registers = Vec::with_capacity(new.len());
        for (register, (old, new)) in old.iter().zip(new).enumerate() {
            if let Some(value) = [old, new].into_iter().find(|v| **v < BigDecimal::zero()) {
                return Err(ReadingError::Negative {
                    register,
                    value: value.clone(),
                });
            }
            if old > new {
                return Err(ReadingError::OldExceedsNew {
                    register,
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            registers.push(RegisterReading {
                old: old.clone(),
                new: new.clone(),
            });
        }

        let readings = Self { registers };
        if readings.consumption().iter().all(Zero::is_zero) {
            return Err(ReadingError::Unchanged);
        }
        Ok(readings)
    }

    pub fn registers(&self) -> &[RegisterReading] {
        &self.registers
    }

    /// Consumption since the last bill, one value per register.
    pub fn consumption(&self) -> Vec<BigDecimal> {
        self.registers.iter().map(RegisterReading::delta).collect()
    }
}
