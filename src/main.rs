use anyhow::{Context, Result};
use bigdecimal::{BigDecimal, RoundingMode};
use clap::{Args, Parser};
use std::path::PathBuf;
use std::str::FromStr;
use tiered_tariff::{MeterReadings, TariffSchedule, tariff};
use tracing_subscriber::EnvFilter;

/// Bill for a meter with several registers (day and night, usually) under a tiered tariff.
/// Each register's consumption is weighted by its factor, and the total is billed
/// progressively: the first units at the lowest tier's price, the rest at higher ones.
#[derive(Parser, Debug)]
#[command(version, long_about)]
struct TieredTariff {
    /// Current register readings, comma separated, e.g. `1350,400`.
    #[arg(long, value_delimiter = ',', required = true)]
    new: Vec<BigDecimal>,
    /// Register readings from the previous bill, in the same order as `--new`.
    /// Defaults to zero for every register.
    #[arg(long, value_delimiter = ',')]
    old: Vec<BigDecimal>,
    /// Cost factor of each register, in the same order as `--new`.
    #[arg(long, value_delimiter = ',', default_value = "1,0.5")]
    factors: Vec<BigDecimal>,
    #[command(flatten)]
    schedule: ScheduleSource,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct ScheduleSource {
    /// CSV file with a `BOUNDARY,PRICE` header and one tier per row.
    /// Prices are in minor currency units per unit consumed.
    #[arg(long)]
    schedule_csv: Option<PathBuf>,
    /// A tier of the tariff, as its lower boundary and price in minor currency units.
    /// Repeat for every tier. Without this or `--schedule-csv`, the built-in
    /// residential tariff is used (71.4 up to 100, 129 up to 600, 163.8 beyond).
    #[arg(long = "tier", value_name = "BOUNDARY=PRICE", value_parser = parse_tier)]
    tiers: Vec<(BigDecimal, BigDecimal)>,
}

impl ScheduleSource {
    fn load(&self) -> Result<TariffSchedule> {
        if let Some(path) = &self.schedule_csv {
            TariffSchedule::from_csv_path(path)
                .with_context(|| format!("Failed to load tariff schedule from {}", path.display()))
        } else if !self.tiers.is_empty() {
            Ok(TariffSchedule::new(self.tiers.iter().cloned())?)
        } else {
            Ok(TariffSchedule::default())
        }
    }
}

fn parse_tier(arg: &str) -> Result<(BigDecimal, BigDecimal), String> {
    let (boundary, price) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected BOUNDARY=PRICE, got `{arg}`"))?;
    let parse = |value: &str| {
        BigDecimal::from_str(value.trim()).map_err(|err| format!("invalid number `{value}`: {err}"))
    };
    Ok((parse(boundary)?, parse(price)?))
}

fn format_charge(charge: &BigDecimal) -> String {
    format!("{:.2}", charge.with_scale_round(2, RoundingMode::HalfUp))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = TieredTariff::parse();

    let readings = MeterReadings::new(&args.old, &args.new)?;
    let consumption = readings.consumption();
    let schedule = args.schedule.load()?;
    eprintln!(
        "Using {} tiers starting at {}",
        schedule.tiers().len(),
        schedule.lowest_boundary()
    );
    for (register, amount) in consumption.iter().enumerate() {
        eprintln!("Register {register} consumed {amount}");
    }
    let total: BigDecimal = consumption.iter().sum();
    eprintln!("Total consumed: {total}");

    let charge = tariff::compute(&consumption, &args.factors, &schedule)?;
    println!("{}", format_charge(&charge));
    Ok(())
}
