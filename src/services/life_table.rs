//! Illustrative period life table and portfolio impact.
//!
//! A deterministic stand-in for an actuarial model: a Gompertz-style
//! baseline mortality curve, scaled up per emissions scenario and damped
//! by the adaptation level. The numbers are for demonstration only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::{f64_to_money, round_dp};

pub const MAX_AGE: u32 = 100;
pub const RADIX: f64 = 100_000.0;
/// Collapsed view shows every n-th age.
pub const COLLAPSED_STEP: u32 = 10;
pub const DEFAULT_PORTFOLIO_SIZE: f64 = 10_000_000.0;
pub const DEFAULT_ANNUITY_SHARE: u8 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Scenario {
    #[serde(rename = "rcp26")]
    Rcp26,
    #[default]
    #[serde(rename = "rcp45")]
    Rcp45,
    #[serde(rename = "rcp85")]
    Rcp85,
}

impl Scenario {
    /// Excess-mortality factor applied on top of the baseline.
    pub fn excess_factor(self) -> f64 {
        match self {
            Scenario::Rcp26 => 0.01,
            Scenario::Rcp45 => 0.03,
            Scenario::Rcp85 => 0.06,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Rcp26 => "RCP 2.6",
            Scenario::Rcp45 => "RCP 4.5",
            Scenario::Rcp85 => "RCP 8.5",
        }
    }
}

pub fn baseline_q(age: u32) -> f64 {
    (0.0005 + 0.15 * (0.1 * (age as f64 - 90.0)).exp()).min(1.0)
}

/// Older ages are more heat-sensitive.
fn age_weight(age: u32) -> f64 {
    match age {
        0..=64 => 0.5,
        65..=84 => 1.0,
        _ => 1.5,
    }
}

pub fn adjusted_q(age: u32, scenario: Scenario, adaptation: f64) -> f64 {
    let a = adaptation.clamp(0.0, 1.0);
    (baseline_q(age) * (1.0 + scenario.excess_factor() * (1.0 - a) * age_weight(age))).min(1.0)
}

/// One column (q, l, e) of the table at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawEntry {
    q: f64,
    l: f64,
    e: f64,
}

fn build_column(q_of: impl Fn(u32) -> f64) -> Vec<RawEntry> {
    let qs: Vec<f64> = (0..=MAX_AGE).map(&q_of).collect();

    let mut ls = Vec::with_capacity(qs.len());
    let mut l = RADIX;
    for q in &qs {
        ls.push(l);
        l *= 1.0 - q;
    }

    // Person-years lived in each interval, deaths at mid-year.
    let person_years: Vec<f64> = qs.iter().zip(&ls).map(|(q, l)| l * (1.0 - q / 2.0)).collect();

    let mut entries = vec![RawEntry { q: 0.0, l: 0.0, e: 0.0 }; qs.len()];
    let mut t = 0.0;
    for i in (0..qs.len()).rev() {
        t += person_years[i];
        entries[i] = RawEntry {
            q: qs[i],
            l: ls[i],
            e: if ls[i] > 0.0 { t / ls[i] } else { 0.0 },
        };
    }
    entries
}

/// How an adjusted cell compares to its baseline after display rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CellTrend {
    Same,
    Better,
    Worse,
}

fn trend(adjusted: f64, baseline: f64, higher_is_worse: bool) -> CellTrend {
    if adjusted == baseline {
        CellTrend::Same
    } else if (adjusted > baseline) == higher_is_worse {
        CellTrend::Worse
    } else {
        CellTrend::Better
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct LifeTableCell {
    /// Death probability, 5 decimals
    pub q: f64,
    /// Survivors
    pub l: u64,
    /// Life expectancy in years, 2 decimals
    pub e: f64,
}

impl From<RawEntry> for LifeTableCell {
    fn from(raw: RawEntry) -> Self {
        Self {
            q: round_dp(raw.q, 5),
            l: raw.l.round() as u64,
            e: round_dp(raw.e, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LifeTableRow {
    pub age: u32,
    pub baseline: LifeTableCell,
    pub adjusted: LifeTableCell,
    pub q_trend: CellTrend,
    pub l_trend: CellTrend,
    pub e_trend: CellTrend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifeTable {
    pub scenario: Scenario,
    pub adaptation: f64,
    baseline: Vec<RawEntry>,
    adjusted: Vec<RawEntry>,
}

impl LifeTable {
    pub fn generate(scenario: Scenario, adaptation: f64) -> Self {
        let adaptation = adaptation.clamp(0.0, 1.0);
        Self {
            scenario,
            adaptation,
            baseline: build_column(baseline_q),
            adjusted: build_column(|age| adjusted_q(age, scenario, adaptation)),
        }
    }

    pub fn e0_baseline(&self) -> f64 {
        self.baseline[0].e
    }

    pub fn e0_adjusted(&self) -> f64 {
        self.adjusted[0].e
    }

    /// All 101 rows when expanded, every tenth age otherwise.
    pub fn rows(&self, expanded: bool) -> Vec<LifeTableRow> {
        self.baseline
            .iter()
            .zip(&self.adjusted)
            .enumerate()
            .filter(|(age, _)| expanded || *age as u32 % COLLAPSED_STEP == 0)
            .map(|(age, (base, adj))| {
                let baseline = LifeTableCell::from(*base);
                let adjusted = LifeTableCell::from(*adj);
                LifeTableRow {
                    age: age as u32,
                    q_trend: trend(adjusted.q, baseline.q, true),
                    l_trend: trend(adjusted.l as f64, baseline.l as f64, false),
                    e_trend: trend(adjusted.e, baseline.e, false),
                    baseline,
                    adjusted,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FinancialImpact {
    #[schema(value_type = String)]
    pub portfolio_size: Decimal,
    pub annuity_share: u8,
    pub life_insurance_share: u8,
    /// e0 (adjusted) minus e0 (baseline), years
    pub e0_diff: f64,
    /// Longer lives cost annuity books money.
    #[schema(value_type = String)]
    pub annuity_impact: Decimal,
    /// Longer lives delay life-insurance claims.
    #[schema(value_type = String)]
    pub life_insurance_impact: Decimal,
    #[schema(value_type = String)]
    pub total_impact: Decimal,
}

/// Impact on a portfolio split between annuities (`annuity_share` %) and
/// life insurance (the rest).
pub fn financial_impact(table: &LifeTable, portfolio_size: f64, annuity_share: u8) -> FinancialImpact {
    let annuity_share = annuity_share.min(100);
    let life_insurance_share = 100 - annuity_share;

    let e0 = table.e0_baseline();
    let e0_diff = table.e0_adjusted() - e0;
    let d = if e0 > 0.0 { e0_diff / e0 } else { 0.0 };

    let annuity = -d * portfolio_size * f64::from(annuity_share) / 100.0;
    let life_insurance = d * portfolio_size * f64::from(life_insurance_share) / 100.0;

    let annuity_impact = f64_to_money(annuity);
    let life_insurance_impact = f64_to_money(life_insurance);
    FinancialImpact {
        portfolio_size: f64_to_money(portfolio_size),
        annuity_share,
        life_insurance_share,
        e0_diff: round_dp(e0_diff, 2),
        annuity_impact,
        life_insurance_impact,
        total_impact: annuity_impact + life_insurance_impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_q_shape() {
        assert!((baseline_q(0) - (0.0005 + 0.15 * (-9.0f64).exp())).abs() < 1e-12);
        assert!((baseline_q(90) - 0.1505).abs() < 1e-12);
        for age in 0..MAX_AGE {
            assert!(baseline_q(age) <= baseline_q(age + 1));
            assert!(baseline_q(age) <= 1.0);
        }
    }

    #[test]
    fn test_adjusted_q_scaling() {
        // age 70: weight 1.0, RCP 8.5 factor 0.06
        let q = adjusted_q(70, Scenario::Rcp85, 0.0);
        assert!((q - baseline_q(70) * 1.06).abs() < 1e-12);
        // full adaptation removes the excess
        assert_eq!(adjusted_q(70, Scenario::Rcp85, 1.0), baseline_q(70));
        assert!(adjusted_q(95, Scenario::Rcp85, 0.0) <= 1.0);
    }

    #[test]
    fn test_survivors_start_at_radix_and_never_increase() {
        let table = LifeTable::generate(Scenario::Rcp45, 0.0);
        let rows = table.rows(true);
        assert_eq!(rows.len(), 101);
        assert_eq!(rows[0].baseline.l, 100_000);
        assert_eq!(rows[0].adjusted.l, 100_000);
        for pair in rows.windows(2) {
            assert!(pair[1].baseline.l <= pair[0].baseline.l);
            assert!(pair[1].adjusted.l <= pair[0].adjusted.l);
        }
    }

    #[test]
    fn test_collapsed_view_every_tenth_age() {
        let table = LifeTable::generate(Scenario::Rcp26, 0.5);
        let ages: Vec<u32> = table.rows(false).iter().map(|r| r.age).collect();
        assert_eq!(ages, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_warming_lowers_life_expectancy() {
        let rcp26 = LifeTable::generate(Scenario::Rcp26, 0.0);
        let rcp85 = LifeTable::generate(Scenario::Rcp85, 0.0);
        assert!(rcp26.e0_adjusted() < rcp26.e0_baseline());
        assert!(rcp85.e0_adjusted() < rcp26.e0_adjusted());
        assert!(rcp26.e0_baseline() > 50.0);
    }

    #[test]
    fn test_full_adaptation_matches_baseline() {
        let table = LifeTable::generate(Scenario::Rcp85, 1.0);
        assert_eq!(table.e0_adjusted(), table.e0_baseline());
        assert!(table
            .rows(true)
            .iter()
            .all(|r| r.q_trend == CellTrend::Same && r.e_trend == CellTrend::Same));
    }

    #[test]
    fn test_cell_trends() {
        let table = LifeTable::generate(Scenario::Rcp85, 0.0);
        let old = &table.rows(true)[90];
        assert_eq!(old.q_trend, CellTrend::Worse);
        assert_eq!(old.l_trend, CellTrend::Worse);
        assert_eq!(old.e_trend, CellTrend::Worse);

        assert_eq!(trend(0.5, 0.4, true), CellTrend::Worse);
        assert_eq!(trend(70.0, 71.0, false), CellTrend::Worse);
        assert_eq!(trend(72.0, 71.0, false), CellTrend::Better);
        assert_eq!(trend(1.0, 1.0, false), CellTrend::Same);
    }

    #[test]
    fn test_deterministic() {
        let a = LifeTable::generate(Scenario::Rcp45, 0.3);
        let b = LifeTable::generate(Scenario::Rcp45, 0.3);
        assert_eq!(a.rows(true), b.rows(true));
    }

    #[test]
    fn test_financial_impact_signs() {
        // Shorter lives: annuities gain, life insurance loses.
        let table = LifeTable::generate(Scenario::Rcp85, 0.0);
        let impact = financial_impact(&table, DEFAULT_PORTFOLIO_SIZE, 50);
        assert!(impact.e0_diff < 0.0);
        assert!(impact.annuity_impact > Decimal::ZERO);
        assert!(impact.life_insurance_impact < Decimal::ZERO);
        assert_eq!(impact.total_impact, impact.annuity_impact + impact.life_insurance_impact);
        assert_eq!(impact.life_insurance_share, 50);
    }

    #[test]
    fn test_financial_impact_all_annuities() {
        let table = LifeTable::generate(Scenario::Rcp45, 0.0);
        let impact = financial_impact(&table, 1_000_000.0, 100);
        assert_eq!(impact.life_insurance_share, 0);
        assert_eq!(impact.life_insurance_impact, Decimal::ZERO);
        assert_eq!(impact.total_impact, impact.annuity_impact);
        assert!(impact.annuity_impact.scale() <= 2);
    }

    #[test]
    fn test_no_impact_without_excess_mortality() {
        let table = LifeTable::generate(Scenario::Rcp85, 1.0);
        let impact = financial_impact(&table, DEFAULT_PORTFOLIO_SIZE, 30);
        assert_eq!(impact.total_impact, Decimal::ZERO);
    }

    #[test]
    fn test_scenario_serde() {
        let s: Scenario = serde_json::from_str("\"rcp85\"").unwrap();
        assert_eq!(s, Scenario::Rcp85);
        assert_eq!(Scenario::default().label(), "RCP 4.5");
    }
}
