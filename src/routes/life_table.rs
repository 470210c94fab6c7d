use axum::extract::Query;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, ErrorResponse};
use crate::helpers::round_dp;
use crate::services::life_table::{
    financial_impact, FinancialImpact, LifeTable, LifeTableRow, Scenario, DEFAULT_ANNUITY_SHARE,
    DEFAULT_PORTFOLIO_SIZE,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LifeTableQuery {
    /// Emissions scenario (rcp26, rcp45, rcp85)
    #[param(inline)]
    pub scenario: Option<Scenario>,
    /// Adaptation level between 0 and 1
    pub adaptation: Option<f64>,
    /// All 101 ages instead of every tenth
    #[serde(default)]
    pub expanded: bool,
    /// Portfolio size in euros
    pub portfolio_size: Option<f64>,
    /// Annuity share in percent; life insurance gets the rest
    pub annuity_share: Option<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LifeTableView {
    pub scenario: Scenario,
    pub scenario_label: String,
    pub adaptation: f64,
    pub e0_baseline: f64,
    pub e0_adjusted: f64,
    pub expanded: bool,
    pub rows: Vec<LifeTableRow>,
    pub financial: FinancialImpact,
    /// Shown with the table: these figures are not a model output.
    pub disclaimer: String,
}

const DISCLAIMER: &str = "Illustrative figures only; not an actuarial projection.";

/// Illustrative life table and portfolio impact for a scenario.
#[utoipa::path(
    get,
    path = "/api/v1/life-table",
    tag = "Life Table",
    params(LifeTableQuery),
    responses(
        (status = 200, description = "Life table with financial impact", body = LifeTableView),
        (status = 400, description = "Parameter out of range", body = ErrorResponse),
    )
)]
pub async fn get_life_table(Query(params): Query<LifeTableQuery>) -> Result<Json<LifeTableView>, AppError> {
    let scenario = params.scenario.unwrap_or_default();
    let adaptation = params.adaptation.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&adaptation) {
        return Err(AppError::BadRequest("Adaptation must be between 0 and 1".to_string()));
    }
    let portfolio_size = params.portfolio_size.unwrap_or(DEFAULT_PORTFOLIO_SIZE);
    if !portfolio_size.is_finite() || portfolio_size < 0.0 {
        return Err(AppError::BadRequest("Portfolio size must be a non-negative amount".to_string()));
    }
    let annuity_share = params.annuity_share.unwrap_or(DEFAULT_ANNUITY_SHARE);
    if annuity_share > 100 {
        return Err(AppError::BadRequest("Annuity share must be between 0 and 100".to_string()));
    }

    let table = LifeTable::generate(scenario, adaptation);
    let financial = financial_impact(&table, portfolio_size, annuity_share);

    Ok(Json(LifeTableView {
        scenario,
        scenario_label: scenario.label().to_string(),
        adaptation,
        e0_baseline: round_dp(table.e0_baseline(), 2),
        e0_adjusted: round_dp(table.e0_adjusted(), 2),
        expanded: params.expanded,
        rows: table.rows(params.expanded),
        financial,
        disclaimer: DISCLAIMER.to_string(),
    }))
}
