//! Data models for materials and computed cost results

use std::collections::BTreeMap;
use std::fmt;

/// The full material catalog, keyed by material id.
///
/// A `BTreeMap` keeps catalog iteration deterministic, which in turn keeps
/// solver output reproducible run-to-run even when recipe cycles force an
/// order-dependent break.
pub type Catalog = BTreeMap<String, Material>;

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    /// Market price per unit, both when buying and when selling.
    pub price: f64,
    /// Focus spent on one execution of this material's production action.
    pub focus_cost: f64,
    /// Ingredients consumed per execution; empty for raw/base goods.
    pub recipe: Vec<RecipeItem>,
    pub yield_spec: Yield,
    /// Probabilistic bonus outputs that replace the base sale value.
    pub extra: Vec<BonusOutput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeItem {
    pub material_id: String,
    pub quantity: f64,
}

/// Output quantity of one production action: a fixed amount, or a weighted
/// list of chance/quantity outcomes resolved to an expected value.
#[derive(Debug, Clone, PartialEq)]
pub enum Yield {
    Fixed(f64),
    Outcomes(Vec<YieldOutcome>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct YieldOutcome {
    pub chance: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BonusOutput {
    pub output_id: String,
    pub price: f64,
    pub chance: f64,
}

/// Sourcing strategy chosen for a material at a given focus price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Buy,
    Craft,
    Error,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Buy => write!(f, "buy"),
            Method::Craft => write!(f, "craft"),
            Method::Error => write!(f, "error"),
        }
    }
}

/// Result of resolving one material at one trial focus price.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedCost {
    pub expected_yield: f64,
    /// Monetary input cost of one execution as seen by a parent consuming
    /// this material; equals the market price for ingredient-less materials.
    pub ingredient_cost: f64,
    /// The lower of buy and craft costs, per output unit.
    pub effective_cost_per_unit: f64,
    pub method: Method,
    /// This material's own focus cost plus, transitively, the focus of any
    /// crafted (not bought) ingredients.
    pub focus_cost: f64,
    /// Aggregate focus divided by expected yield; what a parent folds in
    /// when this material's method is `Craft`.
    pub base_focus_per_unit: f64,
    /// Filled in by the equilibrium solver's finishing pass only.
    pub profit_per_focus: Option<f64>,
    pub expected_revenue: Option<f64>,
}

impl ComputedCost {
    /// Sentinel for ids that cannot be resolved, either absent from the
    /// catalog or re-entered through a recipe cycle. Contributes zero cost
    /// and zero focus to any parent.
    pub fn unresolved() -> Self {
        Self {
            expected_yield: 1.0,
            ingredient_cost: 0.0,
            effective_cost_per_unit: 0.0,
            method: Method::Error,
            focus_cost: 0.0,
            base_focus_per_unit: 0.0,
            profit_per_focus: None,
            expected_revenue: None,
        }
    }
}
