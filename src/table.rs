//! Projects solver results onto hierarchical display rows
//!
//! One parent row per material, one sub-row per recipe ingredient, bonus
//! output sub-rows, and a totals sub-row for crafted materials. Reads the
//! solver's output map; never feeds back into it.

use std::collections::HashMap;
use std::fmt;

use crate::models::{Catalog, ComputedCost, Method};

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRow {
    pub id: String,
    pub price: f64,
    pub focus_cost: f64,
    pub method: Method,
    pub effective_cost: f64,
    pub profit_per_focus: Option<f64>,
    pub ingredients: Vec<IngredientRow>,
    pub bonuses: Vec<BonusRow>,
    pub totals: Option<TotalsRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientRow {
    pub material_id: String,
    pub quantity: f64,
    pub method: Method,
    pub unit_cost: f64,
    pub focus_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BonusRow {
    pub output_id: String,
    pub price: f64,
    pub chance: f64,
}

/// Sums sub-row for a crafted material
#[derive(Debug, Clone, PartialEq)]
pub struct TotalsRow {
    pub expected_revenue: Option<f64>,
    pub ingredient_cost: f64,
    /// Focus inherited from crafted ingredients, excluding the material's
    /// own action.
    pub ingredient_focus: f64,
}

/// Map the final per-material results onto display rows, in catalog order.
pub fn project(catalog: &Catalog, costs: &HashMap<String, ComputedCost>) -> Vec<MaterialRow> {
    catalog
        .values()
        .map(|material| {
            let info = costs.get(&material.id);

            let ingredients = material
                .recipe
                .iter()
                .map(|item| {
                    let sub = costs.get(&item.material_id);
                    IngredientRow {
                        material_id: item.material_id.clone(),
                        quantity: item.quantity,
                        method: sub.map_or(Method::Error, |s| s.method),
                        unit_cost: sub.map_or(0.0, |s| s.effective_cost_per_unit),
                        focus_per_unit: sub.map_or(0.0, |s| s.base_focus_per_unit),
                    }
                })
                .collect();

            let bonuses = material
                .extra
                .iter()
                .map(|bonus| BonusRow {
                    output_id: bonus.output_id.clone(),
                    price: bonus.price,
                    chance: bonus.chance,
                })
                .collect();

            let totals = if material.recipe.is_empty() {
                None
            } else {
                info.map(|i| TotalsRow {
                    expected_revenue: i.expected_revenue,
                    ingredient_cost: i.ingredient_cost,
                    ingredient_focus: i.focus_cost - material.focus_cost,
                })
            };

            MaterialRow {
                id: material.id.clone(),
                price: material.price,
                focus_cost: material.focus_cost,
                method: info.map_or(Method::Error, |i| i.method),
                effective_cost: info.map_or(0.0, |i| i.effective_cost_per_unit),
                profit_per_focus: info.and_then(|i| i.profit_per_focus),
                ingredients,
                bonuses,
                totals,
            }
        })
        .collect()
}

/// Renderable solve output: equilibrium price plus the projected rows
#[derive(Debug)]
pub struct ResultsTable {
    pub focus_price: f64,
    pub rows: Vec<MaterialRow>,
}

impl ResultsTable {
    pub fn new(catalog: &Catalog, costs: &HashMap<String, ComputedCost>, focus_price: f64) -> Self {
        Self {
            focus_price,
            rows: project(catalog, costs),
        }
    }
}

fn optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

impl fmt::Display for ResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Equilibrium focus price: {:.3}", self.focus_price)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<24} {:>9} {:>7} {:>6} {:>10} {:>13}",
            "Material", "Price", "Focus", "Method", "Unit cost", "Profit/focus"
        )?;
        writeln!(f, "{}", "-".repeat(74))?;

        for row in &self.rows {
            writeln!(
                f,
                "{:<24} {:>9.2} {:>7.2} {:>6} {:>10.2} {:>13}",
                row.id,
                row.price,
                row.focus_cost,
                row.method,
                row.effective_cost,
                optional(row.profit_per_focus),
            )?;

            for ingredient in &row.ingredients {
                writeln!(
                    f,
                    "  {:>6.2}x {:<16} {:>6} {:>10.2}  focus/unit {:.2}",
                    ingredient.quantity,
                    ingredient.material_id,
                    ingredient.method,
                    ingredient.unit_cost,
                    ingredient.focus_per_unit,
                )?;
            }

            for bonus in &row.bonuses {
                writeln!(
                    f,
                    "  bonus   {:<16} @ {:>8.2}  chance {:.1}%",
                    bonus.output_id,
                    bonus.price,
                    bonus.chance * 100.0,
                )?;
            }

            if let Some(totals) = &row.totals {
                writeln!(
                    f,
                    "  totals: revenue {}, ingredient cost {:.2}, ingredient focus {:.2}",
                    optional(totals.expected_revenue),
                    totals.ingredient_cost,
                    totals.ingredient_focus,
                )?;
            }
        }

        Ok(())
    }
}
