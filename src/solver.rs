//! Buy-vs-craft cost resolution and the focus price equilibrium solver
//!
//! Every material can be bought at its market price or produced from other
//! materials at the cost of focus. One `CostPass` answers "buy or craft?"
//! for the whole catalog at a single trial focus price; `solve` iterates
//! trial prices until the best profit-per-focus in the catalog equals the
//! trial price itself.

use std::collections::{HashMap, HashSet};

use crate::models::{Catalog, ComputedCost, Method, Yield};

/// Fraction of a sale's value the seller keeps after the market's cut.
pub const MARKET_TAX: f64 = 0.95;

/// Tunables for the equilibrium fixed-point iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Convergence tolerance on |maxPPF - trial price|.
    pub tolerance: f64,
    /// Relaxation factor applied to each trial price update.
    pub damping: f64,
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.001,
            damping: 0.7,
            max_iterations: 100_000,
        }
    }
}

/// Expected output quantity for one execution of a production action.
///
/// Outcome chances are weights in an expectation, not a normalized
/// probability mass; an empty outcome list degrades to `1.0`.
pub fn resolve_yield(yield_spec: &Yield) -> f64 {
    match yield_spec {
        Yield::Fixed(quantity) => *quantity,
        Yield::Outcomes(outcomes) if !outcomes.is_empty() => {
            outcomes.iter().map(|o| o.chance * o.quantity).sum()
        }
        Yield::Outcomes(_) => 1.0,
    }
}

/// One memoized cost-resolution pass over the catalog at a fixed trial
/// focus price.
///
/// Cached results are valid only for the price the pass was created with;
/// evaluating a new trial price requires a fresh pass.
pub struct CostPass<'a> {
    catalog: &'a Catalog,
    focus_price: f64,
    cache: HashMap<String, ComputedCost>,
    in_flight: HashSet<String>,
}

impl<'a> CostPass<'a> {
    pub fn new(catalog: &'a Catalog, focus_price: f64) -> Self {
        Self {
            catalog,
            focus_price,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn focus_price(&self) -> f64 {
        self.focus_price
    }

    /// Resolve the cheaper of "buy at market" vs "craft from ingredients"
    /// for one material.
    ///
    /// Never fails: an id absent from the catalog, or re-entered through a
    /// recipe cycle, resolves to the zero-cost [`ComputedCost::unresolved`]
    /// sentinel and the caller's arithmetic proceeds on the degraded value.
    pub fn resolve(&mut self, material_id: &str) -> ComputedCost {
        if let Some(cached) = self.cache.get(material_id) {
            return cached.clone();
        }
        // Re-entering a node that is still being resolved means the recipe
        // graph has a cycle; break it the same way a dangling reference is
        // handled, without poisoning the cache for the outer resolution.
        if self.in_flight.contains(material_id) {
            return ComputedCost::unresolved();
        }

        let Some(material) = self.catalog.get(material_id) else {
            let fallback = ComputedCost::unresolved();
            self.cache.insert(material_id.to_string(), fallback.clone());
            return fallback;
        };

        self.in_flight.insert(material_id.to_string());

        let expected_yield = resolve_yield(&material.yield_spec);
        let mut ingredient_cost = 0.0;
        let mut total_focus = material.focus_cost;

        for item in &material.recipe {
            let ingredient = self.resolve(&item.material_id);
            ingredient_cost += ingredient.effective_cost_per_unit * item.quantity;
            // A bought ingredient's focus spend is already monetized in its
            // market price; only crafted ingredients add focus here.
            if ingredient.method == Method::Craft {
                total_focus += ingredient.base_focus_per_unit * item.quantity;
            }
        }

        let gather_cost_per_unit =
            (ingredient_cost + total_focus * self.focus_price) / expected_yield;
        let (method, effective_cost_per_unit) = if gather_cost_per_unit < material.price {
            (Method::Craft, gather_cost_per_unit)
        } else {
            // Ties favor buying.
            (Method::Buy, material.price)
        };

        // A raw material's only monetary sourcing is the market, so the
        // ingredient cost a parent sees is its market price even when the
        // gather action itself is the better use of focus.
        if material.recipe.is_empty() {
            ingredient_cost = material.price;
        }

        let result = ComputedCost {
            expected_yield,
            ingredient_cost,
            effective_cost_per_unit,
            method,
            focus_cost: total_focus,
            base_focus_per_unit: total_focus / expected_yield,
            profit_per_focus: None,
            expected_revenue: None,
        };

        self.in_flight.remove(material_id);
        self.cache.insert(material_id.to_string(), result.clone());
        result
    }

    /// Consume the pass, keeping its memoized results.
    pub fn into_results(self) -> HashMap<String, ComputedCost> {
        self.cache
    }
}

/// Terminal outcome of an equilibrium solve.
#[derive(Debug, Clone, PartialEq)]
pub enum Equilibrium {
    Converged {
        focus_price: f64,
        iterations: u32,
        /// Final per-material results, annotated with revenue and
        /// profit-per-focus by the finishing pass.
        costs: HashMap<String, ComputedCost>,
    },
    /// Iteration budget spent without meeting the tolerance. The price is a
    /// best-effort estimate; per-material results are withheld rather than
    /// returned stale.
    Exhausted { focus_price: f64 },
}

/// Find the self-consistent price of focus: the fixed point where the best
/// profit-per-focus available anywhere in the catalog equals the price of
/// focus itself.
pub fn solve(catalog: &Catalog, config: &SolverConfig) -> Equilibrium {
    let mut trial_price = 0.0_f64;

    for iteration in 0..config.max_iterations {
        let mut pass = CostPass::new(catalog, trial_price);
        let mut max_ppf = 0.0_f64;

        for material in catalog.values() {
            let expected_yield = resolve_yield(&material.yield_spec);
            let revenue = material.price * MARKET_TAX * expected_yield;
            let info = pass.resolve(&material.id);
            let profit = revenue - info.ingredient_cost;
            let ppf = profit / material.focus_cost;
            // A zero focus cost divides to a non-finite rate; such a
            // material is ineligible to set the price of focus.
            if ppf.is_finite() && ppf > max_ppf {
                max_ppf = ppf;
            }
        }

        if (max_ppf - trial_price).abs() < config.tolerance {
            let mut costs = pass.into_results();
            annotate_profits(catalog, &mut costs);
            return Equilibrium::Converged {
                focus_price: trial_price,
                iterations: iteration,
                costs,
            };
        }

        trial_price += config.damping * (max_ppf - trial_price);
    }

    Equilibrium::Exhausted {
        focus_price: trial_price,
    }
}

/// Post-convergence finishing pass: fold bonus outputs into each material's
/// expected revenue and record its final profit per focus.
fn annotate_profits(catalog: &Catalog, costs: &mut HashMap<String, ComputedCost>) {
    for material in catalog.values() {
        let Some(info) = costs.get_mut(&material.id) else {
            continue;
        };

        // With probability `chance` the unit that would have sold at the
        // base price sells at the bonus output's price instead.
        let mut expected_base_value = material.price;
        for bonus in &material.extra {
            expected_base_value -= bonus.chance * material.price;
            expected_base_value += bonus.chance * bonus.price;
        }

        let revenue = expected_base_value * info.expected_yield * MARKET_TAX;
        let profit = revenue - info.ingredient_cost;
        info.expected_revenue = Some(revenue);
        info.profit_per_focus = Some(if material.focus_cost > 0.0 {
            profit / material.focus_cost
        } else {
            0.0
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BonusOutput, Material, RecipeItem, YieldOutcome};

    fn raw(id: &str, price: f64, focus_cost: f64) -> Material {
        Material {
            id: id.to_string(),
            price,
            focus_cost,
            recipe: Vec::new(),
            yield_spec: Yield::Fixed(1.0),
            extra: Vec::new(),
        }
    }

    fn crafted(id: &str, price: f64, focus_cost: f64, recipe: &[(&str, f64)]) -> Material {
        Material {
            recipe: recipe
                .iter()
                .map(|(ingredient, quantity)| RecipeItem {
                    material_id: ingredient.to_string(),
                    quantity: *quantity,
                })
                .collect(),
            ..raw(id, price, focus_cost)
        }
    }

    fn catalog(materials: Vec<Material>) -> Catalog {
        materials.into_iter().map(|m| (m.id.clone(), m)).collect()
    }

    #[test]
    fn fixed_yield_returned_as_is() {
        assert_eq!(resolve_yield(&Yield::Fixed(2.5)), 2.5);
    }

    #[test]
    fn outcome_list_resolves_to_expected_value() {
        let spec = Yield::Outcomes(vec![
            YieldOutcome { chance: 0.5, quantity: 2.0 },
            YieldOutcome { chance: 0.5, quantity: 4.0 },
        ]);
        assert_eq!(resolve_yield(&spec), 3.0);
    }

    #[test]
    fn empty_outcome_list_defaults_to_one() {
        assert_eq!(resolve_yield(&Yield::Outcomes(Vec::new())), 1.0);
    }

    #[test]
    fn raw_material_ingredient_cost_is_its_price() {
        // Pins the raw-material override: the gather decision may still be
        // "craft" (free, with zero focus cost), but the cost a parent sees
        // is the market price.
        let cat = catalog(vec![raw("a", 10.0, 0.0)]);
        let mut pass = CostPass::new(&cat, 0.0);
        let info = pass.resolve("a");
        assert_eq!(info.ingredient_cost, 10.0);
        assert_eq!(info.method, Method::Craft);
        assert_eq!(info.effective_cost_per_unit, 0.0);

        // The override holds at any trial price once gathering is no longer
        // worthwhile.
        let mut pass = CostPass::new(&cat, 100.0);
        let info = pass.resolve("a");
        assert_eq!(info.ingredient_cost, 10.0);
    }

    #[test]
    fn crafting_with_free_ingredients_costs_nothing_at_zero_focus_price() {
        let cat = catalog(vec![
            raw("a", 10.0, 0.0),
            crafted("b", 100.0, 5.0, &[("a", 2.0)]),
        ]);
        let mut pass = CostPass::new(&cat, 0.0);
        let info = pass.resolve("b");
        assert_eq!(info.ingredient_cost, 0.0);
        assert_eq!(info.method, Method::Craft);
        assert_eq!(info.effective_cost_per_unit, 0.0);
    }

    #[test]
    fn effective_cost_never_exceeds_market_price() {
        let cat = catalog(vec![
            raw("ore", 10.0, 2.0),
            raw("coal", 4.0, 1.0),
            crafted("ingot", 30.0, 3.0, &[("ore", 2.0), ("coal", 1.0)]),
        ]);
        for trial_price in [0.0, 1.0, 5.0, 50.0] {
            let mut pass = CostPass::new(&cat, trial_price);
            for id in cat.keys() {
                let info = pass.resolve(id);
                let price = cat[id].price;
                assert!(
                    info.effective_cost_per_unit <= price,
                    "{id} at focus price {trial_price}: {} > {price}",
                    info.effective_cost_per_unit
                );
            }
        }
    }

    #[test]
    fn bought_ingredient_focus_is_not_double_counted() {
        // At a high focus price the ore is bought, so only the ingot's own
        // focus cost remains in the aggregate.
        let cat = catalog(vec![
            raw("ore", 10.0, 2.0),
            crafted("ingot", 100.0, 3.0, &[("ore", 2.0)]),
        ]);
        let mut pass = CostPass::new(&cat, 10.0);
        let ore = pass.resolve("ore");
        assert_eq!(ore.method, Method::Buy);
        let ingot = pass.resolve("ingot");
        assert_eq!(ingot.focus_cost, 3.0);

        // At a zero focus price the ore is gathered and its focus rolls up.
        let mut pass = CostPass::new(&cat, 0.0);
        let ingot = pass.resolve("ingot");
        assert_eq!(ingot.focus_cost, 3.0 + 2.0 * 2.0);
    }

    #[test]
    fn missing_ingredient_contributes_nothing() {
        let cat = catalog(vec![crafted("b", 100.0, 5.0, &[("ghost", 3.0)])]);
        let mut pass = CostPass::new(&cat, 1.0);
        let info = pass.resolve("b");
        assert_eq!(info.ingredient_cost, 0.0);
        assert_eq!(info.focus_cost, 5.0);
        assert_eq!(info.method, Method::Craft);

        let results = pass.into_results();
        let ghost = &results["ghost"];
        assert_eq!(ghost.method, Method::Error);
        assert_eq!(ghost.effective_cost_per_unit, 0.0);
    }

    #[test]
    fn recipe_cycle_terminates() {
        let cat = catalog(vec![
            crafted("a", 10.0, 1.0, &[("b", 1.0)]),
            crafted("b", 10.0, 1.0, &[("a", 1.0)]),
        ]);
        let mut pass = CostPass::new(&cat, 1.0);
        let a = pass.resolve("a");
        let b = pass.resolve("b");
        assert!(a.effective_cost_per_unit.is_finite());
        assert!(b.effective_cost_per_unit.is_finite());
        // The inner node of the cycle resolves against the sentinel; the
        // outer node then resolves against the real inner result.
        assert_eq!(b.ingredient_cost, 0.0);
        assert_eq!(a.ingredient_cost, b.effective_cost_per_unit);
    }

    #[test]
    fn passes_are_idempotent() {
        let cat = catalog(vec![
            raw("ore", 10.0, 2.0),
            raw("coal", 4.0, 1.0),
            crafted("ingot", 30.0, 3.0, &[("ore", 2.0), ("coal", 1.0)]),
            crafted("blade", 90.0, 6.0, &[("ingot", 2.0), ("missing", 1.0)]),
        ]);
        let run = || {
            let mut pass = CostPass::new(&cat, 2.5);
            for id in cat.keys() {
                pass.resolve(id);
            }
            pass.into_results()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn cached_results_are_scoped_to_one_trial_price() {
        let cat = catalog(vec![raw("ore", 10.0, 2.0)]);
        let mut cheap_focus = CostPass::new(&cat, 0.0);
        let mut dear_focus = CostPass::new(&cat, 10.0);
        assert_eq!(cheap_focus.resolve("ore").method, Method::Craft);
        assert_eq!(dear_focus.resolve("ore").method, Method::Buy);
    }

    #[test]
    fn unprofitable_catalog_converges_to_zero_immediately() {
        // A lone raw good sells for less than it costs to source, so no
        // material raises maxPPF above its floor of zero.
        let cat = catalog(vec![raw("herb", 50.0, 10.0)]);
        match solve(&cat, &SolverConfig::default()) {
            Equilibrium::Converged { focus_price, iterations, costs } => {
                assert_eq!(focus_price, 0.0);
                assert_eq!(iterations, 0);
                let info = &costs["herb"];
                let expected = (50.0 * MARKET_TAX - 50.0) / 10.0;
                assert!((info.profit_per_focus.unwrap() - expected).abs() < 1e-12);
            }
            other => panic!("expected convergence, got {other:?}"),
        }
    }

    #[test]
    fn equilibrium_matches_best_profit_per_focus() {
        let cat = catalog(vec![
            raw("ore", 10.0, 2.0),
            crafted("ingot", 30.0, 3.0, &[("ore", 2.0)]),
        ]);
        let config = SolverConfig::default();
        let Equilibrium::Converged { focus_price, costs, .. } = solve(&cat, &config) else {
            panic!("expected convergence");
        };

        // Analytic fixed point: F = (30*0.95 - 4F) / 3  =>  F = 28.5 / 7.
        assert!((focus_price - 28.5 / 7.0).abs() < 0.01);

        // Recompute maxPPF from the returned cache; the tolerance must hold.
        let mut max_ppf = 0.0_f64;
        for material in cat.values() {
            let info = &costs[&material.id];
            let revenue = material.price * MARKET_TAX * info.expected_yield;
            let ppf = (revenue - info.ingredient_cost) / material.focus_cost;
            if ppf.is_finite() && ppf > max_ppf {
                max_ppf = ppf;
            }
        }
        assert!((max_ppf - focus_price).abs() < config.tolerance);
    }

    #[test]
    fn zero_focus_cost_never_becomes_the_trial_price() {
        // Profitable craft with zero focus cost yields an infinite PPF; it
        // must be ignored rather than poisoning the iteration.
        let cat = catalog(vec![
            raw("sand", 1.0, 0.0),
            crafted("glass", 50.0, 0.0, &[("sand", 1.0)]),
        ]);
        match solve(&cat, &SolverConfig::default()) {
            Equilibrium::Converged { focus_price, costs, .. } => {
                assert_eq!(focus_price, 0.0);
                assert_eq!(costs["glass"].profit_per_focus, Some(0.0));
            }
            other => panic!("expected convergence, got {other:?}"),
        }
    }

    #[test]
    fn bonus_outputs_fold_into_expected_revenue() {
        let mut herb = raw("herb", 10.0, 2.0);
        herb.extra.push(BonusOutput {
            output_id: "potentHerb".to_string(),
            price: 20.0,
            chance: 0.1,
        });
        let cat = catalog(vec![herb]);
        let Equilibrium::Converged { costs, .. } = solve(&cat, &SolverConfig::default()) else {
            panic!("expected convergence");
        };
        let info = &costs["herb"];
        // Base value 10, minus 10% of 10, plus 10% of 20 = 11; taxed at 5%.
        let revenue = 11.0 * MARKET_TAX;
        assert!((info.expected_revenue.unwrap() - revenue).abs() < 1e-12);
        let ppf = (revenue - 10.0) / 2.0;
        assert!((info.profit_per_focus.unwrap() - ppf).abs() < 1e-12);
    }

    #[test]
    fn exhausted_budget_returns_price_without_results() {
        let cat = catalog(vec![
            raw("ore", 10.0, 2.0),
            crafted("ingot", 30.0, 3.0, &[("ore", 2.0)]),
        ]);
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        // Iteration 0: maxPPF = 28.5 / 3 = 9.5, far from the initial trial
        // price of zero, so the single-iteration budget is spent.
        match solve(&cat, &config) {
            Equilibrium::Exhausted { focus_price } => {
                assert!((focus_price - 0.7 * 9.5).abs() < 1e-12);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
