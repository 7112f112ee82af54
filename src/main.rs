//! Crafting economy calculator
//!
//! Maintains a catalog of materials that can be bought at market price or
//! crafted from other materials at the cost of focus, and solves for the
//! equilibrium price of focus itself.

mod db;
mod import;
mod models;
mod solver;
mod table;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::models::{BonusOutput, Material, RecipeItem, Yield, YieldOutcome};
use crate::solver::{Equilibrium, SolverConfig};

#[derive(Parser)]
#[command(name = "craft-calculator")]
#[command(about = "Buy-vs-craft calculator and focus price solver for a crafting economy")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, default_value = "materials.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a material in the catalog
    Add {
        /// Material id (unique key)
        id: String,

        /// Market price per unit
        #[arg(short, long)]
        price: f64,

        /// Focus cost of one production action
        #[arg(short, long, default_value = "0")]
        focus: f64,

        /// Yield: a number, or a chance:quantity list ("0.5:2, 0.5:4")
        #[arg(long = "yield")]
        yield_spec: Option<String>,

        /// Recipe: comma-separated "<id> x<qty>" items ("ironOre x2, coal x1")
        #[arg(short, long)]
        recipe: Option<String>,

        /// Bonus outputs: "<id> @ <price> : <chance>" items
        #[arg(short, long)]
        extra: Option<String>,
    },

    /// Update a material's market price
    SetPrice {
        id: String,
        price: f64,
    },

    /// Remove a material from the catalog
    Remove {
        id: String,
    },

    /// List all materials in the catalog
    List,

    /// Show details for a specific material
    Show {
        id: String,
    },

    /// Import material definitions from .mat files in a directory
    Import {
        /// Directory to scan for .mat files
        source_dir: PathBuf,

        /// Clear the existing catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Solve the catalog: equilibrium focus price plus per-material results
    Solve {
        /// Convergence tolerance on the focus price
        #[arg(long, default_value = "0.001")]
        tolerance: f64,

        /// Damping factor for the fixed-point iteration
        #[arg(long, default_value = "0.7")]
        damping: f64,

        /// Iteration budget before giving up
        #[arg(long, default_value = "100000")]
        max_iterations: u32,
    },

    /// Initialize an empty catalog database
    Init,

    /// Load a small sample catalog for experimentation
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Add {
            id,
            price,
            focus,
            yield_spec,
            recipe,
            extra,
        } => {
            let material = Material {
                id: id.clone(),
                price,
                focus_cost: focus,
                recipe: match recipe {
                    Some(spec) => import::parse_recipe_spec(&spec)?,
                    None => Vec::new(),
                },
                yield_spec: match yield_spec {
                    Some(spec) => import::parse_yield_spec(&spec)?,
                    None => Yield::Fixed(1.0),
                },
                extra: match extra {
                    Some(spec) => import::parse_bonus_spec(&spec)?,
                    None => Vec::new(),
                },
            };
            db::upsert_material(&conn, &material)?;
            println!("Saved material '{}'", id);
        }

        Commands::SetPrice { id, price } => {
            if db::set_price(&conn, &id, price)? {
                println!("Set price of '{}' to {:.2}", id, price);
            } else {
                println!("Material '{}' not found", id);
            }
        }

        Commands::Remove { id } => {
            if db::delete_material(&conn, &id)? {
                println!("Removed material '{}'", id);
            } else {
                println!("Material '{}' not found", id);
            }
        }

        Commands::List => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("Catalog is empty. Run 'add', 'import' or 'load-sample' first.");
            } else {
                println!(
                    "{:<24} {:>9} {:>7} {:>9} {:>12}",
                    "Material", "Price", "Focus", "E[yield]", "Ingredients"
                );
                println!("{}", "-".repeat(66));
                for material in catalog.values() {
                    println!(
                        "{:<24} {:>9.2} {:>7.2} {:>9.2} {:>12}",
                        material.id,
                        material.price,
                        material.focus_cost,
                        solver::resolve_yield(&material.yield_spec),
                        material.recipe.len(),
                    );
                }
            }
        }

        Commands::Show { id } => {
            if let Some(material) = db::get_material(&conn, &id)? {
                println!("Material: {}", material.id);
                println!("  Price: {:.2}", material.price);
                println!("  Focus cost: {:.2}", material.focus_cost);
                match &material.yield_spec {
                    Yield::Fixed(quantity) => println!("  Yield: {quantity}"),
                    Yield::Outcomes(outcomes) => {
                        println!(
                            "  Yield: expected {:.2}",
                            solver::resolve_yield(&material.yield_spec)
                        );
                        for outcome in outcomes {
                            println!(
                                "    {:.1}% chance of {}",
                                outcome.chance * 100.0,
                                outcome.quantity
                            );
                        }
                    }
                }
                if !material.recipe.is_empty() {
                    println!("  Recipe:");
                    for item in &material.recipe {
                        println!("    {}x {}", item.quantity, item.material_id);
                    }
                }
                if !material.extra.is_empty() {
                    println!("  Bonus outputs:");
                    for bonus in &material.extra {
                        println!(
                            "    {} @ {:.2} with {:.1}% chance",
                            bonus.output_id,
                            bonus.price,
                            bonus.chance * 100.0
                        );
                    }
                }
            } else {
                println!("Material '{}' not found", id);
            }
        }

        Commands::Import { source_dir, clear } => {
            if clear {
                println!("Clearing existing catalog...");
                db::clear_all(&conn)?;
            }

            let stats = import::import_directory(&conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::Solve {
            tolerance,
            damping,
            max_iterations,
        } => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("Catalog is empty. Run 'add', 'import' or 'load-sample' first.");
                return Ok(());
            }

            let config = SolverConfig {
                tolerance,
                damping,
                max_iterations,
            };
            match solver::solve(&catalog, &config) {
                Equilibrium::Converged {
                    focus_price,
                    iterations,
                    costs,
                } => {
                    println!("Solver converged in {} iterations.", iterations);
                    println!();
                    print!("{}", table::ResultsTable::new(&catalog, &costs, focus_price));
                }
                Equilibrium::Exhausted { focus_price } => {
                    println!(
                        "Solver did not converge after {} iterations; results unavailable.",
                        max_iterations
                    );
                    println!("Best focus price estimate: {:.3}", focus_price);
                }
            }
        }

        Commands::Init => {
            println!("Catalog initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_catalog(&conn)?;
            println!("Sample catalog loaded successfully!");
        }
    }

    Ok(())
}

/// Load a small crafting economy for experimenting without real market data
fn load_sample_catalog(conn: &Connection) -> Result<()> {
    db::clear_all(conn)?;

    let materials = vec![
        // Raw goods: gather actions with no ingredients
        Material {
            id: "oakLog".to_string(),
            price: 2.0,
            focus_cost: 1.0,
            recipe: Vec::new(),
            yield_spec: Yield::Fixed(3.0),
            extra: Vec::new(),
        },
        Material {
            id: "ironOre".to_string(),
            price: 10.0,
            focus_cost: 2.0,
            recipe: Vec::new(),
            yield_spec: Yield::Fixed(1.0),
            extra: Vec::new(),
        },
        Material {
            id: "coal".to_string(),
            price: 4.0,
            focus_cost: 1.0,
            recipe: Vec::new(),
            yield_spec: Yield::Outcomes(vec![
                YieldOutcome { chance: 0.5, quantity: 2.0 },
                YieldOutcome { chance: 0.5, quantity: 4.0 },
            ]),
            extra: Vec::new(),
        },
        // Intermediate crafts
        Material {
            id: "oakPlank".to_string(),
            price: 9.0,
            focus_cost: 1.0,
            recipe: vec![RecipeItem {
                material_id: "oakLog".to_string(),
                quantity: 2.0,
            }],
            yield_spec: Yield::Fixed(2.0),
            extra: Vec::new(),
        },
        Material {
            id: "ironIngot".to_string(),
            price: 30.0,
            focus_cost: 3.0,
            recipe: vec![
                RecipeItem { material_id: "ironOre".to_string(), quantity: 2.0 },
                RecipeItem { material_id: "coal".to_string(), quantity: 1.0 },
            ],
            yield_spec: Yield::Fixed(1.0),
            extra: vec![BonusOutput {
                output_id: "pristineIngot".to_string(),
                price: 60.0,
                chance: 0.05,
            }],
        },
        Material {
            id: "steelIngot".to_string(),
            price: 80.0,
            focus_cost: 5.0,
            recipe: vec![
                RecipeItem { material_id: "ironIngot".to_string(), quantity: 2.0 },
                RecipeItem { material_id: "coal".to_string(), quantity: 3.0 },
            ],
            yield_spec: Yield::Fixed(1.0),
            extra: Vec::new(),
        },
        // Finished good
        Material {
            id: "huntingBow".to_string(),
            price: 150.0,
            focus_cost: 8.0,
            recipe: vec![
                RecipeItem { material_id: "oakPlank".to_string(), quantity: 3.0 },
                RecipeItem { material_id: "steelIngot".to_string(), quantity: 1.0 },
            ],
            yield_spec: Yield::Fixed(1.0),
            extra: vec![BonusOutput {
                output_id: "masterworkBow".to_string(),
                price: 400.0,
                chance: 0.02,
            }],
        },
    ];

    let count = materials.len();
    for material in &materials {
        db::upsert_material(conn, material)?;
    }

    println!("Loaded {} sample materials", count);
    Ok(())
}
