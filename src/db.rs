//! SQLite-backed material catalog store
//!
//! The solver only ever sees a full in-memory snapshot; every read is a
//! full-table read and every edit rewrites the affected material's rows.

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{BonusOutput, Catalog, Material, RecipeItem, Yield, YieldOutcome};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Material definitions; fixed_yield is NULL when the material has a
        -- probabilistic outcome list instead of a fixed quantity
        CREATE TABLE IF NOT EXISTS materials (
            id TEXT PRIMARY KEY,
            price REAL NOT NULL,
            focus_cost REAL NOT NULL DEFAULT 0,
            fixed_yield REAL
        );

        -- Ordered recipe ingredients
        CREATE TABLE IF NOT EXISTS recipe_items (
            material_id TEXT,
            ingredient_id TEXT,
            quantity REAL NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (material_id, position)
        );

        -- Probabilistic yield outcomes
        CREATE TABLE IF NOT EXISTS yield_outcomes (
            material_id TEXT,
            chance REAL NOT NULL,
            quantity REAL NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (material_id, position)
        );

        -- Probabilistic bonus outputs
        CREATE TABLE IF NOT EXISTS bonus_outputs (
            material_id TEXT,
            output_id TEXT,
            price REAL NOT NULL,
            chance REAL NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (material_id, position)
        );
        "#,
    )?;
    Ok(())
}

/// Insert or replace a material, rewriting its child rows
pub fn upsert_material(conn: &Connection, material: &Material) -> Result<()> {
    let fixed_yield = match &material.yield_spec {
        Yield::Fixed(quantity) => Some(*quantity),
        Yield::Outcomes(_) => None,
    };
    conn.execute(
        "INSERT OR REPLACE INTO materials (id, price, focus_cost, fixed_yield)
         VALUES (?1, ?2, ?3, ?4)",
        (&material.id, material.price, material.focus_cost, fixed_yield),
    )?;

    delete_child_rows(conn, &material.id)?;

    for (position, item) in material.recipe.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_items (material_id, ingredient_id, quantity, position)
             VALUES (?1, ?2, ?3, ?4)",
            (&material.id, &item.material_id, item.quantity, position as i64),
        )?;
    }

    if let Yield::Outcomes(outcomes) = &material.yield_spec {
        for (position, outcome) in outcomes.iter().enumerate() {
            conn.execute(
                "INSERT INTO yield_outcomes (material_id, chance, quantity, position)
                 VALUES (?1, ?2, ?3, ?4)",
                (&material.id, outcome.chance, outcome.quantity, position as i64),
            )?;
        }
    }

    for (position, bonus) in material.extra.iter().enumerate() {
        conn.execute(
            "INSERT INTO bonus_outputs (material_id, output_id, price, chance, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &material.id,
                &bonus.output_id,
                bonus.price,
                bonus.chance,
                position as i64,
            ),
        )?;
    }

    Ok(())
}

fn delete_child_rows(conn: &Connection, material_id: &str) -> Result<()> {
    conn.execute("DELETE FROM recipe_items WHERE material_id = ?1", [material_id])?;
    conn.execute("DELETE FROM yield_outcomes WHERE material_id = ?1", [material_id])?;
    conn.execute("DELETE FROM bonus_outputs WHERE material_id = ?1", [material_id])?;
    Ok(())
}

/// Remove a material; returns whether it existed
pub fn delete_material(conn: &Connection, material_id: &str) -> Result<bool> {
    delete_child_rows(conn, material_id)?;
    let deleted = conn.execute("DELETE FROM materials WHERE id = ?1", [material_id])?;
    Ok(deleted > 0)
}

/// Update a material's market price; returns whether it existed
pub fn set_price(conn: &Connection, material_id: &str, price: f64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE materials SET price = ?1 WHERE id = ?2",
        (price, material_id),
    )?;
    Ok(updated > 0)
}

/// Fetch a single material by id
pub fn get_material(conn: &Connection, material_id: &str) -> Result<Option<Material>> {
    Ok(load_catalog(conn)?.remove(material_id))
}

/// Read the whole catalog into memory
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    let mut stmt = conn.prepare("SELECT id, price, focus_cost, fixed_yield FROM materials")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, Option<f64>>(3)?,
        ))
    })?;
    for row in rows {
        let (id, price, focus_cost, fixed_yield) = row?;
        catalog.insert(
            id.clone(),
            Material {
                id,
                price,
                focus_cost,
                recipe: Vec::new(),
                yield_spec: Yield::Fixed(fixed_yield.unwrap_or(1.0)),
                extra: Vec::new(),
            },
        );
    }

    let mut stmt = conn.prepare(
        "SELECT material_id, ingredient_id, quantity
         FROM recipe_items ORDER BY material_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            RecipeItem {
                material_id: row.get(1)?,
                quantity: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (material_id, item) = row?;
        if let Some(material) = catalog.get_mut(&material_id) {
            material.recipe.push(item);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT material_id, chance, quantity
         FROM yield_outcomes ORDER BY material_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            YieldOutcome {
                chance: row.get(1)?,
                quantity: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (material_id, outcome) = row?;
        if let Some(material) = catalog.get_mut(&material_id) {
            match &mut material.yield_spec {
                Yield::Outcomes(outcomes) => outcomes.push(outcome),
                fixed => *fixed = Yield::Outcomes(vec![outcome]),
            }
        }
    }

    let mut stmt = conn.prepare(
        "SELECT material_id, output_id, price, chance
         FROM bonus_outputs ORDER BY material_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            BonusOutput {
                output_id: row.get(1)?,
                price: row.get(2)?,
                chance: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (material_id, bonus) = row?;
        if let Some(material) = catalog.get_mut(&material_id) {
            material.extra.push(bonus);
        }
    }

    Ok(catalog)
}

/// Clear every table (for re-import)
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM bonus_outputs;
        DELETE FROM yield_outcomes;
        DELETE FROM recipe_items;
        DELETE FROM materials;
        "#,
    )?;
    Ok(())
}
