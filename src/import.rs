//! Bulk import of material definitions from plain-text catalog files
//!
//! Walks a directory for `.mat` files, each containing one or more blocks:
//!
//! ```text
//! material ironIngot
//! price = 30
//! focus = 3
//! yield = 1
//! recipe = ironOre x2, coal x1
//! extra = pristineIngot @ 60 : 0.05
//! ```
//!
//! `yield` also accepts a chance:quantity list (`0.5:2, 0.5:4`). The same
//! spec-string parsers back the CLI `add` command.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use thiserror::Error;
use walkdir::WalkDir;

use crate::db;
use crate::models::{BonusOutput, Material, RecipeItem, Yield, YieldOutcome};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed recipe item '{0}', expected '<id> x<quantity>'")]
    BadRecipeItem(String),
    #[error("malformed yield '{0}', expected a number or a '<chance>:<quantity>' list")]
    BadYield(String),
    #[error("malformed bonus output '{0}', expected '<id> @ <price> : <chance>'")]
    BadBonus(String),
    #[error("material '{0}' has no price")]
    MissingPrice(String),
    #[error("line {0}: field outside a material block")]
    StrayField(usize),
    #[error("line {0}: unrecognized line '{1}'")]
    UnrecognizedLine(usize, String),
}

/// Parse a comma-separated recipe spec such as `"ironOre x2, coal x1"`.
pub fn parse_recipe_spec(spec: &str) -> Result<Vec<RecipeItem>> {
    let item_re = Regex::new(r"^(\w+)\s*x\s*([\d.]+)$")?;
    let mut items = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let cap = item_re
            .captures(token)
            .ok_or_else(|| ParseError::BadRecipeItem(token.to_string()))?;
        items.push(RecipeItem {
            material_id: cap[1].to_string(),
            quantity: cap[2].parse()?,
        });
    }
    Ok(items)
}

/// Parse a yield spec: a plain number, or a list like `"0.5:2, 0.5:4"`.
pub fn parse_yield_spec(spec: &str) -> Result<Yield> {
    let spec = spec.trim();
    if let Ok(quantity) = spec.parse::<f64>() {
        return Ok(Yield::Fixed(quantity));
    }

    let outcome_re = Regex::new(r"^([\d.]+)\s*:\s*([\d.]+)$")?;
    let mut outcomes = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let cap = outcome_re
            .captures(token)
            .ok_or_else(|| ParseError::BadYield(token.to_string()))?;
        outcomes.push(YieldOutcome {
            chance: cap[1].parse()?,
            quantity: cap[2].parse()?,
        });
    }
    if outcomes.is_empty() {
        return Err(ParseError::BadYield(spec.to_string()).into());
    }
    Ok(Yield::Outcomes(outcomes))
}

/// Parse a bonus-output spec such as `"pristineIngot @ 60 : 0.05"`.
pub fn parse_bonus_spec(spec: &str) -> Result<Vec<BonusOutput>> {
    let bonus_re = Regex::new(r"^(\w+)\s*@\s*([\d.]+)\s*:\s*([\d.]+)$")?;
    let mut outputs = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let cap = bonus_re
            .captures(token)
            .ok_or_else(|| ParseError::BadBonus(token.to_string()))?;
        outputs.push(BonusOutput {
            output_id: cap[1].to_string(),
            price: cap[2].parse()?,
            chance: cap[3].parse()?,
        });
    }
    Ok(outputs)
}

/// Material under construction while scanning a block
#[derive(Debug)]
struct PartialMaterial {
    id: String,
    price: Option<f64>,
    focus_cost: f64,
    recipe: Vec<RecipeItem>,
    yield_spec: Yield,
    extra: Vec<BonusOutput>,
}

impl PartialMaterial {
    fn new(id: String) -> Self {
        Self {
            id,
            price: None,
            focus_cost: 0.0,
            recipe: Vec::new(),
            yield_spec: Yield::Fixed(1.0),
            extra: Vec::new(),
        }
    }

    fn finish(self) -> Result<Material> {
        let price = self
            .price
            .ok_or_else(|| ParseError::MissingPrice(self.id.clone()))?;
        Ok(Material {
            id: self.id,
            price,
            focus_cost: self.focus_cost,
            recipe: self.recipe,
            yield_spec: self.yield_spec,
            extra: self.extra,
        })
    }
}

/// Parse one catalog file into materials
pub fn parse_catalog_file(content: &str) -> Result<Vec<Material>> {
    let header_re = Regex::new(r"^material\s+(\w+)$")?;
    let field_re = Regex::new(r"^(price|focus|yield|recipe|extra)\s*=\s*(.+)$")?;

    let mut materials = Vec::new();
    let mut current: Option<PartialMaterial> = None;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(cap) = header_re.captures(line) {
            if let Some(done) = current.take() {
                materials.push(done.finish()?);
            }
            current = Some(PartialMaterial::new(cap[1].to_string()));
            continue;
        }

        let Some(cap) = field_re.captures(line) else {
            return Err(ParseError::UnrecognizedLine(index + 1, line.to_string()).into());
        };
        let Some(material) = current.as_mut() else {
            return Err(ParseError::StrayField(index + 1).into());
        };
        let value = cap[2].trim();
        match &cap[1] {
            "price" => material.price = Some(value.parse()?),
            "focus" => material.focus_cost = value.parse()?,
            "yield" => material.yield_spec = parse_yield_spec(value)?,
            "recipe" => material.recipe = parse_recipe_spec(value)?,
            "extra" => material.extra = parse_bonus_spec(value)?,
            _ => unreachable!(),
        }
    }

    if let Some(done) = current.take() {
        materials.push(done.finish()?);
    }
    Ok(materials)
}

/// Counters reported after an import run
#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub materials: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} materials from {} files",
            self.materials, self.files
        )
    }
}

/// Import every `.mat` file under `source_dir` into the catalog store
pub fn import_directory(conn: &Connection, source_dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for entry in WalkDir::new(source_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.extension().map_or(false, |ext| ext == "mat") {
            continue;
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let materials = parse_catalog_file(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        stats.files += 1;
        for material in materials {
            db::upsert_material(conn, &material)?;
            stats.materials += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_spec_parses_items_in_order() {
        let items = parse_recipe_spec("ironOre x2, coal x1.5").unwrap();
        assert_eq!(
            items,
            vec![
                RecipeItem { material_id: "ironOre".to_string(), quantity: 2.0 },
                RecipeItem { material_id: "coal".to_string(), quantity: 1.5 },
            ]
        );
    }

    #[test]
    fn bad_recipe_item_is_rejected() {
        assert!(parse_recipe_spec("ironOre * 2").is_err());
    }

    #[test]
    fn yield_spec_accepts_number_or_outcome_list() {
        assert_eq!(parse_yield_spec("3").unwrap(), Yield::Fixed(3.0));
        assert_eq!(
            parse_yield_spec("0.5:2, 0.5:4").unwrap(),
            Yield::Outcomes(vec![
                YieldOutcome { chance: 0.5, quantity: 2.0 },
                YieldOutcome { chance: 0.5, quantity: 4.0 },
            ])
        );
        assert!(parse_yield_spec("half:two").is_err());
    }

    #[test]
    fn bonus_spec_parses_output_price_and_chance() {
        let outputs = parse_bonus_spec("pristineIngot @ 60 : 0.05").unwrap();
        assert_eq!(
            outputs,
            vec![BonusOutput {
                output_id: "pristineIngot".to_string(),
                price: 60.0,
                chance: 0.05,
            }]
        );
        assert!(parse_bonus_spec("pristineIngot 60 0.05").is_err());
    }

    #[test]
    fn catalog_file_parses_multiple_blocks() {
        let content = "\
# sample catalog
material ironOre
price = 10
focus = 2

material ironIngot
price = 30
focus = 3
yield = 0.5:2, 0.5:4
recipe = ironOre x2
extra = pristineIngot @ 60 : 0.05
";
        let materials = parse_catalog_file(content).unwrap();
        assert_eq!(materials.len(), 2);

        let ore = &materials[0];
        assert_eq!(ore.id, "ironOre");
        assert_eq!(ore.price, 10.0);
        assert_eq!(ore.focus_cost, 2.0);
        assert_eq!(ore.yield_spec, Yield::Fixed(1.0));
        assert!(ore.recipe.is_empty());

        let ingot = &materials[1];
        assert_eq!(ingot.recipe.len(), 1);
        assert_eq!(ingot.extra.len(), 1);
        assert_eq!(
            ingot.yield_spec,
            Yield::Outcomes(vec![
                YieldOutcome { chance: 0.5, quantity: 2.0 },
                YieldOutcome { chance: 0.5, quantity: 4.0 },
            ])
        );
    }

    #[test]
    fn material_without_price_is_rejected() {
        let err = parse_catalog_file("material ore\nfocus = 1\n").unwrap_err();
        assert!(err.to_string().contains("no price"));
    }

    #[test]
    fn field_outside_a_block_is_rejected() {
        assert!(parse_catalog_file("price = 10\n").is_err());
    }
}
