//! Column pre-normalisation applied before merging.

use tracing::debug;

use crate::table::Table;
use crate::value::Value;

/// Columns removed by [`clean_columns`] when present.
pub const DROPPED_COLUMNS: [&str; 2] = ["product_name", "manufacturing_year"];

/// Replace `description` and `product_summary` with `product_description`,
/// the longer of the two by character count. Ties keep `description`.
pub fn merge_descriptions(table: &mut Table) {
    table.set_column_with("product_description", |row| {
        let description = row.get("description").to_string();
        let summary = row.get("product_summary").to_string();
        if description.chars().count() >= summary.chars().count() {
            Value::str(description)
        } else {
            Value::str(summary)
        }
    });
    table.drop_columns(&["description", "product_summary"]);
}

/// Replace `materials` and `ingredients` with `components`: the materials,
/// unless they are empty and the ingredients are not.
pub fn combine_components(table: &mut Table) {
    table.set_column_with("components", |row| {
        let materials = row.get("materials");
        let ingredients = row.get("ingredients");
        if materials.is_blank() && !ingredients.is_blank() {
            ingredients.clone()
        } else {
            materials.clone()
        }
    });
    table.drop_columns(&["materials", "ingredients"]);
}

/// Make every `energy_efficiency` cell a sequence of records.
///
/// Lone records are already wrapped on ingestion, and null elements are
/// dropped there, so only missing cells remain to be filled.
pub fn wrap_energy_efficiency(table: &mut Table) {
    table.set_column_with("energy_efficiency", |row| match row.get("energy_efficiency") {
        Value::Absent => Value::empty_sequence(),
        other => other.clone(),
    });
}

/// Run every normalisation whose source columns exist, then drop the
/// columns the merge does not carry forward.
pub fn clean_columns(table: &mut Table) {
    if table.has_column("description") && table.has_column("product_summary") {
        merge_descriptions(table);
    }
    if table.has_column("materials") && table.has_column("ingredients") {
        combine_components(table);
    }
    if table.has_column("energy_efficiency") {
        wrap_energy_efficiency(table);
    }

    let present: Vec<&str> = DROPPED_COLUMNS
        .into_iter()
        .filter(|column| table.has_column(column))
        .collect();
    table.drop_columns(&present);

    debug!(columns = table.columns().len(), "cleaned columns");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;
    use crate::value::record;

    #[test]
    fn test_merge_descriptions_prefers_longer() {
        let mut table = Table::with_columns(["description", "product_summary"]);
        table.push_row(Row::new().with("description", "short").with("product_summary", "much longer"));
        table.push_row(Row::new().with("description", "same").with("product_summary", "size"));
        table.push_row(Row::new());

        merge_descriptions(&mut table);

        let merged: Vec<&Value> = table.column("product_description").collect();
        assert_eq!(merged[0], &Value::str("much longer"));
        assert_eq!(merged[1], &Value::str("same"));
        assert_eq!(merged[2], &Value::str(""));
        assert_eq!(table.columns(), ["product_description"]);
    }

    #[test]
    fn test_combine_components_falls_back_to_ingredients() {
        let mut table = Table::with_columns(["materials", "ingredients"]);
        table.push_row(
            Row::new()
                .with("materials", Value::atoms(["steel"]))
                .with("ingredients", Value::atoms(["water"])),
        );
        table.push_row(
            Row::new()
                .with("materials", Value::empty_sequence())
                .with("ingredients", Value::atoms(["water"])),
        );

        combine_components(&mut table);

        let components: Vec<&Value> = table.column("components").collect();
        assert_eq!(components[0], &Value::atoms(["steel"]));
        assert_eq!(components[1], &Value::atoms(["water"]));
        assert!(!table.has_column("materials"));
        assert!(!table.has_column("ingredients"));
    }

    #[test]
    fn test_wrap_energy_efficiency() {
        let table_json = r#"[
            {"energy_efficiency": {"rating": "A"}},
            {"energy_efficiency": [null]},
            {"energy_efficiency": null}
        ]"#;
        let mut table = Table::from_json_rows(table_json).unwrap();

        wrap_energy_efficiency(&mut table);

        let cells: Vec<&Value> = table.column("energy_efficiency").collect();
        assert_eq!(cells[0], &Value::records([record([("rating", "A")])]));
        assert_eq!(cells[1], &Value::empty_sequence());
        assert_eq!(cells[2], &Value::empty_sequence());
    }

    #[test]
    fn test_clean_columns_skips_missing_sources() {
        let mut table = Table::with_columns(["description", "materials", "product_name", "brand"]);
        table.push_row(
            Row::new()
                .with("description", "d")
                .with("materials", Value::atoms(["steel"]))
                .with("product_name", "Widget")
                .with("brand", "Acme"),
        );

        clean_columns(&mut table);

        assert_eq!(table.columns(), ["description", "materials", "brand"]);
    }
}
