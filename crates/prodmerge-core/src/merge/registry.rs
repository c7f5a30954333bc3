use crate::config::{DedupConfig, MergeSettings};
use crate::error::Result;
use crate::merge::policies::MergePolicy;

const SCALAR_COLUMNS: [&str; 11] = [
    "unspsc",
    "root_domain",
    "page_url",
    "product_title",
    "product_summary",
    "product_name",
    "brand",
    "eco_friendly",
    "manufacturing_year",
    "description",
    "merged_description",
];

const ATOM_COLUMNS: [&str; 13] = [
    "product_identifier",
    "intended_industries",
    "applicability",
    "ethical_and_sustainability_practices",
    "materials",
    "ingredients",
    "manufacturing_countries",
    "manufacturing_type",
    "customization",
    "packaging_type",
    "form",
    "quality_standards_and_certifications",
    "miscellaneous_features",
];

const RECORD_COLUMNS: [&str; 8] = [
    "production_capacity",
    "price",
    "size",
    "color",
    "purity",
    "energy_efficiency",
    "pressure_rating",
    "power_rating",
];

/// One resolved column of a merge: its name and the policy that reduces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub column: String,
    pub policy: MergePolicy,
}

/// Immutable column → policy mapping, split into a scalar table and a
/// collection table. Constructed once and handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRegistry {
    scalar: Vec<(String, MergePolicy)>,
    collection: Vec<(String, MergePolicy)>,
}

impl PolicyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The product-catalog registry.
    pub fn builtin(settings: &MergeSettings) -> Self {
        let scalar = SCALAR_COLUMNS
            .iter()
            .map(|column| (column.to_string(), scalar_policy(column, settings)))
            .collect();

        let collection = ATOM_COLUMNS
            .iter()
            .map(|column| (column.to_string(), MergePolicy::UnionAtoms))
            .chain(
                RECORD_COLUMNS
                    .iter()
                    .map(|column| (column.to_string(), MergePolicy::UnionRecords)),
            )
            .collect();

        Self { scalar, collection }
    }

    /// The built-in registry with the config's `[policies]` overrides applied.
    pub fn from_config(config: &DedupConfig) -> Result<Self> {
        let mut registry = Self::builtin(&config.merge);
        for (column, name) in &config.policies {
            let policy = MergePolicy::from_name(name, &config.merge)?;
            registry = registry.with_policy(column.clone(), policy);
        }
        Ok(registry)
    }

    /// Bind `column` to `policy`, replacing any existing binding in place.
    /// The policy decides which of the two tables the column lives in.
    pub fn with_policy(mut self, column: impl Into<String>, policy: MergePolicy) -> Self {
        let column = column.into();
        let (home, other) = if policy.is_collection() {
            (&mut self.collection, &mut self.scalar)
        } else {
            (&mut self.scalar, &mut self.collection)
        };

        other.retain(|(name, _)| name != &column);
        match home.iter_mut().find(|(name, _)| name == &column) {
            Some(entry) => entry.1 = policy,
            None => home.push((column, policy)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&MergePolicy> {
        self.iter()
            .find(|(name, _)| *name == column)
            .map(|(_, policy)| policy)
    }

    /// Registered columns in merge order: scalar table, then collections.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MergePolicy)> {
        self.scalar
            .iter()
            .chain(self.collection.iter())
            .map(|(name, policy)| (name.as_str(), policy))
    }

    pub fn len(&self) -> usize {
        self.scalar.len() + self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the registry against the columns a table actually has:
    /// registered columns present in the table (registry order), then every
    /// remaining column as a take-first passthrough. The key column is
    /// never planned.
    pub fn plan(&self, table_columns: &[String], key_column: &str) -> Vec<ColumnPlan> {
        let present = |column: &str| table_columns.iter().any(|c| c == column);

        let mut plan: Vec<ColumnPlan> = self
            .iter()
            .filter(|(column, _)| *column != key_column && present(*column))
            .map(|(column, policy)| ColumnPlan {
                column: column.to_string(),
                policy: policy.clone(),
            })
            .collect();

        for column in table_columns {
            if column != key_column && self.get(column).is_none() {
                plan.push(ColumnPlan {
                    column: column.clone(),
                    policy: MergePolicy::TakeFirst,
                });
            }
        }
        plan
    }
}

fn scalar_policy(column: &str, settings: &MergeSettings) -> MergePolicy {
    match column {
        "unspsc" => MergePolicy::UnionDelimited {
            delimiter: settings.code_delimiter.clone(),
        },
        "root_domain" => MergePolicy::ConsistentScalar,
        "page_url" => MergePolicy::ShortestString,
        "eco_friendly" => MergePolicy::ConsistentBoolean,
        "manufacturing_year" => MergePolicy::MaxNumeric,
        _ => MergePolicy::LongestString,
    }
}
