use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::expr::ExprCache;
use crate::flatten::FlatState;
use crate::spec::{Dictionary, FieldDefinition, SectionDefinition};

/// Name of the shared enum used when the dictionary has no top-level
/// `skip_reasons` list.
pub const SKIP_REASONS_ENUM: &str = "skip_reasons";

/// Immutable, process-wide view of the field dictionary.
///
/// Built once at start-up and passed by reference to every consumer. All
/// lookups fail closed: unknown names yield empty collections or `None`.
#[derive(Debug, Clone)]
pub struct SchemaRepository {
    dictionary: Dictionary,
    /// field key -> (section index, field index)
    field_index: BTreeMap<String, (usize, usize)>,
    expressions: ExprCache,
}

impl SchemaRepository {
    pub fn from_dictionary(dictionary: Dictionary) -> Result<Self, SchemaError> {
        let mut field_index = BTreeMap::new();
        let mut section_ids = BTreeSet::new();
        let mut expressions = ExprCache::new();

        for (section_pos, section) in dictionary.sections.iter().enumerate() {
            if !section_ids.insert(section.id.as_str()) {
                return Err(SchemaError::DuplicateSection {
                    id: section.id.clone(),
                });
            }
            for (field_pos, field) in section.fields.iter().enumerate() {
                if field_index
                    .insert(field.key.clone(), (section_pos, field_pos))
                    .is_some()
                {
                    return Err(SchemaError::DuplicateKey {
                        key: field.key.clone(),
                    });
                }
                for text in [&field.show_when, &field.required_when].into_iter().flatten() {
                    expressions.insert(text);
                }
            }
            if let Some(auto_skip) = &section.section_auto_skip {
                expressions.insert_auto_skip(&auto_skip.when);
            }
            for rule in &section.cross_field_validations {
                if let Some(condition) = &rule.condition {
                    expressions.insert(condition);
                }
            }
        }

        debug!(
            version = %dictionary.version,
            sections = dictionary.sections.len(),
            fields = field_index.len(),
            expressions = expressions.len(),
            "field dictionary loaded"
        );

        Ok(Self {
            dictionary,
            field_index,
            expressions,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let dictionary: Dictionary = serde_json::from_str(json)?;
        Self::from_dictionary(dictionary)
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn version(&self) -> &str {
        &self.dictionary.version
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Sections in declaration order.
    pub fn sections(&self) -> &[SectionDefinition] {
        &self.dictionary.sections
    }

    pub fn section(&self, id: &str) -> Option<&SectionDefinition> {
        self.dictionary.sections.iter().find(|section| section.id == id)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.dictionary
            .sections
            .iter()
            .flat_map(|section| section.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        let (section_pos, field_pos) = *self.field_index.get(key)?;
        self.dictionary
            .sections
            .get(section_pos)
            .and_then(|section| section.fields.get(field_pos))
    }

    /// Section that declares the field `key`.
    pub fn section_of(&self, key: &str) -> Option<&SectionDefinition> {
        let (section_pos, _) = *self.field_index.get(key)?;
        self.dictionary.sections.get(section_pos)
    }

    /// Values of a shared enum; empty when the name is unknown.
    pub fn get_enum(&self, name: &str) -> &[String] {
        match self.dictionary.enums.get(name) {
            Some(values) => values,
            None => {
                warn!(enum_name = %name, "unknown enum referenced; using no options");
                &[]
            }
        }
    }

    /// Choices for a field: inline `enum_values` first, then the named enum.
    pub fn choices_for<'a>(&'a self, field: &'a FieldDefinition) -> &'a [String] {
        if let Some(values) = &field.enum_values {
            return values;
        }
        match &field.enum_name {
            Some(name) => self.get_enum(name),
            None => &[],
        }
    }

    pub fn skip_reasons(&self) -> &[String] {
        match &self.dictionary.skip_reasons {
            Some(reasons) => reasons,
            None => self
                .dictionary
                .enums
                .get(SKIP_REASONS_ENUM)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// Evaluates a general-grammar expression against flattened state.
    pub fn evaluate(&self, expression: &str, flat: &FlatState) -> bool {
        self.expressions.evaluate(expression, flat)
    }

    /// Evaluates an auto-skip expression against flattened state.
    pub fn evaluate_auto_skip(&self, expression: &str, flat: &FlatState) -> bool {
        self.expressions.evaluate_auto_skip(expression, flat)
    }
}
