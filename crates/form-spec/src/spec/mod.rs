pub mod dictionary;
pub mod field;
pub mod validation;

pub use dictionary::{ClearOnGateChange, Dictionary, Gate, SectionAutoSkip, SectionDefinition};
pub use field::{FieldDefinition, FieldType, ItemFieldSpec};
pub use validation::{CrossFieldValidation, ExceptionsRule};
