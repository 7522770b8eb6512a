use serde::{Deserialize, Serialize};

use crate::error::VecError;

/// Column type of a collection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    FloatVector { dim: usize },
    VarChar { max_length: usize },
}

/// A single named column of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub dtype: DataType,
    #[serde(default)]
    pub is_primary: bool,
}

impl FieldSchema {
    /// Primary Int64 key column.
    pub fn primary(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: DataType::Int64,
            is_primary: true,
        }
    }

    /// Float vector column of fixed dimension.
    pub fn vector(name: &str, dim: usize) -> Self {
        Self {
            name: name.to_string(),
            dtype: DataType::FloatVector { dim },
            is_primary: false,
        }
    }

    /// Bounded string column.
    pub fn varchar(name: &str, max_length: usize) -> Self {
        Self {
            name: name.to_string(),
            dtype: DataType::VarChar { max_length },
            is_primary: false,
        }
    }
}

/// Field list of a collection. Fixed at creation and never altered.
///
/// A valid schema has exactly one primary Int64 field, exactly one float
/// vector field and at most one VarChar field (the filename column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn new(fields: Vec<FieldSchema>, description: &str) -> Self {
        Self {
            description: description.to_string(),
            fields,
        }
    }

    pub fn validate(&self) -> Result<(), VecError> {
        let primaries: Vec<&FieldSchema> = self.fields.iter().filter(|f| f.is_primary).collect();
        match primaries.as_slice() {
            [f] if f.dtype == DataType::Int64 => {}
            [_] => return Err(VecError::InvalidSchema("primary field must be Int64".into())),
            _ => {
                return Err(VecError::InvalidSchema(format!(
                    "want exactly one primary field, got {}",
                    primaries.len()
                )));
            }
        }

        let vectors = self
            .fields
            .iter()
            .filter(|f| matches!(f.dtype, DataType::FloatVector { .. }))
            .count();
        if vectors != 1 {
            return Err(VecError::InvalidSchema(format!(
                "want exactly one vector field, got {vectors}"
            )));
        }
        if self.dim() == 0 {
            return Err(VecError::InvalidSchema("vector dimension must be positive".into()));
        }

        let varchars = self
            .fields
            .iter()
            .filter(|f| matches!(f.dtype, DataType::VarChar { .. }))
            .count();
        if varchars > 1 {
            return Err(VecError::InvalidSchema(format!(
                "want at most one varchar field, got {varchars}"
            )));
        }

        let mut names: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.fields.len() {
            return Err(VecError::InvalidSchema("duplicate field name".into()));
        }
        Ok(())
    }

    /// Dimension of the vector field, 0 if the schema has none.
    pub fn dim(&self) -> usize {
        self.vector_field()
            .and_then(|f| match f.dtype {
                DataType::FloatVector { dim } => Some(dim),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn vector_field(&self) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| matches!(f.dtype, DataType::FloatVector { .. }))
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// Maximum filename length in bytes, `None` if the schema stores no
    /// filename.
    pub fn filename_max_length(&self) -> Option<usize> {
        self.fields.iter().find_map(|f| match f.dtype {
            DataType::VarChar { max_length } => Some(max_length),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_schema() -> CollectionSchema {
        CollectionSchema::new(
            vec![
                FieldSchema::primary("id"),
                FieldSchema::vector("vector", 768),
                FieldSchema::varchar("filename", 255),
            ],
            "audio",
        )
    }

    #[test]
    fn valid_schema_accessors() {
        let s = audio_schema();
        s.validate().unwrap();
        assert_eq!(s.dim(), 768);
        assert_eq!(s.vector_field().unwrap().name, "vector");
        assert_eq!(s.primary_field().unwrap().name, "id");
        assert_eq!(s.filename_max_length(), Some(255));
    }

    #[test]
    fn rejects_missing_primary() {
        let s = CollectionSchema::new(vec![FieldSchema::vector("v", 2)], "");
        assert!(matches!(s.validate(), Err(VecError::InvalidSchema(_))));
    }

    #[test]
    fn rejects_two_vectors() {
        let s = CollectionSchema::new(
            vec![
                FieldSchema::primary("id"),
                FieldSchema::vector("a", 2),
                FieldSchema::vector("b", 2),
            ],
            "",
        );
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_zero_dim() {
        let s = CollectionSchema::new(
            vec![FieldSchema::primary("id"), FieldSchema::vector("v", 0)],
            "",
        );
        assert!(s.validate().is_err());
    }

    #[test]
    fn schema_without_filename() {
        let s = CollectionSchema::new(
            vec![FieldSchema::primary("id"), FieldSchema::vector("v", 4)],
            "",
        );
        s.validate().unwrap();
        assert_eq!(s.filename_max_length(), None);
    }
}
