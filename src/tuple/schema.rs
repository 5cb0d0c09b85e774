use std::collections::HashMap;
use std::fmt;

use super::DataType;

/// Represents a single column in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    name: String,

    /// Column data type
    data_type: DataType,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the fixed size of this column, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        self.data_type.fixed_size()
    }

    /// Returns the maximum size this column can occupy in bytes.
    pub fn max_size(&self) -> usize {
        self.data_type.max_size()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)
    }
}

/// Describes the column types a tuple's bytes are decoded with.
///
/// Supplied by the caller on every read; pages never store it.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema from an ordered list of columns. On duplicate names,
    /// lookups by name resolve to the first column.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            name_to_index.entry(col.name.clone()).or_insert(i);
        }

        Self {
            columns,
            name_to_index,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).and_then(|i| self.columns.get(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns true if every column has a fixed width, so every tuple of this
    /// schema has the same encoded size.
    pub fn is_fully_inlined(&self) -> bool {
        self.columns.iter().all(|c| c.data_type.is_fixed_size())
    }

    /// Encoded size of a tuple when the schema is fully inlined.
    pub fn fixed_tuple_size(&self) -> Option<usize> {
        self.columns.iter().map(Column::fixed_size).sum()
    }

    /// Largest possible encoded tuple size.
    pub fn max_tuple_size(&self) -> usize {
        self.columns.iter().map(Column::max_size).sum()
    }

    /// Returns a new schema with the columns at the given indices.
    pub fn project(&self, column_indices: &[usize]) -> Option<Schema> {
        let columns: Option<Vec<Column>> = column_indices
            .iter()
            .map(|&i| self.columns.get(i).cloned())
            .collect();

        columns.map(Schema::new)
    }

    /// Returns a new schema with the named columns.
    pub fn project_by_name(&self, column_names: &[&str]) -> Option<Schema> {
        let indices: Option<Vec<usize>> = column_names
            .iter()
            .map(|name| self.column_index(name))
            .collect();

        indices.and_then(|i| self.project(&i))
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }
}
