use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to serialize record for table '{0}': {1}")]
	Serialization(&'static str, #[source] serde_json::Error),
	#[error("failed to deserialize record from table '{0}': {1}")]
	Deserialization(&'static str, #[source] serde_json::Error),
	#[error("records of table '{0}' must be objects")]
	NotAnObject(&'static str),
	#[error("record for table '{table}' is missing primary key field '{field}'")]
	MissingPrimaryKey {
		table: &'static str,
		field: &'static str,
	},
	#[error("storage backend failure: {0}")]
	Backend(String),
}
