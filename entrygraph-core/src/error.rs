use thiserror::Error;

/// The domain error taxonomy.
///
/// Adapter-originated failures are wrapped exactly once, preserving the
/// provider's own error code.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum StoreErrorKind {
    #[error("bad user input: {0}")]
    BadUserInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad repository data: {0}")]
    BadRepositoryData(String),
    #[error("schema/data mismatch: {0}")]
    SchemaDataMismatch(String),
    #[error("bad schema: {0}")]
    BadSchema(String),
    #[error("in use: {0}")]
    InUse(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("repository adapter error ({code}): {message}")]
    Adapter { code: String, message: String },
}

impl StoreErrorKind {
    pub fn into_error(self) -> StoreError {
        StoreError {
            kind: self,
            argument_name: None,
            argument_value: None,
            field_name: None,
            type_name: None,
        }
    }

    /// The machine-readable error code surfaced to callers.
    pub fn code(&self) -> &str {
        match self {
            Self::BadUserInput(_) => "BAD_USER_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRepositoryData(_) => "BAD_REPOSITORY_DATA",
            Self::SchemaDataMismatch(_) => "SCHEMA_DATA_MISMATCH",
            Self::BadSchema(_) => "BAD_SCHEMA",
            Self::InUse(_) => "IN_USE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Adapter { code, .. } => code,
        }
    }
}

/// A structured domain error: the taxonomy kind plus optional context
/// naming the argument, field and type involved.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub argument_name: Option<String>,
    pub argument_value: Option<String>,
    pub field_name: Option<String>,
    pub type_name: Option<String>,
}

impl StoreError {
    pub fn bad_user_input(msg: impl Into<String>) -> Self {
        StoreErrorKind::BadUserInput(msg.into()).into_error()
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreErrorKind::NotFound(msg.into()).into_error()
    }

    pub fn bad_repository_data(msg: impl Into<String>) -> Self {
        StoreErrorKind::BadRepositoryData(msg.into()).into_error()
    }

    pub fn schema_data_mismatch(msg: impl Into<String>) -> Self {
        StoreErrorKind::SchemaDataMismatch(msg.into()).into_error()
    }

    pub fn bad_schema(msg: impl Into<String>) -> Self {
        StoreErrorKind::BadSchema(msg.into()).into_error()
    }

    pub fn in_use(msg: impl Into<String>) -> Self {
        StoreErrorKind::InUse(msg.into()).into_error()
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        StoreErrorKind::Internal(msg.into()).into_error()
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.argument_name = Some(name.into());
        self.argument_value = Some(value.into());
        self
    }

    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn code(&self) -> &str {
        self.kind.code()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
