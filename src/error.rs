use wasm_bindgen::JsValue;

/// Why a parse was aborted. Each kind maps to one classic GPSU diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("IO error")]
    Io,
    #[error("unknown record type")]
    UnknownRecord,
    #[error("bad field separator")]
    BadSeparator,
    #[error("unacceptable file type")]
    FileType,
    #[error("unacceptable datum")]
    Datum,
    #[error("coordinates in unacceptable format")]
    CoordinateSystem,
    #[error("no 'F' format record prior to data records")]
    MissingSchema,
    #[error("unknown field, or required field missing")]
    Field,
    #[error("a field had an invalid or out-of-range value")]
    Value,
    #[error("duplicate route number")]
    DuplicateRoute,
    #[error("unknown waypoint ID")]
    UnknownWaypoint,
}

/// Failure of a single schema, record or entity decode, before it is tied to a line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", token_suffix(.token))]
pub struct FieldError {
    pub kind: ErrorKind,
    pub token: Option<String>,
}

impl FieldError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, token: None }
    }

    pub fn with_token(kind: ErrorKind, token: &str) -> Self {
        Self {
            kind,
            token: Some(token.to_string()),
        }
    }

    /// Attach the 1-based input line this failure occurred on.
    pub fn at_line(self, line: usize) -> ParseError {
        ParseError {
            line,
            kind: self.kind,
            token: self.token,
        }
    }
}

impl From<ErrorKind> for FieldError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// A parse-scoped failure. The whole parse is abandoned; no partial model survives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}{}", token_suffix(.token))]
pub struct ParseError {
    pub line: usize,
    pub kind: ErrorKind,
    pub token: Option<String>,
}

fn token_suffix(token: &Option<String>) -> String {
    match token {
        Some(t) => format!(" ('{t}')"),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GpsuError {
    #[error("input error: {0}")]
    Parse(#[from] ParseError),

    #[error("unrecognized component '{0}'")]
    Component(char),

    #[error("unable to write to file: {0}")]
    Write(#[source] std::io::Error),

    /// Discard/Keep declined because nothing would be left. The model is unchanged.
    #[error("no data left to write")]
    EmptyFile,

    #[error("failed sorting waypoints: route {route} leg {leg} refers to missing waypoint {index}")]
    Sort {
        route: u32,
        leg: usize,
        index: usize,
    },

    #[error("unable to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no file has been read")]
    NotLoaded,

    #[error("merged route numbers would exceed {max}")]
    RouteNumber { max: u32 },
}

impl GpsuError {
    /// Only an empty-file decline leaves the caller free to carry on and write.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmptyFile)
    }
}

pub type Result<T> = std::result::Result<T, GpsuError>;

impl From<GpsuError> for JsValue {
    fn from(e: GpsuError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}
