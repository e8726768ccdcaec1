use thiserror::Error;

#[derive(Debug, Error)]
pub enum HdfsError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("multiple namenode urls specified: '{first}' and '{second}'")]
    MultipleTargets { first: String, second: String },

    #[error("no paths given")]
    NoPaths,

    #[error("wildcards are not supported here: {0}")]
    GlobNotAllowed(String),

    #[error("configuration: missing key '{0}'")]
    MissingConfig(String),

    #[error("configuration: invalid value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("configuration: no mount point covers '{0}'")]
    NoMountPoint(String),

    #[error("configuration: {0}")]
    ConfigLoad(String),

    #[error("could not connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("no active namenode among [{candidates}]: {last}")]
    NoActiveNamenode {
        candidates: String,
        #[source]
        last: Box<HdfsError>,
    },

    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("remote: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("hdfs: {0}")]
    Internal(String),
}

impl HdfsError {
    /// `true` for errors meaning "this path does not exist".
    ///
    /// Glob expansion drops candidates that fail with this kind of error
    /// and aborts on everything else.
    pub fn is_not_found(&self) -> bool {
        match self {
            HdfsError::NotFound(_) => true,
            HdfsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Classify a WebHDFS `RemoteException` into a more specific error.
    pub fn from_remote(exception: &str, message: &str, path: &str) -> Self {
        match exception {
            "FileNotFoundException" => HdfsError::NotFound(path.to_string()),
            "FileAlreadyExistsException" => HdfsError::AlreadyExists(path.to_string()),
            "AccessControlException" | "SecurityException" => {
                HdfsError::PermissionDenied(path.to_string())
            }
            _ => HdfsError::Remote(format!("{exception}: {message}")),
        }
    }
}

pub type HdfsResult<T> = Result<T, HdfsError>;
