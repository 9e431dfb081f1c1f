use std::path::PathBuf;

/// Problems decoding the peak blobs of a single spectrum.
///
/// These never abort a run, the filter logs them and treats the
/// spectrum as having no peaks.
#[derive(Debug)]
pub enum PeakDecodeError {
    LengthMismatch {
        array: &'static str,
        expected: usize,
        real: usize,
    },
    Decompression {
        array: &'static str,
        source: std::io::Error,
    },
    InvalidPeak {
        index: usize,
        mz: f64,
        intensity: f32,
    },
    TooManyPeaks {
        array: &'static str,
        num_peaks: usize,
    },
}

impl std::fmt::Display for PeakDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch {
                array,
                expected,
                real,
            } => write!(
                f,
                "{} array decoded to {} bytes, expected {}",
                array, real, expected
            ),
            Self::Decompression { array, source } => {
                write!(f, "unable to decompress {} array: {}", array, source)
            }
            Self::InvalidPeak {
                index,
                mz,
                intensity,
            } => write!(
                f,
                "invalid peak at index {} (mz: {}, intensity: {})",
                index, mz, intensity
            ),
            Self::TooManyPeaks { array, num_peaks } => write!(
                f,
                "{} array cannot hold {} peaks",
                array, num_peaks
            ),
        }
    }
}

/// Fatal problems with the shape or location of a library.
#[derive(Debug)]
pub enum LibraryError {
    MissingFile {
        path: PathBuf,
    },
    MissingTable {
        schema: String,
        table: &'static str,
    },
    MissingColumn {
        schema: String,
        table: &'static str,
        column: &'static str,
    },
    OutputExists {
        path: PathBuf,
    },
    SameInputAndOutput {
        path: PathBuf,
    },
}

#[derive(Debug)]
pub enum FilterError {
    Sqlite {
        source: rusqlite::Error,
        context: String,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Library(LibraryError),
    Config {
        msg: String,
    },
}

impl FilterError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        if let FilterError::Sqlite {
            context: owned_context,
            ..
        } = &mut self
        {
            if !owned_context.is_empty() {
                owned_context.push_str(": ");
            }
            owned_context.push_str(context);
        }
        self
    }
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Sqlite { source, .. } => Some(source),
            FilterError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

impl From<rusqlite::Error> for FilterError {
    fn from(x: rusqlite::Error) -> Self {
        Self::Sqlite {
            source: x,
            context: "".to_string(),
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<LibraryError> for FilterError {
    fn from(x: LibraryError) -> Self {
        Self::Library(x)
    }
}
