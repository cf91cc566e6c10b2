pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("shader compile error: {0}")]
    ShaderCompile(String),

    #[error("program link error: {0}")]
    ProgramLink(String),

    #[error("raster error: {0}")]
    Raster(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn context_unavailable(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    pub fn shader_compile(msg: impl Into<String>) -> Self {
        Self::ShaderCompile(msg.into())
    }

    pub fn program_link(msg: impl Into<String>) -> Self {
        Self::ProgramLink(msg.into())
    }

    pub fn raster(msg: impl Into<String>) -> Self {
        Self::Raster(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Why a [`crate::Compositor`] stopped doing work.
///
/// Every variant is terminal for the lifetime of the instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisableReason {
    ContextUnavailable(String),
    ShaderCompile(String),
    ProgramLink(String),
    /// The configuration failed validation before any resource was acquired.
    InvalidConfig(String),
    /// A backend call failed after initialization (device lost, bad upload).
    Backend(String),
    Disposed,
}

impl From<PipelineError> for DisableReason {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ContextUnavailable(msg) => Self::ContextUnavailable(msg),
            PipelineError::ShaderCompile(msg) => Self::ShaderCompile(msg),
            PipelineError::ProgramLink(msg) => Self::ProgramLink(msg),
            PipelineError::Config(msg) => Self::InvalidConfig(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl std::fmt::Display for DisableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContextUnavailable(msg) => write!(f, "graphics context unavailable: {msg}"),
            Self::ShaderCompile(msg) => write!(f, "shader failed to compile: {msg}"),
            Self::ProgramLink(msg) => write!(f, "shader program failed to link: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Backend(msg) => write!(f, "backend failure: {msg}"),
            Self::Disposed => f.write_str("disposed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            PipelineError::context_unavailable("x")
                .to_string()
                .contains("graphics context unavailable:")
        );
        assert!(
            PipelineError::shader_compile("x")
                .to_string()
                .contains("shader compile error:")
        );
        assert!(
            PipelineError::program_link("x")
                .to_string()
                .contains("program link error:")
        );
        assert!(PipelineError::raster("x").to_string().contains("raster error:"));
        assert!(PipelineError::config("x").to_string().contains("config error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = PipelineError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn disable_reason_keeps_init_failure_kind() {
        assert_eq!(
            DisableReason::from(PipelineError::shader_compile("bad token")),
            DisableReason::ShaderCompile("bad token".to_string())
        );
        assert_eq!(
            DisableReason::from(PipelineError::program_link("mismatch")),
            DisableReason::ProgramLink("mismatch".to_string())
        );
        assert_eq!(
            DisableReason::from(PipelineError::config("low >= high")),
            DisableReason::InvalidConfig("low >= high".to_string())
        );
        assert!(matches!(
            DisableReason::from(PipelineError::raster("oom")),
            DisableReason::Backend(msg) if msg.contains("oom")
        ));
    }
}
