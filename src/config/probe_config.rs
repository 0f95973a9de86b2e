use serde::Deserialize;

/// The YAML configuration file of the prober.
/// Holds probe defaults and a list of targets probed on every run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Defaults for `probe tcp`. Command line flags take precedence.
    pub probe: ProbeDefaults,

    /// Targets appended to the ones given on the command line.
    /// Each entry may hold several comma-separated targets.
    pub targets: Vec<String>,
}

/// Probe settings read from the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeDefaults {
    /// Per-attempt dial timeout in seconds. Values of zero or less use the default.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Maximum number of targets probed at the same time.
    /// Values below one are treated as one.
    #[serde(default = "default_concurrency")]
    pub concurrency: i64,

    /// Extra attempts after a transient failure. Negative values mean none.
    #[serde(default)]
    pub retries: i64,

    #[serde(default = "default_case_id")]
    pub case_id: String,

    /// Record directory. An empty string disables persistence.
    #[serde(default = "default_record_dir")]
    pub record_dir: String,

    /// Overall run budget in seconds. Unbounded when not set.
    #[serde(default)]
    pub deadline_secs: Option<f64>,
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            retries: 0,
            case_id: default_case_id(),
            record_dir: default_record_dir(),
            deadline_secs: None,
        }
    }
}

fn default_timeout_secs() -> f64 {
    3.0
}

fn default_concurrency() -> i64 {
    6
}

fn default_case_id() -> String {
    crate::probe::DEFAULT_CASE_ID.to_string()
}

fn default_record_dir() -> String {
    "runs".to_string()
}
