use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Hostname suffixes targets must match. Empty means any public host.
    /// The private/loopback range checks are always on and are not
    /// represented here.
    pub allowed_host_suffixes: Vec<String>,
}
