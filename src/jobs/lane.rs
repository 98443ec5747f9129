//! Job lanes
//!
//! A lane is a named category of jobs sharing a handler and a retry policy.
//! The set is closed: producers naming any other lane are rejected.

use crate::error::{JobError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of job lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lane {
    /// Outbound email to a single recipient
    SendEmail,
    /// Email every configured admin about new feedback
    NotifyAdmin,
    /// Batch analytics computation
    Analytics,
    /// Email a generated report with an attachment
    SendReport,
    /// Real-time push to a student's live connections
    NotifyStudent,
}

impl Lane {
    /// All lanes, in a stable order
    pub const ALL: [Lane; 5] = [
        Lane::SendEmail,
        Lane::NotifyAdmin,
        Lane::Analytics,
        Lane::SendReport,
        Lane::NotifyStudent,
    ];

    /// Wire name of the lane
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::SendEmail => "send-email",
            Lane::NotifyAdmin => "notify-admin",
            Lane::Analytics => "analytics",
            Lane::SendReport => "send-report",
            Lane::NotifyStudent => "notify-student",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        Lane::ALL
            .into_iter()
            .find(|lane| lane.as_str() == s)
            .ok_or_else(|| JobError::invalid_lane(s))
    }
}
