//! Bunch of hosts: plain hosts sharing a network, no orchestrator

use super::FlavorPolicy;
use crate::enums::{Complexity, Flavor};
use safescale_utils::scerr::Error;
use std::str::FromStr;

/// BOH policy
#[derive(Debug, Clone, Copy, Default)]
pub struct BohPolicy;

impl FlavorPolicy for BohPolicy {
    fn flavor(&self) -> Flavor {
        Flavor::Boh
    }

    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32) {
        match complexity {
            Complexity::Small => (1, 1),
            Complexity::Normal => (3, 3),
            Complexity::Large => (5, 3),
        }
    }

    fn default_image(&self) -> &'static str {
        "CentOS 7.3"
    }

    fn describe_retcode(&self, retcode: i32) -> Option<String> {
        ErrorCode::from_retcode(retcode).map(|code| code.to_string())
    }
}

/// Return codes of the BOH installation scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorCode {
    /// The host runs a distribution the scripts do not support
    #[error("UnsupportedDistribution")]
    UnsupportedDistribution = 1,
    /// MPICH sources could not be downloaded
    #[error("MPICHSourceDownload")]
    MpichSourceDownload = 2,
    /// MPICH failed to compile
    #[error("MPICHCompile")]
    MpichCompile = 3,
    /// MPICH failed to install
    #[error("MPICHInstall")]
    MpichInstall = 4,
}

impl ErrorCode {
    const ALL: [ErrorCode; 4] = [
        ErrorCode::UnsupportedDistribution,
        ErrorCode::MpichSourceDownload,
        ErrorCode::MpichCompile,
        ErrorCode::MpichInstall,
    ];

    /// Code matching a script return code
    pub fn from_retcode(retcode: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| *code as i32 == retcode)
    }
}

impl FromStr for ErrorCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|code| code.to_string().to_lowercase() == lowered)
            .ok_or_else(|| {
                Error::invalid_parameter(
                    "error code",
                    format!("failed to find an error code matching with '{}'", s),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            "mpichcompile".parse::<ErrorCode>().unwrap(),
            ErrorCode::MpichCompile
        );
        assert_eq!(
            "UNSUPPORTEDDISTRIBUTION".parse::<ErrorCode>().unwrap(),
            ErrorCode::UnsupportedDistribution
        );
        assert!("mpich".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn test_retcode_description() {
        assert_eq!(BohPolicy.describe_retcode(4).as_deref(), Some("MPICHInstall"));
        assert_eq!(BohPolicy.describe_retcode(0), None);
        assert_eq!(BohPolicy.describe_retcode(5), None);
    }
}
