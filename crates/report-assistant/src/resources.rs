//! Static descriptors clients can fetch to learn what the assistant covers

use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;

const REPORT_USAGE: &str = "Financial, HR, AI, CSR, Strategy";

const CAPABILITIES: &[&str] = &[
    "Report Q&A",
    "Page-level citations",
    "Dual-intent handling",
    "HR / IT task proposals",
    "Confirmation-based execution",
    "Audit logging",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResource {
    pub source: String,
    pub usage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesResource {
    pub capabilities: Vec<String>,
}

pub fn policies(config: &AssistantConfig) -> PolicyResource {
    PolicyResource {
        source: config.document.title.clone(),
        usage: REPORT_USAGE.to_string(),
    }
}

pub fn capabilities() -> CapabilitiesResource {
    CapabilitiesResource {
        capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_name_configured_document() {
        let mut config = AssistantConfig::default();
        config.document.title = "FY25 Integrated Report".to_string();
        assert_eq!(policies(&config).source, "FY25 Integrated Report");
    }

    #[test]
    fn test_capabilities_list_confirmation() {
        let caps = capabilities();
        assert!(caps
            .capabilities
            .iter()
            .any(|c| c == "Confirmation-based execution"));
    }
}
