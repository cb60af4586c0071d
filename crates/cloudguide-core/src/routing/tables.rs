//! Keyword tables and patterns for pricing-query heuristics.
//!
//! The tables are order-sensitive: the first matching row wins, except for
//! regions where the longest matching code wins (so `westus2` is not read
//! as `westus`).

use lazy_static::lazy_static;
use regex::Regex;

/// Azure region codes recognised in free text.
pub const AZURE_REGIONS: &[&str] = &[
    "eastus",
    "eastus2",
    "westus",
    "westus2",
    "westus3",
    "centralus",
    "northcentralus",
    "southcentralus",
    "westcentralus",
    "canadacentral",
    "canadaeast",
    "brazilsouth",
    "brazilsoutheast",
    "northeurope",
    "westeurope",
    "swedencentral",
    "uksouth",
    "ukwest",
    "francecentral",
    "germanywestcentral",
    "switzerlandnorth",
    "norwayeast",
    "eastasia",
    "southeastasia",
    "japaneast",
    "japanwest",
    "australiaeast",
    "australiasoutheast",
    "australiacentral",
    "koreacentral",
    "koreasouth",
    "southindia",
    "centralindia",
    "westindia",
    "uaenorth",
    "israelcentral",
    "qatarcentral",
    "southafricanorth",
];

pub const DEFAULT_PROVIDER: &str = "azure";
pub const DEFAULT_AZURE_REGION: &str = "eastus";
pub const DEFAULT_OTHER_REGION: &str = "us-east-1";
pub const DEFAULT_SERVICE: &str = "Virtual Machines";
pub const DEFAULT_VM_SKU: &str = "D2as v5";
pub const DEFAULT_STORAGE_SKU: &str = "Standard LRS";
pub const GENERAL_SKU: &str = "general";

/// Provider keywords, scanned over separator-free text.
const PROVIDER_KEYWORDS: &[(&[&str], &str)] = &[
    (&["aws", "amazon"], "aws"),
    (&["gcp", "googlecloud"], "gcp"),
];

/// Service keywords, scanned over lowercase text.
const SERVICE_KEYWORDS: &[(&[&str], &str)] = &[
    (
        &["vm", "virtual machine", "virtual machines", "compute"],
        "Virtual Machines",
    ),
    (&["storage", "blob"], "Storage"),
    (&["cache"], "Redis Cache"),
    (&["analytics"], "Azure Synapse Analytics"),
    (&["db", "database"], "Azure Database for MySQL"),
];

/// Storage tier + redundancy; every keyword in a row must be present.
const STORAGE_SKUS: &[(&[&str], &str)] = &[
    (&["archive", "grs"], "Archive GRS"),
    (&["archive", "lrs"], "Archive LRS"),
    (&["premium", "lrs"], "Premium LRS"),
    (&["cool", "lrs"], "Cool LRS"),
    (&["hot", "lrs"], "Hot LRS"),
    (&["grs"], "GRS"),
    (&["lrs"], "LRS"),
];

lazy_static! {
    /// Runs of whitespace, underscores and dashes.
    static ref SEPARATORS: Regex = Regex::new(r"[\s_\-]+").unwrap();

    /// Family + size + suffix + version, e.g. "d2as v5", "D4s_v5", "e2 v3".
    static ref VM_SKU_VERSIONED: Regex = Regex::new(
        r"(?i)\b([bdefgilmnprstuvxz])(\d{1,2})([a-z]{0,3})\s*[_\- ]?v\s*(\d)\b"
    ).unwrap();

    /// Family + size + one-letter suffix, e.g. "B2s", "E4a".
    static ref VM_SKU_SHORT: Regex = Regex::new(
        r"(?i)\b([bdefgilmnprstuvxz])(\d{1,2})([a-z])\b"
    ).unwrap();
}

/// Lowercase and strip separators: "Google Cloud" -> "googlecloud".
pub fn squash(text: &str) -> String {
    SEPARATORS.replace_all(&text.to_lowercase(), "").into_owned()
}

pub fn detect_provider(text: &str) -> &'static str {
    let squashed = squash(text);
    PROVIDER_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| squashed.contains(k)))
        .map(|(_, provider)| *provider)
        .unwrap_or(DEFAULT_PROVIDER)
}

pub fn detect_service(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    SERVICE_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, service)| *service)
        .unwrap_or(DEFAULT_SERVICE)
}

/// Longest Azure region code contained in the text, if any.
pub fn pick_azure_region(text: &str) -> Option<&'static str> {
    let squashed = squash(text);
    AZURE_REGIONS
        .iter()
        .copied()
        .filter(|region| squashed.contains(region))
        .fold(None, |best: Option<&'static str>, region| match best {
            Some(b) if b.len() >= region.len() => Some(b),
            _ => Some(region),
        })
}

/// Normalised VM size, e.g. "D2as v5" or "B2s".
pub fn parse_vm_sku(text: &str) -> Option<String> {
    if let Some(caps) = VM_SKU_VERSIONED.captures(text) {
        return Some(format!(
            "{}{}{} v{}",
            caps[1].to_uppercase(),
            &caps[2],
            caps[3].to_lowercase(),
            &caps[4]
        ));
    }

    VM_SKU_SHORT.captures(text).map(|caps| {
        format!(
            "{}{}{}",
            caps[1].to_uppercase(),
            &caps[2],
            caps[3].to_lowercase()
        )
    })
}

pub fn parse_storage_sku(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    STORAGE_SKUS
        .iter()
        .find(|(keywords, _)| keywords.iter().all(|k| lower.contains(k)))
        .map(|(_, sku)| *sku)
        .unwrap_or(DEFAULT_STORAGE_SKU)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_detection() {
        assert_eq!(detect_provider("price of amazon ec2"), "aws");
        assert_eq!(detect_provider("Google-Cloud storage cost"), "gcp");
        assert_eq!(detect_provider("google cloud storage cost"), "gcp");
        assert_eq!(detect_provider("price of a vm"), "azure");
    }

    #[test]
    fn test_service_table_order() {
        assert_eq!(detect_service("vm price"), "Virtual Machines");
        assert_eq!(detect_service("blob storage cost"), "Storage");
        assert_eq!(detect_service("redis cache price"), "Redis Cache");
        assert_eq!(detect_service("analytics cost"), "Azure Synapse Analytics");
        assert_eq!(detect_service("mysql database price"), "Azure Database for MySQL");
        assert_eq!(detect_service("how much is it"), "Virtual Machines");
    }

    #[test]
    fn test_region_prefers_longest_match() {
        assert_eq!(pick_azure_region("price in westus2"), Some("westus2"));
        assert_eq!(pick_azure_region("price in west us"), Some("westus"));
        assert_eq!(pick_azure_region("price in south-east asia"), Some("southeastasia"));
        assert_eq!(pick_azure_region("price on the moon"), None);
    }

    #[test]
    fn test_vm_sku_patterns() {
        assert_eq!(parse_vm_sku("d2as v5 price").as_deref(), Some("D2as v5"));
        assert_eq!(parse_vm_sku("D4s_v5 cost").as_deref(), Some("D4s v5"));
        assert_eq!(parse_vm_sku("e2 v3").as_deref(), Some("E2 v3"));
        assert_eq!(parse_vm_sku("b2s vm").as_deref(), Some("B2s"));
        assert_eq!(parse_vm_sku("vm price"), None);
    }

    #[test]
    fn test_storage_sku_order() {
        assert_eq!(parse_storage_sku("archive grs"), "Archive GRS");
        assert_eq!(parse_storage_sku("archive lrs"), "Archive LRS");
        assert_eq!(parse_storage_sku("premium lrs"), "Premium LRS");
        assert_eq!(parse_storage_sku("cool lrs"), "Cool LRS");
        assert_eq!(parse_storage_sku("hot lrs"), "Hot LRS");
        assert_eq!(parse_storage_sku("grs"), "GRS");
        assert_eq!(parse_storage_sku("lrs"), "LRS");
        assert_eq!(parse_storage_sku("storage"), "Standard LRS");
    }
}
