//! Plan selection and pricing-query parsing.
//!
//! Both are pure functions of the query text. The router unit in
//! `cloudguide-runtime` calls [`decide`] once per query and, for pricing
//! plans, [`parse_pricing_query`] on the normalized text.

pub mod tables;

use crate::types::{Plan, PricingQuery};

const ASK_PREFIX: &str = "ask:";

/// Result of classifying one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub plan: Plan,

    /// Trimmed, lowercased text
    pub normalized: String,

    /// Question forwarded to retrieval (only for `RetrievalThenLlm`)
    pub question: Option<String>,
}

/// Choose a plan for the raw query text.
///
/// `ask:` takes precedence over pricing keywords, so
/// `"ask: what does storage cost?"` is a retrieval question.
pub fn decide(text: &str) -> RoutingDecision {
    let trimmed = text.trim();
    let normalized = trimmed.to_lowercase();

    let has_ask_prefix = trimmed
        .get(..ASK_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ASK_PREFIX));

    if has_ask_prefix {
        let question = trimmed[ASK_PREFIX.len()..].trim().to_string();
        return RoutingDecision {
            plan: Plan::RetrievalThenLlm,
            normalized,
            question: Some(question),
        };
    }

    let plan = if normalized.contains("price") || normalized.contains("cost") {
        Plan::Pricing
    } else {
        Plan::LlmOnly
    };

    RoutingDecision {
        plan,
        normalized,
        question: None,
    }
}

/// Derive a structured pricing lookup from free text.
///
/// Never fails: every field falls back to a default.
pub fn parse_pricing_query(text: &str) -> PricingQuery {
    let provider = tables::detect_provider(text);
    let service = tables::detect_service(text);

    let region = if provider == "azure" {
        tables::pick_azure_region(text).unwrap_or(tables::DEFAULT_AZURE_REGION)
    } else {
        tables::DEFAULT_OTHER_REGION
    };

    let sku = match service {
        "Virtual Machines" => {
            tables::parse_vm_sku(text).unwrap_or_else(|| tables::DEFAULT_VM_SKU.to_string())
        }
        "Storage" => tables::parse_storage_sku(text).to_string(),
        _ => tables::GENERAL_SKU.to_string(),
    };

    PricingQuery::new(provider, service, region, sku)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ask_prefix_routes_to_retrieval() {
        let decision = decide("  Ask:  What is a NAT gateway?  ");
        assert_eq!(decision.plan, Plan::RetrievalThenLlm);
        assert_eq!(decision.question.as_deref(), Some("What is a NAT gateway?"));
        assert_eq!(decision.normalized, "ask:  what is a nat gateway?");
    }

    #[test]
    fn test_ask_prefix_wins_over_price_keyword() {
        let decision = decide("ask: what does blob storage cost?");
        assert_eq!(decision.plan, Plan::RetrievalThenLlm);
        assert_eq!(
            decision.question.as_deref(),
            Some("what does blob storage cost?")
        );
    }

    #[test]
    fn test_price_and_cost_route_to_pricing() {
        assert_eq!(decide("Price of a D2as v5").plan, Plan::Pricing);
        assert_eq!(decide("how much does redis COST").plan, Plan::Pricing);
        assert!(decide("vm price").question.is_none());
    }

    #[test]
    fn test_everything_else_is_llm_only() {
        assert_eq!(decide("what's the weather").plan, Plan::LlmOnly);
        assert_eq!(decide("").plan, Plan::LlmOnly);
        assert_eq!(decide("ask").plan, Plan::LlmOnly);
    }

    #[test]
    fn test_storage_query_end_to_end_parse() {
        let decision = decide("price azure storage archive grs in westus2");
        let query = parse_pricing_query(&decision.normalized);

        assert_eq!(query.provider, "azure");
        assert_eq!(query.service_name, "Storage");
        assert_eq!(query.region, "westus2");
        assert_eq!(query.sku_contains, "Archive GRS");
        assert_eq!(query.price_type, "Consumption");
        assert_eq!(query.currency_code, "USD");
    }

    #[test]
    fn test_vm_query_defaults() {
        let query = parse_pricing_query("vm price");
        assert_eq!(query.service_name, "Virtual Machines");
        assert_eq!(query.region, "eastus");
        assert_eq!(query.sku_contains, "D2as v5");
    }

    #[test]
    fn test_vm_sku_and_region_extracted() {
        let query = parse_pricing_query("price of d4s_v5 in north europe");
        assert_eq!(query.sku_contains, "D4s v5");
        assert_eq!(query.region, "northeurope");
    }

    #[test]
    fn test_non_azure_provider_uses_default_region() {
        let query = parse_pricing_query("aws storage price in westus2");
        assert_eq!(query.provider, "aws");
        assert_eq!(query.region, "us-east-1");
    }

    #[test]
    fn test_other_services_use_general_sku() {
        let query = parse_pricing_query("redis cache price");
        assert_eq!(query.service_name, "Redis Cache");
        assert_eq!(query.sku_contains, "general");
    }

    proptest! {
        #[test]
        fn prop_price_keyword_selects_pricing(
            before in "[a-z ]{0,20}",
            keyword in prop_oneof![Just("price"), Just("cost"), Just("PRICE"), Just("Cost")],
            after in "[a-z ]{0,20}",
        ) {
            let text = format!("{}{}{}", before, keyword, after);
            let decision = decide(&text);
            prop_assume!(!decision.normalized.starts_with("ask:"));
            prop_assert_eq!(decision.plan, Plan::Pricing);
        }

        #[test]
        fn prop_ask_prefix_forwards_trimmed_remainder(
            lead in "[ \t]{0,3}",
            prefix in prop_oneof![Just("ask:"), Just("ASK:"), Just("Ask:")],
            rest in "[a-zA-Z0-9 ?]{0,40}",
        ) {
            let text = format!("{}{}{}", lead, prefix, rest);
            let decision = decide(&text);
            prop_assert_eq!(decision.plan, Plan::RetrievalThenLlm);
            prop_assert_eq!(decision.question, Some(rest.trim().to_string()));
        }

        #[test]
        fn prop_parse_never_leaves_fields_empty(text in ".{0,80}") {
            let query = parse_pricing_query(&text);
            prop_assert!(!query.provider.is_empty());
            prop_assert!(!query.service_name.is_empty());
            prop_assert!(!query.region.is_empty());
            prop_assert!(!query.sku_contains.is_empty());
        }
    }
}
