pub mod budget_calculator;
pub mod company_database;
pub mod knowledge_base;
pub mod web_search;

pub use budget_calculator::{CalculateRenovationBudget, QueryMaterialPrice};
pub use company_database::{GetCompanyReviews, QueryCompanyDatabase};
pub use knowledge_base::{QueryKnowledgeBase, RenovationQa};
pub use web_search::SearchWeb;

use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Create the registry with all built-in renovation tools registered
pub fn create_default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(CalculateRenovationBudget));
    registry.register(Arc::new(QueryMaterialPrice));
    registry.register(Arc::new(QueryCompanyDatabase));
    registry.register(Arc::new(GetCompanyReviews));
    registry.register(Arc::new(QueryKnowledgeBase));
    registry.register(Arc::new(RenovationQa));
    registry.register(Arc::new(SearchWeb));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_contains_all_renovation_tools() {
        let registry = create_default_registry();
        assert_eq!(registry.len(), 7);
        for name in [
            "calculate_renovation_budget",
            "query_material_price",
            "query_company_database",
            "get_company_reviews",
            "query_knowledge_base",
            "renovation_qa",
            "search_web",
        ] {
            assert!(registry.has_tool(name), "missing tool {}", name);
        }
    }
}
