//! Capability agents: policy data bound to a tool subset.
//!
//! An agent is pure data: name, one-line responsibility (shown to the
//! router), instruction text (the system prompt), and the names of the tools
//! it may call. One shared invocation algorithm in the session module drives
//! every agent; there is no per-agent behavior beyond this data.

use crate::tools::ToolRegistry;

#[derive(Debug, Clone)]
pub struct CapabilityAgent {
    /// Unique name, referenced by router decisions
    pub name: String,
    /// One-line responsibility shown in the routing prompt
    pub responsibility: String,
    /// Policy text used as the agent's system prompt
    pub instructions: String,
    /// Explicitly bound tool subset; requests for anything else are a
    /// policy violation
    pub tools: Vec<String>,
}

impl CapabilityAgent {
    pub fn new(
        name: &str,
        responsibility: &str,
        instructions: &str,
        tools: &[&str],
    ) -> Self {
        CapabilityAgent {
            name: name.to_string(),
            responsibility: responsibility.to_string(),
            instructions: instructions.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_bound(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }
}

/// The fixed set of agents available to the router, plus the designated
/// fallback used when a routing decision is empty or unparseable.
pub struct AgentSet {
    agents: Vec<CapabilityAgent>,
    fallback: String,
}

impl AgentSet {
    pub fn new(agents: Vec<CapabilityAgent>, fallback: &str) -> Result<Self, String> {
        if !agents.iter().any(|a| a.name == fallback) {
            return Err(format!("Fallback agent '{}' is not in the agent set", fallback));
        }
        Ok(AgentSet {
            agents,
            fallback: fallback.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityAgent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn fallback(&self) -> &CapabilityAgent {
        // Validated at construction
        self.get(&self.fallback).unwrap()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityAgent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Verify every bound tool name resolves in the registry. A dangling
    /// binding is a configuration defect and is rejected at startup rather
    /// than surfacing as a mid-session policy violation.
    pub fn validate_bindings(&self, registry: &ToolRegistry) -> Result<(), String> {
        for agent in &self.agents {
            for tool in &agent.tools {
                if !registry.has_tool(tool) {
                    return Err(format!(
                        "Agent '{}' binds unknown tool '{}'",
                        agent.name, tool
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The renovation assistant's agent catalog. The knowledge agent doubles as
/// the general-knowledge fallback.
pub fn create_default_agents() -> AgentSet {
    let agents = vec![
        CapabilityAgent::new(
            "company_recommendation",
            "根据用户需求推荐装修公司",
            "你是一位专业的装修公司推荐顾问。你的工作是根据用户的装修需求、预算、风格偏好和地理位置，\
             推荐合适的装修公司。考虑公司的专业领域、价格范围、评价和经验，提供多个选择并说明各自的\
             优缺点，解释推荐理由。保持专业、客观的态度，不偏向任何特定公司。",
            &["query_company_database", "get_company_reviews"],
        ),
        CapabilityAgent::new(
            "company_evaluation",
            "评估和比较装修公司",
            "你是一位专业的装修公司评价分析师。你的工作是对特定装修公司进行全面、客观的评价：\
             分析公司的优势和劣势，总结用户评价和市场口碑，评估设计能力、施工质量、服务态度和\
             价格合理性。保持客观、公正的态度，避免过度褒贬。",
            &["get_company_reviews", "search_web"],
        ),
        CapabilityAgent::new(
            "knowledge",
            "回答关于装修流程和最佳实践的问题",
            "你是一位专业的装修知识顾问。你的工作是回答用户关于装修的各类问题：解释装修流程、\
             材料选择、设计风格等方面的信息，分享装修经验和最佳实践。提供全面、准确的信息，\
             解释专业术语，使用通俗易懂的语言。对于复杂问题，提供系统性的解答和分步骤指导。",
            &["query_knowledge_base", "renovation_qa", "search_web"],
        ),
        CapabilityAgent::new(
            "budget_calculation",
            "生成详细的装修预算",
            "你是一位装修预算专家。你的工作是根据用户需求生成详细准确的装修预算：考虑中国各地区的\
             价格差异，提供成本的详细明细（材料、人工、设计等），解释计算中的任何假设，并在适当时\
             提供节省成本的建议。始终透明地说明成本的计算方式。",
            &["calculate_renovation_budget", "query_material_price"],
        ),
        CapabilityAgent::new(
            "web_search",
            "在网上搜索最新的装修信息",
            "你是一位专业的装修信息搜索专家。你的工作是搜索并获取最新的装修相关信息：装修趋势、\
             材料价格、公司评价等。使用精确的搜索关键词，筛选最相关、最可靠的信息来源，总结关键\
             信息并提供来源。保持客观、中立的态度。",
            &["search_web"],
        ),
    ];

    // Construction is infallible here: the fallback name is in the list
    AgentSet::new(agents, "knowledge").expect("default agent set must include fallback")
}
