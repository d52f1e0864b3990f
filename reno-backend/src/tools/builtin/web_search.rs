//! Simulated web search over a fixed renovation-topic corpus.
//!
//! A production deployment would swap this for a real search API; the tool
//! contract (query + limit in, ranked results out) stays the same.

use crate::tools::{
    PropertySchema, Tool, ToolContext, ToolDefinition, ToolError, ToolInputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

struct SearchEntry {
    title: &'static str,
    url: &'static str,
    snippet: &'static str,
}

const SEARCH_CORPUS: [SearchEntry; 10] = [
    SearchEntry {
        title: "2024年最新家装设计趋势",
        url: "https://example.com/design-trends-2024",
        snippet: "2024年家装设计趋势包括：1. 自然材质的回归；2. 多功能空间设计；3. 智能家居集成；4. 可持续环保材料；5. 复古元素与现代设计的融合。",
    },
    SearchEntry {
        title: "如何选择靠谱的装修公司 - 专业指南",
        url: "https://example.com/choose-renovation-company",
        snippet: "选择装修公司的关键因素：查看资质证书、实地考察案例、了解施工团队、明确合同条款、询问售后服务。本文提供详细的筛选步骤和注意事项。",
    },
    SearchEntry {
        title: "装修预算控制技巧 - 避免超支的10个方法",
        url: "https://example.com/budget-control-tips",
        snippet: "装修超支是常见问题，本文分享10个有效控制预算的方法：合理规划、材料分级、避免返工、控制设计变更、自行采购主材等。",
    },
    SearchEntry {
        title: "小户型装修攻略 - 空间利用最大化",
        url: "https://example.com/small-apartment-renovation",
        snippet: "小户型装修需要注重空间利用，本文介绍多功能家具选择、色彩搭配、收纳设计、光线利用等方面的专业建议，让小空间也能舒适宜居。",
    },
    SearchEntry {
        title: "装修材料环保指南 - 如何选择健康材料",
        url: "https://example.com/eco-friendly-materials",
        snippet: "装修材料的环保性直接关系到居住健康，本文详细介绍各类装修材料的环保标准、检测方法，以及如何识别真正的环保材料。",
    },
    SearchEntry {
        title: "2024年各地区装修价格参考",
        url: "https://example.com/renovation-price-2024",
        snippet: "最新整理的全国各地区装修价格参考，包括一线城市、二线城市和三四线城市的装修成本对比，以及不同档次装修的价格区间。",
    },
    SearchEntry {
        title: "装修合同签订注意事项 - 法律专家建议",
        url: "https://example.com/renovation-contract-tips",
        snippet: "装修合同是保障业主权益的重要文件，本文由法律专家提供签订装修合同时的注意事项，包括条款解读、常见陷阱和维权方法。",
    },
    SearchEntry {
        title: "装修后除甲醛最有效的方法",
        url: "https://example.com/remove-formaldehyde",
        snippet: "新装修房屋的甲醛问题令人担忧，本文科学分析各种除甲醛方法的有效性，并提供实用的室内空气净化建议。",
    },
    SearchEntry {
        title: "装修施工监理指南 - 如何确保装修质量",
        url: "https://example.com/renovation-supervision",
        snippet: "业主如何做好装修监理？本文详细介绍各个装修阶段的监理要点、验收标准，以及常见问题的处理方法，帮助业主确保装修质量。",
    },
    SearchEntry {
        title: "智能家居系统选购指南2024",
        url: "https://example.com/smart-home-guide-2024",
        snippet: "2024年智能家居系统比较，包括主流品牌功能对比、兼容性分析、安装难度和价格区间，帮助业主选择适合自己的智能家居解决方案。",
    },
];

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct SearchWeb;

#[async_trait]
impl Tool for SearchWeb {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), PropertySchema::string("搜索查询词"));
        properties.insert(
            "limit".to_string(),
            PropertySchema {
                schema_type: "integer".to_string(),
                description: "返回结果数量限制，默认5".to_string(),
                items: None,
                enum_values: None,
            },
        );

        ToolDefinition {
            name: "search_web".to_string(),
            description:
                "搜索网络获取装修相关信息，包括最新的装修趋势、材料价格、装修公司评价等"
                    .to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["query".to_string()],
            },
        }
    }

    async fn execute(&self, args: Value, _context: &ToolContext) -> Result<Value, ToolError> {
        let input: WebSearchInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let query = input.query.to_lowercase();
        let filtered: Vec<&SearchEntry> = SEARCH_CORPUS
            .iter()
            .filter(|entry| {
                entry.title.to_lowercase().contains(&query)
                    || entry.snippet.to_lowercase().contains(&query)
            })
            .collect();

        // No hits falls back to the full corpus, mirroring a search engine
        // returning loosely related results rather than nothing
        let matched: Vec<&SearchEntry> = if filtered.is_empty() {
            SEARCH_CORPUS.iter().collect()
        } else {
            filtered
        };

        let total = matched.len();
        let limit = input.limit.unwrap_or(5);
        let results: Vec<Value> = matched
            .into_iter()
            .take(limit)
            .map(|entry| {
                json!({
                    "title": entry.title,
                    "url": entry.url,
                    "snippet": entry.snippet,
                })
            })
            .collect();

        Ok(json!({
            "results": results,
            "message": format!(
                "找到{}条与\"{}\"相关的结果，显示前{}条。",
                total,
                input.query,
                results.len()
            ),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::ReferenceData;
    use serde_json::json;
    use std::sync::Arc;

    fn empty_context() -> ToolContext {
        ToolContext::new(Arc::new(ReferenceData::empty()))
    }

    #[tokio::test]
    async fn search_filters_by_query() {
        let tool = SearchWeb;
        let output = tool
            .execute(json!({"query": "甲醛"}), &empty_context())
            .await
            .unwrap();
        let results = output["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0]["title"].as_str().unwrap().contains("除甲醛"));
    }

    #[tokio::test]
    async fn unmatched_query_falls_back_to_corpus_with_limit() {
        let tool = SearchWeb;
        let output = tool
            .execute(json!({"query": "火星基地", "limit": 2}), &empty_context())
            .await
            .unwrap();
        assert_eq!(output["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn query_is_required() {
        let tool = SearchWeb;
        let schema = tool.definition().input_schema;
        assert!(crate::tools::validate_args(&schema, &json!({})).is_err());
    }
}
