//! Knowledge-base search and question answering over the article corpus.

use crate::tools::{
    PropertySchema, Tool, ToolContext, ToolDefinition, ToolError, ToolInputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct KnowledgeQueryInput {
    query: String,
    #[serde(default)]
    category: Option<String>,
}

pub struct QueryKnowledgeBase;

#[async_trait]
impl Tool for QueryKnowledgeBase {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), PropertySchema::string("查询关键词或问题"));
        properties.insert(
            "category".to_string(),
            PropertySchema::string(
                "知识类别，如\"装修流程\"、\"设计风格\"、\"材料选择\"、\"施工管理\"、\"预算规划\"等",
            ),
        );

        ToolDefinition {
            name: "query_knowledge_base".to_string(),
            description:
                "查询装修知识库，获取关于装修流程、设计风格、材料选择、施工管理等方面的专业知识"
                    .to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["query".to_string()],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: KnowledgeQueryInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let query = input.query.to_lowercase();
        let mut results: Vec<Value> = vec![];
        let mut title_match: Vec<bool> = vec![];

        for category in &context.data.knowledge {
            if let Some(wanted) = input.category.as_deref() {
                if !category.name.to_lowercase().contains(&wanted.to_lowercase()) {
                    continue;
                }
            }
            for article in &category.articles {
                let in_title = article.title.to_lowercase().contains(&query);
                let matches = in_title
                    || article.content.to_lowercase().contains(&query)
                    || article.tags.iter().any(|t| t.to_lowercase().contains(&query));
                if matches {
                    results.push(json!({
                        "id": article.id,
                        "title": article.title,
                        "content": article.content,
                        "category": category.name,
                        "tags": article.tags,
                    }));
                    title_match.push(in_title);
                }
            }
        }

        // Title matches rank first, otherwise preserve corpus order
        let mut indexed: Vec<usize> = (0..results.len()).collect();
        indexed.sort_by_key(|&i| if title_match[i] { 0 } else { 1 });
        let results: Vec<Value> = indexed.into_iter().map(|i| results[i].clone()).collect();

        let message = if results.is_empty() {
            format!("没有找到与\"{}\"相关的文章。", input.query)
        } else {
            format!("找到{}篇与\"{}\"相关的文章。", results.len(), input.query)
        };

        Ok(json!({"articles": results, "message": message}))
    }
}

#[derive(Debug, Deserialize)]
struct QaInput {
    question: String,
}

const GENERIC_ANSWER: &str = "这是一个关于装修的重要问题。建议您咨询专业的装修公司或设计师，\
以获取针对您具体情况的建议。装修是一项复杂的工程，需要考虑多方面因素，包括预算、风格、\
材料选择、施工质量等。";

/// Extract scoring keywords from a question: punctuation stripped, split on
/// whitespace, single characters dropped. For Chinese questions without
/// spaces this typically yields the whole cleaned question as one keyword,
/// which still matches via substring containment.
fn extract_keywords(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .replace(['?', '？', '.', ',', '，', '。', '!', '！'], " ")
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(|w| w.to_string())
        .collect()
}

pub struct RenovationQa;

#[async_trait]
impl Tool for RenovationQa {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert("question".to_string(), PropertySchema::string("关于装修的问题"));

        ToolDefinition {
            name: "renovation_qa".to_string(),
            description: "回答关于装修的常见问题，提供专业建议".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["question".to_string()],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: QaInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let keywords = extract_keywords(&input.question);

        struct Scored<'a> {
            article: &'a crate::datasets::Article,
            category: &'a str,
            score: u32,
        }

        let mut scored: Vec<Scored> = vec![];
        for category in &context.data.knowledge {
            for article in &category.articles {
                let title = article.title.to_lowercase();
                let content = article.content.to_lowercase();
                let mut score = 0u32;
                for keyword in &keywords {
                    if title.contains(keyword.as_str()) {
                        score += 3;
                    }
                    if content.contains(keyword.as_str()) {
                        score += 1;
                    }
                    if article
                        .tags
                        .iter()
                        .any(|t| t.to_lowercase().contains(keyword.as_str()))
                    {
                        score += 2;
                    }
                }
                if score > 0 {
                    scored.push(Scored {
                        article,
                        category: &category.name,
                        score,
                    });
                }
            }
        }

        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let answer = scored
            .first()
            .map(|s| s.article.content.clone())
            .unwrap_or_else(|| GENERIC_ANSWER.to_string());

        let related: Vec<Value> = scored
            .iter()
            .take(3)
            .map(|s| {
                json!({
                    "id": s.article.id,
                    "title": s.article.title,
                    "category": s.category,
                })
            })
            .collect();

        let message = if related.is_empty() {
            "没有找到与问题直接相关的文章。".to_string()
        } else {
            format!("找到{}篇相关文章供参考。", related.len())
        };

        Ok(json!({
            "answer": answer,
            "related_articles": related,
            "message": message,
        }))
    }
}
