//! Renovation company directory queries and review summaries.

use crate::datasets::Company;
use crate::tools::{
    PropertySchema, Tool, ToolContext, ToolDefinition, ToolError, ToolInputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

const POSITIVE_POINTS: [&str; 5] = [
    "设计方案创新，符合业主需求",
    "施工质量有保障，工艺精细",
    "服务态度好，沟通顺畅",
    "材料选择环保，品质可靠",
    "施工进度按计划进行，不拖延",
];

const NEGATIVE_POINTS: [&str; 5] = [
    "价格相对较高",
    "部分细节处理不够完美",
    "售后响应速度有待提高",
    "个别工人专业素养不够高",
    "设计方案修改次数有限制",
];

#[derive(Debug, Deserialize)]
struct CompanyQueryInput {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    specialization: Option<String>,
    #[serde(default)]
    price_range: Option<String>,
    #[serde(default)]
    min_rating: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct QueryCompanyDatabase;

#[async_trait]
impl Tool for QueryCompanyDatabase {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert(
            "location".to_string(),
            PropertySchema::string("城市名称，如\"北京\"、\"上海\"等"),
        );
        properties.insert(
            "specialization".to_string(),
            PropertySchema::string("专业领域，如\"全屋装修\"、\"厨房\"、\"卫生间\"等"),
        );
        properties.insert(
            "price_range".to_string(),
            PropertySchema::string("价格范围，如\"高端\"、\"中高端\"、\"中端\"等"),
        );
        properties.insert(
            "min_rating".to_string(),
            PropertySchema::number("最低评分，1-5之间的数字"),
        );
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
            name: "query_company_database".to_string(),
            description: "查询装修公司数据库，根据位置、专业领域、价格范围等条件筛选装修公司"
                .to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec![],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: CompanyQueryInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let matches: Vec<&Company> = context
            .data
            .companies
            .iter()
            .filter(|company| {
                input
                    .location
                    .as_deref()
                    .map(|wanted| {
                        company.location.to_lowercase().contains(&wanted.to_lowercase())
                    })
                    .unwrap_or(true)
            })
            .filter(|company| {
                input
                    .specialization
                    .as_deref()
                    .map(|wanted| {
                        let wanted = wanted.to_lowercase();
                        company
                            .specializations
                            .iter()
                            .any(|s| s.to_lowercase().contains(&wanted))
                    })
                    .unwrap_or(true)
            })
            .filter(|company| {
                input
                    .price_range
                    .as_deref()
                    .map(|wanted| {
                        company.price_range.to_lowercase().contains(&wanted.to_lowercase())
                    })
                    .unwrap_or(true)
            })
            .filter(|company| {
                input
                    .min_rating
                    .map(|min| company.rating >= min)
                    .unwrap_or(true)
            })
            .collect();

        let total_results = matches.len();
        let limit = input.limit.unwrap_or(5);
        let limited: Vec<&Company> = matches.into_iter().take(limit).collect();

        let message = if limited.is_empty() {
            "没有找到符合条件的装修公司。".to_string()
        } else {
            format!(
                "找到{}家符合条件的装修公司，显示前{}家。",
                total_results,
                limited.len()
            )
        };

        Ok(json!({
            "companies": limited,
            "total_results": total_results,
            "message": message,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct CompanyReviewInput {
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
}

fn overall_impression(rating: f64) -> &'static str {
    if rating >= 4.5 {
        "该公司是当地知名度高、口碑极佳的装修公司，以高品质施工和优质服务著称。"
    } else if rating >= 4.0 {
        "该公司整体表现良好，是值得信赖的装修公司，性价比较高。"
    } else if rating >= 3.5 {
        "该公司服务质量中上，有一定优势，但也存在一些需要改进的地方。"
    } else {
        "该公司评价一般，建议在选择前做更多调研和比较。"
    }
}

pub struct GetCompanyReviews;

#[async_trait]
impl Tool for GetCompanyReviews {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert("company_id".to_string(), PropertySchema::string("公司ID"));
        properties.insert(
            "company_name".to_string(),
            PropertySchema::string("公司名称（如果不知道ID）"),
        );

        ToolDefinition {
            name: "get_company_reviews".to_string(),
            description: "获取特定装修公司的详细评价信息".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec![],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: CompanyReviewInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        if input.company_id.is_none() && input.company_name.is_none() {
            return Err(ToolError::validation(
                vec!["company_id".to_string(), "company_name".to_string()],
                "either company_id or company_name must be provided",
            ));
        }

        let company = context.data.companies.iter().find(|c| {
            if let Some(id) = input.company_id.as_deref() {
                c.id == id
            } else if let Some(name) = input.company_name.as_deref() {
                c.name.to_lowercase().contains(&name.to_lowercase())
            } else {
                false
            }
        });

        let company = match company {
            Some(c) => c,
            None => {
                return Ok(json!({
                    "company_info": {
                        "id": "",
                        "name": input.company_name.unwrap_or_default(),
                        "location": "",
                        "rating": 0.0,
                        "review_count": 0,
                        "price_range": "",
                    },
                    "review_summary": {
                        "positive_points": [],
                        "negative_points": [],
                        "overall_impression": "",
                    },
                    "message": "未找到该公司信息。",
                }));
            }
        };

        // Review points scale with the rating: better-rated companies keep
        // more positives and fewer negatives.
        let positive_count = ((company.rating / 5.0) * POSITIVE_POINTS.len() as f64).ceil() as usize;
        let negative_count =
            (((5.0 - company.rating) / 5.0) * NEGATIVE_POINTS.len() as f64).ceil() as usize;

        let positive_points: Vec<&str> = POSITIVE_POINTS
            .iter()
            .take(positive_count.min(POSITIVE_POINTS.len()))
            .copied()
            .collect();
        let negative_points: Vec<&str> = NEGATIVE_POINTS
            .iter()
            .take(negative_count.min(NEGATIVE_POINTS.len()))
            .copied()
            .collect();

        Ok(json!({
            "company_info": {
                "id": company.id,
                "name": company.name,
                "location": company.location,
                "rating": company.rating,
                "review_count": company.review_count,
                "price_range": company.price_range,
            },
            "review_summary": {
                "positive_points": positive_points,
                "negative_points": negative_points,
                "overall_impression": overall_impression(company.rating),
            },
            "message": format!("成功获取{}的评价信息。", company.name),
        }))
    }
}
