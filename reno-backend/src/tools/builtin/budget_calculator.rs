//! Renovation budget estimation against the materials catalog.

use crate::tools::{
    PropertySchema, Tool, ToolContext, ToolDefinition, ToolError, ToolInputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

const FIRST_TIER_CITIES: [&str; 4] = ["北京", "上海", "广州", "深圳"];
const SECOND_TIER_CITIES: [&str; 10] = [
    "杭州", "南京", "成都", "武汉", "西安", "重庆", "苏州", "天津", "宁波", "郑州",
];

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RenovationScope {
    Full,
    Partial,
    Specific,
}

impl RenovationScope {
    fn multiplier(self) -> f64 {
        match self {
            RenovationScope::Full => 1.0,
            RenovationScope::Partial => 0.7,
            RenovationScope::Specific => 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MaterialQuality {
    High,
    Medium,
    Budget,
}

impl MaterialQuality {
    /// Base rate in ¥/m²
    fn base_price_per_sqm(self) -> f64 {
        match self {
            MaterialQuality::High => 2500.0,
            MaterialQuality::Medium => 1500.0,
            MaterialQuality::Budget => 800.0,
        }
    }

    fn level(self) -> &'static str {
        match self {
            MaterialQuality::High => "high",
            MaterialQuality::Medium => "medium",
            MaterialQuality::Budget => "budget",
        }
    }
}

fn location_multiplier(location: &str) -> f64 {
    if FIRST_TIER_CITIES.iter().any(|city| location.contains(city)) {
        1.2
    } else if SECOND_TIER_CITIES.iter().any(|city| location.contains(city)) {
        1.1
    } else {
        1.0
    }
}

fn additional_feature_cost(feature: &str, room_size: f64) -> f64 {
    match feature {
        "智能家居" => room_size * 300.0,
        "定制家具" => room_size * 500.0,
        "中央空调" => room_size * 400.0,
        "地暖" => room_size * 350.0,
        "新风系统" => room_size * 250.0,
        "全屋净水" => 8000.0,
        "家庭影院" => 15000.0,
        "智能安防" => 5000.0,
        // Unpriced features fall back to a flat per-sqm estimate
        _ => room_size * 200.0,
    }
}

fn estimated_timeframe(room_size: f64, scope: RenovationScope) -> &'static str {
    let full = matches!(scope, RenovationScope::Full);
    if room_size <= 60.0 {
        if full { "约45-60天" } else { "约30-45天" }
    } else if room_size <= 100.0 {
        if full { "约60-75天" } else { "约45-60天" }
    } else if room_size <= 150.0 {
        if full { "约75-90天" } else { "约60-75天" }
    } else if full {
        "约90-120天"
    } else {
        "约75-90天"
    }
}

#[derive(Debug, Deserialize)]
struct BudgetInput {
    room_size: f64,
    renovation_scope: RenovationScope,
    material_quality: MaterialQuality,
    location: String,
    #[serde(default)]
    additional_features: Vec<String>,
}

pub struct CalculateRenovationBudget;

#[async_trait]
impl Tool for CalculateRenovationBudget {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert(
            "room_size".to_string(),
            PropertySchema::number("房间大小（平方米）"),
        );
        properties.insert(
            "renovation_scope".to_string(),
            PropertySchema::string_enum("装修范围（全面、部分、特定）", &["full", "partial", "specific"]),
        );
        properties.insert(
            "material_quality".to_string(),
            PropertySchema::string_enum("材料质量（高端、中档、经济型）", &["high", "medium", "budget"]),
        );
        properties.insert(
            "location".to_string(),
            PropertySchema::string("中国城市或地区"),
        );
        properties.insert(
            "additional_features".to_string(),
            PropertySchema::string_array("附加功能，如智能家居、定制家具等", "功能名称"),
        );

        ToolDefinition {
            name: "calculate_renovation_budget".to_string(),
            description: "根据房间大小、装修范围、材料质量和中国地区计算详细的装修预算".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec![
                    "room_size".to_string(),
                    "renovation_scope".to_string(),
                    "material_quality".to_string(),
                    "location".to_string(),
                ],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: BudgetInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let base_total = input.room_size
            * input.material_quality.base_price_per_sqm()
            * input.renovation_scope.multiplier()
            * location_multiplier(&input.location);

        let additional_cost: f64 = input
            .additional_features
            .iter()
            .map(|feature| additional_feature_cost(feature, input.room_size))
            .sum();

        let total_budget = base_total + additional_cost;

        // Category fractions: labor 25%, primary materials 45%, secondary
        // materials 15%, design 8%, management 7%
        let mut breakdown = serde_json::Map::new();
        breakdown.insert("人工费".to_string(), json!((total_budget * 0.25).round()));
        breakdown.insert("主材费".to_string(), json!((total_budget * 0.45).round()));
        breakdown.insert("辅材费".to_string(), json!((total_budget * 0.15).round()));
        breakdown.insert("设计费".to_string(), json!((total_budget * 0.08).round()));
        breakdown.insert("管理费".to_string(), json!((total_budget * 0.07).round()));
        if additional_cost > 0.0 {
            breakdown.insert("附加功能费".to_string(), json!(additional_cost.round()));
        }

        let mut recommendations: Vec<String> = vec![];
        let level = input.material_quality.level();
        for category_name in ["地板", "墙面"] {
            let recommended = context
                .data
                .materials
                .iter()
                .find(|c| c.category == category_name)
                .and_then(|c| {
                    c.items
                        .iter()
                        .find(|m| m.price_range.for_level(level).is_some())
                });
            if let Some(material) = recommended {
                recommendations.push(format!(
                    "{}推荐：{}，{}，价格范围：{}",
                    category_name,
                    material.name,
                    material.description,
                    material.price_range.for_level(level).unwrap_or_default()
                ));
            }
        }

        match input.material_quality {
            MaterialQuality::High => {
                recommendations.push("建议选择知名品牌的材料和设备，确保品质和售后服务".to_string());
                recommendations.push("可考虑聘请专业设计师进行个性化设计，提升空间品质".to_string());
            }
            MaterialQuality::Medium => {
                recommendations.push(
                    "建议在厨卫等重要功能区域选择质量更好的材料，其他区域可适当节省".to_string(),
                );
                recommendations.push("可以选择部分知名品牌的产品，部分选择性价比高的品牌".to_string());
            }
            MaterialQuality::Budget => {
                recommendations.push("建议优先保证基础工程质量，表面装饰可以简化处理".to_string());
                recommendations.push("选择性价比高的材料，避免过度装修".to_string());
            }
        }

        if FIRST_TIER_CITIES.iter().any(|city| input.location.contains(city)) {
            recommendations.push(format!(
                "{}装修价格较高，建议货比三家，选择性价比高的装修公司",
                input.location
            ));
        }

        Ok(json!({
            "total_budget": total_budget.round(),
            "breakdown": breakdown,
            "estimated_timeframe": estimated_timeframe(input.room_size, input.renovation_scope),
            "recommendations": recommendations,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct MaterialPriceInput {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    material_name: Option<String>,
    #[serde(default)]
    price_level: Option<String>,
}

pub struct QueryMaterialPrice;

#[async_trait]
impl Tool for QueryMaterialPrice {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert(
            "category".to_string(),
            PropertySchema::string("材料类别，如\"地板\"、\"墙面\"、\"厨房\"等"),
        );
        properties.insert(
            "material_name".to_string(),
            PropertySchema::string("材料名称，如\"实木地板\"、\"乳胶漆\"等"),
        );
        properties.insert(
            "price_level".to_string(),
            PropertySchema::string_enum(
                "价格等级：经济型(budget)、中档(medium)、高端(high)",
                &["budget", "medium", "high"],
            ),
        );

        ToolDefinition {
            name: "query_material_price".to_string(),
            description: "查询装修材料的价格范围和特性".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec![],
            },
        }
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let input: MaterialPriceInput = serde_json::from_value(args)
            .map_err(|e| ToolError::execution(format!("invalid arguments: {}", e)))?;

        let mut results: Vec<Value> = vec![];
        for category in &context.data.materials {
            let matches_category = input
                .category
                .as_deref()
                .map(|wanted| category.category.to_lowercase().contains(&wanted.to_lowercase()))
                .unwrap_or(true);
            if !matches_category {
                continue;
            }
            for item in &category.items {
                let matches_name = input
                    .material_name
                    .as_deref()
                    .map(|wanted| item.name.to_lowercase().contains(&wanted.to_lowercase()))
                    .unwrap_or(true);
                let matches_level = input
                    .price_level
                    .as_deref()
                    .map(|level| item.price_range.for_level(level).is_some())
                    .unwrap_or(true);
                if matches_name && matches_level {
                    results.push(json!({
                        "name": item.name,
                        "category": category.category,
                        "description": item.description,
                        "price_range": item.price_range,
                        "durability": item.durability,
                        "maintenance": item.maintenance,
                        "environmental_impact": item.environmental_impact,
                    }));
                }
            }
        }

        let message = if results.is_empty() {
            "没有找到符合条件的材料。".to_string()
        } else {
            format!("找到{}种符合条件的材料。", results.len())
        };

        Ok(json!({"materials": results, "message": message}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Material, MaterialCategory, PriceRange, ReferenceData};
    use crate::tools::validate_args;
    use serde_json::json;
    use std::sync::Arc;

    fn context_with_materials() -> ToolContext {
        let materials = vec![MaterialCategory {
            category: "地板".to_string(),
            items: vec![Material {
                name: "复合地板".to_string(),
                description: "性价比高，易打理".to_string(),
                price_range: PriceRange {
                    budget: Some("80-150元/平方米".to_string()),
                    medium: Some("150-300元/平方米".to_string()),
                    high: Some("300-600元/平方米".to_string()),
                },
                durability: Some("10-15年".to_string()),
                maintenance: None,
                environmental_impact: None,
            }],
        }];
        ToolContext::new(Arc::new(ReferenceData {
            materials,
            companies: vec![],
            knowledge: vec![],
        }))
    }

    #[tokio::test]
    async fn beijing_full_medium_90_sqm_totals_162000() {
        let tool = CalculateRenovationBudget;
        let output = tool
            .execute(
                json!({
                    "room_size": 90,
                    "renovation_scope": "full",
                    "material_quality": "medium",
                    "location": "北京",
                }),
                &context_with_materials(),
            )
            .await
            .unwrap();

        // 1500 ¥/m² × 1.0 scope × 1.2 first-tier × 90 m²
        assert_eq!(output["total_budget"], json!(162000.0));
        let breakdown = output["breakdown"].as_object().unwrap();
        assert_eq!(breakdown["人工费"], json!(40500.0));
        assert_eq!(breakdown["主材费"], json!(72900.0));
        assert_eq!(breakdown["辅材费"], json!(24300.0));
        assert_eq!(breakdown["设计费"], json!(12960.0));
        assert_eq!(breakdown["管理费"], json!(11340.0));

        let sum: f64 = breakdown.values().map(|v| v.as_f64().unwrap()).sum();
        assert_eq!(sum, 162000.0);

        assert_eq!(output["estimated_timeframe"], "约60-75天");
        let recommendations = output["recommendations"].as_array().unwrap();
        assert!(recommendations.iter().any(|r| r.as_str().unwrap().contains("复合地板")));
        assert!(recommendations.iter().any(|r| r.as_str().unwrap().contains("货比三家")));
    }

    #[tokio::test]
    async fn additional_features_and_tier_multipliers() {
        let tool = CalculateRenovationBudget;
        let output = tool
            .execute(
                json!({
                    "room_size": 50,
                    "renovation_scope": "partial",
                    "material_quality": "budget",
                    "location": "杭州",
                    "additional_features": ["地暖", "全屋净水", "隔音棉"],
                }),
                &context_with_materials(),
            )
            .await
            .unwrap();

        // base: 50 × 800 × 0.7 × 1.1 = 30800
        // features: 地暖 50×350 + 全屋净水 8000 + unknown 50×200 = 35500
        assert_eq!(output["total_budget"], json!(66300.0));
        let breakdown = output["breakdown"].as_object().unwrap();
        assert_eq!(breakdown["附加功能费"], json!(35500.0));
    }

    #[tokio::test]
    async fn budget_tool_is_idempotent() {
        let tool = CalculateRenovationBudget;
        let args = json!({
            "room_size": 120,
            "renovation_scope": "full",
            "material_quality": "high",
            "location": "苏州",
        });
        let ctx = context_with_materials();
        let first = tool.execute(args.clone(), &ctx).await.unwrap();
        let second = tool.execute(args, &ctx).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schema_names_missing_fields() {
        let tool = CalculateRenovationBudget;
        let schema = tool.definition().input_schema;
        match validate_args(&schema, &json!({"location": "北京"})) {
            Err(ToolError::Validation { fields, .. }) => {
                assert_eq!(
                    fields,
                    vec![
                        "material_quality".to_string(),
                        "renovation_scope".to_string(),
                        "room_size".to_string()
                    ]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn material_price_query_filters_by_level() {
        let tool = QueryMaterialPrice;
        let output = tool
            .execute(
                json!({"category": "地板", "price_level": "medium"}),
                &context_with_materials(),
            )
            .await
            .unwrap();
        let materials = output["materials"].as_array().unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0]["name"], "复合地板");

        let empty = tool
            .execute(json!({"category": "吊顶"}), &context_with_materials())
            .await
            .unwrap();
        assert!(empty["materials"].as_array().unwrap().is_empty());
        assert_eq!(empty["message"], "没有找到符合条件的材料。");
    }
}
