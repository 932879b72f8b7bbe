//! Placeholder document analyzer. Returns canned requirements until a real model is wired in.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MODEL: &str = "simple-ai-v0";

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TechRequirement {
    pub item: String,
    pub qty: u32,
    pub specs: String,
    pub notes: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FinRequirement {
    pub item: String,
    pub unit: String,
    pub qty: u32,
    pub est_price: f64,
    pub currency: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub model: String,
    pub summary_ar: String,
    pub summary_en: String,
    pub requirements_tech: Vec<TechRequirement>,
    pub requirements_fin: Vec<FinRequirement>,
    pub questions: Vec<String>,
}

fn tech(item: &str, qty: u32) -> TechRequirement {
    TechRequirement {
        item: item.to_string(),
        qty,
        specs: "...".to_string(),
        notes: "...".to_string(),
    }
}

#[must_use]
pub fn analyze_doc(content: &[u8]) -> AnalysisResult {
    let has_text = String::from_utf8_lossy(content)
        .chars()
        .any(|c| c != char::REPLACEMENT_CHARACTER);

    let requirements_tech = if has_text {
        vec![tech("Router CCR2004", 2), tech("Switch 24 PoE", 3)]
    } else {
        Vec::new()
    };
    let requirements_fin = requirements_tech
        .iter()
        .map(|req| FinRequirement {
            item: req.item.clone(),
            unit: "pcs".to_string(),
            qty: req.qty,
            est_price: 0.0,
            currency: "USD".to_string(),
        })
        .collect();

    AnalysisResult {
        model: MODEL.to_string(),
        summary_ar: "ملخص مبدئي للمناقصة: متطلبات فنية/مالية تقريبية، راجع وعدّل قبل التوليد."
            .to_string(),
        summary_en:
            "Preliminary tender summary: rough technical/financial requirements, review before final generation."
                .to_string(),
        requirements_tech,
        requirements_fin,
        questions: vec![
            "ما مدة التسليم؟".to_string(),
            "هل الزيارة إلزامية؟".to_string(),
            "ما العملة المعتمدة؟".to_string(),
        ],
    }
}
