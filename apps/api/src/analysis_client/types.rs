//! Wire types for the three analysis operations.
//!
//! Requests serialize to the service's camelCase field names. Responses deserialize from
//! camelCase and serialize back out in snake_case for our own API.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AtsAnalysis,
    OptimizeCv,
    InterviewQuestions,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AtsAnalysis => "ats-analysis",
            Operation::OptimizeCv => "optimize-cv",
            Operation::InterviewQuestions => "interview-questions",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly response `data` is checked against the documented shapes.
///
/// Lenient: only the stage's primary output field is required; absent or null sub-fields
/// come through empty. Strict: every documented field must be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShapePolicy {
    #[default]
    Lenient,
    Strict,
}

impl FromStr for ShapePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ShapePolicy::Lenient),
            "strict" => Ok(ShapePolicy::Strict),
            other => Err(format!("unknown shape policy '{other}' (expected lenient|strict)")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest<'a> {
    pub cv: &'a str,
    pub job_description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest<'a> {
    pub cv: &'a str,
    pub job_description: &'a str,
    pub missing_keywords: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrepRequest<'a> {
    pub cv: &'a str,
    pub job_description: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Responses
// ────────────────────────────────────────────────────────────────────────────

/// Treats an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Output of `ats-analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct MatchReport {
    pub ats_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matched_keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis: MatchAnalysis,
    /// Ranked, most important first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weaknesses: Vec<String>,
}

/// Output of `optimize-cv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedResume {
    #[serde(rename(deserialize = "optimizedCV"))]
    pub optimized_cv: String,
}

/// Output of `interview-questions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct InterviewQuestionSet {
    #[serde(default)]
    pub summary: Option<QuestionSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technical_questions: Vec<TechnicalQuestion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub behavioral_questions: Vec<BehavioralQuestion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub situational_questions: Vec<SituationalQuestion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preparation_tips: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct QuestionSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_questions: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technical_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub behavioral_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub situational_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct TechnicalQuestion {
    pub question: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct BehavioralQuestion {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct SituationalQuestion {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_approach: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer_points: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Typed decoding
// ────────────────────────────────────────────────────────────────────────────

/// A typed operation result.
pub trait StageOutput: DeserializeOwned {
    const OPERATION: Operation;

    /// JSON pointers into `data` that must be present (and non-null) under `Strict`.
    const STRICT_FIELDS: &'static [&'static str];

    /// Semantic checks after deserialization. Always run.
    fn validate(&self, _policy: ShapePolicy) -> Result<(), String> {
        Ok(())
    }
}

impl StageOutput for MatchReport {
    const OPERATION: Operation = Operation::AtsAnalysis;
    const STRICT_FIELDS: &'static [&'static str] = &[
        "/atsScore",
        "/matchedKeywords",
        "/missingKeywords",
        "/analysis/strengths",
        "/analysis/weaknesses",
        "/suggestions",
    ];

    fn validate(&self, policy: ShapePolicy) -> Result<(), String> {
        if policy == ShapePolicy::Strict && !(0.0..=100.0).contains(&self.ats_score) {
            return Err(format!("atsScore {} is outside 0-100", self.ats_score));
        }
        Ok(())
    }
}

impl StageOutput for OptimizedResume {
    const OPERATION: Operation = Operation::OptimizeCv;
    const STRICT_FIELDS: &'static [&'static str] = &["/optimizedCV"];

    fn validate(&self, _policy: ShapePolicy) -> Result<(), String> {
        if self.optimized_cv.trim().is_empty() {
            return Err("optimizedCV is empty".to_string());
        }
        Ok(())
    }
}

impl StageOutput for InterviewQuestionSet {
    const OPERATION: Operation = Operation::InterviewQuestions;
    const STRICT_FIELDS: &'static [&'static str] = &[
        "/summary/totalQuestions",
        "/summary/technicalCount",
        "/summary/behavioralCount",
        "/summary/situationalCount",
        "/technicalQuestions",
        "/behavioralQuestions",
        "/situationalQuestions",
        "/preparationTips",
    ];

    fn validate(&self, policy: ShapePolicy) -> Result<(), String> {
        if policy == ShapePolicy::Strict {
            if let Some(i) = self
                .technical_questions
                .iter()
                .position(|q| q.difficulty.is_none() || q.category.is_none())
            {
                return Err(format!(
                    "technicalQuestions[{i}] is missing difficulty or category"
                ));
            }
        }
        Ok(())
    }
}

pub fn decode_output<T: StageOutput>(data: Value, policy: ShapePolicy) -> Result<T, AnalysisError> {
    let malformed = |message: String| AnalysisError::MalformedResponse {
        operation: T::OPERATION,
        message,
    };

    if policy == ShapePolicy::Strict {
        let missing: Vec<&str> = T::STRICT_FIELDS
            .iter()
            .copied()
            .filter(|pointer| data.pointer(pointer).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!("missing fields {}", missing.join(", "))));
        }
    }

    let output: T = serde_json::from_value(data).map_err(|e| malformed(e.to_string()))?;
    output.validate(policy).map_err(malformed)?;
    Ok(output)
}
