use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Date;

pub const CATALOG_VERSION: &str = "eu-ai-act-rules.v1";
pub const NO_PENALTY: &str = "N/A";

pub const UNACCEPTABLE_RISK_SCORE: u8 = 100;
pub const HIGH_RISK_BASE_SCORE: u8 = 60;
pub const HIGH_RISK_BONUS_PER_RULE: u8 = 10;
pub const HIGH_RISK_BONUS_CAP: u8 = 25;
pub const HIGH_RISK_SCORE_CAP: u8 = 95;
pub const LIMITED_RISK_SCORE: u8 = 35;
pub const MINIMAL_RISK_SCORE: u8 = 15;

pub const HIGH_RISK_COMPLIANCE_BASE: u32 = 50;
pub const HIGH_RISK_COMPLIANCE_PER_DATA_TYPE: u32 = 5;
pub const DEFAULT_COMPLIANCE_SCORE: u32 = 85;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum KernelError {
    #[error("validation error: missing required field(s): {}", .fields.join(", "))]
    Validation { fields: Vec<&'static str> },
    #[error("unknown risk tier: {0}")]
    UnknownTier(String),
    #[error("unknown rule category: {0}")]
    UnknownRuleCategory(String),
    #[error("assessment id space exhausted after id {last}")]
    IdExhausted { last: u64 },
}

fn normalize_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch.to_ascii_lowercase() })
        .collect()
}

/// Regulatory risk tiers, declared from least to most severe so that `Ord` follows severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Minimal,
    Limited,
    High,
    Unacceptable,
}

impl RiskTier {
    /// All tiers, most severe first.
    pub const ALL: [Self; 4] = [Self::Unacceptable, Self::High, Self::Limited, Self::Minimal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unacceptable => "unacceptable",
            Self::High => "high",
            Self::Limited => "limited",
            Self::Minimal => "minimal",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "unacceptable" => Some(Self::Unacceptable),
            "high" => Some(Self::High),
            "limited" => Some(Self::Limited),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_deploy(self) -> bool {
        self != Self::Unacceptable
    }
}

impl Display for RiskTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Prohibited,
    HighRisk,
    LimitedRisk,
}

impl RuleCategory {
    pub const ALL: [Self; 3] = [Self::Prohibited, Self::HighRisk, Self::LimitedRisk];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prohibited => "prohibited",
            Self::HighRisk => "high_risk",
            Self::LimitedRisk => "limited_risk",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "prohibited" => Some(Self::Prohibited),
            "high_risk" => Some(Self::HighRisk),
            "limited_risk" => Some(Self::LimitedRisk),
            _ => None,
        }
    }

    /// Tier assigned when a rule of this category decides the classification.
    #[must_use]
    pub fn tier(self) -> RiskTier {
        match self {
            Self::Prohibited => RiskTier::Unacceptable,
            Self::HighRisk => RiskTier::High,
            Self::LimitedRisk => RiskTier::Limited,
        }
    }
}

/// Fixed vocabulary of data types an assessed system may process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    PersonalData,
    BiometricData,
    SensitiveData,
    FinancialData,
    BehavioralData,
    TextData,
}

impl DataType {
    pub const ALL: [Self; 6] = [
        Self::PersonalData,
        Self::BiometricData,
        Self::SensitiveData,
        Self::FinancialData,
        Self::BehavioralData,
        Self::TextData,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonalData => "personal_data",
            Self::BiometricData => "biometric_data",
            Self::SensitiveData => "sensitive_data",
            Self::FinancialData => "financial_data",
            Self::BehavioralData => "behavioral_data",
            Self::TextData => "text_data",
        }
    }

    /// Human-readable label; this is the text the classifier sees.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PersonalData => "Personal data",
            Self::BiometricData => "Biometric data",
            Self::SensitiveData => "Sensitive data",
            Self::FinancialData => "Financial data",
            Self::BehavioralData => "Behavioral data",
            Self::TextData => "Text data",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(value);
        Self::ALL.into_iter().find(|data_type| data_type.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Employment,
    Healthcare,
    Education,
    FinancialServices,
    LawEnforcement,
    CustomerService,
    Other,
}

impl Sector {
    pub const ALL: [Self; 7] = [
        Self::Employment,
        Self::Healthcare,
        Self::Education,
        Self::FinancialServices,
        Self::LawEnforcement,
        Self::CustomerService,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employment => "employment",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::FinancialServices => "financial_services",
            Self::LawEnforcement => "law_enforcement",
            Self::CustomerService => "customer_service",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Employment => "Employment",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::FinancialServices => "Financial Services",
            Self::LawEnforcement => "Law Enforcement",
            Self::CustomerService => "Customer Service",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(value);
        Self::ALL.into_iter().find(|sector| sector.as_str() == normalized)
    }
}

/// Lifecycle stage of the assessed system. Informational only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Development,
    Testing,
    Production,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "planning" => Some(Self::Planning),
            "development" => Some(Self::Development),
            "testing" => Some(Self::Testing),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// One regulatory rule. Keywords are lowercase and matched as substrings.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct Rule {
    pub id: &'static str,
    pub category: RuleCategory,
    pub citation: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub sector: Option<&'static str>,
    pub penalty: &'static str,
}

impl Rule {
    /// Keywords of this rule that occur in `text`, in declaration order.
    /// `text` is expected to be lowercase already.
    #[must_use]
    pub fn matched_keywords(&self, text: &str) -> Vec<&'static str> {
        self.keywords.iter().copied().filter(|keyword| text.contains(keyword)).collect()
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword))
    }
}

const PROHIBITED_PENALTY: &str = "€35M or 7% global turnover";
const HIGH_RISK_PENALTY: &str = "€15M or 3% global turnover";
const LIMITED_RISK_PENALTY: &str = "€7.5M or 1.5% global turnover";

static PROHIBITED_RULES: [Rule; 3] = [
    Rule {
        id: "P1",
        category: RuleCategory::Prohibited,
        citation: "Article 5(1)(a)",
        title: "Subliminal Manipulation",
        description: "AI systems using subliminal techniques beyond consciousness",
        keywords: &["subliminal", "subconscious", "manipulative"],
        sector: None,
        penalty: PROHIBITED_PENALTY,
    },
    Rule {
        id: "P2",
        category: RuleCategory::Prohibited,
        citation: "Article 5(1)(b)",
        title: "Exploitation of Vulnerabilities",
        description: "Systems exploiting vulnerabilities of specific groups",
        keywords: &["children", "vulnerable", "disability", "exploitation"],
        sector: None,
        penalty: PROHIBITED_PENALTY,
    },
    Rule {
        id: "P3",
        category: RuleCategory::Prohibited,
        citation: "Article 5(1)(c)",
        title: "Social Scoring",
        description: "Social scoring by public authorities",
        keywords: &["social scoring", "social credit", "citizen scoring"],
        sector: None,
        penalty: PROHIBITED_PENALTY,
    },
];

static HIGH_RISK_RULES: [Rule; 5] = [
    Rule {
        id: "HR1",
        category: RuleCategory::HighRisk,
        citation: "Annex III(1)",
        title: "Biometric Identification",
        description: "Biometric identification and categorization",
        keywords: &["biometric", "facial recognition", "fingerprint", "iris"],
        sector: Some("Critical Infrastructure"),
        penalty: HIGH_RISK_PENALTY,
    },
    Rule {
        id: "HR2",
        category: RuleCategory::HighRisk,
        citation: "Annex III(2)",
        title: "Education Assessment",
        description: "AI in education and vocational training",
        keywords: &["education", "student assessment", "exam proctoring"],
        sector: Some("Education"),
        penalty: HIGH_RISK_PENALTY,
    },
    Rule {
        id: "HR3",
        category: RuleCategory::HighRisk,
        citation: "Annex III(3)",
        title: "Employment & Recruitment",
        description: "AI for recruitment and hiring decisions",
        keywords: &["recruitment", "hiring", "cv screening", "employee"],
        sector: Some("Employment"),
        penalty: HIGH_RISK_PENALTY,
    },
    Rule {
        id: "HR4",
        category: RuleCategory::HighRisk,
        citation: "Annex III(4)",
        title: "Essential Services",
        description: "Access to essential services",
        keywords: &["credit scoring", "insurance", "healthcare access"],
        sector: Some("Essential Services"),
        penalty: HIGH_RISK_PENALTY,
    },
    Rule {
        id: "HR5",
        category: RuleCategory::HighRisk,
        citation: "Annex III(5)",
        title: "Law Enforcement",
        description: "AI for law enforcement purposes",
        keywords: &["predictive policing", "crime prediction"],
        sector: Some("Law Enforcement"),
        penalty: HIGH_RISK_PENALTY,
    },
];

static LIMITED_RISK_RULES: [Rule; 2] = [
    Rule {
        id: "LR1",
        category: RuleCategory::LimitedRisk,
        citation: "Article 52(1)",
        title: "AI Interaction Transparency",
        description: "Systems interacting with humans",
        keywords: &["chatbot", "conversational ai", "virtual assistant"],
        sector: None,
        penalty: LIMITED_RISK_PENALTY,
    },
    Rule {
        id: "LR2",
        category: RuleCategory::LimitedRisk,
        citation: "Article 52(3)",
        title: "Deepfakes & Synthetic Media",
        description: "AI-generated content",
        keywords: &["deepfake", "synthetic media", "ai-generated"],
        sector: None,
        penalty: LIMITED_RISK_PENALTY,
    },
];

static EU_AI_ACT_CATALOG: RuleCatalog = RuleCatalog::new(
    CATALOG_VERSION,
    &PROHIBITED_RULES,
    &HIGH_RISK_RULES,
    &LIMITED_RISK_RULES,
);

/// Read-only, versioned rule table grouped by category. Scan order is declaration order.
#[derive(Debug, Clone, Copy)]
pub struct RuleCatalog {
    version: &'static str,
    prohibited: &'static [Rule],
    high_risk: &'static [Rule],
    limited_risk: &'static [Rule],
}

impl RuleCatalog {
    #[must_use]
    pub const fn new(
        version: &'static str,
        prohibited: &'static [Rule],
        high_risk: &'static [Rule],
        limited_risk: &'static [Rule],
    ) -> Self {
        Self { version, prohibited, high_risk, limited_risk }
    }

    /// The built-in EU AI Act catalog.
    #[must_use]
    pub fn eu_ai_act() -> &'static Self {
        &EU_AI_ACT_CATALOG
    }

    #[must_use]
    pub fn version(&self) -> &'static str {
        self.version
    }

    #[must_use]
    pub fn get_rules(&self, category: RuleCategory) -> &'static [Rule] {
        match category {
            RuleCategory::Prohibited => self.prohibited,
            RuleCategory::HighRisk => self.high_risk,
            RuleCategory::LimitedRisk => self.limited_risk,
        }
    }

    /// Every rule in classifier scan order: prohibited, high-risk, limited-risk.
    pub fn rules(&self) -> impl Iterator<Item = &'static Rule> {
        self.prohibited.iter().chain(self.high_risk).chain(self.limited_risk)
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&'static Rule> {
        self.rules().find(|rule| rule.id == id)
    }

    /// SHA-256 over the version and every rule field, formatted as `sha256:<hex>`.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        for rule in self.rules() {
            for part in [
                rule.category.as_str(),
                rule.id,
                rule.citation,
                rule.title,
                rule.description,
                rule.sector.unwrap_or(""),
                rule.penalty,
            ] {
                hasher.update(part.as_bytes());
                hasher.update(b"\x1f");
            }
            for keyword in rule.keywords {
                hasher.update(keyword.as_bytes());
                hasher.update(b"\x1e");
            }
        }

        let digest = hasher.finalize();
        format!("sha256:{digest:x}")
    }
}

/// Outcome of one classification run against a catalog.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Classification<'a> {
    pub tier: RiskTier,
    pub score: u8,
    pub matched_rules: Vec<&'a Rule>,
    pub can_deploy: bool,
    pub penalty_text: String,
    pub ruleset_version: &'a str,
    pub reasons: Vec<String>,
}

impl Classification<'_> {
    #[must_use]
    pub fn matched_rule_ids(&self) -> Vec<String> {
        self.matched_rules.iter().map(|rule| rule.id.to_string()).collect()
    }
}

fn text_blob<I, S>(use_case: &str, context: &str, data_types: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blob = String::with_capacity(use_case.len() + context.len() + 64);
    blob.push_str(use_case);
    blob.push(' ');
    blob.push_str(context);
    for data_type in data_types {
        blob.push(' ');
        blob.push_str(data_type.as_ref());
    }
    blob.to_lowercase()
}

fn match_reason(rule: &Rule, text: &str) -> String {
    format!(
        "{} ({}) matched keyword(s): {}",
        rule.id,
        rule.citation,
        rule.matched_keywords(text).join(", ")
    )
}

fn single_rule_classification<'a>(
    catalog: &'a RuleCatalog,
    rule: &'a Rule,
    score: u8,
    text: &str,
) -> Classification<'a> {
    let tier = rule.category.tier();
    Classification {
        tier,
        score,
        matched_rules: vec![rule],
        can_deploy: tier.can_deploy(),
        penalty_text: rule.penalty.to_string(),
        ruleset_version: catalog.version,
        reasons: vec![match_reason(rule, text)],
    }
}

/// Score for a high-risk classification with `match_count` matched rules.
#[must_use]
pub fn high_risk_score(match_count: usize) -> u8 {
    let bonus = u8::try_from(match_count)
        .unwrap_or(u8::MAX)
        .saturating_mul(HIGH_RISK_BONUS_PER_RULE)
        .min(HIGH_RISK_BONUS_CAP);
    HIGH_RISK_BASE_SCORE.saturating_add(bonus).min(HIGH_RISK_SCORE_CAP)
}

/// Classify free-text input against `catalog`.
///
/// Tiers are checked from most to least severe and the first tier with a match wins.
/// Prohibited and limited-risk scans stop at the first matching rule; the high-risk scan
/// collects every matching rule and scores the count. Total over any input.
pub fn classify<'a, I, S>(
    catalog: &'a RuleCatalog,
    use_case: &str,
    context: &str,
    data_types: I,
) -> Classification<'a>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let text = text_blob(use_case, context, data_types);

    if let Some(rule) = catalog.prohibited.iter().find(|rule| rule.matches(&text)) {
        return single_rule_classification(catalog, rule, UNACCEPTABLE_RISK_SCORE, &text);
    }

    let high_matches = catalog.high_risk.iter().filter(|rule| rule.matches(&text)).collect::<Vec<_>>();
    if let Some(first) = high_matches.first() {
        return Classification {
            tier: RiskTier::High,
            score: high_risk_score(high_matches.len()),
            can_deploy: true,
            penalty_text: first.penalty.to_string(),
            ruleset_version: catalog.version,
            reasons: high_matches.iter().map(|rule| match_reason(rule, &text)).collect(),
            matched_rules: high_matches,
        };
    }

    if let Some(rule) = catalog.limited_risk.iter().find(|rule| rule.matches(&text)) {
        return single_rule_classification(catalog, rule, LIMITED_RISK_SCORE, &text);
    }

    Classification {
        tier: RiskTier::Minimal,
        score: MINIMAL_RISK_SCORE,
        matched_rules: Vec::new(),
        can_deploy: true,
        penalty_text: NO_PENALTY.to_string(),
        ruleset_version: catalog.version,
        reasons: vec!["no catalog keyword matched; minimal risk by default".to_string()],
    }
}

/// Documentation-readiness estimate. Deliberately uncapped for high-risk systems.
#[must_use]
pub fn compliance_score(tier: RiskTier, data_type_count: usize) -> u32 {
    match tier {
        RiskTier::High => {
            let count = u32::try_from(data_type_count).unwrap_or(u32::MAX);
            HIGH_RISK_COMPLIANCE_BASE
                .saturating_add(count.saturating_mul(HIGH_RISK_COMPLIANCE_PER_DATA_TYPE))
        }
        RiskTier::Unacceptable | RiskTier::Limited | RiskTier::Minimal => DEFAULT_COMPLIANCE_SCORE,
    }
}

const UNACCEPTABLE_OBLIGATIONS: &[&str] = &[
    "PROHIBITED - Cannot be deployed in EU",
    "Consider alternative approaches",
    "Consult legal experts immediately",
];

const HIGH_RISK_OBLIGATIONS: &[&str] = &[
    "Establish risk management system (Article 9)",
    "Implement data governance (Article 10)",
    "Prepare technical documentation (Article 11)",
    "Design human oversight mechanisms (Article 14)",
    "Conduct conformity assessment",
];

const LIMITED_RISK_OBLIGATIONS: &[&str] = &[
    "Inform users of AI interaction (Article 52)",
    "Label AI-generated content",
    "Document transparency measures",
];

const MINIMAL_RISK_OBLIGATIONS: &[&str] = &[
    "No mandatory compliance",
    "Consider voluntary guidelines",
    "Document for internal governance",
];

/// Ordered obligation statements for `tier`.
#[must_use]
pub fn recommend(tier: RiskTier) -> &'static [&'static str] {
    match tier {
        RiskTier::Unacceptable => UNACCEPTABLE_OBLIGATIONS,
        RiskTier::High => HIGH_RISK_OBLIGATIONS,
        RiskTier::Limited => LIMITED_RISK_OBLIGATIONS,
        RiskTier::Minimal => MINIMAL_RISK_OBLIGATIONS,
    }
}

/// Obligations for a tier given by label.
///
/// # Errors
/// Returns [`KernelError::UnknownTier`] when `label` names no tier. There is no silent
/// fallback to the minimal-tier list.
pub fn recommend_label(label: &str) -> Result<&'static [&'static str], KernelError> {
    RiskTier::parse(label)
        .map(recommend)
        .ok_or_else(|| KernelError::UnknownTier(label.to_string()))
}

/// User-supplied part of an assessment, before classification.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AssessmentDraft {
    pub system_name: String,
    pub use_case: String,
    pub context: String,
    pub sector: Sector,
    #[serde(default)]
    pub stage: Option<Stage>,
    pub data_types: BTreeSet<DataType>,
}

impl AssessmentDraft {
    /// Check required fields.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] naming every required field that is empty
    /// or whitespace-only.
    pub fn validate(&self) -> Result<(), KernelError> {
        let mut fields = Vec::new();
        for (name, value) in [
            ("system_name", &self.system_name),
            ("use_case", &self.use_case),
            ("context", &self.context),
        ] {
            if value.trim().is_empty() {
                fields.push(name);
            }
        }
        if self.data_types.is_empty() {
            fields.push("data_types");
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(KernelError::Validation { fields })
        }
    }

    /// Labels handed to the classifier.
    pub fn data_type_labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_types.iter().map(|data_type| data_type.label())
    }
}

/// Immutable outcome of one assessment, as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AssessmentRecord {
    pub id: u64,
    pub system_name: String,
    pub use_case: String,
    pub context: String,
    pub sector: Sector,
    pub stage: Option<Stage>,
    pub data_types: BTreeSet<DataType>,
    pub tier: RiskTier,
    pub risk_score: u8,
    pub compliance_score: u32,
    pub matched_rules: Vec<String>,
    pub recommendations: Vec<String>,
    pub can_deploy: bool,
    pub penalty_text: String,
    #[serde(with = "calendar_date")]
    pub date: Date,
}

/// `YYYY-MM-DD` serde adapter for [`time::Date`].
pub mod calendar_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::macros::format_description;
    use time::Date;

    /// # Errors
    /// Returns an error when the date cannot be rendered.
    pub fn format(date: Date) -> Result<String, time::error::Format> {
        date.format(format_description!("[year]-[month]-[day]"))
    }

    /// # Errors
    /// Returns an error when `raw` is not a `YYYY-MM-DD` calendar date.
    pub fn parse(raw: &str) -> Result<Date, time::error::Parse> {
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
    }

    /// # Errors
    /// Propagates formatting failures as serializer errors.
    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = format(*date).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    /// # Errors
    /// Propagates parse failures as deserializer errors.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}
