use std::collections::BTreeSet;

use aiact_core::{
    classify, compliance_score, recommend, AssessmentRecord, Classification, DataType,
    KernelError, RiskTier, Rule, RuleCatalog, RuleCategory,
};
use aiact_store::{build_record_on, AssessmentStore, StoreSummary};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub use aiact_core::AssessmentDraft as AssessRequest;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifyRequest {
    pub use_case: String,
    pub context: String,
    #[serde(default)]
    pub data_types: BTreeSet<DataType>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassifyResult {
    pub classification: Classification<'static>,
    pub compliance_score: u32,
    pub recommendations: Vec<String>,
    /// Ties the result to the exact rule table that produced it.
    pub catalog_digest: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RulesListing {
    pub ruleset_version: &'static str,
    pub digest: String,
    pub rules: Vec<&'static Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationList {
    pub tier: RiskTier,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRejection {
    pub index: usize,
    pub system_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResult {
    pub accepted: Vec<AssessmentRecord>,
    pub rejected: Vec<BatchRejection>,
}

fn owned_recommendations(tier: RiskTier) -> Vec<String> {
    recommend(tier).iter().map(ToString::to_string).collect()
}

/// Single owner of the session store; wires classify, recommend, build and append.
#[derive(Debug, Clone)]
pub struct AssessmentApi {
    catalog: &'static RuleCatalog,
    store: AssessmentStore,
}

impl Default for AssessmentApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AssessmentApi {
    /// Session seeded with the demonstration records.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(AssessmentStore::seeded(OffsetDateTime::now_utc().date()))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::with_store(AssessmentStore::new())
    }

    #[must_use]
    pub fn with_store(store: AssessmentStore) -> Self {
        Self { catalog: RuleCatalog::eu_ai_act(), store }
    }

    #[must_use]
    pub fn catalog(&self) -> &'static RuleCatalog {
        self.catalog
    }

    #[must_use]
    pub fn store(&self) -> &AssessmentStore {
        &self.store
    }

    #[must_use]
    pub fn rules(&self, category: Option<RuleCategory>) -> RulesListing {
        let rules = match category {
            Some(category) => self.catalog.get_rules(category).iter().collect(),
            None => self.catalog.rules().collect(),
        };
        RulesListing { ruleset_version: self.catalog.version(), digest: self.catalog.digest(), rules }
    }

    /// Parse a category label for [`Self::rules`].
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownRuleCategory`] when `label` names no category.
    pub fn parse_category(label: &str) -> Result<RuleCategory> {
        Ok(RuleCategory::parse(label)
            .ok_or_else(|| KernelError::UnknownRuleCategory(label.to_string()))?)
    }

    /// Classify without recording anything.
    #[must_use]
    pub fn classify(&self, request: &ClassifyRequest) -> ClassifyResult {
        let classification = classify(
            self.catalog,
            &request.use_case,
            &request.context,
            request.data_types.iter().map(|data_type| data_type.label()),
        );
        ClassifyResult {
            compliance_score: compliance_score(classification.tier, request.data_types.len()),
            recommendations: owned_recommendations(classification.tier),
            catalog_digest: self.catalog.digest(),
            classification,
        }
    }

    /// Obligations for a tier label.
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownTier`] when the label names no tier.
    pub fn recommend(&self, tier_label: &str) -> Result<RecommendationList> {
        let tier = RiskTier::parse(tier_label)
            .ok_or_else(|| KernelError::UnknownTier(tier_label.to_string()))?;
        Ok(RecommendationList { tier, recommendations: owned_recommendations(tier) })
    }

    /// Run the full pipeline for one request and append the record, dated today (UTC).
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] when required fields are empty; nothing is stored.
    pub fn assess(&mut self, request: AssessRequest) -> Result<AssessmentRecord> {
        self.assess_on(request, OffsetDateTime::now_utc().date())
    }

    /// Same as [`Self::assess`] with an explicit creation date.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] when required fields are empty; nothing is stored.
    pub fn assess_on(&mut self, request: AssessRequest, date: Date) -> Result<AssessmentRecord> {
        let classification = classify(
            self.catalog,
            &request.use_case,
            &request.context,
            request.data_type_labels(),
        );
        let recommendations = recommend(classification.tier);
        let system_name = request.system_name.clone();

        match build_record_on(&mut self.store, request, &classification, recommendations, date) {
            Ok(record) => {
                tracing::info!(
                    id = record.id,
                    tier = %record.tier,
                    risk_score = record.risk_score,
                    matched_rules = ?record.matched_rules,
                    "assessment recorded"
                );
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(system_name = %system_name, error = %err, "assessment rejected");
                Err(err.into())
            }
        }
    }

    /// Assess every request in order within this session. Invalid requests are reported
    /// by index and do not consume an id.
    pub fn batch(&mut self, requests: Vec<AssessRequest>) -> BatchResult {
        let today = OffsetDateTime::now_utc().date();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for (index, request) in requests.into_iter().enumerate() {
            let system_name = request.system_name.clone();
            match self.assess_on(request, today) {
                Ok(record) => accepted.push(record),
                Err(err) => rejected.push(BatchRejection { index, system_name, error: err.to_string() }),
            }
        }

        BatchResult { accepted, rejected }
    }

    #[must_use]
    pub fn records(&self) -> &[AssessmentRecord] {
        self.store.all()
    }

    #[must_use]
    pub fn record(&self, id: u64) -> Option<&AssessmentRecord> {
        self.store.get(id)
    }

    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&AssessmentRecord> {
        self.store.recent(limit)
    }

    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        self.store.summary()
    }

    /// Tabular export of every record.
    ///
    /// # Errors
    /// Returns an error when CSV encoding fails.
    pub fn export_csv(&self) -> Result<String> {
        self.store.export_csv_string()
    }

    /// Single-record document export.
    ///
    /// # Errors
    /// Returns an error when the record does not exist or serialization fails.
    pub fn export_record(&self, id: u64) -> Result<String> {
        self.store.export_record_json(id)
    }

    /// Every record as one JSON document.
    ///
    /// # Errors
    /// Returns an error when serialization fails.
    pub fn export_json(&self) -> Result<String> {
        self.store.export_json()
    }
}

#[cfg(test)]
mod tests {
    use aiact_core::{Sector, Stage};
    use time::Month;

    use super::*;

    fn fixture_date() -> Date {
        match Date::from_calendar_date(2025, Month::March, 3) {
            Ok(date) => date,
            Err(err) => panic!("fixture date should be valid: {err}"),
        }
    }

    fn mk_request(
        system_name: &str,
        use_case: &str,
        context: &str,
        data_types: &[DataType],
    ) -> AssessRequest {
        AssessRequest {
            system_name: system_name.to_string(),
            use_case: use_case.to_string(),
            context: context.to_string(),
            sector: Sector::Employment,
            stage: Some(Stage::Production),
            data_types: data_types.iter().copied().collect(),
        }
    }

    // Test IDs: TAPI-001
    #[test]
    fn assess_resume_screening_end_to_end() -> Result<()> {
        let mut api = AssessmentApi::empty();
        let record = api.assess_on(
            mk_request(
                "Resume ranker",
                "Automated resume screening and candidate ranking",
                "HR recruitment process",
                &[DataType::PersonalData, DataType::BehavioralData],
            ),
            fixture_date(),
        )?;

        assert_eq!(record.id, 1);
        assert_eq!(record.tier, RiskTier::High);
        assert_eq!(record.risk_score, 70);
        assert_eq!(record.compliance_score, 60);
        assert_eq!(record.matched_rules, vec!["HR3"]);
        assert!(record.can_deploy);
        assert_eq!(record.penalty_text, "€15M or 3% global turnover");
        assert_eq!(record.stage, Some(Stage::Production));
        assert_eq!(api.records().len(), 1);
        Ok(())
    }

    // Test IDs: TAPI-002
    #[test]
    fn assess_chatbot_and_social_scoring_end_to_end() -> Result<()> {
        let mut api = AssessmentApi::empty();
        let chatbot = api.assess_on(
            mk_request(
                "Support bot",
                "chatbot for customer service",
                "e-commerce website",
                &[DataType::TextData],
            ),
            fixture_date(),
        )?;
        assert_eq!(chatbot.tier, RiskTier::Limited);
        assert_eq!(chatbot.risk_score, 35);
        assert_eq!(chatbot.compliance_score, 85);
        assert_eq!(chatbot.matched_rules, vec!["LR1"]);

        let scoring = api.assess_on(
            mk_request(
                "Trust index",
                "Hiring pipeline enriched with social scoring",
                "Biometric kiosk",
                &[DataType::BiometricData],
            ),
            fixture_date(),
        )?;
        assert_eq!(scoring.id, 2);
        assert_eq!(scoring.tier, RiskTier::Unacceptable);
        assert_eq!(scoring.risk_score, 100);
        assert!(!scoring.can_deploy);
        assert_eq!(scoring.recommendations[0], "PROHIBITED - Cannot be deployed in EU");
        Ok(())
    }

    // Test IDs: TAPI-003
    #[test]
    fn assess_rejects_missing_fields_without_storing() {
        let mut api = AssessmentApi::with_store(AssessmentStore::seeded(fixture_date()));
        let err = match api.assess_on(mk_request("Bot", "", "", &[DataType::TextData]), fixture_date()) {
            Ok(record) => panic!("invalid request should be rejected: {record:?}"),
            Err(err) => err,
        };

        assert_eq!(
            err.downcast_ref::<KernelError>(),
            Some(&KernelError::Validation { fields: vec!["use_case", "context"] })
        );
        assert_eq!(api.records().len(), 2);
    }

    // Test IDs: TAPI-004
    #[test]
    fn batch_reports_rejections_by_index_and_keeps_ids_dense() {
        let mut api = AssessmentApi::with_store(AssessmentStore::seeded(fixture_date()));
        let result = api.batch(vec![
            mk_request("Proctor", "Exam proctoring", "University", &[DataType::BiometricData]),
            mk_request("", "Virtual assistant", "Bank", &[DataType::TextData]),
            mk_request("Planner", "Route planning", "Depot", &[DataType::TextData]),
        ]);

        assert_eq!(result.accepted.iter().map(|record| record.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].index, 1);
        assert!(result.rejected[0].error.contains("system_name"));
        assert_eq!(api.summary().total, 4);
    }

    // Test IDs: TAPI-005
    #[test]
    fn classify_reports_compliance_and_recommendations_without_recording() {
        let api = AssessmentApi::empty();
        let result = api.classify(&ClassifyRequest {
            use_case: "Facial recognition for hiring".to_string(),
            context: "Warehouse".to_string(),
            data_types: [DataType::BiometricData, DataType::PersonalData].into_iter().collect(),
        });

        assert_eq!(result.classification.tier, RiskTier::High);
        assert_eq!(result.classification.score, 80);
        assert_eq!(result.compliance_score, 60);
        assert_eq!(result.recommendations.len(), 5);
        assert_eq!(result.catalog_digest, api.catalog().digest());
        assert!(api.records().is_empty());
    }

    // Test IDs: TAPI-006
    #[test]
    fn recommend_and_rules_resolve_labels() -> Result<()> {
        let api = AssessmentApi::empty();
        let list = api.recommend("limited")?;
        assert_eq!(list.tier, RiskTier::Limited);
        assert_eq!(list.recommendations.len(), 3);

        let err = match api.recommend("catastrophic") {
            Ok(list) => panic!("unknown tier should be rejected: {list:?}"),
            Err(err) => err,
        };
        assert_eq!(
            err.downcast_ref::<KernelError>(),
            Some(&KernelError::UnknownTier("catastrophic".to_string()))
        );

        let high = api.rules(Some(AssessmentApi::parse_category("high-risk")?));
        assert_eq!(high.rules.len(), 5);
        assert_eq!(api.rules(None).rules.len(), 10);
        assert_eq!(high.digest, api.catalog().digest());
        assert!(AssessmentApi::parse_category("annex").is_err());
        Ok(())
    }

    // Test IDs: TAPI-007
    #[test]
    fn exports_cover_every_record() -> Result<()> {
        let mut api = AssessmentApi::with_store(AssessmentStore::seeded(fixture_date()));
        api.assess_on(
            mk_request("Deepfake studio", "Synthetic media generation", "Marketing", &[DataType::TextData]),
            fixture_date(),
        )?;

        let csv = api.export_csv()?;
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.contains("Deepfake studio,2025-03-03"));

        let document: serde_json::Value = serde_json::from_str(&api.export_record(3)?)?;
        assert_eq!(document["matched_rules"][0], "LR2");
        assert_eq!(document["date"], "2025-03-03");

        let all: serde_json::Value = serde_json::from_str(&api.export_json()?)?;
        assert_eq!(all.as_array().map(Vec::len), Some(3));
        assert!(api.export_record(99).is_err());
        Ok(())
    }
}
