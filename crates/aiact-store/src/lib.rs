use std::io::Write;

use aiact_core::{
    calendar_date, recommend, AssessmentDraft, AssessmentRecord, Classification, DataType,
    KernelError, RiskTier, RuleCatalog, Sector, NO_PENALTY,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

pub const CSV_COLUMNS: [&str; 12] = [
    "id",
    "system_name",
    "date",
    "sector",
    "stage",
    "tier",
    "risk_score",
    "compliance_score",
    "can_deploy",
    "penalty_text",
    "matched_rules",
    "data_types",
];

const MULTI_VALUE_SEPARATOR: &str = ";";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierCounts {
    pub unacceptable: usize,
    pub high: usize,
    pub limited: usize,
    pub minimal: usize,
}

impl TierCounts {
    #[must_use]
    pub fn get(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Unacceptable => self.unacceptable,
            RiskTier::High => self.high,
            RiskTier::Limited => self.limited,
            RiskTier::Minimal => self.minimal,
        }
    }

    fn increment(&mut self, tier: RiskTier) {
        let slot = match tier {
            RiskTier::Unacceptable => &mut self.unacceptable,
            RiskTier::High => &mut self.high,
            RiskTier::Limited => &mut self.limited,
            RiskTier::Minimal => &mut self.minimal,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSummary {
    pub total: usize,
    pub by_tier: TierCounts,
    pub high_or_unacceptable: usize,
    pub mean_risk_score: Option<f64>,
    pub mean_compliance_score: Option<f64>,
}

/// Append-only, in-memory sequence of assessment records for one session.
#[derive(Debug, Clone, Default)]
pub struct AssessmentStore {
    records: Vec<AssessmentRecord>,
}

impl AssessmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the two demonstration records, dated relative to `today`.
    #[must_use]
    pub fn seeded(today: Date) -> Self {
        Self { records: seed_records(today) }
    }

    /// Id the next built record will receive: max existing id + 1, or 1 when empty.
    ///
    /// # Errors
    /// Returns [`KernelError::IdExhausted`] when the max existing id is `u64::MAX`.
    pub fn next_id(&self) -> Result<u64, KernelError> {
        let last = self.records.iter().map(|record| record.id).max().unwrap_or(0);
        last.checked_add(1).ok_or(KernelError::IdExhausted { last })
    }

    /// Append an externally built record. Its id must be exactly [`Self::next_id`].
    ///
    /// # Errors
    /// Returns an error when `record.id` is not the next dense id or the id space is
    /// exhausted.
    pub fn append(&mut self, record: AssessmentRecord) -> Result<()> {
        let next_id = self.next_id()?;
        if record.id != next_id {
            return Err(anyhow!("record id {} must be {next_id} to keep ids dense", record.id));
        }
        self.push(record);
        Ok(())
    }

    fn push(&mut self, record: AssessmentRecord) {
        tracing::debug!(id = record.id, tier = %record.tier, "appending assessment record");
        self.records.push(record);
    }

    /// Records in insertion order.
    #[must_use]
    pub fn all(&self) -> &[AssessmentRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&AssessmentRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Up to `limit` records, newest date first; same-day records by descending id.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&AssessmentRecord> {
        let mut ordered = self.records.iter().collect::<Vec<_>>();
        ordered.sort_by(|lhs, rhs| rhs.date.cmp(&lhs.date).then_with(|| rhs.id.cmp(&lhs.id)));
        ordered.truncate(limit);
        ordered
    }

    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        let mut by_tier = TierCounts::default();
        for record in &self.records {
            by_tier.increment(record.tier);
        }

        StoreSummary {
            total: self.records.len(),
            by_tier,
            high_or_unacceptable: by_tier.high + by_tier.unacceptable,
            mean_risk_score: mean(self.records.iter().map(|record| u64::from(record.risk_score))),
            mean_compliance_score: mean(
                self.records.iter().map(|record| u64::from(record.compliance_score)),
            ),
        }
    }

    /// Write every record as one CSV row under [`CSV_COLUMNS`].
    ///
    /// # Errors
    /// Returns an error when a row cannot be encoded or the writer fails.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_COLUMNS).context("failed to write CSV header")?;

        for record in &self.records {
            let date = calendar_date::format(record.date)
                .with_context(|| format!("failed to format date of record {}", record.id))?;
            csv_writer
                .write_record([
                    record.id.to_string(),
                    record.system_name.clone(),
                    date,
                    record.sector.label().to_string(),
                    record.stage.map(|stage| stage.as_str().to_string()).unwrap_or_default(),
                    record.tier.as_str().to_string(),
                    record.risk_score.to_string(),
                    record.compliance_score.to_string(),
                    record.can_deploy.to_string(),
                    record.penalty_text.clone(),
                    record.matched_rules.join(MULTI_VALUE_SEPARATOR),
                    record
                        .data_types
                        .iter()
                        .map(|data_type| data_type.label())
                        .collect::<Vec<_>>()
                        .join(MULTI_VALUE_SEPARATOR),
                ])
                .with_context(|| format!("failed to write CSV row for record {}", record.id))?;
        }

        csv_writer.flush().context("failed to flush CSV export")?;
        Ok(())
    }

    /// Render the CSV export into a string.
    ///
    /// # Errors
    /// Returns an error when encoding fails.
    pub fn export_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.export_csv(&mut buffer)?;
        String::from_utf8(buffer).context("CSV export is not valid UTF-8")
    }

    /// Full single-record document as pretty JSON.
    ///
    /// # Errors
    /// Returns an error when no record has `id` or serialization fails.
    pub fn export_record_json(&self, id: u64) -> Result<String> {
        let record = self.get(id).ok_or_else(|| anyhow!("assessment not found: {id}"))?;
        serde_json::to_string_pretty(record).context("failed to serialize assessment record")
    }

    /// Every record as a pretty JSON array.
    ///
    /// # Errors
    /// Returns an error when serialization fails.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records).context("failed to serialize assessment records")
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = u64>) -> Option<f64> {
    let (count, sum) = values.fold((0_u64, 0_u64), |(count, sum), value| {
        (count + 1, sum.saturating_add(value))
    });
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

/// Build a record from a validated draft and its classification, dated today (UTC),
/// and append it to `store`.
///
/// # Errors
/// Returns [`KernelError::Validation`] when required draft fields are empty; the store
/// is left untouched.
pub fn build_record(
    store: &mut AssessmentStore,
    draft: AssessmentDraft,
    classification: &Classification<'_>,
    recommendations: &[&str],
) -> Result<AssessmentRecord, KernelError> {
    build_record_on(store, draft, classification, recommendations, OffsetDateTime::now_utc().date())
}

/// Same as [`build_record`] with an explicit creation date.
///
/// # Errors
/// Returns [`KernelError::Validation`] when required draft fields are empty, or
/// [`KernelError::IdExhausted`] when no further id can be assigned.
pub fn build_record_on(
    store: &mut AssessmentStore,
    draft: AssessmentDraft,
    classification: &Classification<'_>,
    recommendations: &[&str],
    date: Date,
) -> Result<AssessmentRecord, KernelError> {
    draft.validate()?;

    let record = AssessmentRecord {
        id: store.next_id()?,
        compliance_score: aiact_core::compliance_score(
            classification.tier,
            draft.data_types.len(),
        ),
        system_name: draft.system_name,
        use_case: draft.use_case,
        context: draft.context,
        sector: draft.sector,
        stage: draft.stage,
        data_types: draft.data_types,
        tier: classification.tier,
        risk_score: classification.score,
        matched_rules: classification.matched_rule_ids(),
        recommendations: recommendations.iter().map(ToString::to_string).collect(),
        can_deploy: classification.can_deploy,
        penalty_text: classification.penalty_text.clone(),
        date,
    };

    store.push(record.clone());
    Ok(record)
}

fn catalog_penalty(rule_id: &str) -> String {
    RuleCatalog::eu_ai_act()
        .find(rule_id)
        .map_or(NO_PENALTY, |rule| rule.penalty)
        .to_string()
}

/// The two demonstration records every new session starts with.
#[must_use]
pub fn seed_records(today: Date) -> Vec<AssessmentRecord> {
    let days_ago = |days: i64| today.checked_sub(Duration::days(days)).unwrap_or(today);

    vec![
        AssessmentRecord {
            id: 1,
            system_name: "CV Screening AI".to_string(),
            use_case: "Automated resume screening and candidate ranking".to_string(),
            context: "HR recruitment process".to_string(),
            sector: Sector::Employment,
            stage: None,
            data_types: [DataType::PersonalData, DataType::BehavioralData].into_iter().collect(),
            tier: RiskTier::High,
            risk_score: 85,
            compliance_score: 67,
            matched_rules: vec!["HR3".to_string()],
            recommendations: recommend(RiskTier::High).iter().map(ToString::to_string).collect(),
            can_deploy: true,
            penalty_text: catalog_penalty("HR3"),
            date: days_ago(1),
        },
        AssessmentRecord {
            id: 2,
            system_name: "Customer Support Chatbot".to_string(),
            use_case: "Automated customer service responses".to_string(),
            context: "E-commerce website".to_string(),
            sector: Sector::CustomerService,
            stage: None,
            data_types: [DataType::TextData].into_iter().collect(),
            tier: RiskTier::Limited,
            risk_score: 35,
            compliance_score: 90,
            matched_rules: vec!["LR1".to_string()],
            recommendations: recommend(RiskTier::Limited).iter().map(ToString::to_string).collect(),
            can_deploy: true,
            penalty_text: catalog_penalty("LR1"),
            date: days_ago(3),
        },
    ]
}
