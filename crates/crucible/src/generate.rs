//! Ground-truth record generation
//!
//! Fills a schema with synthetic, internally consistent client data.
//! Generation is deterministic per seed so runs are reproducible and
//! diffable. Values are drawn from domain vocabularies keyed off the field
//! name, with type-appropriate fallbacks, so a "balance" gets a plausible
//! account balance and a "city" gets a city.

use chrono::{Days, NaiveDate, Utc};
use common::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, FieldKind, Schema};
use crate::value::{Record, Value};

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Sequence fields sample a length in this inclusive range
    #[serde(default = "default_seq_min")]
    pub sequence_len_min: usize,
    #[serde(default = "default_seq_max")]
    pub sequence_len_max: usize,
    /// "Today" for date generation; pin this in tests for determinism
    #[serde(default = "default_reference_date")]
    pub reference_date: NaiveDate,
}

fn default_seq_min() -> usize {
    1
}

fn default_seq_max() -> usize {
    3
}

fn default_reference_date() -> NaiveDate {
    Utc::now().date_naive()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sequence_len_min: default_seq_min(),
            sequence_len_max: default_seq_max(),
            reference_date: default_reference_date(),
        }
    }
}

/// Synthesizes fully populated, type-valid records from a schema
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate a complete reference record
    ///
    /// Guarantees: no null leaves, every value type-valid against the
    /// schema, identical output for identical (schema, seed).
    pub fn generate(&self, schema: &Schema, seed: u64) -> Result<Record> {
        if self.config.sequence_len_min == 0 || self.config.sequence_len_min > self.config.sequence_len_max {
            return Err(Error::config(format!(
                "invalid sequence length range {}..={}",
                self.config.sequence_len_min, self.config.sequence_len_max
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let entries = self.gen_entries(schema, &mut rng)?;
        Ok(Record::new(entries))
    }

    fn gen_entries(&self, schema: &Schema, rng: &mut StdRng) -> Result<Vec<(String, Value)>> {
        schema
            .fields
            .iter()
            .map(|field| Ok((field.name.clone(), self.gen_value(field, rng)?)))
            .collect()
    }

    fn gen_value(&self, field: &Field, rng: &mut StdRng) -> Result<Value> {
        self.gen_kind(&field.name, &field.kind, rng)
    }

    fn gen_kind(&self, name: &str, kind: &FieldKind, rng: &mut StdRng) -> Result<Value> {
        match kind {
            FieldKind::Text => Ok(Value::Text(self.gen_text(name, rng))),
            FieldKind::Number => Ok(Value::Number(self.gen_number(name, rng))),
            FieldKind::Date => Ok(Value::Date(self.gen_date(name, rng))),
            FieldKind::Boolean => Ok(Value::Bool(rng.gen_bool(0.5))),
            FieldKind::Choice(options) => {
                if options.is_empty() {
                    return Err(Error::schema(format!(
                        "enum field '{}' declares no options",
                        name
                    )));
                }
                Ok(Value::Choice(options[rng.gen_range(0..options.len())].clone()))
            }
            FieldKind::Record(schema) => Ok(Value::Record(self.gen_entries(schema, rng)?)),
            FieldKind::Sequence(inner) => {
                let len =
                    rng.gen_range(self.config.sequence_len_min..=self.config.sequence_len_max);
                let items = (0..len)
                    .map(|_| self.gen_kind(name, inner, rng))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Sequence(items))
            }
        }
    }

    fn gen_text(&self, name: &str, rng: &mut StdRng) -> String {
        let key = name.to_lowercase();
        if key.contains("first") && key.contains("name") {
            return pick(FIRST_NAMES, rng).to_string();
        }
        if key.contains("surname") || (key.contains("last") && key.contains("name")) {
            return pick(SURNAMES, rng).to_string();
        }
        if key.contains("name") && !key.contains("user") {
            return format!("{} {}", pick(FIRST_NAMES, rng), pick(SURNAMES, rng));
        }
        if key.contains("email") {
            return format!(
                "{}.{}@{}",
                pick(FIRST_NAMES, rng).to_lowercase(),
                pick(SURNAMES, rng).to_lowercase(),
                pick(EMAIL_DOMAINS, rng)
            );
        }
        if key.contains("phone") || key.contains("mobile") || key.contains("tel") {
            return format!("07{:03} {:06}", rng.gen_range(0..1000), rng.gen_range(0..1_000_000));
        }
        if key.contains("address") || key.contains("street") {
            return format!("{} {}", rng.gen_range(1..200), pick(STREETS, rng));
        }
        if key.contains("city") || key.contains("town") {
            return pick(CITIES, rng).to_string();
        }
        if key.contains("postcode") || key.contains("zip") {
            return format!(
                "{}{} {}{}{}",
                pick(POSTCODE_AREAS, rng),
                rng.gen_range(1..30),
                rng.gen_range(1..10),
                pick_char(rng),
                pick_char(rng)
            );
        }
        if key.contains("occupation") || key.contains("job") || key.contains("role") {
            return pick(OCCUPATIONS, rng).to_string();
        }
        if key.contains("employer") || key.contains("company") || key.contains("provider")
            || key.contains("bank") || key.contains("institution")
        {
            return pick(INSTITUTIONS, rng).to_string();
        }
        if key.contains("insurance") || key.contains("nino") || key.contains("ssn")
            || key.contains("reference")
        {
            return format!(
                "{}{}{:06}{}",
                pick_char(rng),
                pick_char(rng),
                rng.gen_range(0..1_000_000),
                pick_char(rng)
            );
        }
        if key.contains("goal") || key.contains("objective") || key.contains("note")
            || key.contains("comment")
        {
            return pick(OBJECTIVES, rng).to_string();
        }
        // Unrecognised text fields still get a plausible free-text value
        format!("{} {}", pick(GENERIC_ADJECTIVES, rng), pick(GENERIC_NOUNS, rng))
    }

    fn gen_number(&self, name: &str, rng: &mut StdRng) -> f64 {
        let key = name.to_lowercase();
        if key.contains("income") || key.contains("salary") {
            return round2(rng.gen_range(18_000.0..150_000.0));
        }
        if key.contains("balance") || key.contains("savings") || key.contains("value")
            || key.contains("amount") || key.contains("fund")
        {
            return round2(rng.gen_range(500.0..250_000.0));
        }
        if key.contains("rate") || key.contains("percent") || key.contains("interest") {
            return round2(rng.gen_range(0.5..12.0));
        }
        if key.contains("age") {
            return rng.gen_range(18..80) as f64;
        }
        if key.contains("dependant") || key.contains("dependent") || key.contains("children")
            || key.contains("count")
        {
            return rng.gen_range(0..5) as f64;
        }
        if key.contains("term") || key.contains("years") {
            return rng.gen_range(1..30) as f64;
        }
        round2(rng.gen_range(100.0..50_000.0))
    }

    fn gen_date(&self, name: &str, rng: &mut StdRng) -> NaiveDate {
        let key = name.to_lowercase();
        let today = self.config.reference_date;
        if key.contains("birth") || key.contains("dob") {
            // Adults between 21 and 75
            let days = rng.gen_range(21 * 365..75 * 365) as u64;
            return today.checked_sub_days(Days::new(days)).unwrap_or(today);
        }
        if key.contains("maturity") || key.contains("expiry") || key.contains("renewal")
            || key.contains("review")
        {
            let days = rng.gen_range(30..3650) as u64;
            return today.checked_add_days(Days::new(days)).unwrap_or(today);
        }
        // Past events: account openings, employment start, purchases
        let days = rng.gen_range(30..5475) as u64;
        today.checked_sub_days(Days::new(days)).unwrap_or(today)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn pick<'a>(pool: &[&'a str], rng: &mut StdRng) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}

fn pick_char(rng: &mut StdRng) -> char {
    (b'A' + rng.gen_range(0..26u8)) as char
}

const FIRST_NAMES: &[&str] = &[
    "James", "Sarah", "Amara", "Daniel", "Priya", "Oliver", "Grace", "Hassan", "Emily", "Tomasz",
    "Fiona", "Marcus", "Yuki", "Helen", "Arjun", "Claire",
];

const SURNAMES: &[&str] = &[
    "Thompson", "Okafor", "Patel", "Kowalski", "Murray", "Chen", "Whitfield", "Adebayo",
    "Sullivan", "Novak", "Hendricks", "Osei", "Lindqvist", "Barrett",
];

const EMAIL_DOMAINS: &[&str] = &["gmail.com", "outlook.com", "yahoo.co.uk", "icloud.com"];

const STREETS: &[&str] = &[
    "High Street", "Victoria Road", "Mill Lane", "Church Close", "Station Road", "Kings Avenue",
    "Orchard Way", "Elm Grove",
];

const CITIES: &[&str] = &[
    "Manchester", "Bristol", "Leeds", "Edinburgh", "Cardiff", "Nottingham", "Glasgow", "Sheffield",
    "Brighton", "York",
];

const POSTCODE_AREAS: &[&str] = &["M", "BS", "LS", "EH", "CF", "NG", "G", "S", "BN", "YO"];

const OCCUPATIONS: &[&str] = &[
    "Software Engineer", "Teacher", "Nurse", "Accountant", "Project Manager", "Electrician",
    "Pharmacist", "Graphic Designer", "Civil Engineer", "Solicitor",
];

const INSTITUTIONS: &[&str] = &[
    "Barclays", "Nationwide", "HSBC", "Santander", "Halifax", "NatWest", "Aviva",
    "Legal & General", "Vanguard", "Fidelity",
];

const OBJECTIVES: &[&str] = &[
    "Save for a house deposit within five years",
    "Build a retirement fund targeting income at 65",
    "Reduce outstanding debt before taking on a mortgage",
    "Set up an emergency fund covering six months of expenses",
    "Invest for children's university costs",
    "Consolidate pension pots from previous employers",
];

const GENERIC_ADJECTIVES: &[&str] = &["standard", "joint", "fixed", "flexible", "primary"];

const GENERIC_NOUNS: &[&str] = &["arrangement", "plan", "account", "policy", "agreement"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    fn test_config() -> GeneratorConfig {
        GeneratorConfig {
            sequence_len_min: 1,
            sequence_len_max: 3,
            reference_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        }
    }

    fn test_schema() -> Schema {
        Schema::from_json(&json!({
            "fields": [
                {"name": "full_name", "type": "text", "required": true},
                {"name": "annual_income", "type": "number"},
                {"name": "date_of_birth", "type": "date"},
                {"name": "homeowner", "type": "boolean"},
                {"name": "risk_tolerance", "type": "enum", "options": ["low", "medium", "high"]},
                {"name": "address", "type": "record", "fields": [
                    {"name": "city", "type": "text"},
                    {"name": "postcode", "type": "text"}
                ]},
                {"name": "accounts", "type": "sequence", "item": {"type": "record", "fields": [
                    {"name": "provider", "type": "text"},
                    {"name": "balance", "type": "number"}
                ]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_generate_fully_populated_and_valid() {
        let schema = test_schema();
        let record = Generator::new(test_config()).generate(&schema, 7).unwrap();

        assert!(record.is_fully_populated());
        record.validate(&schema).unwrap();
    }

    #[test]
    fn test_generate_deterministic_per_seed() {
        let schema = test_schema();
        let generator = Generator::new(test_config());

        let a = generator.generate(&schema, 42).unwrap();
        let b = generator.generate(&schema, 42).unwrap();
        let c = generator.generate(&schema, 43).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_sequences_non_empty() {
        let schema = test_schema();
        let generator = Generator::new(test_config());
        for seed in 0..20 {
            let record = generator.generate(&schema, seed).unwrap();
            assert!(record.get("accounts[0].provider").is_some(), "seed {}", seed);
        }
    }

    #[test]
    fn test_enum_values_come_from_options() {
        let schema = test_schema();
        let generator = Generator::new(test_config());
        for seed in 0..20 {
            let record = generator.generate(&schema, seed).unwrap();
            match record.get("risk_tolerance").unwrap() {
                Value::Choice(option) => {
                    assert!(["low", "medium", "high"].contains(&option.as_str()))
                }
                other => panic!("expected enum value, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_birth_dates_are_adult() {
        let config = test_config();
        let schema = test_schema();
        let generator = Generator::new(config.clone());
        for seed in 0..20 {
            let record = generator.generate(&schema, seed).unwrap();
            match record.get("date_of_birth").unwrap() {
                Value::Date(dob) => {
                    let age_days = (config.reference_date - *dob).num_days();
                    assert!(age_days >= 21 * 365, "seed {}: {:?}", seed, dob);
                }
                other => panic!("expected date, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_sequence_range_rejected() {
        let mut config = test_config();
        config.sequence_len_min = 0;
        let err = Generator::new(config).generate(&test_schema(), 1).unwrap_err();
        assert!(matches!(err, common::Error::Config(_)));
    }
}
