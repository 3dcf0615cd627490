//! RAF Test Utilities
//!
//! Shared test infrastructure for the RAF workspace:
//! - Proptest generators for records and requests
//! - Fixtures for common scoring scenarios
//! - The in-process mock scoring engine

// Re-export the mock engine from its source crate
pub use raf_storage::{MockScoringEngine, MOCK_RESULT_COLUMNS};

// Re-export core types for convenience
pub use raf_core::{
    fingerprint, DiagnosisRecord, Flag, MembershipRecord, RawResultSet, RawValue,
    RequestFingerprint, ScoringConfig, ScoringRequest,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (1930i32..2030, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
    }

    pub fn arb_flag() -> impl Strategy<Value = Flag> {
        prop_oneof![Just(Flag::Yes), Just(Flag::No)]
    }

    pub fn arb_member_id() -> impl Strategy<Value = String> {
        "[A-Z][0-9]{3,9}"
    }

    pub fn arb_membership() -> impl Strategy<Value = MembershipRecord> {
        (
            arb_member_id(),
            arb_date(),
            "[MF]",
            prop_oneof![Just("CN"), Just("CP"), Just("CF"), Just("I"), Just("D")],
            arb_flag(),
            arb_flag(),
            arb_flag(),
            "[0-3]",
        )
            .prop_map(
                |(member_id, birth_date, gender, ra_type, hospice, ltimcaid, nemcaid, orec)| {
                    MembershipRecord {
                        member_id,
                        birth_date,
                        gender,
                        ra_type: ra_type.to_string(),
                        hospice,
                        ltimcaid,
                        nemcaid,
                        orec,
                    }
                },
            )
    }

    pub fn arb_diagnosis() -> impl Strategy<Value = DiagnosisRecord> {
        (arb_member_id(), arb_date(), 0i64..60, "[A-Z][0-9]{2}[0-9A-Z]{0,4}").prop_map(
            |(member_id, from_dos, span_days, dx_code)| DiagnosisRecord {
                member_id,
                thru_dos: from_dos + chrono::Duration::days(span_days),
                from_dos,
                dx_code,
            },
        )
    }

    /// Valid requests with up to `max_members` memberships and twice as many diagnoses.
    pub fn arb_request(max_members: usize) -> impl Strategy<Value = ScoringRequest> {
        (
            2015i32..2030,
            prop::collection::vec(arb_membership(), 0..=max_members),
            prop::collection::vec(arb_diagnosis(), 0..=max_members * 2),
        )
            .prop_map(|(payment_year, memberships, diagnoses)| ScoringRequest {
                payment_year,
                memberships,
                diagnoses,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    pub fn membership(member_id: &str) -> MembershipRecord {
        MembershipRecord {
            member_id: member_id.to_string(),
            birth_date: date(1950, 3, 12),
            gender: "F".to_string(),
            ra_type: "CN".to_string(),
            hospice: Flag::No,
            ltimcaid: Flag::No,
            nemcaid: Flag::No,
            orec: "0".to_string(),
        }
    }

    pub fn diagnosis(member_id: &str, dx_code: &str) -> DiagnosisRecord {
        DiagnosisRecord {
            member_id: member_id.to_string(),
            from_dos: date(2023, 1, 5),
            thru_dos: date(2023, 1, 5),
            dx_code: dx_code.to_string(),
        }
    }

    /// Two members, three diagnoses, payment year 2024.
    pub fn small_request() -> ScoringRequest {
        ScoringRequest {
            payment_year: 2024,
            memberships: vec![membership("M001"), membership("M002")],
            diagnoses: vec![
                diagnosis("M001", "E119"),
                diagnosis("M001", "I5022"),
                diagnosis("M002", "J449"),
            ],
        }
    }

    /// `members` memberships with `dx_per_member` diagnoses each.
    pub fn sized_request(members: usize, dx_per_member: usize) -> ScoringRequest {
        let ids: Vec<String> = (0..members).map(|i| format!("M{:06}", i)).collect();
        ScoringRequest {
            payment_year: 2024,
            memberships: ids.iter().map(|id| membership(id)).collect(),
            diagnoses: ids
                .iter()
                .flat_map(|id| {
                    (0..dx_per_member).map(move |n| diagnosis(id, &format!("E11{}", n % 10)))
                })
                .collect(),
        }
    }

    /// [`small_request`] as it arrives on the wire.
    pub fn small_request_json() -> Value {
        json!({
            "payment_year": 2024,
            "memberships": [
                {
                    "MemberID": "M001", "DOB": "1950-03-12", "Gender": "F", "RAType": "CN",
                    "Hospice": "N", "LTIMCAID": "N", "NEMCAID": "N", "OREC": "0"
                },
                {
                    "MemberID": "M002", "DOB": "1950-03-12", "Gender": "F", "RAType": "CN",
                    "Hospice": "N", "LTIMCAID": "N", "NEMCAID": "N", "OREC": "0"
                }
            ],
            "diagnoses": [
                {"MemberID": "M001", "FromDOS": "2023-01-05", "ThruDOS": "2023-01-05", "DxCode": "E119"},
                {"MemberID": "M001", "FromDOS": "2023-01-05", "ThruDOS": "2023-01-05", "DxCode": "I5022"},
                {"MemberID": "M002", "FromDOS": "2023-01-05", "ThruDOS": "2023-01-05", "DxCode": "J449"}
            ]
        })
    }

    /// A result set with one value of every shape the normalizer handles.
    pub fn mixed_result_set() -> RawResultSet {
        RawResultSet::new(
            ["MemberID", "RAF", "HccCount", "EffectiveDate", "Note"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .with_row(vec![
            RawValue::Text("M001".to_string()),
            RawValue::Decimal("123.45".to_string()),
            RawValue::Integer(3),
            RawValue::Date(date(2024, 1, 15)),
            RawValue::Null,
        ])
    }
}
