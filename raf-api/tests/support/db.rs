use raf_api::db::{DbConfig, PgScoringEngine};

/// Set-returning stand-in for the scoring procedure. It reads the staged
/// temp tables, so it only works inside a scoring transaction.
pub const TEST_PROCEDURE: &str = "raf_test_score";

const CREATE_TEST_PROCEDURE: &str = r#"
CREATE OR REPLACE FUNCTION raf_test_score(py integer)
RETURNS TABLE("MemberID" varchar, "PaymentYear" integer, "HccCount" bigint, "RAF" numeric, "ScoredOn" date)
LANGUAGE plpgsql AS $$
#variable_conflict use_column
BEGIN
    RETURN QUERY
    SELECT m.member_id::varchar,
           py,
           (SELECT count(*) FROM temp_diagnosis d WHERE d.member_id = m.member_id),
           round(0.350 + 0.125 * (SELECT count(*) FROM temp_diagnosis d
                                  WHERE d.member_id = m.member_id), 3),
           make_date(py, 1, 1)
    FROM temp_membership m
    ORDER BY m.member_id;
END
$$;

CREATE OR REPLACE FUNCTION raf_test_fail(py integer)
RETURNS TABLE("RAF" numeric)
LANGUAGE plpgsql AS $$
BEGIN
    RAISE EXCEPTION 'no coefficients for payment year %', py;
END
$$;
"#;

pub fn test_db_config(procedure: &str) -> DbConfig {
    DbConfig {
        procedure: procedure.to_string(),
        ..DbConfig::from_env()
    }
}

pub async fn test_engine(procedure: &str) -> PgScoringEngine {
    let config = test_db_config(procedure);
    let pool = config.create_pool().expect("Failed to create database pool");
    let client = pool.get().await.expect("Failed to get database connection");
    client
        .batch_execute(CREATE_TEST_PROCEDURE)
        .await
        .expect("Failed to create test procedures");
    PgScoringEngine::new(pool, &config).expect("Invalid procedure name")
}
