//! # Structured Response Extraction Tests

use handelingen::analysis::structured::{extract_structured, ExtractionError};
use serde_json::json;
use std::time::Duration;

const LIMIT: Duration = Duration::from_secs(5);

#[test]
fn test_fenced_object_is_parsed_directly() {
    let raw = "```json\n{\"gevonden_delegitimatie\": [], \"score\": 1}\n```";
    let result = extract_structured(raw, LIMIT).unwrap();
    assert_eq!(result["score"], json!(1));
}

#[test]
fn test_same_input_gives_same_output() {
    let raw = "Analyse: {\"a\": {\"b\": [1, 2]}} klaar";
    assert_eq!(
        extract_structured(raw, LIMIT),
        extract_structured(raw, LIMIT)
    );
}

#[test]
fn test_text_without_braces_is_not_found() {
    assert_eq!(
        extract_structured("Ik kan deze tekst niet analyseren.", LIMIT),
        Err(ExtractionError::NotFound)
    );
}

#[test]
fn test_unterminated_object_is_not_found() {
    assert_eq!(
        extract_structured("prefix {\"a\": {\"b\": 1}", LIMIT),
        Err(ExtractionError::NotFound)
    );
}

#[test]
fn test_nested_object_is_recovered_from_surrounding_prose() {
    // --- Arrange ---
    let raw = "Hier is het resultaat:\n{\"outer\": {\"inner\": {\"x\": 1}}, \"list\": [{\"y\": 2}]}\nEinde.";

    // --- Act ---
    let result = extract_structured(raw, LIMIT).unwrap();

    // --- Assert ---
    assert_eq!(result["outer"]["inner"]["x"], json!(1));
    assert_eq!(result["list"][0]["y"], json!(2));
}

#[test]
fn test_braces_inside_strings_do_not_end_the_object() {
    let raw = r#"noise {"quote": "a } and { inside", "escaped": "say \"}\" now"} trailing"#;
    let result = extract_structured(raw, LIMIT).unwrap();
    assert_eq!(result["quote"], json!("a } and { inside"));
    assert_eq!(result["escaped"], json!("say \"}\" now"));
}

#[test]
fn test_recovers_after_a_broken_first_candidate() {
    // --- Arrange ---
    let raw = "{broken: yes} and then {\"ok\": true}";

    // --- Act ---
    let result = extract_structured(raw, LIMIT).unwrap();

    // --- Assert ---
    assert_eq!(result["ok"], json!(true));
}

#[test]
fn test_only_broken_candidates_is_parse_failure() {
    let result = extract_structured("{a} {b: 1}", LIMIT);
    assert!(matches!(
        result,
        Err(ExtractionError::ParseFailure { candidates: 2, .. })
    ));
}

#[test]
fn test_top_level_array_is_not_accepted_as_result() {
    let result = extract_structured("[{\"a\": 1}]", LIMIT).unwrap();
    assert_eq!(result["a"], json!(1));
}

#[test]
fn test_zero_time_limit_times_out() {
    let result = extract_structured("{\"a\": 1}", Duration::ZERO);
    assert_eq!(
        result,
        Err(ExtractionError::TimedOut {
            limit: Duration::ZERO
        })
    );
}

#[test]
fn test_large_noisy_input_finishes_within_budget() {
    let mut raw = "x".repeat(1_000_000);
    raw.push_str("{\"end\": true}");
    let result = extract_structured(&raw, LIMIT).unwrap();
    assert_eq!(result["end"], json!(true));
}
