//! HTTP contract tests for the failure classifier, against a mock
//! chat-completions endpoint.

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linrep::batch;
use linrep::classify::FailureClassifier;

fn test_classifier(server: &MockServer) -> FailureClassifier {
    FailureClassifier::new(Some("test-key".to_string()), "gpt-4o")
        .unwrap()
        .with_base_url(server.uri())
}

/// A chat-completions response whose assistant message is `content`.
fn chat_body(content: &str) -> Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn classifies_plain_json_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "temperature": 0.7,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("{\"failure_type\": \"Beam Generation\"}")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    let result = classifier.classify_report("GFIL, down", "gun interlock", 3).await;

    assert_eq!(result, json!({ "failure_type": "Beam Generation" }));
}

#[tokio::test]
async fn strips_markdown_fence_before_parsing() {
    let server = MockServer::start().await;

    let fenced = "Here is the classification:\n```json\n{\"failure_type\": \"Collimation System, Control Hardware\"}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(fenced)))
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    let result = classifier.classify_report("MLC fault", "leaf motor", 3).await;

    assert_eq!(
        result["failure_type"],
        "Collimation System, Control Hardware"
    );
}

#[tokio::test]
async fn hallucinated_category_passes_through_unchecked() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("{\"failure_type\": \"Warp Drive\"}")),
        )
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    let result = classifier.classify_report("odd report", "strange noise", 1).await;

    // No schema validation on the result object.
    assert_eq!(result, json!({ "failure_type": "Warp Drive" }));
}

#[tokio::test]
async fn transport_failure_retries_exactly_max_times() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(3)
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    let result = classifier.classify_report("subject", "description", 3).await;

    assert_eq!(result["failure_type"], "APIError");
    assert!(result["error"].as_str().unwrap().contains("500"));
    // Mock::expect(3) verifies the attempt count when the server drops.
}

#[tokio::test]
async fn unparseable_response_becomes_parse_error_sentinel() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            "```\nthe couch axis is stuck, probably mechanical\n```",
        )))
        .expect(2)
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    let result = classifier.classify_report("couch stuck", "axis jam", 2).await;

    assert_eq!(result["failure_type"], "ParseError");
    assert_eq!(
        result["raw_response"],
        "the couch axis is stuck, probably mechanical"
    );
    assert!(result["error"].is_string());
}

#[tokio::test]
async fn zero_attempt_budget_yields_unknown_error() {
    // No server at all: with zero attempts, no request is ever made.
    let classifier = FailureClassifier::new(Some("test-key".to_string()), "gpt-4o")
        .unwrap()
        .with_base_url("http://127.0.0.1:1");

    let result = classifier.classify_report("subject", "description", 0).await;
    assert_eq!(result, json!({ "failure_type": "UnknownError" }));
}

#[tokio::test]
async fn failure_type_is_always_a_string() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let classifier = test_classifier(&server);
    for (subject, description) in [("", ""), ("GFIL", "gun interlock"), ("χ", "�")] {
        let result = classifier.classify_report(subject, description, 2).await;
        assert!(result["failure_type"].is_string());
    }
}

#[tokio::test]
async fn classify_table_appends_result_columns_in_row_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("{\"failure_type\": \"Treatment Couch\"}")),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("reports.csv");
    let output = dir.path().join("classified.csv");
    std::fs::write(
        &input,
        "work_order_id,subject,description\nWO-1,couch stuck,axis jam\nWO-2,pendant dead,no motion\n",
    )
    .unwrap();

    let classifier = test_classifier(&server);
    batch::classify_table(&input, &output, &classifier, 3)
        .await
        .unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec![
            "work_order_id",
            "subject",
            "description",
            "llm_classification",
            "failure_type"
        ]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(0), Some("WO-1"));
    assert_eq!(rows[1].get(0), Some("WO-2"));
    for row in &rows {
        let parsed: Value = serde_json::from_str(row.get(3).unwrap()).unwrap();
        assert_eq!(parsed["failure_type"], "Treatment Couch");
        assert_eq!(row.get(4), Some("Treatment Couch"));
    }
}
