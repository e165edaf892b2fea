use httpmock::prelude::*;
use interview_etl::domain::model::Record;
use interview_etl::{HttpTableStore, LocalStore, PipelineSettings, SplitPipeline};
use serde_json::json;
use tempfile::TempDir;

fn settings_for(base_url: String) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.store.base_url = base_url;
    settings.store.raw_table = "Candidates".to_string();
    settings.store.clean_table = "Rounds".to_string();
    settings
}

#[tokio::test]
async fn test_split_run_with_local_store() {
    let temp_dir = TempDir::new().unwrap();
    let raw_rows = json!([
        {"id": "rec1", "fields": {
            "Candidate Name": "Jane Doe",
            "Email": "jane@example.com",
            "Interview Rounds": "HR, Tech,, Manager",
            "Added On": "2024-05-02T09:30:00Z"
        }},
        {"id": "rec2", "fields": {
            "Candidate Name": "Bob Stone",
            "Interview Rounds": "HR"
        }},
        {"id": "rec3", "fields": {
            "Candidate Name": "Amy Lee",
            "Email": "amy@example.com",
            "Interview Rounds": " , "
        }},
        {"id": "rec4", "fields": {
            "Candidate Name": "Li Wei",
            "Email": "li@example.com",
            "Interview Rounds": "Culture   Fit",
            "Added On": "2024-05-03"
        }}
    ]);
    std::fs::write(
        temp_dir.path().join("Candidates.json"),
        serde_json::to_vec(&raw_rows).unwrap(),
    )
    .unwrap();

    let settings = settings_for("http://localhost:8080/v0".to_string());
    let pipeline = SplitPipeline::new(LocalStore::new(temp_dir.path()), &settings);

    let summary = pipeline.run().await;

    assert!(summary.success);
    assert_eq!(summary.total_input, 4);
    assert_eq!(summary.processed_count, 4);
    assert_eq!(summary.skipped_count, 2);
    assert_eq!(summary.error_count, 0);

    let data = std::fs::read(temp_dir.path().join("Rounds.json")).unwrap();
    let created: Vec<Record> = serde_json::from_slice(&data).unwrap();
    let rounds: Vec<(&str, &str)> = created
        .iter()
        .map(|r| {
            (
                r.fields["Interview Round"].as_str().unwrap(),
                r.fields["Calendly Link"].as_str().unwrap(),
            )
        })
        .collect();

    assert_eq!(
        rounds,
        vec![
            ("HR", "https://calendly.com/recruiting-team/hr-interview"),
            ("Tech", "https://calendly.com/recruiting-team/technical-interview"),
            ("Manager", "https://calendly.com/recruiting-team/manager-interview"),
            ("Culture Fit", ""),
        ]
    );
    assert!(created.iter().all(|r| r.fields["Email Status"] == "Pending"));
    assert_eq!(created[0].fields["Added On"], "2024-05-02T09:30:00Z");
    assert_eq!(created[3].fields["Added On"], "2024-05-03");
}

#[tokio::test]
async fn test_split_run_with_http_store() {
    let server = MockServer::start();

    let list_mock = server.mock(|when, then| {
        when.method(GET).path("/v0/app1/Candidates");
        then.status(200).json_body(json!({
            "records": [
                {"id": "rec1", "fields": {
                    "Candidate Name": "Jane Doe",
                    "Email": "jane@example.com",
                    "Interview Rounds": "HR, Tech"
                }}
            ]
        }));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v0/app1/Rounds")
            .json_body_partial(r#"{"fields": {"Email": "jane@example.com", "Email Status": "Pending"}}"#);
        then.status(200).json_body(json!({"id": "recNew"}));
    });

    let settings = settings_for(server.url("/v0/app1"));
    let pipeline = SplitPipeline::new(HttpTableStore::new(&settings.store), &settings);

    let summary = pipeline.run().await;

    list_mock.assert();
    create_mock.assert_hits(2);
    assert!(summary.success);
    assert_eq!(summary.processed_count, 2);
}

#[tokio::test]
async fn test_split_run_with_unreachable_store() {
    let mut settings = settings_for("http://127.0.0.1:1/v0".to_string());
    settings.store.timeout_ms = 500;
    let pipeline = SplitPipeline::new(HttpTableStore::new(&settings.store), &settings);

    let summary = pipeline.run().await;

    assert!(!summary.success);
    assert_eq!(summary.total_input, 0);
    assert!(summary.fatal_error.is_some());
}
