//! Extract, enrich against a local biblio-glutton stand-in, then summarize.

use std::collections::HashMap;

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use verrific_core::{EnrichOptions, enrich_with_glutton, extract_references_from_str};
use verrific_reporting::summary::{MATCHED, NOT_MATCHED};
use verrific_reporting::{ExportFormat, SummaryStats, render, summarize};

const TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <text><back><div type="references"><listBibl>
    <biblStruct>
      <analytic><title level="a">Known Paper</title></analytic>
      <idno type="DOI">10.1/ABC</idno>
    </biblStruct>
    <biblStruct>
      <analytic>
        <title level="a">Foo</title>
        <author><persName><surname>Bar</surname></persName></author>
      </analytic>
    </biblStruct>
  </listBibl></div></back></text>
</TEI>"#;

async fn lookup(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("doi").map(String::as_str) {
        Some("10.1/ABC") => axum::Json(serde_json::json!({"match": true})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_glutton() -> String {
    let app = Router::new().route("/service/lookup", get(lookup));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn summary_marks_matched_and_unmatched_references() {
    let url = spawn_glutton().await;
    let mut refs = extract_references_from_str(TEI);
    enrich_with_glutton(&mut refs, &url, &EnrichOptions::default())
        .await
        .unwrap();

    let rows = summarize(&refs);
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].doi, "10.1/ABC");
    assert_eq!(rows[0].title, "Known Paper");
    assert_eq!(rows[0].matched_indicator(), MATCHED);

    assert_eq!(rows[1].doi, "");
    assert_eq!(rows[1].title, "Foo");
    assert_eq!(rows[1].first_author_surname, "Bar");
    assert_eq!(rows[1].matched_indicator(), NOT_MATCHED);

    let stats = SummaryStats::from_references(&refs);
    assert_eq!(stats.matched, 1);
    assert_eq!(stats.failed, 1);

    let csv = render(&refs, ExportFormat::Csv).unwrap();
    assert!(csv.contains("2,,Foo,Bar,Foo Bar,false,HTTP 404"));
}
