use awe_store_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_ok() {
    let response = health_check().await;
    assert!(response.0.success);
    assert_eq!(response.0.code, 200);

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}
