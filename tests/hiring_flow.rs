mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};

use common::{send, Harness, ADMIN, OTHER_STUDENT, SECOND_TUTOR, STUDENT, TUTOR};
use tuition_backend::utils::routes;

fn find_application<'a>(rows: &'a Value, id: &str) -> &'a Value {
    rows.as_array()
        .unwrap()
        .iter()
        .find(|row| row["application"]["id"] == id)
        .map(|row| &row["application"])
        .unwrap()
}

#[actix_web::test]
async fn checkout_then_confirm_hires_one_tutor_and_rejects_the_rest() {
    let h = Harness::new();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(routes::configure)).await;

    let tuition = h.approved_tuition("Physics");
    let hired = h.application(TUTOR, &tuition, 5500.0);
    let passed_over = h.application(SECOND_TUTOR, &tuition, 5000.0);

    let req = test::TestRequest::post()
        .uri("/payments/checkout")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({ "applicationId": hired }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["amount"], 5500.0);
    let session = body["sessionId"].as_str().unwrap().to_string();

    // unpaid sessions are refused
    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({ "sessionId": session }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    h.gateway.complete(&session).unwrap();

    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({ "sessionId": session }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["tuition"]["status"], "assigned");
    assert_eq!(body["tuition"]["assignedTutorEmail"], TUTOR);
    assert_eq!(body["application"]["status"], "accepted");
    assert_eq!(body["payment"]["status"], "paid");

    let req = test::TestRequest::get()
        .uri(&format!("/tuitions/{}/applications", tuition))
        .insert_header(h.bearer(STUDENT))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(find_application(&body["applications"], &hired)["status"], "accepted");
    assert_eq!(find_application(&body["applications"], &passed_over)["status"], "rejected");

    let req = test::TestRequest::get()
        .uri("/applications/ongoing")
        .insert_header(h.bearer(TUTOR))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["applications"].as_array().unwrap().len(), 1);
    assert_eq!(body["applications"][0]["tuition"]["id"], tuition.as_str());

    let req = test::TestRequest::get()
        .uri("/payments/mine")
        .insert_header(h.bearer(TUTOR))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["totalEarnings"], 5500.0);

    let req = test::TestRequest::get()
        .uri("/notifications")
        .insert_header(h.bearer(SECOND_TUTOR))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert!(body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["message"].as_str().unwrap().contains("assigned to another tutor")));

    // a settled session is released and cannot be confirmed again
    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({ "sessionId": session }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn second_acceptance_on_an_assigned_post_conflicts() {
    let h = Harness::new();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(routes::configure)).await;

    let tuition = h.approved_tuition("Chemistry");
    let first = h.application(TUTOR, &tuition, 4000.0);
    let second = h.application(SECOND_TUTOR, &tuition, 4200.0);

    let req = test::TestRequest::post()
        .uri("/payments")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({
            "tuitionId": tuition,
            "applicationId": first,
            "tutorEmail": TUTOR,
            "amount": 4000.0,
            "transactionId": "pi_first"
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = test::TestRequest::post()
        .uri("/payments")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({
            "tuitionId": tuition,
            "applicationId": second,
            "tutorEmail": SECOND_TUTOR,
            "amount": 4200.0,
            "transactionId": "pi_second"
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/payments/mine")
        .insert_header(h.bearer(STUDENT))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
    assert_eq!(body["payments"][0]["transactionId"], "pi_first");
}

#[actix_web::test]
async fn checkout_is_limited_to_the_posting_student() {
    let h = Harness::new();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(routes::configure)).await;

    let tuition = h.approved_tuition("Biology");
    let application = h.application(TUTOR, &tuition, 3000.0);

    let req = test::TestRequest::post()
        .uri("/payments/checkout")
        .insert_header(h.bearer(OTHER_STUDENT))
        .set_json(json!({ "applicationId": application }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/payments/checkout")
        .insert_header(h.bearer(STUDENT))
        .set_json(json!({ "applicationId": application }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let session = body["sessionId"].as_str().unwrap().to_string();
    h.gateway.complete(&session).unwrap();

    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .insert_header(h.bearer(OTHER_STUDENT))
        .set_json(json!({ "sessionId": session }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn tutors_cannot_pay_and_admins_have_no_history() {
    let h = Harness::new();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/payments/checkout")
        .insert_header(h.bearer(TUTOR))
        .set_json(json!({ "applicationId": "missing" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/payments/mine")
        .insert_header(h.bearer(ADMIN))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
