mod common;

use chrono::{Datelike, Utc};
use common::{decimal, labor, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn ppf_part(name: &str, price: u32, inventory_id: &str, sqft: u32) -> Value {
    json!({
        "name": name,
        "price": price,
        "type": "part",
        "material": { "kind": "ppf", "inventory_id": inventory_id, "size_used_sqft": sqft }
    })
}

fn accessory_part(name: &str, price: u32, inventory_id: &str, quantity: u32) -> Value {
    json!({
        "name": name,
        "price": price,
        "type": "part",
        "material": { "kind": "accessory", "inventory_id": inventory_id, "quantity": quantity }
    })
}

#[tokio::test]
async fn creating_a_job_consumes_its_material() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let film = app.create_film("XPEL", 0).await;
    app.add_roll(&film, "Roll A", 30).await;
    app.add_roll(&film, "Roll B", 100).await;
    let blades = app.create_accessory("Wiper blades", 10).await;

    let job = app
        .create_job(&json!({
            "customer_id": customer_id,
            "service_items": [
                ppf_part("Bonnet PPF", 6000, &film, 35),
                ppf_part("Bumper PPF", 4000, &film, 15),
                accessory_part("Wiper blades", 800, &blades, 2),
                labor("Installation", 1500, None)
            ]
        }))
        .await;
    assert_eq!(job["stage"], "New Lead");

    let film: Value = app
        .get(&format!("/inventory/{}", film))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&film["quantity"]), dec!(80));
    assert_eq!(film["finished_rolls"].as_array().unwrap().len(), 1);

    let blades: Value = app
        .get(&format!("/inventory/{}", blades))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&blades["quantity"]), dec!(8));
}

#[tokio::test]
async fn ppf_material_is_measured_in_sqft_on_meter_stocked_film() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let response = app
        .post(
            "/inventory",
            &json!({
                "name": "XPEL Stealth 60in",
                "category": "XPEL",
                "unit": "meters",
                "is_ppf": true
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let film: Value = response.json().await.unwrap();
    let film = film["_id"].as_str().unwrap().to_string();
    let response = app
        .post(
            &format!("/inventory/{}/rolls", film),
            &json!({ "name": "Roll A", "unit": "meters", "meters": "10", "sqft": "107.64" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    app.create_job(&json!({
        "customer_id": customer_id,
        "service_items": [ppf_part("Mirror caps", 1200, &film, 5)]
    }))
    .await;

    let film: Value = app
        .get(&format!("/inventory/{}", film))
        .await
        .json()
        .await
        .unwrap();
    let roll = &film["rolls"][0];
    assert_eq!(decimal(&roll["remaining_sqft"]), dec!(102.64));
    assert_eq!(decimal(&roll["remaining_meters"]), dec!(9.54));
    assert_eq!(decimal(&film["quantity"]), dec!(9.54));
}

#[tokio::test]
async fn job_is_refused_when_any_material_is_short() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let film = app.create_film("XPEL", 0).await;
    app.add_roll(&film, "Roll A", 30).await;
    let blades = app.create_accessory("Wiper blades", 1).await;

    let response = app
        .post(
            "/jobs",
            &json!({
                "customer_id": customer_id,
                "service_items": [
                    ppf_part("Bonnet PPF", 6000, &film, 20),
                    accessory_part("Wiper blades", 800, &blades, 2)
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let film: Value = app
        .get(&format!("/inventory/{}", film))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&film["quantity"]), dec!(30));
}

#[tokio::test]
async fn job_needs_known_customer_and_vehicle() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/jobs",
            &json!({ "customer_id": "nobody", "service_items": [labor("Wash", 500, None)] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let customer_id = app.create_customer().await;
    let response = app
        .post(
            "/jobs",
            &json!({
                "customer_id": customer_id,
                "vehicle_index": 3,
                "service_items": [labor("Wash", 500, None)]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn completion_issues_one_invoice_per_business() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let year = Utc::now().year();

    let job = app
        .create_job(&json!({
            "customer_id": customer_id,
            "service_items": [
                labor("Full body PPF", 90000, None),
                labor("Headlight PPF", 4000, Some("Auto Gamma")),
                labor("Door edge guards", 1200, None),
                labor("Ceramic coating", 25000, Some("Gamma Coats")),
                labor("Interior coating", 8000, Some("Gamma Coats"))
            ]
        }))
        .await;
    let job_id = job["_id"].as_str().unwrap();

    let response = app.move_to(job_id, "Completed").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["previous_stage"], "New Lead");
    assert_eq!(body["job"]["stage"], "Completed");

    let invoices = body["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0]["business"], "Auto Gamma");
    assert_eq!(invoices[0]["lines"].as_array().unwrap().len(), 3);
    assert_eq!(invoices[0]["invoice_number"], format!("AG-{}-0001", year));
    assert_eq!(decimal(&invoices[0]["total_amount"]), dec!(95200));
    assert_eq!(invoices[1]["business"], "Gamma Coats");
    assert_eq!(invoices[1]["lines"].as_array().unwrap().len(), 2);
    assert_eq!(invoices[1]["invoice_number"], format!("GC-{}-0001", year));
    assert_eq!(invoices[1]["payment_status"], "Pending");

    // A second job continues the per-business sequence.
    let next = app
        .create_job(&json!({
            "customer_id": customer_id,
            "service_items": [labor("Wash", 500, None)]
        }))
        .await;
    let body: Value = app
        .move_to(next["_id"].as_str().unwrap(), "Completed")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["invoices"][0]["invoice_number"], format!("AG-{}-0002", year));

    let listed: Value = app
        .get("/invoices?business=Gamma%20Coats")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn gst_and_invoice_discount_apply_to_totals() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;

    let job = app
        .create_job(&json!({
            "customer_id": customer_id,
            "requires_gst": true,
            "invoice_discounts": { "Auto Gamma": 100 },
            "service_items": [labor("Ceramic coating", 1000, None)]
        }))
        .await;

    let body: Value = app
        .move_to(job["_id"].as_str().unwrap(), "Completed")
        .await
        .json()
        .await
        .unwrap();
    let invoice = &body["invoices"][0];
    assert_eq!(decimal(&invoice["discount"]), dec!(100));
    assert_eq!(decimal(&invoice["tax_rate"]), dec!(18));
    assert_eq!(decimal(&invoice["tax_amount"]), dec!(162));
    assert_eq!(decimal(&invoice["total_amount"]), dec!(1062));
}

#[tokio::test]
async fn completed_jobs_are_frozen_and_regeneration_is_idempotent() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let job = app
        .create_job(&json!({
            "customer_id": customer_id,
            "service_items": [labor("Wash", 500, None)]
        }))
        .await;
    let job_id = job["_id"].as_str().unwrap();

    let response = app
        .post(&format!("/jobs/{}/invoices", job_id), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.move_to(job_id, "Inspection Done").await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.move_to(job_id, "Inspection Done").await;
    assert_eq!(response.status().as_u16(), 400);

    app.move_to(job_id, "Completed").await;
    let response = app.move_to(job_id, "Work In Progress").await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .post(&format!("/jobs/{}/invoices", job_id), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let regenerated: Value = response.json().await.unwrap();
    assert!(regenerated.as_array().unwrap().is_empty());

    let invoices: Value = app
        .get(&format!("/invoices?job_id={}", job_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(invoices.as_array().unwrap().len(), 1);

    let job: Value = app
        .get(&format!("/jobs/{}", job_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(job["stage_history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stage_changes_notify_the_customer() {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer().await;
    let job = app
        .create_job(&json!({
            "customer_id": customer_id,
            "service_items": [labor("Wash", 500, None)]
        }))
        .await;
    let job_id = job["_id"].as_str().unwrap();

    app.move_to(job_id, "Work In Progress").await;
    app.move_to(job_id, "Completed").await;

    let sent = app.wait_for_notifications(2).await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.plate == "MH12AB1234"));
    assert!(sent.iter().all(|n| n.vehicle_name == "Hyundai Creta"));
    let completed = sent
        .iter()
        .find(|n| n.message().contains("ready for pickup"))
        .unwrap();
    assert!(completed.invoice_ready);
}
