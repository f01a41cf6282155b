mod common;

use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

#[tokio::test]
async fn consumption_drains_oldest_roll_first() {
    let app = TestApp::spawn().await;
    let item_id = app.create_film("XPEL", 50).await;
    let first = app.add_roll(&item_id, "Roll A", 30).await;
    let second = app.add_roll(&item_id, "Roll B", 100).await;

    let response = app
        .post(
            &format!("/inventory/{}/consume", item_id),
            &json!({ "quantity": 50 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    let consumed = body["consumed"].as_array().unwrap();
    assert_eq!(consumed.len(), 2);
    assert_eq!(consumed[0]["roll_id"], first.as_str());
    assert_eq!(decimal(&consumed[0]["quantity_used"]), dec!(30));
    assert_eq!(consumed[1]["roll_id"], second.as_str());
    assert_eq!(decimal(&consumed[1]["quantity_used"]), dec!(20));

    let item = &body["item"];
    assert_eq!(decimal(&item["quantity"]), dec!(80));
    assert_eq!(item["rolls"].as_array().unwrap().len(), 1);
    assert_eq!(item["finished_rolls"][0]["id"], first.as_str());
}

#[tokio::test]
async fn shortfall_is_rejected_and_leaves_stock_untouched() {
    let app = TestApp::spawn().await;
    let item_id = app.create_film("XPEL", 0).await;
    app.add_roll(&item_id, "Roll A", 30).await;
    app.add_roll(&item_id, "Roll B", 20).await;

    let response = app
        .post(
            &format!("/inventory/{}/consume", item_id),
            &json!({ "quantity": 60 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("Insufficient stock"));

    let item: Value = app
        .get(&format!("/inventory/{}", item_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&item["quantity"]), dec!(50));
    assert_eq!(item["rolls"].as_array().unwrap().len(), 2);
    assert!(item["finished_rolls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn direct_deduction_touches_only_the_named_roll() {
    let app = TestApp::spawn().await;
    let item_id = app.create_film("3M", 0).await;
    app.add_roll(&item_id, "Roll A", 40).await;
    let second = app.add_roll(&item_id, "Roll B", 40).await;

    let response = app
        .post(
            &format!("/inventory/{}/rolls/{}/deduct", item_id, second),
            &json!({ "amount": 15 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["consumed"][0]["roll_id"], second.as_str());
    assert_eq!(decimal(&body["item"]["quantity"]), dec!(65));
    assert_eq!(decimal(&body["item"]["rolls"][0]["remaining_sqft"]), dec!(40));
}

#[tokio::test]
async fn deleting_a_roll_removes_its_stock() {
    let app = TestApp::spawn().await;
    let item_id = app.create_film("XPEL", 0).await;
    let roll_id = app.add_roll(&item_id, "Roll A", 25).await;
    app.add_roll(&item_id, "Roll B", 10).await;

    let response = app
        .delete(&format!("/inventory/{}/rolls/{}", item_id, roll_id))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(decimal(&body["item"]["quantity"]), dec!(10));

    let response = app
        .delete(&format!("/inventory/{}/rolls/{}", item_id, roll_id))
        .await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn ensure_returns_existing_item_for_category() {
    let app = TestApp::spawn().await;
    let request = json!({
        "name": "Garware Matte",
        "category": "Garware",
        "unit": "sqft",
        "is_ppf": true
    });

    let response = app.put("/inventory/ensure", &request).await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["created"], true);

    let response = app.put("/inventory/ensure", &request).await;
    assert_eq!(response.status().as_u16(), 200);
    let existing: Value = response.json().await.unwrap();
    assert_eq!(existing["created"], false);
    assert_eq!(existing["item"]["_id"], created["item"]["_id"]);

    // Plain creates share the category without touching the ensured item.
    let response = app.post("/inventory", &request).await;
    assert_eq!(response.status().as_u16(), 201);
    let plain: Value = response.json().await.unwrap();
    assert_ne!(plain["_id"], created["item"]["_id"]);

    let response = app.put("/inventory/ensure", &request).await;
    let again: Value = response.json().await.unwrap();
    assert_eq!(again["item"]["_id"], created["item"]["_id"]);
}

#[tokio::test]
async fn accessories_can_share_a_category() {
    let app = TestApp::spawn().await;
    for name in ["Microfiber towel", "Tyre shine"] {
        let response = app
            .post(
                "/inventory",
                &json!({
                    "name": name,
                    "category": "Accessories",
                    "unit": "pieces",
                    "quantity": 5
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
    }

    let items: Value = app.get("/inventory").await.json().await.unwrap();
    assert_eq!(items.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn low_stock_filter_lists_items_below_minimum() {
    let app = TestApp::spawn().await;
    let low = app.create_film("XPEL", 100).await;
    let stocked = app.create_film("3M", 100).await;
    app.add_roll(&stocked, "Roll A", 150).await;

    let items: Value = app.get("/inventory?low_stock=true").await.json().await.unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["_id"], low.as_str());

    let all: Value = app.get("/inventory").await.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn counted_items_adjust_and_refuse_rolls() {
    let app = TestApp::spawn().await;
    let item_id = app.create_accessory("Wiper blades", 10).await;

    let response = app
        .post(
            &format!("/inventory/{}/adjust", item_id),
            &json!({ "delta": -4, "reason": "Damaged in storage" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(decimal(&body["item"]["quantity"]), dec!(6));

    let response = app
        .post(
            &format!("/inventory/{}/adjust", item_id),
            &json!({ "delta": -7, "reason": "Overdraw" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .post(
            &format!("/inventory/{}/rolls", item_id),
            &json!({ "name": "Roll", "unit": "sqft", "sqft": 10 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/inventory",
            &json!({ "name": "", "category": "XPEL", "unit": "sqft" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app.get("/inventory/does-not-exist").await;
    assert_eq!(response.status().as_u16(), 404);

    let item_id = app.create_film("XPEL", 0).await;
    let response = app
        .post(
            &format!("/inventory/{}/consume", item_id),
            &json!({ "quantity": 0 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}
