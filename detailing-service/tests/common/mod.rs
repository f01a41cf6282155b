#![allow(dead_code)]

use detailing_service::config::DetailingConfig;
use detailing_service::services::{MemoryStore, RecordingNotifier, StageNotification};
use detailing_service::startup::Application;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = DetailingConfig::in_memory();
        let notifier = Arc::new(RecordingNotifier::default());

        let app = Application::build_with(config, Arc::new(MemoryStore::new()), notifier.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            notifier,
        }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a customer with one vehicle and return its id.
    pub async fn create_customer(&self) -> String {
        let response = self
            .post(
                "/customers",
                &json!({
                    "name": "Ravi Kumar",
                    "phone": "+91 98765 00000",
                    "email": "ravi@example.com",
                    "vehicles": [
                        { "make": "Hyundai", "model": "Creta", "plate": "mh12ab1234" }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["_id"].as_str().expect("customer id").to_string()
    }

    /// Create a PPF film item measured in square feet and return its id.
    pub async fn create_film(&self, category: &str, min_stock: u32) -> String {
        let response = self
            .post(
                "/inventory",
                &json!({
                    "name": format!("{} Ultimate Plus", category),
                    "category": category,
                    "unit": "sqft",
                    "min_stock": min_stock,
                    "is_ppf": true
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["_id"].as_str().expect("item id").to_string()
    }

    /// Create a counted accessory with opening stock and return its id.
    pub async fn create_accessory(&self, category: &str, quantity: u32) -> String {
        let response = self
            .post(
                "/inventory",
                &json!({
                    "name": format!("{} kit", category),
                    "category": category,
                    "unit": "pieces",
                    "quantity": quantity
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["_id"].as_str().expect("item id").to_string()
    }

    /// Stock a roll of `sqft` square feet and return its id.
    pub async fn add_roll(&self, item_id: &str, name: &str, sqft: u32) -> String {
        let response = self
            .post(
                &format!("/inventory/{}/rolls", item_id),
                &json!({ "name": name, "unit": "sqft", "sqft": sqft }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["roll"]["id"].as_str().expect("roll id").to_string()
    }

    pub async fn create_job(&self, body: &Value) -> Value {
        let response = self.post("/jobs", body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn move_to(&self, job_id: &str, stage: &str) -> Response {
        self.patch(&format!("/jobs/{}/stage", job_id), &json!({ "stage": stage }))
            .await
    }

    /// Notifications are sent in the background; wait until `count` arrive.
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<StageNotification> {
        for _ in 0..50 {
            let sent = self.notifier.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }
        self.notifier.sent()
    }
}

/// Read a decimal that may be serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

pub fn labor(name: &str, price: u32, business: Option<&str>) -> Value {
    json!({
        "name": name,
        "price": price,
        "assigned_business": business,
        "type": "labor"
    })
}
