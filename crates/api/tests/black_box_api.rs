use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, bound to an ephemeral port.
        let app = stockroom_api::app::build_in_memory_app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, body: Value) -> Value {
    let res = client.post(srv.url("/products")).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn stock_of(client: &reqwest::Client, srv: &TestServer, id: &str) -> i64 {
    let res = client.get(srv.url(&format!("/products/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["stock_quantity"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn reserve_release_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(
        &client,
        &srv,
        json!({ "name": "Widget", "price": "19.99", "stock_quantity": 10 }),
    )
    .await;
    let id = product["id"].as_str().unwrap().to_string();

    // Reserve 5 of 10
    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["remaining_stock"], 5);
    assert_eq!(body["message"], "Reserved 5 units of Widget");

    // Reserve 6 of 5: rejected, nothing changes
    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .json(&json!({ "quantity": 6 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Insufficient stock");
    assert_eq!(body["available_stock"], 5);
    assert_eq!(stock_of(&client, &srv, &id).await, 5);

    // Release 3
    let res = client
        .post(srv.url(&format!("/products/{id}/release")))
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["current_stock"], 8);
    assert_eq!(body["message"], "Released 3 units of Widget");
}

#[tokio::test]
async fn missing_body_or_field_reserves_one_unit() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Bolt", "price": 1, "stock_quantity": 3 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["remaining_stock"], 2);

    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["remaining_stock"], 1);

    let res = client
        .post(srv.url(&format!("/products/{id}/release")))
        .json(&json!({ "quantity": "2" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["current_stock"], 3);
}

#[tokio::test]
async fn form_posts_and_whole_float_quantities_are_accepted() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Washer", "price": 1, "stock_quantity": 10 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .form(&[("quantity", "4")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["remaining_stock"], 6);

    let res = client
        .post(srv.url(&format!("/products/{id}/release")))
        .json(&json!({ "quantity": 2.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["current_stock"], 8);

    let res = client
        .post(srv.url(&format!("/products/{id}/reserve")))
        .form(&[("quantity", "0")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");

    assert_eq!(stock_of(&client, &srv, &id).await, 8);
}

#[tokio::test]
async fn invalid_quantities_are_rejected_without_mutation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Nut", "price": "0.10", "stock_quantity": 4 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    for (action, quantity) in [
        ("reserve", json!(0)),
        ("reserve", json!(-2)),
        ("reserve", json!("lots")),
        ("release", json!(0)),
        ("release", json!(-1)),
    ] {
        let res = client
            .post(srv.url(&format!("/products/{id}/{action}")))
            .json(&json!({ "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{action} {quantity}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_quantity");
    }

    let res = client
        .get(srv.url(&format!("/products/{id}/availability?quantity=0")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");

    assert_eq!(stock_of(&client, &srv, &id).await, 4);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let ghost = "0190a8a4-5d1e-7c3b-9f00-000000000000";

    for path in [
        format!("/products/{ghost}/reserve"),
        format!("/products/{ghost}/release"),
    ] {
        let res = client.post(srv.url(&path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "success": false, "message": "Product not found" }));
    }

    let res = client
        .get(srv.url(&format!("/products/{ghost}/availability")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/products/not-a-uuid/reserve"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn availability_reports_without_mutating() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Kettle", "price": "35", "stock_quantity": 3 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/products/{id}/availability?quantity=3")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "product_id": id,
            "name": "Kettle",
            "price": "35.00",
            "available": true,
            "stock_quantity": 3,
            "requested_quantity": 3,
        })
    );

    let res = client
        .get(srv.url(&format!("/products/{id}/availability?quantity=4")))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["available"], false);

    // No quantity means one unit.
    let res = client
        .get(srv.url(&format!("/products/{id}/availability")))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["requested_quantity"], 1);

    assert_eq!(stock_of(&client, &srv, &id).await, 3);
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Ticket", "price": "5", "stock_quantity": 10 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let client = client.clone();
            let url = srv.url(&format!("/products/{id}/reserve"));
            tokio::spawn(async move {
                client
                    .post(url)
                    .json(&json!({ "quantity": 1 }))
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let mut ok = 0;
    let mut rejected = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::OK {
            ok += 1;
        } else if status == StatusCode::BAD_REQUEST {
            rejected += 1;
        } else {
            panic!("unexpected status {status}");
        }
    }

    assert_eq!(ok, 10);
    assert_eq!(rejected, 15);
    assert_eq!(stock_of(&client, &srv, &id).await, 0);
}

#[tokio::test]
async fn catalog_listing_filters_and_ordering() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/categories"))
        .json(&json!({ "name": "Garden Tools", "description": "outdoor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let category: Value = res.json().await.unwrap();
    assert_eq!(category["slug"], "garden-tools");
    let category_id = category["id"].as_str().unwrap().to_string();

    create_product(
        &client,
        &srv,
        json!({ "name": "Rake", "price": "12.00", "stock_quantity": 0, "category": category_id }),
    )
    .await;
    create_product(
        &client,
        &srv,
        json!({ "name": "Hose", "price": "30.00", "stock_quantity": 2, "category": category_id }),
    )
    .await;
    create_product(&client, &srv, json!({ "name": "Lamp", "price": "20.00", "stock_quantity": 1 })).await;

    let names = |body: &Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect()
    };

    let body: Value = client
        .get(srv.url("/products?ordering=price"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body), ["Rake", "Lamp", "Hose"]);

    let body: Value = client
        .get(srv.url("/products?in_stock=true&ordering=-name"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body), ["Lamp", "Hose"]);

    let body: Value = client
        .get(srv.url(&format!("/products?category={category_id}&min_price=15&ordering=name")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body), ["Hose"]);

    let body: Value = client
        .get(srv.url("/products?search=LAM"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body), ["Lamp"]);

    let res = client.get(srv.url("/products?ordering=stock")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn delete_deactivates_product() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, json!({ "name": "Lamp", "price": "20", "stock_quantity": 2 })).await;
    let id = product["id"].as_str().unwrap().to_string();

    let res = client.delete(srv.url(&format!("/products/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let listed: Value = client.get(srv.url("/products")).send().await.unwrap().json().await.unwrap();
    assert!(listed.as_array().unwrap().is_empty());

    let res = client.get(srv.url(&format!("/products/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_active"], false);
    assert_eq!(body["stock_quantity"], 2);
}

#[tokio::test]
async fn product_updates_and_category_detach() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let category: Value = client
        .post(srv.url("/categories"))
        .json(&json!({ "name": "Lighting" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let category_id = category["id"].as_str().unwrap().to_string();

    let product = create_product(
        &client,
        &srv,
        json!({ "name": "Lamp", "price": "20", "stock_quantity": 5, "category": category_id }),
    )
    .await;
    let id = product["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url(&format!("/products/{id}")))
        .json(&json!({ "price": "24.50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["price"], "24.50");
    assert_eq!(body["name"], "Lamp");
    assert_eq!(body["stock_quantity"], 5);

    let res = client
        .put(srv.url(&format!("/products/{id}")))
        .json(&json!({ "name": "Desk Lamp", "price": "25", "stock_quantity": 7, "category": category_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Desk Lamp");
    assert_eq!(body["stock_quantity"], 7);

    let res = client.delete(srv.url("/categories/lighting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(srv.url("/categories/lighting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(srv.url(&format!("/products/{id}"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["category_id"], Value::Null);
}

#[tokio::test]
async fn catalog_validation_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/products"))
        .json(&json!({ "name": "Ghost", "price": "1", "category": "0190a8a4-5d1e-7c3b-9f00-000000000001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(srv.url("/products"))
        .json(&json!({ "name": "Negative", "price": "1", "stock_quantity": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    client
        .post(srv.url("/categories"))
        .json(&json!({ "name": "Tools" }))
        .send()
        .await
        .unwrap();
    let res = client
        .post(srv.url("/categories"))
        .json(&json!({ "name": "Tools" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client.get(srv.url("/products/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}
