use bidsphere::auction::model::{Auction, PaymentStatus};
use bidsphere::config::Config;
use bidsphere::handlers;
use bidsphere::identity::LocalIdentityProvider;
use bidsphere::scheduler::AuctionScheduler;
use bidsphere::state::AppState;
use bidsphere::store::InMemoryStore;
use chrono::{Duration, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const ADMIN_EMAIL: &str = "bidsphere@gmail.com";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

struct TestApp {
    base: String,
    client: Client,
    store: InMemoryStore,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register_user(&self, name: &str, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": "secret123",
                "gender": "other",
                "city": "Mumbai"
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn register_seller(&self, email: &str) -> (String, String) {
        let response = self
            .client
            .post(self.url("/auth/register-seller"))
            .json(&json!({
                "businessName": "Camera Corner",
                "sellerName": "Priya Shah",
                "email": email,
                "phone": "9876543210",
                "password": "secret123",
                "address": "12 Market Road, Pune",
                "city": "Pune",
                "termsAccepted": true
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["identity"]["uid"].as_str().unwrap().to_string(),
        )
    }

    async fn bid(&self, token: &str, auction_id: i64, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(&format!("/auctions/{}/bids", auction_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn seed_running_auction(&self, id: i64, seller: &str) -> Auction {
        self.seed_listing(id, seller, "Vintage Camera", "Film camera in working order", 100.0)
            .await
    }

    /// Running auction created `id` minutes ago at `price`
    async fn seed_listing(
        &self,
        id: i64,
        seller: &str,
        name: &str,
        description: &str,
        price: f64,
    ) -> Auction {
        let now = Utc::now();
        self.store
            .seed_auction(Auction {
                id,
                product_name: name.to_string(),
                description: description.to_string(),
                starting_price: price,
                current_price: price,
                start_time: now - Duration::hours(1),
                end_time: now + Duration::hours(1),
                seller: seller.to_string(),
                highest_bidder: None,
                is_active: true,
                payment_status: PaymentStatus::Pending,
                images: vec![],
                created_at: now - Duration::hours(2) + Duration::minutes(id),
            })
            .await
    }

    async fn get_json(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("Failed to send request");
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

/// Serves the whole app over in-memory state on an ephemeral port
async fn spawn_app() -> TestApp {
    init_tracing();

    let store = InMemoryStore::new();
    let identity = Arc::new(LocalIdentityProvider::with_accounts(
        [ADMIN_EMAIL],
        Arc::new(store.clone()),
    ));
    let state = AppState::in_process(Arc::new(store.clone()), identity, Config::default());

    AuctionScheduler::new(
        Arc::clone(&state.store),
        Arc::clone(&state.publisher),
        std::time::Duration::from_millis(100),
    )
    .start();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = handlers::routes(state);
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    info!("test server on {}", addr);

    TestApp {
        base: format!("http://{}", addr),
        client: Client::new(),
        store,
    }
}

fn image_part() -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("camera.png")
        .mime_str("image/png")
        .unwrap()
}

/// Listing, bidding, closing, payment and receipt, end to end
#[tokio::test]
async fn test_auction_lifecycle() {
    let app = spawn_app().await;
    let (seller_token, _) = app.register_seller("seller@example.com").await;
    let alice = app.register_user("Alice Carter", "alice@example.com").await;
    let bob = app.register_user("Bobby Tables", "bob@example.com").await;

    let start = Utc::now();
    let end = start + Duration::seconds(2);
    let form = Form::new()
        .text("productName", "Vintage Camera")
        .text("description", "Film camera in working order")
        .text("startingPrice", "100")
        .text("startTime", start.timestamp_millis().to_string())
        .text("endTime", end.timestamp_millis().to_string())
        .part("images", image_part());
    let response = app
        .client
        .post(app.url("/auctions"))
        .bearer_auth(&seller_token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let listing: Value = response.json().await.unwrap();
    let id = listing["id"].as_i64().unwrap();
    assert_eq!(listing["currentPrice"], json!(100.0));
    assert_eq!(listing["isActive"], json!(false));
    assert!(listing["images"][0].as_str().unwrap().starts_with("data:image/png;base64,"));

    let (status, body) = app.bid(&seller_token, id, json!({ "amount": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SELLER_CANNOT_BID");

    let (status, _) = app.bid(&alice, id, json!({ "amount": 150, "observedPrice": 100 })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.bid(&bob, id, json!({ "amount": 120 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_TOO_LOW");
    assert_eq!(body["current_price"], json!(150.0));

    let (status, body) = app.bid(&bob, id, json!({ "amount": 175 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["highestBidder"], "bob@example.com");

    let notices: Value = app
        .client
        .get(app.url("/me/notifications"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notices[0]["kind"], "Outbid");

    // let the auction run out and the sweep announce it
    tokio::time::sleep(tokio::time::Duration::from_millis(2500)).await;

    let (status, body) = app.bid(&alice, id, json!({ "amount": 300 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "AUCTION_ENDED");

    let detail: Value = app
        .client
        .get(app.url(&format!("/auctions/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["status"], "Ended");

    let won: Value = app
        .client
        .get(app.url("/me/won"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(won.as_array().unwrap().len(), 1);
    assert_eq!(won[0]["canPay"], json!(true));

    let response = app
        .client
        .post(app.url(&format!("/auctions/{}/payment", id)))
        .bearer_auth(&alice)
        .json(&json!({ "method": "upi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(app.url(&format!("/auctions/{}/payment", id)))
        .bearer_auth(&bob)
        .json(&json!({ "method": "upi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payment: Value = response.json().await.unwrap();
    assert_eq!(payment["amount"], json!(175.0));
    assert_eq!(payment["seller"], "seller@example.com");

    let response = app
        .client
        .post(app.url(&format!("/auctions/{}/payment", id)))
        .bearer_auth(&bob)
        .json(&json!({ "method": "card" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PAYMENT_EXISTS");

    let payment_path = format!("/auctions/{}/payment", id);
    let (status, body) = app.get_json(&payment_path, Some(alice.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    let (status, body) = app.get_json(&payment_path, Some(seller_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payer"], "bob@example.com");

    let bob_notices: Value = app
        .client
        .get(app.url("/me/notifications"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(bob_notices
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["kind"] == "AuctionWon"));

    let receipt: Value = app
        .client
        .get(app.url(&format!("/auctions/{}/receipt", id)))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["status"], "Completed");
    assert_eq!(receipt["auctionAvailable"], json!(true));
}

/// Two bidders who saw the same price: exactly one wins
#[tokio::test]
async fn test_concurrent_bids_on_same_price() {
    let app = spawn_app().await;
    let alice = app.register_user("Alice Carter", "alice@example.com").await;
    let bob = app.register_user("Bobby Tables", "bob@example.com").await;
    let auction = app.seed_running_auction(1, "seller@example.com").await;

    let bid = json!({ "amount": 101, "observedPrice": 100 });
    let ((first, first_body), (second, second_body)) = tokio::join!(
        app.bid(&alice, auction.id, bid.clone()),
        app.bid(&bob, auction.id, bid.clone())
    );

    let mut statuses = vec![first, second];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let loser = if first == StatusCode::CONFLICT {
        first_body
    } else {
        second_body
    };
    assert_eq!(loser["code"], "STALE_PRICE");
    assert_eq!(loser["current_price"], json!(101.0));
}

/// Non-numeric amounts are plain low bids
#[tokio::test]
async fn test_non_numeric_bid() {
    let app = spawn_app().await;
    let alice = app.register_user("Alice Carter", "alice@example.com").await;
    let auction = app.seed_running_auction(1, "seller@example.com").await;

    let (status, body) = app.bid(&alice, auction.id, json!({ "amount": "lots" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_TOO_LOW");
}

#[tokio::test]
async fn test_requires_session() {
    let app = spawn_app().await;
    let auction = app.seed_running_auction(1, "seller@example.com").await;

    let response = app
        .client
        .post(app.url(&format!("/auctions/{}/bids", auction.id)))
        .json(&json!({ "amount": 150 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_AUTHENTICATED");

    let (status, _) = app.bid("not-a-token", auction.id, json!({ "amount": 150 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Admin role comes only from the configured address
#[tokio::test]
async fn test_admin_dashboard_and_seller_removal() {
    let app = spawn_app().await;
    let admin = app.register_user("Site Admin", ADMIN_EMAIL).await;
    let user = app.register_user("Alice Carter", "alice@example.com").await;
    let (_, seller_uid) = app.register_seller("seller@example.com").await;
    app.seed_running_auction(1, "seller@example.com").await;
    app.seed_running_auction(2, "other@example.com").await;

    let me: Value = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"], "admin");

    let response = app
        .client
        .get(app.url("/admin/dashboard"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let dashboard: Value = app
        .client
        .get(app.url("/admin/dashboard"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["stats"]["totalUsers"], json!(2));
    assert_eq!(dashboard["stats"]["totalSellers"], json!(1));
    assert_eq!(dashboard["stats"]["activeAuctions"], json!(2));

    let response = app
        .client
        .delete(app.url(&format!("/admin/sellers/{}", seller_uid)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let removal: Value = response.json().await.unwrap();
    assert_eq!(removal["deletedAuctions"], json!([1]));

    let listed: Value = app
        .client
        .get(app.url("/auctions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["seller"], "other@example.com");

    let response = app
        .client
        .post(app.url("/auth/seller-login"))
        .json(&json!({ "email": "seller@example.com", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A paid auction that was deleted still has a receipt
#[tokio::test]
async fn test_receipt_after_deletion() {
    let app = spawn_app().await;
    let (seller_token, _) = app.register_seller("seller@example.com").await;
    let winner = app.register_user("Winner Person", "winner@example.com").await;

    let now = Utc::now();
    app.store
        .seed_auction(Auction {
            id: 9,
            product_name: "Brass Lamp".to_string(),
            description: "Old lamp".to_string(),
            starting_price: 50.0,
            current_price: 80.0,
            start_time: now - Duration::days(2),
            end_time: now - Duration::hours(1),
            seller: "seller@example.com".to_string(),
            highest_bidder: Some("winner@example.com".to_string()),
            is_active: true,
            payment_status: PaymentStatus::Pending,
            images: vec![],
            created_at: now - Duration::days(3),
        })
        .await;

    let response = app
        .client
        .post(app.url("/auctions/9/payment"))
        .bearer_auth(&winner)
        .json(&json!({ "method": "netbanking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .client
        .delete(app.url("/auctions/9"))
        .bearer_auth(&seller_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let receipt: Value = app
        .client
        .get(app.url("/auctions/9/receipt"))
        .bearer_auth(&winner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["auctionAvailable"], json!(false));
    assert_eq!(receipt["payment"]["amount"], json!(80.0));
    assert_eq!(receipt["status"], "Completed");
}

#[tokio::test]
async fn test_listing_rejects_too_many_images() {
    let app = spawn_app().await;
    let (seller_token, _) = app.register_seller("seller@example.com").await;

    let start = Utc::now() + Duration::minutes(5);
    let mut form = Form::new()
        .text("productName", "Vintage Camera")
        .text("description", "Film camera in working order")
        .text("startingPrice", "100")
        .text("startTime", start.to_rfc3339())
        .text("endTime", (start + Duration::days(1)).to_rfc3339());
    for _ in 0..6 {
        form = form.part("images", image_part());
    }

    let response = app
        .client
        .post(app.url("/auctions"))
        .bearer_auth(&seller_token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_INPUT");
}

/// Requests axum would reject on its own still answer with an error code
#[tokio::test]
async fn test_malformed_requests_get_error_codes() {
    let app = spawn_app().await;
    let alice = app.register_user("Alice Carter", "alice@example.com").await;
    let auction = app.seed_running_auction(1, "seller@example.com").await;

    let (status, body) = app.bid(&alice, auction.id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_TOO_LOW");

    let response = app
        .client
        .post(app.url(&format!("/auctions/{}/bids", auction.id)))
        .bearer_auth(&alice)
        .header("content-type", "application/json")
        .body("{\"amount\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app.get_json("/auctions/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app.get_json("/auctions?sort=cheapest", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_listing_search_and_sort() {
    let app = spawn_app().await;
    app.seed_listing(1, "a@shop.in", "Camera", "Film camera with leather case", 300.0)
        .await;
    app.seed_listing(2, "b@shop.in", "Lamp", "Brass desk lamp", 100.0)
        .await;
    app.seed_listing(3, "c@shop.in", "Clock", "Brass mantel clock", 200.0)
        .await;

    let names = |listed: &Value| -> Vec<String> {
        listed
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["productName"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, listed) = app.get_json("/auctions", None).await;
    assert_eq!(names(&listed), ["Clock", "Lamp", "Camera"]);

    let (_, listed) = app.get_json("/auctions?sort=oldest", None).await;
    assert_eq!(names(&listed), ["Camera", "Lamp", "Clock"]);

    let (_, listed) = app.get_json("/auctions?sort=priceAsc", None).await;
    assert_eq!(names(&listed), ["Lamp", "Clock", "Camera"]);

    let (_, listed) = app.get_json("/auctions?search=brass&sort=priceDesc", None).await;
    assert_eq!(names(&listed), ["Clock", "Lamp"]);

    let (_, listed) = app.get_json("/auctions?search=leather", None).await;
    assert_eq!(names(&listed), ["Camera"]);
}

#[tokio::test]
async fn test_admin_edits_profiles() {
    let app = spawn_app().await;
    let admin = app.register_user("Site Admin", ADMIN_EMAIL).await;
    let (seller_token, seller_uid) = app.register_seller("seller@example.com").await;

    let path = format!("/admin/sellers/{}", seller_uid);
    let response = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&seller_token)
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "businessName": "Lens House", "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["businessName"], "Lens House");
    assert_eq!(profile["approved"], json!(true));
    assert_eq!(profile["email"], "seller@example.com");

    let response = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "phone": "12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .patch(app.url("/admin/users/nobody"))
        .bearer_auth(&admin)
        .json(&json!({ "city": "Delhi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
