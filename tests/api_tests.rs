use moneycard::{
    AppConfig, AppState, InMemoryCardRepository, InMemoryUserStore, create_router,
    models::Card,
    repository::RepositoryState,
    UserStoreState,
};
use std::sync::Arc;
use tokio::net::TcpListener;

// --- Test Harness ---

pub struct TestApp {
    pub address: String,
}

/// Spawns the full application over the in-memory repository, seeded with the
/// shared fixture: sarah1 owns 99 (123.45), 100 (1.00), 101 (150.00); kumar2
/// owns 102 (200.00). Users come from the seeded development store.
async fn spawn_app() -> TestApp {
    let seed = vec![
        card(99, 123.45, "sarah1"),
        card(100, 1.00, "sarah1"),
        card(101, 150.00, "sarah1"),
        card(102, 200.00, "kumar2"),
    ];

    let repo = Arc::new(InMemoryCardRepository::with_cards(seed)) as RepositoryState;
    let users = Arc::new(InMemoryUserStore::seeded()) as UserStoreState;

    let state = AppState {
        repo,
        users,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

fn card(id: i64, amount: f64, owner: &str) -> Card {
    Card {
        id,
        amount,
        owner: owner.to_string(),
    }
}

fn sarah(req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.basic_auth("sarah1", Some("abc123"))
}

fn kumar(req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.basic_auth("kumar2", Some("xyz789"))
}

// --- Tests ---

#[tokio::test]
async fn test_health_check_needs_no_credentials() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_returns_a_card_when_data_is_saved() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards/99", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], 99);
    assert_eq!(body["amount"], 123.45);
    assert_eq!(body["owner"], "sarah1");
}

#[tokio::test]
async fn test_does_not_return_a_card_with_an_unknown_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards/1000", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_creates_a_new_card() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let create = sarah(client.post(format!("{}/cards", app.address)))
        .json(&serde_json::json!({ "amount": 250.00 }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), 201);

    let location = create
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("Location header missing")
        .to_string();

    let get = sarah(client.get(format!("{}{}", app.address, location)))
        .send()
        .await
        .unwrap();
    assert_eq!(get.status(), 200);

    let body: serde_json::Value = get.json().await.unwrap();
    assert_eq!(body["amount"], 250.00);
    assert_eq!(body["owner"], "sarah1");
}

#[tokio::test]
async fn test_create_ignores_client_supplied_owner_and_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // The body claims the card belongs to kumar2 and has id 1; both fields are
    // discarded and the owner is forced to the authenticated caller.
    let create = sarah(client.post(format!("{}/cards", app.address)))
        .json(&serde_json::json!({ "id": 1, "amount": 42.00, "owner": "kumar2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), 201);

    let location = create.headers()["location"].to_str().unwrap().to_string();
    assert_ne!(location, "/cards/1");

    let body: serde_json::Value = sarah(client.get(format!("{}{}", app.address, location)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["owner"], "sarah1");
    assert_eq!(body["amount"], 42.00);
}

#[tokio::test]
async fn test_returns_all_cards_for_the_caller() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let page = body.as_array().unwrap();
    // Only sarah1's three cards; kumar2's 102 never appears.
    assert_eq!(page.len(), 3);

    let mut ids: Vec<i64> = page.iter().map(|c| c["id"].as_i64().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![99, 100, 101]);
}

#[tokio::test]
async fn test_returns_a_page_of_cards() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards?page=0&size=1", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_returns_a_sorted_page_of_cards() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!(
        "{}/cards?page=0&size=1&sort=amount,desc",
        app.address
    )))
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let page = body.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["amount"], 150.00);
}

#[tokio::test]
async fn test_returns_a_sorted_page_with_no_parameters_using_defaults() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let amounts: Vec<f64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["amount"].as_f64().unwrap())
        .collect();
    // Default sort: amount ascending.
    assert_eq!(amounts, vec![1.00, 123.45, 150.00]);
}

#[tokio::test]
async fn test_rejects_an_unknown_sort_field() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!("{}/cards?sort=balance,desc", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_rejects_a_page_index_whose_offset_cannot_be_represented() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.get(format!(
        "{}/cards?page=9223372036854775807&size=20",
        app.address
    )))
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_does_not_return_cards_when_using_bad_credentials() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/cards/99", app.address))
        .basic_auth("BAD-USER", Some("abc123"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/cards/99", app.address))
        .basic_auth("sarah1", Some("BAD-PASSWORD"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/cards/99", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_rejects_users_who_are_not_card_owners() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // hank authenticates fine but lacks the card-owner role: 403, not 401 and
    // not 404, and the role gate fires before any record lookup.
    let response = client
        .get(format!("{}/cards/99", app.address))
        .basic_auth("hank-owns-no-cards", Some("qrs456"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/cards", app.address))
        .basic_auth("hank-owns-no-cards", Some("qrs456"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_does_not_allow_access_to_cards_they_do_not_own() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // kumar2's card: the outcome is identical to a nonexistent id.
    let foreign = sarah(client.get(format!("{}/cards/102", app.address)))
        .send()
        .await
        .unwrap();
    let absent = sarah(client.get(format!("{}/cards/99999", app.address)))
        .send()
        .await
        .unwrap();

    assert_eq!(foreign.status(), 404);
    assert_eq!(foreign.status(), absent.status());
    assert_eq!(
        foreign.text().await.unwrap(),
        absent.text().await.unwrap()
    );
}

#[tokio::test]
async fn test_updates_an_existing_card() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.put(format!("{}/cards/99", app.address)))
        .json(&serde_json::json!({ "amount": 19.99 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let body: serde_json::Value = sarah(client.get(format!("{}/cards/99", app.address)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], 99);
    assert_eq!(body["amount"], 19.99);
    assert_eq!(body["owner"], "sarah1");
}

#[tokio::test]
async fn test_update_keeps_the_stored_owner_whatever_the_body_says() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.put(format!("{}/cards/99", app.address)))
        .json(&serde_json::json!({ "amount": 19.99, "owner": "kumar2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let body: serde_json::Value = sarah(client.get(format!("{}/cards/99", app.address)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["owner"], "sarah1");
}

#[tokio::test]
async fn test_does_not_update_a_card_that_does_not_exist() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.put(format!("{}/cards/99999", app.address)))
        .json(&serde_json::json!({ "amount": 19.99 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_does_not_update_a_card_owned_by_someone_else() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.put(format!("{}/cards/102", app.address)))
        .json(&serde_json::json!({ "amount": 333.33 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // kumar2's card is untouched.
    let body: serde_json::Value = kumar(client.get(format!("{}/cards/102", app.address)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["amount"], 200.00);
    assert_eq!(body["owner"], "kumar2");
}

#[tokio::test]
async fn test_deletes_an_existing_card() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.delete(format!("{}/cards/99", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let get = sarah(client.get(format!("{}/cards/99", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(get.status(), 404);
}

#[tokio::test]
async fn test_does_not_allow_deletion_of_a_card_they_do_not_own() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.delete(format!("{}/cards/102", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Still there for its actual owner.
    let get = kumar(client.get(format!("{}/cards/102", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(get.status(), 200);
}

#[tokio::test]
async fn test_ids_are_never_reused_after_delete() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.delete(format!("{}/cards/101", app.address)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let create = sarah(client.post(format!("{}/cards", app.address)))
        .json(&serde_json::json!({ "amount": 1.00 }))
        .send()
        .await
        .unwrap();
    let location = create.headers()["location"].to_str().unwrap().to_string();
    let new_id: i64 = location
        .rsplit('/')
        .next()
        .unwrap()
        .parse()
        .expect("Location should end in the new id");

    // The counter is monotonic: past every seeded id, including the deleted one.
    assert!(new_id > 102);
}

#[tokio::test]
async fn test_rejects_a_malformed_amount() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = sarah(client.post(format!("{}/cards", app.address)))
        .header("content-type", "application/json")
        .body(r#"{ "amount": "not-a-number" }"#)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
