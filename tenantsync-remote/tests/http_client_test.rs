// Integration tests for `HttpResourceApi` behind a `PagedClient`, using wiremock.

use std::sync::Arc;

use serde_json::json;
use tenantsync_core::PoolSettings;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tenantsync_remote::{
    HttpResourceApi, PagedClient, Pagination, RemoteError, ResourceApi, ResourceSpec,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PagedClient) {
    let server = MockServer::start().await;
    let api = HttpResourceApi::new(&format!("{}/api/v2", server.uri()), "test-token").unwrap();
    let settings = PoolSettings { max_concurrent: 3, max_per_second: 50, max_retries: 2 };
    (server, PagedClient::new(Arc::new(api), &settings))
}

fn clients() -> ResourceSpec {
    ResourceSpec::new("clients", "clients")
}

// ── Listing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn offset_pagination_collects_every_page_in_order() {
    let (server, client) = setup().await;

    for (page, names) in [("0", vec!["a", "b"]), ("1", vec!["c", "d"]), ("2", vec!["e"])] {
        let items: Vec<_> = names.iter().map(|n| json!({"client_id": n, "name": n})).collect();
        Mock::given(method("GET"))
            .and(path("/api/v2/clients"))
            .and(query_param("page", page))
            .and(query_param("per_page", "2"))
            .and(query_param("include_totals", "true"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"clients": items, "total": 5, "start": 0, "limit": 2})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let items = client
        .resource(clients())
        .list(&Pagination::Offset { per_page: 2 })
        .await
        .unwrap();
    let names: Vec<_> = items.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn page_size_is_capped_at_one_hundred() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/clients"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clients": [], "total": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let items = client
        .resource(clients())
        .list(&Pagination::Offset { per_page: 500 })
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn checkpoint_pagination_follows_next() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/organizations"))
        .and(query_param("from", "cursor-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organizations": [{"id": "org_2", "name": "two"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/organizations"))
        .and(query_param("take", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organizations": [{"id": "org_1", "name": "one"}],
            "next": "cursor-1"
        })))
        .mount(&server)
        .await;

    let items = client
        .resource(ResourceSpec::new("organizations", "organizations"))
        .list(&Pagination::checkpoint())
        .await
        .unwrap();
    let ids: Vec<_> = items.iter().map(|o| o["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["org_1", "org_2"]);
}

#[tokio::test]
async fn unpaginated_list_accepts_bare_arrays() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "r1", "name": "admin"}])))
        .mount(&server)
        .await;

    let items = client
        .resource(ResourceSpec::new("roles", "roles"))
        .list(&Pagination::None)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn create_update_delete_hit_the_expected_paths() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/clients"))
        .and(body_json(json!({"name": "app"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"client_id": "c1", "name": "app"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/clients/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"client_id": "c1", "name": "renamed"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/clients/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resource = client.resource(clients());
    let created = resource
        .create(json!({"name": "app"}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(created["client_id"], "c1");

    let updated = resource
        .update("c1", json!({"name": "renamed"}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(updated["name"], "renamed");

    resource.delete("c1").await.unwrap();
}

#[tokio::test]
async fn singleton_settings_are_read_and_patched_in_place() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/tenants/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"friendly_name": "Acme"})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/tenants/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"friendly_name": "Acme 2"})))
        .expect(1)
        .mount(&server)
        .await;

    let tenant = client.resource(ResourceSpec::new("tenants/settings", ""));
    assert_eq!(tenant.get().await.unwrap()["friendly_name"], "Acme");
    let patched = tenant
        .update_settings(json!({"friendly_name": "Acme 2"}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(patched["friendly_name"], "Acme 2");
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/clients"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"statusCode": 400, "message": "Payload validation error"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .resource(clients())
        .create(json!({"bogus": true}).as_object().unwrap())
        .await
        .unwrap_err();
    match err {
        RemoteError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Payload validation error");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn too_many_requests_is_retried_through_the_pool() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let items = client
        .resource(ResourceSpec::new("roles", "roles"))
        .list(&Pagination::None)
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn raw_api_reports_rate_limit_hint() {
    let server = MockServer::start().await;
    let api = HttpResourceApi::new(&server.uri(), "t").unwrap();

    Mock::given(method("DELETE"))
        .and(path("/roles/r1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = api.delete("roles/r1").await.unwrap_err();
    assert!(
        matches!(err, RemoteError::RateLimited { retry_after: Some(d) } if d.as_secs() == 7),
        "got: {err:?}"
    );
}
