//! Behavior-driven tests for vendor operations
//!
//! These tests drive each adapter end to end through a scripted transport
//! and check what a caller observes: the request that left the process and
//! the envelope that came back.

use std::sync::Arc;

use parkbridge_core::{
    Adapter, DeviceHubAdapter, GateLinkAdapter, HttpMethod, ParkCloudAdapter, Reply,
    ResponseShape, TokenCache, TrustPassAdapter, VendorErrorKind, VendorId,
};
use parkbridge_tests::{
    device_hub_config, gate_link_config, init_tracing, park_cloud_config, trust_pass_config,
    ScriptedTransport,
};
use serde_json::json;

// =============================================================================
// ParkCloud: parking operations
// =============================================================================

#[tokio::test]
async fn when_car_is_queried_user_receives_vehicle_record_in_envelope() {
    init_tracing();

    // Given: A parking platform that knows the car
    let transport = ScriptedTransport::new().reply(
        r#"{"resultCode":0,"message":"ok","data":{"carNo":"AB123","inTime":"2024-05-01 08:00:00"}}"#,
    );
    let adapter = ParkCloudAdapter::with_http_client(&park_cloud_config(), transport.clone())
        .expect("valid config");

    // When: The car is queried
    let envelope = adapter
        .query_car(&json!({ "carNo": "AB123", "parkCode": "P1" }))
        .envelope()
        .await
        .expect("query succeeds");

    // Then: The vendor data comes back untouched with code 0
    assert_eq!(envelope.code, 0);
    assert_eq!(envelope.message, "ok");
    assert_eq!(envelope.data["inTime"], json!("2024-05-01 08:00:00"));

    // And: Exactly one signed JSON POST was sent
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, "https://park.example.test/openapi/car/query");
    assert_eq!(requests[0].timeout_ms, 5_000);
    let body = transport.json_body(0);
    assert_eq!(body["appId"], json!("park-app"));
    assert_eq!(body["sign"].as_str().map(str::len), Some(32));
}

#[tokio::test]
async fn when_vehicle_is_not_in_lot_user_receives_mapped_failure_not_error() {
    // Given: The platform reports a known failure code
    let transport = ScriptedTransport::new()
        .reply(r#"{"resultCode":2002,"message":"car not exist"}"#);
    let adapter = ParkCloudAdapter::with_http_client(&park_cloud_config(), transport)
        .expect("valid config");

    // When: The fee is queried
    let envelope = adapter
        .query_parking_fee(&json!({ "parkCode": "P1", "carNo": "ZZ999" }))
        .envelope()
        .await
        .expect("in-band failures are not errors");

    // Then: The code is kept and the message comes from the error table
    assert_eq!(envelope.code, 2002);
    assert_eq!(envelope.message, "vehicle is not in the parking lot");
    assert!(envelope.data.is_null());
    assert_eq!(envelope.raw["message"], json!("car not exist"));
}

#[tokio::test]
async fn when_monthly_car_is_added_optional_owner_fields_are_forwarded() {
    // Given: A platform accepting the monthly card
    let transport = ScriptedTransport::new().reply(r#"{"resultCode":0}"#);
    let adapter = ParkCloudAdapter::with_http_client(&park_cloud_config(), transport.clone())
        .expect("valid config");

    // When: A card is added with an owner name and no phone
    adapter
        .add_monthly_car(&json!({
            "parkCode": "P1",
            "carNo": "AB123",
            "startTime": "2024-01-01",
            "endTime": "2024-12-31",
            "ownerName": "Wang Wu",
            "phone": null,
        }))
        .envelope()
        .await
        .expect("card added");

    // Then: Only the supplied optional field is on the wire
    let body = transport.json_body(0);
    assert_eq!(body["ownerName"], json!("Wang Wu"));
    assert!(body.get("ownerPhone").is_none());
}

#[tokio::test]
async fn when_payment_and_removal_are_reported_each_hits_its_own_endpoint() {
    // Given: A platform accepting three calls
    let transport = ScriptedTransport::new()
        .reply(r#"{"resultCode":0}"#)
        .reply(r#"{"resultCode":0}"#)
        .reply(r#"{"resultCode":0,"data":{"free":12}}"#);
    let adapter = ParkCloudAdapter::with_http_client(&park_cloud_config(), transport.clone())
        .expect("valid config");

    // When: Payment, removal and a space count are issued
    adapter
        .pay_parking_fee(&json!({ "parkCode": "P1", "carNo": "AB123", "orderNo": "O-1", "amount": 500 }))
        .envelope()
        .await
        .expect("payment reported");
    adapter
        .delete_monthly_car(&json!({ "parkCode": "P1", "carNo": "AB123" }))
        .envelope()
        .await
        .expect("card removed");
    let spaces = adapter
        .query_free_spaces(&json!({ "parkCode": "P1" }))
        .envelope()
        .await
        .expect("spaces counted");

    // Then: Endpoints differ and the amount stays numeric
    assert_eq!(
        transport.urls(),
        [
            "https://park.example.test/openapi/fee/pay",
            "https://park.example.test/openapi/monthly/delete",
            "https://park.example.test/openapi/space/free",
        ]
    );
    assert_eq!(transport.json_body(0)["amount"], json!(500));
    assert_eq!(spaces.data["free"], json!(12));
}

// =============================================================================
// GateLink: access control
// =============================================================================

#[tokio::test]
async fn when_door_is_opened_operator_logs_in_once_and_token_travels_with_call() {
    // Given: A gateway that accepts login and door commands
    let transport = ScriptedTransport::new()
        .reply(r#"{"errcode":0,"data":{"accessToken":"gl-token"}}"#)
        .reply(r#"{"errcode":0,"errmsg":"opened"}"#);
    let adapter = GateLinkAdapter::with_http_client(
        &gate_link_config(),
        transport.clone(),
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: A door is opened
    let envelope = adapter
        .open_door(&json!({ "doorId": "D-7" }))
        .envelope()
        .await
        .expect("door opens");

    // Then: Login preceded the command and the token was attached
    assert_eq!(envelope.message, "opened");
    assert_eq!(
        transport.urls(),
        [
            "https://gate.example.test/api/v1/auth/login",
            "https://gate.example.test/api/v1/doors/open",
        ]
    );
    let command = transport.json_body(1);
    assert_eq!(command["accessToken"], json!("gl-token"));
    assert_eq!(command["doorId"], json!("D-7"));
    assert!(command["signature"].as_str().is_some_and(|sig| !sig.is_empty()));
}

#[tokio::test]
async fn when_access_records_are_queried_paging_defaults_are_applied() {
    // Given: A gateway with an empty record page
    let transport = ScriptedTransport::new()
        .reply(r#"{"errcode":0,"data":{"accessToken":"gl-token"}}"#)
        .reply(r#"{"errcode":0,"data":{"total":0,"list":[]}}"#);
    let adapter = GateLinkAdapter::with_http_client(
        &gate_link_config(),
        transport.clone(),
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: Records are queried without paging arguments
    adapter
        .query_access_records(&json!({ "startTime": "2024-05-01", "endTime": "2024-05-02", "pageSize": 5 }))
        .envelope()
        .await
        .expect("records listed");

    // Then: The GET query carries the defaults and caller overrides
    let requests = transport.requests();
    assert_eq!(requests[1].method, HttpMethod::Get);
    assert!(requests[1].url.contains("pageNo=1&pageSize=5"));
    assert!(requests[1].body.is_none());
}

#[tokio::test]
async fn when_access_is_granted_and_revoked_door_lists_stay_lists() {
    // Given: A gateway accepting both permission changes
    let transport = ScriptedTransport::new()
        .reply(r#"{"errcode":0,"data":{"accessToken":"gl-token"}}"#)
        .reply(r#"{"errcode":0}"#)
        .reply(r#"{"errcode":40402,"errmsg":"no person"}"#);
    let adapter = GateLinkAdapter::with_http_client(
        &gate_link_config(),
        transport.clone(),
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: Access is granted, then revoked for an unknown person
    adapter
        .grant_access(&json!({
            "personId": "P-1",
            "doorIds": ["D-1", "D-2"],
            "startTime": "2024-05-01 00:00:00",
            "endTime": "2024-05-31 23:59:59",
        }))
        .envelope()
        .await
        .expect("granted");
    let revoked = adapter
        .revoke_access(&json!({ "personId": "P-404", "doorIds": ["D-1"] }))
        .envelope()
        .await
        .expect("in-band failure");

    // Then: Arrays are sent as arrays and the failure is mapped
    assert_eq!(transport.json_body(1)["doorIds"], json!(["D-1", "D-2"]));
    assert_eq!(revoked.code, 40402);
    assert_eq!(revoked.message, "person not found");
}

// =============================================================================
// DeviceHub: device registry
// =============================================================================

#[tokio::test]
async fn when_device_is_registered_bearer_and_signature_headers_are_sent() {
    // Given: A registry that issues a token and accepts the device
    let transport = ScriptedTransport::new()
        .reply(r#"{"success":true,"data":{"token":"hub-token"}}"#)
        .reply(r#"{"success":true,"data":{"deviceId":"dev-1"}}"#);
    let adapter = DeviceHubAdapter::with_http_client(
        &device_hub_config(),
        transport.clone(),
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: A device is registered
    let envelope = adapter
        .register_device(&json!({ "deviceSn": "SN-1", "deviceName": "Gate cam", "deviceType": "camera" }))
        .envelope()
        .await
        .expect("registered");

    // Then: The device id is returned and headers carry the credentials
    assert_eq!(envelope.data["deviceId"], json!("dev-1"));
    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://hub.example.test/v2/auth/token");
    let register = &requests[1];
    assert_eq!(register.headers.get("authorization").map(String::as_str), Some("Bearer hub-token"));
    assert_eq!(register.headers.get("x-app-key").map(String::as_str), Some("hub-key"));
    let sign = register.headers.get("x-sign").expect("signature header");
    assert_eq!(sign.len(), 32);
    assert_eq!(sign, &sign.to_ascii_uppercase());
    assert_eq!(register.timeout_ms, 8_000);
}

#[tokio::test]
async fn when_registry_rejects_device_caller_receives_upstream_error() {
    // Given: A registry that refuses the serial number
    let transport = ScriptedTransport::new()
        .reply(r#"{"success":true,"data":{"token":"hub-token"}}"#)
        .reply(r#"{"success":false,"errorCode":"E2001","msg":"dup"}"#);
    let adapter = DeviceHubAdapter::with_http_client(
        &device_hub_config(),
        transport,
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: The duplicate is registered
    let error = adapter
        .register_device(&json!({ "deviceSn": "SN-1", "deviceName": "Gate cam", "deviceType": "camera" }))
        .envelope()
        .await
        .expect_err("registry failures raise");

    // Then: The error is classified and carries the mapped message
    assert_eq!(error.kind(), VendorErrorKind::Upstream);
    assert!(!error.retryable());
    assert!(error.message().contains("device serial number already registered"));
}

#[tokio::test]
async fn when_devices_are_listed_raw_body_shape_skips_normalization() {
    // Given: A registry returning a listing
    let listing = r#"{"success":true,"data":{"items":[]}}"#;
    let transport = ScriptedTransport::new()
        .reply(r#"{"success":true,"data":{"token":"hub-token"}}"#)
        .reply(listing);
    let adapter = DeviceHubAdapter::with_http_client(
        &device_hub_config(),
        transport,
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // When: The caller asks for the raw body
    let reply = adapter
        .list_devices(&json!({}))
        .with_shape(ResponseShape::RawBody)
        .execute()
        .await
        .expect("listing succeeds");

    // Then: The body is returned verbatim
    assert_eq!(reply, Reply::Body(listing.to_owned()));
}

// =============================================================================
// TrustPass: identity and visitors
// =============================================================================

#[tokio::test]
async fn when_visitor_is_registered_form_body_is_rsa_signed() {
    // Given: An identity service accepting the visitor
    let transport = ScriptedTransport::new()
        .reply(r#"{"resultCode":"0000","resultMsg":"success","data":{"visitorId":"V-9"}}"#);
    let adapter = TrustPassAdapter::with_http_client(&trust_pass_config(), transport.clone())
        .expect("valid config");

    // When: A visitor is registered
    let envelope = adapter
        .register_visitor(&json!({ "name": "Han Meimei", "phone": "13800000000", "visitDate": "2024-06-01" }))
        .envelope()
        .await
        .expect("registered");

    // Then: The visitor id is returned and the body is a signed form
    assert_eq!(envelope.data["visitorId"], json!("V-9"));
    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://trust.example.test/gateway/visitor/register");
    assert_eq!(requests[0].timeout_ms, 10_000);
    let body = requests[0].body.as_deref().expect("form body");
    assert!(body.contains("merchantId=M-001"));
    assert!(body.contains("&sign="));
    assert!(!body.contains("idCardNo"));
}

#[tokio::test]
async fn when_identity_does_not_match_text_code_is_reported_in_band() {
    // Given: The identity service reports a mismatch
    let transport = ScriptedTransport::new().reply(r#"{"resultCode":"2001","resultMsg":"mismatch"}"#);
    let adapter = TrustPassAdapter::with_http_client(&trust_pass_config(), transport)
        .expect("valid config");

    // When: Identity is verified
    let envelope = adapter
        .verify_identity(&json!({ "name": "Li Lei", "idCardNo": "110101199003070000" }))
        .envelope()
        .await
        .expect("in-band failure");

    // Then: The failure is mapped from the table
    assert_eq!(envelope.code, 2001);
    assert_eq!(envelope.message, "name and id card number do not match");
}

#[tokio::test]
async fn when_visitor_is_queried_then_cancelled_both_calls_succeed() {
    // Given: A service that knows the visitor
    let transport = ScriptedTransport::new()
        .reply(r#"{"resultCode":"0000","data":{"visitorId":"V-9","status":"ACTIVE"}}"#)
        .reply(r#"{"resultCode":"0000"}"#);
    let adapter = TrustPassAdapter::with_http_client(&trust_pass_config(), transport.clone())
        .expect("valid config");

    // When: The visitor is queried and cancelled
    let found = adapter
        .query_visitor(&json!({ "visitorId": "V-9" }))
        .envelope()
        .await
        .expect("found");
    let cancelled = adapter
        .cancel_visitor(&json!({ "visitorId": "V-9" }))
        .envelope()
        .await
        .expect("cancelled");

    // Then: Both succeed and the default success message is used
    assert_eq!(found.data["status"], json!("ACTIVE"));
    assert!(cancelled.is_success());
    assert_eq!(cancelled.message, "success");
    assert_eq!(transport.request_count(), 2);
}

// =============================================================================
// Factory
// =============================================================================

#[tokio::test]
async fn when_adapter_is_connected_by_vendor_id_it_serves_that_vendor() {
    // Given: A vendor name from configuration
    let vendor: VendorId = "ParkCloud".parse().expect("known vendor");
    let transport = ScriptedTransport::new().reply(r#"{"resultCode":0}"#);

    // When: The factory builds it
    let adapter = Adapter::connect(
        vendor,
        &park_cloud_config(),
        Arc::clone(&transport) as Arc<dyn parkbridge_core::HttpClient>,
        TokenCache::in_memory(),
    )
    .expect("valid config");

    // Then: The typed adapter is reachable and usable
    assert_eq!(adapter.vendor(), VendorId::ParkCloud);
    let parking = adapter.as_park_cloud().expect("parking adapter");
    parking
        .query_free_spaces(&json!({ "parkCode": "P1" }))
        .envelope()
        .await
        .expect("query succeeds");
    assert_eq!(transport.request_count(), 1);
}
