//! Routing behavior exercised through the public router API.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{json, Map, Value};

use switchyard::http::{middleware_fn, HttpNext, Request, Response};
use switchyard::routing::middleware::sort_middleware;
use switchyard::routing::{handler, ActionController, GroupAttributes, MiddlewareRef, Router};
use switchyard::Error;

mod common;
use common::{entries, json_body, log, request, Recorder};

fn uris(router: &Router) -> Vec<String> {
    router.routes().iter().map(|r| r.uri().to_string()).collect()
}

#[test]
fn test_group_prefixes_ignore_surrounding_slashes() {
    let variants = [
        ("admin", "users"),
        ("/admin", "/users"),
        ("admin/", "users/"),
        ("/admin/", "/users/"),
    ];

    for (outer, inner) in variants {
        let mut router = Router::new();
        router.group(GroupAttributes::new().prefix(outer), |r| {
            r.group(GroupAttributes::new().prefix(inner), |r| {
                r.get("/{id}", "Users@show");
            });
        });
        assert_eq!(uris(&router), vec!["admin/users/{id}"], "prefixes {outer:?} + {inner:?}");
    }
}

#[test]
fn test_nested_prefix_equals_combined_prefix() {
    let mut nested = Router::new();
    nested.group(GroupAttributes::new().prefix("admin"), |r| {
        r.group(GroupAttributes::new().prefix("users"), |r| {
            r.get("list", "Users@list");
        });
    });

    let mut combined = Router::new();
    combined.group(GroupAttributes::new().prefix("admin/users"), |r| {
        r.get("list", "Users@list");
    });

    assert_eq!(uris(&nested), uris(&combined));
}

#[tokio::test]
async fn test_optional_parameter_yields_null() {
    let mut router = Router::new();
    router.get(
        "user/{id}/{age?}",
        handler(|req: Request| async move { Ok(req.parameters().to_json()) }),
    );

    let short = router.dispatch(request(Method::GET, "/user/5")).await.unwrap();
    assert_eq!(json_body(&short), json!({ "id": "5", "age": null }));

    let long = router.dispatch(request(Method::GET, "/user/5/30")).await.unwrap();
    assert_eq!(json_body(&long), json!({ "id": "5", "age": "30" }));
}

#[tokio::test]
async fn test_short_circuit_skips_later_stages_and_action() {
    let log = log();
    let mut router = Router::new();
    router.register_middleware("first", Recorder::new("first", &log));
    router.register_middleware(
        "gate",
        middleware_fn(|_request, _next: HttpNext, _| async move {
            Ok(Response::text(StatusCode::FORBIDDEN, "stopped"))
        }),
    );
    router.register_middleware("third", Recorder::new("third", &log));

    let action_log = log.clone();
    router
        .get(
            "guarded",
            handler(move |_req: Request| {
                let action_log = action_log.clone();
                async move {
                    action_log.lock().unwrap().push("action".into());
                    Ok("reached")
                }
            }),
        )
        .middleware(["first", "gate", "third"]);

    let response = router.dispatch(request(Method::GET, "/guarded")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text_body(), "stopped");
    assert_eq!(entries(&log), vec!["first:before", "first:after"]);
}

#[test]
fn test_priority_order_holds_for_every_input_order() {
    let priority: Vec<String> = ["session", "auth", "bindings"].iter().map(|s| s.to_string()).collect();
    let orders = [
        ["bindings", "log", "auth", "session"],
        ["auth", "bindings", "session", "log"],
        ["log", "session", "bindings", "auth"],
        ["bindings", "auth", "log", "session"],
    ];

    for order in orders {
        let input: Vec<MiddlewareRef> = order.iter().map(|m| MiddlewareRef::from(*m)).collect();
        let sorted: Vec<String> = sort_middleware(&priority, input).iter().map(|m| m.to_string()).collect();
        let position = |name: &str| sorted.iter().position(|m| m == name).unwrap();

        assert!(position("session") < position("auth"), "{order:?} → {sorted:?}");
        assert!(position("auth") < position("bindings"), "{order:?} → {sorted:?}");
        assert_eq!(sorted.len(), 4);
    }
}

#[test]
fn test_group_stack_restored_when_routes_panic() {
    let mut router = Router::new();
    router.group(GroupAttributes::new().prefix("api").middleware(["api"]), |r| {
        let before = r.group_stack().to_vec();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            r.group(GroupAttributes::new().prefix("v1"), |_| -> () { panic!("broken route file") });
        }));
        assert!(caught.is_err());
        assert_eq!(r.group_stack(), before.as_slice());
        r.get("status", "Status@show");
    });

    assert!(!router.has_group_stack());
    assert_eq!(uris(&router), vec!["api/status"]);
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let mut router = Router::new();
    router
        .get("users/{id}", handler(|_| async { Ok("constrained") }))
        .where_("id", "[0-9]+");
    router.get("users/{id}", handler(|_| async { Ok("plain") }));

    let digits = router.dispatch(request(Method::GET, "/users/7")).await.unwrap();
    assert_eq!(digits.text_body(), "constrained");

    let word = router.dispatch(request(Method::GET, "/users/abc")).await.unwrap();
    assert_eq!(word.text_body(), "plain");
}

#[tokio::test]
async fn test_wrong_verb_is_method_not_allowed() {
    let mut router = Router::new();
    router.get("users", handler(|_| async { Ok("list") }));

    let err = router.dispatch(request(Method::POST, "/users")).await.unwrap_err();
    match &err {
        Error::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, &vec![Method::GET, Method::HEAD]),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_controller_map_becomes_json() {
    let mut router = Router::new();
    router.register_controller(
        "Profile",
        Arc::new(ActionController::new().action(
            "show",
            handler(|req: Request| async move {
                let mut map = Map::new();
                map.insert("id".into(), Value::from(req.parameter("id").unwrap_or_default()));
                map.insert("active".into(), Value::Bool(true));
                Ok(map)
            }),
        )),
    );
    router.get("profiles/{id}", "Profile@show");

    let response = router.dispatch(request(Method::GET, "/profiles/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(json_body(&response), json!({ "id": "42", "active": true }));
}

#[tokio::test]
async fn test_group_attributes_reach_routes() {
    let log = log();
    let mut router = Router::new();
    router.register_middleware("audit", Recorder::new("audit", &log));
    router
        .prefix("admin")
        .name("admin.")
        .middleware(["audit"])
        .where_("id", "[0-9]+")
        .group(|r| {
            r.get("users/{id}", handler(|_| async { Ok("user") })).name("users.show");
        });

    let route = router.get_by_name("admin.users.show").unwrap();
    assert_eq!(route.uri(), "admin/users/{id}");
    assert_eq!(route.wheres()["id"], "[0-9]+");

    router.dispatch(request(Method::GET, "/admin/users/3")).await.unwrap();
    assert_eq!(entries(&log), vec!["audit:before", "audit:after"]);

    let err = router.dispatch(request(Method::GET, "/admin/users/x")).await.unwrap_err();
    assert!(matches!(err, Error::RouteNotFound { .. }));
}
